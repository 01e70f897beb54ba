//! Checks over the files recorded in the snapshot.

use super::Finding;
use crate::inventory::{FileRecord, Inventory};
use serde::{Deserialize, Serialize};

/// How the size reports (largest, smallest, total) aggregate across platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accumulation {
    /// Each platform is reported on its own files only
    #[default]
    PerPlatform,
    /// Each platform reports everything seen up to and including it, in
    /// platform order
    Cumulative,
}

/// Largest file per platform.
///
/// Sizes must be strictly greater than the current best, so a platform whose
/// files are all empty has no largest file.
pub fn largest_files(inventory: &Inventory, accumulation: Accumulation) -> Vec<Finding> {
    let mut best: Option<&FileRecord> = None;
    let mut findings = Vec::new();

    for (platform, scenes) in inventory.platforms() {
        if accumulation == Accumulation::PerPlatform {
            best = None;
        }
        for file in scenes.iter().flat_map(|s| &s.contents) {
            if file.size > best.map_or(0, |b| b.size) {
                best = Some(file);
            }
        }
        findings.push(Finding::LargestFile {
            platform: platform.to_string(),
            file: best.cloned(),
        });
    }

    findings
}

/// Smallest file per platform. The first file seen wins ties.
pub fn smallest_files(inventory: &Inventory, accumulation: Accumulation) -> Vec<Finding> {
    let mut best: Option<&FileRecord> = None;
    let mut findings = Vec::new();

    for (platform, scenes) in inventory.platforms() {
        if accumulation == Accumulation::PerPlatform {
            best = None;
        }
        for file in scenes.iter().flat_map(|s| &s.contents) {
            if best.map_or(true, |b| file.size < b.size) {
                best = Some(file);
            }
        }
        findings.push(Finding::SmallestFile {
            platform: platform.to_string(),
            file: best.cloned(),
        });
    }

    findings
}

pub fn total_sizes(inventory: &Inventory, accumulation: Accumulation) -> Vec<Finding> {
    let mut running: u64 = 0;
    let mut findings = Vec::new();

    for (platform, scenes) in inventory.platforms() {
        if accumulation == Accumulation::PerPlatform {
            running = 0;
        }
        running = scenes
            .iter()
            .map(|s| s.total_size())
            .fold(running, u64::saturating_add);
        findings.push(Finding::TotalSize {
            platform: platform.to_string(),
            bytes: running,
        });
    }

    findings
}

/// One finding per scene without a key ending in `metadata_file`.
pub fn check_metadata(inventory: &Inventory, metadata_file: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (platform, scenes) in inventory.platforms() {
        for scene in scenes {
            if !scene.contents.iter().any(|f| f.key.ends_with(metadata_file)) {
                findings.push(Finding::MissingMetadata {
                    platform: platform.to_string(),
                    prefix: scene.prefix.clone(),
                    expected: metadata_file.to_string(),
                });
            }
        }
    }
    findings
}

/// One finding per file whose key ends with any of `log_files`.
pub fn check_error_logs(inventory: &Inventory, log_files: &[String]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (platform, scenes) in inventory.platforms() {
        for scene in scenes {
            for file in &scene.contents {
                if log_files.iter().any(|name| file.key.ends_with(name.as_str())) {
                    findings.push(Finding::LogFileFound {
                        platform: platform.to_string(),
                        prefix: scene.prefix.clone(),
                        key: file.key.clone(),
                    });
                }
            }
        }
    }
    findings
}

pub fn check_small_rasters(inventory: &Inventory, extension: &str, min_size: u64) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (platform, scenes) in inventory.platforms() {
        for scene in scenes {
            for file in &scene.contents {
                if file.key.ends_with(extension) && file.size < min_size {
                    findings.push(Finding::SmallRaster {
                        platform: platform.to_string(),
                        key: file.key.clone(),
                        size: file.size,
                        url: scene.url.clone(),
                    });
                }
            }
        }
    }
    findings
}

pub fn check_empty_files(inventory: &Inventory) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (platform, scenes) in inventory.platforms() {
        for scene in scenes {
            for file in scene.contents.iter().filter(|f| f.size == 0) {
                findings.push(Finding::EmptyFile {
                    platform: platform.to_string(),
                    key: file.key.clone(),
                    url: scene.url.clone(),
                });
            }
        }
    }
    findings
}
