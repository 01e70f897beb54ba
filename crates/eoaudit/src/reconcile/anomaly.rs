//! Frequency-based detection of unusual file names within a platform.

use super::Finding;
use crate::config::Conventions;
use crate::error::Result;
use crate::inventory::Inventory;
use globset::GlobSet;
use std::collections::HashMap;

/// Anomaly check parameters.
#[derive(Debug, Clone)]
pub struct AnomalyRules {
    /// Platforms matching these patterns are skipped
    pub excluded_platforms: GlobSet,
    /// Suffixes never reported
    pub known_files: Vec<String>,
    pub threshold_percent: f64,
}

impl AnomalyRules {
    pub fn from_conventions(conventions: &Conventions) -> Result<Self> {
        Ok(Self {
            excluded_platforms: conventions.excluded_platforms()?,
            known_files: conventions.known_files.clone(),
            threshold_percent: conventions.anomaly_threshold_percent,
        })
    }

    /// `occurrences` is rare when it is below `threshold_percent` of `scenes`.
    fn is_rare(&self, occurrences: usize, scenes: usize) -> bool {
        (occurrences as f64) * 100.0 < (scenes as f64) * self.threshold_percent
    }
}

/// A key with its scene prefix and the `<scene name>_` stem removed.
///
/// `raw/s2/S2A_T1/S2A_T1_B04.tif` in scene `raw/s2/S2A_T1/` -> `B04.tif`
pub fn normalized_suffix(key: &str, scene_prefix: &str, scene_name: &str) -> String {
    let stripped = if scene_prefix.is_empty() {
        key.to_string()
    } else {
        key.replace(scene_prefix, "")
    };
    if scene_name.is_empty() {
        return stripped;
    }
    stripped.replace(&format!("{}_", scene_name), "")
}

/// Report every occurrence of a normalized suffix that appears in fewer than
/// the threshold share of the platform's scenes and is not a known file.
pub fn check_anomalies(inventory: &Inventory, rules: &AnomalyRules) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (platform, scenes) in inventory.platforms() {
        if rules.excluded_platforms.is_match(platform) {
            continue;
        }

        let mut tally: HashMap<String, usize> = HashMap::new();
        let mut occurrences = Vec::new();
        for scene in scenes {
            for file in &scene.contents {
                let suffix = normalized_suffix(&file.key, &scene.prefix, scene.name());
                *tally.entry(suffix.clone()).or_default() += 1;
                occurrences.push((suffix, scene));
            }
        }

        for (suffix, scene) in occurrences {
            let count = tally.get(&suffix).copied().unwrap_or(0);
            if rules.is_rare(count, scenes.len()) && !rules.known_files.contains(&suffix) {
                findings.push(Finding::AnomalousFile {
                    platform: platform.to_string(),
                    suffix,
                    prefix: scene.prefix.clone(),
                    url: scene.url.clone(),
                });
            }
        }
    }

    findings
}
