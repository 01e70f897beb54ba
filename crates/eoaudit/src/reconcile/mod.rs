//! Reconciliation checks.
//!
//! Every check is a pure function from the inventory (plus, for the count
//! checks, a snapshot of live counts) to a list of [`Finding`]s. Checks do
//! not depend on each other and can run in any order or subset.

mod anomaly;
mod counts;
mod files;

pub use anomaly::{check_anomalies, normalized_suffix, AnomalyRules};
pub use counts::{
    check_database_counts, check_derived_counts, check_storage_catalog_counts, PlatformCounts,
    RegisteredProduct,
};
pub use files::{
    check_empty_files, check_error_logs, check_metadata, check_small_rasters, largest_files,
    smallest_files, total_sizes, Accumulation,
};

use crate::inventory::FileRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a finding should be treated by the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational report (sizes); never fails a run
    Info,
    /// Drift or anomaly an operator should look at
    Discrepancy,
}

/// Which namespace a derived-product count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Catalog,
    Storage,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Catalog => write!(f, "catalog"),
            Namespace::Storage => write!(f, "raw storage"),
        }
    }
}

/// One reported discrepancy or report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    CountMismatch {
        platform: String,
        catalog: usize,
        storage: usize,
    },
    DatabaseCountMismatch {
        platform: String,
        inventory: usize,
        database: i64,
    },
    MissingBasePlatform {
        platform: String,
        base: String,
    },
    DerivedCountMismatch {
        platform: String,
        base: String,
        namespace: Namespace,
        derived_count: usize,
        base_count: usize,
    },
    LargestFile {
        platform: String,
        file: Option<FileRecord>,
    },
    SmallestFile {
        platform: String,
        file: Option<FileRecord>,
    },
    TotalSize {
        platform: String,
        bytes: u64,
    },
    MissingMetadata {
        platform: String,
        prefix: String,
        expected: String,
    },
    LogFileFound {
        platform: String,
        prefix: String,
        key: String,
    },
    AnomalousFile {
        platform: String,
        suffix: String,
        prefix: String,
        url: String,
    },
    SmallRaster {
        platform: String,
        key: String,
        size: u64,
        url: String,
    },
    EmptyFile {
        platform: String,
        key: String,
        url: String,
    },
}

impl Finding {
    pub fn platform(&self) -> &str {
        match self {
            Finding::CountMismatch { platform, .. }
            | Finding::DatabaseCountMismatch { platform, .. }
            | Finding::MissingBasePlatform { platform, .. }
            | Finding::DerivedCountMismatch { platform, .. }
            | Finding::LargestFile { platform, .. }
            | Finding::SmallestFile { platform, .. }
            | Finding::TotalSize { platform, .. }
            | Finding::MissingMetadata { platform, .. }
            | Finding::LogFileFound { platform, .. }
            | Finding::AnomalousFile { platform, .. }
            | Finding::SmallRaster { platform, .. }
            | Finding::EmptyFile { platform, .. } => platform,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Finding::LargestFile { .. } | Finding::SmallestFile { .. } | Finding::TotalSize { .. } => {
                Severity::Info
            }
            _ => Severity::Discrepancy,
        }
    }

    pub fn is_discrepancy(&self) -> bool {
        self.severity() == Severity::Discrepancy
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::CountMismatch {
                platform,
                catalog,
                storage,
            } => write!(
                f,
                "count mismatch for {}: {} catalog items vs {} raw scenes",
                platform, catalog, storage
            ),
            Finding::DatabaseCountMismatch {
                platform,
                inventory,
                database,
            } => write!(
                f,
                "count mismatch between storage and database for {}: {} vs {}",
                platform, inventory, database
            ),
            Finding::MissingBasePlatform { platform, base } => {
                write!(f, "missing base platform '{}' for {}", base, platform)
            }
            Finding::DerivedCountMismatch {
                platform,
                base,
                namespace,
                derived_count,
                base_count,
            } => write!(
                f,
                "count mismatch between {} and {} in {}: {} vs {}",
                platform, base, namespace, derived_count, base_count
            ),
            Finding::LargestFile { platform, file } => match file {
                Some(file) => write!(f, "{} largest file: {} ({} bytes)", platform, file.key, file.size),
                None => write!(f, "{} largest file: none", platform),
            },
            Finding::SmallestFile { platform, file } => match file {
                Some(file) => write!(f, "{} smallest file: {} ({} bytes)", platform, file.key, file.size),
                None => write!(f, "{} smallest file: none", platform),
            },
            Finding::TotalSize { platform, bytes } => {
                write!(f, "total size of {} is {} bytes", platform, bytes)
            }
            Finding::MissingMetadata {
                platform,
                prefix,
                expected,
            } => write!(f, "{} :: missing {} in {}", platform, expected, prefix),
            Finding::LogFileFound { platform, prefix, key } => {
                write!(f, "{} :: log file found in {} ({})", platform, prefix, key)
            }
            Finding::AnomalousFile {
                platform,
                suffix,
                prefix,
                ..
            } => write!(f, "{} :: anomalous file {} in {}", platform, suffix, prefix),
            Finding::SmallRaster { key, size, url, .. } => write!(
                f,
                "suspiciously small raster {} ({} bytes) in {}",
                key, size, url
            ),
            Finding::EmptyFile { key, url, .. } => write!(f, "empty file {} in {}", key, url),
        }
    }
}

/// The available checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Catalog item count vs raw scene count per platform
    StorageCatalogCount,
    /// Inventory scene count vs datacube index row count per product
    DatabaseCount,
    /// Derived product (e.g. `_wofs`) scene count vs its base platform
    DerivedCount,
    LargestFile,
    SmallestFile,
    TotalSize,
    /// Every scene carries the metadata document
    Metadata,
    /// Leftover processing logs
    ErrorLog,
    /// Rare file names within a platform
    Anomalies,
    SmallRaster,
    EmptyFile,
}

impl CheckKind {
    pub const ALL: [CheckKind; 11] = [
        CheckKind::StorageCatalogCount,
        CheckKind::DatabaseCount,
        CheckKind::DerivedCount,
        CheckKind::LargestFile,
        CheckKind::SmallestFile,
        CheckKind::TotalSize,
        CheckKind::Metadata,
        CheckKind::ErrorLog,
        CheckKind::Anomalies,
        CheckKind::SmallRaster,
        CheckKind::EmptyFile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::StorageCatalogCount => "storage-catalog-count",
            CheckKind::DatabaseCount => "database-count",
            CheckKind::DerivedCount => "derived-count",
            CheckKind::LargestFile => "largest-file",
            CheckKind::SmallestFile => "smallest-file",
            CheckKind::TotalSize => "total-size",
            CheckKind::Metadata => "metadata",
            CheckKind::ErrorLog => "error-log",
            CheckKind::Anomalies => "anomalies",
            CheckKind::SmallRaster => "small-raster",
            CheckKind::EmptyFile => "empty-file",
        }
    }

    /// Needs live listings of the catalog and raw namespaces.
    pub fn needs_store(&self) -> bool {
        matches!(self, CheckKind::StorageCatalogCount | CheckKind::DerivedCount)
    }

    /// Needs the datacube index.
    pub fn needs_database(&self) -> bool {
        matches!(self, CheckKind::DatabaseCount)
    }

    pub fn is_offline(&self) -> bool {
        !self.needs_store() && !self.needs_database()
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity() {
        let total = Finding::TotalSize {
            platform: "s2".to_string(),
            bytes: 10,
        };
        let empty = Finding::EmptyFile {
            platform: "s2".to_string(),
            key: "a/b.tif".to_string(),
            url: "u".to_string(),
        };
        assert_eq!(total.severity(), Severity::Info);
        assert!(empty.is_discrepancy());
        assert_eq!(empty.platform(), "s2");
    }

    #[test]
    fn test_finding_json_is_tagged() {
        let finding = Finding::CountMismatch {
            platform: "sentinel_2".to_string(),
            catalog: 3,
            storage: 4,
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "count_mismatch");
        assert_eq!(json["catalog"], 3);
        assert_eq!(
            finding.to_string(),
            "count mismatch for sentinel_2: 3 catalog items vs 4 raw scenes"
        );
    }

    #[test]
    fn test_check_names_round_trip_through_clap() {
        use clap::ValueEnum;
        for check in CheckKind::ALL {
            let parsed = CheckKind::from_str(check.name(), false).unwrap();
            assert_eq!(parsed, check);
        }
        assert!(CheckKind::DerivedCount.needs_store());
        assert!(CheckKind::DatabaseCount.needs_database());
        assert!(CheckKind::Anomalies.is_offline());
    }
}
