//! Count comparisons across the catalog, raw storage and the datacube index.

use super::{Finding, Namespace};
use crate::inventory::Inventory;
use std::collections::BTreeMap;

/// Sub-prefix count per platform within one storage namespace.
///
/// The runner collects these live from the object store; for the raw
/// namespace they can also be taken from a snapshot with
/// [`PlatformCounts::from_inventory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformCounts {
    counts: BTreeMap<String, usize>,
}

impl PlatformCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, platform: impl Into<String>, count: usize) -> Self {
        self.insert(platform, count);
        self
    }

    pub fn insert(&mut self, platform: impl Into<String>, count: usize) {
        self.counts.insert(platform.into(), count);
    }

    /// Scene counts per platform as recorded in the snapshot.
    pub fn from_inventory(inventory: &Inventory) -> Self {
        inventory
            .platforms()
            .map(|(name, scenes)| (name.to_string(), scenes.len()))
            .collect()
    }

    pub fn contains(&self, platform: &str) -> bool {
        self.counts.contains_key(platform)
    }

    /// A platform absent from the namespace counts as zero.
    pub fn count(&self, platform: &str) -> usize {
        self.counts.get(platform).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, usize)> for PlatformCounts {
    fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

/// A product registered in the datacube index with its dataset row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredProduct {
    pub name: String,
    pub rows: i64,
}

impl RegisteredProduct {
    pub fn new(name: impl Into<String>, rows: i64) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Every catalog platform must have as many items as the raw namespace has
/// scenes for it.
pub fn check_storage_catalog_counts(
    catalog: &PlatformCounts,
    storage: &PlatformCounts,
) -> Vec<Finding> {
    catalog
        .iter()
        .filter_map(|(platform, catalog_count)| {
            let storage_count = storage.count(platform);
            (catalog_count != storage_count).then(|| Finding::CountMismatch {
                platform: platform.to_string(),
                catalog: catalog_count,
                storage: storage_count,
            })
        })
        .collect()
}

/// Every registered product must have one dataset row per snapshot scene.
///
/// Registry names are matched against platform names ignoring case; a
/// product with no platform in the snapshot has zero scenes.
pub fn check_database_counts(inventory: &Inventory, products: &[RegisteredProduct]) -> Vec<Finding> {
    products
        .iter()
        .filter_map(|product| {
            let scenes = inventory
                .scenes_ignore_case(&product.name)
                .map_or(0, |scenes| scenes.len());
            let matches = i64::try_from(scenes).map_or(false, |scenes| scenes == product.rows);
            (!matches).then(|| Finding::DatabaseCountMismatch {
                platform: product.name.clone(),
                inventory: scenes,
                database: product.rows,
            })
        })
        .collect()
}

/// A derived product (`<base><suffix>`) must match its base platform's count
/// in both namespaces.
///
/// Platforms are taken from the catalog namespace. When the base platform is
/// not in the catalog the comparison is skipped and only the missing base is
/// reported.
pub fn check_derived_counts(
    catalog: &PlatformCounts,
    storage: &PlatformCounts,
    derived_suffix: &str,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (platform, _) in catalog.iter() {
        let Some(base) = platform
            .strip_suffix(derived_suffix)
            .filter(|base| !base.is_empty())
        else {
            continue;
        };

        if !catalog.contains(base) {
            findings.push(Finding::MissingBasePlatform {
                platform: platform.to_string(),
                base: base.to_string(),
            });
            continue;
        }

        for (namespace, counts) in [(Namespace::Catalog, catalog), (Namespace::Storage, storage)] {
            let derived_count = counts.count(platform);
            let base_count = counts.count(base);
            if derived_count != base_count {
                findings.push(Finding::DerivedCountMismatch {
                    platform: platform.to_string(),
                    base: base.to_string(),
                    namespace,
                    derived_count,
                    base_count,
                });
            }
        }
    }

    findings
}
