//! Durable storage for the inventory snapshot.

use super::Inventory;
use crate::error::{AuditError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads and writes the snapshot as a JSON document.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the snapshot, replacing any previous one.
    ///
    /// The document is written next to the target and renamed into place so
    /// a reader never sees a half-written snapshot.
    pub fn save(&self, inventory: &Inventory) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_vec(inventory).map_err(|source| AuditError::InventoryCorrupt {
            path: self.path.clone(),
            source,
        })?;
        let staging = self.staging_path();
        fs::write(&staging, payload)?;
        fs::rename(&staging, &self.path)?;

        info!(
            path = %self.path.display(),
            platforms = inventory.platform_count(),
            scenes = inventory.scene_count(),
            "Inventory saved"
        );
        Ok(())
    }

    /// Load the snapshot.
    ///
    /// A missing file is reported as [`AuditError::InventoryMissing`] so the
    /// caller can tell the operator to rebuild.
    pub fn load(&self) -> Result<Inventory> {
        let payload = match fs::read(&self.path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(AuditError::InventoryMissing {
                    path: self.path.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&payload).map_err(|source| AuditError::InventoryCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "overview.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{FileRecord, Scene};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample() -> Inventory {
        let ts = NaiveDate::from_ymd_opt(2020, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        Inventory::new()
            .with_platform(
                "sentinel_1",
                vec![Scene {
                    prefix: "raw/sentinel_1/S1A_x/".to_string(),
                    item_count: 2,
                    url: "https://browse/?prefix=raw/sentinel_1/S1A_x/".to_string(),
                    contents: vec![
                        FileRecord::new("raw/sentinel_1/S1A_x/vv.tif", 5000, ts),
                        FileRecord::new("raw/sentinel_1/S1A_x/datacube-metadata.yaml", 300, ts),
                    ],
                }],
            )
            .with_platform("modis", vec![])
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = InventoryStore::new(temp.path().join("nested").join("overview.json"));
        let inventory = sample();

        store.save(&inventory).unwrap();
        assert!(store.exists());
        assert!(!temp.path().join("nested").join("overview.json.tmp").exists());
        assert_eq!(store.load().unwrap(), inventory);
    }

    #[test]
    fn test_missing_snapshot_is_a_precondition_error() {
        let temp = TempDir::new().unwrap();
        let store = InventoryStore::new(temp.path().join("overview.json"));

        match store.load() {
            Err(AuditError::InventoryMissing { path }) => {
                assert_eq!(path, temp.path().join("overview.json"))
            }
            other => panic!("expected InventoryMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("overview.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = InventoryStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AuditError::InventoryCorrupt { .. }));
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = InventoryStore::new(temp.path().join("overview.json"));

        store.save(&sample()).unwrap();
        store.save(&Inventory::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
