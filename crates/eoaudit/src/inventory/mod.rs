//! Inventory snapshot of the raw archive.
//!
//! One [`Inventory`] is built per audit run by the overview builder and then
//! only read. It maps platform name to the scenes found under that platform,
//! in storage listing order.

mod store;

pub use store::InventoryStore;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use eoaudit_store::ObjectEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamp layout used in the snapshot document.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// One object under a scene prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "Key")]
    pub key: String,
    /// UTC, second precision
    #[serde(rename = "LastModified", with = "timestamp")]
    pub last_modified: NaiveDateTime,
    #[serde(rename = "Size")]
    pub size: u64,
}

impl FileRecord {
    pub fn new(key: impl Into<String>, size: u64, last_modified: NaiveDateTime) -> Self {
        Self {
            key: key.into(),
            last_modified: last_modified.trunc_subsecs(0),
            size,
        }
    }
}

impl From<&ObjectEntry> for FileRecord {
    fn from(entry: &ObjectEntry) -> Self {
        Self::new(entry.key.clone(), entry.size, entry.last_modified.naive_utc())
    }
}

/// One scene: a prefix under a platform and every object beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Full storage prefix, ending with the delimiter
    pub prefix: String,
    pub item_count: usize,
    /// Human-browsable link to the prefix
    pub url: String,
    pub contents: Vec<FileRecord>,
}

impl Scene {
    /// The scene's own name: the last non-empty segment of its prefix.
    pub fn name(&self) -> &str {
        last_segment(&self.prefix)
    }

    pub fn total_size(&self) -> u64 {
        self.contents.iter().map(|f| f.size).sum()
    }
}

/// Last non-empty `/`-separated segment of a prefix.
///
/// `common_sensing/fiji/landsat8/` -> `landsat8`
pub fn last_segment(prefix: &str) -> &str {
    prefix
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Platform name -> scenes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    platforms: BTreeMap<String, Vec<Scene>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used while constructing a snapshot.
    pub fn with_platform(mut self, name: impl Into<String>, scenes: Vec<Scene>) -> Self {
        self.platforms.insert(name.into(), scenes);
        self
    }

    pub(crate) fn insert_platform(&mut self, name: String, scenes: Vec<Scene>) {
        self.platforms.insert(name, scenes);
    }

    /// Platforms in name order with their scenes.
    pub fn platforms(&self) -> impl Iterator<Item = (&str, &[Scene])> {
        self.platforms
            .iter()
            .map(|(name, scenes)| (name.as_str(), scenes.as_slice()))
    }

    pub fn platform_names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    pub fn scenes(&self, platform: &str) -> Option<&[Scene]> {
        self.platforms.get(platform).map(Vec::as_slice)
    }

    /// Scenes of the platform whose name equals `platform` ignoring case.
    ///
    /// An exact match wins over a case-folded one.
    pub fn scenes_ignore_case(&self, platform: &str) -> Option<&[Scene]> {
        if let Some(scenes) = self.scenes(platform) {
            return Some(scenes);
        }
        let wanted = platform.to_lowercase();
        self.platforms
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, scenes)| scenes.as_slice())
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    pub fn scene_count(&self) -> usize {
        self.platforms.values().map(Vec::len).sum()
    }

    pub fn file_count(&self) -> usize {
        self.platforms
            .values()
            .flatten()
            .map(|scene| scene.contents.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

impl FromIterator<(String, Vec<Scene>)> for Inventory {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Scene>)>>(iter: I) -> Self {
        Self {
            platforms: iter.into_iter().collect(),
        }
    }
}

/// Convert a listing timestamp to the snapshot's precision.
pub fn to_snapshot_time(time: DateTime<Utc>) -> NaiveDateTime {
    time.naive_utc().trunc_subsecs(0)
}

mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn scene(prefix: &str, files: &[(&str, u64)]) -> Scene {
        let ts = NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        let contents: Vec<_> = files
            .iter()
            .map(|(name, size)| FileRecord::new(format!("{prefix}{name}"), *size, ts))
            .collect();
        Scene {
            prefix: prefix.to_string(),
            item_count: contents.len(),
            url: format!("https://browse/?prefix={prefix}"),
            contents,
        }
    }

    #[test]
    fn test_file_record_json_shape() {
        let ts = NaiveDate::from_ymd_opt(2019, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let record = FileRecord::new("a/b/c.tif", 42, ts);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Key": "a/b/c.tif",
                "LastModified": "12/31/2019, 23:59:58",
                "Size": 42
            })
        );
    }

    #[test]
    fn test_snapshot_time_drops_subseconds() {
        let time = Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(987);
        let entry = ObjectEntry {
            key: "k".to_string(),
            size: 1,
            last_modified: time,
        };
        let record = FileRecord::from(&entry);
        assert_eq!(record.last_modified, to_snapshot_time(time));
        assert_eq!(
            record.last_modified.format(TIMESTAMP_FORMAT).to_string(),
            "01/02/2021, 03:04:05"
        );
    }

    #[test]
    fn test_inventory_reads_python_style_document() {
        let doc = r#"{
            "sentinel_2": [
                {
                    "prefix": "common_sensing/fiji/sentinel_2/S2A_1/",
                    "item_count": 1,
                    "url": "https://example/index.html?prefix=common_sensing/fiji/sentinel_2/S2A_1/",
                    "contents": [
                        {"Key": "common_sensing/fiji/sentinel_2/S2A_1/datacube-metadata.yaml",
                         "LastModified": "03/15/2020, 08:00:01", "Size": 1024}
                    ]
                }
            ],
            "empty_platform": []
        }"#;
        let inventory: Inventory = serde_json::from_str(doc).unwrap();

        assert_eq!(inventory.platform_count(), 2);
        assert_eq!(inventory.scenes("empty_platform").unwrap().len(), 0);
        let scenes = inventory.scenes("sentinel_2").unwrap();
        assert_eq!(scenes[0].name(), "S2A_1");
        assert_eq!(scenes[0].contents[0].size, 1024);
    }

    #[test]
    fn test_scenes_ignore_case() {
        let inventory = Inventory::new()
            .with_platform("Sentinel_2", vec![scene("raw/Sentinel_2/a/", &[("x.tif", 1)])])
            .with_platform("landsat8", vec![]);

        assert_eq!(inventory.scenes_ignore_case("sentinel_2").unwrap().len(), 1);
        assert_eq!(inventory.scenes_ignore_case("LANDSAT8").unwrap().len(), 0);
        assert!(inventory.scenes_ignore_case("modis").is_none());
    }

    #[test]
    fn test_counts() {
        let inventory = Inventory::new()
            .with_platform(
                "s2",
                vec![
                    scene("raw/s2/a/", &[("x.tif", 10), ("y.tif", 20)]),
                    scene("raw/s2/b/", &[("x.tif", 5)]),
                ],
            )
            .with_platform("s1", vec![]);

        assert_eq!(inventory.platform_count(), 2);
        assert_eq!(inventory.scene_count(), 2);
        assert_eq!(inventory.file_count(), 3);
        assert_eq!(inventory.scenes("s2").unwrap()[0].total_size(), 30);
        let names: Vec<_> = inventory.platform_names().collect();
        assert_eq!(names, vec!["s1", "s2"]);
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("common_sensing/fiji/landsat8/"), "landsat8");
        assert_eq!(last_segment("landsat8"), "landsat8");
        assert_eq!(last_segment(""), "");
    }
}
