//! Overview builder: walks `<root>/<platform>/<scene>/...` into an [`Inventory`].

use crate::error::{AuditError, Result};
use crate::inventory::{last_segment, FileRecord, Inventory, Scene};
use eoaudit_store::{list_common_prefixes, list_objects, ObjectStore, StoreError};
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where and how to walk.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Prefix whose immediate children are platforms, ending with the delimiter
    pub root_prefix: String,
    /// Scene URLs are this base followed by the scene prefix
    pub browse_url: String,
    pub delimiter: String,
}

impl BuildOptions {
    pub fn new(root_prefix: impl Into<String>, browse_url: impl Into<String>) -> Self {
        Self {
            root_prefix: root_prefix.into(),
            browse_url: browse_url.into(),
            delimiter: "/".to_string(),
        }
    }
}

/// Totals gathered while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub platforms: usize,
    pub scenes: usize,
    pub objects: usize,
    pub bytes: u64,
    /// Listing pages fetched for scene contents
    pub pages: usize,
    /// Platforms left out because their listing failed
    pub failed_platforms: Vec<String>,
}

impl BuildStats {
    pub fn is_complete(&self) -> bool {
        self.failed_platforms.is_empty()
    }
}

/// Walk the store and build a fresh inventory.
///
/// A platform whose listing fails after retries is left out of the inventory
/// and named in [`BuildStats::failed_platforms`]; the remaining platforms are
/// still walked. Failing to list the platforms themselves, or cancellation,
/// aborts the build.
pub async fn build_inventory<S: ObjectStore + ?Sized>(
    store: &S,
    options: &BuildOptions,
    cancel: &CancellationToken,
) -> Result<(Inventory, BuildStats)> {
    let started = Instant::now();
    info!(
        bucket = store.bucket(),
        prefix = %options.root_prefix,
        "Building inventory"
    );

    let platform_prefixes =
        list_common_prefixes(store, &options.root_prefix, &options.delimiter, cancel)
            .await
            .map_err(AuditError::from_store)?;

    let mut inventory = Inventory::new();
    let mut stats = BuildStats::default();

    for platform_prefix in platform_prefixes {
        if cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        let name = last_segment(&platform_prefix).to_string();

        match build_platform(store, options, &platform_prefix, cancel, &mut stats).await {
            Ok(scenes) => {
                debug!(platform = %name, scenes = scenes.len(), "Platform listed");
                stats.platforms += 1;
                inventory.insert_platform(name, scenes);
            }
            Err(StoreError::Cancelled) => return Err(AuditError::Cancelled),
            Err(err) => {
                warn!(platform = %name, error = %err, "Skipping platform after listing failure");
                stats.failed_platforms.push(name);
            }
        }
    }

    info!(
        platforms = stats.platforms,
        scenes = stats.scenes,
        objects = stats.objects,
        bytes = stats.bytes,
        pages = stats.pages,
        failed = stats.failed_platforms.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Inventory built"
    );
    Ok((inventory, stats))
}

async fn build_platform<S: ObjectStore + ?Sized>(
    store: &S,
    options: &BuildOptions,
    platform_prefix: &str,
    cancel: &CancellationToken,
    stats: &mut BuildStats,
) -> eoaudit_store::Result<Vec<Scene>> {
    let scene_prefixes =
        list_common_prefixes(store, platform_prefix, &options.delimiter, cancel).await?;

    let mut scenes = Vec::with_capacity(scene_prefixes.len());
    let mut platform_stats = BuildStats::default();
    for prefix in scene_prefixes {
        let scene = build_scene(store, options, prefix, cancel, &mut platform_stats).await?;
        scenes.push(scene);
    }

    // Only count platforms that made it into the inventory.
    stats.scenes += scenes.len();
    stats.objects += platform_stats.objects;
    stats.bytes += platform_stats.bytes;
    stats.pages += platform_stats.pages;
    Ok(scenes)
}

async fn build_scene<S: ObjectStore + ?Sized>(
    store: &S,
    options: &BuildOptions,
    prefix: String,
    cancel: &CancellationToken,
    stats: &mut BuildStats,
) -> eoaudit_store::Result<Scene> {
    let mut pages = list_objects(store, &prefix, cancel);
    let mut contents = Vec::new();
    while let Some(page) = pages.next_page().await? {
        contents.extend(page.iter().map(FileRecord::from));
    }

    stats.pages += pages.pages_read();
    stats.objects += contents.len();
    stats.bytes += contents.iter().map(|f| f.size).sum::<u64>();

    Ok(Scene {
        url: format!("{}{}", options.browse_url, prefix),
        item_count: contents.len(),
        prefix,
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eoaudit_store::{ListPage, ListRequest, MemoryStore};

    fn store() -> MemoryStore {
        let ts = Utc.with_ymd_and_hms(2020, 5, 6, 7, 8, 9).unwrap();
        MemoryStore::new("bucket")
            .with_page_size(2)
            .with_object("raw/s2/A/A_B04.tif", 5000, ts)
            .with_object("raw/s2/A/datacube-metadata.yaml", 300, ts)
            .with_object("raw/s2/A/A_B08.tif", 5000, ts)
            .with_object("raw/s2/B/datacube-metadata.yaml", 300, ts)
            .with_object("raw/s1/C/vv.tif", 10, ts)
            .with_object("raw/empty_platform", 1, ts)
    }

    fn options() -> BuildOptions {
        BuildOptions::new("raw/", "https://browse/?prefix=")
    }

    #[tokio::test]
    async fn test_builds_two_level_hierarchy() {
        let (inventory, stats) = build_inventory(&store(), &options(), &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<_> = inventory.platform_names().collect();
        assert_eq!(names, vec!["s1", "s2"]);

        let s2 = inventory.scenes("s2").unwrap();
        assert_eq!(s2.len(), 2);
        assert_eq!(s2[0].prefix, "raw/s2/A/");
        assert_eq!(s2[0].url, "https://browse/?prefix=raw/s2/A/");
        // Three objects over two pages: nothing from the first page is lost.
        assert_eq!(s2[0].item_count, 3);
        assert_eq!(s2[0].contents.len(), 3);
        assert_eq!(s2[0].contents[0].key, "raw/s2/A/A_B04.tif");

        assert_eq!(stats.platforms, 2);
        assert_eq!(stats.scenes, 3);
        assert_eq!(stats.objects, 5);
        assert_eq!(stats.bytes, 10610);
        assert!(stats.is_complete());
    }

    /// Reports an empty scene prefix that lists no pages of objects.
    struct PhantomScene;

    #[async_trait::async_trait]
    impl ObjectStore for PhantomScene {
        fn bucket(&self) -> &str {
            "phantom"
        }

        async fn list_page(&self, request: &ListRequest) -> eoaudit_store::Result<ListPage> {
            let common_prefixes = match (request.prefix.as_str(), request.delimiter.is_some()) {
                ("raw/", true) => vec!["raw/p/".to_string()],
                ("raw/p/", true) => vec!["raw/p/ghost/".to_string()],
                _ => vec![],
            };
            Ok(ListPage {
                common_prefixes,
                ..ListPage::default()
            })
        }
    }

    #[tokio::test]
    async fn test_scene_without_objects_is_empty_not_an_error() {
        let (inventory, _) = build_inventory(&PhantomScene, &options(), &CancellationToken::new())
            .await
            .unwrap();
        let scenes = inventory.scenes("p").unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].item_count, 0);
        assert!(scenes[0].contents.is_empty());
    }

    #[tokio::test]
    async fn test_platform_without_scenes_is_present() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryStore::new("bucket").with_object("raw/lonely/readme.txt", 1, ts);
        let (inventory, _) = build_inventory(&store, &options(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(inventory.scenes("lonely"), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_failed_platform_is_skipped() {
        let store = store();
        store.break_prefix("raw/s1/");
        let (inventory, stats) = build_inventory(&store, &options(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(inventory.scenes("s1").is_none());
        assert_eq!(inventory.scenes("s2").unwrap().len(), 2);
        assert_eq!(stats.failed_platforms, vec!["s1".to_string()]);
        assert_eq!(stats.scenes, 2);
        assert!(!stats.is_complete());
    }

    #[tokio::test]
    async fn test_cancelled_build() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = build_inventory(&store(), &options(), &cancel).await.unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
    }
}
