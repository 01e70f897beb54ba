//! `eoaudit build`: walk the object store and write the inventory.

use super::error::HelpfulError;
use super::output::format_size;
use anyhow::Result;
use eoaudit::{build_inventory, AuditConfig, BuildOptions, BuildStats};
use eoaudit_store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug)]
pub struct BuildArgs {
    pub json: bool,
}

pub fn run(args: BuildArgs, config: AuditConfig) -> Result<u8> {
    super::block_on_cancellable(|cancel| async move {
        let store = super::open_store(&config).await?;
        build_and_save(&store, &config, &cancel, args.json).await
    })
}

/// Build from `store` and save to the configured inventory path.
///
/// The snapshot is written even when some platforms failed, so the checks
/// can still run on what was listed; the command then exits 1.
pub async fn build_and_save(
    store: &dyn ObjectStore,
    config: &AuditConfig,
    cancel: &CancellationToken,
    json: bool,
) -> Result<u8> {
    let options = BuildOptions::new(&config.storage.raw_prefix, &config.storage.browse_url);
    let (inventory, stats) = build_inventory(store, &options, cancel).await?;

    let target = super::inventory_store(config);
    target.save(&inventory)?;
    info!(path = %target.path().display(), "Build finished");

    if json {
        let payload = serde_json::json!({
            "inventory": target.path(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_stats(&stats, &target.path().display().to_string());
    }

    if stats.is_complete() {
        Ok(0)
    } else {
        let err = HelpfulError::incomplete_build(&stats.failed_platforms);
        eprint!("{}", err);
        Ok(1)
    }
}

fn print_stats(stats: &BuildStats, path: &str) {
    println!("Inventory written to {}", path);
    println!("  Platforms: {}", stats.platforms);
    println!("  Scenes:    {}", stats.scenes);
    println!("  Objects:   {}", stats.objects);
    println!("  Size:      {}", format_size(stats.bytes));
    println!("  Pages:     {}", stats.pages);
}
