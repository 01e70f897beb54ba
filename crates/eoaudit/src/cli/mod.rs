//! CLI module for eoaudit
//!
//! Shared plumbing for the subcommands: resolving configuration from file,
//! flags and environment, opening the object store and datacube index, and
//! running async work on a single-threaded runtime.

pub mod build;
pub mod check;
pub mod config;
pub mod error;
pub mod output;
pub mod summary;

use anyhow::{Context, Result};
use eoaudit::{AuditConfig, InventoryStore, Overrides};
use eoaudit_db::PgDatacubeIndex;
use eoaudit_store::{RetryingStore, S3Settings, S3Store};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use error::HelpfulError;

/// Connection settings accepted on the command line or from the environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Object store endpoint URL
    #[arg(long, env = "S3_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Object store region
    #[arg(long, env = "S3_REGION", global = true)]
    pub region: Option<String>,

    /// Access key id (anonymous when unset)
    #[arg(long, env = "S3_ACCESS_KEY_ID", hide_env_values = true, global = true)]
    pub access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true, global = true)]
    pub secret_access_key: Option<String>,

    /// Bucket holding raw scenes and catalogs
    #[arg(long, env = "S3_BUCKET", global = true)]
    pub bucket: Option<String>,

    /// Prefix of the raw scene namespace
    #[arg(long, env = "S3_KEY", global = true)]
    pub raw_prefix: Option<String>,

    /// Prefix of the STAC catalog namespace
    #[arg(long, env = "S3_STAC_KEY", global = true)]
    pub catalog_prefix: Option<String>,

    /// Datacube index connection URL
    #[arg(long, env = "DATACUBE_DB_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,

    /// Inventory snapshot path
    #[arg(long, env = "EOAUDIT_INVENTORY", global = true)]
    pub inventory: Option<PathBuf>,
}

impl From<ConnectionArgs> for Overrides {
    fn from(args: ConnectionArgs) -> Self {
        Overrides {
            endpoint: args.endpoint,
            region: args.region,
            access_key_id: args.access_key_id,
            secret_access_key: args.secret_access_key,
            bucket: args.bucket,
            raw_prefix: args.raw_prefix,
            catalog_prefix: args.catalog_prefix,
            database_url: args.database_url,
            inventory_path: args.inventory,
        }
    }
}

/// Default config file: ~/.eoaudit/config.toml
pub fn default_config_path() -> PathBuf {
    eoaudit_logging::eoaudit_home().join("config.toml")
}

/// Resolve the configuration for this invocation.
///
/// An explicit `--config` must exist; the default file is optional.
pub fn resolve_config(explicit: Option<&Path>, connection: ConnectionArgs) -> Result<AuditConfig> {
    let base = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(HelpfulError::config_not_found(path).into());
            }
            AuditConfig::load(path)?
        }
        None => {
            let path = default_config_path();
            if path.is_file() {
                debug!(path = %path.display(), "Loading default config");
                AuditConfig::load(&path)?
            } else {
                AuditConfig::default()
            }
        }
    };
    Ok(base.apply(connection.into())?)
}

pub fn inventory_store(config: &AuditConfig) -> InventoryStore {
    InventoryStore::new(&config.inventory.path)
}

/// Open the object store with the configured retry policy.
pub async fn open_store(config: &AuditConfig) -> Result<RetryingStore<S3Store>> {
    let storage = &config.storage;
    let store = S3Store::connect(S3Settings {
        endpoint: storage.endpoint.clone(),
        region: storage.region.clone(),
        access_key_id: storage.access_key_id.clone(),
        secret_access_key: storage.secret_access_key.clone(),
        bucket: storage.bucket.clone(),
        force_path_style: storage.force_path_style,
    })
    .await
    .context("Failed to configure the object store client")?;
    Ok(RetryingStore::new(store, config.retry.clone()))
}

pub async fn open_index(config: &AuditConfig) -> Result<PgDatacubeIndex> {
    PgDatacubeIndex::connect(&config.database.url, config.retry.clone())
        .await
        .context("Failed to configure the datacube index client")
}

/// Run `work` on a current-thread runtime, cancelling `cancel` on Ctrl-C.
pub fn block_on_cancellable<F, Fut, T>(work: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                interrupt.cancel();
            }
        });
        work(cancel).await
    })
}
