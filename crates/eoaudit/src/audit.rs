//! Audit runner.
//!
//! Runs a selection of checks against one loaded [`Inventory`], fetching the
//! live counts the count checks need from the object store and datacube index.
//! Each check is isolated: a failure is recorded in its [`CheckOutcome`] and
//! the next check still runs.

use crate::config::Conventions;
use crate::error::{AuditError, Result};
use crate::inventory::{last_segment, Inventory};
use crate::reconcile::{
    check_anomalies, check_database_counts, check_derived_counts, check_empty_files,
    check_error_logs, check_metadata, check_small_rasters, check_storage_catalog_counts,
    largest_files, smallest_files, total_sizes, Accumulation, AnomalyRules, CheckKind, Finding,
    PlatformCounts, RegisteredProduct,
};
use eoaudit_db::DatacubeIndex;
use eoaudit_store::{list_common_prefixes, ObjectStore};
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Count sub-prefixes of every platform under `prefix`.
pub async fn collect_namespace_counts(
    store: &dyn ObjectStore,
    prefix: &str,
    delimiter: &str,
    cancel: &CancellationToken,
) -> Result<PlatformCounts> {
    let platforms = list_common_prefixes(store, prefix, delimiter, cancel)
        .await
        .map_err(AuditError::from_store)?;

    let mut counts = PlatformCounts::new();
    for platform_prefix in platforms {
        let children = list_common_prefixes(store, &platform_prefix, delimiter, cancel)
            .await
            .map_err(AuditError::from_store)?;
        counts.insert(last_segment(&platform_prefix), children.len());
    }
    debug!(prefix, platforms = counts.len(), "Collected namespace counts");
    Ok(counts)
}

/// Count sub-prefixes of the named platforms under `prefix`.
///
/// A platform with nothing under it counts as zero.
pub async fn collect_platform_counts<'n>(
    store: &dyn ObjectStore,
    prefix: &str,
    delimiter: &str,
    platforms: impl IntoIterator<Item = &'n str>,
    cancel: &CancellationToken,
) -> Result<PlatformCounts> {
    let mut counts = PlatformCounts::new();
    for platform in platforms {
        let platform_prefix = format!("{}{}{}", prefix, platform, delimiter);
        let children = list_common_prefixes(store, &platform_prefix, delimiter, cancel)
            .await
            .map_err(AuditError::from_store)?;
        counts.insert(platform, children.len());
    }
    Ok(counts)
}

/// What an audit compares against.
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub raw_prefix: String,
    pub catalog_prefix: String,
    pub delimiter: String,
    pub conventions: Conventions,
    pub accumulation: Accumulation,
}

impl AuditSettings {
    pub fn new(raw_prefix: impl Into<String>, catalog_prefix: impl Into<String>) -> Self {
        Self {
            raw_prefix: raw_prefix.into(),
            catalog_prefix: catalog_prefix.into(),
            delimiter: "/".to_string(),
            conventions: Conventions::default(),
            accumulation: Accumulation::default(),
        }
    }

    pub fn with_conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }
}

/// Result of one check.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    Completed,
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub check: CheckKind,
    #[serde(flatten)]
    pub status: CheckStatus,
    pub findings: Vec<Finding>,
    pub elapsed_ms: u64,
}

impl CheckOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, CheckStatus::Skipped { .. })
    }

    pub fn discrepancies(&self) -> usize {
        self.findings.iter().filter(|f| f.is_discrepancy()).count()
    }
}

/// All outcomes of one run, in the order the checks ran.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl AuditReport {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.outcomes.iter().flat_map(|o| o.findings.iter())
    }

    pub fn discrepancy_count(&self) -> usize {
        self.outcomes.iter().map(CheckOutcome::discrepancies).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// 1 when any check failed, 2 when discrepancies were found, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.failed_count() > 0 {
            1
        } else if self.discrepancy_count() > 0 {
            2
        } else {
            0
        }
    }
}

/// Live counts for the catalog and raw namespaces, fetched once per run.
#[derive(Debug, Clone)]
struct LiveCounts {
    catalog: PlatformCounts,
    storage: PlatformCounts,
}

/// Runs checks against one inventory.
pub struct Auditor<'a> {
    inventory: &'a Inventory,
    settings: AuditSettings,
    store: Option<&'a dyn ObjectStore>,
    index: Option<&'a dyn DatacubeIndex>,
    store_error: Option<String>,
    index_error: Option<String>,
    cancel: CancellationToken,
    live_counts: Option<LiveCounts>,
}

fn missing(what: &'static str, error: &Option<String>) -> AuditError {
    match error {
        Some(error) => AuditError::CollaboratorFailed {
            what,
            error: error.clone(),
        },
        None => AuditError::Unavailable(what),
    }
}

impl<'a> Auditor<'a> {
    pub fn new(inventory: &'a Inventory, settings: AuditSettings) -> Self {
        Self {
            inventory,
            settings,
            store: None,
            index: None,
            store_error: None,
            index_error: None,
            cancel: CancellationToken::new(),
            live_counts: None,
        }
    }

    pub fn with_store(mut self, store: &'a dyn ObjectStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_index(mut self, index: &'a dyn DatacubeIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// The object store client failed to open; checks that need it fail
    /// with `error` instead of being skipped.
    pub fn with_store_error(mut self, error: impl Into<String>) -> Self {
        self.store_error = Some(error.into());
        self
    }

    pub fn with_index_error(mut self, error: impl Into<String>) -> Self {
        self.index_error = Some(error.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `checks` in order. Once cancelled, the remaining checks are
    /// skipped.
    pub async fn run(&mut self, checks: &[CheckKind]) -> AuditReport {
        let mut report = AuditReport::default();

        for &check in checks {
            let started = Instant::now();
            let (status, findings) = if self.cancel.is_cancelled() {
                (
                    CheckStatus::Skipped {
                        reason: "audit cancelled".to_string(),
                    },
                    Vec::new(),
                )
            } else {
                match self.run_check(check).await {
                    Ok(findings) => (CheckStatus::Completed, findings),
                    Err(AuditError::Unavailable(what)) => {
                        debug!(check = %check, what, "Check skipped");
                        (
                            CheckStatus::Skipped {
                                reason: format!("{} not available", what),
                            },
                            Vec::new(),
                        )
                    }
                    Err(err) => {
                        warn!(check = %check, error = %err, "Check failed");
                        (
                            CheckStatus::Failed {
                                error: err.to_string(),
                            },
                            Vec::new(),
                        )
                    }
                }
            };

            let outcome = CheckOutcome {
                check,
                status,
                findings,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                check = %check,
                findings = outcome.findings.len(),
                discrepancies = outcome.discrepancies(),
                elapsed_ms = outcome.elapsed_ms,
                "Check finished"
            );
            report.outcomes.push(outcome);
        }

        report
    }

    /// Run a single check.
    pub async fn run_check(&mut self, check: CheckKind) -> Result<Vec<Finding>> {
        match check {
            CheckKind::StorageCatalogCount => {
                let live = self.live_counts().await?;
                Ok(check_storage_catalog_counts(&live.catalog, &live.storage))
            }
            CheckKind::DerivedCount => {
                let suffix = self.settings.conventions.derived_suffix.clone();
                let live = self.live_counts().await?;
                Ok(check_derived_counts(&live.catalog, &live.storage, &suffix))
            }
            CheckKind::DatabaseCount => {
                let products = self.registered_products().await?;
                Ok(check_database_counts(self.inventory, &products))
            }
            offline => self.run_offline(offline),
        }
    }

    fn run_offline(&self, check: CheckKind) -> Result<Vec<Finding>> {
        let inventory = self.inventory;
        let conventions = &self.settings.conventions;
        let accumulation = self.settings.accumulation;

        let findings = match check {
            CheckKind::StorageCatalogCount | CheckKind::DerivedCount | CheckKind::DatabaseCount => {
                return Err(AuditError::Unavailable("live sources"))
            }
            CheckKind::LargestFile => largest_files(inventory, accumulation),
            CheckKind::SmallestFile => smallest_files(inventory, accumulation),
            CheckKind::TotalSize => total_sizes(inventory, accumulation),
            CheckKind::Metadata => check_metadata(inventory, &conventions.metadata_file),
            CheckKind::ErrorLog => check_error_logs(inventory, &conventions.log_files),
            CheckKind::Anomalies => {
                let rules = AnomalyRules::from_conventions(conventions)?;
                check_anomalies(inventory, &rules)
            }
            CheckKind::SmallRaster => check_small_rasters(
                inventory,
                &conventions.raster_extension,
                conventions.min_raster_size,
            ),
            CheckKind::EmptyFile => check_empty_files(inventory),
        };
        Ok(findings)
    }

    async fn live_counts(&mut self) -> Result<&LiveCounts> {
        if self.live_counts.is_none() {
            let store = self
                .store
                .ok_or_else(|| missing("object store", &self.store_error))?;
            let settings = &self.settings;

            let catalog = collect_namespace_counts(
                store,
                &settings.catalog_prefix,
                &settings.delimiter,
                &self.cancel,
            )
            .await?;
            let storage = collect_platform_counts(
                store,
                &settings.raw_prefix,
                &settings.delimiter,
                catalog.iter().map(|(name, _)| name),
                &self.cancel,
            )
            .await?;
            self.live_counts = Some(LiveCounts { catalog, storage });
        }
        self.live_counts
            .as_ref()
            .ok_or(AuditError::Unavailable("live counts"))
    }

    async fn registered_products(&self) -> Result<Vec<RegisteredProduct>> {
        let index = self
            .index
            .ok_or_else(|| missing("datacube index", &self.index_error))?;

        let mut products = Vec::new();
        for dataset_type in index.list_registered_types().await? {
            if self.cancel.is_cancelled() {
                return Err(AuditError::Cancelled);
            }
            let rows = index.count_rows(dataset_type.id).await?;
            products.push(RegisteredProduct::new(dataset_type.name, rows));
        }
        Ok(products)
    }
}
