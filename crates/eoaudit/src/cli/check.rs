//! `eoaudit check`: run reconciliation checks against the inventory.

use super::output::print_report;
use anyhow::Result;
use eoaudit::{
    Accumulation, AuditConfig, AuditReport, AuditSettings, Auditor, CheckKind, Inventory,
};
use eoaudit_db::DatacubeIndex;
use eoaudit_store::ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A collaborator client: `None` when no selected check needs it, `Err` with
/// the reason when it could not be opened.
pub type Opened<T> = Option<std::result::Result<T, String>>;

fn opened<T>(what: &str, result: anyhow::Result<T>) -> std::result::Result<T, String> {
    result.map_err(|err| {
        let error = format!("{:#}", err);
        warn!(what, error = %error, "Client could not be opened");
        error
    })
}

#[derive(Debug)]
pub struct CheckArgs {
    /// Checks to run; all when empty
    pub only: Vec<CheckKind>,
    /// Run only the checks that read nothing but the inventory
    pub skip_live: bool,
    pub cumulative: bool,
    pub json: bool,
}

impl CheckArgs {
    /// Checks in canonical order, deduplicated.
    pub fn selected(&self) -> Vec<CheckKind> {
        CheckKind::ALL
            .into_iter()
            .filter(|check| self.only.is_empty() || self.only.contains(check))
            .filter(|check| !self.skip_live || check.is_offline())
            .collect()
    }

    fn accumulation(&self) -> Accumulation {
        if self.cumulative {
            Accumulation::Cumulative
        } else {
            Accumulation::PerPlatform
        }
    }
}

pub fn run(args: CheckArgs, config: AuditConfig) -> Result<u8> {
    // Load first so a missing snapshot is reported before any connection.
    let inventory = super::inventory_store(&config).load()?;
    let checks = args.selected();
    info!(
        checks = checks.len(),
        platforms = inventory.platform_count(),
        "Running checks"
    );

    super::block_on_cancellable(|cancel| async move {
        let needs_store = checks.iter().any(CheckKind::needs_store);
        let needs_index = checks.iter().any(CheckKind::needs_database);

        // An unopenable client fails only the checks that need it.
        let store = if needs_store {
            Some(opened("object store", super::open_store(&config).await))
        } else {
            None
        };
        let index = if needs_index {
            Some(opened("datacube index", super::open_index(&config).await))
        } else {
            None
        };

        let report = run_checks(
            &inventory,
            &config,
            &args,
            &checks,
            store
                .as_ref()
                .map(|r| r.as_ref().map(|s| s as &dyn ObjectStore).map_err(Clone::clone)),
            index
                .as_ref()
                .map(|r| r.as_ref().map(|i| i as &dyn DatacubeIndex).map_err(Clone::clone)),
            cancel,
        )
        .await;
        emit(&report, args.json)?;
        Ok(report.exit_code())
    })
}

/// Run the selected checks with whatever collaborators are available.
pub async fn run_checks<'a>(
    inventory: &'a Inventory,
    config: &AuditConfig,
    args: &CheckArgs,
    checks: &[CheckKind],
    store: Opened<&'a dyn ObjectStore>,
    index: Opened<&'a dyn DatacubeIndex>,
    cancel: CancellationToken,
) -> AuditReport {
    let settings = AuditSettings::new(&config.storage.raw_prefix, &config.storage.catalog_prefix)
        .with_conventions(config.conventions.clone())
        .with_accumulation(args.accumulation());

    let mut auditor = Auditor::new(inventory, settings).with_cancel(cancel);
    match store {
        Some(Ok(store)) => auditor = auditor.with_store(store),
        Some(Err(error)) => auditor = auditor.with_store_error(error),
        None => {}
    }
    match index {
        Some(Ok(index)) => auditor = auditor.with_index(index),
        Some(Err(error)) => auditor = auditor.with_index_error(error),
        None => {}
    }
    auditor.run(checks).await
}

fn emit(report: &AuditReport, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::json!({
            "outcomes": report.outcomes,
            "discrepancies": report.discrepancy_count(),
            "failed_checks": report.failed_count(),
            "skipped_checks": report.skipped_count(),
            "exit_code": report.exit_code(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_report(report);
    }
    Ok(())
}
