//! eoaudit - consistency audit for an EO archive
//!
//! Builds an inventory of the raw object store and reconciles it against the
//! STAC catalog namespace and the datacube index.

pub mod audit;
pub mod config;
pub mod error;
pub mod inventory;
pub mod overview;
pub mod reconcile;

pub use audit::{AuditReport, AuditSettings, Auditor, CheckOutcome, CheckStatus};
pub use config::{AuditConfig, Conventions, Overrides};
pub use error::{AuditError, Result};
pub use inventory::{FileRecord, Inventory, InventoryStore, Scene};
pub use overview::{build_inventory, BuildOptions, BuildStats};
pub use reconcile::{Accumulation, CheckKind, Finding, Severity};
