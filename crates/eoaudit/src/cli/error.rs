//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use eoaudit::AuditError;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// No inventory snapshot has been built
    pub fn inventory_missing(path: &Path) -> Self {
        Self::new(format!("Inventory not found: {}", path.display()))
            .with_context("Checks read the inventory snapshot written by the build step")
            .with_suggestions([
                "TRY: eoaudit build   # Walk the object store and write the inventory".to_string(),
                "TRY: Point at an existing snapshot: eoaudit check --inventory <path>".to_string(),
            ])
    }

    /// Snapshot exists but cannot be parsed
    pub fn inventory_corrupt(path: &Path, details: &str) -> Self {
        Self::new(format!("Inventory is unreadable: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: eoaudit build   # Rebuild the inventory".to_string(),
                format!("TRY: Inspect the file: head -c 400 {}", path.display()),
            ])
    }

    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Config file not found: {}", path.display()))
            .with_context("The file passed with --config does not exist")
            .with_suggestions([
                "TRY: Drop --config to use defaults and environment variables".to_string(),
                "TRY: eoaudit config   # Show the resolved configuration".to_string(),
            ])
    }

    pub fn invalid_config(details: &str) -> Self {
        Self::new("Invalid configuration")
            .with_context(details.to_string())
            .with_suggestion("TRY: eoaudit config   # Show the resolved configuration")
    }

    /// Some platforms could not be listed
    pub fn incomplete_build(platforms: &[String]) -> Self {
        Self::new(format!(
            "Inventory build incomplete: {} platform(s) failed to list",
            platforms.len()
        ))
        .with_context(format!("Failed platforms: {}", platforms.join(", ")))
        .with_suggestions([
            "TRY: Re-run with --verbose to see the listing errors".to_string(),
            "TRY: Check credentials and endpoint: eoaudit config".to_string(),
        ])
    }

    pub fn cancelled() -> Self {
        Self::new("Interrupted").with_context("Nothing was written")
    }
}

/// Operator-facing explanation for the audit errors that have one.
pub fn helpful_for(err: &AuditError) -> Option<HelpfulError> {
    match err {
        AuditError::InventoryMissing { path } => Some(HelpfulError::inventory_missing(path)),
        AuditError::InventoryCorrupt { path, source } => {
            Some(HelpfulError::inventory_corrupt(path, &source.to_string()))
        }
        AuditError::Config(details) => Some(HelpfulError::invalid_config(details)),
        AuditError::Cancelled => Some(HelpfulError::cancelled()),
        _ => None,
    }
}

/// Turn well-known audit errors into operator-facing ones.
pub fn explain(err: anyhow::Error) -> anyhow::Error {
    match err.downcast_ref::<AuditError>().and_then(helpful_for) {
        Some(helpful) => helpful.into(),
        None => err,
    }
}

/// Print an error as a JSON object on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    let payload = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({
            "error": helpful.message,
            "context": helpful.context,
            "suggestions": helpful.suggestions,
        }),
        None => serde_json::json!({
            "error": err.to_string(),
            "chain": err.chain().skip(1).map(|c| c.to_string()).collect::<Vec<_>>(),
        }),
    };
    println!("{}", payload);
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ref ctx) = self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
