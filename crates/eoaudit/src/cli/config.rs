//! `eoaudit config`: print the resolved configuration.

use anyhow::Result;
use eoaudit::AuditConfig;
use eoaudit_db::redact_url;

const MASK: &str = "***";

#[derive(Debug)]
pub struct ConfigArgs {
    pub json: bool,
}

/// Copy of the configuration safe to print.
pub fn masked(config: &AuditConfig) -> AuditConfig {
    let mut shown = config.clone();
    if shown.storage.secret_access_key.is_some() {
        shown.storage.secret_access_key = Some(MASK.to_string());
    }
    shown.database.url = redact_url(&shown.database.url);
    shown
}

pub fn run(args: ConfigArgs, config: AuditConfig) -> Result<u8> {
    let shown = masked(&config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        print!("{}", toml::to_string_pretty(&shown)?);
    }
    Ok(0)
}
