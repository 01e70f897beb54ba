//! `eoaudit summary`: per-platform totals from the inventory.

use super::output::{format_size, print_table};
use anyhow::Result;
use eoaudit::{AuditConfig, Inventory};
use serde::Serialize;

#[derive(Debug)]
pub struct SummaryArgs {
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformSummary {
    pub platform: String,
    pub scenes: usize,
    pub objects: usize,
    pub bytes: u64,
}

pub fn summarize(inventory: &Inventory) -> Vec<PlatformSummary> {
    inventory
        .platforms()
        .map(|(platform, scenes)| PlatformSummary {
            platform: platform.to_string(),
            scenes: scenes.len(),
            objects: scenes.iter().map(|s| s.contents.len()).sum(),
            bytes: scenes.iter().map(|s| s.total_size()).sum(),
        })
        .collect()
}

pub fn run(args: SummaryArgs, config: AuditConfig) -> Result<u8> {
    let inventory = super::inventory_store(&config).load()?;
    let rows = summarize(&inventory);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(0);
    }

    if rows.is_empty() {
        println!("Inventory is empty.");
        return Ok(0);
    }

    let mut table_rows: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.platform.clone(),
                r.scenes.to_string(),
                r.objects.to_string(),
                format_size(r.bytes),
            ]
        })
        .collect();
    table_rows.push(vec![
        "TOTAL".to_string(),
        inventory.scene_count().to_string(),
        inventory.file_count().to_string(),
        format_size(rows.iter().map(|r| r.bytes).sum()),
    ]);
    print_table(&["PLATFORM", "SCENES", "OBJECTS", "SIZE"], table_rows);
    Ok(0)
}
