//! Inventory rendering: table, JSON or YAML

use crate::provider::{Inventory, Warning};
use crate::resource::Resource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Widest a table cell may grow before truncation
const MAX_COLUMN_WIDTH: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Structured document emitted for JSON and YAML
#[derive(Debug, Serialize)]
pub struct InventoryDocument<'a> {
    pub resources: &'a [Resource],
    pub total: usize,
    #[serde(skip_serializing_if = "no_warnings")]
    pub warnings: &'a [Warning],
    pub timestamp: DateTime<Utc>,
}

fn no_warnings(warnings: &&[Warning]) -> bool {
    warnings.is_empty()
}

impl<'a> InventoryDocument<'a> {
    pub fn new(inventory: &'a Inventory) -> Self {
        Self {
            resources: &inventory.resources,
            total: inventory.resources.len(),
            warnings: &inventory.warnings,
            timestamp: Utc::now(),
        }
    }
}

/// Write `inventory` to `out` in the requested format
pub fn render(inventory: &Inventory, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &InventoryDocument::new(inventory))?;
            writeln!(out)?;
        }
        OutputFormat::Yaml => {
            serde_yaml::to_writer(&mut *out, &InventoryDocument::new(inventory))?;
        }
        OutputFormat::Table => render_table(&inventory.resources, out)?,
    }
    Ok(())
}

const HEADERS: [&str; 7] = ["ID", "NAME", "KIND", "REGION", "STATE", "HEALTH", "CREATED"];

fn row(resource: &Resource) -> [String; 7] {
    [
        resource.id.clone(),
        resource.name.clone(),
        resource.kind.to_string(),
        resource.region.clone(),
        resource.status.state.clone(),
        resource.status.health.to_string(),
        resource.created_at.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

fn render_table(resources: &[Resource], out: &mut impl Write) -> Result<()> {
    if resources.is_empty() {
        writeln!(out, "No resources found")?;
        return Ok(());
    }

    let rows: Vec<[String; 7]> = resources.iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells.iter()) {
            *width = (*width).max(cell.chars().count()).min(MAX_COLUMN_WIDTH);
        }
    }

    write_row(out, &HEADERS.map(str::to_string), &widths)?;
    let separator = widths.map(|w| "-".repeat(w));
    write_row(out, &separator, &widths)?;
    for cells in &rows {
        write_row(out, cells, &widths)?;
    }

    writeln!(out)?;
    writeln!(out, "Found {} resource{}", resources.len(), plural(resources.len()))?;
    Ok(())
}

fn write_row(out: &mut impl Write, cells: &[String; 7], widths: &[usize; 7]) -> Result<()> {
    let line = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", truncate(cell, *width), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

/// Truncate to `width` characters, marking the cut with "..."
fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let keep = width.saturating_sub(3);
    format!("{}...", value.chars().take(keep).collect::<String>())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
