//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_qme_eval::{MeasureCatalog, MeasureResult};
use octofhir_qme_types::Category;
use serde_json::Value;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::{Table, Tabled, settings::Style};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Table,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "table" => Self::Table,
            // "pretty", "json-pretty" and anything unknown
            _ => Self::JsonPretty,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display, including its causes
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

pub fn format_json(value: &Value, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Members")]
    members: String,
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Steward")]
    steward: String,
    #[tabled(rename = "Variants")]
    variants: String,
}

/// One row per category
pub fn result_table(result: &MeasureResult) -> String {
    let rows: Vec<CategoryRow> = Category::ALL
        .into_iter()
        .map(|category| CategoryRow {
            category: category.to_string(),
            count: result.summary.count(category),
            members: result
                .summary
                .members(category)
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// One row per measure id
pub fn catalog_table(catalog: &MeasureCatalog) -> String {
    if catalog.is_empty() {
        return "(no measures)".to_string();
    }
    let rows: Vec<CatalogRow> = catalog
        .values()
        .map(|entry| CatalogRow {
            id: entry.id.clone(),
            name: entry.name.clone(),
            steward: entry.steward.clone(),
            variants: entry
                .variants
                .iter()
                .map(|v| format!("{} ({})", v.sub_id, v.subtitle))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Render serialized output, using `table` when the format asks for one
pub fn render(value: &Value, format: OutputFormat, table: impl FnOnce() -> String) -> Result<String> {
    match format {
        OutputFormat::Json => format_json(value, false),
        OutputFormat::JsonPretty => format_json(value, true),
        OutputFormat::Table => Ok(table()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_qme_types::{RecordId, Summary};

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("whatever"), OutputFormat::JsonPretty);
    }

    #[test]
    fn test_result_table_lists_members() {
        let mut summary = Summary::default();
        summary.set(Category::Numerator, vec![RecordId::from("p1"), RecordId::from("p2")]);
        let result = MeasureResult {
            measure_id: "M".into(),
            sub_id: None,
            summary,
            faults: Vec::new(),
        };

        let table = result_table(&result);
        assert!(table.contains("numerator"));
        assert!(table.contains("p1, p2"));
    }
}
