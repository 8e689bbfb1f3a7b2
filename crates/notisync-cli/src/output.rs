//! Table and JSON rendering for CLI commands.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

fn json<T: Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string())
}

/// Print rows as a rounded table, or as a JSON array.
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json(rows, "[]")),
        OutputFormat::Table if rows.is_empty() => println!("Nothing to show."),
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }
}

/// Print one value: pretty `Debug` for tables, JSON otherwise.
pub fn print_item<T: Serialize + std::fmt::Debug + ?Sized>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{item:#?}"),
        OutputFormat::Json => println!("{}", json(item, "null")),
    }
}

/// Confirmation line after a successful action.
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Non-fatal notice.
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Error line on stderr.
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Indented `label: value` line.
pub fn print_field(label: &str, value: &str) {
    println!("  {:<16} {value}", format!("{label}:"));
}
