//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use renohub_core::services::Page;
use renohub_core::Error;
use rust_decimal::Decimal;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Render an error for the terminal
///
/// Validation failures are listed one per field instead of joined.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<Error>() {
        Some(Error::Validation(errors)) => {
            let mut lines = vec!["Please fix the following:".to_string()];
            for e in errors.iter() {
                lines.push(format!("  {}: {}", e.field, e.message));
            }
            lines.join("\n")
        }
        _ => format!("{:#}", err),
    }
}

pub fn money(value: Decimal) -> String {
    format!("${:.2}", value)
}

pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// "Page 2 of 5 (43 items)" footer under a paginated table
pub fn page_footer<T>(page: &Page<T>) {
    if page.total_pages > 1 {
        let pages: Vec<String> = page
            .page_list
            .iter()
            .map(|&n| {
                if n == page.current {
                    format!("[{}]", n)
                } else {
                    n.to_string()
                }
            })
            .collect();
        println!(
            "{}",
            format!(
                "Page {} of {} ({} items)  {}",
                page.current,
                page.total_pages,
                page.total_items,
                pages.join(" ")
            )
            .dimmed()
        );
        if page.has_next() {
            println!("{}", format!("Next: --page {}", page.current + 1).dimmed());
        }
    }
}
