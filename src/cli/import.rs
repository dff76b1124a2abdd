use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::categorizer::CategorizeResult;
use crate::cli::{open_session, to_json, InputArgs};
use crate::error::Result;
use crate::fmt::money;
use crate::mapper::{ColumnMapping, SkippedRow};
use crate::models::{CategorySource, Transaction, YearMonth};
use crate::reports;
use crate::settings::{load_settings, save_settings, settings_path};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Serialize)]
struct ImportView<'a> {
    file: &'a str,
    format: &'a str,
    delimiter: Option<char>,
    mapping: &'a ColumnMapping,
    transactions: &'a [Transaction],
    skipped: &'a [SkippedRow],
    categorize: &'a CategorizeResult,
}

pub fn run(
    config: Option<&Path>,
    file: &Path,
    input: &InputArgs,
    month: Option<YearMonth>,
    json: bool,
    save_mapping: bool,
) -> Result<()> {
    let session = open_session(config, file, input)?;
    let (Some(source), Some(output)) = (session.source(), session.output()) else {
        return Ok(());
    };

    if save_mapping {
        let path = settings_path(config);
        let mut stored = load_settings(&path)?;
        stored.mapping = Some(output.mapping.clone());
        save_settings(&path, &stored)?;
        eprintln!("Saved column mapping ({}) to {}", output.mapping, path.display());
    }

    let shown = match month {
        Some(m) => reports::in_month(&output.transactions, m),
        None => output.transactions.clone(),
    };

    if json {
        let view = ImportView {
            file: &source.name,
            format: source.format.key(),
            delimiter: source.delimiter,
            mapping: &output.mapping,
            transactions: &shown,
            skipped: &output.skipped,
            categorize: &output.categorize,
        };
        println!("{}", to_json(&view)?);
        return Ok(());
    }

    println!("{}", format_transactions(&shown));
    if !output.skipped.is_empty() {
        println!("{}", format_skipped(&output.skipped));
    }
    println!(
        "{}",
        format_import_summary(&source.name, output.transactions.len(), output.skipped.len(), &output.categorize)
    );
    tracing::info!(
        format = source.format.key(),
        delimiter = ?source.delimiter,
        mapping = %output.mapping,
        "import finished"
    );
    Ok(())
}

fn source_label(source: Option<CategorySource>) -> String {
    match source {
        Some(CategorySource::Rule(i)) => format!("rule {}", i + 1),
        Some(CategorySource::Manual) => "manual".to_string(),
        None => String::new(),
    }
}

pub fn format_transactions(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return "No transactions.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Row", "Date", "Amount", "Description", "Category", "Source"]);
    for txn in transactions {
        let amount = if txn.amount < 0.0 {
            money(txn.amount).red().to_string()
        } else {
            money(txn.amount).green().to_string()
        };
        let category = match &txn.category {
            Some(c) => c.clone(),
            None => UNCATEGORIZED.yellow().to_string(),
        };
        table.add_row(vec![
            Cell::new(&txn.id),
            Cell::new(txn.row),
            Cell::new(txn.date),
            Cell::new(amount),
            Cell::new(&txn.description),
            Cell::new(category),
            Cell::new(source_label(txn.category_source)),
        ]);
    }
    format!("Transactions\n{table}")
}

pub fn format_skipped(skipped: &[SkippedRow]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Row", "Reason"]);
    for s in skipped {
        table.add_row(vec![Cell::new(s.row), Cell::new(&s.reason)]);
    }
    format!("{}\n{table}", "Skipped rows".yellow().bold())
}

pub fn format_import_summary(name: &str, mapped: usize, skipped: usize, categorize: &CategorizeResult) -> String {
    let mut out = format!("{name}: {mapped} transactions");
    if skipped > 0 {
        out.push_str(&format!(", {skipped} rows skipped"));
    }
    out.push_str(&format!(
        "\n  Categorized: {} ({} by rules, {} manual), uncategorized: {}",
        categorize.categorized(),
        categorize.by_rule,
        categorize.by_override,
        categorize.uncategorized
    ));
    out
}
