use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::budget::{Budget, BudgetReport, BudgetStatus, SpendingPolicy};
use crate::cli::{open_session, to_json, InputArgs};
use crate::error::{Result, SpendError};
use crate::fmt::{money, progress_bar, utilization};
use crate::models::YearMonth;
use crate::reports;
use crate::session::Session;
use crate::settings::{load_settings, save_settings, settings_path, validate_limit};

const OVERALL: &str = "overall";

#[derive(Serialize)]
struct BudgetView<'a> {
    month: Option<YearMonth>,
    spending: &'a SpendingPolicy,
    report: &'a BudgetReport,
}

pub fn show(
    config: Option<&Path>,
    file: &Path,
    input: &InputArgs,
    month: Option<YearMonth>,
    all: bool,
    json: bool,
) -> Result<()> {
    let session = open_session(config, file, input)?;
    let month = if all {
        None
    } else {
        month.or_else(|| reports::latest_month(session.transactions()))
    };
    let report = session.budget_report(month);
    let policy = &session.settings().spending;

    if json {
        let view = BudgetView {
            month,
            spending: policy,
            report: &report,
        };
        println!("{}", to_json(&view)?);
        return Ok(());
    }

    let period = match month {
        Some(m) => m.to_string(),
        None => "all months".to_string(),
    };
    println!("{}", format_budget_report(&report, &period));
    println!("Spending: {}", policy.describe());
    if !session.skipped().is_empty() {
        eprintln!(
            "{}",
            format!("{} rows skipped (run `spendlens import` to see why)", session.skipped().len()).yellow()
        );
    }
    Ok(())
}

pub fn set(config: Option<&Path>, category: &str, limit: f64) -> Result<()> {
    let limit = validate_limit(limit)?;
    let category = category.trim();
    if category.is_empty() {
        return Err(SpendError::Other("category must not be empty".to_string()));
    }
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    let mut budget = session.settings().budget.clone();
    let message = if category.eq_ignore_ascii_case(OVERALL) {
        budget.overall = limit;
        format!("Overall budget: {}", money(limit))
    } else {
        budget.set(category, limit);
        format!("Budget for {category}: {}", money(limit))
    };
    session.set_budget(budget);
    save_settings(&path, session.settings())?;
    println!("{message}");
    Ok(())
}

pub fn remove(config: Option<&Path>, category: &str) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    let mut budget = session.settings().budget.clone();
    if category.eq_ignore_ascii_case(OVERALL) {
        budget.overall = 0.0;
    } else if !budget.remove(category) {
        return Err(SpendError::Other(format!("No budget for {category}")));
    }
    session.set_budget(budget);
    save_settings(&path, session.settings())?;
    println!("Removed budget for {category}");
    Ok(())
}

pub fn list(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(&settings_path(config))?;
    println!("{}", format_budget_list(&settings.budget));
    Ok(())
}

pub fn format_budget_list(budget: &Budget) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Limit"]);
    for (category, limit) in &budget.categories {
        table.add_row(vec![Cell::new(category), Cell::new(money(*limit))]);
    }
    let overall = if budget.overall > 0.0 {
        money(budget.overall)
    } else {
        "(not set)".to_string()
    };
    table.add_row(vec![Cell::new("Overall".bold()), Cell::new(overall)]);
    format!("Budgets\n{table}")
}

fn status_row(label: String, status: &BudgetStatus) -> Vec<Cell> {
    let used = if status.is_over() {
        utilization(status).red().bold().to_string()
    } else {
        utilization(status).green().to_string()
    };
    let remaining = status.remaining();
    let remaining = if remaining < 0.0 {
        money(remaining).red().to_string()
    } else {
        money(remaining)
    };
    vec![
        Cell::new(label),
        Cell::new(money(status.spent)),
        Cell::new(money(status.limit)),
        Cell::new(used),
        Cell::new(progress_bar(status.progress())),
        Cell::new(remaining),
    ]
}

pub fn format_budget_report(report: &BudgetReport, period: &str) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Spent", "Limit", "Used", "Progress", "Remaining"]);
    for status in &report.categories {
        table.add_row(status_row(status.scope.to_string(), status));
    }
    table.add_row(status_row("Overall".bold().to_string(), &report.overall));

    let mut out = format!("Budget ({period})\n{table}");
    if report.uncategorized > 0.0 {
        out.push_str(&format!(
            "\nUncategorized spending: {} (counts toward overall only)",
            money(report.uncategorized)
        ));
    }
    if !report.unbudgeted.is_empty() {
        out.push_str("\nNo budget set for:");
        for (category, spent) in &report.unbudgeted {
            out.push_str(&format!("\n  {category}: {}", money(*spent)));
        }
    }
    out
}
