use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::budget::SpendingPolicy;
use crate::cli::{open_session, to_json, InputArgs};
use crate::error::Result;
use crate::fmt::money;
use crate::models::{Transaction, YearMonth};
use crate::reports::{self, DailyTotal, DescriptionTotal, Summary};

#[derive(Serialize)]
struct ReportView {
    month: Option<YearMonth>,
    summary: Summary,
    top: Vec<DescriptionTotal>,
    daily: Vec<DailyTotal>,
}

fn build(transactions: &[Transaction], policy: &SpendingPolicy, month: Option<YearMonth>, top: usize) -> ReportView {
    let selected = match month {
        Some(m) => reports::in_month(transactions, m),
        None => transactions.to_vec(),
    };
    ReportView {
        month,
        summary: reports::summarize(&selected, policy),
        top: reports::top_descriptions(&selected, policy, top),
        daily: reports::daily_totals(&selected),
    }
}

pub fn run(
    config: Option<&Path>,
    file: &Path,
    input: &InputArgs,
    month: Option<YearMonth>,
    top: usize,
    json: bool,
) -> Result<()> {
    let session = open_session(config, file, input)?;
    let view = build(session.transactions(), &session.settings().spending, month, top);
    if json {
        println!("{}", to_json(&view)?);
        return Ok(());
    }
    println!("{}", format_summary(&view.summary));
    println!();
    println!("{}", format_top(&view.top));
    println!();
    println!("{}", format_daily(&view.daily));
    Ok(())
}

pub fn format_summary(summary: &Summary) -> String {
    let range = match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "no transactions".to_string(),
    };
    let months: Vec<String> = summary.months.iter().map(|m| m.to_string()).collect();
    let net = if summary.net_total < 0.0 {
        money(summary.net_total).red().to_string()
    } else {
        money(summary.net_total).green().to_string()
    };
    let mut out = format!("{}\n", "Summary".bold());
    out.push_str(&format!("  Transactions:  {}\n", summary.count));
    out.push_str(&format!("  Period:        {range}\n"));
    if !months.is_empty() {
        out.push_str(&format!("  Months:        {}\n", months.join(", ")));
    }
    out.push_str(&format!("  Net:           {net}\n"));
    out.push_str(&format!("  Spending:      {}", money(summary.expense_total)));
    out
}

pub fn format_top(items: &[DescriptionTotal]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Description", "Count", "Spent"]);
    for item in items {
        table.add_row(vec![
            Cell::new(&item.description),
            Cell::new(item.count),
            Cell::new(money(item.total)),
        ]);
    }
    format!("Top Spending\n{table}")
}

pub fn format_daily(days: &[DailyTotal]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Count", "Net"]);
    for day in days {
        let net = if day.total < 0.0 {
            money(day.total).red().to_string()
        } else {
            money(day.total).green().to_string()
        };
        table.add_row(vec![Cell::new(day.date), Cell::new(day.count), Cell::new(net)]);
    }
    format!("Daily Totals\n{table}")
}
