use std::path::Path;

use crate::error::Result;
use crate::fmt::money;
use crate::settings::{load_settings, settings_path, Settings};

pub fn run(config: Option<&Path>) -> Result<()> {
    let path = settings_path(config);
    if !path.exists() {
        println!("Settings:   {} (not found)", path.display());
        println!();
        println!("Using defaults. Run `spendlens init` to set up starter rules and budgets.");
        return Ok(());
    }
    let settings = load_settings(&path)?;
    println!("Settings:   {}", path.display());
    println!();
    print!("{}", format_status(&settings));
    Ok(())
}

pub fn format_status(settings: &Settings) -> String {
    let mapping = settings
        .mapping
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "(detect from header)".to_string());
    let overall = if settings.budget.overall > 0.0 {
        money(settings.budget.overall)
    } else {
        "(not set)".to_string()
    };
    let mut out = String::new();
    out.push_str(&format!("Rules:         {}\n", settings.rules.len()));
    out.push_str(&format!("Budgets:       {}\n", settings.budget.categories.len()));
    out.push_str(&format!("Overall:       {overall}\n"));
    out.push_str(&format!("Overrides:     {}\n", settings.overrides.len()));
    out.push_str(&format!("Date formats:  {}\n", settings.date_formats.len()));
    out.push_str(&format!("Mapping:       {mapping}\n"));
    out.push_str(&format!("Spending:      {}\n", settings.spending.describe()));
    out
}
