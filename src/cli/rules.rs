use std::path::Path;

use comfy_table::{Cell, Table};

use crate::categorizer::{Categorizer, CategoryRule, MatchType};
use crate::error::{Result, SpendError};
use crate::settings::{load_settings, save_settings, settings_path, Settings};

/// Validate the new rule list before anything is written.
fn save_rules(path: &Path, mut settings: Settings, rules: Vec<CategoryRule>) -> Result<()> {
    Categorizer::new(&rules)?;
    settings.rules = rules;
    save_settings(path, &settings)
}

/// 1-based position to index; `len` is the largest accepted position.
fn index_of(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        return Err(SpendError::Other(format!(
            "No rule at position {position} (there are {len} rules)"
        )));
    }
    Ok(position - 1)
}

pub fn add(
    config: Option<&Path>,
    pattern: &str,
    category: &str,
    match_type: MatchType,
    position: Option<usize>,
) -> Result<()> {
    let path = settings_path(config);
    let settings = load_settings(&path)?;
    let mut rules = settings.rules.clone();
    let rule = CategoryRule {
        pattern: pattern.trim().to_string(),
        category: category.trim().to_string(),
        match_type,
    };
    let index = match position {
        Some(p) => index_of(p, rules.len() + 1)?,
        None => rules.len(),
    };
    rules.insert(index, rule);
    save_rules(&path, settings, rules)?;
    println!("Added rule {}: '{pattern}' \u{2192} {category}", index + 1);
    Ok(())
}

pub fn keywords(config: Option<&Path>, category: &str, keywords: &str) -> Result<()> {
    let path = settings_path(config);
    let settings = load_settings(&path)?;
    let added = CategoryRule::from_keywords(category.trim(), keywords);
    if added.is_empty() {
        return Err(SpendError::Other("no keywords given".to_string()));
    }
    let count = added.len();
    let mut rules = settings.rules.clone();
    rules.extend(added);
    save_rules(&path, settings, rules)?;
    println!("Added {count} rules \u{2192} {category}");
    Ok(())
}

pub fn list(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(&settings_path(config))?;
    println!("{}", format_rules(&settings.rules));
    Ok(())
}

pub fn remove(config: Option<&Path>, position: usize) -> Result<()> {
    let path = settings_path(config);
    let settings = load_settings(&path)?;
    let mut rules = settings.rules.clone();
    let removed = rules.remove(index_of(position, rules.len())?);
    save_rules(&path, settings, rules)?;
    println!("Removed rule {position}: '{}' \u{2192} {}", removed.pattern, removed.category);
    Ok(())
}

pub fn move_rule(config: Option<&Path>, from: usize, to: usize) -> Result<()> {
    let path = settings_path(config);
    let settings = load_settings(&path)?;
    let mut rules = settings.rules.clone();
    let from_index = index_of(from, rules.len())?;
    let to_index = index_of(to, rules.len())?;
    let rule = rules.remove(from_index);
    rules.insert(to_index, rule);
    save_rules(&path, settings, rules)?;
    println!("Moved rule {from} to position {to}");
    Ok(())
}

pub fn format_rules(rules: &[CategoryRule]) -> String {
    if rules.is_empty() {
        return "No rules. Add one with `spendlens rules add`.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["#", "Pattern", "Type", "Category"]);
    for (i, rule) in rules.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&rule.pattern),
            Cell::new(rule.match_type.key()),
            Cell::new(&rule.category),
        ]);
    }
    format!("Rules\n{table}")
}
