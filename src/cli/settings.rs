use std::path::Path;

use chrono::format::{Item, StrftimeItems};

use crate::budget::{CreditPolicy, SignConvention, SpendingPolicy};
use crate::cli::{to_json, InputArgs};
use crate::error::{Result, SpendError};
use crate::mapper::default_date_formats;
use crate::session::Session;
use crate::settings::{load_settings, save_settings, settings_path};

pub fn show(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(&settings_path(config))?;
    println!("{}", to_json(&settings)?);
    Ok(())
}

fn update_policy(config: Option<&Path>, change: impl FnOnce(&mut SpendingPolicy)) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    let mut policy = session.settings().spending;
    change(&mut policy);
    session.set_policy(policy);
    save_settings(&path, session.settings())?;
    println!("Spending: {}", policy.describe());
    Ok(())
}

pub fn sign(config: Option<&Path>, convention: SignConvention) -> Result<()> {
    update_policy(config, |p| p.sign = convention)
}

pub fn credits(config: Option<&Path>, policy: CreditPolicy) -> Result<()> {
    update_policy(config, |p| p.credits = policy)
}

fn validate_date_format(format: &str) -> Result<()> {
    if format.trim().is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(SpendError::Settings(format!("invalid date format '{format}'")));
    }
    Ok(())
}

pub fn add_date_format(config: Option<&Path>, format: &str, first: bool) -> Result<()> {
    validate_date_format(format)?;
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    let mut formats: Vec<String> = session
        .settings()
        .date_formats
        .iter()
        .filter(|f| f.as_str() != format)
        .cloned()
        .collect();
    if first {
        formats.insert(0, format.to_string());
    } else {
        formats.push(format.to_string());
    }
    session.set_date_formats(formats)?;
    save_settings(&path, session.settings())?;
    println!("Date formats: {}", session.settings().date_formats.join("  "));
    Ok(())
}

pub fn clear_date_formats(config: Option<&Path>) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    session.set_date_formats(default_date_formats())?;
    save_settings(&path, session.settings())?;
    println!("Date formats reset to defaults");
    Ok(())
}

pub fn parse(config: Option<&Path>, input: &InputArgs) -> Result<()> {
    let path = settings_path(config);
    let mut settings = load_settings(&path)?;
    input.apply(&mut settings)?;
    save_settings(&path, &settings)?;
    println!("Saved input options to {}", path.display());
    Ok(())
}

pub fn clear_mapping(config: Option<&Path>) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    session.set_mapping(None)?;
    save_settings(&path, session.settings())?;
    println!("Column mapping cleared; it will be detected from each file's header");
    Ok(())
}
