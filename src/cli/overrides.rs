use std::path::Path;

use comfy_table::{Cell, Table};

use crate::categorizer::CategoryOverrides;
use crate::error::{Result, SpendError};
use crate::session::Session;
use crate::settings::{load_settings, save_settings, settings_path};

pub fn set(config: Option<&Path>, id: &str, category: &str) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    session.override_category(id.trim(), category)?;
    save_settings(&path, session.settings())?;
    println!("{} \u{2192} {}", id.trim(), category.trim());
    Ok(())
}

pub fn reset(config: Option<&Path>, id: &str) -> Result<()> {
    let path = settings_path(config);
    let mut session = Session::new(load_settings(&path)?);
    if !session.reset_category(id.trim())? {
        return Err(SpendError::Other(format!("No override for {id}")));
    }
    save_settings(&path, session.settings())?;
    println!("Reset {}; rules apply again", id.trim());
    Ok(())
}

pub fn list(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(&settings_path(config))?;
    println!("{}", format_overrides(&settings.overrides));
    Ok(())
}

pub fn format_overrides(overrides: &CategoryOverrides) -> String {
    if overrides.is_empty() {
        return "No manual categories.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Transaction", "Category"]);
    for (id, category) in overrides.iter() {
        table.add_row(vec![Cell::new(id), Cell::new(category)]);
    }
    format!("Overrides\n{table}")
}
