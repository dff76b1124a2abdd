use std::path::Path;

use crate::error::{Result, SpendError};
use crate::settings::{save_settings, settings_path, Settings};

pub fn run(config: Option<&Path>, force: bool) -> Result<()> {
    let path = settings_path(config);
    if path.exists() && !force {
        return Err(SpendError::Settings(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    let settings = Settings::starter();
    save_settings(&path, &settings)?;

    println!("Initialized spendlens at {}", path.display());
    println!(
        "  {} rules, {} category budgets, overall limit {}",
        settings.rules.len(),
        settings.budget.categories.len(),
        crate::fmt::money(settings.budget.overall)
    );
    Ok(())
}
