use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::budget::{Budget, SignConvention, SpendingPolicy};
use crate::categorizer::{CategoryOverrides, CategoryRule};
use crate::error::{Result, SpendError};
use crate::importer::ParseOptions;
use crate::mapper::{default_date_formats, ColumnMapping};

pub const CONFIG_ENV: &str = "SPENDLENS_CONFIG";

/// Everything a user configures. One value per user/session; nothing global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub parse: ParseOptions,
    /// Explicit column mapping; detected from the header when unset.
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    /// Ordered; the first matching rule wins.
    #[serde(default)]
    pub rules: Vec<CategoryRule>,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub spending: SpendingPolicy,
    #[serde(default)]
    pub overrides: CategoryOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parse: ParseOptions::default(),
            mapping: None,
            date_formats: default_date_formats(),
            rules: Vec::new(),
            budget: Budget::default(),
            spending: SpendingPolicy::default(),
            overrides: CategoryOverrides::default(),
        }
    }
}

impl Settings {
    /// Starter rules and monthly budgets for a new setup. Bank exports list
    /// purchases as negative amounts, so only those count as spending.
    pub fn starter() -> Self {
        let mut settings = Settings::default();
        settings.spending.sign = SignConvention::NegativeIsExpense;
        for (category, keywords, limit) in [
            ("Groceries", "metro,costco,walmart,superstore", 300.0),
            ("Transport", "uber,lyft,shell,esso,petro,gas", 150.0),
            ("Entertainment", "cineplex,netflix,spotify,steam", 100.0),
        ] {
            settings.rules.extend(CategoryRule::from_keywords(category, keywords));
            settings.budget.set(category, limit);
        }
        settings.budget.overall = 2000.0;
        settings
    }
}

/// Reject limits that cannot be compared against.
pub fn validate_limit(limit: f64) -> Result<f64> {
    if !limit.is_finite() || limit < 0.0 {
        return Err(SpendError::Settings(format!(
            "budget limit must be a non-negative number, got {limit}"
        )));
    }
    Ok(limit)
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("spendlens")
}

/// `--config` wins, then `SPENDLENS_CONFIG`, then `~/.config/spendlens/settings.json`.
pub fn settings_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => config_dir().join("settings.json"),
    }
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SpendError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SpendError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    tracing::debug!(path = %path.display(), "saved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CreditPolicy;
    use crate::mapper::ColumnRef;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::starter();
        settings.mapping = Some(ColumnMapping::by_index(0, 1, 2));
        settings.spending.credits = CreditPolicy::Offset;
        settings.overrides.set("abc123", "Housing");
        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(&dir.path().join("nope.json")).unwrap();
        assert!(s.rules.is_empty());
        assert!(s.mapping.is_none());
        assert!(s.parse.has_header);
        assert_eq!(s.date_formats, default_date_formats());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"mapping": {"date": "Posted", "amount": 3, "description": "Payee"}, "budget": {"overall": 500}}"#,
        )
        .unwrap();
        let s = load_settings(&path).unwrap();
        assert_eq!(s.mapping.unwrap().amount, ColumnRef::Index(3));
        assert_eq!(s.budget.overall, 500.0);
        assert!(s.budget.categories.is_empty());
        assert!(s.parse.has_header);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_settings(&path).unwrap_err(), SpendError::Settings(_)));
    }

    #[test]
    fn test_save_creates_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep").join("nested").join("settings.json");
        save_settings(&path, &Settings::default()).unwrap();
        assert!(path.exists());
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("}\n"));
    }

    #[test]
    fn test_starter_settings() {
        let s = Settings::starter();
        assert_eq!(s.budget.overall, 2000.0);
        assert_eq!(s.budget.categories.get("Groceries"), Some(&300.0));
        assert_eq!(s.spending.sign, SignConvention::NegativeIsExpense);
        assert_eq!(Settings::default().spending.sign, SignConvention::Absolute);
        assert!(s.rules.iter().any(|r| r.pattern == "netflix" && r.category == "Entertainment"));
    }

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(50.0).unwrap(), 50.0);
        assert!(validate_limit(0.0).is_ok());
        assert!(validate_limit(-1.0).is_err());
        assert!(validate_limit(f64::NAN).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let p = settings_path(Some(Path::new("/tmp/x.json")));
        assert_eq!(p, PathBuf::from("/tmp/x.json"));
    }
}
