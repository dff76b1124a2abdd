use std::path::Path;

use serde::Serialize;

use crate::budget::{aggregate, Budget, BudgetReport, SpendingPolicy};
use crate::categorizer::{CategorizeResult, Categorizer, CategoryRule};
use crate::error::{MappingError, Result, SpendError};
use crate::importer::{open_file, read_records, FileFormat, ParseOptions, RecordReader};
use crate::mapper::{map_rows, ColumnMapping, SkippedRow};
use crate::models::{RawRow, Transaction, YearMonth};
use crate::reports;
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A parsed upload: the header (if any) and every non-blank row.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub format: FileFormat,
    pub delimiter: Option<char>,
    pub header: Option<RawRow>,
    pub rows: Vec<RawRow>,
}

fn collect_rows(name: &str, mut reader: RecordReader) -> Result<LoadedFile> {
    let header = reader.take_header();
    let format = reader.format();
    let delimiter = reader.delimiter();
    let rows = reader.collect::<Result<Vec<_>>>()?;
    tracing::info!(file = name, format = format.key(), rows = rows.len(), "read file");
    Ok(LoadedFile {
        name: name.to_string(),
        format,
        delimiter,
        header,
        rows,
    })
}

pub fn load_bytes(name: &str, bytes: Vec<u8>, options: &ParseOptions) -> Result<LoadedFile> {
    collect_rows(name, read_records(Some(name), bytes, options)?)
}

pub fn load_file(file_path: &Path, options: &ParseOptions) -> Result<LoadedFile> {
    let name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    collect_rows(name, open_file(file_path, options)?)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// The mapping actually used (configured or detected).
    pub mapping: ColumnMapping,
    /// Sorted by date, then by source row.
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedRow>,
    pub categorize: CategorizeResult,
}

/// Mapper, then categorizer, then ordering. Same inputs always give the same output.
pub fn run_pipeline(rows: &[RawRow], header: Option<&RawRow>, settings: &Settings) -> Result<PipelineOutput> {
    let mapping = match &settings.mapping {
        Some(m) => m.clone(),
        None => {
            let detected = header
                .and_then(ColumnMapping::detect)
                .ok_or(MappingError::Unmapped)?;
            tracing::debug!(mapping = %detected, "detected column mapping");
            detected
        }
    };
    let categorizer = Categorizer::new(&settings.rules)?;
    let mapped = map_rows(rows, header, &mapping, &settings.date_formats)?;

    if mapped.skipped_count() > 0 {
        tracing::warn!(skipped = mapped.skipped_count(), "rows skipped during mapping");
    }
    let mut transactions = mapped.transactions;
    let categorize = categorizer.categorize(&mut transactions, &settings.overrides);
    transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.row.cmp(&b.row)));

    Ok(PipelineOutput {
        mapping,
        transactions,
        skipped: mapped.skipped,
        categorize,
    })
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One user's working state. Each action recomputes the pipeline from the
/// loaded rows, so derived data is never stale.
#[derive(Debug, Clone)]
pub struct Session {
    settings: Settings,
    source: Option<LoadedFile>,
    output: Option<PipelineOutput>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            source: None,
            output: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source(&self) -> Option<&LoadedFile> {
        self.source.as_ref()
    }

    pub fn output(&self) -> Option<&PipelineOutput> {
        self.output.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        match &self.output {
            Some(o) => &o.transactions,
            None => &[],
        }
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        match &self.output {
            Some(o) => &o.skipped,
            None => &[],
        }
    }

    fn recompute(&mut self) -> Result<()> {
        self.output = None;
        let Some(source) = &self.source else {
            return Ok(());
        };
        let output = run_pipeline(&source.rows, source.header.as_ref(), &self.settings)?;
        self.output = Some(output);
        Ok(())
    }

    /// Replace the loaded file. The rows are kept even if mapping fails so a
    /// corrected mapping can be applied without re-uploading.
    pub fn load(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let loaded = load_bytes(name, bytes, &self.settings.parse)?;
        self.attach(loaded)
    }

    pub fn load_file(&mut self, file_path: &Path) -> Result<()> {
        let loaded = load_file(file_path, &self.settings.parse)?;
        self.attach(loaded)
    }

    pub fn attach(&mut self, loaded: LoadedFile) -> Result<()> {
        self.source = Some(loaded);
        self.recompute()
    }

    pub fn set_mapping(&mut self, mapping: Option<ColumnMapping>) -> Result<()> {
        self.settings.mapping = mapping;
        self.recompute()
    }

    pub fn set_date_formats(&mut self, formats: Vec<String>) -> Result<()> {
        self.settings.date_formats = formats;
        self.recompute()
    }

    /// Invalid rule lists are rejected and leave the current rules in place.
    pub fn set_rules(&mut self, rules: Vec<CategoryRule>) -> Result<()> {
        Categorizer::new(&rules)?;
        self.settings.rules = rules;
        self.recompute()
    }

    pub fn set_budget(&mut self, budget: Budget) {
        self.settings.budget = budget;
    }

    pub fn set_policy(&mut self, policy: SpendingPolicy) {
        self.settings.spending = policy;
    }

    /// Pin a transaction to a category regardless of rules.
    pub fn override_category(&mut self, transaction_id: &str, category: &str) -> Result<()> {
        let category = category.trim();
        if category.is_empty() {
            return Err(SpendError::Other("category must not be empty".to_string()));
        }
        if transaction_id.is_empty() {
            return Err(SpendError::Other("transaction id must not be empty".to_string()));
        }
        if self.output.is_some() && !self.transactions().iter().any(|t| t.id == transaction_id) {
            return Err(SpendError::Other(format!("no transaction with id {transaction_id}")));
        }
        self.settings.overrides.set(transaction_id, category);
        self.recompute()
    }

    /// Drop a manual override so rules apply again. Returns whether one existed.
    pub fn reset_category(&mut self, transaction_id: &str) -> Result<bool> {
        let existed = self.settings.overrides.reset(transaction_id);
        self.recompute()?;
        Ok(existed)
    }

    /// Budget status over all transactions, or one month of them.
    pub fn budget_report(&self, month: Option<YearMonth>) -> BudgetReport {
        let budget = &self.settings.budget;
        let policy = &self.settings.spending;
        match month {
            Some(m) => aggregate(&reports::in_month(self.transactions(), m), budget, policy),
            None => aggregate(self.transactions(), budget, policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Utilization;
    use crate::models::CategorySource;

    const EXAMPLE: &str = "date,amount,description\n2024-01-05,-42.50,Coffee Shop\n2024-01-06,1200.00,Rent\n";

    fn example_settings() -> Settings {
        let mut settings = Settings {
            mapping: Some(ColumnMapping::by_index(0, 1, 2)),
            rules: vec![CategoryRule::contains("coffee", "Dining")],
            ..Settings::default()
        };
        settings.budget.set("Dining", 50.0);
        settings.budget.overall = 2000.0;
        settings
    }

    fn loaded_session(settings: Settings, csv: &str) -> Session {
        let mut session = Session::new(settings);
        session.load("upload.csv", csv.as_bytes().to_vec()).unwrap();
        session
    }

    #[test]
    fn test_example_end_to_end() {
        let session = loaded_session(example_settings(), EXAMPLE);
        let txns = session.transactions();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].description, "Coffee Shop");
        assert_eq!(txns[0].category.as_deref(), Some("Dining"));
        assert_eq!(txns[1].description, "Rent");
        assert_eq!(txns[1].category, None);

        let report = session.budget_report(None);
        assert!((report.categories[0].spent - 42.5).abs() < 1e-9);
        assert!((report.categories[0].ratio().unwrap() - 0.85).abs() < 1e-9);
        assert!((report.overall.spent - 1242.5).abs() < 1e-9);
        assert!((report.overall.ratio().unwrap() - 0.62125).abs() < 1e-9);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let loaded = load_bytes("upload.csv", EXAMPLE.as_bytes().to_vec(), &ParseOptions::default()).unwrap();
        let settings = example_settings();
        let first = run_pipeline(&loaded.rows, loaded.header.as_ref(), &settings).unwrap();
        let second = run_pipeline(&loaded.rows, loaded.header.as_ref(), &settings).unwrap();
        assert_eq!(first, second);
        let budget = &settings.budget;
        assert_eq!(
            aggregate(&first.transactions, budget, &settings.spending),
            aggregate(&second.transactions, budget, &settings.spending)
        );
    }

    #[test]
    fn test_mapping_detected_from_header() {
        let settings = Settings {
            mapping: None,
            ..example_settings()
        };
        let session = loaded_session(settings, EXAMPLE);
        assert_eq!(session.transactions().len(), 2);
        assert_eq!(
            session.output().unwrap().mapping,
            ColumnMapping::detect(session.source().unwrap().header.as_ref().unwrap()).unwrap()
        );
    }

    #[test]
    fn test_mapping_error_is_recoverable() {
        let mut session = Session::new(Settings {
            mapping: Some(ColumnMapping::by_index(0, 1, 7)),
            ..example_settings()
        });
        let err = session.load("upload.csv", EXAMPLE.as_bytes().to_vec()).unwrap_err();
        assert!(matches!(err, SpendError::Mapping(MappingError::OutOfRange { .. })));
        assert!(session.transactions().is_empty());
        assert!(session.source().is_some());

        session.set_mapping(Some(ColumnMapping::by_index(0, 1, 2))).unwrap();
        assert_eq!(session.transactions().len(), 2);
    }

    #[test]
    fn test_unmapped_without_header() {
        let mut session = Session::new(Settings {
            mapping: None,
            parse: ParseOptions {
                has_header: false,
                ..ParseOptions::default()
            },
            ..Settings::default()
        });
        let err = session.load("x.csv", b"2024-01-05,-1,A\n".to_vec()).unwrap_err();
        assert!(matches!(err, SpendError::Mapping(MappingError::Unmapped)));
    }

    #[test]
    fn test_override_persists_across_rule_edits() {
        let mut session = loaded_session(example_settings(), EXAMPLE);
        let rent_id = session.transactions()[1].id.clone();
        session.override_category(&rent_id, "Housing").unwrap();
        assert_eq!(session.transactions()[1].category.as_deref(), Some("Housing"));

        let mut rules = session.settings().rules.clone();
        rules.push(CategoryRule::contains("rent", "Bills"));
        rules.push(CategoryRule::contains("shop", "Shopping"));
        session.set_rules(rules).unwrap();

        let rent = &session.transactions()[1];
        assert_eq!(rent.category.as_deref(), Some("Housing"));
        assert_eq!(rent.category_source, Some(CategorySource::Manual));

        assert!(session.reset_category(&rent_id).unwrap());
        assert_eq!(session.transactions()[1].category.as_deref(), Some("Bills"));
    }

    #[test]
    fn test_override_unknown_transaction_rejected() {
        let mut session = loaded_session(example_settings(), EXAMPLE);
        assert!(session.override_category("doesnotexist", "Housing").is_err());
        let coffee_id = session.transactions()[0].id.clone();
        assert!(session.override_category(&coffee_id, " ").is_err());
        assert!(session.settings().overrides.is_empty());
    }

    #[test]
    fn test_invalid_rules_leave_previous_rules() {
        let mut session = loaded_session(example_settings(), EXAMPLE);
        let bad = vec![CategoryRule {
            pattern: "(".to_string(),
            category: "X".to_string(),
            match_type: crate::categorizer::MatchType::Regex,
        }];
        assert!(session.set_rules(bad).is_err());
        assert_eq!(session.settings().rules.len(), 1);
        assert_eq!(session.transactions()[0].category.as_deref(), Some("Dining"));
    }

    #[test]
    fn test_skipped_rows_reported() {
        let csv = "date,amount,description\n2024-01-05,-42.50,Coffee Shop\n2024-01-06,N/A,Mystery\n";
        let session = loaded_session(example_settings(), csv);
        assert_eq!(session.transactions().len(), 1);
        assert_eq!(session.skipped().len(), 1);
        assert_eq!(session.skipped()[0].row, 3);
    }

    #[test]
    fn test_transactions_sorted_by_date() {
        let csv = "date,amount,description\n2024-01-09,-1,Later\n2024-01-02,-1,Earlier\n2024-01-09,-2,Later too\n";
        let session = loaded_session(example_settings(), csv);
        let order: Vec<_> = session.transactions().iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["Earlier", "Later", "Later too"]);
    }

    #[test]
    fn test_month_filter() {
        let csv = "date,amount,description\n2024-01-05,-10,Coffee\n2024-02-05,-20,Coffee\n";
        let session = loaded_session(example_settings(), csv);
        let jan = session.budget_report(Some("2024-01".parse().unwrap()));
        assert_eq!(jan.categories[0].spent, 10.0);
        let all = session.budget_report(None);
        assert_eq!(all.categories[0].spent, 30.0);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut a = loaded_session(example_settings(), EXAMPLE);
        let b = loaded_session(example_settings(), EXAMPLE);
        let mut budget = a.settings().budget.clone();
        budget.set("Dining", 0.0);
        a.set_budget(budget);
        assert_eq!(a.budget_report(None).categories[0].utilization, Utilization::Saturated);
        assert!(matches!(b.budget_report(None).categories[0].utilization, Utilization::Ratio(_)));
    }

    #[test]
    fn test_policy_change_applies_to_report() {
        let mut session = loaded_session(example_settings(), EXAMPLE);
        session.set_policy(SpendingPolicy {
            sign: crate::budget::SignConvention::NegativeIsExpense,
            ..SpendingPolicy::default()
        });
        let report = session.budget_report(None);
        assert!((report.overall.spent - 42.5).abs() < 1e-9);
        assert_eq!(report.uncategorized, 0.0);
    }

    #[test]
    fn test_date_formats_remap_rows() {
        let csv = "date,amount,description\n2024_01_05,-42.50,Coffee Shop\n";
        let mut session = loaded_session(example_settings(), csv);
        assert!(session.transactions().is_empty());
        assert_eq!(session.skipped().len(), 1);

        session.set_date_formats(vec!["%Y_%m_%d".to_string()]).unwrap();
        assert_eq!(session.transactions().len(), 1);
        assert!(session.skipped().is_empty());
    }

    #[test]
    fn test_empty_session_reports_zero() {
        let session = Session::new(example_settings());
        let report = session.budget_report(None);
        assert_eq!(report.overall.spent, 0.0);
        assert_eq!(report.categories[0].ratio(), Some(0.0));
    }
}
