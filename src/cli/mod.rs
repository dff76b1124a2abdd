pub mod budget;
pub mod demo;
pub mod import;
pub mod init;
pub mod overrides;
pub mod report;
pub mod rules;
pub mod settings;
pub mod status;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::budget::{CreditPolicy, SignConvention};
use crate::categorizer::MatchType;
use crate::error::{Result, SpendError};
use crate::importer::{Encoding, FileFormat};
use crate::mapper::{ColumnMapping, ColumnRef};
use crate::models::{RawRow, YearMonth};
use crate::session::Session;
use crate::settings::{load_settings, settings_path, Settings};

#[derive(Parser)]
#[command(
    name = "spendlens",
    version,
    about = "Budget checks for bank exports: parse, categorize, compare against limits."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/spendlens/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write starter rules and budgets to the settings file.
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
    /// Parse a CSV/TSV/XLSX/XLS/ODS file and show categorized transactions.
    Import {
        /// File to read
        file: PathBuf,
        #[command(flatten)]
        input: InputArgs,
        /// Only show transactions in this month: YYYY-MM
        #[arg(long)]
        month: Option<YearMonth>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
        /// Remember the column mapping used for this file
        #[arg(long = "save-mapping")]
        save_mapping: bool,
    },
    /// Show and edit budget limits.
    Budget {
        #[command(subcommand)]
        command: BudgetCommands,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Pin transactions to a category regardless of rules.
    Override {
        #[command(subcommand)]
        command: OverrideCommands,
    },
    /// Show and edit parsing and spending settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Summary, top descriptions and daily totals for a file.
    Report {
        /// File to read
        file: PathBuf,
        #[command(flatten)]
        input: InputArgs,
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<YearMonth>,
        /// Number of descriptions to list
        #[arg(long, default_value = "10")]
        top: usize,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Run the whole pipeline on built-in sample data.
    Demo,
    /// Show the settings file and what it holds.
    Status,
}

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Compare spending in a file against the budget.
    Show {
        /// File to read
        file: PathBuf,
        #[command(flatten)]
        input: InputArgs,
        /// Month to check: YYYY-MM (default: latest month in the file)
        #[arg(long, conflicts_with = "all")]
        month: Option<YearMonth>,
        /// Check every transaction instead of one month
        #[arg(long)]
        all: bool,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Set a category limit, or the overall limit with `overall`.
    Set {
        /// Category name, or `overall`
        category: String,
        /// Monthly limit
        limit: f64,
    },
    /// Remove a category limit.
    Remove {
        /// Category name
        category: String,
    },
    /// List configured limits.
    List,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule.
    Add {
        /// Pattern to match against transaction descriptions
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// How the pattern is matched
        #[arg(long = "match-type", value_enum, default_value = "contains")]
        match_type: MatchTypeArg,
        /// Position in the rule list, 1 = checked first (default: last)
        #[arg(long)]
        position: Option<usize>,
    },
    /// Add one `contains` rule per comma-separated keyword.
    Keywords {
        /// Category name to assign
        category: String,
        /// Keywords, e.g. "metro,costco,walmart"
        keywords: String,
    },
    /// List rules in the order they are checked.
    List,
    /// Remove the rule at a position.
    Remove {
        /// Position shown in `spendlens rules list`
        position: usize,
    },
    /// Move a rule to a new position.
    Move {
        from: usize,
        to: usize,
    },
}

#[derive(Subcommand)]
pub enum OverrideCommands {
    /// Assign a category to one transaction.
    Set {
        /// Transaction ID (shown by `spendlens import`)
        id: String,
        category: String,
    },
    /// Let rules categorize the transaction again.
    Reset {
        id: String,
    },
    /// List manual assignments.
    List,
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the effective settings as JSON.
    Show,
    /// Choose which amounts count as spending.
    Sign {
        #[arg(value_enum)]
        convention: SignArg,
    },
    /// Choose whether credits reduce spending.
    Credits {
        #[arg(value_enum)]
        policy: CreditsArg,
    },
    /// Manage accepted date formats (chrono strftime syntax).
    DateFormat {
        #[command(subcommand)]
        command: DateFormatCommands,
    },
    /// Store input options as defaults for every file.
    Parse {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Forget the saved column mapping and detect it from headers again.
    ClearMapping,
}

#[derive(Subcommand)]
pub enum DateFormatCommands {
    /// Accept another date format.
    Add {
        /// Format string, e.g. "%d.%m.%Y"
        format: String,
        /// Try this format before the others
        #[arg(long)]
        first: bool,
    },
    /// Go back to the built-in formats.
    Clear,
}

// ---------------------------------------------------------------------------
// Input options shared by every command that reads a file
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// File format (default: detected from name and content)
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
    /// Field delimiter for text files; `tab` or `\t` for tabs (default: sniffed)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Text encoding
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,
    /// The first row is data, not a header
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Worksheet name for spreadsheets (default: first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Date column: index or header name
    #[arg(long = "date-col")]
    pub date_col: Option<ColumnRef>,
    /// Amount column: index or header name
    #[arg(long = "amount-col")]
    pub amount_col: Option<ColumnRef>,
    /// Description column: index or header name
    #[arg(long = "description-col")]
    pub description_col: Option<ColumnRef>,
}

impl InputArgs {
    /// Layer the flags over stored settings for this run.
    pub fn apply(&self, settings: &mut Settings) -> Result<()> {
        if let Some(format) = self.format {
            settings.parse.format = Some(format.into());
        }
        if let Some(delimiter) = self.delimiter {
            settings.parse.delimiter = Some(delimiter);
        }
        if let Some(encoding) = self.encoding {
            settings.parse.encoding = encoding.into();
        }
        if self.no_header {
            settings.parse.has_header = false;
        }
        if let Some(sheet) = &self.sheet {
            settings.parse.sheet = Some(sheet.clone());
        }
        if let Some(mapping) = self.mapping()? {
            settings.mapping = Some(mapping);
        }
        Ok(())
    }

    fn mapping(&self) -> Result<Option<ColumnMapping>> {
        match (&self.date_col, &self.amount_col, &self.description_col) {
            (None, None, None) => Ok(None),
            (Some(date), Some(amount), Some(description)) => Ok(Some(ColumnMapping {
                date: date.clone(),
                amount: amount.clone(),
                description: description.clone(),
            })),
            _ => Err(SpendError::Other(
                "--date-col, --amount-col and --description-col must be given together".to_string(),
            )),
        }
    }
}

fn parse_delimiter(s: &str) -> std::result::Result<char, String> {
    match s {
        "tab" | "\\t" | "\t" => Ok('\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Ok(c),
                _ => Err(format!("expected a single ASCII character, got '{s}'")),
            }
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FormatArg {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

impl From<FormatArg> for FileFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => FileFormat::Delimited,
            FormatArg::Xlsx => FileFormat::Xlsx,
            FormatArg::Xls => FileFormat::Xls,
            FormatArg::Ods => FileFormat::Ods,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum EncodingArg {
    Auto,
    Utf8,
    Latin1,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Auto => Encoding::Auto,
            EncodingArg::Utf8 => Encoding::Utf8,
            EncodingArg::Latin1 => Encoding::Latin1,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum MatchTypeArg {
    Contains,
    StartsWith,
    Regex,
}

impl From<MatchTypeArg> for MatchType {
    fn from(arg: MatchTypeArg) -> Self {
        match arg {
            MatchTypeArg::Contains => MatchType::Contains,
            MatchTypeArg::StartsWith => MatchType::StartsWith,
            MatchTypeArg::Regex => MatchType::Regex,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SignArg {
    Absolute,
    NegativeIsExpense,
    PositiveIsExpense,
}

impl From<SignArg> for SignConvention {
    fn from(arg: SignArg) -> Self {
        match arg {
            SignArg::Absolute => SignConvention::Absolute,
            SignArg::NegativeIsExpense => SignConvention::NegativeIsExpense,
            SignArg::PositiveIsExpense => SignConvention::PositiveIsExpense,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CreditsArg {
    Exclude,
    Offset,
}

impl From<CreditsArg> for CreditPolicy {
    fn from(arg: CreditsArg) -> Self {
        match arg {
            CreditsArg::Exclude => CreditPolicy::Exclude,
            CreditsArg::Offset => CreditPolicy::Offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load settings, apply the input flags, and run the pipeline over `file`.
/// A mapping failure prints the file's columns so the user can pick them.
pub(crate) fn open_session(config: Option<&Path>, file: &Path, input: &InputArgs) -> Result<Session> {
    let mut settings = load_settings(&settings_path(config))?;
    input.apply(&mut settings)?;
    let mut session = Session::new(settings);
    if let Err(e) = session.load_file(file) {
        if let (SpendError::Mapping(_), Some(source)) = (&e, session.source()) {
            eprintln!("{}", format_column_hint(source.header.as_ref(), source.rows.first()));
        }
        return Err(e);
    }
    Ok(session)
}

/// Column listing shown when the mapping needs fixing.
pub(crate) fn format_column_hint(header: Option<&RawRow>, first_row: Option<&RawRow>) -> String {
    let mut out = String::from("Columns in this file:\n");
    let width = header
        .map(RawRow::width)
        .unwrap_or(0)
        .max(first_row.map(RawRow::width).unwrap_or(0));
    for i in 0..width {
        let name = header
            .and_then(|h| h.get(i))
            .map(|c| c.to_string())
            .unwrap_or_default();
        let sample = first_row
            .and_then(|r| r.get(i))
            .map(|c| c.to_string())
            .unwrap_or_default();
        if name.is_empty() {
            out.push_str(&format!("  {i}: e.g. {sample}\n"));
        } else {
            out.push_str(&format!("  {i}: {name} (e.g. {sample})\n"));
        }
    }
    out.push_str("Pick columns with --date-col, --amount-col and --description-col.");
    out
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SpendError::Other(e.to_string()))
}
