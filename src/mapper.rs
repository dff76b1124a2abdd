use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MappingError;
use crate::importer::excel_serial_to_datetime;
use crate::models::{Cell, RawRow, Transaction};

pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S", "T%H:%M:%S", " %H:%M"];

const DATE_HEADERS: &[&str] = &[
    "date",
    "transaction date",
    "posting date",
    "posted date",
    "trans. date",
    "booking date",
    "value date",
];
const AMOUNT_HEADERS: &[&str] = &["amount", "transaction amount", "amount (usd)", "value", "sum"];
const DESCRIPTION_HEADERS: &[&str] = &[
    "description",
    "transaction description",
    "payee",
    "merchant",
    "details",
    "memo",
    "narrative",
    "name",
];

pub fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Column references and mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Amount,
    Description,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Amount => "amount",
            Self::Description => "description",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source column, by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl FromStr for ColumnRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("column reference is empty".to_string());
        }
        Ok(match s.parse::<usize>() {
            Ok(i) => ColumnRef::Index(i),
            Err(_) => ColumnRef::Name(s.to_string()),
        })
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{i}"),
            ColumnRef::Name(n) => write!(f, "'{n}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: ColumnRef,
    pub amount: ColumnRef,
    pub description: ColumnRef,
}

/// Column positions after checking a mapping against the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub date: usize,
    pub amount: usize,
    pub description: usize,
}

fn normalize_header(cell: &Cell) -> String {
    cell.to_string().trim().to_lowercase()
}

fn find_header(names: &[String], candidates: &[&str], fallback: &[&str], taken: &[usize]) -> Option<usize> {
    for candidate in candidates {
        if let Some(i) = names.iter().position(|n| n == candidate) {
            if !taken.contains(&i) {
                return Some(i);
            }
        }
    }
    names
        .iter()
        .enumerate()
        .find(|(i, n)| !taken.contains(i) && fallback.iter().any(|f| n.contains(f)))
        .map(|(i, _)| i)
}

impl ColumnMapping {
    pub fn by_index(date: usize, amount: usize, description: usize) -> Self {
        Self {
            date: ColumnRef::Index(date),
            amount: ColumnRef::Index(amount),
            description: ColumnRef::Index(description),
        }
    }

    /// Guess a mapping from common bank-export header names.
    pub fn detect(header: &RawRow) -> Option<Self> {
        let names: Vec<String> = header.cells.iter().map(normalize_header).collect();
        let date = find_header(&names, DATE_HEADERS, &["date"], &[])?;
        let amount = find_header(&names, AMOUNT_HEADERS, &["amount"], &[date])?;
        let description = find_header(
            &names,
            DESCRIPTION_HEADERS,
            &["description", "payee"],
            &[date, amount],
        )?;
        Some(Self {
            date: ColumnRef::Name(header.cells[date].to_string().trim().to_string()),
            amount: ColumnRef::Name(header.cells[amount].to_string().trim().to_string()),
            description: ColumnRef::Name(header.cells[description].to_string().trim().to_string()),
        })
    }

    fn entries(&self) -> [(Field, &ColumnRef); 3] {
        [
            (Field::Date, &self.date),
            (Field::Amount, &self.amount),
            (Field::Description, &self.description),
        ]
    }

    /// Check every field against the header and the row width.
    pub fn resolve(&self, header: Option<&RawRow>, width: usize) -> Result<ResolvedMapping, MappingError> {
        let names: Option<Vec<String>> =
            header.map(|h| h.cells.iter().map(normalize_header).collect());
        let mut resolved: Vec<(Field, usize)> = Vec::with_capacity(3);

        for (field, column) in self.entries() {
            let index = match column {
                ColumnRef::Index(index) => {
                    if *index >= width {
                        return Err(MappingError::OutOfRange {
                            field: field.name(),
                            index: *index,
                            width,
                        });
                    }
                    *index
                }
                ColumnRef::Name(name) => {
                    let Some(names) = &names else {
                        return Err(MappingError::NoHeader {
                            field: field.name(),
                            name: name.clone(),
                        });
                    };
                    let wanted = name.trim().to_lowercase();
                    names
                        .iter()
                        .position(|n| *n == wanted)
                        .ok_or_else(|| MappingError::UnknownColumn {
                            field: field.name(),
                            name: name.clone(),
                        })?
                }
            };
            if let Some((other, _)) = resolved.iter().find(|(_, i)| *i == index) {
                return Err(MappingError::DuplicateColumn {
                    first: other.name(),
                    second: field.name(),
                    index,
                });
            }
            resolved.push((field, index));
        }

        Ok(ResolvedMapping {
            date: resolved[0].1,
            amount: resolved[1].1,
            description: resolved[2].1,
        })
    }
}

impl fmt::Display for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "date={}, amount={}, description={}",
            self.date, self.amount, self.description
        )
    }
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

/// Parse a monetary amount: currency symbols, thousands commas, a leading or
/// trailing minus, and parentheses for negatives. `None` if unparseable.
///
/// A comma is only a thousands separator. `-4,50` is not read as `-450`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '$' | '€' | '£' | '¥' | ' ' | '\u{a0}'))
        .collect();
    let mut s = cleaned.as_str();
    let mut negative = false;

    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner;
    }
    if let Some(rest) = s.strip_suffix('-') {
        if negative {
            return None;
        }
        negative = true;
        s = rest;
    }
    if let Some(rest) = s.strip_prefix('-') {
        if negative {
            return None;
        }
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let number = match s.split_once('.') {
        Some((whole, frac)) => format!("{}.{frac}", strip_thousands(whole)?),
        None => strip_thousands(s)?,
    };
    let digits = number.chars().filter(|c| c.is_ascii_digit()).count();
    let dots = number.chars().filter(|&c| c == '.').count();
    if digits == 0 || dots > 1 || digits + dots != number.len() {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Drop `,` separators from the integer part. Every group after the first
/// must be exactly three digits.
fn strip_thousands(whole: &str) -> Option<String> {
    let mut groups = whole.split(',');
    let mut out = groups.next().unwrap_or_default().to_string();
    if whole.contains(',') && (out.is_empty() || out.len() > 3) {
        return None;
    }
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    (1900..=2200).contains(&date.year()).then_some(date)
}

/// Parse a date with the first matching format. A trailing time is allowed.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in formats {
        if let Some(d) = NaiveDate::parse_from_str(raw, fmt).ok().and_then(plausible) {
            return Some(d);
        }
    }
    for fmt in formats {
        for suffix in TIME_SUFFIXES {
            let with_time = format!("{fmt}{suffix}");
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, &with_time) {
                if let Some(d) = plausible(dt.date()) {
                    return Some(d);
                }
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum SkipReason {
    MissingField(Field),
    BadAmount(String),
    BadDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing {field}"),
            Self::BadAmount(v) => write!(f, "unparseable amount '{v}'"),
            Self::BadDate(v) => write!(f, "unparseable date '{v}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MappedRows {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedRow>,
}

impl MappedRows {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

fn required<'a>(row: &'a RawRow, index: usize, field: Field) -> Result<&'a Cell, SkipReason> {
    match row.get(index) {
        Some(cell) if !cell.is_blank() => Ok(cell),
        _ => Err(SkipReason::MissingField(field)),
    }
}

fn cell_amount(cell: &Cell) -> Result<f64, SkipReason> {
    let value = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_amount(s),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| SkipReason::BadAmount(cell.to_string()))
}

fn cell_date(cell: &Cell, formats: &[String]) -> Result<NaiveDate, SkipReason> {
    let value = match cell {
        Cell::Date(dt) => Some(dt.date()),
        Cell::Number(serial) => excel_serial_to_datetime(*serial).map(|dt| dt.date()),
        Cell::Text(s) => parse_date(s, formats),
        _ => None,
    };
    value.ok_or_else(|| SkipReason::BadDate(cell.to_string()))
}

fn cell_description(cell: &Cell) -> Result<String, SkipReason> {
    match cell {
        Cell::Error(_) => Err(SkipReason::MissingField(Field::Description)),
        other => Ok(other.to_string().trim().to_string()),
    }
}

fn amount_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Stable id for a transaction. `occurrence` separates identical rows.
pub fn fingerprint(date: NaiveDate, amount: f64, description: &str, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{date}|{}|{description}|{occurrence}", amount_cents(amount)));
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

fn map_row(
    row: &RawRow,
    columns: &ResolvedMapping,
    date_formats: &[String],
) -> Result<(NaiveDate, f64, String), SkipReason> {
    let date_cell = required(row, columns.date, Field::Date)?;
    let amount_cell = required(row, columns.amount, Field::Amount)?;
    let description_cell = required(row, columns.description, Field::Description)?;

    let amount = cell_amount(amount_cell)?;
    let date = cell_date(date_cell, date_formats)?;
    let description = cell_description(description_cell)?;
    Ok((date, amount, description))
}

/// Turn raw rows into transactions. Rows with a missing or unparseable field
/// are skipped and recorded; only a bad mapping fails the whole batch.
pub fn map_rows(
    rows: &[RawRow],
    header: Option<&RawRow>,
    mapping: &ColumnMapping,
    date_formats: &[String],
) -> Result<MappedRows, MappingError> {
    let widest = rows.iter().map(RawRow::width).max().unwrap_or(0);
    let width = header.map_or(widest, |h| h.width().max(widest));
    let columns = mapping.resolve(header, width)?;

    let mut out = MappedRows::default();
    let mut occurrences: HashMap<(NaiveDate, i64, String), usize> = HashMap::new();

    for row in rows {
        match map_row(row, &columns, date_formats) {
            Ok((date, amount, description)) => {
                let seen = occurrences
                    .entry((date, amount_cents(amount), description.clone()))
                    .or_default();
                let id = fingerprint(date, amount, &description, *seen);
                *seen += 1;
                out.transactions.push(Transaction {
                    id,
                    row: row.row,
                    date,
                    amount,
                    description,
                    category: None,
                    category_source: None,
                });
            }
            Err(reason) => {
                tracing::debug!(row = row.row, %reason, "skipping row");
                out.skipped.push(SkippedRow { row: row.row, reason });
            }
        }
    }

    tracing::info!(
        rows = rows.len(),
        mapped = out.transactions.len(),
        skipped = out.skipped.len(),
        "mapped rows to transactions"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(row: usize, cells: &[&str]) -> RawRow {
        RawRow::new(row, cells.iter().map(|c| Cell::from_text(c)).collect())
    }

    fn header() -> RawRow {
        text_row(1, &["Date", "Amount", "Description"])
    }

    fn formats() -> Vec<String> {
        default_date_formats()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("\"500.00\""), Some(500.0));
        assert_eq!(parse_amount("  -42.50  "), Some(-42.5));
        assert_eq!(parse_amount("+7"), Some(7.0));
        assert_eq!(parse_amount("0"), Some(0.0));
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn test_parse_amount_negatives_and_symbols() {
        assert_eq!(parse_amount("(500.00)"), Some(-500.0));
        assert_eq!(parse_amount("(1,234.56)"), Some(-1234.56));
        assert_eq!(parse_amount("$1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("-$50.00"), Some(-50.0));
        assert_eq!(parse_amount("$-50.00"), Some(-50.0));
        assert_eq!(parse_amount("€ 12.00"), Some(12.0));
        assert_eq!(parse_amount("12.00-"), Some(-12.0));
        assert_eq!(parse_amount("(-5)"), None);
        assert_eq!(parse_amount("--5"), None);
    }

    #[test]
    fn test_parse_amount_comma_only_groups_thousands() {
        assert_eq!(parse_amount("1,234,567.89"), Some(1234567.89));
        assert_eq!(parse_amount("-4,50"), None);
        assert_eq!(parse_amount("12,5"), None);
        assert_eq!(parse_amount("1,2,3"), None);
        assert_eq!(parse_amount("1234,567"), None);
        assert_eq!(parse_amount(",500"), None);
        assert_eq!(parse_amount("1.234,56"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let f = formats();
        let jan5 = NaiveDate::from_ymd_opt(2024, 1, 5);
        assert_eq!(parse_date("2024-01-05", &f), jan5);
        assert_eq!(parse_date("01/05/2024", &f), jan5);
        assert_eq!(parse_date("1/5/24", &f), jan5);
        assert_eq!(parse_date("2024/01/05", &f), jan5);
        assert_eq!(parse_date("05.01.2024", &f), jan5);
        assert_eq!(parse_date("Jan 05, 2024", &f), jan5);
        assert_eq!(parse_date("5 Jan 2024", &f), jan5);
        assert_eq!(parse_date("2024-01-05 00:00:00", &f), jan5);
        assert_eq!(parse_date("2024-01-05T10:30:00", &f), jan5);
        assert_eq!(parse_date("02/30/2025", &f), None);
        assert_eq!(parse_date("yesterday", &f), None);
    }

    #[test]
    fn test_parse_date_respects_configured_order() {
        let day_first = vec!["%d/%m/%Y".to_string()];
        assert_eq!(
            parse_date("05/01/2024", &day_first),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_column_ref_from_str() {
        assert_eq!("2".parse::<ColumnRef>().unwrap(), ColumnRef::Index(2));
        assert_eq!(
            "Posting Date".parse::<ColumnRef>().unwrap(),
            ColumnRef::Name("Posting Date".to_string())
        );
        assert!(" ".parse::<ColumnRef>().is_err());
    }

    #[test]
    fn test_column_ref_serde_untagged() {
        let mapping: ColumnMapping =
            serde_json::from_str(r#"{"date": 0, "amount": "Amount", "description": 2}"#).unwrap();
        assert_eq!(mapping.date, ColumnRef::Index(0));
        assert_eq!(mapping.amount, ColumnRef::Name("Amount".to_string()));
    }

    #[test]
    fn test_detect_mapping() {
        let h = text_row(1, &["Posting Date", "Payee", "Reference", "Amount"]);
        let mapping = ColumnMapping::detect(&h).unwrap();
        assert_eq!(mapping.date, ColumnRef::Name("Posting Date".to_string()));
        assert_eq!(mapping.amount, ColumnRef::Name("Amount".to_string()));
        assert_eq!(mapping.description, ColumnRef::Name("Payee".to_string()));
        assert!(ColumnMapping::detect(&text_row(1, &["a", "b", "c"])).is_none());
    }

    #[test]
    fn test_resolve_by_name_is_case_insensitive() {
        let mapping = ColumnMapping {
            date: ColumnRef::Name("DATE".to_string()),
            amount: ColumnRef::Name(" amount ".to_string()),
            description: ColumnRef::Index(2),
        };
        let resolved = mapping.resolve(Some(&header()), 3).unwrap();
        assert_eq!(resolved, ResolvedMapping { date: 0, amount: 1, description: 2 });
    }

    #[test]
    fn test_resolve_errors() {
        let h = header();
        let out_of_range = ColumnMapping::by_index(0, 1, 5);
        assert!(matches!(
            out_of_range.resolve(Some(&h), 3).unwrap_err(),
            MappingError::OutOfRange { index: 5, width: 3, .. }
        ));

        let unknown = ColumnMapping {
            date: ColumnRef::Name("Posted".to_string()),
            ..ColumnMapping::by_index(0, 1, 2)
        };
        assert!(matches!(
            unknown.resolve(Some(&h), 3).unwrap_err(),
            MappingError::UnknownColumn { field: "date", .. }
        ));
        assert!(matches!(
            unknown.resolve(None, 3).unwrap_err(),
            MappingError::NoHeader { .. }
        ));

        let duplicate = ColumnMapping::by_index(0, 0, 2);
        assert!(matches!(
            duplicate.resolve(Some(&h), 3).unwrap_err(),
            MappingError::DuplicateColumn { first: "date", second: "amount", index: 0 }
        ));
    }

    #[test]
    fn test_map_rows_example() {
        let rows = vec![
            text_row(2, &["2024-01-05", "-42.50", "Coffee Shop"]),
            text_row(3, &["2024-01-06", "1200.00", "Rent"]),
        ];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert_eq!(mapped.skipped_count(), 0);
        assert_eq!(mapped.transactions.len(), 2);
        let coffee = &mapped.transactions[0];
        assert_eq!(coffee.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(coffee.amount, -42.5);
        assert_eq!(coffee.description, "Coffee Shop");
        assert_eq!(coffee.category, None);
        assert_eq!(coffee.row, 2);
    }

    #[test]
    fn test_unparseable_amount_skips_exactly_one_row() {
        let rows = vec![
            text_row(2, &["2024-01-05", "-42.50", "Coffee Shop"]),
            text_row(3, &["2024-01-06", "N/A", "Mystery"]),
            text_row(4, &["2024-01-07", "-10", "Bus"]),
        ];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert_eq!(mapped.transactions.len(), 2);
        assert_eq!(mapped.skipped_count(), 1);
        assert_eq!(mapped.skipped[0].row, 3);
        assert_eq!(mapped.skipped[0].reason, SkipReason::BadAmount("N/A".to_string()));
        assert_eq!(mapped.transactions[1].description, "Bus");
    }

    #[test]
    fn test_decimal_comma_amount_is_skipped() {
        let rows = vec![
            text_row(2, &["2024-01-05", "-4,50", "Coffee"]),
            text_row(3, &["2024-01-06", "-1,250.00", "Laptop"]),
        ];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert_eq!(mapped.transactions.len(), 1);
        assert_eq!(mapped.transactions[0].amount, -1250.0);
        assert_eq!(mapped.skipped[0].row, 2);
        assert_eq!(mapped.skipped[0].reason, SkipReason::BadAmount("-4,50".to_string()));
    }

    #[test]
    fn test_missing_and_bad_dates_are_skipped() {
        let rows = vec![
            text_row(2, &["2024-01-05", "", "No amount"]),
            text_row(3, &["soon", "-1", "Bad date"]),
            text_row(4, &["2024-01-05", "-1"]),
            text_row(5, &["2024-01-05", "-1", "Fine"]),
        ];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert_eq!(mapped.transactions.len(), 1);
        let reasons: Vec<_> = mapped.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::MissingField(Field::Amount),
                SkipReason::BadDate("soon".to_string()),
                SkipReason::MissingField(Field::Description),
            ]
        );
    }

    #[test]
    fn test_produced_plus_skipped_equals_rows() {
        let rows: Vec<RawRow> = (0..20)
            .map(|i| {
                let amount = if i % 3 == 0 { "bad".to_string() } else { format!("-{i}.25") };
                RawRow::new(
                    i + 2,
                    vec![
                        Cell::from_text("2024-02-01"),
                        Cell::from_text(&amount),
                        Cell::from_text(&format!("Vendor {i}")),
                    ],
                )
            })
            .collect();
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert!(mapped.transactions.len() <= rows.len());
        assert_eq!(mapped.transactions.len() + mapped.skipped_count(), rows.len());
        assert_eq!(mapped.skipped_count(), 7);
    }

    #[test]
    fn test_spreadsheet_cells() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let rows = vec![
            RawRow::new(2, vec![Cell::Date(dt), Cell::Number(-9.99), Cell::Text("Netflix".to_string())]),
            RawRow::new(3, vec![Cell::Number(45667.0), Cell::Number(20.0), Cell::Number(1042.0)]),
            RawRow::new(4, vec![Cell::Date(dt), Cell::Error("#VALUE!".to_string()), Cell::Text("x".to_string())]),
        ];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 2), &formats()).unwrap();
        assert_eq!(mapped.transactions.len(), 2);
        assert_eq!(mapped.transactions[0].date, dt.date());
        assert_eq!(mapped.transactions[1].date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert_eq!(mapped.transactions[1].description, "1042");
        assert!(matches!(mapped.skipped[0].reason, SkipReason::BadAmount(_)));
    }

    #[test]
    fn test_width_uses_widest_row_without_header() {
        let rows = vec![text_row(1, &["2024-01-05", "-1"]), text_row(2, &["2024-01-05", "-1", "x", "memo"])];
        let mapped = map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 3), &formats()).unwrap();
        assert_eq!(mapped.transactions.len(), 1);
        assert_eq!(mapped.skipped[0].reason, SkipReason::MissingField(Field::Description));
        assert!(map_rows(&rows, None, &ColumnMapping::by_index(0, 1, 4), &formats()).is_err());
    }

    #[test]
    fn test_identical_rows_get_distinct_stable_ids() {
        let rows = vec![
            text_row(2, &["2024-01-05", "-3.00", "Coffee"]),
            text_row(3, &["2024-01-05", "-3.00", "Coffee"]),
        ];
        let mapping = ColumnMapping::by_index(0, 1, 2);
        let first = map_rows(&rows, None, &mapping, &formats()).unwrap();
        let second = map_rows(&rows, None, &mapping, &formats()).unwrap();
        assert_ne!(first.transactions[0].id, first.transactions[1].id);
        assert_eq!(first, second);
        assert_eq!(first.transactions[0].id.len(), 12);
    }
}
