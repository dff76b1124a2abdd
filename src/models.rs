use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One untyped cell as read from the source file. Nothing is coerced here;
/// the mapper decides what each variant means for the field it feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Spreadsheet date or date-time cell.
    Date(NaiveDateTime),
    Empty,
    /// Spreadsheet error value such as `#DIV/0!`.
    Error(String),
}

impl Cell {
    /// Build a cell from delimited text; blank strings become `Empty`.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.date())
                } else {
                    write!(f, "{dt}")
                }
            }
            Cell::Empty => Ok(()),
            Cell::Error(e) => f.write_str(e),
        }
    }
}

/// An unprocessed row. `row` is the 1-based position in the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRow {
    pub row: usize,
    pub cells: Vec<Cell>,
}

impl RawRow {
    pub fn new(row: usize, cells: Vec<Cell>) -> Self {
        Self { row, cells }
    }

    pub fn width(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }
}

/// How a transaction got its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "rule", rename_all = "snake_case")]
pub enum CategorySource {
    /// Matched the rule at this position in the ordered rule list.
    Rule(usize),
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// Stable fingerprint; manual overrides are keyed by it.
    pub id: String,
    /// Source row this transaction was mapped from.
    pub row: usize,
    pub date: NaiveDate,
    /// Signed amount exactly as it appeared in the file.
    pub amount: f64,
    pub description: String,
    pub category: Option<String>,
    pub category_source: Option<CategorySource>,
}

impl Transaction {
    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in '{s}'"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in '{s}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in '{s}'"));
        }
        Ok(Self { year, month })
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}
