use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendError};
use crate::models::{Cell, RawRow};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];
const DELIMITERS: &[u8] = b",;\t|";
const SNIFF_BYTES: usize = 4096;
const BINARY_SCAN_BYTES: usize = 8192;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Delimited,
    Xlsx,
    Xls,
    Ods,
}

impl FileFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Ods => "ods",
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        !matches!(self, Self::Delimited)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// BOM-aware: UTF-8, then UTF-16 when a BOM says so, then Latin-1.
    #[default]
    Auto,
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Declared format; detected from name and content when unset.
    #[serde(default)]
    pub format: Option<FileFormat>,
    /// Declared delimiter; sniffed when unset.
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    /// Worksheet to read; the first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
}

fn default_has_header() -> bool {
    true
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimiter: None,
            encoding: Encoding::Auto,
            has_header: default_has_header(),
            sheet: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn extension(name: Option<&str>) -> Option<String> {
    let name = name?;
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Decide what kind of file `bytes` holds. Content wins over the extension.
pub fn detect_format(name: Option<&str>, bytes: &[u8]) -> Result<FileFormat> {
    if bytes.is_empty() {
        return Err(SpendError::Format("file is empty".to_string()));
    }
    let ext = extension(name);
    if bytes.starts_with(ZIP_MAGIC) {
        return Ok(if ext.as_deref() == Some("ods") {
            FileFormat::Ods
        } else {
            FileFormat::Xlsx
        });
    }
    if bytes.starts_with(OLE_MAGIC) {
        return Ok(FileFormat::Xls);
    }
    if let Some(ext) = ext.as_deref() {
        if SPREADSHEET_EXTENSIONS.contains(&ext) {
            return Err(SpendError::Format(format!(
                "file has a .{ext} extension but is not a readable workbook"
            )));
        }
    }
    let is_utf16 = bytes.starts_with(UTF16_LE_BOM) || bytes.starts_with(UTF16_BE_BOM);
    let head = &bytes[..bytes.len().min(BINARY_SCAN_BYTES)];
    if !is_utf16 && head.contains(&0) {
        return Err(SpendError::Format(
            "file contains binary data and is not delimited text or a spreadsheet".to_string(),
        ));
    }
    Ok(FileFormat::Delimited)
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(SpendError::Encoding(
            "UTF-16 text has an odd number of bytes".to_string(),
        ));
    }
    let units = bytes.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| SpendError::Encoding(format!("invalid UTF-16 text: {e}")))
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn decode_text(bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Latin1 => Ok(decode_latin1(bytes)),
        Encoding::Utf8 => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            String::from_utf8(body.to_vec())
                .map_err(|e| SpendError::Encoding(format!("file is not valid UTF-8: {e}")))
        }
        Encoding::Auto => {
            if let Some(body) = bytes.strip_prefix(UTF16_LE_BOM) {
                return decode_utf16(body, true);
            }
            if let Some(body) = bytes.strip_prefix(UTF16_BE_BOM) {
                return decode_utf16(body, false);
            }
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            match std::str::from_utf8(body) {
                Ok(text) => Ok(text.to_string()),
                Err(_) => {
                    tracing::debug!("input is not UTF-8, decoding as Latin-1");
                    Ok(decode_latin1(body))
                }
            }
        }
    }
}

/// Leading whole lines of `text`, at most `SNIFF_BYTES` long.
fn sniff_sample(text: &str) -> &str {
    if text.len() <= SNIFF_BYTES {
        return text;
    }
    let mut end = SNIFF_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let head = &text[..end];
    match head.rfind('\n') {
        Some(nl) => &head[..nl],
        None => head,
    }
}

/// Pick the delimiter that splits the most rows into the same number (>1) of
/// fields. Earlier candidates win ties; `,` when nothing splits.
pub fn sniff_delimiter(text: &str) -> u8 {
    let sample = sniff_sample(text);
    let mut best: Option<(u8, usize)> = None;

    for &delim in DELIMITERS {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delim)
            .from_reader(sample.as_bytes());
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for record in rdr.records().flatten() {
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            *counts.entry(record.len()).or_default() += 1;
        }
        let consistent = counts
            .into_iter()
            .filter(|(fields, _)| *fields > 1)
            .map(|(_, rows)| rows)
            .max()
            .unwrap_or(0);
        if consistent > 0 && best.map_or(true, |(_, rows)| consistent > rows) {
            best = Some((delim, consistent));
        }
    }
    best.map(|(d, _)| d).unwrap_or(b',')
}

/// Convert an Excel serial number (days since 1899-12-30) to a date-time.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2958465 is 9999-12-31, the last date Excel can represent.
    if !serial.is_finite() || !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    base.checked_add_signed(chrono::Duration::days(days))?
        .checked_add_signed(chrono::Duration::seconds(seconds))
}

// ---------------------------------------------------------------------------
// RecordReader
// ---------------------------------------------------------------------------

/// Physical line numbers for byte offsets in decoded text. The csv reader
/// skips empty lines without counting them, so rows are located here.
struct LineIndex {
    /// Offset of the first non-terminator byte of each non-empty line, with
    /// that line's 1-based number.
    starts: Vec<(usize, usize)>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = Vec::new();
        let mut offset = 0;
        for (i, line) in text.split_inclusive('\n').enumerate() {
            if let Some(pos) = line.find(|c| c != '\r' && c != '\n') {
                starts.push((offset + pos, i + 1));
            }
            offset += line.len();
        }
        Self { starts }
    }

    /// Line of the record whose read began at `byte`. Leftover terminator
    /// bytes and empty lines before it are passed over.
    fn line_at(&self, byte: u64) -> Option<usize> {
        let byte = usize::try_from(byte).ok()?;
        let i = self.starts.partition_point(|&(start, _)| start < byte);
        self.starts.get(i).map(|&(_, line)| line)
    }
}

enum RowSource {
    Delimited {
        records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
        lines: LineIndex,
        line: usize,
    },
    Sheet(std::vec::IntoIter<RawRow>),
}

/// Lazy, single-pass sequence of raw rows from one uploaded file.
pub struct RecordReader {
    format: FileFormat,
    delimiter: Option<u8>,
    header: Option<RawRow>,
    source: RowSource,
}

impl RecordReader {
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Delimiter in use for delimited text, `None` for spreadsheets.
    pub fn delimiter(&self) -> Option<char> {
        self.delimiter.map(char::from)
    }

    pub fn take_header(&mut self) -> Option<RawRow> {
        self.header.take()
    }

    fn next_raw(&mut self) -> Option<Result<RawRow>> {
        match &mut self.source {
            RowSource::Delimited { records, lines, line } => {
                let record = match records.next()? {
                    Ok(r) => r,
                    Err(e) => return Some(Err(e.into())),
                };
                let row = record
                    .position()
                    .and_then(|p| lines.line_at(p.byte()))
                    .unwrap_or(*line + 1);
                *line = row;
                let cells = record.iter().map(Cell::from_text).collect();
                Some(Ok(RawRow::new(row, cells)))
            }
            RowSource::Sheet(rows) => rows.next().map(Ok),
        }
    }

    fn next_non_blank(&mut self) -> Option<Result<RawRow>> {
        loop {
            match self.next_raw()? {
                Ok(row) if row.is_blank() => continue,
                other => return Some(other),
            }
        }
    }
}

impl Iterator for RecordReader {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_non_blank()
    }
}

/// Open `bytes` (named `name`, used for extension hints) as a row sequence.
pub fn read_records(name: Option<&str>, bytes: Vec<u8>, options: &ParseOptions) -> Result<RecordReader> {
    let format = match options.format {
        Some(f) => f,
        None => detect_format(name, &bytes)?,
    };
    tracing::debug!(format = format.key(), "detected file format");

    let mut reader = if format.is_spreadsheet() {
        open_spreadsheet(format, bytes, options)?
    } else {
        open_delimited(&bytes, options)?
    };

    if options.has_header {
        reader.header = match reader.next_non_blank() {
            Some(row) => Some(row?),
            None => None,
        };
    }
    Ok(reader)
}

pub fn open_file(file_path: &Path, options: &ParseOptions) -> Result<RecordReader> {
    let bytes = std::fs::read(file_path)?;
    let name = file_path.file_name().and_then(|n| n.to_str());
    read_records(name, bytes, options)
}

fn open_delimited(bytes: &[u8], options: &ParseOptions) -> Result<RecordReader> {
    let text = decode_text(bytes, options.encoding)?;
    let delimiter = match options.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => {
            return Err(SpendError::Format(format!(
                "delimiter '{c}' is not a single-byte character"
            )))
        }
        None => {
            let d = sniff_delimiter(&text);
            tracing::debug!(delimiter = %char::from(d).escape_default(), "sniffed delimiter");
            d
        }
    };
    let lines = LineIndex::new(&text);
    let records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(Cursor::new(text.into_bytes()))
        .into_records();
    Ok(RecordReader {
        format: FileFormat::Delimited,
        delimiter: Some(delimiter),
        header: None,
        source: RowSource::Delimited { records, lines, line: 0 },
    })
}

#[cfg(not(feature = "xlsx"))]
fn open_spreadsheet(format: FileFormat, _bytes: Vec<u8>, _options: &ParseOptions) -> Result<RecordReader> {
    Err(SpendError::Format(format!(
        "{} support is not compiled into this build",
        format.key()
    )))
}

#[cfg(feature = "xlsx")]
fn open_spreadsheet(format: FileFormat, bytes: Vec<u8>, options: &ParseOptions) -> Result<RecordReader> {
    use calamine::{Ods, Reader, Xls, Xlsx};

    let cursor = Cursor::new(bytes);
    let sheet = options.sheet.as_deref();
    let rows = match format {
        FileFormat::Xlsx => read_sheet(Xlsx::new(cursor).map_err(workbook_error)?, sheet)?,
        FileFormat::Xls => read_sheet(Xls::new(cursor).map_err(workbook_error)?, sheet)?,
        FileFormat::Ods => read_sheet(Ods::new(cursor).map_err(workbook_error)?, sheet)?,
        FileFormat::Delimited => {
            return Err(SpendError::Format("delimited text is not a workbook".to_string()))
        }
    };
    Ok(RecordReader {
        format,
        delimiter: None,
        header: None,
        source: RowSource::Sheet(rows.into_iter()),
    })
}

#[cfg(feature = "xlsx")]
fn workbook_error(e: impl std::fmt::Display) -> SpendError {
    SpendError::Format(format!("could not open workbook: {e}"))
}

#[cfg(feature = "xlsx")]
fn read_sheet<R, RS>(mut workbook: R, sheet: Option<&str>) -> Result<Vec<RawRow>>
where
    RS: std::io::Read + std::io::Seek,
    R: calamine::Reader<RS>,
    R::Error: std::fmt::Display,
{
    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| SpendError::Format(format!("workbook has no sheet named '{wanted}'")))?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| SpendError::Format("workbook has no sheets".to_string()))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| SpendError::Spreadsheet(format!("sheet '{name}': {e}")))?;

    // Keep indexes aligned with sheet columns when the used range is offset.
    let (first_row, first_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let rows = range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            let mut out = vec![Cell::Empty; first_col];
            out.extend(cells.iter().map(cell_from_data));
            RawRow::new(first_row + i + 1, out)
        })
        .collect();
    Ok(rows)
}

#[cfg(feature = "xlsx")]
fn cell_from_data(data: &calamine::Data) -> Cell {
    use calamine::Data;

    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_datetime(serial)
                .map(Cell::Date)
                .unwrap_or(Cell::Number(serial))
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::from_text(s)),
        Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(e) => Cell::Error(e.to_string()),
    }
}

#[cfg(feature = "xlsx")]
fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
