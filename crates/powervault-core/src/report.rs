//! Parsers for `SMcli` report output.
//!
//! Pure functions over captured stdout. A report either parses as a whole or
//! fails with a pass-level error; records that are individually broken are
//! returned as row-level errors next to the rows that did parse.

use std::mem;

use thiserror::Error;

use crate::query::{QueryKind, ReportFormat};

/// Line index carrying the disk count in the summary report.
const SUMMARY_COUNT_LINE: usize = 1;
/// Single-space separated field index of the disk count on that line.
const SUMMARY_COUNT_FIELD: usize = 7;
/// Line index of the first disk row in the summary report.
const SUMMARY_FIRST_DISK_LINE: usize = 3;

/// Error type for report and row parsing failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("report has no header line")]
    MissingHeader,
    #[error("malformed disk count {0:?}")]
    MalformedCount(String),
    #[error("report declares {expected} disks but only {found} disk lines follow")]
    Truncated { expected: usize, found: usize },
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("invalid number {value:?} for {field} at line {line}")]
    NumericFormat {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("unknown disk ordinal {0:?}")]
    UnknownOrdinal(String),
}

impl ParseError {
    /// Row-level errors skip one record; the rest abort the pass.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ParseError::MalformedRow { .. }
                | ParseError::NumericFormat { .. }
                | ParseError::UnknownOrdinal(_)
        )
    }
}

/// One tokenized report line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedRow {
    /// 1-based line number in the raw output.
    pub line: usize,
    pub fields: Vec<String>,
}

impl ParsedRow {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        Self { line, fields }
    }

    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}

/// Rows of one report, plus the records that could not be tokenized.
#[derive(Debug, Clone, Default)]
pub struct ParsedReport {
    pub rows: Vec<ParsedRow>,
    pub rejected: Vec<ParseError>,
}

/// Parses raw output using the grammar bound to `kind`.
pub fn parse(kind: QueryKind, raw: &str) -> Result<ParsedReport, ParseError> {
    match kind.format() {
        ReportFormat::Csv => parse_csv_report(raw),
        ReportFormat::Summary => parse_summary_report(raw).map(|rows| ParsedReport {
            rows,
            rejected: Vec::new(),
        }),
    }
}

/// Parses a performance report: banner line, then CSV records.
///
/// Empty lines are skipped. A quoted field may span lines; the record is
/// numbered by its first line. Field count per record is not enforced.
pub fn parse_csv_report(raw: &str) -> Result<ParsedReport, ParseError> {
    let Some((_banner, body)) = raw.split_once('\n') else {
        return Err(ParseError::MissingHeader);
    };

    let mut report = ParsedReport::default();
    let mut pending: Option<(usize, String)> = None;
    for (idx, line) in body.lines().enumerate() {
        // +2: 1-based, and the banner is line 1
        let line_no = idx + 2;
        let (start, record) = match pending.take() {
            Some((start, mut record)) => {
                record.push('\n');
                record.push_str(line);
                (start, record)
            }
            None if line.trim().is_empty() => continue,
            None => (line_no, line.to_string()),
        };
        match split_csv_record(&record) {
            Ok(fields) => report.rows.push(ParsedRow::new(start, fields)),
            Err(RecordError::Unterminated) => pending = Some((start, record)),
            Err(RecordError::Malformed(reason)) => {
                report.rejected.push(ParseError::MalformedRow {
                    line: start,
                    reason,
                });
            }
        }
    }

    if let Some((start, _)) = pending {
        report.rejected.push(ParseError::MalformedRow {
            line: start,
            reason: "unterminated quoted field".to_string(),
        });
    }
    Ok(report)
}

/// Parses the physical disk summary: a declared disk count, then exactly that
/// many whitespace-aligned disk lines.
pub fn parse_summary_report(raw: &str) -> Result<Vec<ParsedRow>, ParseError> {
    let lines: Vec<&str> = raw.lines().collect();

    let count_line = lines
        .get(SUMMARY_COUNT_LINE)
        .ok_or(ParseError::MissingHeader)?;
    let count_field = count_line
        .split(' ')
        .nth(SUMMARY_COUNT_FIELD)
        .ok_or_else(|| ParseError::MalformedCount(count_line.trim().to_string()))?;
    let expected: usize = count_field
        .trim()
        .parse()
        .map_err(|_| ParseError::MalformedCount(count_field.to_string()))?;

    let disk_lines = lines.get(SUMMARY_FIRST_DISK_LINE..).unwrap_or(&[]);
    if disk_lines.len() < expected {
        return Err(ParseError::Truncated {
            expected,
            found: disk_lines.len(),
        });
    }

    Ok(disk_lines[..expected]
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            ParsedRow::new(
                SUMMARY_FIRST_DISK_LINE + idx + 1,
                line.split_whitespace().map(str::to_string).collect(),
            )
        })
        .collect())
}

#[derive(Clone, Copy)]
enum CsvState {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote seen inside a quoted field: either an escape or the close.
    QuotedQuote,
}

#[derive(Debug, PartialEq)]
enum RecordError {
    /// Input ended inside a quoted field.
    Unterminated,
    Malformed(String),
}

/// Splits one CSV record. Quoted fields may contain commas, newlines and
/// `""` escapes.
fn split_csv_record(line: &str) -> Result<Vec<String>, RecordError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut state = CsvState::FieldStart;

    for (pos, c) in line.chars().enumerate() {
        state = match (state, c) {
            (CsvState::FieldStart | CsvState::Unquoted | CsvState::QuotedQuote, ',') => {
                fields.push(mem::take(&mut field));
                CsvState::FieldStart
            }
            (CsvState::FieldStart, '"') => CsvState::Quoted,
            (CsvState::Unquoted, '"') => {
                return Err(RecordError::Malformed(format!(
                    "bare quote in unquoted field at column {}",
                    pos + 1
                )));
            }
            (CsvState::FieldStart | CsvState::Unquoted, c) => {
                field.push(c);
                CsvState::Unquoted
            }
            (CsvState::Quoted, '"') => CsvState::QuotedQuote,
            (CsvState::Quoted, c) => {
                field.push(c);
                CsvState::Quoted
            }
            (CsvState::QuotedQuote, '"') => {
                field.push('"');
                CsvState::Quoted
            }
            (CsvState::QuotedQuote, c) => {
                return Err(RecordError::Malformed(format!(
                    "unexpected {:?} after closing quote at column {}",
                    c,
                    pos + 1
                )));
            }
        };
    }

    if let CsvState::Quoted = state {
        return Err(RecordError::Unterminated);
    }
    fields.push(field);
    Ok(fields)
}
