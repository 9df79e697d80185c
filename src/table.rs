//! Delimited-table parsing for export files.
//!
//! Comma-separated with double-quote escaping: inside a quoted field a doubled
//! quote is a literal quote, and commas and newlines do not split.

use crate::config::ColumnRef;

/// Split text into records of fields. Blank lines are dropped.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}

/// A parsed table: a header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn parse(text: &str) -> Self {
        let mut records = parse_records(text).into_iter();
        let header = records
            .next()
            .map(|h| h.into_iter().map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Self {
            header,
            rows: records.collect(),
        }
    }

    /// Resolve a column reference to an index.
    pub fn column(&self, column: &ColumnRef) -> Option<usize> {
        let mut matches = self
            .header
            .iter()
            .enumerate()
            .filter(|(_, h)| h.as_str() == column.header)
            .map(|(i, _)| i);
        let first = matches.next()?;
        if column.occurrence == 0 {
            return Some(first);
        }
        Some(matches.nth(column.occurrence - 1).unwrap_or(first))
    }

    /// Whether a row has exactly as many fields as the header.
    pub fn is_well_formed(&self, row: &[String]) -> bool {
        row.len() == self.header.len()
    }
}

/// Field at an optional column index, trimmed; empty when absent.
pub fn field(row: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Lenient number parsing: thousands separators stripped, negatives and
/// non-finite values clamped to 0.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
