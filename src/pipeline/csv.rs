//! Minimal CSV reader for uploaded record tables.
//!
//! Handles quoted fields, embedded commas, doubled quotes, and CRLF. Rows
//! come back as JSON objects keyed by the header row so they feed straight
//! into the legacy field mapper.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CsvError {
    #[error("CSV needs a header row and at least one data row")]
    TooShort,

    #[error("CSV header row is empty")]
    EmptyHeader,
}

/// Parse CSV text into header-keyed records. Missing trailing cells become
/// empty strings; headerless columns are named `col_N`.
pub fn parse_csv(text: &str) -> Result<Vec<Value>, CsvError> {
    let rows: Vec<Vec<String>> = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(split_csv_line)
        .collect();

    if rows.len() < 2 {
        return Err(CsvError::TooShort);
    }
    let header = &rows[0];
    if header.iter().all(|h| h.is_empty()) {
        return Err(CsvError::EmptyHeader);
    }

    let records = rows[1..]
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (i, name) in header.iter().enumerate() {
                let key = if name.is_empty() {
                    format!("col_{}", i + 1)
                } else {
                    name.clone()
                };
                let cell = row.get(i).cloned().unwrap_or_default();
                obj.insert(key, Value::String(cell));
            }
            Value::Object(obj)
        })
        .collect();

    Ok(records)
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                out.push(cur.trim().to_string());
                cur = String::new();
            }
            _ => cur.push(ch),
        }
    }
    out.push(cur.trim().to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_rows_keyed_by_header() {
        let records = parse_csv("name,drug,startDate\nJane Doe,Ceftriaxone,2026-01-16").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "Jane Doe");
        assert_eq!(records[0]["drug"], "Ceftriaxone");
        assert_eq!(records[0]["startDate"], "2026-01-16");
    }

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let records = parse_csv("name,notes\n\"Doe, Jane\",\"said \"\"ok\"\"\"").unwrap();
        assert_eq!(records[0]["name"], "Doe, Jane");
        assert_eq!(records[0]["notes"], "said \"ok\"");
    }

    #[test]
    fn short_rows_pad_with_empty_strings() {
        let records = parse_csv("a,b,c\n1,2").unwrap();
        assert_eq!(records[0]["c"], "");
    }

    #[test]
    fn crlf_and_blank_lines_tolerated() {
        let records = parse_csv("a,b\r\n1,2\r\n\r\n3,4\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn header_only_is_an_error() {
        assert_eq!(parse_csv("a,b,c"), Err(CsvError::TooShort));
        assert_eq!(parse_csv(""), Err(CsvError::TooShort));
    }

    #[test]
    fn empty_header_is_an_error() {
        assert_eq!(parse_csv(",,\n1,2,3"), Err(CsvError::EmptyHeader));
    }

    #[test]
    fn headerless_columns_get_positional_names() {
        let records = parse_csv("a,,c\n1,2,3").unwrap();
        assert_eq!(records[0]["col_2"], "2");
    }
}
