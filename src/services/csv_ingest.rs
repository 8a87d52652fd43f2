//! CSV upload parsing
//!
//! Turns an uploaded buffer into one JSON object per data record. The header
//! record names the keys, and cell text is typed the way a spreadsheet user
//! expects: numbers become numbers, `true`/`false` become booleans and empty
//! cells become `null`. Numbers a JSON client cannot hold exactly stay text.

use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};

use crate::errors::{DatasetError, DatasetResult};

/// 2^53; numbers must lie strictly inside +/- this bound.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b'|', b';'];
const DELIMITER_SAMPLE_ROWS: usize = 10;

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").expect("static regex")
});

/// Parse a CSV buffer into ordered row objects.
pub fn parse_csv(buffer: &[u8]) -> DatasetResult<Vec<Map<String, Value>>> {
    let content = std::str::from_utf8(buffer)
        .map_err(|e| DatasetError::InvalidCsv(format!("file is not valid UTF-8: {}", e)))?;

    let delimiter = guess_delimiter(content);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .trim(Trim::None)
        .from_reader(content.as_bytes());

    let raw_headers = reader.headers()?.clone();
    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.is_empty()) {
        return Err(DatasetError::InvalidCsv("missing header row".to_string()));
    }
    let headers = unique_headers(&raw_headers);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if is_blank(&record) {
            continue;
        }

        let mut row = Map::with_capacity(headers.len());
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), infer_value(field));
        }
        if record.len() > headers.len() {
            tracing::debug!(
                "Dropping {} field(s) beyond the header on line {}",
                record.len() - headers.len(),
                record.position().map(|p| p.line()).unwrap_or_default()
            );
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DatasetError::EmptySource(
            "CSV parsing failed or empty data".to_string(),
        ));
    }

    Ok(rows)
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0) == Some("")
}

/// Pick the candidate delimiter that splits the leading records into the
/// most consistent field counts. Falls back to comma.
pub fn guess_delimiter(content: &str) -> u8 {
    let mut best: Option<(u8, usize, f64)> = None;

    for delimiter in DELIMITER_CANDIDATES {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let counts: Vec<usize> = reader
            .records()
            .take(DELIMITER_SAMPLE_ROWS)
            .filter_map(Result::ok)
            .filter(|record| !is_blank(record))
            .map(|record| record.len())
            .collect();
        if counts.is_empty() {
            continue;
        }

        let delta: usize = counts.windows(2).map(|pair| pair[0].abs_diff(pair[1])).sum();
        let average = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        if average <= 1.99 {
            continue;
        }

        let better = match best {
            None => true,
            Some((_, best_delta, best_average)) => delta <= best_delta && average > best_average,
        };
        if better {
            best = Some((delimiter, delta, average));
        }
    }

    best.map(|(delimiter, _, _)| delimiter).unwrap_or(b',')
}

/// Repeated header names get `_1`, `_2`, ... suffixes so no column is lost.
fn unique_headers(headers: &StringRecord) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut suffixes: HashMap<&str, usize> = HashMap::new();

    headers
        .iter()
        .map(|header| {
            let mut name = header.to_string();
            if taken.contains(&name) {
                let suffix = suffixes.entry(header).or_insert(0);
                loop {
                    *suffix += 1;
                    name = format!("{}_{}", header, suffix);
                    if !taken.contains(&name) {
                        break;
                    }
                }
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

/// Type a single cell.
pub fn infer_value(field: &str) -> Value {
    match field {
        "" => return Value::Null,
        "true" | "TRUE" => return Value::Bool(true),
        "false" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if NUMERIC.is_match(field) {
        if let Some(number) = parse_number(field.trim()) {
            return Value::Number(number);
        }
    }
    Value::String(field.to_string())
}

fn parse_number(text: &str) -> Option<Number> {
    let parsed: f64 = text.parse().ok()?;
    if parsed.abs() >= MAX_SAFE_INTEGER {
        return None;
    }
    if parsed.fract() == 0.0 {
        return Some(Number::from(parsed as i64));
    }
    Number::from_f64(parsed)
}

/// Dataset name for an uploaded file: the file name without its last extension.
pub fn dataset_name_from_filename(filename: &str) -> String {
    match filename.rfind('.') {
        Some(dot) => {
            let extension = &filename[dot + 1..];
            if extension.is_empty() || extension.contains('/') {
                filename.to_string()
            } else {
                filename[..dot].to_string()
            }
        }
        None => filename.to_string(),
    }
}
