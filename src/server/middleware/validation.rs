//! Request validation for the dataset routes.
//!
//! Each function turns raw path, query or body input into the typed value a
//! handler needs, or an [`ApiError::Validation`] carrying a field error tree:
//!
//! ```json
//! { "errors": [], "properties": { "limit": { "errors": ["Too big: expected number to be <=100"] } } }
//! ```

use axum::body::Bytes;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::config::MAX_PAGE_LIMIT;
use crate::server::error::ApiError;
use crate::services::{ListDatasetsQuery, RowsQuery, SortField, SortOrder};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrorNode {
    pub errors: Vec<String>,
}

/// Errors for the whole input plus one entry per offending field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors {
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, FieldErrorNode>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.properties
            .entry(field.to_string())
            .or_default()
            .errors
            .push(message.into());
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.properties.is_empty()
    }

    /// `Ok(value)` when nothing was recorded
    pub fn finish<T>(self, value: T) -> Result<T, ApiError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.errors.clone();
        for (field, node) in &self.properties {
            for message in &node.errors {
                parts.push(format!("{}: {}", field, message));
            }
        }
        write!(f, "{}", parts.join("; "))
    }
}

pub trait Validate {
    fn validate(&self, errors: &mut FieldErrors);
}

/// Body of `PUT/PATCH /api/dataset/:datasetId/:rowId`
#[derive(Debug, Deserialize)]
pub struct UpdateRowRequest {
    #[serde(default)]
    pub data: Value,
}

impl Validate for UpdateRowRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        match &self.data {
            Value::Object(_) => {}
            Value::Null => errors.add("data", "Invalid input: expected object, received null"),
            Value::Array(_) => errors.add("data", "Invalid input: expected object, received array"),
            _ => errors.add("data", "Invalid input: expected object"),
        }
    }
}

pub fn validate_json<T: DeserializeOwned + Validate>(body: &Bytes) -> Result<T, ApiError> {
    let data: T = serde_json::from_slice(body).map_err(|e| {
        let mut errors = FieldErrors::new();
        errors.add_form(format!("Invalid JSON: {}", e));
        ApiError::validation(errors)
    })?;

    let mut errors = FieldErrors::new();
    data.validate(&mut errors);
    errors.finish(data)
}

/// Coerce text to an integer the way a form library does: blank is zero,
/// whole floats are accepted, anything else is rejected.
fn coerce_integer(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => {
            if value.abs() <= i64::MAX as f64 {
                Ok(value as i64)
            } else {
                Err("Invalid input: expected int, received number".to_string())
            }
        }
        Ok(value) if value.is_finite() => {
            Err("Invalid input: expected int, received number".to_string())
        }
        _ => Err("Invalid input: expected number, received NaN".to_string()),
    }
}

fn bounded_integer(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&String>,
    default: i64,
    min: i64,
    max: Option<i64>,
) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    match coerce_integer(raw) {
        Ok(value) if value < min => {
            errors.add(field, format!("Too small: expected number to be >={}", min));
            default
        }
        Ok(value) if max.is_some_and(|max| value > max) => {
            errors.add(
                field,
                format!("Too big: expected number to be <={}", max.unwrap_or_default()),
            );
            default
        }
        Ok(value) => value,
        Err(message) => {
            errors.add(field, message);
            default
        }
    }
}

fn page_and_limit(
    errors: &mut FieldErrors,
    params: &HashMap<String, String>,
    default_limit: u64,
) -> (u64, u64) {
    let page = bounded_integer(errors, "page", params.get("page"), 1, 1, None);
    let limit = bounded_integer(
        errors,
        "limit",
        params.get("limit"),
        default_limit as i64,
        1,
        Some(MAX_PAGE_LIMIT as i64),
    );
    (page as u64, limit as u64)
}

fn optional_text(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|value| !value.is_empty()).cloned()
}

/// Query string of `GET /api/datasets`
pub fn parse_list_query(
    params: &HashMap<String, String>,
    default_limit: u64,
) -> Result<ListDatasetsQuery, ApiError> {
    let mut errors = FieldErrors::new();
    let (page, limit) = page_and_limit(&mut errors, params, default_limit);

    let sort = match params.get("sort").filter(|value| !value.is_empty()) {
        Some(raw) => SortField::parse(raw).unwrap_or_else(|| {
            errors.add(
                "sort",
                format!(
                    "Invalid option: expected one of {}",
                    SortField::ALLOWED
                        .iter()
                        .map(|s| format!("\"{}\"", s))
                        .collect::<Vec<_>>()
                        .join("|")
                ),
            );
            SortField::default()
        }),
        None => SortField::default(),
    };

    let order = match params.get("order").filter(|value| !value.is_empty()) {
        Some(raw) => SortOrder::parse(&raw.to_lowercase()).unwrap_or_else(|| {
            errors.add("order", "Invalid option: expected one of \"asc\"|\"desc\"");
            SortOrder::default()
        }),
        None => SortOrder::default(),
    };

    let query = ListDatasetsQuery {
        page,
        limit,
        sort,
        order,
        search_field: optional_text(params, "searchField"),
        search_query: optional_text(params, "searchQuery"),
    };
    errors.finish(query)
}

/// Query string of `GET /api/dataset/:datasetId`
pub fn parse_rows_query(
    params: &HashMap<String, String>,
    default_limit: u64,
) -> Result<RowsQuery, ApiError> {
    let mut errors = FieldErrors::new();
    let (page, limit) = page_and_limit(&mut errors, params, default_limit);
    let query = RowsQuery {
        page,
        limit,
        search_query: optional_text(params, "searchQuery"),
    };
    errors.finish(query)
}

fn id_param(errors: &mut FieldErrors, field: &str, raw: &str, min: i64) -> i32 {
    let value = bounded_integer(
        errors,
        field,
        Some(&raw.to_string()),
        0,
        min,
        Some(i32::MAX as i64),
    );
    value as i32
}

/// `:datasetId` must be a positive integer
pub fn parse_dataset_id(raw: &str) -> Result<i32, ApiError> {
    let mut errors = FieldErrors::new();
    let dataset_id = id_param(&mut errors, "datasetId", raw, 1);
    errors.finish(dataset_id)
}

/// `:datasetId` positive, `:rowId` non-negative
pub fn parse_row_params(dataset_raw: &str, row_raw: &str) -> Result<(i32, i32), ApiError> {
    let mut errors = FieldErrors::new();
    let dataset_id = id_param(&mut errors, "datasetId", dataset_raw, 1);
    let row_id = id_param(&mut errors, "rowId", row_raw, 0);
    errors.finish((dataset_id, row_id))
}
