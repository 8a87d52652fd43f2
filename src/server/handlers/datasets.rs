use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, warn};

use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::validation::{
    parse_dataset_id, parse_list_query, parse_row_params, parse_rows_query, validate_json,
    UpdateRowRequest,
};
use crate::server::response::{ok, respond};
use crate::services::RowRecord;

/// Multipart field that carries the CSV upload
const UPLOAD_FIELD: &str = "file";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedRow {
    row_id: i32,
    dataset_id: i32,
}

pub async fn list_datasets(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let query = parse_list_query(&params, state.default_page_limit)?;
    let listing = state
        .datasets
        .list_datasets(&query)
        .await
        .map_err(|err| {
            ApiError::from_service(err, StatusCode::NOT_FOUND, "Failed to fetch datasets")
        })?;

    let message = if listing.total == 0 {
        "No datasets found. Upload a CSV file to get started."
    } else if listing.data.is_empty() {
        "No datasets match your criteria"
    } else {
        "Datasets found"
    };

    Ok(ok(listing, message))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let dataset_id = parse_dataset_id(&dataset_id)?;
    let query = parse_rows_query(&params, state.default_page_limit)?;

    let page = state
        .datasets
        .get_dataset_rows(dataset_id, &query)
        .await
        .map_err(|err| {
            ApiError::from_service(err, StatusCode::BAD_REQUEST, "Failed to fetch dataset")
        })?;

    let message = if query.search_query.is_some() {
        format!("Found {} matching rows", page.pagination.total)
    } else {
        "Dataset found".to_string()
    };

    Ok(ok(page, message))
}

pub async fn get_row(
    State(state): State<AppState>,
    Path((dataset_id, row_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (dataset_id, row_id) = parse_row_params(&dataset_id, &row_id)?;

    let row = state
        .datasets
        .get_row(dataset_id, row_id)
        .await
        .map_err(|err| ApiError::from_service(err, StatusCode::BAD_REQUEST, "Failed to fetch row"))?;

    Ok(ok(RowRecord::from(row), "Row found"))
}

pub async fn update_row(
    State(state): State<AppState>,
    Path((dataset_id, row_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let (dataset_id, row_id) = parse_row_params(&dataset_id, &row_id)?;
    let request: UpdateRowRequest = validate_json(&body)?;

    let updated = state
        .datasets
        .update_row(dataset_id, row_id, request.data)
        .await
        .map_err(|err| ApiError::from_service(err, StatusCode::NOT_FOUND, "Failed to update row"))?;

    Ok(ok(updated, format!("Row {} updated successfully.", row_id)))
}

pub async fn delete_row(
    State(state): State<AppState>,
    Path((dataset_id, row_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let (dataset_id, row_id) = parse_row_params(&dataset_id, &row_id)?;

    state
        .datasets
        .delete_row(dataset_id, row_id)
        .await
        .map_err(|err| ApiError::from_service(err, StatusCode::NOT_FOUND, "Failed to delete row"))?;

    Ok(respond(
        StatusCode::CREATED,
        DeletedRow { row_id, dataset_id },
        format!("Row {} deleted from dataset {}.", row_id, dataset_id),
    ))
}

pub async fn upload_dataset(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Upload rejected: {}", rejection.body_text());
        ApiError::bad_request("CSV file is required")
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::status(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::status(e.status(), e.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("CSV file is required"))?;

    let created = state
        .datasets
        .create_from_csv(&filename, &bytes)
        .await
        .map_err(|err| {
            if err.is_ingestion_error() {
                warn!("CSV upload '{}' could not be parsed: {}", filename, err);
                ApiError::status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to upload CSV: {}", err),
                )
            } else {
                ApiError::from_service(err, StatusCode::NOT_FOUND, "Failed to upload CSV")
            }
        })?;

    Ok(respond(StatusCode::CREATED, created, "Dataset uploaded"))
}

pub async fn delete_dataset(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> Result<Response, ApiError> {
    let dataset_id = parse_dataset_id(&dataset_id)?;

    state
        .datasets
        .delete_dataset(dataset_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                warn!("Delete requested for missing dataset {}", dataset_id);
            } else {
                error!("Failed to delete dataset {}: {}", dataset_id, err);
            }
            ApiError::status(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete dataset")
        })?;

    Ok(ok(json!(null), format!("Dataset {} deleted", dataset_id)))
}
