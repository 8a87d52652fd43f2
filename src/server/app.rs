use anyhow::{anyhow, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::error::ApiError;
use super::handlers::{datasets, health};
use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PAGE_LIMIT};
use crate::services::DatasetService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub datasets: DatasetService,
    pub default_page_limit: u64,
}

/// Knobs for the HTTP layer that come from configuration
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Exact allowed origin; `None` allows any origin without credentials
    pub cors_origin: Option<String>,
    pub default_page_limit: u64,
    pub max_upload_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            cors_origin: None,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub async fn create_app(db: DatabaseConnection, settings: ApiSettings) -> Result<Router> {
    let state = AppState {
        datasets: DatasetService::new(db.clone()),
        db,
        default_page_limit: settings.default_page_limit,
    };

    let cors = cors_layer(settings.cors_origin.as_deref())?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes())
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/datasets", get(datasets::list_datasets))
        .route("/dataset", post(datasets::upload_dataset))
        .route(
            "/dataset/:dataset_id",
            get(datasets::get_dataset).delete(datasets::delete_dataset),
        )
        .route(
            "/dataset/:dataset_id/:row_id",
            get(datasets::get_row)
                .put(datasets::update_row)
                .patch(datasets::update_row)
                .delete(datasets::delete_row),
        )
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ];

    let layer = match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow!("Invalid CORS origin: {}", e))?,
            )
            .allow_methods(methods)
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::HeaderName::from_static("x-requested-with"),
            ])
            .allow_credentials(true),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_credentials(false),
    };

    Ok(layer)
}

async fn route_not_found() -> ApiError {
    ApiError::status(StatusCode::NOT_FOUND, "Route not found")
}
