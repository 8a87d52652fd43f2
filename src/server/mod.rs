pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;

use anyhow::Result;
use clap::Subcommand;
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use tracing::info;

use crate::config::AppConfig;
use crate::database::{connect_and_migrate, establish_connection, migrations::Migrator};
use crate::services::DatasetService;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(config: &AppConfig) -> Result<()> {
    let db = connect_and_migrate(&config.database_url).await?;
    info!("Database migrations completed");

    let app = app::create_app(db, config.api_settings()).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!(
        "Server running on http://0.0.0.0:{} ({})",
        config.port, config.app_env
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  GET    /health                        - Health check");
    info!("  GET    /api/datasets                  - List datasets");
    info!("  POST   /api/dataset                   - Upload CSV (multipart field 'file')");
    info!("  GET    /api/dataset/:datasetId        - Rows of one dataset");
    info!("  DELETE /api/dataset/:datasetId        - Delete dataset and its rows");
    info!("  GET    /api/dataset/:datasetId/:rowId - Single row");
    info!("  PUT    /api/dataset/:datasetId/:rowId - Replace row data (PATCH also accepted)");
    info!("  DELETE /api/dataset/:datasetId/:rowId - Delete row");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn migrate_database(database_url: &str, direction: MigrateDirection) -> Result<()> {
    let db = establish_connection(database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}

/// Load a CSV file from disk into a new dataset.
pub async fn import_csv(database_url: &str, file: &Path, name: Option<String>) -> Result<()> {
    let db = connect_and_migrate(database_url).await?;
    let created = DatasetService::new(db).import_file(file, name).await?;
    info!(
        "Imported {} rows from {} into dataset {}",
        created.row_count,
        file.display(),
        created.dataset_id
    );
    Ok(())
}
