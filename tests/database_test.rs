//! Database functionality tests
//!
//! Migrations, entity round-trips and cascade behavior of the dataset store

use anyhow::Result;
use chrono::Utc;
use datagrid::database::entities::*;
use datagrid::database::migrations::Migrator;
use datagrid::database::setup_database;
use datagrid::services::{DatasetService, RowsQuery};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use tempfile::NamedTempFile;

/// Create a test database connection with migrations
async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

async fn insert_dataset(db: &DatabaseConnection, name: &str) -> Result<datasets::Model> {
    let dataset = datasets::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(dataset)
}

#[tokio::test]
async fn test_database_migrations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    assert_eq!(datasets::Entity::find().all(&db).await?.len(), 0);
    assert_eq!(rows::Entity::find().all(&db).await?.len(), 0);

    Migrator::down(&db, None).await?;
    assert!(datasets::Entity::find().all(&db).await.is_err());

    Migrator::up(&db, None).await?;
    assert_eq!(datasets::Entity::find().all(&db).await?.len(), 0);

    Ok(())
}

#[tokio::test]
async fn test_row_data_keeps_key_order() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let dataset = insert_dataset(&db, "ordered").await?;

    let data = json!({"zeta": 1, "alpha": "two", "mid": null, "flag": true});
    let row = rows::ActiveModel {
        dataset_id: Set(dataset.id),
        data: Set(data.clone()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    let stored = rows::Entity::find_by_id(row.id).one(&db).await?.unwrap();
    assert_eq!(stored.dataset_id, dataset.id);
    let keys: Vec<&String> = stored.data.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid", "flag"]);
    assert_eq!(stored.data, data);

    Ok(())
}

#[tokio::test]
async fn test_dataset_delete_cascades_to_rows() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let kept = insert_dataset(&db, "kept").await?;
    let doomed = insert_dataset(&db, "doomed").await?;

    for (dataset_id, value) in [(kept.id, 1), (doomed.id, 2), (doomed.id, 3)] {
        rows::ActiveModel {
            dataset_id: Set(dataset_id),
            data: Set(json!({"v": value})),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    datasets::Entity::delete_by_id(doomed.id).exec(&db).await?;

    let orphaned = rows::Entity::find()
        .filter(rows::Column::DatasetId.eq(doomed.id))
        .count(&db)
        .await?;
    assert_eq!(orphaned, 0);
    assert_eq!(rows::Entity::find().count(&db).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_import_file_uses_file_stem() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let csv_file = tempfile::Builder::new()
        .prefix("inventory")
        .suffix(".csv")
        .tempfile()?;
    std::fs::write(csv_file.path(), "sku,qty\nA-1,4\nB-2,\n")?;

    let service = DatasetService::new(db.clone());
    let created = service.import_file(csv_file.path(), None).await?;
    assert_eq!(created.row_count, 2);

    let dataset = datasets::Entity::find_by_id(created.dataset_id)
        .one(&db)
        .await?
        .unwrap();
    assert!(dataset.name.starts_with("inventory"));
    assert!(!dataset.name.ends_with(".csv"));

    let page = service
        .get_dataset_rows(
            created.dataset_id,
            &RowsQuery {
                page: 1,
                limit: 10,
                search_query: None,
            },
        )
        .await?;
    assert_eq!(page.columns, vec!["sku", "qty"]);
    assert_eq!(page.rows[1].data, json!({"sku": "B-2", "qty": null}));

    Ok(())
}

#[tokio::test]
async fn test_import_file_with_explicit_name() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let csv_file = NamedTempFile::new()?;
    std::fs::write(csv_file.path(), "a\n1\n")?;

    let service = DatasetService::new(db.clone());
    let created = service
        .import_file(csv_file.path(), Some("Renamed".to_string()))
        .await?;

    let dataset = datasets::Entity::find_by_id(created.dataset_id)
        .one(&db)
        .await?
        .unwrap();
    assert_eq!(dataset.name, "Renamed");

    Ok(())
}
