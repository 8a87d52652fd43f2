use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::database::entities::{datasets, rows, Datasets, Rows};
use crate::errors::{DatasetError, DatasetResult};
use crate::services::csv_ingest::{dataset_name_from_filename, parse_csv};

/// Number of leading (filtered) rows shown with each dataset in the listing
pub const PREVIEW_ROWS: usize = 5;

/// Rows per INSERT statement; keeps bind parameters well under SQLite's limit
const INSERT_BATCH_SIZE: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Name,
    #[default]
    CreatedAt,
}

impl SortField {
    pub const ALLOWED: [&'static str; 3] = ["id", "name", "createdAt"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "id" => Some(SortField::Id),
            "name" => Some(SortField::Name),
            "createdAt" => Some(SortField::CreatedAt),
            _ => None,
        }
    }

    fn column(self) -> datasets::Column {
        match self {
            SortField::Id => datasets::Column::Id,
            SortField::Name => datasets::Column::Name,
            SortField::CreatedAt => datasets::Column::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn order(self) -> Order {
        match self {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Validated input for the dataset listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListDatasetsQuery {
    pub page: u64,
    pub limit: u64,
    pub sort: SortField,
    pub order: SortOrder,
    pub search_field: Option<String>,
    pub search_query: Option<String>,
}

/// Validated input for a single dataset's row page
#[derive(Debug, Clone, PartialEq)]
pub struct RowsQuery {
    pub page: u64,
    pub limit: u64,
    pub search_query: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub row_count: usize,
    pub preview: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetListing {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub data: Vec<DatasetSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRecord {
    pub id: i32,
    pub data: Value,
}

impl From<rows::Model> for RowRecord {
    fn from(row: rows::Model) -> Self {
        Self {
            id: row.id,
            data: row.data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
            has_next_page: page.saturating_mul(limit) < total,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetPage {
    pub rows: Vec<RowRecord>,
    pub columns: Vec<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRow {
    pub id: i32,
    pub dataset_id: i32,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDataset {
    pub dataset_id: i32,
    pub row_count: usize,
}

/// Dataset and row queries over the two-table store
#[derive(Clone)]
pub struct DatasetService {
    db: DatabaseConnection,
}

impl DatasetService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Page through datasets. Row search narrows each dataset's row count and
    /// preview but never removes a dataset from the page.
    pub async fn list_datasets(&self, query: &ListDatasetsQuery) -> DatasetResult<DatasetListing> {
        let total = Datasets::find().count(&self.db).await?;
        if total == 0 {
            return Ok(DatasetListing {
                page: query.page,
                limit: query.limit,
                total: 0,
                data: Vec::new(),
            });
        }

        let skip = query.page.saturating_sub(1).saturating_mul(query.limit);
        let page = Datasets::find()
            .order_by(query.sort.column(), query.order.order())
            .order_by(datasets::Column::Id, query.order.order())
            .offset(skip)
            .limit(query.limit)
            .all(&self.db)
            .await?;

        let mut rows_by_dataset = self.load_rows_for(&page).await?;

        let search = match (query.search_field.as_deref(), query.search_query.as_deref()) {
            (Some(field), Some(needle)) if !field.is_empty() && !needle.is_empty() => {
                Some((field, needle.to_lowercase()))
            }
            _ => None,
        };

        let data = page
            .into_iter()
            .map(|dataset| {
                let rows = rows_by_dataset.remove(&dataset.id).unwrap_or_default();
                let filtered: Vec<Value> = match &search {
                    Some((field, needle)) => rows
                        .into_iter()
                        .filter(|data| row_matches_field(data, field, needle))
                        .collect(),
                    None => rows,
                };

                DatasetSummary {
                    id: dataset.id,
                    name: dataset.name,
                    created_at: dataset.created_at,
                    row_count: filtered.len(),
                    preview: filtered.into_iter().take(PREVIEW_ROWS).collect(),
                }
            })
            .collect();

        debug!(
            "Listed page {} of datasets (limit {}, total {})",
            query.page, query.limit, total
        );

        Ok(DatasetListing {
            page: query.page,
            limit: query.limit,
            total,
            data,
        })
    }

    async fn load_rows_for(
        &self,
        page: &[datasets::Model],
    ) -> DatasetResult<HashMap<i32, Vec<Value>>> {
        let mut grouped: HashMap<i32, Vec<Value>> = HashMap::new();
        if page.is_empty() {
            return Ok(grouped);
        }

        let ids: Vec<i32> = page.iter().map(|d| d.id).collect();
        let all_rows = Rows::find()
            .filter(rows::Column::DatasetId.is_in(ids))
            .order_by_asc(rows::Column::Id)
            .all(&self.db)
            .await?;

        for row in all_rows {
            grouped.entry(row.dataset_id).or_default().push(row.data);
        }
        Ok(grouped)
    }

    /// One page of a dataset's rows. Search runs before pagination, so the
    /// pagination block describes the matching rows only. Columns always come
    /// from the dataset's first row.
    pub async fn get_dataset_rows(
        &self,
        dataset_id: i32,
        query: &RowsQuery,
    ) -> DatasetResult<DatasetPage> {
        Datasets::find_by_id(dataset_id)
            .one(&self.db)
            .await?
            .ok_or(DatasetError::DatasetNotFound(dataset_id))?;

        let all_rows = Rows::find()
            .filter(rows::Column::DatasetId.eq(dataset_id))
            .order_by_asc(rows::Column::Id)
            .all(&self.db)
            .await?;

        let columns = columns_of(all_rows.first().map(|row| &row.data));

        let filtered: Vec<rows::Model> = match query
            .search_query
            .as_deref()
            .filter(|needle| !needle.trim().is_empty())
        {
            Some(needle) => {
                let needle = needle.to_lowercase();
                all_rows
                    .into_iter()
                    .filter(|row| row_matches_any(&row.data, &needle))
                    .collect()
            }
            None => all_rows,
        };

        let pagination = Pagination::new(query.page, query.limit, filtered.len() as u64);
        let rows = page_slice(&filtered, query.page, query.limit)
            .iter()
            .cloned()
            .map(RowRecord::from)
            .collect();

        debug!(
            "Dataset {} page {}: {} matching rows",
            dataset_id, query.page, pagination.total
        );

        Ok(DatasetPage {
            rows,
            columns,
            pagination,
        })
    }

    pub async fn get_row(&self, dataset_id: i32, row_id: i32) -> DatasetResult<rows::Model> {
        Rows::find()
            .filter(rows::Column::Id.eq(row_id))
            .filter(rows::Column::DatasetId.eq(dataset_id))
            .one(&self.db)
            .await?
            .ok_or(DatasetError::RowNotFound { dataset_id, row_id })
    }

    /// Replace a row's data wholesale. No merge with the previous keys.
    pub async fn update_row(
        &self,
        dataset_id: i32,
        row_id: i32,
        data: Value,
    ) -> DatasetResult<UpdatedRow> {
        if !data.is_object() {
            return Err(DatasetError::InvalidRowData(
                "Invalid data format. Expected object.".to_string(),
            ));
        }

        let existing = self.get_row(dataset_id, row_id).await?;
        let mut row: rows::ActiveModel = existing.into();
        row.data = Set(data);
        let updated = row.update(&self.db).await?;

        info!("Row {} of dataset {} updated", row_id, dataset_id);

        Ok(UpdatedRow {
            id: updated.id,
            dataset_id: updated.dataset_id,
            data: updated.data,
        })
    }

    pub async fn delete_row(&self, dataset_id: i32, row_id: i32) -> DatasetResult<()> {
        let row = self.get_row(dataset_id, row_id).await?;
        Rows::delete_by_id(row.id).exec(&self.db).await?;

        info!("Row {} deleted from dataset {}", row_id, dataset_id);
        Ok(())
    }

    /// Delete a dataset; the foreign key cascade removes its rows.
    pub async fn delete_dataset(&self, dataset_id: i32) -> DatasetResult<()> {
        let result = Datasets::delete_by_id(dataset_id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(DatasetError::DatasetNotFound(dataset_id));
        }

        info!("Dataset {} deleted", dataset_id);
        Ok(())
    }

    /// Create a dataset from an uploaded CSV file, named after the file.
    pub async fn create_from_csv(
        &self,
        filename: &str,
        buffer: &[u8],
    ) -> DatasetResult<CreatedDataset> {
        let records = parse_csv(buffer)?;
        self.create_dataset(dataset_name_from_filename(filename), records)
            .await
    }

    /// Create a dataset from a CSV file on disk.
    pub async fn import_file(
        &self,
        path: &Path,
        name: Option<String>,
    ) -> DatasetResult<CreatedDataset> {
        let buffer = tokio::fs::read(path).await?;
        let records = parse_csv(&buffer)?;
        let name = name.unwrap_or_else(|| {
            let filename = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            dataset_name_from_filename(&filename)
        });
        self.create_dataset(name, records).await
    }

    async fn create_dataset(
        &self,
        name: String,
        records: Vec<Map<String, Value>>,
    ) -> DatasetResult<CreatedDataset> {
        let row_count = records.len();
        let txn = self.db.begin().await?;

        let dataset = datasets::ActiveModel {
            name: Set(name),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<rows::ActiveModel> = pending
                .by_ref()
                .take(INSERT_BATCH_SIZE)
                .map(|data| rows::ActiveModel {
                    dataset_id: Set(dataset.id),
                    data: Set(Value::Object(data)),
                    ..Default::default()
                })
                .collect();
            Rows::insert_many(batch).exec(&txn).await?;
        }

        txn.commit().await?;

        info!(
            "Dataset {} '{}' created with {} rows",
            dataset.id, dataset.name, row_count
        );

        Ok(CreatedDataset {
            dataset_id: dataset.id,
            row_count,
        })
    }
}

/// Column names for display, taken from a representative row.
pub fn columns_of(sample: Option<&Value>) -> Vec<String> {
    match sample {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Slice out one page; pages past the end are empty.
pub fn page_slice<T>(items: &[T], page: u64, limit: u64) -> &[T] {
    let skip = page.saturating_sub(1).saturating_mul(limit);
    let start = usize::try_from(skip).unwrap_or(usize::MAX).min(items.len());
    let end = start
        .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
        .min(items.len());
    &items[start..end]
}

/// Render a JSON value the way a browser's `toString` would. `null` has no
/// text form and never matches a search.
pub fn stringify_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => number_text(f),
            _ => n.to_string(),
        }),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| stringify_value(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some("[object Object]".to_string()),
    }
}

/// `Number.prototype.toString` for a finite double: shortest round-trip
/// digits, plain notation for exponents in -7..21, otherwise `d.ddde+x`.
fn number_text(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (whole, fraction) = digits.split_at(n as usize);
        format!("{}.{}", whole, fraction)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let (lead, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{}", rest)
        };
        let sign = if n > 0 { '+' } else { '-' };
        format!("{}{}e{}{}", lead, fraction, sign, (n - 1).abs())
    };

    if value < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

fn value_contains(value: &Value, needle_lower: &str) -> bool {
    stringify_value(value)
        .map(|text| text.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

/// `data[field]` exists and contains the (lower-cased) needle.
pub fn row_matches_field(data: &Value, field: &str, needle_lower: &str) -> bool {
    data.as_object()
        .and_then(|map| map.get(field))
        .map(|value| value_contains(value, needle_lower))
        .unwrap_or(false)
}

/// Any value of `data` contains the (lower-cased) needle.
pub fn row_matches_any(data: &Value, needle_lower: &str) -> bool {
    data.as_object()
        .map(|map| map.values().any(|value| value_contains(value, needle_lower)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use sea_orm::ConnectionTrait;
    use serde_json::json;

    fn rows_query(page: u64, limit: u64, search: Option<&str>) -> RowsQuery {
        RowsQuery {
            page,
            limit,
            search_query: search.map(str::to_string),
        }
    }

    fn list_query() -> ListDatasetsQuery {
        ListDatasetsQuery {
            page: 1,
            limit: 50,
            sort: SortField::default(),
            order: SortOrder::default(),
            search_field: None,
            search_query: None,
        }
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(2, 10, 12);
        assert_eq!(p.total_pages, 2);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);

        let p = Pagination::new(1, 10, 11);
        assert_eq!(p.total_pages, 2);
        assert!(p.has_next_page);
    }

    #[test]
    fn test_page_slice() {
        let items: Vec<u32> = (1..=12).collect();
        assert_eq!(page_slice(&items, 1, 10), &items[..10]);
        assert_eq!(page_slice(&items, 2, 10), &[11, 12]);
        assert!(page_slice(&items, 3, 10).is_empty());
    }

    #[test]
    fn test_stringify_value() {
        assert_eq!(stringify_value(&json!(null)), None);
        assert_eq!(stringify_value(&json!(3)).as_deref(), Some("3"));
        assert_eq!(stringify_value(&json!(2.5)).as_deref(), Some("2.5"));
        assert_eq!(stringify_value(&json!(4.0)).as_deref(), Some("4"));
        assert_eq!(stringify_value(&json!(true)).as_deref(), Some("true"));
        assert_eq!(stringify_value(&json!(-0.0)).as_deref(), Some("0"));
        assert_eq!(stringify_value(&json!(1e-7)).as_deref(), Some("1e-7"));
        assert_eq!(stringify_value(&json!(0.000001)).as_deref(), Some("0.000001"));
        assert_eq!(stringify_value(&json!(-1.5e-9)).as_deref(), Some("-1.5e-9"));
        assert_eq!(stringify_value(&json!(1e21)).as_deref(), Some("1e+21"));
        assert_eq!(stringify_value(&json!(2.5e25)).as_deref(), Some("2.5e+25"));
        assert_eq!(
            stringify_value(&json!(123456789012345680000.0)).as_deref(),
            Some("123456789012345680000")
        );
        assert_eq!(stringify_value(&json!(1234.5678)).as_deref(), Some("1234.5678"));
        assert_eq!(stringify_value(&json!(-0.25)).as_deref(), Some("-0.25"));
        assert_eq!(stringify_value(&json!([1, null, "x"])).as_deref(), Some("1,,x"));
        assert_eq!(
            stringify_value(&json!({"k": 1})).as_deref(),
            Some("[object Object]")
        );
    }

    #[test]
    fn test_row_matches_field() {
        let row = json!({"make": "Tesla", "range": 450, "note": null});
        assert!(row_matches_field(&row, "make", "tes"));
        assert!(row_matches_field(&row, "range", "45"));
        assert!(!row_matches_field(&row, "make", "bmw"));
        assert!(!row_matches_field(&row, "missing", "tes"));
        assert!(!row_matches_field(&row, "note", "null"));
    }

    #[test]
    fn test_row_matches_any() {
        let row = json!({"make": "Tesla", "model": "Model S"});
        assert!(row_matches_any(&row, "model s"));
        assert!(!row_matches_any(&row, "audi"));
        assert!(!row_matches_any(&json!([1, 2]), "1"));
    }

    #[test]
    fn test_columns_of() {
        assert_eq!(columns_of(Some(&json!({"b": 1, "a": 2}))), vec!["b", "a"]);
        assert!(columns_of(None).is_empty());
        assert!(columns_of(Some(&json!("scalar"))).is_empty());
    }

    #[tokio::test]
    async fn test_create_and_fetch_dataset() {
        let service = DatasetService::new(setup_test_db().await);

        let created = service
            .create_from_csv("cars.csv", b"make,year\nTesla,2020\nNissan,2018\n")
            .await
            .unwrap();
        assert_eq!(created.row_count, 2);

        let page = service
            .get_dataset_rows(created.dataset_id, &rows_query(1, 50, None))
            .await
            .unwrap();
        assert_eq!(page.columns, vec!["make", "year"]);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].data, json!({"make": "Tesla", "year": 2020}));
        assert_eq!(page.pagination.total, 2);
    }

    #[tokio::test]
    async fn test_failed_parse_leaves_no_dataset() {
        let service = DatasetService::new(setup_test_db().await);

        let err = service.create_from_csv("empty.csv", b"a,b\n").await.unwrap_err();
        assert!(err.is_ingestion_error());

        let listing = service.list_datasets(&list_query()).await.unwrap();
        assert_eq!(listing.total, 0);
    }

    #[tokio::test]
    async fn test_failed_row_insert_rolls_back_dataset() {
        let db = setup_test_db().await;
        db.execute_unprepared("DROP TABLE rows").await.unwrap();
        let service = DatasetService::new(db.clone());

        let err = service
            .create_from_csv("doomed.csv", b"a\n1\n2\n")
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::Database(_)));

        assert_eq!(Datasets::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_filters_before_pagination() {
        let service = DatasetService::new(setup_test_db().await);

        let mut csv = String::from("label,n\n");
        for i in 0..25 {
            let label = if i % 2 == 0 && i < 24 { "FOO item" } else { "bar" };
            csv.push_str(&format!("{},{}\n", label, i));
        }
        let created = service.create_from_csv("mixed.csv", csv.as_bytes()).await.unwrap();

        let page = service
            .get_dataset_rows(created.dataset_id, &rows_query(2, 10, Some("foo")))
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(!page.pagination.has_next_page);
        assert!(page.pagination.has_prev_page);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].data["n"], json!(20));
        assert_eq!(page.rows[1].data["n"], json!(22));
        assert_eq!(page.columns, vec!["label", "n"]);
    }

    #[tokio::test]
    async fn test_listing_search_keeps_datasets_without_matches() {
        let service = DatasetService::new(setup_test_db().await);
        service
            .create_from_csv("a.csv", b"city\nOslo\nLima\nOsaka\n")
            .await
            .unwrap();
        service
            .create_from_csv("b.csv", b"city\nRome\n")
            .await
            .unwrap();

        let query = ListDatasetsQuery {
            search_field: Some("city".to_string()),
            search_query: Some("OS".to_string()),
            ..list_query()
        };
        let listing = service.list_datasets(&query).await.unwrap();

        assert_eq!(listing.total, 2);
        assert_eq!(listing.data.len(), 2);
        let a = listing.data.iter().find(|d| d.name == "a").unwrap();
        let b = listing.data.iter().find(|d| d.name == "b").unwrap();
        assert_eq!(a.row_count, 2);
        assert_eq!(a.preview, vec![json!({"city": "Oslo"}), json!({"city": "Osaka"})]);
        assert_eq!(b.row_count, 0);
        assert!(b.preview.is_empty());
    }

    #[tokio::test]
    async fn test_listing_preview_is_capped() {
        let service = DatasetService::new(setup_test_db().await);
        service
            .create_from_csv("big.csv", b"v\n1\n2\n3\n4\n5\n6\n7\n")
            .await
            .unwrap();

        let listing = service.list_datasets(&list_query()).await.unwrap();
        assert_eq!(listing.data[0].row_count, 7);
        assert_eq!(listing.data[0].preview.len(), PREVIEW_ROWS);
    }

    #[tokio::test]
    async fn test_listing_sort_by_name() {
        let service = DatasetService::new(setup_test_db().await);
        for name in ["beta.csv", "alpha.csv", "gamma.csv"] {
            service.create_from_csv(name, b"x\n1\n").await.unwrap();
        }

        let query = ListDatasetsQuery {
            sort: SortField::Name,
            order: SortOrder::Asc,
            limit: 2,
            ..list_query()
        };
        let listing = service.list_datasets(&query).await.unwrap();
        let names: Vec<&str> = listing.data.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(listing.total, 3);
    }

    #[tokio::test]
    async fn test_update_row_replaces_data() {
        let service = DatasetService::new(setup_test_db().await);
        let created = service
            .create_from_csv("t.csv", b"a,b\n1,2\n")
            .await
            .unwrap();
        let page = service
            .get_dataset_rows(created.dataset_id, &rows_query(1, 10, None))
            .await
            .unwrap();
        let row_id = page.rows[0].id;

        let updated = service
            .update_row(created.dataset_id, row_id, json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(updated.data, json!({"a": 1}));

        let fetched = service.get_row(created.dataset_id, row_id).await.unwrap();
        assert_eq!(fetched.data, json!({"a": 1}));

        let err = service
            .update_row(created.dataset_id, row_id, json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRowData(_)));
    }

    #[tokio::test]
    async fn test_row_must_belong_to_dataset() {
        let service = DatasetService::new(setup_test_db().await);
        let first = service.create_from_csv("one.csv", b"a\n1\n").await.unwrap();
        let second = service.create_from_csv("two.csv", b"a\n2\n").await.unwrap();
        let row = service
            .get_dataset_rows(first.dataset_id, &rows_query(1, 10, None))
            .await
            .unwrap()
            .rows[0]
            .id;

        let err = service.get_row(second.dataset_id, row).await.unwrap_err();
        assert!(err.is_not_found());
        let err = service.delete_row(second.dataset_id, row).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_dataset_cascades() {
        let service = DatasetService::new(setup_test_db().await);
        let created = service
            .create_from_csv("gone.csv", b"a\n1\n2\n")
            .await
            .unwrap();

        service.delete_dataset(created.dataset_id).await.unwrap();

        let remaining = Rows::find()
            .filter(rows::Column::DatasetId.eq(created.dataset_id))
            .count(&service.db)
            .await
            .unwrap();
        assert_eq!(remaining, 0);

        let err = service.delete_dataset(created.dataset_id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
