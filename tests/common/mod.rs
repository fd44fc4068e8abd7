//! Scripted in-memory `TableSource` shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use dbview::api::{
    ApiError, ColumnDescriptor, DatabaseInfo, DatabaseListing, PaginationSummary, Row, TablePage,
};
use dbview::datasource_trait::TableSource;
use dbview::view::{DatabaseId, QueryParams, SortOrder};
use serde_json::{json, Value};

pub const DATABASE: &str = "20240115_shop.sqlite";

struct TableData {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

/// Serves tables from memory and applies search, sort and paging the way
/// the server does. Every request is recorded.
#[derive(Default)]
pub struct ScriptedSource {
    tables: BTreeMap<String, TableData>,
    requests: Mutex<Vec<(String, QueryParams)>>,
    failure: Mutex<Option<String>>,
    row_limit: Option<usize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> Self {
        let columns: Vec<ColumnDescriptor> = columns
            .iter()
            .map(|(name, declared)| ColumnDescriptor::new(*name, *declared))
            .collect();
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.name.clone(), value))
                    .collect::<Row>()
            })
            .collect();
        self.tables.insert(name.to_string(), TableData { columns, rows });
        self
    }

    /// Cap the rows a single response may carry, like the server's own limit
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    /// Make the next fetch fail with a server message
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<(String, QueryParams)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> QueryParams {
        self.requests().last().map(|(_, p)| p.clone()).unwrap()
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

impl TableSource for ScriptedSource {
    fn list_databases(&self) -> Result<DatabaseListing, ApiError> {
        Ok(DatabaseListing {
            databases: vec![DatabaseInfo {
                filename: DATABASE.to_string(),
                original_name: "shop.sqlite".to_string(),
                table_count: self.tables.len(),
                file_size: 4096,
                modified_time: None,
            }],
            admin_enabled: false,
        })
    }

    fn list_tables(&self, database: &DatabaseId) -> Result<Vec<String>, ApiError> {
        if database.as_str() != DATABASE {
            return Err(ApiError::server("Database not found"));
        }
        Ok(self.tables.keys().cloned().collect())
    }

    fn fetch_page(
        &self,
        _database: &DatabaseId,
        table: &str,
        params: &QueryParams,
    ) -> Result<TablePage, ApiError> {
        self.requests
            .lock()
            .unwrap()
            .push((table.to_string(), params.clone()));

        if let Some(message) = self.failure.lock().unwrap().take() {
            return Err(ApiError::server(message));
        }

        let data = self
            .tables
            .get(table)
            .ok_or_else(|| ApiError::server(format!("Table '{table}' not found or access denied.")))?;

        let needle = params.search.to_lowercase();
        let mut rows: Vec<Row> = data
            .rows
            .iter()
            .filter(|row| {
                needle.is_empty()
                    || data
                        .columns
                        .iter()
                        .filter(|c| params.search_columns.is_empty() || params.search_columns.contains(&c.name))
                        .any(|c| text_of(row.get(&c.name)).to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        if !params.sort_column.is_empty() {
            rows.sort_by(|a, b| {
                let (a, b) = (text_of(a.get(&params.sort_column)), text_of(b.get(&params.sort_column)));
                match (a.parse::<f64>(), b.parse::<f64>()) {
                    (Ok(x), Ok(y)) => x.total_cmp(&y),
                    _ => a.cmp(&b),
                }
            });
            if params.sort_order == SortOrder::Desc {
                rows.reverse();
            }
        }

        let total = rows.len() as u64;
        let per_page = match self.row_limit {
            Some(limit) => params.per_page.min(limit as u32),
            None => params.per_page,
        };
        let total_pages = total.div_ceil(u64::from(per_page)) as u32;
        let start = ((params.page.max(1) - 1) * per_page) as usize;
        let page_rows = rows.into_iter().skip(start).take(per_page as usize).collect();

        Ok(TablePage {
            rows: page_rows,
            columns: data.columns.clone(),
            pagination: PaginationSummary {
                page: params.page,
                per_page,
                total,
                total_pages,
                filtered: Some(total),
            },
        })
    }
}

/// `Orders` with a handful of rows, `Customers` with none
pub fn shop() -> ScriptedSource {
    ScriptedSource::new()
        .with_table(
            "Orders",
            &[("Id", "INTEGER"), ("Name", "TEXT"), ("Total", "REAL"), ("Placed", "DATE")],
            vec![
                vec![json!("1"), json!("alpha widget"), json!("12.5"), json!("2024-01-15")],
                vec![json!("2"), json!("beta gadget"), json!("1200"), json!("2024-02-01")],
                vec![json!("3"), json!("Alpha gizmo"), json!("7"), json!(null)],
                vec![json!("4"), json!("gamma <b>bold</b>"), json!("99.95"), json!("")],
            ],
        )
        .with_table("Customers", &[("Id", "INTEGER"), ("Email", "TEXT")], vec![])
}

/// A table with `count` rows, for paging
pub fn numbers(count: usize) -> ScriptedSource {
    ScriptedSource::new().with_table(
        "Numbers",
        &[("n", "INTEGER")],
        (1..=count).map(|i| vec![json!(i.to_string())]).collect(),
    )
}
