use crate::api::{ApiError, DatabaseListing, TablePage};
use crate::view::{DatabaseId, QueryParams};

/// Anything that can answer the view's questions about remote tables.
/// The HTTP `ApiClient` is the production implementation; tests use a
/// scripted in-memory one.
pub trait TableSource: Send + Sync {
    /// All uploaded databases, and whether admin operations are enabled
    fn list_databases(&self) -> Result<DatabaseListing, ApiError>;

    /// Table names of one database, in server order
    fn list_tables(&self, database: &DatabaseId) -> Result<Vec<String>, ApiError>;

    /// One page of a table under the given sort/search parameters
    fn fetch_page(
        &self,
        database: &DatabaseId,
        table: &str,
        params: &QueryParams,
    ) -> Result<TablePage, ApiError>;
}
