use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::{
    decode, ApiError, DatabaseInfo, DatabaseListing, DatabasesPayload, MessagePayload, TablePage,
    TablePayload, TablesPayload, UploadPayload,
};
use crate::datasource_trait::TableSource;
use crate::view::{DatabaseId, QueryParams};

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["mdb", "accdb", "sqlite", "db"];

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Blocking HTTP client for the DB-viewer server
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    admin_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base url".to_string(),
            });
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            client,
            admin_token: None,
        })
    }

    /// Token sent with admin-only calls. Used verbatim.
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base url with percent-encoded path segments appended
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Full url of a table page request
    pub fn table_url(&self, database: &DatabaseId, table: &str, params: &QueryParams) -> Url {
        let mut url = self.endpoint(&["database", database.as_str(), "table", table]);
        url.query_pairs_mut().extend_pairs(params.to_pairs());
        url
    }

    fn execute<T>(&self, request: RequestBuilder, fallback: &str) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        debug!("HTTP {} ({} bytes)", status.as_u16(), body.len());
        decode(&body, Some(status.as_u16()), fallback)
    }

    pub fn list_databases(&self) -> Result<DatabaseListing, ApiError> {
        let url = self.endpoint(&["databases"]);
        let payload: DatabasesPayload = self.execute(self.client.get(url), "Failed to load databases")?;
        Ok(DatabaseListing {
            databases: payload.databases,
            admin_enabled: payload.admin_enabled,
        })
    }

    pub fn list_tables(&self, database: &DatabaseId) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(&["database", database.as_str(), "tables"]);
        let payload: TablesPayload = self.execute(self.client.get(url), "Failed to load tables")?;
        Ok(payload.tables)
    }

    pub fn fetch_page(
        &self,
        database: &DatabaseId,
        table: &str,
        params: &QueryParams,
    ) -> Result<TablePage, ApiError> {
        let url = self.table_url(database, table, params);
        debug!("GET {}", url);
        let payload: TablePayload = self.execute(self.client.get(url), "Failed to load table data")?;
        payload.into_page()
    }

    /// Upload a database file after checking extension and size locally
    pub fn upload(&self, path: &Path) -> Result<DatabaseInfo, ApiError> {
        let size = validate_upload(path)?;
        info!("Uploading {} ({} bytes)", path.display(), size);

        let form = multipart::Form::new()
            .file("file", path)
            .map_err(|e| ApiError::InvalidUpload(format!("Cannot read {}: {}", path.display(), e)))?;
        let request = self
            .client
            .post(self.endpoint(&["upload"]))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form);

        let payload: UploadPayload = self.execute(request, "Upload failed")?;
        payload
            .database
            .ok_or_else(|| ApiError::Decode("upload response is missing the database".to_string()))
    }

    pub fn delete_database(&self, database: &DatabaseId) -> Result<String, ApiError> {
        let url = self.endpoint(&["database", database.as_str(), "delete"]);
        let payload: MessagePayload = self.admin_call(self.client.delete(url), "Delete failed")?;
        Ok(payload.message)
    }

    /// Remove every uploaded database on the server
    pub fn cleanup_all(&self) -> Result<String, ApiError> {
        let url = self.endpoint(&["cleanup-all"]);
        let payload: MessagePayload = self.admin_call(self.client.post(url), "Cleanup failed")?;
        Ok(payload.message)
    }

    fn admin_call<T>(&self, request: RequestBuilder, fallback: &str) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let token = self.admin_token.as_deref().ok_or(ApiError::Unauthorized)?;
        let response = request.header(ADMIN_TOKEN_HEADER, token).send()?;
        if response.status() == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        let status = response.status().as_u16();
        let body = response.text()?;
        decode(&body, Some(status), fallback)
    }
}

impl TableSource for ApiClient {
    fn list_databases(&self) -> Result<DatabaseListing, ApiError> {
        ApiClient::list_databases(self)
    }

    fn list_tables(&self, database: &DatabaseId) -> Result<Vec<String>, ApiError> {
        ApiClient::list_tables(self, database)
    }

    fn fetch_page(
        &self,
        database: &DatabaseId,
        table: &str,
        params: &QueryParams,
    ) -> Result<TablePage, ApiError> {
        ApiClient::fetch_page(self, database, table, params)
    }
}

/// Check a file is an acceptable upload; returns its size in bytes
pub fn validate_upload(path: &Path) -> Result<u64, ApiError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::InvalidUpload(
            "Please select a valid database file (.mdb, .accdb, .sqlite, .db)".to_string(),
        ));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| ApiError::InvalidUpload(format!("Cannot read {}: {}", path.display(), e)))?;
    if metadata.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::InvalidUpload(
            "File size must be less than 100MB".to_string(),
        ));
    }
    Ok(metadata.len())
}
