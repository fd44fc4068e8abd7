//! Wire models for the DB-viewer server
//!
//! Response envelopes, the error taxonomy shared by every remote call, and the
//! conversion from a raw envelope into either a usable payload or an
//! `ApiError`.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// One table row: column name to raw scalar value
pub type Row = Map<String, Value>;

/// Server-reported result window. The client never derives `total_pages`
/// itself; this struct from the latest response is the only bound it trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaginationSummary {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    #[serde(default)]
    pub filtered: Option<u64>,
}

impl PaginationSummary {
    /// Last navigable page. An empty table reports zero pages but still
    /// shows (an empty) page 1.
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// A successful page of table data
#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub rows: Vec<Row>,
    pub columns: Vec<ColumnDescriptor>,
    pub pagination: PaginationSummary,
}

/// An uploaded database as listed by `GET /databases`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseInfo {
    pub filename: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub table_count: usize,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DatabaseInfo {
    pub fn display_name(&self) -> &str {
        if self.original_name.is_empty() {
            &self.filename
        } else {
            &self.original_name
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseListing {
    pub databases: Vec<DatabaseInfo>,
    pub admin_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    #[error("unexpected response from server: {0}")]
    Decode(String),

    #[error("admin token rejected by server")]
    Unauthorized,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("invalid server url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    pub fn server(message: impl Into<String>) -> Self {
        ApiError::Server {
            status: None,
            message: message.into(),
        }
    }

    /// Text shown to the user. Transport failures get a generic message;
    /// server-reported failures are passed through verbatim.
    pub fn user_message(&self, operation: &str) -> String {
        match self {
            ApiError::Network(_) => format!("Network error occurred while {}", operation),
            ApiError::Server { message, .. } => message.clone(),
            ApiError::Unauthorized => "Invalid admin token. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Every endpoint answers with `success` plus a payload, or with an `error`
/// (sometimes with `success: false`, sometimes without the flag at all).
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn into_result(self, status: Option<u16>, fallback: &str) -> Result<T, ApiError> {
        if self.success {
            Ok(self.payload)
        } else {
            Err(ApiError::Server {
                status,
                message: self
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string()),
            })
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TablePayload {
    #[serde(default)]
    pub data: Vec<Row>,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub pagination: Option<PaginationSummary>,
}

impl TablePayload {
    pub fn into_page(self) -> Result<TablePage, ApiError> {
        let pagination = self
            .pagination
            .ok_or_else(|| ApiError::Decode("response is missing pagination".to_string()))?;
        Ok(TablePage {
            rows: self.data,
            columns: self.columns,
            pagination,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TablesPayload {
    #[serde(default)]
    pub tables: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DatabasesPayload {
    #[serde(default)]
    pub databases: Vec<DatabaseInfo>,
    #[serde(default)]
    pub admin_enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UploadPayload {
    #[serde(default)]
    pub database: Option<DatabaseInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessagePayload {
    #[serde(default)]
    pub message: String,
}

/// Parse a response body into a payload, mapping failure envelopes and
/// undecodable bodies onto `ApiError`
pub(crate) fn decode<T>(body: &str, status: Option<u16>, fallback: &str) -> Result<T, ApiError>
where
    T: for<'de> Deserialize<'de>,
{
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => envelope.into_result(status, fallback),
        Err(err) => match status {
            Some(code) if !(200..300).contains(&code) => Err(ApiError::Server {
                status,
                message: format!("{} (HTTP {})", fallback, code),
            }),
            _ => Err(ApiError::Decode(err.to_string())),
        },
    }
}
