use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::ApiError;
use crate::api_client::ApiClient;
use crate::data_exporter::{CsvExporter, DEFAULT_EXPORT_MAX_ROWS};
use crate::utils::app_paths::AppPaths;
use crate::view::cell_formatter::{CellFormatter, FormatOptions};
use crate::view::pagination::{PaginationController, DEFAULT_MAX_VISIBLE, MAX_VISIBLE_LIMIT};
use crate::view::query_state::{QueryStateManager, DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE_MS};
use crate::view::TableViewController;
use std::time::Duration;

/// Largest page the server will return in one response
pub const SERVER_MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub view: ViewConfig,
    pub format: FormatOptions,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base url of the DB-viewer server
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Token for admin operations (delete, cleanup)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Rows per page
    pub page_size: u32,

    /// Page buttons shown around the current page
    pub max_visible_pages: u32,

    /// Quiet period before a typed search is sent
    pub search_debounce_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where CSV exports are written (defaults to the download directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Rows requested for one export
    pub max_rows: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
            admin_token: None,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_visible_pages: DEFAULT_MAX_VISIBLE,
            search_debounce_ms: SEARCH_DEBOUNCE_MS,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_rows: DEFAULT_EXPORT_MAX_ROWS,
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config.normalized())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("dbview").join("config.toml"))
    }

    /// Clamp values into the ranges the client and server accept
    pub fn normalized(mut self) -> Self {
        self.view.page_size = self.view.page_size.clamp(1, SERVER_MAX_PAGE_SIZE);
        self.view.max_visible_pages = self.view.max_visible_pages.clamp(1, MAX_VISIBLE_LIMIT);
        self.server.timeout_secs = self.server.timeout_secs.max(1);
        self.export.max_rows = self.export.max_rows.max(1);
        if self
            .server
            .admin_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            self.server.admin_token = None;
        }
        self
    }

    /// Export directory, falling back to the user's download directory
    pub fn export_directory(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(AppPaths::default_export_dir)
    }

    pub fn api_client(&self) -> Result<ApiClient, ApiError> {
        Ok(
            ApiClient::new(&self.server.base_url, Duration::from_secs(self.server.timeout_secs))?
                .with_admin_token(self.server.admin_token.clone()),
        )
    }

    pub fn view_controller(&self) -> TableViewController {
        TableViewController::new(
            QueryStateManager::new(self.view.page_size, self.view.search_debounce_ms),
            PaginationController::new(self.view.max_visible_pages),
            CellFormatter::new(self.format.clone()),
        )
    }

    pub fn exporter(&self) -> CsvExporter {
        CsvExporter::new(self.export_directory(), self.export.max_rows)
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# dbview Configuration File
# Location: ~/.config/dbview/config.toml (Linux)
#           ~/Library/Application Support/dbview/config.toml (macOS)
#           %APPDATA%\dbview\config.toml (Windows)

[server]
# Base url of the DB-viewer server
base_url = "http://localhost:5000"

# Request timeout in seconds
timeout_secs = 30

# Token sent as X-Admin-Token for delete/cleanup (leave commented to disable)
# admin_token = "..."

[view]
# Rows per page: 25, 50, 100, 250 or 500
page_size = 50

# Number of page buttons around the current page
max_visible_pages = 5

# Milliseconds without typing before a search is sent
search_debounce_ms = 300

[format]
# strftime formats for dates and date-times
date_format = "%-m/%-d/%Y"
datetime_format = "%-m/%-d/%Y, %-I:%M:%S %p"

# Characters of a URL shown as link text
url_label_max = 50

# Text longer than this is truncated in the table
text_truncate_at = 100

# Values longer than this get their full text as tooltip
tooltip_threshold = 50

[export]
# Directory for CSV exports (defaults to your download directory)
# directory = "/path/to/exports"

# Rows requested for one export (the server may return fewer)
max_rows = 50000
"#
        .to_string()
    }
}
