use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, ColumnDescriptor, Row};
use crate::datasource_trait::TableSource;
use crate::notice::Notice;
use crate::view::cell_formatter::{raw_text, strip_markup};
use crate::view::ViewState;

/// Upper bound on rows requested for one export
pub const DEFAULT_EXPORT_MAX_ROWS: u32 = 50_000;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No table selected")]
    NoTable,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ExportError {
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Api(err) => err.user_message("exporting table"),
            other => other.to_string(),
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error("Export Failed", self.user_message())
    }
}

/// Outcome of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// Row count the server reported for the query
    pub expected: u64,
}

impl ExportSummary {
    /// The server caps page sizes, so an export can hold fewer rows than
    /// the query matched
    pub fn is_truncated(&self) -> bool {
        (self.rows as u64) < self.expected
    }

    pub fn notice(&self) -> Notice {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.is_truncated() {
            Notice::warning(
                "Export Complete",
                format!(
                    "Exported {} of {} rows to {} (server limit reached)",
                    self.rows, self.expected, name
                ),
            )
        } else {
            Notice::success(
                "Export Complete",
                format!("Exported {} rows to {}", self.rows, name),
            )
        }
    }
}

/// Writes the current table view (all pages) as a CSV file
#[derive(Debug, Clone)]
pub struct CsvExporter {
    directory: PathBuf,
    max_rows: u32,
}

impl CsvExporter {
    pub fn new(directory: impl Into<PathBuf>, max_rows: u32) -> Self {
        Self {
            directory: directory.into(),
            max_rows: max_rows.max(1),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `{table}_export_{YYYY-MM-DD}.csv`, with the table name reduced to a
    /// single path component
    pub fn file_name(table: &str, date: NaiveDate) -> String {
        format!("{}_export_{}.csv", file_stem(table), date.format("%Y-%m-%d"))
    }

    /// Header plus one line per row. Every field is quoted, values are the
    /// raw cell text with markup stripped, null and missing cells are empty.
    pub fn build_csv(columns: &[ColumnDescriptor], rows: &[Row]) -> Result<String, ExportError> {
        if columns.is_empty() {
            return Ok(String::new());
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
        for row in rows {
            writer.write_record(columns.iter().map(|column| {
                raw_text(row.get(&column.name))
                    .map(|text| strip_markup(&text))
                    .unwrap_or_default()
            }))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ExportError::Csv(e.into_error().into()))?;
        let mut document = String::from_utf8_lossy(&bytes).into_owned();
        if document.ends_with('\n') {
            document.pop();
        }
        Ok(document)
    }

    pub fn export_current_table(
        &self,
        source: &dyn TableSource,
        state: &ViewState,
    ) -> Result<ExportSummary, ExportError> {
        self.export_current_table_on(source, state, Local::now().date_naive())
    }

    /// Fetch every row of the current view in one request and write it
    pub fn export_current_table_on(
        &self,
        source: &dyn TableSource,
        state: &ViewState,
        date: NaiveDate,
    ) -> Result<ExportSummary, ExportError> {
        let (Some(database), Some(table)) = (state.database.as_ref(), state.table.as_deref()) else {
            return Err(ExportError::NoTable);
        };

        let params = state.to_query_params().unpaginated(self.max_rows);
        info!("Exporting {}/{} (up to {} rows)", database, table, self.max_rows);
        let page = source.fetch_page(database, table, &params)?;

        let document = Self::build_csv(&page.columns, &page.rows)?;
        let path = self.directory.join(Self::file_name(table, date));
        write_atomic(&path, &document)?;

        let summary = ExportSummary {
            path,
            rows: page.rows.len(),
            expected: page.pagination.filtered.unwrap_or(page.pagination.total),
        };
        if summary.is_truncated() {
            warn!(
                "Export of {} truncated: {} of {} rows",
                table, summary.rows, summary.expected
            );
        }
        info!("Exported {} rows to {}", summary.rows, summary.path.display());
        Ok(summary)
    }
}

/// Table names come from the server. Separators, reserved characters and
/// `..` become `_` so the export always lands directly in the export directory.
fn file_stem(table: &str) -> String {
    let stem: String = table
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.replace("..", "_");
    let stem = stem.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if stem.is_empty() {
        "table".to_string()
    } else {
        stem.to_string()
    }
}

/// Write to a sibling temp file, then rename over the target. A failure
/// leaves no file behind.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ExportError> {
    let io_err = |source: io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(contents.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(err));
    }
    Ok(())
}
