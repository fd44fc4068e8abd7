use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

pub struct AppPaths;

impl AppPaths {
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Cannot determine data directory"))?
            .join("dbview");

        fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// Where the TUI mirrors its log ring buffer on exit
    pub fn log_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("dbview.log"))
    }

    /// Download directory, or the working directory when there is none
    pub fn default_export_dir() -> PathBuf {
        dirs::download_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
