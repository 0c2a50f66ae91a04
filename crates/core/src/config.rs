//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DATA_FILE_NAME, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PAGE_SIZE, DEFAULT_STORAGE_DIR,
};
use crate::{CatalogError, CatalogResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    data_file_name: String,
    default_page_size: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig` using the default data file name and page size.
    pub fn new(storage_dir: PathBuf) -> CatalogResult<Self> {
        Self::with_options(storage_dir, DATA_FILE_NAME.into(), DEFAULT_PAGE_SIZE)
    }

    /// Create a new `CoreConfig` with every option explicit.
    ///
    /// The data file must be a plain filename (it always lives directly inside the storage
    /// directory) and the page size must be positive.
    pub fn with_options(
        storage_dir: PathBuf,
        data_file_name: String,
        default_page_size: usize,
    ) -> CatalogResult<Self> {
        if storage_dir.as_os_str().is_empty() {
            return Err(CatalogError::InvalidInput(
                "storage_dir cannot be empty".into(),
            ));
        }

        let name = data_file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CatalogError::InvalidInput(format!(
                "data file name must be a plain filename, got '{}'",
                data_file_name
            )));
        }

        if default_page_size == 0 {
            return Err(CatalogError::InvalidInput(
                "default_page_size must be positive".into(),
            ));
        }

        Ok(Self {
            storage_dir,
            data_file_name: name.to_owned(),
            default_page_size,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn data_file_path(&self) -> PathBuf {
        self.storage_dir.join(&self.data_file_name)
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }
}

/// Resolve the storage directory from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_STORAGE_DIR`].
pub fn storage_dir_from_env_value(value: Option<String>) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR))
}

/// Parse the upload body limit from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_MAX_UPLOAD_BYTES`].
pub fn max_upload_bytes_from_env_value(value: Option<String>) -> CatalogResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_MAX_UPLOAD_BYTES),
        Some(v) => match v.parse::<usize>() {
            Ok(bytes) if bytes > 0 => Ok(bytes),
            _ => Err(CatalogError::InvalidInput(format!(
                "upload limit must be a positive number of bytes, got '{}'",
                v
            ))),
        },
    }
}
