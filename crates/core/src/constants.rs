//! Constants used throughout the catalogue core crate.

/// Default storage directory when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "uploads";

/// Filename of the metadata document inside the storage directory.
pub const DATA_FILE_NAME: &str = "data.json";

/// Page size used when a listing asks for a page without a valid size.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default cap on request bodies accepted by the upload endpoints (512 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Environment variable naming the storage directory.
pub const STORAGE_DIR_ENV: &str = "CATALOG_STORAGE_DIR";

/// Environment variable capping upload request bodies, in bytes.
pub const MAX_UPLOAD_BYTES_ENV: &str = "CATALOG_MAX_UPLOAD_BYTES";
