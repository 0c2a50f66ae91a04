//! Catalogue File Storage
//!
//! This crate stores the binary side of catalogue records: uploaded artifacts and their preview
//! images. It knows nothing about metadata; records refer to stored files by a
//! storage-relative reference, which is simply the stored filename.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_dir>/
//! ├── data.json                                  # metadata document (owned by catalog-core)
//! ├── 1718099200123-castle.unitypackage          # artifact
//! ├── 1718099200123-castle.png                   # preview
//! └── .staging/                                  # uploads not yet linked to a record
//!     └── 1718099200456.<nonce>.part
//! ```
//!
//! ## Two-step writes
//!
//! Incoming bytes are first [staged](FilesService::stage) and only
//! [promoted](FilesService::promote) into the storage directory once the caller has decided the
//! upload belongs to a record. A staged file that turns out to be unwanted is
//! [discarded](FilesService::discard), so an abandoned upload never leaves a file that looks like
//! it belongs to the catalogue.
//!
//! ## Example Usage
//!
//! ```no_run
//! use catalog_files::FilesService;
//! use catalog_ids::FileId;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("uploads"))?;
//! let staged = service.stage(FileId::from_raw(1700), "pack.zip", b"bytes")?;
//! let stored = service.promote(&staged)?;
//! assert_eq!(stored.reference(), "1700-pack.zip");
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::STAGING_FOLDER_NAME;
pub use files::{FilesService, StagedFile, StoredFile};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Storage path exists but is not a usable directory
    #[error("Invalid storage directory: {0}")]
    InvalidRootDirectory(String),

    /// Reference does not name a file inside the storage directory
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Filename could not carry an identity prefix
    #[error("Identity error: {0}")]
    Id(#[from] catalog_ids::IdError),
}

pub type FilesResult<T> = Result<T, FilesError>;
