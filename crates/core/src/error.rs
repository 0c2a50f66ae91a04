use catalog_ids::FileId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("no file was uploaded")]
    MissingPayload,
    #[error("malformed upload: {0}")]
    MalformedUpload(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("file {0} not found")]
    NotFound(FileId),
    #[error("no file with id {0} to attach a preview to")]
    UnknownFileId(FileId),

    #[error("metadata store {path} is corrupt: {source}", path = .path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(#[source] std::io::Error),
    #[error("failed to serialize metadata: {0}")]
    Serialization(serde_json::Error),

    #[error(
        "file {id} was removed but {count} owned file(s) could not be deleted: {files}",
        count = .failed.len(),
        files = .failed.join(", ")
    )]
    PartialDelete { id: FileId, failed: Vec<String> },

    #[error("file storage error: {0}")]
    Files(#[from] catalog_files::FilesError),
}

impl CatalogError {
    /// True for failures caused by the request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CatalogError::MissingPayload
                | CatalogError::MalformedUpload(_)
                | CatalogError::InvalidInput(_)
                | CatalogError::NotFound(_)
                | CatalogError::UnknownFileId(_)
                | CatalogError::Files(catalog_files::FilesError::InvalidPath(_))
        )
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
