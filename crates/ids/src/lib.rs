//! Record identity and identity-prefixed filenames.
//!
//! Every catalogue record is identified by a [`FileId`]: a positive integer derived from the
//! upload time in Unix milliseconds. Identities are issued by a [`FileIdGenerator`], which keeps
//! them strictly increasing even when the wall clock stalls or runs backwards.
//!
//! Binary files stored for a record carry the identity as a filename prefix:
//!
//! ```text
//! <id>-<sanitised original name>
//! 1718099200123-castle-pack.unitypackage
//! ```
//!
//! [`StoredName`] builds and parses that scheme. The prefix is a convenience for humans and for
//! recovering identity from a directory listing; the authoritative identity always comes from
//! the generator and is checked against the filename after the file is written.

mod id;
mod stored_name;

pub use id::{FileId, FileIdGenerator};
pub use stored_name::{sanitise_file_name, StoredName, MAX_FILE_NAME_BYTES};

/// Error type for identity operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identity operations.
pub type IdResult<T> = Result<T, IdError>;
