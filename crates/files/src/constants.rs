/// Directory, inside the storage directory, holding uploads that are not yet linked to a record.
pub const STAGING_FOLDER_NAME: &str = ".staging";

/// Suffix of staged files.
pub(crate) const STAGED_FILE_SUFFIX: &str = "part";
