//! Storage-directory file service implementation
//!
//! [`FilesService`] owns every byte the catalogue keeps on disk apart from the metadata
//! document. All paths it hands out are inside the canonicalised storage directory, and every
//! reference it accepts is reduced to a single filename carrying an identity prefix before it
//! touches the filesystem, so a reference can never escape the directory or name the metadata
//! document itself.
//!
//! # Implementation Notes
//!
//! - The constructor creates the storage directory if it does not exist yet
//! - The staging directory is created on first use
//! - Staged filenames carry a random nonce, so concurrent uploads of the same name never collide
//! - The service implements `Debug` but not `Clone` (share it behind an `Arc`)

use crate::constants::STAGED_FILE_SUFFIX;
use crate::{FilesError, FilesResult, STAGING_FOLDER_NAME};
use catalog_ids::{FileId, StoredName};
use catalog_types::NonEmptyText;
use md5::{Digest, Md5};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A file written to the storage directory under its final name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Final `<id>-<name>` filename
    pub stored_name: StoredName,

    /// Absolute location on disk
    pub path: PathBuf,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Hexadecimal MD5 digest of the content, the fingerprint clients compute for dedup checks
    pub content_hash: String,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection from the leading bytes and should not be considered
    /// authoritative.
    pub media_type: Option<NonEmptyText>,
}

impl StoredFile {
    /// Storage-relative reference recorded in metadata.
    pub fn reference(&self) -> String {
        self.stored_name.to_string()
    }

    pub fn id(&self) -> FileId {
        self.stored_name.id()
    }
}

/// Bytes written to the staging directory, waiting to be promoted or discarded.
#[derive(Debug)]
pub struct StagedFile {
    staging_path: PathBuf,
    file: StoredFile,
}

impl StagedFile {
    /// What the file will be once promoted. `file().path` is the final location.
    pub fn file(&self) -> &StoredFile {
        &self.file
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Returns true if the content looks like an image.
    pub fn is_image(&self) -> bool {
        self.file
            .media_type
            .as_ref()
            .is_some_and(|t| t.as_str().starts_with("image/"))
    }
}

/// Service for the files inside one storage directory
#[derive(Debug)]
pub struct FilesService {
    /// Canonicalised storage directory
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a new `FilesService` rooted at `root_directory`.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The path exists but is not a directory
    /// - The directory cannot be created or canonicalised
    pub fn new(root_directory: &Path) -> FilesResult<Self> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Writes `bytes` to the staging directory as an upload of `original_name` for `id`.
    ///
    /// Nothing is written under the final name yet; see [`Self::promote`].
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `original_name` has no usable characters ([`FilesError::Id`])
    /// - The staging directory cannot be created or the file cannot be written (I/O)
    pub fn stage(&self, id: FileId, original_name: &str, bytes: &[u8]) -> FilesResult<StagedFile> {
        let stored_name = StoredName::new(id, original_name)?;

        let staging_dir = self.staging_directory();
        fs::create_dir_all(&staging_dir).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create staging directory {}: {}",
                    staging_dir.display(),
                    e
                ),
            ))
        })?;

        // Staged names leave out the original name so they are never longer than the final one.
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let staging_path = staging_dir.join(format!("{}.{}.{}", id, nonce, STAGED_FILE_SUFFIX));

        fs::write(&staging_path, bytes).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", staging_path.display(), e),
            ))
        })?;

        let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        let path = self.root_directory.join(stored_name.to_string());

        Ok(StagedFile {
            staging_path,
            file: StoredFile {
                stored_name,
                path,
                size_bytes: bytes.len() as u64,
                content_hash: Self::content_hash(bytes),
                media_type,
            },
        })
    }

    /// Moves a staged file to its final name, replacing any file already there.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the rename fails. The staged file is left in place so the
    /// caller can still [discard](Self::discard) it.
    pub fn promote(&self, staged: &StagedFile) -> FilesResult<StoredFile> {
        fs::rename(&staged.staging_path, &staged.file.path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to move {} to {}: {}",
                    staged.staging_path.display(),
                    staged.file.path.display(),
                    e
                ),
            ))
        })?;

        tracing::debug!("promoted {}", staged.file.path.display());
        Ok(staged.file.clone())
    }

    /// Deletes a staged file that will not be promoted.
    ///
    /// Failure is logged rather than returned: the caller is already on an error path and a
    /// left-over staged file is removed by [`Self::clear_staging`] later.
    pub fn discard(&self, staged: StagedFile) {
        match fs::remove_file(&staged.staging_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to discard staged file {}: {}",
                staged.staging_path.display(),
                e
            ),
        }
    }

    /// Reduces a reference to the canonical stored filename.
    ///
    /// References written by older revisions look like `uploads/17-a.png` or
    /// `uploads\17-a.png`; only the final component is significant. The result must parse as
    /// an identity-prefixed [`StoredName`], which rules out `..`, hidden files and the
    /// metadata document.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if the reference cannot name a stored file.
    pub fn normalise_reference(reference: &str) -> FilesResult<String> {
        let file_name = reference
            .trim()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();

        if file_name.is_empty() || file_name.starts_with('.') {
            return Err(FilesError::InvalidPath(format!(
                "reference does not name a stored file: '{}'",
                reference
            )));
        }

        StoredName::parse(file_name).map_err(|_| {
            FilesError::InvalidPath(format!(
                "reference has no identity prefix: '{}'",
                reference
            ))
        })?;

        Ok(file_name.to_owned())
    }

    /// Resolves a reference to an absolute path inside the storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] as for [`Self::normalise_reference`].
    pub fn resolve(&self, reference: &str) -> FilesResult<PathBuf> {
        Ok(self
            .root_directory
            .join(Self::normalise_reference(reference)?))
    }

    /// Returns true if `reference` names an existing regular file.
    ///
    /// Invalid references are reported as absent.
    pub fn exists(&self, reference: &str) -> bool {
        self.resolve(reference)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Deletes the file named by `reference`.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the reference is invalid or the file exists but cannot be
    /// removed.
    pub fn remove_if_exists(&self, reference: &str) -> FilesResult<bool> {
        let path = self.resolve(reference)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", path.display(), e),
            ))),
        }
    }

    /// Deletes every file left in the staging directory.
    ///
    /// Intended for start-up, before any upload is in flight. Returns the number of files
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the directory cannot be listed or a file cannot be removed.
    pub fn clear_staging(&self) -> FilesResult<usize> {
        let staging_dir = self.staging_directory();
        let entries = match fs::read_dir(&staging_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(FilesError::Io(e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Hexadecimal MD5 digest of `bytes`.
    pub fn content_hash(bytes: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Returns the path to the staging directory.
    ///
    /// Note: This directory may not exist yet; it is created by the first [`Self::stage`].
    #[must_use]
    pub fn staging_directory(&self) -> PathBuf {
        self.root_directory.join(STAGING_FOLDER_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn service(temp: &TempDir) -> FilesService {
        FilesService::new(&temp.path().join("uploads")).expect("service should be created")
    }

    fn count_staged(service: &FilesService) -> usize {
        fs::read_dir(service.staging_directory())
            .map(|it| it.flatten().count())
            .unwrap_or(0)
    }

    #[test]
    fn test_new_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a").join("b");

        let service = FilesService::new(&root).unwrap();

        assert!(root.is_dir());
        assert!(service.root_directory().ends_with("b"));
    }

    #[test]
    fn test_new_rejects_file_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let result = FilesService::new(&root);

        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_stage_writes_only_to_staging() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let staged = service
            .stage(FileId::from_raw(1700), "pack.zip", b"Hello, World!")
            .unwrap();

        assert!(staged.staging_path().is_file());
        assert!(staged.staging_path().starts_with(service.staging_directory()));
        assert!(!staged.file().path.exists());
        assert_eq!(staged.file().size_bytes, 13);
        assert_eq!(staged.file().reference(), "1700-pack.zip");
        assert_eq!(
            staged.file().content_hash,
            "65a8e27d8879283831b664bd8b7f0ad4"
        );
    }

    #[test]
    fn test_staged_name_does_not_grow_with_original_name() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let long = format!("{}.zip", "a".repeat(230));

        let staged = service.stage(FileId::from_raw(1700), &long, b"x").unwrap();
        let staged_name = staged.staging_path().file_name().unwrap().to_str().unwrap();

        assert!(staged_name.starts_with("1700."));
        assert!(staged_name.len() < 64);
        let stored = service.promote(&staged).unwrap();
        assert_eq!(stored.reference(), format!("1700-{}", long));
    }

    #[test]
    fn test_stage_rejects_unusable_name() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let result = service.stage(FileId::from_raw(1), "..", b"x");

        assert!(matches!(result, Err(FilesError::Id(_))));
        assert_eq!(count_staged(&service), 0);
    }

    #[test]
    fn test_promote_moves_to_final_name() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let staged = service.stage(FileId::from_raw(5), "a.bin", &[1, 2, 3]).unwrap();
        let staging_path = staged.staging_path().to_path_buf();
        let stored = service.promote(&staged).unwrap();

        assert!(!staging_path.exists());
        assert_eq!(fs::read(&stored.path).unwrap(), vec![1, 2, 3]);
        assert_eq!(stored.path, service.root_directory().join("5-a.bin"));
        assert_eq!(stored.id(), FileId::from_raw(5));
    }

    #[test]
    fn test_promote_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let first = service.stage(FileId::from_raw(5), "p.png", b"old").unwrap();
        service.promote(&first).unwrap();
        let second = service.stage(FileId::from_raw(5), "p.png", b"new").unwrap();
        let stored = service.promote(&second).unwrap();

        assert_eq!(fs::read(&stored.path).unwrap(), b"new");
    }

    #[test]
    fn test_discard_removes_staged_file() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let staged = service.stage(FileId::from_raw(5), "a.bin", b"x").unwrap();
        let staging_path = staged.staging_path().to_path_buf();
        service.discard(staged);

        assert!(!staging_path.exists());
        assert_eq!(count_staged(&service), 0);
    }

    #[test]
    fn test_media_type_detection() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let png = service.stage(FileId::from_raw(1), "p.png", &PNG_HEADER).unwrap();
        let text = service.stage(FileId::from_raw(1), "p.txt", b"plain text").unwrap();

        assert!(png.is_image());
        assert_eq!(
            png.file().media_type.as_ref().map(|t| t.as_str()),
            Some("image/png")
        );
        assert!(!text.is_image());
    }

    #[test]
    fn test_normalise_reference_accepts_legacy_forms() {
        assert_eq!(
            FilesService::normalise_reference("uploads/17-a.png").unwrap(),
            "17-a.png"
        );
        assert_eq!(
            FilesService::normalise_reference(r"uploads\17-a.png").unwrap(),
            "17-a.png"
        );
        assert_eq!(FilesService::normalise_reference("17-a.png").unwrap(), "17-a.png");
    }

    #[test]
    fn test_normalise_reference_rejects_non_stored_names() {
        for reference in ["", "data.json", "..", "../../etc/passwd", ".staging", "uploads/"] {
            assert!(
                matches!(
                    FilesService::normalise_reference(reference),
                    Err(FilesError::InvalidPath(_))
                ),
                "expected '{}' to be rejected",
                reference
            );
        }
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let path = service.resolve("../../12-escape.txt").unwrap();

        assert!(path.starts_with(service.root_directory()));
        assert!(path.ends_with("12-escape.txt"));
    }

    #[test]
    fn test_exists_and_remove_if_exists() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        let staged = service.stage(FileId::from_raw(9), "a.bin", b"x").unwrap();
        let stored = service.promote(&staged).unwrap();
        let reference = stored.reference();

        assert!(service.exists(&reference));
        assert!(service.remove_if_exists(&reference).unwrap());
        assert!(!service.exists(&reference));
        assert!(!service.remove_if_exists(&reference).unwrap());
    }

    #[test]
    fn test_exists_is_false_for_invalid_reference() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        fs::write(service.root_directory().join("data.json"), "[]").unwrap();

        assert!(!service.exists("data.json"));
    }

    #[test]
    fn test_clear_staging() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);

        assert_eq!(service.clear_staging().unwrap(), 0);

        service.stage(FileId::from_raw(1), "a", b"1").unwrap();
        service.stage(FileId::from_raw(2), "b", b"2").unwrap();

        assert_eq!(service.clear_staging().unwrap(), 2);
        assert_eq!(count_staged(&service), 0);
    }
}
