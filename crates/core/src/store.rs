//! The metadata document.
//!
//! All catalogue metadata lives in one JSON document holding an array of [`FileRecord`]s. There
//! is no cache: every operation reads the document, works on the records in memory and, if it
//! changed anything, writes the whole document back.
//!
//! ## Single writer
//!
//! A [`MetadataStore`] serialises every operation behind one mutex, so two requests inside the
//! process can never interleave their read-modify-write cycles. It is meant to be created once
//! and shared (the catalogue service holds it, handlers hold the service through an `Arc`).
//! Several processes writing the same document are not coordinated.
//!
//! ## Crash safety
//!
//! Writes go to a temporary file next to the document, are flushed to disk, and then renamed
//! over the document. A crash mid-write leaves either the old or the new document, never a
//! truncated one.

use crate::record::FileRecord;
use crate::{CatalogError, CatalogResult};
use catalog_ids::{FileId, FileIdGenerator};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Handle to the metadata document.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    ids: Mutex<FileIdGenerator>,
}

/// The loaded records of one [`MetadataStore::mutate`] call.
///
/// Changes are written back only if [`Transaction::records_mut`] was used and the closure
/// returned `Ok`.
#[derive(Debug)]
pub struct Transaction<'a> {
    records: Vec<FileRecord>,
    ids: &'a mut FileIdGenerator,
    dirty: bool,
}

impl Transaction<'_> {
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Mutable access; marks the transaction as needing a write.
    pub fn records_mut(&mut self) -> &mut Vec<FileRecord> {
        self.dirty = true;
        &mut self.records
    }

    /// Index of the record with `id`, if any.
    pub fn position(&self, id: FileId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// Allocates a fresh identity, greater than every identity in the document.
    pub fn allocate_id(&mut self) -> FileId {
        let floor = self.records.iter().map(|r| r.id).max();
        self.ids.next(floor)
    }
}

impl MetadataStore {
    /// Opens the document at `path`, creating it (and its directory) with an empty collection if
    /// it does not exist yet.
    ///
    /// An existing document is not parsed here: a corrupt one surfaces as
    /// `CatalogError::CorruptStore` from the first read, so the process stays up.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::StoreUnavailable` if the directory or document cannot be created.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(CatalogError::StoreUnavailable)?;
        }

        let store = Self {
            path: path.to_path_buf(),
            ids: Mutex::new(FileIdGenerator::new()),
        };

        match fs::metadata(path) {
            Ok(_) => tracing::debug!("opened metadata store {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("creating empty metadata store {}", path.display());
                store.write_document(&[])?;
            }
            Err(e) => return Err(CatalogError::StoreUnavailable(e)),
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CorruptStore` if the document is not a JSON array of records, and
    /// `CatalogError::StoreUnavailable` if it cannot be read.
    pub fn load_all(&self) -> CatalogResult<Vec<FileRecord>> {
        let _guard = self.lock()?;
        self.read_document()
    }

    /// Replaces the whole document with `records`.
    pub fn save_all(&self, records: &[FileRecord]) -> CatalogResult<()> {
        let _guard = self.lock()?;
        self.write_document(records)
    }

    /// Returns the first record matching `predicate`.
    pub fn find(
        &self,
        predicate: impl Fn(&FileRecord) -> bool,
    ) -> CatalogResult<Option<FileRecord>> {
        self.read(|records| records.iter().find(|r| predicate(r)).cloned())
    }

    /// Appends `record`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInput` if a record with the same id already exists.
    pub fn insert(&self, record: FileRecord) -> CatalogResult<()> {
        self.mutate(|txn| {
            if txn.position(record.id).is_some() {
                return Err(CatalogError::InvalidInput(format!(
                    "a file with id {} already exists",
                    record.id
                )));
            }
            txn.records_mut().push(record);
            Ok(())
        })
    }

    /// Replaces the record with `id`, keeping `id` whatever `record` says.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if there is no such record.
    pub fn replace(&self, id: FileId, mut record: FileRecord) -> CatalogResult<FileRecord> {
        self.mutate(|txn| {
            let index = txn.position(id).ok_or(CatalogError::NotFound(id))?;
            record.id = id;
            txn.records_mut()[index] = record.clone();
            Ok(record)
        })
    }

    /// Removes the record with `id`. Returns false, without writing, if there was none.
    pub fn remove(&self, id: FileId) -> CatalogResult<bool> {
        self.mutate(|txn| match txn.position(id) {
            Some(index) => {
                txn.records_mut().remove(index);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Runs `f` over the current records while holding the lock.
    pub fn read<T>(&self, f: impl FnOnce(&[FileRecord]) -> T) -> CatalogResult<T> {
        let _guard = self.lock()?;
        let records = self.read_document()?;
        Ok(f(&records))
    }

    /// Runs a load-mutate-save cycle while holding the lock.
    ///
    /// The document is rewritten only if `f` succeeds and asked for mutable access.
    pub fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let mut ids = self.lock()?;
        let records = self.read_document()?;

        let mut txn = Transaction {
            records,
            ids: &mut *ids,
            dirty: false,
        };

        let value = f(&mut txn)?;

        if txn.dirty {
            self.write_document(&txn.records)?;
        }

        Ok(value)
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, FileIdGenerator>> {
        self.ids.lock().map_err(|_| {
            CatalogError::StoreUnavailable(std::io::Error::other(
                "metadata store lock poisoned by an earlier panic",
            ))
        })
    }

    fn read_document(&self) -> CatalogResult<Vec<FileRecord>> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("creating empty metadata store {}", self.path.display());
                self.write_document(&[])?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(CatalogError::StoreUnavailable(e)),
        };

        serde_json::from_slice(&contents).map_err(|source| CatalogError::CorruptStore {
            path: self.path.clone(),
            source,
        })
    }

    fn write_document(&self, records: &[FileRecord]) -> CatalogResult<()> {
        let json = serde_json::to_vec_pretty(records).map_err(CatalogError::Serialization)?;

        let temp_path = self.temp_path();
        let write_temp = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()
        };

        if let Err(e) = write_temp().and_then(|()| fs::rename(&temp_path, &self.path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(CatalogError::StoreUnavailable(e));
        }

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
