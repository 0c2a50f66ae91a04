//! Catalogue operations.
//!
//! [`CatalogService`] binds stored files and metadata records into one entity. It is the only
//! component that touches both the [`MetadataStore`] and the [`FilesService`], and it keeps the
//! two consistent:
//!
//! - An artifact is on disk under its final name before its record is appended, and is removed
//!   again if the record cannot be saved.
//! - A preview is staged, then either linked to its record or discarded. A replaced preview is
//!   deleted only after the new reference has been saved.
//! - Deleting a record removes the record first and its files afterwards, best-effort.
//!
//! ## Pure Data Operations
//!
//! This module contains **only** data operations. HTTP concerns (multipart decoding, status
//! codes, static file serving) belong in `api-rest`.

use crate::config::CoreConfig;
use crate::record::{
    normalise_hash, FilePage, FileRecord, FileUpdate, HashCheck, ListQuery, NewArtifact,
    Payload, PreviewUpload, ReconcileReport,
};
use crate::store::MetadataStore;
use crate::{CatalogError, CatalogResult};
use catalog_files::{FilesError, FilesService, StagedFile, StoredFile};
use catalog_ids::{FileId, StoredName};
use catalog_types::{normalise_tags, NonEmptyText, Stars};
use chrono::Utc;
use std::sync::Arc;

/// Service for catalogue records and their files.
///
/// Create it once per storage directory and share it; the store inside serialises writes.
#[derive(Debug)]
pub struct CatalogService {
    cfg: Arc<CoreConfig>,
    store: MetadataStore,
    files: FilesService,
}

impl CatalogService {
    /// Opens the catalogue described by `cfg`, creating the storage directory and an empty
    /// metadata document if needed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the storage directory is unusable. A corrupt metadata document
    /// is not detected here; every later read reports it as [`CatalogError::CorruptStore`].
    pub fn new(cfg: Arc<CoreConfig>) -> CatalogResult<Self> {
        let files = FilesService::new(cfg.storage_dir())?;
        let store = MetadataStore::open(&cfg.data_file_path())?;

        Ok(Self { cfg, store, files })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn files(&self) -> &FilesService {
        &self.files
    }

    /// Stores an uploaded artifact and appends its record.
    ///
    /// # Returns
    ///
    /// The new record, including its server-assigned `id`. The artifact is stored as
    /// `<id>-<original name>`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if:
    /// - there is no payload, or it has no filename ([`CatalogError::MissingPayload`])
    /// - the filename cannot carry an identity prefix ([`CatalogError::MalformedUpload`])
    /// - the bytes or the metadata document cannot be written
    pub fn create(&self, upload: NewArtifact) -> CatalogResult<FileRecord> {
        let payload = Self::require_payload(upload.payload)?;
        let original_name = payload.file_name.trim().to_owned();

        let description = upload.description.unwrap_or_default();
        let tags = normalise_tags(upload.tags);
        let stars = upload.stars.map(Stars::clamped).unwrap_or_default();

        let mut promoted: Option<StoredFile> = None;

        let result = self.store.mutate(|txn| {
            let id = txn.allocate_id();

            let staged = self
                .files
                .stage(id, &original_name, &payload.bytes)
                .map_err(malformed_upload)?;
            let stored = self.promote_or_discard(staged)?;
            promoted = Some(stored.clone());

            Self::verify_identity_prefix(&stored, id)?;

            if let Some(declared) = upload.declared_size.filter(|d| *d != stored.size_bytes) {
                tracing::warn!(
                    "declared size {} for '{}' differs from received {} bytes; keeping received size",
                    declared,
                    original_name,
                    stored.size_bytes
                );
            }

            let content_hash = upload
                .content_hash
                .as_deref()
                .and_then(normalise_hash)
                .unwrap_or_else(|| stored.content_hash.clone());

            let preview_path = upload
                .preview
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .and_then(|p| self.linkable_reference(txn.records(), p, id, &stored.reference()));

            let record = FileRecord {
                id,
                stored_name: stored.reference(),
                original_name: original_name.clone(),
                name: original_name.clone(),
                artifact_path: stored.reference(),
                preview_path,
                upload_time: Utc::now(),
                description,
                tags,
                stars,
                content_hash: Some(content_hash),
                size: stored.size_bytes,
            };

            txn.records_mut().push(record.clone());
            Ok(record)
        });

        match result {
            Ok(record) => {
                tracing::info!("stored file {} as {}", record.id, record.stored_name);
                Ok(self.view(record))
            }
            Err(e) => {
                if let Some(stored) = promoted {
                    self.remove_quietly(&stored.reference());
                }
                Err(e)
            }
        }
    }

    /// Advisory duplicate check: finds a record whose content hash equals `hash`.
    ///
    /// Comparison ignores case and surrounding whitespace. Never changes anything.
    pub fn check_hash(&self, hash: &str) -> CatalogResult<HashCheck> {
        let Some(hash) = normalise_hash(hash) else {
            return Ok(HashCheck {
                exists: false,
                file: None,
            });
        };

        let found = self.store.find(|r| {
            r.content_hash
                .as_deref()
                .is_some_and(|h| h.eq_ignore_ascii_case(&hash))
        })?;

        Ok(HashCheck {
            exists: found.is_some(),
            file: found.map(|r| self.view(r)),
        })
    }

    /// Stages a preview image and links it to the record named by `upload.file_id`.
    ///
    /// The staged file is deleted whenever linking does not happen. A previous preview of the
    /// record is deleted after the new reference has been saved.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if:
    /// - there is no payload ([`CatalogError::MissingPayload`])
    /// - `file_id` is missing or not numeric, the bytes are not an image, or the preview would
    ///   overwrite the record's artifact ([`CatalogError::MalformedUpload`])
    /// - no record has that id ([`CatalogError::UnknownFileId`])
    pub fn link_preview(&self, upload: PreviewUpload) -> CatalogResult<FileRecord> {
        let payload = Self::require_payload(upload.payload)?;

        let raw_id = upload
            .file_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CatalogError::MalformedUpload("fileId is required".into()))?;
        let id = FileId::parse(&raw_id).map_err(|e| CatalogError::MalformedUpload(e.to_string()))?;

        let staged = self
            .files
            .stage(id, payload.file_name.trim(), &payload.bytes)
            .map_err(malformed_upload)?;

        if !staged.is_image() {
            self.files.discard(staged);
            return Err(CatalogError::MalformedUpload(
                "preview is not a recognised image".into(),
            ));
        }

        let new_reference = staged.file().reference();
        let mut promoted = false;

        let result = self.store.mutate(|txn| {
            let index = txn.position(id).ok_or(CatalogError::UnknownFileId(id))?;
            let record = &txn.records()[index];

            if same_reference(&record.artifact_path, &new_reference) {
                return Err(CatalogError::MalformedUpload(
                    "preview name collides with the artifact".into(),
                ));
            }
            if owned_by_other(txn.records(), &new_reference, id) {
                return Err(CatalogError::InvalidInput(format!(
                    "{} already belongs to another file",
                    new_reference
                )));
            }

            let previous = record.preview_path.clone();

            self.files.promote(&staged)?;
            promoted = true;

            let records = txn.records_mut();
            records[index].preview_path = Some(new_reference.clone());
            Ok((records[index].clone(), previous))
        });

        match result {
            Ok((record, previous)) => {
                tracing::info!("linked preview {} to file {}", new_reference, id);
                if let Some(previous) = previous.filter(|p| !same_reference(p, &new_reference)) {
                    self.remove_quietly(&previous);
                }
                Ok(self.view(record))
            }
            Err(e) => {
                if promoted {
                    // Promotion either created a new file or overwrote the current preview in
                    // place; only the former can be undone.
                    let replaced_in_place = self
                        .store
                        .find(|r| r.id == id)
                        .ok()
                        .flatten()
                        .and_then(|r| r.preview_path)
                        .is_some_and(|p| same_reference(&p, &new_reference));
                    if !replaced_in_place {
                        self.remove_quietly(&new_reference);
                    }
                } else {
                    self.files.discard(staged);
                }
                if matches!(e, CatalogError::UnknownFileId(_)) {
                    tracing::warn!("discarded preview upload for unknown file {}", id);
                }
                Err(e)
            }
        }
    }

    /// Applies the editable fields of `changes` to the record with `id`.
    ///
    /// `id`, `contentHash`, `size`, `artifactPath`, `storedName`, `originalName` and
    /// `uploadTime` are never changed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if:
    /// - there is no such record ([`CatalogError::NotFound`])
    /// - the new name is blank, or the new preview reference does not name an existing file
    ///   that this record may own ([`CatalogError::InvalidInput`])
    pub fn update(&self, id: FileId, changes: FileUpdate) -> CatalogResult<FileRecord> {
        let (record, replaced_preview) = self.store.mutate(|txn| {
            let index = txn.position(id).ok_or(CatalogError::NotFound(id))?;
            let mut updated = txn.records()[index].clone();

            if updated
                .preview_path
                .as_deref()
                .is_some_and(|p| !self.files.exists(p))
            {
                tracing::warn!("cleared missing preview of file {}", id);
                updated.preview_path = None;
            }

            if let Some(name) = changes.name {
                updated.name = NonEmptyText::new(name)
                    .map_err(|_| CatalogError::InvalidInput("name cannot be empty".into()))?
                    .into_string();
            }
            if let Some(description) = changes.description {
                updated.description = description;
            }
            if let Some(tags) = changes.tags {
                updated.tags = normalise_tags(tags);
            }
            if let Some(stars) = changes.stars {
                updated.stars = Stars::clamped(stars);
            }

            let mut replaced = None;
            if let Some(preview) = changes.preview {
                let new_reference = if preview.trim().is_empty() {
                    None
                } else {
                    Some(self.validate_preview_reference(txn.records(), &updated, &preview)?)
                };

                let unchanged = match (&updated.preview_path, &new_reference) {
                    (Some(current), Some(new)) => same_reference(current, new),
                    (None, None) => true,
                    _ => false,
                };

                if !unchanged {
                    replaced = updated.preview_path.take();
                    updated.preview_path = new_reference;
                }
            }

            txn.records_mut()[index] = updated.clone();
            Ok((updated, replaced))
        })?;

        tracing::info!("updated file {}", id);
        if let Some(previous) = replaced_preview {
            self.remove_quietly(&previous);
        }

        Ok(self.view(record))
    }

    /// Removes the record with `id` and then its artifact and preview files.
    ///
    /// Files that are already missing are not an error.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if:
    /// - there is no such record ([`CatalogError::NotFound`]); nothing changes
    /// - the record was removed but some of its files could not be deleted
    ///   ([`CatalogError::PartialDelete`])
    pub fn delete(&self, id: FileId) -> CatalogResult<FileRecord> {
        let removed = self.store.mutate(|txn| {
            let index = txn.position(id).ok_or(CatalogError::NotFound(id))?;
            Ok(txn.records_mut().remove(index))
        })?;

        let owned = std::iter::once(&removed.artifact_path).chain(removed.preview_path.as_ref());

        let mut failed = Vec::new();
        for reference in owned {
            match self.files.remove_if_exists(reference) {
                Ok(true) => {}
                Ok(false) => tracing::warn!("file {} was already missing: {}", id, reference),
                Err(e) => {
                    tracing::error!("failed to delete {} of file {}: {}", reference, id, e);
                    failed.push(reference.clone());
                }
            }
        }

        if !failed.is_empty() {
            return Err(CatalogError::PartialDelete { id, failed });
        }

        tracing::info!("deleted file {}", id);
        Ok(removed)
    }

    /// Returns one record.
    pub fn get(&self, id: FileId) -> CatalogResult<FileRecord> {
        self.store
            .find(|r| r.id == id)?
            .map(|r| self.view(r))
            .ok_or(CatalogError::NotFound(id))
    }

    /// Lists records, most recent upload first.
    ///
    /// The case-insensitive `search` filter on the display name is applied before pagination.
    /// Without `page` the whole filtered set is returned. A page below 1 is read as 1, and a
    /// missing or non-positive `page_size` falls back to the configured default.
    pub fn list(&self, query: &ListQuery) -> CatalogResult<FilePage> {
        let mut records = self.store.load_all()?;

        records.sort_by(|a, b| {
            b.upload_time
                .cmp(&a.upload_time)
                .then_with(|| b.id.cmp(&a.id))
        });

        let needle = query
            .search
            .as_deref()
            .map(str::to_lowercase)
            .filter(|s| !s.is_empty());
        if let Some(needle) = &needle {
            records.retain(|r| r.name.to_lowercase().contains(needle.as_str()));
        }

        let total = records.len();
        let page_size = query
            .page_size
            .filter(|size| *size > 0)
            .map(|size| usize::try_from(size).unwrap_or(usize::MAX))
            .unwrap_or(self.cfg.default_page_size());
        let page = query
            .page
            .map(|page| usize::try_from(page.max(1)).unwrap_or(usize::MAX));

        let selected: Vec<FileRecord> = match page {
            Some(page) => records
                .into_iter()
                .skip((page - 1).saturating_mul(page_size))
                .take(page_size)
                .collect(),
            None => records,
        };

        Ok(FilePage {
            files: selected.into_iter().map(|r| self.view(r)).collect(),
            total,
            page,
            page_size,
        })
    }

    /// Repairs what a crash or manual tampering can leave behind.
    ///
    /// Clears preview references whose file is gone, reports records whose artifact is gone,
    /// and deletes abandoned staged uploads. Intended for start-up.
    pub fn reconcile(&self) -> CatalogResult<ReconcileReport> {
        let staged_files_removed = self.files.clear_staging()?;

        let (cleared_previews, missing_artifacts) = self.store.mutate(|txn| {
            let missing_artifacts: Vec<FileId> = txn
                .records()
                .iter()
                .filter(|r| !self.files.exists(&r.artifact_path))
                .map(|r| r.id)
                .collect();

            let dangling: Vec<usize> = txn
                .records()
                .iter()
                .enumerate()
                .filter(|(_, r)| {
                    r.preview_path
                        .as_deref()
                        .is_some_and(|p| !self.files.exists(p))
                })
                .map(|(i, _)| i)
                .collect();

            let mut cleared = Vec::with_capacity(dangling.len());
            if !dangling.is_empty() {
                let records = txn.records_mut();
                for index in dangling {
                    records[index].preview_path = None;
                    cleared.push(records[index].id);
                }
            }

            Ok((cleared, missing_artifacts))
        })?;

        for id in &cleared_previews {
            tracing::warn!("cleared missing preview of file {}", id);
        }
        for id in &missing_artifacts {
            tracing::warn!("artifact of file {} is missing from storage", id);
        }

        Ok(ReconcileReport {
            cleared_previews,
            missing_artifacts,
            staged_files_removed,
        })
    }

    /// The record as clients see it: a preview reference whose file is gone reads as none.
    fn view(&self, mut record: FileRecord) -> FileRecord {
        if let Some(preview) = &record.preview_path {
            if !self.files.exists(preview) {
                tracing::warn!("file {} references missing preview {}", record.id, preview);
                record.preview_path = None;
            }
        }
        record
    }

    fn require_payload(payload: Option<Payload>) -> CatalogResult<Payload> {
        payload
            .filter(|p| !p.file_name.trim().is_empty())
            .ok_or(CatalogError::MissingPayload)
    }

    fn promote_or_discard(&self, staged: StagedFile) -> CatalogResult<StoredFile> {
        match self.files.promote(&staged) {
            Ok(stored) => Ok(stored),
            Err(e) => {
                self.files.discard(staged);
                Err(e.into())
            }
        }
    }

    /// The filename on disk must give back the identity the store allocated.
    fn verify_identity_prefix(stored: &StoredFile, id: FileId) -> CatalogResult<()> {
        let on_disk = stored
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        match StoredName::parse(on_disk) {
            Ok(name) if name.id() == id => Ok(()),
            Ok(name) => Err(CatalogError::MalformedUpload(format!(
                "stored name {} carries id {} instead of {}",
                on_disk,
                name.id(),
                id
            ))),
            Err(e) => Err(CatalogError::MalformedUpload(e.to_string())),
        }
    }

    /// Preview reference supplied with an artifact upload, if it can be linked.
    fn linkable_reference(
        &self,
        records: &[FileRecord],
        reference: &str,
        id: FileId,
        artifact: &str,
    ) -> Option<String> {
        let normalised = FilesService::normalise_reference(reference).ok();
        match normalised {
            Some(r) if self.files.exists(&r) && r != artifact && !owned_by_other(records, &r, id) => {
                Some(r)
            }
            _ => {
                tracing::warn!("ignoring preview reference '{}' for file {}", reference, id);
                None
            }
        }
    }

    fn validate_preview_reference(
        &self,
        records: &[FileRecord],
        record: &FileRecord,
        reference: &str,
    ) -> CatalogResult<String> {
        let normalised = FilesService::normalise_reference(reference)
            .map_err(|e| CatalogError::InvalidInput(e.to_string()))?;

        if !self.files.exists(&normalised) {
            return Err(CatalogError::InvalidInput(format!(
                "preview {} does not exist",
                normalised
            )));
        }
        if same_reference(&record.artifact_path, &normalised) {
            return Err(CatalogError::InvalidInput(
                "a file's artifact cannot be its own preview".into(),
            ));
        }
        if owned_by_other(records, &normalised, record.id) {
            return Err(CatalogError::InvalidInput(format!(
                "{} already belongs to another file",
                normalised
            )));
        }

        Ok(normalised)
    }

    fn remove_quietly(&self, reference: &str) {
        match self.files.remove_if_exists(reference) {
            Ok(_) => tracing::debug!("removed {}", reference),
            Err(e) => tracing::warn!("failed to remove {}: {}", reference, e),
        }
    }
}

fn malformed_upload(e: FilesError) -> CatalogError {
    match e {
        FilesError::Id(e) => CatalogError::MalformedUpload(e.to_string()),
        other => other.into(),
    }
}

/// Two references name the same stored file.
fn same_reference(a: &str, b: &str) -> bool {
    match (
        FilesService::normalise_reference(a),
        FilesService::normalise_reference(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Some record other than `id` uses `reference` as its artifact or preview.
fn owned_by_other(records: &[FileRecord], reference: &str, id: FileId) -> bool {
    records.iter().filter(|r| r.id != id).any(|r| {
        same_reference(&r.artifact_path, reference)
            || r.preview_path
                .as_deref()
                .is_some_and(|p| same_reference(p, reference))
    })
}
