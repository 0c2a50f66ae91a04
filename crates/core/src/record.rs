//! Catalogue records and the inputs that create and change them.

use catalog_ids::FileId;
use catalog_types::Stars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Metadata for one uploaded artifact.
///
/// Field names are camelCase in the metadata document. Documents written by earlier revisions
/// of the service used `filename`, `path`, `preview` and `md5`; those are accepted as aliases
/// when reading, and an empty `preview` string means no preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Stable identity, assigned at creation
    pub id: FileId,

    /// `<id>-<name>` filename of the artifact
    #[serde(alias = "filename")]
    pub stored_name: String,

    /// Filename as uploaded
    #[serde(default)]
    pub original_name: String,

    /// Display name (editable)
    pub name: String,

    /// Storage-relative reference to the artifact
    #[serde(alias = "path")]
    pub artifact_path: String,

    /// Storage-relative reference to the preview image, if one is linked
    #[serde(default, alias = "preview", deserialize_with = "empty_as_none")]
    pub preview_path: Option<String>,

    pub upload_time: DateTime<Utc>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub stars: Stars,

    /// Lowercase hex fingerprint of the artifact bytes
    #[serde(default, alias = "md5", deserialize_with = "empty_as_none")]
    pub content_hash: Option<String>,

    /// Artifact size in bytes
    #[serde(default)]
    pub size: u64,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Trims and lowercases a content hash; blank input means no hash.
pub fn normalise_hash(hash: &str) -> Option<String> {
    let hash = hash.trim();
    if hash.is_empty() {
        None
    } else {
        Some(hash.to_ascii_lowercase())
    }
}

/// Uploaded bytes with the filename the client gave them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Everything an artifact upload may carry.
///
/// `stars` is the raw integer read from the request; it is clamped on creation and a missing
/// value means 0.
#[derive(Debug, Clone, Default)]
pub struct NewArtifact {
    pub payload: Option<Payload>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub preview: Option<String>,
    pub content_hash: Option<String>,
    pub declared_size: Option<u64>,
    pub stars: Option<i64>,
}

/// A preview image upload for an existing record.
#[derive(Debug, Clone, Default)]
pub struct PreviewUpload {
    /// Identity of the owning record, exactly as supplied by the client
    pub file_id: Option<String>,
    pub payload: Option<Payload>,
}

/// Editable fields of a record. `None` leaves a field unchanged.
///
/// For `preview`, an empty string clears the current preview.
#[derive(Debug, Clone, Default)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub stars: Option<i64>,
    pub preview: Option<String>,
}

/// Listing parameters. Raw values are validated by the catalogue.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// One page (or all) of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePage {
    pub files: Vec<FileRecord>,
    /// Number of records matching the search, before pagination
    pub total: usize,
    pub page: Option<usize>,
    pub page_size: usize,
}

/// Result of an advisory duplicate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashCheck {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
}

/// What a reconciliation pass changed or found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records whose preview file was missing; their reference has been cleared
    pub cleared_previews: Vec<FileId>,
    /// Records whose artifact file is missing (left in place, reported only)
    pub missing_artifacts: Vec<FileId>,
    /// Abandoned uploads deleted from the staging directory
    pub staged_files_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_round_trips_with_camel_case_fields() {
        let record = FileRecord {
            id: FileId::from_raw(1700),
            stored_name: "1700-a.zip".into(),
            original_name: "a.zip".into(),
            name: "a.zip".into(),
            artifact_path: "1700-a.zip".into(),
            preview_path: None,
            upload_time: "2024-06-11T10:00:00Z".parse().unwrap(),
            description: String::new(),
            tags: vec!["x".into()],
            stars: Stars::clamped(3),
            content_hash: Some("abc".into()),
            size: 12,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["storedName"], "1700-a.zip");
        assert_eq!(json["artifactPath"], "1700-a.zip");
        assert_eq!(json["previewPath"], serde_json::Value::Null);
        assert_eq!(json["contentHash"], "abc");
        assert_eq!(json["stars"], 3);

        let back: FileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_reads_legacy_document_fields() {
        let legacy = r#"{
            "id": 1718099200123,
            "filename": "1718099200123-castle.unitypackage",
            "originalName": "castle.unitypackage",
            "name": "castle.unitypackage",
            "path": "uploads/1718099200123-castle.unitypackage",
            "uploadTime": "2024-06-11T10:00:00.123Z",
            "description": "",
            "tags": [],
            "preview": "",
            "md5": "D41D8CD98F00B204E9800998ECF8427E",
            "size": 2048,
            "stars": 7
        }"#;

        let record: FileRecord = serde_json::from_str(legacy).unwrap();

        assert_eq!(record.id.value(), 1_718_099_200_123);
        assert_eq!(record.stored_name, "1718099200123-castle.unitypackage");
        assert_eq!(
            record.artifact_path,
            "uploads/1718099200123-castle.unitypackage"
        );
        assert_eq!(record.preview_path, None);
        assert_eq!(
            record.content_hash.as_deref(),
            Some("D41D8CD98F00B204E9800998ECF8427E")
        );
        assert_eq!(record.stars.value(), 5);
    }

    #[test]
    fn test_reads_oldest_document_without_optional_fields() {
        let oldest = r#"{
            "id": 1,
            "filename": "1-a.zip",
            "name": "a.zip",
            "path": "uploads/1-a.zip",
            "uploadTime": "2024-01-01T00:00:00.000Z"
        }"#;

        let record: FileRecord = serde_json::from_str(oldest).unwrap();

        assert_eq!(record.stars, Stars::default());
        assert_eq!(record.size, 0);
        assert!(record.tags.is_empty());
        assert_eq!(record.content_hash, None);
    }

    #[test]
    fn test_normalise_hash() {
        assert_eq!(normalise_hash(" ABC "), Some("abc".to_string()));
        assert_eq!(normalise_hash("   "), None);
    }
}
