//! Request and response bodies shared by the catalogue APIs.
//!
//! Core types stay free of wire concerns; these types own the JSON shape clients see and the
//! lenient parsing of what clients send.

use catalog_core::{FileRecord, FileUpdate, HashCheck, ListQuery, Stars};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// A catalogue record as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecordRes {
    pub id: i64,
    pub stored_name: String,
    pub original_name: String,
    pub name: String,
    pub artifact_path: String,
    pub preview_path: Option<String>,
    /// RFC 3339 timestamp with millisecond precision
    pub upload_time: String,
    pub description: String,
    pub tags: Vec<String>,
    pub stars: u8,
    pub content_hash: Option<String>,
    pub size: u64,
}

impl From<FileRecord> for FileRecordRes {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id.value(),
            stored_name: record.stored_name,
            original_name: record.original_name,
            name: record.name,
            artifact_path: record.artifact_path,
            preview_path: record.preview_path,
            upload_time: record
                .upload_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            description: record.description,
            tags: record.tags,
            stars: record.stars.value(),
            content_hash: record.content_hash,
            size: record.size,
        }
    }
}

/// Outcome of a write: a human-readable message and the affected record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
    pub file: FileRecordRes,
    /// Public URL of a newly uploaded preview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MessageRes {
    pub fn new(message: impl Into<String>, file: impl Into<FileRecordRes>) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HashCheckRes {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecordRes>,
}

impl From<HashCheck> for HashCheckRes {
    fn from(check: HashCheck) -> Self {
        Self {
            exists: check.exists,
            file: check.file.map(FileRecordRes::from),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

/// Query string of the listing endpoint.
///
/// Values are kept as text so that a malformed number degrades instead of failing the request:
/// a non-numeric `page` returns the whole set, a non-numeric `pageSize` uses the default.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFilesParams {
    /// Case-insensitive substring of the display name
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
    /// Records per page (default 20)
    pub page_size: Option<String>,
}

impl ListFilesParams {
    pub fn into_query(self) -> ListQuery {
        ListQuery {
            search: self.search.filter(|s| !s.is_empty()),
            page: self.page.as_deref().and_then(parse_int),
            page_size: self.page_size.as_deref().and_then(parse_int),
        }
    }
}

fn parse_int(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Tags may be sent as an array or as one string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    Many(Vec<String>),
    One(String),
}

impl TagsInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TagsInput::Many(tags) => tags,
            TagsInput::One(tag) => vec![tag],
        }
    }
}

/// Body of `PUT /api/files/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateFileReq {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Option<TagsInput>,
    /// Number or numeric string; clamped to 0..=5
    #[schema(value_type = Option<Object>)]
    pub stars: Option<serde_json::Value>,
    /// Storage reference of an existing file, or `""` to clear the preview
    #[serde(alias = "previewPath")]
    pub preview: Option<String>,
}

impl UpdateFileReq {
    pub fn into_update(self) -> FileUpdate {
        FileUpdate {
            name: self.name,
            description: self.description,
            tags: self.tags.map(TagsInput::into_vec),
            stars: self.stars.as_ref().and_then(stars_from_json),
            preview: self.preview,
        }
    }
}

/// Reads a rating from JSON. Fractions are truncated; anything unreadable is `None`.
fn stars_from_json(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        serde_json::Value::String(s) => Stars::parse_leading_int(s),
        _ => None,
    }
}
