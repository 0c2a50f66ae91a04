//! Route handlers.
//!
//! Handlers are thin: extract the request, hand it to the [`CatalogService`], and turn the
//! result into JSON. Multipart decoding lives here because it is an HTTP concern.
//!
//! [`CatalogService`]: catalog_core::CatalogService

use crate::{ApiError, AppState};
use api_shared::{
    ErrorRes, FileRecordRes, HashCheckRes, HealthRes, HealthService, ListFilesParams, MessageRes,
    UpdateFileReq,
};
use axum::{
    body::Body,
    extract::{Multipart, Path as AxumPath, Query, Request, State},
    response::{IntoResponse, Json, Response},
};
use catalog_core::{FileId, NewArtifact, Payload, PreviewUpload, Stars};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use utoipa::ToSchema;

/// Form fields of `POST /api/upload`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub(crate) struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    description: Option<String>,
    /// Repeat the field for several tags
    tags: Option<Vec<String>>,
    /// Storage reference of an already uploaded preview
    preview: Option<String>,
    /// Client-computed content hash (`contentHash` is accepted too)
    md5: Option<String>,
    size: Option<u64>,
    stars: Option<String>,
}

/// Form fields of `POST /api/upload/preview`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub(crate) struct PreviewForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    #[schema(rename = "fileId")]
    file_id: String,
}

fn parse_id(raw: &str) -> Result<FileId, ApiError> {
    FileId::parse(raw).map_err(|_| ApiError::InvalidId(raw.to_owned()))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
pub(crate) async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/api/files",
    params(ListFilesParams),
    responses(
        (status = 200, description = "Matching files, most recent first", body = [FileRecordRes],
            headers(("x-total-count" = usize, description = "Number of matches before pagination"))),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List files with optional search and pagination
#[axum::debug_handler]
pub(crate) async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListFilesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.catalog.list(&params.into_query())?;

    let files: Vec<FileRecordRes> = page.files.into_iter().map(FileRecordRes::from).collect();
    Ok(([("x-total-count", page.total.to_string())], Json(files)))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "The file", body = FileRecordRes),
        (status = 400, description = "Invalid id", body = ErrorRes),
        (status = 404, description = "No such file", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn get_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<FileRecordRes>, ApiError> {
    let record = state.catalog.get(parse_id(&id)?)?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/api/files/check-md5/{hash}",
    params(("hash" = String, Path, description = "Content hash, any case")),
    responses(
        (status = 200, description = "Whether a file with this hash exists", body = HashCheckRes)
    )
)]
/// Advisory duplicate check before uploading
#[axum::debug_handler]
pub(crate) async fn check_hash(
    State(state): State<AppState>,
    AxumPath(hash): AxumPath<String>,
) -> Result<Json<HashCheckRes>, ApiError> {
    Ok(Json(state.catalog.check_hash(&hash)?.into()))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored", body = MessageRes),
        (status = 400, description = "No file or unusable filename", body = ErrorRes),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload an artifact with its metadata
#[axum::debug_handler]
pub(crate) async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageRes>, ApiError> {
    let mut upload = NewArtifact::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload.payload = Some(Payload::new(file_name, bytes.to_vec()));
            }
            "description" => upload.description = Some(field.text().await?),
            "tags" | "tags[]" => upload.tags.push(field.text().await?),
            "preview" => upload.preview = Some(field.text().await?),
            "md5" | "contentHash" => upload.content_hash = Some(field.text().await?),
            "size" => upload.declared_size = field.text().await?.trim().parse().ok(),
            "stars" => upload.stars = Stars::parse_leading_int(&field.text().await?),
            other => tracing::debug!("ignoring upload field '{}'", other),
        }
    }

    let record = state.catalog.create(upload)?;
    Ok(Json(MessageRes::new("File uploaded", record)))
}

#[utoipa::path(
    post,
    path = "/api/upload/preview",
    request_body(content = PreviewForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Preview linked", body = MessageRes),
        (status = 400, description = "Missing file, bad fileId or not an image", body = ErrorRes),
        (status = 404, description = "No file with that id", body = ErrorRes)
    )
)]
/// Upload a preview image for an existing file
#[axum::debug_handler]
pub(crate) async fn upload_preview(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageRes>, ApiError> {
    let mut upload = PreviewUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload.payload = Some(Payload::new(file_name, bytes.to_vec()));
            }
            "fileId" => upload.file_id = Some(field.text().await?),
            other => tracing::debug!("ignoring preview field '{}'", other),
        }
    }

    let record = state.catalog.link_preview(upload)?;
    let url = record
        .preview_path
        .as_ref()
        .map(|reference| format!("/uploads/{}", reference));

    let res = MessageRes::new("Preview uploaded", record);
    Ok(Json(match url {
        Some(url) => res.with_url(url),
        None => res,
    }))
}

#[utoipa::path(
    put,
    path = "/api/files/{id}",
    params(("id" = i64, Path, description = "File id")),
    request_body = UpdateFileReq,
    responses(
        (status = 200, description = "File updated", body = MessageRes),
        (status = 400, description = "Invalid field", body = ErrorRes),
        (status = 404, description = "No such file", body = ErrorRes)
    )
)]
/// Edit a file's name, description, tags, rating or preview
#[axum::debug_handler]
pub(crate) async fn update_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateFileReq>,
) -> Result<Json<MessageRes>, ApiError> {
    let record = state.catalog.update(parse_id(&id)?, req.into_update())?;
    Ok(Json(MessageRes::new("File updated", record)))
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = MessageRes),
        (status = 404, description = "No such file", body = ErrorRes),
        (status = 500, description = "Record removed but files remain", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn delete_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let removed = state.catalog.delete(parse_id(&id)?)?;
    Ok(Json(MessageRes::new("File deleted", removed)))
}

/// Serves stored artifacts and previews. Only identity-prefixed names resolve, so the metadata
/// document and the staging directory stay private.
pub(crate) async fn serve_upload(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state
        .catalog
        .files()
        .resolve(&name)
        .map_err(|_| ApiError::NotFound)?;

    if !path.is_file() {
        return Err(ApiError::NotFound);
    }

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(never) => match never {},
    }
}
