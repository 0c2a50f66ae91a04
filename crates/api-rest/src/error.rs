//! HTTP error responses.
//!
//! Every failure leaves the API as `{"error": "..."}`. Client mistakes carry the catalogue's
//! message; server-side failures are logged in full and answered with a generic message so
//! filesystem details never reach clients.

use api_shared::ErrorRes;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::CatalogError;

#[derive(Debug)]
pub enum ApiError {
    Catalog(CatalogError),
    Multipart(MultipartError),
    /// Path segment that cannot be a file id
    InvalidId(String),
    /// Static file that is not part of the catalogue
    NotFound,
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError::Catalog(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Catalog(e) => catalog_status(e),
            ApiError::Multipart(e) => {
                tracing::warn!("rejected multipart body: {}", e);
                (e.status(), e.body_text())
            }
            ApiError::InvalidId(id) => (
                StatusCode::BAD_REQUEST,
                format!("invalid file id: '{}'", id),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "file not found".to_string()),
        };

        (status, Json(ErrorRes { error: message })).into_response()
    }
}

fn catalog_status(e: CatalogError) -> (StatusCode, String) {
    if e.is_client_error() {
        let status = match &e {
            CatalogError::NotFound(_) | CatalogError::UnknownFileId(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        return (status, e.to_string());
    }

    match &e {
        CatalogError::StoreUnavailable(_) => {
            tracing::error!("{}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "metadata store is unavailable".to_string(),
            )
        }
        CatalogError::CorruptStore { .. } => {
            tracing::error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "metadata store is unreadable".to_string(),
            )
        }
        CatalogError::PartialDelete { id, .. } => {
            tracing::error!("{}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("file {} was removed but some of its files could not be deleted", id),
            )
        }
        _ => {
            tracing::error!("{}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{FileId, FilesError};

    fn status_of(e: CatalogError) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn test_catalog_errors_map_to_statuses() {
        let id = FileId::from_raw(7);

        assert_eq!(status_of(CatalogError::MissingPayload), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CatalogError::MalformedUpload("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CatalogError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(CatalogError::NotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(CatalogError::UnknownFileId(id)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CatalogError::StoreUnavailable(std::io::Error::other("down"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(CatalogError::PartialDelete {
                id,
                failed: vec!["7-a.zip".into()]
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(CatalogError::Files(FilesError::InvalidPath("x".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CatalogError::Files(FilesError::Io(std::io::Error::other("disk")))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(CatalogError::CorruptStore {
                path: "data.json".into(),
                source: serde_json::from_str::<Vec<u8>>("{ not json").unwrap_err(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_id_is_bad_request() {
        let response = ApiError::InvalidId("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
