//! # API REST
//!
//! REST API implementation for the file catalogue.
//!
//! Handles:
//! - HTTP endpoints with axum, including multipart uploads
//! - Serving stored artifacts and previews under `/uploads`
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, body size limits)
//!
//! Uses `api-shared` for wire types and `catalog-core` for every data operation.

#![warn(rust_2018_idioms)]

mod error;
mod handlers;

use api_shared::{ErrorRes, FileRecordRes, HashCheckRes, HealthRes, MessageRes, UpdateFileReq};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use catalog_core::CatalogService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Application state for the REST API server
///
/// Handlers share one catalogue; its store serialises every write.
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<CatalogService>,
}

impl AppState {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self { catalog }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_files,
        handlers::get_file,
        handlers::check_hash,
        handlers::upload_file,
        handlers::upload_preview,
        handlers::update_file,
        handlers::delete_file,
    ),
    components(schemas(
        HealthRes,
        FileRecordRes,
        MessageRes,
        HashCheckRes,
        UpdateFileReq,
        ErrorRes,
        handlers::UploadForm,
        handlers::PreviewForm,
    )),
)]
pub struct ApiDoc;

/// Builds the application router.
///
/// `max_upload_bytes` caps request bodies, which bounds multipart uploads.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/check-md5/:hash", get(handlers::check_hash))
        .route(
            "/api/files/:id",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/api/upload", post(handlers::upload_file))
        .route("/api/upload/preview", post(handlers::upload_preview))
        .route("/uploads/:name", get(handlers::serve_upload))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the API until the server fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server stops with an error.
pub async fn serve(addr: &str, state: AppState, max_upload_bytes: usize) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Starting catalog REST API on {}", addr);

    axum::serve(listener, router(state, max_upload_bytes)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use catalog_core::CoreConfig;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "catalog-test-boundary";
    const PNG: [u8; 12] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    ];

    enum Part<'a> {
        File(&'a str, &'a str, &'a [u8]),
        Text(&'a str, &'a str),
    }

    fn app(temp: &TempDir) -> Router {
        let cfg = CoreConfig::new(temp.path().join("uploads")).unwrap();
        let catalog = CatalogService::new(Arc::new(cfg)).unwrap();
        router(AppState::new(Arc::new(catalog)), 1024 * 1024)
    }

    fn multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::File(name, file_name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                            name, value
                        )
                        .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn upload(app: &Router, file_name: &str, bytes: &[u8]) -> Value {
        let (status, body) = send(
            app,
            multipart("/api/upload", &[Part::File("file", file_name, bytes)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["file"].clone()
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDir::new().unwrap();
        let (status, body) = send(&app(&temp), get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_metadata() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let (status, body) = send(
            &app,
            multipart(
                "/api/upload",
                &[
                    Part::File("file", "castle.zip", b"Hello, World!"),
                    Part::Text("description", "a castle"),
                    Part::Text("tags", "env"),
                    Part::Text("tags", "medieval"),
                    Part::Text("md5", "ABC123"),
                    Part::Text("size", "13"),
                    Part::Text("stars", "9"),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let file = &body["file"];
        let id = file["id"].as_i64().unwrap();
        assert_eq!(file["storedName"], format!("{}-castle.zip", id));
        assert_eq!(file["description"], "a castle");
        assert_eq!(file["tags"], json!(["env", "medieval"]));
        assert_eq!(file["contentHash"], "abc123");
        assert_eq!(file["size"], 13);
        assert_eq!(file["stars"], 5);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_corrupt_store_answers_server_error() {
        let temp = TempDir::new().unwrap();
        let storage = temp.path().join("uploads");
        std::fs::create_dir_all(&storage).unwrap();
        std::fs::write(storage.join("data.json"), "{ not json").unwrap();
        let app = app(&temp);

        let (status, body) = send(&app, get("/api/files")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "metadata store is unreadable");
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let (status, body) = send(
            &app,
            multipart("/api/upload", &[Part::Text("description", "nothing")]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_list_search_and_pagination() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        for name in ["Castle.zip", "tree.png", "castle-walls.zip"] {
            upload(&app, name, b"x").await;
        }

        let response = app
            .clone()
            .oneshot(get("/api/files?search=CASTLE&page=1&pageSize=1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-total-count"], "2");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let files: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(files.as_array().unwrap().len(), 1);
        assert_eq!(files[0]["name"], "castle-walls.zip");

        let (_, all) = send(&app, get("/api/files?page=abc")).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_get_check_update_and_delete() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        let file = upload(&app, "a.zip", b"abc").await;
        let id = file["id"].as_i64().unwrap();
        let hash = file["contentHash"].as_str().unwrap().to_uppercase();

        let (status, fetched) = send(&app, get(&format!("/api/files/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, file);

        let (_, check) = send(&app, get(&format!("/api/files/check-md5/{}", hash))).await;
        assert_eq!(check["exists"], true);
        assert_eq!(check["file"]["id"], id);

        let (_, missing) = send(&app, get("/api/files/check-md5/ffff")).await;
        assert_eq!(missing, json!({ "exists": false }));

        let (status, updated) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/files/{}", id),
                json!({ "name": "Renamed", "tags": "solo", "stars": "3", "id": 1, "size": 0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["file"]["name"], "Renamed");
        assert_eq!(updated["file"]["tags"], json!(["solo"]));
        assert_eq!(updated["file"]["stars"], 3);
        assert_eq!(updated["file"]["id"], id);
        assert_eq!(updated["file"]["size"], 3);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/files/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get(&format!("/api/files/{}", id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_id_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let (status, _) = send(&app(&temp), get("/api/files/abc")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preview_upload_links_and_serves_image() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        let file = upload(&app, "a.zip", b"abc").await;
        let id = file["id"].as_i64().unwrap().to_string();

        let (status, body) = send(
            &app,
            multipart(
                "/api/upload/preview",
                &[
                    Part::Text("fileId", &id),
                    Part::File("file", "shot.png", &PNG),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let url = body["url"].as_str().unwrap().to_string();
        assert_eq!(url, format!("/uploads/{}-shot.png", id));
        assert_eq!(body["file"]["previewPath"], format!("{}-shot.png", id));

        let response = app.clone().oneshot(get(&url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), PNG.as_slice());
    }

    #[tokio::test]
    async fn test_preview_for_unknown_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let (status, _) = send(
            &app,
            multipart(
                "/api/upload/preview",
                &[
                    Part::Text("fileId", "42"),
                    Part::File("file", "shot.png", &PNG),
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metadata_document_is_not_served() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let (status, _) = send(&app, get("/uploads/data.json")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
