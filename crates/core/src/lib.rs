//! # Catalog Core
//!
//! Core business logic for the file catalogue.
//!
//! This crate contains pure data operations:
//! - The JSON metadata document and its single-writer store ([`store`])
//! - Record types and the inputs that create and change them ([`record`])
//! - The catalogue service that keeps records and stored files consistent ([`catalog`])
//!
//! **No API concerns**: HTTP servers, multipart decoding and command-line parsing belong in
//! `api-rest`, `api-shared` and `catalog-cli`.
//!
//! Configuration is resolved once at startup into a [`CoreConfig`] and passed in; nothing in
//! this crate reads environment variables during a request.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod record;
pub mod store;

pub use catalog::CatalogService;
pub use config::CoreConfig;
pub use error::{CatalogError, CatalogResult};
pub use record::{
    FilePage, FileRecord, FileUpdate, HashCheck, ListQuery, NewArtifact, Payload, PreviewUpload,
    ReconcileReport,
};
pub use store::MetadataStore;

pub use catalog_files::{FilesError, FilesService};
pub use catalog_ids::{FileId, StoredName};
pub use catalog_types::{NonEmptyText, Stars};
