//! # API Shared
//!
//! Shared utilities and definitions for the catalogue APIs.
//!
//! Contains:
//! - Wire types for requests and responses (`dto` module), with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and `catalog-cli` so both present records the same way.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
