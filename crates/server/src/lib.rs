//! HTTP API server for the lode package registry.
//!
//! This crate provides:
//! - Accounts, session tokens and the credential gate
//! - The publish/unpublish orchestrator with per-package locking
//! - Package, tag and author endpoints
//! - Artifact downloads and the stylesheet CDN
//! - Asynchronous post-publish hooks

pub mod auth;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod hooks;
pub mod identity;
pub mod locks;
pub mod metrics;
pub mod registry;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use gate::{CredentialGate, Credentials, Principal};
pub use registry::{PublishRequest, Registry};
pub use routes::create_router;
pub use state::AppState;
