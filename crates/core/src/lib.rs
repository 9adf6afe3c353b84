//! Core domain types and shared logic for the lode package registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Package and tag names
//! - Semantic versions and publish manifests
//! - Usernames, emails and verification tokens
//! - Artifact content hashes
//! - Session token claims

pub mod config;
pub mod error;
pub mod hash;
pub mod package;
pub mod token;
pub mod user;
pub mod version;

pub use error::{Error, Result};
pub use hash::ContentHash;
pub use package::{PackageName, TagName};
pub use token::Claims;
pub use user::{Email, Username, VerificationToken};
pub use version::{Manifest, Version};

/// Readme stored when a publish carries none.
pub const DEFAULT_README: &str = "No readme!";

/// Default artifact size limit: 64 MiB
pub const DEFAULT_MAX_ARTIFACT_SIZE: u64 = 64 * 1024 * 1024;
