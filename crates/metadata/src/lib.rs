//! Metadata store abstraction and implementations for lode.
//!
//! This crate provides the registry's persisted data model:
//! - Packages and their authors
//! - Immutable versions with artifact bytes and content hashes
//! - Tags, including the mandatory `latest` pointer
//! - User accounts and verification state
//!
//! Every workflow that touches more than one row runs as a single
//! transaction inside one repository method.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use lode_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}

/// Build a `LIKE` pattern for a free-text search query.
///
/// The query is lowercased, runs of whitespace become wildcards, and the
/// whole thing matches as a substring. `%`, `_` and `\` in the query are
/// escaped, so queries must be run with `ESCAPE '\'`.
pub fn search_pattern(query: &str) -> String {
    let mut pattern = String::from("%");
    for (i, word) in query.split_whitespace().enumerate() {
        if i > 0 {
            pattern.push('%');
        }
        for c in word.to_lowercase().chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
    }
    pattern.push('%');
    pattern
}
