//! Tag repository.

use crate::error::MetadataResult;
use crate::models::{TagRow, VersionRow};
use async_trait::async_trait;

/// Repository for per-package tag pointers.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// List a package's tags by name.
    async fn list_tags(&self, package: &str) -> MetadataResult<Vec<TagRow>>;

    /// Get a tag by its case-folded name.
    async fn get_tag(&self, package: &str, name: &str) -> MetadataResult<Option<TagRow>>;

    /// Resolve a key as a literal version first, then as a tag name.
    async fn resolve(&self, package: &str, key: &str) -> MetadataResult<Option<VersionRow>>;

    /// Create or repoint a tag. Fails with `NotFound` if the version does
    /// not exist in the package.
    async fn set_tag(&self, package: &str, name: &str, version: &str) -> MetadataResult<TagRow>;

    /// Remove a tag. `latest` is refused with `Constraint`; a missing tag
    /// is `NotFound`.
    async fn remove_tag(&self, package: &str, name: &str) -> MetadataResult<()>;
}
