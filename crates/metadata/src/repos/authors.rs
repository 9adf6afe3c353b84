//! Authorship repository.

use crate::error::MetadataResult;
use crate::models::AuthorRow;
use async_trait::async_trait;

/// Repository for the package-to-user authorship relation.
#[async_trait]
pub trait AuthorRepo: Send + Sync {
    /// Check if a user may mutate a package.
    async fn is_author(&self, package: &str, username: &str) -> MetadataResult<bool>;

    /// List a package's authors in the order they were added.
    async fn list_authors(&self, package: &str) -> MetadataResult<Vec<AuthorRow>>;

    /// Grant authorship. Idempotent; returns whether the edge is new.
    /// `NotFound` if the package or user does not exist.
    async fn add_author(&self, package: &str, username: &str) -> MetadataResult<bool>;

    /// Revoke authorship. Returns whether the user was an author. Refuses
    /// with `Constraint` when it would leave the package without authors.
    async fn remove_author(&self, package: &str, username: &str) -> MetadataResult<bool>;
}
