//! Version repository.

use crate::error::MetadataResult;
use crate::models::{ArtifactRow, NewVersion, PublishOutcome, UnpublishOutcome, VersionRow};
use async_trait::async_trait;

/// Repository for immutable version records.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// Publish a version in one transaction.
    ///
    /// Creates the package with `publisher` as its sole author when it does
    /// not exist yet, inserts the version, and points `latest` at it.
    /// Fails with `AlreadyExists` if the version is already present, leaving
    /// nothing behind. Authorship of an existing package is the caller's
    /// check.
    async fn publish_version(
        &self,
        new: &NewVersion,
        publisher: &str,
    ) -> MetadataResult<PublishOutcome>;

    /// Get a version by its literal version string.
    async fn get_version(&self, package: &str, version: &str)
    -> MetadataResult<Option<VersionRow>>;

    /// List a package's versions in creation order.
    async fn list_versions(&self, package: &str) -> MetadataResult<Vec<VersionRow>>;

    /// Get the artifact bytes of a version.
    async fn get_artifact(&self, package: &str, version: &str)
    -> MetadataResult<Option<ArtifactRow>>;

    /// Remove a version in one transaction.
    ///
    /// Tags pointing at it are destroyed. If it was `latest` and others
    /// remain, `latest` moves to the newest remaining version. If none
    /// remain, the package is destroyed together with its authors.
    async fn unpublish_version(
        &self,
        package: &str,
        version: &str,
    ) -> MetadataResult<UnpublishOutcome>;

    /// Store the derived stylesheet unless one is already set.
    ///
    /// Only applies while the version still holds the artifact with
    /// `shasum`, so output derived from an unpublished artifact never lands
    /// on a republished version. Returns whether this call stored it.
    async fn set_cdn_if_absent(
        &self,
        package: &str,
        version: &str,
        shasum: &str,
        stylesheet: &str,
    ) -> MetadataResult<bool>;

    /// Get the derived stylesheet of a version.
    async fn get_cdn(&self, package: &str, version: &str) -> MetadataResult<Option<String>>;
}
