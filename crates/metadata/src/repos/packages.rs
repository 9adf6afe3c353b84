//! Package repository.

use crate::error::MetadataResult;
use crate::models::{PackageDeleteStats, PackageDetail, PackageRow};
use async_trait::async_trait;

/// Repository for package records.
///
/// Packages are created implicitly by [`VersionRepo::publish_version`]
/// and never through this trait.
///
/// [`VersionRepo::publish_version`]: crate::repos::VersionRepo::publish_version
#[async_trait]
pub trait PackageRepo: Send + Sync {
    /// Get a package by name.
    async fn get_package(&self, name: &str) -> MetadataResult<Option<PackageRow>>;

    /// Get a package together with its versions, tags and authors.
    ///
    /// All four reads share one transaction, so every tag in the result
    /// points at a version in the result.
    async fn get_package_detail(&self, name: &str) -> MetadataResult<Option<PackageDetail>>;

    /// Packages the user is an author of, by name.
    async fn list_packages_by_author(&self, username: &str) -> MetadataResult<Vec<PackageRow>>;

    /// Packages whose name matches a [`search_pattern`](crate::search_pattern).
    async fn search_packages(&self, pattern: &str, limit: u32)
    -> MetadataResult<Vec<PackageRow>>;

    /// Number of live packages.
    async fn count_packages(&self) -> MetadataResult<u64>;

    /// Delete a package with all its versions, tags, authors and download
    /// buckets atomically.
    async fn delete_package_with_cascade(&self, name: &str)
    -> MetadataResult<PackageDeleteStats>;
}
