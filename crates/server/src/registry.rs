//! Publish/unpublish orchestration.
//!
//! Every mutating workflow follows the same shape: validate input, take
//! the package's critical section, check existence and authorship, then
//! apply the change through one atomic store call. Hooks are emitted only
//! after that call has committed and the section is released.

use crate::error::{ApiError, ApiResult};
use crate::gate::Principal;
use crate::hooks::{HookQueue, PublishEvent};
use crate::locks::PackageLocks;
use crate::metrics;
use bytes::Bytes;
use lode_core::{ContentHash, DEFAULT_README, Manifest, PackageName, TagName, Username, Version};
use lode_metadata::models::{
    ArtifactRow, NewVersion, PackageDeleteStats, PublishOutcome, TagRow, UnpublishOutcome,
    VersionRow,
};
use lode_metadata::{MetadataError, MetadataStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;

/// A parsed publish command.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub package: String,
    /// Manifest JSON object; must carry `version`.
    pub manifest: Value,
    pub artifact: Bytes,
    pub readme: Option<String>,
}

/// The package/version/tag/author orchestrator.
#[derive(Clone)]
pub struct Registry {
    metadata: Arc<dyn MetadataStore>,
    locks: PackageLocks,
    hooks: HookQueue,
}

impl Registry {
    pub fn new(metadata: Arc<dyn MetadataStore>, hooks: HookQueue) -> Self {
        Self {
            metadata,
            locks: PackageLocks::new(),
            hooks,
        }
    }

    /// Publish a new version, creating the package on first publish.
    ///
    /// The new version always becomes `latest`, whatever its semver
    /// ordering relative to older versions.
    pub async fn publish(
        &self,
        request: PublishRequest,
        principal: &Principal,
    ) -> ApiResult<PublishOutcome> {
        let package = PackageName::parse(&request.package)?;
        let manifest = Manifest::from_value(request.manifest)?;
        if request.artifact.is_empty() {
            return Err(ApiError::BadRequest("artifact cannot be empty".to_string()));
        }
        let version = manifest.version().to_string();
        let shasum = ContentHash::compute(&request.artifact).to_hex();
        let manifest_json = serde_json::to_string(manifest.raw())
            .map_err(|e| ApiError::Internal(format!("manifest serialization failed: {e}")))?;
        let readme = request
            .readme
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_README.to_string());

        let new = NewVersion {
            package: package.as_str().to_string(),
            version: version.clone(),
            manifest: manifest_json,
            description: manifest.description().map(str::to_string),
            readme,
            shasum,
            artifact: request.artifact.to_vec(),
            created_at: OffsetDateTime::now_utc(),
        };

        let outcome = {
            let _guard = self.locks.acquire(package.as_str()).await;
            let started = Instant::now();

            if self.metadata.get_package(package.as_str()).await?.is_some() {
                self.require_author(&package, principal).await?;
            }

            let outcome = self
                .metadata
                .publish_version(&new, &principal.username)
                .await
                .map_err(|e| match e {
                    MetadataError::AlreadyExists(_) => ApiError::Conflict(format!(
                        "version {version} of '{package}' already exists"
                    )),
                    other => other.into(),
                })?;

            metrics::PUBLISH_DURATION.observe(started.elapsed().as_secs_f64());
            outcome
        };

        metrics::VERSIONS_PUBLISHED.inc();
        tracing::info!(
            package = %package,
            version = %version,
            username = %principal.username,
            package_created = outcome.package_created,
            "version published"
        );

        self.hooks.emit(PublishEvent {
            package: package.as_str().to_string(),
            version,
            shasum: new.shasum,
            manifest: manifest.into_raw(),
            artifact: request.artifact,
        });

        Ok(outcome)
    }

    /// Remove one version. Removing the last version destroys the package.
    pub async fn unpublish(
        &self,
        package: &str,
        version: &str,
        principal: &Principal,
    ) -> ApiResult<UnpublishOutcome> {
        let package = PackageName::parse(package)?;
        let version = Version::parse(version)?.to_string();

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        let outcome = self
            .metadata
            .unpublish_version(package.as_str(), &version)
            .await
            .map_err(|e| match e {
                MetadataError::NotFound(_) => {
                    ApiError::NotFound(format!("version {version} of '{package}' not found"))
                }
                other => other.into(),
            })?;

        metrics::VERSIONS_UNPUBLISHED.inc();
        if outcome.package_destroyed {
            metrics::PACKAGES_DELETED.inc();
        }
        tracing::info!(
            package = %package,
            version = %version,
            username = %principal.username,
            tags_removed = outcome.tags_removed,
            latest = ?outcome.latest_reelected,
            package_destroyed = outcome.package_destroyed,
            "version unpublished"
        );
        Ok(outcome)
    }

    /// Destroy a package with everything it owns.
    pub async fn delete_package(
        &self,
        package: &str,
        principal: &Principal,
    ) -> ApiResult<PackageDeleteStats> {
        let package = PackageName::parse(package)?;

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        let stats = self
            .metadata
            .delete_package_with_cascade(package.as_str())
            .await?;

        metrics::PACKAGES_DELETED.inc();
        tracing::info!(
            package = %package,
            username = %principal.username,
            versions = stats.versions,
            tags = stats.tags,
            "package deleted"
        );
        Ok(stats)
    }

    /// Create or repoint a tag.
    pub async fn set_tag(
        &self,
        package: &str,
        tag: &str,
        version: &str,
        principal: &Principal,
    ) -> ApiResult<TagRow> {
        let package = PackageName::parse(package)?;
        let tag = TagName::parse(tag)?;
        let version = Version::parse(version)?.to_string();

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        let row = self
            .metadata
            .set_tag(package.as_str(), tag.as_str(), &version)
            .await
            .map_err(|e| match e {
                MetadataError::NotFound(_) => {
                    ApiError::NotFound(format!("version {version} of '{package}' not found"))
                }
                other => other.into(),
            })?;

        metrics::TAG_MUTATIONS.with_label_values(&["set"]).inc();
        tracing::info!(package = %package, tag = %tag, version = %version, "tag set");
        Ok(row)
    }

    /// Remove a tag. `latest` is always refused.
    pub async fn remove_tag(
        &self,
        package: &str,
        tag: &str,
        principal: &Principal,
    ) -> ApiResult<()> {
        let package = PackageName::parse(package)?;
        let tag = TagName::parse(tag)?;
        if tag.is_latest() {
            return Err(ApiError::Forbidden(
                "the latest tag cannot be removed".to_string(),
            ));
        }

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        self.metadata
            .remove_tag(package.as_str(), tag.as_str())
            .await
            .map_err(|e| match e {
                MetadataError::NotFound(_) => {
                    ApiError::NotFound(format!("tag '{tag}' of '{package}' not found"))
                }
                MetadataError::Constraint(msg) => ApiError::Forbidden(msg),
                other => other.into(),
            })?;

        metrics::TAG_MUTATIONS.with_label_values(&["remove"]).inc();
        tracing::info!(package = %package, tag = %tag, "tag removed");
        Ok(())
    }

    /// Grant authorship. Returns whether the user was newly added.
    pub async fn add_author(
        &self,
        package: &str,
        username: &str,
        principal: &Principal,
    ) -> ApiResult<bool> {
        let package = PackageName::parse(package)?;
        let username = Username::parse(username)?;

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        let added = self
            .metadata
            .add_author(package.as_str(), username.as_str())
            .await?;

        if added {
            metrics::AUTHOR_MUTATIONS.with_label_values(&["add"]).inc();
            tracing::info!(package = %package, author = %username, "author added");
        }
        Ok(added)
    }

    /// Revoke authorship.
    pub async fn remove_author(
        &self,
        package: &str,
        username: &str,
        principal: &Principal,
    ) -> ApiResult<()> {
        let package = PackageName::parse(package)?;
        let username = Username::parse(username)?;

        let _guard = self.locks.acquire(package.as_str()).await;
        self.require_existing_author(&package, principal).await?;

        if self.metadata.get_user(username.as_str()).await?.is_none() {
            return Err(ApiError::NotFound(format!("user '{username}' not found")));
        }

        let removed = self
            .metadata
            .remove_author(package.as_str(), username.as_str())
            .await
            .map_err(|e| match e {
                MetadataError::Constraint(msg) => ApiError::Conflict(msg),
                other => other.into(),
            })?;
        if !removed {
            return Err(ApiError::BadRequest("user is not an author".to_string()));
        }

        metrics::AUTHOR_MUTATIONS.with_label_values(&["remove"]).inc();
        tracing::info!(package = %package, author = %username, "author removed");
        Ok(())
    }

    /// Resolve a version or tag to its version record.
    pub async fn resolve(&self, package: &str, key: &str) -> ApiResult<VersionRow> {
        let package = PackageName::parse(package)?;
        let key = key.trim();

        match self.metadata.resolve(package.as_str(), key).await? {
            Some(row) => Ok(row),
            None if self.metadata.get_package(package.as_str()).await?.is_none() => Err(
                ApiError::NotFound(format!("package '{package}' not found")),
            ),
            None => Err(ApiError::NotFound(format!(
                "version or tag '{key}' of '{package}' not found"
            ))),
        }
    }

    /// Resolve a version or tag and load its artifact, checking the bytes
    /// against the hash recorded at publish time.
    pub async fn fetch_artifact(&self, package: &str, key: &str) -> ApiResult<ArtifactRow> {
        let version = self.resolve(package, key).await?;
        let Some(artifact) = self
            .metadata
            .get_artifact(&version.package, &version.version)
            .await?
        else {
            // Unpublished between the two reads.
            return Err(ApiError::NotFound(format!(
                "version {} of '{}' not found",
                version.version, version.package
            )));
        };

        let expected = ContentHash::from_hex(&artifact.shasum)
            .map_err(|e| ApiError::Internal(format!("stored hash is corrupt: {e}")))?;
        if !expected.matches(&artifact.artifact) {
            return Err(ApiError::Internal(format!(
                "artifact {}@{} does not match its recorded hash",
                artifact.package, artifact.version
            )));
        }
        Ok(artifact)
    }

    async fn require_existing_author(
        &self,
        package: &PackageName,
        principal: &Principal,
    ) -> ApiResult<()> {
        if self.metadata.get_package(package.as_str()).await?.is_none() {
            return Err(ApiError::NotFound(format!("package '{package}' not found")));
        }
        self.require_author(package, principal).await
    }

    async fn require_author(&self, package: &PackageName, principal: &Principal) -> ApiResult<()> {
        if self
            .metadata
            .is_author(package.as_str(), &principal.username)
            .await?
        {
            Ok(())
        } else {
            tracing::warn!(
                package = %package,
                username = %principal.username,
                "mutation refused for non-author"
            );
            Err(ApiError::Forbidden(format!(
                "'{}' is not an author of '{package}'",
                principal.username
            )))
        }
    }
}
