//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Packages
// =============================================================================

/// Package record. Exists only while at least one version does.
#[derive(Debug, Clone, FromRow)]
pub struct PackageRow {
    pub name: String,
    pub description: Option<String>,
    /// Cumulative downloads. Not incremented by the registry itself.
    pub downloads: i64,
    pub weekly_downloads: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Rows removed by a package cascade delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDeleteStats {
    pub versions: u64,
    pub tags: u64,
    pub authors: u64,
    pub downloads: u64,
}

/// A package with its versions, tags and authors, read as one snapshot.
#[derive(Debug, Clone)]
pub struct PackageDetail {
    pub package: PackageRow,
    /// In creation order.
    pub versions: Vec<VersionRow>,
    pub tags: Vec<TagRow>,
    pub authors: Vec<AuthorRow>,
}

// =============================================================================
// Versions
// =============================================================================

/// Version record without the artifact bytes.
#[derive(Debug, Clone, FromRow)]
pub struct VersionRow {
    pub package: String,
    pub version: String,
    /// Per-package creation sequence; higher is newer.
    pub seq: i64,
    /// Manifest JSON exactly as published.
    pub manifest: String,
    pub readme: String,
    /// Lowercase hex SHA-256 of the artifact.
    pub shasum: String,
    pub size_bytes: i64,
    /// Whether the derived stylesheet has been stored.
    pub has_cdn: bool,
    pub created_at: OffsetDateTime,
}

/// Artifact bytes of a version together with their recorded hash.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub package: String,
    pub version: String,
    pub shasum: String,
    pub artifact: Vec<u8>,
}

/// Input to a publish.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub package: String,
    pub version: String,
    pub manifest: String,
    /// Replaces the package description when present.
    pub description: Option<String>,
    pub readme: String,
    pub shasum: String,
    pub artifact: Vec<u8>,
    pub created_at: OffsetDateTime,
}

/// Result of a committed publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub version: VersionRow,
    /// The publish brought the package into existence.
    pub package_created: bool,
}

/// Result of a committed unpublish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpublishOutcome {
    /// Tags that pointed at the removed version, `latest` included.
    pub tags_removed: u64,
    /// New target of `latest` when it had to be re-elected.
    pub latest_reelected: Option<String>,
    /// The last version went away, taking the package with it.
    pub package_destroyed: bool,
}

// =============================================================================
// Tags
// =============================================================================

/// Tag record: a named pointer at one version of the same package.
#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub tag_id: Uuid,
    pub package: String,
    pub name: String,
    pub version: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Users and authorship
// =============================================================================

/// User account record.
#[derive(Clone, FromRow)]
pub struct UserRow {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verified: bool,
    /// Pending verification secret; cleared once used.
    pub verification_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl std::fmt::Debug for UserRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRow")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("verified", &self.verified)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Author of a package, with when they were granted access.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorRow {
    pub username: String,
    pub created_at: OffsetDateTime,
    pub added_at: OffsetDateTime,
}
