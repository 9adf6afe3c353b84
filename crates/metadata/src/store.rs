//! Metadata store trait and SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{AuthorRepo, PackageRepo, TagRepo, UserRepo, VersionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    PackageRepo + VersionRepo + TagRepo + AuthorRepo + UserRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection serializes every transaction, so a workflow's
            // read-then-write can never interleave with another writer.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs = query_timeout.as_secs(),
            "SQLite metadata store ready"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// SQLite cannot cancel statements, so slow workflows are only reported.
    fn warn_if_slow(&self, operation: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.query_timeout.as_secs(),
                "metadata operation exceeded query timeout"
            );
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Columns selected into [`VersionRow`](crate::models::VersionRow).
/// The artifact blob is deliberately absent.
const VERSION_COLUMNS: &str = "package, version, seq, manifest, readme, shasum, size_bytes, \
     cdn IS NOT NULL AS has_cdn, created_at";

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::error::{MetadataError, map_unique_violation};
    use crate::models::*;
    use lode_core::TagName;
    use sqlx::SqliteConnection;
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// Point `latest` at the newest remaining version of a package.
    ///
    /// Runs inside the unpublish transaction so there is no window in which
    /// a live package lacks `latest`. Returns the elected version, or `None`
    /// when no versions remain.
    async fn reelect_latest(
        conn: &mut SqliteConnection,
        package: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<String>> {
        let newest: Option<String> = sqlx::query_scalar(
            "SELECT version FROM versions WHERE package = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(package)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(version) = newest else {
            return Ok(None);
        };

        upsert_tag(conn, package, TagName::LATEST, &version, now).await?;
        Ok(Some(version))
    }

    async fn upsert_tag(
        conn: &mut SqliteConnection,
        package: &str,
        name: &str,
        version: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tags (tag_id, package, name, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(package, name) DO UPDATE SET
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(package)
        .bind(name)
        .bind(version)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn touch_package(
        conn: &mut SqliteConnection,
        package: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<()> {
        sqlx::query("UPDATE packages SET updated_at = ? WHERE name = ?")
            .bind(now)
            .bind(package)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn package_exists(conn: &mut SqliteConnection, package: &str) -> MetadataResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM packages WHERE name = ?)")
                .bind(package)
                .fetch_one(&mut *conn)
                .await?;
        Ok(exists)
    }

    #[async_trait]
    impl PackageRepo for SqliteStore {
        async fn get_package(&self, name: &str) -> MetadataResult<Option<PackageRow>> {
            let row = sqlx::query_as::<_, PackageRow>("SELECT * FROM packages WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_package_detail(&self, name: &str) -> MetadataResult<Option<PackageDetail>> {
            let mut tx = self.pool.begin().await?;

            let Some(package) =
                sqlx::query_as::<_, PackageRow>("SELECT * FROM packages WHERE name = ?")
                    .bind(name)
                    .fetch_optional(&mut *tx)
                    .await?
            else {
                return Ok(None);
            };
            let versions = sqlx::query_as::<_, VersionRow>(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions WHERE package = ? ORDER BY seq"
            ))
            .bind(name)
            .fetch_all(&mut *tx)
            .await?;
            let tags =
                sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE package = ? ORDER BY name")
                    .bind(name)
                    .fetch_all(&mut *tx)
                    .await?;
            let authors = sqlx::query_as::<_, AuthorRow>(
                r#"
                SELECT u.username, u.created_at, a.added_at
                FROM package_authors a
                JOIN users u ON u.username = a.username
                WHERE a.package = ?
                ORDER BY a.added_at, u.username
                "#,
            )
            .bind(name)
            .fetch_all(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(Some(PackageDetail {
                package,
                versions,
                tags,
                authors,
            }))
        }

        async fn list_packages_by_author(
            &self,
            username: &str,
        ) -> MetadataResult<Vec<PackageRow>> {
            let rows = sqlx::query_as::<_, PackageRow>(
                r#"
                SELECT p.* FROM packages p
                JOIN package_authors a ON a.package = p.name
                WHERE a.username = ?
                ORDER BY p.name
                "#,
            )
            .bind(username)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn search_packages(
            &self,
            pattern: &str,
            limit: u32,
        ) -> MetadataResult<Vec<PackageRow>> {
            let rows = sqlx::query_as::<_, PackageRow>(
                r"SELECT * FROM packages WHERE name LIKE ? ESCAPE '\' ORDER BY name LIMIT ?",
            )
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_packages(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packages")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn delete_package_with_cascade(
            &self,
            name: &str,
        ) -> MetadataResult<PackageDeleteStats> {
            let started = Instant::now();
            let mut tx = self.pool.begin().await?;

            if !package_exists(&mut tx, name).await? {
                return Err(MetadataError::NotFound(format!("package '{name}'")));
            }

            // Tags reference versions, so they go first.
            let tags = sqlx::query("DELETE FROM tags WHERE package = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let versions = sqlx::query("DELETE FROM versions WHERE package = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let authors = sqlx::query("DELETE FROM package_authors WHERE package = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            let downloads = sqlx::query("DELETE FROM downloads WHERE package = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            sqlx::query("DELETE FROM packages WHERE name = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            self.warn_if_slow("delete_package", started);

            Ok(PackageDeleteStats {
                versions,
                tags,
                authors,
                downloads,
            })
        }
    }

    #[async_trait]
    impl VersionRepo for SqliteStore {
        async fn publish_version(
            &self,
            new: &NewVersion,
            publisher: &str,
        ) -> MetadataResult<PublishOutcome> {
            let started = Instant::now();
            let mut tx = self.pool.begin().await?;

            let package_created = !package_exists(&mut tx, &new.package).await?;

            if package_created {
                sqlx::query(
                    r#"
                    INSERT INTO packages (name, description, downloads, weekly_downloads, created_at, updated_at)
                    VALUES (?, ?, 0, 0, ?, ?)
                    "#,
                )
                .bind(&new.package)
                .bind(&new.description)
                .bind(new.created_at)
                .bind(new.created_at)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO package_authors (package, username, added_at) VALUES (?, ?, ?)",
                )
                .bind(&new.package)
                .bind(publisher)
                .bind(new.created_at)
                .execute(&mut *tx)
                .await?;
            } else {
                let duplicate: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM versions WHERE package = ? AND version = ?)",
                )
                .bind(&new.package)
                .bind(&new.version)
                .fetch_one(&mut *tx)
                .await?;

                if duplicate {
                    return Err(MetadataError::AlreadyExists(format!(
                        "{}@{}",
                        new.package, new.version
                    )));
                }

                sqlx::query(
                    "UPDATE packages SET description = COALESCE(?, description), updated_at = ? WHERE name = ?",
                )
                .bind(&new.description)
                .bind(new.created_at)
                .bind(&new.package)
                .execute(&mut *tx)
                .await?;
            }

            let seq: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM versions WHERE package = ?",
            )
            .bind(&new.package)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO versions (package, version, seq, manifest, readme, shasum, artifact, size_bytes, cdn, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
                "#,
            )
            .bind(&new.package)
            .bind(&new.version)
            .bind(seq)
            .bind(&new.manifest)
            .bind(&new.readme)
            .bind(&new.shasum)
            .bind(&new.artifact)
            .bind(new.artifact.len() as i64)
            .bind(new.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, |_| format!("{}@{}", new.package, new.version)))?;

            // Last publish wins: latest follows the newest publish, not the
            // highest version.
            upsert_tag(
                &mut tx,
                &new.package,
                TagName::LATEST,
                &new.version,
                new.created_at,
            )
            .await?;

            tx.commit().await?;
            self.warn_if_slow("publish_version", started);

            Ok(PublishOutcome {
                version: VersionRow {
                    package: new.package.clone(),
                    version: new.version.clone(),
                    seq,
                    manifest: new.manifest.clone(),
                    readme: new.readme.clone(),
                    shasum: new.shasum.clone(),
                    size_bytes: new.artifact.len() as i64,
                    has_cdn: false,
                    created_at: new.created_at,
                },
                package_created,
            })
        }

        async fn get_version(
            &self,
            package: &str,
            version: &str,
        ) -> MetadataResult<Option<VersionRow>> {
            let row = sqlx::query_as::<_, VersionRow>(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions WHERE package = ? AND version = ?"
            ))
            .bind(package)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_versions(&self, package: &str) -> MetadataResult<Vec<VersionRow>> {
            let rows = sqlx::query_as::<_, VersionRow>(&format!(
                "SELECT {VERSION_COLUMNS} FROM versions WHERE package = ? ORDER BY seq"
            ))
            .bind(package)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_artifact(
            &self,
            package: &str,
            version: &str,
        ) -> MetadataResult<Option<ArtifactRow>> {
            let row = sqlx::query_as::<_, ArtifactRow>(
                "SELECT package, version, shasum, artifact FROM versions WHERE package = ? AND version = ?",
            )
            .bind(package)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn unpublish_version(
            &self,
            package: &str,
            version: &str,
        ) -> MetadataResult<UnpublishOutcome> {
            let started = Instant::now();
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM versions WHERE package = ? AND version = ?)",
            )
            .bind(package)
            .bind(version)
            .fetch_one(&mut *tx)
            .await?;

            if !exists {
                return Err(MetadataError::NotFound(format!("{package}@{version}")));
            }

            let was_latest: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM tags WHERE package = ? AND name = ? AND version = ?)",
            )
            .bind(package)
            .bind(TagName::LATEST)
            .bind(version)
            .fetch_one(&mut *tx)
            .await?;

            let tags_removed = sqlx::query("DELETE FROM tags WHERE package = ? AND version = ?")
                .bind(package)
                .bind(version)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            sqlx::query("DELETE FROM versions WHERE package = ? AND version = ?")
                .bind(package)
                .bind(version)
                .execute(&mut *tx)
                .await?;

            let remaining: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM versions WHERE package = ?")
                    .bind(package)
                    .fetch_one(&mut *tx)
                    .await?;

            let mut outcome = UnpublishOutcome {
                tags_removed,
                ..UnpublishOutcome::default()
            };

            if remaining == 0 {
                for table in ["tags", "package_authors", "downloads"] {
                    sqlx::query(&format!("DELETE FROM {table} WHERE package = ?"))
                        .bind(package)
                        .execute(&mut *tx)
                        .await?;
                }
                sqlx::query("DELETE FROM packages WHERE name = ?")
                    .bind(package)
                    .execute(&mut *tx)
                    .await?;
                outcome.package_destroyed = true;
            } else {
                if was_latest {
                    outcome.latest_reelected = reelect_latest(&mut tx, package, now).await?;
                }
                touch_package(&mut tx, package, now).await?;
            }

            tx.commit().await?;
            self.warn_if_slow("unpublish_version", started);

            Ok(outcome)
        }

        async fn set_cdn_if_absent(
            &self,
            package: &str,
            version: &str,
            shasum: &str,
            stylesheet: &str,
        ) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE versions SET cdn = ? \
                 WHERE package = ? AND version = ? AND shasum = ? AND cdn IS NULL",
            )
            .bind(stylesheet)
            .bind(package)
            .bind(version)
            .bind(shasum)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn get_cdn(&self, package: &str, version: &str) -> MetadataResult<Option<String>> {
            let cdn: Option<Option<String>> =
                sqlx::query_scalar("SELECT cdn FROM versions WHERE package = ? AND version = ?")
                    .bind(package)
                    .bind(version)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(cdn.flatten())
        }
    }

    #[async_trait]
    impl TagRepo for SqliteStore {
        async fn list_tags(&self, package: &str) -> MetadataResult<Vec<TagRow>> {
            let rows =
                sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE package = ? ORDER BY name")
                    .bind(package)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(rows)
        }

        async fn get_tag(&self, package: &str, name: &str) -> MetadataResult<Option<TagRow>> {
            let row =
                sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE package = ? AND name = ?")
                    .bind(package)
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn resolve(&self, package: &str, key: &str) -> MetadataResult<Option<VersionRow>> {
            if let Some(row) = self.get_version(package, key).await? {
                return Ok(Some(row));
            }

            // Single statement, so the tag and its target are read together.
            let row = sqlx::query_as::<_, VersionRow>(
                r#"
                SELECT v.package, v.version, v.seq, v.manifest, v.readme, v.shasum, v.size_bytes,
                       v.cdn IS NOT NULL AS has_cdn, v.created_at
                FROM tags t
                JOIN versions v ON v.package = t.package AND v.version = t.version
                WHERE t.package = ? AND t.name = ?
                "#,
            )
            .bind(package)
            .bind(key.to_ascii_lowercase())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn set_tag(
            &self,
            package: &str,
            name: &str,
            version: &str,
        ) -> MetadataResult<TagRow> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM versions WHERE package = ? AND version = ?)",
            )
            .bind(package)
            .bind(version)
            .fetch_one(&mut *tx)
            .await?;

            if !exists {
                return Err(MetadataError::NotFound(format!("{package}@{version}")));
            }

            upsert_tag(&mut tx, package, name, version, now).await?;
            touch_package(&mut tx, package, now).await?;

            let row =
                sqlx::query_as::<_, TagRow>("SELECT * FROM tags WHERE package = ? AND name = ?")
                    .bind(package)
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;

            tx.commit().await?;
            Ok(row)
        }

        async fn remove_tag(&self, package: &str, name: &str) -> MetadataResult<()> {
            if name == TagName::LATEST {
                return Err(MetadataError::Constraint(
                    "the latest tag cannot be removed".to_string(),
                ));
            }

            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let removed = sqlx::query("DELETE FROM tags WHERE package = ? AND name = ?")
                .bind(package)
                .bind(name)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            if removed == 0 {
                return Err(MetadataError::NotFound(format!(
                    "tag '{name}' of package '{package}'"
                )));
            }

            touch_package(&mut tx, package, now).await?;
            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl AuthorRepo for SqliteStore {
        async fn is_author(&self, package: &str, username: &str) -> MetadataResult<bool> {
            let is_author: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM package_authors WHERE package = ? AND username = ?)",
            )
            .bind(package)
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
            Ok(is_author)
        }

        async fn list_authors(&self, package: &str) -> MetadataResult<Vec<AuthorRow>> {
            let rows = sqlx::query_as::<_, AuthorRow>(
                r#"
                SELECT u.username, u.created_at, a.added_at
                FROM package_authors a
                JOIN users u ON u.username = a.username
                WHERE a.package = ?
                ORDER BY a.added_at, u.username
                "#,
            )
            .bind(package)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn add_author(&self, package: &str, username: &str) -> MetadataResult<bool> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            if !package_exists(&mut tx, package).await? {
                return Err(MetadataError::NotFound(format!("package '{package}'")));
            }

            let user_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                    .bind(username)
                    .fetch_one(&mut *tx)
                    .await?;

            if !user_exists {
                return Err(MetadataError::NotFound(format!("user '{username}'")));
            }

            let added = sqlx::query(
                "INSERT OR IGNORE INTO package_authors (package, username, added_at) VALUES (?, ?, ?)",
            )
            .bind(package)
            .bind(username)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                == 1;

            if added {
                touch_package(&mut tx, package, now).await?;
            }

            tx.commit().await?;
            Ok(added)
        }

        async fn remove_author(&self, package: &str, username: &str) -> MetadataResult<bool> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let authors: Vec<String> = sqlx::query_scalar(
                "SELECT username FROM package_authors WHERE package = ?",
            )
            .bind(package)
            .fetch_all(&mut *tx)
            .await?;

            if !authors.iter().any(|a| a == username) {
                return Ok(false);
            }

            if authors.len() == 1 {
                return Err(MetadataError::Constraint(format!(
                    "'{username}' is the last author of '{package}'"
                )));
            }

            sqlx::query("DELETE FROM package_authors WHERE package = ? AND username = ?")
                .bind(package)
                .bind(username)
                .execute(&mut *tx)
                .await?;

            touch_package(&mut tx, package, now).await?;
            tx.commit().await?;
            Ok(true)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash, verified, verification_token, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.verified)
            .bind(&user.verification_token)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_unique_violation(e, |msg| {
                    // SQLite error: "UNIQUE constraint failed: users.email"
                    if msg.contains("users.email") {
                        format!("email '{}'", user.email)
                    } else {
                        format!("user '{}'", user.username)
                    }
                })
            })?;
            Ok(())
        }

        async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn verify_user(
            &self,
            username: &str,
            token: &str,
            verified_at: OffsetDateTime,
        ) -> MetadataResult<bool> {
            // Match and clear in one statement so a token is usable once.
            let result = sqlx::query(
                r#"
                UPDATE users SET verified = 1, verification_token = NULL, updated_at = ?
                WHERE username = ? AND verified = 0 AND verification_token = ?
                "#,
            )
            .bind(verified_at)
            .bind(username)
            .bind(token)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn search_users(&self, pattern: &str, limit: u32) -> MetadataResult<Vec<UserRow>> {
            let rows = sqlx::query_as::<_, UserRow>(
                r"SELECT * FROM users WHERE username LIKE ? ESCAPE '\' ORDER BY username LIMIT ?",
            )
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_users(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    verification_token TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Packages exist only while they have versions
CREATE TABLE IF NOT EXISTS packages (
    name TEXT PRIMARY KEY,
    description TEXT,
    downloads INTEGER NOT NULL DEFAULT 0,
    weekly_downloads INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Immutable versions; only cdn is ever written after insert
CREATE TABLE IF NOT EXISTS versions (
    package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
    version TEXT NOT NULL,
    seq INTEGER NOT NULL,
    manifest TEXT NOT NULL,
    readme TEXT NOT NULL,
    shasum TEXT NOT NULL,
    artifact BLOB NOT NULL,
    size_bytes INTEGER NOT NULL,
    cdn TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (package, version),
    UNIQUE (package, seq)
);

-- Tags; the version reference has no cascade so a tag can never dangle
CREATE TABLE IF NOT EXISTS tags (
    tag_id BLOB PRIMARY KEY,
    package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (package, name),
    FOREIGN KEY (package, version) REFERENCES versions(package, version)
);
CREATE INDEX IF NOT EXISTS idx_tags_version ON tags(package, version);

-- Authorship
CREATE TABLE IF NOT EXISTS package_authors (
    package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
    username TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    added_at TEXT NOT NULL,
    PRIMARY KEY (package, username)
);
CREATE INDEX IF NOT EXISTS idx_package_authors_user ON package_authors(username);

-- Monthly download buckets (month = first day of the month)
CREATE TABLE IF NOT EXISTS downloads (
    package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
    month TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (package, month)
);
"#;
