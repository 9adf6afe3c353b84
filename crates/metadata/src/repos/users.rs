//! User repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. `AlreadyExists` if the username or email is taken.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Get a user by lowercase username.
    async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>>;

    /// Mark an unverified user verified if `token` matches, clearing the
    /// token. Returns whether the account was verified by this call.
    async fn verify_user(
        &self,
        username: &str,
        token: &str,
        verified_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Users whose name matches a [`search_pattern`](crate::search_pattern).
    async fn search_users(&self, pattern: &str, limit: u32) -> MetadataResult<Vec<UserRow>>;

    /// Number of registered users.
    async fn count_users(&self) -> MetadataResult<u64>;
}
