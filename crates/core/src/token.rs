//! Session token claims.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Default session token lifetime in days.
pub const DEFAULT_TOKEN_TTL_DAYS: u32 = 30;

/// Claims carried by a signed session token.
///
/// The subject is the username the token was issued to. Signing and
/// verification happen in the server, which owns the secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// Claims for `username` issued at `now`, valid for `ttl`.
    pub fn new(username: &str, now: OffsetDateTime, ttl: Duration) -> Self {
        Self {
            sub: username.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        }
    }

    /// Check if the claims have expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_expiry_horizon() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let claims = Claims::new("alice", now, Duration::days(DEFAULT_TOKEN_TTL_DAYS as i64));

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
        assert!(!claims.is_expired_at(now + Duration::days(29)));
        assert!(claims.is_expired_at(now + Duration::days(30)));
    }
}
