//! Credential gate: one authorization decision from several strategies.
//!
//! Each [`AuthStrategy`] inspects the credential shape it understands and
//! either resolves a [`Principal`] or fails. The gate runs every strategy
//! that applies concurrently and accepts the first success. Callers only
//! ever see a single uniform `Unauthorized`, never which strategy failed
//! or why.

use crate::error::{ApiError, ApiResult};
use crate::identity::IdentityStore;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::{BoxFuture, select_ok};
use std::sync::Arc;

/// The authenticated identity performing a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

/// Credentials carried by a request, parsed from `Authorization`.
#[derive(Clone)]
pub enum Credentials {
    /// `Basic base64(username:password)`.
    Password { username: String, password: String },
    /// `Bearer <token>`, or a bare token from older clients.
    Token(String),
}

impl Credentials {
    /// Parse an `Authorization` header value.
    ///
    /// Scheme names are case-insensitive. Returns `None` when the value
    /// cannot carry credentials at all.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Some((scheme, rest)) = value.split_once(' ') {
            let rest = rest.trim();
            if scheme.eq_ignore_ascii_case("basic") {
                let decoded = STANDARD.decode(rest).ok()?;
                let decoded = String::from_utf8(decoded).ok()?;
                let (username, password) = decoded.split_once(':')?;
                return Some(Self::Password {
                    username: username.to_string(),
                    password: password.to_string(),
                });
            }
            if scheme.eq_ignore_ascii_case("bearer") {
                return (!rest.is_empty()).then(|| Self::Token(rest.to_string()));
            }
            return None;
        }

        Some(Self::Token(value.to_string()))
    }

    /// Label used in logs and metrics. Never includes the secret.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Token(_) => "token",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

/// One way of turning credentials into a principal.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy understands the credential shape.
    fn applies_to(&self, credentials: &Credentials) -> bool;

    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<Principal>;
}

/// Username and password checked against the stored bcrypt hash.
pub struct PasswordStrategy {
    identity: Arc<IdentityStore>,
}

impl PasswordStrategy {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl AuthStrategy for PasswordStrategy {
    fn name(&self) -> &'static str {
        "password"
    }

    fn applies_to(&self, credentials: &Credentials) -> bool {
        matches!(credentials, Credentials::Password { .. })
    }

    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<Principal> {
        let Credentials::Password { username, password } = credentials else {
            return Err(ApiError::Unauthorized("not a password credential".to_string()));
        };
        let user = self.identity.check_password(username, password).await?;
        Ok(Principal {
            username: user.username,
        })
    }
}

/// Signed session token.
pub struct TokenStrategy {
    identity: Arc<IdentityStore>,
}

impl TokenStrategy {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl AuthStrategy for TokenStrategy {
    fn name(&self) -> &'static str {
        "token"
    }

    fn applies_to(&self, credentials: &Credentials) -> bool {
        matches!(credentials, Credentials::Token(_))
    }

    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<Principal> {
        let Credentials::Token(token) = credentials else {
            return Err(ApiError::Unauthorized("not a token credential".to_string()));
        };
        let user = self.identity.validate_token(token).await?;
        Ok(Principal {
            username: user.username,
        })
    }
}

/// Runs the registered strategies and merges their verdicts.
pub struct CredentialGate {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl CredentialGate {
    /// Gate with the password and token strategies.
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self::with_strategies(vec![
            Box::new(PasswordStrategy::new(identity.clone())),
            Box::new(TokenStrategy::new(identity)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn AuthStrategy>>) -> Self {
        Self { strategies }
    }

    /// Authenticate credentials.
    ///
    /// Any strategy failure other than `Unauthorized` (a storage or hashing
    /// fault) is propagated as is, so outages do not masquerade as bad
    /// passwords.
    pub async fn authenticate(&self, credentials: &Credentials) -> ApiResult<Principal> {
        let attempts: Vec<BoxFuture<'_, ApiResult<Principal>>> = self
            .strategies
            .iter()
            .filter(|s| s.applies_to(credentials))
            .map(|s| {
                let name = s.name();
                Box::pin(async move {
                    s.authenticate(credentials).await.inspect_err(|e| {
                        tracing::debug!(strategy = name, error = %e, "strategy rejected credentials");
                    })
                }) as BoxFuture<'_, ApiResult<Principal>>
            })
            .collect();

        // select_ok panics on an empty set.
        let result = if attempts.is_empty() {
            Err(ApiError::Unauthorized("unsupported credentials".to_string()))
        } else {
            select_ok(attempts).await.map(|(principal, _)| principal)
        };

        match result {
            Ok(principal) => Ok(principal),
            Err(ApiError::Unauthorized(_)) => {
                crate::metrics::record_auth_failure(credentials.shape());
                tracing::warn!(shape = credentials.shape(), "rejected credentials");
                Err(ApiError::Unauthorized("invalid credentials".to_string()))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        shape: &'static str,
        outcome: fn() -> ApiResult<Principal>,
    }

    #[async_trait]
    impl AuthStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies_to(&self, credentials: &Credentials) -> bool {
            credentials.shape() == self.shape
        }

        async fn authenticate(&self, _credentials: &Credentials) -> ApiResult<Principal> {
            (self.outcome)()
        }
    }

    fn alice() -> ApiResult<Principal> {
        Ok(Principal {
            username: "alice".to_string(),
        })
    }

    fn denied() -> ApiResult<Principal> {
        Err(ApiError::Unauthorized("password mismatch for alice".to_string()))
    }

    #[test]
    fn test_parse_basic() {
        let header = format!("Basic {}", STANDARD.encode("alice:s3cr:et"));
        match Credentials::from_header(&header) {
            Some(Credentials::Password { username, password }) => {
                assert_eq!(username, "alice");
                assert_eq!(password, "s3cr:et");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Credentials::from_header("Basic !!!").is_none());
        assert!(Credentials::from_header(&format!("basic {}", STANDARD.encode("nocolon"))).is_none());
    }

    #[test]
    fn test_parse_bearer_and_bare_token() {
        assert!(matches!(
            Credentials::from_header("Bearer abc.def.ghi"),
            Some(Credentials::Token(t)) if t == "abc.def.ghi"
        ));
        assert!(matches!(
            Credentials::from_header("bEaReR abc"),
            Some(Credentials::Token(t)) if t == "abc"
        ));
        assert!(matches!(
            Credentials::from_header("abc.def.ghi"),
            Some(Credentials::Token(t)) if t == "abc.def.ghi"
        ));
        assert!(Credentials::from_header("Bearer ").is_none());
        assert!(Credentials::from_header("Digest x").is_none());
        assert!(Credentials::from_header("").is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::Password {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
        let creds = Credentials::Token("sekrit".to_string());
        assert!(!format!("{creds:?}").contains("sekrit"));
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let gate = CredentialGate::with_strategies(vec![
            Box::new(Fixed {
                name: "a",
                shape: "token",
                outcome: denied,
            }),
            Box::new(Fixed {
                name: "b",
                shape: "token",
                outcome: alice,
            }),
        ]);
        let principal = gate
            .authenticate(&Credentials::Token("t".to_string()))
            .await
            .unwrap();
        assert_eq!(principal.username, "alice");
    }

    #[tokio::test]
    async fn test_failures_are_uniform() {
        let gate = CredentialGate::with_strategies(vec![Box::new(Fixed {
            name: "a",
            shape: "password",
            outcome: denied,
        })]);

        let err = gate
            .authenticate(&Credentials::Password {
                username: "alice".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "invalid credentials"));

        // No strategy understands tokens here.
        let err = gate
            .authenticate(&Credentials::Token("t".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "invalid credentials"));
    }

    #[tokio::test]
    async fn test_internal_failures_propagate() {
        fn broken() -> ApiResult<Principal> {
            Err(ApiError::Internal("database is locked".to_string()))
        }
        let gate = CredentialGate::with_strategies(vec![Box::new(Fixed {
            name: "a",
            shape: "token",
            outcome: broken,
        })]);
        let err = gate
            .authenticate(&Credentials::Token("t".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
