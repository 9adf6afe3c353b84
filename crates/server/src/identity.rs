//! Account store: registration, verification, password checks and
//! session tokens.

use crate::error::{ApiError, ApiResult};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lode_core::config::AuthConfig;
use lode_core::{Claims, Email, Username, VerificationToken};
use lode_metadata::MetadataStore;
use lode_metadata::models::UserRow;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// A freshly created, still unverified account.
#[derive(Debug)]
pub struct Registration {
    pub user: UserRow,
    /// Single-use secret the user must present to `verify`.
    pub verification_token: VerificationToken,
}

/// Identity operations over the user table.
///
/// The signing secret is handed in at construction; nothing here reads
/// process-wide state.
pub struct IdentityStore {
    metadata: Arc<dyn MetadataStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

impl IdentityStore {
    pub fn new(metadata: Arc<dyn MetadataStore>, config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            metadata,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_ttl: Duration::days(i64::from(config.token_ttl_days)),
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Create an unverified account.
    ///
    /// Fails with `Conflict` when the username or email is taken.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ApiResult<Registration> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(ApiError::BadRequest("password cannot be empty".to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let verification_token = VerificationToken::generate();
        let now = OffsetDateTime::now_utc();
        let user = UserRow {
            username: username.as_str().to_string(),
            email: email.as_str().to_string(),
            password_hash,
            verified: false,
            verification_token: Some(verification_token.as_str().to_string()),
            created_at: now,
            updated_at: now,
        };

        // A taken username or email surfaces as AlreadyExists, i.e. Conflict.
        self.metadata.create_user(&user).await?;

        tracing::info!(username = %user.username, "user registered");
        Ok(Registration {
            user,
            verification_token,
        })
    }

    /// Consume a verification token.
    pub async fn verify(&self, username: &str, token: &str) -> ApiResult<()> {
        let username = Username::parse(username)?;
        if self.metadata.get_user(username.as_str()).await?.is_none() {
            return Err(ApiError::NotFound(format!("user '{username}' not found")));
        }

        let verified = self
            .metadata
            .verify_user(username.as_str(), token, OffsetDateTime::now_utc())
            .await?;
        if !verified {
            return Err(ApiError::BadRequest(
                "invalid verification token".to_string(),
            ));
        }

        tracing::info!(username = %username, "user verified");
        Ok(())
    }

    /// Check a username and password. Unknown, unverified and mismatching
    /// accounts are all `Unauthorized`.
    pub async fn check_password(&self, username: &str, password: &str) -> ApiResult<UserRow> {
        let Ok(username) = Username::parse(username) else {
            return Err(ApiError::Unauthorized("invalid credentials".to_string()));
        };
        let Some(user) = self.metadata.get_user(username.as_str()).await? else {
            return Err(ApiError::Unauthorized("invalid credentials".to_string()));
        };

        let hash = user.password_hash.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("password check failed: {e}")))?;

        if !matches {
            return Err(ApiError::Unauthorized("invalid credentials".to_string()));
        }
        if !user.verified {
            return Err(ApiError::Unauthorized("account not verified".to_string()));
        }
        Ok(user)
    }

    /// Check a password and issue a signed session token.
    pub async fn issue_token(&self, username: &str, password: &str) -> ApiResult<(String, UserRow)> {
        let user = self.check_password(username, password).await?;
        let token = self.sign(&user.username, OffsetDateTime::now_utc())?;
        tracing::info!(username = %user.username, "session token issued");
        Ok((token, user))
    }

    /// Validate a session token and resolve it to a live, verified account.
    ///
    /// Deleting or unverifying an account invalidates every token issued
    /// to it, expired or not.
    pub async fn validate_token(&self, token: &str) -> ApiResult<UserRow> {
        let claims = self.decode(token)?;
        let Some(user) = self.metadata.get_user(&claims.sub).await? else {
            return Err(ApiError::Unauthorized("unknown account".to_string()));
        };
        if !user.verified {
            return Err(ApiError::Unauthorized("account not verified".to_string()));
        }
        Ok(user)
    }

    /// Sign claims for `username` issued at `now`.
    pub fn sign(&self, username: &str, now: OffsetDateTime) -> ApiResult<String> {
        let claims = Claims::new(username, now, self.token_ttl);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    fn decode(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;
        Ok(data.claims)
    }

    async fn hash_password(&self, password: &str) -> ApiResult<String> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(format!("password hash task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
    }
}
