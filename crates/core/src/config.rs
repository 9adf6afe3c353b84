//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum accepted length of the token signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted artifact (and publish request body) in bytes.
    #[serde(default = "default_max_artifact_size")]
    pub max_artifact_size: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// Restrict access to it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Externally visible base URL used to build `dist.url` links
    /// (e.g., "https://registry.example.com"). Relative links when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_artifact_size() -> u64 {
    crate::DEFAULT_MAX_ARTIFACT_SIZE
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_artifact_size: default_max_artifact_size(),
            metrics_enabled: default_metrics_enabled(),
            public_base_url: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_artifact_size == 0 {
            return Err("server.max_artifact_size must be greater than zero".to_string());
        }
        if let Some(url) = &self.public_base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(format!(
                "server.public_base_url must start with http:// or https://, got '{url}'"
            ));
        }
        Ok(())
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot force-cancel
        /// queries). Slow queries are logged.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/lode.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("metadata.path cannot be empty".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Account and session token configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens (required, at least 32 bytes).
    /// Prefer LODE_AUTH__JWT_SECRET over storing it in the config file.
    pub jwt_secret: String,
    /// Session token lifetime in days.
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u32,
    /// bcrypt work factor for password hashes.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Return the verification token in the register response instead of
    /// relying on out-of-band delivery. Development and tests only.
    #[serde(default)]
    pub expose_verification_token: bool,
}

fn default_token_ttl_days() -> u32 {
    crate::token::DEFAULT_TOKEN_TTL_DAYS
}

fn default_bcrypt_cost() -> u32 {
    10
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_days", &self.token_ttl_days)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("expose_verification_token", &self.expose_verification_token)
            .finish()
    }
}

impl AuthConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses a fixed secret and the cheapest bcrypt cost.
    pub fn for_testing() -> Self {
        Self {
            jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
            token_ttl_days: default_token_ttl_days(),
            bcrypt_cost: 4,
            expose_verification_token: true,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            ));
        }
        if self.token_ttl_days == 0 {
            return Err("auth.token_ttl_days must be greater than zero".to_string());
        }
        // bcrypt accepts costs 4 through 31.
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(format!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            ));
        }
        Ok(())
    }
}

/// Post-publish hook configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HookConfig {
    /// Run post-publish hooks at all.
    #[serde(default = "default_hooks_enabled")]
    pub enabled: bool,
    /// Pending publish events held before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Scratch directory for unpacked artifacts.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Where generated documentation is published, one directory per package.
    /// Output is staged in hidden `.staging-*` directories here first.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    /// Documentation generator argv. `{src}` and `{dest}` are replaced with
    /// the unpacked package and output directories. Docs are skipped when unset.
    #[serde(default)]
    pub docs_command: Option<Vec<String>>,
}

fn default_hooks_enabled() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    256
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./data/work")
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("./data/docs")
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: default_hooks_enabled(),
            queue_capacity: default_queue_capacity(),
            work_dir: default_work_dir(),
            docs_dir: default_docs_dir(),
            docs_command: None,
        }
    }
}

impl HookConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("hooks.queue_capacity must be greater than zero".to_string());
        }
        if let Some(command) = &self.docs_command
            && command.first().is_none_or(|program| program.trim().is_empty())
        {
            return Err("hooks.docs_command must name a program".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Account and token configuration (required).
    pub auth: AuthConfig,
    /// Post-publish hook configuration.
    #[serde(default)]
    pub hooks: HookConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite metadata, a fixed signing secret
    /// and hooks disabled.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::default(),
            auth: AuthConfig::for_testing(),
            hooks: HookConfig {
                enabled: false,
                ..HookConfig::default()
            },
        }
    }

    /// Validate every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.metadata.validate()?;
        self.auth.validate()?;
        self.hooks.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert_eq!(config.max_artifact_size, 64 * 1024 * 1024);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_for_testing_is_valid() {
        AppConfig::for_testing().validate().unwrap();
    }

    #[test]
    fn test_auth_config_rejects_short_secret() {
        let config = AuthConfig {
            jwt_secret: "short".to_string(),
            ..AuthConfig::for_testing()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("jwt_secret"));
    }

    #[test]
    fn test_auth_config_rejects_bcrypt_cost_out_of_range() {
        let config = AuthConfig {
            bcrypt_cost: 3,
            ..AuthConfig::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let config = AuthConfig::for_testing();
        let debug = format!("{config:?}");
        assert!(!debug.contains(&config.jwt_secret));
    }

    #[test]
    fn test_hook_config_rejects_empty_command() {
        let config = HookConfig {
            docs_command: Some(vec![]),
            ..HookConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_deserialize_minimal() {
        let json = r#"{"auth": {"jwt_secret": "0123456789abcdef0123456789abcdef"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.auth.token_ttl_days, 30);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert!(!config.auth.expose_verification_token);
        assert!(config.hooks.enabled);
        assert!(config.hooks.docs_command.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_metadata_config_tagged() {
        let json = r#"{"type": "sqlite", "path": "/tmp/lode.db"}"#;
        let config: MetadataConfig = serde_json::from_str(json).unwrap();
        let MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } = config;
        assert_eq!(path, PathBuf::from("/tmp/lode.db"));
        assert_eq!(query_timeout_secs, Some(30));
    }
}
