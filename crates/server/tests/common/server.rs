//! Server test utilities.

use lode_core::config::{AppConfig, MetadataConfig};
use lode_metadata::{MetadataStore, SqliteStore};
use lode_server::hooks::HookQueue;
use lode_server::{AppState, create_router};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub sqlite: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with a temporary database and hooks disabled.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let db_path = temp_dir.path().join("lode.db");
        let sqlite = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );
        let metadata: Arc<dyn MetadataStore> = sqlite.clone();

        let mut config = AppConfig::for_testing();
        config.metadata = MetadataConfig::Sqlite {
            path: db_path,
            query_timeout_secs: None,
        };
        config.hooks.work_dir = temp_dir.path().join("work");
        config.hooks.docs_dir = temp_dir.path().join("docs");

        // Apply user modifications
        modifier(&mut config);

        let state = AppState::new(config, metadata, HookQueue::disabled());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            sqlite,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Register and verify an account, returning a session token.
    pub async fn create_account(&self, username: &str, password: &str) -> String {
        let registration = self
            .state
            .identity
            .register(username, &format!("{username}@example.com"), password)
            .await
            .expect("Failed to register");
        self.state
            .identity
            .verify(username, registration.verification_token.as_str())
            .await
            .expect("Failed to verify");
        let (token, _) = self
            .state
            .identity
            .issue_token(username, password)
            .await
            .expect("Failed to log in");
        token
    }
}
