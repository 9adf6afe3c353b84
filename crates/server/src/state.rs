//! Application state shared across handlers.

use crate::gate::CredentialGate;
use crate::hooks::HookQueue;
use crate::identity::IdentityStore;
use crate::registry::Registry;
use lode_core::config::AppConfig;
use lode_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store, for read paths.
    pub metadata: Arc<dyn MetadataStore>,
    /// Accounts and session tokens.
    pub identity: Arc<IdentityStore>,
    /// Credential gate run by the auth middleware.
    pub gate: Arc<CredentialGate>,
    /// Mutating workflows.
    pub registry: Registry,
}

impl AppState {
    /// Wire up the state. The token signing secret flows from `config`
    /// into the identity store and from there into the gate.
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>, hooks: HookQueue) -> Self {
        let identity = Arc::new(IdentityStore::new(metadata.clone(), &config.auth));
        let gate = Arc::new(CredentialGate::new(identity.clone()));
        let registry = Registry::new(metadata.clone(), hooks);

        Self {
            config: Arc::new(config),
            metadata,
            identity,
            gate,
            registry,
        }
    }

    /// Link to a version's artifact, absolute when a public base URL is set.
    pub fn dist_url(&self, package: &str, version: &str) -> String {
        let path = format!("/v1/package/{package}/{version}");
        match &self.config.server.public_base_url {
            Some(base) => format!("{}{path}", base.trim_end_matches('/')),
            None => path,
        }
    }
}
