//! Application state shared across handlers.

use std::sync::Arc;

use crate::ai::{RetryingGenerator, TextGenerator};
use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::auth::TokenIssuer;
use crate::services::{OAuthClient, OAuthStateStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, token issuer, and AI client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    ai: RetryingGenerator,
    oauth: OAuthClient,
    oauth_states: OAuthStateStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `store` - Persistence backend (JSON file or `SQLite`)
    /// * `generator` - Text generator, wrapped with the configured retry policy
    #[must_use]
    pub fn new(config: ApiConfig, store: Arc<dyn Store>, generator: Arc<dyn TextGenerator>) -> Self {
        let tokens = TokenIssuer::new(&config.jwt);
        let ai = RetryingGenerator::from_config(generator, &config.ai);
        let oauth = OAuthClient::new(
            reqwest::Client::new(),
            config.oauth.clone(),
            &config.base_url,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
                ai,
                oauth,
                oauth_states: OAuthStateStore::default(),
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the persistence backend.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the JWT issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    /// Get a reference to the retrying AI generator.
    #[must_use]
    pub fn ai(&self) -> &RetryingGenerator {
        &self.inner.ai
    }

    /// Get a reference to the OAuth client.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Get a reference to the outstanding OAuth states.
    #[must_use]
    pub fn oauth_states(&self) -> &OAuthStateStore {
        &self.inner.oauth_states
    }
}
