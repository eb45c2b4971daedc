//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use taskmate_agent::{Classifier, FallbackClassifier, OracleClassifier, TaskAgent};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::oracle::HttpOracle;

/// State shared across all HTTP handlers.
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// SQLite-backed tasks, conversations and sessions.
    pub store: Arc<SqliteStore>,
    /// The chat interpreter, wired to `store`.
    pub agent: Arc<TaskAgent>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the interpreter to `store`, consulting `oracle` for utterances the
    /// rules do not recognise.
    pub fn new(config: Config, store: SqliteStore, oracle: Option<HttpOracle>) -> Self {
        let store = Arc::new(store);
        let fallback = oracle.map(|o| {
            Arc::new(OracleClassifier::new(Arc::new(o))) as Arc<dyn Classifier>
        });
        let agent = TaskAgent::new(
            store.clone(),
            store.clone(),
            Arc::new(FallbackClassifier::new(fallback)),
        )
        .with_history_window(config.history_window);
        Self {
            config: Arc::new(config),
            store,
            agent: Arc::new(agent),
        }
    }
}
