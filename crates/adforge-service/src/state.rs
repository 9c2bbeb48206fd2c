//! Application state.

use std::sync::Arc;

use adforge_store::RocksStore;

use crate::config::ServiceConfig;
use crate::worker::{GenerationWorker, HttpWorker, NullWorker};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// The external generation worker collaborator.
    pub worker: Arc<dyn GenerationWorker>,
}

impl AppState {
    /// Create application state, building the worker from configuration.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let worker: Arc<dyn GenerationWorker> = match &config.worker_url {
            Some(url) => {
                tracing::info!(worker_url = %url, "Generation worker configured");
                Arc::new(HttpWorker::new(url, config.worker_api_key.clone()))
            }
            None => {
                tracing::warn!("No worker configured - generations will time out");
                Arc::new(NullWorker)
            }
        };

        Self::with_worker(store, config, worker)
    }

    /// Create application state with an explicit worker (used by tests
    /// to inject failing or recording workers).
    #[must_use]
    pub fn with_worker(
        store: Arc<RocksStore>,
        config: ServiceConfig,
        worker: Arc<dyn GenerationWorker>,
    ) -> Self {
        Self {
            store,
            config,
            worker,
        }
    }
}
