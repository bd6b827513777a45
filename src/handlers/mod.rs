mod files;
mod query;
mod sequences;
mod service_info;

pub use files::list_files;
pub use query::get_query;
pub use sequences::get_sequences;
pub use service_info::service_info;

use crate::registry::Registry;
use crate::storage::Storage;
use crate::tabix::TabixFile;
use crate::{Error, Result};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
///
/// Files opened on behalf of requests stay in the registry until
/// [`Registry::close_all`] at shutdown, so every request after the first
/// reuses the parsed index and descriptor.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            registry: Arc::new(Registry::new()),
        }
    }

    /// The open file named `id`. Blocks on first use while the index loads.
    pub(crate) fn file(&self, id: &str) -> Result<Arc<TabixFile>> {
        let path = self.storage.resolve(id)?;
        match self.registry.get(&path) {
            Some(file) => Ok(file),
            None => self.registry.acquire(&path),
        }
    }

    /// Runs `f` against the file named `id` on the blocking pool.
    pub(crate) async fn with_file<T, F>(&self, id: String, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&TabixFile) -> Result<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&*state.file(&id)?))
            .await
            .map_err(|e| Error::Internal(format!("query task failed: {e}")))?
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/query/{id}", get(get_query))
        .route("/sequences/{id}", get(get_sequences))
        .route("/files", get(list_files))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
