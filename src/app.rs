//! Application wiring.
//!
//! [`AppContext`] owns the config manager and builds the vector store,
//! embedder, and [`FolderMonitor`] on first use. Each is constructed at most
//! once; callers get shared handles instead of reaching for globals.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ConfigManager;
use crate::embedding::{create_embedder, Embedder};
use crate::monitor::FolderMonitor;
use crate::pipeline::PipelineAdapter;
use crate::store::sqlite::SqliteVectorStore;
use crate::store::VectorStore;

pub struct AppContext {
    config: Arc<ConfigManager>,
    store: OnceCell<Arc<dyn VectorStore>>,
    embedder: OnceCell<Arc<dyn Embedder>>,
    monitor: OnceCell<FolderMonitor>,
}

impl AppContext {
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self {
            config,
            store: OnceCell::new(),
            embedder: OnceCell::new(),
            monitor: OnceCell::new(),
        }
    }

    /// Use `store` instead of opening the configured SQLite database.
    pub fn with_store(config: Arc<ConfigManager>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            store: OnceCell::new_with(Some(store)),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    pub async fn store(&self) -> Result<Arc<dyn VectorStore>> {
        self.store
            .get_or_try_init(|| async {
                let path = self.config.get_config().db.path;
                debug!(path = %path.display(), "opening vector store");
                let store = SqliteVectorStore::connect(&path).await?;
                Ok::<Arc<dyn VectorStore>, anyhow::Error>(Arc::new(store))
            })
            .await
            .cloned()
    }

    pub async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        self.embedder
            .get_or_try_init(|| async {
                let embedder = create_embedder(&self.config.get_config().embedding)?;
                Ok::<Arc<dyn Embedder>, anyhow::Error>(Arc::from(embedder))
            })
            .await
            .cloned()
    }

    /// The monitor, built once with a [`PipelineAdapter`] over the store and
    /// embedder.
    pub async fn monitor(&self) -> Result<&FolderMonitor> {
        self.monitor
            .get_or_try_init(|| async {
                let adapter = PipelineAdapter::new(
                    self.store().await?,
                    self.embedder().await?,
                    self.config.get_config().chunking.max_tokens,
                );
                Ok::<FolderMonitor, anyhow::Error>(FolderMonitor::new(
                    self.config.clone(),
                    Arc::new(adapter),
                ))
            })
            .await
    }
}
