//! Shared wiring for the CLI and the app server.

pub mod queue;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::cache::{CachePolicy, LocalCache, LocalFsCacheStore};
use crate::catalog::CatalogLoader;
use crate::config::AppConfig;
use crate::reader::Reader;
use crate::sheets::{FormSink, SheetClient, SheetSource};
use crate::stager::Stager;
use queue::InProcessQueue;

pub struct Services {
    pub config: AppConfig,
    pub source: Arc<dyn SheetSource>,
    pub sink: Arc<dyn FormSink>,
    pub cache: Arc<LocalCache>,
    pub stager: Arc<Stager>,
    pub reader: Reader,
    pub catalog: CatalogLoader,
}

impl Services {
    /// Services backed by the configured sheet endpoints and a cache
    /// directory on disk.
    pub fn new(config: AppConfig, cache_dir: &Path) -> anyhow::Result<Self> {
        let client = Arc::new(SheetClient::new(&config).context("create sheet client")?);
        let store = Arc::new(LocalFsCacheStore::new(cache_dir));
        let cache = Arc::new(LocalCache::new(store, CachePolicy::from_config(&config.cache)));
        tracing::debug!(cache_dir = %cache_dir.display(), "opened local cache");
        Ok(Self::with_parts(config, client.clone(), client, cache))
    }

    pub fn with_parts(
        config: AppConfig,
        source: Arc<dyn SheetSource>,
        sink: Arc<dyn FormSink>,
        cache: Arc<LocalCache>,
    ) -> Self {
        let queue = InProcessQueue::new(config.reader.stage_concurrency);
        let stager = Arc::new(Stager::new(Arc::clone(&source), Arc::clone(&cache), queue));
        let reader = Reader::new(
            Arc::clone(&stager),
            Arc::clone(&cache),
            config.reader.stage_wait(),
        );
        let catalog = CatalogLoader::new(Arc::clone(&source), Arc::clone(&cache));
        Self {
            config,
            source,
            sink,
            cache,
            stager,
            reader,
            catalog,
        }
    }
}
