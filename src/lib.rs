pub mod ai;
pub mod config;
pub mod enrich;
pub mod record;
pub mod search;
pub mod store;

use crate::ai::{AiBackend, OpenAiClient};
use crate::config::Settings;
use crate::search::{assist, Assist, SearchEngine, SearchResponse, SearchStrategy};
use crate::store::RecordStore;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loaded record store plus the settings every search runs under.
#[derive(Clone)]
pub struct OrgMapEngine {
    store: Arc<RecordStore>,
    settings: Settings,
    client: Option<OpenAiClient>,
}

impl OrgMapEngine {
    /// Loads the data file. A missing API key is not an error: the engine
    /// then runs local keyword search only.
    pub fn open(data_path: &Path, settings: Settings) -> Result<Self> {
        let store = RecordStore::load(data_path)?;
        Ok(Self::with_store(store, settings))
    }

    pub fn with_store(store: RecordStore, settings: Settings) -> Self {
        let client = match OpenAiClient::from_settings(&settings) {
            Ok(client) => Some(client),
            Err(e) => {
                info!(reason = %e, "AI-assisted search disabled");
                None
            }
        };
        Self {
            store: Arc::new(store),
            settings,
            client,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ai_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Keyword search with no external calls.
    pub fn search(&self, query: &str, limit: Option<usize>) -> SearchResponse {
        SearchEngine::new(&self.store, &self.settings).search(
            query,
            SearchStrategy::Keyword,
            limit,
            &Assist::local(),
        )
    }

    /// Asks the configured AI backend for help first, then ranks. Any AI
    /// failure degrades to local ranking.
    pub async fn smart_search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        limit: Option<usize>,
    ) -> SearchResponse {
        self.smart_search_with(self.client.as_ref(), query, strategy, limit)
            .await
    }

    pub async fn smart_search_with<B: AiBackend>(
        &self,
        backend: Option<&B>,
        query: &str,
        strategy: SearchStrategy,
        limit: Option<usize>,
    ) -> SearchResponse {
        let assist = assist::gather(backend, query, strategy, &self.settings).await;
        SearchEngine::new(&self.store, &self.settings).search(query, strategy, limit, &assist)
    }
}
