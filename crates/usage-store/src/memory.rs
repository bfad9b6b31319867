use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Category, ModuleIdentity, RawEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    ModuleUsage, Result, Tier, UsageQuery, UsageStoreError,
    store::{RawEventStream, UsageStore},
};

#[derive(Default)]
struct State {
    events: Vec<RawEvent>,
    modules: HashMap<(Category, String), ModuleUsage>,
    user_modules: HashMap<(Category, String, String), ModuleUsage>,
}

/// On-disk form of an in-memory store.
#[derive(Serialize, Deserialize)]
struct SnapshotDocument {
    events: Vec<RawEvent>,
    modules: Vec<(Category, ModuleUsage)>,
    user_modules: Vec<(Category, ModuleUsage)>,
}

/// In-memory usage store implementation for testing.
///
/// Every table lives behind one lock, so a `record` call is a single
/// critical section and readers never see half of one. Snapshots are JSON
/// documents that [`InMemoryUsageStore::open_snapshot`] reads back.
#[derive(Clone, Default)]
pub struct InMemoryUsageStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryUsageStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a snapshot written by [`UsageStore::snapshot`].
    pub async fn open_snapshot(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let document: SnapshotDocument = serde_json::from_slice(&bytes)?;

        let mut state = State {
            events: document.events,
            ..State::default()
        };
        for (category, usage) in document.modules {
            state
                .modules
                .insert((category, usage.module.clone()), usage);
        }
        for (category, usage) in document.user_modules {
            state.user_modules.insert(
                (category, usage.module.clone(), usage.user.clone()),
                usage,
            );
        }

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn record(&self, event: RawEvent, module: Option<ModuleIdentity>) -> Result<()> {
        let mut state = self.state.write().await;

        if let Some(module) = module {
            let category = module.category();
            let name = module.name();
            let timestamp = event.timestamp;

            state
                .modules
                .entry((category, name.to_string()))
                .and_modify(|usage| usage.record(timestamp))
                .or_insert_with(|| ModuleUsage::first(name, "", timestamp));

            state
                .user_modules
                .entry((category, name.to_string(), event.user.clone()))
                .and_modify(|usage| usage.record(timestamp))
                .or_insert_with(|| ModuleUsage::first(name, event.user.as_str(), timestamp));
        }

        state.events.push(event);
        Ok(())
    }

    async fn read_raw_events(&self) -> Result<RawEventStream> {
        use futures_util::stream;

        let events = self.state.read().await.events.clone();
        let stream = stream::iter(events.into_iter().map(Ok::<_, UsageStoreError>));
        Ok(Box::pin(stream))
    }

    async fn usage(&self, query: UsageQuery) -> Result<Vec<ModuleUsage>> {
        let state = self.state.read().await;

        let module_matches = |usage: &ModuleUsage| {
            query
                .module
                .as_ref()
                .is_none_or(|module| &usage.module == module)
        };

        let mut rows = Vec::new();
        match query.tier {
            Tier::Module => {
                for ((category, _), usage) in &state.modules {
                    if *category == query.category && module_matches(usage) {
                        rows.push(usage.clone());
                    }
                }
            }
            Tier::User => {
                for ((category, _, user), usage) in &state.user_modules {
                    if *category == query.category
                        && module_matches(usage)
                        && query.user.as_ref().is_none_or(|wanted| user == wanted)
                    {
                        rows.push(usage.clone());
                    }
                }
            }
        }

        rows.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.user.cmp(&b.user)));
        Ok(rows)
    }

    async fn event_count(&self) -> Result<u64> {
        Ok(self.state.read().await.events.len() as u64)
    }

    async fn snapshot(&self, destination: &Path) -> Result<()> {
        if tokio::fs::try_exists(destination).await? {
            return Err(UsageStoreError::SnapshotExists(destination.to_path_buf()));
        }

        let bytes = {
            let state = self.state.read().await;
            let document = SnapshotDocument {
                events: state.events.clone(),
                modules: state
                    .modules
                    .iter()
                    .map(|((category, _), usage)| (*category, usage.clone()))
                    .collect(),
                user_modules: state
                    .user_modules
                    .iter()
                    .map(|((category, _, _), usage)| (*category, usage.clone()))
                    .collect(),
            };
            serde_json::to_vec(&document)?
        };

        tokio::fs::write(destination, bytes).await?;
        tracing::debug!(path = %destination.display(), "wrote in-memory snapshot");
        Ok(())
    }
}
