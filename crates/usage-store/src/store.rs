use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use common::{Category, ModuleIdentity, RawEvent};
use futures_core::Stream;

use crate::{ModuleUsage, Result, UsageQuery};

/// A stream of raw events, in arrival order.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<RawEvent>> + Send>>;

/// Core trait for usage store implementations.
///
/// All mutations are serialized by the implementation itself; callers may
/// share one store across any number of tasks without extra locking.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Records one notification.
    ///
    /// Appends `event` to the raw log and, when `module` is present, merges
    /// its timestamp into that category's module and user aggregates. The
    /// raw row and the aggregate updates become visible together or not at all.
    async fn record(&self, event: RawEvent, module: Option<ModuleIdentity>) -> Result<()>;

    /// Streams every raw event in arrival order.
    ///
    /// Each call starts a fresh scan.
    async fn read_raw_events(&self) -> Result<RawEventStream>;

    /// Reads usage aggregates matching a query, ordered by module then user.
    async fn usage(&self, query: UsageQuery) -> Result<Vec<ModuleUsage>>;

    /// Returns the number of raw events recorded.
    async fn event_count(&self) -> Result<u64>;

    /// Writes a consistent point-in-time copy of the whole store to `destination`.
    ///
    /// Fails with [`UsageStoreError::SnapshotExists`](crate::UsageStoreError::SnapshotExists)
    /// rather than overwrite an existing file.
    async fn snapshot(&self, destination: &Path) -> Result<()>;
}

/// Extension trait providing convenience lookups for usage stores.
#[async_trait]
pub trait UsageStoreExt: UsageStore {
    /// Gets the module-tier aggregate for one module.
    async fn module_usage(&self, category: Category, module: &str) -> Result<Option<ModuleUsage>> {
        let rows = self
            .usage(UsageQuery::modules(category).module(module))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Gets the user-tier aggregate for one (module, user) pair.
    async fn user_usage(
        &self,
        category: Category,
        module: &str,
        user: &str,
    ) -> Result<Option<ModuleUsage>> {
        let rows = self
            .usage(UsageQuery::users(category).module(module).user(user))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Collects the whole raw event log.
    async fn all_raw_events(&self) -> Result<Vec<RawEvent>> {
        use futures_util::TryStreamExt;

        self.read_raw_events().await?.try_collect().await
    }
}

// Blanket implementation for all UsageStore implementations
impl<T: UsageStore + ?Sized> UsageStoreExt for T {}
