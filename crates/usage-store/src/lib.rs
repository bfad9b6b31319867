//! Storage for module usage telemetry.
//!
//! A store keeps two things in step:
//! - the raw event log, one immutable [`RawEvent`] per notification
//! - [`ModuleUsage`] aggregates per module and per (module, user), per [`Category`]
//!
//! [`UsageStore::record`] writes both atomically. Two backends are provided:
//! [`SqliteUsageStore`] for production and [`InMemoryUsageStore`] for tests.

pub mod error;
pub mod memory;
pub mod query;
pub mod sqlite;
pub mod store;
pub mod usage;

pub use common::{Category, ModuleIdentity, RawEvent};
pub use error::{Result, UsageStoreError};
pub use memory::InMemoryUsageStore;
pub use query::{Tier, UsageQuery};
pub use sqlite::SqliteUsageStore;
pub use store::{RawEventStream, UsageStore, UsageStoreExt};
pub use usage::ModuleUsage;
