//! In-process alert condition-matching cache.
//!
//! Sits between incoming monitoring facts and the alert engine. For every
//! fact it finds the condition elements registered under the fact's natural
//! key, runs their matching state machine and reports matches through a
//! [`ConditionSink`](watchtower_events::ConditionSink).
//!
//! - [`ConditionCache`] — the shared cache and its public operations.
//! - [`CacheStore`] — arena, shaped index and inverse maps behind the lock.
//! - [`DefinitionsSource`] — where agent conditions and baselines load from.
//! - [`CacheConfig`] — page size and out-of-bounds factors from the environment.
//! - [`CacheMonitor`] — cumulative match and timing counters.

pub mod arena;
pub mod cache;
pub mod config;
mod dispatch;
pub mod error;
pub mod index;
pub mod inverse;
mod loader;
pub mod monitor;
pub mod source;
pub mod store;

pub use cache::{ConditionCache, ReloadStats};
pub use config::CacheConfig;
pub use error::CacheError;
pub use index::{CacheName, IndexKey};
pub use monitor::{CacheMonitor, MonitorSnapshot};
pub use source::{DefinitionsSource, SourceError};
pub use store::CacheStore;
