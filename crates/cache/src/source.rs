//! The definitions store the cache loads from.
//!
//! Implementations page through persisted conditions and baselines for one
//! agent. Pages are zero-based; each carries the total row count so the
//! loader knows when to stop.

use async_trait::async_trait;
use watchtower_core::definitions::{
    BaselineRecord, ConditionCategory, ConditionComposite, Page, PageRequest,
};
use watchtower_core::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The store could not be reached.
    #[error("Definitions source unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but the query failed.
    #[error("Definitions query failed: {0}")]
    Query(String),
}

#[async_trait]
pub trait DefinitionsSource: Send + Sync {
    /// Composites of every enabled condition of `category` on resources
    /// monitored by `agent_id`.
    async fn condition_composites(
        &self,
        agent_id: DbId,
        category: ConditionCategory,
        page: PageRequest,
    ) -> Result<Page<ConditionComposite>, SourceError>;

    /// Dynamic baselines of schedules on resources monitored by `agent_id`.
    async fn dynamic_baselines(
        &self,
        agent_id: DbId,
        page: PageRequest,
    ) -> Result<Page<BaselineRecord>, SourceError>;
}
