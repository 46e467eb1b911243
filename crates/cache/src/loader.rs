//! Bulk loading of one agent's conditions and baselines.
//!
//! Condition composites are compiled into elements with the legacy
//! comparator mapping. Composites that cannot be compiled are logged and
//! skipped; the rest of the load carries on.

use watchtower_core::baseline::{BaselineStat, OutOfBoundsRange};
use watchtower_core::definitions::{
    BaselineRecord, CompositeTarget, ConditionCategory, ConditionComposite, PageRequest,
};
use watchtower_core::operator::resolve_operator;
use watchtower_core::types::DbId;
use watchtower_core::{CacheStats, ConditionElement, CoreError};

use crate::config::CacheConfig;
use crate::index::IndexKey;
use crate::source::{DefinitionsSource, SourceError};
use crate::store::CacheStore;

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Tracks progress through a paged result set.
///
/// Stops after an empty page, a short page, or once the rows seen reach the
/// total the source reported.
#[derive(Debug)]
pub(crate) struct Pager {
    request: PageRequest,
    processed: usize,
    done: bool,
}

impl Pager {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            request: PageRequest::first(page_size.max(1)),
            processed: 0,
            done: false,
        }
    }

    pub(crate) fn next_request(&self) -> Option<PageRequest> {
        (!self.done).then_some(self.request)
    }

    pub(crate) fn record(&mut self, received: usize, total: usize) {
        self.processed += received;
        if received == 0 || received < self.request.size || self.processed >= total {
            self.done = true;
        } else {
            self.request = self.request.next();
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidElement(msg.into())
}

/// Compile a composite into an element and the index keys it lives under.
pub(crate) fn compile(composite: &ConditionComposite) -> Result<(Vec<IndexKey>, ConditionElement), CoreError> {
    let condition = &composite.condition;
    let id = condition.id;
    let operator = resolve_operator(
        condition.category,
        condition.comparator.as_deref(),
        condition.option.as_deref(),
    )?;

    match (condition.category, &composite.target) {
        (ConditionCategory::Threshold, CompositeTarget::Threshold { schedule_id }) => {
            let element = ConditionElement::measurement(id, operator, condition.threshold)?;
            Ok((vec![IndexKey::Measurement(*schedule_id)], element))
        }
        (
            ConditionCategory::Baseline,
            CompositeTarget::Baseline {
                schedule_id,
                baseline_id,
                min,
                mean,
                max,
            },
        ) => {
            let stat: BaselineStat = condition
                .option
                .as_deref()
                .ok_or_else(|| invalid("baseline condition has no statistic option"))?
                .parse()?;
            let percent = condition
                .threshold
                .ok_or_else(|| invalid("baseline condition has no percentage"))?;
            let reference = stat.calculated_value(percent, *min, *mean, *max);
            let element = ConditionElement::baseline(id, operator, *baseline_id, stat, percent, reference)?;
            Ok((
                vec![IndexKey::Measurement(*schedule_id), IndexKey::Baseline(*baseline_id)],
                element,
            ))
        }
        (
            ConditionCategory::Change,
            CompositeTarget::Change {
                schedule_id,
                current_value,
            },
        ) => {
            let element = ConditionElement::measurement(id, operator, *current_value)?;
            Ok((vec![IndexKey::Measurement(*schedule_id)], element))
        }
        (
            ConditionCategory::Trait,
            CompositeTarget::Trait {
                schedule_id,
                current_value,
            },
        ) => {
            let element = ConditionElement::trait_value(id, operator, current_value.clone())?;
            Ok((vec![IndexKey::Trait(*schedule_id)], element))
        }
        (ConditionCategory::Availability, CompositeTarget::Availability { resource_id, current }) => {
            let element = ConditionElement::availability(id, operator, *current)?;
            Ok((vec![IndexKey::Availability(*resource_id)], element))
        }
        (
            ConditionCategory::Control,
            CompositeTarget::Control {
                resource_id,
                operation_definition_id,
            },
        ) => {
            let status = condition
                .option
                .as_deref()
                .ok_or_else(|| invalid("control condition has no status option"))?
                .parse()?;
            let element = ConditionElement::operation(id, operator, status)?;
            Ok((
                vec![IndexKey::Operation {
                    resource_id: *resource_id,
                    operation_definition_id: *operation_definition_id,
                }],
                element,
            ))
        }
        (ConditionCategory::Event, CompositeTarget::Event { resource_id }) => {
            let severity = condition
                .name
                .as_deref()
                .ok_or_else(|| invalid("event condition has no severity"))?
                .parse()?;
            let element = ConditionElement::event(id, operator, severity, condition.option.as_deref())?;
            Ok((vec![IndexKey::Event(*resource_id)], element))
        }
        (category, _) => Err(invalid(format!(
            "condition {id} of category {category} has a mismatched target"
        ))),
    }
}

/// Compile and store one composite, counting it as skipped on failure.
pub(crate) fn insert_composite(
    store: &mut CacheStore,
    agent_id: DbId,
    composite: &ConditionComposite,
    stats: &mut CacheStats,
) {
    match compile(composite) {
        Ok((keys, element)) => {
            store.insert(agent_id, &keys, element, stats);
        }
        Err(e) => {
            tracing::info!(
                agent_id,
                condition_id = composite.condition.id,
                category = %composite.condition.category,
                error = %e,
                "Failed to create condition element, skipping"
            );
            stats.skipped += 1;
        }
    }
}

/// Store the out-of-bounds pair derived from one baseline.
pub(crate) fn insert_baseline(
    store: &mut CacheStore,
    agent_id: DbId,
    baseline: &BaselineRecord,
    config: &CacheConfig,
    stats: &mut CacheStats,
) {
    match OutOfBoundsRange::from_baseline(
        baseline.min,
        baseline.max,
        config.low_oob_factor,
        config.high_oob_factor,
    ) {
        Some(range) => {
            store.insert_out_of_bounds(agent_id, baseline.schedule_id, range, stats);
        }
        None => {
            tracing::debug!(
                agent_id,
                baseline_id = baseline.baseline_id,
                "Baseline min/max invalid, no out-of-bounds elements"
            );
            stats.skipped += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Page every supported category, then every dynamic baseline, into `store`.
///
/// A source failure aborts the load; whatever was inserted before it stays
/// cached and is accounted for in `stats`.
pub(crate) async fn load_agent(
    store: &mut CacheStore,
    source: &dyn DefinitionsSource,
    config: &CacheConfig,
    agent_id: DbId,
    stats: &mut CacheStats,
) -> Result<(), SourceError> {
    for category in ConditionCategory::SUPPORTED {
        let mut pager = Pager::new(config.page_size);
        while let Some(request) = pager.next_request() {
            let page = source.condition_composites(agent_id, category, request).await?;
            pager.record(page.items.len(), page.total);
            for composite in &page.items {
                insert_composite(store, agent_id, composite, stats);
            }
        }
    }

    let mut pager = Pager::new(config.page_size);
    while let Some(request) = pager.next_request() {
        let page = source.dynamic_baselines(agent_id, request).await?;
        pager.record(page.items.len(), page.total);
        for baseline in &page.items {
            insert_baseline(store, agent_id, baseline, config, stats);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
