//! Post-match handling: turning element results into notifications.
//!
//! A match activates the element and sends an activate notification, or an
//! out-of-bounds notification carrying `provided - reference`. A miss on an
//! active stateful element deactivates it. A failing sink or a value the
//! element cannot process is counted in `stats.errors` and the batch goes on.

use watchtower_core::facts::FactValue;
use watchtower_core::types::Timestamp;
use watchtower_core::{CacheStats, ConditionElement};
use watchtower_events::sink::{ConditionSink, SinkError};

enum Outcome {
    Matched(Result<(), SinkError>),
    Deactivated(Result<(), SinkError>),
    Idle,
}

async fn handle(
    element: &ConditionElement,
    value: &FactValue,
    timestamp: Timestamp,
    sink: &dyn ConditionSink,
) -> Result<Outcome, watchtower_core::CoreError> {
    if element.process(value)? {
        let sent = match (element.out_of_bounds_reference(), value) {
            (Some(reference), FactValue::Numeric(provided)) => {
                sink.send_out_of_bounds(element.id(), provided - reference, timestamp)
                    .await
            }
            _ => {
                element.activate();
                sink.send_activate(element.id(), timestamp, value).await
            }
        };
        return Ok(Outcome::Matched(sent));
    }

    if element.operator().is_stateful() && element.deactivate() {
        let sent = sink.send_deactivate(element.id(), timestamp).await;
        return Ok(Outcome::Deactivated(sent));
    }

    Ok(Outcome::Idle)
}

/// Match one fact value against a list of candidate elements.
pub(crate) async fn process_elements(
    elements: &[&ConditionElement],
    value: &FactValue,
    timestamp: Timestamp,
    sink: &dyn ConditionSink,
    stats: &mut CacheStats,
) {
    for element in elements {
        match handle(element, value, timestamp, sink).await {
            Ok(Outcome::Matched(Ok(()))) => stats.matched += 1,
            Ok(Outcome::Deactivated(Ok(()))) | Ok(Outcome::Idle) => {}
            Ok(Outcome::Matched(Err(e))) | Ok(Outcome::Deactivated(Err(e))) => {
                tracing::error!(%element, error = %e, "Failed to send condition notification");
                stats.errors += 1;
            }
            Err(e) => {
                tracing::warn!(%element, error = %e, "Fact could not be matched against element");
                stats.errors += 1;
            }
        }
    }
}

/// Log one summary line when a batch had failures.
pub(crate) fn report_errors(what: &'static str, stats: &CacheStats) {
    if stats.errors > 0 {
        tracing::error!(
            facts = what,
            errors = stats.errors,
            matched = stats.matched,
            "Errors while checking facts against the condition cache"
        );
    }
}
