//! Integration tests for loading, unloading and reloading agents.
//!
//! Covers paging, out-of-bounds pair construction, agent isolation and the
//! inverse bookkeeping that makes removal exact.

mod common;

use common::*;
use watchtower_cache::{CacheConfig, IndexKey};
use watchtower_core::definitions::{AlertDefinitionRecord, DefinitionEvent};

// ---------------------------------------------------------------------------
// Test: loading
// ---------------------------------------------------------------------------

/// Every supported category is loaded into the key its facts use.
#[tokio::test]
async fn load_agent_indexes_every_category() {
    let h = Harness::new();
    h.source.add(1, threshold(10, 100, ">", 50.0));
    h.source.add(1, change(11, 100, Some(1.0)));
    h.source.add(1, trait_change(12, 200, Some("v1")));
    h.source.add(1, availability(13, 300, "DOWN"));
    h.source.add(1, control(14, 300, 7, "failure"));
    h.source.add(1, event(15, 300, "WARN", None));
    h.source.add(1, baseline_condition(16, 100, 900, "<", "min", 50.0, (2.0, 4.0, 6.0)));
    h.source.add_baseline(1, baseline(900, 100, 2.0, 6.0));

    let stats = h.cache.load_agent(1).await;

    // seven conditions plus one out-of-bounds pair
    assert_eq!(stats.created, 9);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.errors, 0);
    assert_eq!(h.cache.lookup(IndexKey::Measurement(100)).await.len(), 3);
    assert_eq!(h.cache.lookup(IndexKey::Trait(200)).await.len(), 1);
    assert_eq!(h.cache.lookup(IndexKey::Availability(300)).await.len(), 1);
    assert_eq!(
        h.cache
            .lookup(IndexKey::Operation {
                resource_id: 300,
                operation_definition_id: 7
            })
            .await
            .len(),
        1
    );
    assert_eq!(h.cache.lookup(IndexKey::Event(300)).await.len(), 1);
    assert_eq!(h.cache.lookup(IndexKey::OutOfBounds(100)).await.len(), 2);
    assert_eq!(h.cache.lookup(IndexKey::Baseline(900)).await.len(), 1);
    assert!(h.cache.is_cache_valid().await);
}

/// Pages are requested until a short page arrives.
#[tokio::test]
async fn load_agent_pages_through_large_result_sets() {
    let h = Harness::with_config(CacheConfig {
        page_size: 2,
        ..CacheConfig::default()
    });
    for id in 0..5 {
        h.source.add(1, threshold(id, 100 + id, "<", 1.0));
    }

    let stats = h.cache.load_agent(1).await;

    assert_eq!(stats.created, 5);
    // 3 threshold pages, one empty page for each of the other six
    // categories, one empty baseline page
    assert_eq!(h.source.requests(), 3 + 6 + 1);
    assert_eq!(h.cache.agent_conditions(1).await.len(), 5);
}

/// Invalid composites are skipped without failing the load.
#[tokio::test]
async fn load_agent_skips_invalid_composites() {
    let h = Harness::new();
    h.source.add(1, threshold(1, 100, ">=", 1.0));
    h.source.add(1, availability(2, 300, "SIDEWAYS"));
    h.source.add(1, threshold(3, 100, ">", 1.0));

    let stats = h.cache.load_agent(1).await;

    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.created, 1);
    assert_eq!(h.cache.agent_conditions(1).await, vec![3]);
}

/// A failing source stops the load, is counted and keeps what was loaded.
#[tokio::test]
async fn load_agent_survives_source_failure() {
    let h = Harness::new();
    h.source.add(1, baseline_condition(1, 100, 900, "<", "mean", 80.0, (1.0, 2.0, 3.0)));
    h.source.add(1, threshold(2, 100, ">", 1.0));
    // baseline page served, change page fails
    h.source.fail_after(1);

    let stats = h.cache.load_agent(1).await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(h.cache.agent_conditions(1).await, vec![1]);
}

// ---------------------------------------------------------------------------
// Test: out-of-bounds pairs
// ---------------------------------------------------------------------------

/// A second baseline for the same schedule does not add another pair.
#[tokio::test]
async fn duplicate_baseline_keeps_single_out_of_bounds_pair() {
    let h = Harness::new();
    h.source.add_baseline(1, baseline(1, 100, 5.0, 10.0));
    h.source.add_baseline(1, baseline(2, 100, 50.0, 100.0));

    let stats = h.cache.load_agent(1).await;

    assert_eq!(stats.created, 2);
    let pair = h.cache.lookup(IndexKey::OutOfBounds(100)).await;
    assert_eq!(pair.len(), 2);
    assert_eq!(pair[0].reference.as_deref(), Some("4"));
    assert_eq!(pair[1].reference.as_deref(), Some("12.5"));
    assert!(h.cache.is_cache_valid().await);
}

/// A baseline whose scaled bound overflows stores no half pair, so a later
/// valid baseline for the schedule still gets its pair.
#[tokio::test]
async fn overflowing_baseline_leaves_schedule_free() {
    let h = Harness::new();
    h.source.add_baseline(1, baseline(1, 100, 1.0, f64::MAX));
    h.source.add_baseline(1, baseline(2, 100, 1.0, 3.0));

    let stats = h.cache.load_agent(1).await;

    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.created, 2);
    let pair = h.cache.lookup(IndexKey::OutOfBounds(100)).await;
    assert_eq!(pair.len(), 2);
    assert_eq!(pair[1].reference.as_deref(), Some("3.75"));
    assert!(h.cache.is_cache_valid().await);
}

/// Negative baselines keep `low <= high` for both factor choices.
#[tokio::test]
async fn negative_baseline_bounds_are_ordered() {
    let h = Harness::with_config(CacheConfig {
        low_oob_factor: 1.25,
        high_oob_factor: 1.25,
        ..CacheConfig::default()
    });
    h.source.add_baseline(1, baseline(1, 100, -10.0, -5.0));
    h.cache.load_agent(1).await;

    let pair = h.cache.lookup(IndexKey::OutOfBounds(100)).await;
    assert_eq!(pair[0].reference.as_deref(), Some("-12.5"));
    assert_eq!(pair[1].reference.as_deref(), Some("-6.25"));

    let swapped = Harness::new();
    swapped.source.add_baseline(1, baseline(1, 100, -10.0, -10.0));
    swapped.cache.load_agent(1).await;

    let pair = swapped.cache.lookup(IndexKey::OutOfBounds(100)).await;
    assert_eq!(pair[0].reference.as_deref(), Some("-12.5"));
    assert_eq!(pair[1].reference.as_deref(), Some("-8"));
}

// ---------------------------------------------------------------------------
// Test: unload / reload
// ---------------------------------------------------------------------------

/// Unloading one agent leaves another agent's elements in place.
#[tokio::test]
async fn unload_agent_isolates_other_agents() {
    let h = Harness::new();
    h.source.add(1, threshold(10, 100, ">", 1.0));
    h.source.add(2, threshold(20, 100, ">", 2.0));
    h.source.add(2, availability(21, 300, "UP"));
    h.source.add_baseline(1, baseline(1, 100, 1.0, 2.0));
    h.source.add_baseline(2, baseline(2, 200, 1.0, 2.0));
    h.cache.load_agent(1).await;
    h.cache.load_agent(2).await;

    let stats = h.cache.unload_agent(1).await;

    assert_eq!(stats.deleted, 3);
    assert!(h.cache.agent_conditions(1).await.is_empty());
    assert!(h.cache.agent_out_of_bounds(1).await.is_empty());
    // availability conditions load before thresholds
    assert_eq!(h.cache.agent_conditions(2).await, vec![21, 20]);
    let remaining: Vec<i64> = h
        .cache
        .lookup(IndexKey::Measurement(100))
        .await
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec![20]);
    assert_eq!(h.cache.lookup(IndexKey::Availability(300)).await.len(), 1);
    assert!(h.cache.lookup(IndexKey::OutOfBounds(100)).await.is_empty());
    assert_eq!(h.cache.lookup(IndexKey::OutOfBounds(200)).await.len(), 2);
    assert!(h.cache.is_cache_valid().await);
}

/// Reload replaces an agent's elements with the source's current view.
#[tokio::test]
async fn reload_agent_reports_both_halves() {
    let h = Harness::new();
    h.source.add(1, threshold(10, 100, ">", 1.0));
    h.source.add_baseline(1, baseline(1, 100, 1.0, 2.0));
    h.cache.load_agent(1).await;

    h.source.add(1, threshold(11, 100, "<", 0.0));
    let reload = h.cache.reload_agent(1).await;

    assert_eq!(reload.unloaded.deleted, 3);
    assert_eq!(reload.loaded.created, 4);
    assert_eq!(h.cache.lookup(IndexKey::Measurement(100)).await.len(), 2);
    assert_eq!(h.cache.lookup(IndexKey::OutOfBounds(100)).await.len(), 2);
    assert_eq!(h.cache.monitor_snapshot().await.reloads, 1);
}

/// A reload whose load half fails still returns, with the failure counted.
#[tokio::test]
async fn reload_agent_survives_source_failure() {
    let h = Harness::new();
    h.source.add(1, threshold(10, 100, ">", 1.0));
    h.cache.load_agent(1).await;

    h.source.fail_after(0);
    let reload = h.cache.reload_agent(1).await;

    assert_eq!(reload.unloaded.deleted, 1);
    assert_eq!(reload.loaded.errors, 1);
    assert_eq!(reload.loaded.created, 0);
    assert!(h.cache.agent_conditions(1).await.is_empty());
    assert!(h.cache.is_cache_valid().await);
}

/// A loaded and then unloaded agent deletes exactly what it created.
#[tokio::test]
async fn load_unload_round_trip_balances() {
    let h = Harness::new();
    h.source.add(1, baseline_condition(1, 100, 900, ">", "max", 100.0, (1.0, 2.0, 3.0)));
    h.source.add(1, threshold(2, 100, ">", 1.0));
    h.source.add(1, event(3, 300, "ERROR", Some("oom")));
    h.source.add_baseline(1, baseline(900, 100, 1.0, 3.0));

    let loaded = h.cache.load_agent(1).await;
    let unloaded = h.cache.unload_agent(1).await;

    assert_eq!(loaded.created, unloaded.deleted);
    assert!(h.cache.lookup(IndexKey::Baseline(900)).await.is_empty());
    assert!(h.cache.is_cache_valid().await);
}

/// Clearing drops every agent and resets the monitor.
#[tokio::test]
async fn clear_all_empties_the_cache() {
    let h = Harness::new();
    h.source.add(1, threshold(10, 100, ">", 1.0));
    h.source.add(2, threshold(20, 200, ">", 1.0));
    h.cache.load_agent(1).await;
    h.cache.load_agent(2).await;

    let stats = h.cache.clear_all().await;

    assert_eq!(stats.deleted, 2);
    assert!(h.cache.agent_conditions(2).await.is_empty());
    assert_eq!(h.cache.monitor_snapshot().await.total_elements, 0);
}

// ---------------------------------------------------------------------------
// Test: resource removal
// ---------------------------------------------------------------------------

/// Removing a resource drops everything keyed off it and its schedules,
/// while the agent's other resource keeps its conditions.
#[tokio::test]
async fn remove_resource_drops_only_that_resource() {
    let h = Harness::new();
    // resource 300 owns schedules 100 and 200
    h.source.add(1, threshold(1, 100, ">", 1.0));
    h.source.add(1, baseline_condition(2, 100, 900, "<", "mean", 50.0, (1.0, 2.0, 3.0)));
    h.source.add(1, trait_change(3, 200, Some("v1")));
    h.source.add(1, availability(4, 300, "UP"));
    h.source.add(1, control(5, 300, 7, "FAILURE"));
    h.source.add(1, control(6, 300, 8, "SUCCESS"));
    h.source.add(1, event(7, 300, "WARN", None));
    h.source.add_baseline(1, baseline(900, 100, 1.0, 3.0));
    // resource 301 owns schedule 101
    h.source.add(1, threshold(8, 101, ">", 1.0));
    h.source.add(1, availability(9, 301, "UP"));
    h.source.add_baseline(1, baseline(901, 101, 1.0, 3.0));
    h.cache.load_agent(1).await;

    let stats = h.cache.remove_resource(300, &[100, 200]).await;

    // seven conditions plus one out-of-bounds pair
    assert_eq!(stats.deleted, 9);
    assert!(h.cache.lookup(IndexKey::Measurement(100)).await.is_empty());
    assert!(h.cache.lookup(IndexKey::Baseline(900)).await.is_empty());
    assert!(h.cache.lookup(IndexKey::Trait(200)).await.is_empty());
    assert!(h.cache.lookup(IndexKey::OutOfBounds(100)).await.is_empty());
    assert!(h.cache.lookup(IndexKey::Availability(300)).await.is_empty());
    assert!(h.cache.lookup(IndexKey::Event(300)).await.is_empty());
    assert!(h
        .cache
        .lookup(IndexKey::Operation {
            resource_id: 300,
            operation_definition_id: 8
        })
        .await
        .is_empty());

    let mut remaining = h.cache.agent_conditions(1).await;
    remaining.sort();
    assert_eq!(remaining, vec![8, 9]);
    assert_eq!(h.cache.agent_out_of_bounds(1).await, vec![101]);
    assert_eq!(h.cache.lookup(IndexKey::OutOfBounds(101)).await.len(), 2);
    assert!(h.cache.is_cache_valid().await);

    // the rest of the agent still unloads cleanly
    assert_eq!(h.cache.unload_agent(1).await.deleted, 4);
}

// ---------------------------------------------------------------------------
// Test: definition changes
// ---------------------------------------------------------------------------

/// Removing a condition removes it from every list that held it.
#[tokio::test]
async fn deleted_definition_removes_every_placement() {
    let h = Harness::new();
    let definition = AlertDefinitionRecord {
        id: 77,
        agent_id: 1,
        conditions: vec![
            baseline_condition(1, 100, 900, "<", "mean", 50.0, (1.0, 2.0, 3.0)),
            threshold(2, 100, ">", 10.0),
        ],
    };
    h.source.add(1, threshold(3, 100, "=", 5.0));
    h.cache.load_agent(1).await;

    let created = h.cache.update_definition(&definition, DefinitionEvent::Created).await;
    assert_eq!(created.created, 2);
    assert_eq!(h.cache.lookup(IndexKey::Measurement(100)).await.len(), 3);

    let deleted = h.cache.update_definition(&definition, DefinitionEvent::Deleted).await;

    assert_eq!(deleted.deleted, 2);
    let remaining: Vec<i64> = h
        .cache
        .lookup(IndexKey::Measurement(100))
        .await
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(remaining, vec![3]);
    assert!(h.cache.lookup(IndexKey::Baseline(900)).await.is_empty());
    assert_eq!(h.cache.agent_conditions(1).await, vec![3]);
    assert!(h.cache.is_cache_valid().await);
}

/// Enabling an already cached definition does not duplicate its elements.
#[tokio::test]
async fn re_enabling_definition_does_not_duplicate() {
    let h = Harness::new();
    let definition = AlertDefinitionRecord {
        id: 5,
        agent_id: 1,
        conditions: vec![threshold(2, 100, ">", 10.0)],
    };

    h.cache.update_definition(&definition, DefinitionEvent::Enabled).await;
    h.cache.update_definition(&definition, DefinitionEvent::Enabled).await;

    assert_eq!(h.cache.lookup(IndexKey::Measurement(100)).await.len(), 1);
    assert_eq!(h.cache.agent_conditions(1).await, vec![2]);
}
