use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking the work done by network searches and insertion plans.
///
/// Implementations collect how many storages a search reached, how many relay
/// nodes it expanded and how much speculation the planner needed before it
/// settled on a destination.
pub trait RoutingMetrics: Send + Sync {
    /// Records a storage reported to a search visitor.
    fn storage_visited(&self);

    /// Records a node whose propagator was expanded.
    fn node_expanded(&self);

    /// Records a speculative attempt run and rolled back by the planner.
    fn speculative_attempt(&self);

    /// Records a forwarded insertion captured as a planning candidate.
    fn candidate_recorded(&self);

    /// Records a replayed winning insertion.
    ///
    /// # Parameters
    /// * `amount` - The amount the replay inserted.
    fn insertion_committed(&self, amount: u64);
}

/// A no-op implementation of [`RoutingMetrics`] that discards every event.
///
/// This is what searches and plans report to when no metrics are configured,
/// so routing pays nothing for instrumentation it does not use.
#[derive(Default)]
pub struct NoopMetrics;

impl RoutingMetrics for NoopMetrics {
    fn storage_visited(&self) {}
    fn node_expanded(&self) {}
    fn speculative_attempt(&self) {}
    fn candidate_recorded(&self) {}
    fn insertion_committed(&self, _amount: u64) {}
}

/// A thread-safe counter-based implementation of [`RoutingMetrics`].
///
/// Every event bumps an atomic counter with relaxed ordering. Share one
/// instance through [`crate::RoutingOptions::metrics()`] across searches and plans
/// and read the counters afterwards, e.g. to check how much speculation a plan
/// needed.
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of storages reported to search visitors.
    pub storages_visited: AtomicU64,

    /// Number of propagator expansions.
    pub nodes_expanded: AtomicU64,

    /// Number of speculative attempts.
    pub speculative_attempts: AtomicU64,

    /// Number of recorded candidates.
    pub candidates_recorded: AtomicU64,

    /// Number of replayed winners.
    pub insertions_committed: AtomicU64,

    /// Total amount inserted by replayed winners.
    pub amount_committed: AtomicU64,
}

impl RoutingMetrics for CounterMetrics {
    fn storage_visited(&self) {
        self.storages_visited.fetch_add(1, Ordering::Relaxed);
    }

    fn node_expanded(&self) {
        self.nodes_expanded.fetch_add(1, Ordering::Relaxed);
    }

    fn speculative_attempt(&self) {
        self.speculative_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn candidate_recorded(&self) {
        self.candidates_recorded.fetch_add(1, Ordering::Relaxed);
    }

    fn insertion_committed(&self, amount: u64) {
        self.insertions_committed.fetch_add(1, Ordering::Relaxed);
        self.amount_committed.fetch_add(amount, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation (no-op).
pub fn default_metrics() -> Arc<dyn RoutingMetrics> {
    Arc::new(NoopMetrics)
}
