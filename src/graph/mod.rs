//! Bounded breadth-first discovery of the storages reachable through propagators.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::lookup::Level;
use crate::options::RoutingOptions;
use crate::storage::BurningStorage;
use crate::types::{BlockPos, Direction};

/// A storage reached by a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchVisit {
    /// Position of the storage.
    pub pos: BlockPos,
    /// Face the storage was queried on; `None` at the start position.
    pub side: Option<Direction>,
    /// Hops walked from the start.
    pub depth: u32,
}

/// Summary of a finished search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Positions taken off the frontier.
    pub nodes: usize,
    /// Storages reported to the visitor.
    pub storages: usize,
    /// Positions whose propagator was expanded.
    pub expanded: usize,
    /// Deepest hop reached.
    pub max_depth: u32,
    /// `true` when the visitor cut the search short.
    pub stopped: bool,
}

/// Network view of a [`Level`] for storage discovery.
///
/// Starting from one position, the search walks outwards through blocks that
/// expose a [`crate::lookup::Propagator`], asking each reached position for a
/// storage on the face it was reached through. Every position is visited at
/// most once, and nothing further than the hop budget is expanded.
pub struct PropagationGraph<'l> {
    level: &'l dyn Level,
    options: RoutingOptions,
}

impl<'l> PropagationGraph<'l> {
    /// Creates a graph over `level`.
    pub fn new(level: &'l dyn Level, options: RoutingOptions) -> Self {
        Self { level, options }
    }

    /// Options in effect.
    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    /// Walks the network from `start`, reporting every storage found to `visit`.
    ///
    /// Returning [`ControlFlow::Break`] from `visit` stops the search at once.
    pub fn search<F>(&self, start: BlockPos, mut visit: F) -> SearchStats
    where
        F: FnMut(SearchVisit, &Arc<dyn BurningStorage>) -> ControlFlow<()>,
    {
        let budget = self.options.hop_budget;
        let metrics = self.options.metrics_handle();
        let mut rng = self.options.rng();
        let mut stats = SearchStats::default();
        let mut queue: VecDeque<(Option<Direction>, BlockPos, u32)> = VecDeque::new();
        let mut seen: FxHashSet<BlockPos> = FxHashSet::default();
        queue.push_back((None, start, 0));
        seen.insert(start);
        trace!(%start, budget, "graph.search.start");

        while let Some((side, pos, depth)) = queue.pop_front() {
            stats.nodes += 1;
            stats.max_depth = stats.max_depth.max(depth);

            if let Some(storage) = self.level.find_storage(pos, side) {
                stats.storages += 1;
                metrics.storage_visited();
                if visit(SearchVisit { pos, side, depth }, &storage).is_break() {
                    stats.stopped = true;
                    break;
                }
            }

            if depth >= budget {
                continue;
            }
            let Some(propagator) = self.level.find_propagator(pos, side) else {
                continue;
            };
            stats.expanded += 1;
            metrics.node_expanded();

            let mut targets: SmallVec<[Direction; 6]> = propagator
                .propagation_targets(self.level, pos)
                .iter()
                .collect();
            targets.shuffle(&mut rng);
            for direction in targets {
                let next = pos.relative(direction);
                if seen.insert(next) {
                    queue.push_back((Some(direction.opposite()), next, depth + 1));
                }
            }
        }

        debug!(
            %start,
            nodes = stats.nodes,
            storages = stats.storages,
            stopped = stats.stopped,
            "graph.search.finish"
        );
        stats
    }

    /// Collects every reachable storage in visiting order.
    pub fn collect(&self, start: BlockPos) -> Vec<(SearchVisit, Arc<dyn BurningStorage>)> {
        let mut found = Vec::new();
        self.search(start, |visit, storage| {
            found.push((visit, Arc::clone(storage)));
            ControlFlow::Continue(())
        });
        found
    }
}
