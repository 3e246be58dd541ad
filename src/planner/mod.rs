//! Speculative insertion planning.
//!
//! The planner tries an insertion against every destination it can discover,
//! each attempt inside a nested transaction that is rolled back right after,
//! and replays only the single best attempt against the caller's transaction.
//! Attempts that forward their insertion onward (relays) are run under a
//! [`Recorder`], so instead of inserting they report where they would have
//! forwarded to; those destinations are queued one hop further away.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::ControlFlow;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::fuel::FuelVariant;
use crate::graph::PropagationGraph;
use crate::lookup::{Attempt, Level, Recorder};
use crate::metrics::RoutingMetrics;
use crate::options::RoutingOptions;
use crate::storage::BurningStorage;
use crate::transaction::Transaction;
use crate::types::BlockPos;

/// What a queued work item runs.
enum WorkKind<'o> {
    /// The caller's own insertion.
    Origin(&'o dyn Fn(&mut Transaction<'_>) -> u64),
    /// An insertion a relay forwarded.
    Relay(Attempt),
    /// A storage discovered by a network search.
    Terminal {
        storage: Arc<dyn BurningStorage>,
        variant: FuelVariant,
        amount: u64,
    },
}

impl WorkKind<'_> {
    fn run(&self, tx: &mut Transaction<'_>) -> u64 {
        match self {
            WorkKind::Origin(attempt) => attempt(tx),
            WorkKind::Relay(attempt) => attempt(tx),
            WorkKind::Terminal {
                storage,
                variant,
                amount,
            } => storage.insert(variant, *amount, tx),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            WorkKind::Origin(_) => "origin",
            WorkKind::Relay(_) => "relay",
            WorkKind::Terminal { .. } => "terminal",
        }
    }
}

struct WorkItem<'o> {
    cost: u32,
    seq: u64,
    pos: BlockPos,
    kind: Arc<WorkKind<'o>>,
}

impl PartialEq for WorkItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.seq == other.seq
    }
}

impl Eq for WorkItem<'_> {}

impl Ord for WorkItem<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.cost, other.seq).cmp(&(self.cost, self.seq))
    }
}

impl PartialOrd for WorkItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending work ordered by cost, then by queueing order.
struct WorkQueue<'o> {
    heap: BinaryHeap<WorkItem<'o>>,
    next_seq: u64,
}

impl<'o> WorkQueue<'o> {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    fn push(&mut self, cost: u32, pos: BlockPos, kind: WorkKind<'o>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(WorkItem {
            cost,
            seq,
            pos,
            kind: Arc::new(kind),
        });
    }

    fn pop(&mut self) -> Option<WorkItem<'o>> {
        self.heap.pop()
    }
}

/// Outcome of [`InsertionPlanner::plan`] before the winner is replayed.
struct Exploration<'o> {
    best: Option<(u64, BlockPos, Arc<WorkKind<'o>>)>,
    attempts: usize,
}

/// Finds the single destination accepting the most of an insertion and
/// commits to it alone.
#[derive(Clone, Debug, Default)]
pub struct InsertionPlanner {
    options: RoutingOptions,
}

impl InsertionPlanner {
    /// Creates a planner.
    pub fn new(options: RoutingOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &RoutingOptions {
        &self.options
    }

    /// Runs `origin` speculatively, follows whatever it forwards, and replays
    /// the best terminal insertion against `outer`.
    ///
    /// Returns the amount the replay inserted; 0 when no terminal accepted
    /// anything, in which case `outer` is left untouched.
    pub fn plan_insert(
        &self,
        origin_pos: BlockPos,
        origin: &dyn Fn(&mut Transaction<'_>) -> u64,
        outer: &mut Transaction<'_>,
    ) -> u64 {
        let mut queue = WorkQueue::new();
        queue.push(0, origin_pos, WorkKind::Origin(origin));
        self.settle(queue, outer)
    }

    /// Searches the network around `start` and inserts `amount` of `variant`
    /// into the reachable storage that accepts the most of it.
    ///
    /// Storages that forward insertions or refuse them entirely are skipped.
    pub fn plan_network_insert(
        &self,
        level: &dyn Level,
        start: BlockPos,
        variant: &FuelVariant,
        amount: u64,
        outer: &mut Transaction<'_>,
    ) -> u64 {
        let mut queue = WorkQueue::new();
        let graph = PropagationGraph::new(level, self.options.clone());
        graph.search(start, |visit, storage| {
            if storage.supports_insertion() && !storage.forwards() {
                queue.push(
                    visit.depth,
                    visit.pos,
                    WorkKind::Terminal {
                        storage: Arc::clone(storage),
                        variant: variant.clone(),
                        amount,
                    },
                );
            }
            ControlFlow::Continue(())
        });
        self.settle(queue, outer)
    }

    fn settle<'o>(&self, queue: WorkQueue<'o>, outer: &mut Transaction<'_>) -> u64 {
        let metrics = self.options.metrics_handle();
        let exploration = self.plan(queue, outer, metrics.as_ref());
        match exploration.best {
            Some((expected, pos, winner)) => {
                let inserted = winner.run(outer);
                metrics.insertion_committed(inserted);
                debug!(
                    %pos,
                    expected,
                    inserted,
                    attempts = exploration.attempts,
                    "planner.commit"
                );
                inserted
            }
            None => {
                debug!(attempts = exploration.attempts, "planner.no_destination");
                0
            }
        }
    }

    fn plan<'o>(
        &self,
        mut queue: WorkQueue<'o>,
        outer: &mut Transaction<'_>,
        metrics: &dyn RoutingMetrics,
    ) -> Exploration<'o> {
        let budget = self.options.hop_budget;
        let mut closed: FxHashMap<BlockPos, u32> = FxHashMap::default();
        for seeded in queue.heap.iter() {
            let known = closed.entry(seeded.pos).or_insert(seeded.cost);
            *known = (*known).min(seeded.cost);
        }
        let mut best: Option<(u64, BlockPos, Arc<WorkKind<'o>>)> = None;
        let mut attempts = 0usize;

        while let Some(item) = queue.pop() {
            let recorder = Recorder::new();
            let inserted = {
                let mut speculative = outer.open_recording(&recorder);
                item.kind.run(&mut speculative)
            };
            attempts += 1;
            metrics.speculative_attempt();
            let candidates = recorder.take();
            trace!(
                pos = %item.pos,
                cost = item.cost,
                kind = item.kind.label(),
                inserted,
                candidates = candidates.len(),
                "planner.attempt"
            );

            if candidates.is_empty() {
                let best_amount = best.as_ref().map_or(0, |(amount, _, _)| *amount);
                if inserted > best_amount {
                    best = Some((inserted, item.pos, Arc::clone(&item.kind)));
                }
                continue;
            }

            let cost = item.cost + 1;
            if cost > budget {
                continue;
            }
            for candidate in candidates {
                metrics.candidate_recorded();
                match closed.get(&candidate.pos) {
                    Some(known) if *known <= cost => continue,
                    _ => {}
                }
                closed.insert(candidate.pos, cost);
                queue.push(cost, candidate.pos, WorkKind::Relay(candidate.attempt));
            }
        }

        Exploration { best, attempts }
    }
}

/// Plans an insertion with default options. See [`InsertionPlanner::plan_insert`].
pub fn plan_insert(
    origin_pos: BlockPos,
    origin: &dyn Fn(&mut Transaction<'_>) -> u64,
    outer: &mut Transaction<'_>,
) -> u64 {
    InsertionPlanner::default().plan_insert(origin_pos, origin, outer)
}
