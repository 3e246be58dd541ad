//! The seam between the routing engine and the world it routes through.
//!
//! The engine never inspects the world directly: it asks a [`Level`] which
//! storage or propagator sits at a position, seen from a given side. Storages
//! that forward insertions to their neighbours do so through [`route_insert`],
//! which a planning scope can intercept with a [`Recorder`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::fuel::FuelVariant;
use crate::storage::BurningStorage;
use crate::transaction::Transaction;
use crate::types::{BlockPos, Direction, DirectionSet};

/// Resolves routing capabilities by position and side.
///
/// `side` is the face of the block the query comes from; `None` asks for an
/// unrestricted view.
pub trait Level: Send + Sync {
    /// Storage exposed at `pos` on `side`.
    fn find_storage(&self, pos: BlockPos, side: Option<Direction>) -> Option<Arc<dyn BurningStorage>>;

    /// Propagator exposed at `pos` on `side`.
    fn find_propagator(&self, pos: BlockPos, side: Option<Direction>) -> Option<Arc<dyn Propagator>>;

    /// Fresh seed for per-call shuffling.
    fn next_seed(&self) -> u64 {
        rand::random()
    }
}

/// A block able to relay a network search to some of its neighbours.
pub trait Propagator: Send + Sync {
    /// Directions the search may continue towards from `pos`.
    fn propagation_targets(&self, level: &dyn Level, pos: BlockPos) -> DirectionSet;
}

impl<F> Propagator for F
where
    F: Fn(&dyn Level, BlockPos) -> DirectionSet + Send + Sync,
{
    fn propagation_targets(&self, level: &dyn Level, pos: BlockPos) -> DirectionSet {
        self(level, pos)
    }
}

/// Propagates towards a fixed set of directions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FixedPropagator(pub DirectionSet);

impl FixedPropagator {
    /// Propagates in every direction.
    pub const ALL: FixedPropagator = FixedPropagator(DirectionSet::ALL);
}

impl Propagator for FixedPropagator {
    fn propagation_targets(&self, _level: &dyn Level, _pos: BlockPos) -> DirectionSet {
        self.0
    }
}

/// A deferred insertion, replayable under any transaction scope.
pub type Attempt = Arc<dyn Fn(&mut Transaction<'_>) -> u64 + Send + Sync>;

/// Wraps a closure as an [`Attempt`].
pub fn attempt<F>(f: F) -> Attempt
where
    F: Fn(&mut Transaction<'_>) -> u64 + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An insertion a forwarding storage wanted to perform, captured instead of run.
#[derive(Clone)]
pub struct Candidate {
    /// Position of the storage the insertion targets.
    pub pos: BlockPos,
    /// The insertion itself.
    pub attempt: Attempt,
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("pos", &self.pos).finish()
    }
}

/// Collects the forwarded insertions of one speculative step.
#[derive(Debug, Default)]
pub struct Recorder {
    candidates: Mutex<Vec<Candidate>>,
}

impl Recorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a candidate.
    pub fn record(&self, candidate: Candidate) {
        self.candidates.lock().push(candidate);
    }

    /// Number of candidates recorded so far.
    pub fn len(&self) -> usize {
        self.candidates.lock().len()
    }

    /// Returns `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.candidates.lock().is_empty()
    }

    /// Drains the recorded candidates in recording order.
    pub fn take(&self) -> Vec<Candidate> {
        std::mem::take(&mut *self.candidates.lock())
    }
}

/// Forwards an insertion to the storage at `pos`.
///
/// Under a recording scope the insertion is captured as a [`Candidate`] and
/// nothing is inserted; otherwise it runs immediately against `tx`.
pub fn route_insert(
    tx: &mut Transaction<'_>,
    pos: BlockPos,
    storage: Arc<dyn BurningStorage>,
    variant: &FuelVariant,
    amount: u64,
) -> u64 {
    match tx.recorder() {
        Some(recorder) => {
            trace!(%pos, amount, "lookup.record");
            let variant = variant.clone();
            recorder.record(Candidate {
                pos,
                attempt: attempt(move |tx| storage.insert(&variant, amount, tx)),
            });
            0
        }
        None => storage.insert(variant, amount, tx),
    }
}
