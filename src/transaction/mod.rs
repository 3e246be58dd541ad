//! Nested, snapshot-based transactions.
//!
//! Every participant touched inside a scope records one snapshot of its state
//! the first time that scope sees it. Aborting a scope restores those snapshots;
//! committing a nested scope hands them to the parent, where an older snapshot
//! of the same participant always wins. Only the commit of the outer scope makes
//! changes durable and fires each participant's final-commit hook, once.
//!
//! Scopes borrow their parent mutably, so while a nested scope is alive nothing
//! else can run against the parent: one live lineage per thread, checked by the
//! borrow checker. Opening a second outer scope on a thread that already has one
//! open is refused.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::{BurningError, Result};
use crate::lookup::Recorder;

/// The state of a transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// The scope accepts mutations.
    Active,
    /// The scope has been committed.
    Committed,
    /// The scope has been rolled back.
    RolledBack,
}

/// State that can be captured and restored by a [`Transaction`].
///
/// Implementors keep their state behind interior mutability and call
/// [`Transaction::update_snapshots`] right before their first mutation in a
/// scope.
pub trait Participant: Send + Sync + 'static {
    /// Captured state.
    type Snapshot: Send + 'static;

    /// Captures the current state.
    fn create_snapshot(&self) -> Self::Snapshot;

    /// Restores a previously captured state.
    fn read_snapshot(&self, snapshot: Self::Snapshot);

    /// Runs once per outer commit that saw this participant change.
    fn on_final_commit(&self) {}
}

trait FinalCommit: Send + Sync {
    fn final_commit(&self);
}

impl<P: Participant> FinalCommit for P {
    fn final_commit(&self) {
        self.on_final_commit();
    }
}

type ParticipantKey = usize;

fn participant_key<P: Participant>(participant: &Arc<P>) -> ParticipantKey {
    Arc::as_ptr(participant) as *const () as usize
}

struct JournalEntry {
    key: ParticipantKey,
    participant: Arc<dyn FinalCommit>,
    restore: Box<dyn FnOnce() + Send>,
}

/// Snapshots recorded by one scope, in first-touch order.
#[derive(Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
    keys: FxHashSet<ParticipantKey>,
}

impl Journal {
    fn contains(&self, key: ParticipantKey) -> bool {
        self.keys.contains(&key)
    }

    fn push(&mut self, entry: JournalEntry) {
        if self.keys.insert(entry.key) {
            self.entries.push(entry);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Moves a committed child's snapshots up. Snapshots of participants this
    /// journal already tracks are older than the child's and are kept.
    fn absorb(&mut self, child: Journal) {
        for entry in child.entries {
            if !self.contains(entry.key) {
                self.push(entry);
            }
        }
    }

    fn rollback(self) -> usize {
        let restored = self.entries.len();
        for entry in self.entries.into_iter().rev() {
            (entry.restore)();
        }
        restored
    }

    fn finalize(self) -> usize {
        let committed = self.entries.len();
        for entry in self.entries {
            entry.participant.final_commit();
        }
        committed
    }
}

thread_local! {
    static OUTER_OPEN: Cell<bool> = const { Cell::new(false) };
}

/// A transaction scope.
///
/// Dropping an active scope rolls it back.
///
/// # Example
///
/// ```rust
/// use burning::fuel::{fuels, SimpleFuelRegistry};
/// use burning::storage::{BurningStorage, SimpleStorage};
/// use burning::transaction::Transaction;
///
/// let coal = SimpleFuelRegistry::legacy().get(fuels::COAL);
/// let storage = SimpleStorage::new();
/// {
///     let mut tx = Transaction::open_outer();
///     assert_eq!(storage.insert(&coal, 400, &mut tx), 400);
///     // dropped without commit: rolled back
/// }
/// assert_eq!(storage.amount(), 0);
/// ```
pub struct Transaction<'p> {
    parent: Option<&'p mut Journal>,
    journal: Journal,
    depth: usize,
    recorder: Option<&'p Recorder>,
    state: TxState,
}

impl Transaction<'static> {
    /// Opens an outer scope.
    ///
    /// # Panics
    ///
    /// Panics when an outer scope is already open on this thread.
    pub fn open_outer() -> Self {
        match Self::try_open_outer() {
            Ok(tx) => tx,
            Err(err) => panic!("{err}"),
        }
    }

    /// Opens an outer scope, failing when one is already open on this thread.
    pub fn try_open_outer() -> Result<Self> {
        if OUTER_OPEN.with(|open| open.replace(true)) {
            return Err(BurningError::Invalid(
                "an outer transaction is already open on this thread",
            ));
        }
        trace!(depth = 0, "tx.open");
        Ok(Self {
            parent: None,
            journal: Journal::default(),
            depth: 0,
            recorder: None,
            state: TxState::Active,
        })
    }

    /// Returns `true` when an outer scope is open on this thread.
    pub fn is_open() -> bool {
        OUTER_OPEN.with(Cell::get)
    }
}

impl<'p> Transaction<'p> {
    /// Opens a scope nested under `parent`, or an outer scope when there is none.
    pub fn open_nested_or_outer(parent: Option<&'p mut Transaction<'_>>) -> Transaction<'p> {
        match parent {
            Some(parent) => parent.open_nested(),
            None => Transaction::open_outer(),
        }
    }

    /// Opens a scope nested under this one.
    pub fn open_nested(&mut self) -> Transaction<'_> {
        let recorder = self.recorder;
        self.nested_with(recorder)
    }

    /// Opens a nested scope that routes forwarded insertions into `recorder`
    /// instead of performing them. Scopes nested below it inherit the recorder.
    pub(crate) fn open_recording<'a>(&'a mut self, recorder: &'a Recorder) -> Transaction<'a> {
        self.nested_with(Some(recorder))
    }

    fn nested_with<'a>(&'a mut self, recorder: Option<&'a Recorder>) -> Transaction<'a> {
        let depth = self.depth + 1;
        trace!(depth, recording = recorder.is_some(), "tx.open");
        Transaction {
            parent: Some(&mut self.journal),
            journal: Journal::default(),
            depth,
            recorder,
            state: TxState::Active,
        }
    }

    /// Nesting depth; the outer scope is at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns `true` for an outer scope.
    pub fn is_outer(&self) -> bool {
        self.depth == 0
    }

    /// Current state of the scope.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Number of participants this scope has snapshotted.
    pub fn touched(&self) -> usize {
        self.journal.len()
    }

    pub(crate) fn recorder(&self) -> Option<&'p Recorder> {
        self.recorder
    }

    /// Records a snapshot of `participant` unless this scope already holds one.
    ///
    /// Call before mutating the participant.
    pub fn update_snapshots<P: Participant>(&mut self, participant: &Arc<P>) {
        let key = participant_key(participant);
        if self.journal.contains(key) {
            return;
        }
        let snapshot = participant.create_snapshot();
        let target = Arc::clone(participant);
        let handle: Arc<dyn FinalCommit> = Arc::clone(participant) as Arc<dyn FinalCommit>;
        self.journal.push(JournalEntry {
            key,
            participant: handle,
            restore: Box::new(move || target.read_snapshot(snapshot)),
        });
    }

    /// Commits the scope.
    ///
    /// A nested commit hands the recorded snapshots to the parent. The outer
    /// commit closes the scope first, then fires every touched participant's
    /// final-commit hook, so hooks may open a fresh outer scope.
    pub fn commit(mut self) {
        let journal = std::mem::take(&mut self.journal);
        self.state = TxState::Committed;
        match self.parent.take() {
            Some(parent) => {
                trace!(depth = self.depth, forwarded = journal.len(), "tx.commit");
                parent.absorb(journal);
            }
            None => {
                OUTER_OPEN.with(|open| open.set(false));
                let committed = journal.finalize();
                trace!(depth = self.depth, committed, "tx.commit");
            }
        }
    }

    /// Rolls the scope back, restoring every participant it touched.
    pub fn abort(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        self.state = TxState::RolledBack;
        let restored = journal.rollback();
        trace!(depth = self.depth, restored, "tx.abort");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            self.rollback();
        }
        if self.depth == 0 {
            OUTER_OPEN.with(|open| open.set(false));
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("depth", &self.depth)
            .field("state", &self.state)
            .field("touched", &self.journal.len())
            .field("recording", &self.recorder.is_some())
            .finish()
    }
}
