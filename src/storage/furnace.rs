use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{assert_not_blank, BurningStorage};
use crate::fuel::{rescale, FuelVariant};
use crate::transaction::{Participant, Transaction};

/// The furnace flavours, which differ in how fast they burn their fuel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FurnaceKind {
    /// Burns a fuel for its full duration.
    Furnace,
    /// Burns twice as fast.
    Smoker,
    /// Burns twice as fast.
    BlastFurnace,
}

impl FurnaceKind {
    /// Ticks this furnace keeps burning on one unit of a fuel lasting `duration`.
    pub fn burn_ticks(self, duration: u32) -> u64 {
        match self {
            FurnaceKind::Furnace => u64::from(duration),
            FurnaceKind::Smoker | FurnaceKind::BlastFurnace => u64::from(duration / 2),
        }
    }

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            FurnaceKind::Furnace => "furnace",
            FurnaceKind::Smoker => "smoker",
            FurnaceKind::BlastFurnace => "blast_furnace",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct BurnClock {
    fuel: FuelVariant,
    lit_time: u64,
    lit_duration: u64,
}

#[derive(Debug, Default)]
struct FurnaceState {
    clock: BurnClock,
    lit: bool,
    changes: u64,
}

struct FurnaceInner {
    kind: FurnaceKind,
    state: Mutex<FurnaceState>,
}

impl FurnaceInner {
    fn amount_of(clock: &BurnClock) -> u64 {
        let capacity = u64::from(clock.fuel.duration());
        if clock.lit_duration == 0 {
            clock.lit_time
        } else {
            rescale(clock.lit_time, capacity, clock.lit_duration)
        }
    }
}

impl Participant for FurnaceInner {
    type Snapshot = BurnClock;

    fn create_snapshot(&self) -> BurnClock {
        self.state.lock().clock.clone()
    }

    fn read_snapshot(&self, snapshot: BurnClock) {
        self.state.lock().clock = snapshot;
    }

    fn on_final_commit(&self) {
        let mut state = self.state.lock();
        state.lit = FurnaceInner::amount_of(&state.clock) > 0;
        state.changes += 1;
        trace!(
            kind = self.kind.name(),
            lit = state.lit,
            lit_time = state.clock.lit_time,
            "furnace.commit"
        );
    }
}

/// Storage over a furnace that burns on its own clock.
///
/// The furnace keeps `lit_time` ticks left out of `lit_duration`; the storage
/// exposes that as an amount of the current fuel, rescaled to the fuel's burn
/// duration. Only insertion is supported. Cloning yields another handle to the
/// same furnace.
#[derive(Clone)]
pub struct FurnaceStorage {
    inner: Arc<FurnaceInner>,
}

impl FurnaceStorage {
    /// Creates an unlit furnace.
    pub fn new(kind: FurnaceKind) -> Self {
        Self {
            inner: Arc::new(FurnaceInner {
                kind,
                state: Mutex::new(FurnaceState::default()),
            }),
        }
    }

    /// Furnace flavour.
    pub fn kind(&self) -> FurnaceKind {
        self.inner.kind
    }

    /// Ticks of burn time left.
    pub fn lit_time(&self) -> u64 {
        self.inner.state.lock().clock.lit_time
    }

    /// Ticks the current fuel burns for in this furnace.
    pub fn lit_duration(&self) -> u64 {
        self.inner.state.lock().clock.lit_duration
    }

    /// Lit flag as of the last outer commit or tick.
    pub fn is_lit(&self) -> bool {
        self.inner.state.lock().lit
    }

    /// Number of outer commits that changed this furnace.
    pub fn changes(&self) -> u64 {
        self.inner.state.lock().changes
    }

    /// Burns one tick outside of any transaction. Returns `true` while still lit.
    pub fn tick(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.clock.lit_time > 0 {
            state.clock.lit_time -= 1;
        }
        if state.clock.lit_time == 0 && !state.clock.fuel.is_blank() {
            state.clock = BurnClock::default();
            state.changes += 1;
        }
        state.lit = state.clock.lit_time > 0;
        state.lit
    }

    fn set_fuel(&self, clock: &mut BurnClock, variant: &FuelVariant) {
        clock.fuel = variant.clone();
        clock.lit_duration = self.inner.kind.burn_ticks(variant.duration());
    }

    fn set_amount(clock: &mut BurnClock, amount: u64) {
        let capacity = u64::from(clock.fuel.duration());
        clock.lit_time = if capacity == 0 {
            amount
        } else {
            rescale(amount, clock.lit_duration, capacity)
        };
    }
}

impl BurningStorage for FurnaceStorage {
    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        let (old_amount, old_capacity) = {
            let state = self.inner.state.lock();
            (
                FurnaceInner::amount_of(&state.clock),
                u64::from(state.clock.fuel.duration()),
            )
        };
        let new_capacity = u64::from(variant.duration());
        let new_amount = old_amount
            .saturating_add(amount)
            .min(old_capacity.max(new_capacity));
        if new_amount <= old_amount {
            return 0;
        }

        tx.update_snapshots(&self.inner);
        let mut state = self.inner.state.lock();
        if new_amount > old_capacity {
            self.set_fuel(&mut state.clock, variant);
        }
        FurnaceStorage::set_amount(&mut state.clock, new_amount);
        new_amount - old_amount
    }

    fn supports_extraction(&self) -> bool {
        false
    }

    fn extract(&self, _variant: &FuelVariant, _amount: u64, _tx: &mut Transaction<'_>) -> u64 {
        0
    }

    fn resource(&self) -> FuelVariant {
        self.inner.state.lock().clock.fuel.clone()
    }

    fn amount(&self) -> u64 {
        FurnaceInner::amount_of(&self.inner.state.lock().clock)
    }

    fn capacity(&self) -> u64 {
        u64::from(self.inner.state.lock().clock.fuel.duration())
    }
}

impl fmt::Debug for FurnaceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("FurnaceStorage")
            .field("kind", &self.inner.kind)
            .field("fuel", &state.clock.fuel)
            .field("lit_time", &state.clock.lit_time)
            .field("lit_duration", &state.clock.lit_duration)
            .field("lit", &state.lit)
            .finish()
    }
}
