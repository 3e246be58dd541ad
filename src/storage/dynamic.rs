use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{assert_not_blank, BurningStorage};
use crate::fuel::FuelVariant;
use crate::transaction::{Participant, Transaction};

/// A numeric field owned by a block entity, shared with the storages bound to it.
pub type ClockField = Arc<AtomicU64>;

#[derive(Clone, Debug, PartialEq, Eq)]
struct ClockSnapshot {
    fuel: FuelVariant,
    lit_time: u64,
    lit_duration: u64,
}

struct DynamicInner {
    lit_time: ClockField,
    lit_duration: ClockField,
    fuel: Mutex<FuelVariant>,
}

impl Participant for DynamicInner {
    type Snapshot = ClockSnapshot;

    fn create_snapshot(&self) -> ClockSnapshot {
        let fuel = self.fuel.lock();
        ClockSnapshot {
            fuel: fuel.clone(),
            lit_time: self.lit_time.load(Ordering::Relaxed),
            lit_duration: self.lit_duration.load(Ordering::Relaxed),
        }
    }

    fn read_snapshot(&self, snapshot: ClockSnapshot) {
        let mut fuel = self.fuel.lock();
        *fuel = snapshot.fuel;
        self.lit_time.store(snapshot.lit_time, Ordering::Relaxed);
        self.lit_duration.store(snapshot.lit_duration, Ordering::Relaxed);
    }

    fn on_final_commit(&self) {
        trace!(
            lit_time = self.lit_time.load(Ordering::Relaxed),
            lit_duration = self.lit_duration.load(Ordering::Relaxed),
            "dynamic_furnace.commit"
        );
    }
}

/// Insertion-only storage over the burn clock of an arbitrary block entity.
///
/// The entity owns two fields, the ticks left and the ticks the current fuel
/// lasts; the storage reads the amount straight from the former and rewrites
/// the latter whenever it switches fuel. The fuel itself is tracked by the
/// storage, so a storage starts out blank even over a burning entity.
///
/// Cloning yields another handle bound to the same fields.
#[derive(Clone)]
pub struct DynamicFurnaceStorage {
    inner: Arc<DynamicInner>,
}

impl DynamicFurnaceStorage {
    /// Binds a storage to an entity's `lit_time` and `lit_duration` fields.
    pub fn new(lit_time: ClockField, lit_duration: ClockField) -> Self {
        Self {
            inner: Arc::new(DynamicInner {
                lit_time,
                lit_duration,
                fuel: Mutex::new(FuelVariant::BLANK),
            }),
        }
    }

    /// Returns `true` when this storage reads the given `lit_time` field.
    pub fn is_bound_to(&self, lit_time: &ClockField) -> bool {
        Arc::ptr_eq(&self.inner.lit_time, lit_time)
    }

    /// Ticks the current fuel lasts, as last written to the entity.
    pub fn lit_duration(&self) -> u64 {
        self.inner.lit_duration.load(Ordering::Relaxed)
    }
}

impl BurningStorage for DynamicFurnaceStorage {
    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        let (old_amount, old_capacity) = {
            let fuel = self.inner.fuel.lock();
            (
                self.inner.lit_time.load(Ordering::Relaxed),
                u64::from(fuel.duration()),
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
        let mut fuel = self.inner.fuel.lock();
        if new_amount > old_capacity {
            *fuel = variant.clone();
            self.inner.lit_duration.store(new_capacity, Ordering::Relaxed);
        }
        self.inner.lit_time.store(new_amount, Ordering::Relaxed);
        new_amount - old_amount
    }

    fn supports_extraction(&self) -> bool {
        false
    }

    fn extract(&self, variant: &FuelVariant, _amount: u64, _tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        0
    }

    fn resource(&self) -> FuelVariant {
        self.inner.fuel.lock().clone()
    }

    fn amount(&self) -> u64 {
        self.inner.lit_time.load(Ordering::Relaxed)
    }

    fn capacity(&self) -> u64 {
        u64::from(self.inner.fuel.lock().duration())
    }
}

impl fmt::Debug for DynamicFurnaceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFurnaceStorage")
            .field("fuel", &*self.inner.fuel.lock())
            .field("lit_time", &self.inner.lit_time.load(Ordering::Relaxed))
            .field("lit_duration", &self.inner.lit_duration.load(Ordering::Relaxed))
            .finish()
    }
}
