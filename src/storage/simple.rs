use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{assert_not_blank, BurningStorage};
use crate::fuel::{rescale, FuelVariant, ResourceAmount};
use crate::transaction::{Participant, Transaction};

/// Maps a fuel's burn duration to the capacity a storage grants it.
pub type DurationOperator = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

type CommitHook = Box<dyn Fn(&ResourceAmount) + Send + Sync>;

struct SimpleInner {
    state: Mutex<ResourceAmount>,
    operator: Option<DurationOperator>,
    on_commit: Option<CommitHook>,
}

impl SimpleInner {
    fn capacity_of(&self, duration: u32) -> u64 {
        match &self.operator {
            Some(operator) => u64::from(operator(duration)),
            None => u64::from(duration),
        }
    }
}

impl Participant for SimpleInner {
    type Snapshot = ResourceAmount;

    fn create_snapshot(&self) -> ResourceAmount {
        self.state.lock().clone()
    }

    fn read_snapshot(&self, snapshot: ResourceAmount) {
        *self.state.lock() = snapshot;
    }

    fn on_final_commit(&self) {
        if let Some(hook) = &self.on_commit {
            let state = self.state.lock().clone();
            hook(&state);
        }
    }
}

/// Single-slot storage that supports both insertion and extraction.
///
/// Amounts are kept in units of the capacity the optional duration operator
/// assigns to the held variant. Inserting a variant with a larger capacity
/// upgrades the slot to that variant once the amount outgrows the old capacity;
/// extracting a smaller one downgrades it once the amount fits.
///
/// Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct SimpleStorage {
    inner: Arc<SimpleInner>,
}

impl SimpleStorage {
    /// Creates an empty storage whose capacity is the burn duration itself.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Creates an empty storage that scales every burn duration through `operator`.
    pub fn with_operator(operator: impl Fn(u32) -> u32 + Send + Sync + 'static) -> Self {
        Self::build(Some(Arc::new(operator)), None)
    }

    /// Returns a storage sharing this one's operator that calls `hook` with the
    /// committed contents after every outer commit that touched it.
    ///
    /// The returned storage starts empty.
    pub fn on_commit(self, hook: impl Fn(&ResourceAmount) + Send + Sync + 'static) -> Self {
        Self::build(self.inner.operator.clone(), Some(Box::new(hook)))
    }

    fn build(operator: Option<DurationOperator>, on_commit: Option<CommitHook>) -> Self {
        Self {
            inner: Arc::new(SimpleInner {
                state: Mutex::new(ResourceAmount::BLANK),
                operator,
                on_commit,
            }),
        }
    }

    /// Overwrites the contents outside of any transaction, e.g. after decoding a
    /// persisted record. The amount is clamped to the variant's capacity.
    pub fn load(&self, contents: ResourceAmount) {
        let capacity = self.inner.capacity_of(contents.variant.duration());
        let amount = contents.amount.min(capacity);
        let mut state = self.inner.state.lock();
        *state = if contents.variant.is_blank() || amount == 0 {
            ResourceAmount::BLANK
        } else {
            ResourceAmount::new(contents.variant, amount)
        };
    }
}

impl Default for SimpleStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl BurningStorage for SimpleStorage {
    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        let duration = u64::from(variant.duration());
        let (old_amount, old_capacity) = {
            let state = self.inner.state.lock();
            (state.amount, self.inner.capacity_of(state.variant.duration()))
        };
        let new_capacity = self.inner.capacity_of(variant.duration());
        let new_amount = old_amount
            .saturating_add(rescale(amount, new_capacity, duration))
            .min(old_capacity.max(new_capacity));
        if new_amount <= old_amount {
            return 0;
        }

        tx.update_snapshots(&self.inner);
        let mut state = self.inner.state.lock();
        if new_amount > old_capacity {
            state.variant = variant.clone();
        }
        state.amount = new_amount;
        rescale(new_amount - old_amount, duration, new_capacity)
    }

    fn extract(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        let duration = u64::from(variant.duration());
        let (old_amount, old_capacity) = {
            let state = self.inner.state.lock();
            (state.amount, self.inner.capacity_of(state.variant.duration()))
        };
        let new_capacity = self.inner.capacity_of(variant.duration());
        let new_amount = old_amount
            .saturating_sub(rescale(amount, new_capacity, duration))
            .min(old_capacity.max(new_capacity));
        if new_amount >= old_amount {
            return 0;
        }

        tx.update_snapshots(&self.inner);
        let mut state = self.inner.state.lock();
        if old_capacity > new_capacity && new_amount <= new_capacity {
            state.variant = variant.clone();
        }
        state.amount = new_amount;
        if new_amount == 0 {
            state.variant = FuelVariant::BLANK;
        }
        rescale(old_amount - new_amount, duration, new_capacity)
    }

    fn resource(&self) -> FuelVariant {
        self.inner.state.lock().variant.clone()
    }

    fn amount(&self) -> u64 {
        self.inner.state.lock().amount
    }

    fn capacity(&self) -> u64 {
        let state = self.inner.state.lock();
        self.inner.capacity_of(state.variant.duration())
    }

    fn contents(&self) -> ResourceAmount {
        self.inner.state.lock().clone()
    }
}

impl fmt::Debug for SimpleStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SimpleStorage")
            .field("variant", &state.variant)
            .field("amount", &state.amount)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuel::{fuels, SimpleFuelRegistry};
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fuel(name: &str) -> FuelVariant {
        SimpleFuelRegistry::legacy().get(name)
    }

    fn filled(name: &str, amount: u64) -> SimpleStorage {
        let storage = SimpleStorage::new();
        let mut tx = Transaction::open_outer();
        assert_eq!(storage.insert(&fuel(name), amount, &mut tx), amount);
        tx.commit();
        storage
    }

    #[test]
    fn insert_into_empty_then_clamps_at_capacity() {
        let storage = SimpleStorage::new();
        let blaze = fuel(fuels::BLAZE_ROD);
        let mut tx = Transaction::open_outer();
        assert_eq!(storage.insert(&blaze, 1800, &mut tx), 1800);
        assert_eq!(storage.amount(), 1800);
        assert_eq!(storage.capacity(), 2400);
        assert_eq!(storage.insert(&blaze, 1800, &mut tx), 600);
        assert_eq!(storage.amount(), 2400);
        tx.commit();
        assert_eq!(storage.resource(), blaze);
    }

    #[test]
    fn smaller_variant_does_not_replace_larger_one() {
        let storage = filled(fuels::BLAZE_ROD, 1800);
        let mut tx = Transaction::open_outer();
        assert_eq!(storage.insert(&fuel(fuels::COAL), 1800, &mut tx), 600);
        tx.commit();
        assert_eq!(storage.resource(), fuel(fuels::BLAZE_ROD));
        assert_eq!(storage.amount(), 2400);
    }

    #[test]
    fn larger_variant_upgrades_the_slot() {
        let storage = filled(fuels::BLAZE_ROD, 1800);
        let lava = fuel(fuels::LAVA_BUCKET);
        let mut tx = Transaction::open_outer();
        assert_eq!(storage.insert(&lava, 1800, &mut tx), 1800);
        tx.commit();
        assert_eq!(storage.resource(), lava);
        assert_eq!(storage.amount(), 3600);
        assert_eq!(storage.capacity(), 20_000);
    }

    #[test]
    fn extraction_rules() {
        let cases = [
            (fuels::BLAZE_ROD, 1200, 1200, fuels::BLAZE_ROD, 600),
            (fuels::BLAZE_ROD, 2400, 1800, fuels::AIR, 0),
            (fuels::COAL, 1200, 1200, fuels::COAL, 600),
            (fuels::BOOKSHELF, 300, 300, fuels::BLAZE_ROD, 1500),
            (fuels::LAVA_BUCKET, 1200, 1200, fuels::BLAZE_ROD, 600),
        ];
        for (extracted, requested, released, remaining, left) in cases {
            let storage = filled(fuels::BLAZE_ROD, 1800);
            let mut tx = Transaction::open_outer();
            assert_eq!(
                storage.extract(&fuel(extracted), requested, &mut tx),
                released,
                "extracting {requested} {extracted}"
            );
            tx.commit();
            assert_eq!(storage.resource(), fuel(remaining), "after {extracted}");
            assert_eq!(storage.amount(), left, "after {extracted}");
        }
        let coal = filled(fuels::BLAZE_ROD, 1800);
        let mut tx = Transaction::open_outer();
        coal.extract(&fuel(fuels::COAL), 1200, &mut tx);
        tx.commit();
        assert_eq!(coal.capacity(), 1600);
    }

    #[test]
    fn abort_restores_contents() {
        let storage = filled(fuels::COAL, 400);
        {
            let mut tx = Transaction::open_outer();
            storage.insert(&fuel(fuels::LAVA_BUCKET), 5000, &mut tx);
            storage.extract(&fuel(fuels::STICK), 50, &mut tx);
        }
        assert_eq!(storage.contents(), ResourceAmount::new(fuel(fuels::COAL), 400));
    }

    #[test]
    fn operator_scales_capacity() {
        let storage = SimpleStorage::with_operator(|duration| duration / 2);
        let coal = fuel(fuels::COAL);
        let mut tx = Transaction::open_outer();
        assert_eq!(storage.insert(&coal, 1600, &mut tx), 1600);
        tx.commit();
        assert_eq!(storage.capacity(), 800);
        assert_eq!(storage.amount(), 800);
    }

    #[test]
    fn commit_hook_sees_committed_contents() {
        let seen = Arc::new(AtomicU64::new(0));
        let observer = Arc::clone(&seen);
        let storage = SimpleStorage::new().on_commit(move |contents| {
            observer.store(contents.amount, Ordering::Relaxed);
        });
        let mut tx = Transaction::open_outer();
        storage.insert(&fuel(fuels::COAL), 700, &mut tx);
        assert_eq!(seen.load(Ordering::Relaxed), 0);
        tx.commit();
        assert_eq!(seen.load(Ordering::Relaxed), 700);
    }

    #[test]
    fn load_clamps_to_capacity() {
        let storage = SimpleStorage::new();
        storage.load(ResourceAmount::new(fuel(fuels::COAL), 5000));
        assert_eq!(storage.amount(), 1600);
        storage.load(ResourceAmount::BLANK);
        assert!(!storage.is_active());
    }

    #[test]
    #[should_panic(expected = "blank fuel variant")]
    fn blank_insert_panics() {
        let storage = SimpleStorage::new();
        let mut tx = Transaction::open_outer();
        storage.insert(&FuelVariant::BLANK, 10, &mut tx);
    }
}
