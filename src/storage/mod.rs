//! Fuel storages: the transactional containers routed into by the planner.
//!
//! Every mutation happens inside a [`Transaction`]; implementations snapshot
//! their state on first touch and rely on the scope to restore it.

mod delegating;
mod dynamic;
mod furnace;
mod infinite;
mod relay;
mod simple;

pub use delegating::DelegatingStorage;
pub use dynamic::{ClockField, DynamicFurnaceStorage};
pub use furnace::{FurnaceKind, FurnaceStorage};
pub use infinite::InfiniteStorage;
pub use relay::RelayStorage;
pub use simple::{DurationOperator, SimpleStorage};

use crate::fuel::{FuelVariant, ResourceAmount};
use crate::transaction::Transaction;

/// A container of burn time that can be filled and drained transactionally.
pub trait BurningStorage: Send + Sync {
    /// Returns `false` when [`BurningStorage::insert`] can never accept anything.
    fn supports_insertion(&self) -> bool {
        true
    }

    /// Inserts up to `amount` of `variant`, returning the accepted amount.
    ///
    /// # Panics
    ///
    /// Panics when `variant` is blank.
    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64;

    /// Returns `false` when [`BurningStorage::extract`] can never release anything.
    fn supports_extraction(&self) -> bool {
        true
    }

    /// Extracts up to `amount` of `variant`, returning the released amount.
    ///
    /// # Panics
    ///
    /// Panics when `variant` is blank.
    fn extract(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64;

    /// Variant currently held.
    fn resource(&self) -> FuelVariant;

    /// Amount currently held.
    fn amount(&self) -> u64;

    /// Capacity for the variant currently held.
    fn capacity(&self) -> u64;

    /// Returns `true` while the storage holds a non-blank variant with a
    /// positive amount.
    fn is_active(&self) -> bool {
        !self.resource().is_blank() && self.amount() > 0
    }

    /// Returns `true` for storages that push insertions onward to their
    /// neighbours instead of holding them.
    fn forwards(&self) -> bool {
        false
    }

    /// Current `(variant, amount)` pair.
    fn contents(&self) -> ResourceAmount {
        ResourceAmount::new(self.resource(), self.amount())
    }
}

pub(crate) fn assert_not_blank(variant: &FuelVariant) {
    assert!(
        !variant.is_blank(),
        "cannot move the blank fuel variant in or out of a storage"
    );
}
