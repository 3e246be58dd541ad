use super::{assert_not_blank, BurningStorage};
use crate::fuel::FuelVariant;
use crate::transaction::Transaction;

/// A bottomless source: refuses every insertion and satisfies every extraction
/// in full. Stateless, so it never touches the transaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct InfiniteStorage;

impl InfiniteStorage {
    /// Shared instance.
    pub const INSTANCE: InfiniteStorage = InfiniteStorage;
}

impl BurningStorage for InfiniteStorage {
    fn supports_insertion(&self) -> bool {
        false
    }

    fn insert(&self, variant: &FuelVariant, _amount: u64, _tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        0
    }

    fn extract(&self, variant: &FuelVariant, amount: u64, _tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        amount
    }

    fn resource(&self) -> FuelVariant {
        FuelVariant::BLANK
    }

    fn amount(&self) -> u64 {
        u64::MAX
    }

    fn capacity(&self) -> u64 {
        u64::MAX
    }

    fn is_active(&self) -> bool {
        true
    }
}
