use std::sync::Arc;

use super::{assert_not_blank, BurningStorage};
use crate::fuel::FuelVariant;
use crate::transaction::Transaction;

type Validity = Arc<dyn Fn() -> bool + Send + Sync>;

/// Forwards every call to a backing storage while a validity predicate holds.
///
/// Once the predicate fails the storage reads as empty and accepts nothing.
#[derive(Clone)]
pub struct DelegatingStorage {
    backing: Arc<dyn BurningStorage>,
    valid: Option<Validity>,
}

impl DelegatingStorage {
    /// Delegates unconditionally.
    pub fn new(backing: Arc<dyn BurningStorage>) -> Self {
        Self {
            backing,
            valid: None,
        }
    }

    /// Delegates only while `valid` returns `true`.
    pub fn with_validity(
        backing: Arc<dyn BurningStorage>,
        valid: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            backing,
            valid: Some(Arc::new(valid)),
        }
    }

    fn live(&self) -> Option<&dyn BurningStorage> {
        match &self.valid {
            Some(valid) if !valid() => None,
            _ => Some(self.backing.as_ref()),
        }
    }
}

impl BurningStorage for DelegatingStorage {
    fn supports_insertion(&self) -> bool {
        self.live().is_some_and(|backing| backing.supports_insertion())
    }

    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        self.live()
            .map_or(0, |backing| backing.insert(variant, amount, tx))
    }

    fn supports_extraction(&self) -> bool {
        self.live().is_some_and(|backing| backing.supports_extraction())
    }

    fn extract(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        self.live()
            .map_or(0, |backing| backing.extract(variant, amount, tx))
    }

    fn resource(&self) -> FuelVariant {
        self.live()
            .map_or(FuelVariant::BLANK, |backing| backing.resource())
    }

    fn amount(&self) -> u64 {
        self.live().map_or(0, |backing| backing.amount())
    }

    fn capacity(&self) -> u64 {
        self.live().map_or(0, |backing| backing.capacity())
    }

    fn is_active(&self) -> bool {
        self.live().is_some_and(|backing| backing.is_active())
    }

    fn forwards(&self) -> bool {
        self.live().is_some_and(|backing| backing.forwards())
    }
}
