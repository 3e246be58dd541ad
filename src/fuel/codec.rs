//! Record format for persisting a storage's `(variant, amount)` pair.
//!
//! Only the fuel identity and the amount are written; the duration is resolved
//! again through a [`FuelRegistry`] on decode. A fuel that no longer resolves
//! degrades to [`ResourceAmount::BLANK`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FuelId, FuelRegistry, FuelVariant, ResourceAmount};
use crate::error::Result;

/// Serialized form of a [`ResourceAmount`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StoredAmount {
    /// Fuel identity, absent for the blank variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    /// Stored amount.
    #[serde(default)]
    pub amount: u64,
}

/// Converts a live pair into its record form.
pub fn encode(value: &ResourceAmount) -> StoredAmount {
    match value.variant.fuel() {
        Some(fuel) if value.amount > 0 => StoredAmount {
            fuel: Some(fuel.as_str().to_owned()),
            amount: value.amount,
        },
        _ => StoredAmount::default(),
    }
}

/// Rebuilds a pair from its record form.
///
/// Unknown fuels degrade to blank. The amount is kept as written: only the
/// storage receiving it knows its capacity, so clamping is left to
/// [`crate::storage::SimpleStorage::load`].
pub fn decode(registry: &dyn FuelRegistry, record: &StoredAmount) -> ResourceAmount {
    let Some(name) = record.fuel.as_deref() else {
        return ResourceAmount::BLANK;
    };
    let variant = registry.variant(&FuelId::from(name));
    if variant.is_blank() {
        debug!(fuel = name, amount = record.amount, "codec.unknown_fuel");
        return ResourceAmount::BLANK;
    }
    if record.amount == 0 {
        return ResourceAmount::BLANK;
    }
    ResourceAmount::new(variant, record.amount)
}

/// Encodes a pair as a JSON document.
pub fn to_json(value: &ResourceAmount) -> Result<String> {
    Ok(serde_json::to_string(&encode(value))?)
}

/// Decodes a pair from a JSON document.
pub fn from_json(registry: &dyn FuelRegistry, json: &str) -> Result<ResourceAmount> {
    let record: StoredAmount = serde_json::from_str(json)?;
    Ok(decode(registry, &record))
}

impl From<&ResourceAmount> for StoredAmount {
    fn from(value: &ResourceAmount) -> Self {
        encode(value)
    }
}

impl FuelVariant {
    /// Resolves a persisted fuel name, degrading to blank when it does not burn.
    pub fn from_name(registry: &dyn FuelRegistry, name: &str) -> FuelVariant {
        let variant = registry.variant(&FuelId::from(name));
        if variant.is_blank() {
            debug!(fuel = name, "codec.unknown_fuel");
        }
        variant
    }
}
