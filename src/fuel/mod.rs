//! Fuel identities, variants and the registry that assigns them burn durations.
//!
//! A [`FuelVariant`] pairs a fuel identity with its burn duration, which doubles
//! as the capacity of any storage holding that variant. [`FuelVariant::BLANK`]
//! is the "no fuel" sentinel every storage reverts to once drained.

pub mod codec;

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;

/// Interned identifier of a fuel kind, e.g. `"coal"`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FuelId(Arc<str>);

impl FuelId {
    /// Creates an identifier from its name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FuelId {
    fn from(value: &str) -> Self {
        FuelId::new(value)
    }
}

impl From<String> for FuelId {
    fn from(value: String) -> Self {
        FuelId::new(value)
    }
}

impl Borrow<str> for FuelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FuelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FuelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuelId({})", self.0)
    }
}

/// Well-known fuel names of the legacy table.
pub mod fuels {
    /// 20000 ticks.
    pub const LAVA_BUCKET: &str = "lava_bucket";
    /// 16000 ticks.
    pub const COAL_BLOCK: &str = "coal_block";
    /// 4001 ticks.
    pub const DRIED_KELP_BLOCK: &str = "dried_kelp_block";
    /// 2400 ticks.
    pub const BLAZE_ROD: &str = "blaze_rod";
    /// 1600 ticks.
    pub const COAL: &str = "coal";
    /// 1600 ticks.
    pub const CHARCOAL: &str = "charcoal";
    /// 1200 ticks.
    pub const BOAT: &str = "boat";
    /// 300 ticks.
    pub const BOOKSHELF: &str = "bookshelf";
    /// 300 ticks.
    pub const PLANKS: &str = "planks";
    /// 100 ticks.
    pub const STICK: &str = "stick";
    /// Not a fuel.
    pub const AIR: &str = "air";
}

/// A fuel kind together with its burn duration.
///
/// The burn duration is the capacity of a storage indexed by this variant.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FuelVariant {
    fuel: Option<FuelId>,
    duration: u32,
}

impl FuelVariant {
    /// The "no fuel" sentinel: no identity, zero duration.
    pub const BLANK: FuelVariant = FuelVariant {
        fuel: None,
        duration: 0,
    };

    /// Builds a variant; a zero duration yields [`FuelVariant::BLANK`].
    pub fn new(fuel: impl Into<FuelId>, duration: u32) -> Self {
        if duration == 0 {
            return Self::BLANK;
        }
        Self {
            fuel: Some(fuel.into()),
            duration,
        }
    }

    /// Fuel identity, `None` for the blank variant.
    pub fn fuel(&self) -> Option<&FuelId> {
        self.fuel.as_ref()
    }

    /// Burn duration of one unit of this fuel.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Returns `true` for [`FuelVariant::BLANK`].
    pub fn is_blank(&self) -> bool {
        self.fuel.is_none()
    }
}

impl Default for FuelVariant {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Display for FuelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fuel {
            Some(fuel) => write!(f, "{fuel}[{}]", self.duration),
            None => f.write_str("blank"),
        }
    }
}

/// A `(variant, amount)` pair: the full observable state of a single-slot storage.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ResourceAmount {
    /// Variant currently held.
    pub variant: FuelVariant,
    /// Amount held, in units of the variant's duration.
    pub amount: u64,
}

impl ResourceAmount {
    /// Empty storage state.
    pub const BLANK: ResourceAmount = ResourceAmount {
        variant: FuelVariant::BLANK,
        amount: 0,
    };

    /// Builds a pair.
    pub fn new(variant: FuelVariant, amount: u64) -> Self {
        Self { variant, amount }
    }

    /// Returns `true` when nothing is held.
    pub fn is_blank(&self) -> bool {
        self.variant.is_blank() || self.amount == 0
    }
}

/// Resource-registry collaborator: decides what burns and for how long.
pub trait FuelRegistry: Send + Sync {
    /// Burn duration of `fuel`, or zero when it is not a fuel.
    fn burn_duration(&self, fuel: &FuelId) -> u32;

    /// Returns `true` when `fuel` has a positive burn duration.
    fn is_fuel(&self, fuel: &FuelId) -> bool {
        self.burn_duration(fuel) > 0
    }

    /// Resolves `fuel` into a variant, [`FuelVariant::BLANK`] when it does not burn.
    fn variant(&self, fuel: &FuelId) -> FuelVariant {
        FuelVariant::new(fuel.clone(), self.burn_duration(fuel))
    }
}

/// Map-backed [`FuelRegistry`].
#[derive(Clone, Debug, Default)]
pub struct SimpleFuelRegistry {
    values: FxHashMap<FuelId, u32>,
}

impl SimpleFuelRegistry {
    /// Creates a registry where nothing is fuel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a fuel, returning the registry for chaining.
    pub fn with(mut self, fuel: impl Into<FuelId>, duration: u32) -> Self {
        self.insert(fuel, duration);
        self
    }

    /// Adds or replaces a fuel. A zero duration removes it.
    pub fn insert(&mut self, fuel: impl Into<FuelId>, duration: u32) {
        let fuel = fuel.into();
        if duration == 0 {
            self.values.remove(&fuel);
        } else {
            self.values.insert(fuel, duration);
        }
    }

    /// Looks a fuel up by name.
    pub fn get(&self, name: &str) -> FuelVariant {
        match self.values.get_key_value(name) {
            Some((fuel, duration)) => FuelVariant::new(fuel.clone(), *duration),
            None => FuelVariant::BLANK,
        }
    }

    /// Number of registered fuels.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no fuel is registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shared instance carrying the classic furnace fuel table.
    pub fn legacy() -> &'static SimpleFuelRegistry {
        static LEGACY: OnceLock<SimpleFuelRegistry> = OnceLock::new();
        LEGACY.get_or_init(|| {
            SimpleFuelRegistry::new()
                .with(fuels::LAVA_BUCKET, 20_000)
                .with(fuels::COAL_BLOCK, 16_000)
                .with(fuels::DRIED_KELP_BLOCK, 4_001)
                .with(fuels::BLAZE_ROD, 2_400)
                .with(fuels::COAL, 1_600)
                .with(fuels::CHARCOAL, 1_600)
                .with(fuels::BOAT, 1_200)
                .with("hanging_sign", 800)
                .with("log", 300)
                .with(fuels::PLANKS, 300)
                .with(fuels::BOOKSHELF, 300)
                .with("chest", 300)
                .with("crafting_table", 300)
                .with("bow", 300)
                .with("crossbow", 300)
                .with("sign", 200)
                .with("wooden_door", 200)
                .with("wooden_pickaxe", 200)
                .with("wooden_slab", 150)
                .with(fuels::STICK, 100)
                .with("sapling", 100)
                .with("wool", 100)
                .with("bowl", 100)
                .with("carpet", 67)
                .with("bamboo", 50)
                .with("scaffolding", 50)
        })
    }
}

impl FuelRegistry for SimpleFuelRegistry {
    fn burn_duration(&self, fuel: &FuelId) -> u32 {
        self.values.get(fuel).copied().unwrap_or(0)
    }
}

/// Computes `value * numerator / denominator` truncated toward zero, saturating
/// at `u64::MAX`. A zero denominator yields zero.
pub(crate) fn rescale(value: u64, numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let scaled = u128::from(value) * u128::from(numerator) / u128::from(denominator);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}
