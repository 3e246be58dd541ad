//! In-memory grid world implementing [`Level`].
//!
//! Blocks are identified by a [`BlockKind`]; some positions also carry a
//! [`BlockEntity`]. Capabilities are resolved through two [`ApiLookup`]
//! registries, one for storages and one for propagators, each consulting block
//! providers first, then block-entity providers, then fallbacks.
//!
//! Further entity kinds can be bound to furnace-clock storages, and block kinds
//! excluded from exposing one, through [`StorageDeclarations`].

mod declarations;

pub use declarations::{DeclarationReport, DynamicStorageDecl, StorageDeclarations};

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::error::{BurningError, Result};
use crate::lookup::{FixedPropagator, Level, Propagator};
use crate::storage::{BurningStorage, ClockField, FurnaceKind, FurnaceStorage, RelayStorage};
use crate::types::{BlockPos, Direction};

/// Kind of a block, e.g. `"furnace"`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BlockKind(pub &'static str);

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Kind of a block entity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct EntityKind(pub &'static str);

/// Stateful companion of a block.
///
/// Entities that expose a storage or a propagator override the matching
/// method; the world's default fallbacks route lookups to them.
pub trait BlockEntity: Send + Sync {
    /// Entity kind, used to pick entity providers.
    fn kind(&self) -> EntityKind;

    /// Storage this entity exposes on `side`.
    fn burning_storage(&self, side: Option<Direction>) -> Option<Arc<dyn BurningStorage>> {
        let _ = side;
        None
    }

    /// Propagator this entity exposes on `side`.
    fn burning_propagator(&self, side: Option<Direction>) -> Option<Arc<dyn Propagator>> {
        let _ = side;
        None
    }

    /// Numeric field called `name`, for storages declared over this entity.
    fn clock_field(&self, name: &str) -> Option<ClockField> {
        let _ = name;
        None
    }

    /// Advances the entity by one world tick.
    fn tick(&self) {}
}

/// Everything a provider may inspect to answer a lookup.
pub struct LookupContext<'w> {
    /// The world being queried.
    pub world: &'w GridWorld,
    /// Queried position.
    pub pos: BlockPos,
    /// Block at the position, if any.
    pub block: Option<BlockKind>,
    /// Entity at the position, if any.
    pub entity: Option<Arc<dyn BlockEntity>>,
}

/// Answers a lookup for one capability.
pub type Provider<A> = Arc<dyn Fn(&LookupContext<'_>, Option<Direction>) -> Option<A> + Send + Sync>;

/// Registry of providers for one capability `A`.
pub struct ApiLookup<A> {
    name: &'static str,
    blocks: RwLock<FxHashMap<BlockKind, Provider<A>>>,
    entities: RwLock<FxHashMap<EntityKind, Provider<A>>>,
    fallbacks: RwLock<Vec<Provider<A>>>,
}

impl<A> ApiLookup<A> {
    /// Creates an empty registry.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            blocks: RwLock::new(FxHashMap::default()),
            entities: RwLock::new(FxHashMap::default()),
            fallbacks: RwLock::new(Vec::new()),
        }
    }

    /// Registers `provider` for every kind in `kinds`.
    ///
    /// Fails without registering anything when `kinds` is empty or when one of
    /// them already has a provider.
    pub fn register_for_blocks<F>(&self, provider: F, kinds: &[BlockKind]) -> Result<()>
    where
        F: Fn(&LookupContext<'_>, Option<Direction>) -> Option<A> + Send + Sync + 'static,
    {
        register(self.name, &self.blocks, Arc::new(provider), kinds)
    }

    /// Registers `provider` for every entity kind in `kinds`.
    ///
    /// Fails without registering anything when `kinds` is empty or when one of
    /// them already has a provider.
    pub fn register_for_entities<F>(&self, provider: F, kinds: &[EntityKind]) -> Result<()>
    where
        F: Fn(&LookupContext<'_>, Option<Direction>) -> Option<A> + Send + Sync + 'static,
    {
        register(self.name, &self.entities, Arc::new(provider), kinds)
    }

    /// Appends a provider consulted when no block or entity provider answered.
    pub fn register_fallback<F>(&self, provider: F)
    where
        F: Fn(&LookupContext<'_>, Option<Direction>) -> Option<A> + Send + Sync + 'static,
    {
        self.fallbacks.write().push(Arc::new(provider));
    }

    /// Returns `true` when `kind` has a block provider.
    pub fn has_block_provider(&self, kind: BlockKind) -> bool {
        self.blocks.read().contains_key(&kind)
    }

    /// Returns `true` when `kind` has an entity provider.
    pub fn has_entity_provider(&self, kind: EntityKind) -> bool {
        self.entities.read().contains_key(&kind)
    }

    /// Resolves the capability for `ctx` on `side`.
    pub fn find(&self, ctx: &LookupContext<'_>, side: Option<Direction>) -> Option<A> {
        let block = ctx
            .block
            .and_then(|kind| self.blocks.read().get(&kind).cloned());
        if let Some(found) = block.and_then(|provider| provider(ctx, side)) {
            return Some(found);
        }
        let entity = ctx
            .entity
            .as_ref()
            .and_then(|entity| self.entities.read().get(&entity.kind()).cloned());
        if let Some(found) = entity.and_then(|provider| provider(ctx, side)) {
            return Some(found);
        }
        let fallbacks = self.fallbacks.read().clone();
        fallbacks.iter().find_map(|provider| provider(ctx, side))
    }
}

fn register<K, A>(
    lookup: &'static str,
    table: &RwLock<FxHashMap<K, Provider<A>>>,
    provider: Provider<A>,
    kinds: &[K],
) -> Result<()>
where
    K: Copy + Eq + std::hash::Hash + fmt::Debug,
{
    if kinds.is_empty() {
        return Err(BurningError::Invalid("at least one kind must be registered"));
    }
    let mut table = table.write();
    if let Some(taken) = kinds.iter().find(|kind| table.contains_key(*kind)) {
        warn!(lookup, kind = ?taken, "world.duplicate_provider");
        return Err(BurningError::Invalid("a provider is already registered for this kind"));
    }
    for kind in kinds {
        table.insert(*kind, Arc::clone(&provider));
    }
    Ok(())
}

/// The furnace block kinds.
pub mod blocks {
    use super::BlockKind;

    /// A plain furnace.
    pub const FURNACE: BlockKind = BlockKind("furnace");
    /// A smoker.
    pub const SMOKER: BlockKind = BlockKind("smoker");
    /// A blast furnace.
    pub const BLAST_FURNACE: BlockKind = BlockKind("blast_furnace");
}

/// Stock entity of the furnace blocks, carrying a [`FurnaceStorage`].
#[derive(Debug)]
pub struct FurnaceEntity {
    storage: FurnaceStorage,
}

impl FurnaceEntity {
    /// Creates an unlit furnace entity.
    pub fn new(kind: FurnaceKind) -> Arc<Self> {
        Arc::new(Self {
            storage: FurnaceStorage::new(kind),
        })
    }

    /// Block kind matching this furnace flavour.
    pub fn block_kind(&self) -> BlockKind {
        match self.storage.kind() {
            FurnaceKind::Furnace => blocks::FURNACE,
            FurnaceKind::Smoker => blocks::SMOKER,
            FurnaceKind::BlastFurnace => blocks::BLAST_FURNACE,
        }
    }

    /// The furnace's storage.
    pub fn storage(&self) -> &FurnaceStorage {
        &self.storage
    }
}

impl BlockEntity for FurnaceEntity {
    fn kind(&self) -> EntityKind {
        EntityKind(self.storage.kind().name())
    }

    fn burning_storage(&self, _side: Option<Direction>) -> Option<Arc<dyn BurningStorage>> {
        Some(Arc::new(self.storage.clone()))
    }

    fn tick(&self) {
        self.storage.tick();
    }
}

/// Sparse in-memory world.
///
/// Always handled through an `Arc`, so that providers can hand out storages
/// holding on to the world.
pub struct GridWorld {
    this: Weak<GridWorld>,
    blocks: RwLock<FxHashMap<BlockPos, BlockKind>>,
    entities: RwLock<FxHashMap<BlockPos, Arc<dyn BlockEntity>>>,
    storages: ApiLookup<Arc<dyn BurningStorage>>,
    propagators: ApiLookup<Arc<dyn Propagator>>,
    entity_kinds: RwLock<FxHashMap<&'static str, EntityKind>>,
    blacklist: RwLock<FxHashSet<String>>,
    rng: Mutex<ChaCha8Rng>,
}

impl GridWorld {
    /// Creates an empty world seeded from entropy.
    pub fn new() -> Arc<Self> {
        Self::build(ChaCha8Rng::from_entropy())
    }

    /// Creates an empty world whose shuffles are reproducible.
    pub fn with_seed(seed: u64) -> Arc<Self> {
        Self::build(ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(rng: ChaCha8Rng) -> Arc<Self> {
        let world = Arc::new_cyclic(|this| GridWorld {
            this: this.clone(),
            blocks: RwLock::new(FxHashMap::default()),
            entities: RwLock::new(FxHashMap::default()),
            storages: ApiLookup::new("burning_storage"),
            propagators: ApiLookup::new("burning_propagator"),
            entity_kinds: RwLock::new(FxHashMap::default()),
            blacklist: RwLock::new(FxHashSet::default()),
            rng: Mutex::new(rng),
        });
        for kind in [FurnaceKind::Furnace, FurnaceKind::Smoker, FurnaceKind::BlastFurnace] {
            world.register_entity_kind(EntityKind(kind.name()));
        }
        world.storages.register_fallback(|ctx, side| {
            if ctx.block.is_some_and(|block| ctx.world.is_blacklisted(block)) {
                return None;
            }
            ctx.entity
                .as_ref()
                .and_then(|entity| entity.burning_storage(side))
        });
        world.propagators.register_fallback(|ctx, side| {
            ctx.entity
                .as_ref()
                .and_then(|entity| entity.burning_propagator(side))
        });
        world
    }

    /// Strong handle to this world, `None` while it is being dropped.
    pub fn handle(&self) -> Option<Arc<GridWorld>> {
        self.this.upgrade()
    }

    /// Storage registry.
    pub fn storages(&self) -> &ApiLookup<Arc<dyn BurningStorage>> {
        &self.storages
    }

    /// Propagator registry.
    pub fn propagators(&self) -> &ApiLookup<Arc<dyn Propagator>> {
        &self.propagators
    }

    /// Makes `kind` resolvable by name in storage declarations.
    pub fn register_entity_kind(&self, kind: EntityKind) {
        self.entity_kinds.write().insert(kind.0, kind);
    }

    /// Entity kind registered under `name`.
    pub fn resolve_entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.entity_kinds.read().get(name).copied()
    }

    /// Stops blocks named `name` from exposing an entity's furnace storage.
    ///
    /// Block providers registered for the kind are unaffected.
    pub fn blacklist_block(&self, name: &str) {
        if self.blacklist.write().insert(name.to_owned()) {
            debug!(block = name, "world.blacklisted");
        }
    }

    /// Returns `true` when `kind` was blacklisted.
    pub fn is_blacklisted(&self, kind: BlockKind) -> bool {
        self.blacklist.read().contains(kind.0)
    }

    /// Places a block, removing any entity that was there.
    pub fn set_block(&self, pos: BlockPos, kind: BlockKind) {
        self.blocks.write().insert(pos, kind);
        self.entities.write().remove(&pos);
    }

    /// Attaches an entity to the block at `pos`.
    pub fn set_entity(&self, pos: BlockPos, entity: Arc<dyn BlockEntity>) {
        self.entities.write().insert(pos, entity);
    }

    /// Places a furnace block together with its entity.
    pub fn place_furnace(&self, pos: BlockPos, kind: FurnaceKind) -> Arc<FurnaceEntity> {
        let entity = FurnaceEntity::new(kind);
        self.set_block(pos, entity.block_kind());
        self.set_entity(pos, entity.clone());
        entity
    }

    /// Clears a position, returning the block that was there.
    pub fn remove(&self, pos: BlockPos) -> Option<BlockKind> {
        self.entities.write().remove(&pos);
        self.blocks.write().remove(&pos)
    }

    /// Block at `pos`.
    pub fn block_at(&self, pos: BlockPos) -> Option<BlockKind> {
        self.blocks.read().get(&pos).copied()
    }

    /// Entity at `pos`.
    pub fn entity_at(&self, pos: BlockPos) -> Option<Arc<dyn BlockEntity>> {
        self.entities.read().get(&pos).cloned()
    }

    /// Ticks every entity once.
    pub fn tick(&self) {
        let entities: Vec<_> = self.entities.read().values().cloned().collect();
        for entity in entities {
            entity.tick();
        }
    }

    /// Turns `kinds` into relay blocks: each one exposes a [`RelayStorage`] and
    /// propagates in every direction.
    pub fn register_relay_blocks(&self, kinds: &[BlockKind]) -> Result<()> {
        self.storages.register_for_blocks(
            |ctx, _side| {
                let level: Arc<dyn Level> = ctx.world.handle()?;
                Some(Arc::new(RelayStorage::new(level, ctx.pos)) as Arc<dyn BurningStorage>)
            },
            kinds,
        )?;
        self.propagators.register_for_blocks(
            |_ctx, _side| Some(Arc::new(FixedPropagator::ALL) as Arc<dyn Propagator>),
            kinds,
        )
    }

    fn context(&self, pos: BlockPos) -> LookupContext<'_> {
        LookupContext {
            world: self,
            pos,
            block: self.block_at(pos),
            entity: self.entity_at(pos),
        }
    }
}

impl Level for GridWorld {
    fn find_storage(&self, pos: BlockPos, side: Option<Direction>) -> Option<Arc<dyn BurningStorage>> {
        let ctx = self.context(pos);
        if ctx.block.is_none() && ctx.entity.is_none() {
            return None;
        }
        let found = self.storages.find(&ctx, side);
        trace!(%pos, found = found.is_some(), "world.find_storage");
        found
    }

    fn find_propagator(&self, pos: BlockPos, side: Option<Direction>) -> Option<Arc<dyn Propagator>> {
        let ctx = self.context(pos);
        if ctx.block.is_none() && ctx.entity.is_none() {
            return None;
        }
        self.propagators.find(&ctx, side)
    }

    fn next_seed(&self) -> u64 {
        self.rng.lock().next_u64()
    }
}

impl fmt::Debug for GridWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridWorld")
            .field("blocks", &self.blocks.read().len())
            .field("entities", &self.entities.read().len())
            .finish()
    }
}
