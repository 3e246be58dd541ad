//! Data-driven storage declarations.
//!
//! A declaration document names block kinds whose furnace storage is disabled
//! and binds further block-entity kinds to a [`DynamicFurnaceStorage`] over two
//! of their clock fields:
//!
//! ```toml
//! blacklist = ["soul_furnace"]
//!
//! [[dynamic_storage]]
//! type = "modded_furnace"
//! lit_time = "burn_time"
//! lit_duration = "fuel_length"
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{EntityKind, GridWorld, LookupContext};
use crate::error::{BurningError, Result};
use crate::storage::{BurningStorage, DynamicFurnaceStorage};
use crate::types::BlockPos;

/// A parsed declaration document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageDeclarations {
    /// Block kinds that must not expose a furnace storage.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Entity kinds to bind to a dynamic furnace storage.
    #[serde(default, rename = "dynamic_storage")]
    pub dynamic_storages: Vec<DynamicStorageDecl>,
}

/// Binds an entity kind to a furnace clock held in two of its fields.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DynamicStorageDecl {
    /// Entity kind name.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Field holding the ticks left.
    pub lit_time: String,
    /// Field holding the ticks the current fuel lasts.
    pub lit_duration: String,
}

impl StorageDeclarations {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Parses a JSON document using the same keys.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    fn validate(&self) -> Result<()> {
        if self.blacklist.iter().any(|name| name.is_empty()) {
            return Err(BurningError::Invalid("blacklisted block names must not be empty"));
        }
        let blank = self.dynamic_storages.iter().any(|decl| {
            decl.entity_type.is_empty() || decl.lit_time.is_empty() || decl.lit_duration.is_empty()
        });
        if blank {
            return Err(BurningError::Invalid("dynamic storage fields must not be empty"));
        }
        Ok(())
    }
}

/// What [`GridWorld::apply_declarations`] did with each declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeclarationReport {
    /// Entity kinds now served by a dynamic furnace storage.
    pub registered: Vec<EntityKind>,
    /// Entity kinds skipped because a provider was already registered.
    pub already_provided: Vec<EntityKind>,
    /// Entity kind names the world does not know.
    pub unknown: Vec<String>,
    /// Block kind names added to the blacklist.
    pub blacklisted: Vec<String>,
}

/// Hands out one storage per position, rebinding when the entity changes.
struct DynamicProvider {
    lit_time: String,
    lit_duration: String,
    bound: Mutex<FxHashMap<BlockPos, DynamicFurnaceStorage>>,
}

impl DynamicProvider {
    fn storage(&self, ctx: &LookupContext<'_>) -> Option<Arc<dyn BurningStorage>> {
        if ctx.block.is_some_and(|block| ctx.world.is_blacklisted(block)) {
            return None;
        }
        let entity = ctx.entity.as_ref()?;
        let (Some(lit_time), Some(lit_duration)) = (
            entity.clock_field(&self.lit_time),
            entity.clock_field(&self.lit_duration),
        ) else {
            debug!(
                kind = entity.kind().0,
                lit_time = %self.lit_time,
                lit_duration = %self.lit_duration,
                "world.dynamic_storage.missing_field"
            );
            return None;
        };
        let mut bound = self.bound.lock();
        let storage = bound
            .entry(ctx.pos)
            .and_modify(|storage| {
                if !storage.is_bound_to(&lit_time) {
                    *storage = DynamicFurnaceStorage::new(Arc::clone(&lit_time), Arc::clone(&lit_duration));
                }
            })
            .or_insert_with(|| DynamicFurnaceStorage::new(Arc::clone(&lit_time), Arc::clone(&lit_duration)));
        Some(Arc::new(storage.clone()))
    }
}

impl GridWorld {
    /// Applies a declaration document to this world's storage registry.
    ///
    /// The whole document is checked before anything is registered. Blacklist
    /// entries always apply; dynamic storages are registered per entity kind
    /// unless the kind is unknown or already has an entity provider.
    pub fn apply_declarations(&self, declarations: &StorageDeclarations) -> Result<DeclarationReport> {
        declarations.validate()?;
        let mut report = DeclarationReport::default();

        for name in &declarations.blacklist {
            self.blacklist_block(name);
            report.blacklisted.push(name.clone());
        }

        for decl in &declarations.dynamic_storages {
            let Some(kind) = self.resolve_entity_kind(&decl.entity_type) else {
                warn!(kind = %decl.entity_type, "world.dynamic_storage.unknown_kind");
                report.unknown.push(decl.entity_type.clone());
                continue;
            };
            if self.storages().has_entity_provider(kind) {
                debug!(kind = kind.0, "world.dynamic_storage.already_provided");
                report.already_provided.push(kind);
                continue;
            }
            let provider = Arc::new(DynamicProvider {
                lit_time: decl.lit_time.clone(),
                lit_duration: decl.lit_duration.clone(),
                bound: Mutex::new(FxHashMap::default()),
            });
            self.storages()
                .register_for_entities(move |ctx, _side| provider.storage(ctx), &[kind])?;
            report.registered.push(kind);
        }

        info!(
            registered = report.registered.len(),
            skipped = report.already_provided.len(),
            unknown = report.unknown.len(),
            blacklisted = report.blacklisted.len(),
            "world.declarations_applied"
        );
        Ok(report)
    }
}
