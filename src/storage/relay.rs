use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{assert_not_blank, BurningStorage};
use crate::fuel::FuelVariant;
use crate::lookup::{route_insert, Level};
use crate::transaction::Transaction;
use crate::types::{BlockPos, Direction};

/// Insertion-only storage that holds nothing itself and pushes every insertion
/// on to the storages around it.
///
/// Neighbours are visited in a shuffled order, each one offered whatever the
/// previous ones left over. Each neighbour is resolved on the face pointing
/// back at the relay. Forwarding goes through [`route_insert`], so under a
/// planning scope the relay only reports where it would have forwarded to.
/// Outside of one, it never forwards into another forwarding storage.
pub struct RelayStorage {
    level: Arc<dyn Level>,
    pos: BlockPos,
    rng: Mutex<ChaCha8Rng>,
}

impl RelayStorage {
    /// Creates a relay at `pos`, seeding its shuffle from the level.
    pub fn new(level: Arc<dyn Level>, pos: BlockPos) -> Self {
        let seed = level.next_seed();
        Self::with_seed(level, pos, seed)
    }

    /// Creates a relay at `pos` with a fixed shuffle seed.
    pub fn with_seed(level: Arc<dyn Level>, pos: BlockPos, seed: u64) -> Self {
        Self {
            level,
            pos,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Position of the relay.
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    fn shuffled_directions(&self) -> [Direction; 6] {
        let mut directions = Direction::ALL;
        directions.shuffle(&mut *self.rng.lock());
        directions
    }
}

impl BurningStorage for RelayStorage {
    fn insert(&self, variant: &FuelVariant, amount: u64, tx: &mut Transaction<'_>) -> u64 {
        assert_not_blank(variant);
        let recording = tx.recorder().is_some();
        let mut inserted = 0u64;
        for direction in self.shuffled_directions() {
            if inserted >= amount {
                break;
            }
            let neighbour = self.pos.relative(direction);
            let Some(storage) = self
                .level
                .find_storage(neighbour, Some(direction.opposite()))
            else {
                continue;
            };
            if !storage.supports_insertion() || (!recording && storage.forwards()) {
                continue;
            }
            inserted += route_insert(tx, neighbour, storage, variant, amount - inserted);
        }
        inserted
    }

    fn supports_extraction(&self) -> bool {
        false
    }

    fn extract(&self, _variant: &FuelVariant, _amount: u64, _tx: &mut Transaction<'_>) -> u64 {
        0
    }

    fn resource(&self) -> FuelVariant {
        FuelVariant::BLANK
    }

    fn amount(&self) -> u64 {
        0
    }

    fn capacity(&self) -> u64 {
        0
    }

    fn forwards(&self) -> bool {
        true
    }
}

impl fmt::Debug for RelayStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStorage").field("pos", &self.pos).finish()
    }
}
