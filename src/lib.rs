//! Transactional fuel routing across a grid of storages.
//!
//! Storages of burn time sit at block positions. A bounded breadth-first
//! search ([`graph::PropagationGraph`]) finds the storages reachable through
//! propagator blocks, and [`planner::InsertionPlanner`] speculatively tries an
//! insertion against every candidate under throwaway nested
//! [`transaction::Transaction`] scopes before committing the best one.

#![warn(missing_docs)]

pub mod error;
pub mod fuel;
pub mod graph;
pub mod lookup;
pub mod metrics;
pub mod options;
pub mod planner;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod world;

pub use error::{BurningError, Result};
pub use fuel::{FuelId, FuelRegistry, FuelVariant, ResourceAmount, SimpleFuelRegistry};
pub use graph::{PropagationGraph, SearchStats, SearchVisit};
pub use lookup::{route_insert, Level, Propagator};
pub use options::RoutingOptions;
pub use planner::InsertionPlanner;
pub use storage::BurningStorage;
pub use transaction::Transaction;
pub use types::{BlockPos, Direction, DirectionSet};
pub use world::GridWorld;
