use std::sync::{Arc, Once};

use burning::fuel::{fuels, SimpleFuelRegistry};
use burning::metrics::CounterMetrics;
use burning::storage::{BurningStorage, FurnaceKind};
use burning::world::{BlockKind, FurnaceEntity, GridWorld};
use burning::{BlockPos, FuelVariant, InsertionPlanner, Level, RoutingOptions, Transaction};
use tracing_subscriber::EnvFilter;

const COPPER: BlockKind = BlockKind("waxed_copper_block");
const CENTRE: BlockPos = BlockPos::new(4, 4, 4);

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("burning=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn coal() -> FuelVariant {
    SimpleFuelRegistry::legacy().get(fuels::COAL)
}

const FURNACE_POSITIONS: [BlockPos; 10] = [
    BlockPos::new(2, 3, 3),
    BlockPos::new(2, 3, 5),
    BlockPos::new(2, 4, 4),
    BlockPos::new(2, 5, 3),
    BlockPos::new(2, 5, 5),
    BlockPos::new(3, 2, 4),
    BlockPos::new(5, 2, 3),
    BlockPos::new(4, 3, 2),
    BlockPos::new(6, 5, 4),
    BlockPos::new(4, 6, 5),
];

struct Network {
    world: Arc<GridWorld>,
    furnaces: Vec<(BlockPos, Arc<FurnaceEntity>)>,
    target: BlockPos,
}

/// A relay cube surrounded by ten furnaces: the one at `target_index` holds
/// 400 coal, every other one 800.
fn setup_network(seed: u64, target_index: usize) -> Network {
    let world = GridWorld::with_seed(seed);
    world.register_relay_blocks(&[COPPER]).unwrap();
    for x in 3..=5 {
        for y in 3..=5 {
            for z in 3..=5 {
                world.set_block(BlockPos::new(x, y, z), COPPER);
            }
        }
    }

    let kinds = [FurnaceKind::Furnace, FurnaceKind::Smoker, FurnaceKind::BlastFurnace];
    let mut furnaces = Vec::new();
    for (index, pos) in FURNACE_POSITIONS.iter().enumerate() {
        let furnace = world.place_furnace(*pos, kinds[index % 3]);
        let base = if index == target_index { 400 } else { 800 };
        let mut tx = Transaction::open_outer();
        let storage = world.find_storage(*pos, None).unwrap();
        assert_eq!(storage.insert(&coal(), base, &mut tx), base);
        tx.commit();
        furnaces.push((*pos, furnace));
    }

    Network {
        world,
        furnaces,
        target: FURNACE_POSITIONS[target_index],
    }
}

fn assert_only_target_filled(network: &Network) {
    for (pos, furnace) in &network.furnaces {
        let expected = if *pos == network.target { 1600 } else { 800 };
        assert_eq!(furnace.storage().amount(), expected, "furnace at {pos}");
    }
}

#[test]
fn relay_cube_fills_the_emptiest_furnace() {
    init_tracing();
    let network = setup_network(42, 3);
    let origin = network.world.find_storage(CENTRE, None).unwrap();
    assert!(origin.forwards());

    let counters = Arc::new(CounterMetrics::default());
    let planner = InsertionPlanner::new(RoutingOptions::new().metrics(counters.clone()));
    let mut tx = Transaction::open_outer();
    let inserted = planner.plan_insert(
        CENTRE,
        &|tx: &mut Transaction<'_>| origin.insert(&coal(), 1600, tx),
        &mut tx,
    );
    assert_eq!(inserted, 1200);
    tx.commit();

    assert_only_target_filled(&network);
    let commits = counters
        .insertions_committed
        .load(std::sync::atomic::Ordering::Relaxed);
    assert_eq!(commits, 1);
}

#[test]
fn outcome_does_not_depend_on_shuffle_order() {
    init_tracing();
    for (seed, target_index) in [(1, 0), (2, 5), (3, 8), (4, 9)] {
        let network = setup_network(seed, target_index);
        let origin = network.world.find_storage(CENTRE, None).unwrap();
        let mut tx = Transaction::open_outer();
        let inserted = InsertionPlanner::default().plan_insert(
            CENTRE,
            &|tx: &mut Transaction<'_>| origin.insert(&coal(), 1600, tx),
            &mut tx,
        );
        tx.commit();
        assert_eq!(inserted, 1200, "seed {seed}");
        assert_only_target_filled(&network);
    }
}

#[test]
fn network_insert_picks_the_same_destination() {
    init_tracing();
    let network = setup_network(7, 6);
    let planner = InsertionPlanner::new(RoutingOptions::new().shuffle_seed(7));
    let mut tx = Transaction::open_outer();
    let inserted = planner.plan_network_insert(&*network.world, CENTRE, &coal(), 1600, &mut tx);
    assert_eq!(inserted, 1200);
    tx.commit();
    assert_only_target_filled(&network);
}

#[test]
fn aborting_the_outer_scope_discards_the_plan() {
    init_tracing();
    let network = setup_network(11, 2);
    let origin = network.world.find_storage(CENTRE, None).unwrap();
    let mut tx = Transaction::open_outer();
    let inserted = InsertionPlanner::default().plan_insert(
        CENTRE,
        &|tx: &mut Transaction<'_>| origin.insert(&coal(), 1600, tx),
        &mut tx,
    );
    assert_eq!(inserted, 1200);
    tx.abort();

    for (pos, furnace) in &network.furnaces {
        let expected = if *pos == network.target { 400 } else { 800 };
        assert_eq!(furnace.storage().amount(), expected);
        assert_eq!(furnace.storage().changes(), 1);
    }
}

#[test]
fn full_network_accepts_nothing() {
    init_tracing();
    let network = setup_network(13, 0);
    for (pos, _) in &network.furnaces {
        let storage = network.world.find_storage(*pos, None).unwrap();
        let mut tx = Transaction::open_outer();
        storage.insert(&coal(), 1600, &mut tx);
        tx.commit();
    }
    let origin = network.world.find_storage(CENTRE, None).unwrap();
    let mut tx = Transaction::open_outer();
    let inserted = InsertionPlanner::default().plan_insert(
        CENTRE,
        &|tx: &mut Transaction<'_>| origin.insert(&coal(), 1600, tx),
        &mut tx,
    );
    assert_eq!(inserted, 0);
    assert_eq!(tx.touched(), 0);
    tx.commit();
    for (_, furnace) in &network.furnaces {
        assert_eq!(furnace.storage().amount(), 1600);
    }
}

#[test]
fn planning_from_inside_a_plan_stays_consistent() {
    init_tracing();
    let network = setup_network(21, 4);
    let world = Arc::clone(&network.world);
    let inner_planner = InsertionPlanner::default();
    let nested = move |tx: &mut Transaction<'_>| {
        let origin = world.find_storage(CENTRE, None).unwrap();
        inner_planner.plan_insert(
            CENTRE,
            &|tx: &mut Transaction<'_>| origin.insert(&coal(), 1600, tx),
            tx,
        )
    };

    let mut tx = Transaction::open_outer();
    let inserted = InsertionPlanner::default().plan_insert(BlockPos::new(0, 0, 0), &nested, &mut tx);
    assert_eq!(inserted, 1200);
    tx.commit();
    assert_only_target_filled(&network);
}
