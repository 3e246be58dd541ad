#![forbid(unsafe_code)]

use std::ops::ControlFlow;
use std::sync::Arc;

use burning::fuel::{fuels, SimpleFuelRegistry};
use burning::storage::{BurningStorage, FurnaceKind};
use burning::world::{BlockKind, FurnaceEntity, GridWorld};
use burning::{BlockPos, InsertionPlanner, Level, PropagationGraph, RoutingOptions, Transaction};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const COPPER: BlockKind = BlockKind("waxed_copper_block");

struct RelayHarness {
    world: Arc<GridWorld>,
    centre: BlockPos,
    furnaces: Vec<Arc<FurnaceEntity>>,
}

impl RelayHarness {
    /// A solid relay cube of side `2 * radius + 1`, with a furnace against
    /// every block of its west face.
    fn new(radius: i32) -> Self {
        let world = GridWorld::with_seed(0x5eed);
        world.register_relay_blocks(&[COPPER]).expect("register relays");
        for x in -radius..=radius {
            for y in -radius..=radius {
                for z in -radius..=radius {
                    world.set_block(BlockPos::new(x, y, z), COPPER);
                }
            }
        }
        let mut furnaces = Vec::new();
        for y in -radius..=radius {
            for z in -radius..=radius {
                let pos = BlockPos::new(-radius - 1, y, z);
                furnaces.push(world.place_furnace(pos, FurnaceKind::Furnace));
            }
        }
        Self {
            world,
            centre: BlockPos::ORIGIN,
            furnaces,
        }
    }

    fn plan(&self, planner: &InsertionPlanner) -> u64 {
        let coal = SimpleFuelRegistry::legacy().get(fuels::COAL);
        let origin = self
            .world
            .find_storage(self.centre, None)
            .expect("relay at centre");
        let mut tx = Transaction::open_outer();
        let inserted = planner.plan_insert(
            self.centre,
            &|tx: &mut Transaction<'_>| origin.insert(&coal, 1600, tx),
            &mut tx,
        );
        tx.abort();
        inserted
    }

    fn search(&self) -> usize {
        let graph = PropagationGraph::new(&*self.world, RoutingOptions::new().shuffle_seed(1));
        let mut found = 0;
        graph.search(self.centre, |_, _| {
            found += 1;
            ControlFlow::Continue(())
        });
        found
    }
}

fn plan_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner/relay_cube");
    group.sample_size(20);
    for radius in [1, 2, 3] {
        let harness = RelayHarness::new(radius);
        let planner = InsertionPlanner::new(RoutingOptions::new());
        group.throughput(Throughput::Elements(harness.furnaces.len() as u64));
        group.bench_with_input(BenchmarkId::new("plan_insert", radius), &radius, |b, _| {
            b.iter(|| black_box(harness.plan(&planner)));
        });
        group.bench_with_input(BenchmarkId::new("search", radius), &radius, |b, _| {
            b.iter(|| black_box(harness.search()));
        });
    }
    group.finish();
}

criterion_group!(benches, plan_insert);
criterion_main!(benches);
