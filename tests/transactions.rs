use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use burning::fuel::codec;
use burning::fuel::{fuels, SimpleFuelRegistry};
use burning::storage::{BurningStorage, FurnaceKind, FurnaceStorage, SimpleStorage};
use burning::transaction::TxState;
use burning::{BurningError, FuelVariant, ResourceAmount, Result, Transaction};
use tracing_subscriber::EnvFilter;

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

fn fuel(name: &str) -> FuelVariant {
    SimpleFuelRegistry::legacy().get(name)
}

fn filled(name: &str, amount: u64) -> SimpleStorage {
    let storage = SimpleStorage::new();
    let mut tx = Transaction::open_outer();
    storage.insert(&fuel(name), amount, &mut tx);
    tx.commit();
    storage
}

#[test]
fn abort_restores_every_touched_storage() {
    init_tracing();
    let a = filled(fuels::COAL, 400);
    let b = filled(fuels::BLAZE_ROD, 2400);
    let c = SimpleStorage::new();
    let before = [a.contents(), b.contents(), c.contents()];

    let mut tx = Transaction::open_outer();
    a.insert(&fuel(fuels::LAVA_BUCKET), 9000, &mut tx);
    b.extract(&fuel(fuels::COAL), 1000, &mut tx);
    {
        let mut nested = tx.open_nested();
        c.insert(&fuel(fuels::STICK), 100, &mut nested);
        a.extract(&fuel(fuels::LAVA_BUCKET), 100, &mut nested);
        nested.commit();
    }
    assert_eq!(tx.touched(), 3);
    tx.abort();

    assert_eq!([a.contents(), b.contents(), c.contents()], before);
}

#[test]
fn dropping_without_commit_is_an_abort() {
    init_tracing();
    let storage = filled(fuels::COAL, 100);
    {
        let mut tx = Transaction::open_outer();
        storage.insert(&fuel(fuels::COAL), 1000, &mut tx);
        assert_eq!(storage.amount(), 1100);
    }
    assert_eq!(storage.amount(), 100);
}

#[test]
fn nested_abort_keeps_outer_changes() {
    init_tracing();
    let storage = SimpleStorage::new();
    let coal = fuel(fuels::COAL);
    let mut tx = Transaction::open_outer();
    storage.insert(&coal, 300, &mut tx);
    {
        let mut nested = tx.open_nested();
        storage.insert(&coal, 300, &mut nested);
        assert_eq!(storage.amount(), 600);
    }
    assert_eq!(storage.amount(), 300);
    tx.commit();
    assert_eq!(storage.amount(), 300);
}

#[test]
fn oldest_snapshot_wins_across_nested_commits() {
    init_tracing();
    let storage = filled(fuels::COAL, 200);
    let coal = fuel(fuels::COAL);
    let mut tx = Transaction::open_outer();
    {
        let mut first = tx.open_nested();
        storage.insert(&coal, 200, &mut first);
        {
            let mut second = first.open_nested();
            storage.insert(&coal, 200, &mut second);
            second.commit();
        }
        first.commit();
    }
    {
        let mut third = tx.open_nested();
        storage.extract(&coal, 500, &mut third);
        third.commit();
    }
    assert_eq!(storage.amount(), 100);
    tx.abort();
    assert_eq!(storage.amount(), 200);
}

#[test]
fn final_commit_fires_once_per_outer_commit() {
    init_tracing();
    let furnace = FurnaceStorage::new(FurnaceKind::Furnace);
    let commits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&commits);
    let simple = SimpleStorage::new().on_commit(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let coal = fuel(fuels::COAL);

    let mut tx = Transaction::open_outer();
    for _ in 0..4 {
        let mut nested = tx.open_nested();
        furnace.insert(&coal, 100, &mut nested);
        simple.insert(&coal, 100, &mut nested);
        nested.commit();
    }
    assert_eq!(furnace.changes(), 0);
    tx.commit();

    assert_eq!(furnace.changes(), 1);
    assert!(furnace.is_lit());
    assert_eq!(commits.load(Ordering::Relaxed), 1);
    assert_eq!(furnace.amount(), 400);
    assert_eq!(simple.amount(), 400);
}

#[test]
fn aborted_scope_fires_no_side_effects() {
    init_tracing();
    let furnace = FurnaceStorage::new(FurnaceKind::Smoker);
    let mut tx = Transaction::open_outer();
    {
        let mut nested = tx.open_nested();
        furnace.insert(&fuel(fuels::COAL), 400, &mut nested);
        nested.commit();
    }
    tx.abort();
    assert_eq!(furnace.changes(), 0);
    assert!(!furnace.is_lit());
    assert_eq!(furnace.amount(), 0);
}

#[test]
fn one_outer_scope_per_thread() {
    init_tracing();
    let tx = Transaction::open_outer();
    assert!(matches!(
        Transaction::try_open_outer(),
        Err(BurningError::Invalid(_))
    ));
    let handle = std::thread::spawn(|| {
        let other = Transaction::try_open_outer().map(|tx| tx.state());
        other.ok()
    });
    assert_eq!(handle.join().unwrap(), Some(TxState::Active));
    tx.commit();
    assert!(!Transaction::is_open());
}

#[test]
fn optional_parent_selects_the_scope() {
    init_tracing();
    let storage = SimpleStorage::new();
    let coal = fuel(fuels::COAL);

    fn insert_some(storage: &SimpleStorage, coal: &FuelVariant, parent: Option<&mut Transaction<'_>>) -> u64 {
        let mut tx = Transaction::open_nested_or_outer(parent);
        let inserted = storage.insert(coal, 250, &mut tx);
        tx.commit();
        inserted
    }

    assert_eq!(insert_some(&storage, &coal, None), 250);
    assert_eq!(storage.amount(), 250);

    let mut outer = Transaction::open_outer();
    assert_eq!(insert_some(&storage, &coal, Some(&mut outer)), 250);
    assert_eq!(storage.amount(), 500);
    outer.abort();
    assert_eq!(storage.amount(), 250);
}

#[test]
fn persisted_contents_survive_a_round_trip() -> Result<()> {
    init_tracing();
    let registry = SimpleFuelRegistry::legacy();
    let storage = filled(fuels::BLAZE_ROD, 1800);
    let json = codec::to_json(&storage.contents())?;

    let restored = SimpleStorage::new();
    restored.load(codec::from_json(registry, &json)?);
    assert_eq!(restored.contents(), storage.contents());

    let stale = codec::from_json(registry, r#"{"fuel":"peat","amount":40}"#)?;
    assert_eq!(stale, ResourceAmount::BLANK);
    Ok(())
}

#[test]
fn scaled_storage_survives_a_round_trip() -> Result<()> {
    init_tracing();
    let registry = SimpleFuelRegistry::legacy();
    let storage = SimpleStorage::with_operator(|duration| duration * 2);
    let mut tx = Transaction::open_outer();
    storage.insert(&fuel(fuels::COAL), 1500, &mut tx);
    tx.commit();
    assert_eq!(storage.amount(), 3000);

    let json = codec::to_json(&storage.contents())?;
    let restored = SimpleStorage::with_operator(|duration| duration * 2);
    restored.load(codec::from_json(registry, &json)?);
    assert_eq!(restored.contents(), storage.contents());

    let plain = SimpleStorage::new();
    plain.load(codec::from_json(registry, &json)?);
    assert_eq!(plain.amount(), 1600);
    Ok(())
}

#[test]
fn final_commit_hooks_may_open_a_new_outer_scope() {
    init_tracing();
    let coal = fuel(fuels::COAL);
    let mirror = SimpleStorage::new();
    let target = mirror.clone();
    let hook_coal = coal.clone();
    let storage = SimpleStorage::new().on_commit(move |contents| {
        let mut tx = Transaction::try_open_outer().expect("outer scope closed before hooks run");
        target.insert(&hook_coal, contents.amount, &mut tx);
        tx.commit();
    });

    let mut tx = Transaction::open_outer();
    storage.insert(&coal, 700, &mut tx);
    tx.commit();

    assert_eq!(mirror.amount(), 700);
    assert!(!Transaction::is_open());
    let next = Transaction::try_open_outer();
    assert!(next.is_ok());
}
