//! Lifecycle events with the `logging` feature enabled.
#![cfg(feature = "logging")]

use epoch_arena::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("epoch_arena=trace"))
        .with_test_writer()
        .try_init();
}

#[test]
fn lifecycle_runs_with_subscriber_installed() {
    init_tracing();

    let config = ArenaConfig::from_lookup(|key| {
        (key == "EPOCH_ARENA_TRACK_STATS").then(|| "1".to_string())
    })
    .unwrap();
    let mut arena = PoolAllocator::with_config(256, config).unwrap();

    arena.construct(String::from("logged")).unwrap();
    let checkpoint = arena.checkpoint();
    arena.allocate(32, 8).unwrap();
    arena.restore(checkpoint).unwrap();
    arena.reset();

    assert_eq!(arena.stats().resets, 1);
}
