//! Provenance lookup and journal benchmarks.
//!
//! Neighbor notification propagates provenance to six positions per
//! notified block, so `propagate` sits on the hot path of every flush.
//!
//! Run with: `cargo bench --bench provenance_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use strata_provenance::journal::{ActionJournal, BlockAction};
use strata_provenance::table::{ProvenanceStore, TrackingRole};
use strata_world::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn populated_store(positions: i32) -> ProvenanceStore {
    let mut store = ProvenanceStore::new();
    let alex = Actor::new(ActorId(1), "alex");
    for x in 0..positions {
        store.track(BlockPos::new(x, 64, 0), &alex, TrackingRole::Owner);
    }
    store
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_to_neighbors");
    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut store = populated_store(count);
            b.iter(|| {
                for x in 0..count {
                    let pos = BlockPos::new(x, 64, 0);
                    for neighbor in pos.neighbors(None) {
                        black_box(store.propagate(pos, neighbor, TrackingRole::Notifier));
                    }
                }
            });
        });
    }
    group.finish();
}

fn bench_journal_queries(c: &mut Criterion) {
    let mut journal = ActionJournal::new();
    let alex = Actor::new(ActorId(1), "alex");
    for x in 0..10_000 {
        journal.record_block(BlockAction {
            world_id: WorldId(0),
            pos: BlockPos::new(x % 100, 64, x / 100),
            kind: if x % 2 == 0 { CaptureKind::Break } else { CaptureKind::Place },
            old: BlockState::of(BlockType::STONE),
            new: BlockState::AIR,
            actor: (x % 3 == 0).then(|| alex.clone()),
            tick: 1,
        });
    }

    c.bench_function("journal_actions_by_actor_10k", |b| {
        b.iter(|| black_box(journal.actions_by(ActorId(1)).count()));
    });
    c.bench_function("journal_actions_at_10k", |b| {
        b.iter(|| black_box(journal.actions_at(BlockPos::new(5, 64, 5)).count()));
    });
}

criterion_group!(benches, bench_propagate, bench_journal_queries);
criterion_main!(benches);
