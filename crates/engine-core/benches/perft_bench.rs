//! Move generator throughput via perft.

use criterion::{criterion_group, criterion_main, Criterion};

use engine_core::movegen::perft;
use engine_core::Position;

fn perft_startpos(c: &mut Criterion) {
    let pos = Position::startpos();
    c.bench_function("perft startpos d4", |b| b.iter(|| perft(&pos, 4)));
}

fn perft_kiwipete(c: &mut Criterion) {
    let pos = Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -")
        .unwrap();
    c.bench_function("perft kiwipete d3", |b| b.iter(|| perft(&pos, 3)));
}

criterion_group!(benches, perft_startpos, perft_kiwipete);
criterion_main!(benches);
