//! Steering-step throughput at various cell counts.

use criterion::{Criterion, criterion_group, criterion_main};
use glam::DVec2;
use mitos_core::world::Cell;
use mitos_core::world::physics::SteeringEngine;
use rustc_hash::FxHashMap;

fn build_world(cell_count: usize) -> (SteeringEngine, FxHashMap<String, Cell>) {
    let mut engine = SteeringEngine::new(2000.0, 2000.0);
    let mut cells = FxHashMap::default();
    for i in 0..cell_count {
        // Spread cells over a grid with a handful of owners so both the
        // spacing pass and the overlap pass have work to do.
        let cell = Cell {
            id: format!("cell-{i:04}"),
            player_id: format!("owner-{}", i % 8),
            position: DVec2::new(((i % 40) * 50) as f64, ((i / 40) * 50) as f64),
            radius: 20.0 + (i % 5) as f64 * 8.0,
            velocity: DVec2::ZERO,
            merge_ready_at: 0.0,
        };
        engine.add_cell(&cell);
        engine.set_target(&cell.id, DVec2::new(1000.0, 1000.0));
        cells.insert(cell.id.clone(), cell);
    }
    (engine, cells)
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("physics_step");
    for cell_count in [16, 64, 256] {
        group.bench_function(format!("{cell_count}_cells"), |b| {
            let (mut engine, mut cells) = build_world(cell_count);
            b.iter(|| {
                std::hint::black_box(engine.step(1.0 / 30.0, &mut cells));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
