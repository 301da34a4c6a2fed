use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use mesh_pyramid::algs::compile::{CommitOptions, compile};
use mesh_pyramid::algs::meshgen::hex_block;
use mesh_pyramid::algs::pyramid::PyramidPlanner;
use mesh_pyramid::algs::selection::{CellLookup, resolve};
use mesh_pyramid::geometry::cell_centres_and_volumes;

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyramid-split");

    for &n in &[4usize, 8, 16] {
        let mesh = hex_block(n, n, n, [1.0; 3]).unwrap();
        let (centres, _) = cell_centres_and_volumes(&mesh);
        // every other cell, so neighbouring pyramids share faces too
        let raw: Vec<i64> = (0..mesh.n_cells() as i64).step_by(2).collect();
        let selection = CellLookup::from_raw_ids(&raw);
        let resolution = resolve(Some(&selection), &centres);

        group.bench_with_input(BenchmarkId::new("plan", n), &n, |b, _| {
            b.iter(|| {
                let mut planner = PyramidPlanner::new(&mesh);
                planner.set_refinement(black_box(&resolution.map)).unwrap();
                black_box(planner.ledger().len())
            })
        });

        let mut planner = PyramidPlanner::new(&mesh);
        planner.set_refinement(&resolution.map).unwrap();
        let ledger = planner.ledger().clone();
        group.bench_with_input(BenchmarkId::new("compile", n), &n, |b, _| {
            b.iter(|| {
                let (out, _) =
                    compile(&mesh, black_box(&ledger), &CommitOptions::default()).unwrap();
                black_box(out.n_cells())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_split);
criterion_main!(benches);
