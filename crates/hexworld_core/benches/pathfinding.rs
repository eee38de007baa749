//! Pathfinding and partition benchmarks for hexworld_core.
//!
//! Run with: `cargo bench -p hexworld_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hexworld_core::prelude::*;
use hexworld_test_utils::fixtures::{claim_all, flat_world};

const SIZE: u16 = 256;

/// A 256x256 world with staggered walls that force detours, owned by
/// player 0, with adult trees scattered on a coarse lattice.
fn maze_world() -> World {
    let mut world = flat_world(SIZE, SIZE);
    claim_all(&mut world, PlayerId(0));
    let size = i32::from(SIZE);
    for x in (16..size - 16).step_by(32) {
        let gap = if (x / 32) % 2 == 0 { 8 } else { size - 8 };
        for y in 0..size {
            if (y - gap).abs() > 2 {
                let _ = world.set_blocked(TilePos::new(x, y), true);
            }
        }
    }
    for y in (5..size).step_by(23) {
        for x in (7..size).step_by(19) {
            let pos = TilePos::new(x, y);
            if !world.occupancy().is_blocked(pos).unwrap_or(true) {
                let _ = world.add_object(pos, MapObject::Tree(TreeStage::Adult));
            }
        }
    }
    world
}

pub fn astar_benchmark(c: &mut Criterion) {
    let world = maze_world();
    let requester = Requester::free(PlayerId(0));
    let mut group = c.benchmark_group("astar");
    for &(name, goal) in &[
        ("short", TilePos::new(20, 20)),
        ("across", TilePos::new(250, 250)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &goal, |b, &goal| {
            b.iter(|| world.find_path(&requester, TilePos::new(2, 2), black_box(goal)));
        });
    }
    group.finish();
}

pub fn dijkstra_benchmark(c: &mut Criterion) {
    let world = maze_world();
    let requester = Requester::grounded(PlayerId(0));
    let targets = [
        TilePos::new(200, 40),
        TilePos::new(40, 200),
        TilePos::new(128, 128),
    ];
    c.bench_function("dijkstra_nearest_target", |b| {
        b.iter(|| world.find_nearest_target(&requester, TilePos::new(2, 2), black_box(&targets)));
    });
    c.bench_function("dijkstra_nearest_tree", |b| {
        b.iter(|| {
            world.find_nearest_matching(
                &requester,
                TilePos::new(128, 128),
                SearchType::CuttableTree,
                black_box(40),
            )
        });
    });
    c.bench_function("area_search_tree", |b| {
        b.iter(|| {
            world.find_in_area(
                &requester,
                TilePos::new(128, 128),
                black_box(30),
                SearchType::CuttableTree,
            )
        });
    });
}

pub fn partition_benchmark(c: &mut Criterion) {
    c.bench_function("wall_split_and_heal", |b| {
        let mut world = flat_world(SIZE, SIZE);
        claim_all(&mut world, PlayerId(0));
        let wall: Vec<TilePos> = (0..i32::from(SIZE)).map(|y| TilePos::new(128, y)).collect();
        b.iter(|| {
            for &pos in &wall {
                let _ = world.change_owner(pos, Some(PlayerId(1)));
            }
            for &pos in &wall {
                let _ = world.change_owner(pos, Some(PlayerId(0)));
            }
            black_box(world.run_correctors().map(|r| r.borders_flipped))
        });
    });
}

criterion_group!(benches, astar_benchmark, dijkstra_benchmark, partition_benchmark);
criterion_main!(benches);
