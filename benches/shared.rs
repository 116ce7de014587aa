#![allow(dead_code)]

//! Shared benchmark utilities: deterministic data generation and tree building.

use mbrtree::rtree::RTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const BENCH_NUM_ITEMS: usize = 2_000;
pub const BENCH_CAPACITY: usize = 16;

pub fn bench_boxes(n: usize) -> Vec<([f64; 2], [f64; 2])> {
    let mut rng = StdRng::seed_from_u64(1);
    (0..n)
        .map(|_| {
            let cx = rng.gen_range(-170.0..170.0);
            let cy = rng.gen_range(-80.0..80.0);
            let w = rng.gen_range(0.0..5.0);
            let h = rng.gen_range(0.0..5.0);
            ([cx - w / 2.0, cy - h / 2.0], [cx + w / 2.0, cy + h / 2.0])
        })
        .collect()
}

pub fn build_tree(boxes: &[([f64; 2], [f64; 2])]) -> RTree<usize, 2> {
    let mut tree: RTree<usize, 2> = RTree::new(BENCH_CAPACITY).unwrap();
    for (i, (min, max)) in boxes.iter().enumerate() {
        tree.insert(*min, *max, i);
    }
    tree
}
