use shared::*;

use mbrtree::exceptions::MbrTreeError;
use mbrtree::geometry::{Rect, SplitVolume};
use mbrtree::rtree::{Options, RTree};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

#[test]
fn test_empty_tree() {
    let tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    assert_eq!(tree.len(), 0);
    assert!(tree.is_empty());
    assert_eq!(tree.bounds(), ([0.0, 0.0], [0.0, 0.0]));
    let mut visited = 0;
    tree.search([-1.0, -1.0], [1.0, 1.0], |_, _, _| {
        visited += 1;
        true
    });
    tree.scan(|_, _, _| {
        visited += 1;
        true
    });
    assert_eq!(visited, 0);
    check_invariants(&tree);
}

#[test]
fn test_two_points() {
    let mut tree: RTree<&str, 2> = RTree::new(CAPACITY).unwrap();
    tree.insert([-115.0, 33.0], [-115.0, 33.0], "A");
    tree.insert([-113.0, 35.0], [-113.0, 35.0], "B");
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.bounds(), ([-115.0, 33.0], [-113.0, 35.0]));

    let mut found = Vec::new();
    tree.search([-116.0, 32.0], [-114.0, 34.0], |_, _, &name| {
        found.push(name);
        true
    });
    assert_eq!(found, vec!["A"]);

    assert!(tree.delete([-115.0, 33.0], [-115.0, 33.0], &"A"));
    assert!(!tree.delete([-115.0, 33.0], [-115.0, 33.0], &"A"));
    let mut found = Vec::new();
    tree.search([-116.0, 33.0], [-114.0, 34.0], |_, _, &name| {
        found.push(name);
        true
    });
    assert!(found.is_empty());
    assert_eq!(tree.len(), 1);
    check_invariants(&tree);
}

#[test]
fn test_delete_requires_exact_rect_and_payload() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    tree.insert([1.0, 1.0], [3.0, 3.0], 7);
    // Wrong payload, then a rectangle that merely overlaps the entry.
    assert!(!tree.delete([1.0, 1.0], [3.0, 3.0], &8));
    assert!(!tree.delete([1.0, 1.0], [2.0, 2.0], &7));
    assert_eq!(tree.len(), 1);
    assert!(tree.delete([1.0, 1.0], [3.0, 3.0], &7));
    assert!(tree.is_empty());
}

#[test]
fn test_random_points_insert_search_delete() {
    let points = random_points_2d(10_000, 7);
    let mut tree: RTree<usize, 2> = RTree::new(CAPACITY).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
        if (i + 1) % 2500 == 0 {
            check_invariants(&tree);
        }
    }
    assert_eq!(tree.len(), 10_000);

    let mut expect_min = [f64::INFINITY; 2];
    let mut expect_max = [f64::NEG_INFINITY; 2];
    for p in &points {
        for i in 0..2 {
            expect_min[i] = expect_min[i].min(p[i]);
            expect_max[i] = expect_max[i].max(p[i]);
        }
    }
    assert_eq!(tree.bounds(), (expect_min, expect_max));

    let (min, max) = tree.bounds();
    let mut seen = HashSet::new();
    tree.search(min, max, |_, _, &id| {
        assert!(seen.insert(id));
        true
    });
    assert_eq!(seen.len(), 10_000);

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(11));
    for (n, &i) in order.iter().enumerate() {
        assert!(tree.delete(points[i], points[i], &i));
        if (n + 1) % 2500 == 0 {
            check_invariants(&tree);
        }
    }
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.bounds(), ([0.0, 0.0], [0.0, 0.0]));
    check_invariants(&tree);
}

#[test]
fn test_box_search_matches_brute_force() {
    let boxes = random_boxes_2d(10_000, 21);
    let mut tree: RTree<usize, 2> = RTree::default();
    for (i, (min, max)) in boxes.iter().enumerate() {
        tree.insert(*min, *max, i);
    }
    check_invariants(&tree);

    let (min, max) = tree.bounds();
    let mut all = 0;
    tree.search(min, max, |_, _, _| {
        all += 1;
        true
    });
    assert_eq!(all, 10_000);

    let qmin = [-18.0, -9.0];
    let qmax = [18.0, 9.0];
    let mut found = HashSet::new();
    tree.search(qmin, qmax, |_, _, &id| {
        assert!(found.insert(id));
        true
    });
    let expected: HashSet<usize> = boxes
        .iter()
        .enumerate()
        .filter(|(_, (bmin, bmax))| boxes_intersect(&qmin, &qmax, bmin, bmax))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_nearby_yields_sorted_distances() {
    let points = random_points_2d(10_000, 33);
    let mut tree: RTree<usize, 2> = RTree::new(CAPACITY).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
    }
    let center = Rect::point([0.0, 0.0]);
    let mut last = f64::NEG_INFINITY;
    let mut yielded = 0;
    tree.nearby(
        |min, max, _| Rect::new(min, max).box_dist(&center),
        |_, _, _, dist| {
            assert!(dist >= last, "distances must be non-decreasing");
            last = dist;
            yielded += 1;
            true
        },
    );
    assert_eq!(yielded, 10_000);
}

#[test]
fn test_nearby_early_stop() {
    let points = random_points_2d(500, 35);
    let mut tree: RTree<usize, 2> = RTree::new(CAPACITY).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
    }
    let center = Rect::point([10.0, 10.0]);
    let mut yielded = 0;
    tree.nearby(
        |min, max, _| Rect::new(min, max).box_dist(&center),
        |_, _, _, _| {
            yielded += 1;
            yielded < 5
        },
    );
    assert_eq!(yielded, 5);
}

#[test]
fn test_search_and_scan_early_stop() {
    let points = random_points_2d(500, 39);
    let mut tree: RTree<usize, 2> = RTree::new(CAPACITY).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
    }
    let mut visited = 0;
    tree.scan(|_, _, _| {
        visited += 1;
        false
    });
    assert_eq!(visited, 1);
    let (min, max) = tree.bounds();
    visited = 0;
    tree.search(min, max, |_, _, _| {
        visited += 1;
        visited < 3
    });
    assert_eq!(visited, 3);
}

#[test]
fn test_replace_churn() {
    let mut rng = StdRng::seed_from_u64(45);
    let mut tree: RTree<usize, 2> = RTree::default();
    let mut live: Vec<([f64; 2], usize)> = Vec::new();
    for i in 0..10_000 {
        let p = [rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)];
        tree.insert(p, p, i);
        live.push((p, i));
    }
    let mut next_id = 10_000;
    for n in 0..10_000 {
        let slot = rng.gen_range(0..live.len());
        let (old_p, old_id) = live[slot];
        let new_p = [rng.gen_range(-180.0..180.0), rng.gen_range(-90.0..90.0)];
        assert!(tree.replace(old_p, old_p, &old_id, new_p, new_p, next_id));
        live[slot] = (new_p, next_id);
        next_id += 1;
        if (n + 1) % 2500 == 0 {
            check_invariants(&tree);
        }
    }
    assert_eq!(tree.len(), 10_000);

    let expected: HashSet<usize> = live.iter().map(|(_, id)| *id).collect();
    let mut scanned = HashSet::new();
    tree.scan(|_, _, &id| {
        assert!(scanned.insert(id));
        true
    });
    assert_eq!(scanned, expected);
}

#[test]
fn test_replace_miss_is_noop() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    tree.insert([1.0, 1.0], [1.0, 1.0], 1);
    assert!(!tree.replace([2.0, 2.0], [2.0, 2.0], &2, [3.0, 3.0], [3.0, 3.0], 3));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_copy_isolation() {
    let points = random_points_2d(100, 51);
    let mut tree: RTree<usize, 2> = RTree::new(CAPACITY).unwrap();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
    }
    let bounds_before = tree.bounds();

    let mut clone = tree.copy();
    for (i, p) in points.iter().enumerate().take(50) {
        assert!(clone.delete(*p, *p, &i));
    }

    let mut original_count = 0;
    tree.scan(|_, _, _| {
        original_count += 1;
        true
    });
    let mut clone_count = 0;
    clone.scan(|_, _, _| {
        clone_count += 1;
        true
    });
    assert_eq!(original_count, 100);
    assert_eq!(clone_count, 50);
    assert_eq!(tree.bounds(), bounds_before);
    check_invariants(&tree);
    check_invariants(&clone);

    // Mutating the original must not leak into the clone either.
    tree.insert([999.0, 999.0], [999.0, 999.0], 1000);
    assert_eq!(clone.len(), 50);
    let mut found_in_clone = false;
    clone.search([999.0, 999.0], [999.0, 999.0], |_, _, _| {
        found_in_clone = true;
        true
    });
    assert!(!found_in_clone);
}

#[test]
fn test_copy_of_copy() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    for i in 0..200 {
        let p = [i as f64, (i % 17) as f64];
        tree.insert(p, p, i);
    }
    let mut second = tree.copy();
    let mut third = second.copy();
    third.clear();
    assert_eq!(tree.len(), 200);
    assert_eq!(second.len(), 200);
    assert_eq!(third.len(), 0);
    for i in 0..200u32 {
        let p = [i as f64, (i % 17) as f64];
        assert!(second.delete(p, p, &i));
    }
    assert_eq!(tree.len(), 200);
    assert!(second.is_empty());
    check_invariants(&tree);
}

#[test]
fn test_clear() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    for i in 0..100 {
        tree.insert([i as f64, 0.0], [i as f64, 1.0], i);
    }
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.bounds(), ([0.0, 0.0], [0.0, 0.0]));
    check_invariants(&tree);
    // The tree is usable again after a clear.
    tree.insert([5.0, 5.0], [6.0, 6.0], 1);
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_unordered_spherical_configuration() {
    let opts = Options {
        max_entries: 8,
        min_entries: 2,
        ordered_leaves: false,
        ordered_branches: false,
        volume: SplitVolume::Spherical,
    };
    let boxes = random_boxes_2d(2_000, 61);
    let mut tree: RTree<usize, 2> = RTree::with_options(opts).unwrap();
    for (i, (min, max)) in boxes.iter().enumerate() {
        tree.insert(*min, *max, i);
    }
    check_invariants(&tree);

    let qmin = [-40.0, -20.0];
    let qmax = [12.0, 30.0];
    let mut found = HashSet::new();
    tree.search(qmin, qmax, |_, _, &id| {
        assert!(found.insert(id));
        true
    });
    let expected: HashSet<usize> = boxes
        .iter()
        .enumerate()
        .filter(|(_, (bmin, bmax))| boxes_intersect(&qmin, &qmax, bmin, bmax))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(found, expected);

    for (i, (min, max)) in boxes.iter().enumerate() {
        assert!(tree.delete(*min, *max, &i));
    }
    assert!(tree.is_empty());
}

#[test]
fn test_children_introspection() {
    let mut tree: RTree<u32, 2> = RTree::new(4).unwrap();
    let mut empty_roots = Vec::new();
    tree.children(None, &mut empty_roots);
    assert!(empty_roots.is_empty());
    drop(empty_roots);

    for i in 0..64 {
        let p = [(i % 8) as f64, (i / 8) as f64];
        tree.insert(p, p, i);
    }
    let mut roots = Vec::new();
    tree.children(None, &mut roots);
    assert_eq!(roots.len(), 1);
    assert!(!roots[0].is_item());
    assert_eq!((roots[0].min, roots[0].max), tree.bounds());
    check_invariants(&tree);
}

#[test]
fn test_construction_errors() {
    assert!(matches!(
        RTree::<u32, 2>::new(3),
        Err(MbrTreeError::InvalidCapacity { .. })
    ));
    assert!(matches!(
        RTree::<u32, 0>::new(8),
        Err(MbrTreeError::InvalidDimension { dims: 0 })
    ));
    let opts = Options {
        max_entries: 8,
        min_entries: 5,
        ..Options::default()
    };
    assert!(matches!(
        RTree::<u32, 2>::with_options(opts),
        Err(MbrTreeError::InvalidCapacity { .. })
    ));
    assert!(RTree::<u32, 2>::new(4).is_ok());
}

#[test]
#[should_panic(expected = "Malformed rectangle")]
fn test_insert_rejects_inverted_rect() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    tree.insert([1.0, 5.0], [2.0, 4.0], 1);
}

#[test]
fn test_three_dimensions() {
    let mut rng = StdRng::seed_from_u64(71);
    let mut tree: RTree<usize, 3> = RTree::new(CAPACITY).unwrap();
    let points: Vec<[f64; 3]> = (0..2_000)
        .map(|_| {
            [
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
                rng.gen_range(-100.0..100.0),
            ]
        })
        .collect();
    for (i, p) in points.iter().enumerate() {
        tree.insert(*p, *p, i);
    }
    check_invariants(&tree);

    let qmin = [-25.0, -25.0, -25.0];
    let qmax = [25.0, 25.0, 25.0];
    let mut found = HashSet::new();
    tree.search(qmin, qmax, |_, _, &id| {
        assert!(found.insert(id));
        true
    });
    let expected: HashSet<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| boxes_intersect(&qmin, &qmax, p, p))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_duplicate_entries_delete_one_at_a_time() {
    let mut tree: RTree<u32, 2> = RTree::new(CAPACITY).unwrap();
    for _ in 0..3 {
        tree.insert([4.0, 4.0], [5.0, 5.0], 9);
    }
    assert_eq!(tree.len(), 3);
    assert!(tree.delete([4.0, 4.0], [5.0, 5.0], &9));
    assert_eq!(tree.len(), 2);
    assert!(tree.delete([4.0, 4.0], [5.0, 5.0], &9));
    assert!(tree.delete([4.0, 4.0], [5.0, 5.0], &9));
    assert!(!tree.delete([4.0, 4.0], [5.0, 5.0], &9));
    assert!(tree.is_empty());
}
