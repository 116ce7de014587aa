use mbrtree::geometry::Rect;
use mbrtree::rtree::RTree;

fn main() {
    // --- 2D point index ---
    println!("--- 2D point index ---");
    let mut tree: RTree<&str, 2> = RTree::new(16).unwrap();

    // Insert a few cities as points (min == max).
    tree.insert([-112.0740, 33.4484], [-112.0740, 33.4484], "Phoenix");
    tree.insert([-118.2437, 34.0522], [-118.2437, 34.0522], "Los Angeles");
    tree.insert([-115.1398, 36.1699], [-115.1398, 36.1699], "Las Vegas");
    tree.insert([-111.8910, 40.7608], [-111.8910, 40.7608], "Salt Lake City");
    println!("indexed {} cities, bounds {:?}", tree.len(), tree.bounds());

    // Everything in a window around the southwest.
    println!("cities in the southwest window:");
    tree.search([-120.0, 32.0], [-110.0, 37.0], |_min, _max, &city| {
        println!("  {}", city);
        true
    });

    // The two nearest cities to a query point, nearest first.
    let query = Rect::point([-113.0, 34.0]);
    println!("two nearest to {:?}:", query.min);
    let mut yielded = 0;
    tree.nearby(
        |min, max, _| Rect::new(min, max).box_dist(&query),
        |_min, _max, &city, dist| {
            println!("  {} (squared distance {:.3})", city, dist);
            yielded += 1;
            yielded < 2
        },
    );

    // --- Copy-on-write clone ---
    println!("--- copy-on-write clone ---");
    let mut clone = tree.copy();
    clone.delete([-115.1398, 36.1699], [-115.1398, 36.1699], &"Las Vegas");
    println!("original still holds {} cities", tree.len());
    println!("clone holds {} cities", clone.len());

    // --- Read-only snapshot ---
    println!("--- read-only snapshot ---");
    let snapshot = tree.snapshot();
    let mut names: Vec<&str> = Vec::new();
    snapshot.scan(|_, _, &city| {
        names.push(city);
        true
    });
    names.sort_unstable();
    println!("snapshot scan: {:?}", names);

    // --- 3D boxes ---
    println!("--- 3D box index ---");
    let mut boxes: RTree<u32, 3> = RTree::new(16).unwrap();
    boxes.insert([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], 1);
    boxes.insert([0.5, 0.5, 0.5], [2.0, 2.0, 2.0], 2);
    boxes.insert([5.0, 5.0, 5.0], [6.0, 6.0, 6.0], 3);
    let mut hits = Vec::new();
    boxes.search([0.0, 0.0, 0.0], [1.5, 1.5, 1.5], |_, _, &id| {
        hits.push(id);
        true
    });
    println!("boxes intersecting the unit-ish cube: {:?}", hits);
}
