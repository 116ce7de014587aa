//! ## Read-Only Snapshot
//!
//! This module provides a flattened, immutable form of an [`RTree`]: every node
//! becomes a contiguous run of records in a single array, and a parent stores the
//! `[start, end)` range of its children. The layout has no pointers, which makes it
//! trivially serializable (enable the `serde` feature), and queries walk array
//! ranges instead of chasing node allocations.
//!
//! A snapshot is derived once with [`RTree::snapshot`] and is fully independent of
//! the source tree afterwards. It answers [`search`](ReadOnlyRTree::search) and
//! [`scan`](ReadOnlyRTree::scan) with the same contracts as the mutable tree.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::geometry::Rect;
use crate::rtree::{Entries, Node, RTree};

#[cfg(feature = "serde")]
mod float_array {
    //! Serde helpers for const-generic coordinate arrays of any dimension.

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const D: usize>(value: &[f64; D], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(value.iter())
    }

    pub fn deserialize<'de, De, const D: usize>(deserializer: De) -> Result<[f64; D], De::Error>
    where
        De: Deserializer<'de>,
    {
        let coords = Vec::<f64>::deserialize(deserializer)?;
        let len = coords.len();
        coords
            .try_into()
            .map_err(|_| Error::invalid_length(len, &"a coordinate array of D elements"))
    }
}

/// The payload side of a snapshot record: a leaf item or a child range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum ReadOnlyData<T> {
    Item(T),
    Node { start: usize, end: usize },
}

/// One record of a snapshot: a rectangle plus its item or child range.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ReadOnlyRect<T, const D: usize> {
    #[cfg_attr(feature = "serde", serde(with = "float_array"))]
    min: [f64; D],
    #[cfg_attr(feature = "serde", serde(with = "float_array"))]
    max: [f64; D],
    data: ReadOnlyData<T>,
}

impl<T, const D: usize> ReadOnlyRect<T, D> {
    fn rect(&self) -> Rect<D> {
        Rect::new(self.min, self.max)
    }
}

/// An immutable, flattened R‑tree derived from a live [`RTree`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadOnlyRTree<T, const D: usize> {
    rects: Vec<ReadOnlyRect<T, D>>,
    root: ReadOnlyRect<T, D>,
    count: usize,
}

impl<T: Clone, const D: usize> RTree<T, D> {
    /// Builds a read-only, flattened snapshot of the tree.
    ///
    /// The snapshot copies every rectangle and payload into one contiguous
    /// array and is independent of this tree from then on.
    pub fn snapshot(&self) -> ReadOnlyRTree<T, D> {
        info!("building read-only snapshot of tree with {} items", self.count);
        let mut out = ReadOnlyRTree {
            rects: Vec::with_capacity(self.count),
            root: ReadOnlyRect {
                min: [0.0; D],
                max: [0.0; D],
                data: ReadOnlyData::Node { start: 0, end: 0 },
            },
            count: self.count,
        };
        if let Some(root) = self.root.as_deref() {
            let (start, end) = dupe_node(&mut out.rects, root);
            let (min, max) = self.bounds();
            out.root = ReadOnlyRect {
                min,
                max,
                data: ReadOnlyData::Node { start, end },
            };
        }
        out
    }
}

/// Appends `node`'s children as one contiguous run, depth first, returning the
/// run's range. Child runs land after their parent's, so slots are reserved
/// up front and filled in a second pass.
fn dupe_node<T: Clone, const D: usize>(
    rects: &mut Vec<ReadOnlyRect<T, D>>,
    node: &Node<T, D>,
) -> (usize, usize) {
    let start = rects.len();
    let end = start + node.len();
    for _ in 0..node.len() {
        rects.push(ReadOnlyRect {
            min: [0.0; D],
            max: [0.0; D],
            data: ReadOnlyData::Node { start: 0, end: 0 },
        });
    }
    match &node.entries {
        Entries::Leaf(items) => {
            for (i, (rect, item)) in items.iter().enumerate() {
                rects[start + i] = ReadOnlyRect {
                    min: rect.min,
                    max: rect.max,
                    data: ReadOnlyData::Item(item.clone()),
                };
            }
        }
        Entries::Branch(children) => {
            for (i, (rect, child)) in children.iter().enumerate() {
                let (child_start, child_end) = dupe_node(rects, child);
                rects[start + i] = ReadOnlyRect {
                    min: rect.min,
                    max: rect.max,
                    data: ReadOnlyData::Node {
                        start: child_start,
                        end: child_end,
                    },
                };
            }
        }
    }
    (start, end)
}

impl<T, const D: usize> ReadOnlyRTree<T, D> {
    /// Number of items in the snapshot.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the snapshot holds no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The minimum bounding rectangle over all items, or all zeros when empty.
    pub fn bounds(&self) -> ([f64; D], [f64; D]) {
        (self.root.min, self.root.max)
    }

    /// Calls `iter` for every item whose rectangle intersects the query
    /// rectangle. Returning `false` from `iter` stops the search.
    pub fn search<F>(&self, min: [f64; D], max: [f64; D], mut iter: F)
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        let target = Rect::new(min, max);
        if self.count > 0 && target.intersects(&self.root.rect()) {
            self.search_record(&self.root, &target, &mut iter);
        }
    }

    fn search_record<F>(&self, record: &ReadOnlyRect<T, D>, target: &Rect<D>, iter: &mut F) -> bool
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        match &record.data {
            ReadOnlyData::Item(item) => iter(record.min, record.max, item),
            ReadOnlyData::Node { start, end } => {
                for i in *start..*end {
                    let child = &self.rects[i];
                    if target.intersects(&child.rect())
                        && !self.search_record(child, target, iter)
                    {
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Calls `iter` for every item in the snapshot, in unspecified order.
    /// Returning `false` from `iter` stops the scan.
    pub fn scan<F>(&self, mut iter: F)
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        self.scan_record(&self.root, &mut iter);
    }

    fn scan_record<F>(&self, record: &ReadOnlyRect<T, D>, iter: &mut F) -> bool
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        match &record.data {
            ReadOnlyData::Item(item) => iter(record.min, record.max, item),
            ReadOnlyData::Node { start, end } => {
                for i in *start..*end {
                    if !self.scan_record(&self.rects[i], iter) {
                        return false;
                    }
                }
                true
            }
        }
    }
}
