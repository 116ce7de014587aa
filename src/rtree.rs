//! ## R‑tree Implementation
//!
//! This module implements a dynamic R‑tree over axis-aligned bounding rectangles in
//! `D`-dimensional space, carrying an arbitrary payload type per entry. The tree
//! supports insertion, deletion, replacement, intersection search, full scans,
//! best-first nearest-neighbor traversal, and cheap copy-on-write cloning.
//!
//! Nodes keep their sibling rectangles ordered by the first axis by default, which
//! lets searches stop early once a sibling starts past the query window. Splits use
//! a largest-axis edge-snap partition with underflow repair, and deletions condense
//! underfull subtrees by reinserting their entries from the root.
//!
//! # Examples
//!
//! ```
//! use mbrtree::rtree::RTree;
//!
//! let mut tree: RTree<&str, 2> = RTree::new(16).unwrap();
//! tree.insert([-115.0, 33.0], [-115.0, 33.0], "tempe");
//! tree.insert([-113.0, 35.0], [-113.0, 35.0], "phoenix");
//!
//! let mut found = Vec::new();
//! tree.search([-116.0, 32.0], [-114.0, 34.0], |_min, _max, &city| {
//!     found.push(city);
//!     true
//! });
//! assert_eq!(found, vec!["tempe"]);
//!
//! assert!(tree.delete([-115.0, 33.0], [-115.0, 33.0], &"tempe"));
//! assert_eq!(tree.len(), 1);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::exceptions::MbrTreeError;
use crate::geometry::{Rect, SplitVolume};

const DEFAULT_MAX_ENTRIES: usize = 64;

/// Construction-time parameters of an [`RTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Maximum number of entries per node. Nodes split when they fill up.
    pub max_entries: usize,
    /// Minimum number of entries per non-root node. Nodes below this are
    /// condensed and their entries reinserted.
    pub min_entries: usize,
    /// Keep leaf siblings ordered by their minimum coordinate on the first axis.
    pub ordered_leaves: bool,
    /// Keep branch siblings ordered by their minimum coordinate on the first axis.
    pub ordered_branches: bool,
    /// The volume measure used to rank candidate subtrees during insertion.
    pub volume: SplitVolume,
}

impl Default for Options {
    /// A fanout of 64 with a 10% minimum fill: high branching, cheap
    /// condensation. Raise `min_entries` for better-balanced trees at the cost
    /// of more reinsertion work on delete.
    fn default() -> Self {
        Options {
            max_entries: DEFAULT_MAX_ENTRIES,
            min_entries: DEFAULT_MAX_ENTRIES / 10,
            ordered_leaves: true,
            ordered_branches: true,
            volume: SplitVolume::Rectangular,
        }
    }
}

impl Options {
    /// Returns the default options with the given fanout and a 10% minimum fill.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Options {
            max_entries,
            min_entries: (max_entries / 10).max(1),
            ..Options::default()
        }
    }

    pub(crate) fn validate(&self, dims: usize) -> Result<(), MbrTreeError> {
        if dims < 1 {
            return Err(MbrTreeError::InvalidDimension { dims });
        }
        if self.max_entries < 4 || self.min_entries < 1 || self.min_entries > self.max_entries / 2
        {
            return Err(MbrTreeError::InvalidCapacity {
                max_entries: self.max_entries,
                min_entries: self.min_entries,
            });
        }
        Ok(())
    }
}

// Copy-on-write epochs come from one process-wide counter so that every tree
// handle, including handles cloned concurrently, observes a distinct epoch.
static COW_EPOCH: AtomicU64 = AtomicU64::new(0);

fn next_cow_epoch() -> u64 {
    COW_EPOCH.fetch_add(1, AtomicOrdering::Relaxed) + 1
}

/// A node is either a leaf holding payload entries or a branch holding child
/// nodes, each entry paired with its minimum bounding rectangle. The kind is
/// fixed at creation.
#[derive(Debug, Clone)]
pub(crate) enum Entries<T, const D: usize> {
    Leaf(Vec<(Rect<D>, T)>),
    Branch(Vec<(Rect<D>, Arc<Node<T, D>>)>),
}

#[derive(Debug, Clone)]
pub(crate) struct Node<T, const D: usize> {
    /// The copy-on-write epoch of the tree that created this node.
    pub(crate) cow: u64,
    pub(crate) entries: Entries<T, D>,
}

impl<T, const D: usize> Node<T, D> {
    fn new_leaf(cow: u64, capacity: usize) -> Self {
        Node {
            cow,
            entries: Entries::Leaf(Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.entries, Entries::Leaf(_))
    }

    pub(crate) fn len(&self) -> usize {
        match &self.entries {
            Entries::Leaf(items) => items.len(),
            Entries::Branch(children) => children.len(),
        }
    }

    /// The minimum bounding rectangle over this node's entries.
    fn rect(&self) -> Rect<D> {
        match &self.entries {
            Entries::Leaf(items) => fold_rect(items),
            Entries::Branch(children) => fold_rect(children),
        }
    }

    fn sort(&mut self) {
        match &mut self.entries {
            Entries::Leaf(items) => sort_entries_by(items, 0, false, false),
            Entries::Branch(children) => sort_entries_by(children, 0, false, false),
        }
    }

    fn is_sorted(&self) -> bool {
        match &self.entries {
            Entries::Leaf(items) => entries_sorted(items),
            Entries::Branch(children) => entries_sorted(children),
        }
    }

    /// Splits off a sibling of the same kind along the largest axis of `r`,
    /// snapping each entry to whichever edge of `r` it sits closer to, then
    /// repairing underflow by transferring the outermost entries.
    fn split_largest_axis_edge_snap(
        &mut self,
        r: Rect<D>,
        cow: u64,
        min_entries: usize,
        capacity: usize,
    ) -> Node<T, D> {
        let entries = match &mut self.entries {
            Entries::Leaf(left) => {
                let mut right = Vec::with_capacity(capacity);
                split_edge_snap(&r, left, &mut right, min_entries);
                Entries::Leaf(right)
            }
            Entries::Branch(left) => {
                let mut right = Vec::with_capacity(capacity);
                split_edge_snap(&r, left, &mut right, min_entries);
                Entries::Branch(right)
            }
        };
        Node { cow, entries }
    }
}

impl<T: Clone, const D: usize> Node<T, D> {
    /// Collects every leaf entry beneath this node, cloning payloads. Used to
    /// empty an underfull subtree into the reinsertion buffer.
    fn flatten_into(&self, out: &mut Vec<(Rect<D>, T)>) {
        match &self.entries {
            Entries::Leaf(items) => out.extend(items.iter().cloned()),
            Entries::Branch(children) => {
                for (_, child) in children {
                    child.flatten_into(out);
                }
            }
        }
    }
}

/// Loads the node behind `slot` for mutation, duplicating it first when it is
/// shared with another tree handle (its creation epoch differs from `cow`).
fn cow_load<'a, T: Clone, const D: usize>(
    cow: u64,
    slot: &'a mut Arc<Node<T, D>>,
) -> &'a mut Node<T, D> {
    if slot.cow != cow {
        let mut dup = (**slot).clone();
        dup.cow = cow;
        *slot = Arc::new(dup);
    }
    Arc::make_mut(slot)
}

fn fold_rect<E, const D: usize>(entries: &[(Rect<D>, E)]) -> Rect<D> {
    let mut rect = entries[0].0;
    for (r, _) in &entries[1..] {
        rect.expand(r);
    }
    rect
}

/// First position whose rectangle does not start before `key` on axis 0.
fn rsearch<E, const D: usize>(entries: &[(Rect<D>, E)], key: f64) -> usize {
    entries
        .iter()
        .position(|(r, _)| r.min[0] >= key)
        .unwrap_or(entries.len())
}

fn order_to_left<E, const D: usize>(entries: &mut [(Rect<D>, E)], mut index: usize) -> usize {
    while index > 0 && entries[index].0.min[0] < entries[index - 1].0.min[0] {
        entries.swap(index, index - 1);
        index -= 1;
    }
    index
}

fn order_to_right<E, const D: usize>(entries: &mut [(Rect<D>, E)], mut index: usize) -> usize {
    while index + 1 < entries.len() && entries[index + 1].0.min[0] < entries[index].0.min[0] {
        entries.swap(index, index + 1);
        index += 1;
    }
    index
}

fn sort_entries_by<E, const D: usize>(
    entries: &mut [(Rect<D>, E)],
    axis: usize,
    rev: bool,
    by_max: bool,
) {
    entries.sort_unstable_by(|a, b| {
        let (ka, kb) = if by_max {
            (a.0.max[axis], b.0.max[axis])
        } else {
            (a.0.min[axis], b.0.min[axis])
        };
        if rev {
            kb.total_cmp(&ka)
        } else {
            ka.total_cmp(&kb)
        }
    });
}

fn entries_sorted<E, const D: usize>(entries: &[(Rect<D>, E)]) -> bool {
    entries.windows(2).all(|w| w[0].0.min[0] <= w[1].0.min[0])
}

/// Index of the entry needing the least volume enlargement to absorb `ir`,
/// ties broken by the smaller current volume.
fn choose_least_enlargement<E, const D: usize>(
    entries: &[(Rect<D>, E)],
    ir: &Rect<D>,
    volume: SplitVolume,
) -> usize {
    let mut best = 0;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    for (i, (r, _)) in entries.iter().enumerate() {
        let area = volume.measure(r);
        let enlargement = volume.measure(&r.union(ir)) - area;
        if enlargement < best_enlargement || (!(enlargement > best_enlargement) && area < best_area)
        {
            best = i;
            best_enlargement = enlargement;
            best_area = area;
        }
    }
    best
}

fn split_edge_snap<E, const D: usize>(
    r: &Rect<D>,
    left: &mut Vec<(Rect<D>, E)>,
    right: &mut Vec<(Rect<D>, E)>,
    min_entries: usize,
) {
    let axis = r.largest_axis();
    let mut i = 0;
    while i < left.len() {
        let min_dist = left[i].0.min[axis] - r.min[axis];
        let max_dist = r.max[axis] - left[i].0.max[axis];
        if min_dist < max_dist {
            i += 1;
        } else {
            right.push(left.swap_remove(i));
        }
    }
    // Repair underflow by transferring the entries nearest the starved side.
    if left.len() < min_entries {
        sort_entries_by(right, axis, true, false);
        let at = right.len() - (min_entries - left.len());
        left.extend(right.drain(at..));
    } else if right.len() < min_entries {
        sort_entries_by(left, axis, false, true);
        let at = left.len() - (min_entries - right.len());
        right.extend(left.drain(at..));
    }
}

/// A dynamic R‑tree over `D`-dimensional rectangles with payloads of type `T`.
///
/// The tree is created empty and mutated through [`insert`](RTree::insert),
/// [`delete`](RTree::delete), and [`replace`](RTree::replace). Queries
/// ([`search`](RTree::search), [`scan`](RTree::scan), [`nearby`](RTree::nearby))
/// drive caller-supplied iterators that may return `false` to stop early.
/// [`copy`](RTree::copy) produces an independent handle in constant time by
/// sharing nodes copy-on-write.
#[derive(Debug)]
pub struct RTree<T, const D: usize> {
    cow: u64,
    pub(crate) count: usize,
    height: usize,
    pub(crate) rect: Rect<D>,
    pub(crate) root: Option<Arc<Node<T, D>>>,
    reinsert: Vec<(Rect<D>, T)>,
    opts: Options,
}

impl<T, const D: usize> RTree<T, D> {
    /// Creates a new empty R‑tree with the given fanout and a 10% minimum fill.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - The maximum number of entries allowed in a node.
    ///
    /// # Errors
    ///
    /// Returns [`MbrTreeError::InvalidCapacity`] if `max_entries` is less than 4,
    /// or [`MbrTreeError::InvalidDimension`] if `D` is zero.
    pub fn new(max_entries: usize) -> Result<Self, MbrTreeError> {
        Self::with_options(Options::with_max_entries(max_entries))
    }

    /// Creates a new empty R‑tree from the given [`Options`].
    ///
    /// # Errors
    ///
    /// Returns [`MbrTreeError::InvalidCapacity`] or
    /// [`MbrTreeError::InvalidDimension`] when the options are inconsistent.
    pub fn with_options(opts: Options) -> Result<Self, MbrTreeError> {
        opts.validate(D)?;
        info!(
            "creating RTree: dims={}, max_entries={}, min_entries={}",
            D, opts.max_entries, opts.min_entries
        );
        Ok(RTree {
            cow: next_cow_epoch(),
            count: 0,
            height: 0,
            rect: Rect::zero(),
            root: None,
            reinsert: Vec::new(),
            opts,
        })
    }

    /// Number of items in the tree.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The minimum bounding rectangle over all items, or all zeros when empty.
    pub fn bounds(&self) -> ([f64; D], [f64; D]) {
        (self.rect.min, self.rect.max)
    }

    /// The options the tree was constructed with.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Removes every item, resetting the tree to its freshly constructed state.
    pub fn clear(&mut self) {
        self.root = None;
        self.rect = Rect::zero();
        self.count = 0;
        self.height = 0;
        self.reinsert = Vec::new();
    }

    /// Calls `iter` for every item whose rectangle intersects the query
    /// rectangle. Returning `false` from `iter` stops the search.
    ///
    /// # Arguments
    ///
    /// * `min`, `max` - The corners of the query rectangle.
    /// * `iter` - Called with each matching item's corners and payload.
    pub fn search<F>(&self, min: [f64; D], max: [f64; D], mut iter: F)
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        let target = Rect::new(min, max);
        if let Some(root) = self.root.as_deref() {
            if target.intersects(&self.rect) {
                self.search_node(root, &target, &mut iter);
            }
        }
    }

    fn search_node<F>(&self, node: &Node<T, D>, target: &Rect<D>, iter: &mut F) -> bool
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        match &node.entries {
            Entries::Leaf(items) => {
                for (rect, item) in items {
                    if self.opts.ordered_leaves && rect.min[0] > target.max[0] {
                        break;
                    }
                    if rect.intersects(target) && !iter(rect.min, rect.max, item) {
                        return false;
                    }
                }
            }
            Entries::Branch(children) => {
                for (rect, child) in children {
                    if self.opts.ordered_branches && rect.min[0] > target.max[0] {
                        break;
                    }
                    if target.intersects(rect) && !self.search_node(child, target, iter) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Calls `iter` for every item in the tree, in unspecified order.
    /// Returning `false` from `iter` stops the scan.
    pub fn scan<F>(&self, mut iter: F)
    where
        F: FnMut([f64; D], [f64; D], &T) -> bool,
    {
        if let Some(root) = self.root.as_deref() {
            scan_node(root, &mut iter);
        }
    }

    /// Yields items in ascending order of a caller-supplied distance function,
    /// using a best-first traversal over a min-heap of candidates.
    ///
    /// # Arguments
    ///
    /// * `dist` - Lower-bound distance for a rectangle; receives `Some(payload)`
    ///   for items and `None` for internal nodes. [`Rect::box_dist`] is the
    ///   squared-Euclidean default to build on.
    /// * `iter` - Called with each item's corners, payload, and distance;
    ///   returning `false` stops the traversal.
    ///
    /// As long as `dist` never exceeds the distance of anything contained in
    /// the rectangle it is given (true for box distance), items are yielded in
    /// monotonically non-decreasing distance order.
    pub fn nearby<Q, F>(&self, mut dist: Q, mut iter: F)
    where
        Q: FnMut([f64; D], [f64; D], Option<&T>) -> f64,
        F: FnMut([f64; D], [f64; D], &T, f64) -> bool,
    {
        let root = match self.root.as_deref() {
            Some(root) => root,
            None => return,
        };
        let mut heap = BinaryHeap::new();
        push_candidates(&mut heap, root, &mut dist);
        while let Some(candidate) = heap.pop() {
            match candidate.target {
                Candidate::Item(item) => {
                    if !iter(
                        candidate.rect.min,
                        candidate.rect.max,
                        item,
                        candidate.dist.into_inner(),
                    ) {
                        return;
                    }
                }
                Candidate::Node(node) => push_candidates(&mut heap, node, &mut dist),
            }
        }
    }

    /// Lists the children of `parent` for external introspection, appending to
    /// `out`. With no parent the root is listed (an empty tree lists nothing).
    /// Branch children can be descended into by passing their node back in.
    pub fn children<'a>(
        &'a self,
        parent: Option<NodeRef<'a, T, D>>,
        out: &mut Vec<Child<'a, T, D>>,
    ) {
        match parent {
            None => {
                if let Some(root) = self.root.as_deref() {
                    out.push(Child {
                        min: self.rect.min,
                        max: self.rect.max,
                        data: ChildData::Node(NodeRef { node: root }),
                    });
                }
            }
            Some(parent) => match &parent.node.entries {
                Entries::Leaf(items) => {
                    for (rect, item) in items {
                        out.push(Child {
                            min: rect.min,
                            max: rect.max,
                            data: ChildData::Item(item),
                        });
                    }
                }
                Entries::Branch(children) => {
                    for (rect, child) in children {
                        out.push(Child {
                            min: rect.min,
                            max: rect.max,
                            data: ChildData::Node(NodeRef {
                                node: child.as_ref(),
                            }),
                        });
                    }
                }
            },
        }
    }
}

impl<T: Clone, const D: usize> RTree<T, D> {
    /// Inserts an item with the given rectangle.
    ///
    /// # Arguments
    ///
    /// * `min`, `max` - The corners of the item's rectangle. Use equal corners
    ///   for points.
    /// * `data` - The payload, owned by the tree until deleted.
    ///
    /// # Panics
    ///
    /// Panics with [`MbrTreeError::MalformedRect`] if `min[i] > max[i]` on any axis.
    pub fn insert(&mut self, min: [f64; D], max: [f64; D], data: T) {
        let ir = Rect::new(min, max);
        if let Err(err) = ir.validate() {
            panic!("{}", err);
        }
        self.insert_rect(ir, data);
    }

    fn insert_rect(&mut self, ir: Rect<D>, data: T) {
        debug!("inserting item at {:?}..{:?}", ir.min, ir.max);
        let mut root = match self.root.take() {
            Some(root) => root,
            None => {
                self.rect = ir;
                Arc::new(Node::new_leaf(self.cow, self.opts.max_entries))
            }
        };
        let mut rect = self.rect;
        let grown = self.node_insert(&mut rect, &mut root, &ir, data);
        let split = root.len() == self.opts.max_entries;
        if grown {
            rect.expand(&ir);
        }
        if split {
            info!("root reached {} entries, splitting", self.opts.max_entries);
            let right = {
                let left = Arc::make_mut(&mut root);
                self.split_node(rect, left)
            };
            let left_rect = root.rect();
            let right_rect = right.rect();
            let mut children = Vec::with_capacity(self.opts.max_entries);
            children.push((left_rect, root));
            children.push((right_rect, Arc::new(right)));
            root = Arc::new(Node {
                cow: self.cow,
                entries: Entries::Branch(children),
            });
            self.height += 1;
        }
        if self.opts.ordered_branches && !root.is_leaf() && (grown || split) {
            Arc::make_mut(&mut root).sort();
        }
        self.root = Some(root);
        self.rect = rect;
        self.count += 1;
    }

    /// Recursive insert. Returns whether the subtree's bounding rectangle grew
    /// beyond `nr`.
    fn node_insert(
        &self,
        nr: &mut Rect<D>,
        cn: &mut Arc<Node<T, D>>,
        ir: &Rect<D>,
        data: T,
    ) -> bool {
        let n = cow_load(self.cow, cn);
        match &mut n.entries {
            Entries::Leaf(items) => {
                let index = if self.opts.ordered_leaves {
                    rsearch(items, ir.min[0])
                } else {
                    items.len()
                };
                items.insert(index, (*ir, data));
                !nr.contains(ir)
            }
            Entries::Branch(children) => {
                // Prefer a child that already contains the rectangle, choosing
                // the one with the smallest area; otherwise fall back to the
                // least-enlargement choice.
                let mut index = None;
                let mut smallest_area = 0.0;
                for (i, (r, _)) in children.iter().enumerate() {
                    if r.contains(ir) {
                        let area = r.area();
                        if index.is_none() || area < smallest_area {
                            index = Some(i);
                            smallest_area = area;
                        }
                    }
                }
                let mut index = match index {
                    Some(i) => i,
                    None => choose_least_enlargement(children, ir, self.opts.volume),
                };

                let mut grown = {
                    let (crect, child) = &mut children[index];
                    self.node_insert(crect, child, ir, data)
                };
                let split = children[index].1.len() == self.opts.max_entries;
                if grown {
                    children[index].0.expand(ir);
                    if self.opts.ordered_branches {
                        index = order_to_left(children, index);
                    }
                    grown = !nr.contains(ir);
                }
                if split {
                    let right = {
                        let (crect, child) = &mut children[index];
                        let r = *crect;
                        self.split_node(r, Arc::make_mut(child))
                    };
                    let left_rect = children[index].1.rect();
                    children[index].0 = left_rect;
                    let right_rect = right.rect();
                    if self.opts.ordered_branches {
                        children.insert(index + 1, (right_rect, Arc::new(right)));
                        if children[index].0.min[0] > children[index + 1].0.min[0] {
                            children.swap(index, index + 1);
                        }
                        order_to_right(children, index + 1);
                    } else {
                        children.push((right_rect, Arc::new(right)));
                    }
                }
                grown
            }
        }
    }

    fn split_node(&self, r: Rect<D>, left: &mut Node<T, D>) -> Node<T, D> {
        let mut right = left.split_largest_axis_edge_snap(
            r,
            self.cow,
            self.opts.min_entries,
            self.opts.max_entries,
        );
        let ordered = if right.is_leaf() {
            self.opts.ordered_leaves
        } else {
            self.opts.ordered_branches
        };
        if ordered {
            right.sort();
            // The left node is frequently still in order after a split.
            if !left.is_sorted() {
                left.sort();
            }
        }
        right
    }

    /// Creates an independent handle sharing this tree's nodes copy-on-write.
    ///
    /// Both handles move to fresh epochs, so either side duplicates a shared
    /// node the first time it mutates along its path; divergence is
    /// proportional to the mutated paths, not to the tree size.
    pub fn copy(&mut self) -> Self {
        self.cow = next_cow_epoch();
        self.reinsert = Vec::new();
        info!("copy-on-write clone of tree with {} items", self.count);
        RTree {
            cow: next_cow_epoch(),
            count: self.count,
            height: self.height,
            rect: self.rect,
            root: self.root.clone(),
            reinsert: Vec::new(),
            opts: self.opts,
        }
    }
}

impl<T: Clone + PartialEq, const D: usize> RTree<T, D> {
    /// Deletes the item matching both the given rectangle (exactly) and the
    /// given payload (by equality). At most one entry is removed per call,
    /// even when several identical entries exist.
    ///
    /// # Arguments
    ///
    /// * `min`, `max` - The corners of the rectangle the item was inserted with.
    /// * `data` - The payload to match.
    ///
    /// # Returns
    ///
    /// `true` if a matching item was found and removed.
    ///
    /// # Panics
    ///
    /// Panics with [`MbrTreeError::MalformedRect`] if `min[i] > max[i]` on any axis.
    pub fn delete(&mut self, min: [f64; D], max: [f64; D], data: &T) -> bool {
        let ir = Rect::new(min, max);
        if let Err(err) = ir.validate() {
            panic!("{}", err);
        }
        self.delete_rect(&ir, data)
    }

    fn delete_rect(&mut self, ir: &Rect<D>, data: &T) -> bool {
        let mut root = match self.root.take() {
            Some(root) => root,
            None => return false,
        };
        if !self.rect.contains(ir) {
            self.root = Some(root);
            return false;
        }
        debug!("deleting item at {:?}..{:?}", ir.min, ir.max);
        let mut rect = self.rect;
        let mut reinsert = std::mem::take(&mut self.reinsert);
        let (removed, _) = self.node_delete(&mut rect, &mut root, ir, data, &mut reinsert);
        if !removed {
            self.root = Some(root);
            self.reinsert = reinsert;
            return false;
        }
        self.count -= reinsert.len() + 1;
        if self.count == 0 {
            self.root = None;
            self.rect = Rect::zero();
            self.height = 0;
        } else {
            // Collapse the root while it is a branch with a single child.
            while self.height > 0 {
                let child = match &root.entries {
                    Entries::Branch(children) if children.len() == 1 => children[0].1.clone(),
                    _ => break,
                };
                root = child;
                self.height -= 1;
            }
            self.root = Some(root);
            self.rect = rect;
        }
        if !reinsert.is_empty() {
            info!("reinserting {} entries after condensing", reinsert.len());
            for (r, item) in reinsert.drain(..) {
                self.insert_rect(r, item);
            }
        }
        // Hold on to the scratch buffer unless it has grown past one node's worth.
        if reinsert.capacity() <= self.opts.max_entries {
            self.reinsert = reinsert;
        }
        true
    }

    /// Recursive delete. Returns `(removed, shrunk)`: whether the target entry
    /// was removed beneath `cn`, and whether `nr` shrank as a result.
    fn node_delete(
        &self,
        nr: &mut Rect<D>,
        cn: &mut Arc<Node<T, D>>,
        ir: &Rect<D>,
        data: &T,
        reinsert: &mut Vec<(Rect<D>, T)>,
    ) -> (bool, bool) {
        let n = cow_load(self.cow, cn);
        match &mut n.entries {
            Entries::Leaf(items) => {
                for i in 0..items.len() {
                    if items[i].0 != *ir || items[i].1 != *data {
                        continue;
                    }
                    if self.opts.ordered_leaves {
                        items.remove(i);
                    } else {
                        items.swap_remove(i);
                    }
                    // The bounding rectangle only shrinks when the removed
                    // entry touched its boundary.
                    let shrunk = ir.on_edge(nr);
                    if shrunk && !items.is_empty() {
                        *nr = fold_rect(items);
                    }
                    return (true, shrunk);
                }
                (false, false)
            }
            Entries::Branch(children) => {
                for i in 0..children.len() {
                    if !children[i].0.contains(ir) {
                        continue;
                    }
                    let crect = children[i].0;
                    let (removed, mut shrunk) = {
                        let (r, child) = &mut children[i];
                        self.node_delete(r, child, ir, data, reinsert)
                    };
                    if !removed {
                        continue;
                    }
                    if children[i].1.len() < self.opts.min_entries {
                        // Condense: detach the underfull subtree and queue its
                        // entries for reinsertion from the root.
                        children[i].1.flatten_into(reinsert);
                        if self.opts.ordered_branches {
                            children.remove(i);
                        } else {
                            children.swap_remove(i);
                        }
                        if !children.is_empty() {
                            *nr = fold_rect(children);
                        }
                        return (true, true);
                    }
                    if shrunk {
                        shrunk = children[i].0 != crect;
                        if shrunk {
                            *nr = fold_rect(children);
                        }
                        if self.opts.ordered_branches {
                            order_to_right(children, i);
                        }
                    }
                    return (true, shrunk);
                }
                (false, false)
            }
        }
    }

    /// Replaces one item with another: deletes `(old_min, old_max, old_data)`
    /// and, only if it was present, inserts `(new_min, new_max, new_data)`.
    ///
    /// # Returns
    ///
    /// `true` if the old item was found (and the new one inserted).
    pub fn replace(
        &mut self,
        old_min: [f64; D],
        old_max: [f64; D],
        old_data: &T,
        new_min: [f64; D],
        new_max: [f64; D],
        new_data: T,
    ) -> bool {
        let new_rect = Rect::new(new_min, new_max);
        if let Err(err) = new_rect.validate() {
            panic!("{}", err);
        }
        if self.delete(old_min, old_max, old_data) {
            self.insert_rect(new_rect, new_data);
            true
        } else {
            false
        }
    }
}

impl<T, const D: usize> Default for RTree<T, D> {
    /// An empty tree with the default [`Options`]. Panics if `D` is zero.
    fn default() -> Self {
        Self::with_options(Options::default()).expect("default options are valid")
    }
}

fn scan_node<T, F, const D: usize>(node: &Node<T, D>, iter: &mut F) -> bool
where
    F: FnMut([f64; D], [f64; D], &T) -> bool,
{
    match &node.entries {
        Entries::Leaf(items) => {
            for (rect, item) in items {
                if !iter(rect.min, rect.max, item) {
                    return false;
                }
            }
        }
        Entries::Branch(children) => {
            for (_, child) in children {
                if !scan_node(child, iter) {
                    return false;
                }
            }
        }
    }
    true
}

// Best-first traversal candidate: either a leaf entry or a node still to be
// expanded, keyed by its lower-bound distance.
enum Candidate<'a, T, const D: usize> {
    Item(&'a T),
    Node(&'a Node<T, D>),
}

struct NearbyCandidate<'a, T, const D: usize> {
    dist: OrderedFloat<f64>,
    rect: Rect<D>,
    target: Candidate<'a, T, D>,
}

impl<T, const D: usize> PartialEq for NearbyCandidate<'_, T, D> {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}

impl<T, const D: usize> Eq for NearbyCandidate<'_, T, D> {}

impl<T, const D: usize> Ord for NearbyCandidate<'_, T, D> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the std max-heap pops the smallest distance first.
        other.dist.cmp(&self.dist)
    }
}

impl<T, const D: usize> PartialOrd for NearbyCandidate<'_, T, D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn push_candidates<'a, T, Q, const D: usize>(
    heap: &mut BinaryHeap<NearbyCandidate<'a, T, D>>,
    node: &'a Node<T, D>,
    dist: &mut Q,
) where
    Q: FnMut([f64; D], [f64; D], Option<&T>) -> f64,
{
    match &node.entries {
        Entries::Leaf(items) => {
            for (rect, item) in items {
                heap.push(NearbyCandidate {
                    dist: OrderedFloat(dist(rect.min, rect.max, Some(item))),
                    rect: *rect,
                    target: Candidate::Item(item),
                });
            }
        }
        Entries::Branch(children) => {
            for (rect, child) in children {
                heap.push(NearbyCandidate {
                    dist: OrderedFloat(dist(rect.min, rect.max, None)),
                    rect: *rect,
                    target: Candidate::Node(child.as_ref()),
                });
            }
        }
    }
}

/// An opaque reference to a tree node, usable with [`RTree::children`].
#[derive(Debug)]
pub struct NodeRef<'a, T, const D: usize> {
    node: &'a Node<T, D>,
}

impl<T, const D: usize> Clone for NodeRef<'_, T, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const D: usize> Copy for NodeRef<'_, T, D> {}

/// One child slot of a node: a rectangle paired with either a payload (at the
/// leaf level) or a descendable node.
#[derive(Debug)]
pub struct Child<'a, T, const D: usize> {
    /// The child's minimum corner.
    pub min: [f64; D],
    /// The child's maximum corner.
    pub max: [f64; D],
    /// The payload or child node.
    pub data: ChildData<'a, T, D>,
}

/// The payload side of a [`Child`].
#[derive(Debug)]
pub enum ChildData<'a, T, const D: usize> {
    /// A leaf-level item.
    Item(&'a T),
    /// An internal node.
    Node(NodeRef<'a, T, D>),
}

impl<T, const D: usize> Child<'_, T, D> {
    /// Whether this child is a leaf-level item.
    pub fn is_item(&self) -> bool {
        matches!(self.data, ChildData::Item(_))
    }
}
