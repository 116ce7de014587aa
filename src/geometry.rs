//! ## Rectangle Geometry
//!
//! This module defines the axis-aligned bounding rectangle used throughout the crate,
//! together with the arithmetic the tree is built on: area and union volumes,
//! enlargement, containment and intersection tests, edge analysis, and the squared
//! box distance used by nearest-neighbor traversal.
//!
//! A rectangle over `D` dimensions is a pair of corner coordinate arrays with
//! `min[i] <= max[i]` on every axis. A point is a rectangle whose corners coincide,
//! and zero-extent ("degenerate") rectangles are legal and common.

use crate::exceptions::MbrTreeError;

/// Volume of the unit hypersphere per dimension, up to the highest tabulated dimension.
const UNIT_SPHERE_VOLUME: [f64; 21] = [
    0.000000, 2.000000, 3.141593, // dimension 0, 1, 2
    4.188790, 4.934802, 5.263789, // dimension 3, 4, 5
    5.167713, 4.724766, 4.058712, // dimension 6, 7, 8
    3.298509, 2.550164, 1.884104, // dimension 9, 10, 11
    1.335263, 0.910629, 0.599265, // dimension 12, 13, 14
    0.381443, 0.235331, 0.140981, // dimension 15, 16, 17
    0.082146, 0.046622, 0.025807, // dimension 18, 19, 20
];

/// The volume measure used to rank candidate subtrees during insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitVolume {
    /// Plain rectangular volume (the product of the extents). The fast default.
    #[default]
    Rectangular,
    /// Volume of the bounding sphere. Produces tighter subtree choices on some
    /// workloads where rectangular volumes tie too often.
    Spherical,
}

impl SplitVolume {
    pub(crate) fn measure<const D: usize>(&self, rect: &Rect<D>) -> f64 {
        match self {
            SplitVolume::Rectangular => rect.area(),
            SplitVolume::Spherical => rect.spherical_volume(),
        }
    }
}

/// An axis-aligned bounding rectangle in `D`-dimensional space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect<const D: usize> {
    /// The minimum corner.
    pub min: [f64; D],
    /// The maximum corner.
    pub max: [f64; D],
}

impl<const D: usize> Rect<D> {
    /// Creates a rectangle from its two corners.
    ///
    /// No shape validation is performed; see [`Rect::validate`].
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Rect { min, max }
    }

    /// Creates a degenerate rectangle covering a single point.
    pub fn point(at: [f64; D]) -> Self {
        Rect { min: at, max: at }
    }

    pub(crate) fn zero() -> Self {
        Rect {
            min: [0.0; D],
            max: [0.0; D],
        }
    }

    /// Checks that `min[i] <= max[i]` on every axis.
    pub fn validate(&self) -> Result<(), MbrTreeError> {
        for i in 0..D {
            if self.min[i] > self.max[i] {
                return Err(MbrTreeError::MalformedRect {
                    axis: i,
                    min: self.min[i],
                    max: self.max[i],
                });
            }
        }
        Ok(())
    }

    /// Returns the area of the rectangle (volume, beyond two dimensions).
    pub fn area(&self) -> f64 {
        let mut area = 1.0;
        for i in 0..D {
            area *= self.max[i] - self.min[i];
        }
        area
    }

    /// Grows `self` in place to cover `other`.
    pub fn expand(&mut self, other: &Rect<D>) {
        for i in 0..D {
            if other.min[i] < self.min[i] {
                self.min[i] = other.min[i];
            }
            if other.max[i] > self.max[i] {
                self.max[i] = other.max[i];
            }
        }
    }

    /// Returns the smallest rectangle that contains both `self` and `other`.
    pub fn union(&self, other: &Rect<D>) -> Rect<D> {
        let mut out = *self;
        out.expand(other);
        out
    }

    /// Returns the area of the union of `self` and `other` without materializing it.
    pub fn union_area(&self, other: &Rect<D>) -> f64 {
        let mut area = 1.0;
        for i in 0..D {
            area *= self.max[i].max(other.max[i]) - self.min[i].min(other.min[i]);
        }
        area
    }

    /// Returns the additional area required to enlarge `self` to include `other`.
    pub fn enlargement(&self, other: &Rect<D>) -> f64 {
        self.union_area(other) - self.area()
    }

    /// Returns true when `other` lies fully inside `self` (boundaries included).
    pub fn contains(&self, other: &Rect<D>) -> bool {
        for i in 0..D {
            if other.min[i] < self.min[i] || other.max[i] > self.max[i] {
                return false;
            }
        }
        true
    }

    /// Returns true when `self` and `other` overlap (boundaries included).
    pub fn intersects(&self, other: &Rect<D>) -> bool {
        for i in 0..D {
            if other.min[i] > self.max[i] || other.max[i] < self.min[i] {
                return false;
            }
        }
        true
    }

    /// Returns true when `self` touches the boundary of `outer` on any axis,
    /// i.e. `self` is not strictly interior to `outer`.
    pub fn on_edge(&self, outer: &Rect<D>) -> bool {
        for i in 0..D {
            if self.min[i] <= outer.min[i] || self.max[i] >= outer.max[i] {
                return true;
            }
        }
        false
    }

    /// Returns the axis with the largest extent, ties broken by the lowest index.
    pub fn largest_axis(&self) -> usize {
        let mut axis = 0;
        let mut size = f64::NEG_INFINITY;
        for i in 0..D {
            let extent = self.max[i] - self.min[i];
            if extent > size {
                axis = i;
                size = extent;
            }
        }
        axis
    }

    /// Returns the squared Euclidean distance between `self` and `other`,
    /// which is zero when the rectangles overlap.
    pub fn box_dist(&self, other: &Rect<D>) -> f64 {
        let mut dist = 0.0;
        for i in 0..D {
            let gap = self.min[i].max(other.min[i]) - self.max[i].min(other.max[i]);
            if gap > 0.0 {
                dist += gap * gap;
            }
        }
        dist
    }

    /// Returns the volume of the bounding sphere of the rectangle.
    ///
    /// Falls back to the rectangular volume beyond the tabulated dimensions.
    pub fn spherical_volume(&self) -> f64 {
        match UNIT_SPHERE_VOLUME.get(D) {
            Some(&unit) => {
                let mut sum_of_squares = 0.0;
                for i in 0..D {
                    let half_extent = (self.max[i] - self.min[i]) * 0.5;
                    sum_of_squares += half_extent * half_extent;
                }
                sum_of_squares.sqrt().powi(D as i32) * unit
            }
            None => self.area(),
        }
    }
}
