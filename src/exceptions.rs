//! ## Custom Errors for Mbrtree
//!
//! This module defines custom errors and exceptions that are used internally by Mbrtree.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents errors specific to invalid operations or parameters in Mbrtree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub enum MbrTreeError {
    /// Occurs when a tree is constructed over an invalid number of dimensions.
    InvalidDimension {
        /// The number of dimensions the tree was constructed with.
        dims: usize,
    },
    /// Occurs when an invalid fanout or minimum fill is provided.
    InvalidCapacity {
        /// The maximum number of entries per node that was provided.
        max_entries: usize,
        /// The minimum number of entries per node that was provided.
        min_entries: usize,
    },
    /// Occurs when a rectangle has a minimum corner past its maximum corner.
    MalformedRect {
        /// The axis on which the corners are inverted.
        axis: usize,
        /// The minimum coordinate on that axis.
        min: f64,
        /// The maximum coordinate on that axis.
        max: f64,
    },
}

impl fmt::Display for MbrTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MbrTreeError::InvalidDimension { dims } => {
                write!(
                    f,
                    "Invalid dimension: {dims}. A tree must index at least one dimension."
                )
            }
            MbrTreeError::InvalidCapacity {
                max_entries,
                min_entries,
            } => {
                write!(
                    f,
                    "Invalid capacity: max_entries={max_entries}, min_entries={min_entries}. \
                     max_entries must be at least 4 and min_entries must be in 1..=max_entries/2."
                )
            }
            MbrTreeError::MalformedRect { axis, min, max } => {
                write!(
                    f,
                    "Malformed rectangle: min {min} is greater than max {max} on axis {axis}."
                )
            }
        }
    }
}

impl Error for MbrTreeError {}
