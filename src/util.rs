//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// A half-open interval `[min, max)` on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Creates a new interval.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Gets the magnitude of the interval.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Returns true if the interval contains the value.
    /// The lower bound is inclusive, the upper bound exclusive; `NaN` is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    /// Returns true if the interval is non-empty and both ends are finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max > self.min
    }

    /// The number of buckets of width `step` needed to cover the interval.
    pub fn buckets(&self, step: f64) -> usize {
        (self.length() / step).ceil() as usize
    }

    /// The bucket of width `step` that `value` falls into, counting from `min`.
    /// Returns `None` if the value lies outside the interval.
    pub fn bucket(&self, value: f64, step: f64) -> Option<usize> {
        if !self.contains(value) {
            return None;
        }
        let idx = ((value - self.min) / step).floor() as usize;
        // Rounding can push a value just below `max` into a bucket past the end
        Some(usize::min(idx, self.buckets(step).saturating_sub(1)))
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval[{:?}, {:?})", &self.min, &self.max)
    }
}
