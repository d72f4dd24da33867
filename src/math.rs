//! Mathematical structs and functions.

use cgmath::{MetricSpace, Point2};

/// A 2D point
pub type Point2d = Point2<f64>;

/// The Euclidean distance between two points on the map plane.
pub fn distance(a: Point2d, b: Point2d) -> f64 {
    a.distance(b)
}
