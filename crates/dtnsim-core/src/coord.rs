//! Planar coordinates

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in the simulation plane, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Shift this point by the given offsets
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Point at fraction `f` of the way from `self` to `to`
    pub fn lerp(&self, to: &Coord, f: f64) -> Coord {
        Coord::new(self.x + (to.x - self.x) * f, self.y + (to.y - self.y) * f)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2},{:.2})", self.x, self.y)
    }
}
