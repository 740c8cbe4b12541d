//! Block coordinates and the boxes searched around them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::WorldId;

/// A block position in a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub world: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const fn new(world: WorldId, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }

    /// The same world, shifted by the given deltas.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
            ..self
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({}, {}, {})", self.world, self.x, self.y, self.z)
    }
}

/// Axis-aligned, inclusive box of block positions within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub world: WorldId,
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub min_z: i32,
    pub max_z: i32,
}

impl BoundingBox {
    /// The box reaching `radius` blocks from `center` along every axis.
    ///
    /// Bounds are ordered min/max whatever the sign of `radius`, and
    /// saturate at the `i32` range.
    pub fn around(center: Coordinate, radius: i32) -> Self {
        let (min_x, max_x) = span(center.x, radius);
        let (min_y, max_y) = span(center.y, radius);
        let (min_z, max_z) = span(center.z, radius);
        Self {
            world: center.world,
            min_x,
            max_x,
            min_y,
            max_y,
            min_z,
            max_z,
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, coordinate: &Coordinate) -> bool {
        coordinate.world == self.world
            && (self.min_x..=self.max_x).contains(&coordinate.x)
            && (self.min_y..=self.max_y).contains(&coordinate.y)
            && (self.min_z..=self.max_z).contains(&coordinate.z)
    }
}

fn span(center: i32, radius: i32) -> (i32, i32) {
    let minus = center.saturating_sub(radius);
    let plus = center.saturating_add(radius);
    (minus.min(plus), minus.max(plus))
}
