//! The 3-D lattice coordinate type.

use std::fmt;

/// A coordinate on the 3-D simulation lattice.
///
/// Plain integer triple; validity against a particular lattice's bounds is
/// checked by the lattice, not here. Axis convention: `x` along the length,
/// `y` along the width, `z` along the height (the transport direction,
/// bounded by the electrodes when non-periodic).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Coords {
    /// Position along the length axis.
    pub x: i32,
    /// Position along the width axis.
    pub y: i32,
    /// Position along the height (transport) axis.
    pub z: i32,
}

impl Coords {
    /// Construct a coordinate from its three components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl From<(i32, i32, i32)> for Coords {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self { x, y, z }
    }
}
