// Shared coordinate and direction types.
//
// `TileCoord` is the world-space address of a tile. `DirectionFlags` is the
// 8-direction pathability byte returned by `CollisionIndex::all`, with the
// bit order NW, N, NE, W, E, SW, S, SE from bit 0 upward.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A tile position: horizontal `x`/`y` and a vertical `plane` (floor level).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
    pub plane: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32, plane: i32) -> Self {
        Self { x, y, plane }
    }

    /// Return this coordinate shifted by `(dx, dy)` on the same plane.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            plane: self.plane,
        }
    }

    /// Chebyshev distance on the x/y axes, ignoring plane.
    pub fn chebyshev(self, other: TileCoord) -> i32 {
        let d = self.x.abs_diff(other.x).max(self.y.abs_diff(other.y));
        i32::try_from(d).unwrap_or(i32::MAX)
    }

    /// Straight-line distance on the x/y axes, ignoring plane.
    pub fn euclidean(self, other: TileCoord) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

bitflags! {
    /// Pathability in all 8 directions from one tile.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DirectionFlags: u8 {
        const NORTH_WEST = 1 << 0;
        const NORTH = 1 << 1;
        const NORTH_EAST = 1 << 2;
        const WEST = 1 << 3;
        const EAST = 1 << 4;
        const SOUTH_WEST = 1 << 5;
        const SOUTH = 1 << 6;
        const SOUTH_EAST = 1 << 7;

        const CARDINALS = Self::NORTH.bits() | Self::EAST.bits() | Self::SOUTH.bits() | Self::WEST.bits();
        const DIAGONALS = Self::NORTH_WEST.bits()
            | Self::NORTH_EAST.bits()
            | Self::SOUTH_WEST.bits()
            | Self::SOUTH_EAST.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_bit_order_matches_byte_layout() {
        assert_eq!(DirectionFlags::NORTH_WEST.bits(), 0b0000_0001);
        assert_eq!(DirectionFlags::NORTH.bits(), 0b0000_0010);
        assert_eq!(DirectionFlags::NORTH_EAST.bits(), 0b0000_0100);
        assert_eq!(DirectionFlags::WEST.bits(), 0b0000_1000);
        assert_eq!(DirectionFlags::EAST.bits(), 0b0001_0000);
        assert_eq!(DirectionFlags::SOUTH_WEST.bits(), 0b0010_0000);
        assert_eq!(DirectionFlags::SOUTH.bits(), 0b0100_0000);
        assert_eq!(DirectionFlags::SOUTH_EAST.bits(), 0b1000_0000);
        assert_eq!(DirectionFlags::all().bits(), 0xFF);
    }

    #[test]
    fn distances_ignore_plane() {
        let a = TileCoord::new(0, 0, 0);
        let b = TileCoord::new(3, 4, 2);
        assert_eq!(a.chebyshev(b), 4);
        assert!((a.euclidean(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn distances_saturate_across_the_full_range() {
        let lo = TileCoord::new(i32::MIN, 0, 0);
        let hi = TileCoord::new(i32::MAX, 0, 0);
        assert_eq!(lo.chebyshev(hi), i32::MAX);
        assert_eq!(hi.chebyshev(lo), i32::MAX);
        assert!((hi.euclidean(lo) - 4_294_967_295.0).abs() < 1.0);
        assert_eq!(hi.offset(1, 0).x, i32::MIN);
    }
}
