// Collision index: cardinal and diagonal pathability per tile.
//
// Only two facts are stored per tile, in data channels of a `TileDataStore`:
// channel 0 = "north blocked", channel 1 = "east blocked". Everything else is
// derived:
//
//   south(x, y) = north(x, y - 1)
//   west(x, y)  = east(x - 1, y)
//
// so a wall between two tiles is stored once and answers both tiles. A
// diagonal is open only if both adjacent cardinals are open and the two tiles
// one step away along them have the matching cross direction open, which
// keeps movers from cutting wall corners.
//
// Readers speak "pathable" (true = can move). The writer speaks both
// "pathable" and "blocking" (true = cannot move); the two vocabularies are
// exact inverses. Writes only ever record blocks, so a later non-blocking
// fact never reopens an edge an earlier fact closed.
//
// See also: `tile_data.rs` for the storage layer, `build.rs` which turns
// per-tile wall/object/floor facts into writer calls.

use std::path::Path;

use crate::bitset::{AnyBitSet, SpatialBitSet};
use crate::codec::CoordCodec;
use crate::error::Result;
use crate::storage;
use crate::tile_data::{TileDataStore, TileDataWriter};
use crate::types::DirectionFlags;

pub const NORTH_BLOCKED_BIT: u32 = 0;
pub const EAST_BLOCKED_BIT: u32 = 1;

/// Pathability queries derived from the two stored primitives.
///
/// Implementors provide `pathable_north` and `pathable_east`; the other
/// directions and the combined flag byte follow from them.
pub trait CollisionQuery {
    fn pathable_north(&self, x: i32, y: i32, plane: i32) -> bool;

    fn pathable_east(&self, x: i32, y: i32, plane: i32) -> bool;

    fn pathable_south(&self, x: i32, y: i32, plane: i32) -> bool {
        self.pathable_north(x, y.wrapping_sub(1), plane)
    }

    fn pathable_west(&self, x: i32, y: i32, plane: i32) -> bool {
        self.pathable_east(x.wrapping_sub(1), y, plane)
    }

    /// True when no cardinal direction is open.
    fn is_blocked(&self, x: i32, y: i32, plane: i32) -> bool {
        !self.pathable_north(x, y, plane)
            && !self.pathable_east(x, y, plane)
            && !self.pathable_south(x, y, plane)
            && !self.pathable_west(x, y, plane)
    }

    /// Number of blocked cardinal directions (0..=4).
    fn blocked_cardinals(&self, x: i32, y: i32, plane: i32) -> u32 {
        [
            self.pathable_north(x, y, plane),
            self.pathable_east(x, y, plane),
            self.pathable_south(x, y, plane),
            self.pathable_west(x, y, plane),
        ]
        .iter()
        .filter(|&&open| !open)
        .count() as u32
    }

    /// All eight directions as a flag byte.
    fn all(&self, x: i32, y: i32, plane: i32) -> DirectionFlags {
        let n = self.pathable_north(x, y, plane);
        let e = self.pathable_east(x, y, plane);
        let s = self.pathable_south(x, y, plane);
        let w = self.pathable_west(x, y, plane);
        if !(n || e || s || w) {
            return DirectionFlags::empty();
        }

        // Neighbours wrap at the i32 edges; the key codec masks them anyway.
        let (xl, xr) = (x.wrapping_sub(1), x.wrapping_add(1));
        let (yd, yu) = (y.wrapping_sub(1), y.wrapping_add(1));
        let sw = s && w && self.pathable_west(x, yd, plane) && self.pathable_south(xl, y, plane);
        let se = s && e && self.pathable_east(x, yd, plane) && self.pathable_south(xr, y, plane);
        let nw = n && w && self.pathable_west(x, yu, plane) && self.pathable_north(xl, y, plane);
        let ne = n && e && self.pathable_east(x, yu, plane) && self.pathable_north(xr, y, plane);

        let mut flags = DirectionFlags::empty();
        flags.set(DirectionFlags::NORTH_WEST, nw);
        flags.set(DirectionFlags::NORTH, n);
        flags.set(DirectionFlags::NORTH_EAST, ne);
        flags.set(DirectionFlags::WEST, w);
        flags.set(DirectionFlags::EAST, e);
        flags.set(DirectionFlags::SOUTH_WEST, sw);
        flags.set(DirectionFlags::SOUTH, s);
        flags.set(DirectionFlags::SOUTH_EAST, se);
        flags
    }
}

/// Read-only collision data.
#[derive(Clone, Debug)]
pub struct CollisionIndex<B = AnyBitSet> {
    data: TileDataStore<B>,
}

impl<B: SpatialBitSet> CollisionIndex<B> {
    pub fn new(data: TileDataStore<B>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &TileDataStore<B> {
        &self.data
    }

    pub fn blocked_north(&self, x: i32, y: i32, plane: i32) -> bool {
        self.data.is_bit_set(x, y, plane, NORTH_BLOCKED_BIT)
    }

    pub fn blocked_east(&self, x: i32, y: i32, plane: i32) -> bool {
        self.data.is_bit_set(x, y, plane, EAST_BLOCKED_BIT)
    }

    /// Write the backing set to `path` (gzip if it ends in `.gz`).
    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_bitset(path, self.data.bits())
    }
}

impl CollisionIndex<AnyBitSet> {
    /// Load a collision file, detecting compression and backend.
    pub fn load(path: &Path, codec: CoordCodec) -> Result<Self> {
        let bits = storage::load_bitset(path)?;
        Ok(Self::new(TileDataStore::new(codec.with_validation(false), bits)))
    }
}

impl<B: SpatialBitSet> CollisionQuery for CollisionIndex<B> {
    #[inline]
    fn pathable_north(&self, x: i32, y: i32, plane: i32) -> bool {
        !self.blocked_north(x, y, plane)
    }

    #[inline]
    fn pathable_east(&self, x: i32, y: i32, plane: i32) -> bool {
        !self.blocked_east(x, y, plane)
    }
}

/// Build-time collision writer. Shareable across threads.
#[derive(Debug)]
pub struct CollisionWriter<B = AnyBitSet> {
    data: TileDataWriter<B>,
}

impl<B: SpatialBitSet> CollisionWriter<B> {
    pub fn new(codec: CoordCodec) -> Self {
        Self {
            data: TileDataWriter::new(codec),
        }
    }

    pub fn with_bits(codec: CoordCodec, bits: B) -> Self {
        Self {
            data: TileDataWriter::with_bits(codec, bits),
        }
    }

    pub fn set_pathable_north(&self, x: i32, y: i32, plane: i32, pathable: bool) -> Result<()> {
        if !pathable {
            self.data.set_bit(x, y, plane, NORTH_BLOCKED_BIT)?;
        }
        Ok(())
    }

    pub fn set_pathable_east(&self, x: i32, y: i32, plane: i32, pathable: bool) -> Result<()> {
        if !pathable {
            self.data.set_bit(x, y, plane, EAST_BLOCKED_BIT)?;
        }
        Ok(())
    }

    /// Stored as the north edge of the tile below.
    pub fn set_pathable_south(&self, x: i32, y: i32, plane: i32, pathable: bool) -> Result<()> {
        self.set_pathable_north(x, y.wrapping_sub(1), plane, pathable)
    }

    /// Stored as the east edge of the tile to the left.
    pub fn set_pathable_west(&self, x: i32, y: i32, plane: i32, pathable: bool) -> Result<()> {
        self.set_pathable_east(x.wrapping_sub(1), y, plane, pathable)
    }

    pub fn north_blocking(&self, x: i32, y: i32, plane: i32, blocking: bool) -> Result<()> {
        self.set_pathable_north(x, y, plane, !blocking)
    }

    pub fn east_blocking(&self, x: i32, y: i32, plane: i32, blocking: bool) -> Result<()> {
        self.set_pathable_east(x, y, plane, !blocking)
    }

    pub fn south_blocking(&self, x: i32, y: i32, plane: i32, blocking: bool) -> Result<()> {
        self.set_pathable_south(x, y, plane, !blocking)
    }

    pub fn west_blocking(&self, x: i32, y: i32, plane: i32, blocking: bool) -> Result<()> {
        self.set_pathable_west(x, y, plane, !blocking)
    }

    /// Block (or leave open) all four sides of a tile.
    pub fn full_blocking(&self, x: i32, y: i32, plane: i32, blocking: bool) -> Result<()> {
        self.north_blocking(x, y, plane, blocking)?;
        self.east_blocking(x, y, plane, blocking)?;
        self.south_blocking(x, y, plane, blocking)?;
        self.west_blocking(x, y, plane, blocking)
    }

    pub fn len(&self) -> u64 {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn finish(self) -> CollisionIndex<B> {
        CollisionIndex::new(self.data.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::{RoaringBitSet, SparseBitSet};
    use crate::codec::KeyLayout;
    use proptest::prelude::*;

    const X: i32 = 3200;
    const Y: i32 = 3200;

    fn writer() -> CollisionWriter<RoaringBitSet> {
        CollisionWriter::new(CoordCodec::new(KeyLayout::compact_world()).unwrap())
    }

    #[test]
    fn open_field_is_pathable_everywhere() {
        let index = writer().finish();
        assert_eq!(index.all(X, Y, 0), DirectionFlags::all());
        assert!(!index.is_blocked(X, Y, 0));
        assert_eq!(index.blocked_cardinals(X, Y, 0), 0);
    }

    #[test]
    fn queries_at_the_integer_edges_do_not_overflow() {
        struct Open;
        impl CollisionQuery for Open {
            fn pathable_north(&self, _: i32, _: i32, _: i32) -> bool {
                true
            }
            fn pathable_east(&self, _: i32, _: i32, _: i32) -> bool {
                true
            }
        }
        let index = writer().finish();
        for (x, y) in [(i32::MAX, 0), (i32::MIN, 0), (0, i32::MAX), (i32::MIN, i32::MIN)] {
            assert_eq!(Open.all(x, y, 0), DirectionFlags::all());
            assert!(!Open.is_blocked(x, y, 0));
            assert_eq!(index.all(x, y, 0), DirectionFlags::all());
        }
        let w = writer();
        assert!(w.south_blocking(0, i32::MIN, 0, true).is_err());
        assert!(w.west_blocking(i32::MIN, 0, 0, true).is_err());
    }

    #[test]
    fn blocking_and_pathable_vocabularies_are_inverse() {
        let w = writer();
        w.north_blocking(X, Y, 0, true).unwrap();
        w.set_pathable_east(X, Y, 0, false).unwrap();
        w.north_blocking(X + 5, Y, 0, false).unwrap();
        w.set_pathable_east(X + 5, Y, 0, true).unwrap();
        let index = w.finish();

        assert!(!index.pathable_north(X, Y, 0));
        assert!(index.blocked_north(X, Y, 0));
        assert!(!index.pathable_east(X, Y, 0));
        assert!(index.blocked_east(X, Y, 0));
        assert!(index.pathable_north(X + 5, Y, 0));
        assert!(index.pathable_east(X + 5, Y, 0));
    }

    #[test]
    fn south_and_west_writes_land_on_neighbors() {
        let w = writer();
        w.south_blocking(X, Y, 0, true).unwrap();
        w.west_blocking(X, Y, 0, true).unwrap();
        let index = w.finish();

        assert!(!index.pathable_south(X, Y, 0));
        assert!(!index.pathable_north(X, Y - 1, 0));
        assert!(!index.pathable_west(X, Y, 0));
        assert!(!index.pathable_east(X - 1, Y, 0));
        assert!(index.pathable_north(X, Y, 0));
        assert!(index.pathable_east(X, Y, 0));
    }

    #[test]
    fn full_blocking_isolates_a_tile() {
        let w = writer();
        w.full_blocking(X, Y, 0, true).unwrap();
        let index = w.finish();
        assert!(index.is_blocked(X, Y, 0));
        assert_eq!(index.all(X, Y, 0), DirectionFlags::empty());
        assert!(!index.pathable_south(X, Y + 1, 0));
        assert!(!index.pathable_west(X + 1, Y, 0));
        assert!(index.pathable_north(X, Y + 1, 0));
    }

    #[test]
    fn later_open_fact_does_not_reopen_a_block() {
        let w = writer();
        w.east_blocking(X, Y, 0, true).unwrap();
        w.east_blocking(X, Y, 0, false).unwrap();
        assert!(!w.finish().pathable_east(X, Y, 0));
    }

    #[test]
    fn each_supporting_edge_clears_only_its_diagonal() {
        // (diagonal, supporting edge as (dx, dy, north?))
        let cases = [
            (DirectionFlags::NORTH_EAST, (0, 1, false)),
            (DirectionFlags::NORTH_EAST, (1, 0, true)),
            (DirectionFlags::NORTH_WEST, (-1, 1, false)),
            (DirectionFlags::NORTH_WEST, (-1, 0, true)),
            (DirectionFlags::SOUTH_EAST, (0, -1, false)),
            (DirectionFlags::SOUTH_EAST, (1, -1, true)),
            (DirectionFlags::SOUTH_WEST, (-1, -1, false)),
            (DirectionFlags::SOUTH_WEST, (-1, -1, true)),
        ];
        for (diagonal, (dx, dy, north)) in cases {
            let w = writer();
            if north {
                w.north_blocking(X + dx, Y + dy, 0, true).unwrap();
            } else {
                w.east_blocking(X + dx, Y + dy, 0, true).unwrap();
            }
            let flags = w.finish().all(X, Y, 0);
            assert_eq!(
                flags,
                DirectionFlags::all() - diagonal,
                "blocking {} of ({dx}, {dy}) should only clear {diagonal:?}",
                if north { "north" } else { "east" }
            );
        }
    }

    #[test]
    fn blocked_cardinal_closes_adjacent_diagonals() {
        let w = writer();
        w.north_blocking(X, Y, 0, true).unwrap();
        let flags = w.finish().all(X, Y, 0);
        assert_eq!(
            flags,
            DirectionFlags::all()
                - DirectionFlags::NORTH
                - DirectionFlags::NORTH_EAST
                - DirectionFlags::NORTH_WEST
        );
    }

    #[derive(Clone, Copy, Debug)]
    enum Op {
        North(i32, i32, bool),
        East(i32, i32, bool),
        South(i32, i32, bool),
        West(i32, i32, bool),
        Full(i32, i32, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        let coord = (0i32..6, 0i32..6, any::<bool>());
        prop_oneof![
            coord.clone().prop_map(|(x, y, b)| Op::North(x, y, b)),
            coord.clone().prop_map(|(x, y, b)| Op::East(x, y, b)),
            coord.clone().prop_map(|(x, y, b)| Op::South(x, y, b)),
            coord.clone().prop_map(|(x, y, b)| Op::West(x, y, b)),
            coord.prop_map(|(x, y, b)| Op::Full(x, y, b)),
        ]
    }

    proptest! {
        #[test]
        fn derived_directions_hold_for_any_write_sequence(ops in prop::collection::vec(op(), 0..40)) {
            let w: CollisionWriter<SparseBitSet> =
                CollisionWriter::new(CoordCodec::new(KeyLayout::compact_world()).unwrap());
            for op in ops {
                match op {
                    Op::North(x, y, b) => w.north_blocking(X + x, Y + y, 0, b).unwrap(),
                    Op::East(x, y, b) => w.east_blocking(X + x, Y + y, 0, b).unwrap(),
                    Op::South(x, y, b) => w.south_blocking(X + x, Y + y, 0, b).unwrap(),
                    Op::West(x, y, b) => w.west_blocking(X + x, Y + y, 0, b).unwrap(),
                    Op::Full(x, y, b) => w.full_blocking(X + x, Y + y, 0, b).unwrap(),
                }
            }
            let index = w.finish();
            for x in X - 2..X + 8 {
                for y in Y - 2..Y + 8 {
                    prop_assert_eq!(index.pathable_north(x, y, 0), !index.blocked_north(x, y, 0));
                    prop_assert_eq!(index.pathable_east(x, y, 0), !index.blocked_east(x, y, 0));
                    prop_assert_eq!(index.pathable_south(x, y, 0), index.pathable_north(x, y - 1, 0));
                    prop_assert_eq!(index.pathable_west(x, y, 0), index.pathable_east(x - 1, y, 0));
                    let flags = index.all(x, y, 0);
                    prop_assert_eq!(flags.contains(DirectionFlags::NORTH), index.pathable_north(x, y, 0));
                    prop_assert_eq!(flags.is_empty(), index.is_blocked(x, y, 0));
                }
            }
        }
    }
}
