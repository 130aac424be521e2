// Tile class index: a 4-bit surface classification per tile.
//
// Data channels 0..=3 hold the binary encoding of a class value 0..=15.
// Class 0 means "not a recognized surface" (land, for water navigation);
// anything else is traversable. The known water subtypes live in `surface`.
//
// See also: `collision.rs` (the other index graph generation reads),
// `build.rs` which records classes from per-tile facts.

use std::path::Path;

use crate::bitset::{AnyBitSet, SpatialBitSet};
use crate::codec::CoordCodec;
use crate::error::{IndexError, Result};
use crate::storage;
use crate::tile_data::{TileDataStore, TileDataWriter};

/// Data channels used by the class value.
pub const CLASS_BITS: u32 = 4;

/// Largest storable class value.
pub const MAX_CLASS: u8 = (1 << CLASS_BITS) - 1;

/// Known water surface classes.
pub mod surface {
    pub const NONE: u8 = 0;
    pub const WATER: u8 = 1;
    pub const CRANDOR_SMEGMA: u8 = 2;
    pub const TEMPOR_STORM: u8 = 3;
    pub const DISEASE: u8 = 4;
    pub const KELP: u8 = 5;
    pub const SUNBAKED: u8 = 6;
    pub const JAGGED_REEFS: u8 = 7;
    pub const SHARP_CRYSTAL: u8 = 8;

    /// Display name of a class, if it is one of the known subtypes.
    pub fn name(class: u8) -> Option<&'static str> {
        Some(match class {
            NONE => "None",
            WATER => "Water",
            CRANDOR_SMEGMA => "Crandor/Smegma Water",
            TEMPOR_STORM => "Tempor Storm Water",
            DISEASE => "Disease Water",
            KELP => "Kelp Water",
            SUNBAKED => "Sunbaked Water",
            JAGGED_REEFS => "Jagged Reefs Water",
            SHARP_CRYSTAL => "Sharp Crystal Water",
            _ => return None,
        })
    }
}

/// Per-tile class lookups.
pub trait TileClassQuery {
    /// Class value at the tile, 0 if unclassified.
    fn tile_class(&self, x: i32, y: i32, plane: i32) -> u8;

    fn is_traversable(&self, x: i32, y: i32, plane: i32) -> bool {
        self.tile_class(x, y, plane) != surface::NONE
    }
}

#[derive(Clone, Debug)]
pub struct TileClassIndex<B = AnyBitSet> {
    data: TileDataStore<B>,
}

impl<B: SpatialBitSet> TileClassIndex<B> {
    pub fn new(data: TileDataStore<B>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &TileDataStore<B> {
        &self.data
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        storage::save_bitset(path, self.data.bits())
    }
}

impl TileClassIndex<AnyBitSet> {
    pub fn load(path: &Path, codec: CoordCodec) -> Result<Self> {
        let bits = storage::load_bitset(path)?;
        Ok(Self::new(TileDataStore::new(codec.with_validation(false), bits)))
    }
}

impl<B: SpatialBitSet> TileClassQuery for TileClassIndex<B> {
    fn tile_class(&self, x: i32, y: i32, plane: i32) -> u8 {
        let top = self.data.codec().max_data_bit_index().min(CLASS_BITS - 1);
        (0..=top)
            .filter(|&bit| self.data.is_bit_set(x, y, plane, bit))
            .fold(0u8, |acc, bit| acc | (1 << bit))
    }
}

/// Build-time tile class writer. Shareable across threads.
#[derive(Debug)]
pub struct TileClassWriter<B = AnyBitSet> {
    data: TileDataWriter<B>,
}

impl<B: SpatialBitSet> TileClassWriter<B> {
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

    /// Record `class` at the tile. Bits are only ever added, so writing two
    /// classes to one tile stores their OR.
    pub fn set_tile_class(&self, x: i32, y: i32, plane: i32, class: u8) -> Result<()> {
        if class > MAX_CLASS {
            return Err(IndexError::TileClassOutOfRange(class));
        }
        self.data.set_bits(x, y, plane, u32::from(class))
    }

    pub fn len(&self) -> u64 {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn finish(self) -> TileClassIndex<B> {
        TileClassIndex::new(self.data.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::{RoaringBitSet, SparseBitSet};
    use crate::codec::KeyLayout;

    #[test]
    fn every_class_value_round_trips() {
        let writer: TileClassWriter<RoaringBitSet> =
            TileClassWriter::new(CoordCodec::new(KeyLayout::compact_world()).unwrap());
        for class in 0..=MAX_CLASS {
            writer.set_tile_class(2000 + i32::from(class), 2000, 1, class).unwrap();
        }
        let index = writer.finish();
        for class in 0..=MAX_CLASS {
            assert_eq!(index.tile_class(2000 + i32::from(class), 2000, 1), class);
        }
        assert!(!index.is_traversable(2000, 2000, 1));
        assert!(index.is_traversable(2001, 2000, 1));
        assert_eq!(index.tile_class(2000, 2000, 0), 0);
    }

    #[test]
    fn class_above_four_bits_is_rejected() {
        let writer: TileClassWriter<SparseBitSet> =
            TileClassWriter::new(CoordCodec::new(KeyLayout::compact_world()).unwrap());
        assert!(matches!(
            writer.set_tile_class(2000, 2000, 0, 16),
            Err(IndexError::TileClassOutOfRange(16))
        ));
    }

    #[test]
    fn narrow_layout_cannot_hold_high_classes() {
        let writer: TileClassWriter<SparseBitSet> =
            TileClassWriter::new(CoordCodec::new(KeyLayout::compact_world_signed()).unwrap());
        writer.set_tile_class(2000, 2000, 0, surface::JAGGED_REEFS).unwrap();
        assert!(writer.set_tile_class(2001, 2000, 0, surface::SHARP_CRYSTAL).is_err());
        let index = writer.finish();
        assert_eq!(index.tile_class(2000, 2000, 0), surface::JAGGED_REEFS);
    }

    #[test]
    fn surface_names_cover_known_classes() {
        assert_eq!(surface::name(surface::KELP), Some("Kelp Water"));
        assert_eq!(surface::name(12), None);
    }
}
