// Generic per-tile multi-bit storage.
//
// `TileDataStore` answers "is data bit N set at (x, y, plane)" over a
// `CoordCodec` and a `SpatialBitSet`, with no knowledge of what the bits
// mean. `CollisionIndex` and `TileClassIndex` give them meaning.
//
// `TileDataWriter` is the build-time counterpart. It is shared by reference
// between region workers; every mutation takes the writer's lock, so
// concurrent calls from many threads are safe. `finish` optimizes the set
// and freezes it into a read-only store whose queries take no lock.
//
// See also: `collision.rs`, `tile_class.rs`, `storage.rs` for persistence.

use parking_lot::Mutex;

use crate::bitset::{AnyBitSet, SpatialBitSet};
use crate::codec::CoordCodec;
use crate::error::Result;

/// Highest data bit `all_bits` can report in its byte.
const ALL_BITS_MAX: u32 = 7;

/// Read-only per-tile data bits.
#[derive(Clone, Debug)]
pub struct TileDataStore<B = AnyBitSet> {
    codec: CoordCodec,
    bits: B,
}

impl<B: SpatialBitSet> TileDataStore<B> {
    pub fn new(codec: CoordCodec, bits: B) -> Self {
        Self { codec, bits }
    }

    pub fn codec(&self) -> &CoordCodec {
        &self.codec
    }

    pub fn bits(&self) -> &B {
        &self.bits
    }

    pub fn into_bits(self) -> B {
        self.bits
    }

    /// Number of stored keys (set bits across all tiles and channels).
    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Whether data bit `bit` is set at the tile. Coordinates are packed
    /// without range checks; bits beyond the layout's channels read as unset.
    #[inline]
    pub fn is_bit_set(&self, x: i32, y: i32, plane: i32, bit: u32) -> bool {
        if bit > self.codec.max_data_bit_index() {
            return false;
        }
        self.bits
            .contains(self.codec.pack_unchecked(x, y, plane, bit))
    }

    /// Like `is_bit_set`, but honors the codec's validation mode.
    pub fn checked_bit(&self, x: i32, y: i32, plane: i32, bit: u32) -> Result<bool> {
        let key = self.codec.encode_with_channel(x, y, plane, bit)?;
        Ok(self.bits.contains(key))
    }

    /// Every set data bit at the tile, bit N of the result for channel N.
    pub fn all_bits(&self, x: i32, y: i32, plane: i32) -> u8 {
        let top = self.codec.max_data_bit_index().min(ALL_BITS_MAX);
        (0..=top)
            .filter(|&bit| self.is_bit_set(x, y, plane, bit))
            .fold(0u8, |acc, bit| acc | (1 << bit))
    }
}

/// Build-time writer, safe to share across worker threads.
#[derive(Debug)]
pub struct TileDataWriter<B = AnyBitSet> {
    codec: CoordCodec,
    bits: Mutex<B>,
}

impl<B: SpatialBitSet> TileDataWriter<B> {
    /// Writer with an empty backend. Validation is always on for writes.
    pub fn new(codec: CoordCodec) -> Self {
        Self::with_bits(codec, B::default())
    }

    pub fn with_bits(codec: CoordCodec, bits: B) -> Self {
        Self {
            codec: codec.with_validation(true),
            bits: Mutex::new(bits),
        }
    }

    pub fn codec(&self) -> &CoordCodec {
        &self.codec
    }

    /// Set one data bit. Returns true if it was newly set.
    pub fn set_bit(&self, x: i32, y: i32, plane: i32, bit: u32) -> Result<bool> {
        let key = self.codec.encode_with_channel(x, y, plane, bit)?;
        Ok(self.bits.lock().add(key))
    }

    /// Clear one data bit. Returns true if it was set.
    pub fn clear_bit(&self, x: i32, y: i32, plane: i32, bit: u32) -> Result<bool> {
        let key = self.codec.encode_with_channel(x, y, plane, bit)?;
        Ok(self.bits.lock().remove(key))
    }

    /// Set every data bit that is 1 in `data`. All keys are validated before
    /// any is written, so a range error leaves the tile untouched.
    pub fn set_bits(&self, x: i32, y: i32, plane: i32, data: u32) -> Result<()> {
        let keys = (0..u32::BITS)
            .filter(|bit| data & (1 << bit) != 0)
            .map(|bit| self.codec.encode_with_channel(x, y, plane, bit))
            .collect::<Result<Vec<u32>>>()?;
        let mut bits = self.bits.lock();
        for key in keys {
            bits.add(key);
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.bits.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Optimize and freeze. The returned store reads without validation.
    pub fn finish(self) -> TileDataStore<B> {
        let mut bits = self.bits.into_inner();
        bits.optimize();
        TileDataStore::new(self.codec.with_validation(false), bits)
    }
}
