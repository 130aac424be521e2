// Coordinate key codec: packs (x, y, plane, data channel) into one `u32`.
//
// Bit layout, least significant first:
//
//   [ x : x_bits ][ y : y_bits ][ plane : plane_bits ][ spare ... ]
//
// Each coordinate is stored relative to its base offset. The spare bits above
// the coordinate fields form the data channel: channel 0 is the bare
// coordinate key, channel k >= 1 additionally sets bit
// `total_coord_bits + k - 1`. A store therefore records one independent flag
// per (coordinate, channel) pair in a flat key set.
//
// A codec is either validated (out-of-range fields are errors) or unvalidated
// (fields are masked and silently wrap). Readers use the unvalidated mode on
// hot paths where inputs are already trusted; writers keep validation on.
//
// See also: `tile_data.rs` which pairs a codec with a `SpatialBitSet`,
// `config.rs` where layouts are loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::types::TileCoord;

/// Width of a packed key in bits.
pub const KEY_BITS: u32 = u32::BITS;

/// Bit widths and base offsets for each coordinate field, plus the number of
/// usable key bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLayout {
    pub x_bits: u32,
    pub x_base: i32,
    pub y_bits: u32,
    pub y_base: i32,
    pub plane_bits: u32,
    pub plane_base: i32,
    /// Usable key bits, normally 32 (unsigned view) or 31 (signed view).
    pub capacity: u32,
}

impl KeyLayout {
    /// The standard world layout: x 700..=8891, y 0..=16383, planes 0..=3,
    /// leaving data channels 0..=3.
    pub const fn compact_world() -> Self {
        Self {
            x_bits: 13,
            x_base: 700,
            y_bits: 14,
            y_base: 0,
            plane_bits: 2,
            plane_base: 0,
            capacity: 32,
        }
    }

    /// Same fields as `compact_world` but keeping the top bit clear, for
    /// consumers that read keys as signed 32-bit integers. Data channels 0..=2.
    pub const fn compact_world_signed() -> Self {
        Self {
            capacity: 31,
            ..Self::compact_world()
        }
    }

    /// Sum of the coordinate field widths.
    pub const fn total_coord_bits(&self) -> u32 {
        self.x_bits
            .saturating_add(self.y_bits)
            .saturating_add(self.plane_bits)
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::compact_world()
    }
}

/// Mask covering the low `bits` bits.
const fn low_mask(bits: u32) -> u32 {
    if bits == 0 {
        0
    } else if bits >= KEY_BITS {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Converts tile coordinates to packed keys and back under one `KeyLayout`.
///
/// Pure and `Copy`; share freely between threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordCodec {
    layout: KeyLayout,
    x_mask: u32,
    y_mask: u32,
    plane_mask: u32,
    y_shift: u32,
    plane_shift: u32,
    total_coord_bits: u32,
    max_data_bit_index: u32,
    validate: bool,
}

impl CoordCodec {
    /// Build a validated codec. Fails if the capacity is not in 1..=32 or
    /// the coordinate fields need more bits than the capacity provides.
    pub fn new(layout: KeyLayout) -> Result<Self> {
        if layout.capacity == 0 || layout.capacity > KEY_BITS {
            return Err(IndexError::Capacity(layout.capacity));
        }
        let used = layout.total_coord_bits();
        if used > layout.capacity {
            return Err(IndexError::Layout {
                used,
                x_bits: layout.x_bits,
                y_bits: layout.y_bits,
                plane_bits: layout.plane_bits,
                capacity: layout.capacity,
            });
        }
        Ok(Self {
            layout,
            x_mask: low_mask(layout.x_bits),
            y_mask: low_mask(layout.y_bits),
            plane_mask: low_mask(layout.plane_bits),
            y_shift: layout.x_bits,
            plane_shift: layout.x_bits + layout.y_bits,
            total_coord_bits: used,
            max_data_bit_index: layout.capacity - used,
            validate: true,
        })
    }

    /// Same layout with validation switched on or off.
    pub fn with_validation(self, validate: bool) -> Self {
        Self { validate, ..self }
    }

    /// Re-derive the codec for a different capacity, keeping field widths.
    pub fn with_capacity(self, capacity: u32) -> Result<Self> {
        Self::new(KeyLayout {
            capacity,
            ..self.layout
        })
        .map(|codec| codec.with_validation(self.validate))
    }

    pub fn layout(&self) -> KeyLayout {
        self.layout
    }

    pub fn is_validating(&self) -> bool {
        self.validate
    }

    pub fn total_coord_bits(&self) -> u32 {
        self.total_coord_bits
    }

    /// Highest data channel this layout can encode.
    pub fn max_data_bit_index(&self) -> u32 {
        self.max_data_bit_index
    }

    /// Inclusive `(min, max)` of representable x values.
    pub fn x_range(&self) -> (i64, i64) {
        axis_range(self.layout.x_base, self.x_mask)
    }

    pub fn y_range(&self) -> (i64, i64) {
        axis_range(self.layout.y_base, self.y_mask)
    }

    pub fn plane_range(&self) -> (i64, i64) {
        axis_range(self.layout.plane_base, self.plane_mask)
    }

    /// Key for a bare coordinate (data channel 0).
    pub fn encode(&self, x: i32, y: i32, plane: i32) -> Result<u32> {
        self.encode_with_channel(x, y, plane, 0)
    }

    pub fn encode_coord(&self, coord: TileCoord) -> Result<u32> {
        self.encode(coord.x, coord.y, coord.plane)
    }

    /// Key for a coordinate plus a data channel.
    pub fn encode_with_channel(&self, x: i32, y: i32, plane: i32, channel: u32) -> Result<u32> {
        if self.validate {
            check_axis("X coordinate", x, self.x_range())?;
            check_axis("Y coordinate", y, self.y_range())?;
            check_axis("Plane coordinate", plane, self.plane_range())?;
            if channel > self.max_data_bit_index {
                return Err(IndexError::DataBitOutOfRange {
                    bit: channel,
                    max: self.max_data_bit_index,
                });
            }
        }
        Ok(self.pack_unchecked(x, y, plane, channel))
    }

    /// Mask-and-shift packing with no range checks. Out-of-range fields wrap.
    #[inline]
    pub fn pack_unchecked(&self, x: i32, y: i32, plane: i32, channel: u32) -> u32 {
        let xs = (x.wrapping_sub(self.layout.x_base) as u32) & self.x_mask;
        let ys = (y.wrapping_sub(self.layout.y_base) as u32) & self.y_mask;
        let ps = (plane.wrapping_sub(self.layout.plane_base) as u32) & self.plane_mask;
        xs | ys.checked_shl(self.y_shift).unwrap_or(0)
            | ps.checked_shl(self.plane_shift).unwrap_or(0)
            | self.channel_bit(channel)
    }

    /// The spare bit that represents `channel`, or 0 for channel 0.
    #[inline]
    pub fn channel_bit(&self, channel: u32) -> u32 {
        if channel == 0 {
            0
        } else {
            1u32.wrapping_shl(self.total_coord_bits.wrapping_add(channel - 1))
        }
    }

    /// Recover the coordinate fields of a key, ignoring the data channel.
    pub fn decode(&self, key: u32) -> TileCoord {
        let x = key & self.x_mask;
        let y = key.checked_shr(self.y_shift).unwrap_or(0) & self.y_mask;
        let plane = key.checked_shr(self.plane_shift).unwrap_or(0) & self.plane_mask;
        TileCoord {
            x: (x as i32).wrapping_add(self.layout.x_base),
            y: (y as i32).wrapping_add(self.layout.y_base),
            plane: (plane as i32).wrapping_add(self.layout.plane_base),
        }
    }

    /// Highest data channel set in `key`, or 0 when no spare bit is set.
    pub fn decode_channel(&self, key: u32) -> u32 {
        let spare = key.checked_shr(self.total_coord_bits).unwrap_or(0);
        if spare == 0 {
            0
        } else {
            KEY_BITS - spare.leading_zeros()
        }
    }
}

fn axis_range(base: i32, mask: u32) -> (i64, i64) {
    let min = i64::from(base);
    (min, min + i64::from(mask))
}

fn check_axis(axis: &'static str, value: i32, (min, max): (i64, i64)) -> Result<()> {
    let v = i64::from(value);
    if v < min || v > max {
        return Err(IndexError::OutOfRange {
            axis,
            value,
            min,
            max,
        });
    }
    Ok(())
}
