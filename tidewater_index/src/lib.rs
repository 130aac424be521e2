// Packed-key spatial indexes for a tile world.
//
// This crate compiles per-tile facts (walls, floors, placed objects, surface
// classes) into compact bitmap-backed indexes and serves read queries over
// them. Every index is the same shape underneath: a `CoordCodec` packs
// (x, y, plane, data channel) into a single `u32` key, and a `SpatialBitSet`
// backend records which keys are present.
//
// Module overview:
// - `types.rs`:      `TileCoord` and the 8-direction `DirectionFlags` byte.
// - `error.rs`:      `IndexError` taxonomy (layout, range, format, I/O).
// - `codec.rs`:      `KeyLayout` and `CoordCodec`, the bit packing layer.
// - `bitset/`:       `SpatialBitSet` trait with roaring and sparse backends.
// - `tile_data.rs`:  `TileDataStore` / `TileDataWriter`, generic multi-bit
//                    per-tile storage on top of a codec and a backend.
// - `collision.rs`:  `CollisionIndex` (pathability queries) and its writer.
// - `tile_class.rs`: `TileClassIndex` (4-bit surface class) and its writer.
// - `objects.rs`:    `ObjectIndex` tile -> object id lists, file v1/v2.
// - `varint.rs`:     7-bit continuation integer encoding shared by formats.
// - `storage.rs`:    index file load/save, gzip and backend detection.
// - `build.rs`:      per-tile fact compilation and the parallel region driver.
// - `config.rs`:     `IndexConfig` loaded from JSON.
//
// Writers are shared across worker threads during a build; readers are
// immutable after load and need no synchronization.

pub mod bitset;
pub mod build;
pub mod codec;
pub mod collision;
pub mod config;
pub mod error;
pub mod objects;
pub mod storage;
pub mod tile_class;
pub mod tile_data;
pub mod types;
pub mod varint;

pub use error::{IndexError, Result};
pub use types::{DirectionFlags, TileCoord};
