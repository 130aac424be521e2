// Object index: which placed objects occupy each tile.
//
// Keys are packed tile coordinates (13-bit x, 15-bit y, 4-bit plane) held in
// a `u64`. Each key maps to an ordered list of object ids: insertion order,
// duplicates kept, since one object can legitimately be placed on a tile more
// than once.
//
// File formats (all fixed-width integers big-endian):
//
//   v1:  i32 version = 1, i32 entry count,
//        per entry: i64 coordinate, i32 object count, count x i32 id
//   v2:  i32 version = 2, varint entry count,
//        per entry: varint coordinate delta from the previous entry,
//                   varint object count, count x varint id
//
// Entries are always written in ascending coordinate order; the reader
// relies on it for binary search.
//
// See also: `varint.rs`, `build.rs` which records objects per tile.

use std::io::{Read, Write};
use std::path::Path;

use log::info;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::types::TileCoord;
use crate::varint::{
    read_i32_be, read_i64_be, read_var_u32, read_var_u64, write_var_u32, write_var_u64,
};

/// Upper bound on entries accepted when loading a file.
pub const MAX_ENTRIES: usize = 10_000_000;

/// Upper bound on objects per tile accepted when loading a file.
pub const MAX_OBJECTS_PER_TILE: usize = 1000;

const X_BITS: u32 = 13;
const Y_BITS: u32 = 15;
const PLANE_BITS: u32 = 4;

/// Pack a tile into an object index key. Fields are masked to width.
pub const fn pack_object_coord(x: i32, y: i32, plane: i32) -> u64 {
    let x = (x as u64) & ((1 << X_BITS) - 1);
    let y = (y as u64) & ((1 << Y_BITS) - 1);
    let plane = (plane as u64) & ((1 << PLANE_BITS) - 1);
    x | y << X_BITS | plane << (X_BITS + Y_BITS)
}

pub const fn unpack_object_coord(key: u64) -> TileCoord {
    TileCoord {
        x: (key & ((1 << X_BITS) - 1)) as i32,
        y: ((key >> X_BITS) & ((1 << Y_BITS) - 1)) as i32,
        plane: ((key >> (X_BITS + Y_BITS)) & ((1 << PLANE_BITS) - 1)) as i32,
    }
}

/// Object index file version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFileVersion {
    V1,
    #[default]
    V2,
}

impl ObjectFileVersion {
    pub fn number(self) -> i32 {
        match self {
            ObjectFileVersion::V1 => 1,
            ObjectFileVersion::V2 => 2,
        }
    }

    pub fn from_number(n: i32) -> Option<Self> {
        match n {
            1 => Some(ObjectFileVersion::V1),
            2 => Some(ObjectFileVersion::V2),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Build-time object recorder. Shareable across threads.
#[derive(Debug, Default)]
pub struct ObjectIndexWriter {
    entries: Mutex<FxHashMap<u64, Vec<i32>>>,
}

impl ObjectIndexWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&self, x: i32, y: i32, plane: i32, object_id: i32) {
        self.entries
            .lock()
            .entry(pack_object_coord(x, y, plane))
            .or_default()
            .push(object_id);
    }

    /// Number of tiles with at least one object.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_objects(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    /// Freeze into a sorted, queryable index.
    pub fn finish(self) -> ObjectIndex {
        let mut index = ObjectIndex::default();
        let mut entries: Vec<(u64, Vec<i32>)> = self.entries.into_inner().into_iter().collect();
        entries.sort_unstable_by_key(|&(coord, _)| coord);
        for (coord, ids) in entries {
            index.push_entry(coord, ids);
        }
        index
    }
}

fn checked_i32(n: usize, what: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| IndexError::Format(format!("{what} {n} exceeds i32")))
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read-only object lookups over sorted flat arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectIndex {
    version: ObjectFileVersion,
    coordinates: Vec<u64>,
    /// `offsets[i]..offsets[i + 1]` is entry i's slice of `object_ids`.
    offsets: Vec<usize>,
    object_ids: Vec<i32>,
}

impl ObjectIndex {
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let raw_version = read_i32_be(reader)?;
        let version = ObjectFileVersion::from_number(raw_version).ok_or_else(|| {
            IndexError::Format(format!("unsupported object index version {raw_version}"))
        })?;
        let mut index = ObjectIndex {
            version,
            ..ObjectIndex::default()
        };

        match version {
            ObjectFileVersion::V1 => {
                let count = checked_count(i64::from(read_i32_be(reader)?), MAX_ENTRIES, "entry count")?;
                for _ in 0..count {
                    let coord = read_i64_be(reader)?;
                    let coord = u64::try_from(coord).map_err(|_| {
                        IndexError::Format(format!("negative coordinate key {coord}"))
                    })?;
                    let n = checked_count(
                        i64::from(read_i32_be(reader)?),
                        MAX_OBJECTS_PER_TILE,
                        "object count",
                    )?;
                    let ids = (0..n).map(|_| read_i32_be(reader)).collect::<Result<Vec<_>>>()?;
                    index.push_loaded(coord, ids)?;
                }
            }
            ObjectFileVersion::V2 => {
                let count = checked_count(read_var_u64(reader)?, MAX_ENTRIES, "entry count")?;
                let mut coord = 0u64;
                for i in 0..count {
                    let delta = read_var_u64(reader)?;
                    if i > 0 && delta == 0 {
                        return Err(IndexError::Format(format!("duplicate coordinate {coord}")));
                    }
                    coord = coord
                        .checked_add(delta)
                        .ok_or_else(|| IndexError::Format("coordinate delta overflow".into()))?;
                    let n = checked_count(read_var_u64(reader)?, MAX_OBJECTS_PER_TILE, "object count")?;
                    let ids = (0..n)
                        .map(|_| read_var_u32(reader).map(|id| id as i32))
                        .collect::<Result<Vec<_>>>()?;
                    index.push_loaded(coord, ids)?;
                }
            }
        }
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let index = Self::read_from(&mut bytes.as_slice())?;
        info!(
            "loaded object index {} ({:?}, {} tiles, {} objects)",
            path.display(),
            index.version,
            index.len(),
            index.total_objects()
        );
        Ok(index)
    }

    /// Encode in the given file version. Entries are already sorted.
    pub fn write_to<W: Write>(&self, writer: &mut W, version: ObjectFileVersion) -> Result<()> {
        writer.write_all(&version.number().to_be_bytes())?;
        match version {
            ObjectFileVersion::V1 => {
                writer.write_all(&checked_i32(self.len(), "entry count")?.to_be_bytes())?;
                for (coord, ids) in self.raw_entries() {
                    writer.write_all(&(coord as i64).to_be_bytes())?;
                    writer.write_all(&checked_i32(ids.len(), "object count")?.to_be_bytes())?;
                    for id in ids {
                        writer.write_all(&id.to_be_bytes())?;
                    }
                }
            }
            ObjectFileVersion::V2 => {
                write_var_u64(writer, self.len() as u64)?;
                let mut previous = 0u64;
                for (coord, ids) in self.raw_entries() {
                    write_var_u64(writer, coord - previous)?;
                    previous = coord;
                    write_var_u64(writer, ids.len() as u64)?;
                    for &id in ids {
                        write_var_u32(writer, id as u32)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Write the whole index to `path` in one go.
    pub fn save(&self, path: &Path, version: ObjectFileVersion) -> Result<()> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, version)?;
        std::fs::write(path, &buf)?;
        info!(
            "saved object index {} ({} tiles, {} bytes, {version:?})",
            path.display(),
            self.len(),
            buf.len()
        );
        Ok(())
    }

    fn raw_entries(&self) -> impl Iterator<Item = (u64, &[i32])> + '_ {
        self.coordinates
            .iter()
            .enumerate()
            .map(|(i, &coord)| (coord, &self.object_ids[self.offsets[i]..self.offsets[i + 1]]))
    }

    fn push_entry(&mut self, coord: u64, ids: Vec<i32>) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.coordinates.push(coord);
        self.object_ids.extend(ids);
        self.offsets.push(self.object_ids.len());
    }

    fn push_loaded(&mut self, coord: u64, ids: Vec<i32>) -> Result<()> {
        if self.coordinates.last().is_some_and(|&last| last >= coord) {
            return Err(IndexError::Format(format!(
                "object index entries out of order at coordinate {coord}"
            )));
        }
        self.push_entry(coord, ids);
        Ok(())
    }

    pub fn version(&self) -> ObjectFileVersion {
        self.version
    }

    /// Objects on the tile in insertion order; empty if none.
    pub fn objects_at(&self, x: i32, y: i32, plane: i32) -> &[i32] {
        match self.coordinates.binary_search(&pack_object_coord(x, y, plane)) {
            Ok(i) => &self.object_ids[self.offsets[i]..self.offsets[i + 1]],
            Err(_) => &[],
        }
    }

    pub fn has_objects(&self, x: i32, y: i32, plane: i32) -> bool {
        !self.objects_at(x, y, plane).is_empty()
    }

    /// Number of tiles with objects.
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn total_objects(&self) -> usize {
        self.object_ids.len()
    }

    /// All entries in ascending coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, &[i32])> + '_ {
        self.raw_entries()
            .map(|(coord, ids)| (unpack_object_coord(coord), ids))
    }
}

fn checked_count<T>(raw: T, max: usize, what: &str) -> Result<usize>
where
    T: TryInto<usize> + Copy + std::fmt::Display,
{
    match raw.try_into() {
        Ok(n) if n <= max => Ok(n),
        _ => Err(IndexError::Format(format!("{what} {raw} outside [0, {max}]"))),
    }
}
