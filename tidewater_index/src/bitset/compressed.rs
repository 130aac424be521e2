// Compressed bitmap backend over `roaring::RoaringBitmap`.
//
// Stream format is roaring's portable serialization, unmodified, so files are
// readable by any roaring implementation.

use std::io::{self, Read, Write};

use ::roaring::RoaringBitmap;

use super::{BackendKind, SpatialBitSet};
use crate::error::{IndexError, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoaringBitSet {
    bitmap: RoaringBitmap,
}

impl RoaringBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.bitmap
    }
}

impl FromIterator<u32> for RoaringBitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            bitmap: iter.into_iter().collect(),
        }
    }
}

impl SpatialBitSet for RoaringBitSet {
    fn kind(&self) -> BackendKind {
        BackendKind::Roaring
    }

    fn contains(&self, key: u32) -> bool {
        self.bitmap.contains(key)
    }

    fn add(&mut self, key: u32) -> bool {
        self.bitmap.insert(key)
    }

    fn remove(&mut self, key: u32) -> bool {
        self.bitmap.remove(key)
    }

    fn len(&self) -> u64 {
        self.bitmap.len()
    }

    /// Rebuilds the bitmap from its sorted keys, which drops the slack left
    /// behind by removals and growth.
    fn optimize(&mut self) {
        if let Ok(compact) = RoaringBitmap::from_sorted_iter(self.bitmap.iter()) {
            self.bitmap = compact;
        }
    }

    fn keys(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(self.bitmap.iter())
    }

    fn serialize_into<W: Write>(&self, writer: W) -> Result<()> {
        self.bitmap.serialize_into(writer)?;
        Ok(())
    }

    fn deserialize_from<R: Read>(reader: R) -> Result<Self> {
        let bitmap = RoaringBitmap::deserialize_from(reader).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
                IndexError::Format(format!("roaring bitmap: {e}"))
            }
            _ => IndexError::Io(e),
        })?;
        Ok(Self { bitmap })
    }
}
