// Key-set backends for packed tile keys.
//
// `SpatialBitSet` is the one capability every index store relies on: a set
// of `u32` keys with membership, insertion, removal, ascending iteration and
// a self-describing stream encoding. Two backends implement it:
//
// - `RoaringBitSet` (`compressed.rs`): compressed containers, fast and small for
//   clustered key ranges. Native roaring stream format.
// - `SparseBitSet` (`sparse.rs`): a block tree of plain 2048-bit words,
//   encoded as magic `AC ED` plus a bincode image of the tree.
//
// `AnyBitSet` picks a backend at runtime, which is what file loaders return
// when the format is only known after sniffing the bytes.
//
// All backends follow a load-then-freeze lifecycle: mutate during a build
// (behind the writer's lock), `optimize`, then serve reads only.

pub mod compressed;
pub mod sparse;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use self::compressed::RoaringBitSet;
pub use self::sparse::{SPARSE_MAGIC, SparseBitSet};

/// Which backend a stored set uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Roaring,
    Sparse,
}

impl BackendKind {
    /// The marker substring used in index file names.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Roaring => "roaring",
            BackendKind::Sparse => "sparse",
        }
    }

    /// Guess the backend from the leading bytes of an (uncompressed) stream.
    pub fn sniff(bytes: &[u8]) -> BackendKind {
        if bytes.starts_with(&SPARSE_MAGIC) {
            BackendKind::Sparse
        } else {
            BackendKind::Roaring
        }
    }
}

/// A set of packed `u32` keys.
pub trait SpatialBitSet: Default + Send + Sync {
    fn kind(&self) -> BackendKind;

    fn contains(&self, key: u32) -> bool;

    /// Insert `key`. Returns true if it was not already present.
    fn add(&mut self, key: u32) -> bool;

    /// Remove `key`. Returns true if it was present.
    fn remove(&mut self, key: u32) -> bool;

    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compact the internal representation. Never changes membership.
    fn optimize(&mut self);

    /// All keys in ascending order.
    fn keys(&self) -> Box<dyn Iterator<Item = u32> + '_>;

    fn serialize_into<W: Write>(&self, writer: W) -> Result<()>;

    fn deserialize_from<R: Read>(reader: R) -> Result<Self>
    where
        Self: Sized;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }
}

/// A backend chosen at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyBitSet {
    Roaring(RoaringBitSet),
    Sparse(SparseBitSet),
}

impl AnyBitSet {
    pub fn empty(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Roaring => AnyBitSet::Roaring(RoaringBitSet::default()),
            BackendKind::Sparse => AnyBitSet::Sparse(SparseBitSet::default()),
        }
    }

    /// Decode `bytes`, choosing the backend by its magic.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_as(BackendKind::sniff(bytes), bytes)
    }

    /// Decode `bytes` with a known backend.
    pub fn from_bytes_as(kind: BackendKind, bytes: &[u8]) -> Result<Self> {
        Ok(match kind {
            BackendKind::Roaring => AnyBitSet::Roaring(RoaringBitSet::deserialize_from(bytes)?),
            BackendKind::Sparse => AnyBitSet::Sparse(SparseBitSet::deserialize_from(bytes)?),
        })
    }
}

impl Default for AnyBitSet {
    fn default() -> Self {
        AnyBitSet::empty(BackendKind::default())
    }
}

impl From<RoaringBitSet> for AnyBitSet {
    fn from(set: RoaringBitSet) -> Self {
        AnyBitSet::Roaring(set)
    }
}

impl From<SparseBitSet> for AnyBitSet {
    fn from(set: SparseBitSet) -> Self {
        AnyBitSet::Sparse(set)
    }
}

impl SpatialBitSet for AnyBitSet {
    fn kind(&self) -> BackendKind {
        match self {
            AnyBitSet::Roaring(_) => BackendKind::Roaring,
            AnyBitSet::Sparse(_) => BackendKind::Sparse,
        }
    }

    fn contains(&self, key: u32) -> bool {
        match self {
            AnyBitSet::Roaring(s) => s.contains(key),
            AnyBitSet::Sparse(s) => s.contains(key),
        }
    }

    fn add(&mut self, key: u32) -> bool {
        match self {
            AnyBitSet::Roaring(s) => s.add(key),
            AnyBitSet::Sparse(s) => s.add(key),
        }
    }

    fn remove(&mut self, key: u32) -> bool {
        match self {
            AnyBitSet::Roaring(s) => s.remove(key),
            AnyBitSet::Sparse(s) => s.remove(key),
        }
    }

    fn len(&self) -> u64 {
        match self {
            AnyBitSet::Roaring(s) => s.len(),
            AnyBitSet::Sparse(s) => s.len(),
        }
    }

    fn optimize(&mut self) {
        match self {
            AnyBitSet::Roaring(s) => s.optimize(),
            AnyBitSet::Sparse(s) => s.optimize(),
        }
    }

    fn keys(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            AnyBitSet::Roaring(s) => s.keys(),
            AnyBitSet::Sparse(s) => s.keys(),
        }
    }

    fn serialize_into<W: Write>(&self, writer: W) -> Result<()> {
        match self {
            AnyBitSet::Roaring(s) => s.serialize_into(writer),
            AnyBitSet::Sparse(s) => s.serialize_into(writer),
        }
    }

    /// Buffers the whole stream so the backend can be sniffed from its magic.
    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}
