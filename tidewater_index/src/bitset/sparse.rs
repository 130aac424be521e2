// Sparse bit-array backend: a `BTreeMap` of fixed 2048-bit blocks.
//
// Each block covers keys `[block << 11, (block + 1) << 11)` as 32 `u64`
// words. Only blocks with at least one set bit are kept, so memory tracks the
// number of occupied neighborhoods rather than the key range.
//
// Stream layout:
//   bytes 0-1:  magic `AC ED`
//   bytes 2-3:  stream version, big-endian u16 (= 1)
//   rest:       bincode encoding of the block map
//
// The encoding is a generic serde image of the tree rather than a bespoke
// layout; it is larger and slower to parse than the roaring format.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use super::{BackendKind, SpatialBitSet};
use crate::error::{IndexError, Result};

pub const SPARSE_MAGIC: [u8; 2] = [0xAC, 0xED];
pub const SPARSE_STREAM_VERSION: u16 = 1;

const WORD_BITS: u32 = u64::BITS;
const WORDS_PER_BLOCK: usize = 32;
const BLOCK_SHIFT: u32 = 11;
const BLOCK_OFFSET_MASK: u32 = (1 << BLOCK_SHIFT) - 1;

type Block = [u64; WORDS_PER_BLOCK];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseBitSet {
    blocks: BTreeMap<u32, Block>,
    #[serde(skip)]
    len: u64,
}

#[inline]
fn locate(key: u32) -> (u32, usize, u64) {
    let block = key >> BLOCK_SHIFT;
    let offset = key & BLOCK_OFFSET_MASK;
    let word = (offset / WORD_BITS) as usize;
    let mask = 1u64 << (offset % WORD_BITS);
    (block, word, mask)
}

impl SparseBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn recount(&mut self) {
        self.len = self
            .blocks
            .values()
            .flat_map(|words| words.iter())
            .map(|w| u64::from(w.count_ones()))
            .sum();
    }
}

impl FromIterator<u32> for SparseBitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::default();
        for key in iter {
            set.add(key);
        }
        set
    }
}

impl SpatialBitSet for SparseBitSet {
    fn kind(&self) -> BackendKind {
        BackendKind::Sparse
    }

    fn contains(&self, key: u32) -> bool {
        let (block, word, mask) = locate(key);
        self.blocks
            .get(&block)
            .is_some_and(|words| words[word] & mask != 0)
    }

    fn add(&mut self, key: u32) -> bool {
        let (block, word, mask) = locate(key);
        let words = self.blocks.entry(block).or_insert([0; WORDS_PER_BLOCK]);
        if words[word] & mask != 0 {
            return false;
        }
        words[word] |= mask;
        self.len += 1;
        true
    }

    fn remove(&mut self, key: u32) -> bool {
        let (block, word, mask) = locate(key);
        let Some(words) = self.blocks.get_mut(&block) else {
            return false;
        };
        if words[word] & mask == 0 {
            return false;
        }
        words[word] &= !mask;
        self.len -= 1;
        if words.iter().all(|&w| w == 0) {
            self.blocks.remove(&block);
        }
        true
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn optimize(&mut self) {
        self.blocks.retain(|_, words| words.iter().any(|&w| w != 0));
    }

    fn keys(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        Box::new(self.blocks.iter().flat_map(|(&block, words)| {
            let block_base = block << BLOCK_SHIFT;
            words.iter().enumerate().flat_map(move |(i, &word)| WordBits {
                word,
                base: block_base + i as u32 * WORD_BITS,
            })
        }))
    }

    fn serialize_into<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&SPARSE_MAGIC)?;
        writer.write_all(&SPARSE_STREAM_VERSION.to_be_bytes())?;
        bincode::serialize_into(writer, &self.blocks)?;
        Ok(())
    }

    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                IndexError::Format("sparse bitset: truncated header".into())
            }
            _ => IndexError::Io(e),
        })?;
        if header[..2] != SPARSE_MAGIC[..] {
            return Err(IndexError::Format(format!(
                "sparse bitset: bad magic {:02X} {:02X}",
                header[0], header[1]
            )));
        }
        let version = u16::from_be_bytes([header[2], header[3]]);
        if version != SPARSE_STREAM_VERSION {
            return Err(IndexError::Format(format!(
                "sparse bitset: unsupported stream version {version}"
            )));
        }
        let blocks: BTreeMap<u32, Block> =
            bincode::deserialize_from(reader).map_err(|e| match *e {
                bincode::ErrorKind::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    IndexError::Format("sparse bitset: truncated block data".into())
                }
                other => IndexError::Serialization(Box::new(other)),
            })?;
        let mut set = Self { blocks, len: 0 };
        set.optimize();
        set.recount();
        Ok(set)
    }
}

/// Iterates the set bit positions of one word, offset by `base`.
struct WordBits {
    word: u64,
    base: u32,
}

impl Iterator for WordBits {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros();
        self.word &= self.word - 1;
        Some(self.base + bit)
    }
}
