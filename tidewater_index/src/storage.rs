// Index file persistence: gzip wrapping and backend detection.
//
// An index file is one serialized `SpatialBitSet`, optionally gzip-wrapped.
// On load, compression is detected from the gzip magic `1F 8B`; the backend
// comes from the file name (`roaring` / `sparse`) when it says, otherwise
// from the payload magic (`AC ED` means sparse, anything else roaring).
//
// Saves encode the complete set into memory first and only then write the
// file, so a failed encode never leaves a partial file behind.
//
// See also: `bitset/` for the two stream formats.

use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info};

use crate::bitset::{AnyBitSet, BackendKind, SpatialBitSet};
use crate::error::{IndexError, Result};

pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

pub fn has_gz_suffix(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Backend named in the file name, if any.
pub fn backend_from_file_name(path: &Path) -> Option<BackendKind> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    [BackendKind::Roaring, BackendKind::Sparse]
        .into_iter()
        .find(|kind| name.contains(kind.name()))
}

/// Conventional file name for an index, e.g. `collision_roaring.dat.gz`.
pub fn index_file_name(stem: &str, kind: BackendKind, gzip: bool) -> String {
    let suffix = if gzip { ".gz" } else { "" };
    format!("{stem}_{}.dat{suffix}", kind.name())
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| IndexError::Format(format!("gzip: {e}")))?;
    Ok(out)
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Read a file and strip gzip wrapping if present.
pub fn read_payload(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read(path)?;
    let compressed = is_gzip(&raw);
    if compressed != has_gz_suffix(path) {
        debug!(
            "{}: file name and contents disagree on compression, trusting contents (gzip = {compressed})",
            path.display()
        );
    }
    if compressed { gunzip(&raw) } else { Ok(raw) }
}

/// Load an index set, detecting compression and backend.
pub fn load_bitset(path: &Path) -> Result<AnyBitSet> {
    let payload = read_payload(path)?;
    let kind = backend_from_file_name(path).unwrap_or_else(|| BackendKind::sniff(&payload));
    let set = AnyBitSet::from_bytes_as(kind, &payload)?;
    info!(
        "loaded {} index {} ({} keys)",
        kind.name(),
        path.display(),
        set.len()
    );
    Ok(set)
}

/// Save an index set, gzip-wrapped when the path ends in `.gz`.
pub fn save_bitset<B: SpatialBitSet>(path: &Path, set: &B) -> Result<()> {
    let mut bytes = set.to_bytes()?;
    if has_gz_suffix(path) {
        bytes = gzip(&bytes)?;
    }
    std::fs::write(path, &bytes)?;
    info!(
        "saved {} index {} ({} keys, {} bytes)",
        set.kind().name(),
        path.display(),
        set.len(),
        bytes.len()
    );
    Ok(())
}
