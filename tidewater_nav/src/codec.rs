// GWEB graph file format.
//
// Layout (integers big-endian):
//
//   bytes 0-3   magic "GWEB"
//   byte  4     version (1)
//   bytes 5-8   node blob length, i32
//   ...         node blob: the node keys as a serialized bit set
//   ...         edge count, varint
//   per edge    source key u32, target key u32, tile class mask u16
//
// The node blob is written with the roaring backend; readers accept either
// backend, told apart by the blob's magic. Edges are written sorted by
// `EdgeKey` so the same graph always produces the same bytes. Any defect
// (bad magic, unknown version, short read, an edge to a missing node, a
// duplicate edge) fails the whole load.
//
// See also: `tidewater_index::varint` for the integer helpers,
// `tidewater_index::bitset` for the blob formats.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::info;
use tidewater_index::IndexError;
use tidewater_index::bitset::{AnyBitSet, RoaringBitSet, SpatialBitSet};
use tidewater_index::varint::{read_i32_be, read_u8, read_u16_be, read_var_u64, write_var_u64};

use crate::error::NavError;
use crate::graph::{NavEdge, NavGraph, NodeKey, TileClassMask};

pub const GRAPH_MAGIC: [u8; 4] = *b"GWEB";
pub const GRAPH_VERSION: u8 = 1;

/// Upper bound on the edge count field, far above any real web.
pub const MAX_EDGES: u64 = 100_000_000;

/// Report wire-level format problems as graph format errors.
fn flatten(e: IndexError) -> NavError {
    match e {
        IndexError::Format(msg) => NavError::Format(msg),
        other => NavError::Index(other),
    }
}

pub fn write_graph<W: Write>(graph: &NavGraph, writer: &mut W) -> Result<(), NavError> {
    let nodes: RoaringBitSet = graph.nodes().iter().map(|node| node.key.0).collect();
    let blob = nodes.to_bytes()?;
    let blob_len = i32::try_from(blob.len())
        .map_err(|_| NavError::Format(format!("node blob of {} bytes is too large", blob.len())))?;

    writer.write_all(&GRAPH_MAGIC)?;
    writer.write_all(&[GRAPH_VERSION])?;
    writer.write_all(&blob_len.to_be_bytes())?;
    writer.write_all(&blob)?;

    let mut edges: Vec<&NavEdge> = graph.edges().iter().collect();
    edges.sort_by_key(|edge| edge.key());
    write_var_u64(writer, edges.len() as u64)?;
    for edge in edges {
        writer.write_all(&edge.source.0.to_be_bytes())?;
        writer.write_all(&edge.target.0.to_be_bytes())?;
        writer.write_all(&edge.tile_classes.bits().to_be_bytes())?;
    }
    Ok(())
}

pub fn read_graph<R: Read>(reader: &mut R) -> Result<NavGraph, NavError> {
    let mut magic = [0u8; 4];
    for byte in &mut magic {
        *byte = read_u8(reader).map_err(flatten)?;
    }
    if magic != GRAPH_MAGIC {
        return Err(NavError::Format(format!("bad magic {magic:02X?}")));
    }
    let version = read_u8(reader).map_err(flatten)?;
    if version != GRAPH_VERSION {
        return Err(NavError::Format(format!("unsupported version {version}")));
    }

    let blob_len = read_i32_be(reader).map_err(flatten)?;
    let blob_len = u64::try_from(blob_len)
        .map_err(|_| NavError::Format(format!("negative node blob length {blob_len}")))?;
    let mut blob = Vec::new();
    reader.by_ref().take(blob_len).read_to_end(&mut blob)?;
    if blob.len() as u64 != blob_len {
        return Err(NavError::Format(format!(
            "node blob truncated: {} of {blob_len} bytes",
            blob.len()
        )));
    }

    let mut graph = NavGraph::new();
    let nodes = AnyBitSet::from_bytes(&blob).map_err(flatten)?;
    for key in nodes.keys() {
        graph.add_node(NodeKey(key).coord())?;
    }

    let edge_count = read_var_u64(reader).map_err(flatten)?;
    if edge_count > MAX_EDGES {
        return Err(NavError::Format(format!("edge count {edge_count} exceeds limit")));
    }
    for index in 0..edge_count {
        let source = NodeKey(read_i32_be(reader).map_err(flatten)? as u32);
        let target = NodeKey(read_i32_be(reader).map_err(flatten)? as u32);
        let mask = TileClassMask(read_u16_be(reader).map_err(flatten)?);
        graph
            .add_edge(source, target, mask)
            .map_err(|e| NavError::Format(format!("edge {index}: {e}")))?;
    }
    Ok(graph)
}

/// Encode `graph` into a fresh buffer.
pub fn encode_graph(graph: &NavGraph) -> Result<Vec<u8>, NavError> {
    let mut buf = Vec::new();
    write_graph(graph, &mut buf)?;
    Ok(buf)
}

/// Write a graph file. The file is only created once the whole graph has
/// been encoded.
pub fn save_graph(graph: &NavGraph, path: &Path) -> Result<(), NavError> {
    let bytes = encode_graph(graph)?;
    std::fs::write(path, &bytes)?;
    info!(
        "saved water web {} ({} nodes, {} edges, {} bytes)",
        path.display(),
        graph.node_count(),
        graph.edge_count(),
        bytes.len()
    );
    Ok(())
}

pub fn load_graph(path: &Path) -> Result<NavGraph, NavError> {
    let mut reader = BufReader::new(File::open(path)?);
    let graph = read_graph(&mut reader)?;
    info!(
        "loaded water web {} ({} nodes, {} edges)",
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}
