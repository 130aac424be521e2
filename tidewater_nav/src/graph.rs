// Navigation graph model.
//
// A `NavGraph` is a set of `NavNode`s, each identified only by its packed
// coordinate (`NodeKey`), joined by undirected `NavEdge`s identified by an
// order-independent pair key (`EdgeKey`). Each edge carries a
// `TileClassMask` of the surface classes its straight line crosses.
//
// The node and edge `Vec`s are the authoritative data. The two hash indexes
// (key -> node slot, pair key -> edge slot) are derived and can always be
// rebuilt from the lists with `rebuild_indexes()`; `replace_with()` does so
// after swapping in a graph built elsewhere.
//
// Invariants kept by every mutator:
// - at most one node per `NodeKey`;
// - every edge's endpoints exist as nodes (removing a node removes its edges);
// - at most one edge per `EdgeKey`, and no self loops.
//
// See also: `codec.rs` for the GWEB file format, `builder.rs` which produces
// graphs, `validate.rs` for `connect_nodes`' class tagging.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tidewater_index::TileCoord;

use crate::error::GraphError;

pub const NODE_X_BITS: u32 = 13;
pub const NODE_Y_BITS: u32 = 15;
pub const NODE_PLANE_BITS: u32 = 4;

const NODE_X_MASK: u32 = (1 << NODE_X_BITS) - 1;
const NODE_Y_MASK: u32 = (1 << NODE_Y_BITS) - 1;
const NODE_PLANE_MASK: u32 = (1 << NODE_PLANE_BITS) - 1;
const NODE_Y_SHIFT: u32 = NODE_X_BITS;
const NODE_PLANE_SHIFT: u32 = NODE_X_BITS + NODE_Y_BITS;

/// Packed node coordinate: x in bits 0-12, y in 13-27, plane in 28-31.
///
/// `pack` masks each field, so coordinates outside those widths alias other
/// tiles. Graph mutators go through `try_pack` and refuse them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u32);

impl NodeKey {
    pub const fn pack(coord: TileCoord) -> Self {
        let x = coord.x as u32 & NODE_X_MASK;
        let y = coord.y as u32 & NODE_Y_MASK;
        let plane = coord.plane as u32 & NODE_PLANE_MASK;
        NodeKey(x | (y << NODE_Y_SHIFT) | (plane << NODE_PLANE_SHIFT))
    }

    /// Pack `coord` only if every field fits its width.
    pub fn try_pack(coord: TileCoord) -> Option<Self> {
        Self::fits(coord).then(|| Self::pack(coord))
    }

    pub fn fits(coord: TileCoord) -> bool {
        u32::try_from(coord.x).is_ok_and(|x| x <= NODE_X_MASK)
            && u32::try_from(coord.y).is_ok_and(|y| y <= NODE_Y_MASK)
            && u32::try_from(coord.plane).is_ok_and(|p| p <= NODE_PLANE_MASK)
    }

    pub const fn coord(self) -> TileCoord {
        TileCoord::new(
            (self.0 & NODE_X_MASK) as i32,
            ((self.0 >> NODE_Y_SHIFT) & NODE_Y_MASK) as i32,
            ((self.0 >> NODE_PLANE_SHIFT) & NODE_PLANE_MASK) as i32,
        )
    }
}

/// Order-independent key of a node pair: smaller key in the high 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey(pub u64);

impl EdgeKey {
    pub fn new(a: NodeKey, b: NodeKey) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        EdgeKey((u64::from(lo.0) << 32) | u64::from(hi.0))
    }

    /// The two endpoints, smaller key first.
    pub fn endpoints(self) -> (NodeKey, NodeKey) {
        (NodeKey((self.0 >> 32) as u32), NodeKey(self.0 as u32))
    }
}

/// Set of tile classes 1..=16, class `c` stored in bit `c - 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileClassMask(pub u16);

impl TileClassMask {
    pub const EMPTY: TileClassMask = TileClassMask(0);

    pub fn from_classes(classes: impl IntoIterator<Item = u8>) -> Self {
        let mut mask = Self::EMPTY;
        for class in classes {
            mask.insert(class);
        }
        mask
    }

    /// Add `class`. Class 0 (not traversable) and classes above 16 are
    /// ignored.
    pub fn insert(&mut self, class: u8) {
        if (1..=16).contains(&class) {
            self.0 |= 1 << (class - 1);
        }
    }

    pub fn contains(self, class: u8) -> bool {
        (1..=16).contains(&class) && self.0 & (1 << (class - 1)) != 0
    }

    /// Classes in the mask, ascending.
    pub fn classes(self) -> impl Iterator<Item = u8> {
        (1..=16u8).filter(move |&class| self.contains(class))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavNode {
    pub key: NodeKey,
    pub coord: TileCoord,
}

impl NavNode {
    pub fn at(coord: TileCoord) -> Self {
        Self::from_key(NodeKey::pack(coord))
    }

    pub fn from_key(key: NodeKey) -> Self {
        Self {
            key,
            coord: key.coord(),
        }
    }
}

/// An undirected edge. `source` is always the smaller key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEdge {
    pub source: NodeKey,
    pub target: NodeKey,
    pub tile_classes: TileClassMask,
}

impl NavEdge {
    pub fn new(a: NodeKey, b: NodeKey, tile_classes: TileClassMask) -> Self {
        let (source, target) = EdgeKey::new(a, b).endpoints();
        Self {
            source,
            target,
            tile_classes,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source, self.target)
    }

    pub fn touches(&self, node: NodeKey) -> bool {
        self.source == node || self.target == node
    }

    /// The endpoint that isn't `node`.
    pub fn other(&self, node: NodeKey) -> NodeKey {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NavGraph {
    nodes: Vec<NavNode>,
    edges: Vec<NavEdge>,
    node_index: FxHashMap<NodeKey, usize>,
    edge_index: FxHashMap<EdgeKey, usize>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from plain lists, checking every invariant.
    pub fn from_parts(nodes: Vec<NavNode>, edges: Vec<NavEdge>) -> Result<Self, GraphError> {
        let mut graph = NavGraph::new();
        for node in nodes {
            graph.add_node(node.coord)?;
        }
        for edge in edges {
            graph.add_edge(edge.source, edge.target, edge.tile_classes)?;
        }
        Ok(graph)
    }

    /// Add a node at `coord`, or return the node already there.
    pub fn add_node(&mut self, coord: TileCoord) -> Result<NavNode, GraphError> {
        let key = NodeKey::try_pack(coord).ok_or(GraphError::CoordOutOfRange(coord))?;
        if let Some(&slot) = self.node_index.get(&key) {
            return Ok(self.nodes[slot]);
        }
        let node = NavNode::from_key(key);
        self.node_index.insert(key, self.nodes.len());
        self.nodes.push(node);
        Ok(node)
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, key: NodeKey) -> Option<NavNode> {
        let slot = self.node_index.remove(&key)?;
        let node = self.nodes.swap_remove(slot);
        if let Some(moved) = self.nodes.get(slot) {
            self.node_index.insert(moved.key, slot);
        }

        let before = self.edges.len();
        self.edges.retain(|edge| !edge.touches(key));
        if self.edges.len() != before {
            self.rebuild_edge_index();
        }
        Some(node)
    }

    /// Connect two existing nodes.
    pub fn add_edge(
        &mut self,
        a: NodeKey,
        b: NodeKey,
        tile_classes: TileClassMask,
    ) -> Result<EdgeKey, GraphError> {
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        for endpoint in [a, b] {
            if !self.node_index.contains_key(&endpoint) {
                return Err(GraphError::MissingEndpoint(endpoint));
            }
        }
        let edge = NavEdge::new(a, b, tile_classes);
        let key = edge.key();
        if self.edge_index.contains_key(&key) {
            return Err(GraphError::DuplicateEdge(key));
        }
        self.edge_index.insert(key, self.edges.len());
        self.edges.push(edge);
        Ok(key)
    }

    pub fn remove_edge(&mut self, a: NodeKey, b: NodeKey) -> Option<NavEdge> {
        let slot = self.edge_index.remove(&EdgeKey::new(a, b))?;
        let edge = self.edges.swap_remove(slot);
        if let Some(moved) = self.edges.get(slot) {
            self.edge_index.insert(moved.key(), slot);
        }
        Some(edge)
    }

    pub fn node(&self, key: NodeKey) -> Option<&NavNode> {
        self.node_index.get(&key).map(|&slot| &self.nodes[slot])
    }

    pub fn node_at(&self, coord: TileCoord) -> Option<&NavNode> {
        NodeKey::try_pack(coord).and_then(|key| self.node(key))
    }

    pub fn contains_node(&self, key: NodeKey) -> bool {
        self.node_index.contains_key(&key)
    }

    pub fn edge(&self, a: NodeKey, b: NodeKey) -> Option<&NavEdge> {
        self.edge_index
            .get(&EdgeKey::new(a, b))
            .map(|&slot| &self.edges[slot])
    }

    pub fn contains_edge(&self, key: EdgeKey) -> bool {
        self.edge_index.contains_key(&key)
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[NavEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges with `key` as an endpoint. Linear in the edge count.
    pub fn edges_for_node(&self, key: NodeKey) -> impl Iterator<Item = &NavEdge> + '_ {
        self.edges.iter().filter(move |edge| edge.touches(key))
    }

    pub fn neighbors(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.edges_for_node(key).map(move |edge| edge.other(key))
    }

    /// The node on `coord`'s plane closest to it, within `tolerance` tiles
    /// on both axes. Ties go to the earlier node.
    pub fn find_node_near(&self, coord: TileCoord, tolerance: i32) -> Option<&NavNode> {
        let mut best: Option<(&NavNode, f64)> = None;
        for node in &self.nodes {
            if node.coord.plane != coord.plane || node.coord.chebyshev(coord) > tolerance {
                continue;
            }
            let dist = node.coord.euclidean(coord);
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((node, dist));
            }
        }
        best.map(|(node, _)| node)
    }

    /// The edge on `coord`'s plane whose segment passes closest to it,
    /// within `tolerance` tiles.
    pub fn find_edge_near(&self, coord: TileCoord, tolerance: f64) -> Option<&NavEdge> {
        let mut best: Option<(&NavEdge, f64)> = None;
        for edge in &self.edges {
            let a = edge.source.coord();
            let b = edge.target.coord();
            if a.plane != coord.plane || b.plane != coord.plane {
                continue;
            }
            let dist = segment_distance(coord, a, b);
            if dist <= tolerance && best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((edge, dist));
            }
        }
        best.map(|(edge, _)| edge)
    }

    /// Take over `other`'s nodes and edges, rebuilding the indexes from its
    /// lists.
    pub fn replace_with(&mut self, other: NavGraph) {
        self.nodes = other.nodes;
        self.edges = other.edges;
        self.rebuild_indexes();
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.node_index.clear();
        self.edge_index.clear();
    }

    /// Recompute both indexes from the node and edge lists.
    pub fn rebuild_indexes(&mut self) {
        self.node_index.clear();
        for (slot, node) in self.nodes.iter().enumerate() {
            self.node_index.insert(node.key, slot);
        }
        self.rebuild_edge_index();
    }

    fn rebuild_edge_index(&mut self) {
        self.edge_index.clear();
        for (slot, edge) in self.edges.iter().enumerate() {
            self.edge_index.insert(edge.key(), slot);
        }
    }
}

/// Distance from `p` to the segment `a`-`b` on the x/y axes.
fn segment_distance(p: TileCoord, a: TileCoord, b: TileCoord) -> f64 {
    let (px, py) = (f64::from(p.x), f64::from(p.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (dx, dy) = (f64::from(b.x) - ax, f64::from(b.y) - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
