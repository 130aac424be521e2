// Error types for graph editing, graph files and graph generation.

use thiserror::Error;
use tidewater_index::{IndexError, TileCoord};

use crate::graph::{EdgeKey, NodeKey};

/// Rejected graph mutation. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("edge endpoint {0:?} is not a node")]
    MissingEndpoint(NodeKey),

    #[error("edge {0:?} already exists")]
    DuplicateEdge(EdgeKey),

    #[error("edge from {0:?} to itself")]
    SelfLoop(NodeKey),

    #[error("node coordinate {0} does not fit a node key")]
    CoordOutOfRange(TileCoord),
}

/// Failure loading or saving a graph file.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid graph file: {0}")]
    Format(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Why a generation run produced no graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFailure {
    #[error("seed {seed} is not on a traversable tile")]
    SeedNotTraversable { seed: TileCoord },

    #[error("seed {seed} is outside the node key range")]
    SeedOutOfRange { seed: TileCoord },

    #[error("no tile met the buffer requirement, no nodes created")]
    NoNodes,

    #[error("generation was cancelled")]
    Cancelled,

    #[error("generation worker panicked")]
    WorkerPanicked,
}
