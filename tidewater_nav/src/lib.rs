// Sparse navigation graphs over traversable water.
//
// This crate turns a collision index and a tile class index (both from
// `tidewater_index`) into a waypoint graph: a flood fill over traversable
// tiles, one well-buffered node per grid cell, and validated straight-line
// edges between nearby nodes, each tagged with the tile classes it crosses.
//
// Module overview:
// - `graph.rs`:    `NavGraph` model (nodes by packed key, edges by pair key).
// - `codec.rs`:    GWEB binary graph file format.
// - `builder.rs`:  `NavGraphBuilder` state machine, background builds,
//                  cancellation and progress events.
// - `validate.rs`: edge coverage and reachability checks, class tagging.
// - `raster.rs`:   Bresenham line walk shared by validation and tagging.
// - `config.rs`:   `BuilderConfig` tuning knobs.
// - `error.rs`:    error types.
//
// The builder reads the indexes only through the `CollisionQuery` and
// `TileClassQuery` traits, so tests drive it with small in-memory grids.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod raster;
pub mod validate;

pub use builder::{BuildHandle, BuildPhase, CancelToken, NavGraphBuilder, Progress};
pub use config::BuilderConfig;
pub use error::{BuildFailure, GraphError, NavError};
pub use graph::{EdgeKey, NavEdge, NavGraph, NavNode, NodeKey, TileClassMask};
