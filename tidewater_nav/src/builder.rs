// Water web generation.
//
// `NavGraphBuilder::generate` turns the traversable area reachable from a
// seed tile into a sparse waypoint graph. One run walks the phases
//
//   Idle -> Exploring -> PlacingNodes -> GeneratingEdges -> Complete
//
// and can end early in `Cancelled` (the `CancelToken` was set) or `Failed`
// (bad seed, or no tile qualified for a node). Early endings return a
// `BuildFailure` and never a partial graph.
//
// Exploring is a breadth-first flood fill (north, south, east, west) over
// tiles that collision lets us step onto and that have a non-zero tile
// class. Every visited tile belongs to a grid cell of `node_spacing` tiles.
// A tile's buffer distance is how many square rings around it are free of
// obstacles (land, or a tile blocked on 3+ sides), capped at
// `collision_buffer`. Each cell remembers its first tile with the strictly
// greatest buffer; tiles below `collision_buffer` never qualify. The seed's
// own cell is reserved for the seed, which becomes a node if it qualifies.
//
// Placing nodes takes the seed (if it qualified) and then every cell's best
// tile in ascending cell order. Generating edges proposes, for each node,
// every same-plane node within `node_spacing * edge_distance_multiplier`,
// nearest first (ties by placement order), keeps at most `max_neighbors`
// of them unless the candidate is closer than
// `node_spacing * close_neighbor_factor`, and accepts those that pass the
// checks in `validate.rs`.
//
// Cancellation is checked per explored tile, per placed candidate and per
// node during edge generation. Progress events go to a caller-supplied
// callback on whatever thread runs the builder; `spawn_generate` runs it on
// a dedicated worker thread and hands back a `BuildHandle`.
//
// See also: `validate.rs` for edge acceptance, `config.rs` for every
// threshold used here, `graph.rs` for the result type.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tidewater_index::TileCoord;
use tidewater_index::collision::CollisionQuery;
use tidewater_index::tile_class::TileClassQuery;

use crate::config::BuilderConfig;
use crate::error::BuildFailure;
use crate::graph::{EdgeKey, NavGraph, NavNode, NodeKey};
use crate::validate::{CARDINAL_STEPS, EdgeValidator, can_move, tile_class_mask};

/// Where a generation run is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildPhase {
    Idle,
    Exploring,
    PlacingNodes,
    GeneratingEdges,
    Complete,
    Cancelled,
    Failed,
}

impl BuildPhase {
    /// Display name, as shown in progress output.
    pub fn name(self) -> &'static str {
        match self {
            BuildPhase::Idle => "Idle",
            BuildPhase::Exploring => "Exploring",
            BuildPhase::PlacingNodes => "Placing Nodes",
            BuildPhase::GeneratingEdges => "Generating Edges",
            BuildPhase::Complete => "Complete",
            BuildPhase::Cancelled => "Cancelled",
            BuildPhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildPhase::Complete | BuildPhase::Cancelled | BuildPhase::Failed
        )
    }

    pub fn is_active(self) -> bool {
        !matches!(self, BuildPhase::Idle) && !self.is_terminal()
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    /// 0..=100.
    pub percent: u8,
    pub phase: BuildPhase,
    pub detail: String,
}

/// Shared cancel flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Best node position found so far in one grid cell.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    coord: TileCoord,
    buffer: i32,
}

pub struct NavGraphBuilder<'a, C: ?Sized, T: ?Sized> {
    collision: &'a C,
    classes: &'a T,
    config: BuilderConfig,
    phase: BuildPhase,
}

impl<'a, C, T> NavGraphBuilder<'a, C, T>
where
    C: CollisionQuery + ?Sized,
    T: TileClassQuery + ?Sized,
{
    pub fn new(collision: &'a C, classes: &'a T, config: BuilderConfig) -> Self {
        Self {
            collision,
            classes,
            config,
            phase: BuildPhase::Idle,
        }
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Generate a water web from `seed`.
    pub fn generate(
        &mut self,
        seed: TileCoord,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<NavGraph, BuildFailure> {
        self.phase = BuildPhase::Idle;
        let result = self.run(seed, cancel, progress);
        match &result {
            Ok(graph) => {
                info!(
                    "water web from {seed}: {} nodes, {} edges",
                    graph.node_count(),
                    graph.edge_count()
                );
            }
            Err(BuildFailure::Cancelled) => {
                self.report(progress, 0, BuildPhase::Cancelled, "Generation cancelled".into());
            }
            Err(failure) => {
                self.report(progress, 0, BuildPhase::Failed, failure.to_string());
            }
        }
        result
    }

    fn run(
        &mut self,
        seed: TileCoord,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<NavGraph, BuildFailure> {
        if !NodeKey::fits(seed) {
            return Err(BuildFailure::SeedOutOfRange { seed });
        }
        if !self.classes.is_traversable(seed.x, seed.y, seed.plane) {
            return Err(BuildFailure::SeedNotTraversable { seed });
        }

        self.report(progress, 0, BuildPhase::Exploring, "Building sparse web...".into());
        let (seed_node, candidates) = self.explore(seed, cancel, progress)?;

        self.report(
            progress,
            40,
            BuildPhase::PlacingNodes,
            "Selecting optimal positions...".into(),
        );
        let mut graph = self.place_nodes(seed_node, &candidates, cancel, progress)?;
        if graph.is_empty() {
            return Err(BuildFailure::NoNodes);
        }
        self.report(
            progress,
            60,
            BuildPhase::PlacingNodes,
            format!("Created {} nodes", graph.node_count()),
        );

        self.report(
            progress,
            60,
            BuildPhase::GeneratingEdges,
            "Connecting nodes...".into(),
        );
        self.generate_edges(&mut graph, cancel, progress)?;

        self.report(
            progress,
            100,
            BuildPhase::Complete,
            format!("{} nodes, {} edges", graph.node_count(), graph.edge_count()),
        );
        Ok(graph)
    }

    fn report(
        &mut self,
        progress: &mut dyn FnMut(Progress),
        percent: u8,
        phase: BuildPhase,
        detail: String,
    ) {
        if phase != self.phase {
            debug!("water web: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
        progress(Progress {
            percent: percent.min(100),
            phase,
            detail,
        });
    }

    fn check_cancel(&self, cancel: &CancelToken) -> Result<(), BuildFailure> {
        if cancel.is_cancelled() {
            Err(BuildFailure::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Flood fill from `seed`, returning the seed (if it qualifies as a
    /// node) and the best candidate of every other cell.
    fn explore(
        &mut self,
        seed: TileCoord,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<(Option<TileCoord>, BTreeMap<(i32, i32), Candidate>), BuildFailure> {
        let plane = seed.plane;
        let required = self.config.buffer();
        let interval = self.config.progress_interval.max(1);

        let seed_cell = self.grid_cell(seed.x, seed.y);
        let seed_node = (self.buffer_distance(seed) >= required).then_some(seed);

        let mut candidates: BTreeMap<(i32, i32), Candidate> = BTreeMap::new();
        let mut visited = FxHashSet::default();
        let mut frontier = VecDeque::new();
        visited.insert((seed.x, seed.y));
        frontier.push_back((seed.x, seed.y));

        let mut explored = 0usize;
        while let Some((x, y)) = frontier.pop_front() {
            self.check_cancel(cancel)?;

            for step in CARDINAL_STEPS {
                if !can_move(self.collision, x, y, plane, step) {
                    continue;
                }
                let (nx, ny) = (x + step.0, y + step.1);
                if visited.contains(&(nx, ny)) || !self.classes.is_traversable(nx, ny, plane) {
                    continue;
                }
                visited.insert((nx, ny));
                frontier.push_back((nx, ny));

                // With a qualifying seed the seed's cell is taken.
                let cell = self.grid_cell(nx, ny);
                if seed_node.is_some() && cell == seed_cell {
                    continue;
                }
                let coord = TileCoord::new(nx, ny, plane);
                // Tiles past the node key range are walked through, never placed.
                if !NodeKey::fits(coord) {
                    continue;
                }
                let buffer = self.buffer_distance(coord);
                if buffer < required {
                    continue;
                }
                let better = candidates
                    .get(&cell)
                    .is_none_or(|existing| buffer > existing.buffer);
                if better {
                    candidates.insert(cell, Candidate { coord, buffer });
                }
            }

            explored += 1;
            if explored % interval == 0 {
                let percent = 50 * explored / (explored + frontier.len());
                self.report(
                    progress,
                    percent as u8,
                    BuildPhase::Exploring,
                    format!("{explored} tiles explored..."),
                );
            }
        }

        debug!(
            "explored {explored} tiles from {seed}, {} candidate cells",
            candidates.len()
        );
        Ok((seed_node, candidates))
    }

    fn place_nodes(
        &mut self,
        seed_node: Option<TileCoord>,
        candidates: &BTreeMap<(i32, i32), Candidate>,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<NavGraph, BuildFailure> {
        let mut graph = NavGraph::new();
        if let Some(seed) = seed_node {
            graph.add_node(seed).map_err(|_| BuildFailure::SeedOutOfRange { seed })?;
        }

        let total = candidates.len();
        for (processed, candidate) in candidates.values().enumerate() {
            self.check_cancel(cancel)?;
            if let Err(err) = graph.add_node(candidate.coord) {
                debug!("skipping candidate: {err}");
                continue;
            }

            let processed = processed + 1;
            if processed % 100 == 0 {
                let percent = 40 + 20 * processed / total;
                self.report(
                    progress,
                    percent as u8,
                    BuildPhase::PlacingNodes,
                    format!("{} nodes placed...", graph.node_count()),
                );
            }
        }
        Ok(graph)
    }

    fn generate_edges(
        &mut self,
        graph: &mut NavGraph,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<(), BuildFailure> {
        let config = self.config.clone();
        let nodes: Vec<NavNode> = graph.nodes().to_vec();
        let max_distance = config.max_edge_distance();
        let close_distance = config.close_neighbor_distance();
        let neighbors = NeighborGrid::new(&nodes, max_distance);
        let validator = EdgeValidator::new(self.collision, self.classes, &config);

        for (index, node) in nodes.iter().enumerate() {
            self.check_cancel(cancel)?;

            let mut connected = 0usize;
            for (other, distance) in neighbors.within(&nodes, index, max_distance) {
                if connected >= config.max_neighbors && distance > close_distance {
                    continue;
                }
                let target = nodes[other];
                if graph.contains_edge(EdgeKey::new(node.key, target.key)) {
                    continue;
                }
                if !validator.accepts(node.coord, target.coord) {
                    continue;
                }
                let mask = tile_class_mask(self.classes, node.coord, target.coord);
                if graph.add_edge(node.key, target.key, mask).is_ok() {
                    connected += 1;
                }
            }

            let processed = index + 1;
            if processed % 50 == 0 {
                let percent = 60 + 40 * processed / nodes.len();
                self.report(
                    progress,
                    percent as u8,
                    BuildPhase::GeneratingEdges,
                    format!("Created {} edges...", graph.edge_count()),
                );
            }
        }
        Ok(())
    }

    /// Grid cell of a tile; floors toward negative infinity.
    fn grid_cell(&self, x: i32, y: i32) -> (i32, i32) {
        let spacing = self.config.spacing();
        (x.div_euclid(spacing), y.div_euclid(spacing))
    }

    /// Clearance around `coord`, capped at `collision_buffer`. A ring at
    /// distance `d` holding an obstacle gives `d - 1`.
    pub fn buffer_distance(&self, coord: TileCoord) -> i32 {
        let limit = self.config.buffer();
        for dist in 1..=limit {
            for dx in -dist..=dist {
                for dy in -dist..=dist {
                    if dx.abs() != dist && dy.abs() != dist {
                        continue;
                    }
                    if self.is_obstacle(coord.x + dx, coord.y + dy, coord.plane) {
                        return dist - 1;
                    }
                }
            }
        }
        limit
    }

    /// Land, or a tile blocked on at least 3 cardinal sides.
    fn is_obstacle(&self, x: i32, y: i32, plane: i32) -> bool {
        !self.classes.is_traversable(x, y, plane)
            || self.collision.blocked_cardinals(x, y, plane) >= 3
    }
}

/// Spatial hash of node positions with cells at least `max_distance` wide,
/// so every neighbor within range is in the 3x3 block of cells around a
/// node.
struct NeighborGrid {
    cell_size: i32,
    cells: FxHashMap<(i32, i32, i32), Vec<usize>>,
}

impl NeighborGrid {
    fn new(nodes: &[NavNode], max_distance: f64) -> Self {
        let cell_size = (max_distance.ceil() as i32).max(1);
        let mut cells: FxHashMap<(i32, i32, i32), Vec<usize>> = FxHashMap::default();
        for (index, node) in nodes.iter().enumerate() {
            cells
                .entry(Self::cell_of(cell_size, node.coord))
                .or_default()
                .push(index);
        }
        Self { cell_size, cells }
    }

    fn cell_of(cell_size: i32, coord: TileCoord) -> (i32, i32, i32) {
        (
            coord.x.div_euclid(cell_size),
            coord.y.div_euclid(cell_size),
            coord.plane,
        )
    }

    /// Other same-plane nodes within `max_distance` of `nodes[index]`, as
    /// `(index, distance)`, nearest first and ties by index.
    fn within(&self, nodes: &[NavNode], index: usize, max_distance: f64) -> Vec<(usize, f64)> {
        let origin = nodes[index].coord;
        let (cx, cy, plane) = Self::cell_of(self.cell_size, origin);
        let mut found = Vec::new();
        for gx in cx - 1..=cx + 1 {
            for gy in cy - 1..=cy + 1 {
                let Some(bucket) = self.cells.get(&(gx, gy, plane)) else {
                    continue;
                };
                for &other in bucket {
                    if other == index {
                        continue;
                    }
                    let distance = origin.euclidean(nodes[other].coord);
                    if distance <= max_distance {
                        found.push((other, distance));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }
}

/// A generation running on its own thread.
pub struct BuildHandle {
    cancel: CancelToken,
    thread: JoinHandle<Result<NavGraph, BuildFailure>>,
}

impl BuildHandle {
    /// Ask the worker to stop. It finishes with `BuildFailure::Cancelled`
    /// unless it already completed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and take its result.
    pub fn join(self) -> Result<NavGraph, BuildFailure> {
        self.thread
            .join()
            .unwrap_or(Err(BuildFailure::WorkerPanicked))
    }
}

/// Run `generate` on a new worker thread. `progress` is called from that
/// thread.
pub fn spawn_generate<C, T, F>(
    collision: Arc<C>,
    classes: Arc<T>,
    seed: TileCoord,
    config: BuilderConfig,
    mut progress: F,
) -> std::io::Result<BuildHandle>
where
    C: CollisionQuery + Send + Sync + ?Sized + 'static,
    T: TileClassQuery + Send + Sync + ?Sized + 'static,
    F: FnMut(Progress) + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let thread = thread::Builder::new()
        .name("water-web".into())
        .spawn(move || {
            let mut builder = NavGraphBuilder::new(&*collision, &*classes, config);
            builder.generate(seed, &worker_cancel, &mut progress)
        })?;
    Ok(BuildHandle { cancel, thread })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::graph::{NodeKey, TileClassMask};
    use crate::validate::grid::Grid;
    use crate::validate::is_reachable;

    fn c(x: i32, y: i32) -> TileCoord {
        TileCoord::new(x, y, 0)
    }

    fn config(spacing: i32, buffer: i32) -> BuilderConfig {
        BuilderConfig::default()
            .with_spacing(spacing)
            .with_buffer(buffer)
    }

    fn run(grid: &Grid, seed: TileCoord, config: BuilderConfig) -> (Result<NavGraph, BuildFailure>, Vec<Progress>) {
        let mut events = Vec::new();
        let mut builder = NavGraphBuilder::new(grid, grid, config);
        let result = builder.generate(seed, &CancelToken::new(), &mut |p| events.push(p));
        (result, events)
    }

    #[test]
    fn small_field_yields_only_the_seed() {
        let mut grid = Grid::default();
        grid.fill(20, 20, 24, 24, 1);
        let (result, _) = run(&grid, c(22, 22), config(50, 2));
        let graph = result.unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.nodes()[0].coord, c(22, 22));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn seed_without_buffer_leaves_no_nodes() {
        let mut grid = Grid::default();
        grid.fill(20, 20, 24, 24, 1);
        let (result, events) = run(&grid, c(22, 22), config(50, 5));
        assert_eq!(result.unwrap_err(), BuildFailure::NoNodes);
        assert_eq!(events.last().unwrap().phase, BuildPhase::Failed);
    }

    #[test]
    fn two_nodes_ten_apart_are_connected_and_tagged() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 5, 0, 1);
        grid.fill(6, 0, 10, 0, 3);
        let (result, events) = run(&grid, c(0, 0), config(10, 0));
        let graph = result.unwrap();

        assert_eq!(graph.node_count(), 2);
        let a = NodeKey::pack(c(0, 0));
        let b = NodeKey::pack(c(10, 0));
        let edge = graph.edge(a, b).unwrap();
        assert_eq!(edge.tile_classes, TileClassMask((1 << 0) | (1 << 2)));

        let phases: Vec<_> = events.iter().map(|p| (p.percent, p.phase)).collect();
        assert_eq!(
            phases,
            vec![
                (0, BuildPhase::Exploring),
                (40, BuildPhase::PlacingNodes),
                (60, BuildPhase::PlacingNodes),
                (60, BuildPhase::GeneratingEdges),
                (100, BuildPhase::Complete),
            ]
        );
        assert_eq!(events.last().unwrap().detail, "2 nodes, 1 edges");
    }

    #[test]
    fn mostly_land_line_is_rejected_despite_detour() {
        // Row 0 is water only at x = 0 and x = 10; row -1 below it is open
        // and lies in other grid cells, so the second node sits on (10, 0).
        let mut grid = Grid::default();
        grid.fill(0, -1, 10, -1, 1);
        grid.fill(0, 0, 0, 0, 1);
        grid.fill(10, 0, 10, 0, 1);
        let (result, _) = run(&grid, c(0, 0), config(10, 0));
        let graph = result.unwrap();

        let a = NodeKey::pack(c(0, 0));
        let b = NodeKey::pack(c(10, 0));
        assert!(graph.contains_node(a));
        assert!(graph.contains_node(b));
        assert!(is_reachable(&grid, &grid, c(0, 0), c(10, 0), 1.3, 2));
        assert!(graph.edge(a, b).is_none());
    }

    #[test]
    fn nodes_stay_inside_the_key_range() {
        let mut grid = Grid::default();
        grid.fill(8150, 20, 8240, 40, 1);
        let (result, _) = run(&grid, c(8170, 30), config(10, 2));
        let graph = result.unwrap();
        assert!(graph.node_count() > 1);
        for node in graph.nodes() {
            assert!(node.coord.x < 8192, "node {} past the key range", node.coord);
            assert_eq!(node.key.coord(), node.coord);
        }
    }

    #[test]
    fn seed_past_the_key_range_is_refused() {
        let mut grid = Grid::default();
        grid.fill(8300, 20, 8310, 30, 1);
        let (result, events) = run(&grid, c(8305, 25), config(10, 2));
        assert_eq!(
            result.unwrap_err(),
            BuildFailure::SeedOutOfRange { seed: c(8305, 25) }
        );
        assert_eq!(events.last().unwrap().phase, BuildPhase::Failed);
    }

    #[test]
    fn seed_on_land_fails_before_exploring() {
        let grid = Grid::default();
        let mut builder = NavGraphBuilder::new(&grid, &grid, BuilderConfig::default());
        let mut events = Vec::new();
        let result = builder.generate(c(5, 5), &CancelToken::new(), &mut |p| events.push(p));
        assert_eq!(
            result.unwrap_err(),
            BuildFailure::SeedNotTraversable { seed: c(5, 5) }
        );
        assert_eq!(builder.phase(), BuildPhase::Failed);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn buffer_distance_counts_clear_rings() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 20, 20, 1);
        let builder = NavGraphBuilder::new(&grid, &grid, config(50, 5));
        assert_eq!(builder.buffer_distance(c(10, 10)), 5);
        assert_eq!(builder.buffer_distance(c(2, 10)), 2);
        assert_eq!(builder.buffer_distance(c(0, 0)), 0);

        // A rock blocked on all sides is an obstacle even on water.
        grid.block(13, 10);
        let builder = NavGraphBuilder::new(&grid, &grid, config(50, 5));
        assert_eq!(builder.buffer_distance(c(10, 10)), 2);

        let unbuffered = NavGraphBuilder::new(&grid, &grid, config(50, 0));
        assert_eq!(unbuffered.buffer_distance(c(0, 0)), 0);
    }

    #[test]
    fn open_water_gets_one_node_per_cell_and_is_deterministic() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 119, 119, 1);
        let (first, _) = run(&grid, c(60, 60), config(20, 3));
        let (second, _) = run(&grid, c(60, 60), config(20, 3));
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.node_count(), 36);
        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.nodes()[0].coord, c(60, 60));
        for node in first.nodes() {
            assert!(
                first.edges_for_node(node.key).next().is_some(),
                "{} is isolated",
                node.coord
            );
        }
        for edge in first.edges() {
            assert!(edge.source.coord().euclidean(edge.target.coord()) <= 60.0);
            assert_eq!(edge.tile_classes, TileClassMask(1));
        }
    }

    #[test]
    fn walls_split_the_flood_fill() {
        // Two basins side by side; a wall along x = 29 keeps the fill in
        // the western one.
        let mut grid = Grid::default();
        grid.fill(0, 0, 59, 29, 1);
        for y in 0..30 {
            grid.east_blocked.insert((29, y));
        }
        let (result, _) = run(&grid, c(5, 5), config(10, 0));
        let graph = result.unwrap();
        assert!(graph.node_count() > 1);
        assert!(graph.nodes().iter().all(|node| node.coord.x < 30));
    }

    #[test]
    fn pre_cancelled_token_stops_immediately() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 30, 30, 1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut builder = NavGraphBuilder::new(&grid, &grid, config(10, 0));
        let mut events = Vec::new();
        let result = builder.generate(c(5, 5), &cancel, &mut |p| events.push(p));
        assert_eq!(result.unwrap_err(), BuildFailure::Cancelled);
        assert_eq!(builder.phase(), BuildPhase::Cancelled);
        assert!(!events.iter().any(|p| p.phase == BuildPhase::Complete));
    }

    #[test]
    fn cancelling_from_progress_stops_exploration() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 60, 60, 1);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut cfg = config(10, 0);
        cfg.progress_interval = 5;

        let mut builder = NavGraphBuilder::new(&grid, &grid, cfg);
        let mut explored_events = 0;
        let result = builder.generate(c(30, 30), &cancel, &mut |p| {
            if p.detail.ends_with("tiles explored...") {
                explored_events += 1;
                trigger.cancel();
            }
        });
        assert_eq!(result.unwrap_err(), BuildFailure::Cancelled);
        assert_eq!(explored_events, 1);
    }

    #[test]
    fn background_build_completes() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 5, 0, 1);
        grid.fill(6, 0, 10, 0, 3);
        let grid = Arc::new(grid);
        let (tx, rx) = mpsc::channel();
        let handle = spawn_generate(grid.clone(), grid, c(0, 0), config(10, 0), move |p| {
            let _ = tx.send(p.phase);
        })
        .unwrap();
        let graph = handle.join().unwrap();
        assert_eq!(graph.edge_count(), 1);
        let phases: Vec<_> = rx.iter().collect();
        assert_eq!(phases.last(), Some(&BuildPhase::Complete));
    }

    #[test]
    fn background_build_can_be_cancelled() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 40, 40, 1);
        let grid = Arc::new(grid);
        let (started_tx, started_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();

        let handle = spawn_generate(grid.clone(), grid, c(20, 20), config(10, 0), move |p| {
            if p.phase == BuildPhase::Exploring && p.percent == 0 {
                let _ = started_tx.send(());
                let _ = resume_rx.recv();
            }
        })
        .unwrap();

        started_rx.recv().unwrap();
        handle.cancel();
        assert!(handle.cancel_token().is_cancelled());
        resume_tx.send(()).unwrap();
        assert_eq!(handle.join().unwrap_err(), BuildFailure::Cancelled);
    }

    #[test]
    fn phase_names() {
        assert_eq!(BuildPhase::PlacingNodes.to_string(), "Placing Nodes");
        assert_eq!(BuildPhase::GeneratingEdges.name(), "Generating Edges");
        assert!(BuildPhase::Failed.is_terminal());
        assert!(BuildPhase::Exploring.is_active());
        assert!(!BuildPhase::Idle.is_active());
    }
}
