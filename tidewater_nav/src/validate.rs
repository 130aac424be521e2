// Edge validation and tile class tagging.
//
// A proposed edge between two nodes is kept only if:
// - coverage: at least `min_coverage` of the tiles on its Bresenham line
//   are traversable, and
// - reachability: a breadth-first walk from the source (cardinal steps,
//   gated by collision and traversability) gets within `target_tolerance`
//   tiles of the target on both axes in at most
//   `floor(straight_distance * detour_factor)` steps.
//
// The coverage check is cheap and rejects most bad candidates; the bounded
// walk catches lines that are mostly water but cross a spit of land the
// flood fill had to go around.
//
// See also: `raster.rs` for the line walk, `builder.rs` which runs these
// checks for every candidate edge.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tidewater_index::TileCoord;
use tidewater_index::collision::CollisionQuery;
use tidewater_index::tile_class::TileClassQuery;

use crate::config::BuilderConfig;
use crate::error::GraphError;
use crate::graph::{EdgeKey, NavGraph, NodeKey, TileClassMask};
use crate::raster::BresenhamLine;

/// Cardinal steps in exploration order: north, south, east, west.
pub const CARDINAL_STEPS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Whether collision allows one cardinal step from `(x, y)`.
pub fn can_move<C: CollisionQuery + ?Sized>(
    collision: &C,
    x: i32,
    y: i32,
    plane: i32,
    step: (i32, i32),
) -> bool {
    match step {
        (0, 1) => collision.pathable_north(x, y, plane),
        (0, -1) => collision.pathable_south(x, y, plane),
        (1, 0) => collision.pathable_east(x, y, plane),
        (-1, 0) => collision.pathable_west(x, y, plane),
        _ => false,
    }
}

/// Fraction of tiles on the line `from`-`to` that are traversable.
pub fn coverage<T: TileClassQuery + ?Sized>(classes: &T, from: TileCoord, to: TileCoord) -> f64 {
    let mut total = 0u32;
    let mut traversable = 0u32;
    for (x, y) in BresenhamLine::new((from.x, from.y), (to.x, to.y)) {
        total += 1;
        if classes.is_traversable(x, y, from.plane) {
            traversable += 1;
        }
    }
    if total == 0 {
        1.0
    } else {
        f64::from(traversable) / f64::from(total)
    }
}

/// Bounded breadth-first walk from `from` towards `to`.
pub fn is_reachable<C, T>(
    collision: &C,
    classes: &T,
    from: TileCoord,
    to: TileCoord,
    detour_factor: f64,
    tolerance: i32,
) -> bool
where
    C: CollisionQuery + ?Sized,
    T: TileClassQuery + ?Sized,
{
    let plane = from.plane;
    let max_steps = (from.euclidean(to) * detour_factor) as u32;

    let mut visited = FxHashSet::default();
    let mut frontier = VecDeque::new();
    visited.insert((from.x, from.y));
    frontier.push_back((from.x, from.y, 0u32));

    while let Some((x, y, steps)) = frontier.pop_front() {
        if (x - to.x).abs() <= tolerance && (y - to.y).abs() <= tolerance {
            return true;
        }
        if steps >= max_steps {
            continue;
        }
        for step in CARDINAL_STEPS {
            let next = (x + step.0, y + step.1);
            if visited.contains(&next)
                || !can_move(collision, x, y, plane, step)
                || !classes.is_traversable(next.0, next.1, plane)
            {
                continue;
            }
            visited.insert(next);
            frontier.push_back((next.0, next.1, steps + 1));
        }
    }
    false
}

/// Classes of every traversable tile on the line `from`-`to`.
pub fn tile_class_mask<T: TileClassQuery + ?Sized>(
    classes: &T,
    from: TileCoord,
    to: TileCoord,
) -> TileClassMask {
    TileClassMask::from_classes(
        BresenhamLine::new((from.x, from.y), (to.x, to.y))
            .map(|(x, y)| classes.tile_class(x, y, from.plane)),
    )
}

/// Runs both acceptance checks with one config.
pub struct EdgeValidator<'a, C: ?Sized, T: ?Sized> {
    collision: &'a C,
    classes: &'a T,
    config: &'a BuilderConfig,
}

impl<'a, C, T> EdgeValidator<'a, C, T>
where
    C: CollisionQuery + ?Sized,
    T: TileClassQuery + ?Sized,
{
    pub fn new(collision: &'a C, classes: &'a T, config: &'a BuilderConfig) -> Self {
        Self {
            collision,
            classes,
            config,
        }
    }

    pub fn accepts(&self, from: TileCoord, to: TileCoord) -> bool {
        coverage(self.classes, from, to) >= self.config.min_coverage
            && is_reachable(
                self.collision,
                self.classes,
                from,
                to,
                self.config.detour_factor,
                self.config.target_tolerance,
            )
    }
}

/// Connect two existing nodes by hand, tagging the edge with the classes
/// under its line. No coverage or reachability check is made.
pub fn connect_nodes<T: TileClassQuery + ?Sized>(
    graph: &mut NavGraph,
    classes: &T,
    a: NodeKey,
    b: NodeKey,
) -> Result<EdgeKey, GraphError> {
    let mask = tile_class_mask(classes, a.coord(), b.coord());
    graph.add_edge(a, b, mask)
}

#[cfg(test)]
pub(crate) mod grid {
    use rustc_hash::FxHashSet;
    use tidewater_index::collision::CollisionQuery;
    use tidewater_index::tile_class::TileClassQuery;

    /// In-memory plane-0 world for builder and validator tests. Tiles not
    /// listed are land; walls are stored the way the collision index stores
    /// them (north/east of a tile).
    #[derive(Default)]
    pub struct Grid {
        pub classes: rustc_hash::FxHashMap<(i32, i32), u8>,
        pub north_blocked: FxHashSet<(i32, i32)>,
        pub east_blocked: FxHashSet<(i32, i32)>,
    }

    impl Grid {
        /// Fill the rectangle `[x0, x1] x [y0, y1]` with `class`.
        pub fn fill(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, class: u8) -> &mut Self {
            for x in x0..=x1 {
                for y in y0..=y1 {
                    if class == 0 {
                        self.classes.remove(&(x, y));
                    } else {
                        self.classes.insert((x, y), class);
                    }
                }
            }
            self
        }

        /// Block every side of `(x, y)`.
        pub fn block(&mut self, x: i32, y: i32) -> &mut Self {
            self.north_blocked.insert((x, y));
            self.east_blocked.insert((x, y));
            self.north_blocked.insert((x, y - 1));
            self.east_blocked.insert((x - 1, y));
            self
        }
    }

    impl CollisionQuery for Grid {
        fn pathable_north(&self, x: i32, y: i32, plane: i32) -> bool {
            plane == 0 && !self.north_blocked.contains(&(x, y))
        }

        fn pathable_east(&self, x: i32, y: i32, plane: i32) -> bool {
            plane == 0 && !self.east_blocked.contains(&(x, y))
        }
    }

    impl TileClassQuery for Grid {
        fn tile_class(&self, x: i32, y: i32, plane: i32) -> u8 {
            if plane != 0 {
                return 0;
            }
            self.classes.get(&(x, y)).copied().unwrap_or(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::grid::Grid;
    use super::*;

    fn c(x: i32, y: i32) -> TileCoord {
        TileCoord::new(x, y, 0)
    }

    #[test]
    fn can_move_follows_stored_walls() {
        let mut grid = Grid::default();
        grid.north_blocked.insert((3, 3));
        assert!(!can_move(&grid, 3, 3, 0, (0, 1)));
        assert!(!can_move(&grid, 3, 4, 0, (0, -1)));
        assert!(can_move(&grid, 3, 3, 0, (1, 0)));
        assert!(!can_move(&grid, 3, 3, 0, (1, 1)));
    }

    #[test]
    fn coverage_counts_both_endpoints() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 4, 0, 1);
        grid.fill(2, 0, 3, 0, 0);
        // Tiles 0..=4: water, water, land, land, water.
        assert_eq!(coverage(&grid, c(0, 0), c(4, 0)), 0.6);
        assert_eq!(coverage(&grid, c(1, 0), c(1, 0)), 1.0);
        assert_eq!(coverage(&grid, c(2, 0), c(3, 0)), 0.0);
    }

    #[test]
    fn reachability_within_detour_budget() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 20, 0, 1);
        assert!(is_reachable(&grid, &grid, c(0, 0), c(20, 0), 1.3, 2));

        // A wall across the only row makes the target unreachable.
        grid.east_blocked.insert((10, 0));
        assert!(!is_reachable(&grid, &grid, c(0, 0), c(20, 0), 1.3, 2));
    }

    #[test]
    fn reachability_accepts_landing_within_tolerance() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 18, 0, 1);
        // Target tile and its neighbour are land, but 18 is within 2 of 20.
        assert!(is_reachable(&grid, &grid, c(0, 0), c(20, 0), 1.3, 2));
        assert!(!is_reachable(&grid, &grid, c(0, 0), c(20, 0), 1.3, 1));
    }

    #[test]
    fn long_detour_is_rejected() {
        // Two water rows joined only far to the east.
        let mut grid = Grid::default();
        grid.fill(0, 0, 40, 0, 1);
        grid.fill(0, 6, 40, 6, 1);
        grid.fill(40, 0, 40, 6, 1);
        assert!(!is_reachable(&grid, &grid, c(0, 0), c(0, 6), 1.3, 2));
        assert!(is_reachable(&grid, &grid, c(0, 0), c(0, 6), 20.0, 2));
    }

    #[test]
    fn mask_collects_classes_along_the_line() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 10, 0, 1);
        grid.fill(4, 0, 5, 0, 5);
        grid.fill(7, 0, 7, 0, 0);
        let mask = tile_class_mask(&grid, c(0, 0), c(10, 0));
        assert_eq!(mask, TileClassMask::from_classes([1, 5]));
        assert_eq!(mask.bits(), 0b1_0001);
    }

    #[test]
    fn validator_requires_both_checks() {
        let config = BuilderConfig::default();
        let mut grid = Grid::default();
        grid.fill(0, 0, 10, 0, 1);
        let validator = EdgeValidator::new(&grid, &grid, &config);
        assert!(validator.accepts(c(0, 0), c(10, 0)));

        // Full coverage, but the wall cuts the row.
        grid.east_blocked.insert((5, 0));
        let validator = EdgeValidator::new(&grid, &grid, &config);
        assert!(!validator.accepts(c(0, 0), c(10, 0)));
    }

    #[test]
    fn connect_nodes_tags_and_inserts() {
        let mut grid = Grid::default();
        grid.fill(0, 0, 6, 0, 2);
        grid.fill(3, 0, 3, 0, 4);
        let mut graph = NavGraph::new();
        let a = graph.add_node(c(0, 0)).unwrap().key;
        let b = graph.add_node(c(6, 0)).unwrap().key;

        let key = connect_nodes(&mut graph, &grid, a, b).unwrap();
        assert_eq!(graph.edge(a, b).unwrap().tile_classes, TileClassMask::from_classes([2, 4]));
        assert_eq!(
            connect_nodes(&mut graph, &grid, b, a),
            Err(GraphError::DuplicateEdge(key))
        );
    }
}
