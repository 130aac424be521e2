// Graph generation tuning.
//
// Every threshold the builder uses lives here. The defaults reproduce the
// hand-tuned values the water web has always been generated with; none of
// them has a derivation, so change them with care and regenerate.
//
// `node_spacing` and `collision_buffer` are clamped when read (spacing to at
// least `MIN_NODE_SPACING`, buffer to at least 0) so a config file can't
// produce a degenerate grid.

use serde::{Deserialize, Serialize};

pub const MIN_NODE_SPACING: i32 = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Grid cell size in tiles; at most one node per cell.
    pub node_spacing: i32,

    /// Required clearance, in tiles, between a node and the nearest
    /// obstacle.
    pub collision_buffer: i32,

    /// Soft cap on edges proposed from one node.
    pub max_neighbors: usize,

    /// Nodes up to `node_spacing * edge_distance_multiplier` apart are edge
    /// candidates.
    pub edge_distance_multiplier: f64,

    /// Candidates closer than `node_spacing * close_neighbor_factor` ignore
    /// `max_neighbors`.
    pub close_neighbor_factor: f64,

    /// Minimum traversable fraction of the straight line under an edge.
    pub min_coverage: f64,

    /// Allowed walking distance as a multiple of the straight-line length.
    pub detour_factor: f64,

    /// How close, per axis, the reachability search must get to the target.
    pub target_tolerance: i32,

    /// Tiles explored between progress events.
    pub progress_interval: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            node_spacing: 50,
            collision_buffer: 5,
            max_neighbors: 8,
            edge_distance_multiplier: 3.0,
            close_neighbor_factor: 1.5,
            min_coverage: 0.6,
            detour_factor: 1.3,
            target_tolerance: 2,
            progress_interval: 50_000,
        }
    }
}

impl BuilderConfig {
    pub fn with_spacing(mut self, spacing: i32) -> Self {
        self.node_spacing = spacing;
        self
    }

    pub fn with_buffer(mut self, buffer: i32) -> Self {
        self.collision_buffer = buffer;
        self
    }

    pub fn spacing(&self) -> i32 {
        self.node_spacing.max(MIN_NODE_SPACING)
    }

    pub fn buffer(&self) -> i32 {
        self.collision_buffer.max(0)
    }

    pub fn max_edge_distance(&self) -> f64 {
        f64::from(self.spacing()) * self.edge_distance_multiplier
    }

    pub fn close_neighbor_distance(&self) -> f64 {
        f64::from(self.spacing()) * self.close_neighbor_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = BuilderConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: BuilderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: BuilderConfig =
            serde_json::from_str(r#"{ "node_spacing": 30, "min_coverage": 0.75 }"#).unwrap();
        assert_eq!(config.spacing(), 30);
        assert_eq!(config.min_coverage, 0.75);
        assert_eq!(config.max_neighbors, 8);
        assert_eq!(config.max_edge_distance(), 90.0);
    }

    #[test]
    fn spacing_and_buffer_are_clamped() {
        let config = BuilderConfig::default().with_spacing(3).with_buffer(-4);
        assert_eq!(config.spacing(), MIN_NODE_SPACING);
        assert_eq!(config.buffer(), 0);
        assert_eq!(config.close_neighbor_distance(), 15.0);
    }
}
