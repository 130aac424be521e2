// Synthetic world for end-to-end pipeline tests.
//
// `Lagoon` describes a square of map regions filled with open water and a
// few features the pipeline has to get right:
// - a land border and a land island in the middle;
// - a band of kelp (a second water class) across the lower part;
// - an inland pond, water but walled off by land, that a flood fill from
//   the lagoon must never reach;
// - a rock (an interactive scenery object) that fully blocks its tile;
// - a straight wall on the north side of one tile;
// - one water tile with no floor, which blocks like land.
//
// `regions()` turns the layout into per-region `RegionFacts`, the same shape
// a world decoder hands to `IndexBuilder::build_regions`.
//
// See also: `tests/full_pipeline.rs` for the tests that drive it.

use tidewater_index::TileCoord;
use tidewater_index::build::{PlacedObject, RegionFacts, TileFacts};
use tidewater_index::tile_class::surface;

pub const ORIGIN_X: i32 = 3072;
pub const ORIGIN_Y: i32 = 3072;
pub const REGION_SIZE: i32 = 64;

pub const ROCK_ID: i32 = 1234;
pub const WALL_ID: i32 = 987;

/// Placement type of interactive scenery.
const SCENERY: u8 = 10;
/// Placement type of a straight wall.
const STRAIGHT_WALL: u8 = 0;
/// Wall orientation facing north.
const FACING_NORTH: u8 = 1;

#[derive(Clone, Copy, Debug)]
pub struct Lagoon {
    pub regions_per_side: i32,
}

impl Lagoon {
    pub fn new(regions_per_side: i32) -> Self {
        Self { regions_per_side }
    }

    /// Width and height in tiles.
    pub fn side(&self) -> i32 {
        self.regions_per_side * REGION_SIZE
    }

    /// World coordinate of a local tile.
    pub fn tile(&self, lx: i32, ly: i32) -> TileCoord {
        TileCoord::new(ORIGIN_X + lx, ORIGIN_Y + ly, 0)
    }

    pub fn seed(&self) -> TileCoord {
        self.tile(20, 20)
    }

    pub fn rock(&self) -> TileCoord {
        self.tile(self.side() - 32, self.side() - 32)
    }

    pub fn wall(&self) -> TileCoord {
        self.tile(40, self.side() - 38)
    }

    pub fn unfloored(&self) -> TileCoord {
        self.tile(self.side() - 28, 40)
    }

    pub fn kelp_tile(&self) -> TileCoord {
        self.tile(self.side() / 2, 40)
    }

    pub fn pond_center(&self) -> TileCoord {
        self.tile(14, self.side() - 20)
    }

    pub fn island_center(&self) -> TileCoord {
        self.tile(self.side() / 2, self.side() / 2)
    }

    fn in_border(&self, lx: i32, ly: i32) -> bool {
        let side = self.side();
        lx < 4 || ly < 4 || lx >= side - 4 || ly >= side - 4
    }

    fn in_island(&self, lx: i32, ly: i32) -> bool {
        let mid = self.side() / 2;
        (mid - 8..mid + 8).contains(&lx) && (mid - 8..mid + 8).contains(&ly)
    }

    /// Pond water, and the two-tile land ring around it.
    fn in_pond(&self, lx: i32, ly: i32) -> (bool, bool) {
        let top = self.side() - 28;
        let water = (8..=19).contains(&lx) && (top..=top + 15).contains(&ly);
        let ring = (6..=21).contains(&lx) && (top - 2..=top + 17).contains(&ly);
        (water, ring && !water)
    }

    /// Surface class of a local tile.
    pub fn class_at(&self, lx: i32, ly: i32) -> u8 {
        let (pond, pond_ring) = self.in_pond(lx, ly);
        if self.in_border(lx, ly) || self.in_island(lx, ly) || pond_ring {
            surface::NONE
        } else if pond {
            surface::WATER
        } else if (30..50).contains(&ly) {
            surface::KELP
        } else {
            surface::WATER
        }
    }

    fn facts(&self, lx: i32, ly: i32) -> TileFacts {
        let coord = self.tile(lx, ly);
        let mut tile = TileFacts::open(coord);
        tile.tile_class = self.class_at(lx, ly);
        if coord == self.rock() {
            tile.objects.push(PlacedObject::new(ROCK_ID, SCENERY, 0));
        }
        if coord == self.wall() {
            tile.objects
                .push(PlacedObject::new(WALL_ID, STRAIGHT_WALL, FACING_NORTH));
        }
        if coord == self.unfloored() {
            tile.has_floor = false;
        }
        tile
    }

    /// Facts for every region, row by row.
    pub fn regions(&self) -> Vec<RegionFacts> {
        let mut regions = Vec::new();
        for ry in 0..self.regions_per_side {
            for rx in 0..self.regions_per_side {
                let mut region = RegionFacts::default();
                for ly in ry * REGION_SIZE..(ry + 1) * REGION_SIZE {
                    for lx in rx * REGION_SIZE..(rx + 1) * REGION_SIZE {
                        region.tiles.push(self.facts(lx, ly));
                    }
                }
                regions.push(region);
            }
        }
        regions
    }
}
