// Index construction from decoded per-tile facts.
//
// The world decoder (outside this crate) turns each map region into a
// `RegionFacts`: for every tile, whether it has a floor, its floor setting,
// its surface class and the objects placed on it. `IndexBuilder` compiles
// those facts into the collision, tile class and object indexes.
//
// Collision rules, per placed object (`blocks` is false for doors, gates and
// other passable placements, which then leave edges untouched):
// - straight wall (placement 0) and double wall (2): block the side given by
//   orientation 0 = west, 1 = north, 2 = east, 3 = south;
// - double wall also blocks the next side clockwise
//   (3 = west, 0 = north, 1 = east, 2 = south);
// - diagonal wall (9): block the whole tile;
// - footprint placements (9..=22) of interactive objects block every tile
//   of the rotated footprint when the object is a wall/door or the placement
//   is 10..=21.
// Per tile: no floor, or a floor setting of 1, 3, 5 or 7, blocks the whole
// tile regardless of objects.
//
// Regions never share tiles but do share the writers, so the driver runs
// regions on the rayon pool and relies on the writers' internal locks. No
// index is finalized until every region has been applied; the first failing
// region aborts the build.
//
// See also: `collision.rs`, `tile_class.rs`, `objects.rs` for the writers,
// `config.rs` for where the finished indexes are saved.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;
use rayon::prelude::*;

use crate::bitset::{AnyBitSet, SpatialBitSet};
use crate::codec::CoordCodec;
use crate::collision::{CollisionIndex, CollisionWriter};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::objects::{ObjectIndex, ObjectIndexWriter};
use crate::tile_class::{TileClassIndex, TileClassWriter};
use crate::types::TileCoord;

// ---------------------------------------------------------------------------
// Fact types
// ---------------------------------------------------------------------------

/// One object placement on a tile, as decoded from the world data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedObject {
    pub id: i32,
    /// Placement type, 0..=22.
    pub placement: u8,
    /// Rotation in quarter turns, 0..=3.
    pub orientation: u8,
    /// Unrotated footprint.
    pub size_x: u8,
    pub size_y: u8,
    /// Whether the object has a non-zero interaction type.
    pub interactive: bool,
    pub wall_or_door: bool,
    /// False for passable placements such as doors and gates.
    pub blocks: bool,
}

impl PlacedObject {
    /// A 1x1 blocking object with the given placement and orientation.
    pub fn new(id: i32, placement: u8, orientation: u8) -> Self {
        Self {
            id,
            placement,
            orientation,
            size_x: 1,
            size_y: 1,
            interactive: true,
            wall_or_door: false,
            blocks: true,
        }
    }

    /// Footprint after rotation.
    pub fn rotated_size(&self) -> (u8, u8) {
        if self.orientation % 2 == 1 {
            (self.size_y, self.size_x)
        } else {
            (self.size_x, self.size_y)
        }
    }
}

/// Everything the decoder knows about one tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileFacts {
    pub coord: TileCoord,
    /// False when both underlay and overlay are absent.
    pub has_floor: bool,
    /// Raw floor setting flags for the tile.
    pub floor_setting: u8,
    /// Surface class, 0 for none.
    pub tile_class: u8,
    pub objects: Vec<PlacedObject>,
}

impl TileFacts {
    /// A floored, unclassified tile with no objects.
    pub fn open(coord: TileCoord) -> Self {
        Self {
            coord,
            has_floor: true,
            floor_setting: 0,
            tile_class: 0,
            objects: Vec::new(),
        }
    }
}

/// The tiles of one world region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionFacts {
    pub tiles: Vec<TileFacts>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    West,
    North,
    East,
    South,
}

impl Side {
    fn from_orientation(orientation: u8) -> Side {
        match orientation % 4 {
            0 => Side::West,
            1 => Side::North,
            2 => Side::East,
            _ => Side::South,
        }
    }
}

const STRAIGHT_WALL: u8 = 0;
const DOUBLE_WALL: u8 = 2;
const DIAGONAL_WALL: u8 = 9;
const FOOTPRINT_PLACEMENTS: std::ops::RangeInclusive<u8> = 9..=22;
const SCENERY_PLACEMENTS: std::ops::RangeInclusive<u8> = 10..=21;

fn floor_setting_blocks(setting: u8) -> bool {
    matches!(setting, 1 | 3 | 5 | 7)
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Inclusive coordinate bounds seen during a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordBounds {
    pub min: TileCoord,
    pub max: TileCoord,
}

impl CoordBounds {
    pub fn of(coord: TileCoord) -> Self {
        Self {
            min: coord,
            max: coord,
        }
    }

    pub fn include(&mut self, c: TileCoord) {
        self.min = TileCoord::new(self.min.x.min(c.x), self.min.y.min(c.y), self.min.plane.min(c.plane));
        self.max = TileCoord::new(self.max.x.max(c.x), self.max.y.max(c.y), self.max.plane.max(c.plane));
    }

    pub fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(mut a), Some(b)) => {
                a.include(b.min);
                a.include(b.max);
                Some(a)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Bits each axis needs to cover its span: (x, y, plane).
    pub fn bits_needed(&self) -> (u32, u32, u32) {
        let bits = |lo: i32, hi: i32| {
            let span = (i64::from(hi) - i64::from(lo)) as u64;
            u64::BITS - span.leading_zeros()
        };
        (
            bits(self.min.x, self.max.x),
            bits(self.min.y, self.max.y),
            bits(self.min.plane, self.max.plane),
        )
    }
}

/// Summary of a region build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub regions: usize,
    pub tiles: usize,
    pub bounds: Option<CoordBounds>,
}

impl BuildReport {
    fn merge(self, other: BuildReport) -> BuildReport {
        BuildReport {
            regions: self.regions + other.regions,
            tiles: self.tiles + other.tiles,
            bounds: CoordBounds::merge(self.bounds, other.bounds),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Shared writers for one index build.
#[derive(Debug)]
pub struct IndexBuilder<B = AnyBitSet> {
    collision: CollisionWriter<B>,
    tile_classes: TileClassWriter<B>,
    objects: ObjectIndexWriter,
}

impl IndexBuilder<AnyBitSet> {
    /// Writers for the layouts and backend named in `config`.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Ok(Self {
            collision: CollisionWriter::with_bits(
                config.collision_codec()?,
                AnyBitSet::empty(config.backend),
            ),
            tile_classes: TileClassWriter::with_bits(
                config.tile_class_codec()?,
                AnyBitSet::empty(config.backend),
            ),
            objects: ObjectIndexWriter::new(),
        })
    }
}

impl<B: SpatialBitSet> IndexBuilder<B> {
    pub fn new(collision_codec: CoordCodec, tile_class_codec: CoordCodec) -> Self {
        Self {
            collision: CollisionWriter::new(collision_codec),
            tile_classes: TileClassWriter::new(tile_class_codec),
            objects: ObjectIndexWriter::new(),
        }
    }

    pub fn collision(&self) -> &CollisionWriter<B> {
        &self.collision
    }

    pub fn tile_classes(&self) -> &TileClassWriter<B> {
        &self.tile_classes
    }

    pub fn objects(&self) -> &ObjectIndexWriter {
        &self.objects
    }

    /// Compile one tile's facts into the writers.
    pub fn apply_tile(&self, tile: &TileFacts) -> Result<()> {
        let TileCoord { x, y, plane } = tile.coord;
        for object in &tile.objects {
            self.objects.add_object(x, y, plane, object.id);
            self.apply_object(tile.coord, object)?;
        }
        if !tile.has_floor || floor_setting_blocks(tile.floor_setting) {
            self.collision.full_blocking(x, y, plane, true)?;
        }
        if tile.tile_class != 0 {
            self.tile_classes.set_tile_class(x, y, plane, tile.tile_class)?;
        }
        Ok(())
    }

    fn apply_object(&self, at: TileCoord, object: &PlacedObject) -> Result<()> {
        let TileCoord { x, y, plane } = at;
        let block = object.blocks;

        if object.placement == STRAIGHT_WALL || object.placement == DOUBLE_WALL {
            self.block_side(at, Side::from_orientation(object.orientation), block)?;
        }
        if object.placement == DOUBLE_WALL {
            self.block_side(at, Side::from_orientation(object.orientation.wrapping_add(1)), block)?;
        }
        if object.placement == DIAGONAL_WALL {
            self.collision.full_blocking(x, y, plane, block)?;
        }
        if FOOTPRINT_PLACEMENTS.contains(&object.placement)
            && object.interactive
            && (object.wall_or_door || SCENERY_PLACEMENTS.contains(&object.placement))
        {
            let (size_x, size_y) = object.rotated_size();
            for dx in 0..i32::from(size_x) {
                for dy in 0..i32::from(size_y) {
                    self.collision.full_blocking(x + dx, y + dy, plane, block)?;
                }
            }
        }
        Ok(())
    }

    fn block_side(&self, at: TileCoord, side: Side, block: bool) -> Result<()> {
        let TileCoord { x, y, plane } = at;
        match side {
            Side::West => self.collision.west_blocking(x, y, plane, block),
            Side::North => self.collision.north_blocking(x, y, plane, block),
            Side::East => self.collision.east_blocking(x, y, plane, block),
            Side::South => self.collision.south_blocking(x, y, plane, block),
        }
    }

    pub fn apply_region(&self, region: &RegionFacts) -> Result<BuildReport> {
        let mut bounds: Option<CoordBounds> = None;
        for tile in &region.tiles {
            self.apply_tile(tile)?;
            match bounds.as_mut() {
                Some(b) => b.include(tile.coord),
                None => bounds = Some(CoordBounds::of(tile.coord)),
            }
        }
        Ok(BuildReport {
            regions: 1,
            tiles: region.tiles.len(),
            bounds,
        })
    }

    /// Apply every region on the rayon pool. Returns after all regions are
    /// applied, or with the first error.
    pub fn build_regions(&self, regions: &[RegionFacts]) -> Result<BuildReport> {
        let report = run_regions(regions, |region| self.apply_region(region))?;
        if let Some(bounds) = report.bounds {
            let (x_bits, y_bits, plane_bits) = bounds.bits_needed();
            info!(
                "built {} regions / {} tiles; x {}..={} ({x_bits} bits), y {}..={} ({y_bits} bits), plane {}..={} ({plane_bits} bits)",
                report.regions,
                report.tiles,
                bounds.min.x,
                bounds.max.x,
                bounds.min.y,
                bounds.max.y,
                bounds.min.plane,
                bounds.max.plane
            );
        }
        Ok(report)
    }

    /// Optimize and freeze every index.
    pub fn finish(self) -> BuiltIndexes<B> {
        BuiltIndexes {
            collision: self.collision.finish(),
            tile_classes: self.tile_classes.finish(),
            objects: self.objects.finish(),
        }
    }
}

/// Run `work` over `regions` in parallel, logging progress every tenth of
/// the way. Merges the per-region reports.
pub fn run_regions<R, F>(regions: &[R], work: F) -> Result<BuildReport>
where
    R: Sync,
    F: Fn(&R) -> Result<BuildReport> + Sync,
{
    let total = regions.len();
    let step = (total / 10).max(1);
    let done = AtomicUsize::new(0);
    info!(
        "processing {total} regions on {} threads",
        rayon::current_num_threads()
    );
    regions
        .par_iter()
        .map(|region| {
            let report = work(region)?;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if n % step == 0 || n == total {
                info!("processed {n} / {total} regions");
            }
            Ok(report)
        })
        .try_reduce(BuildReport::default, |a, b| Ok(a.merge(b)))
}

/// The frozen result of a build.
#[derive(Debug)]
pub struct BuiltIndexes<B = AnyBitSet> {
    pub collision: CollisionIndex<B>,
    pub tile_classes: TileClassIndex<B>,
    pub objects: ObjectIndex,
}

impl<B: SpatialBitSet> BuiltIndexes<B> {
    /// Write all three index files to the locations named in `config`.
    pub fn save(&self, config: &IndexConfig) -> Result<()> {
        std::fs::create_dir_all(&config.output.dir)?;
        self.collision.save(&config.collision_path())?;
        self.tile_classes.save(&config.tile_class_path())?;
        self.objects
            .save(&config.objects_path(), config.object_file_version)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::RoaringBitSet;
    use crate::codec::KeyLayout;
    use crate::collision::CollisionQuery;
    use crate::error::IndexError;
    use crate::tile_class::{TileClassQuery, surface};
    use crate::types::DirectionFlags;

    fn builder() -> IndexBuilder<RoaringBitSet> {
        let codec = CoordCodec::new(KeyLayout::compact_world()).unwrap();
        IndexBuilder::new(codec, codec)
    }

    fn tile_with(x: i32, y: i32, objects: Vec<PlacedObject>) -> TileFacts {
        TileFacts {
            objects,
            ..TileFacts::open(TileCoord::new(x, y, 0))
        }
    }

    #[test]
    fn wall_orientations_block_matching_sides() {
        let b = builder();
        for (i, orientation) in (0u8..4).enumerate() {
            let x = 3000 + 10 * i as i32;
            b.apply_tile(&tile_with(x, 3000, vec![PlacedObject::new(1, 0, orientation)]))
                .unwrap();
        }
        let index = b.finish().collision;
        assert!(!index.pathable_west(3000, 3000, 0));
        assert!(!index.pathable_north(3010, 3000, 0));
        assert!(!index.pathable_east(3020, 3000, 0));
        assert!(!index.pathable_south(3030, 3000, 0));
        assert_eq!(index.blocked_cardinals(3000, 3000, 0), 1);
        assert_eq!(index.blocked_cardinals(3030, 3000, 0), 1);
    }

    #[test]
    fn double_wall_blocks_two_sides() {
        let b = builder();
        b.apply_tile(&tile_with(3000, 3000, vec![PlacedObject::new(1, 2, 1)]))
            .unwrap();
        let index = b.finish().collision;
        assert!(!index.pathable_north(3000, 3000, 0));
        assert!(!index.pathable_east(3000, 3000, 0));
        assert!(index.pathable_west(3000, 3000, 0));
        assert!(index.pathable_south(3000, 3000, 0));
    }

    #[test]
    fn doors_leave_edges_open() {
        let b = builder();
        let door = PlacedObject {
            blocks: false,
            ..PlacedObject::new(1535, 0, 1)
        };
        b.apply_tile(&tile_with(3000, 3000, vec![door])).unwrap();
        let built = b.finish();
        assert_eq!(built.collision.all(3000, 3000, 0), DirectionFlags::all());
        assert_eq!(built.objects.objects_at(3000, 3000, 0), &[1535]);
    }

    #[test]
    fn large_scenery_blocks_rotated_footprint() {
        let b = builder();
        let rock = PlacedObject {
            size_x: 3,
            size_y: 1,
            ..PlacedObject::new(7, 10, 1)
        };
        b.apply_tile(&tile_with(3000, 3000, vec![rock])).unwrap();
        let index = b.finish().collision;
        for dy in 0..3 {
            assert!(index.is_blocked(3000, 3000 + dy, 0), "dy = {dy}");
        }
        assert!(!index.is_blocked(3001, 3000, 0));
        assert!(!index.is_blocked(3000, 3003, 0));
    }

    #[test]
    fn non_interactive_or_decorative_objects_do_not_block() {
        let b = builder();
        let decoration = PlacedObject {
            interactive: false,
            ..PlacedObject::new(1, 10, 0)
        };
        let ground_decor = PlacedObject::new(2, 22, 0);
        b.apply_tile(&tile_with(3000, 3000, vec![decoration, ground_decor]))
            .unwrap();
        let index = b.finish().collision;
        assert!(!index.is_blocked(3000, 3000, 0));
    }

    #[test]
    fn missing_or_blocking_floor_blocks_tile() {
        let b = builder();
        b.apply_tile(&TileFacts {
            has_floor: false,
            ..TileFacts::open(TileCoord::new(3000, 3000, 0))
        })
        .unwrap();
        b.apply_tile(&TileFacts {
            floor_setting: 5,
            ..TileFacts::open(TileCoord::new(3005, 3000, 0))
        })
        .unwrap();
        b.apply_tile(&TileFacts {
            floor_setting: 2,
            ..TileFacts::open(TileCoord::new(3010, 3000, 0))
        })
        .unwrap();
        let index = b.finish().collision;
        assert!(index.is_blocked(3000, 3000, 0));
        assert!(index.is_blocked(3005, 3000, 0));
        assert!(!index.is_blocked(3010, 3000, 0));
    }

    #[test]
    fn parallel_build_matches_facts() {
        let regions: Vec<RegionFacts> = (0..16)
            .map(|r| RegionFacts {
                tiles: (0..64)
                    .map(|i| TileFacts {
                        tile_class: surface::KELP,
                        ..TileFacts::open(TileCoord::new(2000 + r * 64 + i, 3000, 0))
                    })
                    .collect(),
            })
            .collect();
        let b = builder();
        let report = b.build_regions(&regions).unwrap();
        assert_eq!(report.regions, 16);
        assert_eq!(report.tiles, 1024);
        let bounds = report.bounds.unwrap();
        assert_eq!(bounds.min, TileCoord::new(2000, 3000, 0));
        assert_eq!(bounds.max, TileCoord::new(3023, 3000, 0));
        assert_eq!(bounds.bits_needed(), (10, 0, 0));

        let built = b.finish();
        assert_eq!(built.tile_classes.tile_class(2000, 3000, 0), surface::KELP);
        assert_eq!(built.tile_classes.tile_class(3023, 3000, 0), surface::KELP);
        assert_eq!(built.tile_classes.tile_class(3024, 3000, 0), 0);
    }

    #[test]
    fn first_failing_region_aborts_the_build() {
        let regions = vec![
            RegionFacts {
                tiles: vec![TileFacts::open(TileCoord::new(3000, 3000, 0))],
            },
            RegionFacts {
                tiles: vec![TileFacts {
                    tile_class: 1,
                    ..TileFacts::open(TileCoord::new(10, 3000, 0))
                }],
            },
        ];
        let err = builder().build_regions(&regions).unwrap_err();
        assert!(matches!(err, IndexError::OutOfRange { axis: "X coordinate", .. }));
    }

    #[test]
    fn built_indexes_save_to_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = IndexConfig::default();
        config.output.dir = dir.path().join("out");
        let b = IndexBuilder::from_config(&config).unwrap();
        b.apply_tile(&tile_with(3000, 3000, vec![PlacedObject::new(9, 9, 0)]))
            .unwrap();
        b.finish().save(&config).unwrap();

        let collision =
            CollisionIndex::load(&config.collision_path(), config.collision_codec().unwrap())
                .unwrap();
        assert!(collision.is_blocked(3000, 3000, 0));
        let objects = ObjectIndex::load(&config.objects_path()).unwrap();
        assert_eq!(objects.objects_at(3000, 3000, 0), &[9]);
        assert!(config.tile_class_path().exists());
    }
}
