// Index build and load configuration.
//
// `IndexConfig` collects every layout and path an index build or query
// session needs, loaded from JSON at startup and passed down explicitly. The
// key layouts in particular are plain values here; nothing in the crate keeps
// a process-wide layout.
//
// Missing fields fall back to `Default`, so a config file only has to list
// what it changes.
//
// See also: `codec.rs` for `KeyLayout`, `storage.rs` for file naming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bitset::BackendKind;
use crate::codec::{CoordCodec, KeyLayout};
use crate::error::Result;
use crate::objects::ObjectFileVersion;
use crate::storage::index_file_name;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Layout of collision keys. Needs at least 2 data channels.
    pub collision_layout: KeyLayout,

    /// Layout of tile class keys. Needs 4 data channels for all 16 classes.
    pub tile_class_layout: KeyLayout,

    /// Backend used when building new indexes.
    pub backend: BackendKind,

    /// Gzip-wrap index files on save.
    pub gzip: bool,

    /// Format of the object index file written by builds.
    pub object_file_version: ObjectFileVersion,

    pub output: OutputPaths,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collision_layout: KeyLayout::compact_world(),
            tile_class_layout: KeyLayout::compact_world(),
            backend: BackendKind::Roaring,
            gzip: true,
            object_file_version: ObjectFileVersion::V2,
            output: OutputPaths::default(),
        }
    }
}

/// Where index and graph files live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub dir: PathBuf,
    /// File name stem of the collision index; backend and suffix are added.
    pub collision_stem: String,
    pub tile_class_stem: String,
    pub objects_file: String,
    pub graph_file: String,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            collision_stem: "collision".into(),
            tile_class_stem: "tile_classes".into(),
            objects_file: "objects.dat".into(),
            graph_file: "water_web.gweb".into(),
        }
    }
}

impl IndexConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn collision_codec(&self) -> Result<CoordCodec> {
        CoordCodec::new(self.collision_layout)
    }

    pub fn tile_class_codec(&self) -> Result<CoordCodec> {
        CoordCodec::new(self.tile_class_layout)
    }

    pub fn collision_path(&self) -> PathBuf {
        self.output.dir.join(index_file_name(
            &self.output.collision_stem,
            self.backend,
            self.gzip,
        ))
    }

    pub fn tile_class_path(&self) -> PathBuf {
        self.output.dir.join(index_file_name(
            &self.output.tile_class_stem,
            self.backend,
            self.gzip,
        ))
    }

    pub fn objects_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.objects_file)
    }

    pub fn graph_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.graph_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = IndexConfig::default();
        let json = config.to_json().unwrap();
        let restored = IndexConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
        assert!(json.contains("\"backend\": \"roaring\""));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{
            "backend": "sparse",
            "gzip": false,
            "tile_class_layout": {
                "x_bits": 13, "x_base": 960,
                "y_bits": 14, "y_base": 0,
                "plane_bits": 2, "plane_base": 0,
                "capacity": 32
            },
            "output": { "dir": "/data/world" }
        }"#;
        let config = IndexConfig::from_json(json).unwrap();
        assert_eq!(config.backend, BackendKind::Sparse);
        assert_eq!(config.tile_class_layout.x_base, 960);
        assert_eq!(config.collision_layout, KeyLayout::compact_world());
        assert_eq!(config.object_file_version, ObjectFileVersion::V2);
        assert_eq!(
            config.collision_path(),
            PathBuf::from("/data/world/collision_sparse.dat")
        );
        assert_eq!(config.graph_path(), PathBuf::from("/data/world/water_web.gweb"));
    }

    #[test]
    fn invalid_layout_surfaces_when_codec_is_built() {
        let json = r#"{ "collision_layout": {
            "x_bits": 20, "x_base": 0, "y_bits": 20, "y_base": 0,
            "plane_bits": 2, "plane_base": 0, "capacity": 32 } }"#;
        let config = IndexConfig::from_json(json).unwrap();
        assert!(config.collision_codec().is_err());
        assert!(config.tile_class_codec().is_ok());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            IndexConfig::from_json("{ nope"),
            Err(crate::error::IndexError::Config(_))
        ));
    }
}
