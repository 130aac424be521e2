// Error taxonomy for index construction, queries and persistence.
//
// Layout errors are raised once at codec construction and are fatal for that
// configuration. Range errors only occur in validated mode. Format and I/O
// errors abort a load or save without returning a partial index.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The coordinate fields do not fit in the key capacity.
    #[error(
        "key layout needs {used} bits (x {x_bits} + y {y_bits} + plane {plane_bits}) but capacity is {capacity}"
    )]
    Layout {
        used: u32,
        x_bits: u32,
        y_bits: u32,
        plane_bits: u32,
        capacity: u32,
    },

    #[error("key capacity {0} is outside 1..=32")]
    Capacity(u32),

    #[error("{axis} {value} out of range [{min}, {max}]")]
    OutOfRange {
        axis: &'static str,
        value: i32,
        min: i64,
        max: i64,
    },

    #[error("Data bit {bit} out of range [0, {max}]")]
    DataBitOutOfRange { bit: u32, max: u32 },

    #[error("tile class {0} out of range [0, 15]")]
    TileClassOutOfRange(u8),

    #[error("format error: {0}")]
    Format(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
