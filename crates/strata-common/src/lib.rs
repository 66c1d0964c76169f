pub mod error;
pub mod pos;
pub mod types;

pub use error::StrataError;
pub use pos::{
    ChunkPosition, InChunkPosition, InFilePosition, Position3D, ScreenPosition, WorldPosition,
};
pub use types::Result;

/// Log target for records that report an unrecoverable condition. The process
/// logger prints these with FATAL severity.
pub const FATAL_TARGET: &str = "strata::fatal";
