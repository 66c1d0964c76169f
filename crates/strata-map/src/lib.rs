//! Chunk model and chunk caches on top of region files.

pub mod biomes;
pub mod blocks;
pub mod chunk;
pub mod color;
pub mod config;
pub mod manager;
pub mod memory;
pub mod serial;

pub use chunk::{Chunk, SharedChunk};
pub use color::Rgba;
pub use config::ManagerConfig;
pub use manager::{ChunkManager, ScanSummary, UpdateReceiver};
pub use memory::{MemoryProbe, SystemMemoryProbe};
pub use serial::SerialChunkManager;
