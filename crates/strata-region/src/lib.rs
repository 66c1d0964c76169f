//! Region containers and the per-file chunk readers built on them.

pub mod anvil;
pub mod container;
pub mod memory;
pub mod reader;
pub mod registry;

pub use anvil::AnvilRegion;
pub use container::RegionContainer;
pub use memory::MemoryRegion;
pub use reader::RegionChunkReader;
pub use registry::{AnvilOpener, ContainerOpener, ReaderRegistry};
