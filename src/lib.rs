pub mod cli;

// Re-export the workspace crates
pub use strata_common as common;
pub use strata_logger as logger;
pub use strata_map as map;
pub use strata_nbt as nbt;
pub use strata_region as region;
