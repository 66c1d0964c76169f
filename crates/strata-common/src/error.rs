use std::io;
use std::path::PathBuf;

use strata_nbt::NbtError;

use crate::pos::ChunkPosition;

#[derive(Debug, thiserror::Error)]
pub enum StrataError {
    /// A record stream was malformed or truncated. Fatal for that record only.
    #[error("decode error: {0}")]
    Decode(#[from] NbtError),

    /// The backing container could not be read or written.
    #[error("container I/O error on {}: {source}", path.display())]
    ContainerIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The container's directory points outside the file or overlaps itself.
    #[error("corrupt container {}: {reason}", path.display())]
    CorruptContainer { path: PathBuf, reason: String },

    /// Memory pressure persisted with no evictable chunk left.
    #[error("memory exhausted and no chunk can be evicted")]
    EvictionExhausted,

    /// Persisting a chunk on unload failed; the chunk was still released.
    #[error("could not write back chunk {pos}: {source}")]
    WriteBack {
        pos: ChunkPosition,
        #[source]
        source: Box<StrataError>,
    },

    /// A caller passed arguments outside the documented domain.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("no section at height {y}")]
    MissingSection { y: i32 },

    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StrataError {
    pub fn container_io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> StrataError {
        let path = path.into();
        move |source| StrataError::ContainerIo { path, source }
    }

    /// Whether this error stems from the allocator refusing a buffer.
    pub fn is_allocation_failure(&self) -> bool {
        match self {
            StrataError::Decode(err) => err.is_allocation_failure(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Config(err.to_string())
    }
}
