use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use strata_common::Result;

use crate::anvil::AnvilRegion;
use crate::container::RegionContainer;
use crate::reader::RegionChunkReader;

/// Opens the container behind a region file path.
pub trait ContainerOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn RegionContainer>>;
}

/// Opens region files in the standard on-disk format.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnvilOpener;

impl ContainerOpener for AnvilOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RegionContainer>> {
        Ok(Box::new(AnvilRegion::open(path)?))
    }
}

/// Hands out one shared [`RegionChunkReader`] per region file.
pub struct ReaderRegistry {
    opener: Arc<dyn ContainerOpener>,
    readers: Mutex<HashMap<PathBuf, Arc<RegionChunkReader>>>,
}

impl ReaderRegistry {
    pub fn new(opener: Arc<dyn ContainerOpener>) -> Self {
        ReaderRegistry {
            opener,
            readers: Mutex::new(HashMap::new()),
        }
    }

    fn readers(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<RegionChunkReader>>> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The reader for `path`, opening the container on first use. The
    /// container is opened without holding the registry lock; if two threads
    /// race on the same path the first reader registered wins.
    pub fn get(&self, path: &Path) -> Result<Arc<RegionChunkReader>> {
        if let Some(reader) = self.readers().get(path) {
            return Ok(Arc::clone(reader));
        }
        debug!("opening region {}", path.display());
        let opened = Arc::new(RegionChunkReader::new(self.opener.open(path)?));
        let mut readers = self.readers();
        let reader = readers.entry(path.to_path_buf()).or_insert(opened);
        Ok(Arc::clone(reader))
    }

    /// Drops every cached reader. Readers still held elsewhere stay usable.
    pub fn clear(&self) {
        self.readers().clear();
    }

    pub fn len(&self) -> usize {
        self.readers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        ReaderRegistry::new(Arc::new(AnvilOpener))
    }
}
