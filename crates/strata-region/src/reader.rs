use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use strata_common::{InFilePosition, Result};
use strata_nbt::{NbtFile, TagType};

use crate::container::RegionContainer;

/// Reads and writes chunk records of one region container.
///
/// Every access to the container goes through one mutex so its directory
/// stays consistent; decoding and encoding happen outside the lock.
pub struct RegionChunkReader {
    path: PathBuf,
    container: Mutex<Box<dyn RegionContainer>>,
}

impl RegionChunkReader {
    pub fn new(container: Box<dyn RegionContainer>) -> Self {
        RegionChunkReader {
            path: container.path().to_path_buf(),
            container: Mutex::new(container),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn container(&self) -> MutexGuard<'_, Box<dyn RegionContainer>> {
        self.container
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The occupied slots of the container.
    pub fn chunks(&self) -> Vec<InFilePosition> {
        self.container().occupied_slots()
    }

    pub fn has_chunk(&self, slot: InFilePosition) -> bool {
        self.container().has_slot(slot)
    }

    /// Decodes the record stored in `slot`. The root must be a compound.
    pub fn read(&self, slot: InFilePosition) -> Result<Option<NbtFile>> {
        let Some(bytes) = self.container().read_slot(slot)? else {
            return Ok(None);
        };
        let (name, root) = strata_nbt::decode_expect(&mut Cursor::new(bytes), TagType::Compound)?;
        Ok(Some(NbtFile::new(name, root)))
    }

    /// Writes `file` into `slot` if it changed, then clears its change flags.
    /// Returns whether anything was written.
    pub fn write(&self, slot: InFilePosition, file: &mut NbtFile) -> Result<bool> {
        if !file.has_changed() {
            return Ok(false);
        }
        let bytes = file.to_bytes()?;
        self.container().write_slot(slot, &bytes)?;
        file.reset_change();
        Ok(true)
    }
}

impl std::fmt::Debug for RegionChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionChunkReader")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
