use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use strata_common::{ChunkPosition, Result, WorldPosition};
use strata_region::{AnvilOpener, ContainerOpener, ReaderRegistry};

use crate::chunk::Chunk;
use crate::manager::{region_files, PendingEntry, ScanSummary};

/// A single-threaded chunk cache for batch tools. Chunks are loaded on first
/// access and stay loaded until unloaded explicitly or the folder changes.
pub struct SerialChunkManager {
    registry: ReaderRegistry,
    loaded: HashMap<ChunkPosition, Chunk>,
    pending: HashMap<ChunkPosition, PendingEntry>,
    extension: String,
}

impl SerialChunkManager {
    pub fn new(extension: impl Into<String>) -> Self {
        SerialChunkManager::with_opener(extension, Arc::new(AnvilOpener))
    }

    pub fn with_opener(extension: impl Into<String>, opener: Arc<dyn ContainerOpener>) -> Self {
        SerialChunkManager {
            registry: ReaderRegistry::new(opener),
            loaded: HashMap::new(),
            pending: HashMap::new(),
            extension: extension.into(),
        }
    }

    /// Scans `dir`, recording every chunk found as pending. Changed chunks
    /// are written back first. Without `clear_cache` positions from earlier
    /// folders are kept and overwritten where `dir` has the same chunk.
    pub fn set_folder(&mut self, dir: impl AsRef<Path>, clear_cache: bool) -> Result<ScanSummary> {
        let dir = dir.as_ref();
        self.persist_all()?;
        if clear_cache {
            self.pending.clear();
            self.registry.clear();
        }

        let mut summary = ScanSummary::default();
        for path in region_files(dir, &self.extension)? {
            let reader = match self.registry.get(&path) {
                Ok(reader) => reader,
                Err(err) => {
                    warn!("skipping region {}: {}", path.display(), err);
                    summary.skipped += 1;
                    continue;
                }
            };
            summary.files += 1;
            for slot in reader.chunks() {
                match Chunk::read(Arc::clone(&reader), slot) {
                    Ok(Some(chunk)) => {
                        self.pending.insert(chunk.pos(), PendingEntry::of(&chunk));
                        summary.chunks += 1;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!("{}: skipping slot {}: {}", path.display(), slot, err);
                        summary.skipped += 1;
                    }
                }
            }
        }
        info!(
            "found {} chunks in {} files under {}",
            summary.chunks,
            summary.files,
            dir.display()
        );
        Ok(summary)
    }

    /// The chunk containing `pos`, loading it if needed.
    pub fn chunk_at(&mut self, pos: WorldPosition) -> Result<Option<&mut Chunk>> {
        let chunk_pos = pos.pos_of_chunk();
        if !self.loaded.contains_key(&chunk_pos) {
            let Some(entry) = self.pending.get(&chunk_pos) else {
                return Ok(None);
            };
            let reader = self.registry.get(&entry.path)?;
            match Chunk::read(reader, entry.slot)? {
                Some(chunk) => {
                    self.pending.remove(&chunk_pos);
                    self.loaded.insert(chunk_pos, chunk);
                }
                None => {
                    self.pending.remove(&chunk_pos);
                    return Ok(None);
                }
            }
        }
        Ok(self.loaded.get_mut(&chunk_pos))
    }

    /// Writes a loaded chunk back if it changed and demotes it to pending.
    pub fn unload_chunk(&mut self, pos: ChunkPosition) -> Result<bool> {
        let Some(mut chunk) = self.loaded.remove(&pos) else {
            return Ok(false);
        };
        self.pending.insert(pos, PendingEntry::of(&chunk));
        chunk.unload()
    }

    /// Whether a chunk is known at `pos`, loaded or not.
    pub fn exists(&self, pos: WorldPosition) -> bool {
        let chunk_pos = pos.pos_of_chunk();
        self.loaded.contains_key(&chunk_pos) || self.pending.contains_key(&chunk_pos)
    }

    /// Height of the topmost non-air block at `pos`, leaving the chunk loaded
    /// only if it already was.
    pub fn top_most_position(&mut self, pos: WorldPosition) -> Result<Option<i32>> {
        let chunk_pos = pos.pos_of_chunk();
        let was_loaded = self.loaded.contains_key(&chunk_pos);
        let column = pos.pos_in_chunk();
        let Some(chunk) = self.chunk_at(pos)? else {
            return Ok(None);
        };
        let top = chunk.top_non_air_block(column.x, column.z)?;
        if !was_loaded {
            self.unload_chunk(chunk_pos)?;
        }
        Ok(Some(top.y))
    }

    /// Unloads every loaded chunk.
    pub fn persist_all(&mut self) -> Result<()> {
        let positions: Vec<ChunkPosition> = self.loaded.keys().copied().collect();
        for pos in positions {
            self.unload_chunk(pos)?;
        }
        Ok(())
    }

    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for SerialChunkManager {
    fn drop(&mut self) {
        if let Err(err) = self.persist_all() {
            log::error!("could not persist chunks: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::tests::chunk_record;
    use strata_common::InFilePosition;
    use strata_nbt::NbtFile;
    use strata_region::{AnvilRegion, RegionContainer};

    fn write_region(dir: &Path, name: &str, chunks: &[(i32, i32, InFilePosition)]) {
        let mut region = AnvilRegion::create(dir.join(name)).unwrap();
        for &(x, z, slot) in chunks {
            let bytes = NbtFile::new("", chunk_record(x, z, &[(0, 1), (3, 2)]))
                .to_bytes()
                .unwrap();
            region.write_slot(slot, &bytes).unwrap();
        }
    }

    #[test]
    fn test_load_edit_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        write_region(
            dir.path(),
            "r.0.0.mca",
            &[(0, 0, InFilePosition::new(0, 0)), (1, 0, InFilePosition::new(1, 0))],
        );

        let mut manager = SerialChunkManager::new("mca");
        let summary = manager.set_folder(dir.path(), true).unwrap();
        assert_eq!(summary.chunks, 2);
        assert_eq!(manager.pending_len(), 2);
        assert!(manager.exists(WorldPosition::new(17, 3)));
        assert!(!manager.exists(WorldPosition::new(-1, 3)));

        let chunk = manager.chunk_at(WorldPosition::new(17, 3)).unwrap().unwrap();
        assert_eq!(chunk.pos(), ChunkPosition::new(1, 0));
        chunk.set_block(1, 60, 3, 7).unwrap();
        assert_eq!(manager.loaded_len(), 1);
        assert!(manager.unload_chunk(ChunkPosition::new(1, 0)).unwrap());
        assert_eq!(manager.loaded_len(), 0);
        drop(manager);

        let mut manager = SerialChunkManager::new("mca");
        manager.set_folder(dir.path(), true).unwrap();
        let chunk = manager.chunk_at(WorldPosition::new(17, 3)).unwrap().unwrap();
        assert_eq!(chunk.block(1, 60, 3).unwrap(), 7);
        assert!(!chunk.has_changed());
    }

    #[test]
    fn test_top_most_position() {
        let dir = tempfile::tempdir().unwrap();
        write_region(dir.path(), "r.0.0.mca", &[(0, 0, InFilePosition::new(0, 0))]);

        let mut manager = SerialChunkManager::new("mca");
        manager.set_folder(dir.path(), true).unwrap();
        assert_eq!(manager.top_most_position(WorldPosition::new(5, 5)).unwrap(), Some(63));
        assert_eq!(manager.loaded_len(), 0);
        assert_eq!(manager.top_most_position(WorldPosition::new(40, 5)).unwrap(), None);
    }

    #[test]
    fn test_keep_cache_between_folders() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_region(first.path(), "r.0.0.mca", &[(0, 0, InFilePosition::new(0, 0))]);
        write_region(second.path(), "r.0.0.mca", &[(2, 0, InFilePosition::new(2, 0))]);

        let mut manager = SerialChunkManager::new("mca");
        manager.set_folder(first.path(), true).unwrap();
        manager.set_folder(second.path(), false).unwrap();
        assert_eq!(manager.pending_len(), 2);
        manager.set_folder(second.path(), true).unwrap();
        assert_eq!(manager.pending_len(), 1);
    }
}
