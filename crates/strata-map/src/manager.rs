//! The chunk cache.
//!
//! Every known chunk position is either *loaded* (its decoded [`Chunk`] is in
//! memory) or *pending* (only the file and slot to reload it from are kept),
//! never both. A folder scan decodes each chunk once to learn its position and
//! leaves it pending. Callers poll [`ChunkManager::get_chunk`] and request
//! misses with [`ChunkManager::needs_reload`]; a fixed pool of worker threads
//! decodes them in the background and reports through the [`UpdateReceiver`].
//!
//! Under memory pressure, as reported by the injected [`MemoryProbe`], workers
//! evict every loaded chunk that is neither pinned nor part of the current
//! edit batch before decoding more.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use strata_common::{ChunkPosition, InChunkPosition, InFilePosition, Result, StrataError};
use strata_region::{AnvilOpener, ContainerOpener, ReaderRegistry};

use crate::chunk::{Chunk, SharedChunk};
use crate::config::ManagerConfig;
use crate::memory::{MemoryProbe, SystemMemoryProbe};

/// Receives notifications from a [`ChunkManager`]. Called from worker and
/// scanner threads.
pub trait UpdateReceiver: Send + Sync {
    /// Chunks were loaded or a region file was scanned.
    fn something_changed(&self);

    /// Memory ran low and loaded chunks are about to be evicted.
    fn memory_panic(&self) {}
}

/// Where a pending chunk can be reloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEntry {
    pub(crate) path: PathBuf,
    pub(crate) slot: InFilePosition,
}

impl PendingEntry {
    pub(crate) fn of(chunk: &Chunk) -> Self {
        PendingEntry {
            path: chunk.reader().path().to_path_buf(),
            slot: chunk.slot(),
        }
    }
}

/// Result of a folder scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Region files opened.
    pub files: usize,
    /// Chunks found and recorded as pending.
    pub chunks: usize,
    /// Files or slots that could not be read.
    pub skipped: usize,
    /// Whether a newer folder change stopped the scan early.
    pub cancelled: bool,
}

/// Region files under `dir` with the given extension, ordered by name with
/// `-` signs ignored.
pub(crate) fn region_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|n| n.to_string_lossy().replace('-', ""))
            .unwrap_or_default()
    });
    Ok(files)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct WorkSet {
    queued: HashSet<ChunkPosition>,
    in_flight: HashSet<ChunkPosition>,
    shutdown: bool,
}

enum Reload {
    Done(bool),
    NeedsEviction,
}

struct Shared {
    config: ManagerConfig,
    receiver: Arc<dyn UpdateReceiver>,
    probe: Arc<dyn MemoryProbe>,
    registry: ReaderRegistry,

    loaded: Mutex<HashMap<ChunkPosition, SharedChunk>>,
    pending: Mutex<HashMap<ChunkPosition, PendingEntry>>,
    edited: Mutex<HashMap<ChunkPosition, SharedChunk>>,
    pinned: Mutex<HashSet<ChunkPosition>>,
    reload_errors: Mutex<HashMap<ChunkPosition, StrataError>>,

    work: Mutex<WorkSet>,
    work_ready: Condvar,

    generation: AtomicU64,
    multiedit: AtomicBool,
    lenient: AtomicBool,
    fatal: AtomicBool,
}

pub struct ChunkManager {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    scanner: Mutex<Option<JoinHandle<()>>>,
}

impl ChunkManager {
    /// A manager with default configuration reading region files from disk.
    pub fn new(receiver: Arc<dyn UpdateReceiver>) -> Self {
        ChunkManager::with_parts(
            ManagerConfig::default(),
            receiver,
            Arc::new(SystemMemoryProbe),
            Arc::new(AnvilOpener),
        )
    }

    pub fn with_parts(
        config: ManagerConfig,
        receiver: Arc<dyn UpdateReceiver>,
        probe: Arc<dyn MemoryProbe>,
        opener: Arc<dyn ContainerOpener>,
    ) -> Self {
        let worker_count = config.worker_count().max(1);
        let shared = Arc::new(Shared {
            config,
            receiver,
            probe,
            registry: ReaderRegistry::new(opener),
            loaded: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            edited: Mutex::new(HashMap::new()),
            pinned: Mutex::new(HashSet::new()),
            reload_errors: Mutex::new(HashMap::new()),
            work: Mutex::new(WorkSet::default()),
            work_ready: Condvar::new(),
            generation: AtomicU64::new(0),
            multiedit: AtomicBool::new(false),
            lenient: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
        });

        let workers = (0..worker_count)
            .filter_map(|i| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("chunk-reload-{}", i))
                    .spawn(move || shared.worker_loop())
                    .inspect_err(|err| error!("cannot start reload worker {}: {}", i, err))
                    .ok()
            })
            .collect();
        debug!("started {} reload workers", worker_count);

        ChunkManager {
            shared,
            workers,
            scanner: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Switches to the region files in `dir`. Loaded chunks are persisted and
    /// every cache is cleared; the folder is then scanned on a background
    /// thread, cancelling any scan still running.
    pub fn set_folder(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let generation = self.shared.reset();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("chunk-scan".to_owned())
            .spawn(move || match shared.scan(&dir, generation) {
                Ok(summary) if summary.cancelled => {
                    debug!("scan of {} cancelled", dir.display())
                }
                Ok(summary) => info!(
                    "scanned {}: {} chunks in {} files, {} skipped",
                    dir.display(),
                    summary.chunks,
                    summary.files,
                    summary.skipped
                ),
                Err(err) => error!("cannot scan {}: {}", dir.display(), err),
            });
        match spawned {
            Ok(handle) => {
                // The previous scanner notices the new generation on its own.
                drop(lock(&self.scanner).replace(handle));
            }
            Err(err) => error!("cannot start folder scan: {}", err),
        }
    }

    /// Like [`ChunkManager::set_folder`], but scans on the calling thread.
    pub fn scan_folder(&self, dir: impl AsRef<Path>) -> Result<ScanSummary> {
        let generation = self.shared.reset();
        self.shared.scan(dir.as_ref(), generation)
    }

    /// The loaded chunk at `pos`. Never blocks on I/O.
    pub fn get_chunk(&self, pos: ChunkPosition) -> Option<SharedChunk> {
        lock(&self.shared.loaded).get(&pos).cloned()
    }

    /// Queues a pending chunk for a background reload. Positions that are not
    /// pending are ignored, as are repeated requests before the reload runs.
    pub fn needs_reload(&self, pos: ChunkPosition) -> Result<()> {
        self.shared.check_fatal()?;
        if !lock(&self.shared.pending).contains_key(&pos) {
            return Ok(());
        }
        let mut work = lock(&self.shared.work);
        if !work.in_flight.contains(&pos) && work.queued.insert(pos) {
            self.shared.work_ready.notify_one();
        }
        Ok(())
    }

    /// Reloads a chunk on the calling thread and returns it, or `None` if the
    /// position is unknown.
    pub fn reload_now(&self, pos: ChunkPosition) -> Result<Option<SharedChunk>> {
        self.shared.check_fatal()?;
        if let Some(chunk) = self.get_chunk(pos) {
            return Ok(Some(chunk));
        }
        {
            let mut work = lock(&self.shared.work);
            while work.in_flight.contains(&pos) {
                work = self
                    .shared
                    .work_ready
                    .wait(work)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            work.queued.remove(&pos);
            work.in_flight.insert(pos);
        }
        let result = self.shared.reload(pos);
        self.shared.finish_work(pos);
        match result {
            Ok(true) => self.shared.receiver.something_changed(),
            Ok(false) => {}
            Err(StrataError::EvictionExhausted) => {
                self.shared.go_fatal();
                return Err(StrataError::EvictionExhausted);
            }
            Err(err) => {
                warn!("could not reload chunk {}: {}", pos, err);
                lock(&self.shared.pending).remove(&pos);
                return Err(err);
            }
        }
        Ok(self.get_chunk(pos))
    }

    /// The error of the last failed background reload of `pos`, if any.
    pub fn take_reload_error(&self, pos: ChunkPosition) -> Option<StrataError> {
        lock(&self.shared.reload_errors).remove(&pos)
    }

    /// Applies `edit` to a chunk and adds it to the current edit batch. The
    /// chunk is persisted when the batch is finished.
    pub fn edit_chunk<R>(
        &self,
        chunk: &SharedChunk,
        pos: InChunkPosition,
        edit: impl FnOnce(&mut Chunk, InChunkPosition) -> Result<R>,
    ) -> Result<R> {
        let (key, result) = {
            let mut guard = lock(chunk);
            let result = edit(&mut guard, pos);
            (guard.pos(), result)
        };
        lock(&self.shared.edited).insert(key, Arc::clone(chunk));
        result
    }

    /// Starts or ends an edit batch. Ending it unloads every edited chunk.
    pub fn set_multiedit(&self, multiedit: bool) -> Result<()> {
        self.shared.multiedit.store(multiedit, Ordering::SeqCst);
        if multiedit {
            return Ok(());
        }
        self.flush_edits()
    }

    pub fn is_multiedit(&self) -> bool {
        self.shared.multiedit.load(Ordering::SeqCst)
    }

    /// Unloads every edited chunk unless a batch is open.
    pub fn edit_finished(&self) -> Result<()> {
        if self.is_multiedit() {
            return Ok(());
        }
        self.flush_edits()
    }

    fn flush_edits(&self) -> Result<()> {
        let edited: Vec<SharedChunk> = lock(&self.shared.edited)
            .drain()
            .map(|(_, chunk)| chunk)
            .collect();
        let mut first_error = None;
        for chunk in edited {
            if let Err(err) = self.shared.unload(&chunk) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Persists a chunk if it changed and moves it from loaded to pending.
    pub fn unload_chunk(&self, chunk: &SharedChunk) -> Result<()> {
        self.shared.unload(chunk)
    }

    /// Unloads every loaded chunk.
    pub fn persist_all(&self) -> Result<()> {
        let chunks: Vec<SharedChunk> = lock(&self.shared.loaded).values().cloned().collect();
        let mut first_error = None;
        for chunk in chunks {
            if let Err(err) = self.shared.unload(&chunk) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Protects a position from eviction under memory pressure.
    pub fn stay_loaded(&self, pos: ChunkPosition) {
        lock(&self.shared.pinned).insert(pos);
    }

    pub fn may_unload(&self, pos: ChunkPosition) {
        lock(&self.shared.pinned).remove(&pos);
    }

    pub fn loaded_positions(&self) -> Vec<ChunkPosition> {
        lock(&self.shared.loaded).keys().copied().collect()
    }

    pub fn pending_positions(&self) -> Vec<ChunkPosition> {
        lock(&self.shared.pending).keys().copied().collect()
    }

    pub fn is_pending(&self, pos: ChunkPosition) -> bool {
        lock(&self.shared.pending).contains_key(&pos)
    }

    pub fn contains_loaded(&self, pos: ChunkPosition) -> bool {
        lock(&self.shared.loaded).contains_key(&pos)
    }

    /// Whether memory ran out with nothing left to evict. A fatal manager
    /// refuses further reloads.
    pub fn is_fatal(&self) -> bool {
        self.shared.fatal.load(Ordering::SeqCst)
    }
}

impl Drop for ChunkManager {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.stop_workers();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(scanner) = lock(&self.scanner).take() {
            let _ = scanner.join();
        }
        if let Err(err) = self.persist_all() {
            error!("could not persist chunks on shutdown: {}", err);
        }
    }
}

impl Shared {
    fn check_fatal(&self) -> Result<()> {
        if self.fatal.load(Ordering::SeqCst) {
            return Err(StrataError::EvictionExhausted);
        }
        Ok(())
    }

    /// Persists loaded chunks, clears all state and starts a new generation.
    fn reset(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut chunks: Vec<SharedChunk> = lock(&self.edited).drain().map(|(_, c)| c).collect();
        chunks.extend(lock(&self.loaded).values().cloned());
        for chunk in chunks {
            if let Err(err) = self.unload(&chunk) {
                error!("{}", err);
            }
        }
        lock(&self.work).queued.clear();
        lock(&self.loaded).clear();
        lock(&self.pending).clear();
        lock(&self.edited).clear();
        lock(&self.pinned).clear();
        lock(&self.reload_errors).clear();
        self.registry.clear();
        self.lenient.store(false, Ordering::SeqCst);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn scan(&self, dir: &Path, generation: u64) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        for path in region_files(dir, &self.config.region_extension)? {
            if !self.is_current(generation) {
                summary.cancelled = true;
                return Ok(summary);
            }
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
                if !self.is_current(generation) {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                let mut chunk = match Chunk::read(Arc::clone(&reader), slot) {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("{}: skipping slot {}: {}", path.display(), slot, err);
                        summary.skipped += 1;
                        continue;
                    }
                };
                // A position seen twice may have been reloaded and edited in
                // between; write that copy back before it is replaced.
                let previous = lock(&self.loaded).get(&chunk.pos()).cloned();
                if let Some(previous) = previous {
                    warn!("{}: chunk {} appears more than once", path.display(), chunk.pos());
                    if let Err(err) = self.unload(&previous) {
                        error!("{}", err);
                    }
                }
                {
                    let mut loaded = lock(&self.loaded);
                    let mut pending = lock(&self.pending);
                    if !self.is_current(generation) {
                        summary.cancelled = true;
                        return Ok(summary);
                    }
                    if loaded.remove(&chunk.pos()).is_some() {
                        warn!("dropping chunk {} reloaded during the scan", chunk.pos());
                    }
                    pending.insert(chunk.pos(), PendingEntry::of(&chunk));
                }
                if let Err(err) = chunk.unload() {
                    error!("could not write back chunk {}: {}", chunk.pos(), err);
                }
                summary.chunks += 1;
            }
            self.receiver.something_changed();
        }
        Ok(summary)
    }

    fn worker_loop(&self) {
        while let Some(pos) = self.next_work() {
            let result = self.reload(pos);
            self.finish_work(pos);
            match result {
                Ok(true) => self.receiver.something_changed(),
                Ok(false) => {}
                Err(err) => self.reload_failed(pos, err),
            }
        }
    }

    fn next_work(&self) -> Option<ChunkPosition> {
        let mut work = lock(&self.work);
        loop {
            if work.shutdown {
                return None;
            }
            if let Some(pos) = work.queued.iter().next().copied() {
                work.queued.remove(&pos);
                work.in_flight.insert(pos);
                return Some(pos);
            }
            work = self
                .work_ready
                .wait(work)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish_work(&self, pos: ChunkPosition) {
        lock(&self.work).in_flight.remove(&pos);
        self.work_ready.notify_all();
    }

    fn stop_workers(&self) {
        lock(&self.work).shutdown = true;
        self.work_ready.notify_all();
    }

    fn reload_failed(&self, pos: ChunkPosition, err: StrataError) {
        if matches!(err, StrataError::EvictionExhausted) {
            self.go_fatal();
            return;
        }
        warn!("could not reload chunk {}: {}", pos, err);
        // A chunk that fails to decode is forgotten rather than retried.
        lock(&self.pending).remove(&pos);
        lock(&self.reload_errors).insert(pos, err);
    }

    fn go_fatal(&self) {
        if self.fatal.swap(true, Ordering::SeqCst) {
            return;
        }
        error!(
            target: strata_common::FATAL_TARGET,
            "memory exhausted and no chunk can be evicted; stopping reloads"
        );
        self.stop_workers();
    }

    /// Reloads `pos`, evicting chunks while memory is short. Returns whether
    /// the chunk was loaded.
    fn reload(&self, pos: ChunkPosition) -> Result<bool> {
        loop {
            self.check_fatal()?;
            match self.try_reload(pos) {
                Ok(Reload::Done(loaded)) => return Ok(loaded),
                Ok(Reload::NeedsEviction) => {
                    if self.evict() > 0 {
                        self.lenient.store(false, Ordering::SeqCst);
                    } else {
                        debug!("memory is short but nothing can be evicted");
                        self.lenient.store(true, Ordering::SeqCst);
                    }
                }
                Err(err) if err.is_allocation_failure() => {
                    self.lenient.store(false, Ordering::SeqCst);
                    if self.evict() == 0 {
                        return Err(StrataError::EvictionExhausted);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn try_reload(&self, pos: ChunkPosition) -> Result<Reload> {
        let generation = self.generation.load(Ordering::SeqCst);
        let Some(entry) = lock(&self.pending).get(&pos).cloned() else {
            return Ok(Reload::Done(false));
        };
        if !self.lenient.load(Ordering::SeqCst)
            && self.probe.free_ratio() <= self.config.memory_threshold
        {
            return Ok(Reload::NeedsEviction);
        }

        let reader = self.registry.get(&entry.path)?;
        let Some(chunk) = Chunk::read(reader, entry.slot)? else {
            return Err(StrataError::MalformedChunk(format!(
                "slot {} of {} is empty",
                entry.slot,
                entry.path.display()
            )));
        };

        let mut loaded = lock(&self.loaded);
        let mut pending = lock(&self.pending);
        if !self.is_current(generation) || pending.get(&pos) != Some(&entry) {
            return Ok(Reload::Done(false));
        }
        pending.remove(&pos);
        loaded.insert(pos, Arc::new(Mutex::new(chunk)));
        Ok(Reload::Done(true))
    }

    /// Unloads every loaded chunk that is neither pinned nor edited.
    fn evict(&self) -> usize {
        let edited: HashSet<ChunkPosition> = lock(&self.edited).keys().copied().collect();
        let pinned = lock(&self.pinned).clone();
        let candidates: Vec<SharedChunk> = lock(&self.loaded)
            .iter()
            .filter(|(pos, _)| !edited.contains(pos) && !pinned.contains(pos))
            .map(|(_, chunk)| Arc::clone(chunk))
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        warn!("memory is short, evicting {} chunks", candidates.len());
        self.receiver.memory_panic();
        for chunk in &candidates {
            if let Err(err) = self.unload(chunk) {
                error!("{}", err);
            }
        }
        candidates.len()
    }

    /// Moves a chunk from loaded to pending and writes it back if it changed.
    /// The chunk counts as unloaded even when the write fails.
    fn unload(&self, chunk: &SharedChunk) -> Result<()> {
        let mut guard = lock(chunk);
        let pos = guard.pos();
        {
            let mut loaded = lock(&self.loaded);
            // A handle that is no longer the loaded copy is only written back.
            if loaded.get(&pos).is_some_and(|current| Arc::ptr_eq(current, chunk)) {
                loaded.remove(&pos);
                lock(&self.pending).insert(pos, PendingEntry::of(&guard));
            }
        }
        guard.unload().map(|_| ()).map_err(|source| StrataError::WriteBack {
            pos,
            source: Box::new(source),
        })
    }
}
