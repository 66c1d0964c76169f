#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use strata_common::{ChunkPosition, InFilePosition, Result};
use strata_map::{ChunkManager, MemoryProbe, UpdateReceiver};
use strata_nbt::{Compound, NbtFile, Tag, TagType};
use strata_region::{AnvilRegion, ContainerOpener, RegionContainer};

/// A chunk record at `pos` with stone up to y = 15 and grass at y = 16..32.
pub fn chunk_record(pos: ChunkPosition) -> Tag {
    let section = |y: i8, block: i8| {
        Tag::from(
            Compound::new()
                .with("Y", Tag::byte(y))
                .with("Blocks", Tag::byte_array(vec![block; 4096])),
        )
    };
    let level = Compound::new()
        .with("xPos", Tag::int(pos.x))
        .with("zPos", Tag::int(pos.z))
        .with("Biomes", Tag::byte_array(vec![1; 256]))
        .with(
            "Sections",
            Tag::list_of(TagType::Compound, vec![section(0, 1), section(1, 2)]).unwrap(),
        );
    Compound::new().with("Level", level.into()).into()
}

/// Writes each chunk into the region file that owns it.
pub fn write_chunks(dir: &Path, chunks: &[ChunkPosition]) {
    for &pos in chunks {
        let path = dir.join(pos.region_file_name("mca"));
        let mut region = if path.exists() {
            AnvilRegion::open(&path).unwrap()
        } else {
            AnvilRegion::create(&path).unwrap()
        };
        let bytes = NbtFile::new("", chunk_record(pos)).to_bytes().unwrap();
        region.write_slot(pos.in_file(), &bytes).unwrap();
    }
}

/// Writes the record of chunk `pos` into `slot` of the region file `name`,
/// wherever that chunk would normally live.
pub fn write_chunk_at(dir: &Path, name: &str, slot: InFilePosition, pos: ChunkPosition) {
    let path = dir.join(name);
    let mut region = if path.exists() {
        AnvilRegion::open(&path).unwrap()
    } else {
        AnvilRegion::create(&path).unwrap()
    };
    let bytes = NbtFile::new("", chunk_record(pos)).to_bytes().unwrap();
    region.write_slot(slot, &bytes).unwrap();
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A memory probe whose reading is set by the test.
pub struct FixedProbe(AtomicU64);

impl FixedProbe {
    pub fn new(ratio: f64) -> Arc<Self> {
        Arc::new(FixedProbe(AtomicU64::new(ratio.to_bits())))
    }

    pub fn set(&self, ratio: f64) {
        self.0.store(ratio.to_bits(), Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedProbe {
    fn free_ratio(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct Counters {
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    /// Makes every slot write fail as if the disk were full.
    pub fail_writes: AtomicBool,
}

impl Counters {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Opens region files from disk and counts slot reads and writes.
#[derive(Default)]
pub struct CountingOpener {
    pub counters: Arc<Counters>,
}

impl ContainerOpener for CountingOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn RegionContainer>> {
        Ok(Box::new(CountingRegion {
            inner: AnvilRegion::open(path)?,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct CountingRegion {
    inner: AnvilRegion,
    counters: Arc<Counters>,
}

impl RegionContainer for CountingRegion {
    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn has_slot(&self, slot: InFilePosition) -> bool {
        self.inner.has_slot(slot)
    }

    fn read_slot(&mut self, slot: InFilePosition) -> Result<Option<Vec<u8>>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_slot(slot)
    }

    fn write_slot(&mut self, slot: InFilePosition, data: &[u8]) -> Result<()> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        self.inner.write_slot(slot, data)
    }
}

#[derive(Default)]
pub struct RecordingReceiver {
    pub changes: AtomicUsize,
    pub panics: AtomicUsize,
}

impl RecordingReceiver {
    pub fn changes(&self) -> usize {
        self.changes.load(Ordering::SeqCst)
    }

    pub fn panics(&self) -> usize {
        self.panics.load(Ordering::SeqCst)
    }
}

impl UpdateReceiver for RecordingReceiver {
    fn something_changed(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    fn memory_panic(&self) {
        self.panics.fetch_add(1, Ordering::SeqCst);
    }
}

type Hook = Box<dyn FnOnce(&ChunkManager) + Send>;

/// Runs a hook against the manager on the first change notification, from
/// whichever thread delivers it.
#[derive(Default)]
pub struct HookReceiver {
    manager: OnceCell<Weak<ChunkManager>>,
    hook: Mutex<Option<Hook>>,
}

impl HookReceiver {
    pub fn new(hook: impl FnOnce(&ChunkManager) + Send + 'static) -> Arc<Self> {
        Arc::new(HookReceiver {
            manager: OnceCell::new(),
            hook: Mutex::new(Some(Box::new(hook))),
        })
    }

    pub fn attach(&self, manager: &Arc<ChunkManager>) {
        let _ = self.manager.set(Arc::downgrade(manager));
    }
}

impl UpdateReceiver for HookReceiver {
    fn something_changed(&self) {
        let Some(hook) = self.hook.lock().unwrap().take() else {
            return;
        };
        if let Some(manager) = self.manager.get().and_then(Weak::upgrade) {
            hook(&manager);
        }
    }
}
