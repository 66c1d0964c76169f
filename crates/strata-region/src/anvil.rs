//! The standard on-disk region container.
//!
//! Layout: an 8 KiB header of 1024 big-endian `offset(3) | sectors(1)` entries
//! followed by 1024 timestamps, then 4 KiB sectors. A slot's data starts with
//! `u32 length | u8 compression` where the length counts the compression byte.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, warn};

use strata_common::{InFilePosition, Result, StrataError};

use crate::container::RegionContainer;

pub const SECTOR_BYTES: u64 = 4096;
pub const HEADER_BYTES: u64 = 2 * SECTOR_BYTES;
const SLOTS: usize = 1024;
const MAX_SECTORS: usize = 255;

const COMPRESSION_GZIP: u8 = 1;
const COMPRESSION_ZLIB: u8 = 2;
const COMPRESSION_NONE: u8 = 3;

/// One directory entry: start sector in the high 24 bits, sector count in the
/// low 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SectorEntry(u32);

impl SectorEntry {
    fn new(offset: usize, count: usize) -> Self {
        SectorEntry(((offset as u32) << 8) | (count as u32 & 0xff))
    }

    fn offset(self) -> usize {
        (self.0 >> 8) as usize
    }

    fn count(self) -> usize {
        (self.0 & 0xff) as usize
    }

    fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn sectors(self) -> std::ops::Range<usize> {
        self.offset()..self.offset() + self.count()
    }
}

#[derive(Debug)]
pub struct AnvilRegion {
    path: PathBuf,
    file: File,
    entries: Vec<SectorEntry>,
    // One flag per sector of the file; the two header sectors are always used.
    used: Vec<bool>,
}

impl AnvilRegion {
    /// Opens an existing region file. Directory entries pointing outside the
    /// file or overlapping each other are dropped with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(StrataError::container_io(&path))?;
        let len = file
            .metadata()
            .map_err(StrataError::container_io(&path))?
            .len();
        if len < HEADER_BYTES {
            return Err(StrataError::CorruptContainer {
                path,
                reason: format!("file of {} bytes is shorter than the header", len),
            });
        }

        let mut header = vec![0u8; SECTOR_BYTES as usize];
        file.read_exact(&mut header)
            .map_err(StrataError::container_io(&path))?;
        let mut cursor = Cursor::new(header);
        let mut entries = Vec::with_capacity(SLOTS);
        for _ in 0..SLOTS {
            let raw = cursor
                .read_u32::<BigEndian>()
                .map_err(StrataError::container_io(&path))?;
            entries.push(SectorEntry(raw));
        }

        let sector_count = len.div_ceil(SECTOR_BYTES) as usize;
        let mut used = vec![false; sector_count];
        used[0] = true;
        used[1] = true;
        for (index, entry) in entries.iter_mut().enumerate() {
            if entry.is_empty() {
                continue;
            }
            let sectors = entry.sectors();
            let valid = sectors.start >= 2
                && entry.count() > 0
                && sectors.end <= sector_count
                && used[sectors.clone()].iter().all(|u| !u);
            if !valid {
                warn!(
                    "{}: dropping slot {} with bad sectors {:?}",
                    path.display(),
                    index,
                    sectors
                );
                *entry = SectorEntry::default();
                continue;
            }
            used[sectors].iter_mut().for_each(|u| *u = true);
        }

        Ok(AnvilRegion {
            path,
            file,
            entries,
            used,
        })
    }

    /// Creates an empty region file, replacing any file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(StrataError::container_io(&path))?;
        file.write_all(&vec![0u8; HEADER_BYTES as usize])
            .map_err(StrataError::container_io(&path))?;
        Ok(AnvilRegion {
            path,
            file,
            entries: vec![SectorEntry::default(); SLOTS],
            used: vec![true, true],
        })
    }

    fn entry(&self, slot: InFilePosition) -> Option<SectorEntry> {
        if !slot.is_valid() {
            return None;
        }
        let entry = self.entries[slot.index()];
        (!entry.is_empty()).then_some(entry)
    }

    fn corrupt(&self, reason: String) -> StrataError {
        StrataError::CorruptContainer {
            path: self.path.clone(),
            reason,
        }
    }

    /// First run of `count` free sectors, extending the file if needed.
    fn allocate(&mut self, count: usize) -> usize {
        let mut run = 0;
        for (sector, used) in self.used.iter().enumerate() {
            run = if *used { 0 } else { run + 1 };
            if run == count {
                return sector + 1 - count;
            }
        }
        let start = self.used.len() - run;
        self.used.resize(start + count, false);
        start
    }

    fn write_header_entry(&mut self, index: usize, entry: SectorEntry) -> Result<()> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        let io = StrataError::container_io(&self.path);
        (|| {
            self.file.seek(SeekFrom::Start(index as u64 * 4))?;
            self.file.write_u32::<BigEndian>(entry.0)?;
            self.file
                .seek(SeekFrom::Start(SECTOR_BYTES + index as u64 * 4))?;
            self.file.write_u32::<BigEndian>(timestamp)
        })()
        .map_err(io)
    }
}

impl RegionContainer for AnvilRegion {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_slot(&self, slot: InFilePosition) -> bool {
        self.entry(slot).is_some()
    }

    fn read_slot(&mut self, slot: InFilePosition) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.entry(slot) else {
            return Ok(None);
        };
        self.file
            .seek(SeekFrom::Start(entry.offset() as u64 * SECTOR_BYTES))
            .map_err(StrataError::container_io(&self.path))?;
        let length = self
            .file
            .read_u32::<BigEndian>()
            .map_err(StrataError::container_io(&self.path))? as usize;
        if length == 0 {
            return Ok(None);
        }
        if length + 4 > entry.count() * SECTOR_BYTES as usize {
            return Err(self.corrupt(format!(
                "slot {} claims {} bytes in {} sectors",
                slot,
                length,
                entry.count()
            )));
        }
        let compression = self
            .file
            .read_u8()
            .map_err(StrataError::container_io(&self.path))?;
        let mut raw = vec![0u8; length - 1];
        self.file
            .read_exact(&mut raw)
            .map_err(StrataError::container_io(&self.path))?;

        let mut data = Vec::new();
        let decoded = match compression {
            COMPRESSION_GZIP => GzDecoder::new(raw.as_slice()).read_to_end(&mut data),
            COMPRESSION_ZLIB => ZlibDecoder::new(raw.as_slice()).read_to_end(&mut data),
            COMPRESSION_NONE => {
                data = raw;
                Ok(data.len())
            }
            other => {
                return Err(self.corrupt(format!(
                    "slot {} uses unknown compression {}",
                    slot, other
                )))
            }
        };
        decoded.map_err(StrataError::container_io(&self.path))?;
        Ok(Some(data))
    }

    fn write_slot(&mut self, slot: InFilePosition, data: &[u8]) -> Result<()> {
        if !slot.is_valid() {
            return Err(StrataError::ContractViolation(format!(
                "slot {} outside the region grid",
                slot
            )));
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(StrataError::container_io(&self.path))?;
        let compressed = encoder
            .finish()
            .map_err(StrataError::container_io(&self.path))?;

        let total = compressed.len() as u64 + 5;
        let count = total.div_ceil(SECTOR_BYTES) as usize;
        if count > MAX_SECTORS {
            return Err(StrataError::ContractViolation(format!(
                "slot {} payload needs {} sectors, at most {} fit",
                slot, count, MAX_SECTORS
            )));
        }

        let index = slot.index();
        let old = self.entries[index];
        let start = if !old.is_empty() && old.count() >= count {
            self.used[old.offset() + count..old.sectors().end]
                .iter_mut()
                .for_each(|u| *u = false);
            old.offset()
        } else {
            if !old.is_empty() {
                self.used[old.sectors()].iter_mut().for_each(|u| *u = false);
            }
            self.allocate(count)
        };
        self.used[start..start + count]
            .iter_mut()
            .for_each(|u| *u = true);

        let mut buffer = Vec::with_capacity(count * SECTOR_BYTES as usize);
        buffer
            .write_u32::<BigEndian>(compressed.len() as u32 + 1)
            .map_err(StrataError::container_io(&self.path))?;
        buffer.push(COMPRESSION_ZLIB);
        buffer.extend_from_slice(&compressed);
        buffer.resize(count * SECTOR_BYTES as usize, 0);

        self.file
            .seek(SeekFrom::Start(start as u64 * SECTOR_BYTES))
            .map_err(StrataError::container_io(&self.path))?;
        self.file
            .write_all(&buffer)
            .map_err(StrataError::container_io(&self.path))?;

        let entry = SectorEntry::new(start, count);
        self.entries[index] = entry;
        self.write_header_entry(index, entry)?;
        debug!(
            "{}: wrote slot {} to sectors {:?}",
            self.path.display(),
            slot,
            entry.sectors()
        );
        Ok(())
    }
}
