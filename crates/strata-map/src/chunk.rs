use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use strata_common::{
    ChunkPosition, InChunkPosition, InFilePosition, Position3D, Result, StrataError,
};
use strata_nbt::{NbtFile, Tag, TagType};
use strata_region::RegionChunkReader;

use crate::biomes::{self, Biome};
use crate::blocks::{self, AIR};
use crate::color::Rgba;

pub const WIDTH: i32 = 16;
pub const HEIGHT: i32 = 256;
const SECTIONS: usize = (HEIGHT / 16) as usize;
const BLOCKS_PER_SECTION: usize = 4096;
const BIOME_COUNT: usize = 256;

/// A chunk handle shared between the cache and its users.
pub type SharedChunk = Arc<Mutex<Chunk>>;

/// One 16×16×256 column of the world, backed by its NBT record.
///
/// Blocks live in up to sixteen `Level/Sections` compounds of 16×16×16
/// blocks, each tagged with its `Y`. A `Blocks` byte per block holds the low
/// eight bits of the id and an optional `Add` nibble array the high four.
pub struct Chunk {
    pos: ChunkPosition,
    slot: InFilePosition,
    reader: Arc<RegionChunkReader>,
    file: NbtFile,
    // Section height -> index in the Sections list.
    sections: OnceCell<[Option<usize>; SECTIONS]>,
    colors: [[Option<Rgba>; WIDTH as usize]; WIDTH as usize],
    repaint: bool,
}

impl Chunk {
    /// Wraps a decoded record. Fails if `Level`, `xPos` or `zPos` are missing.
    pub fn new(file: NbtFile, reader: Arc<RegionChunkReader>, slot: InFilePosition) -> Result<Self> {
        let level = file
            .root
            .get("Level")
            .filter(|l| l.tag_type() == TagType::Compound)
            .ok_or_else(|| StrataError::MalformedChunk("no Level compound".to_owned()))?;
        let coord = |name: &str| {
            level
                .get(name)
                .and_then(Tag::integer)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| StrataError::MalformedChunk(format!("no integer {}", name)))
        };
        let pos = ChunkPosition::new(coord("xPos")?, coord("zPos")?);
        if let Some(sections) = level.get("Sections") {
            if sections.as_list().is_none() {
                return Err(StrataError::MalformedChunk(
                    "Sections is not a list".to_owned(),
                ));
            }
        }

        Ok(Chunk {
            pos,
            slot,
            reader,
            file,
            sections: OnceCell::new(),
            colors: [[None; WIDTH as usize]; WIDTH as usize],
            repaint: true,
        })
    }

    /// Reads and wraps the record in `slot`. `None` if the slot is empty.
    pub fn read(reader: Arc<RegionChunkReader>, slot: InFilePosition) -> Result<Option<Self>> {
        match reader.read(slot)? {
            Some(file) => Ok(Some(Chunk::new(file, reader, slot)?)),
            None => Ok(None),
        }
    }

    pub fn pos(&self) -> ChunkPosition {
        self.pos
    }

    pub fn slot(&self) -> InFilePosition {
        self.slot
    }

    pub fn reader(&self) -> &Arc<RegionChunkReader> {
        &self.reader
    }

    pub fn root(&self) -> &Tag {
        &self.file.root
    }

    pub fn has_changed(&self) -> bool {
        self.file.has_changed()
    }

    fn level(&self) -> Option<&Tag> {
        self.file.root.get("Level")
    }

    fn level_mut(&mut self) -> Option<&mut Tag> {
        self.file.root.get_mut("Level")
    }

    fn section_table(&self) -> &[Option<usize>; SECTIONS] {
        self.sections.get_or_init(|| {
            let mut table = [None; SECTIONS];
            let sections = self
                .level()
                .and_then(|l| l.get("Sections"))
                .and_then(Tag::as_list);
            for (index, section) in sections.into_iter().flatten().enumerate() {
                let y = section.get("Y").and_then(Tag::integer);
                if let Some(y) = y.and_then(|y| usize::try_from(y).ok()) {
                    if y < SECTIONS {
                        table[y] = Some(index);
                    }
                }
            }
            table
        })
    }

    fn section_index(&self, y: i32) -> Option<usize> {
        self.section_table()[(y >> 4) as usize]
    }

    fn section(&self, y: i32) -> Option<&Tag> {
        let index = self.section_index(y)?;
        self.level()?.get("Sections")?.get_at(index)
    }

    fn section_mut(&mut self, y: i32) -> Result<&mut Tag> {
        let index = self
            .section_index(y)
            .ok_or(StrataError::MissingSection { y })?;
        self.level_mut()
            .and_then(|l| l.get_mut("Sections"))
            .and_then(|s| s.get_at_mut(index))
            .ok_or(StrataError::MissingSection { y })
    }

    fn check_column(x: i32, z: i32) -> Result<()> {
        if !InChunkPosition::new(x, z).is_valid() {
            return Err(StrataError::ContractViolation(format!(
                "column ({}, {}) outside the chunk",
                x, z
            )));
        }
        Ok(())
    }

    fn check_block(x: i32, y: i32, z: i32) -> Result<()> {
        Self::check_column(x, z)?;
        if !(0..HEIGHT).contains(&y) {
            return Err(StrataError::ContractViolation(format!(
                "height {} outside 0..{}",
                y, HEIGHT
            )));
        }
        Ok(())
    }

    fn block_index(x: i32, y: i32, z: i32) -> usize {
        (((y & 15) << 8) | (z << 4) | x) as usize
    }

    /// Whether the section holding height `y` exists.
    pub fn has_block_for(&self, y: i32) -> bool {
        (0..HEIGHT).contains(&y) && self.section_index(y).is_some()
    }

    /// The block id at a position. Heights without a section read as air.
    pub fn block(&self, x: i32, y: i32, z: i32) -> Result<u16> {
        Self::check_block(x, y, z)?;
        let Some(section) = self.section(y) else {
            return Ok(AIR);
        };
        let index = Self::block_index(x, y, z);
        let low = section
            .get("Blocks")
            .and_then(|b| b.byte_at(index))
            .ok_or_else(|| {
                StrataError::MalformedChunk(format!("section at height {} has no Blocks", y))
            })? as u8;
        let high = section
            .get("Add")
            .and_then(|a| a.byte_at(index >> 1))
            .map(|b| nibble(b as u8, index))
            .unwrap_or(0);
        Ok(u16::from(high) << 8 | u16::from(low))
    }

    /// Stores a block id. Fails with `MissingSection` if no section holds `y`.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: u16) -> Result<()> {
        Self::check_block(x, y, z)?;
        if id > 0x0fff {
            return Err(StrataError::ContractViolation(format!(
                "block id {} does not fit in twelve bits",
                id
            )));
        }
        let index = Self::block_index(x, y, z);
        let high = (id >> 8) as u8;
        let section = self.section_mut(y)?;
        if section.get("Blocks").map(Tag::size) != Some(BLOCKS_PER_SECTION) {
            return Err(StrataError::MalformedChunk(format!(
                "section at height {} has no Blocks",
                y
            )));
        }
        if high != 0 && section.get("Add").is_none() {
            section.insert("Add", Tag::byte_array(vec![0; BLOCKS_PER_SECTION / 2]))?;
        }
        if let Some(add) = section.get_mut("Add") {
            let old = add.byte_at(index >> 1).unwrap_or(0) as u8;
            add.set_byte_at(index >> 1, with_nibble(old, index, high) as i8)?;
        }
        if let Some(blocks) = section.get_mut("Blocks") {
            blocks.set_byte_at(index, id as u8 as i8)?;
        }
        self.change_at(x, z);
        Ok(())
    }

    fn biome_array(&self) -> Option<&Tag> {
        self.level()?
            .get("Biomes")
            .filter(|b| b.size() == BIOME_COUNT && b.tag_type() == TagType::ByteArray)
    }

    pub fn biome(&self, x: i32, z: i32) -> Result<&'static Biome> {
        Self::check_column(x, z)?;
        Ok(self
            .biome_array()
            .and_then(|b| b.byte_at(((z << 4) | x) as usize))
            .map(|id| biomes::biome_for_id(id as u8))
            .unwrap_or(&biomes::UNASSIGNED))
    }

    pub fn set_biome(&mut self, x: i32, z: i32, id: u8) -> Result<()> {
        Self::check_column(x, z)?;
        if self.biome_array().is_none() {
            return Err(StrataError::MalformedChunk("no Biomes array".to_owned()));
        }
        if let Some(biomes) = self.level_mut().and_then(|l| l.get_mut("Biomes")) {
            biomes.set_byte_at(((z << 4) | x) as usize, id as i8)?;
        }
        self.change_at(x, z);
        Ok(())
    }

    /// The highest non-air block of a column. An all-air column yields the
    /// ceiling position `y = 255`.
    pub fn top_non_air_block(&self, x: i32, z: i32) -> Result<Position3D> {
        Self::check_column(x, z)?;
        for y in (0..HEIGHT).rev() {
            if self.has_block_for(y) && self.block(x, y, z)? != AIR {
                return Ok(Position3D::new(x, y, z));
            }
        }
        Ok(Position3D::new(x, HEIGHT - 1, z))
    }

    /// The map color of a column: blocks blended bottom-up starting at the
    /// highest opaque one. Memoized until the column changes.
    pub fn color_for_column(&mut self, x: i32, z: i32) -> Result<Rgba> {
        Self::check_column(x, z)?;
        if let Some(color) = self.colors[x as usize][z as usize] {
            return Ok(color);
        }
        let mut start = 0;
        let mut color = Rgba::TRANSPARENT;
        for y in (0..HEIGHT).rev() {
            if !self.has_block_for(y) {
                continue;
            }
            let block = blocks::block_for_id(self.block(x, y, z)?);
            if block.color.is_opaque() {
                start = y + 1;
                color = block.color;
                break;
            }
        }
        for y in start..HEIGHT {
            if self.has_block_for(y) {
                color = color.over(blocks::block_for_id(self.block(x, y, z)?).color);
            }
        }
        self.colors[x as usize][z as usize] = Some(color);
        Ok(color)
    }

    /// Invalidates the column's cached color and flags the chunk for repaint.
    pub fn change_at(&mut self, x: i32, z: i32) {
        if let Some(column) = self
            .colors
            .get_mut(x as usize)
            .and_then(|c| c.get_mut(z as usize))
        {
            *column = None;
        }
        self.repaint = true;
    }

    /// Returns and clears the repaint flag.
    pub fn take_repaint(&mut self) -> bool {
        std::mem::take(&mut self.repaint)
    }

    /// Writes the record back if it changed. Returns whether it wrote.
    pub fn unload(&mut self) -> Result<bool> {
        self.reader.write(self.slot, &mut self.file)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("slot", &self.slot)
            .field("file", &self.reader.path())
            .finish_non_exhaustive()
    }
}

fn nibble(byte: u8, index: usize) -> u8 {
    if index & 1 == 0 {
        byte & 0x0f
    } else {
        byte >> 4
    }
}

fn with_nibble(byte: u8, index: usize, value: u8) -> u8 {
    if index & 1 == 0 {
        (byte & 0xf0) | (value & 0x0f)
    } else {
        (byte & 0x0f) | (value << 4)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strata_nbt::Compound;
    use strata_region::MemoryRegion;

    /// A chunk record with sections at the given heights, filled with `fill`.
    pub(crate) fn chunk_record(x: i32, z: i32, sections: &[(i8, i8)]) -> Tag {
        let sections: Vec<Tag> = sections
            .iter()
            .map(|&(y, fill)| {
                Tag::from(
                    Compound::new()
                        .with("Y", Tag::byte(y))
                        .with("Blocks", Tag::byte_array(vec![fill; BLOCKS_PER_SECTION])),
                )
            })
            .collect();
        let level = Compound::new()
            .with("xPos", Tag::int(x))
            .with("zPos", Tag::int(z))
            .with("Biomes", Tag::byte_array(vec![1; BIOME_COUNT]))
            .with(
                "Sections",
                Tag::list_of(TagType::Compound, sections).unwrap(),
            );
        Compound::new().with("Level", level.into()).into()
    }

    fn chunk(record: Tag) -> Chunk {
        let slot = InFilePosition::new(0, 0);
        let bytes = NbtFile::new("", record).to_bytes().unwrap();
        let reader = Arc::new(RegionChunkReader::new(Box::new(
            MemoryRegion::new("mem").with_slot(slot, bytes),
        )));
        Chunk::read(reader, slot).unwrap().unwrap()
    }

    #[test]
    fn test_position_from_record() {
        let chunk = chunk(chunk_record(-3, 7, &[]));
        assert_eq!(chunk.pos(), ChunkPosition::new(-3, 7));
    }

    #[test]
    fn test_missing_level_is_malformed() {
        let slot = InFilePosition::new(0, 0);
        let bytes = NbtFile::new("", Tag::compound()).to_bytes().unwrap();
        let reader = Arc::new(RegionChunkReader::new(Box::new(
            MemoryRegion::new("mem").with_slot(slot, bytes),
        )));
        assert_matches!(
            Chunk::read(reader, slot),
            Err(StrataError::MalformedChunk(_))
        );
    }

    #[test]
    fn test_blocks_and_sections() {
        let mut chunk = chunk(chunk_record(0, 0, &[(0, 1), (2, 3)]));
        assert_eq!(chunk.block(4, 5, 6).unwrap(), 1);
        assert_eq!(chunk.block(4, 20, 6).unwrap(), AIR);
        assert_eq!(chunk.block(4, 40, 6).unwrap(), 3);
        assert!(chunk.has_block_for(15));
        assert!(!chunk.has_block_for(16));
        assert!(!chunk.has_changed());

        chunk.set_block(4, 40, 6, 0x123).unwrap();
        assert_eq!(chunk.block(4, 40, 6).unwrap(), 0x123);
        assert_eq!(chunk.block(5, 40, 6).unwrap(), 3);
        assert!(chunk.has_changed());

        assert_matches!(
            chunk.set_block(0, 20, 0, 1),
            Err(StrataError::MissingSection { y: 20 })
        );
    }

    #[test]
    fn test_out_of_range_heights_are_rejected() {
        let mut chunk = chunk(chunk_record(0, 0, &[(0, 1)]));
        assert_matches!(
            chunk.set_block(0, -1, 0, 1),
            Err(StrataError::ContractViolation(_))
        );
        assert_matches!(
            chunk.set_block(0, 300, 0, 1),
            Err(StrataError::ContractViolation(_))
        );
        assert_matches!(chunk.block(16, 0, 0), Err(StrataError::ContractViolation(_)));
        assert!(!chunk.has_changed());
    }

    #[test]
    fn test_biomes() {
        let mut chunk = chunk(chunk_record(0, 0, &[]));
        assert_eq!(chunk.biome(3, 3).unwrap().name, "Plains");
        chunk.set_biome(3, 3, 2).unwrap();
        assert_eq!(chunk.biome(3, 3).unwrap().name, "Desert");
        assert_eq!(chunk.biome(3, 4).unwrap().name, "Plains");
        assert!(chunk.has_changed());
    }

    #[test]
    fn test_missing_biomes() {
        let mut record = chunk_record(0, 0, &[]);
        record
            .get_mut("Level")
            .unwrap()
            .remove("Biomes")
            .unwrap();
        let mut chunk = chunk(record);
        assert_eq!(chunk.biome(0, 0).unwrap(), &biomes::UNASSIGNED);
        assert_matches!(
            chunk.set_biome(0, 0, 1),
            Err(StrataError::MalformedChunk(_))
        );
    }

    #[test]
    fn test_top_non_air_block() {
        let mut chunk = chunk(chunk_record(0, 0, &[(0, 1), (1, 0)]));
        assert_eq!(chunk.top_non_air_block(2, 2).unwrap().y, 15);
        chunk.set_block(2, 20, 2, 1).unwrap();
        assert_eq!(chunk.top_non_air_block(2, 2).unwrap().y, 20);
    }

    #[test]
    fn test_all_air_column_yields_ceiling() {
        let chunk = chunk(chunk_record(0, 0, &[(0, 0)]));
        assert_eq!(
            chunk.top_non_air_block(1, 1).unwrap(),
            Position3D::new(1, 255, 1)
        );
    }

    #[test]
    fn test_color_memo_invalidated_by_change() {
        // stone at the bottom, water above it
        let mut chunk = chunk(chunk_record(0, 0, &[(0, 1), (1, 8)]));
        let color = chunk.color_for_column(0, 0).unwrap();
        let stone = blocks::block_for_id(1).color;
        let water = blocks::block_for_id(8).color;
        let mut expected = stone;
        for _ in 0..16 {
            expected = expected.over(water);
        }
        assert_eq!(color, expected);
        assert!(chunk.take_repaint());
        assert!(!chunk.take_repaint());

        chunk.set_block(0, 16, 0, 1).unwrap();
        assert!(chunk.take_repaint());
        let expected = (0..15).fold(stone, |c, _| c.over(water));
        assert_eq!(chunk.color_for_column(0, 0).unwrap(), expected);
    }

    #[test]
    fn test_unload_is_idempotent() {
        let mut chunk = chunk(chunk_record(0, 0, &[(0, 1)]));
        assert!(!chunk.unload().unwrap());
        chunk.set_block(0, 0, 0, 2).unwrap();
        assert!(chunk.unload().unwrap());
        assert!(!chunk.unload().unwrap());

        let reread = Chunk::read(Arc::clone(chunk.reader()), chunk.slot())
            .unwrap()
            .unwrap();
        assert_eq!(reread.block(0, 0, 0).unwrap(), 2);
    }
}
