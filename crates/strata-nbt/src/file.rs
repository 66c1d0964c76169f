use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::codec;
use crate::error::NbtError;
use crate::record::Tag;

/// A root record together with its name, optionally gzip-wrapped on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct NbtFile {
    pub name: String,
    pub root: Tag,
}

impl NbtFile {
    pub fn new(name: impl Into<String>, root: Tag) -> Self {
        NbtFile {
            name: name.into(),
            root,
        }
    }

    pub fn read_from<R: Read>(reader: R, gzip: bool) -> Result<Self, NbtError> {
        let (name, root) = if gzip {
            codec::decode(&mut GzDecoder::new(reader))?
        } else {
            let mut reader = reader;
            codec::decode(&mut reader)?
        };
        Ok(NbtFile { name, root })
    }

    pub fn write_to<W: Write>(&self, writer: W, gzip: bool) -> Result<(), NbtError> {
        if gzip {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            codec::encode(&mut encoder, &self.name, &self.root)?;
            encoder.finish()?;
        } else {
            let mut writer = writer;
            codec::encode(&mut writer, &self.name, &self.root)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Encodes the file into a fresh buffer without gzip.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NbtError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, false)?;
        Ok(buffer)
    }

    pub fn has_changed(&self) -> bool {
        self.root.has_changed()
    }

    pub fn reset_change(&mut self) {
        self.root.reset_change();
    }
}

/// An [`NbtFile`] bound to the path it was loaded from.
#[derive(Debug)]
pub struct NbtHandler {
    path: PathBuf,
    gzip: bool,
    file: NbtFile,
}

impl NbtHandler {
    pub fn open(path: impl AsRef<Path>, gzip: bool) -> Result<Self, NbtError> {
        let path = path.as_ref().to_path_buf();
        let file = NbtFile::read_from(BufReader::new(File::open(&path)?), gzip)?;
        Ok(NbtHandler { path, gzip, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn root(&self) -> &Tag {
        &self.file.root
    }

    pub fn root_mut(&mut self) -> &mut Tag {
        &mut self.file.root
    }

    /// Writes the file back if anything changed. Returns whether it wrote.
    pub fn save(&mut self) -> Result<bool, NbtError> {
        if !self.file.has_changed() {
            return Ok(false);
        }
        let out = BufWriter::new(File::create(&self.path)?);
        self.file.write_to(out, self.gzip)?;
        self.file.reset_change();
        Ok(true)
    }
}
