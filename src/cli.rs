use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::debug;

use strata_common::{Result, StrataError, WorldPosition};
use strata_map::{
    ChunkManager, ManagerConfig, SerialChunkManager, SystemMemoryProbe, UpdateReceiver,
};
use strata_nbt::{indent, render, NbtFile, NbtHandler, Tag, TagType};
use strata_region::AnvilOpener;

#[derive(Debug, Parser)]
#[command(name = "strata", about = "Inspect and edit NBT files and region folders")]
pub struct Cli {
    /// JSON file with chunk manager settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print an NBT file as indented text
    Dump {
        /// File to read, `-` for stdin
        file: PathBuf,
        /// The file is not gzip compressed
        #[arg(long)]
        raw: bool,
    },
    /// Replace one value in an NBT file
    Set {
        file: PathBuf,
        /// `/`-separated path of compound names or list indices
        path: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        /// The file is not gzip compressed
        #[arg(long)]
        raw: bool,
    },
    /// Scan a folder of region files and report what was found
    Scan { dir: PathBuf },
    /// Print the height of the topmost non-air block at a world column
    Top {
        dir: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
    },
}

struct LoggingReceiver;

impl UpdateReceiver for LoggingReceiver {
    fn something_changed(&self) {
        debug!("chunk map changed");
    }
}

impl Cli {
    fn manager_config(&self) -> Result<ManagerConfig> {
        match &self.config {
            Some(path) => ManagerConfig::from_json_file(path),
            None => Ok(ManagerConfig::default()),
        }
    }
}

/// Runs one command, writing its report to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    match &cli.command {
        Command::Dump { file, raw } => {
            let nbt = if file == Path::new("-") {
                read_nbt(io::stdin().lock(), !raw)?
            } else {
                read_nbt(BufReader::new(File::open(file)?), !raw)?
            };
            write!(out, "{}", indent(&render(Some(nbt.name.as_str()), &nbt.root)))?;
        }
        Command::Set {
            file,
            path,
            value,
            raw,
        } => {
            let mut handler = NbtHandler::open(file, !raw)?;
            let tag = resolve(handler.root_mut(), path)?;
            if !tag.is_text_editable() {
                return Err(StrataError::ContractViolation(format!(
                    "{} at {} cannot be edited as text",
                    tag.tag_type(),
                    path
                )));
            }
            tag.parse_payload(value)?;
            if handler.save()? {
                writeln!(out, "saved {}", handler.path().display())?;
            } else {
                writeln!(out, "unchanged")?;
            }
        }
        Command::Scan { dir } => {
            let manager = ChunkManager::with_parts(
                cli.manager_config()?,
                Arc::new(LoggingReceiver),
                Arc::new(SystemMemoryProbe),
                Arc::new(AnvilOpener),
            );
            let summary = manager.scan_folder(dir)?;
            writeln!(
                out,
                "{} chunks in {} files, {} skipped",
                summary.chunks, summary.files, summary.skipped
            )?;
        }
        Command::Top { dir, x, z } => {
            let config = cli.manager_config()?;
            let mut manager = SerialChunkManager::new(config.region_extension);
            manager.set_folder(dir, true)?;
            let pos = WorldPosition::new(*x, *z);
            match manager.top_most_position(pos)? {
                Some(y) => writeln!(out, "{}", y)?,
                None => writeln!(out, "no chunk at {}", pos)?,
            }
        }
    }
    Ok(())
}

fn read_nbt(reader: impl Read, gzip: bool) -> Result<NbtFile> {
    Ok(NbtFile::read_from(reader, gzip)?)
}

/// Walks `path` from `root`. Segments name compound children or index lists.
fn resolve<'a>(root: &'a mut Tag, path: &str) -> Result<&'a mut Tag> {
    let mut tag = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let missing = || StrataError::ContractViolation(format!("no {} in {}", segment, path));
        tag = if tag.tag_type() == TagType::List {
            let index = segment.parse().map_err(|_| missing())?;
            tag.get_at_mut(index).ok_or_else(missing)?
        } else {
            tag.get_mut(segment).ok_or_else(missing)?
        };
    }
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strata_nbt::Compound;

    fn sample() -> Tag {
        Compound::new()
            .with("Data", Compound::new().with("Time", Tag::long(5)).into())
            .with(
                "Names",
                Tag::list_of(TagType::String, vec![Tag::string("a"), Tag::string("b")]).unwrap(),
            )
            .into()
    }

    #[test]
    fn test_resolve_paths() {
        let mut root = sample();
        assert_eq!(resolve(&mut root, "Data/Time").unwrap().as_i64(), Some(5));
        assert_eq!(resolve(&mut root, "/Names/1").unwrap().as_str(), Some("b"));
        assert_eq!(
            resolve(&mut root, "").unwrap().tag_type(),
            TagType::Compound
        );
        assert_matches!(
            resolve(&mut root, "Names/x"),
            Err(StrataError::ContractViolation(_))
        );
        assert_matches!(
            resolve(&mut root, "Data/Missing"),
            Err(StrataError::ContractViolation(_))
        );
    }

    #[test]
    fn test_parse_negative_coordinates() {
        let cli = Cli::parse_from(["strata", "top", "world", "-17", "3"]);
        assert_matches!(cli.command, Command::Top { x: -17, z: 3, .. });
    }
}
