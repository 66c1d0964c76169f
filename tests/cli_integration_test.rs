use std::fs::File;
use std::path::Path;
use std::process::{Command, Output};

use strata::common::ChunkPosition;
use strata::nbt::{Compound, NbtFile, NbtHandler, Tag, TagType};
use strata::region::{AnvilRegion, RegionContainer};

fn strata(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .args(args)
        .env("STRATA_LOG", "off")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_level(path: &Path) {
    let root = Compound::new()
        .with(
            "Data",
            Compound::new()
                .with("LevelName", Tag::string("World"))
                .with("Time", Tag::long(1200))
                .into(),
        )
        .into();
    NbtFile::new("", root)
        .write_to(File::create(path).unwrap(), true)
        .unwrap();
}

fn write_region(dir: &Path, pos: ChunkPosition) {
    let section = Compound::new()
        .with("Y", Tag::byte(4))
        .with("Blocks", Tag::byte_array(vec![1; 4096]));
    let level = Compound::new()
        .with("xPos", Tag::int(pos.x))
        .with("zPos", Tag::int(pos.z))
        .with(
            "Sections",
            Tag::list_of(TagType::Compound, vec![section.into()]).unwrap(),
        );
    let record = NbtFile::new("", Compound::new().with("Level", level.into()).into());
    let mut region = AnvilRegion::create(dir.join(pos.region_file_name("mca"))).unwrap();
    region
        .write_slot(pos.in_file(), &record.to_bytes().unwrap())
        .unwrap();
}

#[test]
fn test_dump_prints_indented_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("level.dat");
    write_level(&path);

    let output = strata(&["dump", path.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("COMPOUND(\"\"): 1 entries\n{\n"));
    assert!(text.contains("    LONG(\"Time\"): 1200\n"));
    assert!(text.contains("    STRING(\"LevelName\"): \"World\"\n"));
}

#[test]
fn test_dump_raw_file_as_gzip_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.nbt");
    NbtFile::new("raw", Compound::new().with("a", Tag::byte(1)).into())
        .write_to(File::create(&path).unwrap(), false)
        .unwrap();

    assert!(!strata(&["dump", path.to_str().unwrap()]).status.success());
    let output = strata(&["dump", "--raw", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("BYTE(\"a\"): 1"));
}

#[test]
fn test_set_saves_only_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("level.dat");
    write_level(&path);
    let file = path.to_str().unwrap();

    let output = strata(&["set", file, "Data/Time", "-5"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("saved"));
    let handler = NbtHandler::open(&path, true).unwrap();
    assert_eq!(
        handler.root().get("Data").and_then(|d| d.get("Time")).and_then(Tag::as_i64),
        Some(-5)
    );

    let output = strata(&["set", file, "Data/Time", "-5"]);
    assert_eq!(stdout(&output), "unchanged\n");

    assert!(!strata(&["set", file, "Data/Time", "soon"]).status.success());
    assert!(!strata(&["set", file, "Data", "1"]).status.success());
    assert!(!strata(&["set", file, "Data/Nope", "1"]).status.success());
}

#[test]
fn test_scan_and_top() {
    let dir = tempfile::tempdir().unwrap();
    write_region(dir.path(), ChunkPosition::new(-1, 0));
    let folder = dir.path().to_str().unwrap();

    let output = strata(&["scan", folder]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1 chunks in 1 files, 0 skipped\n");

    let output = strata(&["top", folder, "-3", "7"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "79\n");

    let output = strata(&["top", folder, "3", "7"]);
    assert_eq!(stdout(&output), "no chunk at x: 3 z: 7\n");
}

#[test]
fn test_bad_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("strata.json");
    std::fs::write(&config, r#"{"memory_threshold": 2.0}"#).unwrap();

    let output = strata(&["--config", config.to_str().unwrap(), "scan", "."]);
    assert!(!output.status.success());
}
