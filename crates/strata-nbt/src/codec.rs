//! Binary encoding of NBT records.
//!
//! Everything is big-endian. A named record is `kind:u8 | name | payload`,
//! where names and strings are `u16` length-prefixed UTF-8 and arrays and lists
//! carry an `i32` count. Compounds run until an `End` record.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::NbtError;
use crate::record::{Compound, List, Payload, Tag};
use crate::tag::TagType;

/// Nesting limit for lists and compounds.
pub const MAX_DEPTH: usize = 512;

/// Reads one named record. An `End` kind byte yields an unnamed `End` record.
pub fn decode<R: Read>(reader: &mut R) -> Result<(String, Tag), NbtError> {
    let kind = read_kind(reader)?;
    if kind == TagType::End {
        return Ok((String::new(), Tag::new(Payload::End)));
    }
    let name = read_string(reader, "record name")?;
    let tag = read_payload(reader, kind, 0)?;
    Ok((name, tag))
}

/// Like [`decode`], but fails unless the root record is of kind `expected`.
pub fn decode_expect<R: Read>(
    reader: &mut R,
    expected: TagType,
) -> Result<(String, Tag), NbtError> {
    let (name, tag) = decode(reader)?;
    if tag.tag_type() != expected {
        return Err(NbtError::UnexpectedRoot {
            expected,
            found: tag.tag_type(),
        });
    }
    Ok((name, tag))
}

/// Reads the payload of a record whose kind is already known.
pub fn decode_payload<R: Read>(reader: &mut R, kind: TagType) -> Result<Tag, NbtError> {
    read_payload(reader, kind, 0)
}

/// Writes `tag` as a named record.
pub fn encode<W: Write>(writer: &mut W, name: &str, tag: &Tag) -> Result<(), NbtError> {
    writer.write_u8(tag.tag_type().id())?;
    if tag.tag_type() != TagType::End {
        write_string(writer, name)?;
    }
    encode_payload(writer, tag)
}

/// Writes only the payload of `tag`.
pub fn encode_payload<W: Write>(writer: &mut W, tag: &Tag) -> Result<(), NbtError> {
    match tag.payload() {
        Payload::End => {}
        Payload::Byte(v) => writer.write_i8(*v)?,
        Payload::Short(v) => writer.write_i16::<BigEndian>(*v)?,
        Payload::Int(v) => writer.write_i32::<BigEndian>(*v)?,
        Payload::Long(v) => writer.write_i64::<BigEndian>(*v)?,
        Payload::Float(v) => writer.write_f32::<BigEndian>(*v)?,
        Payload::Double(v) => writer.write_f64::<BigEndian>(*v)?,
        Payload::ByteArray(v) => {
            write_len(writer, v.len())?;
            let bytes: Vec<u8> = v.iter().map(|&b| b as u8).collect();
            writer.write_all(&bytes)?;
        }
        Payload::String(v) => write_string(writer, v)?,
        Payload::List(list) => {
            writer.write_u8(list.element_type().id())?;
            write_len(writer, list.len())?;
            for item in list {
                encode_payload(writer, item)?;
            }
        }
        Payload::Compound(compound) => {
            for (name, child) in compound {
                encode(writer, name, child)?;
            }
            writer.write_u8(TagType::End.id())?;
        }
        Payload::IntArray(v) => {
            write_len(writer, v.len())?;
            for &i in v {
                writer.write_i32::<BigEndian>(i)?;
            }
        }
        Payload::LongArray(v) => {
            write_len(writer, v.len())?;
            for &l in v {
                writer.write_i64::<BigEndian>(l)?;
            }
        }
    }
    Ok(())
}

fn read_kind<R: Read>(reader: &mut R) -> Result<TagType, NbtError> {
    let id = reader.read_u8().map_err(NbtError::on_read("tag kind"))?;
    TagType::from_id(id)
}

fn read_payload<R: Read>(reader: &mut R, kind: TagType, depth: usize) -> Result<Tag, NbtError> {
    let payload = match kind {
        TagType::End => Payload::End,
        TagType::Byte => Payload::Byte(reader.read_i8().map_err(NbtError::on_read("byte"))?),
        TagType::Short => Payload::Short(
            reader
                .read_i16::<BigEndian>()
                .map_err(NbtError::on_read("short"))?,
        ),
        TagType::Int => Payload::Int(
            reader
                .read_i32::<BigEndian>()
                .map_err(NbtError::on_read("int"))?,
        ),
        TagType::Long => Payload::Long(
            reader
                .read_i64::<BigEndian>()
                .map_err(NbtError::on_read("long"))?,
        ),
        TagType::Float => Payload::Float(
            reader
                .read_f32::<BigEndian>()
                .map_err(NbtError::on_read("float"))?,
        ),
        TagType::Double => Payload::Double(
            reader
                .read_f64::<BigEndian>()
                .map_err(NbtError::on_read("double"))?,
        ),
        TagType::ByteArray => {
            let bytes = read_bytes(reader, "byte array")?;
            Payload::ByteArray(bytes.into_iter().map(|b| b as i8).collect())
        }
        TagType::String => Payload::String(read_string(reader, "string")?),
        TagType::List => Payload::List(read_list(reader, depth + 1)?),
        TagType::Compound => Payload::Compound(read_compound(reader, depth + 1)?),
        TagType::IntArray => {
            let len = read_len(reader, "int array")?;
            let mut ints = Vec::new();
            ints.try_reserve_exact(len)
                .map_err(NbtError::allocation(len))?;
            for _ in 0..len {
                ints.push(
                    reader
                        .read_i32::<BigEndian>()
                        .map_err(NbtError::on_read("int array"))?,
                );
            }
            Payload::IntArray(ints)
        }
        TagType::LongArray => {
            let len = read_len(reader, "long array")?;
            let mut longs = Vec::new();
            longs
                .try_reserve_exact(len)
                .map_err(NbtError::allocation(len))?;
            for _ in 0..len {
                longs.push(
                    reader
                        .read_i64::<BigEndian>()
                        .map_err(NbtError::on_read("long array"))?,
                );
            }
            Payload::LongArray(longs)
        }
    };
    Ok(Tag::new(payload))
}

fn read_list<R: Read>(reader: &mut R, depth: usize) -> Result<List, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::TooDeep(MAX_DEPTH));
    }
    let element = read_kind(reader)?;
    let len = read_len(reader, "list")?;
    if element == TagType::End && len > 0 {
        return Err(NbtError::ListKindMismatch {
            declared: TagType::End,
            found: TagType::End,
        });
    }
    let mut items = Vec::new();
    items.try_reserve(len).map_err(NbtError::allocation(len))?;
    for _ in 0..len {
        items.push(read_payload(reader, element, depth)?);
    }
    List::from_items(element, items)
}

fn read_compound<R: Read>(reader: &mut R, depth: usize) -> Result<Compound, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::TooDeep(MAX_DEPTH));
    }
    let mut compound = Compound::new();
    loop {
        let kind = read_kind(reader)?;
        if kind == TagType::End {
            break;
        }
        let name = read_string(reader, "record name")?;
        let tag = read_payload(reader, kind, depth)?;
        // Last occurrence of a duplicated name wins.
        compound.insert_decoded(name, tag);
    }
    Ok(compound)
}

fn read_len<R: Read>(reader: &mut R, field: &'static str) -> Result<usize, NbtError> {
    let len = reader
        .read_i32::<BigEndian>()
        .map_err(NbtError::on_read(field))?;
    usize::try_from(len).map_err(|_| NbtError::NegativeLength(len, field))
}

fn read_bytes<R: Read>(reader: &mut R, field: &'static str) -> Result<Vec<u8>, NbtError> {
    let len = read_len(reader, field)?;
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len)
        .map_err(NbtError::allocation(len))?;
    reader
        .take(len as u64)
        .read_to_end(&mut bytes)
        .map_err(NbtError::on_read(field))?;
    if bytes.len() < len {
        return Err(NbtError::Truncated(field));
    }
    Ok(bytes)
}

fn read_string<R: Read>(reader: &mut R, field: &'static str) -> Result<String, NbtError> {
    let len = reader
        .read_u16::<BigEndian>()
        .map_err(NbtError::on_read(field))?;
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(NbtError::on_read(field))?;
    String::from_utf8(bytes).map_err(|_| NbtError::InvalidUtf8(field))
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), NbtError> {
    let len = u16::try_from(value.len()).map_err(|_| NbtError::StringTooLong(value.len()))?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<(), NbtError> {
    let len = i32::try_from(len).map_err(|_| NbtError::Allocation(len))?;
    writer.write_i32::<BigEndian>(len)?;
    Ok(())
}
