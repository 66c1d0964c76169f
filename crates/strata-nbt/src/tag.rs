use std::fmt;
use std::fmt::{Display, Formatter};

use crate::error::NbtError;

/// The kind of an NBT record, with its on-disk id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11,
    LongArray = 12,
}

impl TagType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Result<TagType, NbtError> {
        Ok(match id {
            0 => TagType::End,
            1 => TagType::Byte,
            2 => TagType::Short,
            3 => TagType::Int,
            4 => TagType::Long,
            5 => TagType::Float,
            6 => TagType::Double,
            7 => TagType::ByteArray,
            8 => TagType::String,
            9 => TagType::List,
            10 => TagType::Compound,
            11 => TagType::IntArray,
            12 => TagType::LongArray,
            _ => return Err(NbtError::InvalidTagType(id)),
        })
    }

    /// Whether records of this kind carry a single number.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TagType::Byte
                | TagType::Short
                | TagType::Int
                | TagType::Long
                | TagType::Float
                | TagType::Double
        )
    }
}

impl Display for TagType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagType::End => "END",
            TagType::Byte => "BYTE",
            TagType::Short => "SHORT",
            TagType::Int => "INT",
            TagType::Long => "LONG",
            TagType::Float => "FLOAT",
            TagType::Double => "DOUBLE",
            TagType::ByteArray => "BYTE_ARRAY",
            TagType::String => "STRING",
            TagType::List => "LIST",
            TagType::Compound => "COMPOUND",
            TagType::IntArray => "INT_ARRAY",
            TagType::LongArray => "LONG_ARRAY",
        };
        f.write_str(name)
    }
}
