//! Named Binary Tag records: the mutable record tree, its binary codec and
//! gzip-wrapped files.

pub mod codec;
mod error;
mod file;
mod record;
mod tag;
mod text;

pub use codec::{decode, decode_expect, encode, MAX_DEPTH};
pub use error::NbtError;
pub use file::{NbtFile, NbtHandler};
pub use record::{Compound, List, Payload, Tag};
pub use tag::TagType;
pub use text::{indent, render};
