//! Human-readable rendering and text editing of records.

use std::fmt::Write as _;

use crate::error::NbtError;
use crate::record::{Payload, Tag};
use crate::tag::TagType;

/// Renders `tag` as `KIND("name"): payload`, one child per line. Containers
/// put their children between `{` and `}` lines. `name` is `None` for list
/// elements.
pub fn render(name: Option<&str>, tag: &Tag) -> String {
    let mut out = String::new();
    render_into(&mut out, name, tag);
    out
}

fn render_into(out: &mut String, name: Option<&str>, tag: &Tag) {
    let _ = write!(out, "{}", tag.tag_type());
    match name {
        Some(name) => {
            let _ = write!(out, "(\"{}\"): ", name);
        }
        None => out.push_str(": "),
    }
    match tag.payload() {
        Payload::End => {}
        Payload::Byte(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::Short(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::Int(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::Long(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::Float(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::Double(v) => {
            let _ = write!(out, "{}", v);
        }
        Payload::String(v) => {
            let _ = write!(out, "\"{}\"", v);
        }
        Payload::ByteArray(v) => {
            let _ = write!(out, "[{} bytes]", v.len());
        }
        Payload::IntArray(v) => {
            let _ = write!(out, "[{} ints]", v.len());
        }
        Payload::LongArray(v) => {
            let _ = write!(out, "[{} longs]", v.len());
        }
        Payload::List(list) => {
            let _ = write!(out, "{} entries of {}\n{{\n", list.len(), list.element_type());
            for item in list {
                render_into(out, None, item);
                out.push('\n');
            }
            out.push('}');
        }
        Payload::Compound(compound) => {
            let _ = write!(out, "{} entries\n{{\n", compound.len());
            for (child_name, child) in compound {
                render_into(out, Some(child_name), child);
                out.push('\n');
            }
            out.push('}');
        }
    }
}

/// Indents every line two spaces per enclosing brace level.
pub fn indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut level = 0usize;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('}') {
            level = level.saturating_sub(1);
        }
        for _ in 0..level {
            out.push_str("  ");
        }
        out.push_str(trimmed);
        out.push('\n');
        if trimmed.ends_with('{') {
            level += 1;
        }
    }
    out
}

impl Tag {
    /// Whether the payload can be edited as text.
    pub fn is_text_editable(&self) -> bool {
        self.tag_type().is_numeric()
            || matches!(self.tag_type(), TagType::String | TagType::ByteArray)
    }

    /// The payload as text accepted by [`Tag::parse_payload`], or `None` if
    /// the record is not text editable.
    pub fn parseable_payload(&self) -> Option<String> {
        Some(match self.payload() {
            Payload::Byte(v) => v.to_string(),
            Payload::Short(v) => v.to_string(),
            Payload::Int(v) => v.to_string(),
            Payload::Long(v) => v.to_string(),
            Payload::Float(v) => v.to_string(),
            Payload::Double(v) => v.to_string(),
            Payload::String(v) => v.clone(),
            Payload::ByteArray(v) => v.iter().fold(String::with_capacity(v.len() * 2), |mut s, b| {
                let _ = write!(s, "{:02x}", *b as u8);
                s
            }),
            _ => return None,
        })
    }

    /// Replaces the payload with one parsed from `text`. On failure the
    /// record is left untouched.
    pub fn parse_payload(&mut self, text: &str) -> Result<(), NbtError> {
        let kind = self.tag_type();
        let fail = |reason: String| NbtError::Parse {
            kind,
            text: text.to_owned(),
            reason,
        };
        let payload = match kind {
            TagType::Byte => Payload::Byte(text.trim().parse().map_err(|e| fail(format!("{e}")))?),
            TagType::Short => Payload::Short(text.trim().parse().map_err(|e| fail(format!("{e}")))?),
            TagType::Int => Payload::Int(text.trim().parse().map_err(|e| fail(format!("{e}")))?),
            TagType::Long => Payload::Long(text.trim().parse().map_err(|e| fail(format!("{e}")))?),
            TagType::Float => Payload::Float(text.trim().parse().map_err(|e| fail(format!("{e}")))?),
            TagType::Double => {
                Payload::Double(text.trim().parse().map_err(|e| fail(format!("{e}")))?)
            }
            TagType::String => Payload::String(text.to_owned()),
            TagType::ByteArray => Payload::ByteArray(parse_hex(text).map_err(fail)?),
            _ => return Err(fail("not text editable".to_owned())),
        };
        self.set(payload)
    }
}

fn parse_hex(text: &str) -> Result<Vec<i8>, String> {
    let bytes = text.as_bytes();
    if bytes.len() % 2 == 1 {
        return Err("incorrect length".to_owned());
    }
    bytes
        .chunks(2)
        .enumerate()
        .map(|(i, pair)| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .map(|b| b as i8)
                .ok_or_else(|| format!("illegal characters at {}", i * 2))
        })
        .collect()
}
