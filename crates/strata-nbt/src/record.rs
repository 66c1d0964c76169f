//! The mutable NBT record tree.
//!
//! A [`Tag`] is one node: a [`Payload`] plus a dirty flag. Names are owned by
//! the parent [`Compound`] (or, for the root, by [`crate::NbtFile`]), so list
//! elements are unnamed by construction and compound children are unique.
//!
//! Every setter marks the node it mutates; [`Tag::has_changed`] reports a
//! change anywhere in the subtree and [`Tag::reset_change`] clears it.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::error::NbtError;
use crate::tag::TagType;

#[derive(Debug, Clone)]
pub enum Payload {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(List),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Payload {
    pub fn tag_type(&self) -> TagType {
        match self {
            Payload::End => TagType::End,
            Payload::Byte(_) => TagType::Byte,
            Payload::Short(_) => TagType::Short,
            Payload::Int(_) => TagType::Int,
            Payload::Long(_) => TagType::Long,
            Payload::Float(_) => TagType::Float,
            Payload::Double(_) => TagType::Double,
            Payload::ByteArray(_) => TagType::ByteArray,
            Payload::String(_) => TagType::String,
            Payload::List(_) => TagType::List,
            Payload::Compound(_) => TagType::Compound,
            Payload::IntArray(_) => TagType::IntArray,
            Payload::LongArray(_) => TagType::LongArray,
        }
    }
}

// Floats compare by bit pattern so that a decoded NaN equals the encoded one.
impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::End, Payload::End) => true,
            (Payload::Byte(a), Payload::Byte(b)) => a == b,
            (Payload::Short(a), Payload::Short(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Long(a), Payload::Long(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a.to_bits() == b.to_bits(),
            (Payload::Double(a), Payload::Double(b)) => a.to_bits() == b.to_bits(),
            (Payload::ByteArray(a), Payload::ByteArray(b)) => a == b,
            (Payload::String(a), Payload::String(b)) => a == b,
            (Payload::List(a), Payload::List(b)) => a == b,
            (Payload::Compound(a), Payload::Compound(b)) => a == b,
            (Payload::IntArray(a), Payload::IntArray(b)) => a == b,
            (Payload::LongArray(a), Payload::LongArray(b)) => a == b,
            _ => false,
        }
    }
}

/// A homogeneous sequence of unnamed records.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    element: TagType,
    items: Vec<Tag>,
}

impl List {
    pub fn new(element: TagType) -> Self {
        List {
            element,
            items: Vec::new(),
        }
    }

    /// Builds a list, checking that every item is of kind `element`.
    pub fn from_items(element: TagType, items: Vec<Tag>) -> Result<Self, NbtError> {
        for item in &items {
            check_element(element, item.tag_type())?;
        }
        Ok(List { element, items })
    }

    pub fn element_type(&self) -> TagType {
        self.element
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.items.iter()
    }

    fn has_changed(&self) -> bool {
        self.items.iter().any(Tag::has_changed)
    }

    fn reset_change(&mut self) {
        self.items.iter_mut().for_each(Tag::reset_change);
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn check_element(element: TagType, found: TagType) -> Result<(), NbtError> {
    if element != found || element == TagType::End {
        return Err(NbtError::ListKindMismatch {
            declared: element,
            found,
        });
    }
    Ok(())
}

/// Named children, unique by name and iterated in name order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    entries: BTreeMap<String, Tag>,
}

impl Compound {
    pub fn new() -> Self {
        Compound::default()
    }

    /// Builder-style insert, for constructing trees.
    pub fn with(mut self, name: impl Into<String>, tag: Tag) -> Self {
        self.entries.insert(name.into(), tag);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Tag> {
        self.entries.iter()
    }

    pub(crate) fn insert_decoded(&mut self, name: String, tag: Tag) {
        self.entries.insert(name, tag);
    }

    fn has_changed(&self) -> bool {
        self.entries.values().any(Tag::has_changed)
    }

    fn reset_change(&mut self) {
        self.entries.values_mut().for_each(Tag::reset_change);
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        Compound {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Compound {
    type Item = (&'a String, &'a Tag);
    type IntoIter = btree_map::Iter<'a, String, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One node of an NBT tree.
#[derive(Debug, Clone)]
pub struct Tag {
    payload: Payload,
    changed: bool,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl From<Payload> for Tag {
    fn from(payload: Payload) -> Self {
        Tag::new(payload)
    }
}

impl From<Compound> for Tag {
    fn from(compound: Compound) -> Self {
        Tag::new(Payload::Compound(compound))
    }
}

impl From<List> for Tag {
    fn from(list: List) -> Self {
        Tag::new(Payload::List(list))
    }
}

impl Tag {
    pub fn new(payload: Payload) -> Self {
        Tag {
            payload,
            changed: false,
        }
    }

    pub fn byte(v: i8) -> Self {
        Tag::new(Payload::Byte(v))
    }

    pub fn short(v: i16) -> Self {
        Tag::new(Payload::Short(v))
    }

    pub fn int(v: i32) -> Self {
        Tag::new(Payload::Int(v))
    }

    pub fn long(v: i64) -> Self {
        Tag::new(Payload::Long(v))
    }

    pub fn float(v: f32) -> Self {
        Tag::new(Payload::Float(v))
    }

    pub fn double(v: f64) -> Self {
        Tag::new(Payload::Double(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Tag::new(Payload::String(v.into()))
    }

    pub fn byte_array(v: Vec<i8>) -> Self {
        Tag::new(Payload::ByteArray(v))
    }

    pub fn int_array(v: Vec<i32>) -> Self {
        Tag::new(Payload::IntArray(v))
    }

    pub fn long_array(v: Vec<i64>) -> Self {
        Tag::new(Payload::LongArray(v))
    }

    pub fn compound() -> Self {
        Tag::new(Payload::Compound(Compound::new()))
    }

    pub fn list(element: TagType) -> Self {
        Tag::new(Payload::List(List::new(element)))
    }

    pub fn list_of(element: TagType, items: Vec<Tag>) -> Result<Self, NbtError> {
        Ok(Tag::new(Payload::List(List::from_items(element, items)?)))
    }

    pub fn tag_type(&self) -> TagType {
        self.payload.tag_type()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    // --- dirty tracking ---

    /// Marks this node as changed.
    pub fn change(&mut self) {
        self.changed = true;
    }

    /// Whether this node or any descendant changed since the last reset.
    pub fn has_changed(&self) -> bool {
        if self.changed {
            return true;
        }
        match &self.payload {
            Payload::List(list) => list.has_changed(),
            Payload::Compound(compound) => compound.has_changed(),
            _ => false,
        }
    }

    /// Clears the change flag of the whole subtree.
    pub fn reset_change(&mut self) {
        self.changed = false;
        match &mut self.payload {
            Payload::List(list) => list.reset_change(),
            Payload::Compound(compound) => compound.reset_change(),
            _ => {}
        }
    }

    // --- typed getters ---

    pub fn as_compound(&self) -> Option<&Compound> {
        match &self.payload {
            Payload::Compound(compound) => Some(compound),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.payload {
            Payload::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match &self.payload {
            Payload::ByteArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match &self.payload {
            Payload::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match &self.payload {
            Payload::LongArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self.payload {
            Payload::Byte(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self.payload {
            Payload::Short(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.payload {
            Payload::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.payload {
            Payload::Long(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.payload {
            Payload::Float(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Payload::Double(n) => Some(n),
            _ => None,
        }
    }

    /// Any integral numeric payload, widened.
    pub fn integer(&self) -> Option<i64> {
        match self.payload {
            Payload::Byte(n) => Some(n.into()),
            Payload::Short(n) => Some(n.into()),
            Payload::Int(n) => Some(n.into()),
            Payload::Long(n) => Some(n),
            _ => None,
        }
    }

    /// Number of elements for arrays and lists, entries for compounds, 0 otherwise.
    pub fn size(&self) -> usize {
        match &self.payload {
            Payload::ByteArray(v) => v.len(),
            Payload::IntArray(v) => v.len(),
            Payload::LongArray(v) => v.len(),
            Payload::List(list) => list.len(),
            Payload::Compound(compound) => compound.len(),
            _ => 0,
        }
    }

    // --- setters ---

    /// Replaces the payload with one of the same kind.
    pub fn set(&mut self, payload: Payload) -> Result<(), NbtError> {
        let expected = self.tag_type();
        if payload.tag_type() != expected {
            return Err(NbtError::KindMismatch {
                expected,
                found: payload.tag_type(),
            });
        }
        self.payload = payload;
        self.change();
        Ok(())
    }

    pub fn set_string(&mut self, value: impl Into<String>) -> Result<(), NbtError> {
        self.set(Payload::String(value.into()))
    }

    pub fn byte_at(&self, index: usize) -> Option<i8> {
        self.as_byte_array()?.get(index).copied()
    }

    pub fn set_byte_at(&mut self, index: usize, value: i8) -> Result<(), NbtError> {
        let found = self.tag_type();
        let Payload::ByteArray(bytes) = &mut self.payload else {
            return Err(NbtError::KindMismatch {
                expected: TagType::ByteArray,
                found,
            });
        };
        let len = bytes.len();
        let slot = bytes
            .get_mut(index)
            .ok_or(NbtError::IndexOutOfRange { index, len })?;
        *slot = value;
        self.change();
        Ok(())
    }

    pub fn int_at(&self, index: usize) -> Option<i32> {
        self.as_int_array()?.get(index).copied()
    }

    pub fn set_int_at(&mut self, index: usize, value: i32) -> Result<(), NbtError> {
        let found = self.tag_type();
        let Payload::IntArray(ints) = &mut self.payload else {
            return Err(NbtError::KindMismatch {
                expected: TagType::IntArray,
                found,
            });
        };
        let len = ints.len();
        let slot = ints
            .get_mut(index)
            .ok_or(NbtError::IndexOutOfRange { index, len })?;
        *slot = value;
        self.change();
        Ok(())
    }

    // --- compound access ---

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.as_compound()?.get(name)
    }

    /// Mutable access to a child. The child marks itself when it is mutated.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        match &mut self.payload {
            Payload::Compound(compound) => compound.entries.get_mut(name),
            _ => None,
        }
    }

    /// Adds or replaces a named child, returning the replaced one.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) -> Result<Option<Tag>, NbtError> {
        let found = self.tag_type();
        let Payload::Compound(compound) = &mut self.payload else {
            return Err(NbtError::KindMismatch {
                expected: TagType::Compound,
                found,
            });
        };
        let old = compound.entries.insert(name.into(), tag);
        self.change();
        Ok(old)
    }

    pub fn remove(&mut self, name: &str) -> Result<Option<Tag>, NbtError> {
        let found = self.tag_type();
        let Payload::Compound(compound) = &mut self.payload else {
            return Err(NbtError::KindMismatch {
                expected: TagType::Compound,
                found,
            });
        };
        let old = compound.entries.remove(name);
        if old.is_some() {
            self.change();
        }
        Ok(old)
    }

    // --- list access ---

    pub fn get_at(&self, index: usize) -> Option<&Tag> {
        self.as_list()?.get(index)
    }

    pub fn get_at_mut(&mut self, index: usize) -> Option<&mut Tag> {
        match &mut self.payload {
            Payload::List(list) => list.items.get_mut(index),
            _ => None,
        }
    }

    /// Replaces a list element; the element must match the list's kind.
    pub fn set_at(&mut self, index: usize, tag: Tag) -> Result<(), NbtError> {
        let list = self.list_mut()?;
        check_element(list.element, tag.tag_type())?;
        let len = list.items.len();
        let slot = list
            .items
            .get_mut(index)
            .ok_or(NbtError::IndexOutOfRange { index, len })?;
        *slot = tag;
        self.change();
        Ok(())
    }

    pub fn push(&mut self, tag: Tag) -> Result<(), NbtError> {
        let list = self.list_mut()?;
        check_element(list.element, tag.tag_type())?;
        list.items.push(tag);
        self.change();
        Ok(())
    }

    fn list_mut(&mut self) -> Result<&mut List, NbtError> {
        let found = self.tag_type();
        match &mut self.payload {
            Payload::List(list) => Ok(list),
            _ => Err(NbtError::KindMismatch {
                expected: TagType::List,
                found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn section(y: i8) -> Tag {
        Compound::new()
            .with("Y", Tag::byte(y))
            .with("Blocks", Tag::byte_array(vec![0; 16]))
            .into()
    }

    fn level() -> Tag {
        let sections = Tag::list_of(TagType::Compound, vec![section(0), section(1)]).unwrap();
        let level: Tag = Compound::new()
            .with("xPos", Tag::int(3))
            .with("Sections", sections)
            .into();
        Compound::new().with("Level", level).into()
    }

    #[test]
    fn test_fresh_tree_is_clean() {
        assert!(!level().has_changed());
    }

    #[test]
    fn test_leaf_change_propagates_to_root() {
        let mut root = level();
        root.get_mut("Level")
            .and_then(|l| l.get_mut("Sections"))
            .and_then(|s| s.get_at_mut(1))
            .and_then(|s| s.get_mut("Blocks"))
            .unwrap()
            .set_byte_at(4, 7)
            .unwrap();

        let level = root.get("Level").unwrap();
        let sections = level.get("Sections").unwrap();
        assert!(root.has_changed());
        assert!(level.has_changed());
        assert!(sections.has_changed());
        assert!(sections.get_at(1).unwrap().has_changed());
        assert!(!sections.get_at(0).unwrap().has_changed());
        assert!(!level.get("xPos").unwrap().has_changed());
    }

    #[test]
    fn test_reset_change_clears_subtree() {
        let mut root = level();
        root.get_mut("Level")
            .and_then(|l| l.get_mut("xPos"))
            .unwrap()
            .set(Payload::Int(9))
            .unwrap();
        root.insert("extra", Tag::string("x")).unwrap();
        assert!(root.has_changed());

        root.reset_change();
        assert!(!root.has_changed());
        assert!(!root.get("Level").unwrap().get("xPos").unwrap().has_changed());
    }

    #[test]
    fn test_set_rejects_other_kind() {
        let mut tag = Tag::int(1);
        assert_matches!(
            tag.set(Payload::Long(1)),
            Err(NbtError::KindMismatch {
                expected: TagType::Int,
                found: TagType::Long
            })
        );
        assert!(!tag.has_changed());
    }

    #[test]
    fn test_list_rejects_mixed_kinds() {
        assert_matches!(
            Tag::list_of(TagType::Int, vec![Tag::int(1), Tag::short(2)]),
            Err(NbtError::ListKindMismatch { .. })
        );

        let mut list = Tag::list(TagType::String);
        list.push(Tag::string("a")).unwrap();
        assert_matches!(list.push(Tag::int(1)), Err(NbtError::ListKindMismatch { .. }));
        assert_matches!(list.set_at(0, Tag::byte(1)), Err(NbtError::ListKindMismatch { .. }));
        assert_matches!(
            list.set_at(5, Tag::string("b")),
            Err(NbtError::IndexOutOfRange { index: 5, len: 1 })
        );
        assert_eq!(list.size(), 1);
    }

    #[test]
    fn test_array_setters() {
        let mut arr = Tag::int_array(vec![1, 2, 3]);
        arr.set_int_at(2, 30).unwrap();
        assert_eq!(arr.int_at(2), Some(30));
        assert!(arr.has_changed());
        assert_matches!(arr.set_byte_at(0, 1), Err(NbtError::KindMismatch { .. }));
        assert_matches!(arr.set_int_at(3, 1), Err(NbtError::IndexOutOfRange { .. }));
    }

    #[test]
    fn test_remove_missing_child_is_not_a_change() {
        let mut root = Tag::compound();
        assert_matches!(root.remove("nope"), Ok(None));
        assert!(!root.has_changed());
        root.insert("a", Tag::byte(1)).unwrap();
        root.reset_change();
        assert_matches!(root.remove("a"), Ok(Some(_)));
        assert!(root.has_changed());
    }

    #[test]
    fn test_equality_ignores_dirty_flag() {
        let mut a = Tag::string("x");
        let b = Tag::string("x");
        a.set_string("x").unwrap();
        assert!(a.has_changed());
        assert_eq!(a, b);
        assert_eq!(Tag::float(f32::NAN), Tag::float(f32::NAN));
    }

    #[test]
    fn test_integer_widening() {
        assert_eq!(Tag::byte(-2).integer(), Some(-2));
        assert_eq!(Tag::short(300).integer(), Some(300));
        assert_eq!(Tag::long(1 << 40).integer(), Some(1 << 40));
        assert_eq!(Tag::float(1.0).integer(), None);
    }
}
