// swgkit-parsers/src/terrain/item.rs
//! Framing shared by boundaries, filters and affectors
//!
//! ```text
//! FORM <kind>
//! └── FORM <version>
//!     ├── FORM IHDR / FORM 0001 / DATA   enabled, name   (optional)
//!     └── DATA                           kind/version specific
//! ```
//!
//! Anything that does not fit this shape, or whose payload cannot be read
//! exactly, is kept as an [`OpaqueItem`].

use serde::Serialize;
use swgkit_core::Result;

use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag};

pub(crate) const IHDR: Tag = Tag::new(b"IHDR");
pub(crate) const IHDR_VERSION: Tag = Tag::new(b"0001");
pub(crate) const DATA: Tag = Tag::new(b"DATA");

/// Common header of layers and layer items
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ItemHeader {
    pub enabled: bool,
    pub name: String,
}

impl ItemHeader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
        }
    }

    pub(crate) fn decode(node: &Node) -> Option<Self> {
        let (version, body) = node.version_form()?;
        let [Node::Leaf { tag, data }] = body else {
            return None;
        };
        if version != IHDR_VERSION || *tag != DATA {
            return None;
        }
        read_exact(data, |r| {
            Ok(Self {
                enabled: r.i32_le()? != 0,
                name: r.cstring()?,
            })
        })
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut w = ByteWriter::with_capacity(5 + self.name.len());
        w.put_i32_le(i32::from(self.enabled));
        w.put_cstring(&self.name);
        Node::form(IHDR, vec![Node::form(IHDR_VERSION, vec![Node::leaf(DATA, w.into_inner())])])
    }
}

/// An item kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpaqueItem {
    pub kind: Tag,
    /// Version form type name, `None` when the item has no single version form
    pub version: Option<Tag>,
    /// Serialized children of the version form (or of the item itself)
    pub body: Vec<u8>,
}

impl OpaqueItem {
    pub(crate) fn from_node(node: &Node) -> Self {
        let kind = node.label();
        match node.children() {
            [Node::Container { type_name, children }] if type_name.is_version() => Self {
                kind,
                version: Some(*type_name),
                body: iff::serialize_sequence(children),
            },
            children => Self {
                kind,
                version: None,
                body: iff::serialize_sequence(children),
            },
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let children = iff::parse_sequence(&self.body);
        match self.version {
            Some(version) => Node::form(self.kind, vec![Node::form(version, children)]),
            None => Node::form(self.kind, children),
        }
    }
}

/// A standard-shape item split into its parts
pub(crate) struct ItemParts<'a> {
    pub kind: Tag,
    pub version: Tag,
    pub header: Option<ItemHeader>,
    pub data: &'a [u8],
}

impl<'a> ItemParts<'a> {
    pub(crate) fn split(node: &'a Node) -> Option<Self> {
        let kind = node.type_name()?;
        let [Node::Container { type_name: version, children }] = node.children() else {
            return None;
        };
        if !version.is_version() {
            return None;
        }
        let (header, data) = match children.as_slice() {
            [Node::Leaf { tag, data }] if *tag == DATA => (None, data),
            [ihdr, Node::Leaf { tag, data }] if ihdr.is_form(IHDR) && *tag == DATA => {
                (Some(ItemHeader::decode(ihdr)?), data)
            }
            _ => return None,
        };
        Some(Self {
            kind,
            version: *version,
            header,
            data,
        })
    }

    /// Run a field reader over the payload, requiring every byte to be consumed
    pub(crate) fn read<T>(&self, read: impl FnOnce(&mut ByteReader<'a>) -> Result<T>) -> Option<T> {
        let value = read_exact(self.data, read);
        if value.is_none() {
            tracing::warn!(
                kind = %self.kind,
                version = %self.version,
                length = self.data.len(),
                "Payload does not match layout, keeping raw bytes"
            );
        }
        value
    }
}

/// Read a payload with `read`, requiring every byte to be consumed
pub(crate) fn read_exact<'a, T>(data: &'a [u8], read: impl FnOnce(&mut ByteReader<'a>) -> Result<T>) -> Option<T> {
    let mut reader = ByteReader::new(data);
    let value = read(&mut reader).ok()?;
    reader.is_empty().then_some(value)
}

/// Build a standard-shape item
pub(crate) fn build_item(kind: Tag, version: Tag, header: Option<&ItemHeader>, data: Vec<u8>) -> Node {
    let mut children = Vec::with_capacity(2);
    if let Some(header) = header {
        children.push(header.to_node());
    }
    children.push(Node::leaf(DATA, data));
    Node::form(kind, vec![Node::form(version, children)])
}

/// Clamp a feathering value into `[0, 1]`
pub(crate) fn clamp_unit(value: f32, field: &'static str) -> f32 {
    if (0.0..=1.0).contains(&value) {
        return value;
    }
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    tracing::warn!(field, value, clamped, "Clamping out-of-range feather value");
    clamped
}

/// Feathering applied at a boundary's edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feather {
    pub feather_type: i32,
    pub amount: f32,
}

impl Feather {
    pub const NONE: Self = Self {
        feather_type: 0,
        amount: 0.0,
    };

    pub(crate) fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            feather_type: r.i32_le()?,
            amount: clamp_unit(r.f32()?, "feather_amount"),
        })
    }

    pub(crate) fn write(&self, w: &mut ByteWriter) {
        w.put_i32_le(self.feather_type);
        w.put_f32(self.amount);
    }
}

impl Default for Feather {
    fn default() -> Self {
        Self::NONE
    }
}
