// swgkit-parsers/src/iff/mod.rs
//! Generic chunk-tree (IFF) codec
//!
//! Most asset formats share one recursive framing: a node is either a
//! container (`FORM`) carrying a type name and child nodes, or a leaf
//! carrying a raw payload.
//!
//! # Format Structure
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Container                                    │
//! │  "FORM"  length:u32 BE  type:[u8; 4]         │
//! │  children... (length - 4 bytes)              │
//! ├──────────────────────────────────────────────┤
//! │ Leaf                                         │
//! │  tag:[u8; 4]  length:u32 BE  payload         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Unlike generic IFF, odd-length leaves are **not** padded.
//!
//! Parsing never fails hard: an invalid tag or a length that runs past the
//! available bytes ends the enclosing container's child list early, and the
//! rest of the tree is still returned.

mod tag;
mod view;

pub use tag::Tag;
pub use view::ContainerView;

use serde::Serialize;

use crate::binary::{scan_signature, ByteReader, ByteWriter};
use crate::traits::ParseOptions;

/// Tag that marks a container node
pub const FORM: Tag = Tag::new(b"FORM");

/// Size of a chunk header: tag plus length
pub const HEADER_SIZE: usize = 8;

/// A node in a chunk tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Node {
    /// `FORM` container with a type name and ordered children
    Container { type_name: Tag, children: Vec<Node> },
    /// Leaf chunk with a raw payload
    Leaf { tag: Tag, data: Vec<u8> },
}

impl Node {
    pub fn form(type_name: Tag, children: Vec<Node>) -> Self {
        Node::Container { type_name, children }
    }

    pub fn leaf(tag: Tag, data: Vec<u8>) -> Self {
        Node::Leaf { tag, data }
    }

    /// Wire tag: `FORM` for containers, the chunk tag for leaves
    pub fn tag(&self) -> Tag {
        match self {
            Node::Container { .. } => FORM,
            Node::Leaf { tag, .. } => *tag,
        }
    }

    pub fn type_name(&self) -> Option<Tag> {
        match self {
            Node::Container { type_name, .. } => Some(*type_name),
            Node::Leaf { .. } => None,
        }
    }

    /// Type name for containers, tag for leaves
    pub fn label(&self) -> Tag {
        match self {
            Node::Container { type_name, .. } => *type_name,
            Node::Leaf { tag, .. } => *tag,
        }
    }

    pub fn is_form(&self, type_name: Tag) -> bool {
        self.type_name() == Some(type_name)
    }

    pub fn is_leaf(&self, tag: Tag) -> bool {
        matches!(self, Node::Leaf { tag: t, .. } if *t == tag)
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Container { children, .. } => children,
            Node::Leaf { .. } => &[],
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf { data, .. } => Some(data),
            Node::Container { .. } => None,
        }
    }

    /// Sequential cursor over this node's children
    pub fn view(&self) -> ContainerView<'_> {
        ContainerView::new(self.children())
    }

    pub fn find_form(&self, type_name: Tag) -> Option<&Node> {
        self.children().iter().find(|c| c.is_form(type_name))
    }

    pub fn find_leaf(&self, tag: Tag) -> Option<&[u8]> {
        self.children()
            .iter()
            .find(|c| c.is_leaf(tag))
            .and_then(Node::data)
    }

    /// First child container whose type name is a version tag
    pub fn version_form(&self) -> Option<(Tag, &[Node])> {
        self.children().iter().find_map(|c| match c {
            Node::Container { type_name, children } if type_name.is_version() => {
                Some((*type_name, children.as_slice()))
            }
            _ => None,
        })
    }

    /// Declared length stored in this node's header
    pub fn payload_len(&self) -> usize {
        match self {
            Node::Container { children, .. } => 4 + children.iter().map(Node::serialized_len).sum::<usize>(),
            Node::Leaf { data, .. } => data.len(),
        }
    }

    /// Total bytes this node occupies on the wire
    pub fn serialized_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }
}

/// Type name of the container at the start of `bytes`, if any
pub fn peek_form_type(bytes: &[u8]) -> Option<Tag> {
    if bytes.len() < 12 || bytes[..4] != *FORM.as_bytes() {
        return None;
    }
    Tag::from_slice(&bytes[8..12])
}

/// Payload of the first leaf tagged `tag`, located by byte scan.
///
/// No tree is built. A hit whose declared length runs past the end of
/// `bytes` is skipped and scanning continues.
pub fn scan_leaf(bytes: &[u8], tag: Tag) -> Option<&[u8]> {
    scan_signature(bytes, tag.as_bytes()).find_map(|offset| {
        let start = offset + HEADER_SIZE;
        let header = bytes.get(offset + 4..start)?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        bytes.get(start..start.checked_add(length)?)
    })
}

/// Parse one node from the start of `bytes`
pub fn parse(bytes: &[u8]) -> Option<Node> {
    parse_with_options(bytes, &ParseOptions::default())
}

pub fn parse_with_options(bytes: &[u8], options: &ParseOptions) -> Option<Node> {
    let mut reader = ByteReader::new(bytes);
    let node = parse_node(&mut reader, 0, 0, options.max_nesting_depth)?;
    if !reader.is_empty() {
        tracing::warn!(
            offset = reader.position(),
            trailing = reader.remaining(),
            "Trailing bytes after root node"
        );
    }
    Some(node)
}

/// Parse consecutive top-level nodes until the bytes run out or a node is malformed
pub fn parse_sequence(bytes: &[u8]) -> Vec<Node> {
    parse_sequence_with_options(bytes, &ParseOptions::default())
}

pub fn parse_sequence_with_options(bytes: &[u8], options: &ParseOptions) -> Vec<Node> {
    let mut reader = ByteReader::new(bytes);
    let mut nodes = Vec::new();
    while !reader.is_empty() {
        match parse_node(&mut reader, 0, 0, options.max_nesting_depth) {
            Some(node) => nodes.push(node),
            None => {
                tracing::warn!(
                    offset = reader.position(),
                    trailing = reader.remaining(),
                    "Stopping top-level parse at malformed node"
                );
                break;
            }
        }
    }
    nodes
}

/// Parse the node at the reader's cursor.
///
/// On failure the cursor is restored to where the node started.
fn parse_node(reader: &mut ByteReader<'_>, base: usize, depth: u32, max_depth: u32) -> Option<Node> {
    let start = reader.position();
    let offset = base + start;

    let header = match reader.array::<HEADER_SIZE>() {
        Ok(header) => header,
        Err(_) => {
            tracing::warn!(offset, available = reader.remaining(), "Truncated chunk header");
            return None;
        }
    };

    let tag = Tag([header[0], header[1], header[2], header[3]]);
    let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    if !tag.is_valid() {
        tracing::warn!(offset, %tag, "Invalid chunk tag");
        reader.seek(start);
        return None;
    }

    let body = match reader.take(length) {
        Ok(body) => body,
        Err(_) => {
            tracing::warn!(
                offset,
                %tag,
                declared = length,
                available = reader.remaining(),
                "Chunk length exceeds available bytes"
            );
            reader.seek(start);
            return None;
        }
    };

    if tag != FORM {
        return Some(Node::Leaf {
            tag,
            data: body.to_vec(),
        });
    }

    if length < 4 {
        tracing::warn!(offset, declared = length, "Form too short for a type name");
        reader.seek(start);
        return None;
    }

    let type_name = Tag([body[0], body[1], body[2], body[3]]);
    if !type_name.is_valid() {
        tracing::warn!(offset, %type_name, "Invalid form type name");
        reader.seek(start);
        return None;
    }

    if depth >= max_depth {
        tracing::warn!(offset, %type_name, depth, "Form nesting too deep, skipping");
        reader.seek(start);
        return None;
    }

    let children_base = offset + HEADER_SIZE + 4;
    let mut inner = ByteReader::new(&body[4..]);
    let mut children = Vec::new();
    while !inner.is_empty() {
        match parse_node(&mut inner, children_base, depth + 1, max_depth) {
            Some(child) => children.push(child),
            None => {
                tracing::warn!(
                    form = %type_name,
                    offset = children_base + inner.position(),
                    dropped = inner.remaining(),
                    "Stopping child parse early"
                );
                break;
            }
        }
    }

    Some(Node::Container { type_name, children })
}

/// Serialize a node, recomputing every declared length
pub fn serialize(node: &Node) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(node.serialized_len());
    write_node(&mut writer, node);
    writer.into_inner()
}

pub fn serialize_sequence(nodes: &[Node]) -> Vec<u8> {
    let total = nodes.iter().map(Node::serialized_len).sum();
    let mut writer = ByteWriter::with_capacity(total);
    for node in nodes {
        write_node(&mut writer, node);
    }
    writer.into_inner()
}

/// Append a node to an existing writer
pub fn write_node(writer: &mut ByteWriter, node: &Node) {
    match node {
        Node::Leaf { tag, data } => {
            writer.put_bytes(tag.as_bytes());
            writer.put_u32_be(data.len() as u32);
            writer.put_bytes(data);
        }
        Node::Container { type_name, children } => {
            writer.put_bytes(FORM.as_bytes());
            let length_at = writer.len();
            writer.put_u32_be(0);
            writer.put_bytes(type_name.as_bytes());
            for child in children {
                write_node(writer, child);
            }
            let length = writer.len() - length_at - 4;
            writer.patch_u32_be(length_at, length as u32);
        }
    }
}

/// Render a tree as an indented outline
pub fn outline(node: &Node) -> String {
    fn walk(node: &Node, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match node {
            Node::Container { type_name, children } => {
                out.push_str(&format!("{}FORM {} ({} bytes)\n", indent, type_name, node.payload_len()));
                for child in children {
                    walk(child, depth + 1, out);
                }
            }
            Node::Leaf { tag, data } => {
                out.push_str(&format!("{}{} ({} bytes)\n", indent, tag, data.len()));
            }
        }
    }

    let mut out = String::new();
    walk(node, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::form(
            Tag::new(b"TEST"),
            vec![
                Node::leaf(Tag::new(b"DATA"), vec![1, 2, 3]),
                Node::form(Tag::new(b"0001"), vec![Node::leaf(Tag::new(b"NAME"), b"abc\0".to_vec())]),
            ],
        )
    }

    #[test]
    fn test_serialize_lengths() {
        let bytes = serialize(&sample());
        // FORM header + type + DATA(8+3) + FORM(8+4+NAME(8+4))
        assert_eq!(bytes.len(), 12 + 11 + 24);
        assert_eq!(&bytes[4..8], &(bytes.len() as u32 - 8).to_be_bytes());
        assert_eq!(sample().serialized_len(), bytes.len());
    }

    #[test]
    fn test_odd_leaf_not_padded() {
        let bytes = serialize(&sample());
        // DATA payload of 3 bytes is immediately followed by the next FORM
        assert_eq!(&bytes[12..16], b"DATA");
        assert_eq!(&bytes[23..27], b"FORM");
    }

    #[test]
    fn test_round_trip() {
        let bytes = serialize(&sample());
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(serialize(&parsed), bytes);
    }

    #[test]
    fn test_scan_leaf_skips_overlong_hit() {
        let mut bytes = b"NAME\0\0\x01\0".to_vec();
        bytes.extend(serialize(&sample()));
        assert_eq!(scan_leaf(&bytes, Tag::new(b"NAME")), Some(&b"abc\0"[..]));
        assert_eq!(scan_leaf(&bytes, Tag::new(b"NONE")), None);
    }

    #[test]
    fn test_invalid_tag_stops_children() {
        let mut bytes = serialize(&sample());
        // Corrupt the nested form's tag; the outer form keeps DATA only
        bytes[23] = 0x01;
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.children().len(), 1);
        assert!(parsed.children()[0].is_leaf(Tag::new(b"DATA")));
    }

    #[test]
    fn test_length_overrun_returns_none() {
        let mut bytes = serialize(&Node::leaf(Tag::new(b"DATA"), vec![0; 4]));
        bytes[7] = 200;
        assert!(parse(&bytes).is_none());
    }

    #[test]
    fn test_depth_limit() {
        let mut node = Node::leaf(Tag::new(b"LEAF"), vec![]);
        for _ in 0..5 {
            node = Node::form(Tag::new(b"NEST"), vec![node]);
        }
        let bytes = serialize(&node);
        let options = ParseOptions {
            max_nesting_depth: 3,
            ..ParseOptions::default()
        };
        let parsed = parse_with_options(&bytes, &options).unwrap();

        let mut depth = 0;
        let mut current = &parsed;
        while let Some(child) = current.children().first() {
            depth += 1;
            current = child;
        }
        assert_eq!(depth, 2);
    }

    #[test]
    fn test_parse_sequence() {
        let mut bytes = serialize(&Node::leaf(Tag::new(b"AAAA"), vec![1]));
        bytes.extend(serialize(&Node::leaf(Tag::new(b"BBBB"), vec![2, 3])));
        let nodes = parse_sequence(&bytes);
        assert_eq!(nodes.len(), 2);
        assert_eq!(serialize_sequence(&nodes), bytes);
    }

    #[test]
    fn test_peek_form_type() {
        let bytes = serialize(&sample());
        assert_eq!(peek_form_type(&bytes), Some(Tag::new(b"TEST")));
        assert_eq!(peek_form_type(b"RIFF"), None);
    }
}
