// swgkit-parsers/src/terrain/layer.rs
//! Terrain layers and their nested items
//!
//! ```text
//! FORM LAYR
//! └── FORM 0003
//!     ├── FORM IHDR / FORM 0001 / DATA    enabled, description
//!     ├── ADTA                            inversion flags, expanded, notes
//!     ├── FORM B***  boundaries
//!     ├── FORM F***  filters
//!     ├── FORM A***  affectors
//!     └── FORM LAYR  child layers
//! ```

use serde::Serialize;

use super::affector::Affector;
use super::boundary::Boundary;
use super::item::{read_exact, ItemHeader, OpaqueItem, IHDR};
use crate::binary::ByteWriter;
use crate::iff::{self, Node, Tag};

pub(crate) const LAYR: Tag = Tag::new(b"LAYR");
const LAYR_VERSION: Tag = Tag::new(b"0003");
const ADTA: Tag = Tag::new(b"ADTA");

/// A filter restricting where a layer applies; kept as raw bytes
pub type Filter = OpaqueItem;

/// Editor-facing settings stored in a layer's `ADTA` leaf
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LayerAttributes {
    pub invert_boundaries: bool,
    pub invert_filters: bool,
    pub expanded: bool,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub version: Tag,
    pub header: Option<ItemHeader>,
    pub attributes: Option<LayerAttributes>,
    pub boundaries: Vec<Boundary>,
    pub filters: Vec<Filter>,
    pub affectors: Vec<Affector>,
    /// Serialized chunks that are neither items nor a readable header,
    /// written after the affectors
    pub extra: Vec<u8>,
    pub children: Vec<Layer>,
}

impl Layer {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            version: LAYR_VERSION,
            header: Some(ItemHeader::new(description)),
            attributes: Some(LayerAttributes::default()),
            boundaries: Vec::new(),
            filters: Vec::new(),
            affectors: Vec::new(),
            extra: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        self.header.as_ref().map_or("", |h| h.name.as_str())
    }

    /// Layers without a header are treated as enabled
    pub fn enabled(&self) -> bool {
        self.header.as_ref().map_or(true, |h| h.enabled)
    }

    pub fn notes(&self) -> &str {
        self.attributes.as_ref().map_or("", |a| a.notes.as_str())
    }

    /// Depth-first visit of this layer and all descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Layer, usize)) {
        fn inner<'a>(layer: &'a Layer, depth: usize, visit: &mut impl FnMut(&'a Layer, usize)) {
            visit(layer, depth);
            for child in &layer.children {
                inner(child, depth + 1, visit);
            }
        }
        inner(self, 0, visit);
    }

    /// Number of layers in this subtree, this one included
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Layer::count).sum::<usize>()
    }
}

/// Decode a layer. Header and attributes are only set when present and
/// readable; every other unrecognized chunk lands in `extra`.
pub(crate) fn decode_layer(node: &Node, depth: usize) -> Layer {
    let mut layer = Layer {
        header: None,
        attributes: None,
        ..Layer::new("")
    };

    let Some((version, body)) = node.version_form() else {
        tracing::warn!(depth, "Layer without version form, keeping children as raw bytes");
        layer.extra = iff::serialize_sequence(node.children());
        return layer;
    };
    if version != LAYR_VERSION {
        tracing::warn!(depth, %version, "Unexpected layer version");
    }
    layer.version = version;

    let mut extra = Vec::new();
    for child in body {
        match child {
            Node::Container { type_name, .. } if *type_name == IHDR && layer.header.is_none() => {
                match ItemHeader::decode(child) {
                    Some(header) => layer.header = Some(header),
                    None => {
                        tracing::warn!(depth, "Malformed layer header, keeping raw bytes");
                        extra.push(child);
                    }
                }
            }
            Node::Leaf { tag, data } if *tag == ADTA && layer.attributes.is_none() => match decode_attributes(data) {
                Some(attributes) => layer.attributes = Some(attributes),
                None => {
                    tracing::warn!(depth, "Malformed layer attributes, keeping raw bytes");
                    extra.push(child);
                }
            },
            Node::Container { type_name, .. } if *type_name == LAYR => {
                layer.children.push(decode_layer(child, depth + 1));
            }
            Node::Container { type_name, .. } => match type_name.first_char() {
                'B' => layer.boundaries.push(Boundary::decode(child)),
                'F' => layer.filters.push(OpaqueItem::from_node(child)),
                'A' => layer.affectors.push(Affector::decode(child)),
                _ => {
                    tracing::warn!(depth, kind = %type_name, "Keeping unknown layer item as raw bytes");
                    extra.push(child);
                }
            },
            Node::Leaf { tag, .. } => {
                tracing::warn!(depth, %tag, "Keeping unknown layer chunk as raw bytes");
                extra.push(child);
            }
        }
    }
    layer.extra = extra.into_iter().flat_map(iff::serialize).collect();

    layer
}

fn decode_attributes(data: &[u8]) -> Option<LayerAttributes> {
    read_exact(data, |r| {
        Ok(LayerAttributes {
            invert_boundaries: r.i32_le()? != 0,
            invert_filters: r.i32_le()? != 0,
            expanded: r.i32_le()? != 0,
            notes: r.cstring()?,
        })
    })
}

fn encode_attributes(attributes: &LayerAttributes) -> Node {
    let mut w = ByteWriter::with_capacity(13 + attributes.notes.len());
    w.put_i32_le(i32::from(attributes.invert_boundaries));
    w.put_i32_le(i32::from(attributes.invert_filters));
    w.put_i32_le(i32::from(attributes.expanded));
    w.put_cstring(&attributes.notes);
    Node::leaf(ADTA, w.into_inner())
}

/// Encode a layer; children are written header and attributes first, then
/// boundaries, filters, affectors, retained chunks and child layers
pub(crate) fn encode_layer(layer: &Layer) -> Node {
    let mut children = Vec::with_capacity(
        2 + layer.boundaries.len() + layer.filters.len() + layer.affectors.len() + layer.children.len(),
    );
    children.extend(layer.header.as_ref().map(ItemHeader::to_node));
    children.extend(layer.attributes.as_ref().map(encode_attributes));
    children.extend(layer.boundaries.iter().map(Boundary::to_node));
    children.extend(layer.filters.iter().map(OpaqueItem::to_node));
    children.extend(layer.affectors.iter().map(Affector::to_node));
    children.extend(iff::parse_sequence(&layer.extra));
    children.extend(layer.children.iter().map(encode_layer));

    Node::form(LAYR, vec![Node::form(layer.version, children)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::affector::HeightConstant;
    use crate::terrain::item::build_item;

    fn nested() -> Layer {
        let mut root = Layer::new("root");
        if let Some(attributes) = root.attributes.as_mut() {
            attributes.notes = "outer".into();
        }
        root.affectors.push(Affector::HeightConstant(HeightConstant {
            header: Some(ItemHeader::new("flatten")),
            operation: 0,
            height: 4.0,
        }));
        root.filters.push(OpaqueItem::from_node(&build_item(
            Tag::new(b"FHGT"),
            Tag::new(b"0002"),
            Some(&ItemHeader::new("height")),
            vec![0; 12],
        )));

        let mut child = Layer::new("child");
        child.children.push(Layer::new("grandchild"));
        root.children.push(child);
        root
    }

    #[test]
    fn test_nested_round_trip() {
        let node = encode_layer(&nested());
        let decoded = decode_layer(&node, 0);
        assert_eq!(decoded, nested());
        assert_eq!(encode_layer(&decoded), node);
    }

    #[test]
    fn test_walk_and_count() {
        let layer = nested();
        let mut seen = Vec::new();
        layer.walk(&mut |l, depth| seen.push((l.description().to_string(), depth)));
        assert_eq!(
            seen,
            vec![("root".to_string(), 0), ("child".to_string(), 1), ("grandchild".to_string(), 2)]
        );
        assert_eq!(layer.count(), 3);
    }

    #[test]
    fn test_bare_layer_gains_nothing() {
        let node = Node::form(LAYR, vec![Node::form(LAYR_VERSION, vec![])]);
        let decoded = decode_layer(&node, 0);
        assert!(decoded.header.is_none());
        assert!(decoded.attributes.is_none());
        assert_eq!(decoded.description(), "");
        assert_eq!(encode_layer(&decoded), node);
    }

    #[test]
    fn test_unknown_chunks_written_back() {
        let node = Node::form(
            LAYR,
            vec![Node::form(
                LAYR_VERSION,
                vec![
                    ItemHeader::new("kept").to_node(),
                    Node::leaf(ADTA, vec![1, 0]),
                    Node::leaf(Tag::new(b"XTRA"), vec![7, 7]),
                    Node::form(Tag::new(b"QQQQ"), vec![]),
                    Node::form(LAYR, vec![Node::form(LAYR_VERSION, vec![])]),
                ],
            )],
        );
        let decoded = decode_layer(&node, 0);
        assert_eq!(decoded.description(), "kept");
        assert!(decoded.attributes.is_none());
        assert_eq!(iff::parse_sequence(&decoded.extra).len(), 3);
        assert_eq!(decoded.children.len(), 1);
        assert_eq!(encode_layer(&decoded), node);
    }
}
