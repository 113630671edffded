// swgkit-parsers/src/interior.rs
//! Interior object placement codec
//!
//! ```text
//! FORM INLY
//! └── FORM 0000
//!     ├── TMPL   count:i32, template paths
//!     ├── CELS   count:i32, cell names
//!     └── XFRM*  template:u16, cell:u16, 12 × f32 transform (52 bytes)
//! ```
//!
//! Placements are located by scanning for the `XFRM` header with its fixed
//! length instead of building a tree.

use serde::Serialize;
use swgkit_core::{Error, Quat, Result, Transform, Vec3};

use crate::binary::{scan_signature, ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag, HEADER_SIZE};
use crate::traits::{Codec, ParseOptions};

/// Root form type of an interior layout
pub const INLY: Tag = Tag::new(b"INLY");
const INLY_VERSION: Tag = Tag::new(b"0000");
const TMPL: Tag = Tag::new(b"TMPL");
const CELS: Tag = Tag::new(b"CELS");
const XFRM: Tag = Tag::new(b"XFRM");

/// Payload size of one placement leaf
pub const PLACEMENT_SIZE: usize = 52;

/// `XFRM` tag followed by its big-endian length
const PLACEMENT_SIGNATURE: [u8; 8] = *b"XFRM\0\0\0\x34";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub template_index: u16,
    pub cell_index: u16,
    pub transform: Transform,
}

impl Placement {
    pub fn rotation(&self) -> Quat {
        self.transform.quaternion()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    fn read(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        Ok(Self {
            template_index: r.u16_le()?,
            cell_index: r.u16_le()?,
            transform: Transform::from_floats(&r.floats::<12>()?),
        })
    }

    fn to_node(&self) -> Node {
        let mut w = ByteWriter::with_capacity(PLACEMENT_SIZE);
        w.put_u16_le(self.template_index);
        w.put_u16_le(self.cell_index);
        w.put_floats(&self.transform.to_floats());
        Node::leaf(XFRM, w.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InteriorLayout {
    pub templates: Vec<String>,
    pub cells: Vec<String>,
    pub placements: Vec<Placement>,
}

impl InteriorLayout {
    pub fn template_of(&self, placement: &Placement) -> Option<&str> {
        self.templates.get(usize::from(placement.template_index)).map(String::as_str)
    }

    pub fn cell_of(&self, placement: &Placement) -> Option<&str> {
        self.cells.get(usize::from(placement.cell_index)).map(String::as_str)
    }

    /// Placements inside the named cell
    pub fn placements_in<'a>(&'a self, cell: &'a str) -> impl Iterator<Item = &'a Placement> + 'a {
        self.placements.iter().filter(move |p| self.cell_of(p) == Some(cell))
    }
}

pub struct InteriorCodec;

impl Codec for InteriorCodec {
    type Model = InteriorLayout;

    const ROOT: Option<Tag> = Some(INLY);

    fn name(&self) -> &'static str {
        "Interior Layout"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ilf"]
    }

    fn decode_with_options(&self, bytes: &[u8], _options: &ParseOptions) -> Result<InteriorLayout> {
        decode(bytes)
    }

    fn encode(&self, model: &InteriorLayout) -> Vec<u8> {
        encode(model)
    }
}

/// Counted list of null-terminated names; truncation keeps what was read
fn read_names(data: &[u8], tag: Tag) -> Vec<String> {
    let mut r = ByteReader::new(data);
    let count = r.i32_le().map_or(0, |n| n.max(0) as usize);
    let mut names = Vec::with_capacity(count.min(data.len()));
    for _ in 0..count {
        match r.cstring() {
            Ok(name) => names.push(name),
            Err(_) => {
                tracing::warn!(%tag, declared = count, read = names.len(), "Truncated name table");
                break;
            }
        }
    }
    names
}

fn names_node(tag: Tag, names: &[String]) -> Node {
    let mut w = ByteWriter::new();
    w.put_i32_le(names.len() as i32);
    for name in names {
        w.put_cstring(name);
    }
    Node::leaf(tag, w.into_inner())
}

pub fn decode(bytes: &[u8]) -> Result<InteriorLayout> {
    match iff::peek_form_type(bytes) {
        Some(t) if t == INLY => {}
        other => {
            return Err(Error::unexpected_form(
                INLY.to_string(),
                other.map_or_else(|| "no container".to_string(), |t| t.to_string()),
            ))
        }
    }

    let templates = iff::scan_leaf(bytes, TMPL)
        .map(|data| read_names(data, TMPL))
        .ok_or_else(|| Error::missing_chunk(TMPL.to_string()))?;
    let cells = match iff::scan_leaf(bytes, CELS) {
        Some(data) => read_names(data, CELS),
        None => {
            tracing::warn!("Interior layout without cell table");
            Vec::new()
        }
    };

    let placements: Vec<Placement> = scan_signature(bytes, &PLACEMENT_SIGNATURE)
        .filter_map(|offset| {
            let start = offset + HEADER_SIZE;
            let Some(data) = bytes.get(start..start + PLACEMENT_SIZE) else {
                tracing::warn!(offset, "Truncated placement at end of file");
                return None;
            };
            Placement::read(data).ok()
        })
        .collect();

    let layout = InteriorLayout {
        templates,
        cells,
        placements,
    };
    let dangling = layout
        .placements
        .iter()
        .filter(|p| layout.template_of(p).is_none() || layout.cell_of(p).is_none())
        .count();
    if dangling > 0 {
        tracing::warn!(dangling, "Placements reference missing templates or cells");
    }

    tracing::debug!(
        templates = layout.templates.len(),
        cells = layout.cells.len(),
        placements = layout.placements.len(),
        "Decoded interior layout"
    );
    Ok(layout)
}

pub fn encode(layout: &InteriorLayout) -> Vec<u8> {
    let mut children = Vec::with_capacity(layout.placements.len() + 2);
    children.push(names_node(TMPL, &layout.templates));
    children.push(names_node(CELS, &layout.cells));
    children.extend(layout.placements.iter().map(Placement::to_node));
    iff::serialize(&Node::form(INLY, vec![Node::form(INLY_VERSION, children)]))
}
