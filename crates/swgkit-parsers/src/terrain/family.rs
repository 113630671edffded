// swgkit-parsers/src/terrain/family.rs
//! Family tables: shader, flora, radial, environment and map families

use serde::Serialize;
use swgkit_core::{Result, Rgb};

use super::item::{clamp_unit, read_exact, DATA};
use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag};

pub(crate) const SFAM: Tag = Tag::new(b"SFAM");
pub(crate) const FFAM: Tag = Tag::new(b"FFAM");
pub(crate) const RFAM: Tag = Tag::new(b"RFAM");
pub(crate) const EFAM: Tag = Tag::new(b"EFAM");
pub(crate) const MFAM: Tag = Tag::new(b"MFAM");

/// One family chunk of a group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FamilyEntry<T> {
    Known(T),
    /// Serialized chunk whose layout could not be read exactly
    Opaque(Vec<u8>),
}

impl<T> FamilyEntry<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            FamilyEntry::Known(family) => Some(family),
            FamilyEntry::Opaque(_) => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, FamilyEntry::Opaque(_))
    }

    fn to_nodes(&self, known: impl FnOnce(&T) -> Node) -> Vec<Node> {
        match self {
            FamilyEntry::Known(family) => vec![known(family)],
            FamilyEntry::Opaque(bytes) => iff::parse_sequence(bytes),
        }
    }
}

impl<T> From<T> for FamilyEntry<T> {
    fn from(family: T) -> Self {
        FamilyEntry::Known(family)
    }
}

/// A versioned group of families, in file order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyGroup<T> {
    pub version: Tag,
    pub families: Vec<FamilyEntry<T>>,
}

impl<T> FamilyGroup<T> {
    pub fn new(version: Tag) -> Self {
        Self {
            version,
            families: Vec::new(),
        }
    }

    pub fn push(&mut self, family: T) {
        self.families.push(FamilyEntry::Known(family));
    }

    /// Decoded families, skipping raw entries
    pub fn known(&self) -> impl Iterator<Item = &T> {
        self.families.iter().filter_map(FamilyEntry::known)
    }

    pub fn opaque_count(&self) -> usize {
        self.families.iter().filter(|f| f.is_opaque()).count()
    }
}

/// Common identity of every family kind
pub trait Family {
    fn id(&self) -> i32;
    fn name(&self) -> &str;
}

impl<T: Family> FamilyGroup<T> {
    pub fn find(&self, id: i32) -> Option<&T> {
        self.known().find(|f| f.id() == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&T> {
        self.known().find(|f| f.name() == name)
    }

    /// One past the largest decoded id, `0` when none is decoded
    pub fn next_id(&self) -> i32 {
        self.known().map(Family::id).max().map_or(0, |m| m + 1)
    }
}

/// Families stored as one leaf each
pub(crate) trait LeafFamily: Sized {
    const TAG: Tag;
    /// Group version whose field layout `read` and `write` implement
    const VERSION: Tag;
    fn read(reader: &mut ByteReader<'_>) -> Result<Self>;
    fn write(&self, writer: &mut ByteWriter);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderFamily {
    pub id: i32,
    pub name: String,
    pub surface_properties: String,
    pub color: Rgb,
    pub feather_clamp: f32,
    pub children: Vec<ShaderChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderChild {
    pub shader: String,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloraFamily {
    pub id: i32,
    pub name: String,
    pub color: Rgb,
    pub density: f32,
    pub floats: i32,
    pub children: Vec<FloraChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloraChild {
    pub appearance: String,
    pub weight: f32,
    pub sway: i32,
    pub displacement: f32,
    pub period: f32,
    pub align_to_terrain: i32,
    pub should_scale: i32,
    pub min_scale: f32,
    pub max_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadialFamily {
    pub id: i32,
    pub name: String,
    pub color: Rgb,
    pub density: f32,
    pub children: Vec<RadialChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadialChild {
    pub shader: String,
    pub weight: f32,
    pub distance: f32,
    pub min_width: f32,
    pub max_width: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub maintain_aspect: i32,
    pub sway: i32,
    pub displacement: f32,
    pub period: f32,
}

/// Environment or map family; only the identity header is decoded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexFamily {
    pub id: i32,
    pub name: String,
    pub color: Rgb,
    pub feather_clamp: f32,
    /// Serialized children following the `DATA` leaf
    pub body: Vec<u8>,
}

fn read_rgb(r: &mut ByteReader<'_>) -> Result<Rgb> {
    Ok(Rgb::new(r.u8()?, r.u8()?, r.u8()?))
}

fn write_rgb(w: &mut ByteWriter, c: Rgb) {
    w.put_u8(c.r);
    w.put_u8(c.g);
    w.put_u8(c.b);
}

fn read_children<T>(r: &mut ByteReader<'_>, mut read: impl FnMut(&mut ByteReader<'_>) -> Result<T>) -> Result<Vec<T>> {
    let count = r.i32_le()?.max(0) as usize;
    let mut children = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        children.push(read(r)?);
    }
    Ok(children)
}

impl LeafFamily for ShaderFamily {
    const TAG: Tag = SFAM;
    const VERSION: Tag = Tag::new(b"0006");

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.i32_le()?,
            name: r.cstring()?,
            surface_properties: r.cstring()?,
            color: read_rgb(r)?,
            feather_clamp: clamp_unit(r.f32()?, "feather_clamp"),
            children: read_children(r, |r| {
                Ok(ShaderChild {
                    shader: r.cstring()?,
                    weight: r.f32()?,
                })
            })?,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.put_i32_le(self.id);
        w.put_cstring(&self.name);
        w.put_cstring(&self.surface_properties);
        write_rgb(w, self.color);
        w.put_f32(self.feather_clamp);
        w.put_i32_le(self.children.len() as i32);
        for c in &self.children {
            w.put_cstring(&c.shader);
            w.put_f32(c.weight);
        }
    }
}

impl LeafFamily for FloraFamily {
    const TAG: Tag = FFAM;
    const VERSION: Tag = Tag::new(b"0008");

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.i32_le()?,
            name: r.cstring()?,
            color: read_rgb(r)?,
            density: r.f32()?,
            floats: r.i32_le()?,
            children: read_children(r, |r| {
                Ok(FloraChild {
                    appearance: r.cstring()?,
                    weight: r.f32()?,
                    sway: r.i32_le()?,
                    displacement: r.f32()?,
                    period: r.f32()?,
                    align_to_terrain: r.i32_le()?,
                    should_scale: r.i32_le()?,
                    min_scale: r.f32()?,
                    max_scale: r.f32()?,
                })
            })?,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.put_i32_le(self.id);
        w.put_cstring(&self.name);
        write_rgb(w, self.color);
        w.put_f32(self.density);
        w.put_i32_le(self.floats);
        w.put_i32_le(self.children.len() as i32);
        for c in &self.children {
            w.put_cstring(&c.appearance);
            w.put_f32(c.weight);
            w.put_i32_le(c.sway);
            w.put_f32(c.displacement);
            w.put_f32(c.period);
            w.put_i32_le(c.align_to_terrain);
            w.put_i32_le(c.should_scale);
            w.put_f32(c.min_scale);
            w.put_f32(c.max_scale);
        }
    }
}

impl LeafFamily for RadialFamily {
    const TAG: Tag = RFAM;
    const VERSION: Tag = Tag::new(b"0003");

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.i32_le()?,
            name: r.cstring()?,
            color: read_rgb(r)?,
            density: r.f32()?,
            children: read_children(r, |r| {
                Ok(RadialChild {
                    shader: r.cstring()?,
                    weight: r.f32()?,
                    distance: r.f32()?,
                    min_width: r.f32()?,
                    max_width: r.f32()?,
                    min_height: r.f32()?,
                    max_height: r.f32()?,
                    maintain_aspect: r.i32_le()?,
                    sway: r.i32_le()?,
                    displacement: r.f32()?,
                    period: r.f32()?,
                })
            })?,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.put_i32_le(self.id);
        w.put_cstring(&self.name);
        write_rgb(w, self.color);
        w.put_f32(self.density);
        w.put_i32_le(self.children.len() as i32);
        for c in &self.children {
            w.put_cstring(&c.shader);
            w.put_f32(c.weight);
            w.put_f32(c.distance);
            w.put_f32(c.min_width);
            w.put_f32(c.max_width);
            w.put_f32(c.min_height);
            w.put_f32(c.max_height);
            w.put_i32_le(c.maintain_aspect);
            w.put_i32_le(c.sway);
            w.put_f32(c.displacement);
            w.put_f32(c.period);
        }
    }
}

macro_rules! impl_family {
    ($($ty:ty),*) => {
        $(impl Family for $ty {
            fn id(&self) -> i32 {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_family!(ShaderFamily, FloraFamily, RadialFamily, ComplexFamily);

/// Decode a group of leaf families.
///
/// The group version selects the layout. Families of another version, or
/// whose leaf is not consumed exactly, are kept as raw bytes.
pub(crate) fn decode_leaf_group<T: LeafFamily>(group: &Node) -> FamilyGroup<T> {
    let Some((version, body)) = group.version_form() else {
        tracing::warn!(group = %group.label(), "Family group without version form");
        return FamilyGroup::new(Tag::version(0));
    };
    let layout_known = version == T::VERSION;
    if !layout_known {
        tracing::warn!(
            group = %group.label(),
            %version,
            supported = %T::VERSION,
            "Keeping families of unknown group version as raw bytes"
        );
    }

    let families = body
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let family = match child {
                Node::Leaf { tag, data } if layout_known && *tag == T::TAG => read_exact(data, T::read),
                _ => None,
            };
            family.map(FamilyEntry::Known).unwrap_or_else(|| {
                if layout_known {
                    tracing::warn!(
                        group = %group.label(),
                        index,
                        label = %child.label(),
                        "Keeping unreadable family as raw bytes"
                    );
                }
                FamilyEntry::Opaque(iff::serialize(child))
            })
        })
        .collect();

    FamilyGroup { version, families }
}

pub(crate) fn encode_leaf_group<T: LeafFamily>(group_tag: Tag, group: &FamilyGroup<T>) -> Node {
    let leaves = group
        .families
        .iter()
        .flat_map(|entry| {
            entry.to_nodes(|family| {
                let mut w = ByteWriter::new();
                family.write(&mut w);
                Node::leaf(T::TAG, w.into_inner())
            })
        })
        .collect();
    Node::form(group_tag, vec![Node::form(group.version, leaves)])
}

/// Decode an environment or map group, whose families are containers
pub(crate) fn decode_complex_group(group: &Node, family_tag: Tag, supported: Tag) -> FamilyGroup<ComplexFamily> {
    let Some((version, body)) = group.version_form() else {
        tracing::warn!(group = %group.label(), "Family group without version form");
        return FamilyGroup::new(Tag::version(0));
    };
    let layout_known = version == supported;
    if !layout_known {
        tracing::warn!(
            group = %group.label(),
            %version,
            %supported,
            "Keeping families of unknown group version as raw bytes"
        );
    }

    let families = body
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let family = if layout_known && child.is_form(family_tag) {
                decode_complex_family(child, index)
            } else {
                None
            };
            family.map_or_else(|| FamilyEntry::Opaque(iff::serialize(child)), FamilyEntry::Known)
        })
        .collect();

    FamilyGroup { version, families }
}

fn decode_complex_family(node: &Node, index: usize) -> Option<ComplexFamily> {
    let (data, rest) = match node.children() {
        [Node::Leaf { tag, data }, rest @ ..] if *tag == DATA => (data, rest),
        _ => {
            tracing::warn!(family = %node.label(), index, "Family without leading DATA, keeping raw bytes");
            return None;
        }
    };

    let header = read_exact(data, |r| Ok((r.i32_le()?, r.cstring()?, read_rgb(r)?, r.f32()?)));
    let Some((id, name, color, feather)) = header else {
        tracing::warn!(family = %node.label(), index, "Malformed family header, keeping raw bytes");
        return None;
    };
    Some(ComplexFamily {
        id,
        name,
        color,
        feather_clamp: clamp_unit(feather, "feather_clamp"),
        body: iff::serialize_sequence(rest),
    })
}

pub(crate) fn encode_complex_group(group_tag: Tag, family_tag: Tag, group: &FamilyGroup<ComplexFamily>) -> Node {
    let families = group
        .families
        .iter()
        .flat_map(|entry| {
            entry.to_nodes(|family| {
                let mut w = ByteWriter::new();
                w.put_i32_le(family.id);
                w.put_cstring(&family.name);
                write_rgb(&mut w, family.color);
                w.put_f32(family.feather_clamp);

                let mut children = vec![Node::leaf(DATA, w.into_inner())];
                children.extend(iff::parse_sequence(&family.body));
                Node::form(family_tag, children)
            })
        })
        .collect();
    Node::form(group_tag, vec![Node::form(group.version, families)])
}
