// swgkit-parsers/src/terrain/affector.rs
//! Layer affectors: height, color, shader, flora and environment modifiers
//!
//! Road, river and ribbon affectors carry spline data and are kept opaque,
//! along with every kind not listed here.

use serde::Serialize;
use swgkit_core::{Result, Rgb};

use super::item::{build_item, clamp_unit, ItemHeader, ItemParts, OpaqueItem};
use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{Node, Tag};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightConstant {
    pub header: Option<ItemHeader>,
    pub operation: i32,
    pub height: f32,
}

/// Field order of a fractal height affector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FractalLayout {
    /// `0002`: operation, height, fractal id
    OperationFirst,
    /// `0003`: fractal id, operation, height
    FractalFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightFractal {
    pub header: Option<ItemHeader>,
    pub layout: FractalLayout,
    pub fractal_id: i32,
    pub operation: i32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightTerrace {
    pub header: Option<ItemHeader>,
    pub fraction: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorConstant {
    pub header: Option<ItemHeader>,
    pub family_id: i32,
    pub operation: i32,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRampHeight {
    pub header: Option<ItemHeader>,
    pub operation: i32,
    pub low: f32,
    pub high: f32,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRampFractal {
    pub header: Option<ItemHeader>,
    pub fractal_id: i32,
    pub operation: i32,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderConstant {
    pub header: Option<ItemHeader>,
    pub family_id: i32,
    pub use_feather_override: bool,
    pub feather_override: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderReplace {
    pub header: Option<ItemHeader>,
    pub source_family: i32,
    pub dest_family: i32,
    pub use_feather_override: bool,
    pub feather_override: f32,
}

/// Which flora table a flora affector targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FloraCategory {
    /// `AFSC`
    StaticCollidable,
    /// `AFSN`
    StaticNonCollidable,
    /// `AFDN`
    DynamicNear,
    /// `AFDF`
    DynamicFar,
}

impl FloraCategory {
    pub fn kind(self) -> Tag {
        match self {
            FloraCategory::StaticCollidable => Tag::new(b"AFSC"),
            FloraCategory::StaticNonCollidable => Tag::new(b"AFSN"),
            FloraCategory::DynamicNear => Tag::new(b"AFDN"),
            FloraCategory::DynamicFar => Tag::new(b"AFDF"),
        }
    }

    fn version(self) -> Tag {
        match self {
            FloraCategory::StaticCollidable | FloraCategory::StaticNonCollidable => Tag::new(b"0004"),
            FloraCategory::DynamicNear | FloraCategory::DynamicFar => Tag::new(b"0002"),
        }
    }

    fn from_parts(kind: Tag, version: Tag) -> Option<Self> {
        let category = match kind.as_bytes() {
            b"AFSC" => FloraCategory::StaticCollidable,
            b"AFSN" => FloraCategory::StaticNonCollidable,
            b"AFDN" => FloraCategory::DynamicNear,
            b"AFDF" => FloraCategory::DynamicFar,
            _ => return None,
        };
        (category.version() == version).then_some(category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flora {
    pub header: Option<ItemHeader>,
    pub category: FloraCategory,
    pub family_id: i32,
    pub operation: i32,
    pub remove_all: bool,
    pub density_override: bool,
    pub density: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Environment {
    pub header: Option<ItemHeader>,
    pub family_id: i32,
    pub use_feather_override: bool,
    pub feather_override: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passable {
    pub header: Option<ItemHeader>,
    pub passable: bool,
    pub feather_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Affector {
    HeightConstant(HeightConstant),
    HeightFractal(HeightFractal),
    HeightTerrace(HeightTerrace),
    ColorConstant(ColorConstant),
    ColorRampHeight(ColorRampHeight),
    ColorRampFractal(ColorRampFractal),
    ShaderConstant(ShaderConstant),
    ShaderReplace(ShaderReplace),
    Flora(Flora),
    Environment(Environment),
    Exclude(Option<ItemHeader>),
    Passable(Passable),
    Opaque(OpaqueItem),
}

fn read_flag(r: &mut ByteReader<'_>) -> Result<bool> {
    Ok(r.i32_le()? != 0)
}

fn read_rgb(r: &mut ByteReader<'_>) -> Result<Rgb> {
    Ok(Rgb::new(r.u8()?, r.u8()?, r.u8()?))
}

impl Affector {
    pub fn kind(&self) -> Tag {
        Tag::new(match self {
            Affector::HeightConstant(_) => b"AHCN",
            Affector::HeightFractal(_) => b"AHFR",
            Affector::HeightTerrace(_) => b"AHTR",
            Affector::ColorConstant(_) => b"ACCN",
            Affector::ColorRampHeight(_) => b"ACRH",
            Affector::ColorRampFractal(_) => b"ACRF",
            Affector::ShaderConstant(_) => b"ASCN",
            Affector::ShaderReplace(_) => b"ASRP",
            Affector::Flora(a) => return a.category.kind(),
            Affector::Environment(_) => b"AENV",
            Affector::Exclude(_) => b"AEXC",
            Affector::Passable(_) => b"APAS",
            Affector::Opaque(item) => return item.kind,
        })
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Affector::Opaque(_))
    }

    pub(crate) fn decode(node: &Node) -> Self {
        ItemParts::split(node)
            .and_then(|parts| Self::decode_known(&parts))
            .unwrap_or_else(|| Affector::Opaque(OpaqueItem::from_node(node)))
    }

    fn decode_known(parts: &ItemParts<'_>) -> Option<Self> {
        let header = parts.header.clone();

        if let Some(category) = FloraCategory::from_parts(parts.kind, parts.version) {
            return parts
                .read(|r| {
                    Ok(Flora {
                        header,
                        category,
                        family_id: r.i32_le()?,
                        operation: r.i32_le()?,
                        remove_all: read_flag(r)?,
                        density_override: read_flag(r)?,
                        density: r.f32()?,
                    })
                })
                .map(Affector::Flora);
        }

        match (parts.kind.as_bytes(), parts.version.as_bytes()) {
            (b"AHCN", b"0000") => parts
                .read(|r| {
                    Ok(HeightConstant {
                        header,
                        operation: r.i32_le()?,
                        height: r.f32()?,
                    })
                })
                .map(Affector::HeightConstant),
            (b"AHFR", b"0002") => parts
                .read(|r| {
                    let operation = r.i32_le()?;
                    let height = r.f32()?;
                    Ok(HeightFractal {
                        header,
                        layout: FractalLayout::OperationFirst,
                        operation,
                        height,
                        fractal_id: r.i32_le()?,
                    })
                })
                .map(Affector::HeightFractal),
            (b"AHFR", b"0003") => parts
                .read(|r| {
                    Ok(HeightFractal {
                        header,
                        layout: FractalLayout::FractalFirst,
                        fractal_id: r.i32_le()?,
                        operation: r.i32_le()?,
                        height: r.f32()?,
                    })
                })
                .map(Affector::HeightFractal),
            (b"AHTR", b"0004") => parts
                .read(|r| {
                    Ok(HeightTerrace {
                        header,
                        fraction: r.f32()?,
                        height: r.f32()?,
                    })
                })
                .map(Affector::HeightTerrace),
            (b"ACCN", b"0000") => parts
                .read(|r| {
                    Ok(ColorConstant {
                        header,
                        family_id: r.i32_le()?,
                        operation: r.i32_le()?,
                        color: read_rgb(r)?,
                    })
                })
                .map(Affector::ColorConstant),
            (b"ACRH", b"0000") => parts
                .read(|r| {
                    Ok(ColorRampHeight {
                        header,
                        operation: r.i32_le()?,
                        low: r.f32()?,
                        high: r.f32()?,
                        image: r.cstring()?,
                    })
                })
                .map(Affector::ColorRampHeight),
            (b"ACRF", b"0000") => parts
                .read(|r| {
                    Ok(ColorRampFractal {
                        header,
                        fractal_id: r.i32_le()?,
                        operation: r.i32_le()?,
                        image: r.cstring()?,
                    })
                })
                .map(Affector::ColorRampFractal),
            (b"ASCN", b"0001") => parts
                .read(|r| {
                    Ok(ShaderConstant {
                        header,
                        family_id: r.i32_le()?,
                        use_feather_override: read_flag(r)?,
                        feather_override: clamp_unit(r.f32()?, "feather_override"),
                    })
                })
                .map(Affector::ShaderConstant),
            (b"ASRP", b"0001") => parts
                .read(|r| {
                    Ok(ShaderReplace {
                        header,
                        source_family: r.i32_le()?,
                        dest_family: r.i32_le()?,
                        use_feather_override: read_flag(r)?,
                        feather_override: clamp_unit(r.f32()?, "feather_override"),
                    })
                })
                .map(Affector::ShaderReplace),
            (b"AENV", b"0000") => parts
                .read(|r| {
                    Ok(Environment {
                        header,
                        family_id: r.i32_le()?,
                        use_feather_override: read_flag(r)?,
                        feather_override: clamp_unit(r.f32()?, "feather_override"),
                    })
                })
                .map(Affector::Environment),
            (b"AEXC", b"0000") => parts.read(|_| Ok(Affector::Exclude(header))),
            (b"APAS", b"0000") => parts
                .read(|r| {
                    Ok(Passable {
                        header,
                        passable: r.bool()?,
                        feather_threshold: clamp_unit(r.f32()?, "feather_threshold"),
                    })
                })
                .map(Affector::Passable),
            _ => {
                tracing::debug!(kind = %parts.kind, version = %parts.version, "Keeping affector as raw bytes");
                None
            }
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut w = ByteWriter::new();
        let (version, header): (Tag, &Option<ItemHeader>) = match self {
            Affector::HeightConstant(a) => {
                w.put_i32_le(a.operation);
                w.put_f32(a.height);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::HeightFractal(a) => match a.layout {
                FractalLayout::OperationFirst => {
                    w.put_i32_le(a.operation);
                    w.put_f32(a.height);
                    w.put_i32_le(a.fractal_id);
                    (Tag::new(b"0002"), &a.header)
                }
                FractalLayout::FractalFirst => {
                    w.put_i32_le(a.fractal_id);
                    w.put_i32_le(a.operation);
                    w.put_f32(a.height);
                    (Tag::new(b"0003"), &a.header)
                }
            },
            Affector::HeightTerrace(a) => {
                w.put_f32(a.fraction);
                w.put_f32(a.height);
                (Tag::new(b"0004"), &a.header)
            }
            Affector::ColorConstant(a) => {
                w.put_i32_le(a.family_id);
                w.put_i32_le(a.operation);
                w.put_u8(a.color.r);
                w.put_u8(a.color.g);
                w.put_u8(a.color.b);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::ColorRampHeight(a) => {
                w.put_i32_le(a.operation);
                w.put_f32(a.low);
                w.put_f32(a.high);
                w.put_cstring(&a.image);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::ColorRampFractal(a) => {
                w.put_i32_le(a.fractal_id);
                w.put_i32_le(a.operation);
                w.put_cstring(&a.image);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::ShaderConstant(a) => {
                w.put_i32_le(a.family_id);
                w.put_i32_le(i32::from(a.use_feather_override));
                w.put_f32(a.feather_override);
                (Tag::new(b"0001"), &a.header)
            }
            Affector::ShaderReplace(a) => {
                w.put_i32_le(a.source_family);
                w.put_i32_le(a.dest_family);
                w.put_i32_le(i32::from(a.use_feather_override));
                w.put_f32(a.feather_override);
                (Tag::new(b"0001"), &a.header)
            }
            Affector::Flora(a) => {
                w.put_i32_le(a.family_id);
                w.put_i32_le(a.operation);
                w.put_i32_le(i32::from(a.remove_all));
                w.put_i32_le(i32::from(a.density_override));
                w.put_f32(a.density);
                (a.category.version(), &a.header)
            }
            Affector::Environment(a) => {
                w.put_i32_le(a.family_id);
                w.put_i32_le(i32::from(a.use_feather_override));
                w.put_f32(a.feather_override);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::Exclude(header) => (Tag::new(b"0000"), header),
            Affector::Passable(a) => {
                w.put_bool(a.passable);
                w.put_f32(a.feather_threshold);
                (Tag::new(b"0000"), &a.header)
            }
            Affector::Opaque(item) => return item.to_node(),
        };
        build_item(self.kind(), version, header.as_ref(), w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(affector: Affector) {
        let node = affector.to_node();
        let decoded = Affector::decode(&node);
        assert_eq!(decoded, affector);
        assert_eq!(decoded.to_node(), node);
    }

    #[test]
    fn test_fractal_layouts_differ() {
        let a = HeightFractal {
            header: None,
            layout: FractalLayout::OperationFirst,
            fractal_id: 7,
            operation: 1,
            height: 2.0,
        };
        let b = HeightFractal {
            layout: FractalLayout::FractalFirst,
            ..a.clone()
        };
        let data_a = Affector::HeightFractal(a.clone()).to_node();
        let data_b = Affector::HeightFractal(b.clone()).to_node();
        assert_ne!(data_a, data_b);
        round_trip(Affector::HeightFractal(a));
        round_trip(Affector::HeightFractal(b));
    }

    #[test]
    fn test_known_affectors_round_trip() {
        let header = Some(ItemHeader::new("affector"));
        round_trip(Affector::HeightConstant(HeightConstant {
            header: header.clone(),
            operation: 0,
            height: 12.5,
        }));
        round_trip(Affector::ColorRampHeight(ColorRampHeight {
            header: header.clone(),
            operation: 2,
            low: -5.0,
            high: 40.0,
            image: "terrain/ramp.tga".into(),
        }));
        round_trip(Affector::Flora(Flora {
            header: header.clone(),
            category: FloraCategory::DynamicFar,
            family_id: 3,
            operation: 1,
            remove_all: false,
            density_override: true,
            density: 0.4,
        }));
        round_trip(Affector::Exclude(header));
    }

    #[test]
    fn test_flora_version_must_match_category() {
        let node = build_item(Tag::new(b"AFSC"), Tag::new(b"0002"), None, vec![0; 20]);
        assert!(Affector::decode(&node).is_opaque());
    }

    #[test]
    fn test_road_is_opaque() {
        let node = build_item(Tag::new(b"AROA"), Tag::new(b"0005"), Some(&ItemHeader::new("road")), vec![9; 41]);
        let decoded = Affector::decode(&node);
        assert!(decoded.is_opaque());
        assert_eq!(decoded.kind(), Tag::new(b"AROA"));
        assert_eq!(decoded.to_node(), node);
    }
}
