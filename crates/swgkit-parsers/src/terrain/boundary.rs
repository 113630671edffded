// swgkit-parsers/src/terrain/boundary.rs
//! Layer boundaries: the region a layer applies to

use serde::Serialize;
use swgkit_core::Result;

use super::item::{build_item, Feather, ItemHeader, ItemParts, OpaqueItem};
use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{Node, Tag};

const BCIR: Tag = Tag::new(b"BCIR");
const BREC: Tag = Tag::new(b"BREC");
const BPOL: Tag = Tag::new(b"BPOL");
const BPLN: Tag = Tag::new(b"BPLN");

/// Water plane carried by newer rectangle and polygon boundaries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalWater {
    pub enabled: bool,
    pub height: f32,
    pub shader_size: f32,
    pub shader: String,
}

impl LocalWater {
    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            enabled: r.i32_le()? != 0,
            height: r.f32()?,
            shader_size: r.f32()?,
            shader: r.cstring()?,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.put_i32_le(i32::from(self.enabled));
        w.put_f32(self.height);
        w.put_f32(self.shader_size);
        w.put_cstring(&self.shader);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub header: Option<ItemHeader>,
    pub center_x: f32,
    pub center_z: f32,
    pub radius: f32,
    /// Absent in version 0001
    pub feather: Option<Feather>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rectangle {
    pub header: Option<ItemHeader>,
    pub x0: f32,
    pub z0: f32,
    pub x1: f32,
    pub z1: f32,
    pub feather: Feather,
    /// Present from version 0003
    pub water: Option<LocalWater>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    pub header: Option<ItemHeader>,
    pub points: Vec<[f32; 2]>,
    pub feather: Feather,
    /// Present from version 0007
    pub water: Option<LocalWater>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub header: Option<ItemHeader>,
    pub points: Vec<[f32; 2]>,
    pub feather: Feather,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Boundary {
    Circle(Circle),
    Rectangle(Rectangle),
    Polygon(Polygon),
    Polyline(Polyline),
    Opaque(OpaqueItem),
}

fn read_points(r: &mut ByteReader<'_>) -> Result<Vec<[f32; 2]>> {
    let count = r.i32_le()?.max(0) as usize;
    let mut points = Vec::with_capacity(count.min(r.remaining() / 8));
    for _ in 0..count {
        points.push(r.floats::<2>()?);
    }
    Ok(points)
}

fn write_points(w: &mut ByteWriter, points: &[[f32; 2]]) {
    w.put_i32_le(points.len() as i32);
    for p in points {
        w.put_floats(p);
    }
}

impl Boundary {
    pub fn kind(&self) -> Tag {
        match self {
            Boundary::Circle(_) => BCIR,
            Boundary::Rectangle(_) => BREC,
            Boundary::Polygon(_) => BPOL,
            Boundary::Polyline(_) => BPLN,
            Boundary::Opaque(item) => item.kind,
        }
    }

    pub fn header(&self) -> Option<&ItemHeader> {
        match self {
            Boundary::Circle(b) => b.header.as_ref(),
            Boundary::Rectangle(b) => b.header.as_ref(),
            Boundary::Polygon(b) => b.header.as_ref(),
            Boundary::Polyline(b) => b.header.as_ref(),
            Boundary::Opaque(_) => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Boundary::Opaque(_))
    }

    pub(crate) fn decode(node: &Node) -> Self {
        ItemParts::split(node)
            .and_then(|parts| Self::decode_known(&parts))
            .unwrap_or_else(|| Boundary::Opaque(OpaqueItem::from_node(node)))
    }

    fn decode_known(parts: &ItemParts<'_>) -> Option<Self> {
        let header = parts.header.clone();
        match (parts.kind.as_bytes(), parts.version.as_bytes()) {
            (b"BCIR", b"0001" | b"0002") => {
                let feathered = parts.version == Tag::new(b"0002");
                parts
                    .read(|r| {
                        Ok(Circle {
                            header,
                            center_x: r.f32()?,
                            center_z: r.f32()?,
                            radius: r.f32()?,
                            feather: if feathered { Some(Feather::read(r)?) } else { None },
                        })
                    })
                    .map(Boundary::Circle)
            }
            (b"BREC", b"0002" | b"0003") => {
                let water = parts.version == Tag::new(b"0003");
                parts
                    .read(|r| {
                        Ok(Rectangle {
                            header,
                            x0: r.f32()?,
                            z0: r.f32()?,
                            x1: r.f32()?,
                            z1: r.f32()?,
                            feather: Feather::read(r)?,
                            water: if water { Some(LocalWater::read(r)?) } else { None },
                        })
                    })
                    .map(Boundary::Rectangle)
            }
            (b"BPOL", b"0006" | b"0007") => {
                let water = parts.version == Tag::new(b"0007");
                parts
                    .read(|r| {
                        Ok(Polygon {
                            header,
                            points: read_points(r)?,
                            feather: Feather::read(r)?,
                            water: if water { Some(LocalWater::read(r)?) } else { None },
                        })
                    })
                    .map(Boundary::Polygon)
            }
            (b"BPLN", b"0001") => parts
                .read(|r| {
                    Ok(Polyline {
                        header,
                        points: read_points(r)?,
                        feather: Feather::read(r)?,
                        width: r.f32()?,
                    })
                })
                .map(Boundary::Polyline),
            _ => {
                tracing::debug!(kind = %parts.kind, version = %parts.version, "Unrecognized boundary layout");
                None
            }
        }
    }

    pub(crate) fn to_node(&self) -> Node {
        let mut w = ByteWriter::new();
        let (version, header) = match self {
            Boundary::Circle(b) => {
                w.put_floats(&[b.center_x, b.center_z, b.radius]);
                if let Some(feather) = &b.feather {
                    feather.write(&mut w);
                }
                (if b.feather.is_some() { b"0002" } else { b"0001" }, &b.header)
            }
            Boundary::Rectangle(b) => {
                w.put_floats(&[b.x0, b.z0, b.x1, b.z1]);
                b.feather.write(&mut w);
                if let Some(water) = &b.water {
                    water.write(&mut w);
                }
                (if b.water.is_some() { b"0003" } else { b"0002" }, &b.header)
            }
            Boundary::Polygon(b) => {
                write_points(&mut w, &b.points);
                b.feather.write(&mut w);
                if let Some(water) = &b.water {
                    water.write(&mut w);
                }
                (if b.water.is_some() { b"0007" } else { b"0006" }, &b.header)
            }
            Boundary::Polyline(b) => {
                write_points(&mut w, &b.points);
                b.feather.write(&mut w);
                w.put_f32(b.width);
                (b"0001", &b.header)
            }
            Boundary::Opaque(item) => return item.to_node(),
        };
        build_item(self.kind(), Tag::new(version), header.as_ref(), w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(boundary: Boundary) -> Boundary {
        let node = boundary.to_node();
        let decoded = Boundary::decode(&node);
        assert_eq!(decoded.to_node(), node);
        decoded
    }

    #[test]
    fn test_circle_versions() {
        let plain = Boundary::Circle(Circle {
            header: Some(ItemHeader::new("ring")),
            center_x: 10.0,
            center_z: -4.0,
            radius: 32.0,
            feather: None,
        });
        assert_eq!(plain.to_node().children()[0].label(), Tag::new(b"0001"));
        assert_eq!(round_trip(plain.clone()), plain);

        let feathered = Boundary::Circle(Circle {
            header: None,
            center_x: 0.0,
            center_z: 0.0,
            radius: 8.0,
            feather: Some(Feather {
                feather_type: 1,
                amount: 0.5,
            }),
        });
        assert_eq!(feathered.to_node().children()[0].label(), Tag::new(b"0002"));
        assert_eq!(round_trip(feathered.clone()), feathered);
    }

    #[test]
    fn test_polygon_with_water() {
        let polygon = Boundary::Polygon(Polygon {
            header: Some(ItemHeader::new("lake")),
            points: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            feather: Feather::NONE,
            water: Some(LocalWater {
                enabled: true,
                height: 3.5,
                shader_size: 2.0,
                shader: "terrain/water.sht".into(),
            }),
        });
        assert_eq!(round_trip(polygon.clone()), polygon);
    }

    #[test]
    fn test_out_of_range_feather_is_clamped() {
        let rect = Boundary::Rectangle(Rectangle {
            header: None,
            x0: 0.0,
            z0: 0.0,
            x1: 1.0,
            z1: 1.0,
            feather: Feather {
                feather_type: 0,
                amount: 4.0,
            },
            water: None,
        });
        let Boundary::Rectangle(decoded) = Boundary::decode(&rect.to_node()) else {
            panic!("expected rectangle");
        };
        assert_eq!(decoded.feather.amount, 1.0);
    }

    #[test]
    fn test_unknown_version_is_opaque() {
        let node = build_item(BCIR, Tag::new(b"0009"), None, vec![1, 2, 3, 4, 5]);
        let decoded = Boundary::decode(&node);
        assert!(decoded.is_opaque());
        assert_eq!(decoded.to_node(), node);
    }
}
