// swgkit-parsers/src/floor.rs
//! Floor navigation mesh codec
//!
//! # Format Structure
//! ```text
//! FORM FLOR
//! └── FORM 0006
//!     ├── VERT   count, count × (x, y, z)
//!     ├── TRIS   count, count × 60-byte triangle records
//!     ├── BEDG   border edges, rebuilt from triangle neighbors on encode
//!     └── ...    path graph and search tree, kept as raw bytes
//! ```

use serde::Serialize;
use swgkit_core::{Error, Result, Vec3};

use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag};
use crate::traits::{Codec, ParseOptions};

/// Root form type of a floor mesh
pub const FLOR: Tag = Tag::new(b"FLOR");
const FLOR_VERSION: Tag = Tag::new(b"0006");
const VERT: Tag = Tag::new(b"VERT");
const TRIS: Tag = Tag::new(b"TRIS");
const BEDG: Tag = Tag::new(b"BEDG");

/// Size of one triangle record
pub const TRIANGLE_RECORD_SIZE: usize = 60;

/// Neighbor index marking an edge with no adjacent triangle
pub const NO_NEIGHBOR: i32 = -1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloorTriangle {
    pub corners: [i32; 3],
    pub index: i32,
    pub neighbors: [i32; 3],
    pub normal: Vec3,
    pub edge_types: [u8; 3],
    pub fallthrough: bool,
    pub part_tag: i32,
    pub portal_ids: [i32; 3],
}

impl FloorTriangle {
    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        fn ints(r: &mut ByteReader<'_>) -> Result<[i32; 3]> {
            Ok([r.i32_le()?, r.i32_le()?, r.i32_le()?])
        }

        let corners = ints(r)?;
        let index = r.i32_le()?;
        let neighbors = ints(r)?;
        let normal = r.vec3()?;
        let edge_types = r.array::<3>()?;
        let fallthrough = r.bool()?;
        let part_tag = r.i32_le()?;
        let portal_ids = ints(r)?;
        Ok(Self {
            corners,
            index,
            neighbors,
            normal,
            edge_types,
            fallthrough,
            part_tag,
            portal_ids,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        for &c in &self.corners {
            w.put_i32_le(c);
        }
        w.put_i32_le(self.index);
        for &n in &self.neighbors {
            w.put_i32_le(n);
        }
        w.put_vec3(self.normal);
        w.put_bytes(&self.edge_types);
        w.put_bool(self.fallthrough);
        w.put_i32_le(self.part_tag);
        for &p in &self.portal_ids {
            w.put_i32_le(p);
        }
    }
}

/// Edge on the mesh boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BorderEdge {
    pub triangle: i32,
    pub edge: i32,
    pub edge_type: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FloorMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<FloorTriangle>,
    /// Serialized chunks after the border edges
    pub trailer: Vec<u8>,
}

impl FloorMesh {
    /// Border edges: every triangle edge without a neighbor
    pub fn border_edges(&self) -> Vec<BorderEdge> {
        self.triangles
            .iter()
            .enumerate()
            .flat_map(|(t, tri)| {
                (0..3).filter(move |&e| tri.neighbors[e] == NO_NEIGHBOR).map(move |e| BorderEdge {
                    triangle: t as i32,
                    edge: e as i32,
                    edge_type: tri.edge_types[e],
                })
            })
            .collect()
    }

    /// Triangles referencing a vertex that does not exist
    pub fn invalid_triangles(&self) -> Vec<usize> {
        let count = self.vertices.len();
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.corners.iter().any(|&c| usize::try_from(c).map_or(true, |c| c >= count)))
            .map(|(i, _)| i)
            .collect()
    }
}

pub struct FloorCodec;

impl Codec for FloorCodec {
    type Model = FloorMesh;

    const ROOT: Option<Tag> = Some(FLOR);

    fn name(&self) -> &'static str {
        "Floor Mesh"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["flr"]
    }

    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> Result<FloorMesh> {
        decode_with_options(bytes, options)
    }

    fn encode(&self, model: &FloorMesh) -> Vec<u8> {
        encode(model)
    }
}

pub fn decode(bytes: &[u8]) -> Result<FloorMesh> {
    decode_with_options(bytes, &ParseOptions::default())
}

pub fn decode_with_options(bytes: &[u8], options: &ParseOptions) -> Result<FloorMesh> {
    let root = iff::parse_with_options(bytes, options)
        .ok_or_else(|| Error::invalid_data("no chunk tree at start of floor mesh"))?;
    if !root.is_form(FLOR) {
        return Err(Error::unexpected_form(FLOR.to_string(), root.label().to_string()));
    }
    let (version, body) = root
        .version_form()
        .ok_or_else(|| Error::missing_chunk("FLOR version form"))?;
    if version != FLOR_VERSION {
        return Err(Error::UnsupportedVersion {
            version: version.to_string(),
            supported: FLOR_VERSION.to_string(),
        });
    }

    let mut mesh = FloorMesh::default();
    let mut trailer = Vec::new();
    for node in body {
        match node {
            Node::Leaf { tag, data } if *tag == VERT => {
                mesh.vertices = read_counted(data, VERT, 12, |r| r.vec3());
            }
            Node::Leaf { tag, data } if *tag == TRIS => {
                mesh.triangles = read_counted(data, TRIS, TRIANGLE_RECORD_SIZE, FloorTriangle::read);
            }
            Node::Leaf { tag, .. } if *tag == BEDG => {}
            other => trailer.push(other.clone()),
        }
    }
    mesh.trailer = iff::serialize_sequence(&trailer);

    let invalid = mesh.invalid_triangles();
    if !invalid.is_empty() {
        tracing::warn!(count = invalid.len(), first = invalid[0], "Triangles reference missing vertices");
    }

    tracing::debug!(
        vertices = mesh.vertices.len(),
        triangles = mesh.triangles.len(),
        trailer = mesh.trailer.len(),
        "Decoded floor mesh"
    );
    Ok(mesh)
}

fn read_counted<T>(
    data: &[u8],
    tag: Tag,
    record_size: usize,
    mut read: impl FnMut(&mut ByteReader<'_>) -> Result<T>,
) -> Vec<T> {
    let mut reader = ByteReader::new(data);
    let declared = match reader.i32_le() {
        Ok(n) => n.max(0) as usize,
        Err(_) => {
            tracing::warn!(%tag, "Table without count");
            return Vec::new();
        }
    };
    let available = reader.remaining() / record_size;
    if available < declared {
        tracing::warn!(%tag, declared, available, "Truncated table");
    }
    let mut out = Vec::with_capacity(declared.min(available));
    for _ in 0..declared.min(available) {
        match read(&mut reader) {
            Ok(v) => out.push(v),
            Err(_) => break,
        }
    }
    out
}

pub fn encode(mesh: &FloorMesh) -> Vec<u8> {
    let mut vertices = ByteWriter::with_capacity(4 + mesh.vertices.len() * 12);
    vertices.put_i32_le(mesh.vertices.len() as i32);
    for &v in &mesh.vertices {
        vertices.put_vec3(v);
    }

    let mut triangles = ByteWriter::with_capacity(4 + mesh.triangles.len() * TRIANGLE_RECORD_SIZE);
    triangles.put_i32_le(mesh.triangles.len() as i32);
    for t in &mesh.triangles {
        t.write(&mut triangles);
    }

    let edges = mesh.border_edges();
    let mut border = ByteWriter::with_capacity(4 + edges.len() * 9);
    border.put_i32_le(edges.len() as i32);
    for e in &edges {
        border.put_i32_le(e.triangle);
        border.put_i32_le(e.edge);
        border.put_u8(e.edge_type);
    }

    let mut children = vec![
        Node::leaf(VERT, vertices.into_inner()),
        Node::leaf(TRIS, triangles.into_inner()),
        Node::leaf(BEDG, border.into_inner()),
    ];
    children.extend(iff::parse_sequence(&mesh.trailer));

    iff::serialize(&Node::form(FLOR, vec![Node::form(FLOR_VERSION, children)]))
}
