// swgkit-parsers/src/building/mod.rs
//! Building / portal layout (POB) codec
//!
//! A portal layout describes a building interior: the doorway polygons
//! (portals), the enclosed rooms (cells) that reference them, an optional
//! path graph for AI navigation and an optional trailing checksum.
//!
//! # Format Structure
//! ```text
//! FORM PRTO
//! └── FORM 0003 | 0004
//!     ├── DATA            portal count, cell count
//!     ├── FORM PRTS       portal geometry
//!     │   ├── PRTL        (v3) vertex fan
//!     │   └── FORM IDTL   (v4) vertex + index buffers
//!     ├── FORM CELS
//!     │   └── FORM CELL   see `cell.rs`
//!     ├── FORM PGRF       optional path graph
//!     ├── ...             unrecognized chunks, kept as raw bytes
//!     └── CRC             optional checksum of everything else
//! ```
//!
//! Integer fields follow the version's byte order: little-endian in 0003,
//! big-endian in 0004. Portal ids inside cell portal records are the one
//! exception and are always little-endian. Floats are always little-endian.

mod cell;
mod path_graph;
mod positions;

pub use cell::{Cell, CollisionExtent, Light, PortalRecord, COLLISION_EXTENT_TYPES, LIGHT_RECORD_SIZE};
pub use path_graph::{PathEdge, PathGraph, PathNode};
pub use positions::{cell_positions, FALLBACK_CELL_OFFSET};

use std::collections::BTreeMap;

use serde::Serialize;
use smallvec::SmallVec;
use swgkit_core::{Error, Result, ResultExt, Vec3};

use crate::binary::{ByteReader, ByteWriter, Endian};
use crate::crc;
use crate::iff::{self, ContainerView, Node, Tag};
use crate::traits::{Codec, ParseOptions};

/// Root form type of a portal layout
pub const PRTO: Tag = Tag::new(b"PRTO");

const DATA: Tag = Tag::new(b"DATA");
const PRTS: Tag = Tag::new(b"PRTS");
const CELS: Tag = Tag::new(b"CELS");
const PRTL: Tag = Tag::new(b"PRTL");
const IDTL: Tag = Tag::new(b"IDTL");
const IDTL_VERSION: Tag = Tag::new(b"0000");
const VERT: Tag = Tag::new(b"VERT");
const INDX: Tag = Tag::new(b"INDX");
const PGRF: Tag = Tag::new(b"PGRF");
const CRC: Tag = Tag::new(b"CRC ");

/// Supported portal layout versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildingVersion {
    /// `0003`: little-endian counts, portals stored as vertex fans
    V3,
    /// `0004`: big-endian counts, explicit portal index buffers
    V4,
}

impl BuildingVersion {
    pub fn from_tag(tag: Tag) -> Option<Self> {
        match tag.as_bytes() {
            b"0003" => Some(BuildingVersion::V3),
            b"0004" => Some(BuildingVersion::V4),
            _ => None,
        }
    }

    pub fn tag(self) -> Tag {
        match self {
            BuildingVersion::V3 => Tag::new(b"0003"),
            BuildingVersion::V4 => Tag::new(b"0004"),
        }
    }

    /// Byte order of every integer except portal ids
    pub fn endian(self) -> Endian {
        match self {
            BuildingVersion::V3 => Endian::Little,
            BuildingVersion::V4 => Endian::Big,
        }
    }

    /// Version form used inside each cell
    pub fn cell_tag(self) -> Tag {
        match self {
            BuildingVersion::V3 => Tag::new(b"0004"),
            BuildingVersion::V4 => Tag::new(b"0005"),
        }
    }
}

/// Doorway polygon shared by the two cells it connects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portal {
    pub vertices: SmallVec<[Vec3; 4]>,
    /// Triangle list, three indices per triangle
    pub indices: Vec<i32>,
}

impl Portal {
    pub fn new(vertices: impl IntoIterator<Item = Vec3>, indices: Vec<i32>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
            indices,
        }
    }

    /// Portal triangulated as a fan around its first vertex
    pub fn fan(vertices: impl IntoIterator<Item = Vec3>) -> Self {
        let vertices: SmallVec<[Vec3; 4]> = vertices.into_iter().collect();
        let indices = fan_indices(vertices.len());
        Self { vertices, indices }
    }

    pub fn triangles(&self) -> impl Iterator<Item = [i32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Fan triangulation `(0, i-1, i)` for `i` in `2..n`
pub fn fan_indices(vertex_count: usize) -> Vec<i32> {
    (2..vertex_count)
        .flat_map(|i| [0, i as i32 - 1, i as i32])
        .collect()
}

/// Decoded portal layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Building {
    pub version: BuildingVersion,
    /// Portals, identified by their index
    pub portals: Vec<Portal>,
    pub cells: Vec<Cell>,
    pub path_graph: Option<PathGraph>,
    /// Serialized top-level chunks that are not read, written before the checksum
    pub trailer: Vec<u8>,
    /// Present when the file carries a checksum; recomputed on encode
    pub checksum: Option<u32>,
}

impl Building {
    /// Empty layout for building a fresh file
    pub fn new(version: BuildingVersion) -> Self {
        Self {
            version,
            portals: Vec::new(),
            cells: Vec::new(),
            path_graph: None,
            trailer: Vec::new(),
            checksum: None,
        }
    }

    pub fn add_portal(&mut self, portal: Portal) -> usize {
        self.portals.push(portal);
        self.portals.len() - 1
    }

    pub fn add_cell(&mut self, cell: Cell) -> usize {
        self.cells.push(cell);
        self.cells.len() - 1
    }

    pub fn with_path_graph(mut self, graph: PathGraph) -> Self {
        self.path_graph = Some(graph);
        self
    }

    /// Request a trailing checksum on the next encode
    pub fn with_checksum(mut self) -> Self {
        self.checksum.get_or_insert(0);
        self
    }

    pub fn cell_index(&self, name: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.name == name)
    }

    pub fn rename_cell(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) => {
                cell.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Portal records in any cell that lead into `cell`
    pub fn portal_records_to(&self, cell: usize) -> Vec<(usize, &PortalRecord)> {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.portals.iter().map(move |p| (i, p)))
            .filter(|(_, p)| usize::try_from(p.connecting_cell).ok() == Some(cell))
            .collect()
    }

    /// World-relative cell positions reachable from cell 0
    pub fn cell_positions(&self) -> BTreeMap<usize, Vec3> {
        positions::cell_positions(self)
    }
}

/// Portal layout codec
pub struct BuildingCodec;

impl Codec for BuildingCodec {
    type Model = Building;

    const ROOT: Option<Tag> = Some(PRTO);

    fn name(&self) -> &'static str {
        "Portal Layout"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pob"]
    }

    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> Result<Building> {
        decode_with_options(bytes, options)
    }

    fn encode(&self, model: &Building) -> Vec<u8> {
        encode(model)
    }
}

pub fn decode(bytes: &[u8]) -> Result<Building> {
    decode_with_options(bytes, &ParseOptions::default())
}

pub fn decode_with_options(bytes: &[u8], options: &ParseOptions) -> Result<Building> {
    let root = iff::parse_with_options(bytes, options)
        .ok_or_else(|| Error::invalid_data("no chunk tree at start of portal layout"))?;

    if !root.is_form(PRTO) {
        return Err(Error::unexpected_form(PRTO.to_string(), root.label().to_string()));
    }

    let (version_tag, body) = root
        .version_form()
        .ok_or_else(|| Error::missing_chunk("PRTO version form"))?;
    let version = BuildingVersion::from_tag(version_tag).ok_or_else(|| Error::UnsupportedVersion {
        version: version_tag.to_string(),
        supported: "0003, 0004".to_string(),
    })?;
    let endian = version.endian();

    let mut view = ContainerView::new(body);
    let header = view.expect_leaf(DATA).context("PRTO header")?;
    let mut reader = ByteReader::new(header);
    let declared_portals = reader.i32_with(endian).context("PRTO header portal count")?;
    let declared_cells = reader.i32_with(endian).context("PRTO header cell count")?;

    let mut building = Building::new(version);
    let mut trailer = Vec::new();

    for node in view {
        match node {
            Node::Container { type_name, .. } if *type_name == PRTS => {
                building.portals = decode_portals(node, version);
            }
            Node::Container { type_name, .. } if *type_name == CELS => {
                building.cells = cell::decode_cells(node, version);
            }
            Node::Container { type_name, .. } if *type_name == PGRF => {
                building.path_graph = path_graph::decode(node, endian);
            }
            Node::Leaf { tag, data } if *tag == CRC => match ByteReader::new(data).u32_with(endian) {
                Ok(value) => building.checksum = Some(value),
                Err(_) => tracing::warn!(length = data.len(), "Checksum chunk too short"),
            },
            other => {
                tracing::warn!(label = %other.label(), "Keeping unknown portal layout chunk as raw bytes");
                trailer.push(other);
            }
        }
    }
    building.trailer = trailer.into_iter().flat_map(iff::serialize).collect();

    if usize::try_from(declared_portals).ok() != Some(building.portals.len()) {
        tracing::warn!(declared = declared_portals, parsed = building.portals.len(), "Portal count mismatch");
    }
    if usize::try_from(declared_cells).ok() != Some(building.cells.len()) {
        tracing::warn!(declared = declared_cells, parsed = building.cells.len(), "Cell count mismatch");
    }

    if options.verify_checksums {
        if let Some(stored) = building.checksum {
            let actual = compute_checksum(&root);
            if actual != stored {
                return Err(Error::ChecksumMismatch {
                    expected: stored,
                    actual,
                });
            }
        }
    }

    tracing::debug!(
        version = %version_tag,
        portals = building.portals.len(),
        cells = building.cells.len(),
        path_graph = building.path_graph.is_some(),
        checksum = building.checksum.is_some(),
        "Decoded portal layout"
    );

    Ok(building)
}

pub fn encode(building: &Building) -> Vec<u8> {
    let version = building.version;
    let endian = version.endian();

    let mut header = ByteWriter::with_capacity(8);
    header.put_i32_with(building.portals.len() as i32, endian);
    header.put_i32_with(building.cells.len() as i32, endian);

    let mut children = vec![
        Node::leaf(DATA, header.into_inner()),
        encode_portals(&building.portals, version),
        cell::encode_cells(&building.cells, version),
    ];
    if let Some(graph) = &building.path_graph {
        children.push(path_graph::encode(graph, endian));
    }
    children.extend(iff::parse_sequence(&building.trailer));

    if building.checksum.is_none() {
        return iff::serialize(&Node::form(PRTO, vec![Node::form(version.tag(), children)]));
    }

    let unsigned = iff::serialize(&Node::form(PRTO, vec![Node::form(version.tag(), children.clone())]));
    let mut value = ByteWriter::with_capacity(4);
    value.put_u32_with(crc::calculate(&unsigned), endian);
    children.push(Node::leaf(CRC, value.into_inner()));

    iff::serialize(&Node::form(PRTO, vec![Node::form(version.tag(), children)]))
}

/// Checksum of a layout tree with any checksum chunk left out
pub fn compute_checksum(root: &Node) -> u32 {
    let stripped = match root {
        Node::Container { type_name, children } => Node::form(
            *type_name,
            children
                .iter()
                .map(|child| match child {
                    Node::Container { type_name, children } if type_name.is_version() => Node::form(
                        *type_name,
                        children.iter().filter(|n| !n.is_leaf(CRC)).cloned().collect(),
                    ),
                    other => other.clone(),
                })
                .collect(),
        ),
        leaf => leaf.clone(),
    };
    crc::calculate(&iff::serialize(&stripped))
}

/// Recompute the checksum of an encoded layout and compare it with the stored one.
///
/// Returns `None` when the layout carries no checksum.
pub fn verify_checksum(bytes: &[u8]) -> Result<Option<bool>> {
    let building = decode(bytes)?;
    let Some(stored) = building.checksum else {
        return Ok(None);
    };
    let root = iff::parse(bytes).ok_or_else(|| Error::invalid_data("no chunk tree"))?;
    Ok(Some(compute_checksum(&root) == stored))
}

fn decode_portals(node: &Node, version: BuildingVersion) -> Vec<Portal> {
    let mut portals = Vec::with_capacity(node.children().len());
    for (index, child) in node.children().iter().enumerate() {
        let portal = match (version, child) {
            (BuildingVersion::V3, Node::Leaf { tag, data }) if *tag == PRTL => {
                decode_portal_v3(data, version.endian(), index)
            }
            (BuildingVersion::V4, Node::Container { type_name, .. }) if *type_name == IDTL => {
                decode_portal_v4(child, index)
            }
            (_, other) => {
                tracing::warn!(index, label = %other.label(), "Skipping unexpected portal chunk");
                None
            }
        };
        portals.extend(portal);
    }
    portals
}

fn decode_portal_v3(data: &[u8], endian: Endian, index: usize) -> Option<Portal> {
    let mut reader = ByteReader::new(data);
    let count = match reader.i32_with(endian) {
        Ok(count) if count >= 0 => count as usize,
        _ => {
            tracing::warn!(index, "Portal without a valid vertex count");
            return None;
        }
    };

    let mut vertices: SmallVec<[Vec3; 4]> = SmallVec::with_capacity(count.min(reader.remaining() / 12));
    for _ in 0..count {
        match reader.vec3() {
            Ok(v) => vertices.push(v),
            Err(_) => {
                tracing::warn!(index, declared = count, parsed = vertices.len(), "Truncated portal vertex list");
                break;
            }
        }
    }

    Some(Portal::fan(vertices))
}

fn decode_portal_v4(node: &Node, index: usize) -> Option<Portal> {
    let Some((_, body)) = node.version_form() else {
        tracing::warn!(index, "Portal geometry without version form");
        return None;
    };
    let view = ContainerView::new(body);

    let vertex_bytes = view.find_leaf(VERT).unwrap_or_default();
    let index_bytes = view.find_leaf(INDX).unwrap_or_default();
    if vertex_bytes.len() % 12 != 0 || index_bytes.len() % 4 != 0 {
        tracing::warn!(
            index,
            vertex_bytes = vertex_bytes.len(),
            index_bytes = index_bytes.len(),
            "Portal buffers have trailing bytes"
        );
    }

    let vertices = vertex_bytes
        .chunks_exact(12)
        .filter_map(|chunk| ByteReader::new(chunk).vec3().ok())
        .collect();
    let indices = index_bytes
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Some(Portal { vertices, indices })
}

fn encode_portals(portals: &[Portal], version: BuildingVersion) -> Node {
    let children = portals
        .iter()
        .map(|portal| match version {
            BuildingVersion::V3 => {
                // Only the fan vertices are stored; triangles are regenerated on load
                let mut w = ByteWriter::with_capacity(4 + portal.vertices.len() * 12);
                w.put_i32_with(portal.vertices.len() as i32, version.endian());
                for v in &portal.vertices {
                    w.put_vec3(*v);
                }
                Node::leaf(PRTL, w.into_inner())
            }
            BuildingVersion::V4 => {
                let mut vertices = ByteWriter::with_capacity(portal.vertices.len() * 12);
                for v in &portal.vertices {
                    vertices.put_vec3(*v);
                }
                let mut indices = ByteWriter::with_capacity(portal.indices.len() * 4);
                for &i in &portal.indices {
                    indices.put_i32_le(i);
                }
                Node::form(
                    IDTL,
                    vec![Node::form(
                        IDTL_VERSION,
                        vec![
                            Node::leaf(VERT, vertices.into_inner()),
                            Node::leaf(INDX, indices.into_inner()),
                        ],
                    )],
                )
            }
        })
        .collect();

    Node::form(PRTS, children)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Vec3; 4] {
        [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_fan_indices() {
        assert!(fan_indices(0).is_empty());
        assert!(fan_indices(2).is_empty());
        assert_eq!(fan_indices(4), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_v3_header_is_little_endian() {
        let mut building = Building::new(BuildingVersion::V3);
        building.add_portal(Portal::fan(square()));
        let bytes = encode(&building);

        // FORM PRTO / FORM 0003 / DATA
        assert_eq!(&bytes[24..28], b"DATA");
        assert_eq!(&bytes[32..36], &1i32.to_le_bytes());
        assert_eq!(&bytes[36..40], &0i32.to_le_bytes());
    }

    #[test]
    fn test_v4_header_is_big_endian() {
        let mut building = Building::new(BuildingVersion::V4);
        building.add_portal(Portal::fan(square()));
        let bytes = encode(&building);
        assert_eq!(&bytes[32..36], &1i32.to_be_bytes());
    }

    #[test]
    fn test_v3_portal_round_trip_regenerates_fan() {
        let mut building = Building::new(BuildingVersion::V3);
        // Indices that disagree with the fan are not written in v3
        building.add_portal(Portal::new(square(), vec![3, 2, 1]));
        let decoded = decode(&encode(&building)).unwrap();
        assert_eq!(decoded.portals[0].indices, fan_indices(4));
    }

    #[test]
    fn test_v4_portal_keeps_index_buffer() {
        let mut building = Building::new(BuildingVersion::V4);
        building.add_portal(Portal::new(square(), vec![3, 2, 1, 0, 1, 3]));
        let bytes = encode(&building);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.portals[0].indices, vec![3, 2, 1, 0, 1, 3]);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_checksum_recomputed() {
        let mut building = Building::new(BuildingVersion::V4).with_checksum();
        building.add_portal(Portal::fan(square()));
        let bytes = encode(&building);

        assert_eq!(&bytes[bytes.len() - 12..bytes.len() - 8], b"CRC ");
        assert_eq!(verify_checksum(&bytes).unwrap(), Some(true));

        let decoded = decode_with_options(&bytes, &ParseOptions::strict()).unwrap();
        assert!(decoded.checksum.is_some());
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_checksum_mismatch_in_strict_mode() {
        let building = Building::new(BuildingVersion::V3).with_checksum();
        let mut bytes = encode(&building);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(decode(&bytes).is_ok());
        let err = decode_with_options(&bytes, &ParseOptions::strict()).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_wrong_root_is_structural_error() {
        let bytes = iff::serialize(&Node::form(Tag::new(b"FLOR"), vec![]));
        assert!(matches!(decode(&bytes), Err(Error::UnexpectedForm { .. })));
    }

    #[test]
    fn test_missing_header_is_structural_error() {
        let bytes = iff::serialize(&Node::form(PRTO, vec![Node::form(Tag::new(b"0004"), vec![])]));
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err.root_cause(), Error::MissingChunk { .. }));
    }

    #[test]
    fn test_unsupported_version() {
        let bytes = iff::serialize(&Node::form(PRTO, vec![Node::form(Tag::new(b"0002"), vec![])]));
        assert!(matches!(decode(&bytes), Err(Error::UnsupportedVersion { .. })));
    }
}
