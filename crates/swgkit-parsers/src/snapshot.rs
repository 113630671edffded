// swgkit-parsers/src/snapshot.rs
//! World snapshot codec
//!
//! ```text
//! FORM WSNP
//! └── FORM 0001
//!     ├── FORM NODS
//!     │   └── FORM NODE / FORM 0000 / DATA (52 bytes), nested NODE forms
//!     └── OTNL   count:i32, object template names
//! ```
//!
//! Snapshots can hold hundreds of thousands of objects, so decoding never
//! builds a tree: node records are found by scanning for the `DATA` header
//! with its fixed length, and the template table by scanning for `OTNL`.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use swgkit_core::{Error, Quat, Result, Vec3};

use crate::binary::{scan_signature, ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag, HEADER_SIZE};
use crate::traits::{Codec, ParseOptions};

/// Root form type of a world snapshot
pub const WSNP: Tag = Tag::new(b"WSNP");
const WSNP_VERSION: Tag = Tag::new(b"0001");
const NODS: Tag = Tag::new(b"NODS");
const NODE: Tag = Tag::new(b"NODE");
const NODE_VERSION: Tag = Tag::new(b"0000");
const DATA: Tag = Tag::new(b"DATA");
const OTNL: Tag = Tag::new(b"OTNL");

/// Payload size of one node record
pub const NODE_RECORD_SIZE: usize = 52;

const NODE_SIGNATURE: [u8; 8] = *b"DATA\0\0\0\x34";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotNode {
    pub object_id: i32,
    /// Zero for objects placed directly in the world
    pub parent_id: i32,
    pub template_index: i32,
    pub cell_index: i32,
    pub rotation: Quat,
    pub position: Vec3,
    pub radius: f32,
    pub portal_layout_crc: u32,
}

impl SnapshotNode {
    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }

    fn read(data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let object_id = r.i32_le()?;
        let parent_id = r.i32_le()?;
        let template_index = r.i32_le()?;
        let cell_index = r.i32_le()?;
        let [w, x, y, z] = r.floats::<4>()?;
        Ok(Self {
            object_id,
            parent_id,
            template_index,
            cell_index,
            rotation: Quat::new(w, x, y, z),
            position: r.vec3()?,
            radius: r.f32()?,
            portal_layout_crc: r.u32_le()?,
        })
    }

    fn write(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(NODE_RECORD_SIZE);
        w.put_i32_le(self.object_id);
        w.put_i32_le(self.parent_id);
        w.put_i32_le(self.template_index);
        w.put_i32_le(self.cell_index);
        let q = self.rotation;
        w.put_floats(&[q.w, q.x, q.y, q.z]);
        w.put_vec3(self.position);
        w.put_f32(self.radius);
        w.put_u32_le(self.portal_layout_crc);
        w.into_inner()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WorldSnapshot {
    /// Nodes in file order, parents before their children
    pub nodes: Vec<SnapshotNode>,
    pub templates: Vec<String>,
}

impl WorldSnapshot {
    pub fn find(&self, object_id: i32) -> Option<&SnapshotNode> {
        self.nodes.iter().find(|n| n.object_id == object_id)
    }

    pub fn template_of(&self, node: &SnapshotNode) -> Option<&str> {
        usize::try_from(node.template_index)
            .ok()
            .and_then(|i| self.templates.get(i))
            .map(String::as_str)
    }

    /// World position of the building that encloses a cell object.
    ///
    /// Built from two passes over the nodes: world-placed objects by id,
    /// then objects whose parent is one of those.
    pub fn building_position_for_cell(&self, cell_object_id: i32) -> Option<Vec3> {
        let roots: HashMap<i32, Vec3> = self
            .nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| (n.object_id, n.position))
            .collect();
        let cells: HashMap<i32, i32> = self
            .nodes
            .iter()
            .filter(|n| !n.is_root() && roots.contains_key(&n.parent_id))
            .map(|n| (n.object_id, n.parent_id))
            .collect();

        cells.get(&cell_object_id).and_then(|building| roots.get(building)).copied()
    }
}

pub struct SnapshotCodec;

impl Codec for SnapshotCodec {
    type Model = WorldSnapshot;

    const ROOT: Option<Tag> = Some(WSNP);

    fn name(&self) -> &'static str {
        "World Snapshot"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ws"]
    }

    fn decode_with_options(&self, bytes: &[u8], _options: &ParseOptions) -> Result<WorldSnapshot> {
        decode(bytes)
    }

    fn encode(&self, model: &WorldSnapshot) -> Vec<u8> {
        encode(model)
    }

    /// Snapshots are recognized by their template table marker
    fn sniff(&self, bytes: &[u8]) -> bool {
        match iff::peek_form_type(bytes) {
            Some(t) => t == WSNP,
            None => iff::scan_leaf(bytes, OTNL).is_some(),
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<WorldSnapshot> {
    if let Some(found) = iff::peek_form_type(bytes).filter(|&t| t != WSNP) {
        return Err(Error::unexpected_form(WSNP.to_string(), found.to_string()));
    }

    let table = iff::scan_leaf(bytes, OTNL).ok_or_else(|| Error::missing_chunk(OTNL.to_string()))?;
    let mut r = ByteReader::new(table);
    let count = r.i32_le().map_or(0, |n| n.max(0) as usize);
    let mut templates = Vec::with_capacity(count.min(table.len()));
    for _ in 0..count {
        match r.cstring() {
            Ok(name) => templates.push(name),
            Err(_) => {
                tracing::warn!(declared = count, read = templates.len(), "Truncated template table");
                break;
            }
        }
    }

    let nodes: Vec<SnapshotNode> = scan_signature(bytes, &NODE_SIGNATURE)
        .filter_map(|offset| {
            let start = offset + HEADER_SIZE;
            bytes
                .get(start..start + NODE_RECORD_SIZE)
                .and_then(|data| SnapshotNode::read(data).ok())
        })
        .collect();

    tracing::debug!(nodes = nodes.len(), templates = templates.len(), "Decoded world snapshot");
    Ok(WorldSnapshot { nodes, templates })
}

/// Rebuild the nested node hierarchy from parent ids.
///
/// Nodes whose parent is absent are written at the top level. A parent chain
/// that loops back on itself is cut where the loop closes.
pub fn encode(snapshot: &WorldSnapshot) -> Vec<u8> {
    let ids: HashSet<i32> = snapshot.nodes.iter().map(|n| n.object_id).collect();
    let mut children: HashMap<i32, Vec<usize>> = HashMap::new();
    let mut top = Vec::new();
    for (i, node) in snapshot.nodes.iter().enumerate() {
        if node.is_root() || !ids.contains(&node.parent_id) || node.parent_id == node.object_id {
            top.push(i);
        } else {
            children.entry(node.parent_id).or_default().push(i);
        }
    }

    fn build(
        index: usize,
        nodes: &[SnapshotNode],
        children: &HashMap<i32, Vec<usize>>,
        written: &mut [bool],
    ) -> Node {
        written[index] = true;
        let node = &nodes[index];
        let mut body = vec![Node::leaf(DATA, node.write())];
        for &child in children.get(&node.object_id).map(Vec::as_slice).unwrap_or_default() {
            if !written[child] {
                body.push(build(child, nodes, children, written));
            }
        }
        Node::form(NODE, vec![Node::form(NODE_VERSION, body)])
    }

    let mut written = vec![false; snapshot.nodes.len()];
    let mut forms: Vec<Node> = top
        .into_iter()
        .map(|i| build(i, &snapshot.nodes, &children, &mut written))
        .collect();
    // Cycles never reach the top level; write each one from its first node
    for i in 0..snapshot.nodes.len() {
        if !written[i] {
            tracing::warn!(object_id = snapshot.nodes[i].object_id, "Parent cycle in snapshot");
            forms.push(build(i, &snapshot.nodes, &children, &mut written));
        }
    }

    let mut table = ByteWriter::new();
    table.put_i32_le(snapshot.templates.len() as i32);
    for name in &snapshot.templates {
        table.put_cstring(name);
    }

    iff::serialize(&Node::form(
        WSNP,
        vec![Node::form(
            WSNP_VERSION,
            vec![Node::form(NODS, forms), Node::leaf(OTNL, table.into_inner())],
        )],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(object_id: i32, parent_id: i32, position: Vec3) -> SnapshotNode {
        SnapshotNode {
            object_id,
            parent_id,
            template_index: 0,
            cell_index: 0,
            rotation: Quat::IDENTITY,
            position,
            radius: 1.0,
            portal_layout_crc: 0,
        }
    }

    fn sample() -> WorldSnapshot {
        WorldSnapshot {
            nodes: vec![
                node(100, 0, Vec3::new(1500.0, 12.0, -320.0)),
                node(101, 100, Vec3::ZERO),
                node(102, 101, Vec3::new(1.0, 0.0, 1.0)),
                node(200, 0, Vec3::new(-40.0, 0.0, 8.0)),
            ],
            templates: vec!["object/building/player/shared_player_house_tatooine_small_style_01.iff".into()],
        }
    }

    #[test]
    fn test_round_trip() {
        let bytes = encode(&sample());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_building_position_for_cell() {
        let snapshot = sample();
        assert_eq!(snapshot.building_position_for_cell(101), Some(Vec3::new(1500.0, 12.0, -320.0)));
        // Grandchildren are not cells of a building
        assert_eq!(snapshot.building_position_for_cell(102), None);
        assert_eq!(snapshot.building_position_for_cell(100), None);
    }

    #[test]
    fn test_nesting_follows_parents() {
        let root = iff::parse(&encode(&sample())).unwrap();
        let nods = root.children()[0].find_form(NODS).unwrap();
        assert_eq!(nods.children().len(), 2);
        let house_body = nods.children()[0].children()[0].children();
        assert!(house_body[0].is_leaf(DATA));
        assert!(house_body[1].is_form(NODE));
    }

    #[test]
    fn test_parent_cycle_still_written() {
        let snapshot = WorldSnapshot {
            nodes: vec![node(1, 2, Vec3::ZERO), node(2, 1, Vec3::ZERO)],
            templates: vec![],
        };
        let decoded = decode(&encode(&snapshot)).unwrap();
        assert_eq!(decoded.nodes.len(), 2);
    }

    #[test]
    fn test_missing_template_table() {
        let bytes = iff::serialize(&Node::form(WSNP, vec![Node::form(WSNP_VERSION, vec![])]));
        assert!(matches!(decode(&bytes), Err(Error::MissingChunk { .. })));
    }
}
