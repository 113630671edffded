//! Integration tests for the portal layout codec
//!
//! These tests cover:
//! - Round trips of both format versions, with and without checksum
//! - Cell position reconstruction
//! - Recovery from truncated light records
//! - Unknown chunks kept through a round trip
//! - The fan triangulation law

use proptest::prelude::*;

use swgkit_core::{ColorArgb, Error, Transform, Vec3};
use swgkit_parsers::building::{
    self, cell_positions, fan_indices, Building, BuildingVersion, Cell, Light, PathEdge, PathGraph, PathNode, Portal,
    PortalRecord, FALLBACK_CELL_OFFSET, LIGHT_RECORD_SIZE,
};
use swgkit_parsers::iff::{self, Node, Tag};
use swgkit_parsers::ParseOptions;

fn hardpoint(x: f32, y: f32, z: f32) -> Transform {
    Transform {
        translation: Vec3::new(x, y, z),
        ..Transform::IDENTITY
    }
}

fn light() -> Light {
    Light {
        light_type: 1,
        diffuse: ColorArgb::new(1.0, 0.9, 0.8, 0.7),
        specular: ColorArgb::new(1.0, 0.0, 0.0, 0.0),
        transform: hardpoint(0.0, 3.0, 0.0),
        constant_attenuation: 1.0,
        linear_attenuation: 0.1,
        quadratic_attenuation: 0.01,
    }
}

/// Three-cell cantina: exterior, entry hall and a back room
fn cantina(version: BuildingVersion) -> Building {
    let square = [
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 3.0, 0.0),
        Vec3::new(-1.0, 3.0, 0.0),
    ];

    let mut b = Building::new(version);
    b.add_portal(Portal::fan(square));
    b.add_portal(Portal::fan(square));
    b.add_cell(Cell::new("r0", "").with_portal(PortalRecord::new(0, 1).with_hardpoint(hardpoint(5.0, 0.0, 0.0))));

    let mut entry = Cell::new("entry", "appearance/mesh/thm_tato_cantina_r1.msh")
        .with_floor("appearance/collision/thm_tato_cantina_r1.flr")
        .with_portal(PortalRecord::new(0, 0))
        .with_portal(PortalRecord::new(1, 2));
    entry.lights.push(light());
    b.add_cell(entry);

    let mut back = Cell::new("back", "appearance/mesh/thm_tato_cantina_r2.msh").with_portal(PortalRecord::new(1, 1));
    back.can_see_exterior = false;
    b.add_cell(back);

    b.with_path_graph(PathGraph {
        graph_type: 1,
        nodes: vec![
            PathNode {
                index: 0,
                id: 10,
                key: -1,
                node_type: 2,
                position: Vec3::new(0.0, 0.0, 1.0),
                radius: 0.5,
            },
            PathNode {
                index: 1,
                id: 11,
                key: -1,
                node_type: 2,
                position: Vec3::new(0.0, 0.0, 6.0),
                radius: 0.5,
            },
        ],
        edges: vec![
            PathEdge {
                from: 0,
                to: 1,
                width_left: 1.0,
                width_right: 1.0,
            },
            PathEdge {
                from: 1,
                to: 0,
                width_left: 1.0,
                width_right: 1.0,
            },
        ],
    })
}

#[test]
fn test_round_trip_both_versions_with_checksum() {
    for version in [BuildingVersion::V3, BuildingVersion::V4] {
        let bytes = building::encode(&cantina(version).with_checksum());
        let decoded = building::decode_with_options(&bytes, &ParseOptions::strict()).unwrap();
        assert_eq!(decoded.version, version);
        assert_eq!(decoded.cells.len(), 3);
        assert!(decoded.checksum.is_some());
        assert_eq!(building::verify_checksum(&bytes).unwrap(), Some(true));
        assert_eq!(building::encode(&decoded), bytes);
    }
}

#[test]
fn test_round_trip_without_checksum() {
    let bytes = building::encode(&cantina(BuildingVersion::V4));
    let decoded = building::decode(&bytes).unwrap();
    assert_eq!(decoded.checksum, None);
    assert_eq!(building::verify_checksum(&bytes).unwrap(), None);
    assert_eq!(decoded, cantina(BuildingVersion::V4));
}

#[test]
fn test_modified_building_gets_new_checksum() {
    let bytes = building::encode(&cantina(BuildingVersion::V3).with_checksum());
    let mut decoded = building::decode(&bytes).unwrap();
    assert!(decoded.rename_cell(2, "storage"));

    let edited = building::encode(&decoded);
    assert_ne!(edited, bytes);
    assert_eq!(building::verify_checksum(&edited).unwrap(), Some(true));
    assert_eq!(building::decode(&edited).unwrap().cells[2].name, "storage");
}

#[test]
fn test_cell_positions_follow_hardpoints() {
    let positions = cell_positions(&cantina(BuildingVersion::V4));
    assert_eq!(positions[&0], Vec3::ZERO);
    assert_eq!(positions[&1], Vec3::new(5.0, 0.0, 0.0));
    assert_eq!(positions[&2], Vec3::new(5.0, 0.0, 0.0) + FALLBACK_CELL_OFFSET);
    assert_eq!(positions[&2], Vec3::new(5.0, 20.0, 0.0));
}

#[test]
fn test_unreachable_cell_absent() {
    let mut b = cantina(BuildingVersion::V4);
    b.add_cell(Cell::new("sealed", "appearance/mesh/sealed.msh"));
    let positions = b.cell_positions();
    assert_eq!(positions.len(), 3);
    assert!(!positions.contains_key(&3));
}

/// Replace the light leaf of one cell with `payload`
fn with_light_payload(bytes: &[u8], cell: usize, payload: Vec<u8>) -> Vec<u8> {
    fn find_cells(node: &mut Node) -> Option<&mut Vec<Node>> {
        match node {
            Node::Container { type_name, children } => {
                if *type_name == Tag::new(b"CELS") {
                    Some(children)
                } else {
                    children.iter_mut().find_map(find_cells)
                }
            }
            Node::Leaf { .. } => None,
        }
    }

    let mut root = iff::parse(bytes).unwrap();
    let cells = find_cells(&mut root).unwrap();
    if let Node::Container { children, .. } = &mut cells[cell] {
        if let Node::Container { children, .. } = &mut children[0] {
            let light = children.iter_mut().find(|n| n.is_leaf(Tag::new(b"LGHT"))).unwrap();
            *light = Node::leaf(Tag::new(b"LGHT"), payload);
        }
    }
    iff::serialize(&root)
}

#[test]
fn test_truncated_lights_yield_parsed_prefix() {
    let mut b = cantina(BuildingVersion::V3);
    b.cells[1].lights = vec![light(), light()];
    let bytes = building::encode(&b);

    let decoded = building::decode(&bytes).unwrap();
    let mut payload = Vec::new();
    payload.extend_from_slice(&3i32.to_le_bytes());
    for _ in 0..2 {
        payload.extend(std::iter::repeat(0u8).take(LIGHT_RECORD_SIZE));
    }
    // Third record cut short
    payload.extend(std::iter::repeat(0u8).take(LIGHT_RECORD_SIZE / 2));

    let truncated = with_light_payload(&bytes, 1, payload);
    let recovered = building::decode(&truncated).unwrap();
    assert_eq!(recovered.cells[1].lights.len(), 2);
    // The rest of the file still decodes
    assert_eq!(recovered.cells[2], decoded.cells[2]);
    assert_eq!(recovered.path_graph, decoded.path_graph);
}

/// Append `chunk` to the PRTO version form, ahead of any checksum
fn with_layout_chunk(bytes: &[u8], chunk: Node) -> Vec<u8> {
    let mut root = iff::parse(bytes).unwrap();
    if let Node::Container { children, .. } = &mut root {
        if let Node::Container { children, .. } = &mut children[0] {
            let at = children
                .iter()
                .position(|n| n.is_leaf(Tag::new(b"CRC ")))
                .unwrap_or(children.len());
            children.insert(at, chunk);
        }
    }
    iff::serialize(&root)
}

#[test]
fn test_unknown_layout_chunk_survives() {
    let extra = Node::leaf(Tag::new(b"XTRA"), vec![1, 2, 3, 4]);
    let bytes = with_layout_chunk(&building::encode(&cantina(BuildingVersion::V4)), extra.clone());

    let decoded = building::decode(&bytes).unwrap();
    assert_eq!(decoded.trailer, iff::serialize(&extra));
    assert_eq!(building::encode(&decoded), bytes);
}

#[test]
fn test_unknown_layout_chunk_covered_by_checksum() {
    let signed = building::encode(&cantina(BuildingVersion::V3).with_checksum());
    let bytes = with_layout_chunk(&signed, Node::leaf(Tag::new(b"XTRA"), vec![9; 6]));

    let decoded = building::decode(&bytes).unwrap();
    let resigned = building::encode(&decoded);
    assert_eq!(building::verify_checksum(&resigned).unwrap(), Some(true));
    assert_eq!(building::decode(&resigned).unwrap().trailer, decoded.trailer);
}

#[test]
fn test_unknown_cell_chunk_survives() {
    let bytes = building::encode(&cantina(BuildingVersion::V3));
    let mut root = iff::parse(&bytes).unwrap();
    fn cell_bodies(node: &mut Node) -> Vec<&mut Vec<Node>> {
        match node {
            Node::Container { type_name, children } => {
                if *type_name == Tag::new(b"CELL") {
                    match children.first_mut() {
                        Some(Node::Container { children, .. }) => vec![children],
                        _ => Vec::new(),
                    }
                } else {
                    children.iter_mut().flat_map(cell_bodies).collect()
                }
            }
            Node::Leaf { .. } => Vec::new(),
        }
    }
    cell_bodies(&mut root)[1].push(Node::leaf(Tag::new(b"XTRA"), vec![0xAB]));
    let bytes = iff::serialize(&root);

    let decoded = building::decode(&bytes).unwrap();
    assert!(!decoded.cells[1].trailer.is_empty());
    assert!(decoded.cells[0].trailer.is_empty());
    assert_eq!(building::encode(&decoded), bytes);
}

#[test]
fn test_wrong_root_rejected() {
    let bytes = iff::serialize(&Node::form(Tag::new(b"FLOR"), vec![]));
    let err = building::decode(&bytes).unwrap_err();
    assert!(matches!(err.root_cause(), Error::UnexpectedForm { .. }));
}

proptest! {
    #[test]
    fn prop_fan_triangulation_law(n in 0usize..64) {
        let indices = fan_indices(n);
        prop_assert_eq!(indices.len() / 3, n.saturating_sub(2));
        for (k, tri) in indices.chunks(3).enumerate() {
            let i = (k + 2) as i32;
            prop_assert_eq!(tri, &[0, i - 1, i][..]);
        }
    }

    #[test]
    fn prop_v3_portals_regenerate_fan(n in 0usize..16) {
        let vertices: Vec<Vec3> = (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let mut b = Building::new(BuildingVersion::V3);
        b.add_portal(Portal::new(vertices.clone(), vec![7, 7, 7]));
        let decoded = building::decode(&building::encode(&b)).unwrap();
        prop_assert_eq!(decoded.portals[0].vertices.to_vec(), vertices);
        prop_assert_eq!(decoded.portals[0].triangle_count(), n.saturating_sub(2));
        prop_assert_eq!(&decoded.portals[0].indices, &fan_indices(n));
    }
}
