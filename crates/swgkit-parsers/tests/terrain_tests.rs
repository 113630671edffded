//! Integration tests for the terrain-modification codec

use swgkit_core::Rgb;
use swgkit_parsers::iff::{self, Node, Tag};
use swgkit_parsers::terrain::{
    self, Affector, Boundary, Circle, Feather, HeightConstant, ItemHeader, Layer, Rectangle, ShaderFamily,
    TerrainLayers,
};

fn base_model() -> TerrainLayers {
    let mut model = TerrainLayers::new();
    model.shader_families.push(ShaderFamily {
        id: 3,
        name: "sand".into(),
        surface_properties: String::new(),
        color: Rgb::new(200, 180, 120),
        feather_clamp: 0.25,
        children: vec![],
    });

    let mut outer = Layer::new("town flatten");
    outer.boundaries.push(Boundary::Circle(Circle {
        header: Some(ItemHeader::new("center")),
        center_x: 3400.0,
        center_z: -4800.0,
        radius: 250.0,
        feather: Some(Feather {
            feather_type: 1,
            amount: 0.5,
        }),
    }));
    outer.affectors.push(Affector::HeightConstant(HeightConstant {
        header: Some(ItemHeader::new("flat")),
        operation: 0,
        height: 5.0,
    }));
    outer.children.push(Layer::new("plaza"));
    model.layers.push(outer);
    model
}

/// Append `item` to the body of the first top-level layer
fn inject_into_first_layer(bytes: &[u8], item: Node) -> Vec<u8> {
    fn find_layer(node: &mut Node) -> Option<&mut Vec<Node>> {
        match node {
            Node::Container { type_name, children } => {
                if *type_name == Tag::new(b"LAYR") {
                    match children.first_mut() {
                        Some(Node::Container { children, .. }) => Some(children),
                        _ => None,
                    }
                } else {
                    children.iter_mut().find_map(find_layer)
                }
            }
            Node::Leaf { .. } => None,
        }
    }

    let mut root = iff::parse(bytes).unwrap();
    let body = find_layer(&mut root).unwrap();
    // Keep canonical order: items go before child layers
    let at = body
        .iter()
        .position(|n| n.is_form(Tag::new(b"LAYR")))
        .unwrap_or(body.len());
    body.insert(at, item);
    iff::serialize(&root)
}

#[test]
fn test_unknown_affector_round_trips_unchanged() {
    let unknown = Node::form(
        Tag::new(b"AXYZ"),
        vec![Node::form(
            Tag::new(b"0007"),
            vec![
                Node::form(
                    Tag::new(b"IHDR"),
                    vec![Node::form(Tag::new(b"0001"), vec![Node::leaf(Tag::new(b"DATA"), b"\x01\0\0\0mystery\0".to_vec())])],
                ),
                Node::leaf(Tag::new(b"DATA"), vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01]),
                Node::leaf(Tag::new(b"XTRA"), vec![9; 7]),
            ],
        )],
    );
    let bytes = inject_into_first_layer(&terrain::encode(&base_model()), unknown);

    let decoded = terrain::decode(&bytes).unwrap();
    let layer = &decoded.layers[0];
    assert_eq!(layer.affectors.len(), 2);
    assert!(layer.affectors[1].is_opaque());
    assert_eq!(layer.affectors[1].kind(), Tag::new(b"AXYZ"));
    assert_eq!(decoded.opaque_item_count(), 1);

    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_known_kind_with_unknown_version_is_opaque() {
    let odd = Node::form(
        Tag::new(b"AHCN"),
        vec![Node::form(Tag::new(b"0042"), vec![Node::leaf(Tag::new(b"DATA"), vec![1, 2, 3])])],
    );
    let bytes = inject_into_first_layer(&terrain::encode(&base_model()), odd);
    let decoded = terrain::decode(&bytes).unwrap();
    assert!(decoded.layers[0].affectors[1].is_opaque());
    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_feather_amount_clamped_on_read() {
    let mut model = base_model();
    if let Boundary::Circle(circle) = &mut model.layers[0].boundaries[0] {
        circle.feather = Some(Feather {
            feather_type: 1,
            amount: 3.5,
        });
    }
    let decoded = terrain::decode(&terrain::encode(&model)).unwrap();
    match &decoded.layers[0].boundaries[0] {
        Boundary::Circle(circle) => assert_eq!(circle.feather.map(|f| f.amount), Some(1.0)),
        other => panic!("expected circle, got {:?}", other),
    }
}

#[test]
fn test_nested_layers_and_rectangle() {
    let mut model = base_model();
    let mut inner = Layer::new("market");
    inner.boundaries.push(Boundary::Rectangle(Rectangle {
        header: Some(ItemHeader::new("stalls")),
        x0: -10.0,
        z0: -10.0,
        x1: 10.0,
        z1: 10.0,
        feather: Feather::NONE,
        water: None,
    }));
    model.layers[0].children[0].children.push(inner);

    let bytes = terrain::encode(&model);
    let decoded = terrain::decode(&bytes).unwrap();
    assert_eq!(decoded.layer_count(), 3);

    let mut depths = Vec::new();
    decoded.walk_layers(|layer, depth| depths.push((layer.description(), depth)));
    assert_eq!(depths, vec![("town flatten", 0), ("plaza", 1), ("market", 2)]);
    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_family_lookup() {
    let decoded = terrain::decode(&terrain::encode(&base_model())).unwrap();
    assert_eq!(decoded.shader_family(3).map(|f| f.name.as_str()), Some("sand"));
    assert!(decoded.flora_family(3).is_none());
}

fn group(tag: &[u8; 4], version: &[u8; 4], children: Vec<Node>) -> Node {
    Node::form(Tag::new(tag), vec![Node::form(Tag::new(version), children)])
}

/// Hand-assembled wrapped file around the given shader group and layers
fn assemble(shader_group: Node, layers: Vec<Node>) -> Vec<u8> {
    let content = vec![
        shader_group,
        group(b"FGRP", b"0008", vec![]),
        group(b"RGRP", b"0003", vec![]),
        group(b"LYRS", b"0000", layers),
    ];
    iff::serialize(&Node::form(terrain::TGEN, vec![Node::form(Tag::new(b"0000"), content)]))
}

fn empty_layer() -> Node {
    group(b"LAYR", b"0003", vec![])
}

#[test]
fn test_older_shader_group_round_trips_unchanged() {
    let mut sfam = 7i32.to_le_bytes().to_vec();
    sfam.extend_from_slice(b"old\0");
    sfam.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
    let bytes = assemble(
        group(b"SGRP", b"0005", vec![Node::leaf(Tag::new(b"SFAM"), sfam)]),
        vec![empty_layer()],
    );

    let decoded = terrain::decode(&bytes).unwrap();
    assert_eq!(decoded.shader_families.version, Tag::new(b"0005"));
    assert_eq!(decoded.shader_families.opaque_count(), 1);
    assert!(decoded.shader_family(7).is_none());
    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_truncated_shader_family_retained() {
    let bytes = assemble(
        group(b"SGRP", b"0006", vec![Node::leaf(Tag::new(b"SFAM"), vec![1, 2, 3])]),
        vec![empty_layer()],
    );

    let decoded = terrain::decode(&bytes).unwrap();
    assert_eq!(decoded.shader_families.families.len(), 1);
    assert!(decoded.shader_families.families[0].is_opaque());
    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_bare_layer_round_trips_without_additions() {
    let bytes = assemble(group(b"SGRP", b"0006", vec![]), vec![empty_layer()]);

    let decoded = terrain::decode(&bytes).unwrap();
    let layer = &decoded.layers[0];
    assert!(layer.header.is_none());
    assert!(layer.attributes.is_none());
    assert!(layer.enabled());
    assert_eq!(terrain::encode(&decoded), bytes);
}

#[test]
fn test_unknown_layer_leaf_survives() {
    let bytes = inject_into_first_layer(
        &terrain::encode(&base_model()),
        Node::leaf(Tag::new(b"XTRA"), vec![0x10, 0x20]),
    );
    let decoded = terrain::decode(&bytes).unwrap();
    assert!(!decoded.layers[0].extra.is_empty());
    assert_eq!(terrain::encode(&decoded), bytes);
}
