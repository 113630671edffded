// swgkit-parsers/src/terrain/mod.rs
//! Terrain-modification (layer) codec
//!
//! # Format Structure
//! ```text
//! [FORM TGEN / FORM 0000]       optional outer wrapper
//!   FORM SGRP / FORM 0006       shader families
//!   FORM FGRP / FORM 0008       flora families
//!   FORM RGRP / FORM 0003       radial families
//!   [FORM EGRP / FORM 0002]     environment families
//!   [FORM MGRP / FORM 0000]     map families
//!   FORM LYRS / FORM 0000 / FORM LAYR*   or a single FORM LAYR
//! ```
//!
//! Whether a file was wrapped is recorded in the model and honored on encode.
//! Every boundary, filter and affector is a versioned container; layouts this
//! codec does not know are kept as raw bytes and written back unchanged.

mod affector;
mod boundary;
mod family;
mod item;
mod layer;

pub use affector::{
    Affector, ColorConstant, ColorRampFractal, ColorRampHeight, Environment, Flora, FloraCategory, FractalLayout,
    HeightConstant, HeightFractal, HeightTerrace, Passable, ShaderConstant, ShaderReplace,
};
pub use boundary::{Boundary, Circle, LocalWater, Polygon, Polyline, Rectangle};
pub use family::{
    ComplexFamily, Family, FamilyEntry, FamilyGroup, FloraChild, FloraFamily, RadialChild, RadialFamily, ShaderChild,
    ShaderFamily,
};
pub use item::{Feather, ItemHeader, OpaqueItem};
pub use layer::{Filter, Layer, LayerAttributes};

use serde::Serialize;
use swgkit_core::{Error, Result};

use crate::iff::{self, ContainerView, Node, Tag};
use crate::traits::{Codec, ParseOptions};
use family::{EFAM, MFAM};
use layer::LAYR;

/// Outer wrapper type name
pub const TGEN: Tag = Tag::new(b"TGEN");
const TGEN_VERSION: Tag = Tag::new(b"0000");
const SGRP: Tag = Tag::new(b"SGRP");
const FGRP: Tag = Tag::new(b"FGRP");
const RGRP: Tag = Tag::new(b"RGRP");
const EGRP: Tag = Tag::new(b"EGRP");
const EGRP_VERSION: Tag = Tag::new(b"0002");
const MGRP: Tag = Tag::new(b"MGRP");
const MGRP_VERSION: Tag = Tag::new(b"0000");
const LYRS: Tag = Tag::new(b"LYRS");
const LYRS_VERSION: Tag = Tag::new(b"0000");

/// Decoded terrain-modification file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainLayers {
    /// Whether the content sits inside a `TGEN` wrapper
    pub wrapped: bool,
    pub shader_families: FamilyGroup<ShaderFamily>,
    pub flora_families: FamilyGroup<FloraFamily>,
    pub radial_families: FamilyGroup<RadialFamily>,
    pub environment_families: Option<FamilyGroup<ComplexFamily>>,
    pub map_families: Option<FamilyGroup<ComplexFamily>>,
    /// Whether the layers sit in an `LYRS` list rather than a single `LAYR`
    pub layer_list: bool,
    pub layers: Vec<Layer>,
    /// Serialized chunks following the layer section
    pub trailer: Vec<u8>,
}

impl TerrainLayers {
    /// Empty, wrapped file using the current group versions
    pub fn new() -> Self {
        Self {
            wrapped: true,
            shader_families: FamilyGroup::new(<ShaderFamily as family::LeafFamily>::VERSION),
            flora_families: FamilyGroup::new(<FloraFamily as family::LeafFamily>::VERSION),
            radial_families: FamilyGroup::new(<RadialFamily as family::LeafFamily>::VERSION),
            environment_families: None,
            map_families: None,
            layer_list: true,
            layers: Vec::new(),
            trailer: Vec::new(),
        }
    }

    /// Depth-first visit of every layer with its nesting depth
    pub fn walk_layers<'a>(&'a self, mut visit: impl FnMut(&'a Layer, usize)) {
        for layer in &self.layers {
            layer.walk(&mut visit);
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.iter().map(Layer::count).sum()
    }

    /// Number of boundaries, filters and affectors kept as raw bytes
    pub fn opaque_item_count(&self) -> usize {
        let mut count = 0;
        self.walk_layers(|layer, _| {
            count += layer.boundaries.iter().filter(|b| b.is_opaque()).count()
                + layer.filters.len()
                + layer.affectors.iter().filter(|a| a.is_opaque()).count();
        });
        count
    }

    pub fn shader_family(&self, id: i32) -> Option<&ShaderFamily> {
        self.shader_families.find(id)
    }

    pub fn flora_family(&self, id: i32) -> Option<&FloraFamily> {
        self.flora_families.find(id)
    }

    pub fn radial_family(&self, id: i32) -> Option<&RadialFamily> {
        self.radial_families.find(id)
    }

    pub fn environment_family(&self, id: i32) -> Option<&ComplexFamily> {
        self.environment_families.as_ref()?.find(id)
    }
}

impl Default for TerrainLayers {
    fn default() -> Self {
        Self::new()
    }
}

/// Terrain-modification codec
pub struct TerrainCodec;

impl Codec for TerrainCodec {
    type Model = TerrainLayers;

    const ROOT: Option<Tag> = Some(TGEN);

    fn name(&self) -> &'static str {
        "Terrain Layers"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["lay"]
    }

    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> Result<TerrainLayers> {
        decode_with_options(bytes, options)
    }

    fn encode(&self, model: &TerrainLayers) -> Vec<u8> {
        encode(model)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        matches!(iff::peek_form_type(bytes), Some(t) if t == TGEN || t == SGRP)
    }
}

pub fn decode(bytes: &[u8]) -> Result<TerrainLayers> {
    decode_with_options(bytes, &ParseOptions::default())
}

pub fn decode_with_options(bytes: &[u8], options: &ParseOptions) -> Result<TerrainLayers> {
    let top = iff::parse_sequence_with_options(bytes, options);
    let first = top
        .first()
        .ok_or_else(|| Error::invalid_data("no chunk tree at start of terrain file"))?;

    let (wrapped, content): (bool, &[Node]) = match first.type_name() {
        Some(t) if t == TGEN => {
            let (version, body) = first
                .version_form()
                .ok_or_else(|| Error::missing_chunk("TGEN version form"))?;
            if version != TGEN_VERSION {
                tracing::warn!(%version, "Unexpected wrapper version");
            }
            (true, body)
        }
        Some(t) if t == SGRP => (false, top.as_slice()),
        _ => {
            return Err(Error::unexpected_form(
                format!("{} or {}", TGEN, SGRP),
                first.label().to_string(),
            ))
        }
    };

    let mut view = ContainerView::new(content);
    let shader_families = family::decode_leaf_group(view.expect_form(SGRP)?);
    let flora_families = family::decode_leaf_group(view.expect_form(FGRP)?);
    let radial_families = family::decode_leaf_group(view.expect_form(RGRP)?);
    let environment_families = view.next_form(EGRP).map(|g| family::decode_complex_group(g, EFAM, EGRP_VERSION));
    let map_families = view.next_form(MGRP).map(|g| family::decode_complex_group(g, MFAM, MGRP_VERSION));

    let (layer_list, layers) = if let Some(list) = view.next_form(LYRS) {
        (true, decode_layer_list(list))
    } else if let Some(single) = view.next_form(LAYR) {
        (false, vec![layer::decode_layer(single, 0)])
    } else {
        return Err(Error::missing_chunk("LYRS or LAYR"));
    };

    let rest = view.rest();
    for extra in rest {
        tracing::warn!(label = %extra.label(), "Keeping chunk after layer section as raw bytes");
    }
    let trailer = iff::serialize_sequence(rest);

    let model = TerrainLayers {
        wrapped,
        shader_families,
        flora_families,
        radial_families,
        environment_families,
        map_families,
        layer_list,
        layers,
        trailer,
    };

    tracing::debug!(
        wrapped,
        shader_families = model.shader_families.families.len(),
        flora_families = model.flora_families.families.len(),
        radial_families = model.radial_families.families.len(),
        layers = model.layer_count(),
        opaque_items = model.opaque_item_count(),
        "Decoded terrain layers"
    );

    Ok(model)
}

fn decode_layer_list(list: &Node) -> Vec<Layer> {
    let Some((_, body)) = list.version_form() else {
        tracing::warn!("Layer list without version form");
        return Vec::new();
    };
    body.iter()
        .filter_map(|child| {
            if child.is_form(LAYR) {
                Some(layer::decode_layer(child, 0))
            } else {
                tracing::warn!(label = %child.label(), "Skipping non-layer chunk in layer list");
                None
            }
        })
        .collect()
}

pub fn encode(model: &TerrainLayers) -> Vec<u8> {
    let mut content = vec![
        family::encode_leaf_group(SGRP, &model.shader_families),
        family::encode_leaf_group(FGRP, &model.flora_families),
        family::encode_leaf_group(RGRP, &model.radial_families),
    ];
    if let Some(group) = &model.environment_families {
        content.push(family::encode_complex_group(EGRP, EFAM, group));
    }
    if let Some(group) = &model.map_families {
        content.push(family::encode_complex_group(MGRP, MFAM, group));
    }

    let layers: Vec<Node> = model.layers.iter().map(layer::encode_layer).collect();
    if model.layer_list || layers.len() != 1 {
        content.push(Node::form(LYRS, vec![Node::form(LYRS_VERSION, layers)]));
    } else {
        content.extend(layers);
    }
    content.extend(iff::parse_sequence(&model.trailer));

    if model.wrapped {
        iff::serialize(&Node::form(TGEN, vec![Node::form(TGEN_VERSION, content)]))
    } else {
        iff::serialize_sequence(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swgkit_core::Rgb;

    fn sample() -> TerrainLayers {
        let mut model = TerrainLayers::new();
        model.shader_families.push(ShaderFamily {
            id: 1,
            name: "dirt".into(),
            surface_properties: String::new(),
            color: Rgb::new(120, 80, 40),
            feather_clamp: 0.5,
            children: vec![],
        });
        let mut layer = Layer::new("base");
        layer.boundaries.push(Boundary::Circle(Circle {
            header: Some(ItemHeader::new("circle")),
            center_x: 0.0,
            center_z: 0.0,
            radius: 100.0,
            feather: None,
        }));
        model.layers.push(layer);
        model
    }

    #[test]
    fn test_wrapped_round_trip() {
        let bytes = encode(&sample());
        assert_eq!(iff::peek_form_type(&bytes), Some(TGEN));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_unwrapped_provenance_kept() {
        let mut model = sample();
        model.wrapped = false;
        model.layer_list = false;
        let bytes = encode(&model);
        assert_eq!(iff::peek_form_type(&bytes), Some(SGRP));

        let decoded = decode(&bytes).unwrap();
        assert!(!decoded.wrapped);
        assert!(!decoded.layer_list);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_optional_groups_detected() {
        let mut model = sample();
        model.map_families = Some(FamilyGroup::new(Tag::new(b"0000")));
        let decoded = decode(&encode(&model)).unwrap();
        assert!(decoded.environment_families.is_none());
        assert_eq!(decoded.map_families, model.map_families);
    }

    #[test]
    fn test_missing_group_is_structural() {
        let bytes = iff::serialize(&Node::form(
            TGEN,
            vec![Node::form(TGEN_VERSION, vec![Node::form(SGRP, vec![Node::form(Tag::new(b"0006"), vec![])])])],
        ));
        assert!(matches!(decode(&bytes), Err(Error::MissingChunk { .. })));
    }

    #[test]
    fn test_chunk_after_layers_retained() {
        let mut content = vec![
            family::encode_leaf_group(SGRP, &FamilyGroup::<ShaderFamily>::new(Tag::new(b"0006"))),
            family::encode_leaf_group(FGRP, &FamilyGroup::<FloraFamily>::new(Tag::new(b"0008"))),
            family::encode_leaf_group(RGRP, &FamilyGroup::<RadialFamily>::new(Tag::new(b"0003"))),
            Node::form(LYRS, vec![Node::form(LYRS_VERSION, vec![])]),
        ];
        content.push(Node::leaf(Tag::new(b"XTRA"), vec![1, 2, 3]));
        let bytes = iff::serialize(&Node::form(TGEN, vec![Node::form(TGEN_VERSION, content)]));

        let decoded = decode(&bytes).unwrap();
        assert!(!decoded.trailer.is_empty());
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_wrong_root() {
        let bytes = iff::serialize(&Node::form(Tag::new(b"PRTO"), vec![]));
        assert!(matches!(decode(&bytes), Err(Error::UnexpectedForm { .. })));
    }
}
