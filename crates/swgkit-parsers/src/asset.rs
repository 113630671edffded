// swgkit-parsers/src/asset.rs
//! A decoded file of any supported format

use serde::Serialize;
use swgkit_core::Result;

use crate::building::{self, Building};
use crate::camera::{self, CameraRig};
use crate::customization::{self, CustomizationMap};
use crate::floor::{self, FloorMesh};
use crate::interior::{self, InteriorLayout};
use crate::palette::{self, Palette};
use crate::snapshot::{self, WorldSnapshot};
use crate::terrain::{self, TerrainLayers};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FormatKind {
    Building,
    FloorMesh,
    TerrainLayers,
    CustomizationMap,
    InteriorLayout,
    CameraRig,
    WorldSnapshot,
    Palette,
}

impl FormatKind {
    pub const ALL: [FormatKind; 8] = [
        FormatKind::Building,
        FormatKind::FloorMesh,
        FormatKind::TerrainLayers,
        FormatKind::CustomizationMap,
        FormatKind::InteriorLayout,
        FormatKind::CameraRig,
        FormatKind::WorldSnapshot,
        FormatKind::Palette,
    ];

    /// Stable identifier used by the registry
    pub fn id(self) -> &'static str {
        match self {
            FormatKind::Building => "pob",
            FormatKind::FloorMesh => "flr",
            FormatKind::TerrainLayers => "lay",
            FormatKind::CustomizationMap => "acst",
            FormatKind::InteriorLayout => "inly",
            FormatKind::CameraRig => "cckp",
            FormatKind::WorldSnapshot => "wsnp",
            FormatKind::Palette => "pal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "model")]
pub enum Asset {
    Building(Building),
    FloorMesh(FloorMesh),
    TerrainLayers(TerrainLayers),
    CustomizationMap(CustomizationMap),
    InteriorLayout(InteriorLayout),
    CameraRig(CameraRig),
    WorldSnapshot(WorldSnapshot),
    Palette(Palette),
}

macro_rules! impl_from_model {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Asset {
                fn from(model: $variant) -> Self {
                    Asset::$variant(model)
                }
            }
        )*
    };
}

impl_from_model!(
    Building,
    FloorMesh,
    TerrainLayers,
    CustomizationMap,
    InteriorLayout,
    CameraRig,
    WorldSnapshot,
    Palette,
);

impl Asset {
    pub fn kind(&self) -> FormatKind {
        match self {
            Asset::Building(_) => FormatKind::Building,
            Asset::FloorMesh(_) => FormatKind::FloorMesh,
            Asset::TerrainLayers(_) => FormatKind::TerrainLayers,
            Asset::CustomizationMap(_) => FormatKind::CustomizationMap,
            Asset::InteriorLayout(_) => FormatKind::InteriorLayout,
            Asset::CameraRig(_) => FormatKind::CameraRig,
            Asset::WorldSnapshot(_) => FormatKind::WorldSnapshot,
            Asset::Palette(_) => FormatKind::Palette,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Asset::Building(m) => building::encode(m),
            Asset::FloorMesh(m) => floor::encode(m),
            Asset::TerrainLayers(m) => terrain::encode(m),
            Asset::CustomizationMap(m) => customization::encode(m),
            Asset::InteriorLayout(m) => interior::encode(m),
            Asset::CameraRig(m) => camera::encode(m),
            Asset::WorldSnapshot(m) => snapshot::encode(m),
            Asset::Palette(m) => palette::encode(m),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| swgkit_core::Error::invalid_data(format!("JSON serialization failed: {e}")))
    }

    /// One-line description of the content
    pub fn summary(&self) -> String {
        match self {
            Asset::Building(b) => format!(
                "portal layout {}: {} portals, {} cells{}{}",
                b.version.tag(),
                b.portals.len(),
                b.cells.len(),
                b.path_graph.as_ref().map_or(String::new(), |g| format!(
                    ", path graph {} nodes / {} edges",
                    g.nodes.len(),
                    g.edges.len()
                )),
                b.checksum.map_or(String::new(), |c| format!(", crc {:08X}", c)),
            ),
            Asset::FloorMesh(f) => format!(
                "floor mesh: {} vertices, {} triangles, {} border edges",
                f.vertices.len(),
                f.triangles.len(),
                f.border_edges().len()
            ),
            Asset::TerrainLayers(t) => format!(
                "terrain layers{}: {} shader / {} flora / {} radial families, {} layers, {} opaque items",
                if t.wrapped { " (wrapped)" } else { "" },
                t.shader_families.families.len(),
                t.flora_families.families.len(),
                t.radial_families.families.len(),
                t.layer_count(),
                t.opaque_item_count()
            ),
            Asset::CustomizationMap(c) => format!(
                "customization map: {} assets, {} palettes, {} variables, {} combinations",
                c.asset_count(),
                c.palette_count(),
                c.variable_count(),
                c.combinations.len()
            ),
            Asset::InteriorLayout(i) => format!(
                "interior layout: {} templates, {} cells, {} placements",
                i.templates.len(),
                i.cells.len(),
                i.placements.len()
            ),
            Asset::CameraRig(c) => format!(
                "camera rig {}: {} zoom levels{}",
                c.frame,
                c.zoom_levels.len(),
                if c.hyperspace_offset.is_some() { ", hyperspace offset" } else { "" }
            ),
            Asset::WorldSnapshot(w) => format!(
                "world snapshot: {} nodes, {} templates",
                w.nodes.len(),
                w.templates.len()
            ),
            Asset::Palette(p) => format!("palette {:#06x}: {} colors", p.version, p.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swgkit_core::Rgb;

    #[test]
    fn test_kind_ids_unique() {
        let mut ids: Vec<&str> = FormatKind::ALL.iter().map(|k| k.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), FormatKind::ALL.len());
    }

    #[test]
    fn test_json_is_tagged() {
        let asset = Asset::from(Palette::new([Rgb::new(1, 2, 3)]));
        let json = asset.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["format"], "Palette");
        assert_eq!(value["model"]["entries"][0]["color"]["g"], 2);
    }

    #[test]
    fn test_encode_dispatch() {
        let rig = CameraRig::new("appearance/cockpit.apt");
        let asset = Asset::from(rig.clone());
        assert_eq!(asset.kind(), FormatKind::CameraRig);
        assert_eq!(asset.encode(), camera::encode(&rig));
        assert!(asset.summary().contains("appearance/cockpit.apt"));
    }
}
