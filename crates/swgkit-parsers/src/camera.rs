// swgkit-parsers/src/camera.rs
//! Cockpit camera rig codec
//!
//! ```text
//! FORM CCKP
//! └── FORM 0001
//!     ├── FRAM   frame appearance path
//!     ├── ZOOM   zoom levels, one f32 each
//!     ├── FRST   first zoom level index as f32
//!     ├── 3OFF   third-person offset
//!     ├── 1OFF   first-person offset
//!     └── FORM HYPR / OFST   optional hyperspace offset
//! ```

use serde::Serialize;
use swgkit_core::{Error, Result, ResultExt, Vec3};

use crate::binary::{ByteReader, ByteWriter};
use crate::iff::{self, Node, Tag};
use crate::traits::{Codec, ParseOptions};

/// Root form type of a camera rig
pub const CCKP: Tag = Tag::new(b"CCKP");
const CCKP_VERSION: Tag = Tag::new(b"0001");
const FRAM: Tag = Tag::new(b"FRAM");
const ZOOM: Tag = Tag::new(b"ZOOM");
const FRST: Tag = Tag::new(b"FRST");
const THIRD_OFFSET: Tag = Tag::new(b"3OFF");
const FIRST_OFFSET: Tag = Tag::new(b"1OFF");
const HYPR: Tag = Tag::new(b"HYPR");
const OFST: Tag = Tag::new(b"OFST");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraRig {
    pub frame: String,
    pub zoom_levels: Vec<f32>,
    pub first_zoom: f32,
    pub third_person_offset: Vec3,
    pub first_person_offset: Vec3,
    pub hyperspace_offset: Option<Vec3>,
}

impl CameraRig {
    pub fn new(frame: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            zoom_levels: Vec::new(),
            first_zoom: 0.0,
            third_person_offset: Vec3::ZERO,
            first_person_offset: Vec3::ZERO,
            hyperspace_offset: None,
        }
    }
}

pub struct CameraCodec;

impl Codec for CameraCodec {
    type Model = CameraRig;

    const ROOT: Option<Tag> = Some(CCKP);

    fn name(&self) -> &'static str {
        "Camera Rig"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["iff"]
    }

    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> Result<CameraRig> {
        decode_with_options(bytes, options)
    }

    fn encode(&self, model: &CameraRig) -> Vec<u8> {
        encode(model)
    }
}

pub fn decode(bytes: &[u8]) -> Result<CameraRig> {
    decode_with_options(bytes, &ParseOptions::default())
}

fn read_vec3(body: &[Node], tag: Tag) -> Vec3 {
    match body.iter().find(|n| n.is_leaf(tag)).and_then(Node::data) {
        Some(data) => ByteReader::new(data).vec3().unwrap_or_else(|e| {
            tracing::warn!(%tag, error = %e, "Malformed offset");
            Vec3::ZERO
        }),
        None => {
            tracing::warn!(%tag, "Offset absent");
            Vec3::ZERO
        }
    }
}

pub fn decode_with_options(bytes: &[u8], options: &ParseOptions) -> Result<CameraRig> {
    let root = iff::parse_with_options(bytes, options)
        .ok_or_else(|| Error::invalid_data("no chunk tree at start of camera rig"))?;
    if !root.is_form(CCKP) {
        return Err(Error::unexpected_form(CCKP.to_string(), root.label().to_string()));
    }
    let (version, body) = root
        .version_form()
        .ok_or_else(|| Error::missing_chunk("CCKP version form"))?;
    if version != CCKP_VERSION {
        tracing::warn!(%version, "Unexpected camera rig version");
    }

    let frame = body
        .iter()
        .find(|n| n.is_leaf(FRAM))
        .and_then(Node::data)
        .ok_or_else(|| Error::missing_chunk(FRAM.to_string()))
        .and_then(|data| ByteReader::new(data).cstring())
        .context("camera frame")?;

    let zoom_levels = body
        .iter()
        .find(|n| n.is_leaf(ZOOM))
        .and_then(Node::data)
        .map(|data| {
            if data.len() % 4 != 0 {
                tracing::warn!(length = data.len(), "Zoom table has trailing bytes");
            }
            data.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
        .unwrap_or_default();

    let first_zoom = body
        .iter()
        .find(|n| n.is_leaf(FRST))
        .and_then(Node::data)
        .and_then(|data| ByteReader::new(data).f32().ok())
        .unwrap_or_default();

    let hyperspace_offset = body
        .iter()
        .find(|n| n.is_form(HYPR))
        .map(|hypr| read_vec3(hypr.children(), OFST));

    Ok(CameraRig {
        frame,
        zoom_levels,
        first_zoom,
        third_person_offset: read_vec3(body, THIRD_OFFSET),
        first_person_offset: read_vec3(body, FIRST_OFFSET),
        hyperspace_offset,
    })
}

pub fn encode(rig: &CameraRig) -> Vec<u8> {
    let vec3_leaf = |tag: Tag, v: Vec3| {
        let mut w = ByteWriter::with_capacity(12);
        w.put_vec3(v);
        Node::leaf(tag, w.into_inner())
    };

    let mut frame = ByteWriter::new();
    frame.put_cstring(&rig.frame);

    let mut zoom = ByteWriter::with_capacity(rig.zoom_levels.len() * 4);
    zoom.put_floats(&rig.zoom_levels);

    let mut first = ByteWriter::with_capacity(4);
    first.put_f32(rig.first_zoom);

    let mut children = vec![
        Node::leaf(FRAM, frame.into_inner()),
        Node::leaf(ZOOM, zoom.into_inner()),
        Node::leaf(FRST, first.into_inner()),
        vec3_leaf(THIRD_OFFSET, rig.third_person_offset),
        vec3_leaf(FIRST_OFFSET, rig.first_person_offset),
    ];
    if let Some(offset) = rig.hyperspace_offset {
        children.push(Node::form(HYPR, vec![vec3_leaf(OFST, offset)]));
    }

    iff::serialize(&Node::form(CCKP, vec![Node::form(CCKP_VERSION, children)]))
}
