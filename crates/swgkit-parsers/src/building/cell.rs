// swgkit-parsers/src/building/cell.rs
//! Cell records of a portal layout
//!
//! ```text
//! FORM CELL
//! └── FORM 0004 (v3) | 0005 (v4)
//!     ├── DATA        portal count, flags, name, appearance, [floor]
//!     ├── FORM NULL | EXBX | EXSP | CMSH | CMPT   collision extent (opaque)
//!     ├── PRTL × n    portal records
//!     ├── LGHT        light records
//!     └── ...         unrecognized chunks, kept as raw bytes
//! ```

use serde::Serialize;
use swgkit_core::{ColorArgb, Result, Transform};

use super::BuildingVersion;
use crate::binary::{ByteReader, ByteWriter, Endian};
use crate::iff::{self, Node, Tag};

const CELL: Tag = Tag::new(b"CELL");
const CELS: Tag = Tag::new(b"CELS");
const DATA: Tag = Tag::new(b"DATA");
const PRTL: Tag = Tag::new(b"PRTL");
const LGHT: Tag = Tag::new(b"LGHT");
const NULL: Tag = Tag::new(b"NULL");

/// Container type names accepted as a cell's collision extent
pub const COLLISION_EXTENT_TYPES: [Tag; 5] = [
    Tag::new(b"NULL"),
    Tag::new(b"EXBX"),
    Tag::new(b"EXSP"),
    Tag::new(b"CMSH"),
    Tag::new(b"CMPT"),
];

/// Size of one light record: type, two ARGB colors, transform, attenuation.
///
/// The fields sum to 93 bytes (1 + 16 + 16 + 48 + 12). Some format notes
/// quote 81-byte records; that figure does not match the listed fields, so
/// keep this in step with [`Light::write`] rather than with those notes.
pub const LIGHT_RECORD_SIZE: usize = 1 + 4 * 4 + 4 * 4 + 12 * 4 + 3 * 4;

/// An enclosed room of a building
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub name: String,
    pub appearance: String,
    pub floor: Option<String>,
    pub can_see_exterior: bool,
    pub portals: Vec<PortalRecord>,
    pub collision: CollisionExtent,
    pub lights: Vec<Light>,
    /// Serialized chunks of the cell body that are not read, written after the lights
    pub trailer: Vec<u8>,
}

impl Cell {
    pub fn new(name: impl Into<String>, appearance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            appearance: appearance.into(),
            floor: None,
            can_see_exterior: false,
            portals: Vec::new(),
            collision: CollisionExtent::default(),
            lights: Vec::new(),
            trailer: Vec::new(),
        }
    }

    pub fn with_floor(mut self, floor: impl Into<String>) -> Self {
        self.floor = Some(floor.into());
        self
    }

    pub fn with_portal(mut self, record: PortalRecord) -> Self {
        self.portals.push(record);
        self
    }
}

/// A cell's reference to one of the building's portals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalRecord {
    /// Only stored by v4 layouts
    pub disabled: bool,
    pub passable: bool,
    pub portal_id: i32,
    pub clockwise: bool,
    /// Index of the cell on the other side, negative when unconnected
    pub connecting_cell: i32,
    pub door_style: String,
    pub door_hardpoint: Option<Transform>,
}

impl PortalRecord {
    pub fn new(portal_id: i32, connecting_cell: i32) -> Self {
        Self {
            disabled: false,
            passable: true,
            portal_id,
            clockwise: false,
            connecting_cell,
            door_style: String::new(),
            door_hardpoint: None,
        }
    }

    pub fn with_hardpoint(mut self, transform: Transform) -> Self {
        self.door_hardpoint = Some(transform);
        self
    }
}

/// Collision geometry of a cell, kept as serialized bytes for round-trip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionExtent {
    pub kind: Tag,
    /// The full serialized container, header included
    pub data: Vec<u8>,
}

impl CollisionExtent {
    fn from_node(node: &Node) -> Self {
        Self {
            kind: node.label(),
            data: iff::serialize(node),
        }
    }

    fn to_node(&self) -> Node {
        match iff::parse(&self.data) {
            Some(node) => node,
            None => {
                tracing::warn!(kind = %self.kind, length = self.data.len(), "Collision extent unreadable, writing NULL");
                Node::form(NULL, Vec::new())
            }
        }
    }
}

impl Default for CollisionExtent {
    fn default() -> Self {
        Self::from_node(&Node::form(NULL, Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Light {
    pub light_type: u8,
    pub diffuse: ColorArgb,
    pub specular: ColorArgb,
    pub transform: Transform,
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

impl Light {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let light_type = reader.u8()?;
        let [a, r, g, b] = reader.floats::<4>()?;
        let diffuse = ColorArgb::new(a, r, g, b);
        let [a, r, g, b] = reader.floats::<4>()?;
        let specular = ColorArgb::new(a, r, g, b);
        let transform = Transform::from_floats(&reader.floats::<12>()?);
        let [constant_attenuation, linear_attenuation, quadratic_attenuation] = reader.floats::<3>()?;
        Ok(Self {
            light_type,
            diffuse,
            specular,
            transform,
            constant_attenuation,
            linear_attenuation,
            quadratic_attenuation,
        })
    }

    fn write(&self, w: &mut ByteWriter) {
        w.put_u8(self.light_type);
        for color in [self.diffuse, self.specular] {
            w.put_floats(&[color.a, color.r, color.g, color.b]);
        }
        w.put_floats(&self.transform.to_floats());
        w.put_floats(&[
            self.constant_attenuation,
            self.linear_attenuation,
            self.quadratic_attenuation,
        ]);
    }
}

pub(super) fn decode_cells(node: &Node, version: BuildingVersion) -> Vec<Cell> {
    node.children()
        .iter()
        .enumerate()
        .filter_map(|(index, child)| {
            if !child.is_form(CELL) {
                tracing::warn!(index, label = %child.label(), "Skipping non-cell chunk in cell list");
                return None;
            }
            Some(decode_cell(child, version, index))
        })
        .collect()
}

fn decode_cell(node: &Node, version: BuildingVersion, index: usize) -> Cell {
    let endian = version.endian();
    let mut cell = Cell::new("", "");

    let Some((cell_version, body)) = node.version_form() else {
        tracing::warn!(index, "Cell without version form");
        return cell;
    };
    if cell_version != version.cell_tag() {
        tracing::warn!(index, found = %cell_version, expected = %version.cell_tag(), "Unexpected cell version");
    }

    let mut declared_portals = None;
    let mut collision = None;
    let mut trailer = Vec::new();

    for child in body {
        match child {
            Node::Leaf { tag, data } if *tag == DATA => {
                declared_portals = decode_cell_header(data, endian, &mut cell, index);
            }
            Node::Container { type_name, .. } if COLLISION_EXTENT_TYPES.contains(type_name) => {
                if collision.is_none() {
                    collision = Some(CollisionExtent::from_node(child));
                } else {
                    tracing::warn!(index, kind = %type_name, "Keeping extra collision extent as raw bytes");
                    trailer.push(child);
                }
            }
            Node::Leaf { tag, data } if *tag == PRTL => {
                match decode_portal_record(data, version) {
                    Ok(record) => cell.portals.push(record),
                    Err(e) => tracing::warn!(index, error = %e, "Skipping truncated portal record"),
                }
            }
            Node::Leaf { tag, data } if *tag == LGHT => {
                cell.lights = decode_lights(data, endian, index);
            }
            other => {
                tracing::warn!(index, label = %other.label(), "Keeping unknown cell chunk as raw bytes");
                trailer.push(other);
            }
        }
    }

    if let Some(declared) = declared_portals {
        if usize::try_from(declared).ok() != Some(cell.portals.len()) {
            tracing::warn!(index, declared, parsed = cell.portals.len(), "Cell portal count mismatch");
        }
    } else {
        tracing::warn!(index, "Cell without header, using defaults");
    }

    cell.collision = collision.unwrap_or_default();
    cell.trailer = trailer.into_iter().flat_map(iff::serialize).collect();
    cell
}

fn decode_cell_header(data: &[u8], endian: Endian, cell: &mut Cell, index: usize) -> Option<i32> {
    fn read(reader: &mut ByteReader<'_>, endian: Endian, cell: &mut Cell) -> Result<i32> {
        let portal_count = reader.i32_with(endian)?;
        cell.can_see_exterior = reader.bool()?;
        cell.name = reader.cstring()?;
        cell.appearance = reader.cstring()?;
        cell.floor = if reader.bool()? { Some(reader.cstring()?) } else { None };
        Ok(portal_count)
    }

    match read(&mut ByteReader::new(data), endian, cell) {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(index, error = %e, "Truncated cell header");
            None
        }
    }
}

fn decode_portal_record(data: &[u8], version: BuildingVersion) -> Result<PortalRecord> {
    let mut reader = ByteReader::new(data);
    let disabled = match version {
        BuildingVersion::V4 => reader.bool()?,
        BuildingVersion::V3 => false,
    };
    let passable = reader.bool()?;
    let portal_id = reader.i32_le()?;
    let clockwise = reader.bool()?;
    let connecting_cell = reader.i32_with(version.endian())?;
    let door_style = reader.cstring()?;
    let door_hardpoint = if reader.bool()? {
        Some(Transform::from_floats(&reader.floats::<12>()?))
    } else {
        None
    };

    Ok(PortalRecord {
        disabled,
        passable,
        portal_id,
        clockwise,
        connecting_cell,
        door_style,
        door_hardpoint,
    })
}

fn decode_lights(data: &[u8], endian: Endian, index: usize) -> Vec<Light> {
    let mut reader = ByteReader::new(data);
    let declared = match reader.i32_with(endian) {
        Ok(n) => n.max(0) as usize,
        Err(_) => {
            tracing::warn!(index, "Light list without count");
            return Vec::new();
        }
    };

    let mut lights = Vec::with_capacity(declared.min(reader.remaining() / LIGHT_RECORD_SIZE));
    while lights.len() < declared {
        if reader.remaining() < LIGHT_RECORD_SIZE {
            tracing::warn!(
                index,
                declared,
                parsed = lights.len(),
                available = reader.remaining(),
                "Truncated light list"
            );
            break;
        }
        match Light::read(&mut reader) {
            Ok(light) => lights.push(light),
            Err(_) => break,
        }
    }
    lights
}

pub(super) fn encode_cells(cells: &[Cell], version: BuildingVersion) -> Node {
    Node::form(CELS, cells.iter().map(|c| encode_cell(c, version)).collect())
}

fn encode_cell(cell: &Cell, version: BuildingVersion) -> Node {
    let endian = version.endian();

    let mut header = ByteWriter::new();
    header.put_i32_with(cell.portals.len() as i32, endian);
    header.put_bool(cell.can_see_exterior);
    header.put_cstring(&cell.name);
    header.put_cstring(&cell.appearance);
    header.put_bool(cell.floor.is_some());
    if let Some(floor) = &cell.floor {
        header.put_cstring(floor);
    }

    let mut children = Vec::with_capacity(cell.portals.len() + 3);
    children.push(Node::leaf(DATA, header.into_inner()));
    children.push(cell.collision.to_node());

    for record in &cell.portals {
        let mut w = ByteWriter::new();
        if version == BuildingVersion::V4 {
            w.put_bool(record.disabled);
        }
        w.put_bool(record.passable);
        w.put_i32_le(record.portal_id);
        w.put_bool(record.clockwise);
        w.put_i32_with(record.connecting_cell, endian);
        w.put_cstring(&record.door_style);
        w.put_bool(record.door_hardpoint.is_some());
        if let Some(transform) = &record.door_hardpoint {
            w.put_floats(&transform.to_floats());
        }
        children.push(Node::leaf(PRTL, w.into_inner()));
    }

    let mut lights = ByteWriter::with_capacity(4 + cell.lights.len() * LIGHT_RECORD_SIZE);
    lights.put_i32_with(cell.lights.len() as i32, endian);
    for light in &cell.lights {
        light.write(&mut lights);
    }
    children.push(Node::leaf(LGHT, lights.into_inner()));
    children.extend(iff::parse_sequence(&cell.trailer));

    Node::form(CELL, vec![Node::form(version.cell_tag(), children)])
}
