// swgkit-parsers/src/customization/mod.rs
//! Asset customization map codec
//!
//! Maps asset paths (by checksum) to the customization variables each asset
//! exposes. Every table is a flat leaf of fixed-size little-endian records.
//!
//! # Format Structure
//! ```text
//! FORM ACST
//! └── FORM 0000
//!     ├── NAME   NUL-terminated string blob
//!     ├── PNOF   u32 offsets into NAME: palette paths
//!     ├── VNOF   u32 offsets into NAME: variable names
//!     ├── DEFV   i32 default values
//!     ├── IRNG   (min i32, max_exclusive i32) integer ranges
//!     ├── RTYP   u16 range types: bit 15 set = palette index, else IRNG index
//!     ├── UCMP   u32 packed (variable, range type, default) combinations
//!     ├── ULST   u16 UCMP indices, shared by UIDX spans
//!     ├── UIDX   (asset u16, first u16, count u8) sorted by asset
//!     ├── LLST   u16 linked asset ids
//!     ├── LIDX   (asset u16, first u16, count u8) sorted by asset
//!     └── CIDX   (checksum u32, asset u16) sorted by checksum
//! ```
//!
//! Resolving an asset's variables takes three hops:
//! `UIDX` span → `ULST` entries → `UCMP` records → name, range and default tables.

mod edit;

pub use edit::{CustomizationVariable, ValueRange};

use serde::Serialize;
use swgkit_core::{Error, Result};

use crate::binary::{ByteReader, ByteWriter};
use crate::crc;
use crate::iff::{self, Node, Tag};
use crate::traits::{Codec, ParseOptions};

/// Root form type of a customization map
pub const ACST: Tag = Tag::new(b"ACST");
const ACST_VERSION: Tag = Tag::new(b"0000");

const NAME: Tag = Tag::new(b"NAME");
const PNOF: Tag = Tag::new(b"PNOF");
const VNOF: Tag = Tag::new(b"VNOF");
const DEFV: Tag = Tag::new(b"DEFV");
const IRNG: Tag = Tag::new(b"IRNG");
const RTYP: Tag = Tag::new(b"RTYP");
const UCMP: Tag = Tag::new(b"UCMP");
const ULST: Tag = Tag::new(b"ULST");
const UIDX: Tag = Tag::new(b"UIDX");
const LLST: Tag = Tag::new(b"LLST");
const LIDX: Tag = Tag::new(b"LIDX");
const CIDX: Tag = Tag::new(b"CIDX");

/// Table chunks in file order
const TABLES: [Tag; 12] = [NAME, PNOF, VNOF, DEFV, IRNG, RTYP, UCMP, ULST, UIDX, LLST, LIDX, CIDX];

const PALETTE_FLAG: u16 = 0x8000;

/// Integer value range, upper bound exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IntRange {
    pub min: i32,
    pub max_exclusive: i32,
}

/// Where a variable's legal values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeType {
    /// Index into the palette table
    Palette(u16),
    /// Index into the integer range table
    IntRange(u16),
}

impl RangeType {
    pub fn from_raw(raw: u16) -> Self {
        if raw & PALETTE_FLAG != 0 {
            RangeType::Palette(raw & !PALETTE_FLAG)
        } else {
            RangeType::IntRange(raw)
        }
    }

    pub fn to_raw(self) -> u16 {
        match self {
            RangeType::Palette(i) => (i & !PALETTE_FLAG) | PALETTE_FLAG,
            RangeType::IntRange(i) => i & !PALETTE_FLAG,
        }
    }
}

/// One variable binding: which variable, which range, which default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Combination {
    pub variable: u16,
    pub range_type: u16,
    pub default: u16,
}

impl Combination {
    /// Largest variable index the packed form can hold
    pub const MAX_VARIABLE: u16 = (1 << 10) - 1;
    /// Largest range type or default index the packed form can hold
    pub const MAX_INDEX: u16 = (1 << 11) - 1;

    pub fn unpack(raw: u32) -> Self {
        Self {
            variable: (raw >> 22) as u16,
            range_type: ((raw >> 11) & 0x7FF) as u16,
            default: (raw & 0x7FF) as u16,
        }
    }

    pub fn pack(self) -> u32 {
        (u32::from(self.variable & Self::MAX_VARIABLE) << 22)
            | (u32::from(self.range_type & Self::MAX_INDEX) << 11)
            | u32::from(self.default & Self::MAX_INDEX)
    }
}

/// A contiguous run of list entries owned by one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssetSpan {
    pub asset_id: u16,
    pub first: u16,
    pub count: u8,
}

impl AssetSpan {
    pub fn range(&self) -> std::ops::Range<usize> {
        let first = usize::from(self.first);
        first..first + usize::from(self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChecksumEntry {
    pub checksum: u32,
    pub asset_id: u16,
}

/// Decoded customization map
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CustomizationMap {
    pub names: Vec<u8>,
    pub palette_offsets: Vec<u32>,
    pub variable_offsets: Vec<u32>,
    pub defaults: Vec<i32>,
    pub int_ranges: Vec<IntRange>,
    pub range_types: Vec<RangeType>,
    pub combinations: Vec<Combination>,
    pub combination_list: Vec<u16>,
    pub customizations: Vec<AssetSpan>,
    pub link_list: Vec<u16>,
    pub links: Vec<AssetSpan>,
    pub checksum_index: Vec<ChecksumEntry>,
}

impl CustomizationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// String stored at a byte offset of the name blob
    pub fn name_at(&self, offset: u32) -> Option<String> {
        let tail = self.names.get(offset as usize..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(tail[..end].iter().map(|&b| b as char).collect())
    }

    pub fn palette_path(&self, index: usize) -> Option<String> {
        self.name_at(*self.palette_offsets.get(index)?)
    }

    pub fn variable_name(&self, index: usize) -> Option<String> {
        self.name_at(*self.variable_offsets.get(index)?)
    }

    pub fn palette_count(&self) -> usize {
        self.palette_offsets.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variable_offsets.len()
    }

    /// Asset id for a path, found by binary search on its checksum
    pub fn find_asset(&self, path: &str) -> Option<u16> {
        self.find_asset_by_checksum(crc::path_checksum(path))
    }

    pub fn find_asset_by_checksum(&self, checksum: u32) -> Option<u16> {
        self.checksum_index
            .binary_search_by_key(&checksum, |e| e.checksum)
            .ok()
            .map(|i| self.checksum_index[i].asset_id)
    }

    fn span_for(spans: &[AssetSpan], asset_id: u16) -> Option<&AssetSpan> {
        spans
            .binary_search_by_key(&asset_id, |s| s.asset_id)
            .ok()
            .map(|i| &spans[i])
    }

    pub fn customization_span(&self, asset_id: u16) -> Option<&AssetSpan> {
        Self::span_for(&self.customizations, asset_id)
    }

    /// Assets linked to `asset_id`
    pub fn linked_assets(&self, asset_id: u16) -> Vec<u16> {
        Self::span_for(&self.links, asset_id)
            .and_then(|span| self.link_list.get(span.range()))
            .map(<[u16]>::to_vec)
            .unwrap_or_default()
    }

    /// Full variable set of an asset; dangling references are skipped
    pub fn resolve(&self, asset_id: u16) -> Vec<CustomizationVariable> {
        let Some(span) = self.customization_span(asset_id) else {
            return Vec::new();
        };
        let Some(entries) = self.combination_list.get(span.range()) else {
            tracing::warn!(asset_id, first = span.first, count = span.count, "Customization span out of range");
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|&entry| {
                let resolved = self.resolve_combination(usize::from(entry));
                if resolved.is_none() {
                    tracing::warn!(asset_id, entry, "Dangling customization reference");
                }
                resolved
            })
            .collect()
    }

    fn resolve_combination(&self, index: usize) -> Option<CustomizationVariable> {
        let combination = self.combinations.get(index)?;
        let variable = self.variable_name(usize::from(combination.variable))?;
        let range = match *self.range_types.get(usize::from(combination.range_type))? {
            RangeType::Palette(p) => ValueRange::Palette(self.palette_path(usize::from(p))?),
            RangeType::IntRange(i) => ValueRange::Int(*self.int_ranges.get(usize::from(i))?),
        };
        let default = *self.defaults.get(usize::from(combination.default))?;
        Some(CustomizationVariable {
            variable,
            range,
            default,
        })
    }

    /// Whether every index table is sorted by its search key
    pub fn is_sorted(&self) -> bool {
        self.checksum_index.windows(2).all(|w| w[0].checksum <= w[1].checksum)
            && self.customizations.windows(2).all(|w| w[0].asset_id <= w[1].asset_id)
            && self.links.windows(2).all(|w| w[0].asset_id <= w[1].asset_id)
    }

    pub fn asset_count(&self) -> usize {
        self.checksum_index.len()
    }
}

/// Customization map codec
pub struct CustomizationCodec;

impl Codec for CustomizationCodec {
    type Model = CustomizationMap;

    const ROOT: Option<Tag> = Some(ACST);

    fn name(&self) -> &'static str {
        "Customization Map"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["iff"]
    }

    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> Result<CustomizationMap> {
        decode_with_options(bytes, options)
    }

    fn encode(&self, model: &CustomizationMap) -> Vec<u8> {
        encode(model)
    }
}

pub fn decode(bytes: &[u8]) -> Result<CustomizationMap> {
    decode_with_options(bytes, &ParseOptions::default())
}

pub fn decode_with_options(bytes: &[u8], options: &ParseOptions) -> Result<CustomizationMap> {
    let root = iff::parse_with_options(bytes, options)
        .ok_or_else(|| Error::invalid_data("no chunk tree at start of customization map"))?;
    if !root.is_form(ACST) {
        return Err(Error::unexpected_form(ACST.to_string(), root.label().to_string()));
    }
    let (version, body) = root
        .version_form()
        .ok_or_else(|| Error::missing_chunk("ACST version form"))?;
    if version != ACST_VERSION {
        return Err(Error::UnsupportedVersion {
            version: version.to_string(),
            supported: ACST_VERSION.to_string(),
        });
    }

    let leaf = |tag: Tag| table_bytes(body, tag);

    for node in body.iter().filter(|n| !TABLES.contains(&n.label())) {
        tracing::warn!(label = %node.label(), "Skipping unknown customization chunk");
    }

    let map = CustomizationMap {
        names: leaf(NAME).to_vec(),
        palette_offsets: records(leaf(PNOF), PNOF, 4, |r| r.u32_le()),
        variable_offsets: records(leaf(VNOF), VNOF, 4, |r| r.u32_le()),
        defaults: records(leaf(DEFV), DEFV, 4, |r| r.i32_le()),
        int_ranges: records(leaf(IRNG), IRNG, 8, |r| {
            Ok(IntRange {
                min: r.i32_le()?,
                max_exclusive: r.i32_le()?,
            })
        }),
        range_types: records(leaf(RTYP), RTYP, 2, |r| r.u16_le().map(RangeType::from_raw)),
        combinations: records(leaf(UCMP), UCMP, 4, |r| r.u32_le().map(Combination::unpack)),
        combination_list: records(leaf(ULST), ULST, 2, |r| r.u16_le()),
        customizations: records(leaf(UIDX), UIDX, 5, read_span),
        link_list: records(leaf(LLST), LLST, 2, |r| r.u16_le()),
        links: records(leaf(LIDX), LIDX, 5, read_span),
        checksum_index: records(leaf(CIDX), CIDX, 6, |r| {
            Ok(ChecksumEntry {
                checksum: r.u32_le()?,
                asset_id: r.u16_le()?,
            })
        }),
    };

    if !map.is_sorted() {
        tracing::warn!("Customization index tables are not sorted; lookups may miss entries");
    }

    tracing::debug!(
        palettes = map.palette_count(),
        variables = map.variable_count(),
        combinations = map.combinations.len(),
        assets = map.asset_count(),
        customized = map.customizations.len(),
        "Decoded customization map"
    );

    Ok(map)
}

fn table_bytes(body: &[Node], tag: Tag) -> &[u8] {
    match body.iter().find(|n| n.is_leaf(tag)).and_then(Node::data) {
        Some(data) => data,
        None => {
            tracing::debug!(%tag, "Customization table absent, using empty");
            &[]
        }
    }
}

fn read_span(r: &mut ByteReader<'_>) -> Result<AssetSpan> {
    Ok(AssetSpan {
        asset_id: r.u16_le()?,
        first: r.u16_le()?,
        count: r.u8()?,
    })
}

/// Read a table of fixed-size records; a partial trailing record is dropped
fn records<T>(
    data: &[u8],
    tag: Tag,
    record_size: usize,
    mut read: impl FnMut(&mut ByteReader<'_>) -> Result<T>,
) -> Vec<T> {
    if data.len() % record_size != 0 {
        tracing::warn!(%tag, length = data.len(), record_size, "Table has a partial trailing record");
    }
    let mut reader = ByteReader::new(data);
    let mut out = Vec::with_capacity(data.len() / record_size);
    while reader.remaining() >= record_size {
        match read(&mut reader) {
            Ok(value) => out.push(value),
            Err(_) => break,
        }
    }
    out
}

pub fn encode(map: &CustomizationMap) -> Vec<u8> {
    fn table<T>(tag: Tag, items: &[T], record_size: usize, mut write: impl FnMut(&mut ByteWriter, &T)) -> Node {
        let mut w = ByteWriter::with_capacity(items.len() * record_size);
        for item in items {
            write(&mut w, item);
        }
        Node::leaf(tag, w.into_inner())
    }

    fn write_span(w: &mut ByteWriter, s: &AssetSpan) {
        w.put_u16_le(s.asset_id);
        w.put_u16_le(s.first);
        w.put_u8(s.count);
    }

    let children = vec![
        Node::leaf(NAME, map.names.clone()),
        table(PNOF, &map.palette_offsets, 4, |w, &v| w.put_u32_le(v)),
        table(VNOF, &map.variable_offsets, 4, |w, &v| w.put_u32_le(v)),
        table(DEFV, &map.defaults, 4, |w, &v| w.put_i32_le(v)),
        table(IRNG, &map.int_ranges, 8, |w, r| {
            w.put_i32_le(r.min);
            w.put_i32_le(r.max_exclusive);
        }),
        table(RTYP, &map.range_types, 2, |w, t| w.put_u16_le(t.to_raw())),
        table(UCMP, &map.combinations, 4, |w, c| w.put_u32_le(c.pack())),
        table(ULST, &map.combination_list, 2, |w, &v| w.put_u16_le(v)),
        table(UIDX, &map.customizations, 5, write_span),
        table(LLST, &map.link_list, 2, |w, &v| w.put_u16_le(v)),
        table(LIDX, &map.links, 5, write_span),
        table(CIDX, &map.checksum_index, 6, |w, e| {
            w.put_u32_le(e.checksum);
            w.put_u16_le(e.asset_id);
        }),
    ];

    iff::serialize(&Node::form(ACST, vec![Node::form(ACST_VERSION, children)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combination_packing() {
        let c = Combination {
            variable: 1023,
            range_type: 5,
            default: 2047,
        };
        assert_eq!(Combination::unpack(c.pack()), c);
        assert_eq!(c.pack() >> 22, 1023);
    }

    #[test]
    fn test_range_type_flag() {
        assert_eq!(RangeType::from_raw(0x8003), RangeType::Palette(3));
        assert_eq!(RangeType::from_raw(0x0003), RangeType::IntRange(3));
        assert_eq!(RangeType::Palette(3).to_raw(), 0x8003);
    }

    #[test]
    fn test_absent_tables_decode_empty() {
        let bytes = iff::serialize(&Node::form(
            ACST,
            vec![Node::form(ACST_VERSION, vec![Node::leaf(NAME, b"a\0".to_vec())])],
        ));
        let map = decode(&bytes).unwrap();
        assert_eq!(map.names, b"a\0");
        assert!(map.checksum_index.is_empty());

        // All twelve tables are written back
        let root = iff::parse(&encode(&map)).unwrap();
        assert_eq!(root.version_form().unwrap().1.len(), 12);
    }

    #[test]
    fn test_partial_record_dropped() {
        let data = [1, 0, 2, 0, 3];
        let values = records(&data, ULST, 2, |r| r.u16_le());
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_name_lookup() {
        let map = CustomizationMap {
            names: b"/shared_owner/index_color_1\0palette/hair.pal\0".to_vec(),
            palette_offsets: vec![28],
            variable_offsets: vec![0],
            ..CustomizationMap::default()
        };
        assert_eq!(map.variable_name(0).as_deref(), Some("/shared_owner/index_color_1"));
        assert_eq!(map.palette_path(0).as_deref(), Some("palette/hair.pal"));
        assert_eq!(map.palette_path(1), None);
    }
}
