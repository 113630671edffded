// swgkit-parsers/src/customization/edit.rs
//! Mutations of a customization map
//!
//! Every add is idempotent and keeps the index tables sorted, so binary
//! search keeps working after any sequence of edits.

use serde::Serialize;
use swgkit_core::{Error, Result};

use super::{AssetSpan, ChecksumEntry, Combination, CustomizationMap, IntRange, RangeType};
use crate::crc;

/// Legal values of a variable, with table indices resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueRange {
    Palette(String),
    Int(IntRange),
}

/// A resolved customization variable of an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomizationVariable {
    pub variable: String,
    pub range: ValueRange,
    pub default: i32,
}

impl CustomizationMap {
    fn find_name(&self, offsets: &[u32], name: &str) -> Option<usize> {
        offsets
            .iter()
            .position(|&offset| self.name_at(offset).as_deref() == Some(name))
    }

    fn push_name(&mut self, name: &str) -> u32 {
        let offset = self.names.len() as u32;
        // Names are stored one byte per char, matching the reader
        self.names.extend(name.chars().map(|c| u32::from(c).min(0xFF) as u8));
        self.names.push(0);
        offset
    }

    /// Index of a palette path, appending it when new
    pub fn add_palette(&mut self, path: &str) -> usize {
        if let Some(index) = self.find_name(&self.palette_offsets, path) {
            return index;
        }
        let offset = self.push_name(path);
        self.palette_offsets.push(offset);
        self.palette_offsets.len() - 1
    }

    /// Index of a variable name, appending it when new
    pub fn add_variable(&mut self, name: &str) -> usize {
        if let Some(index) = self.find_name(&self.variable_offsets, name) {
            return index;
        }
        let offset = self.push_name(name);
        self.variable_offsets.push(offset);
        self.variable_offsets.len() - 1
    }

    /// Asset id for a path, registering it in the checksum index when new.
    ///
    /// New assets get the largest existing id plus one.
    pub fn add_asset(&mut self, path: &str) -> Result<u16> {
        let checksum = crc::path_checksum(path);
        if let Some(id) = self.find_asset_by_checksum(checksum) {
            return Ok(id);
        }

        let next = self
            .checksum_index
            .iter()
            .map(|e| e.asset_id)
            .max()
            .map_or(Some(1), |max| max.checked_add(1))
            .ok_or_else(|| Error::invalid_data("asset id space exhausted"))?;

        let at = self.checksum_index.partition_point(|e| e.checksum < checksum);
        self.checksum_index.insert(
            at,
            ChecksumEntry {
                checksum,
                asset_id: next,
            },
        );
        tracing::debug!(path, checksum = %format!("{:08X}", checksum), asset_id = next, "Registered asset");
        Ok(next)
    }

    fn insert_span(spans: &mut Vec<AssetSpan>, span: AssetSpan) -> bool {
        match spans.binary_search_by_key(&span.asset_id, |s| s.asset_id) {
            Ok(_) => false,
            Err(at) => {
                spans.insert(at, span);
                true
            }
        }
    }

    /// Point `to` at the same customization and link lists as `from`.
    ///
    /// Returns `false` when `to` already has its own entries.
    pub fn clone_customization(&mut self, from: u16, to: u16) -> Result<bool> {
        let customization = self.customization_span(from).copied();
        let link = Self::span_for(&self.links, from).copied();
        if customization.is_none() && link.is_none() {
            return Err(Error::invalid_data(format!("asset {from} has no customization to clone")));
        }

        let mut changed = false;
        if let Some(span) = customization {
            changed |= Self::insert_span(&mut self.customizations, AssetSpan { asset_id: to, ..span });
        }
        if let Some(span) = link {
            changed |= Self::insert_span(&mut self.links, AssetSpan { asset_id: to, ..span });
        }
        Ok(changed)
    }

    fn intern_range_type(&mut self, range: &ValueRange) -> Result<usize> {
        let range_type = match range {
            ValueRange::Palette(path) => RangeType::Palette(index_u16(self.add_palette(path), 0x7FFF, "palette")?),
            ValueRange::Int(int_range) => {
                let index = match self.int_ranges.iter().position(|r| r == int_range) {
                    Some(i) => i,
                    None => {
                        self.int_ranges.push(*int_range);
                        self.int_ranges.len() - 1
                    }
                };
                RangeType::IntRange(index_u16(index, 0x7FFF, "integer range")?)
            }
        };
        Ok(intern(&mut self.range_types, range_type))
    }

    /// Give an asset without customization its own list of variables.
    ///
    /// Returns `false` when the asset already has a customization entry.
    /// On error the map is left unchanged.
    pub fn add_customization(&mut self, asset_id: u16, variables: &[CustomizationVariable]) -> Result<bool> {
        if self.customization_span(asset_id).is_some() {
            return Ok(false);
        }

        let mut staged = self.clone();
        staged.append_customization(asset_id, variables)?;
        *self = staged;
        Ok(true)
    }

    fn append_customization(&mut self, asset_id: u16, variables: &[CustomizationVariable]) -> Result<()> {
        let mut entries: Vec<u16> = Vec::with_capacity(variables.len());
        for var in variables {
            let combination = Combination {
                variable: index_u16(self.add_variable(&var.variable), Combination::MAX_VARIABLE, "variable")?,
                range_type: index_u16(self.intern_range_type(&var.range)?, Combination::MAX_INDEX, "range type")?,
                default: index_u16(intern(&mut self.defaults, var.default), Combination::MAX_INDEX, "default")?,
            };
            let entry = index_u16(intern(&mut self.combinations, combination), u16::MAX, "combination")?;
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }

        let count = u8::try_from(entries.len())
            .map_err(|_| Error::invalid_data(format!("{} variables exceed one asset's limit", entries.len())))?;
        let first = index_u16(self.combination_list.len(), u16::MAX, "combination list")?;
        self.combination_list.extend_from_slice(&entries);
        Self::insert_span(
            &mut self.customizations,
            AssetSpan {
                asset_id,
                first,
                count,
            },
        );
        Ok(())
    }

    /// Give an asset without links a list of linked assets
    pub fn add_links(&mut self, asset_id: u16, linked: &[u16]) -> Result<bool> {
        if Self::span_for(&self.links, asset_id).is_some() {
            return Ok(false);
        }
        let count = u8::try_from(linked.len()).map_err(|_| Error::invalid_data("too many linked assets"))?;
        let first = index_u16(self.link_list.len(), u16::MAX, "link list")?;
        self.link_list.extend_from_slice(linked);
        Self::insert_span(
            &mut self.links,
            AssetSpan {
                asset_id,
                first,
                count,
            },
        );
        Ok(true)
    }
}

/// Index of `value` in `table`, appending it when absent
fn intern<T: PartialEq>(table: &mut Vec<T>, value: T) -> usize {
    match table.iter().position(|v| *v == value) {
        Some(i) => i,
        None => {
            table.push(value);
            table.len() - 1
        }
    }
}

fn index_u16(index: usize, max: u16, what: &str) -> Result<u16> {
    u16::try_from(index)
        .ok()
        .filter(|&i| i <= max)
        .ok_or_else(|| Error::invalid_data(format!("{what} index {index} exceeds {max}")))
}
