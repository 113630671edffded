// swgkit-parsers/src/palette.rs
//! RIFF color palette codec
//!
//! ```text
//! "RIFF"  size:u32 LE  "PAL "
//! "data"  chunk_size:u32 LE  version:u16 (0x0300)  count:u16
//! count × (r, g, b, flags)
//! ```

use serde::Serialize;
use swgkit_core::{Error, Result, Rgb};

use crate::binary::{ByteReader, ByteWriter};
use crate::iff::Tag;
use crate::traits::{Codec, ParseOptions};

const RIFF: &[u8; 4] = b"RIFF";
const PAL: &[u8; 4] = b"PAL ";
const DATA: &[u8; 4] = b"data";

/// Palette version written by the game tools
pub const PALETTE_VERSION: u16 = 0x0300;

/// Bytes before the first color entry
pub const HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    pub color: Rgb,
    pub flags: u8,
}

impl PaletteEntry {
    pub const fn new(color: Rgb) -> Self {
        Self { color, flags: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub version: u16,
    pub entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn new(colors: impl IntoIterator<Item = Rgb>) -> Self {
        Self {
            version: PALETTE_VERSION,
            entries: colors.into_iter().map(PaletteEntry::new).collect(),
        }
    }

    pub fn color(&self, index: usize) -> Option<Rgb> {
        self.entries.get(index).map(|e| e.color)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct PaletteCodec;

impl Codec for PaletteCodec {
    type Model = Palette;

    const ROOT: Option<Tag> = None;

    fn name(&self) -> &'static str {
        "Palette"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pal"]
    }

    fn decode_with_options(&self, bytes: &[u8], _options: &ParseOptions) -> Result<Palette> {
        decode(bytes)
    }

    fn encode(&self, model: &Palette) -> Vec<u8> {
        encode(model)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 12 && bytes[..4] == *RIFF && bytes[8..12] == *PAL
    }
}

pub fn decode(bytes: &[u8]) -> Result<Palette> {
    let mut r = ByteReader::new(bytes);
    let magic = r.array::<4>()?;
    let _size = r.u32_le()?;
    let kind = r.array::<4>()?;
    if magic != *RIFF || kind != *PAL {
        return Err(Error::unexpected_form(
            "RIFF PAL",
            format!("{} {}", String::from_utf8_lossy(&magic), String::from_utf8_lossy(&kind)),
        ));
    }
    if r.array::<4>()? != *DATA {
        return Err(Error::missing_chunk("data"));
    }
    let _chunk_size = r.u32_le()?;
    let version = r.u16_le()?;
    if version != PALETTE_VERSION {
        tracing::warn!(version = %format!("{:#06x}", version), "Unexpected palette version");
    }

    let count = usize::from(r.u16_le()?);
    let available = r.remaining() / 4;
    if available < count {
        tracing::warn!(declared = count, available, "Truncated palette");
    }
    let mut entries = Vec::with_capacity(count.min(available));
    for _ in 0..count.min(available) {
        let [red, green, blue, flags] = r.array::<4>()?;
        entries.push(PaletteEntry {
            color: Rgb::new(red, green, blue),
            flags,
        });
    }

    Ok(Palette { version, entries })
}

pub fn encode(palette: &Palette) -> Vec<u8> {
    let colors = palette.entries.len() * 4;
    let mut w = ByteWriter::with_capacity(HEADER_SIZE + colors);
    w.put_bytes(RIFF);
    w.put_u32_le((HEADER_SIZE - 8 + colors) as u32);
    w.put_bytes(PAL);
    w.put_bytes(DATA);
    w.put_u32_le((4 + colors) as u32);
    w.put_u16_le(palette.version);
    w.put_u16_le(palette.entries.len() as u16);
    for entry in &palette.entries {
        w.put_bytes(&[entry.color.r, entry.color.g, entry.color.b, entry.flags]);
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Palette {
        Palette::new([Rgb::new(255, 0, 0), Rgb::new(12, 34, 56), Rgb::new(0, 0, 0)])
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&sample());
        assert_eq!(bytes.len(), HEADER_SIZE + 12);
        assert_eq!(&bytes[4..8], &(bytes.len() as u32 - 8).to_le_bytes());
        assert_eq!(&bytes[20..22], &PALETTE_VERSION.to_le_bytes());
        assert!(PaletteCodec.sniff(&bytes));
    }

    #[test]
    fn test_round_trip() {
        let bytes = encode(&sample());
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(decoded.color(1), Some(Rgb::new(12, 34, 56)));
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_truncated_entries_kept() {
        let mut bytes = encode(&sample());
        bytes.truncate(bytes.len() - 2);
        assert_eq!(decode(&bytes).unwrap().len(), 2);
    }

    #[test]
    fn test_not_a_palette() {
        assert!(matches!(decode(b"RIFF\0\0\0\0WAVEdata"), Err(Error::UnexpectedForm { .. })));
    }
}
