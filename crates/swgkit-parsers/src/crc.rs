//! 32-bit CRC used for path identity and file checksums
//!
//! MSB-first, polynomial `0x04C11DB7`, seeded with all ones and complemented
//! at the end. The lookup table is computed once on first use.
//!
//! Two input profiles exist: object-template identity lowercases the path
//! before hashing, asset-customization identity hashes it verbatim.

use once_cell::sync::Lazy;

/// CRC polynomial
pub const POLYNOMIAL: u32 = 0x04C1_1DB7;

const INITIAL: u32 = 0xFFFF_FFFF;

static TABLE: Lazy<[u32; 256]> = Lazy::new(|| {
    let mut table = [0u32; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = (i as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
        }
        *entry = crc;
    }
    table
});

/// Incremental CRC hasher
#[derive(Debug, Clone, Copy)]
pub struct Crc {
    state: u32,
}

impl Crc {
    pub fn new() -> Self {
        Self { state: INITIAL }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let table = &*TABLE;
        for &b in bytes {
            let index = ((self.state >> 24) ^ u32::from(b)) & 0xFF;
            self.state = table[index as usize] ^ (self.state << 8);
        }
    }

    pub fn finish(&self) -> u32 {
        self.state ^ INITIAL
    }
}

impl Default for Crc {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC of a byte slice
pub fn calculate(bytes: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(bytes);
    crc.finish()
}

/// Asset-customization identity: the path is hashed as given
pub fn path_checksum(path: &str) -> u32 {
    calculate(path.as_bytes())
}

/// Object-template identity: the path is lowercased first
pub fn template_checksum(path: &str) -> u32 {
    calculate(path.to_ascii_lowercase().as_bytes())
}
