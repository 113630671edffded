//! Four-character chunk tags

use serde::{Serialize, Serializer};

/// A four-character tag naming a chunk, a form type or a version
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Self(*bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self(arr))
    }

    /// Version tag for a number, e.g. `3` becomes `"0003"`
    pub fn version(number: u32) -> Self {
        let n = number % 10_000;
        Self([
            b'0' + (n / 1000) as u8,
            b'0' + (n / 100 % 10) as u8,
            b'0' + (n / 10 % 10) as u8,
            b'0' + (n % 10) as u8,
        ])
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Every byte is printable ASCII or a space
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|b| (0x20..=0x7E).contains(b))
    }

    /// Numeric value of a version tag such as `"0005"`
    pub fn version_number(&self) -> Option<u32> {
        if !self.is_version() {
            return None;
        }
        Some(self.0.iter().fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0')))
    }

    pub fn is_version(&self) -> bool {
        self.0.iter().all(u8::is_ascii_digit)
    }

    pub fn first_char(&self) -> char {
        self.0[0] as char
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in &self.0 {
            if (0x20..=0x7E).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tag(\"{}\")", self)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tags() {
        assert_eq!(Tag::version(3), Tag::new(b"0003"));
        assert_eq!(Tag::new(b"0004").version_number(), Some(4));
        assert_eq!(Tag::new(b"PRTO").version_number(), None);
    }

    #[test]
    fn test_validity() {
        assert!(Tag::new(b"CRC ").is_valid());
        assert!(!Tag::new(b"AB\0D").is_valid());
        assert_eq!(Tag::new(b"AB\0D").to_string(), "AB\\x00D");
    }
}
