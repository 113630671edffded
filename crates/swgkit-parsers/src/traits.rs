// swgkit-parsers/src/traits.rs
//! Core traits defining the codec interface for all file formats.
//!
//! Every format exposes exactly two operations to collaborators:
//! `decode(bytes) -> Model` and `encode(&Model) -> bytes`. Decoding never
//! fails for recoverable malformation; only structural problems (wrong root
//! form, missing mandatory chunk) are returned as errors.

use serde::Serialize;

use crate::iff::Tag;

pub use swgkit_core::{Error as ParseError, Result as ParseResult};

/// Configuration options for decoding
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum container nesting depth; deeper forms are skipped
    pub max_nesting_depth: u32,
    /// Fail when a stored checksum does not match the recomputed one
    pub verify_checksums: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            verify_checksums: false,
        }
    }
}

impl ParseOptions {
    /// Options with checksum verification switched on
    pub fn strict() -> Self {
        Self {
            verify_checksums: true,
            ..Self::default()
        }
    }
}

/// Core trait for all format codecs
///
/// Implementors are zero-sized; all state lives in the decoded model.
pub trait Codec: Send + Sync {
    /// The decoded domain model
    type Model: Serialize;

    /// Root container type name, `None` for formats that are not tree-framed
    const ROOT: Option<Tag>;

    /// Returns a human-readable name for this codec
    fn name(&self) -> &'static str;

    /// Returns the file extensions this codec handles (e.g., ["pob"])
    fn extensions(&self) -> &'static [&'static str];

    /// Decode with custom options
    fn decode_with_options(&self, bytes: &[u8], options: &ParseOptions) -> ParseResult<Self::Model>;

    /// Decode with default options
    fn decode(&self, bytes: &[u8]) -> ParseResult<Self::Model> {
        self.decode_with_options(bytes, &ParseOptions::default())
    }

    /// Encode a model; the model is trusted and not validated
    fn encode(&self, model: &Self::Model) -> Vec<u8>;

    /// Cheap check whether `bytes` look like this format
    fn sniff(&self, bytes: &[u8]) -> bool {
        match Self::ROOT {
            Some(root) => crate::iff::peek_form_type(bytes) == Some(root),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert_eq!(options.max_nesting_depth, 64);
        assert!(!options.verify_checksums);
        assert!(ParseOptions::strict().verify_checksums);
    }

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::missing_chunk("DATA");
        let contextualized = error.with_context("parsing header");

        match contextualized {
            ParseError::WithContext { context, .. } => {
                assert_eq!(context, "parsing header");
            }
            _ => panic!("Expected WithContext error"),
        }
    }
}
