//! core::types
//!
//! Object ids as they cross the boundary between the engine and callers.
//!
//! Ids coming out of the engine are wrapped without re-checking; ids typed
//! by a user or read back from JSON go through [`Oid::new`], which accepts
//! full-length hex in either case and stores it lowercased. Results keep
//! ids as [`Oid`] rather than `git2::Oid` so they can leave the execution
//! phase and be serialized.
//!
//! ```
//! use latchwork::core::types::Oid;
//!
//! let typed = Oid::new("E69DE29BB2D1D6434B8B29AE775AD8C2E48C5391").unwrap();
//! assert_eq!(typed.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
//! assert_eq!(typed.short(8), "e69de29b");
//!
//! // abbreviations are revisions, not ids
//! assert!(Oid::new("e69de29").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SHA1_HEX_LEN: usize = 40;
const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// Full hex id of a commit, tree, blob or tag.
///
/// Always lowercase. The length tells the hash: 40 for SHA-1
/// repositories, 64 for SHA-256 ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Parse an id given by a caller.
    ///
    /// # Errors
    ///
    /// `TypeError::InvalidOid` for abbreviated, over-long or non-hex input.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let mut hex = oid.into();
        hex.make_ascii_lowercase();
        check_hex(&hex)?;
        Ok(Self(hex))
    }

    /// Wrap an id formatted by the engine; those are already lowercase
    /// full-length hex.
    pub(crate) fn from_engine_hex(hex: String) -> Self {
        debug_assert!(check_hex(&hex).is_ok(), "engine produced invalid oid {hex}");
        Self(hex)
    }

    /// Abbreviation for display, clamped to the full id.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_hex(hex: &str) -> Result<(), TypeError> {
    match hex.len() {
        SHA1_HEX_LEN | SHA256_HEX_LEN => {}
        len => {
            return Err(TypeError::InvalidOid(format!(
                "{hex:?} has {len} characters, a full id has {SHA1_HEX_LEN} or {SHA256_HEX_LEN}"
            )));
        }
    }
    match hex.bytes().position(|b| !b.is_ascii_hexdigit()) {
        Some(at) => Err(TypeError::InvalidOid(format!(
            "{hex:?} has a non-hex character at {at}"
        ))),
        None => Ok(()),
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_BLOB_SHA1: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
    const EMPTY_BLOB_SHA256: &str =
        "473a0f4c3be8a93681a267e3b1e9a7dcda1185436fe141f7749120a303721813";

    #[test]
    fn engine_ids_pass_through_unchanged() {
        let raw = git2::Oid::from_str(EMPTY_BLOB_SHA1).unwrap();
        let oid = Oid::from_engine_hex(raw.to_string());
        assert_eq!(oid.as_str(), EMPTY_BLOB_SHA1);
        assert_eq!(Oid::new(EMPTY_BLOB_SHA1).unwrap(), oid);
    }

    #[test]
    fn sha256_repositories_produce_longer_ids() {
        let oid = Oid::new(EMPTY_BLOB_SHA256).unwrap();
        assert_eq!(oid.as_str().len(), SHA256_HEX_LEN);
    }

    #[test]
    fn typed_ids_compare_equal_to_engine_ids() {
        let typed = Oid::new(EMPTY_BLOB_SHA1.to_ascii_uppercase()).unwrap();
        let engine = Oid::from_engine_hex(EMPTY_BLOB_SHA1.to_string());
        assert_eq!(typed, engine);
    }

    #[test]
    fn abbreviations_are_not_ids() {
        let err = Oid::new(&EMPTY_BLOB_SHA1[..7]).unwrap_err();
        assert!(err.to_string().contains("7 characters"));
    }

    #[test]
    fn non_hex_position_is_reported() {
        let mut bad = EMPTY_BLOB_SHA1.to_string();
        bad.replace_range(3..4, "g");
        let err = Oid::new(bad).unwrap_err();
        assert!(err.to_string().contains("at 3"));
    }

    #[test]
    fn short_is_clamped() {
        let oid = Oid::new(EMPTY_BLOB_SHA1).unwrap();
        assert_eq!(oid.short(7), "e69de29");
        assert_eq!(oid.short(0), "");
        assert_eq!(oid.short(usize::MAX), EMPTY_BLOB_SHA1);
    }

    #[test]
    fn json_ids_are_validated() {
        let oid: Oid = serde_json::from_str(&format!("\"{EMPTY_BLOB_SHA1}\"")).unwrap();
        assert_eq!(serde_json::to_value(&oid).unwrap(), EMPTY_BLOB_SHA1);
        assert!(serde_json::from_str::<Oid>("\"HEAD\"").is_err());
    }
}
