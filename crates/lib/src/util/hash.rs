//! Fingerprinting for cache and lock identity.
//!
//! This module provides:
//! - `Fingerprint`: a stable 32-bit hash used as cache and lock key
//! - `fingerprint()`: hashing of arbitrary bytes
//! - `path_fingerprint()`: hashing of a normalized, case-folded path
//! - `Fingerprintable`: hashing of any serializable value via its JSON form

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::util::paths::path_key;

pub type HashError = serde_json::Error;

/// A stable 32-bit content hash.
///
/// Derived from the first four bytes (big-endian) of a SHA-256 digest, so it
/// does not depend on process, address or platform and survives restarts.
///
/// # Format
///
/// Displayed as 8 lowercase hexadecimal digits, e.g. `"e3b0c442"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u32);

impl Fingerprint {
  /// Parses the 8-digit hex form produced by `Display`.
  pub fn from_hex(s: &str) -> Option<Self> {
    if s.len() != 8 {
      return None;
    }
    let bytes = hex::decode(s).ok()?;
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some(Fingerprint(u32::from_be_bytes(arr)))
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", hex::encode(self.0.to_be_bytes()))
  }
}

/// Fingerprint of raw content.
///
/// Empty input is valid and hashes like any other input.
pub fn fingerprint(content: &[u8]) -> Fingerprint {
  let digest = Sha256::digest(content);
  Fingerprint(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

/// Fingerprint of a script path, insensitive to spelling and case.
///
/// Used for lock names and artifact directory names.
pub fn path_fingerprint(path: &Path) -> Fingerprint {
  fingerprint(path_key(path).as_bytes())
}

pub trait Fingerprintable: Serialize {
  fn fingerprint(&self) -> Result<Fingerprint, HashError> {
    let serialized = serde_json::to_string(self)?;
    Ok(fingerprint(serialized.as_bytes()))
  }
}
