//! In-process cache for code that has no stable file identity.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::util::hash::Fingerprint;

/// Most recent artifact per content fingerprint.
///
/// Storing under an existing fingerprint replaces the previous entry.
#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<Fingerprint, PathBuf>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// The artifact remembered for `fingerprint`, if its file still exists.
  pub fn get(&self, fingerprint: Fingerprint) -> Option<PathBuf> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    match entries.get(&fingerprint) {
      Some(path) if path.is_file() => Some(path.clone()),
      Some(_) => {
        entries.remove(&fingerprint);
        None
      }
      None => None,
    }
  }

  pub fn insert(&self, fingerprint: Fingerprint, artifact: PathBuf) {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(fingerprint, artifact);
  }

  pub fn remove(&self, fingerprint: Fingerprint) -> Option<PathBuf> {
    self
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&fingerprint)
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
