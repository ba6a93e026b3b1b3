//! Path normalization helpers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns an absolute form of `path` without requiring it to exist.
///
/// Existing paths are canonicalized (symlinks resolved, no `\\?\` prefix on
/// Windows); missing ones are made absolute against the current directory.
pub fn normalize(path: &Path) -> PathBuf {
  if let Ok(canonical) = dunce::canonicalize(path) {
    return canonical;
  }
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Case-folded string form of the normalized path.
///
/// Two spellings of the same file map to the same key even on
/// case-insensitive file systems.
pub fn path_key(path: &Path) -> String {
  normalize(path).to_string_lossy().to_lowercase()
}

/// Removes duplicate paths, comparing case-insensitively.
///
/// First occurrence wins and input order is preserved. Trailing separators do
/// not make two entries distinct.
pub fn dedup_paths<I, P>(paths: I) -> Vec<PathBuf>
where
  I: IntoIterator<Item = P>,
  P: AsRef<Path>,
{
  let mut seen = HashSet::new();
  let mut result = Vec::new();
  for dir in paths {
    let dir = dir.as_ref();
    let key = path_key(dir).trim_end_matches(['/', '\\']).to_string();
    if seen.insert(key) {
      result.push(dir.to_path_buf());
    }
  }
  result
}

/// Last-write time of `path`, or `None` when it cannot be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
  std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Nanoseconds since the Unix epoch; earlier times clamp to zero.
pub fn unix_nanos(time: SystemTime) -> u128 {
  time.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}
