//! Cache inspection and cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::ArtifactRecord;
use crate::consts::{DYNAMIC_DIR, LOCKS_DIR, RECORD_EXTENSION};
use crate::util::hash::Fingerprint;

#[derive(Debug, Error)]
pub enum GcError {
  #[error("failed to read cache directory {path}: {source}")]
  ReadCache {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to delete {path}: {source}")]
  Delete {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// One cached script as found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryInfo {
  pub dir: PathBuf,
  pub script: PathBuf,
  pub artifact: PathBuf,
  pub script_exists: bool,
  pub bytes: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct PurgeStats {
  pub entries_scanned: usize,
  pub entries_deleted: usize,
  pub bytes_freed: u64,
}

#[derive(Debug, Serialize)]
pub struct PurgeResult {
  pub stats: PurgeStats,
  pub deleted_paths: Vec<PathBuf>,
}

fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .into_iter()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

fn is_entry_dir(path: &Path) -> bool {
  path.is_dir()
    && path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|n| Fingerprint::from_hex(n).is_some())
}

fn find_record(dir: &Path) -> Option<ArtifactRecord> {
  let entries = fs::read_dir(dir).ok()?;
  entries
    .flatten()
    .map(|e| e.path())
    .filter(|p| p.extension().is_some_and(|ext| ext == RECORD_EXTENSION))
    .find_map(|p| ArtifactRecord::read(&p).ok())
}

/// Lists cache entries under `root` that carry a readable record.
pub fn entries(root: &Path) -> Result<Vec<CacheEntryInfo>, GcError> {
  if !root.exists() {
    return Ok(Vec::new());
  }
  let dir_entries = fs::read_dir(root).map_err(|source| GcError::ReadCache {
    path: root.to_path_buf(),
    source,
  })?;

  let mut result = Vec::new();
  for entry in dir_entries.flatten() {
    let dir = entry.path();
    if !is_entry_dir(&dir) {
      continue;
    }
    if let Some(record) = find_record(&dir) {
      result.push(CacheEntryInfo {
        script_exists: record.script.is_file(),
        bytes: dir_size(&dir),
        script: record.script,
        artifact: record.artifact,
        dir,
      });
    }
  }
  result.sort_by(|a, b| a.script.cmp(&b.script));
  Ok(result)
}

/// Removes entries whose script no longer exists, and entries without a
/// readable record (interrupted or foreign writes).
///
/// Per-directory deletion failures are logged and skipped.
pub fn purge(root: &Path, dry_run: bool) -> Result<PurgeResult, GcError> {
  let mut stats = PurgeStats::default();
  let mut deleted_paths = Vec::new();

  if !root.exists() {
    return Ok(PurgeResult { stats, deleted_paths });
  }
  let dir_entries = fs::read_dir(root).map_err(|source| GcError::ReadCache {
    path: root.to_path_buf(),
    source,
  })?;

  for entry in dir_entries.flatten() {
    let path = entry.path();
    if !is_entry_dir(&path) {
      continue;
    }
    stats.entries_scanned += 1;

    match find_record(&path) {
      Some(record) if record.script.is_file() => continue,
      Some(record) => debug!(path = %path.display(), script = %record.script.display(), "removing entry for deleted script"),
      None => debug!(path = %path.display(), "removing entry without record"),
    }

    let size = dir_size(&path);
    if dry_run {
      stats.entries_deleted += 1;
      stats.bytes_freed += size;
      deleted_paths.push(path);
    } else {
      match fs::remove_dir_all(&path) {
        Ok(()) => {
          stats.entries_deleted += 1;
          stats.bytes_freed += size;
          deleted_paths.push(path);
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "failed to delete cache entry");
        }
      }
    }
  }

  info!(
    entries_deleted = stats.entries_deleted,
    bytes_freed = stats.bytes_freed,
    dry_run,
    "cache purge complete"
  );

  Ok(PurgeResult { stats, deleted_paths })
}

/// Deletes every cache entry and dynamic source under `root`.
///
/// Lock files are left in place: another process may hold one right now.
pub fn clear(root: &Path) -> Result<u64, GcError> {
  if !root.exists() {
    return Ok(0);
  }
  let dir_entries = fs::read_dir(root).map_err(|source| GcError::ReadCache {
    path: root.to_path_buf(),
    source,
  })?;

  let mut freed = 0;
  for entry in dir_entries.flatten() {
    let path = entry.path();
    let name = entry.file_name();
    if name == LOCKS_DIR || !(is_entry_dir(&path) || name == DYNAMIC_DIR) {
      continue;
    }
    let size = dir_size(&path);
    fs::remove_dir_all(&path).map_err(|source| GcError::Delete {
      path: path.clone(),
      source,
    })?;
    freed += size;
  }
  info!(bytes_freed = freed, root = %root.display(), "cache cleared");
  Ok(freed)
}
