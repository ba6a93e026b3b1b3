//! Metadata record stored beside each artifact (`<artifact>.compiled`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::CacheError;
use crate::consts::{RECORD_EXTENSION, RECORD_VERSION};
use crate::util::hash::Fingerprint;
use crate::util::paths::{modified_time, path_key, unix_nanos};

/// Last-write time of one dependency at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStamp {
  pub path: PathBuf,
  /// Nanoseconds since the Unix epoch.
  pub modified: u128,
}

/// Persisted cache entry for one compiled script.
///
/// Replaced wholesale on every recompilation, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
  pub version: u32,
  pub script: PathBuf,
  pub artifact: PathBuf,
  pub source_modified: u128,
  pub artifact_modified: u128,
  #[serde(default)]
  pub dependencies: Vec<DependencyStamp>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_fingerprint: Option<Fingerprint>,
}

impl ArtifactRecord {
  /// Captures the current state of `dependencies` for an artifact stamped
  /// with `source_time`.
  pub fn capture(
    script: &Path,
    artifact: &Path,
    source_time: SystemTime,
    dependencies: &[PathBuf],
    options_fingerprint: Option<Fingerprint>,
  ) -> Self {
    let nanos = unix_nanos(source_time);
    Self {
      version: RECORD_VERSION,
      script: script.to_path_buf(),
      artifact: artifact.to_path_buf(),
      source_modified: nanos,
      artifact_modified: nanos,
      dependencies: dependencies
        .iter()
        .map(|dep| DependencyStamp {
          path: dep.clone(),
          modified: modified_time(dep).map(unix_nanos).unwrap_or_default(),
        })
        .collect(),
      options_fingerprint,
    }
  }

  pub fn path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".");
    name.push(RECORD_EXTENSION);
    PathBuf::from(name)
  }

  pub fn read(path: &Path) -> Result<Self, CacheError> {
    let content = fs::read_to_string(path).map_err(|e| CacheError::io(path, e))?;
    let record: ArtifactRecord = serde_json::from_str(&content).map_err(|e| CacheError::Record {
      path: path.to_path_buf(),
      reason: e.to_string(),
    })?;
    if record.version != RECORD_VERSION {
      return Err(CacheError::Record {
        path: path.to_path_buf(),
        reason: format!("unsupported version {}", record.version),
      });
    }
    Ok(record)
  }

  /// Writes the record through a temp file and rename.
  pub fn write(&self, path: &Path) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let content = serde_json::to_string_pretty(self).map_err(|e| CacheError::Record {
      path: path.to_path_buf(),
      reason: e.to_string(),
    })?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
    staged
      .write_all(format!("{}\n", content).as_bytes())
      .map_err(|e| CacheError::io(path, e))?;
    staged.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
  }

  /// Whether this record was written for `script`.
  ///
  /// Guards against two scripts whose path fingerprints collide.
  pub fn belongs_to(&self, script: &Path) -> bool {
    path_key(&self.script) == path_key(script)
  }

  /// First dependency whose current last-write time differs from the record.
  pub fn changed_dependency(&self) -> Option<&Path> {
    self
      .dependencies
      .iter()
      .find(|dep| modified_time(&dep.path).map(unix_nanos) != Some(dep.modified))
      .map(|dep| dep.path.as_path())
  }
}
