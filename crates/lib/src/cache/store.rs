//! Path-keyed artifact cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{ArtifactRecord, CacheError};
use crate::consts::ARTIFACT_EXTENSION;
use crate::script::ScriptUnit;
use crate::util::hash::{Fingerprint, path_fingerprint};
use crate::util::paths::modified_time;

/// How [`ScriptCache::is_out_of_date`] decides staleness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfDatePolicy {
  /// Stale iff the script and artifact last-write times differ.
  Simplified,
  /// As `Simplified`, plus every recorded dependency must be unchanged.
  #[default]
  Advanced,
}

/// Maps script paths to compiled artifacts under a cache root.
///
/// Each script owns the directory `<root>/<path fingerprint>/`, holding the
/// artifact and its [`ArtifactRecord`].
#[derive(Debug, Clone)]
pub struct ScriptCache {
  root: PathBuf,
  policy: OutOfDatePolicy,
}

impl ScriptCache {
  pub fn new(root: impl Into<PathBuf>, policy: OutOfDatePolicy) -> Self {
    Self {
      root: root.into(),
      policy,
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn policy(&self) -> OutOfDatePolicy {
    self.policy
  }

  pub fn artifact_dir(&self, script: &Path) -> PathBuf {
    self.root.join(path_fingerprint(script).to_string())
  }

  /// Deterministic artifact location for `script`.
  pub fn artifact_path(&self, script: &Path) -> PathBuf {
    let stem = script
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "script".to_string());
    self
      .artifact_dir(script)
      .join(format!("{}.{}", stem, ARTIFACT_EXTENSION))
  }

  /// The cached artifact for `script`, if it is still current.
  pub fn lookup(&self, script: &Path) -> Option<PathBuf> {
    let artifact = self.artifact_path(script);
    if self.is_out_of_date(script, &artifact) {
      return None;
    }
    Some(artifact)
  }

  /// As [`lookup`](Self::lookup), additionally requiring the artifact to
  /// have been built with the unit's references and options.
  pub fn lookup_unit(&self, unit: &ScriptUnit) -> Option<PathBuf> {
    let artifact = self.lookup(unit.primary())?;
    let record = match ArtifactRecord::read(&ArtifactRecord::path_for(&artifact)) {
      Ok(record) => record,
      Err(e) => {
        debug!(artifact = %artifact.display(), error = %e, "no usable record, treating as miss");
        return None;
      }
    };
    if record.options_fingerprint != Some(unit.options_fingerprint()) {
      debug!(artifact = %artifact.display(), "compile options changed");
      return None;
    }
    Some(artifact)
  }

  /// Whether `artifact` must be rebuilt from `script`.
  ///
  /// A missing or unreadable artifact is always out of date. Under the
  /// advanced policy a missing, corrupt or foreign record is too.
  pub fn is_out_of_date(&self, script: &Path, artifact: &Path) -> bool {
    if !artifact.is_file() {
      return true;
    }
    let (Some(script_time), Some(artifact_time)) = (modified_time(script), modified_time(artifact)) else {
      return true;
    };
    if script_time != artifact_time {
      debug!(script = %script.display(), "script modified since last compile");
      return true;
    }

    match self.policy {
      OutOfDatePolicy::Simplified => false,
      OutOfDatePolicy::Advanced => {
        let record = match ArtifactRecord::read(&ArtifactRecord::path_for(artifact)) {
          Ok(record) => record,
          Err(e) => {
            debug!(artifact = %artifact.display(), error = %e, "unreadable artifact record");
            return true;
          }
        };
        if !record.belongs_to(script) {
          debug!(script = %script.display(), recorded = %record.script.display(), "record belongs to another script");
          return true;
        }
        if let Some(dep) = record.changed_dependency() {
          debug!(script = %script.display(), dependency = %dep.display(), "dependency modified since last compile");
          return true;
        }
        false
      }
    }
  }

  /// Records `artifact` as the compiled form of `script`.
  ///
  /// The artifact's last-write time is set to the script's, which is what
  /// later out-of-date checks compare.
  pub fn store(
    &self,
    script: &Path,
    artifact: &Path,
    dependencies: &[PathBuf],
    options_fingerprint: Option<Fingerprint>,
  ) -> Result<ArtifactRecord, CacheError> {
    let source_time = source_time(script)?;
    stamp(artifact, source_time)?;
    let record = ArtifactRecord::capture(script, artifact, source_time, dependencies, options_fingerprint);
    record.write(&ArtifactRecord::path_for(artifact))?;
    Ok(record)
  }

  /// Where the compiler writes the next artifact for `script`.
  ///
  /// The file lives in a private directory next to the artifact and carries
  /// the artifact's own file name, since `csc` names the assembly after its
  /// output file.
  pub fn staging_path(&self, script: &Path) -> Result<StagedArtifact, CacheError> {
    let dir = self.artifact_dir(script);
    fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
    let staging = tempfile::Builder::new()
      .prefix(".staging-")
      .tempdir_in(&dir)
      .map_err(|e| CacheError::io(&dir, e))?;
    let artifact = self.artifact_path(script);
    let name = artifact.file_name().unwrap_or(artifact.as_os_str());
    let path = staging.path().join(name);
    Ok(StagedArtifact { dir: staging, path })
  }

  /// Moves a compiled staging file into place as the artifact for `script`.
  ///
  /// The record is written first and the artifact renamed over the old one
  /// last, so a concurrent reader sees either the previous artifact (whose
  /// timestamp no longer matches) or the complete new one. If the rename
  /// fails the new record is removed again; the previous artifact is then
  /// left without a record and reads as a miss.
  pub fn install(
    &self,
    script: &Path,
    staged: StagedArtifact,
    dependencies: &[PathBuf],
    options_fingerprint: Option<Fingerprint>,
  ) -> Result<PathBuf, CacheError> {
    let artifact = self.artifact_path(script);
    let source_time = source_time(script)?;
    stamp(staged.path(), source_time)?;

    let record_path = ArtifactRecord::path_for(&artifact);
    let record = ArtifactRecord::capture(script, &artifact, source_time, dependencies, options_fingerprint);
    record.write(&record_path)?;

    if let Err(e) = fs::rename(staged.path(), &artifact) {
      if let Err(remove) = fs::remove_file(&record_path) {
        warn!(record = %record_path.display(), error = %remove, "failed to remove record of uninstalled artifact");
      }
      return Err(CacheError::io(&artifact, e));
    }
    debug!(script = %script.display(), artifact = %artifact.display(), "installed artifact");
    Ok(artifact)
  }
}

/// Compiler output file inside a private staging directory.
///
/// The directory and anything left in it are deleted on drop.
#[derive(Debug)]
pub struct StagedArtifact {
  dir: TempDir,
  path: PathBuf,
}

impl StagedArtifact {
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn dir(&self) -> &Path {
    self.dir.path()
  }
}

impl AsRef<Path> for StagedArtifact {
  fn as_ref(&self) -> &Path {
    &self.path
  }
}

fn source_time(script: &Path) -> Result<SystemTime, CacheError> {
  modified_time(script).ok_or_else(|| CacheError::MissingSource {
    path: script.to_path_buf(),
  })
}

fn stamp(path: &Path, time: SystemTime) -> Result<(), CacheError> {
  fs::File::options()
    .write(true)
    .open(path)
    .and_then(|f| f.set_modified(time))
    .map_err(|e| CacheError::io(path, e))
}
