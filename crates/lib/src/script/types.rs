use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::directives;
use crate::compiler::CompileRequest;
use crate::util::hash::{Fingerprint, Fingerprintable, fingerprint};
use crate::util::paths::{dedup_paths, modified_time, normalize, path_key, unix_nanos};

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("failed to read script {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write script source {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("include '{include}' referenced from {from} was not found")]
  IncludeNotFound { include: String, from: PathBuf },
}

/// Options that change what the compiler produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOptions {
  #[serde(default)]
  pub debug: bool,
  #[serde(default)]
  pub defines: Vec<String>,
  /// Target platform, e.g. `"x64"`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  /// Assemblies referenced in addition to those named by directives.
  #[serde(default)]
  pub references: Vec<PathBuf>,
  /// Directories probed for includes and references.
  #[serde(default)]
  pub search_dirs: Vec<PathBuf>,
}

impl Fingerprintable for CompileOptions {}

/// One compile input: sources, references and options.
///
/// Immutable once built. The primary script is always `sources[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
  sources: Vec<PathBuf>,
  references: Vec<PathBuf>,
  options: CompileOptions,
  content_fingerprint: Option<Fingerprint>,
}

#[derive(Serialize)]
struct UnitIdentity<'a> {
  sources: Vec<(String, u128)>,
  references: Vec<String>,
  options: &'a CompileOptions,
}

#[derive(Serialize)]
struct EffectiveOptions<'a> {
  references: Vec<String>,
  options: &'a CompileOptions,
}

impl Fingerprintable for UnitIdentity<'_> {}
impl Fingerprintable for EffectiveOptions<'_> {}

impl ScriptUnit {
  /// Builds the unit for a script file, following its directives.
  ///
  /// Directive references that exist as files in the script's directory or a
  /// search directory become absolute paths; others are passed through for
  /// the compiler to resolve.
  pub fn from_file(script: &Path, options: CompileOptions) -> Result<Self, ScriptError> {
    let primary = normalize(script);
    if !primary.is_file() {
      return Err(ScriptError::Read {
        path: primary,
        source: io::Error::new(io::ErrorKind::NotFound, "script file not found"),
      });
    }

    let resolved = directives::resolve(&primary, &options.search_dirs)?;

    let mut probe_dirs = Vec::new();
    if let Some(dir) = primary.parent() {
      probe_dirs.push(dir.to_path_buf());
    }
    probe_dirs.extend(resolved.search_dirs.iter().cloned());
    let probe_dirs = dedup_paths(probe_dirs);

    let mut references = options.references.clone();
    for name in &resolved.references {
      let found = probe_dirs.iter().map(|d| d.join(name)).find(|p| p.is_file());
      references.push(found.map(|p| normalize(&p)).unwrap_or_else(|| PathBuf::from(name)));
    }

    let mut options = options;
    options.search_dirs = dedup_paths(options.search_dirs.iter().chain(resolved.search_dirs.iter()));

    let mut sources = vec![primary];
    sources.extend(resolved.includes);

    Ok(Self {
      sources,
      references: dedup_paths(references),
      options,
      content_fingerprint: None,
    })
  }

  /// Builds the unit for in-memory code.
  ///
  /// The text is persisted once as `<dir>/<fingerprint>.cs` so the compiler
  /// and the cache see an ordinary file; an existing file with the same
  /// fingerprint is reused untouched to keep its timestamp stable.
  pub fn from_code(code: &str, dir: &Path, options: CompileOptions) -> Result<Self, ScriptError> {
    let fp = fingerprint(code.as_bytes());
    let path = dir.join(format!("{}.cs", fp));
    if !path.is_file() {
      fs::create_dir_all(dir).map_err(|source| ScriptError::Write {
        path: dir.to_path_buf(),
        source,
      })?;
      let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|source| ScriptError::Write {
        path: path.clone(),
        source,
      })?;
      staged.write_all(code.as_bytes()).map_err(|source| ScriptError::Write {
        path: path.clone(),
        source,
      })?;
      staged.persist(&path).map_err(|e| ScriptError::Write {
        path: path.clone(),
        source: e.error,
      })?;
    }

    let mut unit = Self::from_file(&path, options)?;
    unit.content_fingerprint = Some(fp);
    Ok(unit)
  }

  pub fn primary(&self) -> &Path {
    &self.sources[0]
  }

  pub fn sources(&self) -> &[PathBuf] {
    &self.sources
  }

  /// Sources other than the primary script.
  pub fn includes(&self) -> &[PathBuf] {
    &self.sources[1..]
  }

  pub fn references(&self) -> &[PathBuf] {
    &self.references
  }

  pub fn options(&self) -> &CompileOptions {
    &self.options
  }

  /// Fingerprint of the code text for units built with [`from_code`](Self::from_code).
  pub fn content_fingerprint(&self) -> Option<Fingerprint> {
    self.content_fingerprint
  }

  /// Identity of this unit: case-folded source paths with their last-write
  /// times, references and options.
  pub fn fingerprint(&self) -> Fingerprint {
    let identity = UnitIdentity {
      sources: self
        .sources
        .iter()
        .map(|p| (path_key(p), modified_time(p).map(unix_nanos).unwrap_or_default()))
        .collect(),
      references: self.references.iter().map(|p| path_key(p)).collect(),
      options: &self.options,
    };
    identity
      .fingerprint()
      .unwrap_or_else(|_| fingerprint(self.primary().to_string_lossy().as_bytes()))
  }

  /// Fingerprint of everything except the sources.
  ///
  /// Recorded with each artifact so that a change of options or references
  /// invalidates it even when no source changed.
  pub fn options_fingerprint(&self) -> Fingerprint {
    let effective = EffectiveOptions {
      references: self.references.iter().map(|p| path_key(p)).collect(),
      options: &self.options,
    };
    effective.fingerprint().unwrap_or(fingerprint(b""))
  }

  /// The compiler request writing this unit's artifact to `output_path`.
  pub fn to_request(&self, output_path: PathBuf) -> CompileRequest {
    CompileRequest {
      sources: self.sources.clone(),
      references: self.references.clone(),
      debug: self.options.debug,
      defines: self.options.defines.clone(),
      target: self.options.target.clone(),
      output_path,
    }
  }
}
