use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing cache state.
///
/// Reads never surface these: an unreadable record or artifact is a cache
/// miss.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid artifact record {path}: {reason}")]
  Record { path: PathBuf, reason: String },

  #[error("script {path} has no readable last-write time")]
  MissingSource { path: PathBuf },
}

impl CacheError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
    CacheError::Io {
      path: path.into(),
      source,
    }
  }
}
