use std::env;
use std::path::PathBuf;

use crate::config::ENV_CACHE_DIR;
use crate::consts::{APP_NAME, SCRIPT_CACHE_SUBDIR};

/// Reads `var` as a directory, or falls back to `default`.
fn dir_from_env(var: &str, default: impl FnOnce() -> PathBuf) -> PathBuf {
  match env::var_os(var) {
    Some(value) if !value.is_empty() => PathBuf::from(value),
    _ => default(),
  }
}

/// The current user's home directory, or the temp directory when unknown.
pub fn home_dir() -> PathBuf {
  let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
  dir_from_env(var, env::temp_dir)
}

/// Per-user directory holding `config.json`.
pub fn config_dir() -> PathBuf {
  let base = if cfg!(windows) {
    dir_from_env("APPDATA", || home_dir().join("AppData").join("Roaming"))
  } else {
    dir_from_env("XDG_CONFIG_HOME", || home_dir().join(".config"))
  };
  base.join(APP_NAME)
}

/// Per-user cache root for the application.
pub fn cache_dir() -> PathBuf {
  if cfg!(windows) {
    dir_from_env("LOCALAPPDATA", || home_dir().join("AppData").join("Local"))
      .join(APP_NAME)
      .join("Cache")
  } else {
    dir_from_env("XDG_CACHE_HOME", || home_dir().join(".cache")).join(APP_NAME)
  }
}

/// Root of the compiled-script cache.
///
/// `CSHOST_CACHE_DIR` overrides the platform default.
pub fn script_cache_dir() -> PathBuf {
  dir_from_env(ENV_CACHE_DIR, || cache_dir().join(SCRIPT_CACHE_SUBDIR))
}
