//! Host configuration.
//!
//! Built once at start-up and passed down by reference. Layers, lowest to
//! highest precedence: built-in defaults, `<config_dir>/config.json`, the
//! `CSHOST_*` environment variables, then whatever the caller overrides.

use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::OutOfDatePolicy;
use crate::compiler::CommandCompiler;
use crate::consts::{CONFIG_FILENAME, DEFAULT_LOCK_TIMEOUT, DEFAULT_SERVER_PORT, DYNAMIC_DIR, LOCKS_DIR};
use crate::platform::paths::{config_dir, script_cache_dir};

pub const ENV_CACHE_DIR: &str = "CSHOST_CACHE_DIR";
pub const ENV_SERVER_PORT: &str = "CSHOST_SERVER_PORT";
pub const ENV_COMPILER: &str = "CSHOST_COMPILER";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid value '{value}' for {var}")]
  InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
  /// Root of the compiled-script cache.
  pub cache_dir: PathBuf,
  pub server_host: IpAddr,
  pub server_port: u16,
  pub lock_timeout_ms: u64,
  pub policy: OutOfDatePolicy,
  /// Try the build server before compiling in-process.
  pub use_build_server: bool,
  /// Executable started as `<server_command> server --port <port>` when no
  /// server answers. `None` disables auto-start.
  pub server_command: Option<PathBuf>,
  pub compiler: PathBuf,
  pub compiler_args: Vec<String>,
  /// Program that hosts compiled artifacts, e.g. `dotnet` or `mono`. `None`
  /// executes the artifact directly.
  pub runtime: Option<PathBuf>,
  pub search_dirs: Vec<PathBuf>,
  pub default_references: Vec<PathBuf>,
}

impl Default for HostConfig {
  fn default() -> Self {
    Self {
      cache_dir: script_cache_dir(),
      server_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
      server_port: DEFAULT_SERVER_PORT,
      lock_timeout_ms: DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
      policy: OutOfDatePolicy::default(),
      use_build_server: true,
      server_command: None,
      compiler: PathBuf::from("csc"),
      compiler_args: Vec::new(),
      runtime: Some(PathBuf::from("dotnet")),
      search_dirs: Vec::new(),
      default_references: Vec::new(),
    }
  }
}

impl HostConfig {
  /// Loads `<config_dir>/config.json` (if present) and applies environment
  /// overrides.
  pub fn load() -> Result<Self, ConfigError> {
    Self::load_from(&config_dir().join(CONFIG_FILENAME))
  }

  /// As [`load`](Self::load) with an explicit config file. A missing file
  /// yields the defaults.
  pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
    let mut config = match fs::read_to_string(path) {
      Ok(text) => {
        debug!(path = %path.display(), "loading config");
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
          path: path.to_path_buf(),
          source,
        })?
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    config.apply_env()?;
    Ok(config)
  }

  fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(dir) = std::env::var(ENV_CACHE_DIR)
      && !dir.is_empty()
    {
      self.cache_dir = PathBuf::from(dir);
    }
    if let Ok(port) = std::env::var(ENV_SERVER_PORT) {
      self.server_port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: ENV_SERVER_PORT,
        value: port.clone(),
      })?;
    }
    if let Ok(compiler) = std::env::var(ENV_COMPILER)
      && !compiler.is_empty()
    {
      self.compiler = PathBuf::from(compiler);
    }
    Ok(())
  }

  pub fn server_addr(&self) -> SocketAddr {
    SocketAddr::new(self.server_host, self.server_port)
  }

  pub fn lock_timeout(&self) -> Duration {
    Duration::from_millis(self.lock_timeout_ms)
  }

  pub fn lock_dir(&self) -> PathBuf {
    self.cache_dir.join(LOCKS_DIR)
  }

  /// Where sources for in-memory code are persisted.
  pub fn dynamic_dir(&self) -> PathBuf {
    self.cache_dir.join(DYNAMIC_DIR)
  }

  pub fn command_compiler(&self) -> CommandCompiler {
    CommandCompiler::new(&self.compiler).with_args(self.compiler_args.iter().cloned())
  }
}
