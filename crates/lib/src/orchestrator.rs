//! Compile coordination.
//!
//! A request for a script goes through:
//!
//! ```text
//! cache check ─hit──────────────────────────────────────────────► done
//!      │miss
//!      ▼
//! acquire lock (bounded) → re-check ─hit─► release ─────────────► done
//!                              │miss
//!                              ▼
//!            build server, else local compiler → install → release → done
//! ```
//!
//! The re-check after locking picks up the artifact another thread or process
//! finished while we were waiting, so one script is compiled once no matter
//! how many callers ask for it at the same time.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, MemoryCache, ScriptCache};
use crate::compiler::{CompileOutput, CompileRequest, Compiler, CompilerError, Diagnostic};
use crate::config::HostConfig;
use crate::consts::COMPILE_LOCK_CONTEXT;
use crate::lock::SystemWideLock;
use crate::script::{CompileOptions, ScriptError, ScriptUnit};
use crate::server::{BuildClient, ClientError};
use crate::util::hash::fingerprint;
use crate::util::paths::dedup_paths;

const SERVER_START_WAIT: Duration = Duration::from_secs(2);
const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum OrchestratorError {
  #[error(transparent)]
  Script(#[from] ScriptError),

  #[error("compilation failed with {} error(s)", error_count(.diagnostics))]
  Compilation { diagnostics: Vec<Diagnostic> },

  #[error(transparent)]
  Compiler(#[from] CompilerError),

  #[error("failed to install artifact: {0}")]
  Install(#[source] CacheError),
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
  diagnostics.iter().filter(|d| !d.is_warning).count()
}

/// A usable artifact for one compile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
  pub artifact: PathBuf,
  /// `true` when no compilation happened for this request.
  pub cache_hit: bool,
  /// Warnings of the compilation that produced the artifact; empty on a hit.
  pub warnings: Vec<Diagnostic>,
}

impl CompiledScript {
  fn hit(artifact: PathBuf) -> Self {
    Self {
      artifact,
      cache_hit: true,
      warnings: Vec::new(),
    }
  }
}

pub struct Orchestrator<C> {
  config: HostConfig,
  cache: ScriptCache,
  memory: MemoryCache,
  compiler: C,
  client: Option<BuildClient>,
  server_spawned: AtomicBool,
}

impl<C: Compiler> Orchestrator<C> {
  /// `compiler` is used when no build server is reachable.
  pub fn new(config: HostConfig, compiler: C) -> Self {
    let cache = ScriptCache::new(&config.cache_dir, config.policy);
    let client = config.use_build_server.then(|| BuildClient::new(config.server_addr()));
    Self {
      config,
      cache,
      memory: MemoryCache::new(),
      compiler,
      client,
      server_spawned: AtomicBool::new(false),
    }
  }

  pub fn config(&self) -> &HostConfig {
    &self.config
  }

  pub fn cache(&self) -> &ScriptCache {
    &self.cache
  }

  /// Compiles a script file, following its directives.
  pub async fn compile_script(&self, script: &Path, options: CompileOptions) -> Result<CompiledScript, OrchestratorError> {
    let unit = ScriptUnit::from_file(script, self.effective_options(options))?;
    self.compile_unit(&unit).await
  }

  /// Compiles in-memory code.
  ///
  /// The text is persisted under the cache's dynamic directory and then
  /// treated like a file script. Results are remembered in memory by content
  /// and options; a remembered artifact is only handed out while the disk
  /// cache still holds it as current for these options and dependencies.
  pub async fn compile_code(&self, code: &str, options: CompileOptions) -> Result<CompiledScript, OrchestratorError> {
    let unit = ScriptUnit::from_code(code, &self.config.dynamic_dir(), self.effective_options(options))?;
    let content = unit.content_fingerprint().unwrap_or_else(|| fingerprint(code.as_bytes()));
    let key = fingerprint(format!("{}:{}", content, unit.options_fingerprint()).as_bytes());

    if let Some(artifact) = self.memory.get(key) {
      if self.cache.lookup_unit(&unit).as_ref() == Some(&artifact) {
        debug!(fingerprint = %content, "in-memory cache hit");
        return Ok(CompiledScript::hit(artifact));
      }
      debug!(fingerprint = %content, "in-memory entry no longer current");
      self.memory.remove(key);
    }

    let compiled = self.compile_unit(&unit).await?;
    self.memory.insert(key, compiled.artifact.clone());
    Ok(compiled)
  }

  /// Produces the artifact for `unit`, compiling only when the cache has no
  /// current one.
  pub async fn compile_unit(&self, unit: &ScriptUnit) -> Result<CompiledScript, OrchestratorError> {
    let script = unit.primary();
    if let Some(artifact) = self.cache.lookup_unit(unit) {
      debug!(script = %script.display(), "cache hit");
      return Ok(CompiledScript::hit(artifact));
    }

    let lock = self.acquire_lock(script).await?;

    if let Some(artifact) = self.cache.lookup_unit(unit) {
      debug!(script = %script.display(), "compiled by another holder while waiting");
      return Ok(CompiledScript::hit(artifact));
    }

    debug!(script = %script.display(), fingerprint = %unit.fingerprint(), "cache miss, compiling");
    let staged = self.cache.staging_path(script).map_err(OrchestratorError::Install)?;
    let request = unit.to_request(staged.path().to_path_buf());
    let output = self.run_compiler(&request).await?;
    if output.has_errors() {
      info!(script = %script.display(), errors = error_count(&output.diagnostics), "compilation failed");
      return Err(OrchestratorError::Compilation {
        diagnostics: output.diagnostics,
      });
    }

    let dependencies = dependencies(unit);
    let artifact = self
      .cache
      .install(script, staged, &dependencies, Some(unit.options_fingerprint()))
      .map_err(OrchestratorError::Install)?;
    drop(lock);

    info!(script = %script.display(), artifact = %artifact.display(), "compiled");
    Ok(CompiledScript {
      artifact,
      cache_hit: false,
      warnings: output.diagnostics.into_iter().filter(|d| d.is_warning).collect(),
    })
  }

  fn effective_options(&self, mut options: CompileOptions) -> CompileOptions {
    options.search_dirs = dedup_paths(options.search_dirs.iter().chain(&self.config.search_dirs));
    options.references = dedup_paths(self.config.default_references.iter().chain(&options.references));
    options
  }

  /// Waits for the script's compile lock on a blocking thread.
  ///
  /// A timed-out wait is logged and the caller proceeds unlocked.
  async fn acquire_lock(&self, script: &Path) -> Result<SystemWideLock, OrchestratorError> {
    let mut lock = SystemWideLock::new(&self.config.lock_dir(), COMPILE_LOCK_CONTEXT, script);
    let timeout = self.config.lock_timeout();
    let (lock, acquired) = tokio::task::spawn_blocking(move || {
      let acquired = lock.acquire(timeout);
      (lock, acquired)
    })
    .await
    .map_err(|e| CompilerError::Task(e.to_string()))?;

    if !acquired {
      warn!(script = %script.display(), lock = lock.name(), ?timeout, "compile lock not acquired, compiling without it");
    }
    Ok(lock)
  }

  async fn run_compiler(&self, request: &CompileRequest) -> Result<CompileOutput, OrchestratorError> {
    if let Some(client) = &self.client {
      match client.compile(request).await {
        Ok(output) => return Ok(output),
        Err(ClientError::Unavailable { addr, reason }) => {
          debug!(%addr, %reason, "build server unavailable");
          if self.start_server(client).await {
            match client.compile(request).await {
              Ok(output) => return Ok(output),
              Err(e) => warn!(error = %e, "build server failed after start, compiling locally"),
            }
          }
        }
        Err(e) => warn!(error = %e, "build server failed, compiling locally"),
      }
    }
    Ok(self.compiler.compile(request).await?)
  }

  /// Starts the configured server command once per orchestrator and waits
  /// briefly for it to accept connections.
  async fn start_server(&self, client: &BuildClient) -> bool {
    let Some(program) = &self.config.server_command else {
      return false;
    };
    if self.server_spawned.swap(true, Ordering::SeqCst) {
      return client.is_running().await;
    }

    let port = self.config.server_port.to_string();
    info!(program = %program.display(), %port, "starting build server");
    let spawned = std::process::Command::new(program)
      .args(["server", "--port", port.as_str()])
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn();
    if let Err(e) = spawned {
      warn!(program = %program.display(), error = %e, "failed to start build server");
      return false;
    }

    let deadline = tokio::time::Instant::now() + SERVER_START_WAIT;
    while tokio::time::Instant::now() < deadline {
      if client.is_running().await {
        return true;
      }
      tokio::time::sleep(SERVER_POLL_INTERVAL).await;
    }
    warn!(addr = %client.addr(), "build server did not come up in time");
    false
  }
}

/// Files whose modification invalidates the artifact besides the script.
fn dependencies(unit: &ScriptUnit) -> Vec<PathBuf> {
  unit
    .includes()
    .iter()
    .chain(unit.references().iter().filter(|r| r.is_absolute() && r.is_file()))
    .cloned()
    .collect()
}
