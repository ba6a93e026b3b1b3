//! Running compiled artifacts.
//!
//! Each run gets its own child process: the configured runtime (`dotnet`,
//! `mono`) hosting the artifact, or the artifact itself when no runtime is
//! configured. When the child exits, everything it loaded goes with it and
//! the artifact file is free to be replaced by the next compilation.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::HostConfig;

#[derive(Debug, Error)]
pub enum RunError {
  #[error("artifact {0} does not exist")]
  MissingArtifact(PathBuf),

  #[error("failed to launch {program}: {source}")]
  Launch {
    program: String,
    #[source]
    source: io::Error,
  },
}

/// The program and arguments that run `artifact` with `args`.
pub fn command_line(config: &HostConfig, artifact: &Path, args: &[String]) -> (PathBuf, Vec<OsString>) {
  let script_args = args.iter().map(OsString::from);
  match &config.runtime {
    Some(runtime) => (
      runtime.clone(),
      std::iter::once(artifact.as_os_str().to_os_string()).chain(script_args).collect(),
    ),
    None => (artifact.to_path_buf(), script_args.collect()),
  }
}

/// Runs `artifact` in a child process with inherited stdio and waits for it.
pub async fn run_artifact(config: &HostConfig, artifact: &Path, args: &[String]) -> Result<ExitStatus, RunError> {
  if !artifact.is_file() {
    return Err(RunError::MissingArtifact(artifact.to_path_buf()));
  }

  let (program, argv) = command_line(config, artifact, args);
  info!(artifact = %artifact.display(), program = %program.display(), "running artifact");

  let status = Command::new(&program)
    .args(&argv)
    .status()
    .await
    .map_err(|source| RunError::Launch {
      program: program.display().to_string(),
      source,
    })?;

  debug!(?status, "artifact exited");
  Ok(status)
}
