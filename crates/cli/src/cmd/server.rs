//! Implementation of `cshost server`, `cshost stop-server` and `cshost status`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use cshost_lib::compiler::CommandCompiler;
use cshost_lib::config::HostConfig;
use cshost_lib::server::{BuildClient, BuildServer, ClientError, ServerError};

use super::runtime;
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

/// Serves compile requests until `stop-server` is called.
///
/// Finding another server on the port is not an error.
pub fn cmd_server(config: HostConfig) -> Result<()> {
  let compiler = config.command_compiler();
  runtime()?.block_on(serve(config.server_addr(), compiler))
}

async fn serve(addr: SocketAddr, compiler: CommandCompiler) -> Result<()> {
  let server = match BuildServer::bind(addr, compiler).await {
    Ok(server) => server,
    Err(ServerError::AlreadyRunning { addr }) => {
      print_info(&format!("Build server already running on {}", addr));
      return Ok(());
    }
    Err(e) => return Err(e).context("Failed to start build server"),
  };

  info!(%addr, "serving");
  let stats = server.run().await.context("Build server failed")?;
  print_success("Build server stopped");
  print_stat("Sessions", &stats.sessions.to_string());
  print_stat("Compilations", &stats.compilations.to_string());
  print_stat("Failed sessions", &stats.failed_sessions.to_string());
  Ok(())
}

pub fn cmd_stop_server(config: HostConfig) -> Result<()> {
  let client = BuildClient::new(config.server_addr());
  match runtime()?.block_on(client.shutdown()) {
    Ok(()) => print_success(&format!("Build server on {} stopped", client.addr())),
    Err(ClientError::Unavailable { addr, .. }) => print_info(&format!("No build server running on {}", addr)),
    Err(e) => return Err(e).context("Failed to stop build server"),
  }
  Ok(())
}

#[derive(Serialize)]
struct Status<'a> {
  version: &'static str,
  cache_dir: &'a std::path::Path,
  compiler: &'a std::path::Path,
  runtime: Option<&'a std::path::Path>,
  server_addr: String,
  use_build_server: bool,
  server_running: bool,
}

pub fn cmd_status(config: HostConfig, output: OutputFormat) -> Result<()> {
  let client = BuildClient::new(config.server_addr());
  let server_running = runtime()?.block_on(client.is_running());

  let status = Status {
    version: env!("CARGO_PKG_VERSION"),
    cache_dir: &config.cache_dir,
    compiler: &config.compiler,
    runtime: config.runtime.as_deref(),
    server_addr: config.server_addr().to_string(),
    use_build_server: config.use_build_server,
    server_running,
  };

  if output.is_json() {
    return print_json(&status);
  }

  print_info(&format!("cshost v{}", status.version));
  print_stat("Cache", &status.cache_dir.display().to_string());
  print_stat("Compiler", &status.compiler.display().to_string());
  print_stat(
    "Runtime",
    &status
      .runtime
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| "(none)".to_string()),
  );
  let server = match (status.use_build_server, status.server_running) {
    (false, _) => "disabled".to_string(),
    (true, true) => format!("running on {}", status.server_addr),
    (true, false) => format!("not running ({})", status.server_addr),
  };
  print_stat("Build server", &server);
  Ok(())
}
