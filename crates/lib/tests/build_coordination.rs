//! Public API flow: orchestrator, build server and cache maintenance together.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cshost_lib::cache::gc;
use cshost_lib::compiler::{CompileOutput, CompileRequest, Compiler, CompilerError};
use cshost_lib::config::HostConfig;
use cshost_lib::orchestrator::Orchestrator;
use cshost_lib::script::CompileOptions;
use cshost_lib::server::{BuildClient, BuildServer};
use tempfile::{TempDir, tempdir};

#[derive(Clone, Default)]
struct CopyCompiler {
  calls: Arc<AtomicUsize>,
}

impl Compiler for CopyCompiler {
  async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompilerError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let text = fs::read_to_string(&request.sources[0]).map_err(|e| CompilerError::Task(e.to_string()))?;
    fs::write(&request.output_path, text).map_err(|e| CompilerError::Task(e.to_string()))?;
    Ok(CompileOutput {
      success: true,
      artifact_path: request.output_path.clone(),
      diagnostics: vec![],
    })
  }
}

fn config(temp: &TempDir, port: u16) -> HostConfig {
  HostConfig {
    cache_dir: temp.path().join("cache"),
    server_port: port,
    ..Default::default()
  }
}

#[tokio::test]
async fn server_compiles_and_cache_serves_later_requests() {
  let temp = tempdir().unwrap();
  let remote = CopyCompiler::default();
  let server = BuildServer::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), remote.clone())
    .await
    .unwrap();
  let addr = server.local_addr().unwrap();
  let serving = tokio::spawn(server.run());

  let script = temp.path().join("foo.cs");
  fs::write(&script, "return 1;").unwrap();
  let local = CopyCompiler::default();
  let orchestrator = Orchestrator::new(config(&temp, addr.port()), local.clone());

  let first = orchestrator.compile_script(&script, CompileOptions::default()).await.unwrap();
  assert_eq!(fs::read_to_string(&first.artifact).unwrap(), "return 1;");
  let second = orchestrator.compile_script(&script, CompileOptions::default()).await.unwrap();
  assert!(second.cache_hit);
  assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
  assert_eq!(local.calls.load(Ordering::SeqCst), 0);

  BuildClient::new(addr).shutdown().await.unwrap();
  let stats = serving.await.unwrap().unwrap();
  assert_eq!(stats.compilations, 1);
}

#[tokio::test]
async fn purge_drops_entries_of_deleted_scripts() {
  let temp = tempdir().unwrap();
  let compiler = CopyCompiler::default();
  let mut config = config(&temp, 0);
  config.use_build_server = false;
  let cache_dir: PathBuf = config.cache_dir.clone();
  let orchestrator = Orchestrator::new(config, compiler);

  let kept = temp.path().join("kept.cs");
  let gone = temp.path().join("gone.cs");
  fs::write(&kept, "kept").unwrap();
  fs::write(&gone, "gone").unwrap();
  orchestrator.compile_script(&kept, CompileOptions::default()).await.unwrap();
  let gone_artifact = orchestrator.compile_script(&gone, CompileOptions::default()).await.unwrap().artifact;
  assert_eq!(gc::entries(&cache_dir).unwrap().len(), 2);

  fs::remove_file(&gone).unwrap();
  let result = gc::purge(&cache_dir, false).unwrap();
  assert_eq!(result.stats.entries_deleted, 1);
  assert!(!gone_artifact.exists());

  let remaining = gc::entries(&cache_dir).unwrap();
  assert_eq!(remaining.len(), 1);
  assert!(remaining[0].script_exists);
}
