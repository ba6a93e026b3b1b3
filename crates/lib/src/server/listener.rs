use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::protocol::{ProtocolError, Request, ServerReply};
use crate::compiler::Compiler;
use crate::consts::EXIT_REPLY;

/// How long a connected client may take to deliver its request.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed `accept`, so a persistent failure such as
/// descriptor exhaustion does not turn into a busy loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
  #[error("a build server is already listening on {addr}")]
  AlreadyRunning { addr: SocketAddr },

  #[error("failed to bind {addr}: {source}")]
  Bind {
    addr: SocketAddr,
    #[source]
    source: io::Error,
  },

  #[error("failed to query listening address: {0}")]
  LocalAddr(#[source] io::Error),

  #[error("session I/O failed: {0}")]
  Session(#[source] io::Error),

  #[error("timed out waiting for request")]
  ReadTimeout,

  #[error(transparent)]
  Protocol(#[from] ProtocolError),
}

/// Counters reported when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
  pub sessions: u64,
  pub compilations: u64,
  pub failed_sessions: u64,
}

enum Outcome {
  Continue,
  Exit,
}

/// Accepts one connection at a time and compiles on behalf of clients.
pub struct BuildServer<C> {
  listener: TcpListener,
  compiler: C,
}

impl<C: Compiler> BuildServer<C> {
  /// Binds `addr`. A port already in use is reported as
  /// [`ServerError::AlreadyRunning`]: the other listener is assumed to be a
  /// server started by another host process.
  pub async fn bind(addr: SocketAddr, compiler: C) -> Result<Self, ServerError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| {
      if source.kind() == io::ErrorKind::AddrInUse {
        ServerError::AlreadyRunning { addr }
      } else {
        ServerError::Bind { addr, source }
      }
    })?;
    Ok(Self { listener, compiler })
  }

  pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
    self.listener.local_addr().map_err(ServerError::LocalAddr)
  }

  /// Serves until a client sends the exit request.
  ///
  /// A failing session is logged and does not stop the server.
  pub async fn run(self) -> Result<ServerStats, ServerError> {
    let addr = self.local_addr()?;
    info!(%addr, "build server listening");
    let mut stats = ServerStats::default();

    loop {
      let (stream, peer) = match self.listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
          warn!(error = %e, retry_in = ?ACCEPT_RETRY_DELAY, "accept failed");
          tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
          continue;
        }
      };
      stats.sessions += 1;
      debug!(%peer, "session opened");

      match self.session(stream, &mut stats).await {
        Ok(Outcome::Continue) => {}
        Ok(Outcome::Exit) => {
          info!(%addr, sessions = stats.sessions, compilations = stats.compilations, "build server stopping");
          return Ok(stats);
        }
        Err(e) => {
          stats.failed_sessions += 1;
          warn!(%peer, error = %e, "session failed");
        }
      }
    }
  }

  async fn session(&self, mut stream: TcpStream, stats: &mut ServerStats) -> Result<Outcome, ServerError> {
    let mut buf = Vec::new();
    tokio::time::timeout(READ_TIMEOUT, stream.read_to_end(&mut buf))
      .await
      .map_err(|_| ServerError::ReadTimeout)?
      .map_err(ServerError::Session)?;
    let text = String::from_utf8_lossy(&buf);

    let request = match Request::parse(&text) {
      Ok(request) => request,
      Err(e) => {
        let reply = ServerReply::Error { message: e.to_string() }.encode()?;
        respond(&mut stream, &reply).await?;
        return Err(e.into());
      }
    };

    match request {
      Request::Probe => {
        debug!("probe");
        Ok(Outcome::Continue)
      }
      Request::Exit => {
        respond(&mut stream, EXIT_REPLY).await?;
        Ok(Outcome::Exit)
      }
      Request::Compile(request) => {
        stats.compilations += 1;
        let script = request.sources.first().map(|p| p.display().to_string()).unwrap_or_default();
        info!(%script, "compiling for client");
        let reply = match self.compiler.compile(&request).await {
          Ok(output) => ServerReply::Ok(output),
          Err(e) => {
            warn!(%script, error = %e, "compiler could not run");
            ServerReply::Error { message: e.to_string() }
          }
        };
        respond(&mut stream, &reply.encode()?).await?;
        Ok(Outcome::Continue)
      }
    }
  }
}

async fn respond(stream: &mut TcpStream, reply: &str) -> Result<(), ServerError> {
  stream.write_all(reply.as_bytes()).await.map_err(ServerError::Session)?;
  stream.shutdown().await.map_err(ServerError::Session)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::{CompileOutput, CompileRequest, CompilerError, Diagnostic};
  use crate::server::client::{BuildClient, ClientError};
  use std::net::{Ipv4Addr, SocketAddr};
  use std::path::PathBuf;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Clone, Default)]
  struct EchoCompiler {
    calls: Arc<AtomicUsize>,
  }

  impl Compiler for EchoCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompilerError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if request.sources.is_empty() {
        return Err(CompilerError::Task("no sources".to_string()));
      }
      Ok(CompileOutput {
        success: true,
        artifact_path: request.output_path.clone(),
        diagnostics: vec![Diagnostic {
          file: Some(request.sources[0].clone()),
          line: 1,
          column: 1,
          code: "CS0168".to_string(),
          message: "unused".to_string(),
          is_warning: true,
        }],
      })
    }
  }

  fn loopback() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
  }

  fn request(sources: Vec<PathBuf>) -> CompileRequest {
    CompileRequest {
      sources,
      references: vec![],
      debug: false,
      defines: vec![],
      target: None,
      output_path: PathBuf::from("/cache/foo.dll"),
    }
  }

  async fn start(compiler: EchoCompiler) -> (BuildClient, tokio::task::JoinHandle<Result<ServerStats, ServerError>>) {
    let server = BuildServer::bind(loopback(), compiler).await.unwrap();
    let addr = server.local_addr().unwrap();
    (BuildClient::new(addr), tokio::spawn(server.run()))
  }

  #[tokio::test]
  async fn local_addr_reports_the_bound_port() {
    let server = BuildServer::bind(loopback(), EchoCompiler::default()).await.unwrap();
    let addr = server.local_addr().unwrap();
    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0);
  }

  #[tokio::test]
  async fn exit_request_is_answered_and_stops_the_server() {
    let (client, handle) = start(EchoCompiler::default()).await;
    assert!(client.is_running().await);
    assert_eq!(client.send_request("-exit").await.unwrap(), "Bye");

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.compilations, 0);
    assert!(!client.is_running().await);
  }

  #[tokio::test]
  async fn compiles_requests_in_turn() {
    let compiler = EchoCompiler::default();
    let (client, handle) = start(compiler.clone()).await;

    for _ in 0..3 {
      let output = client.compile(&request(vec![PathBuf::from("/s/foo.cs")])).await.unwrap();
      assert!(output.success);
      assert_eq!(output.warnings().count(), 1);
    }
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 3);

    client.shutdown().await.unwrap();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.compilations, 3);
  }

  #[tokio::test]
  async fn bad_request_does_not_stop_the_server() {
    let (client, handle) = start(EchoCompiler::default()).await;

    let reply = client.send_request("not json").await.unwrap();
    assert!(matches!(ServerReply::parse(&reply).unwrap(), ServerReply::Error { .. }));

    let err = client.compile(&request(vec![])).await.unwrap_err();
    assert!(matches!(err, ClientError::Server(ref message) if message.contains("no sources")));

    assert!(client.compile(&request(vec![PathBuf::from("/s/foo.cs")])).await.is_ok());
    client.shutdown().await.unwrap();
    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.failed_sessions, 1);
  }

  #[tokio::test]
  async fn second_server_on_same_port_reports_already_running() {
    let first = BuildServer::bind(loopback(), EchoCompiler::default()).await.unwrap();
    let addr = first.local_addr().unwrap();
    let err = BuildServer::bind(addr, EchoCompiler::default()).await.err().unwrap();
    assert!(matches!(err, ServerError::AlreadyRunning { addr: a } if a == addr));
  }
}
