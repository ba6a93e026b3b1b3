use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::protocol::{ProtocolError, Request, ServerReply};
use crate::compiler::{CompileOutput, CompileRequest};
use crate::consts::EXIT_REPLY;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REPLY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ClientError {
  /// Nothing is listening, or it did not accept in time.
  #[error("build server at {addr} is unavailable: {reason}")]
  Unavailable { addr: SocketAddr, reason: String },

  #[error("connection to build server failed: {0}")]
  Io(#[source] io::Error),

  #[error("build server did not reply within {0:?}")]
  Timeout(Duration),

  /// The server ran but could not perform the compilation.
  #[error("build server error: {0}")]
  Server(String),

  #[error("unexpected reply from build server: {0}")]
  MalformedReply(String),

  #[error(transparent)]
  Protocol(#[from] ProtocolError),
}

/// Sends one request per connection to a build server.
#[derive(Debug, Clone)]
pub struct BuildClient {
  addr: SocketAddr,
  connect_timeout: Duration,
  reply_timeout: Duration,
}

impl BuildClient {
  pub fn new(addr: SocketAddr) -> Self {
    Self {
      addr,
      connect_timeout: CONNECT_TIMEOUT,
      reply_timeout: REPLY_TIMEOUT,
    }
  }

  pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
    self.reply_timeout = timeout;
    self
  }

  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  async fn connect(&self) -> Result<TcpStream, ClientError> {
    match tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr)).await {
      Ok(Ok(stream)) => Ok(stream),
      Ok(Err(e)) => Err(ClientError::Unavailable {
        addr: self.addr,
        reason: e.to_string(),
      }),
      Err(_) => Err(ClientError::Unavailable {
        addr: self.addr,
        reason: "connect timed out".to_string(),
      }),
    }
  }

  /// Sends `payload` and returns the server's whole reply.
  pub async fn send_request(&self, payload: &str) -> Result<String, ClientError> {
    let mut stream = self.connect().await?;
    stream.write_all(payload.as_bytes()).await.map_err(ClientError::Io)?;
    stream.shutdown().await.map_err(ClientError::Io)?;

    let mut buf = Vec::new();
    tokio::time::timeout(self.reply_timeout, stream.read_to_end(&mut buf))
      .await
      .map_err(|_| ClientError::Timeout(self.reply_timeout))?
      .map_err(ClientError::Io)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
  }

  pub async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, ClientError> {
    let payload = Request::Compile(request.clone()).encode()?;
    debug!(addr = %self.addr, "sending compile request");
    let reply = self.send_request(&payload).await?;
    match ServerReply::parse(&reply) {
      Ok(ServerReply::Ok(output)) => Ok(output),
      Ok(ServerReply::Error { message }) => Err(ClientError::Server(message)),
      Err(_) => Err(ClientError::MalformedReply(reply)),
    }
  }

  /// Asks the server to stop.
  pub async fn shutdown(&self) -> Result<(), ClientError> {
    let reply = self.send_request(&Request::Exit.encode()?).await?;
    if reply.trim() == EXIT_REPLY {
      Ok(())
    } else {
      Err(ClientError::MalformedReply(reply))
    }
  }

  /// Whether a server accepts connections. Sends an empty probe request.
  pub async fn is_running(&self) -> bool {
    let Ok(mut stream) = self.connect().await else {
      return false;
    };
    let _ = stream.shutdown().await;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::Ipv4Addr;

  async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    listener.local_addr().unwrap()
  }

  #[tokio::test]
  async fn unavailable_when_nothing_listens() {
    let client = BuildClient::new(unused_addr().await);
    assert!(!client.is_running().await);
    let err = client.send_request("-exit").await.unwrap_err();
    assert!(matches!(err, ClientError::Unavailable { .. }));
  }

  #[tokio::test]
  async fn non_bye_reply_to_exit_is_malformed() {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let client = BuildClient::new(listener.local_addr().unwrap());
    tokio::spawn(async move {
      let (mut stream, _) = listener.accept().await.unwrap();
      let mut buf = Vec::new();
      stream.read_to_end(&mut buf).await.unwrap();
      stream.write_all(b"Nope").await.unwrap();
    });
    let err = client.shutdown().await.unwrap_err();
    assert!(matches!(err, ClientError::MalformedReply(ref r) if r == "Nope"));
  }
}
