//! Wire format of the build server.
//!
//! One exchange per connection. The client writes a UTF-8 request and closes
//! its write side; the server answers with one UTF-8 reply and closes.
//!
//! - `-exit` → `Bye`, and the server stops.
//! - empty request → no reply (connectivity probe).
//! - JSON [`CompileRequest`] → JSON [`ServerReply`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::{CompileOutput, CompileRequest};
use crate::consts::EXIT_REQUEST;

#[derive(Debug, Error)]
pub enum ProtocolError {
  #[error("malformed request: {0}")]
  MalformedRequest(#[source] serde_json::Error),

  #[error("malformed reply: {0}")]
  MalformedReply(#[source] serde_json::Error),

  #[error("failed to encode message: {0}")]
  Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
  Probe,
  Exit,
  Compile(CompileRequest),
}

impl Request {
  pub fn parse(text: &str) -> Result<Self, ProtocolError> {
    let text = text.trim();
    if text.is_empty() {
      return Ok(Request::Probe);
    }
    if text == EXIT_REQUEST {
      return Ok(Request::Exit);
    }
    serde_json::from_str(text)
      .map(Request::Compile)
      .map_err(ProtocolError::MalformedRequest)
  }

  pub fn encode(&self) -> Result<String, ProtocolError> {
    match self {
      Request::Probe => Ok(String::new()),
      Request::Exit => Ok(EXIT_REQUEST.to_string()),
      Request::Compile(request) => serde_json::to_string(request).map_err(ProtocolError::Encode),
    }
  }
}

/// Answer to a compile request.
///
/// `Ok` carries the compiler's output even when it reports errors; `Error`
/// means the server could not run the compilation at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServerReply {
  Ok(CompileOutput),
  Error { message: String },
}

impl ServerReply {
  pub fn parse(text: &str) -> Result<Self, ProtocolError> {
    serde_json::from_str(text.trim()).map_err(ProtocolError::MalformedReply)
  }

  pub fn encode(&self) -> Result<String, ProtocolError> {
    serde_json::to_string(self).map_err(ProtocolError::Encode)
  }
}
