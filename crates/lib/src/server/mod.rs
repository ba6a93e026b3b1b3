//! Loopback build server and its client.
//!
//! The server compiles requests one after another on behalf of any number of
//! host processes, so only one compiler instance stays warm. The client is
//! what the orchestrator uses to reach it.
//!
//! # Submodules
//!
//! - [`protocol`] - request and reply encoding
//! - [`listener`] - the accept loop
//! - [`client`] - one-shot request sender

pub mod client;
pub mod listener;
pub mod protocol;

pub use client::{BuildClient, ClientError};
pub use listener::{BuildServer, ServerError, ServerStats};
pub use protocol::{ProtocolError, Request, ServerReply};
