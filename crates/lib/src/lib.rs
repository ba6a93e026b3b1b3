//! cshost-lib: build coordination for a C# script host
//!
//! This crate decides when a script needs compiling and makes sure it is
//! compiled once:
//! - `cache`: artifact lookup, out-of-date checks and installation
//! - `lock`: cross-process compile locks keyed by script path
//! - `server`: loopback build server and its client
//! - `orchestrator`: cache check, lock, compile, install
//! - `runner`: executes compiled artifacts in child processes

pub mod cache;
pub mod compiler;
pub mod config;
pub mod consts;
pub mod lock;
pub mod orchestrator;
pub mod platform;
pub mod runner;
pub mod script;
pub mod server;
pub mod util;
