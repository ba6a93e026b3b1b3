//! The external compiler seen through the one operation the host needs.
//!
//! # Submodules
//!
//! - [`command`] - adapter running a `csc`-style executable
//! - [`diagnostics`] - parser for compiler output

pub mod command;
pub mod diagnostics;
mod types;

use std::future::Future;

pub use command::CommandCompiler;
pub use types::*;

/// Turns source files into an artifact plus diagnostics.
///
/// Error diagnostics are part of a successful call's [`CompileOutput`];
/// `Err` is reserved for failing to run the compiler at all.
pub trait Compiler: Send + Sync {
  fn compile(&self, request: &CompileRequest) -> impl Future<Output = Result<CompileOutput, CompilerError>> + Send;
}
