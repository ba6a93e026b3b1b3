//! Types exchanged with the external compiler.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single compilation job handed to a [`Compiler`](super::Compiler).
///
/// This is also the payload the build client sends to the build server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
  /// Source files in compile order, primary script first.
  pub sources: Vec<PathBuf>,
  /// Referenced assemblies.
  #[serde(default)]
  pub references: Vec<PathBuf>,
  /// Emit debug symbols.
  #[serde(default)]
  pub debug: bool,
  /// Preprocessor symbols.
  #[serde(default)]
  pub defines: Vec<String>,
  /// Target platform (`anycpu`, `x86`, `x64`), passed as `-platform:`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target: Option<String>,
  /// Where the compiler must write the artifact.
  pub output_path: PathBuf,
}

/// Severity-tagged compiler message with source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
  pub file: Option<PathBuf>,
  pub line: u32,
  pub column: u32,
  pub code: String,
  pub message: String,
  pub is_warning: bool,
}

impl std::fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let kind = if self.is_warning { "warning" } else { "error" };
    match &self.file {
      Some(file) => write!(
        f,
        "{}({},{}): {} {}: {}",
        file.display(),
        self.line,
        self.column,
        kind,
        self.code,
        self.message
      ),
      None => write!(f, "{} {}: {}", kind, self.code, self.message),
    }
  }
}

/// Result reported by a compiler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutput {
  pub success: bool,
  pub artifact_path: PathBuf,
  #[serde(default)]
  pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
  pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
    self.diagnostics.iter().filter(|d| !d.is_warning)
  }

  pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
    self.diagnostics.iter().filter(|d| d.is_warning)
  }

  /// A run only counts as successful when the compiler says so and reported
  /// no error diagnostics.
  pub fn has_errors(&self) -> bool {
    !self.success || self.errors().next().is_some()
  }
}

/// Failure to run the compiler at all, as opposed to a compilation that
/// reported errors.
#[derive(Debug, Error)]
pub enum CompilerError {
  #[error("failed to launch compiler {program}: {source}")]
  Launch {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("compiler {program} was terminated without an exit code")]
  Terminated { program: String },

  #[error("compiler task failed: {0}")]
  Task(String),
}
