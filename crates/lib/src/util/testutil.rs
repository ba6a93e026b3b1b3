//! Test doubles shared by the library's unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::compiler::{CompileOutput, CompileRequest, Compiler, CompilerError, Diagnostic};

/// In-process compiler that writes a marker artifact and counts invocations.
///
/// Sources whose text contains `#error` produce an error diagnostic instead
/// of an artifact; `#warn` adds a warning.
#[derive(Debug, Clone, Default)]
pub struct FakeCompiler {
  calls: Arc<AtomicUsize>,
  delay: Duration,
}

impl FakeCompiler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sleeps for `delay` inside every compilation.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Compiler for FakeCompiler {
  async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompilerError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    let mut diagnostics = Vec::new();
    for source in &request.sources {
      let text = std::fs::read_to_string(source).unwrap_or_default();
      if text.contains("#error") {
        diagnostics.push(diagnostic(source, "CS1029", "#error directive", false));
      }
      if text.contains("#warn") {
        diagnostics.push(diagnostic(source, "CS1030", "#warning directive", true));
      }
    }

    let failed = diagnostics.iter().any(|d| !d.is_warning);
    if !failed {
      std::fs::write(&request.output_path, format!("MZ fake artifact #{}", call))
        .map_err(|e| CompilerError::Task(e.to_string()))?;
    }
    Ok(CompileOutput {
      success: !failed,
      artifact_path: request.output_path.clone(),
      diagnostics,
    })
  }
}

fn diagnostic(source: &std::path::Path, code: &str, message: &str, is_warning: bool) -> Diagnostic {
  Diagnostic {
    file: Some(source.to_path_buf()),
    line: 1,
    column: 1,
    code: code.to_string(),
    message: message.to_string(),
    is_warning,
  }
}

/// Writes an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &std::path::Path, body: &str) {
  use std::os::unix::fs::PermissionsExt;
  std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
