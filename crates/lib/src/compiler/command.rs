//! Compiler adapter that shells out to a `csc`-compatible executable.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use super::diagnostics::parse_output;
use super::{CompileOutput, CompileRequest, Compiler, CompilerError};

/// Runs an external command-line compiler for every request.
///
/// The command line is
/// `<program> <extra args> -nologo -target:library -out:<output> [-debug+|-debug-]
/// [-platform:<target>] [-define:A;B] -r:<ref>... <sources>...`.
///
/// A run counts as successful only if the compiler exits with 0 and leaves a
/// non-empty output file behind.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
  program: PathBuf,
  extra_args: Vec<String>,
}

impl CommandCompiler {
  pub fn new(program: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      extra_args: Vec::new(),
    }
  }

  pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
    self.extra_args.extend(args);
    self
  }

  pub fn program(&self) -> &Path {
    &self.program
  }

  /// Arguments passed to the compiler for `request`.
  pub fn arguments(&self, request: &CompileRequest) -> Vec<String> {
    let mut args = self.extra_args.clone();
    args.push("-nologo".to_string());
    args.push("-target:library".to_string());
    args.push(format!("-out:{}", request.output_path.display()));
    args.push(if request.debug { "-debug+" } else { "-debug-" }.to_string());
    if let Some(target) = &request.target {
      args.push(format!("-platform:{}", target));
    }
    if !request.defines.is_empty() {
      args.push(format!("-define:{}", request.defines.join(";")));
    }
    for reference in &request.references {
      args.push(format!("-r:{}", reference.display()));
    }
    for source in &request.sources {
      args.push(source.display().to_string());
    }
    args
  }
}

impl Compiler for CommandCompiler {
  async fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, CompilerError> {
    let program = self.program.display().to_string();
    let args = self.arguments(request);
    info!(compiler = %program, sources = request.sources.len(), "invoking compiler");
    debug!(?args, "compiler arguments");

    let output = Command::new(&self.program)
      .args(&args)
      .output()
      .await
      .map_err(|source| CompilerError::Launch {
        program: program.clone(),
        source,
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut diagnostics = parse_output(&stdout);
    diagnostics.extend(parse_output(&stderr));

    let Some(code) = output.status.code() else {
      return Err(CompilerError::Terminated { program });
    };
    debug!(code, diagnostics = diagnostics.len(), "compiler finished");

    Ok(CompileOutput {
      success: code == 0 && wrote_output(&request.output_path),
      artifact_path: request.output_path.clone(),
      diagnostics,
    })
  }
}

fn wrote_output(path: &Path) -> bool {
  std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}
