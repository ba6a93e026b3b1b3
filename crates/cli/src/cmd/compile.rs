//! Implementation of `cshost compile`, `cshost run` and `cshost eval`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use cshost_lib::compiler::{CommandCompiler, Diagnostic};
use cshost_lib::config::HostConfig;
use cshost_lib::orchestrator::{CompiledScript, Orchestrator, OrchestratorError};
use cshost_lib::runner::run_artifact;
use cshost_lib::script::CompileOptions;

use super::runtime;
use crate::output::{OutputFormat, format_duration, print_error, print_json, print_stat, print_success, print_warning};

#[derive(Serialize)]
struct CompileReport<'a> {
  success: bool,
  artifact: Option<&'a Path>,
  cache_hit: bool,
  diagnostics: &'a [Diagnostic],
}

fn orchestrator(config: HostConfig) -> Orchestrator<CommandCompiler> {
  let compiler = config.command_compiler();
  Orchestrator::new(config, compiler)
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
  for diagnostic in diagnostics {
    if diagnostic.is_warning {
      print_warning(&diagnostic.to_string());
    } else {
      print_error(&diagnostic.to_string());
    }
  }
}

/// Compiles `script` and reports the artifact.
///
/// Exits non-zero when the compiler reported errors.
pub fn cmd_compile(config: HostConfig, script: &Path, options: CompileOptions, output: OutputFormat) -> Result<ExitCode> {
  let start = Instant::now();
  let orchestrator = orchestrator(config);
  let result = runtime()?.block_on(orchestrator.compile_script(script, options));

  match result {
    Ok(compiled) => {
      if output.is_json() {
        print_json(&CompileReport {
          success: true,
          artifact: Some(&compiled.artifact),
          cache_hit: compiled.cache_hit,
          diagnostics: &compiled.warnings,
        })?;
      } else {
        print_diagnostics(&compiled.warnings);
        report_compiled(script, &compiled);
        print_stat("Duration", &format_duration(start.elapsed()));
      }
      Ok(ExitCode::SUCCESS)
    }
    Err(OrchestratorError::Compilation { diagnostics }) => {
      if output.is_json() {
        print_json(&CompileReport {
          success: false,
          artifact: None,
          cache_hit: false,
          diagnostics: &diagnostics,
        })?;
      } else {
        print_diagnostics(&diagnostics);
        print_error(&format!("Compilation of {} failed", script.display()));
      }
      Ok(ExitCode::FAILURE)
    }
    Err(e) => Err(e).with_context(|| format!("Failed to compile {}", script.display())),
  }
}

fn report_compiled(script: &Path, compiled: &CompiledScript) {
  if compiled.cache_hit {
    print_success(&format!("{} is up to date", script.display()));
  } else {
    print_success(&format!("Compiled {}", script.display()));
  }
  print_stat("Artifact", &compiled.artifact.display().to_string());
}

/// Compiles `script` when needed, then runs it and exits with its status.
pub fn cmd_run(config: HostConfig, script: &Path, options: CompileOptions, args: &[String]) -> Result<ExitCode> {
  let orchestrator = orchestrator(config);
  let rt = runtime()?;

  let artifact: PathBuf = match rt.block_on(orchestrator.compile_script(script, options)) {
    Ok(compiled) => {
      print_diagnostics(&compiled.warnings);
      compiled.artifact
    }
    Err(OrchestratorError::Compilation { diagnostics }) => {
      print_diagnostics(&diagnostics);
      print_error(&format!("Compilation of {} failed", script.display()));
      return Ok(ExitCode::FAILURE);
    }
    Err(e) => return Err(e).with_context(|| format!("Failed to compile {}", script.display())),
  };

  let status = rt
    .block_on(run_artifact(orchestrator.config(), &artifact, args))
    .with_context(|| format!("Failed to run {}", script.display()))?;

  Ok(match status.code() {
    Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    None => ExitCode::FAILURE,
  })
}

/// Compiles a code snippet and prints the artifact path on stdout.
pub fn cmd_eval(config: HostConfig, code: &str, options: CompileOptions) -> Result<ExitCode> {
  let orchestrator = orchestrator(config);
  match runtime()?.block_on(orchestrator.compile_code(code, options)) {
    Ok(compiled) => {
      print_diagnostics(&compiled.warnings);
      println!("{}", compiled.artifact.display());
      Ok(ExitCode::SUCCESS)
    }
    Err(OrchestratorError::Compilation { diagnostics }) => {
      print_diagnostics(&diagnostics);
      print_error("Compilation failed");
      Ok(ExitCode::FAILURE)
    }
    Err(e) => Err(e).context("Failed to compile code"),
  }
}
