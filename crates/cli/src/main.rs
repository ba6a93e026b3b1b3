mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cshost_lib::config::HostConfig;
use cshost_lib::script::CompileOptions;

use cmd::*;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "cshost")]
#[command(author, version, about = "Compile, cache and run C# scripts", long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Cache directory (overrides config and CSHOST_CACHE_DIR)
  #[arg(long, global = true, value_name = "DIR")]
  cache_dir: Option<PathBuf>,

  /// Build server port (overrides config and CSHOST_SERVER_PORT)
  #[arg(long, global = true)]
  port: Option<u16>,

  /// Compile in-process instead of using the build server
  #[arg(long, global = true)]
  no_server: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args, Clone, Default)]
struct BuildArgs {
  /// Emit debug symbols
  #[arg(long)]
  debug: bool,

  /// Preprocessor symbol, may be repeated
  #[arg(short = 'D', long = "define", value_name = "SYMBOL")]
  defines: Vec<String>,

  /// Referenced assembly, may be repeated
  #[arg(short = 'r', long = "reference", value_name = "ASSEMBLY")]
  references: Vec<PathBuf>,

  /// Directory probed for includes and references, may be repeated
  #[arg(short = 'd', long = "search-dir", value_name = "DIR")]
  search_dirs: Vec<PathBuf>,

  /// Target platform passed to the compiler (anycpu, x86, x64)
  #[arg(long)]
  target: Option<String>,
}

impl From<BuildArgs> for CompileOptions {
  fn from(args: BuildArgs) -> Self {
    CompileOptions {
      debug: args.debug,
      defines: args.defines,
      target: args.target,
      references: args.references,
      search_dirs: args.search_dirs,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a script, reusing the cached artifact when it is current
  Compile {
    script: PathBuf,

    #[command(flatten)]
    build: BuildArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Compile a script if needed and run it
  Run {
    script: PathBuf,

    #[command(flatten)]
    build: BuildArgs,

    /// Arguments passed to the script
    #[arg(last = true)]
    args: Vec<String>,
  },

  /// Compile a code snippet and print the artifact path
  Eval {
    code: String,

    #[command(flatten)]
    build: BuildArgs,
  },

  /// Run the build server in the foreground
  Server,

  /// Ask a running build server to exit
  StopServer,

  /// Show configuration and build server state
  Status {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Inspect or clean the script cache
  Cache {
    #[command(subcommand)]
    command: CacheCommands,
  },
}

#[derive(Subcommand)]
enum CacheCommands {
  /// List cached scripts
  List {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Remove entries whose script no longer exists
  Purge {
    /// Show what would be removed without deleting
    #[arg(long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
  },

  /// Remove every cached artifact
  Clear {
    /// Skip confirmation prompt
    #[arg(short, long)]
    force: bool,
  },
}

impl Cli {
  fn host_config(&self) -> Result<HostConfig> {
    let mut config = HostConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = &self.cache_dir {
      config.cache_dir = dir.clone();
    }
    if let Some(port) = self.port {
      config.server_port = port;
    }
    if self.no_server {
      config.use_build_server = false;
    }
    Ok(config)
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(code) => code,
    Err(err) => {
      output::print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<ExitCode> {
  let config = cli.host_config()?;

  match cli.command {
    Commands::Compile { script, build, output } => cmd_compile(config, &script, build.into(), output),
    Commands::Run { script, build, args } => cmd_run(config, &script, build.into(), &args),
    Commands::Eval { code, build } => cmd_eval(config, &code, build.into()),
    Commands::Server => cmd_server(config).map(|_| ExitCode::SUCCESS),
    Commands::StopServer => cmd_stop_server(config).map(|_| ExitCode::SUCCESS),
    Commands::Status { output } => cmd_status(config, output).map(|_| ExitCode::SUCCESS),
    Commands::Cache { command } => match command {
      CacheCommands::List { output } => cmd_cache_list(config, output),
      CacheCommands::Purge { dry_run, output } => cmd_cache_purge(config, dry_run, output),
      CacheCommands::Clear { force } => cmd_cache_clear(config, force),
    }
    .map(|_| ExitCode::SUCCESS),
  }
}
