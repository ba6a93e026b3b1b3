//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Stands in for `csc`: understands `-out:` and reports `#error` / `#warn`
/// markers in sources as diagnostics. The artifact it writes is a shell
/// script, so `/bin/sh` can serve as the runtime.
const FAKE_COMPILER: &str = r#"#!/bin/sh
out=""
status=0
for arg in "$@"; do
  case "$arg" in
    -out:*) out="${arg#-out:}" ;;
    -*) ;;
    *)
      if grep -q '#error' "$arg" 2>/dev/null; then
        echo "$arg(1,1): error CS1029: #error directive"
        status=1
      fi
      if grep -q '#warn' "$arg" 2>/dev/null; then
        echo "$arg(1,1): warning CS1030: #warning directive"
      fi
      ;;
  esac
done
echo "$out" >> "__LOG__"
if [ "$status" -eq 0 ]; then
  printf 'echo "hello from script $*"\n' > "$out"
fi
exit "$status"
"#;

/// Isolated test environment with its own config, cache and compiler.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let env = Self { temp };

    let compiler = env.compiler_path();
    std::fs::write(&compiler, FAKE_COMPILER.replace("__LOG__", &env.log_path().display().to_string())).unwrap();
    std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config_dir = env.config_home().join("cshost");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), r#"{ "runtime": "/bin/sh" }"#).unwrap();
    env
  }

  pub fn compiler_path(&self) -> PathBuf {
    self.temp.path().join("fake-csc")
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.path().join("compiler.log")
  }

  pub fn config_home(&self) -> PathBuf {
    self.temp.path().join("config")
  }

  pub fn cache_path(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  /// Write a file relative to the temp directory and return its path.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Number of times the fake compiler ran.
  pub fn compiler_calls(&self) -> usize {
    std::fs::read_to_string(self.log_path())
      .map(|log| log.lines().count())
      .unwrap_or(0)
  }

  /// Environment the binary needs, for both assert_cmd and std commands.
  pub fn vars(&self) -> Vec<(&'static str, PathBuf)> {
    vec![
      ("XDG_CONFIG_HOME", self.config_home()),
      ("CSHOST_CACHE_DIR", self.cache_path()),
      ("CSHOST_COMPILER", self.compiler_path()),
    ]
  }

  /// A cshost command that compiles in-process.
  pub fn cshost_cmd(&self) -> Command {
    let mut cmd = self.cshost_cmd_with_server();
    cmd.arg("--no-server");
    cmd
  }

  /// A cshost command that will try the build server first.
  pub fn cshost_cmd_with_server(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("cshost");
    cmd.env_remove("CSHOST_SERVER_PORT");
    for (key, value) in self.vars() {
      cmd.env(key, value);
    }
    cmd
  }
}

pub fn touch(path: &Path) {
  let later = SystemTime::now() + Duration::from_secs(10);
  std::fs::File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(later)
    .unwrap();
}

pub fn free_port() -> u16 {
  std::net::TcpListener::bind("127.0.0.1:0")
    .unwrap()
    .local_addr()
    .unwrap()
    .port()
}
