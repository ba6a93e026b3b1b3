use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use predicates::prelude::*;

use super::common::{TestEnv, free_port};

fn spawn_server(env: &TestEnv, port: u16) -> Child {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_cshost"));
  cmd.args(["--port", &port.to_string(), "server"]);
  for (key, value) in env.vars() {
    cmd.env(key, value);
  }
  let child = cmd.stdout(Stdio::piped()).stderr(Stdio::null()).spawn().unwrap();

  let deadline = Instant::now() + Duration::from_secs(10);
  while TcpStream::connect(("127.0.0.1", port)).is_err() {
    assert!(Instant::now() < deadline, "build server did not start");
    std::thread::sleep(Duration::from_millis(50));
  }
  child
}

#[test]
fn compile_through_running_server_then_stop_it() {
  let env = TestEnv::new();
  let port = free_port();
  let server = spawn_server(&env, port);
  let script = env.write_file("foo.cs", "return 1;");

  env
    .cshost_cmd_with_server()
    .args(["--port", &port.to_string(), "compile"])
    .arg(&script)
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled"));
  assert_eq!(env.compiler_calls(), 1);

  env
    .cshost_cmd_with_server()
    .args(["--port", &port.to_string(), "status"])
    .assert()
    .success()
    .stdout(predicate::str::contains("running on"));

  env
    .cshost_cmd_with_server()
    .args(["--port", &port.to_string(), "stop-server"])
    .assert()
    .success()
    .stdout(predicate::str::contains("stopped"));

  let output = server.wait_with_output().unwrap();
  assert!(output.status.success());
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("Build server stopped"));
  assert!(stdout.contains("Compilations: 1"));
}

#[test]
fn second_server_on_same_port_exits_cleanly() {
  let env = TestEnv::new();
  let port = free_port();
  let server = spawn_server(&env, port);

  env
    .cshost_cmd_with_server()
    .args(["--port", &port.to_string(), "server"])
    .assert()
    .success()
    .stdout(predicate::str::contains("already running"));

  env
    .cshost_cmd_with_server()
    .args(["--port", &port.to_string(), "stop-server"])
    .assert()
    .success();
  assert!(server.wait_with_output().unwrap().status.success());
}

#[test]
fn compile_falls_back_when_no_server_listens() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");

  env
    .cshost_cmd_with_server()
    .args(["--port", &free_port().to_string(), "compile"])
    .arg(&script)
    .assert()
    .success();
  assert_eq!(env.compiler_calls(), 1);
}
