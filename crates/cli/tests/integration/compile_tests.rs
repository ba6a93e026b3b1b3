use predicates::prelude::*;

use super::common::{TestEnv, touch};

#[test]
fn second_compile_is_a_cache_hit() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");

  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled"));

  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));

  assert_eq!(env.compiler_calls(), 1);
}

#[test]
fn touched_script_is_recompiled() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");

  env.cshost_cmd().arg("compile").arg(&script).assert().success();
  touch(&script);
  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled"));

  assert_eq!(env.compiler_calls(), 2);
}

#[test]
fn compile_errors_exit_non_zero() {
  let env = TestEnv::new();
  let script = env.write_file("bad.cs", "#error broken");

  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .code(1)
    .stderr(predicate::str::contains("CS1029"))
    .stderr(predicate::str::contains("failed"));
}

#[test]
fn warnings_do_not_fail_the_build() {
  let env = TestEnv::new();
  let script = env.write_file("noisy.cs", "#warn\nreturn 1;");

  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .success()
    .stderr(predicate::str::contains("CS1030"));
}

#[test]
fn compile_json_output_is_valid() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");

  let output = env
    .cshost_cmd()
    .args(["compile", "-o", "json"])
    .arg(&script)
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["success"], true);
  assert_eq!(json["cache_hit"], false);
  let artifact = json["artifact"].as_str().unwrap();
  assert!(artifact.starts_with(env.cache_path().to_str().unwrap()));
  assert!(std::path::Path::new(artifact).is_file());
}

#[test]
fn includes_are_compiled_and_tracked() {
  let env = TestEnv::new();
  let script = env.write_file("main.cs", "//css_inc lib.cs\nreturn Lib.X;");
  let include = env.write_file("lib.cs", "static class Lib { public const int X = 1; }");

  env.cshost_cmd().arg("compile").arg(&script).assert().success();
  touch(&include);
  env
    .cshost_cmd()
    .arg("compile")
    .arg(&script)
    .assert()
    .success()
    .stdout(predicate::str::contains("Compiled"));

  assert_eq!(env.compiler_calls(), 2);
}

#[test]
fn run_passes_arguments_to_script() {
  let env = TestEnv::new();
  let script = env.write_file("hello.cs", "return 0;");

  env
    .cshost_cmd()
    .arg("run")
    .arg(&script)
    .args(["--", "a", "b"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello from script a b"));
}

#[test]
fn run_with_compile_error_does_not_execute() {
  let env = TestEnv::new();
  let script = env.write_file("bad.cs", "#error broken");

  env
    .cshost_cmd()
    .arg("run")
    .arg(&script)
    .assert()
    .code(1)
    .stdout(predicate::str::contains("hello from script").not());
}

#[test]
fn eval_prints_artifact_and_reuses_it() {
  let env = TestEnv::new();

  let first = env.cshost_cmd().args(["eval", "return 42;"]).output().unwrap();
  assert!(first.status.success());
  let artifact = String::from_utf8(first.stdout).unwrap().trim().to_string();
  assert!(std::path::Path::new(&artifact).is_file());

  let second = env.cshost_cmd().args(["eval", "return 42;"]).output().unwrap();
  assert_eq!(String::from_utf8(second.stdout).unwrap().trim(), artifact);
  assert_eq!(env.compiler_calls(), 1);
}
