use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn list_shows_compiled_scripts() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");
  env.cshost_cmd().arg("compile").arg(&script).assert().success();

  env
    .cshost_cmd()
    .args(["cache", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("foo.cs"))
    .stdout(predicate::str::contains("Entries: 1"));
}

#[test]
fn purge_removes_entries_of_deleted_scripts() {
  let env = TestEnv::new();
  let kept = env.write_file("kept.cs", "return 1;");
  let gone = env.write_file("gone.cs", "return 2;");
  env.cshost_cmd().arg("compile").arg(&kept).assert().success();
  env.cshost_cmd().arg("compile").arg(&gone).assert().success();
  std::fs::remove_file(&gone).unwrap();

  env
    .cshost_cmd()
    .args(["cache", "purge", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Entries removed: 1"));

  env
    .cshost_cmd()
    .args(["cache", "purge"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cache purged"));

  let output = env.cshost_cmd().args(["cache", "list", "-o", "json"]).output().unwrap();
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries = json.as_array().unwrap();
  assert_eq!(entries.len(), 1);
  assert!(entries[0]["script"].as_str().unwrap().ends_with("kept.cs"));
}

#[test]
fn clear_requires_force_when_not_interactive() {
  let env = TestEnv::new();
  env
    .cshost_cmd()
    .args(["cache", "clear"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--force"));
}

#[test]
fn clear_force_empties_the_cache() {
  let env = TestEnv::new();
  let script = env.write_file("foo.cs", "return 1;");
  env.cshost_cmd().arg("compile").arg(&script).assert().success();

  env
    .cshost_cmd()
    .args(["cache", "clear", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cache cleared"));

  env
    .cshost_cmd()
    .args(["cache", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cache is empty"));
}
