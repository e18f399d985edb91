mod support;

use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use support::{tckts_cmd, TestRepo, LEGACY_PROJECT};

fn json_data(output: &[u8]) -> Value {
    let value: Value = serde_json::from_slice(output).expect("json envelope");
    assert_eq!(value["schema_version"], "tckts.v1");
    value["data"].clone()
}

fn add(dir: &TempDir, args: &[&str]) -> String {
    let output = tckts_cmd(dir.path())
        .arg("add")
        .args(args)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    json_data(&output)["id"].as_str().expect("ticket id").to_string()
}

#[test]
fn help_works() {
    tckts_cmd(std::env::temp_dir().as_path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("file-backed"));

    for cmd in ["init", "add", "list", "show", "done", "dep", "migrate"] {
        tckts_cmd(std::env::temp_dir().as_path())
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn ticket_lifecycle() {
    let dir = TempDir::new().expect("tempdir");
    tckts_cmd(dir.path())
        .args(["init", "API"])
        .assert()
        .success()
        .stdout(contains("Project API created"));

    let first = add(&dir, &["Design schema", "--type", "feature", "--priority", "high"]);
    let second = add(&dir, &["Implement schema", "--depends", first.as_str()]);
    assert_eq!(first, "API-1");
    assert_eq!(second, "API-2");

    let output = tckts_cmd(dir.path())
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let data = json_data(&output);
    assert_eq!(data["total"], 2);
    assert_eq!(data["tickets"][0]["priority"], "high");
    assert_eq!(data["tickets"][1]["depends"][0], "API-1");

    tckts_cmd(dir.path())
        .args(["done", "API-2"])
        .assert()
        .code(3)
        .stderr(contains("blocked by open dependencies"));

    tckts_cmd(dir.path()).args(["start", "1"]).assert().success();
    tckts_cmd(dir.path()).args(["done", "API-1"]).assert().success();
    tckts_cmd(dir.path()).args(["done", "API-2"]).assert().success();

    let output = tckts_cmd(dir.path())
        .args(["show", "API-1", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let data = json_data(&output);
    assert_eq!(data["status"], "done");
    let statuses: Vec<&str> = data["history"]
        .as_array()
        .expect("history")
        .iter()
        .filter_map(|entry| entry["status"].as_str())
        .collect();
    assert_eq!(statuses, vec!["pending", "in_progress", "done"]);
}

#[test]
fn ready_and_blocked_follow_dependencies() {
    let dir = TempDir::new().expect("tempdir");
    tckts_cmd(dir.path()).args(["init", "WEB"]).assert().success();
    tckts_cmd(dir.path()).args(["init", "API"]).assert().success();

    let api = add(&dir, &["Endpoint", "--project", "API"]);
    let web = add(&dir, &["Page", "--depends", api.as_str()]);
    assert_eq!(web, "WEB-1");

    let output = tckts_cmd(dir.path())
        .args(["blocked", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let data = json_data(&output);
    assert_eq!(data["tickets"][0]["id"], "WEB-1");
    assert_eq!(data["tickets"][0]["blocked_by"][0], "API-1");

    let output = tckts_cmd(dir.path())
        .args(["ready", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_data(&output)["total"], 0);

    tckts_cmd(dir.path()).args(["done", "API-1"]).assert().success();
    let output = tckts_cmd(dir.path())
        .args(["ready", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_data(&output)["tickets"][0]["id"], "WEB-1");
}

#[test]
fn dependency_cycles_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    tckts_cmd(dir.path()).args(["init", "API"]).assert().success();
    add(&dir, &["one"]);
    add(&dir, &["two", "--depends", "1"]);

    tckts_cmd(dir.path())
        .args(["dep", "add", "API-1", "API-2"])
        .assert()
        .code(2)
        .stderr(contains("Dependency cycle"));

    tckts_cmd(dir.path())
        .args(["dep", "rm", "API-2", "API-1"])
        .assert()
        .success();
    tckts_cmd(dir.path())
        .args(["dep", "add", "API-1", "API-2"])
        .assert()
        .success();
}

#[test]
fn errors_use_exit_codes_and_json_envelope() {
    let dir = TempDir::new().expect("tempdir");
    tckts_cmd(dir.path())
        .args(["list"])
        .assert()
        .code(2)
        .stderr(contains("hint: tckts projects"));

    tckts_cmd(dir.path()).args(["init", "API"]).assert().success();
    tckts_cmd(dir.path()).args(["init", "API"]).assert().code(2);

    let output = tckts_cmd(dir.path())
        .args(["show", "API-9", "--json"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(value["status"], "error");
    assert_eq!(value["command"], "show");
    assert_eq!(value["error"]["kind"], "user_error");

    tckts_cmd(dir.path())
        .args(["show", "API9"])
        .assert()
        .code(2)
        .stderr(contains("Invalid ticket id"));
}

#[test]
fn dir_flag_and_env_select_storage() {
    let dir = TempDir::new().expect("tempdir");
    tckts_cmd(dir.path())
        .args(["--dir", "tickets", "init", "OPS"])
        .assert()
        .success();
    assert!(dir.path().join("tickets/OPS.jsonl").exists());

    tckts_cmd(dir.path())
        .env("TCKTS_DIR", "tickets")
        .args(["add", "Rotate keys"])
        .assert()
        .success();
    tckts_cmd(dir.path())
        .args(["projects"])
        .assert()
        .success()
        .stdout(contains("Total: 0"));
}

#[test]
fn commands_migrate_legacy_projects_first() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    repo.write_file(".tckts/OLD.tckts", LEGACY_PROJECT)?;

    tckts_cmd(repo.path())
        .args(["list", "--project", "OLD"])
        .assert()
        .code(3)
        .stderr(contains("Uncommitted changes"));

    repo.commit_all("legacy tickets")?;
    tckts_cmd(repo.path())
        .args(["list", "--project", "OLD"])
        .assert()
        .success()
        .stdout(contains("OLD-2"));
    assert!(repo.path().join(".tckts/OLD.jsonl").exists());
    assert!(!repo.path().join(".tckts/OLD.tckts").exists());
    Ok(())
}

#[test]
fn migrate_command_reports_work() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    std::fs::create_dir_all(dir.path().join(".tckts"))?;
    std::fs::write(dir.path().join(".tckts/OLD.tckts"), LEGACY_PROJECT)?;

    tckts_cmd(dir.path()).args(["migrate"]).assert().code(3);

    let output = tckts_cmd(dir.path())
        .args(["migrate", "--force", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let data = json_data(&output);
    assert_eq!(data["migrated"][0]["prefix"], "OLD");
    assert_eq!(data["migrated"][0]["from"], 0);

    tckts_cmd(dir.path())
        .args(["migrate"])
        .assert()
        .success()
        .stdout(contains("already at schema version"));
    Ok(())
}
