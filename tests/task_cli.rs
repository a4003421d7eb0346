mod support;

use predicates::str::contains;
use taskdeck::deadline::today;

use support::TestDir;

fn tomorrow() -> String {
    (today() + chrono::Duration::days(1)).to_string()
}

#[test]
fn add_list_toggle_rm_flow() {
    let dir = TestDir::new();

    let added = dir.json(&["add", "Write report", "--person", "owner", "--end", &tomorrow()]);
    assert_eq!(added["status"], "success");
    assert_eq!(added["command"], "add");
    let id = added["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(added["data"]["title"], "Write report");
    assert_eq!(added["data"]["personInCharge"], "owner");
    assert_eq!(added["data"]["completed"], false);

    let listed = dir.json(&["list"]);
    assert_eq!(listed["data"]["total"], 1);
    assert_eq!(listed["data"]["tasks"][0]["status"], "due tomorrow");

    // A unique prefix is enough.
    let toggled = dir.json(&["toggle", &id[..20]]);
    assert_eq!(toggled["data"]["id"], id.as_str());
    assert_eq!(toggled["data"]["completed"], true);
    assert_eq!(toggled["data"]["status"], "completed");

    assert_eq!(dir.json(&["list", "--completed"])["data"]["total"], 1);
    assert_eq!(dir.json(&["list", "--pending"])["data"]["total"], 0);

    dir.cmd()
        .args(["rm", &id])
        .assert()
        .success()
        .stdout(contains("Task deleted"));
    assert_eq!(dir.json(&["list"])["data"]["total"], 0);
}

#[test]
fn human_list_shows_deadline_status() {
    let dir = TestDir::new();
    dir.cmd()
        .args(["add", "Pay invoice", "--end", &tomorrow()])
        .assert()
        .success()
        .stdout(contains("Task created"));

    dir.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("[ ] Pay invoice"))
        .stdout(contains("due tomorrow"));
}

#[test]
fn unknown_person_is_a_user_error() {
    let dir = TestDir::new();
    dir.cmd()
        .args(["add", "Review", "--person", "stranger"])
        .assert()
        .code(2)
        .stderr(contains("personInCharge"))
        .stderr(contains("hint:"));
}

#[test]
fn missing_task_reports_not_found_envelope() {
    let dir = TestDir::new();
    let output = dir
        .cmd()
        .args(["--json", "toggle", "nope"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["command"], "toggle");
    assert_eq!(body["error"]["kind"], "not_found");
    assert_eq!(body["error"]["details"]["id"], "nope");
}

#[test]
fn edit_sets_and_clears_fields() {
    let dir = TestDir::new();
    let added = dir.json(&["add", "Draft", "--person", "team", "--end", &tomorrow()]);
    let id = added["data"]["id"].as_str().unwrap().to_string();

    let edited = dir.json(&["edit", &id, "--title", "Final", "--clear", "person,end"]);
    assert_eq!(edited["status"], "success");
    assert_eq!(edited["data"]["title"], "Final");
    assert!(edited["data"].get("personInCharge").is_none());
    assert!(edited["data"].get("endDate").is_none());

    dir.cmd()
        .args(["edit", &id])
        .assert()
        .code(2)
        .stderr(contains("edit requires"));
}

#[test]
fn report_writes_file() {
    let dir = TestDir::new();
    dir.cmd().args(["add", "One"]).assert().success();
    dir.cmd().args(["add", "Two"]).assert().success();
    let path = dir.path().join("report.txt");

    dir.cmd()
        .args(["report", "--output"])
        .arg(&path)
        .args(["--title", "Weekly"])
        .assert()
        .success()
        .stdout(contains("Report written"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Weekly"));
    assert!(text.contains("- total: 2"));
    assert!(text.contains("[ ] One"));
}

#[test]
fn report_json_to_stdout() {
    let dir = TestDir::new();
    dir.cmd().args(["add", "Only"]).assert().success();

    let report = dir.json(&["report"]);
    assert_eq!(report["data"]["summary"]["total"], 1);
    assert_eq!(report["data"]["tasks"][0]["title"], "Only");
}

#[test]
fn config_policy_requires_end_date() {
    let dir = TestDir::new();
    dir.write_config(
        r#"
[tasks]
people = ["alice", "bob"]
require_end_date = true
"#,
    );

    dir.cmd()
        .args(["add", "No deadline"])
        .assert()
        .code(2)
        .stderr(contains("endDate"));

    dir.cmd()
        .args(["add", "Has deadline", "--person", "alice", "--end", &tomorrow()])
        .assert()
        .success();
}

#[test]
fn corrupt_store_fails_without_self_heal() {
    let dir = TestDir::new();
    dir.write_config("[store]\nself_heal = false\n");
    std::fs::write(dir.store_path(), "{ broken").unwrap();

    dir.cmd()
        .arg("list")
        .assert()
        .code(4)
        .stderr(contains("Storage corrupt"));
}

#[test]
fn reconcile_reports_no_drift_on_fresh_load() {
    let dir = TestDir::new();
    dir.cmd().args(["add", "One"]).assert().success();

    let reconciled = dir.json(&["reconcile"]);
    assert_eq!(reconciled["data"]["total"], 1);
    assert_eq!(reconciled["data"]["added"].as_array().unwrap().len(), 0);
    assert_eq!(reconciled["data"]["removed"].as_array().unwrap().len(), 0);
}
