use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn taskdeck_help_works() {
    Command::cargo_bin("taskdeck")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("task list"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "add",
        "list",
        "show",
        "toggle",
        "edit",
        "rm",
        "reconcile",
        "report",
        "watch",
    ];

    for cmd in subcommands {
        Command::cargo_bin("taskdeck")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("taskdeck")
        .expect("binary")
        .arg("frobnicate")
        .assert()
        .failure();
}
