use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_subcommands() {
    Command::cargo_bin("vidreport")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("refine"))
        .stdout(predicate::str::contains("transcripts"))
        .stdout(predicate::str::contains("prompts"));
}

#[test]
fn analyze_requires_a_url() {
    Command::cargo_bin("vidreport")
        .unwrap()
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL"));
}

#[test]
fn prompts_show_requires_a_name() {
    Command::cargo_bin("vidreport")
        .unwrap()
        .args(["prompts", "show"])
        .assert()
        .failure();
}
