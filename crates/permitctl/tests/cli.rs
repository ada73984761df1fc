use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

const PERMITCTL: &str = "permitctl";

/// A permitctl command whose profiles live in a fresh config directory.
fn permitctl(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(PERMITCTL).unwrap();
    cmd.env("XDG_CONFIG_HOME", config.path())
        .env("HOME", config.path())
        .env_remove("PERMIT_API_KEY")
        .env_remove("PERMIT_API_URL")
        .env_remove("PERMIT_PROJECT")
        .env_remove("PERMIT_ENV")
        .env_remove("PERMITCTL_PROFILE");
    cmd
}

fn stderr(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

fn stdout(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

#[test]
fn produces_help_messages() {
    let dir = tempdir().unwrap();

    let assert = permitctl(&dir).arg("--help").assert().success();
    let help = stdout(&assert);
    for command in ["auth", "projects", "envs", "graph", "users", "proxy"] {
        assert!(help.contains(command), "missing {command} in:\n{help}");
    }

    let assert = permitctl(&dir).args(["graph", "--help"]).assert().success();
    let help = stdout(&assert);
    for flag in ["--project", "--env", "--output-file", "--no-open", "--json", "--compat-edges"] {
        assert!(help.contains(flag), "missing {flag} in:\n{help}");
    }
}

#[test]
fn rejects_keys_which_are_not_api_keys() {
    let dir = tempdir().unwrap();

    let assert = permitctl(&dir)
        .args(["auth", "token", "--token", "bogus"])
        .assert()
        .failure();
    assert!(
        stderr(&assert).contains("Invalid API Key"),
        "{}",
        stderr(&assert)
    );
    // Nothing was stored.
    assert!(!dir.path().join("permitctl").join("default.json").exists());
}

#[test]
fn status_and_logout_without_a_key() {
    let dir = tempdir().unwrap();

    let assert = permitctl(&dir).args(["auth", "status"]).assert().success();
    assert!(stdout(&assert).contains("You are not logged in"));

    let assert = permitctl(&dir).args(["auth", "logout"]).assert().success();
    assert!(stdout(&assert).contains("No API key was stored."));
}

#[test]
fn graph_requires_an_api_key() {
    let dir = tempdir().unwrap();

    let assert = permitctl(&dir)
        .args(["graph", "--project", "p", "--env", "e", "--no-open"])
        .assert()
        .failure();
    assert!(
        stderr(&assert).contains("You must run `auth token` first"),
        "{}",
        stderr(&assert)
    );
}

#[test]
fn users_list_rejects_conflicting_paging() {
    let dir = tempdir().unwrap();

    permitctl(&dir)
        .args(["users", "list", "--all", "--page", "2"])
        .assert()
        .failure();
}
