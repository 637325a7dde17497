use assert_cmd::Command;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("devevent-cli").unwrap();
    cmd.env("DEVEVENT_CONFIG_DIR", concat!(env!("CARGO_MANIFEST_DIR"), "/../../config"))
        .env("DEVEVENT_ENV", "local")
        .env_remove("DEVEVENT_DATABASE__ENDPOINT");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn migrations_list_the_slug_index() {
    let stdout = stdout_of(cli().arg("migrations"));
    assert!(stdout.contains("events/001_slug_unique"), "{stdout}");
    assert!(
        stdout.contains(
            "DEFINE INDEX IF NOT EXISTS events_slug_unique ON TABLE events FIELDS slug UNIQUE;"
        ),
        "{stdout}"
    );
    assert!(stdout.contains("bookings/001_event_index"), "{stdout}");
}

#[test]
fn config_redacts_passwords() {
    let stdout = stdout_of(cli().arg("config"));
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert_eq!(settings["auth"]["users"][0]["username"], "alice");
    assert_eq!(settings["auth"]["users"][0]["password"], "********");
    assert_eq!(settings["listing"]["max_limit"], 100);
    assert_eq!(settings["database"]["namespace"], "devevent");
    assert!(!stdout.contains("password123"));
}

#[test]
fn unknown_environment_is_rejected() {
    let output = cli()
        .env("DEVEVENT_ENV", "moon")
        .arg("config")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("unsupported environment"));
}

#[test]
fn help_names_subcommands() {
    let stdout = stdout_of(cli().arg("--help"));
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("migrations"));
}
