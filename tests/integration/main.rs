//! Integration tests for drydock

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn drydock(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("drydock");
        cmd.current_dir(dir.path())
            .env_remove("DRYDOCK_CONFIG")
            .env_remove("DRYDOCK_PUBLISH")
            .env_remove("DRYDOCK_VERSION");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("declarative build-and-release pipeline"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("drydock"));
    }

    #[test]
    fn config_path_defaults_to_working_directory() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("drydock.toml"));
    }

    #[test]
    fn config_show_prints_defaults() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[release]"))
            .stdout(predicate::str::contains("registry = \"ghcr.io/example\""));
    }

    #[test]
    fn config_init_then_show_reads_file() {
        let dir = TempDir::new().unwrap();
        drydock(&dir).args(["config", "init"]).assert().success();
        assert!(dir.path().join("drydock.toml").is_file());

        let edited = std::fs::read_to_string(dir.path().join("drydock.toml"))
            .unwrap()
            .replace("ghcr.io/example", "registry.test/acme");
        std::fs::write(dir.path().join("drydock.toml"), edited).unwrap();

        drydock(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.test/acme"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("drydock.toml"),
            "[[service]]\nname = \"api\"\nbinary = \"api\"\n\n[[service]]\nname = \"api\"\nbinary = \"b\"\n",
        )
        .unwrap();

        drydock(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("duplicate service name: api"));
    }

    #[test]
    fn missing_explicit_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["--config", "nope.toml", "plan"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("drydock config init"));
    }

    #[test]
    fn plan_lists_publish_tasks() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["plan", "--publish", "--release-version", "v1.2.3", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ghcr.io/example/web:v1.2.3"))
            .stdout(predicate::str::contains("ghcr.io/example/importer:latest"))
            .stdout(predicate::str::contains("\"mode\": \"publish\""));
    }

    #[test]
    fn plan_rejects_invalid_tag() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["plan", "--release-version", "not a tag"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid image tag"));
    }

    #[test]
    fn plan_table_shows_stage_graph() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .arg("plan")
            .assert()
            .success()
            .stdout(predicate::str::contains("recipe-extraction"))
            .stdout(predicate::str::contains("asset-postprocess"));
    }

    #[test]
    fn run_help_mentions_publish() {
        let dir = TempDir::new().unwrap();
        drydock(&dir)
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--publish"))
            .stdout(predicate::str::contains("--release-version"));
    }
}
