//! Integration tests for hubcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Binary isolated from the user's config and environment
    fn hubcache(config_dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("hubcache");
        cmd.env("HUBCACHE_CONFIG", config_dir.join("config.toml"))
            .env_remove("HUBCACHE_CACHE_DIR")
            .env_remove("HUBCACHE_LOCK_TIMEOUT_SECS")
            .env_remove("HUBCACHE_DOWNLOAD_PROGRESS")
            .env_remove("HUBCACHE_DISABLE_CERT_VALIDATION");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Crash-safe shared module cache"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hubcache"));
    }

    #[test]
    fn config_path_follows_flag() {
        let temp = TempDir::new().unwrap();
        let custom = temp.path().join("custom.toml");
        hubcache(temp.path())
            .args(["--config", custom.to_str().unwrap(), "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("lock_timeout_secs = 600"));
    }

    #[test]
    fn config_set_then_show() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .args(["config", "set", "cache.lock_timeout_secs", "42"])
            .assert()
            .success();

        hubcache(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("lock_timeout_secs = 42"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .args(["config", "set", "cache.nope", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_env_override_fails() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .env("HUBCACHE_LOCK_TIMEOUT_SECS", "soon")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("HUBCACHE_LOCK_TIMEOUT_SECS"));
    }

    #[test]
    fn path_is_stable_under_cache_dir() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let run = || {
            let output = hubcache(temp.path())
                .args(["path", "https://example.com/m/1", "--cache-dir"])
                .arg(&cache)
                .output()
                .unwrap();
            assert!(output.status.success());
            String::from_utf8(output.stdout).unwrap()
        };

        let first = run();
        assert!(first.trim().starts_with(cache.to_str().unwrap()));
        assert_eq!(first, run());
    }

    #[test]
    fn path_uses_env_cache_dir() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("from-env");
        hubcache(temp.path())
            .env("HUBCACHE_CACHE_DIR", &cache)
            .args(["path", "https://example.com/m/1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from-env"));
    }

    #[test]
    fn path_rejects_local_handle() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .args(["path", "/models/local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not an http(s) URL"));
    }

    #[test]
    fn fetch_local_dir_prints_it() {
        let temp = TempDir::new().unwrap();
        let module = temp.path().join("module");
        std::fs::create_dir(&module).unwrap();

        hubcache(temp.path())
            .arg("fetch")
            .arg(&module)
            .assert()
            .success()
            .stdout(predicate::str::contains(module.to_str().unwrap()));
    }

    #[test]
    fn fetch_missing_path_fails() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .arg("fetch")
            .arg(temp.path().join("missing"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        std::fs::create_dir(&cache).unwrap();

        hubcache(temp.path())
            .args(["cache", "list", "--cache-dir"])
            .arg(&cache)
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached modules"));
    }

    #[test]
    fn cache_list_json() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        std::fs::create_dir_all(cache.join("abc123")).unwrap();
        std::fs::write(cache.join("abc123/saved_model.pb"), b"graph").unwrap();

        hubcache(temp.path())
            .args(["cache", "list", "--format", "json", "--cache-dir"])
            .arg(&cache)
            .assert()
            .success()
            .stdout(predicate::str::contains("abc123"));
    }

    #[test]
    fn cache_clear_with_yes() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        std::fs::create_dir_all(cache.join("abc123")).unwrap();
        std::fs::write(cache.join("abc123/saved_model.pb"), b"graph").unwrap();
        std::fs::write(cache.join("abc123.descriptor.txt"), b"Module: x\n").unwrap();

        hubcache(temp.path())
            .args(["cache", "clear", "--yes", "--cache-dir"])
            .arg(&cache)
            .assert()
            .success();

        assert!(cache.exists());
        assert_eq!(std::fs::read_dir(&cache).unwrap().count(), 0);
    }

    #[test]
    fn completions_bash() {
        let temp = TempDir::new().unwrap();
        hubcache(temp.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hubcache"));
    }
}
