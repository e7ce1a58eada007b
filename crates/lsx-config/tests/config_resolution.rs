//! Configuration resolution and loading against real files.
//!
//! Covers:
//! - Resolution order (CLI > LSX_CONFIG > LSX_CONFIG_DIR)
//! - Loading and validating options from disk

use lsx_config::resolve::{load_options, resolve_config, ConfigSource};
use lsx_config::{GatherOptions, ValidationError};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write_config(path: &Path, json: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create config parent");
    }
    fs::write(path, json).expect("write config");
}

const ENV_KEYS: &[&str] = &["LSX_CONFIG", "LSX_CONFIG_DIR", "XDG_CONFIG_HOME"];

#[test]
fn test_cli_path_wins_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let tmp = TempDir::new().unwrap();

        let cli = tmp.path().join("cli.json");
        let from_env = tmp.path().join("env.json");
        write_config(&cli, r#"{"warnings": true}"#);
        write_config(&from_env, r#"{"warnings": false}"#);
        env::set_var("LSX_CONFIG", &from_env);

        let resolved = resolve_config(Some(&cli));
        assert_eq!(resolved.path.as_deref(), Some(cli.as_path()));
        assert_eq!(resolved.source, ConfigSource::CliArgument);
    });
}

#[test]
fn test_missing_cli_path_falls_through_to_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let tmp = TempDir::new().unwrap();

        let from_env = tmp.path().join("env.json");
        write_config(&from_env, "{}");
        env::set_var("LSX_CONFIG", &from_env);

        let resolved = resolve_config(Some(&tmp.path().join("absent.json")));
        assert_eq!(resolved.path.as_deref(), Some(from_env.as_path()));
        assert_eq!(resolved.source, ConfigSource::Environment);
    });
}

#[test]
fn test_config_dir_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let tmp = TempDir::new().unwrap();
        env::remove_var("LSX_CONFIG");

        let dir = tmp.path().join("lsx");
        write_config(&dir.join("config.json"), "{}");
        env::set_var("LSX_CONFIG_DIR", &dir);

        let resolved = resolve_config(None);
        assert_eq!(resolved.path, Some(dir.join("config.json")));
        assert_eq!(resolved.source, ConfigSource::Environment);
    });
}

#[test]
fn test_load_options_from_file() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        write_config(
            &path,
            r#"{
                "mounts_path": "/tmp/mounts",
                "exempt_filesystems": [{"path": "/net/slow"}],
                "mount_supplement": "/var/lib/lsx/supplement",
                "blocking": {"isolate": true, "timeout_ms": 250}
            }"#,
        );

        let (options, source) = load_options(Some(&path)).unwrap();
        assert_eq!(source, ConfigSource::CliArgument);
        assert_eq!(options.mounts_path, Path::new("/tmp/mounts"));
        assert_eq!(options.blocking.timeout_ms, 250);
        assert!(options.exemptions().skips_stat(Path::new("/net/slow")));
        assert!(!options.exemptions().skips_readlink(Path::new("/net/slow")));
    });
}

#[test]
fn test_load_options_rejects_invalid_file() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(ENV_KEYS);
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        write_config(&path, r#"{"exempt_filesystems": [{"path": "relative/dir"}]}"#);

        let err = load_options(Some(&path)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    });
}

#[test]
fn test_from_file_missing_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = GatherOptions::from_file(&tmp.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ValidationError::IoError(_)));
    assert_eq!(err.code(), 60);
}
