//! Environment and workspace layering of the configuration

use crate::integration::ENV_MUTEX;
use mirrorcast::config::ConfigLoader;
use std::fs;
use tempfile::TempDir;

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_environment_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = EnvGuard(&["MIRRORCAST_SERVER__BIND", "MIRRORCAST_LIMITS__MAX_SESSIONS"]);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mirrorcast.toml");
    fs::write(
        &path,
        "[server]\nbind = \"127.0.0.1:4000\"\n\n[limits]\nmax_sessions = 2\nmax_file_size = 1024\n",
    )
    .unwrap();

    std::env::set_var("MIRRORCAST_SERVER__BIND", "0.0.0.0:9000");
    std::env::set_var("MIRRORCAST_LIMITS__MAX_SESSIONS", "7");

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.server.bind, "0.0.0.0:9000");
    assert_eq!(config.limits.max_sessions, 7);
    assert_eq!(config.limits.max_file_size, 1024);
}

#[test]
fn test_environment_profile_file_layers_over_base() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = EnvGuard(&["MIRRORCAST_ENV"]);

    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[client]\ndebounce_ms = 250\nserver_url = \"http://base:3000\"\n",
    )
    .unwrap();
    fs::write(
        config_dir.join("classroom.toml"),
        "[client]\nserver_url = \"http://classroom:3000\"\n",
    )
    .unwrap();

    std::env::set_var("MIRRORCAST_ENV", "classroom");
    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.client.server_url, "http://classroom:3000");
    assert_eq!(config.client.debounce_ms, 250);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml")).is_err());
}
