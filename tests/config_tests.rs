use std::env;

use overtime::config::{Config, StorageBackend};
use pretty_assertions::assert_eq;
use serial_test::serial;

mod common;

const KEYS: [&str; 13] = [
    "DATABASE_URL",
    "HOST",
    "STORAGE_BACKEND",
    "JWT_SECRET",
    "JWT_EXPIRATION_DAYS",
    "PORT",
    "ENVIRONMENT",
    "CLIENT_BASE_URL",
    "CACHE_MAX_CAPACITY",
    "CACHE_TTL_SECONDS",
    "MAIL_FROM",
    "NOTIFICATION_MAX_ATTEMPTS",
    "NOTIFICATION_BACKOFF_MS",
];

/// Runs `f` with `KEYS` cleared and `vars` set, restoring the originals after.
fn with_env(vars: &[(&str, &str)], f: impl FnOnce()) {
    let original: Vec<(&str, Option<String>)> =
        KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();

    unsafe {
        for key in KEYS {
            env::remove_var(key);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    f();

    unsafe {
        for (key, value) in original {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

#[test]
#[serial]
fn test_config_defaults() {
    common::setup_test_env();

    with_env(&[], || {
        let config = Config::from_env_only().unwrap();

        assert_eq!(config.database_url, "postgres://@localhost:5432/overtime");
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert_eq!(config.client_base_url, "http://localhost:3000");
        assert_eq!(config.notification_max_attempts, 5);
        assert_eq!(config.notification_backoff_ms, 500);
        assert!(config.is_development());
        assert!(!config.is_production());
    });
}

#[test]
#[serial]
fn test_config_custom_values() {
    common::setup_test_env();

    with_env(
        &[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", "another-secret"),
            ("PORT", "9090"),
            ("ENVIRONMENT", "production"),
            ("CLIENT_BASE_URL", "https://overtime.plant.test"),
            ("NOTIFICATION_MAX_ATTEMPTS", "2"),
        ],
        || {
            let config = Config::from_env_only().unwrap();

            assert_eq!(config.storage_backend, StorageBackend::Memory);
            assert_eq!(config.jwt_secret, "another-secret");
            assert_eq!(config.server_address(), "127.0.0.1:9090");
            assert_eq!(config.client_base_url, "https://overtime.plant.test");
            assert_eq!(config.notification_max_attempts, 2);
            assert!(config.is_production());
        },
    );
}

#[test]
#[serial]
fn test_unparseable_numbers_fall_back_to_defaults() {
    with_env(&[("PORT", "not-a-port")], || {
        let config = Config::from_env_only().unwrap();
        assert_eq!(config.port, 8080);
    });
}

#[test]
#[serial]
fn test_unknown_storage_backend_is_an_error() {
    with_env(&[("STORAGE_BACKEND", "mongodb")], || {
        let error = Config::from_env_only().unwrap_err();
        assert!(error.to_string().contains("mongodb"));
    });
}
