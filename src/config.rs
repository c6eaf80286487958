use anyhow::{Result, bail};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown STORAGE_BACKEND: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub jwt_secret: String,
    pub jwt_expiration_days: i64,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub client_base_url: String,
    pub cache_max_capacity: u64,
    pub cache_ttl_seconds: u64,
    pub mail_from: String,
    pub notification_max_attempts: u32,
    pub notification_backoff_ms: u64,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    pub fn from_env_only() -> Result<Self> {
        Ok(Config {
            database_url: var_or("DATABASE_URL", "postgres://@localhost:5432/overtime"),
            storage_backend: var_or("STORAGE_BACKEND", "postgres").parse()?,
            jwt_secret: var_or(
                "JWT_SECRET",
                "your-super-secret-jwt-key-change-this-in-production-12345",
            ),
            jwt_expiration_days: parsed_or("JWT_EXPIRATION_DAYS", 30),
            host: var_or("HOST", "127.0.0.1"),
            port: parsed_or("PORT", 8080),
            environment: var_or("ENVIRONMENT", "development"),
            client_base_url: var_or("CLIENT_BASE_URL", "http://localhost:3000"),
            cache_max_capacity: parsed_or("CACHE_MAX_CAPACITY", 10_000),
            cache_ttl_seconds: parsed_or("CACHE_TTL_SECONDS", 300),
            mail_from: var_or("MAIL_FROM", "overtime@localhost"),
            notification_max_attempts: parsed_or("NOTIFICATION_MAX_ATTEMPTS", 5),
            notification_backoff_ms: parsed_or("NOTIFICATION_BACKOFF_MS", 500),
        })
    }

    /// Fixed configuration for tests: in-memory storage, short backoff.
    pub fn test_config() -> Self {
        Config {
            database_url: "postgres://@localhost:5432/overtime_test".to_string(),
            storage_backend: StorageBackend::Memory,
            jwt_secret: "test-jwt-secret-key-that-is-long-enough".to_string(),
            jwt_expiration_days: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            client_base_url: "http://localhost:3000".to_string(),
            cache_max_capacity: 1_000,
            cache_ttl_seconds: 60,
            mail_from: "overtime@test".to_string(),
            notification_max_attempts: 3,
            notification_backoff_ms: 1,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
