//! Configuration management for the control plane
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use fnhost_common::{NameBounds, MAX_APP_NAME_LEN, MIN_APP_NAME_LEN};
use std::env;
use std::str::FromStr;

/// Which [`Store`](crate::storage::Store) implementation to run with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Redis,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "redis" => Ok(StorageBackend::Redis),
            other => anyhow::bail!("unknown storage backend: {} (expected memory/redis)", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Storage backend
    pub storage_backend: StorageBackend,

    /// Redis connection URL (redis backend only)
    pub redis_url: String,

    /// Base URL that application endpoints are derived from
    pub function_base_url: String,

    /// Application name length bounds
    pub name_bounds: NameBounds,

    /// Largest accepted deploy upload, in bytes
    pub max_deploy_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()
                .context("Invalid STORAGE_BACKEND")?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            function_base_url: env::var("FUNCTION_BASE_URL")
                .unwrap_or_else(|_| "http://0.0.0.0:5000".to_string()),

            name_bounds: NameBounds::new(
                env::var("APP_NAME_MIN_LEN")
                    .unwrap_or_else(|_| MIN_APP_NAME_LEN.to_string())
                    .parse()
                    .context("Invalid APP_NAME_MIN_LEN")?,
                env::var("APP_NAME_MAX_LEN")
                    .unwrap_or_else(|_| MAX_APP_NAME_LEN.to_string())
                    .parse()
                    .context("Invalid APP_NAME_MAX_LEN")?,
            ),

            max_deploy_bytes: env::var("MAX_DEPLOY_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid MAX_DEPLOY_BYTES")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.function_base_url.trim().is_empty() {
            anyhow::bail!("FUNCTION_BASE_URL must not be empty");
        }

        if self.name_bounds.min > self.name_bounds.max {
            anyhow::bail!("APP_NAME_MIN_LEN must not exceed APP_NAME_MAX_LEN");
        }

        if self.max_deploy_bytes == 0 {
            anyhow::bail!("MAX_DEPLOY_BYTES must be greater than 0");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
