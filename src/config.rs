//! Environment configuration
//!
//! Values come from the process environment, after `main` has loaded an
//! optional `.env` file. Server settings have defaults; the blob store
//! settings do not, and are loaded separately so their absence can put the
//! server in unavailable mode instead of aborting start-up.

use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "gifts.db";
const DEFAULT_UPLOAD_TTL_SECS: u64 = 360;
const DEFAULT_BLOB_REGION: &str = "auto";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Server-level settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Path to the redb file of the record store
    pub database_url: String,
    pub upload_ttl: Duration,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let ttl_secs = parse_or(&lookup, "UPLOAD_URL_TTL_SECS", DEFAULT_UPLOAD_TTL_SECS)?;

        Ok(Self {
            port,
            database_url: non_empty(&lookup, "DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            upload_ttl: Duration::from_secs(ttl_secs),
            gemini_api_key: non_empty(&lookup, "GEMINI_API_KEY"),
            gemini_model: non_empty(&lookup, "GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        })
    }

    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Connection settings of the S3-compatible blob store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base URL images are publicly served from
    pub public_url: String,
}

impl BlobConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source, reporting every
    /// missing variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |key: &'static str| {
            non_empty(&lookup, key).unwrap_or_else(|| {
                missing.push(key);
                String::new()
            })
        };

        let bucket = required("BLOB_BUCKET");
        let endpoint = required("BLOB_ENDPOINT");
        let access_key_id = required("BLOB_ACCESS_KEY_ID");
        let secret_access_key = required("BLOB_SECRET_ACCESS_KEY");
        let public_url = required("BLOB_PUBLIC_URL");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            bucket,
            endpoint,
            region: non_empty(&lookup, "BLOB_REGION")
                .unwrap_or_else(|| DEFAULT_BLOB_REGION.to_string()),
            access_key_id,
            secret_access_key,
            public_url,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match non_empty(lookup, key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
