//! Configuration module for arbor.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{ArborError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/arbor.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which object store backs file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Filesystem-backed bucket with self-issued signed URLs.
    Local,
    /// S3-compatible bucket with provider-signed URLs.
    S3,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage backend.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Root directory of the local bucket.
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// URL under which the local bucket's `/file` endpoint is reachable.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Lifetime of issued signed URLs in seconds.
    #[serde(default = "default_signed_url_expires")]
    pub signed_url_expires_secs: u64,
    /// Delete stored objects when their file is deleted.
    #[serde(default)]
    pub purge_objects_on_delete: bool,
    /// Remote bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Remote bucket region.
    #[serde(default)]
    pub region: String,
    /// Custom endpoint for S3-compatible providers.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Remote access key id.
    #[serde(default)]
    pub access_key_id: String,
    /// Remote secret access key.
    #[serde(default)]
    pub secret_access_key: String,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_local_path() -> String {
    ".files".to_string()
}

fn default_public_url() -> String {
    "http://localhost:4000/file".to_string()
}

fn default_signed_url_expires() -> u64 {
    900 // 15 minutes
}

impl StorageConfig {
    /// Lifetime of issued signed URLs.
    pub fn signed_url_expires(&self) -> Duration {
        Duration::from_secs(self.signed_url_expires_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            public_url: default_public_url(),
            signed_url_expires_secs: default_signed_url_expires(),
            purge_objects_on_delete: false,
            bucket: String::new(),
            region: String::new(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

/// Directory listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Page length used when the caller does not give one.
    #[serde(default = "default_page_length")]
    pub default_page_length: u32,
}

fn default_page_length() -> u32 {
    20
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_length: default_page_length(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Also write to stdout. Turn off for file-only logging.
    #[serde(default = "default_true")]
    pub console: bool,
    /// Extra per-target filter directives, e.g. `arbor::bucket=debug`.
    #[serde(default)]
    pub directives: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/arbor.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            console: true,
            directives: Vec::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Directory listing configuration.
    #[serde(default)]
    pub listing: ListingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ArborError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ArborError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `ARBOR_BUCKET`: remote bucket name
    /// - `AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`: remote credentials
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("ARBOR_BUCKET", &mut self.storage.bucket),
            ("AWS_REGION", &mut self.storage.region),
            ("AWS_ACCESS_KEY_ID", &mut self.storage.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &mut self.storage.secret_access_key),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the S3 backend is selected without a bucket name
    /// - signed URLs would expire immediately
    /// - listings would default to empty pages
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_empty() {
            return Err(ArborError::Config(
                "storage.backend is s3 but no bucket is set. \
                 Set storage.bucket in config.toml or via ARBOR_BUCKET."
                    .to_string(),
            ));
        }
        if self.storage.signed_url_expires_secs == 0 {
            return Err(ArborError::Config(
                "storage.signed_url_expires_secs must be positive".to_string(),
            ));
        }
        if self.listing.default_page_length == 0 {
            return Err(ArborError::Config(
                "listing.default_page_length must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 4000);

        assert_eq!(config.database.path, "data/arbor.db");

        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_path, ".files");
        assert_eq!(config.storage.public_url, "http://localhost:4000/file");
        assert_eq!(config.storage.signed_url_expires(), Duration::from_secs(900));
        assert!(!config.storage.purge_objects_on_delete);
        assert!(config.storage.endpoint.is_none());

        assert_eq!(config.listing.default_page_length, 20);

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/arbor.log");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080

[database]
path = "custom/arbor.sqlite"

[storage]
backend = "s3"
local_path = "blobs"
public_url = "https://files.example.com/file"
signed_url_expires_secs = 60
purge_objects_on_delete = true
bucket = "arbor-files"
region = "eu-west-1"
endpoint = "http://localhost:9000"
access_key_id = "key"
secret_access_key = "secret"

[listing]
default_page_length = 50

[logging]
level = "debug"
file = "custom/logs/arbor.log"
console = false
directives = ["arbor::hierarchy=trace"]
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "custom/arbor.sqlite");
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.local_path, "blobs");
        assert_eq!(config.storage.public_url, "https://files.example.com/file");
        assert_eq!(config.storage.signed_url_expires_secs, 60);
        assert!(config.storage.purge_objects_on_delete);
        assert_eq!(config.storage.bucket, "arbor-files");
        assert_eq!(config.storage.region, "eu-west-1");
        assert_eq!(
            config.storage.endpoint.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.storage.access_key_id, "key");
        assert_eq!(config.storage.secret_access_key, "secret");
        assert_eq!(config.listing.default_page_length, 50);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/arbor.log");
        assert!(!config.logging.console);
        assert_eq!(config.logging.directives, vec!["arbor::hierarchy=trace"]);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[server]
port = 3000
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.path, "data/arbor.db");
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.signed_url_expires_secs, 900);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        assert!(result.is_err());
        if let Err(ArborError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_parse_unknown_backend() {
        let result = Config::parse("[storage]\nbackend = \"ftp\"\n");
        assert!(matches!(result, Err(ArborError::Config(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(ArborError::Io(_))));
    }

    #[test]
    fn test_apply_env_overrides_bucket() {
        let original = std::env::var("ARBOR_BUCKET").ok();

        std::env::set_var("ARBOR_BUCKET", "env-bucket");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.storage.bucket, "env-bucket");

        if let Some(val) = original {
            std::env::set_var("ARBOR_BUCKET", val);
        } else {
            std::env::remove_var("ARBOR_BUCKET");
        }
    }

    #[test]
    fn test_validate_s3_without_bucket() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::S3;
        config.storage.bucket = String::new();

        let result = config.validate();
        if let Err(ArborError::Config(msg)) = result {
            assert!(msg.contains("bucket"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_validate_zero_expiry() {
        let mut config = Config::default();
        config.storage.signed_url_expires_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }
}
