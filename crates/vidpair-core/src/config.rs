//! Configuration module
//!
//! Connection parameters for the document store and paths of the external media tools.
//! Both are read from the environment (a `.env` file is honoured) and are immutable once
//! built, so a single value can be shared by any number of concurrent uploads.

use std::env;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

const DEFAULT_COUCHDB_URL: &str = "http://127.0.0.1:5984";
const DEFAULT_DATABASE: &str = "mydatabase";
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Document store endpoint and credentials
#[derive(Clone)]
pub struct StoreConfig {
    pub base_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl StoreConfig {
    pub fn new(
        base_url: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load from COUCHDB_URL, COUCHDB_DATABASE, COUCHDB_USER, COUCHDB_PASSWORD and
    /// COUCHDB_TIMEOUT_SECS. Only the password is mandatory.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base_url = env::var("COUCHDB_URL").unwrap_or_else(|_| DEFAULT_COUCHDB_URL.to_string());
        let database =
            env::var("COUCHDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let username = env::var("COUCHDB_USER").unwrap_or_else(|_| DEFAULT_USERNAME.to_string());
        let password = env::var("COUCHDB_PASSWORD")
            .map_err(|_| anyhow::anyhow!("COUCHDB_PASSWORD must be set"))?;
        let timeout_secs = match env::var("COUCHDB_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid COUCHDB_TIMEOUT_SECS {:?}: {}", raw, e))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            timeout_secs,
            ..Self::new(base_url, database, username, password)
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "Store URL must start with http:// or https://, got {}",
                self.base_url
            ));
        }
        if self.database.is_empty() {
            return Err(anyhow::anyhow!("Database name must not be empty"));
        }
        // CouchDB database names: lowercase letter first, then [a-z0-9_$()+-/]
        let mut chars = self.database.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let rest_ok = chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c)
        });
        if !first_ok || !rest_ok {
            return Err(anyhow::anyhow!("Invalid database name: {}", self.database));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Timeout must be greater than zero"));
        }
        Ok(())
    }

    /// `{base_url}/{database}`, the collection endpoint documents are POSTed to.
    ///
    /// The database name is one path segment, so `/` is sent as `%2F`.
    pub fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(&self.database))
    }

    /// Value for the `Authorization` header.
    pub fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Paths of the ffmpeg tool suite used by the media collaborators
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl ProcessingConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoreConfig {
        StoreConfig::new("http://127.0.0.1:5984/", "mydatabase", "admin", "adminadmin")
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(config().base_url, "http://127.0.0.1:5984");
        assert_eq!(config().database_url(), "http://127.0.0.1:5984/mydatabase");
    }

    #[test]
    fn test_database_url_keeps_name_in_one_segment() {
        let mut nested = config();
        nested.database = "team/pairs".to_string();
        assert!(nested.validate().is_ok());
        assert_eq!(
            nested.database_url(),
            "http://127.0.0.1:5984/team%2Fpairs"
        );
    }

    #[test]
    fn test_basic_auth_header() {
        // base64("admin:adminadmin")
        assert_eq!(
            config().basic_auth_header(),
            "Basic YWRtaW46YWRtaW5hZG1pbg=="
        );
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.base_url = "ftp://example.com".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.database = "MyDatabase".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.database = String::new();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.timeout_secs = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("adminadmin"));
        assert!(rendered.contains("<redacted>"));
    }
}
