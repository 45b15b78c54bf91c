//! Configuration loading for Lumen services
//!
//! Supports loading OAuth credentials from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Also loads the optional `lumen.json` application settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials filename in the Lumen config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Application settings filename in the Lumen config directory
const APP_CONFIG_FILE: &str = "lumen.json";

/// Default database filename in the Lumen data directory
const DATABASE_FILE: &str = "lumen.db";

/// Web page that lets the user pick a spreadsheet and deep-links back
pub const DEFAULT_PICKER_URL: &str = "https://lumen.shortcircuits.dev";

/// OAuth client credentials for the Google APIs
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GoogleCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/lumen/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: LUMEN_GOOGLE_CLIENT_ID=xxx LUMEN_GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("LUMEN_GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("LUMEN_GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("LUMEN_GOOGLE_CLIENT_ID")
            .context("LUMEN_GOOGLE_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("LUMEN_GOOGLE_CLIENT_SECRET")
            .context("LUMEN_GOOGLE_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Get the default credentials file path (~/.config/lumen/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Application settings (~/.config/lumen/lumen.json)
///
/// Every field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    /// Database location; defaults to the data directory
    pub database_path: Option<PathBuf>,
    /// Spreadsheet picker page
    pub picker_url: Option<String>,
}

impl LumenConfig {
    /// Load `lumen.json`, or defaults when the file does not exist
    pub fn load() -> Result<Self> {
        if config::config_exists(APP_CONFIG_FILE) {
            config::load_json(APP_CONFIG_FILE)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the database path, creating the data directory when the
    /// default location is used
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dir = config::ensure_data_dir()?;
        Ok(dir.join(DATABASE_FILE))
    }

    pub fn picker_url(&self) -> &str {
        self.picker_url.as_deref().unwrap_or(DEFAULT_PICKER_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "web-secret");
    }

    #[test]
    fn test_invalid_json() {
        let json = r#"{ "other": {} }"#;
        assert!(GoogleCredentials::from_json(json).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();

        let creds = GoogleCredentials::from_file(&path).unwrap();
        assert_eq!(creds.client_id, "id");
    }

    #[test]
    fn test_lumen_config_defaults() {
        let cfg: LumenConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, LumenConfig::default());
        assert_eq!(cfg.picker_url(), DEFAULT_PICKER_URL);
    }

    #[test]
    fn test_lumen_config_explicit_database() {
        let cfg: LumenConfig =
            serde_json::from_str(r#"{"database_path": "/tmp/lumen-test.db"}"#).unwrap();
        assert_eq!(
            cfg.database_path().unwrap(),
            PathBuf::from("/tmp/lumen-test.db")
        );
    }
}
