//! Configuration management with XDG paths
//!
//! ~/.config/zoe/config.json - backend URL, identity settings (0600)
//!
//! Environment variables override the file: ZOE_API_URL, ZOE_CLIENT_ID,
//! ZOE_AUTHORITY, ZOE_REDIRECT_URI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::DEFAULT_SCOPES;

const APP_NAME: &str = "zoe";

pub const ENV_API_URL: &str = "ZOE_API_URL";
pub const ENV_CLIENT_ID: &str = "ZOE_CLIENT_ID";
pub const ENV_AUTHORITY: &str = "ZOE_AUTHORITY";
pub const ENV_REDIRECT_URI: &str = "ZOE_REDIRECT_URI";

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000";

/// Get config directory (~/.config/zoe/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL, e.g. https://api.example.com
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Identity provider application (client) id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default = "default_authority")]
    pub authority: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Send `user_id` alongside each query
    #[serde(default = "default_true")]
    pub include_user_id: bool,

    /// Per-request timeout; unset means the HTTP client's default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_authority() -> String { DEFAULT_AUTHORITY.to_string() }
fn default_redirect_uri() -> String { DEFAULT_REDIRECT_URI.to_string() }
fn default_scopes() -> Vec<String> { DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect() }
fn default_true() -> bool { true }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            client_id: None,
            authority: default_authority(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            include_user_id: true,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load config from disk with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&config_path()?)?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from a file, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save config with owner-only permissions
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;

        Ok(())
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(id) = get(ENV_CLIENT_ID) {
            self.client_id = Some(id);
        }
        if let Some(authority) = get(ENV_AUTHORITY) {
            self.authority = authority;
        }
        if let Some(uri) = get(ENV_REDIRECT_URI) {
            self.redirect_uri = uri;
        }
    }

    /// Set a single value by name (for `zoe config set`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_url" | "api_base_url" => self.api_base_url = Some(normalize_base_url(value)?),
            "client_id" => self.client_id = Some(value.trim().to_string()),
            "authority" => self.authority = value.trim().to_string(),
            "redirect_uri" => self.redirect_uri = value.trim().to_string(),
            "scopes" => {
                self.scopes = value.split_whitespace().map(|s| s.to_string()).collect();
            }
            "include_user_id" => {
                self.include_user_id = value
                    .trim()
                    .parse()
                    .with_context(|| format!("include_user_id must be true or false, got {:?}", value))?;
            }
            "timeout" | "request_timeout_secs" => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("timeout must be a number of seconds, got {:?}", value))?;
                self.request_timeout_secs = (secs > 0).then_some(secs);
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Normalized backend URL, required before any request
    pub fn api_base_url(&self) -> Result<String> {
        let raw = self.api_base_url.as_deref().with_context(|| {
            format!(
                "No API URL configured. Set {} or run: zoe config set api_url <url>",
                ENV_API_URL
            )
        })?;
        normalize_base_url(raw)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Trim, drop trailing slashes and require an http(s) scheme with a host
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("API URL must not be empty");
    }
    let Some((scheme, host)) = trimmed.split_once("://") else {
        anyhow::bail!("API URL must start with http:// or https://: {}", raw);
    };
    if scheme != "http" && scheme != "https" {
        anyhow::bail!("API URL must start with http:// or https://: {}", raw);
    }
    if host.is_empty() || host.starts_with('/') {
        anyhow::bail!("API URL has no host: {}", raw);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let cfg = Config::default();
        assert!(cfg.api_base_url.is_none());
        assert!(cfg.include_user_id);
        assert_eq!(cfg.scopes, vec!["openid", "profile", "email"]);
        assert_eq!(cfg.redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(cfg.request_timeout().is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"api_base_url":"https://api.test"}"#).unwrap();
        assert_eq!(cfg.api_base_url.as_deref(), Some("https://api.test"));
        assert_eq!(cfg.authority, DEFAULT_AUTHORITY);
        assert!(cfg.include_user_id);
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "https://env.test/"),
            (ENV_CLIENT_ID, "  "),
            (ENV_REDIRECT_URI, "http://localhost:4000"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config {
            api_base_url: Some("https://file.test".into()),
            client_id: Some("from-file".into()),
            ..Default::default()
        };
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(cfg.api_base_url.as_deref(), Some("https://env.test/"));
        assert_eq!(cfg.client_id.as_deref(), Some("from-file"));
        assert_eq!(cfg.redirect_uri, "http://localhost:4000");
        assert_eq!(cfg.api_base_url().unwrap(), "https://env.test");
    }

    #[test]
    fn test_missing_api_url_is_an_error() {
        let err = Config::default().api_base_url().unwrap_err();
        assert!(err.to_string().contains(ENV_API_URL));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url(" https://api.test// ").unwrap(), "https://api.test");
        assert!(normalize_base_url("api.test").is_err());
        assert!(normalize_base_url("ftp://api.test").is_err());
        assert!(normalize_base_url("https://").is_err());
    }

    #[test]
    fn test_set_values() {
        let mut cfg = Config::default();
        cfg.set("api_url", "https://api.test/").unwrap();
        cfg.set("include_user_id", "false").unwrap();
        cfg.set("timeout", "30").unwrap();
        cfg.set("scopes", "openid email").unwrap();

        assert_eq!(cfg.api_base_url.as_deref(), Some("https://api.test"));
        assert!(!cfg.include_user_id);
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.scopes, vec!["openid", "email"]);
        assert!(cfg.set("colour", "blue").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zoe").join("config.json");

        let cfg = Config {
            api_base_url: Some("https://api.test".into()),
            client_id: Some("client-1".into()),
            ..Default::default()
        };
        cfg.save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
