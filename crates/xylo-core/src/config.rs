//! Configuration management for Xylo.
//!
//! Loads configuration from ${XYLO_HOME}/config.toml with sensible defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item, Table, value};

use crate::store::write_atomic;
use crate::widgets::NumberFormat;

/// Which identity outgoing requests carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// Bearer token when one is stored, otherwise the session id.
    #[default]
    Auto,
    /// Always the client-generated session id.
    Session,
    /// The stored access token (session id if none is stored).
    Bearer,
}

impl IdentityMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            IdentityMode::Auto => "auto",
            IdentityMode::Session => "session",
            IdentityMode::Bearer => "bearer",
        }
    }
}

/// KPI number formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let format = NumberFormat::default();
        Self {
            thousands_separator: format.group,
            decimal_separator: format.decimal,
        }
    }
}

impl DisplayConfig {
    pub fn number_format(&self) -> NumberFormat {
        NumberFormat {
            group: self.thousands_separator,
            decimal: self.decimal_separator,
        }
    }
}

/// Commented default config, embedded from `default_config.toml`.
const TEMPLATE: &str = include_str!("../default_config.toml");

fn parse_document(contents: &str, what: &str) -> Result<DocumentMut> {
    contents
        .parse()
        .with_context(|| format!("Failed to parse {what}"))
}

/// Lays the user's document over the template.
///
/// User values win. Keys and comments the user file lacks come from the template.
fn overlay_on_template(user: &DocumentMut) -> Result<DocumentMut> {
    let mut doc = parse_document(TEMPLATE, "default config template")?;
    overlay_table(doc.as_table_mut(), user.as_table());
    Ok(doc)
}

fn overlay_table(target: &mut Table, source: &Table) {
    for (key, item) in source {
        match (item, target.get_mut(key)) {
            (Item::None, _) => {}
            (Item::Table(nested), Some(Item::Table(existing))) => overlay_table(existing, nested),
            (item, _) => target[key] = item.clone(),
        }
    }
}

pub mod paths {
    //! Path resolution for Xylo configuration and client state.
    //!
    //! XYLO_HOME resolution order:
    //! 1. XYLO_HOME environment variable (if set)
    //! 2. ~/.config/xylo (default)

    use std::path::PathBuf;

    /// Returns the Xylo home directory.
    pub fn xylo_home() -> PathBuf {
        if let Ok(home) = std::env::var("XYLO_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("xylo")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        xylo_home().join("config.toml")
    }

    /// Returns the path of the persisted client session id.
    pub fn session_path() -> PathBuf {
        xylo_home().join("session_id")
    }

    /// Returns the path of the persisted access token.
    pub fn token_path() -> PathBuf {
        xylo_home().join("access_token")
    }

    /// Returns the log directory.
    pub fn logs_dir() -> PathBuf {
        xylo_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the analytics backend
    pub base_url: String,

    /// Identity carried by every request
    pub identity: IdentityMode,

    /// Timeout for file and account requests in seconds (0 disables)
    pub request_timeout_secs: u32,

    /// Timeout for a chat question in seconds (0 disables)
    pub chat_timeout_secs: u32,

    /// Progress label rotation interval in milliseconds
    pub progress_interval_ms: u64,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Number display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Command-line override; never written to disk
    #[serde(skip)]
    pub base_url_override: Option<String>,
}

impl Config {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;
    const DEFAULT_CHAT_TIMEOUT_SECS: u32 = 120;
    const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 2500;
    const BASE_URL_ENV: &str = "XYLO_BASE_URL";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the effective base URL with precedence:
    /// override > env > config > default.
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(url) = self.base_url_override.as_deref() {
            return resolve_base_url(Some(url.to_string()), None);
        }
        resolve_base_url(std::env::var(Self::BASE_URL_ENV).ok(), Some(&self.base_url))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.request_timeout_secs)
    }

    pub fn chat_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.chat_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Saves only the base_url field to the default config file.
    pub fn save_base_url(base_url: &str) -> Result<()> {
        Self::save_base_url_to(&paths::config_path(), base_url)
    }

    /// Writes `base_url` into the config at `path`, keeping every other value.
    ///
    /// A missing file starts from the template.
    pub fn save_base_url_to(path: &Path, base_url: &str) -> Result<()> {
        validate_url(base_url)?;

        let mut doc = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            let user = parse_document(&user_config, &path.display().to_string())?;
            overlay_on_template(&user)?
        } else {
            parse_document(TEMPLATE, "default config template")?
        };
        doc["base_url"] = value(base_url);

        write_atomic(path, &doc.to_string())
    }

    /// Writes the commented template to `path`. Refuses to overwrite.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        write_atomic(path, TEMPLATE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            identity: IdentityMode::default(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            chat_timeout_secs: Self::DEFAULT_CHAT_TIMEOUT_SECS,
            progress_interval_ms: Self::DEFAULT_PROGRESS_INTERVAL_MS,
            headers: BTreeMap::new(),
            display: DisplayConfig::default(),
            base_url_override: None,
        }
    }
}

fn secs_to_timeout(secs: u32) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(u64::from(secs)))
}

/// Resolves a base URL with precedence: env > config > default.
fn resolve_base_url(env_url: Option<String>, config_url: Option<&str>) -> Result<String> {
    let candidates = [env_url.as_deref(), config_url];
    for candidate in candidates.into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }
    Ok(Config::DEFAULT_BASE_URL.to_string())
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}
