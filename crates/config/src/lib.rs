//! Configuration loading, validation, and management for Glyphsmith.
//!
//! Loads configuration from `~/.glyphsmith/config.toml` with environment
//! variable overrides. The result is validated once at startup and then
//! passed down explicitly; nothing reads configuration from globals.

use glyphsmith_core::font::FontProfile;
use glyphsmith_core::glyph::MAX_GLYPHS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.glyphsmith/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Where thank-you messages are forwarded
    #[serde(default)]
    pub operator: OperatorConfig,

    /// Names and metrics of the assembled font
    #[serde(default)]
    pub font: FontConfig,

    /// Session limits
    #[serde(default)]
    pub session: SessionConfig,

    /// Outline asset storage
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
        }
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Chat that receives operator notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    #[serde(default = "default_family")]
    pub family: String,

    #[serde(default = "default_postscript_name")]
    pub postscript_name: String,

    #[serde(default = "default_units_per_em")]
    pub units_per_em: u16,

    #[serde(default = "default_ascent")]
    pub ascent: i16,

    #[serde(default = "default_descent")]
    pub descent: i16,

    #[serde(default = "default_advance_width")]
    pub advance_width: u16,

    /// File name of the delivered font
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_family() -> String {
    FontProfile::default().family
}
fn default_postscript_name() -> String {
    FontProfile::default().postscript_name
}
fn default_units_per_em() -> u16 {
    FontProfile::default().units_per_em
}
fn default_ascent() -> i16 {
    FontProfile::default().ascent
}
fn default_descent() -> i16 {
    FontProfile::default().descent
}
fn default_advance_width() -> u16 {
    FontProfile::default().advance_width
}
fn default_file_name() -> String {
    FontProfile::default().file_name
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: default_family(),
            postscript_name: default_postscript_name(),
            units_per_em: default_units_per_em(),
            ascent: default_ascent(),
            descent: default_descent(),
            advance_width: default_advance_width(),
            file_name: default_file_name(),
        }
    }
}

impl FontConfig {
    /// The profile handed to the assembler.
    pub fn profile(&self) -> FontProfile {
        FontProfile {
            family: self.family.clone(),
            postscript_name: self.postscript_name.clone(),
            units_per_em: self.units_per_em,
            ascent: self.ascent,
            descent: self.descent,
            advance_width: self.advance_width,
            file_name: self.file_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Glyphs a single session may collect (1..=400)
    #[serde(default = "default_max_glyphs")]
    pub max_glyphs: usize,

    /// Purge sessions idle for this long. 0 disables expiry.
    #[serde(default)]
    pub idle_timeout_minutes: u64,
}

fn default_max_glyphs() -> usize {
    MAX_GLYPHS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_glyphs: default_max_glyphs(),
            idle_timeout_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "file"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Root directory for the file backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Largest accepted outline upload
    #[serde(default = "default_max_outline_bytes")]
    pub max_outline_bytes: usize,
}

fn default_storage_backend() -> String {
    "file".into()
}
fn default_max_outline_bytes() -> usize {
    1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            directory: None,
            max_outline_bytes: default_max_outline_bytes(),
        }
    }
}

impl StorageConfig {
    /// Directory used by the file backend.
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("glyphsmith"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.glyphsmith/config.toml).
    ///
    /// Also checks environment variables:
    /// - `GLYPHSMITH_BOT_TOKEN`
    /// - `GLYPHSMITH_OPERATOR_CHAT`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(token) = std::env::var("GLYPHSMITH_BOT_TOKEN") {
            config.telegram.bot_token = Some(token);
        }
        if let Ok(chat) = std::env::var("GLYPHSMITH_OPERATOR_CHAT") {
            config.operator.chat_id = Some(chat);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".glyphsmith")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let font = &self.font;
        let em = i32::from(font.units_per_em);

        if !(16..=16384).contains(&font.units_per_em) {
            return Err(ConfigError::ValidationError(
                "font.units_per_em must be between 16 and 16384".into(),
            ));
        }
        if font.ascent <= 0 || font.descent < 0 {
            return Err(ConfigError::ValidationError(
                "font.ascent must be > 0 and font.descent >= 0".into(),
            ));
        }
        if i32::from(font.ascent) + i32::from(font.descent) > 2 * em {
            return Err(ConfigError::ValidationError(
                "font.ascent + font.descent must not exceed twice units_per_em".into(),
            ));
        }
        if i32::from(font.advance_width) > 4 * em {
            return Err(ConfigError::ValidationError(
                "font.advance_width must not exceed four times units_per_em".into(),
            ));
        }
        if font.family.trim().is_empty() || font.postscript_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "font.family and font.postscript_name must not be empty".into(),
            ));
        }
        if !font.file_name.to_ascii_lowercase().ends_with(".ttf") {
            return Err(ConfigError::ValidationError(
                "font.file_name must end with .ttf".into(),
            ));
        }

        if !(1..=MAX_GLYPHS).contains(&self.session.max_glyphs) {
            return Err(ConfigError::ValidationError(format!(
                "session.max_glyphs must be between 1 and {MAX_GLYPHS}"
            )));
        }

        if !matches!(self.storage.backend.as_str(), "memory" | "file") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be \"memory\" or \"file\", got \"{}\"",
                self.storage.backend
            )));
        }
        if self.storage.max_outline_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "storage.max_outline_bytes must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if a bot token is available (from config or environment).
    pub fn has_bot_token(&self) -> bool {
        self.telegram
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.font.family, "TM FONT");
        assert_eq!(config.font.units_per_em, 1000);
        assert_eq!(config.session.max_glyphs, 400);
        assert_eq!(config.storage.backend, "file");
    }

    #[test]
    fn profile_matches_font_section() {
        let profile = AppConfig::default().font.profile();
        assert_eq!(profile, FontProfile::default());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.font.file_name, config.font.file_name);
        assert_eq!(parsed.session.max_glyphs, config.session.max_glyphs);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[telegram]
bot_token = "123:abc"
allowed_users = ["42"]

[font]
family = "My Hand"

[session]
max_glyphs = 50
idle_timeout_minutes = 30
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.has_bot_token());
        assert_eq!(config.telegram.allowed_users, vec!["42".to_string()]);
        assert_eq!(config.font.family, "My Hand");
        assert_eq!(config.font.ascent, 800);
        assert_eq!(config.session.max_glyphs, 50);
        assert_eq!(config.session.idle_timeout_minutes, 30);
    }

    #[test]
    fn invalid_capacity_rejected() {
        let mut config = AppConfig::default();
        config.session.max_glyphs = 401;
        assert!(config.validate().is_err());
        config.session.max_glyphs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_metrics_rejected() {
        let mut config = AppConfig::default();
        config.font.units_per_em = 8;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.font.ascent = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.font.ascent = 2000;
        config.font.descent = 500;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.font.file_name = "font.otf".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.storage.backend = "s3".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().font.family, "TM FONT");
    }

    #[test]
    fn invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nmax_glyphs = 1000\n").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        std::fs::write(&path, "not = [valid").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let mut config = AppConfig::default();
        config.telegram.bot_token = Some("123:secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("TM FONT"));
        assert!(toml_str.contains("max_glyphs"));
    }
}
