//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the Telegram retry constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Layout of the format selection menu
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MenuLayout {
    /// 720p, 480p, MP3, Cancel
    Compact,
    /// 720p, 480p, 360p, MP3 with bitrate, Cancel
    #[default]
    Extended,
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Path or name of the yt-dlp executable
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Root directory for per-job download folders
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Seconds a pending request survives without a selection
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Maximum number of pending requests kept in memory
    #[serde(default = "default_session_max_capacity")]
    pub session_max_capacity: u64,

    /// Upper bound for a metadata lookup
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
    /// Upper bound for a download (including transcoding)
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// MP3 bitrate requested from the transcoder
    #[serde(default = "default_audio_bitrate_kbps")]
    pub audio_bitrate_kbps: u32,

    /// Which format menu to show
    #[serde(default)]
    pub menu_layout: MenuLayout,

    /// Largest file the bot will try to upload (Bot API limit is 50 MB)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("media-fetch-bot")
}

const fn default_session_ttl_secs() -> u64 {
    900
}

const fn default_session_max_capacity() -> u64 {
    10_000
}

const fn default_extraction_timeout_secs() -> u64 {
    60
}

const fn default_download_timeout_secs() -> u64 {
    600
}

const fn default_audio_bitrate_kbps() -> u32 {
    192
}

const fn default_max_upload_mb() -> u64 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            ytdlp_path: default_ytdlp_path(),
            download_dir: default_download_dir(),
            session_ttl_secs: default_session_ttl_secs(),
            session_max_capacity: default_session_max_capacity(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            audio_bitrate_kbps: default_audio_bitrate_kbps(),
            menu_layout: MenuLayout::default(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_fetch_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no bot token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__DOWNLOAD_TIMEOUT_SECS=900 ./target/app`
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain variables; UPPER_SNAKE_CASE maps to snake_case keys
            .add_source(
                Environment::default()
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Older deployments only set BOT_TOKEN
        if settings.telegram_token.trim().is_empty() {
            if let Ok(val) = std::env::var("BOT_TOKEN") {
                if !val.trim().is_empty() {
                    settings.telegram_token = val;
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_TOKEN (or BOT_TOKEN) is not set".to_string(),
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "session_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.extraction_timeout_secs == 0 || self.download_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "extraction and download timeouts must be greater than 0".to_string(),
            ));
        }
        if self.audio_bitrate_kbps == 0 {
            return Err(ConfigError::Message(
                "audio_bitrate_kbps must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Pending request time-to-live
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Metadata lookup timeout
    #[must_use]
    pub const fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Download timeout
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Upload limit in bytes
    #[must_use]
    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

// Telegram API retry configuration
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Maximum attempts for a single Telegram API call
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Longest title shown in the format menu
pub const MENU_TITLE_MAX_CHARS: usize = 50;
/// Longest title written into audio metadata
pub const AUDIO_TITLE_MAX_CHARS: usize = 30;
/// Telegram caption limit
pub const CAPTION_MAX_CHARS: usize = 1024;
