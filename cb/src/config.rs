//! campusbot configuration types and loading

use chrono::Duration;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const LOCAL_CONFIG: &str = ".campusbot.yml";

/// Main campusbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag wins
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Chat platform connection
    pub messenger: MessengerConfig,

    /// University backend API
    pub backend: BackendConfig,

    /// Login and one-time codes
    pub auth: AuthConfig,

    /// Dialogue runtime tuning
    pub bot: BotConfig,

    /// Menu tree overrides
    pub menus: MenusConfig,

    /// Contact strings shown to users
    pub contacts: ContactsConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables and values are set correctly.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.messenger.kind == MessengerKind::Max {
            self.messenger.token()?;
        }
        let base = self.backend.base_url.trim();
        if base.is_empty() {
            return Err(eyre::eyre!("backend.base-url must not be empty"));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(eyre::eyre!("backend.base-url must be an http(s) URL, got {}", base));
        }
        if !(4..=10).contains(&self.auth.otp_digits) {
            return Err(eyre::eyre!(
                "auth.otp-digits must be between 4 and 10, got {}",
                self.auth.otp_digits
            ));
        }
        if self.auth.otp_expiry_secs == 0 {
            return Err(eyre::eyre!("auth.otp-expiry-secs must be positive"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .campusbot.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/campusbot/campusbot.yml
        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Follows the same fallback chain as [`Config::load`] but never fails.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        #[derive(Deserialize)]
        struct LogLevelOnly {
            #[serde(rename = "log-level")]
            log_level: Option<String>,
        }

        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(LOCAL_CONFIG))
                .chain(Self::user_config_path())
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| {
                let content = fs::read_to_string(path).ok()?;
                serde_yaml::from_str::<LogLevelOnly>(&content).ok()
            })
            .and_then(|parsed| parsed.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("campusbot").join("campusbot.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Which messenger adapter to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessengerKind {
    /// MAX Bot API over long polling
    #[default]
    Max,
    /// Local stdin/stdout session for development
    Console,
}

/// Messenger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    pub kind: MessengerKind,

    /// MAX Bot API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Long-poll wait in seconds
    #[serde(rename = "poll-timeout-secs")]
    pub poll_timeout_secs: u64,

    /// Timeout for send and acknowledge requests in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Chat id used by the console adapter
    #[serde(rename = "console-chat-id")]
    pub console_chat_id: i64,
}

impl MessengerConfig {
    /// Resolve the bot token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(eyre::eyre!(
                "Bot token not found. Set the {} environment variable.",
                self.token_env
            )),
        }
    }
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            kind: MessengerKind::Max,
            base_url: "https://botapi.max.ru".to_string(),
            token_env: "MAX_BOT_TOKEN".to_string(),
            poll_timeout_secs: 30,
            timeout_ms: 10_000,
            console_chat_id: 1,
        }
    }
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL; `/api/v1/...` paths are appended
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// One-time code settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(rename = "otp-digits")]
    pub otp_digits: usize,

    #[serde(rename = "otp-expiry-secs")]
    pub otp_expiry_secs: u64,
}

impl AuthConfig {
    pub fn otp_expiry(&self) -> Duration {
        Duration::seconds(i64::try_from(self.otp_expiry_secs).unwrap_or(i64::MAX / 1000))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            otp_digits: 6,
            otp_expiry_secs: 300,
        }
    }
}

/// Dialogue runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Seconds a per-chat lane may sit idle before its task exits
    #[serde(rename = "lane-idle-secs")]
    pub lane_idle_secs: u64,

    /// Queued updates per chat before the receive loop waits
    #[serde(rename = "lane-buffer")]
    pub lane_buffer: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            lane_idle_secs: 300,
            lane_buffer: 32,
        }
    }
}

/// Menu tree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenusConfig {
    /// Directory of `<role>.yml` files that replace the builtin trees
    pub path: Option<PathBuf>,
}

/// Contact details quoted in replies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    #[serde(rename = "admissions-email")]
    pub admissions_email: String,

    #[serde(rename = "admissions-phone")]
    pub admissions_phone: String,

    #[serde(rename = "admissions-office")]
    pub admissions_office: String,

    #[serde(rename = "dorm-payment-url")]
    pub dorm_payment_url: String,

    #[serde(rename = "tuition-payment-url")]
    pub tuition_payment_url: String,

    #[serde(rename = "e-library-url")]
    pub e_library_url: String,

    #[serde(rename = "support-email")]
    pub support_email: String,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            admissions_email: "admissions@univ.ru".to_string(),
            admissions_phone: "+7 (812) 555-0101".to_string(),
            admissions_office: "Main Campus, Office 204".to_string(),
            dorm_payment_url: "https://pay.univ.ru/dorm".to_string(),
            tuition_payment_url: "https://pay.univ.ru/tuition".to_string(),
            e_library_url: "https://library.univ.ru/ebooks".to_string(),
            support_email: "support@univ.ru".to_string(),
        }
    }
}
