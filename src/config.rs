use std::env;

use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub scheduling: SchedulingConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Directory with the built front end. When set, it is served for every
    /// path not handled by the API. Read from env var `STATIC_DIR`.
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    /// Upper bound for the single outbound completion request.
    pub timeout_seconds: u64,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Default exam length when the completion service gives no end time.
    pub exam_duration_minutes: i64,
    /// Offset (seconds east of UTC) used for "today" and for date-times
    /// returned without an explicit offset. Read from `DEFAULT_UTC_OFFSET`
    /// in `+HH:MM` / `-HH:MM` form.
    pub utc_offset_seconds: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for `/api/events`
    pub api_per_second: u32,
    /// Burst size for `/api/events`
    pub api_burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Longest accepted exam default: one week.
pub const MAX_EXAM_DURATION_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl SchedulingConfig {
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let base_url = get("OPENAI_BASE_URL").unwrap_or(defaults.completion.base_url);
        url::Url::parse(&base_url)
            .map_err(|_| ConfigError::InvalidValue("OPENAI_BASE_URL".to_string()))?;

        let utc_offset_seconds = match get("DEFAULT_UTC_OFFSET") {
            Some(raw) => parse_utc_offset(&raw)
                .ok_or_else(|| ConfigError::InvalidValue("DEFAULT_UTC_OFFSET".to_string()))?,
            None => defaults.scheduling.utc_offset_seconds,
        };

        let exam_duration_minutes: i64 = parse_or(
            &get,
            "EXAM_DURATION_MINUTES",
            defaults.scheduling.exam_duration_minutes,
        )?;
        if !(1..=MAX_EXAM_DURATION_MINUTES).contains(&exam_duration_minutes) {
            return Err(ConfigError::InvalidValue(
                "EXAM_DURATION_MINUTES".to_string(),
            ));
        }

        let timeout_seconds: u64 = parse_or(
            &get,
            "OPENAI_TIMEOUT_SECONDS",
            defaults.completion.timeout_seconds,
        )?;
        if timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "OPENAI_TIMEOUT_SECONDS".to_string(),
            ));
        }

        let api_per_second: u32 = parse_or(
            &get,
            "RATE_LIMIT_API_PER_SECOND",
            defaults.rate_limit.api_per_second,
        )?;
        let api_burst: u32 = parse_or(&get, "RATE_LIMIT_API_BURST", defaults.rate_limit.api_burst)?;
        if api_per_second == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_API_PER_SECOND".to_string(),
            ));
        }
        if api_burst == 0 {
            return Err(ConfigError::InvalidValue("RATE_LIMIT_API_BURST".to_string()));
        }

        Ok(Config {
            server: ServerConfig {
                host: get("HOST").unwrap_or(defaults.server.host),
                port: parse_or(&get, "PORT", defaults.server.port)?,
                frontend_url: get("FRONTEND_URL").unwrap_or(defaults.server.frontend_url),
                static_dir: get("STATIC_DIR").filter(|s| !s.trim().is_empty()),
            },
            completion: CompletionConfig {
                api_key: get("OPENAI_API_KEY")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingEnv("OPENAI_API_KEY".to_string()))?,
                base_url,
                model: get("OPENAI_MODEL").unwrap_or(defaults.completion.model),
                timeout_seconds,
                temperature: parse_or(&get, "OPENAI_TEMPERATURE", defaults.completion.temperature)?,
            },
            scheduling: SchedulingConfig {
                exam_duration_minutes,
                utc_offset_seconds,
            },
            rate_limit: RateLimitConfig {
                api_per_second,
                api_burst,
            },
            logging: LoggingConfig {
                format: parse_or(&get, "LOG_FORMAT", defaults.logging.format)?,
            },
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC` into seconds east of UTC.
fn parse_utc_offset(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                static_dir: None,
            },
            completion: CompletionConfig {
                api_key: String::new(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_seconds: 30,
                temperature: 0.2,
            },
            scheduling: SchedulingConfig {
                exam_duration_minutes: 150,
                utc_offset_seconds: 0,
            },
            rate_limit: RateLimitConfig {
                api_per_second: 2,
                api_burst: 20,
            },
            logging: LoggingConfig {
                format: LogFormat::Text,
            },
        }
    }
}
