use crate::prompt::PortionGuidance;
use crate::provider::Provider;
use log::LevelFilter;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value '{value}' for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Zero turns caching off.
    pub capacity: usize,
    pub ttl: Option<Duration>,
}

/// Token bucket per client: one request is replenished every
/// `replenish_secs`, up to `burst` stored requests.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub replenish_secs: u64,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub level: LevelFilter,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub provider: Provider,
    /// Checked per request; absence makes every suggestion call fail.
    pub api_key: Option<String>,
    pub menu_path: PathBuf,
    pub upstream_timeout: Duration,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub log: LogSettings,
    pub portion_guidance: PortionGuidance,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut provider: Provider = parse_or(&lookup, "AI_PROVIDER", "gemini")?;
        if let Some(model) = non_blank(&lookup, "AI_MODEL") {
            provider = provider.with_model(model);
        }
        let api_key = non_blank(&lookup, provider.key_variable());

        let ttl_secs: u64 = parse_or(&lookup, "CACHE_TTL_SECS", "3600")?;
        let timeout_secs: u64 = parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", "30")?;

        Ok(Self {
            bind_addr: non_blank(&lookup, "BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5500".to_string()),
            provider,
            api_key,
            menu_path: non_blank(&lookup, "MENU_PATH")
                .unwrap_or_else(|| "menu.json".to_string())
                .into(),
            upstream_timeout: Duration::from_secs(timeout_secs),
            cache: CacheSettings {
                capacity: parse_or(&lookup, "CACHE_CAPACITY", "256")?,
                ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            },
            rate_limit: RateLimitSettings {
                replenish_secs: parse_or(&lookup, "RATE_LIMIT_REPLENISH_SECS", "1")?,
                burst: parse_or(&lookup, "RATE_LIMIT_BURST", "10")?,
            },
            log: LogSettings {
                dir: non_blank(&lookup, "LOG_DIR")
                    .unwrap_or_else(|| "logs".to_string())
                    .into(),
                level: parse_or(&lookup, "LOG_LEVEL", "info")?,
            },
            portion_guidance: parse_or(&lookup, "PORTION_GUIDANCE", "pairing")?,
        })
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = non_blank(lookup, key).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|e: T::Err| SettingsError::Invalid {
        key,
        message: e.to_string(),
        value,
    })
}
