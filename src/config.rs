use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Talk to the dispatch API, with synthetic fallback for failed reads.
    Live,
    /// Fully synthetic data; writes short-circuit to success. Demo/outage drills.
    Offline,
}

impl FromStr for TransportMode {
    type Err = ConsoleError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "live" => Ok(TransportMode::Live),
            "offline" | "demo" => Ok(TransportMode::Offline),
            other => Err(ConsoleError::Validation(format!(
                "unknown console mode: {other}, expected live or offline"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: TransportMode,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub api_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub nearby_radius_m: f64,
    pub nearby_limit: usize,
    pub nearby_ttl_secs: u64,
    pub page_size: u32,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConsoleError> {
        let _ = dotenvy::dotenv();

        let mode = match env::var("CONSOLE_MODE") {
            Ok(raw) => raw.parse::<TransportMode>()?,
            Err(_) => TransportMode::Live,
        };

        Ok(Self {
            mode,
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_token: env::var("API_TOKEN").ok(),
            api_timeout_secs: parse_or_default("API_TIMEOUT_SECS", 15)?,
            poll_interval_secs: parse_or_default("POLL_INTERVAL_SECS", 10)?,
            nearby_radius_m: parse_or_default("NEARBY_RADIUS_M", 3_000.0)?,
            nearby_limit: parse_or_default("NEARBY_LIMIT", 10)?,
            nearby_ttl_secs: parse_or_default("NEARBY_TTL_SECS", 5)?,
            page_size: parse_or_default("PAGE_SIZE", 20)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn nearby_ttl(&self) -> Duration {
        Duration::from_secs(self.nearby_ttl_secs)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, ConsoleError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| ConsoleError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
