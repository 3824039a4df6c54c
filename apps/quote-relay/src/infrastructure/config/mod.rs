//! Relay Configuration
//!
//! Configuration types loaded from environment variables. Batch size and
//! pacing delay encode the upstream provider's rate-limit policy, so they
//! are configuration rather than literals in scheduler logic.

use std::time::Duration;

/// Groww API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Upstream provider settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Base URL of the quote provider API.
    pub base_url: String,
    /// Bounded timeout for one upstream fetch. A timed-out fetch is
    /// treated identically to a failed fetch.
    pub fetch_timeout: Duration,
    /// Max age at which a cache entry short-circuits an upstream call.
    pub cache_ttl: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groww.in".to_string(),
            fetch_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(5),
        }
    }
}

/// Batch scheduling and refresh settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Maximum symbols fetched concurrently in one chunk.
    pub batch_size: usize,
    /// Pacing delay between consecutive chunks.
    pub batch_delay: Duration,
    /// Cadence of the background refresh over the interest set. Distinct
    /// from the cache TTL by design.
    pub refresh_interval: Duration,
    /// Capacity of the fan-out event channel.
    pub event_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay: Duration::from_millis(500),
            refresh_interval: Duration::from_secs(10),
            event_capacity: 1024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP + WebSocket port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 3000 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Upstream provider settings.
    pub upstream: UpstreamSettings,
    /// Scheduling settings.
    pub relay: RelaySettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `GROWW_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GROWW_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GROWW_API_KEY".to_string()))?;

        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("GROWW_API_KEY".to_string()));
        }

        let upstream = UpstreamSettings {
            base_url: std::env::var("GROWW_API_BASE")
                .unwrap_or_else(|_| UpstreamSettings::default().base_url),
            fetch_timeout: parse_env_duration_secs(
                "RELAY_FETCH_TIMEOUT_SECS",
                UpstreamSettings::default().fetch_timeout,
            ),
            cache_ttl: parse_env_duration_secs(
                "RELAY_CACHE_TTL_SECS",
                UpstreamSettings::default().cache_ttl,
            ),
        };

        let relay = RelaySettings {
            batch_size: parse_env_usize("RELAY_BATCH_SIZE", RelaySettings::default().batch_size)
                .max(1),
            batch_delay: parse_env_duration_millis(
                "RELAY_BATCH_DELAY_MS",
                RelaySettings::default().batch_delay,
            ),
            refresh_interval: parse_env_duration_secs(
                "RELAY_REFRESH_INTERVAL_SECS",
                RelaySettings::default().refresh_interval,
            ),
            event_capacity: parse_env_usize(
                "RELAY_EVENT_CAPACITY",
                RelaySettings::default().event_capacity,
            ),
        };

        let server = ServerSettings {
            http_port: parse_env_u16("RELAY_HTTP_PORT", ServerSettings::default().http_port),
        };

        Ok(Self {
            credentials: Credentials::new(api_key),
            upstream,
            relay,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_redacted_debug() {
        let creds = Credentials::new("key123".to_string());
        let debug = format!("{creds:?}");
        assert!(!debug.contains("key123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn upstream_defaults() {
        let settings = UpstreamSettings::default();
        assert_eq!(settings.base_url, "https://api.groww.in");
        assert_eq!(settings.fetch_timeout, Duration::from_secs(5));
        assert_eq!(settings.cache_ttl, Duration::from_secs(5));
    }

    #[test]
    fn relay_defaults() {
        let settings = RelaySettings::default();
        assert_eq!(settings.batch_size, 3);
        assert_eq!(settings.batch_delay, Duration::from_millis(500));
        assert_eq!(settings.refresh_interval, Duration::from_secs(10));
    }

    #[test]
    fn server_defaults() {
        assert_eq!(ServerSettings::default().http_port, 3000);
    }
}
