use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid value '{value}' for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Upper bound on every backend call.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    /// Tickets served per `estimated_wait_minutes`; divides the wait estimate.
    pub service_rate: f64,
    /// Total tries for a join, first attempt included.
    pub join_attempts: u32,
    /// Pause before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(30),
            service_rate: 3.0,
            join_attempts: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source, falling back to defaults
    /// for missing keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let secs = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
                    _ => Err(ConfigError { key, value }),
                },
            }
        };

        let service_rate = match lookup("FILA_SERVICE_RATE") {
            None => defaults.service_rate,
            Some(value) => match value.trim().parse::<f64>() {
                Ok(rate) if rate.is_finite() && rate > 0.0 => rate,
                _ => return Err(ConfigError { key: "FILA_SERVICE_RATE", value }),
            },
        };

        let join_attempts = match lookup("FILA_JOIN_ATTEMPTS") {
            None => defaults.join_attempts,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError { key: "FILA_JOIN_ATTEMPTS", value }),
            },
        };

        Ok(Self {
            base_url: lookup("FILA_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: secs("FILA_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            poll_interval: secs("FILA_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            service_rate,
            join_attempts,
            retry_backoff: defaults.retry_backoff,
        })
    }
}
