use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    /// No persistent storage: every write is dropped.
    None,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "none" | "off" => Ok(StoreBackend::None),
            other => Err(format!("unknown store backend '{other}', expected memory/none")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub store_backend: StoreBackend,
    pub event_buffer_size: usize,
    pub sweep_interval: Duration,
    pub lock: LockConfig,
    pub simulated_latency: Duration,
}

/// Timings of the cooperative order-number lock.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    pub stale_after: Duration,
    pub retry_every: Duration,
    pub give_up_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_millis(1500),
            retry_every: Duration::from_millis(12),
            give_up_after: Duration::from_millis(800),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            store_backend: parse_or_default("STORE_BACKEND", StoreBackend::Memory)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            sweep_interval: Duration::from_secs(parse_or_default("SWEEP_INTERVAL_SECS", 30)?),
            lock: LockConfig {
                stale_after: Duration::from_millis(parse_or_default("LOCK_STALE_MS", 1500)?),
                retry_every: Duration::from_millis(parse_or_default("LOCK_RETRY_MS", 12)?),
                give_up_after: Duration::from_millis(parse_or_default("LOCK_TIMEOUT_MS", 800)?),
            },
            simulated_latency: Duration::from_millis(parse_or_default("SIMULATED_LATENCY_MS", 0)?),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::StoreBackend;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" NONE ".parse::<StoreBackend>(), Ok(StoreBackend::None));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let port: u16 = super::parse_or_default("COURIER_DISPATCH_TEST_UNSET_PORT", 4242).unwrap();
        assert_eq!(port, 4242);
    }
}
