use std::env;
use std::time::Duration;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8042";
const DEFAULT_CHANNEL_PATH: &str = "/ws";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Remote configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Display backend address, scheme optional
    pub server: String,
    /// Path of the control channel on the same host
    pub channel_path: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let server = env::var("NAPTA_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        let channel_path =
            env::var("NAPTA_CHANNEL_PATH").unwrap_or_else(|_| DEFAULT_CHANNEL_PATH.to_string());
        Self {
            server,
            channel_path,
            poll_interval: Duration::from_secs(
                positive_secs("NAPTA_POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            request_timeout: Duration::from_secs(
                positive_secs("NAPTA_REQUEST_TIMEOUT_SECS")
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Base URL for catalog requests, e.g. `http://127.0.0.1:8042`.
    pub fn api_base_url(&self) -> String {
        let trimmed = self.server.trim().trim_end_matches('/');
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        // Normalize localhost to IPv4 to avoid IPv6 (::1) preference on macOS
        with_scheme.replacen("://localhost", "://127.0.0.1", 1)
    }

    /// Control channel URL on the same host, e.g. `ws://127.0.0.1:8042/ws`.
    pub fn channel_url(&self) -> String {
        let base = self.api_base_url();
        let mut url = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base
        };
        let path = self.channel_path.trim();
        if !path.is_empty() {
            if !path.starts_with('/') {
                url.push('/');
            }
            url.push_str(path);
        }
        url
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

fn positive_secs(var: &str) -> Option<u64> {
    env::var(var)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const VARS: [&str; 4] = [
        "NAPTA_SERVER",
        "NAPTA_CHANNEL_PATH",
        "NAPTA_POLL_INTERVAL_SECS",
        "NAPTA_REQUEST_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn default_config_targets_local_display() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://127.0.0.1:8042");
        assert_eq!(config.channel_url(), "ws://127.0.0.1:8042/ws");
    }

    #[test]
    fn from_env_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    fn from_env_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("NAPTA_SERVER", "https://matrix.example.com/");
        env::set_var("NAPTA_CHANNEL_PATH", "control");
        env::set_var("NAPTA_POLL_INTERVAL_SECS", "2");
        env::set_var("NAPTA_REQUEST_TIMEOUT_SECS", "0");

        let config = Config::from_env();
        assert_eq!(config.api_base_url(), "https://matrix.example.com");
        assert_eq!(config.channel_url(), "wss://matrix.example.com/control");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(
            config.request_timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );

        clear_env();
    }

    #[test]
    fn bare_host_gets_scheme_and_ipv4_localhost() {
        let config = Config::default().with_server("localhost:8042");
        assert_eq!(config.api_base_url(), "http://127.0.0.1:8042");
        assert_eq!(config.channel_url(), "ws://127.0.0.1:8042/ws");

        let config = Config::default().with_server("192.168.10.223:8042");
        assert_eq!(config.channel_url(), "ws://192.168.10.223:8042/ws");
    }
}
