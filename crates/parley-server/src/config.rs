//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API server.
    /// Env: `HTTP_ADDR`, or `PORT` to bind all interfaces on that port.
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Path of the JSON data file.
    /// Env: `DATA_FILE`
    /// Default: `./data.json`
    pub data_file: PathBuf,

    /// Password given to the bootstrap admin when the data file is created.
    /// Env: `BOOTSTRAP_PASSWORD`
    /// Default: none; a random one is generated at first start.
    pub bootstrap_password: Option<String>,

    /// Email stored on the bootstrap admin.
    /// Env: `BOOTSTRAP_EMAIL`
    /// Default: `admin@example.com`
    pub bootstrap_email: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 3000).into(),
            data_file: PathBuf::from("./data.json"),
            bootstrap_password: None,
            bootstrap_email: "admin@example.com".to_string(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("data_file", &self.data_file)
            .field(
                "bootstrap_password",
                &self.bootstrap_password.as_ref().map(|_| "<redacted>"),
            )
            .field("bootstrap_email", &self.bootstrap_email)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        } else if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(path) = get("DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }

        if let Some(password) = get("BOOTSTRAP_PASSWORD") {
            if !password.is_empty() {
                config.bootstrap_password = Some(password);
            }
        }

        if let Some(email) = get("BOOTSTRAP_EMAIL") {
            config.bootstrap_email = email;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 3000).into());
        assert_eq!(config.data_file, PathBuf::from("./data.json"));
        assert!(config.bootstrap_password.is_none());
    }

    #[test]
    fn test_port_overrides_default_port() {
        let config = load(&[("PORT", "8080")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
    }

    #[test]
    fn test_http_addr_wins_over_port() {
        let config = load(&[("HTTP_ADDR", "127.0.0.1:9000"), ("PORT", "8080")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("PORT", "not-a-port"), ("BOOTSTRAP_PASSWORD", "")]);
        assert_eq!(config.http_addr.port(), 3000);
        assert!(config.bootstrap_password.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = load(&[("BOOTSTRAP_PASSWORD", "hunter2")]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
