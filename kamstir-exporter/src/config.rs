//! Configuration for the exporter.

use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

/// Environment variable selecting the listen port.
pub const PORT_ENV: &str = "PORT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port {value:?}: {source}")]
    InvalidPort {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default)]
pub struct ExporterConfig {
    /// Gateway polling settings.
    pub device: DeviceConfig,

    /// Prometheus endpoint settings.
    pub prometheus: PrometheusConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Gateway polling settings.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// JSON endpoint of the gateway.
    pub url: String,

    /// Request timeout in milliseconds (default: none, transport default).
    pub timeout_ms: Option<u64>,
}

pub const DEFAULT_DEVICE_URL: &str = "http://connectix_kamstir.local:82/kamst-ir/api/read";

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DEVICE_URL.to_string(),
            timeout_ms: None,
        }
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Port to listen on, on all interfaces (default: 8080).
    pub port: u16,

    /// Path for metrics endpoint (default: "/metrics").
    pub path: String,
}

pub const DEFAULT_PORT: u16 = 8080;

impl PrometheusConfig {
    /// Socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            path: "/metrics".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,

    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Build the configuration from defaults and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = std::env::var(PORT_ENV).ok();
        Self::default().with_port_override(port.as_deref())
    }

    /// Apply a raw port value as read from the environment.
    ///
    /// `None` and the empty string keep the current port.
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(value) = port.map(str::trim).filter(|v| !v.is_empty()) {
            self.prometheus.port = value.parse().map_err(|source| ConfigError::InvalidPort {
                value: value.to_string(),
                source,
            })?;
        }
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.device.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "Device URL must be http(s): {}",
                url
            )));
        }

        if self.device.timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_ms must be > 0".to_string(),
            ));
        }

        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        // Route captures and wildcards would match more than one path
        if self.prometheus.path.contains([':', '*']) {
            return Err(ConfigError::Validation(format!(
                "Metrics path must not contain ':' or '*': {}",
                self.prometheus.path
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests touching the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::default();

        assert_eq!(config.device.url, DEFAULT_DEVICE_URL);
        assert_eq!(config.device.timeout_ms, None);
        assert_eq!(config.prometheus.port, 8080);
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_override() {
        let config = ExporterConfig::default()
            .with_port_override(Some("9100"))
            .unwrap();

        assert_eq!(config.prometheus.port, 9100);
        assert_eq!(
            config.prometheus.listen_addr(),
            "0.0.0.0:9100".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_port_unset_uses_default() {
        let config = ExporterConfig::default().with_port_override(None).unwrap();
        assert_eq!(
            config.prometheus.listen_addr(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );

        let config = ExporterConfig::default()
            .with_port_override(Some(""))
            .unwrap();
        assert_eq!(config.prometheus.port, DEFAULT_PORT);
    }

    #[test]
    fn test_from_env_reads_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        // SAFETY: ENV_LOCK keeps other environment readers in this crate out.
        unsafe { std::env::set_var(PORT_ENV, "9100") };
        let config = ExporterConfig::from_env();
        unsafe { std::env::remove_var(PORT_ENV) };

        let config = config.unwrap();
        assert_eq!(config.prometheus.port, 9100);
        assert_eq!(
            config.prometheus.listen_addr(),
            "0.0.0.0:9100".parse::<SocketAddr>().unwrap()
        );

        let config = ExporterConfig::from_env().unwrap();
        assert_eq!(config.prometheus.port, DEFAULT_PORT);
    }

    #[test]
    fn test_port_invalid() {
        let result = ExporterConfig::default().with_port_override(Some("http"));
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));

        let result = ExporterConfig::default().with_port_override(Some("70000"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_invalid_url() {
        let mut config = ExporterConfig::default();
        config.device.url = "connectix_kamstir.local".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http(s)"));
    }

    #[test]
    fn test_validate_invalid_path() {
        let mut config = ExporterConfig::default();
        config.prometheus.path = "no-leading-slash".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must start with /")
        );
    }

    #[test]
    fn test_validate_route_syntax_in_path() {
        for path in ["/metrics/*rest", "/:name", "/metrics/:id"] {
            let mut config = ExporterConfig::default();
            config.prometheus.path = path.to_string();

            let result = config.validate();
            assert!(result.is_err(), "path {} should be rejected", path);
            assert!(result.unwrap_err().to_string().contains("must not contain"));
        }
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = ExporterConfig::default();
        config.device.timeout_ms = Some(0);

        assert!(config.validate().is_err());
    }
}
