//! Process configuration read from the environment.

use secrecy::Secret;
use std::net::SocketAddr;
use std::time::Duration;

use crate::telemetry::TelemetryConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub min_connections: u32,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: String) -> Self {
        Self {
            url: Secret::new(url),
            min_connections: 4,
            max_connections: 8,
            connect_timeout: Duration::from_secs(1),
            max_lifetime: Duration::from_secs(24 * 60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Upper bound on producing a response for one request.
    pub request_timeout: Duration,
    /// Upper bound on receiving a request body.
    pub read_timeout: Duration,
    /// Upper bound on receiving the request line and headers.
    pub header_read_timeout: Duration,
    /// A connection with no request in flight for this long is closed.
    pub idle_timeout: Duration,
    /// How long in-flight requests may run once shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout: Duration::from_secs(90),
            read_timeout: Duration::from_secs(1),
            header_read_timeout: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let url = lookup("POSTGRES_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("POSTGRES_URL"))?;

        let mut server = ServerConfig::default();
        if let Some(value) = lookup("HTTP_ADDR") {
            server.addr = value.parse().map_err(|_| ConfigError::Invalid {
                name: "HTTP_ADDR",
                value,
            })?;
        }

        let mut telemetry = TelemetryConfig::default();
        if let Some(service_name) = lookup("SERVICE_NAME") {
            telemetry.service_name = service_name;
        }
        if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            telemetry.collector_endpoint = endpoint;
        }
        if let Some(value) = lookup("TELEMETRY_ENABLED") {
            telemetry.enabled = match value.to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TELEMETRY_ENABLED",
                        value,
                    })
                }
            };
        }

        Ok(Self {
            database: DatabaseConfig::new(url),
            server,
            telemetry,
        })
    }
}
