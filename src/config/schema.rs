//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheSettings;

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Client-facing listener.
    pub listener: ListenerConfig,

    /// Origin the proxy forwards cache misses to.
    pub upstream: UpstreamConfig,

    /// Cache sweep and expiry.
    pub cache: CacheConfig,

    /// Out-of-band control socket.
    pub control: ControlConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address to bind (e.g., "127.0.0.1").
    pub bind_address: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Upper bound on one readiness wait; shutdown is checked at least this often.
    pub accept_wait_secs: u64,

    /// Size of the single read performed per connection. Requests longer
    /// than this are truncated.
    pub read_buffer_bytes: usize,

    /// How long to wait for the client to send its request.
    pub client_read_timeout_secs: u64,
}

impl ListenerConfig {
    /// `bind_address:port`, bracketing IPv6 literals.
    pub fn socket_address(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }

    pub fn accept_wait(&self) -> Duration {
        Duration::from_secs(self.accept_wait_secs)
    }

    pub fn client_read_timeout(&self) -> Duration {
        Duration::from_secs(self.client_read_timeout_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            accept_wait_secs: 3,
            read_buffer_bytes: 4096,
            client_read_timeout_secs: 3,
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin as `scheme://host[:port]`; `https` enables TLS.
    pub origin: String,

    /// Deadline for each of connect, handshake, write and read, in seconds.
    pub timeout_secs: u64,

    /// Connection attempts before a fetch is reported as failed.
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay between attempts, in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://dummyjson.com".to_string(),
            timeout_secs: 3,
            max_retries: 3,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 500,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Sweep interval in seconds.
    pub check_interval_secs: u64,

    /// Inactivity window in seconds. Values below 300 are raised to 300.
    pub keep_alive_secs: u64,
}

impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings::for_keep_alive(
            Duration::from_secs(self.check_interval_secs),
            Duration::from_secs(self.keep_alive_secs),
        )
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            keep_alive_secs: 300,
        }
    }
}

/// Control socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Serve the control socket alongside the proxy.
    pub enabled: bool,

    /// Filesystem path of the Unix socket.
    pub socket_path: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: std::env::temp_dir().join("caching-proxy.sock"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
