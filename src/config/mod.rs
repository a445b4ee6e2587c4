//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (every field)
//!     → loader.rs (optional TOML file, parse & deserialize)
//!     → command-line overrides (port, origin, keep-alive)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with, parse_config, ConfigError};
pub use schema::{
    CacheConfig, ControlConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
