//! Caching HTTP Reverse Proxy Library

pub mod cache;
pub mod config;
#[cfg(unix)]
pub mod control;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod upstream;

pub use cache::ExpiringCache;
pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
