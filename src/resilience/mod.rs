//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch from origin:
//!     → timeouts.rs (deadline on connect, handshake, write, read)
//!     → On connect-phase failure: retries.rs (retry with backoff.rs delays)
//!     → On final failure: proxy answers 502 Bad Gateway
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin socket operation has a deadline
//! - Retries only before the request has been written
//! - A failed fetch never crashes the accept loop

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::with_timeout;
