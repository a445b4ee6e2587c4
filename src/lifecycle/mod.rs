//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop and control socket stop → sweep task joined → Exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes before it starts
//! - A trigger sent before a task reaches its wait is still observed

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
