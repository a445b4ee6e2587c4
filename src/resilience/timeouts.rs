//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap socket operations with a deadline
//! - Report an elapsed deadline as an ordinary `io::Error`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Elapsed deadlines surface as `ErrorKind::TimedOut`, so callers map them
//!   to the same error variant as the operation's own failures

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::time;

/// Run `operation`, failing with `ErrorKind::TimedOut` if it takes longer than `limit`.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("timed out after {limit:?}"),
        )),
    }
}
