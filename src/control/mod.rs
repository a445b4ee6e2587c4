//! Out-of-band control channel for a running proxy.
//!
//! # Data Flow
//! ```text
//! caching-proxy --clear-cache
//!     → send_command(socket_path, ClearCache)
//!     → Unix socket, one JSON line each way
//!     → ControlServer → ExpiringCache::clear
//!     → {"status":"ok","cleared":N}
//! ```
//!
//! # Design Decisions
//! - The socket lives at a fixed, configurable filesystem path
//! - A stale socket file from a crashed instance is replaced on bind
//! - Requests are tiny and handled inline; a slow client is cut off by a deadline

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use crate::cache::ExpiringCache;
use crate::resilience::with_timeout;

const IO_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to bind control socket {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("control socket {} is served by another running instance", .0.display())]
    InUse(PathBuf),

    #[error("control socket I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed control message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("control socket closed without a reply")]
    NoReply,
}

/// A request sent to the running proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    ClearCache,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// The proxy's answer to a [`ControlCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlReply {
    fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            cleared: None,
            entries: None,
            message: None,
        }
    }

    pub fn cleared(n: usize) -> Self {
        Self {
            cleared: Some(n),
            ..Self::ok()
        }
    }

    pub fn entries(n: usize) -> Self {
        Self {
            entries: Some(n),
            ..Self::ok()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}

/// Listens on the control socket and applies commands to the cache.
pub struct ControlServer {
    path: PathBuf,
    listener: UnixListener,
    cache: Arc<ExpiringCache>,
}

impl ControlServer {
    /// Bind the control socket at `path`.
    ///
    /// A leftover file nobody is listening on is replaced; a socket another
    /// running instance still serves is left alone and reported as
    /// [`ControlError::InUse`].
    pub fn bind(path: impl Into<PathBuf>, cache: Arc<ExpiringCache>) -> Result<Self, ControlError> {
        let path = path.into();
        let bind_error = |source| ControlError::Bind {
            path: path.clone(),
            source,
        };

        // Only a socket nobody answers on is stale.
        match std::os::unix::net::UnixStream::connect(&path) {
            Ok(_) => return Err(ControlError::InUse(path.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                std::fs::remove_file(&path).map_err(bind_error)?;
                tracing::debug!(path = %path.display(), "Removed stale control socket");
            }
            Err(e) => return Err(bind_error(e)),
        }
        let listener = UnixListener::bind(&path).map_err(bind_error)?;

        tracing::info!(path = %path.display(), "Control socket bound");
        Ok(Self {
            path,
            listener,
            cache,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve control requests until `shutdown` fires, then remove the socket file.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        if let Err(e) = self.serve(stream).await {
                            tracing::debug!(error = %e, "Control request failed");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Control socket accept failed");
                    }
                },
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove control socket");
        }
        tracing::info!("Control socket closed");
    }

    async fn serve(&self, stream: UnixStream) -> Result<(), ControlError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut line = String::new();
        let n = with_timeout(IO_TIMEOUT, BufReader::new(read_half).read_line(&mut line)).await?;
        if n == 0 {
            return Ok(());
        }

        let reply = match serde_json::from_str::<ControlCommand>(line.trim()) {
            Ok(command) => self.apply(command),
            Err(e) => ControlReply::error(format!("unrecognised command: {e}")),
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        with_timeout(IO_TIMEOUT, write_half.write_all(&out)).await?;
        Ok(())
    }

    fn apply(&self, command: ControlCommand) -> ControlReply {
        match command {
            ControlCommand::ClearCache => ControlReply::cleared(self.cache.clear()),
            ControlCommand::Stats => ControlReply::entries(self.cache.len()),
        }
    }
}

/// Send `command` to the proxy listening on `path` and wait for its reply.
pub async fn send_command(path: &Path, command: ControlCommand) -> Result<ControlReply, ControlError> {
    let stream = with_timeout(IO_TIMEOUT, UnixStream::connect(path)).await?;
    let (read_half, mut write_half) = stream.into_split();

    let mut request = serde_json::to_vec(&command)?;
    request.push(b'\n');
    with_timeout(IO_TIMEOUT, write_half.write_all(&request)).await?;

    let mut line = String::new();
    let n = with_timeout(IO_TIMEOUT, BufReader::new(read_half).read_line(&mut line)).await?;
    if n == 0 {
        return Err(ControlError::NoReply);
    }
    Ok(serde_json::from_str(line.trim())?)
}
