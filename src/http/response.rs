//! Response representation and serialization.
//!
//! # Responsibilities
//! - Hold the status line, header mapping and raw header block of one response
//! - Synthesize the proxy's own responses (cache hit, bad gateway, bad request)
//! - Tag every response with the `X-Cache` marker
//! - Serialize back to wire bytes
//!
//! # Design Decisions
//! - Serialization writes the raw header block, not the mapping, so pass-through
//!   responses keep the origin's field order
//! - The blank line separating headers from body is added at serialization time

use std::fmt;

use crate::http::{HttpMessage, Headers, CRLF};

/// Marker header added to every response the proxy emits.
pub const X_CACHE: &str = "X-Cache";

/// Whether a response was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed origin response, or one built by the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Protocol version without the `HTTP/` prefix, e.g. `1.1`.
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub raw_headers: String,
    pub body: String,
}

impl HttpResponse {
    /// Build a proxy-originated `HTTP/1.1` response carrying only the cache marker.
    pub fn synthesized(status: u16, reason: &str, cache: CacheStatus, body: impl Into<String>) -> Self {
        let mut response = Self {
            version: "1.1".to_owned(),
            status,
            reason: reason.to_owned(),
            body: body.into(),
            ..Self::default()
        };
        response.mark(cache);
        response
    }

    /// `200 OK` served from the cache.
    pub fn cache_hit(body: impl Into<String>) -> Self {
        Self::synthesized(200, "OK", CacheStatus::Hit, body)
    }

    /// `502 Bad Gateway` with an empty body.
    pub fn bad_gateway() -> Self {
        Self::synthesized(502, "Bad Gateway", CacheStatus::Miss, "")
    }

    /// `400 Bad Request` with an empty body.
    pub fn bad_request() -> Self {
        Self::synthesized(400, "Bad Request", CacheStatus::Miss, "")
    }

    /// Set the `X-Cache` marker and regenerate the raw header block from the mapping.
    pub fn mark(&mut self, cache: CacheStatus) {
        self.headers.remove_ignore_case(X_CACHE);
        self.headers.insert(X_CACHE, cache.as_str());
        self.raw_headers = self.headers.to_block();
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn status_line(&self) -> String {
        format!("HTTP/{} {} {}", self.version, self.status, self.reason)
    }

    /// Status line, raw header block, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let status_line = self.status_line();
        let mut out = Vec::with_capacity(
            status_line.len() + self.raw_headers.len() + self.body.len() + 2 * CRLF.len(),
        );
        out.extend_from_slice(status_line.as_bytes());
        out.extend_from_slice(CRLF.as_bytes());
        out.extend_from_slice(self.raw_headers.as_bytes());
        out.extend_from_slice(CRLF.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

impl HttpMessage for HttpResponse {
    /// `HTTP/VERSION SP CODE SP REASON`; the reason may contain spaces.
    fn parse_start_line(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(3, ' ');
        let (Some(version), Some(code), Some(reason)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Some(version) = version.strip_prefix("HTTP/") else {
            return false;
        };
        if code.len() != 3 {
            return false;
        }
        let Ok(status) = code.parse::<u16>() else {
            return false;
        };

        self.version = version.to_owned();
        self.status = status;
        self.reason = reason.to_owned();
        true
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn raw_headers_mut(&mut self) -> &mut String {
        &mut self.raw_headers
    }

    fn set_body(&mut self, body: String) {
        self.body = body;
    }
}
