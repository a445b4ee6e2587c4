//! Inbound request representation.
//!
//! # Responsibilities
//! - Hold the request line, header mapping and raw header block of one request
//! - Provide the cache key (the request target, verbatim)
//!
//! # Design Decisions
//! - The target is never normalised: `/a?x=1` and `http://host/a?x=1` are different keys
//! - The raw header block is kept so it can be forwarded to the origin untouched

use crate::http::{HttpMessage, Headers};

/// A parsed client request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    /// Protocol version without the `HTTP/` prefix, e.g. `1.1`.
    pub version: String,
    pub headers: Headers,
    pub raw_headers: String,
    pub body: String,
}

impl HttpRequest {
    /// Key under which the response to this request is cached.
    pub fn cache_key(&self) -> &str {
        &self.target
    }
}

impl HttpMessage for HttpRequest {
    /// `METHOD SP TARGET SP HTTP/VERSION`
    fn parse_start_line(&mut self, line: &str) -> bool {
        let mut parts = line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Some(version) = version.strip_prefix("HTTP/") else {
            return false;
        };

        self.method = method.to_owned();
        self.target = target.to_owned();
        self.version = version.to_owned();
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
