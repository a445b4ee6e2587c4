//! Origin address resolution from `scheme://host[:port]`.

use std::fmt;

use url::Url;

/// Error produced when the configured origin cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginError {
    #[error("invalid origin URL {origin:?}: {reason}")]
    Invalid { origin: String, reason: String },

    #[error("unsupported origin scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("origin {0:?} has no host")]
    MissingHost(String),

    #[error("origin {0:?} must not carry a path, query or fragment")]
    UnexpectedPath(String),
}

/// Where cache misses are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP literal (IPv6 literals keep their brackets).
    pub domain: String,
    pub port: u16,
    pub tls: bool,
}

impl Endpoint {
    /// Parse an origin URL. `https` selects TLS and port 443, `http` selects
    /// plain TCP and port 80; an explicit port wins over either default.
    pub fn parse(origin: &str) -> Result<Self, OriginError> {
        let url = Url::parse(origin).map_err(|e| OriginError::Invalid {
            origin: origin.to_owned(),
            reason: e.to_string(),
        })?;

        let tls = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(OriginError::UnsupportedScheme(other.to_owned())),
        };

        let domain = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| OriginError::MissingHost(origin.to_owned()))?;

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(OriginError::UnexpectedPath(origin.to_owned()));
        }

        let port = url.port().unwrap_or(if tls { 443 } else { 80 });

        Ok(Self {
            domain: domain.to_owned(),
            port,
            tls,
        })
    }

    fn default_port(&self) -> u16 {
        if self.tls {
            443
        } else {
            80
        }
    }

    /// Value for the `Host` header: the domain, plus the port when it is not the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.default_port() {
            self.domain.clone()
        } else {
            format!("{}:{}", self.domain, self.port)
        }
    }

    /// `host:port` suitable for name resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.domain, self.port)
    }

    /// Name presented during the TLS handshake.
    pub fn server_name(&self) -> &str {
        self.domain.trim_start_matches('[').trim_end_matches(']')
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "https" } else { "http" };
        write!(f, "{}://{}:{}", scheme, self.domain, self.port)
    }
}
