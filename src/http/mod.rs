//! HTTP/1.1 wire subset shared by the client-facing and origin-facing legs.
//!
//! # Data Flow
//! ```text
//! raw bytes (single client read / full origin reply)
//!     → parser.rs (line state machine: start line → headers → body)
//!     → request.rs / response.rs (typed message, raw header block kept verbatim)
//!     → response.rs (status line + raw header block + body back to wire bytes)
//! ```
//!
//! # Design Decisions
//! - One state machine serves both message kinds; only the start-line grammar differs
//! - Header order and case are preserved so the raw block can be passed through
//! - Bodies are a single line; chunked and multi-line bodies are out of scope

pub mod headers;
pub mod parser;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use parser::{HttpMessage, MessageParser, ParseError, ParserState};
pub use request::HttpRequest;
pub use response::{CacheStatus, HttpResponse, X_CACHE};

/// Line terminator used by every part of the wire format.
pub const CRLF: &str = "\r\n";
