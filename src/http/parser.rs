//! Incremental line parser for HTTP messages.
//!
//! The parser walks the buffer one CRLF-terminated line at a time:
//!
//! ```text
//! AwaitingStartLine ──ok──▶ AwaitingHeaderField ──non-field line──▶ AwaitingBody ──▶ Done
//!        │                          │
//!        └──malformed──▶ Done       └──only CRLF left──▶ Done
//! ```
//!
//! A line that does not match `KEY: VALUE` ends the header block. That is how
//! the blank separator line is recognised, and it also means a field line
//! without a colon is taken as the start of the body. The body is the single
//! line that follows, up to the next CRLF or the end of the buffer.

use std::marker::PhantomData;

use memchr::memmem;

use crate::http::{Headers, CRLF};

/// Position of the parser inside the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingStartLine,
    AwaitingHeaderField,
    AwaitingBody,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The first line did not match the start-line grammar of the message kind.
    #[error("malformed start line: {line:?}")]
    MalformedStartLine { line: String },
}

/// A message kind the parser can fill in.
///
/// Requests and responses differ only in their start line; everything after
/// it is handled by [`MessageParser`].
pub trait HttpMessage: Default {
    /// Parse the start line into `self`. Returns `false` if the grammar does not match.
    fn parse_start_line(&mut self, line: &str) -> bool;

    fn headers_mut(&mut self) -> &mut Headers;

    /// Verbatim header block, CRLF-joined.
    fn raw_headers_mut(&mut self) -> &mut String;

    fn set_body(&mut self, body: String);
}

/// State machine that turns a byte buffer into one message of kind `M`.
///
/// The state is reset to [`ParserState::AwaitingStartLine`] at the end of every
/// [`parse`](Self::parse) call, so one parser can be reused for any number of
/// messages.
#[derive(Debug)]
pub struct MessageParser<M> {
    state: ParserState,
    _message: PhantomData<fn() -> M>,
}

impl<M: HttpMessage> MessageParser<M> {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingStartLine,
            _message: PhantomData,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Parse one message from `buf`.
    ///
    /// An empty buffer yields a default message.
    pub fn parse(&mut self, buf: &[u8]) -> Result<M, ParseError> {
        let mut message = M::default();
        if buf.is_empty() {
            return Ok(message);
        }

        let outcome = self.drive(buf, &mut message);
        self.state = ParserState::AwaitingStartLine;
        outcome.map(|()| message)
    }

    fn drive(&mut self, buf: &[u8], message: &mut M) -> Result<(), ParseError> {
        let finder = memmem::Finder::new(CRLF.as_bytes());
        let mut cursor = 0usize;

        while self.state != ParserState::Done {
            let rest = buf.get(cursor..).unwrap_or_default();
            let line_len = finder.find(rest).unwrap_or(rest.len());
            let line = String::from_utf8_lossy(&rest[..line_len]);
            let next = cursor + line_len + CRLF.len();

            match self.state {
                ParserState::AwaitingStartLine => {
                    if !message.parse_start_line(&line) {
                        self.state = ParserState::Done;
                        return Err(ParseError::MalformedStartLine {
                            line: line.into_owned(),
                        });
                    }
                    self.state = ParserState::AwaitingHeaderField;
                }
                ParserState::AwaitingHeaderField => {
                    match split_field(&line) {
                        Some((key, value)) => {
                            message.headers_mut().insert(key, value);
                            let raw = message.raw_headers_mut();
                            raw.push_str(&line);
                            raw.push_str(CRLF);
                        }
                        None => self.state = ParserState::AwaitingBody,
                    }
                    // Only the terminating CRLF is left: the message has no body.
                    if self.state == ParserState::AwaitingHeaderField
                        && buf.len().saturating_sub(next) <= CRLF.len()
                    {
                        self.state = ParserState::Done;
                    }
                }
                ParserState::AwaitingBody => {
                    message.set_body(line.into_owned());
                    self.state = ParserState::Done;
                }
                ParserState::Done => {}
            }

            cursor = next;
        }

        Ok(())
    }
}

impl<M: HttpMessage> Default for MessageParser<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `KEY: VALUE` at the first colon. The key must be non-empty and
/// contain no spaces; a single space after the colon is dropped.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() || key.contains(' ') {
        return None;
    }
    Some((key, value.strip_prefix(' ').unwrap_or(value)))
}
