//! Crate-wide error taxonomy (spec §6.4).
//!
//! No `thiserror` dependency; errors are a flat enum with hand-written
//! `Display`/`std::error::Error` impls.

use std::fmt;

use crate::dialog::id::DialogKey;
use crate::message::StatusCode;
use crate::transaction::key::TransactionKey;

/// Where in the input a parse error was detected, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidStartLine,
    InvalidVersion,
    InvalidMethod,
    InvalidStatusCode,
    InvalidHeader,
    InvalidUri,
    InvalidAddress,
    UnexpectedEof,
    HeaderTooLarge,
    TooManyHeaders,
    MessageTooLarge,
    MissingMandatoryHeader(&'static str),
    CSeqMethodMismatch,
    BodyLengthMismatch { expected: usize, actual: usize },
    MissingContentLengthOnStream,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidStartLine => write!(f, "invalid request/status line"),
            ParseErrorKind::InvalidVersion => write!(f, "invalid SIP version"),
            ParseErrorKind::InvalidMethod => write!(f, "invalid method token"),
            ParseErrorKind::InvalidStatusCode => write!(f, "invalid status code"),
            ParseErrorKind::InvalidHeader => write!(f, "invalid header line"),
            ParseErrorKind::InvalidUri => write!(f, "invalid URI"),
            ParseErrorKind::InvalidAddress => write!(f, "invalid address (name-addr / addr-spec)"),
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseErrorKind::HeaderTooLarge => write!(f, "header line exceeds configured limit"),
            ParseErrorKind::TooManyHeaders => write!(f, "header count exceeds configured limit"),
            ParseErrorKind::MessageTooLarge => write!(f, "message exceeds configured size limit"),
            ParseErrorKind::MissingMandatoryHeader(name) => {
                write!(f, "missing mandatory header: {}", name)
            }
            ParseErrorKind::CSeqMethodMismatch => {
                write!(f, "CSeq method does not match request method")
            }
            ParseErrorKind::BodyLengthMismatch { expected, actual } => write!(
                f,
                "Content-Length mismatch: expected {} got {}",
                expected, actual
            ),
            ParseErrorKind::MissingContentLengthOnStream => {
                write!(f, "Content-Length is mandatory on stream transports")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            line: None,
            column: None,
            kind,
        }
    }

    pub fn at(kind: ParseErrorKind, line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            kind,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(l), Some(c)) => write!(f, "parse error at {}:{}: {}", l, c, self.kind),
            _ => write!(f, "parse error: {}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error on {}: {}", self.field, self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Closed,
    Timeout,
    BufferFull,
    InvalidAddress,
    TooLarge,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportErrorKind::Closed => "closed",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::BufferFull => "buffer full",
            TransportErrorKind::InvalidAddress => "invalid address",
            TransportErrorKind::TooLarge => "message too large",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error ({}): {}", self.kind, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub status: StatusCode,
    pub detail: String,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol error {}: {}", self.status.0, self.detail)
    }
}

/// Crate-wide error type (spec §6.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Parse(ParseError),
    Validation(ValidationError),
    Transport(TransportError),
    Protocol(ProtocolError),
    Timeout(&'static str),
    Cancelled,
    /// A transaction-layer invariant was violated (bad state transition,
    /// operation invalid for the transaction's kind, ...).
    TransactionError(String, TransactionKey),
    /// A dialog-layer invariant was violated.
    DialogError(String, DialogKey),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "{}", e),
            Error::Transport(e) => write!(f, "{}", e),
            Error::Protocol(e) => write!(f, "{}", e),
            Error::Timeout(name) => write!(f, "timeout waiting for {}", name),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::TransactionError(msg, key) => {
                write!(f, "transaction error on {}: {}", key, msg)
            }
            Error::DialogError(msg, key) => write!(f, "dialog error on {}: {}", key, msg),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
