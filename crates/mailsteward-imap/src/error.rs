//! Error types for IMAP provisioning operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during IMAP provisioning operations.
///
/// Every variant carries the human-readable detail text; the coarse
/// failure category is available through [`Error::kind`]. The type is
/// `Clone` so the session can keep the most recent failure around for
/// [`last_error`](crate::Session::last_error) while still returning it
/// to the caller.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Connect or write failure; carries the OS error text.
    #[error("socket error: {0}")]
    Socket(String),

    /// The server did not answer within the configured timeout.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// TLS handshake or STARTTLS negotiation failure; carries the TLS
    /// library's error text when available.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Server answered the tagged status line with NO.
    #[error("server returned NO: {0}")]
    No(String),

    /// Server answered the tagged status line with BAD.
    #[error("server returned BAD: {0}")]
    Bad(String),

    /// The response was empty or could not be parsed into a status.
    #[error("undefined response: {0}")]
    Undefined(String),

    /// A continuation response did not match the expected `+` prefix, or
    /// a structurally required field was missing from the response.
    #[error("unexpected response: {0}")]
    Response(String),

    /// Unsupported or inconsistent configuration, e.g. a forced
    /// authentication mechanism the server does not offer.
    #[error("configuration error: {0}")]
    Config(String),

    /// An internal conversion failed, e.g. mailbox name encoding.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse failure categories, comparable across [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No error occurred.
    NoError,
    /// Connect or write failure.
    SocketError,
    /// The server did not answer in time.
    ConnectionTimeout,
    /// TLS handshake or STARTTLS negotiation failure.
    EncryptionError,
    /// Server said NO.
    NoResponse,
    /// Server said BAD.
    BadResponse,
    /// The response could not be parsed into a status.
    UndefinedResponse,
    /// A continuation or structural expectation was violated.
    ResponseError,
    /// Unsupported configuration.
    ConfigError,
    /// Internal conversion failure.
    InternalError,
}

impl Error {
    /// Returns the failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Socket(_) => ErrorKind::SocketError,
            Self::Timeout(_) => ErrorKind::ConnectionTimeout,
            Self::Encryption(_) => ErrorKind::EncryptionError,
            Self::No(_) => ErrorKind::NoResponse,
            Self::Bad(_) => ErrorKind::BadResponse,
            Self::Undefined(_) => ErrorKind::UndefinedResponse,
            Self::Response(_) => ErrorKind::ResponseError,
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Socket(err.to_string())
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Self::Encryption(err.to_string())
    }
}
