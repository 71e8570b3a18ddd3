//! Error type shared by every module in the envelope engine.

use std::fmt;
use std::io;

/// Everything that can go wrong building or reading an envelope.
///
/// Cloning an `Io` variant keeps only its [`io::ErrorKind`] and message —
/// the original [`io::Error`] is not `Clone`, but `State::Failed` needs to
/// hand the same error back on every subsequent call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidChunkSize,
    InvalidKey,
    NoRecipients,
    AlreadyStarted,
    AlreadyClosed,
    MalformedHeader(String),
    MalformedChunk(String),
    TrailingGarbage,
    UnexpectedEof,
    NoMatchingRecipient,
    AuthenticationFailure,
    SenderMismatch,
    UnauthenticatedSender,
    Io(io::ErrorKind, String),
    PrimitiveFailure(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChunkSize => write!(f, "chunk size is out of the allowed range"),
            Self::InvalidKey => write!(f, "key is not valid for this algorithm"),
            Self::NoRecipients => write!(f, "an envelope needs at least one recipient"),
            Self::AlreadyStarted => write!(f, "envelope is already streaming, cannot configure"),
            Self::AlreadyClosed => write!(f, "envelope is closed, cannot write or configure"),
            Self::MalformedHeader(reason) => write!(f, "malformed header: {reason}"),
            Self::MalformedChunk(reason) => write!(f, "malformed chunk: {reason}"),
            Self::TrailingGarbage => write!(f, "trailing bytes after the terminal chunk"),
            Self::UnexpectedEof => write!(f, "input ended before the terminal chunk"),
            Self::NoMatchingRecipient => write!(f, "no wrapped key unwraps with this private key"),
            Self::AuthenticationFailure => write!(f, "authentication tag did not verify"),
            Self::SenderMismatch => {
                write!(f, "sender signature did not verify against the expected key")
            }
            Self::UnauthenticatedSender => {
                write!(f, "a sender was expected but the envelope is unsigned")
            }
            Self::Io(_, message) => write!(f, "i/o error: {message}"),
            Self::PrimitiveFailure(reason) => write!(f, "cryptographic primitive failed: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err.kind(), err.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(kind, message) => io::Error::new(kind, message),
            Error::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string()),
            other => io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_roundtrips_kind() {
        let source = io::Error::new(io::ErrorKind::BrokenPipe, "pipe gone");
        let err = Error::from(source);
        assert_eq!(err, Error::Io(io::ErrorKind::BrokenPipe, "pipe gone".to_string()));
    }

    #[test]
    fn error_converts_to_io_error_unexpected_eof() {
        let io_err: io::Error = Error::UnexpectedEof.into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn display_is_not_empty_for_every_variant() {
        let variants = [
            Error::InvalidChunkSize,
            Error::InvalidKey,
            Error::NoRecipients,
            Error::AlreadyStarted,
            Error::AlreadyClosed,
            Error::MalformedHeader("x".into()),
            Error::MalformedChunk("x".into()),
            Error::TrailingGarbage,
            Error::UnexpectedEof,
            Error::NoMatchingRecipient,
            Error::AuthenticationFailure,
            Error::SenderMismatch,
            Error::UnauthenticatedSender,
            Error::Io(io::ErrorKind::Other, "x".into()),
            Error::PrimitiveFailure("x".into()),
        ];
        for variant in variants {
            assert!(!variant.to_string().is_empty());
        }
    }
}
