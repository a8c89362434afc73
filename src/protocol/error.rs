//! Error types for the Redis wire client

use std::fmt;

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while talking to a Redis server
#[derive(Debug)]
pub enum ProtocolError {
    /// Socket level failure
    Io(std::io::Error),

    /// The server closed the connection
    ConnectionClosed,

    /// Connecting took longer than the configured timeout
    Timeout,

    /// The server answered with an `-ERR ...` reply
    Server(String),

    /// A well-formed reply of a type we did not expect
    UnexpectedReply(String),

    /// The byte stream is not valid RESP
    Malformed(String),
}

impl ProtocolError {
    /// Whether the connection is unusable after this error.
    ///
    /// Server and unexpected replies leave the stream aligned on the next
    /// reply, everything else does not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::Server(_) | ProtocolError::UnexpectedReply(_)
        )
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Io(err) => write!(f, "I/O error: {}", err),
            ProtocolError::ConnectionClosed => write!(f, "connection closed by server"),
            ProtocolError::Timeout => write!(f, "timed out"),
            ProtocolError::Server(msg) => write!(f, "server error: {}", msg),
            ProtocolError::UnexpectedReply(kind) => write!(f, "unexpected reply: {}", kind),
            ProtocolError::Malformed(msg) => write!(f, "malformed reply: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(err),
        }
    }
}
