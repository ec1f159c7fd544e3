//! Error types for kasa-transport.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all device transport operations.
///
/// Every variant aborts the exchange in progress; the connection that
/// produced it is left closed.
#[derive(Debug, Error)]
pub enum KasaError {
    /// Dial failed or timed out.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying dial error (`TimedOut` when the dial deadline fired).
        #[source]
        source: std::io::Error,
    },

    /// Socket write failed part way through a frame.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Remote closed before the declared frame length was satisfied.
    #[error("connection closed after {received} of {expected} frame bytes")]
    ConnectionClosed {
        /// Total frame bytes expected (prefix included), 0 when the prefix never arrived.
        expected: usize,
        /// Bytes received before the close.
        received: usize,
    },

    /// Exchange deadline exceeded before the response frame completed.
    #[error("exchange timed out after {0:?}")]
    ReadTimeout(Duration),

    /// Declared payload length is beyond the accepted bound.
    #[error("declared payload length {declared} exceeds maximum {max}")]
    MalformedLength {
        /// Length announced by the prefix (or the outbound payload length).
        declared: u64,
        /// Bound in force.
        max: u64,
    },

    /// Accumulator growth would overflow or the allocator refused it.
    #[error("buffer allocation of {requested} bytes is too large")]
    AllocationTooLarge {
        /// Size that was requested.
        requested: usize,
    },

    /// I/O error while reading a frame.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Decoded response is not valid UTF-8.
    #[error("response is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// JSON error (command builder only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KasaError {
    /// The deadline fired, either while dialing or during the exchange.
    pub fn is_timeout(&self) -> bool {
        match self {
            KasaError::ReadTimeout(_) => true,
            KasaError::Connect { source, .. } => source.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// The remote side went away mid-frame.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, KasaError::ConnectionClosed { .. })
    }

    /// Whether a fresh attempt on a new connection could plausibly succeed.
    ///
    /// Protocol corruption and local encoding failures are not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KasaError::Connect { .. }
                | KasaError::Write(_)
                | KasaError::ConnectionClosed { .. }
                | KasaError::ReadTimeout(_)
                | KasaError::Io(_)
        )
    }
}

/// Result type alias using KasaError.
pub type Result<T> = std::result::Result<T, KasaError>;
