//! Error types for the gridgate runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the collector's run loop.
///
/// Every variant except [`Error::Canceled`] is fatal to reconciliation and
/// should be treated by the supervisor as a reason to restart the process.
#[derive(Debug, Error)]
pub enum Error {
    /// The initial subscription to the lifecycle event stream failed.
    #[error("event stream unavailable: {0}")]
    StreamUnavailable(String),

    /// The event channel closed without a shutdown signal.
    #[error("browser event stream closed unexpectedly")]
    StreamClosed,

    /// The stream surfaced a transport-level error.
    #[error("event stream transport error: {0}")]
    StreamTransport(String),

    /// An event carried an address that does not parse as an IP address.
    #[error("failed to convert address to session id: {address}")]
    AddressConversion { address: String },

    /// The external cancellation signal was observed. A clean stop, not a
    /// failure.
    #[error("operation canceled")]
    Canceled,
}

impl Error {
    /// Returns true if this is the clean cancellation signal rather than a
    /// stream failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}
