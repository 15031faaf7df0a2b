//! Unified error type for the Volley client.

use volley_protocol::ProtocolError;
use volley_state::StateError;
use volley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` lift sub-crate errors into this type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connecting failed, or the transport broke outside of a send.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// A message could not be written. It was dropped, not queued.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// An intent could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A local action referred to state the store does not have.
    #[error(transparent)]
    State(#[from] StateError),
}
