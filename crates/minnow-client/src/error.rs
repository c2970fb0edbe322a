//! Client-side error taxonomy.

use thiserror::Error;

/// Everything that can go wrong talking to a host.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The host/port pair did not form a valid endpoint URI.
    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),

    /// Connection establishment or transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The server answered with a non-OK status.
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// A service name did not match any known service.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// A run-scoped operation was asked to default to the most recent run,
    /// but the device has no run history at all.
    #[error("no protocol runs available on this device")]
    NoRunsAvailable,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ClientError>;
