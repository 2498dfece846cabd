//! Error types for the MMP protocol layer.

use thiserror::Error;

/// MMP protocol errors.
#[derive(Error, Debug)]
pub enum MmpError {
    /// Network I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection error
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection lost
    #[error("Connection lost")]
    Disconnected,

    /// The consumer dropped its event channel; the client cannot continue
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Convenient Result type for MMP operations.
pub type MmpResult<T> = Result<T, MmpError>;
