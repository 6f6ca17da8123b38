use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Unknown agency: {0}")]
    UnknownAgency(u32),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Frame too large: {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: u64, limit: u64 },

    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("Round timed out with {finished} of {expected} agencies finished")]
    RoundTimeout { finished: usize, expected: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LotteryError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    pub fn closed(msg: impl Into<String>) -> Self {
        Self::ConnectionClosed(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::InvalidHandshake(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Errors after which the current batch is rejected but the session
    /// can keep reading from the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_) | Self::Persistence(_) | Self::Storage(_)
        )
    }
}
