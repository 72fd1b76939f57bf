use thiserror::Error;

#[derive(Error, Debug)]
pub enum SliceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse category of a [`SliceError`].
///
/// Callers branch on the kind instead of inspecting error sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was rejected before any store call was made.
    Precondition,
    /// The store could not be reached or the exchange broke off.
    Transport,
    /// The store answered and refused the operation.
    Provider,
}

impl SliceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SliceError::InvalidArgument(_) | SliceError::Config(_) => ErrorKind::Precondition,
            SliceError::Transport(_) | SliceError::Io(_) => ErrorKind::Transport,
            SliceError::Provider { .. }
            | SliceError::ObjectNotFound(_)
            | SliceError::Serialization(_)
            | SliceError::Internal(_) => ErrorKind::Provider,
        }
    }

    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }
}

pub type Result<T> = std::result::Result<T, SliceError>;
