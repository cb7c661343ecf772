use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("No source stage can handle URI: {0}")]
    UnsupportedUri(String),

    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
