//! # Metadata Error Types
//!
//! Errors returned synchronously by the scan engine, plus the failures that
//! end a scan job. The latter never reach the caller as `Err`; they are
//! folded into the job's [`ScanFailure`] and delivered with its result.

use crate::job::ScanJobId;
use bridge_traits::BridgeError;
use core_runtime::events::{ScanFailure, ScanFailureKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("Unknown scan job: {0}")]
    UnknownScanJob(ScanJobId),

    #[error("No probe engine available")]
    NotReady,

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Unsupported stream type: {0}")]
    UnsupportedType(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl MetadataError {
    /// Returns `true` if the caller passed an invalid argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, MetadataError::UnknownScanJob(_))
    }

    /// Category reported in a scan result.
    pub fn failure_kind(&self) -> ScanFailureKind {
        match self {
            MetadataError::NotReady => ScanFailureKind::NotReady,
            MetadataError::UnsupportedType(_) => ScanFailureKind::UnsupportedType,
            MetadataError::Bridge(BridgeError::UnsupportedUri(_)) => {
                ScanFailureKind::UnsupportedUri
            }
            MetadataError::Bridge(BridgeError::NotAvailable(_)) => ScanFailureKind::NotReady,
            MetadataError::UnknownScanJob(_)
            | MetadataError::Engine(_)
            | MetadataError::Bridge(_) => ScanFailureKind::Engine,
        }
    }
}

impl From<MetadataError> for ScanFailure {
    fn from(error: MetadataError) -> Self {
        let message = match &error {
            MetadataError::Engine(detail) => detail.clone(),
            other => other.to_string(),
        };
        ScanFailure::new(error.failure_kind(), message)
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
