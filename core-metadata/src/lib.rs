//! # Metadata Scan Module
//!
//! Reads stream tags and duration for submitted URIs without playing them.
//!
//! ## Overview
//!
//! This module handles:
//! - Queueing scan requests and probing them strictly one at a time
//! - Accumulating tags and duration from the probe engine's messages
//! - Cancelling queued or live scans
//! - Publishing one `ScanEvent::UriScanned` per finished job, in submission order

pub mod error;
pub mod job;
pub mod pipeline;
pub mod queue;
pub mod scanner;

pub use core_runtime::events::{ScanFailure, ScanFailureKind};
pub use error::{MetadataError, Result};
pub use job::{ScanJob, ScanJobId, ScanResult};
pub use pipeline::{ProbeHandle, ProbePipeline};
pub use queue::ScanQueue;
pub use scanner::ScanEngine;
