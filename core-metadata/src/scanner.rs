//! # Metadata Scan Engine
//!
//! Reads tags and duration for a batch of URIs through a decode-only probe
//! pipeline, one URI at a time.
//!
//! ## Job lifecycle
//!
//! ```text
//! submit ──> queued ──> head: feed ──> accumulate ──> terminate ──> flush ──> uri_scanned
//!              │                                                      │
//!              └── cancel: removed, no result                         └──> feed next head
//! ```
//!
//! While a job is live, tag messages merge into it and a duration message
//! sets its duration. The first decoded buffer reaching the discarding sink
//! is enough: the duration is queried at that point and the job is finished
//! without waiting for the rest of the stream. A decode error, an
//! unidentifiable stream or end of stream also finish it.
//!
//! Results are published as `ScanEvent::UriScanned` in submission order.
//! The flush and advance steps run in a loop, so a run of URIs that fail
//! synchronously never recurses.

use crate::error::{MetadataError, Result};
use crate::job::{ScanJob, ScanJobId};
use crate::pipeline::ProbePipeline;
use crate::queue::ScanQueue;
use bridge_traits::{BusMessage, BusReceiver, EngineBus, EngineEvent, EngineFactory};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use tracing::{debug, info, instrument, trace, warn};

/// Whether a finished head job publishes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Publish,
    Discard,
}

/// Sequential tag and duration prober.
pub struct ScanEngine {
    pipeline: Option<ProbePipeline>,
    queue: ScanQueue,
    events: EventBus,
}

impl ScanEngine {
    /// Build the engine and its probe pipeline.
    ///
    /// Returns the receiving end of the probe bus; the owner feeds every
    /// message from it into [`handle_message`](Self::handle_message). Without
    /// a probe engine every submitted job finishes at once with a
    /// `NotReady` failure.
    pub fn new(factory: &dyn EngineFactory, events: EventBus) -> (Self, BusReceiver) {
        let (bus, receiver) = EngineBus::channel();

        let pipeline = match factory.create_probe(bus) {
            Ok(engine) => Some(ProbePipeline::new(engine)),
            Err(e) => {
                warn!(error = %e, "No probe engine available, metadata scanning will not work");
                None
            }
        };

        let engine = Self {
            pipeline,
            queue: ScanQueue::new(),
            events,
        };

        (engine, receiver)
    }

    /// Returns `true` if a probe engine was built.
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Queue `uri` for scanning. Starts it right away if the engine is idle.
    #[instrument(skip(self, uri))]
    pub fn submit(&mut self, uri: impl Into<String>) -> ScanJobId {
        let uri = uri.into();
        let was_idle = self.queue.is_empty();
        let id = self.queue.push(uri.as_str());
        info!(job = %id, uri = %uri, pending = self.queue.len(), "Scan submitted");

        if was_idle {
            self.advance();
        }
        id
    }

    /// Withdraw a job.
    ///
    /// A queued job is dropped silently. The live job is torn down the same
    /// way a finished one is, but its result is discarded, and the next job
    /// starts.
    #[instrument(skip(self))]
    pub fn cancel(&mut self, id: ScanJobId) -> Result<()> {
        if self.queue.is_head(id) {
            info!(job = %id, "Cancelling live scan");
            self.finish_head(Delivery::Discard);
            self.advance();
            return Ok(());
        }

        match self.queue.remove(id) {
            Some(job) => {
                debug!(job = %id, uri = %job.uri(), "Removed queued scan");
                Ok(())
            }
            None => {
                warn!(job = %id, "Cancel of unknown scan job");
                Err(MetadataError::UnknownScanJob(id))
            }
        }
    }

    /// Number of jobs not yet finished, the live one included.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// The live job.
    pub fn current(&self) -> Option<&ScanJob> {
        self.queue.head()
    }

    /// Apply one probe bus message. Messages from a flushed source are dropped.
    pub fn handle_message(&mut self, message: BusMessage) {
        let live = self.pipeline.as_ref().and_then(ProbePipeline::live_stage);
        if live != Some(message.stage) {
            trace!(
                stage = %message.stage,
                live = ?live,
                event = message.event.name(),
                "Dropping stale probe message"
            );
            return;
        }

        debug!(event = message.event.name(), "Probe engine message");

        match message.event {
            EngineEvent::Tags(tags) => {
                if let Some(job) = self.queue.head_mut() {
                    job.merge_tags(tags);
                }
            }
            EngineEvent::DurationKnown(duration) => {
                if let Some(job) = self.queue.head_mut() {
                    job.set_duration(duration);
                }
            }
            EngineEvent::FirstPayload => {
                let duration = self.pipeline.as_ref().and_then(ProbePipeline::query_duration);
                if let (Some(job), Some(duration)) = (self.queue.head_mut(), duration) {
                    job.set_duration(duration);
                }
                self.terminate(None);
            }
            EngineEvent::EndOfStream => self.terminate(None),
            EngineEvent::Error { detail } => self.terminate(Some(MetadataError::Engine(detail))),
            EngineEvent::UnknownType { caps } => {
                self.terminate(Some(MetadataError::UnsupportedType(caps)))
            }
            EngineEvent::StateChanged { .. } | EngineEvent::Buffering { .. } => {}
        }
    }

    /// Stop the probe pipeline and drop every job without a result.
    pub fn shutdown(&mut self) {
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(dropped, "Discarded pending scans");
        }

        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.release() {
                warn!(error = %e, "Probe engine refused to stop");
            }
            info!("Probe engine released");
        }
    }

    /// Finish the live job, optionally with a failure, and move on.
    fn terminate(&mut self, failure: Option<MetadataError>) {
        if let (Some(job), Some(failure)) = (self.queue.head_mut(), failure) {
            debug!(job = %job.id(), error = %failure, "Scan failed");
            job.fail(failure.into());
        }
        self.finish_head(Delivery::Publish);
        self.advance();
    }

    /// Feed the head job, finishing every job that cannot start until one
    /// does or the queue is empty.
    fn advance(&mut self) {
        while let Some(job) = self.queue.head() {
            let id = job.id();
            let started = match self.pipeline.as_mut() {
                Some(pipeline) => pipeline.feed(job.uri()).map_err(MetadataError::from),
                None => Err(MetadataError::NotReady),
            };

            match started {
                Ok(stage) => {
                    debug!(job = %id, %stage, "Scan started");
                    return;
                }
                Err(e) => {
                    warn!(job = %id, error = %e, "Scan could not start");
                    if let Some(job) = self.queue.head_mut() {
                        job.fail(e.into());
                    }
                    self.finish_head(Delivery::Publish);
                }
            }
        }

        debug!("Scan queue drained");
    }

    /// Flush the pipeline and pop the head job.
    fn finish_head(&mut self, delivery: Delivery) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            if let Err(e) = pipeline.flush() {
                warn!(error = %e, "Failed to flush probe pipeline");
            }
        }

        let Some(job) = self.queue.pop() else {
            return;
        };

        match delivery {
            Delivery::Publish => {
                let result = job.into_result();
                info!(
                    job = %result.job_id,
                    uri = %result.uri,
                    success = result.is_success(),
                    tags = result.tags.len(),
                    "URI scanned"
                );
                self.events.publish(CoreEvent::Scan(ScanEvent::from(result)));
            }
            Delivery::Discard => debug!(job = %job.id(), "Discarded cancelled scan"),
        }
    }
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("pipeline", &self.pipeline)
            .field("queue", &self.queue)
            .finish()
    }
}
