//! Probe pipeline wrapper.
//!
//! The decode and discard stages live as long as the engine. Each scan job
//! only swaps the source stage: [`ProbePipeline::feed`] attaches one and starts
//! the pipeline, [`ProbePipeline::flush`] stops the pipeline and detaches it.

use crate::error::Result;
use bridge_traits::{EngineHandle, EngineState, ProbeEngine, StageId};
use std::time::Duration;
use tracing::{debug, warn};

/// Owned handle to the probe engine. Dropping it stops the engine first.
pub type ProbeHandle = EngineHandle<dyn ProbeEngine>;

#[derive(Debug)]
pub struct ProbePipeline {
    engine: ProbeHandle,
    live: Option<StageId>,
}

impl ProbePipeline {
    pub fn new(engine: Box<dyn ProbeEngine>) -> Self {
        Self {
            engine: ProbeHandle::new(engine),
            live: None,
        }
    }

    /// Stage of the attached source, if a job is live.
    pub fn live_stage(&self) -> Option<StageId> {
        self.live
    }

    /// Attach a source stage for `uri` and start decoding.
    ///
    /// On failure nothing stays attached.
    pub fn feed(&mut self, uri: &str) -> Result<StageId> {
        self.flush()?;

        let stage = self.engine.attach_source(uri)?;
        self.live = Some(stage);

        if let Err(e) = self.engine.set_state(EngineState::Playing) {
            if let Err(cleanup) = self.flush() {
                warn!(error = %cleanup, "Failed to discard source stage after refused start");
            }
            return Err(e.into());
        }

        debug!(%stage, "Probe source attached");
        Ok(stage)
    }

    /// Stop the pipeline and discard the live source stage.
    ///
    /// The stop always comes before the detach. A no-op when idle. The stage
    /// is only forgotten once detached, so a failed flush is retried by the
    /// next `feed` or `release`.
    pub fn flush(&mut self) -> Result<()> {
        let Some(stage) = self.live else {
            return Ok(());
        };

        self.engine.set_state(EngineState::Stopped)?;
        self.engine.detach_source(stage)?;
        self.live = None;
        debug!(%stage, "Probe source detached");
        Ok(())
    }

    pub fn query_duration(&self) -> Option<Duration> {
        self.engine.query_duration()
    }

    /// Flush, then stop and release the engine.
    pub fn release(mut self) -> Result<()> {
        let flushed = self.flush();
        let released = self.engine.release();
        flushed.and(released.map_err(Into::into))
    }
}
