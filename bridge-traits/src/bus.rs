//! Engine message bus.
//!
//! Engines run their decode graphs on their own threads. Every notification is
//! posted onto an unbounded channel and consumed, in order, by the single
//! control task that owns the engine. Each message is stamped with the
//! [`StageId`] that was live when it was posted.

use crate::engine::{EngineEvent, StageId};
use tokio::sync::mpsc;

/// A single engine notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub stage: StageId,
    pub event: EngineEvent,
}

impl BusMessage {
    pub fn new(stage: StageId, event: EngineEvent) -> Self {
        Self { stage, event }
    }
}

/// Consumer side of an engine bus.
pub type BusReceiver = mpsc::UnboundedReceiver<BusMessage>;

/// Producer side of an engine bus, held by the engine.
#[derive(Debug, Clone)]
pub struct EngineBus {
    sender: mpsc::UnboundedSender<BusMessage>,
}

impl EngineBus {
    /// Create a bus and the receiver the control task drains.
    pub fn channel() -> (Self, BusReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Post a message. Returns `false` if the consumer is gone.
    pub fn post(&self, stage: StageId, event: EngineEvent) -> bool {
        self.sender.send(BusMessage::new(stage, event)).is_ok()
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
