//! Outbound event interface toward the session layer (spec §6).

use crossbeam::channel::{Receiver, Sender};

use crate::ids::Id;
use crate::order::Execution;

#[derive(Debug, Clone)]
pub enum OutboundEvent {
    ExecReportEvent { exec: Execution },
    CancelRejectEvent { order_id: Id, reason: String },
    BusinessRejectEvent { ref_id: Id, reason: String },
}

/// The collaborator above this queue broadcasts to subscribed sessions; the
/// core only ever pushes.
#[derive(Clone)]
pub struct OutboundQueue {
    sender: Sender<OutboundEvent>,
}

pub struct OutboundQueueReceiver {
    receiver: Receiver<OutboundEvent>,
}

impl OutboundQueue {
    pub fn new() -> (Self, OutboundQueueReceiver) {
        let (sender, receiver) = crossbeam::channel::unbounded();
        (OutboundQueue { sender }, OutboundQueueReceiver { receiver })
    }

    pub fn push(&self, event: OutboundEvent) {
        // The receiving end outlives every producer for the engine's
        // lifetime; a send error here means the session layer shut down
        // first, which is not this queue's concern.
        let _ = self.sender.send(event);
    }
}

impl OutboundQueueReceiver {
    pub fn try_recv(&self) -> Option<OutboundEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv(&self) -> Option<OutboundEvent> {
        self.receiver.recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = OutboundEvent> + '_ {
        self.receiver.try_iter()
    }
}
