//! Lock-free MPMC input queue of tagged event variants (spec §4.10, §6).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::ids::Id;
use crate::order::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Suspend,
    Resume,
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Expiration,
    DayEnd,
    DayStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEventType {
    ReplaceReceived,
    /// Self-posted once a replace request's pending exec report has been
    /// staged, carrying the accepted replacement order's id, so the venue
    /// confirms its own replace instead of waiting on an external ack
    /// (spec §4.6, zone B `GoingReplace` -> `CnclReplaced`).
    ExecReplace { repl_id: Id },
    ReplaceRejected,
    /// Self-posted once a cancel request's pending exec report has been
    /// staged, so the venue confirms its own cancel instead of waiting on
    /// an external ack (spec §4.6, zone B `GoingCancel` -> `CnclReplaced`).
    ExecCancel,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    OrderEvent { order: Order },
    OrderCancelEvent { order_id: Id, reason: String },
    OrderReplaceEvent { order_id: Id, replacement: Option<Order> },
    OrderChangeStateEvent { order_id: Id, change: StateChange },
    TimerEvent { order_id: Id, timer: TimerKind },
    ProcessEvent { kind: ProcessEventType, order_id: Id },
}

type QueueItem = (String, InboundEvent);

/// An MPMC queue backed by a `crossbeam` channel, with an observer fan-out
/// fired on every push and an explicit `top`/`pop` pending-slot pair
/// mirroring the original's peek-then-consume contract.
pub struct InputQueue {
    sender: Sender<QueueItem>,
    receiver: Receiver<QueueItem>,
    pending: Mutex<Option<QueueItem>>,
    size: AtomicUsize,
    observers: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
}

impl InputQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        InputQueue {
            sender,
            receiver,
            pending: Mutex::new(None),
            size: AtomicUsize::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn attach(&self, observer: Arc<dyn Fn() + Send + Sync>) {
        self.observers.lock().push(observer);
    }

    pub fn detach_all(&self) {
        self.observers.lock().clear();
    }

    pub fn push(&self, source: impl Into<String>, event: InboundEvent) {
        let _ = self.sender.send((source.into(), event));
        self.size.fetch_add(1, Ordering::AcqRel);
        for observer in self.observers.lock().iter() {
            observer();
        }
    }

    /// Peek-style dequeue: pops into the held pending slot and dispatches
    /// via `dispatch`, returning whether an event was available. A later
    /// call to [`InputQueue::pop`] clears the slot.
    pub fn top(&self, mut dispatch: impl FnMut(&str, &InboundEvent)) -> bool {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            match self.receiver.try_recv() {
                Ok(item) => *pending = Some(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return false,
            }
        }
        if let Some((source, event)) = pending.as_ref() {
            dispatch(source, event);
            true
        } else {
            false
        }
    }

    /// Drops the pending slot, decrementing size.
    pub fn pop(&self) {
        let mut pending = self.pending.lock();
        if pending.take().is_some() {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Pop-and-dispatch in one step.
    pub fn pop_with(&self, dispatch: impl FnMut(&str, &InboundEvent)) -> bool {
        let had = self.top(dispatch);
        if had {
            self.pop();
        }
        had
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
