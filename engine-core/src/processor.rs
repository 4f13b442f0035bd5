//! Drives the input queue through the state machine and the transaction
//! manager through the operation executor — the two halves the dual
//! worker pools in [`crate::task_manager`] each spin on (spec §4.11,
//! §4.12).
//!
//! A primary [`InboundEvent`] and every [`DeferedEvent`] it produces are
//! each staged into their own [`TransactionScope`](crate::transaction::scope::TransactionScope)
//! and handed to the [`TransactionManager`]; this module never executes a
//! scope's operations itself; that's [`Processor::drain_ready_transaction`]'s
//! job, run from the transaction-processor pool so a slow FSM transition on
//! one order never blocks operation execution for another.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::book::OrderBook;
use crate::deferred::DeferedEvent;
use crate::fsm::{ActionContext, EventKind, Guard, StateMachine, StateMachineEvent};
use crate::ids::Id;
use crate::ids::IdentifierGenerator;
use crate::matching::OrderMatcher;
use crate::metrics::MetricsRegistry;
use crate::order::{Order, OrderStatus};
use crate::outbound::{OutboundEvent, OutboundQueue};
use crate::queue::{InboundEvent, InputQueue, ProcessEventType, StateChange, TimerKind};
use crate::store::OrderStore;
use crate::transaction::manager::{Transaction, TransactionManager};
use crate::transaction::operations::OperationContext;
use crate::transaction::scope_pool::ScopePool;

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-order state machines, keyed by order id. A production engine would
/// keep this colocated with [`Order`] itself; it's split out here so the
/// FSM module stays free of storage concerns.
pub struct StateMachineTable {
    machines: dashmap::DashMap<Id, StateMachine>,
}

impl StateMachineTable {
    pub fn new() -> Self {
        StateMachineTable { machines: dashmap::DashMap::new() }
    }

    fn with_mut<R>(&self, order_id: Id, f: impl FnOnce(&mut StateMachine) -> R) -> R {
        let mut entry = self.machines.entry(order_id).or_insert_with(StateMachine::initial);
        f(&mut entry)
    }
}

impl Default for StateMachineTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns every handle needed to turn one [`InboundEvent`] into a staged
/// transaction, and every ready transaction into executed operations.
pub struct Processor {
    pub generator: Arc<IdentifierGenerator>,
    pub order_store: Arc<OrderStore>,
    pub order_book: Arc<OrderBook>,
    pub matcher: OrderMatcher,
    pub state_machines: StateMachineTable,
    pub scope_pool: Arc<ScopePool>,
    pub transaction_manager: Arc<TransactionManager>,
    pub outbound: OutboundQueue,
    pub input_queue: Arc<InputQueue>,
    pub metrics: Arc<MetricsRegistry>,
    /// Follow-on events produced by matching, fed back through the FSM by
    /// the event pool rather than the transaction pool that produced them
    /// (spec §4.11).
    deferred_events: SegQueue<DeferedEvent>,
}

impl Processor {
    pub fn new(
        generator: Arc<IdentifierGenerator>,
        order_store: Arc<OrderStore>,
        order_book: Arc<OrderBook>,
        matcher: OrderMatcher,
        scope_pool: Arc<ScopePool>,
        transaction_manager: Arc<TransactionManager>,
        outbound: OutboundQueue,
        input_queue: Arc<InputQueue>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Processor {
            generator,
            order_store,
            order_book,
            matcher,
            state_machines: StateMachineTable::new(),
            scope_pool,
            transaction_manager,
            outbound,
            input_queue,
            metrics,
            deferred_events: SegQueue::new(),
        }
    }

    /// One unit of event-pool work: drains a primary inbound event first,
    /// falling back to a queued deferred event. Returns whether there was
    /// anything to do.
    pub fn process_one(&self) -> bool {
        let mut handled_event = None;
        self.input_queue.pop_with(|_source, event| {
            handled_event = Some(event.clone());
        });
        if let Some(event) = handled_event {
            self.metrics.orders().input_queue_depth.set(self.input_queue.size() as i64);
            self.on_event(event);
            return true;
        }

        if let Some(deferred) = self.deferred_events.pop() {
            self.on_deferred(deferred);
            return true;
        }

        false
    }

    /// One unit of transaction-pool work: executes the next ready
    /// transaction's operations and feeds any resulting deferred events
    /// back to the event pool's queue. Returns whether there was a ready
    /// transaction.
    pub fn drain_ready_transaction(&self) -> bool {
        let Some((id, txn)) = self.transaction_manager.next() else { return false };
        let mut deferred = VecDeque::new();
        let outcome = {
            let mut ctx = OperationContext {
                generator: &self.generator,
                order_store: &self.order_store,
                order_book: &self.order_book,
                matcher: &self.matcher,
                outbound: &self.outbound,
                input_queue: &self.input_queue,
                deferred: &mut deferred,
                now: now_millis(),
            };
            txn.scope.execute_transaction(&mut ctx)
        };
        match &outcome {
            Ok(()) => self.metrics.transactions().committed_total.inc(),
            Err(err) => {
                tracing::error!(error = %err, "transaction rolled back");
                self.metrics.transactions().rolled_back_total.inc();
            }
        }
        for event in deferred {
            self.deferred_events.push(event);
        }
        self.transaction_manager.finish(id, &txn.touched);
        true
    }

    fn on_event(&self, event: InboundEvent) {
        let now = now_millis();
        match event {
            InboundEvent::OrderEvent { order } => {
                self.submit(&order, StateMachineEvent::real(EventKind::OrderReceived));
            }
            InboundEvent::OrderCancelEvent { order_id, reason } => {
                if let Ok(order) = self.order_store.locate_by_order_id(order_id) {
                    self.submit(&order, StateMachineEvent::real(EventKind::CancelReceived { acceptable: Guard::new(true) }));
                } else {
                    self.outbound.push(OutboundEvent::CancelRejectEvent { order_id, reason });
                }
            }
            InboundEvent::OrderReplaceEvent { order_id, replacement } => {
                if let (Ok(order), Some(repl)) = (self.order_store.locate_by_order_id(order_id), replacement) {
                    self.submit(&order, StateMachineEvent::real(EventKind::ReplaceReceived { repl_id: repl.order_id() }));
                    self.submit(&repl, StateMachineEvent::real(EventKind::OrderReceived));
                }
            }
            InboundEvent::OrderChangeStateEvent { order_id, change } => {
                if let Ok(order) = self.order_store.locate_by_order_id(order_id) {
                    let kind = match change {
                        StateChange::Suspend => EventKind::Suspended,
                        StateChange::Resume => EventKind::Continue,
                        StateChange::Finish => EventKind::Finished,
                    };
                    self.submit(&order, StateMachineEvent::real(kind));
                }
            }
            InboundEvent::TimerEvent { order_id, timer } => {
                if let Ok(order) = self.order_store.locate_by_order_id(order_id) {
                    let kind = match timer {
                        TimerKind::Expiration => EventKind::Expired,
                        TimerKind::DayEnd => EventKind::Finished,
                        TimerKind::DayStart => EventKind::NewDay { not_executed: Guard::new(order.read().hot.cum_qty.is_zero()) },
                    };
                    self.submit(&order, StateMachineEvent::real(kind));
                }
            }
            InboundEvent::ProcessEvent { kind, order_id } => {
                if let Ok(order) = self.order_store.locate_by_order_id(order_id) {
                    let event_kind = match kind {
                        ProcessEventType::ReplaceReceived => EventKind::Replace,
                        ProcessEventType::ExecReplace { repl_id } => EventKind::ExecReplace { repl_id },
                        ProcessEventType::ReplaceRejected => EventKind::ReplaceRejected { reason: "replace rejected".to_string() },
                        ProcessEventType::ExecCancel => EventKind::ExecCancel,
                    };
                    self.submit(&order, StateMachineEvent::real(event_kind));
                }
            }
        }
        let _ = now;
    }

    fn on_deferred(&self, event: DeferedEvent) {
        match event {
            DeferedEvent::ExecutionDeferedEvent { base_order, trades } => {
                for trade in trades {
                    for participant in [trade.active, trade.candidate] {
                        let Ok(order) = self.order_store.locate_by_order_id(participant) else { continue };
                        let projected = {
                            let data = order.read();
                            data.hot.leaves_qty.checked_sub(trade.qty).unwrap_or(data.hot.leaves_qty)
                        };
                        let complete = Guard::new(projected.is_zero());
                        self.submit(&order, StateMachineEvent::real(EventKind::TradeExecution { trade, complete }));
                    }
                    self.metrics.orders().trades_total.inc();
                }
                let _ = base_order;
            }
            DeferedEvent::MatchOrderDeferedEvent { order } => {
                if let Ok(order) = self.order_store.locate_by_order_id(order) {
                    let mut pooled = self.scope_pool.acquire();
                    pooled.with_mut(|scope| {
                        scope.push(crate::transaction::operations::Operation::MatchOrder {
                            order_id: order.order_id(),
                            recorded_count: std::cell::Cell::new(0),
                        });
                    });
                    self.stage(pooled.detach());
                }
            }
            DeferedEvent::CancelOrderDeferedEvent { order, reason } => {
                if let Ok(resolved) = self.order_store.locate_by_order_id(order) {
                    tracing::debug!(order_id = %order, %reason, "internally cancelling unmatched order");
                    self.submit(&resolved, StateMachineEvent::real(EventKind::InternalCancel));
                }
            }
        }
    }

    /// Runs one FSM transition, building a staged scope of operations, and
    /// hands it to the transaction manager. Does not execute the scope —
    /// that happens on the transaction pool.
    fn submit(&self, order: &Order, event: StateMachineEvent) {
        let mut pooled = self.scope_pool.acquire();
        let result = pooled.with_mut(|scope| {
            let mut ctx = ActionContext { order, order_store: &self.order_store, generator: &self.generator, scope };
            self.state_machines.with_mut(order.order_id(), |sm| sm.process(&event, &mut ctx))
        });

        if let Err(err) = result {
            tracing::warn!(order_id = %order.order_id(), error = %err, "illegal state transition");
            return;
        }

        self.stage(pooled.detach());
    }

    fn stage(&self, scope: Box<crate::transaction::scope::TransactionScope>) {
        let touched = scope.related_objects().unwrap_or_default();
        let txn = Transaction { id: self.generator.next(), touched, scope };
        self.transaction_manager.add(txn);
    }

    /// Exposed for tests and the metrics hand-off: the `OrderStatus` the
    /// generic status-only exec report would carry right now.
    pub fn status_of(&self, order_id: Id) -> Option<OrderStatus> {
        self.order_store.locate_by_order_id(order_id).ok().map(|o| o.read().hot.status)
    }
}
