//! Zone A: the order lifecycle state machine (spec §4.6).

use crate::errors::IllegalTransition;
use crate::order::{ExecutionKind, OrdType, OrderStatus};
use crate::queue::{InboundEvent, ProcessEventType};
use crate::transaction::operations::{CorrectDetails, Operation};

use super::events::{EventKind, StateMachineEvent};
use super::ActionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ZoneAState {
    RcvdNew = 0,
    PendNew = 1,
    PendReplace = 2,
    New = 3,
    PartFill = 4,
    Filled = 5,
    Expired = 6,
    DoneForDay = 7,
    Suspended = 8,
    Rejected = 9,
    CnclReplaced = 10,
}

impl ZoneAState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ZoneAState::Filled | ZoneAState::Expired | ZoneAState::DoneForDay | ZoneAState::CnclReplaced | ZoneAState::Rejected
        )
    }

    pub fn status(self) -> OrderStatus {
        match self {
            ZoneAState::RcvdNew | ZoneAState::PendNew => OrderStatus::PendingNew,
            ZoneAState::PendReplace => OrderStatus::PendingReplace,
            ZoneAState::New => OrderStatus::New,
            ZoneAState::PartFill => OrderStatus::PartiallyFilled,
            ZoneAState::Filled => OrderStatus::Filled,
            ZoneAState::Expired => OrderStatus::Expired,
            ZoneAState::DoneForDay => OrderStatus::DoneForDay,
            ZoneAState::Suspended => OrderStatus::Suspended,
            ZoneAState::Rejected => OrderStatus::Rejected,
            ZoneAState::CnclReplaced => OrderStatus::CancelledOrReplaced,
        }
    }
}

fn illegal(state: ZoneAState, event: &StateMachineEvent) -> IllegalTransition {
    IllegalTransition { state: state as i32, event: event.name() }
}

/// Appends a generic status exec report for entering `next`, unless the
/// event is test-only (spec §4.6: "on any entry to a state the action
/// appends ... a CreateExecReport of the corresponding (orderStatus, execType)").
fn append_status_exec(ctx: &mut ActionContext, next: ZoneAState, kind: ExecutionKind) {
    ctx.scope.push(Operation::CreateExecReport { order: ctx.order.clone(), order_status: next.status(), kind });
}

fn accept_new_order(ctx: &mut ActionContext) {
    append_status_exec(ctx, ZoneAState::New, ExecutionKind::New);
    let ord_type = ctx.order.read().hot.ord_type;
    if ord_type != OrdType::Market {
        ctx.scope.push(Operation::AddToOrderBook { order: ctx.order.clone() });
    }
    ctx.scope.push(Operation::MatchOrder { order_id: ctx.order.order_id(), recorded_count: std::cell::Cell::new(0) });
}

fn reject(ctx: &mut ActionContext, reason: String) {
    ctx.scope.push(Operation::CreateRejectExecReport { order: ctx.order.clone(), reason, order_status: OrderStatus::Rejected });
}

fn apply_trade(ctx: &mut ActionContext, trade: &crate::deferred::Trade) {
    {
        let mut data = ctx.order.write();
        data.hot.cum_qty = data.hot.cum_qty.checked_add(trade.qty).unwrap_or(data.hot.cum_qty);
        data.hot.leaves_qty = data.hot.leaves_qty.checked_sub(trade.qty).unwrap_or(data.hot.leaves_qty);
    }
    ctx.scope.push(Operation::CreateTradeExecReport { order: ctx.order.clone(), trade: *trade, order_status: OrderStatus::PartiallyFilled });
}

fn apply_correction(ctx: &mut ActionContext, correct: &CorrectDetails) {
    {
        let mut data = ctx.order.write();
        data.hot.cum_qty = correct.cum_qty;
        data.hot.leaves_qty = correct.leaves_qty;
    }
    ctx.scope.push(Operation::CreateCorrectExecReport { order: ctx.order.clone(), correct: correct.clone(), order_status: OrderStatus::PartiallyFilled });
}

/// Drives one Zone A transition. Returns `Ok(next_state)`, or
/// `Err(IllegalTransition)` if no row matches `(state, event)`.
pub fn transition(state: ZoneAState, event: &StateMachineEvent, ctx: &mut ActionContext) -> Result<ZoneAState, IllegalTransition> {
    use EventKind::*;
    use ZoneAState::*;

    let next = match (state, &event.kind) {
        (RcvdNew, OrderReceived) | (RcvdNew, ExternalOrder) => New,
        (RcvdNew, RplOrderReceived { .. }) => PendReplace,
        (RcvdNew, RecvOrderRejected { .. }) | (RcvdNew, RecvRplOrderRejected { .. }) | (RcvdNew, ExternalOrderRejected { .. }) => Rejected,
        (PendReplace, Replace) => New,
        (PendReplace, RplOrderRejected { .. }) => Rejected,
        (PendReplace, RplOrderExpired) => ZoneAState::Expired,
        (New, TradeExecution { complete, .. }) | (PartFill, TradeExecution { complete, .. }) => {
            if complete.resolve(event.test_only, event.expected_guard_result) {
                Filled
            } else {
                PartFill
            }
        }
        (New, TradeCrctCncl { not_executed, .. }) | (PartFill, TradeCrctCncl { not_executed, .. }) => {
            if not_executed.resolve(event.test_only, event.expected_guard_result) {
                New
            } else {
                PartFill
            }
        }
        (Filled, TradeCrctCncl { not_executed, .. }) => {
            if not_executed.resolve(event.test_only, event.expected_guard_result) {
                New
            } else {
                PartFill
            }
        }
        (New, EventKind::Expired) | (PartFill, EventKind::Expired) | (Filled, EventKind::Expired) => ZoneAState::Expired,
        (New, Finished) | (PartFill, Finished) | (Filled, Finished) => DoneForDay,
        (New, EventKind::Suspended) | (PartFill, EventKind::Suspended) | (Filled, EventKind::Suspended) => ZoneAState::Suspended,
        (New, OrderRejected { .. }) | (PartFill, OrderRejected { .. }) | (Filled, OrderRejected { .. }) => Rejected,
        (DoneForDay, NewDay { not_executed }) => {
            if not_executed.resolve(event.test_only, event.expected_guard_result) {
                New
            } else {
                PartFill
            }
        }
        (DoneForDay, TradeCrctCncl { .. }) => DoneForDay,
        (DoneForDay, EventKind::Suspended) => ZoneAState::Suspended,
        (ZoneAState::Suspended, Continue) => {
            // Either PartFill or New depending on whether anything executed;
            // test harnesses pick via the guard, live code infers from qty.
            let has_fills = !ctx.order.read().hot.cum_qty.is_zero();
            let not_executed = super::events::Guard::new(!has_fills);
            if not_executed.resolve(event.test_only, event.expected_guard_result) {
                New
            } else {
                PartFill
            }
        }
        (ZoneAState::Suspended, EventKind::Expired) => ZoneAState::Expired,
        (ZoneAState::Suspended, Finished) => DoneForDay,
        (ZoneAState::Suspended, TradeCrctCncl { .. }) => ZoneAState::Suspended,
        (ZoneAState::Expired, TradeCrctCncl { .. }) => ZoneAState::Expired,
        (CnclReplaced, TradeCrctCncl { .. }) => CnclReplaced,
        _ => return Err(illegal(state, event)),
    };

    if event.test_only {
        return Ok(next);
    }

    match (&event.kind, next) {
        (OrderReceived, _) | (ExternalOrder, _) => accept_new_order(ctx),
        (RplOrderReceived { orig_cl_order_id }, _) => {
            if let Ok(original) = ctx.order_store.locate_by_cl_order_id(orig_cl_order_id) {
                ctx.order.write().hot.orig_order_id = original.order_id();
                ctx.scope.push(Operation::EnqueueOrderEvent {
                    order: ctx.order.clone(),
                    event: InboundEvent::ProcessEvent { kind: ProcessEventType::ReplaceReceived, order_id: original.order_id() },
                    pending_status: OrderStatus::PendingReplace,
                    kind: ExecutionKind::PendingReplace,
                });
            }
        }
        (RecvOrderRejected { reason }, _) | (RecvRplOrderRejected { reason }, _) | (ExternalOrderRejected { reason }, _) => {
            reject(ctx, reason.clone())
        }
        (Replace, _) => accept_new_order(ctx),
        (RplOrderRejected { reason }, _) => reject(ctx, reason.clone()),
        (RplOrderExpired, _) => append_status_exec(ctx, ZoneAState::Expired, ExecutionKind::Expired),
        (TradeExecution { trade, .. }, _) => apply_trade(ctx, trade),
        (TradeCrctCncl { correct, .. }, restored) => {
            apply_correction(ctx, correct);
            // Only re-enter the book when the order wasn't already resting:
            // New/PartFill stay in the book throughout a correction, but a
            // correction landing on a Filled/DoneForDay/Suspended/Expired
            // order has left the book and must be re-added.
            let was_resting = matches!(state, New | PartFill);
            if !was_resting && !restored.is_terminal() {
                let ord_type = ctx.order.read().hot.ord_type;
                if ord_type != OrdType::Market {
                    ctx.scope.push(Operation::AddToOrderBook { order: ctx.order.clone() });
                }
                ctx.scope.push(Operation::MatchOrder { order_id: ctx.order.order_id(), recorded_count: std::cell::Cell::new(0) });
            }
        }
        (EventKind::Expired, _) => append_status_exec(ctx, ZoneAState::Expired, ExecutionKind::Expired),
        (Finished, _) => append_status_exec(ctx, DoneForDay, ExecutionKind::DoneForDay),
        (EventKind::Suspended, _) => append_status_exec(ctx, ZoneAState::Suspended, ExecutionKind::Suspended),
        (OrderRejected { reason }, _) => reject(ctx, reason.clone()),
        (NewDay { .. }, restored) => append_status_exec(ctx, restored, ExecutionKind::Status),
        (Continue, restored) => append_status_exec(ctx, restored, ExecutionKind::Status),
        _ => {}
    }

    Ok(next)
}
