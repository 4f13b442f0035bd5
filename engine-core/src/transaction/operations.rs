//! Reversible transaction operations (spec §4.7).
//!
//! Operations are a tagged enum, not a trait-object hierarchy, per the
//! redesign guidance: the dispatch is a small `match` and the win is real
//! on this hot path.

use std::cell::Cell;
use std::collections::VecDeque;

use crate::book::OrderBook;
use crate::deferred::{DeferedEvent, Trade};
use crate::errors::TransactionError;
use crate::ids::{Id, IdentifierGenerator};
use crate::matching::{MatchError, OrderMatcher};
use crate::order::{Execution, ExecutionKind, Order, OrderStatus};
use crate::outbound::{OutboundEvent, OutboundQueue};
use crate::queue::{InboundEvent, InputQueue};
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct CorrectDetails {
    pub cum_qty: crate::fixed_point::Quantity,
    pub leaves_qty: crate::fixed_point::Quantity,
    pub last_qty: crate::fixed_point::Quantity,
    pub last_px: crate::fixed_point::Price,
    pub currency: String,
    pub trade_date: u32,
    pub orig_order_id: Id,
    pub exec_ref_id: Id,
}

/// Shared handles an [`Operation`] needs to execute or roll back. Borrowed
/// for the lifetime of one `executeTransaction` call.
pub struct OperationContext<'a> {
    pub generator: &'a IdentifierGenerator,
    pub order_store: &'a OrderStore,
    pub order_book: &'a OrderBook,
    pub matcher: &'a OrderMatcher,
    pub outbound: &'a OutboundQueue,
    pub input_queue: &'a InputQueue,
    pub deferred: &'a mut VecDeque<DeferedEvent>,
    pub now: u64,
}

pub enum Operation {
    /// Generic status-only exec report (New, Expired, Suspended,
    /// DoneForDay, PendingReplace, Restated, Status): `kind` carries the
    /// [`ExecutionKind`] to persist.
    CreateExecReport { order: Order, order_status: OrderStatus, kind: ExecutionKind },
    CreateTradeExecReport { order: Order, trade: Trade, order_status: OrderStatus },
    CreateRejectExecReport { order: Order, reason: String, order_status: OrderStatus },
    CreateReplaceExecReport { order: Order, orig_order_id: Id, order_status: OrderStatus },
    CreateCorrectExecReport { order: Order, correct: CorrectDetails, order_status: OrderStatus },
    AddToOrderBook { order: Order },
    RemoveFromOrderBook { order: Order },
    EnqueueOrderEvent { order: Order, event: InboundEvent, pending_status: OrderStatus, kind: ExecutionKind },
    CancelReject { order_id: Id, reason: String },
    /// Records the deferred-event count it saw at execute time so rollback
    /// can truncate the list back to that point.
    MatchOrder { order_id: Id, recorded_count: Cell<usize> },
}

impl Operation {
    /// Primary and related object ids, used by the transaction manager's
    /// dependency graph (spec §4.9).
    pub fn touched_ids(&self) -> Vec<Id> {
        match self {
            Operation::CreateExecReport { order, .. }
            | Operation::CreateTradeExecReport { order, .. }
            | Operation::CreateRejectExecReport { order, .. }
            | Operation::CreateReplaceExecReport { order, .. }
            | Operation::CreateCorrectExecReport { order, .. }
            | Operation::AddToOrderBook { order }
            | Operation::RemoveFromOrderBook { order }
            | Operation::EnqueueOrderEvent { order, .. } => vec![order.order_id()],
            Operation::CancelReject { order_id, .. } | Operation::MatchOrder { order_id, .. } => vec![*order_id],
        }
    }
}

fn save_execution(
    ctx: &mut OperationContext<'_>,
    order: &Order,
    order_status: OrderStatus,
    kind: ExecutionKind,
) -> Result<(), TransactionError> {
    let exec_id = ctx.generator.next();
    let execution = Execution { exec_id, order_id: order.order_id(), transact_time: ctx.now, order_status, market: "VENUE".to_string(), kind };
    let saved = ctx.order_store.save_execution(execution)?;
    {
        let mut data = order.write();
        data.hot.status = order_status;
        data.cold.executions.push(saved.exec_id);
    }
    ctx.outbound.push(OutboundEvent::ExecReportEvent { exec: saved });
    Ok(())
}

pub fn execute_operation(op: &Operation, ctx: &mut OperationContext<'_>) -> Result<(), TransactionError> {
    match op {
        Operation::CreateExecReport { order, order_status, kind } => {
            save_execution(ctx, order, *order_status, kind.clone())
        }
        Operation::CreateTradeExecReport { order, trade, order_status } => {
            let currency = order.read().warm.currency.clone();
            save_execution(
                ctx,
                order,
                *order_status,
                ExecutionKind::Trade { last_qty: trade.qty, last_px: trade.px, currency, trade_date: ctx.now as u32 },
            )
        }
        Operation::CreateRejectExecReport { order, reason, order_status } => {
            save_execution(ctx, order, *order_status, ExecutionKind::Reject { reason: reason.clone() })
        }
        Operation::CreateReplaceExecReport { order, orig_order_id, order_status } => {
            save_execution(ctx, order, *order_status, ExecutionKind::Replace { orig_order_id: *orig_order_id })
        }
        Operation::CreateCorrectExecReport { order, correct, order_status } => save_execution(
            ctx,
            order,
            *order_status,
            ExecutionKind::Correct {
                cum_qty: correct.cum_qty,
                leaves_qty: correct.leaves_qty,
                last_qty: correct.last_qty,
                last_px: correct.last_px,
                currency: correct.currency.clone(),
                trade_date: correct.trade_date,
                orig_order_id: correct.orig_order_id,
                exec_ref_id: correct.exec_ref_id,
            },
        ),
        Operation::AddToOrderBook { order } => {
            let (instrument, side, price) = {
                let data = order.read();
                (data.cold.instrument, data.hot.side, data.hot.price)
            };
            ctx.order_book.add(instrument, side, price, order.order_id())?;
            Ok(())
        }
        Operation::RemoveFromOrderBook { order } => {
            let (instrument, side, price) = {
                let data = order.read();
                (data.cold.instrument, data.hot.side, data.hot.price)
            };
            ctx.order_book.remove(instrument, side, price, order.order_id())?;
            Ok(())
        }
        Operation::EnqueueOrderEvent { order, event, pending_status, kind } => {
            ctx.input_queue.push("internal", event.clone());
            save_execution(ctx, order, *pending_status, kind.clone())
        }
        Operation::CancelReject { order_id, reason } => {
            ctx.outbound.push(OutboundEvent::CancelRejectEvent { order_id: *order_id, reason: reason.clone() });
            Ok(())
        }
        Operation::MatchOrder { order_id, recorded_count } => {
            recorded_count.set(ctx.deferred.len());
            ctx.matcher
                .match_order(*order_id, ctx.order_store, ctx.order_book, ctx.deferred)
                .map_err(|e| match e {
                    MatchError::Store(e) => TransactionError::Store(e),
                    MatchError::Book(e) => TransactionError::Book(e),
                })?;
            Ok(())
        }
    }
}

/// Undoes `op`. Errors during rollback are swallowed by the caller (spec
/// §4.7: "swallowing any rollback exception to preserve best-effort
/// recovery"); exec-report emissions are intentionally non-reversible.
pub fn rollback_operation(op: &Operation, ctx: &mut OperationContext<'_>) {
    match op {
        Operation::AddToOrderBook { order } => {
            let (instrument, side, price) = {
                let data = order.read();
                (data.cold.instrument, data.hot.side, data.hot.price)
            };
            let _ = ctx.order_book.remove(instrument, side, price, order.order_id());
        }
        Operation::RemoveFromOrderBook { order } => {
            let (instrument, side, price) = {
                let data = order.read();
                (data.cold.instrument, data.hot.side, data.hot.price)
            };
            let _ = ctx.order_book.add(instrument, side, price, order.order_id());
        }
        Operation::MatchOrder { recorded_count, .. } => {
            ctx.deferred.truncate(recorded_count.get());
        }
        Operation::CreateExecReport { .. }
        | Operation::CreateTradeExecReport { .. }
        | Operation::CreateRejectExecReport { .. }
        | Operation::CreateReplaceExecReport { .. }
        | Operation::CreateCorrectExecReport { .. }
        | Operation::EnqueueOrderEvent { .. }
        | Operation::CancelReject { .. } => {
            // Emit-only: already posted to the outbound queue, may have
            // been observed. Not reversible.
        }
    }
}
