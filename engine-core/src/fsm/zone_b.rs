//! Zone B: the cancel/replace sub-state machine (spec §4.6).

use crate::errors::IllegalTransition;
use crate::order::ExecutionKind;
use crate::order::OrderStatus;
use crate::queue::{InboundEvent, ProcessEventType};
use crate::transaction::operations::Operation;

use super::events::{EventKind, StateMachineEvent};
use super::ActionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i32)]
pub enum ZoneBState {
    NoCnlReplace = 0,
    GoingCancel = 1,
    GoingReplace = 2,
    /// Terminal: the order was internally cancelled or finished
    /// replacing, independent of Zone A's own terminal states.
    CnclReplaced = 3,
}

fn illegal(state: ZoneBState, event: &StateMachineEvent) -> IllegalTransition {
    IllegalTransition { state: state as i32 + 100, event: event.name() }
}

fn still_resting(ctx: &ActionContext) -> bool {
    let data = ctx.order.read();
    data.hot.ord_type != crate::order::OrdType::Market && !data.hot.leaves_qty.is_zero()
}

pub fn transition(state: ZoneBState, event: &StateMachineEvent, ctx: &mut ActionContext) -> Result<ZoneBState, IllegalTransition> {
    use EventKind::*;
    use ZoneBState::*;

    let next = match (state, &event.kind) {
        (NoCnlReplace, CancelReceived { acceptable }) => {
            if acceptable.resolve(event.test_only, event.expected_guard_result) {
                GoingCancel
            } else {
                return Err(illegal(state, event));
            }
        }
        (NoCnlReplace, ReplaceReceived { .. }) => GoingReplace,
        (NoCnlReplace, InternalCancel) => CnclReplaced,
        (GoingCancel, ExecCancel) | (GoingCancel, Canceled) => CnclReplaced,
        (GoingCancel, CancelRejected { .. }) => NoCnlReplace,
        (GoingReplace, ExecReplace { .. }) => CnclReplaced,
        (GoingReplace, ReplaceRejected { .. }) | (GoingReplace, ReplacedRejected { .. }) => NoCnlReplace,
        _ => return Err(illegal(state, event)),
    };

    if event.test_only {
        return Ok(next);
    }

    match &event.kind {
        CancelReceived { .. } => {
            // The venue matches its own orders, so it also confirms its own
            // cancels: stage the pending exec report and self-post the
            // completing event rather than waiting on an external ack.
            ctx.scope.push(Operation::EnqueueOrderEvent {
                order: ctx.order.clone(),
                event: InboundEvent::ProcessEvent { kind: ProcessEventType::ExecCancel, order_id: ctx.order.order_id() },
                pending_status: OrderStatus::PendingNew,
                kind: ExecutionKind::PendingCancel,
            });
        }
        ReplaceReceived { repl_id } => {
            // As with cancel, the venue confirms its own replace: stage the
            // pending exec report and self-post the completing event,
            // carrying the accepted replacement's id through untouched.
            ctx.scope.push(Operation::EnqueueOrderEvent {
                order: ctx.order.clone(),
                event: InboundEvent::ProcessEvent { kind: ProcessEventType::ExecReplace { repl_id: *repl_id }, order_id: ctx.order.order_id() },
                pending_status: OrderStatus::PendingReplace,
                kind: ExecutionKind::PendingReplace,
            });
        }
        CancelRejected { reason } => {
            ctx.scope.push(Operation::CancelReject { order_id: ctx.order.order_id(), reason: reason.clone() });
        }
        ExecCancel | Canceled | InternalCancel => {
            ctx.scope.push(Operation::CreateExecReport {
                order: ctx.order.clone(),
                order_status: OrderStatus::CancelledOrReplaced,
                kind: ExecutionKind::Cancel { exec_ref_id: crate::ids::Id::INVALID },
            });
            if still_resting(ctx) {
                ctx.scope.push(Operation::RemoveFromOrderBook { order: ctx.order.clone() });
            }
        }
        ExecReplace { repl_id } => {
            ctx.scope.push(Operation::CreateReplaceExecReport {
                order: ctx.order.clone(),
                orig_order_id: *repl_id,
                order_status: OrderStatus::CancelledOrReplaced,
            });
            if still_resting(ctx) {
                ctx.scope.push(Operation::RemoveFromOrderBook { order: ctx.order.clone() });
            }
        }
        ReplaceRejected { reason } | ReplacedRejected { reason } => {
            ctx.scope.push(Operation::CancelReject { order_id: ctx.order.order_id(), reason: reason.clone() });
        }
        _ => {}
    }

    Ok(next)
}
