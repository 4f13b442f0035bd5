//! State-machine event variants (spec §4.6).

use crate::deferred::Trade;
use crate::ids::Id;
use crate::transaction::operations::CorrectDetails;

/// A guarded boolean: either the real, computed value, or — when the
/// event's `test_only` flag is set — a canned value so a test harness can
/// exercise the transition graph without touching real order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    real: bool,
}

impl Guard {
    pub fn new(real: bool) -> Self {
        Guard { real }
    }

    pub fn resolve(self, test_only: bool, expected_guard_result: bool) -> bool {
        if test_only {
            expected_guard_result
        } else {
            self.real
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventKind {
    OrderReceived,
    RplOrderReceived { orig_cl_order_id: String },
    RecvOrderRejected { reason: String },
    RecvRplOrderRejected { reason: String },
    ExternalOrder,
    ExternalOrderRejected { reason: String },
    OrderRejected { reason: String },
    RplOrderRejected { reason: String },
    Replace,
    TradeExecution { trade: Trade, complete: Guard },
    TradeCrctCncl { correct: CorrectDetails, not_executed: Guard },
    Expired,
    RplOrderExpired,
    CancelReceived { acceptable: Guard },
    ReplaceReceived { repl_id: Id },
    Canceled,
    InternalCancel,
    ExecCancel,
    ExecReplace { repl_id: Id },
    NewDay { not_executed: Guard },
    Continue,
    Suspended,
    Finished,
    CancelRejected { reason: String },
    ReplaceRejected { reason: String },
    ReplacedRejected { reason: String },
}

/// The event carries the generator/store/scope/book through [`super::ActionContext`]
/// rather than on the event itself; the struct here is just the
/// variant plus the test-harness override flags (spec §4.6).
#[derive(Debug, Clone)]
pub struct StateMachineEvent {
    pub kind: EventKind,
    pub test_only: bool,
    pub expected_guard_result: bool,
}

impl StateMachineEvent {
    pub fn real(kind: EventKind) -> Self {
        StateMachineEvent { kind, test_only: false, expected_guard_result: false }
    }

    pub fn test(kind: EventKind, expected_guard_result: bool) -> Self {
        StateMachineEvent { kind, test_only: true, expected_guard_result }
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            EventKind::OrderReceived => "OrderReceived",
            EventKind::RplOrderReceived { .. } => "RplOrderReceived",
            EventKind::RecvOrderRejected { .. } => "RecvOrderRejected",
            EventKind::RecvRplOrderRejected { .. } => "RecvRplOrderRejected",
            EventKind::ExternalOrder => "ExternalOrder",
            EventKind::ExternalOrderRejected { .. } => "ExternalOrderRejected",
            EventKind::OrderRejected { .. } => "OrderRejected",
            EventKind::RplOrderRejected { .. } => "RplOrderRejected",
            EventKind::Replace => "Replace",
            EventKind::TradeExecution { .. } => "TradeExecution",
            EventKind::TradeCrctCncl { .. } => "TradeCrctCncl",
            EventKind::Expired => "Expired",
            EventKind::RplOrderExpired => "RplOrderExpired",
            EventKind::CancelReceived { .. } => "CancelReceived",
            EventKind::ReplaceReceived { .. } => "ReplaceReceived",
            EventKind::Canceled => "Canceled",
            EventKind::InternalCancel => "InternalCancel",
            EventKind::ExecCancel => "ExecCancel",
            EventKind::ExecReplace { .. } => "ExecReplace",
            EventKind::NewDay { .. } => "NewDay",
            EventKind::Continue => "Continue",
            EventKind::Suspended => "Suspended",
            EventKind::Finished => "Finished",
            EventKind::CancelRejected { .. } => "CancelRejected",
            EventKind::ReplaceRejected { .. } => "ReplaceRejected",
            EventKind::ReplacedRejected { .. } => "ReplacedRejected",
        }
    }
}
