//! Deferred events: follow-on state-machine events queued while processing
//! a primary event, each run in its own transaction (spec §3, §4.11).

use crate::fixed_point::{Price, Quantity};
use crate::ids::Id;

/// One leg of a match: the resting `candidate` crossed by the `active`
/// (aggressing) order.
#[derive(Debug, Clone, Copy)]
pub struct Trade {
    pub active: Id,
    pub candidate: Id,
    pub qty: Quantity,
    pub px: Price,
}

#[derive(Debug, Clone)]
pub enum DeferedEvent {
    /// Fires a `TradeExecution` event for the base order and every trade
    /// leg it participated in.
    ExecutionDeferedEvent { base_order: Id, trades: Vec<Trade> },
    /// Re-enters the matcher for an order whose `leavesQty` is still
    /// positive after its most recent trade.
    MatchOrderDeferedEvent { order: Id },
    /// Cancels an order that could not be matched (e.g. a `MARKET` order
    /// with no opposite-side liquidity).
    CancelOrderDeferedEvent { order: Id, reason: String },
}
