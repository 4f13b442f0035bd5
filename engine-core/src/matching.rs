//! Opposite-side matching against the order book (spec §4.5).

use std::collections::VecDeque;

use crate::book::OrderBook;
use crate::deferred::{DeferedEvent, Trade};
use crate::errors::{BookError, OrderStoreError};
use crate::ids::Id;
use crate::order::{OrdType, Side};
use crate::store::OrderStore;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] OrderStoreError),
    #[error(transparent)]
    Book(#[from] BookError),
}

pub struct OrderMatcher;

impl OrderMatcher {
    pub fn new() -> Self {
        OrderMatcher
    }

    /// Attempts to cross `order_id` against the opposite side of its
    /// instrument's book, appending any resulting deferred events.
    pub fn match_order(
        &self,
        order_id: Id,
        store: &OrderStore,
        book: &OrderBook,
        deferred: &mut VecDeque<DeferedEvent>,
    ) -> Result<(), MatchError> {
        let active = store.locate_by_order_id(order_id)?;
        let (instrument, side, active_ord_type) = {
            let data = active.read();
            (data.cold.instrument, data.hot.side, data.hot.ord_type)
        };
        let opposite_side = side.opposite();

        let mut matched_candidate: Option<Id> = None;
        book.find(instrument, opposite_side, |candidate_id| {
            let candidate = match store.locate_by_order_id(candidate_id) {
                Ok(c) => c,
                Err(_) => return (false, false),
            };
            let candidate_data = candidate.read();
            if candidate_data.hot.leaves_qty.is_zero() {
                return (false, false);
            }
            if active_ord_type == OrdType::Market || candidate_data.hot.ord_type == OrdType::Market {
                matched_candidate = Some(candidate_id);
                return (true, false);
            }
            let active_data = active.read();
            let (buyer_px, seller_px) = match side {
                Side::Buy => (active_data.hot.price, candidate_data.hot.price),
                Side::Sell => (candidate_data.hot.price, active_data.hot.price),
            };
            if buyer_px >= seller_px {
                matched_candidate = Some(candidate_id);
                (true, false)
            } else {
                // Prices are sorted; no later candidate can cross either.
                (false, true)
            }
        })?;

        let Some(candidate_id) = matched_candidate else {
            if active_ord_type == OrdType::Market {
                deferred.push_back(DeferedEvent::CancelOrderDeferedEvent {
                    order: order_id,
                    reason: "no market".to_string(),
                });
            }
            return Ok(());
        };

        let candidate = store.locate_by_order_id(candidate_id)?;
        let (active_leaves, candidate_leaves, candidate_px) = {
            let a = active.read();
            let c = candidate.read();
            (a.hot.leaves_qty, c.hot.leaves_qty, c.hot.price)
        };
        let trade_qty = active_leaves.min(candidate_leaves);
        let trade = Trade { active: order_id, candidate: candidate_id, qty: trade_qty, px: candidate_px };

        deferred.push_back(DeferedEvent::ExecutionDeferedEvent { base_order: order_id, trades: vec![trade] });

        if active_leaves.checked_sub(trade_qty).map(|r| !r.is_zero()).unwrap_or(false) {
            deferred.push_back(DeferedEvent::MatchOrderDeferedEvent { order: order_id });
        }

        Ok(())
    }
}

impl Default for OrderMatcher {
    fn default() -> Self {
        Self::new()
    }
}
