//! The two-zone order lifecycle state machine (spec §4.6).
//!
//! Each zone is a plain function from `(state, event)` to `(next_state,
//! action)` per the redesign guidance — no metaprogrammed transition table,
//! no virtual dispatch. A received event is routed to exactly one zone.

pub mod events;
pub mod zone_a;
pub mod zone_b;

use crate::errors::IllegalTransition;
use crate::ids::IdentifierGenerator;
use crate::order::{Order, StateMachinePersistence};
use crate::store::OrderStore;
use crate::transaction::operations::CorrectDetails;
use crate::transaction::scope::TransactionScope;

pub use events::{EventKind, Guard, StateMachineEvent};
pub use zone_a::ZoneAState;
pub use zone_b::ZoneBState;

/// Handles an [`Operation`](crate::transaction::operations::Operation) an
/// action needs: the order being driven, lookups for cross-order actions
/// (replace routing), id minting, and the scope being built up.
pub struct ActionContext<'a> {
    pub order: &'a Order,
    pub order_store: &'a OrderStore,
    pub generator: &'a IdentifierGenerator,
    pub scope: &'a mut TransactionScope,
}

fn routes_to_zone_b(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::CancelReceived { .. }
            | EventKind::ReplaceReceived { .. }
            | EventKind::Canceled
            | EventKind::InternalCancel
            | EventKind::ExecCancel
            | EventKind::ExecReplace { .. }
            | EventKind::CancelRejected { .. }
            | EventKind::ReplaceRejected { .. }
            | EventKind::ReplacedRejected { .. }
    )
}

/// Drives both zones of one order's state machine. `(zone_a, zone_b)`
/// mirror spec §3's `(stateZone1Id, stateZone2Id)` persistence tuple.
pub struct StateMachine {
    pub zone_a: ZoneAState,
    pub zone_b: ZoneBState,
}

impl StateMachine {
    pub fn initial() -> Self {
        StateMachine { zone_a: ZoneAState::RcvdNew, zone_b: ZoneBState::NoCnlReplace }
    }

    /// Restores a state machine from the persisted tuple (spec §3).
    pub fn restore(persistence: StateMachinePersistence) -> Self {
        StateMachine {
            zone_a: zone_a_from_i32(persistence.zone_a),
            zone_b: zone_b_from_i32(persistence.zone_b),
        }
    }

    pub fn persistence(&self) -> StateMachinePersistence {
        StateMachinePersistence { zone_a: self.zone_a as i32, zone_b: self.zone_b as i32 }
    }

    /// Dispatches `event` to the zone it's routed to. The other zone is
    /// left untouched — spec §4.6: "zero or one transition fires per zone."
    pub fn process(&mut self, event: &StateMachineEvent, ctx: &mut ActionContext) -> Result<(), IllegalTransition> {
        if routes_to_zone_b(&event.kind) {
            self.zone_b = zone_b::transition(self.zone_b, event, ctx)?;
        } else {
            self.zone_a = zone_a::transition(self.zone_a, event, ctx)?;
        }
        Ok(())
    }
}

fn zone_a_from_i32(value: i32) -> ZoneAState {
    match value {
        0 => ZoneAState::RcvdNew,
        1 => ZoneAState::PendNew,
        2 => ZoneAState::PendReplace,
        3 => ZoneAState::New,
        4 => ZoneAState::PartFill,
        5 => ZoneAState::Filled,
        6 => ZoneAState::Expired,
        7 => ZoneAState::DoneForDay,
        8 => ZoneAState::Suspended,
        9 => ZoneAState::Rejected,
        _ => ZoneAState::CnclReplaced,
    }
}

fn zone_b_from_i32(value: i32) -> ZoneBState {
    match value {
        0 => ZoneBState::NoCnlReplace,
        1 => ZoneBState::GoingCancel,
        2 => ZoneBState::GoingReplace,
        _ => ZoneBState::CnclReplaced,
    }
}

/// Builds a [`CorrectDetails`] payload; kept here so processor call sites
/// don't need to reach into `transaction::operations` directly.
pub fn correct_details(
    cum_qty: crate::fixed_point::Quantity,
    leaves_qty: crate::fixed_point::Quantity,
    last_qty: crate::fixed_point::Quantity,
    last_px: crate::fixed_point::Price,
    currency: String,
    trade_date: u32,
    orig_order_id: crate::ids::Id,
    exec_ref_id: crate::ids::Id,
) -> CorrectDetails {
    CorrectDetails { cum_qty, leaves_qty, last_qty, last_px, currency, trade_date, orig_order_id, exec_ref_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Trade;
    use crate::fixed_point::{Price, Quantity};
    use crate::ids::Id;
    use crate::order::{Capacity, ColdFields, HotFields, OrdType, OrderData, OrderStatus, Side, TimeInForce, WarmFields};
    use std::sync::Arc;

    fn sample_order(order_qty: Quantity) -> Order {
        Order::new(OrderData {
            hot: HotFields {
                order_id: Id::new(1, 0),
                orig_order_id: Id::INVALID,
                price: Price::from(10),
                status: OrderStatus::PendingNew,
                side: Side::Buy,
                ord_type: OrdType::Limit,
                leaves_qty: order_qty,
                cum_qty: Quantity::ZERO,
                order_qty,
                tif: TimeInForce::Day,
            },
            warm: WarmFields {
                stop_px: None,
                avg_px: Price::ZERO,
                day_avg_px: Price::ZERO,
                creation_time: 0,
                last_update_time: 0,
                expire_time: None,
                settl_date: None,
                settl_type: None,
                capacity: Capacity::Principal,
                currency: "USD".into(),
                min_qty: None,
                day_order_qty: order_qty,
                day_cum_qty: Quantity::ZERO,
                state_machine_persistence: StateMachinePersistence::default(),
            },
            cold: ColdFields {
                instrument: Id::new(2, 0),
                account: Id::INVALID,
                clearing: Id::INVALID,
                destination: Id::INVALID,
                exec_instructions: None,
                cl_order_id: "CL1".into(),
                orig_cl_order_id: None,
                source: Id::INVALID,
                executions: Vec::new(),
            },
        })
    }

    fn harness() -> (StateMachine, OrderStore, IdentifierGenerator, TransactionScope, crate::book::OrderBook) {
        let generator = IdentifierGenerator::new();
        let store = OrderStore::new(Arc::new(IdentifierGenerator::new()));
        let book = crate::book::OrderBook::new();
        book.register_instrument(Id::new(2, 0));
        (StateMachine::initial(), store, generator, TransactionScope::new(), book)
    }

    #[test]
    fn order_received_moves_rcvd_new_to_new_and_appends_book_and_match_ops() {
        let (mut sm, store, generator, mut scope, _book) = harness();
        let order = sample_order(Quantity::from(5));
        store.save(order.clone()).unwrap();
        let event = StateMachineEvent::real(EventKind::OrderReceived);
        let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
        sm.process(&event, &mut ctx).unwrap();
        assert_eq!(sm.zone_a, ZoneAState::New);
        assert_eq!(scope.len(), 3); // exec report, add-to-book, match-order
    }

    #[test]
    fn illegal_transition_is_reported_for_unmatched_row() {
        let (mut sm, store, generator, mut scope, _book) = harness();
        let order = sample_order(Quantity::from(5));
        let event = StateMachineEvent::real(EventKind::ExecCancel);
        // ExecCancel routes to zone B; NoCnlReplace has no row for it.
        let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
        let err = sm.process(&event, &mut ctx).unwrap_err();
        assert_eq!(err.event, "ExecCancel");
    }

    #[test]
    fn test_only_event_transitions_state_without_appending_operations() {
        let (mut sm, store, generator, mut scope, _book) = harness();
        let order = sample_order(Quantity::from(5));
        let event = StateMachineEvent::real(EventKind::OrderReceived);
        {
            let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
            sm.process(&event, &mut ctx).unwrap();
        }
        scope.reset();
        let trade_event = StateMachineEvent::test(
            EventKind::TradeExecution { trade: Trade { active: order.order_id(), candidate: Id::new(3, 0), qty: Quantity::from(5), px: Price::from(10) }, complete: Guard::new(true) },
            true,
        );
        let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
        sm.process(&trade_event, &mut ctx).unwrap();
        assert_eq!(sm.zone_a, ZoneAState::Filled);
        assert!(scope.is_empty());
    }

    #[test]
    fn cancel_flow_reaches_cnclreplaced_via_zone_b() {
        let (mut sm, store, generator, mut scope, _book) = harness();
        let order = sample_order(Quantity::from(5));
        let cancel_received = StateMachineEvent::real(EventKind::CancelReceived { acceptable: Guard::new(true) });
        {
            let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
            sm.process(&cancel_received, &mut ctx).unwrap();
        }
        assert_eq!(sm.zone_b, ZoneBState::GoingCancel);
        let exec_cancel = StateMachineEvent::real(EventKind::ExecCancel);
        let mut ctx = ActionContext { order: &order, order_store: &store, generator: &generator, scope: &mut scope };
        sm.process(&exec_cancel, &mut ctx).unwrap();
        assert_eq!(sm.zone_b, ZoneBState::CnclReplaced);
    }
}
