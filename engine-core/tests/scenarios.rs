//! End-to-end scenarios driving a live [`Engine`] through its input queue
//! and worker pools, rather than calling `Processor` methods directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_core::fixed_point::{Price, Quantity};
use engine_core::ids::{Id, IdentifierGenerator};
use engine_core::order::{
    Capacity, ColdFields, HotFields, OrdType, Order, OrderData, OrderStatus, Side, StateMachinePersistence, TimeInForce, WarmFields,
};
use engine_core::queue::InboundEvent;
use engine_core::Engine;

fn new_order(order_id: Id, instrument: Id, side: Side, ord_type: OrdType, price: Price, qty: Quantity, cl: &str) -> Order {
    Order::new(OrderData {
        hot: HotFields {
            order_id,
            orig_order_id: Id::INVALID,
            price,
            status: OrderStatus::PendingNew,
            side,
            ord_type,
            leaves_qty: qty,
            cum_qty: Quantity::ZERO,
            order_qty: qty,
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
            day_order_qty: qty,
            day_cum_qty: Quantity::ZERO,
            state_machine_persistence: StateMachinePersistence::default(),
        },
        cold: ColdFields {
            instrument,
            account: Id::INVALID,
            clearing: Id::INVALID,
            destination: Id::INVALID,
            exec_instructions: None,
            cl_order_id: cl.into(),
            orig_cl_order_id: None,
            source: Id::INVALID,
            executions: Vec::new(),
        },
    })
}

fn register_instrument(engine: &Engine, symbol: &str) -> Id {
    let id = engine.reference_store.add_instrument(symbol, "", "");
    engine.order_book.register_instrument(id);
    id
}

fn wait_for<F: Fn() -> bool>(deadline: Duration, predicate: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    predicate()
}

/// S1 — Simple crossing LIMIT pair.
#[test]
fn s1_simple_crossing_limit_pair_fully_fills_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    engine.start(2);
    let instrument = register_instrument(&engine, "AAPL");
    let input = engine.input_queue().unwrap();

    let sell_id = engine.generator.next();
    let sell = engine.order_store.save(new_order(sell_id, instrument, Side::Sell, OrdType::Limit, Price::from(10), Quantity::from(5), "S1")).unwrap();
    input.push("test", InboundEvent::OrderEvent { order: sell.clone() });

    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::New)
    }));

    let buy_id = engine.generator.next();
    let buy = engine.order_store.save(new_order(buy_id, instrument, Side::Buy, OrdType::Limit, Price::from(10), Quantity::from(5), "B1")).unwrap();
    input.push("test", InboundEvent::OrderEvent { order: buy.clone() });

    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(buy_id).map(|o| o.read().hot.status) == Ok(OrderStatus::Filled)
            && engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::Filled)
    }));

    let sell = engine.order_store.locate_by_order_id(sell_id).unwrap();
    let buy = engine.order_store.locate_by_order_id(buy_id).unwrap();
    assert_eq!(sell.read().hot.leaves_qty, Quantity::ZERO);
    assert_eq!(sell.read().hot.cum_qty, Quantity::from(5));
    assert_eq!(buy.read().hot.leaves_qty, Quantity::ZERO);
    assert_eq!(buy.read().hot.cum_qty, Quantity::from(5));

    engine.shutdown();
}

/// S2 — MARKET order with no resting liquidity never enters the book and
/// is internally cancelled by the matcher's no-liquidity path (the venue
/// cancels its own unmatchable order; it never rejects it).
#[test]
fn s2_market_order_without_book_is_internally_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    engine.start(2);
    let instrument = register_instrument(&engine, "MSFT");
    let input = engine.input_queue().unwrap();

    let order_id = engine.generator.next();
    let order = engine.order_store.save(new_order(order_id, instrument, Side::Buy, OrdType::Market, Price::ZERO, Quantity::from(10), "M1")).unwrap();
    input.push("test", InboundEvent::OrderEvent { order });

    assert!(wait_for(Duration::from_secs(2), || {
        matches!(engine.order_store.locate_by_order_id(order_id).map(|o| o.read().hot.status), Ok(OrderStatus::CancelledOrReplaced))
    }));

    assert_eq!(engine.order_book.top(instrument, Side::Buy).unwrap(), None);

    engine.shutdown();
}

/// S3 — Partial fill then cancel.
#[test]
fn s3_partial_fill_then_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    engine.start(2);
    let instrument = register_instrument(&engine, "TSLA");
    let input = engine.input_queue().unwrap();

    let sell_id = engine.generator.next();
    let sell = engine.order_store.save(new_order(sell_id, instrument, Side::Sell, OrdType::Limit, Price::from(50), Quantity::from(100), "S1")).unwrap();
    input.push("test", InboundEvent::OrderEvent { order: sell.clone() });
    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::New)
    }));

    let buy_id = engine.generator.next();
    let buy = engine.order_store.save(new_order(buy_id, instrument, Side::Buy, OrdType::Limit, Price::from(50), Quantity::from(30), "B1")).unwrap();
    input.push("test", InboundEvent::OrderEvent { order: buy });

    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(buy_id).map(|o| o.read().hot.status) == Ok(OrderStatus::Filled)
            && engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::PartiallyFilled)
    }));

    let sell = engine.order_store.locate_by_order_id(sell_id).unwrap();
    assert_eq!(sell.read().hot.leaves_qty, Quantity::from(70));
    assert_eq!(sell.read().hot.cum_qty, Quantity::from(30));

    input.push("test", InboundEvent::OrderCancelEvent { order_id: sell_id, reason: "done".into() });
    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::CancelledOrReplaced)
    }));
    assert_eq!(engine.order_book.top(instrument, Side::Sell).unwrap(), None);

    engine.shutdown();
}

/// S4 — Replace accepted: the original transitions to `CnclReplaced` with a
/// Replace exec, and the replacement enters `New` at its own price, becoming
/// the new best bid.
#[test]
fn s4_replace_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    engine.start(2);
    let instrument = register_instrument(&engine, "GOOG");
    let input = engine.input_queue().unwrap();

    let orig_id = engine.generator.next();
    let orig = engine
        .order_store
        .save(new_order(orig_id, instrument, Side::Buy, OrdType::Limit, Price::from(20), Quantity::from(50), "O1"))
        .unwrap();
    input.push("test", InboundEvent::OrderEvent { order: orig });
    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(orig_id).map(|o| o.read().hot.status) == Ok(OrderStatus::New)
    }));

    let repl_id = engine.generator.next();
    let repl = engine
        .order_store
        .save(new_order(repl_id, instrument, Side::Buy, OrdType::Limit, Price::from(21), Quantity::from(50), "R1"))
        .unwrap();
    input.push("test", InboundEvent::OrderReplaceEvent { order_id: orig_id, replacement: Some(repl) });

    assert!(wait_for(Duration::from_secs(2), || {
        engine.order_store.locate_by_order_id(orig_id).map(|o| o.read().hot.status) == Ok(OrderStatus::CancelledOrReplaced)
            && engine.order_store.locate_by_order_id(repl_id).map(|o| o.read().hot.status) == Ok(OrderStatus::New)
    }));

    assert_eq!(engine.order_book.top(instrument, Side::Buy).unwrap(), Some(repl_id));
    let repl = engine.order_store.locate_by_order_id(repl_id).unwrap();
    assert_eq!(repl.read().hot.price, Price::from(21));

    engine.shutdown();
}

/// S6 — Concurrent pressure: a burst of alternating buy/sell limit orders
/// across two instruments produces trades and leaves every order in a
/// terminal or resting state with no deadlock.
#[test]
fn s6_concurrent_pressure_settles_without_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    engine.start(2);
    let a = register_instrument(&engine, "AAA");
    let b = register_instrument(&engine, "BBB");
    let input = engine.input_queue().unwrap();

    let generator = IdentifierGenerator::new();
    let order_ids: Vec<Id> = (0..200)
        .map(|i| {
            let instrument = if i % 2 == 0 { a } else { b };
            let side = if i % 4 < 2 { Side::Buy } else { Side::Sell };
            let price = Price::from(10 + (i % 5));
            let order_id = generator.next();
            let order = engine
                .order_store
                .save(new_order(order_id, instrument, side, OrdType::Limit, price, Quantity::from(1), &format!("C{i}")))
                .unwrap();
            input.push("test", InboundEvent::OrderEvent { order });
            order_id
        })
        .collect();

    let settled = wait_for(Duration::from_secs(60), || {
        order_ids.iter().all(|id| {
            engine.order_store.locate_by_order_id(*id).map(|o| {
                let status = o.read().hot.status;
                matches!(status, OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::Filled | OrderStatus::Rejected)
            }) == Ok(true)
        })
    });
    assert!(settled, "orders did not settle into a terminal or resting state within the deadline");
    assert!(engine.metrics.orders().trades_total.get() > 0, "expected at least one trade under pressure");

    engine.shutdown();
}

/// S5 — Recovery round-trip: a fully-filled pair of orders neither
/// re-enters the book after a restart, but both remain locatable.
#[test]
fn s5_recovery_round_trip_preserves_filled_orders_out_of_book() {
    let dir = tempfile::tempdir().unwrap();
    let (sell_id, buy_id, instrument) = {
        let mut engine = Engine::open(dir.path()).unwrap();
        engine.start(1);
        let instrument = register_instrument(&engine, "AAPL");
        let input = engine.input_queue().unwrap();

        let sell_id = engine.generator.next();
        let sell = engine.order_store.save(new_order(sell_id, instrument, Side::Sell, OrdType::Limit, Price::from(10), Quantity::from(5), "S1")).unwrap();
        input.push("test", InboundEvent::OrderEvent { order: sell });
        assert!(wait_for(Duration::from_secs(2), || {
            engine.order_store.locate_by_order_id(sell_id).map(|o| o.read().hot.status) == Ok(OrderStatus::New)
        }));

        let buy_id = engine.generator.next();
        let buy = engine.order_store.save(new_order(buy_id, instrument, Side::Buy, OrdType::Limit, Price::from(10), Quantity::from(5), "B1")).unwrap();
        input.push("test", InboundEvent::OrderEvent { order: buy });
        assert!(wait_for(Duration::from_secs(2), || {
            engine.order_store.locate_by_order_id(buy_id).map(|o| o.read().hot.status) == Ok(OrderStatus::Filled)
        }));

        engine.shutdown();
        (sell_id, buy_id, instrument)
    };

    let engine = Engine::open(dir.path()).unwrap();
    assert_eq!(engine.recovery.instruments_loaded, 1);
    assert!(engine.order_store.locate_by_order_id(sell_id).is_ok());
    assert!(engine.order_store.locate_by_order_id(buy_id).is_ok());
    assert_eq!(engine.order_book.top(instrument, Side::Buy).unwrap(), None);
    assert_eq!(engine.order_book.top(instrument, Side::Sell).unwrap(), None);
}
