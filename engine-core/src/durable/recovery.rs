//! Two-phase startup recovery (spec §4.13).
//!
//! Phase 1 replays the log with no order book bound, populating the
//! reference store and collecting every instrument id the book will need
//! to be registered for. Phase 2 re-opens (or reuses) the log with a bound
//! [`OrderBook`] and replays orders, re-deriving book membership from each
//! order's restored state rather than persisting it separately.

use std::sync::Arc;

use crate::book::OrderBook;
use crate::errors::RecoveryError;
use crate::ids::{Id, IdentifierGenerator};
use crate::order::{Order, OrderStatus};
use crate::reference::ReferenceStore;
use crate::store::OrderStore;

use super::dispatcher::{decode, Record};
use super::log::DurableLog;

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub instruments_loaded: u64,
    pub accounts_loaded: u64,
    pub orders_loaded: u64,
    pub executions_loaded: u64,
    pub orders_rebooked: u64,
    pub highest_id_seen: Id,
}

fn note_highest(report: &mut RecoveryReport, id: Id) {
    if id > report.highest_id_seen {
        report.highest_id_seen = id;
    }
}

/// Phase 1: reference entities only. No order is inserted into a book
/// because none is bound yet — orders are buffered and handed to phase 2.
fn replay_reference(log: &dyn DurableLog, reference_store: &ReferenceStore) -> Result<(RecoveryReport, Vec<(Id, crate::order::OrderData)>, Vec<crate::order::Execution>), RecoveryError> {
    let mut report = RecoveryReport::default();
    let mut buffered_orders = Vec::new();
    let mut buffered_execs = Vec::new();

    log.load(&mut |id, _version, bytes| {
        note_highest(&mut report, id);
        match decode(bytes) {
            Some(Record::Instrument(instrument)) => {
                reference_store.restore_instrument(instrument);
                report.instruments_loaded += 1;
            }
            Some(Record::Account(account)) => {
                reference_store.restore_account(account);
                report.accounts_loaded += 1;
            }
            Some(Record::Clearing(clearing)) => reference_store.restore_clearing(clearing),
            Some(Record::RawData(raw)) => reference_store.restore_raw_data(raw),
            Some(Record::InternedString(s)) => reference_store.restore_string(s),
            Some(Record::Order { order_id, data }) => buffered_orders.push((order_id, data)),
            Some(Record::Execution(exec)) => buffered_execs.push(exec),
            None => {}
        }
    })?;

    Ok((report, buffered_orders, buffered_execs))
}

/// Whether a restored order should be reinserted into the book: resting
/// limit/stop orders that haven't reached a terminal status (spec §4.6 —
/// market orders never rest, and a terminal status means the order has
/// already left the book for good).
fn should_rebook(data: &crate::order::OrderData) -> bool {
    use crate::order::OrdType;
    if data.hot.ord_type == OrdType::Market || data.hot.leaves_qty.is_zero() {
        return false;
    }
    matches!(data.hot.status, OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::Suspended)
}

/// Runs both recovery phases against an already-open log, wiring the
/// restored state into `generator`/`reference_store`/`order_store`/`book`.
/// Returns a summary for startup logging.
pub fn recover(
    log: &dyn DurableLog,
    generator: &IdentifierGenerator,
    reference_store: &ReferenceStore,
    order_store: &OrderStore,
    book: &OrderBook,
) -> Result<RecoveryReport, RecoveryError> {
    let (mut report, buffered_orders, buffered_execs) = replay_reference(log, reference_store)?;

    for instrument_id in reference_store.all_instrument_ids() {
        book.register_instrument(instrument_id);
    }

    for (order_id, data) in buffered_orders {
        note_highest(&mut report, order_id);
        let rebook = should_rebook(&data);
        let instrument = data.cold.instrument;
        let side = data.hot.side;
        let price = data.hot.price;
        let order = Order::new(data);
        order_store.restore(order);
        report.orders_loaded += 1;
        if rebook {
            book.restore(instrument, side, price, order_id)?;
            report.orders_rebooked += 1;
        }
    }

    for exec in buffered_execs {
        note_highest(&mut report, exec.exec_id);
        order_store.save_execution(exec).ok();
        report.executions_loaded += 1;
    }

    generator.fast_forward_past(report.highest_id_seen);

    Ok(report)
}

pub fn open_and_recover(
    data_dir: &std::path::Path,
    generator: &IdentifierGenerator,
    reference_store: &ReferenceStore,
    order_store: &OrderStore,
    book: &OrderBook,
) -> Result<(Arc<dyn DurableLog>, RecoveryReport), RecoveryError> {
    let log: Arc<dyn DurableLog> = Arc::new(super::log::SledLog::open(data_dir).map_err(|e| RecoveryError::CannotOpenDataDir(e.to_string()))?);
    let report = recover(log.as_ref(), generator, reference_store, order_store, book)?;
    Ok((log, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{Price, Quantity};
    use crate::order::{Capacity, ColdFields, HotFields, OrdType, OrderData, Side, StateMachinePersistence, TimeInForce, WarmFields};
    use std::sync::Arc;

    fn sample_order_data(order_id: Id, instrument: Id, status: OrderStatus, leaves: Quantity) -> OrderData {
        OrderData {
            hot: HotFields {
                order_id,
                orig_order_id: Id::INVALID,
                price: Price::from(10),
                status,
                side: Side::Buy,
                ord_type: OrdType::Limit,
                leaves_qty: leaves,
                cum_qty: Quantity::from(5).checked_sub(leaves).unwrap_or(Quantity::ZERO),
                order_qty: Quantity::from(5),
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
                day_order_qty: Quantity::from(5),
                day_cum_qty: Quantity::ZERO,
                state_machine_persistence: StateMachinePersistence::default(),
            },
            cold: ColdFields {
                instrument,
                account: Id::INVALID,
                clearing: Id::INVALID,
                destination: Id::INVALID,
                exec_instructions: None,
                cl_order_id: "CL1".into(),
                orig_cl_order_id: None,
                source: Id::INVALID,
                executions: Vec::new(),
            },
        }
    }

    #[test]
    fn resting_order_is_rebooked_but_filled_order_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let log = super::super::log::SledLog::open(dir.path()).unwrap();
        let instrument = Id::new(1, 0);
        log.save(instrument, &bincode::serialize(&Record::Instrument(crate::reference::Instrument {
            id: instrument,
            symbol: "AAPL".into(),
            security_id: "".into(),
            security_id_source: "".into(),
        })).unwrap()).unwrap();

        let resting_id = Id::new(2, 0);
        let filled_id = Id::new(3, 0);
        log.save(resting_id, &bincode::serialize(&Record::Order { order_id: resting_id, data: sample_order_data(resting_id, instrument, OrderStatus::New, Quantity::from(5)) }).unwrap()).unwrap();
        log.save(filled_id, &bincode::serialize(&Record::Order { order_id: filled_id, data: sample_order_data(filled_id, instrument, OrderStatus::Filled, Quantity::ZERO) }).unwrap()).unwrap();

        let generator = IdentifierGenerator::new();
        let reference_store = ReferenceStore::new(Arc::new(IdentifierGenerator::new()));
        let order_store = OrderStore::new(Arc::new(IdentifierGenerator::new()));
        let book = OrderBook::new();

        let report = recover(&log, &generator, &reference_store, &order_store, &book).unwrap();
        assert_eq!(report.orders_loaded, 2);
        assert_eq!(report.orders_rebooked, 1);
        assert_eq!(book.top(instrument, Side::Buy).unwrap(), Some(resting_id));
    }
}
