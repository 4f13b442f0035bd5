//! Fans out save callbacks from the reference store and order store into
//! a single tagged record type written to a [`DurableLog`] (spec §4.14).

use std::sync::Arc;

use crate::ids::Id;
use crate::order::{Execution, Order, OrderData};
use crate::reference::{Account, Clearing, Instrument, InternedString, RawData, ReferenceSaveObserver};
use crate::store::OrderSaveObserver;

use super::log::DurableLog;

/// Everything that can be written to the durable log, tagged by variant so
/// [`super::recovery`] can dispatch a decoded record without guessing its
/// shape — the same tagged-enum-over-trait-object choice used for
/// [`crate::transaction::operations::Operation`].
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub enum Record {
    Instrument(Instrument),
    Account(Account),
    Clearing(Clearing),
    RawData(RawData),
    InternedString(InternedString),
    Order { order_id: Id, data: OrderData },
    Execution(Execution),
}

fn encode(record: &Record) -> Vec<u8> {
    bincode::serialize(record).expect("in-memory records always serialize")
}

/// Wires save-observer callbacks from the live stores to log writes. One
/// dispatcher is shared by the reference store and order store for the
/// lifetime of the process. Book membership isn't separately persisted —
/// it's derivable from each order's `status`/`leaves_qty` on replay
/// (see [`super::recovery::recover`]).
pub struct RecordDispatcher {
    log: Arc<dyn DurableLog>,
}

impl RecordDispatcher {
    pub fn new(log: Arc<dyn DurableLog>) -> Arc<Self> {
        Arc::new(RecordDispatcher { log })
    }

    fn persist(&self, id: Id, record: Record, is_update: bool) {
        let bytes = encode(&record);
        let result = if is_update { self.log.update(id, &bytes).map(|_| ()) } else { self.log.save(id, &bytes) };
        if let Err(err) = result {
            tracing::error!(id = %id, error = %err, "failed to persist durable record");
        }
    }
}

impl ReferenceSaveObserver for RecordDispatcher {
    fn on_instrument_saved(&self, instrument: &Instrument) {
        self.persist(instrument.id, Record::Instrument(instrument.clone()), false);
    }

    fn on_account_saved(&self, account: &Account) {
        self.persist(account.id, Record::Account(account.clone()), false);
    }

    fn on_clearing_saved(&self, clearing: &Clearing) {
        self.persist(clearing.id, Record::Clearing(clearing.clone()), false);
    }

    fn on_raw_data_saved(&self, raw: &RawData) {
        self.persist(raw.id, Record::RawData(raw.clone()), false);
    }

    fn on_string_saved(&self, s: &InternedString) {
        self.persist(s.id, Record::InternedString(s.clone()), false);
    }
}

impl OrderSaveObserver for RecordDispatcher {
    fn on_order_saved(&self, order: &Order) {
        let record = Record::Order { order_id: order.order_id(), data: order.read().clone() };
        self.persist(order.order_id(), record, true);
    }

    fn on_execution_saved(&self, exec: &Execution) {
        self.persist(exec.exec_id, Record::Execution(exec.clone()), false);
    }
}

pub fn decode(bytes: &[u8]) -> Option<Record> {
    bincode::deserialize(bytes).ok()
}
