//! Primary order indexes and the execution index (spec §4.3).

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::errors::OrderStoreError;
use crate::ids::{Id, IdentifierGenerator};
use crate::order::{Execution, Order};

/// Hook forwarding every save to the durable log dispatcher (spec §4.13).
pub trait OrderSaveObserver: Send + Sync {
    fn on_order_saved(&self, _order: &Order) {}
    fn on_execution_saved(&self, _exec: &Execution) {}
}

struct Indexes {
    by_id: BTreeMap<Id, Order>,
    by_cl_order_id: BTreeMap<String, Id>,
}

/// Two primary order indexes (by `Id`, by `clOrderId`) plus a lock-free
/// concurrent execution index. Removing entries is unsupported, matching
/// the reference store's contract.
pub struct OrderStore {
    generator: Arc<IdentifierGenerator>,
    indexes: RwLock<Indexes>,
    executions: DashMap<Id, Execution>,
    observer: RwLock<Option<Arc<dyn OrderSaveObserver>>>,
}

impl OrderStore {
    pub fn new(generator: Arc<IdentifierGenerator>) -> Self {
        OrderStore {
            generator,
            indexes: RwLock::new(Indexes { by_id: BTreeMap::new(), by_cl_order_id: BTreeMap::new() }),
            executions: DashMap::new(),
            observer: RwLock::new(None),
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn OrderSaveObserver>) {
        *self.observer.write() = Some(observer);
    }

    pub fn identifier_generator(&self) -> &IdentifierGenerator {
        &self.generator
    }

    /// Mints an id, rejects a duplicate `clOrderId`, installs the order in
    /// both indexes atomically, and forwards it to the save observer.
    pub fn save(&self, order: Order) -> Result<Order, OrderStoreError> {
        let cl_order_id = order.read().cold.cl_order_id.clone();
        {
            let mut indexes = self.indexes.write();
            if indexes.by_cl_order_id.contains_key(&cl_order_id) {
                return Err(OrderStoreError::DuplicateClientOrderId(cl_order_id));
            }
            indexes.by_id.insert(order.order_id(), order.clone());
            indexes.by_cl_order_id.insert(cl_order_id, order.order_id());
        }
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_order_saved(&order);
        }
        Ok(order)
    }

    /// Re-inserts an order under an already-minted id, bypassing the
    /// duplicate-`clOrderId` guard — used only by the recovery path where
    /// the log is the source of truth.
    pub fn restore(&self, order: Order) {
        let cl_order_id = order.read().cold.cl_order_id.clone();
        let mut indexes = self.indexes.write();
        indexes.by_id.insert(order.order_id(), order.clone());
        indexes.by_cl_order_id.insert(cl_order_id, order.order_id());
    }

    pub fn save_execution(&self, mut exec: Execution) -> Result<Execution, OrderStoreError> {
        if !exec.exec_id.is_valid() {
            exec.exec_id = self.generator.next();
        }
        self.executions.insert(exec.exec_id, exec.clone());
        if let Some(obs) = self.observer.read().as_ref() {
            obs.on_execution_saved(&exec);
        }
        Ok(exec)
    }

    pub fn locate_by_order_id(&self, id: Id) -> Result<Order, OrderStoreError> {
        self.indexes.read().by_id.get(&id).cloned().ok_or(OrderStoreError::OrderNotFound(id))
    }

    pub fn locate_by_cl_order_id(&self, cl_order_id: &str) -> Result<Order, OrderStoreError> {
        let indexes = self.indexes.read();
        let id = indexes.by_cl_order_id.get(cl_order_id).ok_or_else(|| {
            OrderStoreError::StoreInvariantViolated(format!("unknown clOrderId {cl_order_id}"))
        })?;
        indexes.by_id.get(id).cloned().ok_or(OrderStoreError::OrderNotFound(*id))
    }

    pub fn locate_execution(&self, exec_id: Id) -> Result<Execution, OrderStoreError> {
        self.executions.get(&exec_id).map(|e| e.clone()).ok_or(OrderStoreError::OrderNotFound(exec_id))
    }

    /// Iterates the by-id index under a read lock, in ascending `Id` order
    /// for a deterministic snapshot. `f` must not call back into the store.
    pub fn for_each_order(&self, mut f: impl FnMut(&Order)) {
        let indexes = self.indexes.read();
        for order in indexes.by_id.values() {
            f(order);
        }
    }

    pub fn len(&self) -> usize {
        self.indexes.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Capacity, ColdFields, HotFields, OrdType, OrderData, OrderStatus, Side, StateMachinePersistence, TimeInForce, WarmFields};
    use crate::fixed_point::{Price, Quantity};

    fn build(generator: &IdentifierGenerator, cl_order_id: &str) -> Order {
        let order_id = generator.next();
        Order::new(OrderData {
            hot: HotFields {
                order_id,
                orig_order_id: Id::INVALID,
                price: Price::from(10),
                status: OrderStatus::PendingNew,
                side: Side::Buy,
                ord_type: OrdType::Limit,
                leaves_qty: Quantity::from(5),
                cum_qty: Quantity::ZERO,
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
                instrument: Id::INVALID,
                account: Id::INVALID,
                clearing: Id::INVALID,
                destination: Id::INVALID,
                exec_instructions: None,
                cl_order_id: cl_order_id.into(),
                orig_cl_order_id: None,
                source: Id::INVALID,
                executions: Vec::new(),
            },
        })
    }

    #[test]
    fn duplicate_cl_order_id_is_rejected() {
        let generator = Arc::new(IdentifierGenerator::new());
        let store = OrderStore::new(generator.clone());
        store.save(build(&generator, "CL1")).unwrap();
        let err = store.save(build(&generator, "CL1")).unwrap_err();
        assert!(matches!(err, OrderStoreError::DuplicateClientOrderId(_)));
    }

    #[test]
    fn lookup_by_id_and_by_cl_order_id_agree() {
        let generator = Arc::new(IdentifierGenerator::new());
        let store = OrderStore::new(generator.clone());
        let order = store.save(build(&generator, "CL2")).unwrap();
        let by_id = store.locate_by_order_id(order.order_id()).unwrap();
        let by_cl = store.locate_by_cl_order_id("CL2").unwrap();
        assert_eq!(by_id.order_id(), by_cl.order_id());
    }
}
