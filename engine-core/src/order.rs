//! The `Order` entity, its field tiers, and execution records (spec §3).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::fixed_point::{Price, Quantity};
use crate::ids::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrdType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeInForce {
    Day,
    Gtd,
    Gtc,
    Fok,
    Ioc,
    Opg,
    AtClose,
}

/// Order status, derived from the state machine's Zone A state and required
/// to stay in lockstep with it (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    PendingNew,
    PendingReplace,
    New,
    PartiallyFilled,
    Filled,
    Expired,
    DoneForDay,
    Suspended,
    Rejected,
    CancelledOrReplaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Capacity {
    Principal,
    Agent,
    RisklessPrincipal,
}

/// Fields read and written on every match, fill, and correction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HotFields {
    pub order_id: Id,
    pub orig_order_id: Id,
    pub price: Price,
    pub status: OrderStatus,
    pub side: Side,
    pub ord_type: OrdType,
    pub leaves_qty: Quantity,
    pub cum_qty: Quantity,
    pub order_qty: Quantity,
    pub tif: TimeInForce,
}

/// Fields read during processing but rarely touched in the matching inner
/// loop.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WarmFields {
    pub stop_px: Option<Price>,
    pub avg_px: Price,
    pub day_avg_px: Price,
    pub creation_time: u64,
    pub last_update_time: u64,
    pub expire_time: Option<u64>,
    pub settl_date: Option<u32>,
    pub settl_type: Option<String>,
    pub capacity: Capacity,
    pub currency: String,
    pub min_qty: Option<Quantity>,
    pub day_order_qty: Quantity,
    pub day_cum_qty: Quantity,
    pub state_machine_persistence: StateMachinePersistence,
}

/// Lazy references into the [`crate::reference::ReferenceStore`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ColdFields {
    pub instrument: Id,
    pub account: Id,
    pub clearing: Id,
    pub destination: Id,
    pub exec_instructions: Option<Id>,
    pub cl_order_id: String,
    pub orig_cl_order_id: Option<String>,
    pub source: Id,
    pub executions: Vec<Id>,
}

/// The `(zone1, zone2)` state tuple persisted with the order and restored
/// before processing any event for it (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct StateMachinePersistence {
    pub zone_a: i32,
    pub zone_b: i32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OrderData {
    pub hot: HotFields,
    pub warm: WarmFields,
    pub cold: ColdFields,
}

impl OrderData {
    /// Invariant held across every completed transition (spec §8, property 1).
    pub fn quantity_invariant_holds(&self) -> bool {
        self.hot.cum_qty.checked_add(self.hot.leaves_qty) == Some(self.hot.order_qty)
    }
}

/// A shared, lock-guarded order. Cloning an `Order` clones the handle, not
/// the data — all clones observe the same lock (spec §3: "each order owns a
/// reader-writer lock guarding all fields").
#[derive(Debug, Clone)]
pub struct Order {
    order_id: Id,
    inner: Arc<RwLock<OrderData>>,
}

impl Order {
    pub fn new(data: OrderData) -> Self {
        Order { order_id: data.hot.order_id, inner: Arc::new(RwLock::new(data)) }
    }

    pub fn order_id(&self) -> Id {
        self.order_id
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, OrderData> {
        self.inner.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, OrderData> {
        self.inner.write()
    }

    /// Locks `self` and `other` together, always taking the smaller
    /// `orderId` first, per the deadlock-avoidance convention (spec §3, §5).
    pub fn lock_pair<'a>(
        &'a self,
        other: &'a Order,
    ) -> (parking_lot::RwLockWriteGuard<'a, OrderData>, parking_lot::RwLockWriteGuard<'a, OrderData>) {
        if self.order_id <= other.order_id {
            let a = self.inner.write();
            let b = other.inner.write();
            (a, b)
        } else {
            let b = other.inner.write();
            let a = self.inner.write();
            (a, b)
        }
    }
}

/// One state-change record, tagged by kind (spec §3, "execution entry").
/// Every variant carries the common envelope via [`Execution`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ExecutionKind {
    New,
    Trade { last_qty: Quantity, last_px: Price, currency: String, trade_date: u32 },
    Replace { orig_order_id: Id },
    Cancel { exec_ref_id: Id },
    Reject { reason: String },
    Correct {
        cum_qty: Quantity,
        leaves_qty: Quantity,
        last_qty: Quantity,
        last_px: Price,
        currency: String,
        trade_date: u32,
        orig_order_id: Id,
        exec_ref_id: Id,
    },
    DoneForDay,
    Expired,
    Suspended,
    PendingCancel,
    PendingReplace,
    Restated,
    Status,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Execution {
    pub exec_id: Id,
    pub order_id: Id,
    pub transact_time: u64,
    pub order_status: OrderStatus,
    pub market: String,
    pub kind: ExecutionKind,
}
