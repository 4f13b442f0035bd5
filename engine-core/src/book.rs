//! Per-instrument price-time-priority order book (spec §3, §4.4).

use std::collections::BTreeMap;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::errors::BookError;
use crate::fixed_point::{Price, Quantity};
use crate::ids::Id;
use crate::order::Side;

/// Sequence number giving stable time priority within a price level: the
/// multimap is keyed on `(price, sequence)` so equal prices preserve
/// insertion order without relying on a `BTreeMap`'s iteration being stable
/// for duplicate keys (it can't have duplicate keys at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Sequence(u64);

/// One side of one instrument's book: price ordered in the side's priority
/// direction, each level holding orders in arrival order.
struct BookSide {
    descending: bool,
    levels: BTreeMap<LevelKey, Id>,
    next_sequence: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelKey {
    price: Price,
    sequence: Sequence,
    descending: bool,
}

impl PartialOrd for LevelKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LevelKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let price_order = if self.descending {
            Reverse(self.price).cmp(&Reverse(other.price))
        } else {
            self.price.cmp(&other.price)
        };
        price_order.then(self.sequence.cmp(&other.sequence))
    }
}

impl BookSide {
    fn new(descending: bool) -> Self {
        BookSide { descending, levels: BTreeMap::new(), next_sequence: AtomicU64::new(0) }
    }

    fn insert(&mut self, price: Price, order_id: Id) {
        let sequence = Sequence(self.next_sequence.fetch_add(1, Ordering::Relaxed));
        self.levels.insert(LevelKey { price, sequence, descending: self.descending }, order_id);
    }

    fn remove(&mut self, price: Price, order_id: Id) -> Result<(), BookError> {
        let key = self
            .levels
            .iter()
            .find(|(k, v)| k.price == price && **v == order_id)
            .map(|(k, _)| *k);
        match key {
            Some(key) => {
                self.levels.remove(&key);
                Ok(())
            }
            None => Err(BookError::OrderNotInBook(order_id)),
        }
    }

    /// Iterates in priority order (best price first, then arrival order),
    /// invoking `functor` until it returns `(matched, stop)` with either set.
    fn find(&self, mut functor: impl FnMut(Id) -> (bool, bool)) -> Option<Id> {
        for id in self.levels.values() {
            let (matched, stop) = functor(*id);
            if matched {
                return Some(*id);
            }
            if stop {
                break;
            }
        }
        None
    }

    fn find_all(&self, mut functor: impl FnMut(Id) -> (bool, bool)) -> Vec<Id> {
        let mut out = Vec::new();
        for id in self.levels.values() {
            let (matched, stop) = functor(*id);
            if matched {
                out.push(*id);
            }
            if stop {
                break;
            }
        }
        out
    }

    fn top(&self) -> Option<Id> {
        self.levels.values().next().copied()
    }

    fn snapshot(&self) -> Vec<(Price, Quantity, usize)> {
        let mut out: Vec<(Price, Quantity, usize)> = Vec::new();
        for key in self.levels.keys() {
            match out.last_mut() {
                Some((price, _, count)) if *price == key.price => {
                    *count += 1;
                }
                _ => out.push((key.price, Quantity::ZERO, 1)),
            }
        }
        out
    }
}

/// `{bidMutex, bidMap(desc), askMutex, askMap(asc)}` for one instrument.
struct OrdersGroup {
    bids: Mutex<BookSide>,
    asks: Mutex<BookSide>,
}

impl OrdersGroup {
    fn new() -> Self {
        OrdersGroup { bids: Mutex::new(BookSide::new(true)), asks: Mutex::new(BookSide::new(false)) }
    }

    fn side(&self, side: Side) -> &Mutex<BookSide> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }
}

/// Callback used while recovery or the durable log needs to know an order
/// was added to the book, independent of the matcher's own save path.
pub trait BookSaveObserver: Send + Sync {
    fn on_order_booked(&self, _order_id: Id) {}
}

pub struct OrderBook {
    groups: DashMap<Id, OrdersGroup>,
}

impl OrderBook {
    pub fn new() -> Self {
        OrderBook { groups: DashMap::new() }
    }

    /// Registers an instrument with the book so it can accept resting
    /// orders. Idempotent.
    pub fn register_instrument(&self, instrument_id: Id) {
        self.groups.entry(instrument_id).or_insert_with(OrdersGroup::new);
    }

    fn group(&self, instrument_id: Id) -> Result<dashmap::mapref::one::Ref<'_, Id, OrdersGroup>, BookError> {
        self.groups.get(&instrument_id).ok_or(BookError::InstrumentNotRegistered(instrument_id))
    }

    pub fn add(&self, instrument_id: Id, side: Side, price: Price, order_id: Id) -> Result<(), BookError> {
        let group = self.group(instrument_id)?;
        group.side(side).lock().insert(price, order_id);
        Ok(())
    }

    /// Same as [`OrderBook::add`], used only by the recovery path; kept as
    /// a distinct method name to mirror spec §4.4's `restore` bypassing the
    /// durable-save hook (there is no hook here to bypass — the distinction
    /// is purely documentary, matching the original's split `add`/`restore`).
    pub fn restore(&self, instrument_id: Id, side: Side, price: Price, order_id: Id) -> Result<(), BookError> {
        self.add(instrument_id, side, price, order_id)
    }

    pub fn remove(&self, instrument_id: Id, side: Side, price: Price, order_id: Id) -> Result<(), BookError> {
        let group = self.group(instrument_id)?;
        let result = group.side(side).lock().remove(price, order_id);
        result
    }

    pub fn find(&self, instrument_id: Id, side: Side, functor: impl FnMut(Id) -> (bool, bool)) -> Result<Option<Id>, BookError> {
        let group = self.group(instrument_id)?;
        let result = group.side(side).lock().find(functor);
        Ok(result)
    }

    pub fn find_all(&self, instrument_id: Id, side: Side, functor: impl FnMut(Id) -> (bool, bool)) -> Result<Vec<Id>, BookError> {
        let group = self.group(instrument_id)?;
        let result = group.side(side).lock().find_all(functor);
        Ok(result)
    }

    pub fn top(&self, instrument_id: Id, side: Side) -> Result<Option<Id>, BookError> {
        let group = self.group(instrument_id)?;
        let result = group.side(side).lock().top();
        Ok(result)
    }

    pub fn snapshot(&self, instrument_id: Id) -> Result<(Vec<(Price, Quantity, usize)>, Vec<(Price, Quantity, usize)>), BookError> {
        let group = self.group(instrument_id)?;
        let bids = group.bids.lock().snapshot();
        let asks = group.asks.lock().snapshot();
        Ok((bids, asks))
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(counter: u64) -> Id {
        Id::new(counter, 0)
    }

    #[test]
    fn bids_sort_descending_asks_ascending() {
        let book = OrderBook::new();
        let instrument = id(1);
        book.register_instrument(instrument);
        book.add(instrument, Side::Buy, Price::from(10), id(10)).unwrap();
        book.add(instrument, Side::Buy, Price::from(12), id(11)).unwrap();
        book.add(instrument, Side::Sell, Price::from(10), id(20)).unwrap();
        book.add(instrument, Side::Sell, Price::from(8), id(21)).unwrap();

        assert_eq!(book.top(instrument, Side::Buy).unwrap(), Some(id(11)));
        assert_eq!(book.top(instrument, Side::Sell).unwrap(), Some(id(21)));
    }

    #[test]
    fn equal_price_preserves_arrival_order() {
        let book = OrderBook::new();
        let instrument = id(1);
        book.register_instrument(instrument);
        book.add(instrument, Side::Buy, Price::from(10), id(1)).unwrap();
        book.add(instrument, Side::Buy, Price::from(10), id(2)).unwrap();
        assert_eq!(book.top(instrument, Side::Buy).unwrap(), Some(id(1)));
    }

    #[test]
    fn remove_missing_order_fails() {
        let book = OrderBook::new();
        let instrument = id(1);
        book.register_instrument(instrument);
        let err = book.remove(instrument, Side::Buy, Price::from(10), id(99)).unwrap_err();
        assert!(matches!(err, BookError::OrderNotInBook(_)));
    }

    #[test]
    fn unregistered_instrument_fails() {
        let book = OrderBook::new();
        let err = book.add(id(42), Side::Buy, Price::from(1), id(1)).unwrap_err();
        assert!(matches!(err, BookError::InstrumentNotRegistered(_)));
    }

    #[test]
    fn find_stops_scanning_once_functor_signals_stop() {
        let book = OrderBook::new();
        let instrument = id(1);
        book.register_instrument(instrument);
        book.add(instrument, Side::Sell, Price::from(10), id(1)).unwrap();
        book.add(instrument, Side::Sell, Price::from(20), id(2)).unwrap();
        let mut seen = Vec::new();
        let found = book
            .find(instrument, Side::Sell, |order_id| {
                seen.push(order_id);
                (false, true)
            })
            .unwrap();
        assert_eq!(found, None);
        assert_eq!(seen, vec![id(1)]);
    }
}
