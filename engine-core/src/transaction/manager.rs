//! Dependency graph of in-flight transactions (spec §4.9).
//!
//! An n-linked tree keyed by the objects each transaction touches: a
//! transaction that shares any touched id with an earlier, still-running
//! transaction becomes its child and may not execute until every parent
//! finishes. This is what serializes two events targeting the same order
//! without a per-order lock held across a task boundary (spec §5).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ids::Id;
use crate::transaction::scope::TransactionScope;

pub struct Transaction {
    pub id: Id,
    pub scope: Box<TransactionScope>,
    pub touched: HashSet<Id>,
}

struct Node {
    transaction: Option<Transaction>,
    remaining_parents: usize,
}

#[derive(Default)]
struct ManagerState {
    nodes: HashMap<Id, Node>,
    /// FIFO of transaction ids currently waiting on each touched object;
    /// the front of each queue is the object's current "owner".
    object_queues: HashMap<Id, VecDeque<Id>>,
    ready: VecDeque<Id>,
}

pub struct TransactionManager {
    state: Mutex<ManagerState>,
    observers: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager { state: Mutex::new(ManagerState::default()), observers: Mutex::new(Vec::new()) }
    }

    pub fn attach(&self, observer: Arc<dyn Fn() + Send + Sync>) {
        self.observers.lock().push(observer);
    }

    fn notify_ready(&self) {
        for observer in self.observers.lock().iter() {
            observer();
        }
    }

    /// Registers `transaction`, computing its parent set from objects
    /// already claimed by live transactions. Promotes it straight to the
    /// ready list if it has no parents.
    pub fn add(&self, transaction: Transaction) {
        let mut state = self.state.lock();
        let mut parents = HashSet::new();
        for &object in &transaction.touched {
            let queue = state.object_queues.entry(object).or_default();
            if let Some(&owner) = queue.back() {
                parents.insert(owner);
            }
            queue.push_back(transaction.id);
        }
        let remaining_parents = parents.len();
        let id = transaction.id;
        state.nodes.insert(id, Node { transaction: Some(transaction), remaining_parents });
        if remaining_parents == 0 {
            state.ready.push_back(id);
            drop(state);
            self.notify_ready();
        }
    }

    /// Pulls one ready `(id, Transaction)` pair, if any.
    pub fn next(&self) -> Option<(Id, Transaction)> {
        let mut state = self.state.lock();
        let id = state.ready.pop_front()?;
        let node = state.nodes.get_mut(&id)?;
        let transaction = node.transaction.take()?;
        Some((id, transaction))
    }

    /// Marks `id` finished, clearing it from every object queue it touched
    /// and promoting any child whose last parent just cleared.
    pub fn finish(&self, id: Id, touched: &HashSet<Id>) {
        let mut newly_ready = Vec::new();
        {
            let mut state = self.state.lock();
            state.nodes.remove(&id);
            for &object in touched {
                let mut next_front = None;
                let mut is_empty = false;
                if let Some(queue) = state.object_queues.get_mut(&object) {
                    if queue.front() == Some(&id) {
                        queue.pop_front();
                    } else if let Some(pos) = queue.iter().position(|x| *x == id) {
                        queue.remove(pos);
                    }
                    next_front = queue.front().copied();
                    is_empty = queue.is_empty();
                }
                if let Some(next_id) = next_front {
                    if let Some(node) = state.nodes.get_mut(&next_id) {
                        node.remaining_parents = node.remaining_parents.saturating_sub(1);
                        if node.remaining_parents == 0 {
                            newly_ready.push(next_id);
                        }
                    }
                }
                if is_empty {
                    state.object_queues.remove(&object);
                }
            }
            newly_ready.sort_unstable();
            newly_ready.dedup();
            for ready_id in &newly_ready {
                state.ready.push_back(*ready_id);
            }
        }
        if !newly_ready.is_empty() {
            self.notify_ready();
        }
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().nodes.len()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64, touched: &[u64]) -> Transaction {
        Transaction {
            id: Id::new(id, 0),
            scope: Box::new(TransactionScope::new()),
            touched: touched.iter().map(|&c| Id::new(c, 0)).collect(),
        }
    }

    #[test]
    fn independent_transactions_are_immediately_ready() {
        let manager = TransactionManager::new();
        manager.add(tx(1, &[10]));
        manager.add(tx(2, &[20]));
        let (first, _) = manager.next().unwrap();
        let (second, _) = manager.next().unwrap();
        assert_eq!(first, Id::new(1, 0));
        assert_eq!(second, Id::new(2, 0));
    }

    #[test]
    fn a_child_does_not_become_ready_until_its_parent_finishes() {
        let manager = TransactionManager::new();
        manager.add(tx(1, &[10]));
        manager.add(tx(2, &[10]));
        let (parent_id, parent) = manager.next().unwrap();
        assert_eq!(parent_id, Id::new(1, 0));
        assert!(manager.next().is_none(), "child must wait for the shared object");
        manager.finish(parent_id, &parent.touched);
        let (child_id, _) = manager.next().unwrap();
        assert_eq!(child_id, Id::new(2, 0));
    }

    #[test]
    fn a_transaction_touching_two_busy_objects_waits_for_both_parents() {
        let manager = TransactionManager::new();
        manager.add(tx(1, &[10]));
        manager.add(tx(2, &[20]));
        manager.add(tx(3, &[10, 20]));
        let (a_id, a) = manager.next().unwrap();
        let (b_id, b) = manager.next().unwrap();
        assert!(manager.next().is_none());
        manager.finish(a_id, &a.touched);
        assert!(manager.next().is_none(), "second parent still holds object 20");
        manager.finish(b_id, &b.touched);
        let (c_id, _) = manager.next().unwrap();
        assert_eq!(c_id, Id::new(3, 0));
    }
}
