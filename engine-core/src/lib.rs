//! Core order-processing engine: state machine, matcher, transaction
//! layer, durable log, and the dual worker pools that drive them (spec
//! §4). [`Engine`] is the single entry point a binary needs: it owns
//! every store, wires durable persistence, replays the log on startup,
//! and starts the worker pools.

pub mod book;
pub mod config;
pub mod deferred;
pub mod durable;
pub mod errors;
pub mod fixed_point;
pub mod fsm;
pub mod ids;
pub mod matching;
pub mod metrics;
pub mod metrics_server;
pub mod order;
pub mod outbound;
pub mod perf;
pub mod processor;
pub mod queue;
pub mod reference;
pub mod store;
pub mod task_manager;
pub mod transaction;
pub mod utils;

use std::path::Path;
use std::sync::Arc;

use crate::book::OrderBook;
use crate::durable::{open_and_recover, DurableLog, RecordDispatcher, RecoveryReport};
use crate::errors::RecoveryError;
use crate::ids::IdentifierGenerator;
use crate::matching::OrderMatcher;
use crate::metrics::MetricsRegistry;
use crate::outbound::{OutboundQueue, OutboundQueueReceiver};
use crate::processor::Processor;
use crate::queue::InputQueue;
use crate::reference::ReferenceStore;
use crate::store::OrderStore;
use crate::task_manager::TaskManager;
use crate::transaction::manager::TransactionManager;
use crate::transaction::scope_pool::ScopePool;

/// Every shared handle the engine needs, built from [`open_and_recover`]
/// and held for the life of the process. Dropping an `Engine` joins both
/// worker pools before releasing the stores, matching the singleton
/// teardown order the durable log depends on: order store, then
/// reference store, then generator, then log (spec §9).
pub struct Engine {
    pub generator: Arc<IdentifierGenerator>,
    pub reference_store: Arc<ReferenceStore>,
    pub order_store: Arc<OrderStore>,
    pub order_book: Arc<OrderBook>,
    pub metrics: Arc<MetricsRegistry>,
    pub outbound: OutboundQueueReceiver,
    pub recovery: RecoveryReport,
    log: Arc<dyn DurableLog>,
    task_manager: Option<TaskManager>,
}

impl Engine {
    /// Opens (or creates) the durable log at `data_dir`, replays it into
    /// fresh stores, and wires a [`RecordDispatcher`] so every subsequent
    /// save is persisted. Does not start any worker threads yet — call
    /// [`Engine::start`] once the caller is ready to process events.
    pub fn open(data_dir: &Path) -> Result<Self, RecoveryError> {
        let generator = Arc::new(IdentifierGenerator::new());
        let reference_store = Arc::new(ReferenceStore::new(generator.clone()));
        let order_store = Arc::new(OrderStore::new(generator.clone()));
        let order_book = Arc::new(OrderBook::new());
        let metrics = Arc::new(MetricsRegistry::new().map_err(|e| RecoveryError::CannotOpenDataDir(e.to_string()))?);

        let (log, recovery) = open_and_recover(data_dir, &generator, &reference_store, &order_store, &order_book)?;

        let dispatcher = RecordDispatcher::new(log.clone());
        reference_store.set_observer(dispatcher.clone());
        order_store.set_observer(dispatcher);

        let (_outbound, outbound_rx) = OutboundQueue::new();

        Ok(Engine {
            generator,
            reference_store,
            order_store,
            order_book,
            metrics,
            outbound: outbound_rx,
            recovery,
            log,
            task_manager: None,
        })
    }

    /// Builds the [`Processor`] and starts the event-processor and
    /// transaction-processor pools (spec §4.12). `workers` is the thread
    /// count for each pool.
    pub fn start(&mut self, workers: usize) {
        let (outbound, outbound_rx) = OutboundQueue::new();
        self.outbound = outbound_rx;

        let processor = Arc::new(Processor::new(
            self.generator.clone(),
            self.order_store.clone(),
            self.order_book.clone(),
            OrderMatcher::new(),
            ScopePool::new(64),
            Arc::new(TransactionManager::new()),
            outbound,
            Arc::new(InputQueue::new()),
            self.metrics.clone(),
        ));

        self.task_manager = Some(TaskManager::start(processor, workers, workers));
    }

    pub fn input_queue(&self) -> Option<Arc<InputQueue>> {
        self.task_manager.as_ref().map(|t| t.processor().input_queue.clone())
    }

    pub fn metrics_registry(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    pub fn durable_log(&self) -> Arc<dyn DurableLog> {
        self.log.clone()
    }

    /// Blocks until every staged transaction has committed or rolled
    /// back, then stops both worker pools.
    pub fn shutdown(&mut self) {
        if let Some(manager) = self.task_manager.as_mut() {
            manager.wait_until_transactions_finished();
            manager.shutdown();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_on_an_empty_data_dir_recovers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        assert_eq!(engine.recovery.orders_loaded, 0);
        assert_eq!(engine.recovery.instruments_loaded, 0);
    }

    #[test]
    fn start_then_shutdown_leaves_no_live_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::open(dir.path()).unwrap();
        engine.start(1);
        engine.shutdown();
    }
}
