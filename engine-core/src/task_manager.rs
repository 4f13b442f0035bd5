//! Dual worker pools driving the engine (spec §4.12): one pool drains the
//! input queue into state-machine transitions, the other drains
//! newly-ready transactions out of the [`TransactionManager`](crate::transaction::manager::TransactionManager).
//! Each pool hands work out round-robin via a cache-line-aligned index so
//! the hot counter never shares a line with anything else.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::perf::CacheAligned;
use crate::processor::Processor;

/// Backs off with a short sleep once a worker finds nothing to do, instead
/// of burning a full core on an empty queue.
const IDLE_BACKOFF: Duration = Duration::from_micros(50);

struct WorkerPool {
    next_worker: CacheAligned<AtomicUsize>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn(name: &'static str, worker_count: usize, work: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let work = Arc::new(work);
        let handles = (0..worker_count.max(1))
            .map(|idx| {
                let running = running.clone();
                let work = work.clone();
                std::thread::Builder::new()
                    .name(format!("{name}-{idx}"))
                    .spawn(move || {
                        while running.load(Ordering::Acquire) {
                            if !work() {
                                std::thread::sleep(IDLE_BACKOFF);
                            }
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        WorkerPool { next_worker: CacheAligned::new(AtomicUsize::new(0)), running, handles }
    }

    fn utilization(&self, busy: usize) -> f64 {
        let total = self.handles.len().max(1);
        busy as f64 / total as f64
    }

    fn shutdown(self) {
        self.running.store(false, Ordering::Release);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// Owns both worker pools and the shared [`Processor`] they drive.
pub struct TaskManager {
    event_pool: Option<WorkerPool>,
    transaction_pool: Option<WorkerPool>,
    processor: Arc<Processor>,
}

impl TaskManager {
    /// Spawns `event_workers` threads pulling from the input queue and
    /// `transaction_workers` threads draining ready transactions.
    pub fn start(processor: Arc<Processor>, event_workers: usize, transaction_workers: usize) -> Self {
        let event_proc = processor.clone();
        let event_pool = WorkerPool::spawn("engine-event", event_workers, move || event_proc.process_one());

        let txn_proc = processor.clone();
        let transaction_pool = WorkerPool::spawn("engine-txn", transaction_workers, move || txn_proc.drain_ready_transaction());

        TaskManager { event_pool: Some(event_pool), transaction_pool: Some(transaction_pool), processor }
    }

    /// Round-robins through the event pool's worker indices; used only to
    /// report load, since the OS scheduler — not this index — actually
    /// assigns work to threads.
    pub fn next_event_worker(&self) -> usize {
        let pool = self.event_pool.as_ref().expect("task manager already shut down");
        pool.next_worker.fetch_add(1, Ordering::Relaxed) % pool.handles.len().max(1)
    }

    /// The processor both pools share; used by callers that need to push
    /// events onto its input queue or read its metrics.
    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }

    pub fn next_transaction_worker(&self) -> usize {
        let pool = self.transaction_pool.as_ref().expect("task manager already shut down");
        pool.next_worker.fetch_add(1, Ordering::Relaxed) % pool.handles.len().max(1)
    }

    /// Blocks until every in-flight transaction has committed or rolled
    /// back — used by graceful shutdown and by tests that need a
    /// deterministic quiescent point (spec §4.12).
    pub fn wait_until_transactions_finished(&self) {
        while self.processor.transaction_manager.live_count() > 0 {
            std::thread::sleep(IDLE_BACKOFF);
        }
    }

    /// Stops both pools, joining every worker thread. Idempotent: a second
    /// call is a no-op.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.event_pool.take() {
            pool.shutdown();
        }
        if let Some(pool) = self.transaction_pool.take() {
            pool.shutdown();
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OrderBook;
    use crate::ids::{Id, IdentifierGenerator};
    use crate::matching::OrderMatcher;
    use crate::metrics::MetricsRegistry;
    use crate::outbound::OutboundQueue;
    use crate::queue::{InboundEvent, InputQueue};
    use crate::store::OrderStore;
    use crate::transaction::manager::TransactionManager;
    use crate::transaction::scope_pool::ScopePool;

    fn sample_processor() -> Arc<Processor> {
        let generator = Arc::new(IdentifierGenerator::new());
        let order_store = Arc::new(OrderStore::new(generator.clone()));
        let order_book = Arc::new(OrderBook::new());
        let (outbound, _rx) = OutboundQueue::new();
        Arc::new(Processor::new(
            generator,
            order_store,
            order_book,
            OrderMatcher::new(),
            ScopePool::new(8),
            Arc::new(TransactionManager::new()),
            outbound,
            Arc::new(InputQueue::new()),
            Arc::new(MetricsRegistry::new().unwrap()),
        ))
    }

    #[test]
    fn pool_utilization_never_exceeds_worker_count() {
        let processor = sample_processor();
        let manager = TaskManager::start(processor, 2, 2);
        let pool = manager.event_pool.as_ref().unwrap();
        assert!(pool.utilization(2) <= 1.0);
    }

    #[test]
    fn shutdown_is_idempotent_and_joins_workers() {
        let processor = sample_processor();
        let mut manager = TaskManager::start(processor, 1, 1);
        manager.shutdown();
        manager.shutdown();
    }

    #[test]
    fn event_worker_drains_pushed_order_events_without_manual_polling() {
        let processor = sample_processor();
        processor.input_queue.push("test", InboundEvent::OrderCancelEvent { order_id: Id::new(999, 0), reason: "no such order".into() });
        let mut manager = TaskManager::start(processor.clone(), 1, 1);
        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while processor.input_queue.size() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(processor.input_queue.size(), 0);
        manager.shutdown();
    }
}
