//! Prometheus metrics for the order-processing engine (spec §4.0's ambient
//! observability surface).

use prometheus::{Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Central registry for every metric family the engine exposes.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    orders: Arc<OrderMetrics>,
    transactions: Arc<TransactionMetrics>,
    durable: Arc<DurableMetrics>,
    workers: Arc<WorkerMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());
        let orders = Arc::new(OrderMetrics::new(&registry)?);
        let transactions = Arc::new(TransactionMetrics::new(&registry)?);
        let durable = Arc::new(DurableMetrics::new(&registry)?);
        let workers = Arc::new(WorkerMetrics::new(&registry)?);

        info!("metrics registry initialized");

        Ok(Self { registry, orders, transactions, durable, workers })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn orders(&self) -> &OrderMetrics {
        &self.orders
    }

    pub fn transactions(&self) -> &TransactionMetrics {
        &self.transactions
    }

    pub fn durable(&self) -> &DurableMetrics {
        &self.durable
    }

    pub fn workers(&self) -> &WorkerMetrics {
        &self.workers
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

/// Order lifecycle and matching activity.
pub struct OrderMetrics {
    pub received_total: IntCounter,
    pub rejected_total: IntCounterVec,
    pub cancelled_total: IntCounter,
    pub trades_total: IntCounter,
    pub input_queue_depth: IntGauge,
}

impl OrderMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let received_total = IntCounter::with_opts(Opts::new("orders_received_total", "Total orders received").namespace("engine"))?;
        registry.register(Box::new(received_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("orders_rejected_total", "Total orders rejected").namespace("engine"),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let cancelled_total = IntCounter::with_opts(Opts::new("orders_cancelled_total", "Total orders cancelled").namespace("engine"))?;
        registry.register(Box::new(cancelled_total.clone()))?;

        let trades_total = IntCounter::with_opts(Opts::new("trades_executed_total", "Total trades executed").namespace("engine"))?;
        registry.register(Box::new(trades_total.clone()))?;

        let input_queue_depth = IntGauge::with_opts(Opts::new("input_queue_depth", "Current depth of the inbound event queue").namespace("engine"))?;
        registry.register(Box::new(input_queue_depth.clone()))?;

        Ok(Self { received_total, rejected_total, cancelled_total, trades_total, input_queue_depth })
    }
}

/// Transaction commit/rollback activity (spec §4.9).
pub struct TransactionMetrics {
    pub committed_total: IntCounter,
    pub rolled_back_total: IntCounter,
    pub scope_pool_cache_misses: IntCounter,
}

impl TransactionMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let committed_total = IntCounter::with_opts(Opts::new("transactions_committed_total", "Total transactions committed").namespace("engine"))?;
        registry.register(Box::new(committed_total.clone()))?;

        let rolled_back_total = IntCounter::with_opts(Opts::new("transactions_rolled_back_total", "Total transactions rolled back").namespace("engine"))?;
        registry.register(Box::new(rolled_back_total.clone()))?;

        let scope_pool_cache_misses = IntCounter::with_opts(Opts::new("scope_pool_cache_misses_total", "Total scope pool heap fallbacks").namespace("engine"))?;
        registry.register(Box::new(scope_pool_cache_misses.clone()))?;

        Ok(Self { committed_total, rolled_back_total, scope_pool_cache_misses })
    }
}

/// Durable log write activity (spec §4.13).
pub struct DurableMetrics {
    pub writes_total: IntCounter,
    pub write_failures_total: IntCounter,
}

impl DurableMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let writes_total = IntCounter::with_opts(Opts::new("durable_log_writes_total", "Total durable log writes").namespace("engine"))?;
        registry.register(Box::new(writes_total.clone()))?;

        let write_failures_total = IntCounter::with_opts(Opts::new("durable_log_write_failures_total", "Total durable log write failures").namespace("engine"))?;
        registry.register(Box::new(write_failures_total.clone()))?;

        Ok(Self { writes_total, write_failures_total })
    }
}

/// Worker pool saturation (spec §4.12's dual pools).
pub struct WorkerMetrics {
    pub event_pool_utilization: Gauge,
    pub transaction_pool_utilization: Gauge,
}

impl WorkerMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let event_pool_utilization = Gauge::with_opts(Opts::new("event_pool_utilization", "Fraction of event-processor workers busy").namespace("engine"))?;
        registry.register(Box::new(event_pool_utilization.clone()))?;

        let transaction_pool_utilization = Gauge::with_opts(Opts::new("transaction_pool_utilization", "Fraction of transaction-processor workers busy").namespace("engine"))?;
        registry.register(Box::new(transaction_pool_utilization.clone()))?;

        Ok(Self { event_pool_utilization, transaction_pool_utilization })
    }
}
