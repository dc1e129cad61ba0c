// src/application/sweep.rs
use crate::application::settlement::{execution_condition, SettlementEngine};
use crate::domain::errors::{AppResult, QuoteError};
use crate::domain::models::{Order, OrderStatus};
use crate::domain::repository::{LedgerStore, QuoteSource};
use futures_util::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

/// Sweep scheduler settings, loaded from the environment.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Seconds between sweep ticks.
    pub interval_secs: u64,
    /// Concurrent per-order evaluations per tick.
    pub workers: usize,
    /// Per-order quote fetch timeout in seconds.
    pub quote_timeout_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            workers: 4,
            quote_timeout_secs: 3,
        }
    }
}

/// Outcome counters for one sweep tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub evaluated: usize,
    pub settled: usize,
    pub quote_failures: usize,
}

enum OrderOutcome {
    Settled,
    Held,
    QuoteFailed,
}

/// Recurring pass that re-evaluates all pending orders against fresh quotes
/// and feeds crossed ones into the settlement engine.
///
/// Orders are evaluated concurrently, bounded by a worker limit; a quote
/// failure for one order never blocks its siblings. The stop flag is only
/// observed between ticks, so in-flight settlements complete on shutdown.
pub struct SweepScheduler {
    engine: Arc<SettlementEngine>,
    store: Arc<dyn LedgerStore>,
    quotes: Arc<dyn QuoteSource>,
    user_id: u64,
    config: SweepConfig,
    running: Arc<Mutex<bool>>,
}

impl SweepScheduler {
    pub fn new(
        engine: Arc<SettlementEngine>,
        store: Arc<dyn LedgerStore>,
        quotes: Arc<dyn QuoteSource>,
        user_id: u64,
        config: SweepConfig,
    ) -> Self {
        Self {
            engine,
            store,
            quotes,
            user_id,
            config,
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Start the periodic sweep loop. Returns the task handle so the caller
    /// can await completion after `stop`.
    pub fn start(self: Arc<Self>) -> AppResult<JoinHandle<()>> {
        {
            let mut running = self.running.lock().unwrap();
            if *running {
                return Err(crate::domain::errors::AppError::Config(
                    "sweep scheduler already running".to_string(),
                ));
            }
            *running = true;
        }

        let scheduler = self;
        let handle = tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(Duration::from_secs(scheduler.config.interval_secs.max(1)));

            loop {
                timer.tick().await;
                if !scheduler.is_running() {
                    break;
                }

                match scheduler.sweep_once().await {
                    Ok(report) if report.evaluated > 0 => {
                        log::info!(
                            "Sweep: {} evaluated, {} settled, {} quote failures",
                            report.evaluated,
                            report.settled,
                            report.quote_failures
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("Sweep tick failed: {:?}", e);
                    }
                }
            }

            log::info!("Sweep scheduler stopped");
        });

        Ok(handle)
    }

    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap();
        *running = false;
    }

    pub fn is_running(&self) -> bool {
        let running = self.running.lock().unwrap();
        *running
    }

    /// Run exactly one sweep pass over the user's pending orders.
    pub async fn sweep_once(&self) -> AppResult<SweepReport> {
        let pending = self
            .store
            .list_orders(self.user_id, Some(OrderStatus::Pending))
            .await?;
        if pending.is_empty() {
            return Ok(SweepReport::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = Vec::with_capacity(pending.len());

        for order in pending {
            let semaphore = Arc::clone(&semaphore);
            let engine = Arc::clone(&self.engine);
            let store = Arc::clone(&self.store);
            let quotes = Arc::clone(&self.quotes);
            let quote_timeout = Duration::from_secs(self.config.quote_timeout_secs);

            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return OrderOutcome::QuoteFailed,
                };
                evaluate_order(engine, store, quotes, order, quote_timeout).await
            }));
        }

        let mut report = SweepReport::default();
        for result in join_all(tasks).await {
            report.evaluated += 1;
            match result {
                Ok(OrderOutcome::Settled) => report.settled += 1,
                Ok(OrderOutcome::Held) => {}
                Ok(OrderOutcome::QuoteFailed) => report.quote_failures += 1,
                Err(e) => {
                    log::error!("Sweep task panicked: {:?}", e);
                    report.quote_failures += 1;
                }
            }
        }

        Ok(report)
    }
}

async fn evaluate_order(
    engine: Arc<SettlementEngine>,
    store: Arc<dyn LedgerStore>,
    quotes: Arc<dyn QuoteSource>,
    order: Order,
    quote_timeout: Duration,
) -> OrderOutcome {
    let quote = match timeout(quote_timeout, quotes.get_quote(&order.symbol, &order.exchange)).await
    {
        Ok(Ok(quote)) => quote,
        Ok(Err(e)) => {
            log::warn!(
                "Quote failed for {} on {} (order {}): {}",
                order.symbol,
                order.exchange,
                order.id,
                e
            );
            return OrderOutcome::QuoteFailed;
        }
        Err(_) => {
            let e = QuoteError::Timeout(quote_timeout.as_secs());
            log::warn!(
                "Quote failed for {} on {} (order {}): {}",
                order.symbol,
                order.exchange,
                order.id,
                e
            );
            return OrderOutcome::QuoteFailed;
        }
    };

    // Keep the catalog's last known price fresh for immediate checks and
    // portfolio valuation.
    if let Err(e) = store
        .record_quote(&order.symbol, &order.exchange, &quote)
        .await
    {
        log::warn!("Failed to record quote for {}: {}", order.symbol, e);
    }

    if !execution_condition(order.side, order.limit_price, quote.price) {
        return OrderOutcome::Held;
    }

    match engine.settle(order.id, quote.price).await {
        Ok(Some(_)) => OrderOutcome::Settled,
        Ok(None) => OrderOutcome::Held,
        Err(e) => {
            log::error!("Settlement failed for order {}: {:?}", order.id, e);
            OrderOutcome::Held
        }
    }
}
