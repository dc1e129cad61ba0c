// tests/sweep.rs
// Sweep scheduler integration tests against a scripted quote source.

use async_trait::async_trait;
use paper_broker::application::settlement::SettlementEngine;
use paper_broker::application::sweep::{SweepConfig, SweepScheduler};
use paper_broker::domain::errors::{QuoteError, QuoteResult};
use paper_broker::domain::models::{
    OrderSide, OrderSpec, OrderStatus, Quote, StockListing, User,
};
use paper_broker::domain::repository::{LedgerStore, QuoteSource};
use paper_broker::infrastructure::store::MemoryLedger;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

fn quote(price: Decimal) -> Quote {
    Quote {
        price,
        open: price,
        high: price,
        low: price,
        previous_close: price,
        volume: 500,
    }
}

/// Quote source with per-symbol scripted prices, outages and stalls.
#[derive(Default)]
struct ScriptedQuoteSource {
    prices: Mutex<HashMap<String, Decimal>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
}

impl ScriptedQuoteSource {
    fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    fn fail(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    fn stall(&self, symbol: &str) {
        self.stalled.lock().unwrap().insert(symbol.to_string());
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    async fn get_quote(&self, symbol: &str, _exchange: &str) -> QuoteResult<Quote> {
        let stalled = self.stalled.lock().unwrap().contains(symbol);
        if stalled {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(QuoteError::Unavailable("scripted outage".to_string()));
        }
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .map(|price| quote(*price))
            .ok_or_else(|| QuoteError::Unavailable(format!("no script for {}", symbol)))
    }
}

struct Harness {
    store: Arc<dyn LedgerStore>,
    engine: Arc<SettlementEngine>,
    quotes: Arc<ScriptedQuoteSource>,
    user: User,
}

impl Harness {
    /// Ledger with one user and the given instruments listed at their seed price.
    async fn new(symbols: &[(&str, Decimal)]) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());
        let user = store.create_user("demo", dec!(100000)).await.unwrap();
        for (symbol, price) in symbols {
            store
                .upsert_stock(&StockListing::new(symbol, "NSE"), &quote(*price))
                .await
                .unwrap();
        }
        let engine = Arc::new(SettlementEngine::new(store.clone()));
        Self {
            store,
            engine,
            quotes: Arc::new(ScriptedQuoteSource::default()),
            user,
        }
    }

    fn scheduler(&self, config: SweepConfig) -> Arc<SweepScheduler> {
        Arc::new(SweepScheduler::new(
            self.engine.clone(),
            self.store.clone(),
            self.quotes.clone(),
            self.user.id,
            config,
        ))
    }

    async fn pending_buy(&self, symbol: &str, quantity: u64, limit: Decimal) -> u64 {
        let order = self
            .engine
            .create_order(&OrderSpec {
                user_id: self.user.id,
                symbol: symbol.to_string(),
                exchange: "NSE".to_string(),
                side: OrderSide::Buy,
                quantity,
                limit_price: limit,
                bracket: None,
            })
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        order.id
    }
}

#[tokio::test]
async fn sweep_settles_crossed_orders() {
    let harness = Harness::new(&[("ACME", dec!(100))]).await;
    let order_id = harness.pending_buy("ACME", 10, dec!(95)).await;

    harness.quotes.set_price("ACME", dec!(94));
    let scheduler = harness.scheduler(SweepConfig::default());
    let report = scheduler.sweep_once().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.settled, 1);
    assert_eq!(report.quote_failures, 0);

    let order = harness.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Executed);
    assert_eq!(order.executed_price, Some(dec!(94)));

    let trades = harness.store.list_trades(harness.user.id).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].total, dec!(940.00));
}

#[tokio::test]
async fn sweep_holds_uncrossed_orders_and_refreshes_catalog() {
    let harness = Harness::new(&[("ACME", dec!(100))]).await;
    let order_id = harness.pending_buy("ACME", 10, dec!(95)).await;

    harness.quotes.set_price("ACME", dec!(96));
    let scheduler = harness.scheduler(SweepConfig::default());
    let report = scheduler.sweep_once().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.settled, 0);

    let order = harness.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);

    // The fresh quote still lands in the catalog.
    let stock = harness.store.get_stock("ACME", "NSE").await.unwrap().unwrap();
    assert_eq!(stock.price, dec!(96));
}

#[tokio::test]
async fn quote_failure_does_not_block_sibling_orders() {
    let harness = Harness::new(&[("ACME", dec!(100)), ("GLOBEX", dec!(90))]).await;
    let acme_id = harness.pending_buy("ACME", 10, dec!(95)).await;
    let globex_id = harness.pending_buy("GLOBEX", 5, dec!(88)).await;

    harness.quotes.fail("ACME");
    harness.quotes.set_price("GLOBEX", dec!(85));

    let scheduler = harness.scheduler(SweepConfig::default());
    let report = scheduler.sweep_once().await.unwrap();

    assert_eq!(report.evaluated, 2);
    assert_eq!(report.settled, 1);
    assert_eq!(report.quote_failures, 1);

    // ACME stays pending for the next tick; GLOBEX settled.
    let acme = harness.store.get_order(acme_id).await.unwrap().unwrap();
    assert_eq!(acme.status, OrderStatus::Pending);
    let globex = harness.store.get_order(globex_id).await.unwrap().unwrap();
    assert_eq!(globex.status, OrderStatus::Executed);
}

#[tokio::test]
async fn stalled_quote_times_out_and_holds_the_order() {
    let harness = Harness::new(&[("ACME", dec!(100))]).await;
    let order_id = harness.pending_buy("ACME", 10, dec!(95)).await;

    harness.quotes.set_price("ACME", dec!(94));
    harness.quotes.stall("ACME");

    let scheduler = harness.scheduler(SweepConfig {
        quote_timeout_secs: 1,
        ..SweepConfig::default()
    });
    let report = scheduler.sweep_once().await.unwrap();

    assert_eq!(report.evaluated, 1);
    assert_eq!(report.settled, 0);
    assert_eq!(report.quote_failures, 1);

    let order = harness.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn repeated_sweeps_settle_once() {
    let harness = Harness::new(&[("ACME", dec!(100))]).await;
    harness.pending_buy("ACME", 10, dec!(95)).await;

    harness.quotes.set_price("ACME", dec!(94));
    let scheduler = harness.scheduler(SweepConfig::default());

    let first = scheduler.sweep_once().await.unwrap();
    assert_eq!(first.settled, 1);

    // Nothing left to evaluate; the trade count is unchanged.
    let second = scheduler.sweep_once().await.unwrap();
    assert_eq!(second.evaluated, 0);
    assert_eq!(second.settled, 0);
    let trades = harness.store.list_trades(harness.user.id).await.unwrap();
    assert_eq!(trades.len(), 1);
}

#[tokio::test]
async fn scheduler_lifecycle() {
    let harness = Harness::new(&[("ACME", dec!(100))]).await;
    let scheduler = harness.scheduler(SweepConfig {
        interval_secs: 1,
        workers: 2,
        quote_timeout_secs: 1,
    });

    let handle = Arc::clone(&scheduler).start().unwrap();
    assert!(scheduler.is_running());
    assert!(Arc::clone(&scheduler).start().is_err());

    scheduler.stop();
    handle.await.unwrap();
    assert!(!scheduler.is_running());
}
