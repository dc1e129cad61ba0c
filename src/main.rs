// src/main.rs
use paper_broker::application::portfolio::Portfolio;
use paper_broker::application::settlement::SettlementEngine;
use paper_broker::application::sweep::SweepScheduler;
use paper_broker::config::Config;
use paper_broker::domain::errors::AppResult;
use paper_broker::domain::repository::{LedgerStore, QuoteSource};
use paper_broker::infrastructure::quotes::HttpQuoteSource;
use paper_broker::infrastructure::store::MemoryLedger;

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting paper_broker v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());
    let quotes: Arc<dyn QuoteSource> = Arc::new(HttpQuoteSource::new(&config.quotes.base_url));

    // Seed the demo account
    let user = store
        .create_user(&config.account.user_name, config.account.starting_cash)
        .await?;
    log::info!(
        "Seeded demo account '{}' with balance {}",
        user.name,
        user.balance
    );

    // Seed the stock catalog from the watchlist
    log::info!(
        "Seeding stock catalog ({} instruments)...",
        config.account.watchlist.len()
    );
    for listing in &config.account.watchlist {
        match quotes.get_quote(&listing.symbol, &listing.exchange).await {
            Ok(quote) => {
                let stock = store.upsert_stock(listing, &quote).await?;
                log::info!(
                    "Listed {} on {} at {}",
                    stock.symbol,
                    stock.exchange,
                    stock.price
                );
            }
            Err(e) => {
                log::warn!(
                    "Skipping {} on {}: {}",
                    listing.symbol,
                    listing.exchange,
                    e
                );
            }
        }
    }

    // Start the sweep scheduler
    let engine = Arc::new(SettlementEngine::new(store.clone()));
    let scheduler = Arc::new(SweepScheduler::new(
        engine,
        store.clone(),
        quotes,
        user.id,
        (&config.sweep).into(),
    ));
    let sweep_handle = Arc::clone(&scheduler).start()?;
    log::info!(
        "Sweep scheduler running every {}s with {} workers",
        config.sweep.interval_secs,
        config.sweep.workers
    );

    // Log a portfolio summary on a slow interval
    let portfolio = Portfolio::new(store.clone());
    let user_id = user.id;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            match portfolio.summary(user_id).await {
                Ok(summary) => {
                    log::info!(
                        "Portfolio: cash {}, invested {}, market value {}, equity {}",
                        summary.cash,
                        summary.invested,
                        summary.market_value,
                        summary.equity
                    );
                    for view in &summary.positions {
                        log::info!(
                            "  {} on {}: {} @ {} (market {}, PnL {})",
                            view.position.symbol,
                            view.position.exchange,
                            view.position.quantity,
                            view.position.average_price,
                            view.market_price,
                            view.unrealized_pnl
                        );
                    }
                }
                Err(e) => {
                    log::error!("Failed to compute portfolio summary: {:?}", e);
                }
            }
        }
    });

    // Wait for shutdown signal
    log::info!("Paper broker is running. Press Ctrl+C to stop.");
    ctrl_c().await.expect("Failed to listen for control-c event");

    // Shutdown: stop the scheduler and let in-flight settlements finish
    log::info!("Shutting down...");
    scheduler.stop();
    if let Err(e) = sweep_handle.await {
        log::error!("Sweep scheduler task failed: {:?}", e);
    }

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
