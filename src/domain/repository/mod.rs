// src/domain/repository/mod.rs
// Capability interfaces the settlement core is written against.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::errors::{QuoteResult, StoreResult};
use crate::domain::models::{
    Order, OrderSpec, OrderStatus, Position, Quote, SettlementUpdate, Stock, StockListing, Trade,
    User,
};

/// Durable keyed storage for users, stocks, orders, positions and trades.
///
/// Implementations assign record ids and normalise (symbol, exchange) keys to
/// uppercase. `apply_settlement` is the one compound operation: it must apply
/// the whole update atomically, and only while the order is still pending.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_user(&self, name: &str, balance: Decimal) -> StoreResult<User>;
    async fn get_user(&self, user_id: u64) -> StoreResult<Option<User>>;

    /// Insert a catalog row, or refresh its quote fields if the listing exists.
    async fn upsert_stock(&self, listing: &StockListing, quote: &Quote) -> StoreResult<Stock>;
    async fn get_stock(&self, symbol: &str, exchange: &str) -> StoreResult<Option<Stock>>;
    async fn list_stocks(&self) -> StoreResult<Vec<Stock>>;
    /// Refresh the quote fields of an existing catalog row.
    async fn record_quote(&self, symbol: &str, exchange: &str, quote: &Quote) -> StoreResult<()>;

    async fn create_order(&self, spec: &OrderSpec) -> StoreResult<Order>;
    async fn get_order(&self, order_id: u64) -> StoreResult<Option<Order>>;
    async fn update_order(&self, order: &Order) -> StoreResult<()>;
    async fn list_orders(
        &self,
        user_id: u64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>>;

    async fn get_position(
        &self,
        user_id: u64,
        symbol: &str,
        exchange: &str,
    ) -> StoreResult<Option<Position>>;
    async fn list_positions(&self, user_id: u64) -> StoreResult<Vec<Position>>;

    async fn list_trades(&self, user_id: u64) -> StoreResult<Vec<Trade>>;

    /// Atomically apply one settlement: order transition, trade insert,
    /// position mutation and balance delta. Returns the recorded trade, or
    /// `None` when the order already left PENDING (duplicate trigger).
    async fn apply_settlement(&self, update: SettlementUpdate) -> StoreResult<Option<Trade>>;
}

/// External market-data capability: a current price snapshot per instrument.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn get_quote(&self, symbol: &str, exchange: &str) -> QuoteResult<Quote>;
}
