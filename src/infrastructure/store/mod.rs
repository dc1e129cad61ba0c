// src/infrastructure/store/mod.rs
// In-memory ledger store: the demo persistence backend behind the
// LedgerStore capability.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::{
    round_money, Order, OrderSpec, OrderStatus, Position, PositionUpdate, Quote, SettlementUpdate,
    Stock, StockListing, Trade, User,
};
use crate::domain::repository::LedgerStore;

#[derive(Default)]
struct Tables {
    users: HashMap<u64, User>,
    stocks: HashMap<(String, String), Stock>,
    orders: HashMap<u64, Order>,
    positions: HashMap<(u64, String, String), Position>,
    trades: Vec<Trade>,
    next_user_id: u64,
    next_stock_id: u64,
    next_order_id: u64,
    next_position_id: u64,
    next_trade_id: u64,
}

/// All tables live behind one RwLock; taking the write guard for the length
/// of `apply_settlement` is what makes a settlement atomic here.
pub struct MemoryLedger {
    tables: RwLock<Tables>,
}

fn stock_key(symbol: &str, exchange: &str) -> (String, String) {
    (symbol.to_uppercase(), exchange.to_uppercase())
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_user(&self, name: &str, balance: Decimal) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            name: name.to_string(),
            balance: round_money(balance),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: u64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn upsert_stock(&self, listing: &StockListing, quote: &Quote) -> StoreResult<Stock> {
        let mut tables = self.tables.write().await;
        let key = stock_key(&listing.symbol, &listing.exchange);
        let now = Utc::now();

        let stock = match tables.stocks.get(&key) {
            Some(existing) => {
                let mut stock = existing.clone();
                stock.price = quote.price;
                stock.open = quote.open;
                stock.high = quote.high;
                stock.low = quote.low;
                stock.previous_close = quote.previous_close;
                stock.volume = quote.volume;
                stock.updated_at = now;
                stock
            }
            None => {
                tables.next_stock_id += 1;
                Stock {
                    id: tables.next_stock_id,
                    symbol: key.0.clone(),
                    exchange: key.1.clone(),
                    name: listing.name.clone().unwrap_or_else(|| key.0.clone()),
                    price: quote.price,
                    open: quote.open,
                    high: quote.high,
                    low: quote.low,
                    previous_close: quote.previous_close,
                    volume: quote.volume,
                    updated_at: now,
                }
            }
        };

        tables.stocks.insert(key, stock.clone());
        Ok(stock)
    }

    async fn get_stock(&self, symbol: &str, exchange: &str) -> StoreResult<Option<Stock>> {
        let tables = self.tables.read().await;
        Ok(tables.stocks.get(&stock_key(symbol, exchange)).cloned())
    }

    async fn list_stocks(&self) -> StoreResult<Vec<Stock>> {
        let tables = self.tables.read().await;
        let mut stocks: Vec<Stock> = tables.stocks.values().cloned().collect();
        stocks.sort_by_key(|s| s.id);
        Ok(stocks)
    }

    async fn record_quote(&self, symbol: &str, exchange: &str, quote: &Quote) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let key = stock_key(symbol, exchange);
        let stock = tables
            .stocks
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(format!("stock {} on {}", key.0, key.1)))?;
        stock.price = quote.price;
        stock.open = quote.open;
        stock.high = quote.high;
        stock.low = quote.low;
        stock.previous_close = quote.previous_close;
        stock.volume = quote.volume;
        stock.updated_at = Utc::now();
        Ok(())
    }

    async fn create_order(&self, spec: &OrderSpec) -> StoreResult<Order> {
        let mut tables = self.tables.write().await;
        tables.next_order_id += 1;
        let order = Order {
            id: tables.next_order_id,
            user_id: spec.user_id,
            symbol: spec.symbol.to_uppercase(),
            exchange: spec.exchange.to_uppercase(),
            side: spec.side,
            quantity: spec.quantity,
            limit_price: spec.limit_price,
            bracket: spec.bracket,
            status: OrderStatus::Pending,
            executed_price: None,
            executed_at: None,
            created_at: Utc::now(),
        };
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: u64) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&order_id).cloned())
    }

    async fn update_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn list_orders(
        &self,
        user_id: u64,
        status: Option<OrderStatus>,
    ) -> StoreResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn get_position(
        &self,
        user_id: u64,
        symbol: &str,
        exchange: &str,
    ) -> StoreResult<Option<Position>> {
        let tables = self.tables.read().await;
        let (symbol, exchange) = stock_key(symbol, exchange);
        Ok(tables.positions.get(&(user_id, symbol, exchange)).cloned())
    }

    async fn list_positions(&self, user_id: u64) -> StoreResult<Vec<Position>> {
        let tables = self.tables.read().await;
        let mut positions: Vec<Position> = tables
            .positions
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        positions.sort_by_key(|p| p.id);
        Ok(positions)
    }

    async fn list_trades(&self, user_id: u64) -> StoreResult<Vec<Trade>> {
        let tables = self.tables.read().await;
        Ok(tables
            .trades
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_settlement(&self, update: SettlementUpdate) -> StoreResult<Option<Trade>> {
        let mut tables = self.tables.write().await;

        // At-most-once guard: the transition out of PENDING commits here,
        // under the same write guard as every other record in the batch.
        match tables.orders.get(&update.order.id) {
            None => {
                return Err(StoreError::NotFound(format!("order {}", update.order.id)));
            }
            Some(stored) if stored.status != OrderStatus::Pending => {
                return Ok(None);
            }
            Some(_) => {}
        }

        let user = tables
            .users
            .get_mut(&update.order.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", update.order.user_id)))?;
        user.balance = round_money(user.balance + update.balance_delta);

        tables.orders.insert(update.order.id, update.order.clone());

        match update.position {
            PositionUpdate::Open(new_position) => {
                tables.next_position_id += 1;
                let now = Utc::now();
                let position = Position {
                    id: tables.next_position_id,
                    user_id: new_position.user_id,
                    symbol: new_position.symbol,
                    exchange: new_position.exchange,
                    quantity: new_position.quantity,
                    average_price: new_position.average_price,
                    last_value: new_position.last_value,
                    created_at: now,
                    updated_at: now,
                };
                let key = (
                    position.user_id,
                    position.symbol.clone(),
                    position.exchange.clone(),
                );
                tables.positions.insert(key, position);
            }
            PositionUpdate::Revise(position) => {
                let key = (
                    position.user_id,
                    position.symbol.clone(),
                    position.exchange.clone(),
                );
                tables.positions.insert(key, position);
            }
            PositionUpdate::Close(position_id) => {
                tables.positions.retain(|_, p| p.id != position_id);
            }
        }

        tables.next_trade_id += 1;
        let trade = Trade {
            id: tables.next_trade_id,
            order_id: update.trade.order_id,
            user_id: update.trade.user_id,
            symbol: update.trade.symbol,
            exchange: update.trade.exchange,
            side: update.trade.side,
            quantity: update.trade.quantity,
            price: update.trade.price,
            total: update.trade.total,
            executed_at: update.trade.executed_at,
        };
        tables.trades.push(trade.clone());

        Ok(Some(trade))
    }
}
