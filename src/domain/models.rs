// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Round a currency amount to the ledger's fixed two decimal places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Demo account holding the cash balance. Only settlement mutates the balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry identifying an instrument to list, prior to its first quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockListing {
    pub symbol: String,
    pub exchange: String,
    pub name: Option<String>,
}

impl StockListing {
    pub fn new(symbol: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            exchange: exchange.to_uppercase(),
            name: None,
        }
    }
}

/// Catalog row for one instrument, keyed by (symbol, exchange).
/// OHLC fields hold the last fetched quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub id: u64,
    pub symbol: String,
    pub exchange: String,
    pub name: String,
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub previous_close: Decimal,
    pub volume: u64,
    pub updated_at: DateTime<Utc>,
}

/// Price snapshot returned by a quote source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub previous_close: Decimal,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Executed,
    Cancelled,
}

impl OrderStatus {
    /// Executed and Cancelled are terminal; an order enters one of them at most once.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Executed => write!(f, "EXECUTED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BracketKind {
    Percentage,
    Absolute,
}

/// Take-profit/stop-loss attachment. Accepted and persisted with the order;
/// the execution sweep does not evaluate it (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSpec {
    pub kind: BracketKind,
    pub value: Decimal,
}

/// Client request to open a limit order.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub limit_price: Decimal,
    pub bracket: Option<BracketSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub limit_price: Decimal,
    pub bracket: Option<BracketSpec>,
    pub status: OrderStatus,
    pub executed_price: Option<Decimal>,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Copy of this order stamped as executed.
    pub fn executed(&self, price: Decimal, at: DateTime<Utc>) -> Self {
        let mut order = self.clone();
        order.status = OrderStatus::Executed;
        order.executed_price = Some(price);
        order.executed_at = Some(at);
        order
    }
}

/// Net holding in one instrument. At most one per (user, symbol, exchange);
/// quantity stays positive while the row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub quantity: u64,
    pub average_price: Decimal,
    pub last_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Cost basis of the open quantity.
    pub fn invested(&self) -> Decimal {
        round_money(Decimal::from(self.quantity) * self.average_price)
    }
}

/// Position row to open on a first BUY; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub quantity: u64,
    pub average_price: Decimal,
    pub last_value: Decimal,
}

/// Immutable execution record; exactly one per executed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub order_id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub total: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Trade to record during settlement; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub order_id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub exchange: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub total: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Position mutation carried by a settlement.
#[derive(Debug, Clone)]
pub enum PositionUpdate {
    Open(NewPosition),
    Revise(Position),
    Close(u64),
}

/// Everything one settlement writes. The store applies the whole batch in a
/// single write section, re-checking that the order is still pending, so no
/// partial settlement is ever visible.
#[derive(Debug, Clone)]
pub struct SettlementUpdate {
    pub order: Order,
    pub trade: NewTrade,
    pub position: PositionUpdate,
    pub balance_delta: Decimal,
}
