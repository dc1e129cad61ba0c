// src/application/portfolio.rs
use crate::domain::errors::{AppResult, StoreError};
use crate::domain::models::{round_money, Order, OrderStatus, Position, Trade};
use crate::domain::repository::LedgerStore;
use rust_decimal::Decimal;
use std::sync::Arc;

/// One holding valued at the stock's last known price.
#[derive(Debug, Clone)]
pub struct PositionView {
    pub position: Position,
    pub market_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone)]
pub struct PortfolioSummary {
    pub cash: Decimal,
    pub invested: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
    pub positions: Vec<PositionView>,
}

/// Read accessors over the ledger for whatever transport sits above.
pub struct Portfolio {
    store: Arc<dyn LedgerStore>,
}

impl Portfolio {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn orders(&self, user_id: u64, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        Ok(self.store.list_orders(user_id, status).await?)
    }

    pub async fn positions(&self, user_id: u64) -> AppResult<Vec<Position>> {
        Ok(self.store.list_positions(user_id).await?)
    }

    pub async fn trades(&self, user_id: u64) -> AppResult<Vec<Trade>> {
        Ok(self.store.list_trades(user_id).await?)
    }

    pub async fn summary(&self, user_id: u64) -> AppResult<PortfolioSummary> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))?;

        let mut views = Vec::new();
        let mut invested = Decimal::ZERO;
        let mut market_value = Decimal::ZERO;

        for position in self.store.list_positions(user_id).await? {
            // A delisted instrument falls back to its cost basis.
            let market_price = self
                .store
                .get_stock(&position.symbol, &position.exchange)
                .await?
                .map(|stock| stock.price)
                .unwrap_or(position.average_price);

            let value = round_money(Decimal::from(position.quantity) * market_price);
            let cost = position.invested();
            invested += cost;
            market_value += value;
            views.push(PositionView {
                market_price,
                market_value: value,
                unrealized_pnl: value - cost,
                position,
            });
        }

        Ok(PortfolioSummary {
            cash: user.balance,
            invested,
            market_value,
            unrealized_pnl: market_value - invested,
            equity: user.balance + market_value,
            positions: views,
        })
    }
}
