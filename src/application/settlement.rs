// src/application/settlement.rs
use crate::domain::errors::{AppResult, OrderError, StoreError};
use crate::domain::models::{
    round_money, NewPosition, NewTrade, Order, OrderSide, OrderSpec, OrderStatus, Position,
    PositionUpdate, SettlementUpdate, Trade,
};
use crate::domain::repository::LedgerStore;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Execution trigger for a limit order: BUY fills once the market trades at
/// or below the limit, SELL once it trades at or above. Exact decimal
/// comparison, inclusive on the boundary.
pub fn execution_condition(side: OrderSide, limit_price: Decimal, current_price: Decimal) -> bool {
    match side {
        OrderSide::Buy => current_price <= limit_price,
        OrderSide::Sell => current_price >= limit_price,
    }
}

/// Owns the order lifecycle: creation, the execution-condition check and the
/// atomic settlement of trade, position and balance.
///
/// Settlements for one user are serialised through a per-user mutex, and the
/// store re-checks the PENDING status inside `apply_settlement`, so a
/// duplicate trigger (immediate check racing the sweep) settles at most once.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    user_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn user_lock(&self, user_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create a limit order. The order is validated against the stock
    /// catalog, the cash balance (BUY) and the open position (SELL), then
    /// persisted PENDING. If the stock's last known price already satisfies
    /// the execution condition the order settles synchronously before this
    /// returns.
    pub async fn create_order(&self, spec: &OrderSpec) -> AppResult<Order> {
        if spec.quantity == 0 {
            return Err(OrderError::InvalidQuantity.into());
        }
        if spec.limit_price <= Decimal::ZERO {
            return Err(OrderError::InvalidPrice.into());
        }

        let mut spec = spec.clone();
        spec.symbol = spec.symbol.trim().to_uppercase();
        spec.exchange = spec.exchange.trim().to_uppercase();

        let stock = self
            .store
            .get_stock(&spec.symbol, &spec.exchange)
            .await?
            .ok_or_else(|| OrderError::UnknownInstrument {
                symbol: spec.symbol.clone(),
                exchange: spec.exchange.clone(),
            })?;

        let user = self
            .store
            .get_user(spec.user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", spec.user_id)))?;

        match spec.side {
            OrderSide::Buy => {
                let required = round_money(Decimal::from(spec.quantity) * spec.limit_price);
                if required > user.balance {
                    return Err(OrderError::InsufficientFunds {
                        required,
                        available: user.balance,
                    }
                    .into());
                }
            }
            OrderSide::Sell => {
                let held = self
                    .store
                    .get_position(spec.user_id, &spec.symbol, &spec.exchange)
                    .await?
                    .map(|p| p.quantity)
                    .unwrap_or(0);
                if spec.quantity > held {
                    return Err(OrderError::InsufficientPosition {
                        requested: spec.quantity,
                        held,
                    }
                    .into());
                }
            }
        }

        let order = self.store.create_order(&spec).await?;
        log::info!(
            "Order {} created: {} {} {} on {} limit {}",
            order.id,
            order.side,
            order.quantity,
            order.symbol,
            order.exchange,
            order.limit_price
        );

        // Immediate check against the last known price; the sweep re-tries
        // with fresh quotes on every tick.
        if execution_condition(order.side, order.limit_price, stock.price) {
            self.settle(order.id, stock.price).await?;
            if let Some(settled) = self.store.get_order(order.id).await? {
                return Ok(settled);
            }
        }

        Ok(order)
    }

    /// Settle a pending order at the given execution price. A no-op returning
    /// `Ok(None)` when the order is missing or already terminal, which makes
    /// duplicate triggers harmless.
    pub async fn settle(&self, order_id: u64, execution_price: Decimal) -> AppResult<Option<Trade>> {
        let order = match self.store.get_order(order_id).await? {
            Some(order) if order.status == OrderStatus::Pending => order,
            _ => return Ok(None),
        };

        let lock = self.user_lock(order.user_id).await;
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent trigger may have won the race.
        let order = match self.store.get_order(order_id).await? {
            Some(order) if order.status == OrderStatus::Pending => order,
            _ => return Ok(None),
        };

        let user = self
            .store
            .get_user(order.user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", order.user_id)))?;
        let position = self
            .store
            .get_position(order.user_id, &order.symbol, &order.exchange)
            .await?;

        let now = Utc::now();
        let total = round_money(Decimal::from(order.quantity) * execution_price);

        let (position_update, balance_delta) = match order.side {
            OrderSide::Buy => {
                if total > user.balance {
                    // Sibling settlements drained the balance since creation.
                    self.reject(&order, "insufficient funds at settlement")
                        .await?;
                    return Ok(None);
                }
                (self.buy_position(&order, position, execution_price), -total)
            }
            OrderSide::Sell => match self.sell_position(&order, position, execution_price) {
                Some(update) => (update, total),
                None => {
                    self.reject(&order, "insufficient position at settlement")
                        .await?;
                    return Ok(None);
                }
            },
        };

        let executed = order.executed(execution_price, now);
        let trade = NewTrade {
            order_id: order.id,
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            exchange: order.exchange.clone(),
            side: order.side,
            quantity: order.quantity,
            price: execution_price,
            total,
            executed_at: now,
        };

        let applied = self
            .store
            .apply_settlement(SettlementUpdate {
                order: executed,
                trade,
                position: position_update,
                balance_delta,
            })
            .await?;

        if let Some(trade) = &applied {
            log::info!(
                "Order {} executed: {} {} {} @ {} (total {})",
                order.id,
                order.side,
                order.quantity,
                order.symbol,
                execution_price,
                trade.total
            );
        }

        Ok(applied)
    }

    /// Cancel a pending order. Cancelling an order that is already terminal
    /// is a no-op returning the stored order.
    pub async fn cancel_order(&self, order_id: u64) -> AppResult<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::UnknownOrder(order_id))?;

        let lock = self.user_lock(order.user_id).await;
        let _guard = lock.lock().await;

        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::UnknownOrder(order_id))?;
        if order.status.is_terminal() {
            return Ok(order);
        }

        order.status = OrderStatus::Cancelled;
        self.store.update_order(&order).await?;
        log::info!("Order {} cancelled", order.id);
        Ok(order)
    }

    fn buy_position(
        &self,
        order: &Order,
        position: Option<Position>,
        execution_price: Decimal,
    ) -> PositionUpdate {
        match position {
            None => PositionUpdate::Open(NewPosition {
                user_id: order.user_id,
                symbol: order.symbol.clone(),
                exchange: order.exchange.clone(),
                quantity: order.quantity,
                average_price: execution_price,
                last_value: round_money(Decimal::from(order.quantity) * execution_price),
            }),
            Some(mut position) => {
                let old_qty = Decimal::from(position.quantity);
                let add_qty = Decimal::from(order.quantity);
                let new_qty = old_qty + add_qty;
                // Quantity-weighted average cost basis.
                position.average_price = round_money(
                    (old_qty * position.average_price + add_qty * execution_price) / new_qty,
                );
                position.quantity += order.quantity;
                position.last_value = round_money(new_qty * execution_price);
                position.updated_at = Utc::now();
                PositionUpdate::Revise(position)
            }
        }
    }

    /// `None` means the open quantity no longer covers the sale; the order is
    /// rejected instead of going short.
    fn sell_position(
        &self,
        order: &Order,
        position: Option<Position>,
        execution_price: Decimal,
    ) -> Option<PositionUpdate> {
        let mut position = position?;
        if position.quantity < order.quantity {
            return None;
        }
        if position.quantity == order.quantity {
            return Some(PositionUpdate::Close(position.id));
        }
        position.quantity -= order.quantity;
        // Average cost basis is unchanged by a partial sale.
        position.last_value = round_money(Decimal::from(position.quantity) * execution_price);
        position.updated_at = Utc::now();
        Some(PositionUpdate::Revise(position))
    }

    async fn reject(&self, order: &Order, reason: &str) -> AppResult<()> {
        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::Cancelled;
        self.store.update_order(&cancelled).await?;
        log::warn!("Order {} cancelled: {}", order.id, reason);
        Ok(())
    }
}
