// src/domain/errors.rs
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejections raised when creating or mutating orders.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("unknown instrument {symbol} on {exchange}")]
    UnknownInstrument { symbol: String, exchange: String },

    #[error("order quantity must be positive")]
    InvalidQuantity,

    #[error("limit price must be positive")]
    InvalidPrice,

    #[error("insufficient funds: order requires {required}, balance is {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("insufficient position: selling {requested}, holding {held}")]
    InsufficientPosition { requested: u64, held: u64 },

    #[error("unknown order id {0}")]
    UnknownOrder(u64),
}

/// Transient quote-source failures. Logged per order and retried on the next
/// sweep tick; never fatal to the sweep.
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("quote unavailable: {0}")]
    Unavailable(String),

    #[error("quote request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed quote payload: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
}

// Result type aliases for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type QuoteResult<T> = Result<T, QuoteError>;
pub type StoreResult<T> = Result<T, StoreError>;
