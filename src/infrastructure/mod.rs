// src/infrastructure/mod.rs
pub mod quotes;
pub mod store;
