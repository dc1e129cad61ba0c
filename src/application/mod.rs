// src/application/mod.rs
pub mod portfolio;
pub mod settlement;
pub mod sweep;
