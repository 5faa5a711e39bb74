//! services/bot/src/lib.rs
//!
//! The LifeLine bot service: configuration, adapters for PostgreSQL, Telegram and
//! the intent LLM, and the axum webhook surface. The binaries wire these to the
//! scheduler from `lifeline_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
