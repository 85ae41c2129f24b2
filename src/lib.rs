// src/lib.rs

//! mintwatch library
//!
//! Polls an upstream token-creation feed, filters new tokens by the
//! creator's social reach, and relays qualifying launches to Telegram.

pub mod config;
pub mod enrich;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod store;
