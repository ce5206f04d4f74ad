//! RelayLink firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod fsm;
pub mod gateway;
pub mod monitor;
pub mod relay;
pub mod scheduler;
pub mod store;

mod error;
pub mod pins;

pub use error::{Error, Result};
