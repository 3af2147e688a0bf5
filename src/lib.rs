//! Time-lagged correlation analysis for asset return series.
//!
//! The pipeline prepares market-adjusted log returns at daily, weekly and
//! monthly timeframes, scans every ordered asset pair for significant
//! lagged correlations, backtests the surviving relationships, and on each
//! trading day flags the assets that moved enough to act as triggers,
//! ranking their historical response candidates.

pub mod analysis;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;

pub use config::AppConfig;
pub use error::{LagError, Result};
