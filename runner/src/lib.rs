//! Shared helpers for the `binmm-backtest` and `binmm-live` binaries.

pub mod common;
