//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod universe;
pub mod report;
pub mod scanner;
pub mod config_validation;
pub mod error;
