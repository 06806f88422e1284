//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod formula;
pub mod formula_loader;
pub mod panel;
pub mod screener;
pub mod ranking;
pub mod universe;
pub mod config_validation;
pub mod error;
