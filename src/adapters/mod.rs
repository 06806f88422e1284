//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod formula_file_adapter;
pub mod text_report_adapter;
pub mod universe_file_adapter;
