//! Concrete hosts for the port traits.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod memory_indicator_source;
pub mod text_report_adapter;
pub mod worker_adapter;
