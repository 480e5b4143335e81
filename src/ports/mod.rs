//! Port traits decoupling the language core from concrete hosts.

pub mod config_port;
pub mod data_port;
pub mod indicator_port;
pub mod report_port;
pub mod worker_port;
