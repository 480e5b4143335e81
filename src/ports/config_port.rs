//! Configuration access port.

/// Typed access to run configuration, keyed by INI-style section and key.
/// The backtest loader reads its deposit, symbol and spread settings
/// through this so tests can substitute a literal map for a file.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
