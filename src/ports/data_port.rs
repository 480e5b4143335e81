//! Price-series access port.

use crate::domain::error::MqlError;
use crate::domain::market::{Candle, Tick};

/// Port for loading the price history a backtest runs against.
pub trait DataPort {
    fn load_candles(&self, path: &str) -> Result<Vec<Candle>, MqlError>;

    fn load_ticks(&self, path: &str) -> Result<Vec<Tick>, MqlError>;
}
