//! Average true range, incremental.
//!
//! TR(0) = high - low; TR(i) = max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR(period-1) = mean of the first period TRs
//! ATR(i) = (ATR(i-1) * (period-1) + TR(i)) / period afterwards (Wilder)

use crate::domain::market::Candle;

pub struct AtrState {
    period: usize,
    prev_close: f64,
    sum: f64,
    atr: f64,
    values: Vec<f64>,
}

impl AtrState {
    pub fn new(period: usize) -> Self {
        AtrState {
            period,
            prev_close: 0.0,
            sum: 0.0,
            atr: 0.0,
            values: Vec::new(),
        }
    }

    pub fn advance(&mut self, candles: &[Candle]) {
        for i in self.values.len()..candles.len() {
            let candle = &candles[i];
            let tr = if i == 0 {
                candle.high - candle.low
            } else {
                candle.true_range(self.prev_close)
            };
            self.prev_close = candle.close;
            let value = if i + 1 < self.period {
                self.sum += tr;
                0.0
            } else if i + 1 == self.period {
                self.sum += tr;
                self.atr = self.sum / self.period as f64;
                self.atr
            } else {
                self.atr = (self.atr * (self.period as f64 - 1.0) + tr) / self.period as f64;
                self.atr
            };
            self.values.push(value);
        }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}
