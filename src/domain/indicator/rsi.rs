//! Relative strength index, incremental.
//!
//! Wilder's smoothing over price changes:
//! - first averages: simple mean of the gains/losses from the first
//!   `period` changes, available at bar index `period`
//! - afterwards: avg = (prev_avg * (period-1) + current) / period
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), with avg_loss == 0
//! mapping to 100 (all-loss series land on 0 through the formula).

use crate::domain::market::Candle;

use super::applied_price;

pub struct RsiState {
    period: usize,
    applied: i64,
    prev_price: f64,
    sum_gain: f64,
    sum_loss: f64,
    avg_gain: f64,
    avg_loss: f64,
    values: Vec<f64>,
}

impl RsiState {
    pub fn new(period: usize, applied: i64) -> Self {
        RsiState {
            period,
            applied,
            prev_price: 0.0,
            sum_gain: 0.0,
            sum_loss: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            values: Vec::new(),
        }
    }

    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + self.avg_gain / self.avg_loss)
        }
    }

    pub fn advance(&mut self, candles: &[Candle]) {
        for i in self.values.len()..candles.len() {
            let price = applied_price(&candles[i], self.applied);
            if i == 0 {
                self.prev_price = price;
                self.values.push(0.0);
                continue;
            }
            let change = price - self.prev_price;
            self.prev_price = price;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            let value = if i < self.period {
                self.sum_gain += gain;
                self.sum_loss += loss;
                0.0
            } else if i == self.period {
                self.sum_gain += gain;
                self.sum_loss += loss;
                self.avg_gain = self.sum_gain / self.period as f64;
                self.avg_loss = self.sum_loss / self.period as f64;
                self.rsi()
            } else {
                let n = self.period as f64;
                self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
                self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
                self.rsi()
            };
            self.values.push(value);
        }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}
