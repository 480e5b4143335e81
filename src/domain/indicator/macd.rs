//! MACD, incremental.
//!
//! Main = EMA(fast) - EMA(slow)
//! Signal = EMA(signal) of the main line
//! Histogram = Main - Signal
//!
//! Every EMA uses k = 2/(n+1) and is seeded with its first input. Values
//! read 0 until bar index max(fast, slow).

use super::applied_price;
use crate::domain::market::Candle;

const MODE_MAIN: i64 = 0;
const MODE_SIGNAL: i64 = 1;

pub struct MacdState {
    fast: usize,
    slow: usize,
    applied: i64,
    fast_k: f64,
    slow_k: f64,
    signal_k: f64,
    fast_ema: f64,
    slow_ema: f64,
    signal_ema: f64,
    main: Vec<f64>,
    signal: Vec<f64>,
}

impl MacdState {
    pub fn new(fast: usize, slow: usize, signal: usize, applied: i64) -> Self {
        MacdState {
            fast,
            slow,
            applied,
            fast_k: 2.0 / (fast as f64 + 1.0),
            slow_k: 2.0 / (slow as f64 + 1.0),
            signal_k: 2.0 / (signal as f64 + 1.0),
            fast_ema: 0.0,
            slow_ema: 0.0,
            signal_ema: 0.0,
            main: Vec::new(),
            signal: Vec::new(),
        }
    }

    pub fn advance(&mut self, candles: &[Candle]) {
        let warm = self.fast.max(self.slow);
        for i in self.main.len()..candles.len() {
            let price = applied_price(&candles[i], self.applied);
            if i == 0 {
                self.fast_ema = price;
                self.slow_ema = price;
            } else {
                self.fast_ema = price * self.fast_k + self.fast_ema * (1.0 - self.fast_k);
                self.slow_ema = price * self.slow_k + self.slow_ema * (1.0 - self.slow_k);
            }
            let raw = self.fast_ema - self.slow_ema;
            if i == 0 {
                self.signal_ema = raw;
            } else {
                self.signal_ema = raw * self.signal_k + self.signal_ema * (1.0 - self.signal_k);
            }
            if i >= warm {
                self.main.push(raw);
                self.signal.push(self.signal_ema);
            } else {
                self.main.push(0.0);
                self.signal.push(0.0);
            }
        }
    }

    pub fn value(&self, mode: i64, index: usize) -> f64 {
        match mode {
            MODE_MAIN => self.main.get(index).copied().unwrap_or(0.0),
            MODE_SIGNAL => self.signal.get(index).copied().unwrap_or(0.0),
            _ => {
                let main = self.main.get(index).copied().unwrap_or(0.0);
                let signal = self.signal.get(index).copied().unwrap_or(0.0);
                main - signal
            }
        }
    }
}
