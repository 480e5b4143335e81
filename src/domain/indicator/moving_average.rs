//! Simple moving average, incremental.
//!
//! SMA(i) = sum(price[i-period+1 ..= i]) / period
//! Warmup: the first period-1 bars read 0.

use super::applied_price;
use crate::domain::market::Candle;

pub struct SmaState {
    period: usize,
    applied: i64,
    sum: f64,
    values: Vec<f64>,
}

impl SmaState {
    pub fn new(period: usize, applied: i64) -> Self {
        SmaState {
            period,
            applied,
            sum: 0.0,
            values: Vec::new(),
        }
    }

    /// Extend up to `candles.len()` bars, keeping a rolling window sum.
    pub fn advance(&mut self, candles: &[Candle]) {
        for i in self.values.len()..candles.len() {
            self.sum += applied_price(&candles[i], self.applied);
            if i >= self.period {
                self.sum -= applied_price(&candles[i - self.period], self.applied);
            }
            let value = if i + 1 >= self.period {
                self.sum / self.period as f64
            } else {
                0.0
            };
            self.values.push(value);
        }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::tests::candles_from_closes;
    use proptest::prelude::*;

    #[test]
    fn warmup_then_rolling_mean() {
        let candles = candles_from_closes(&[2.0, 4.0, 6.0, 8.0]);
        let mut state = SmaState::new(2, 0);
        state.advance(&candles);
        assert_eq!(state.value(0), 0.0);
        assert_eq!(state.value(1), 3.0);
        assert_eq!(state.value(2), 5.0);
        assert_eq!(state.value(3), 7.0);
        assert_eq!(state.value(4), 0.0);
    }

    #[test]
    fn period_one_tracks_price() {
        let candles = candles_from_closes(&[1.5, 2.5, 3.5]);
        let mut state = SmaState::new(1, 0);
        state.advance(&candles);
        for (i, c) in candles.iter().enumerate() {
            assert_eq!(state.value(i), c.close);
        }
    }

    #[test]
    fn uses_the_applied_price() {
        let candles = candles_from_closes(&[10.0, 20.0]);
        let mut state = SmaState::new(1, 2);
        state.advance(&candles);
        // applied 2 reads the high, which candles_from_closes sets to close + 0.5
        assert_eq!(state.value(1), 20.5);
    }

    proptest! {
        #[test]
        fn incremental_equals_full_recompute(
            closes in proptest::collection::vec(0.1f64..1000.0, 1..60),
            split in 0usize..60,
            period in 1usize..10,
        ) {
            let candles = candles_from_closes(&closes);
            let split = split.min(candles.len());

            let mut incremental = SmaState::new(period, 0);
            incremental.advance(&candles[..split]);
            incremental.advance(&candles);

            let mut full = SmaState::new(period, 0);
            full.advance(&candles);

            for i in 0..candles.len() {
                prop_assert!((incremental.value(i) - full.value(i)).abs() < 1e-9);
            }
        }
    }
}
