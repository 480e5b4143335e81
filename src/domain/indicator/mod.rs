//! Incremental technical indicators behind a per-run cache.
//!
//! Each cache entry owns indicator-specific state plus the index of the
//! most recently computed bar, so advancing one bar costs constant work.
//! Resuming from that index must produce the same values a full
//! recomputation would (each indicator module tests this).
//!
//! The engine couples the cache with an [`IndicatorSource`] so custom
//! indicator programs resolve by name independently of cached state.

pub mod atr;
pub mod custom;
pub mod macd;
pub mod moving_average;
pub mod rsi;

use std::collections::HashMap;
use std::rc::Rc;

use crate::ports::indicator_port::IndicatorSource;

use super::market::Candle;
use super::value::Value;
use atr::AtrState;
use custom::CustomState;
use macd::MacdState;
use moving_average::SmaState;
use rsi::RsiState;

/// Applied-price codes: 0 close, 1 open, 2 high, 3 low, 4 median,
/// 5 typical, 6 weighted.
pub fn applied_price(candle: &Candle, applied: i64) -> f64 {
    match applied {
        1 => candle.open,
        2 => candle.high,
        3 => candle.low,
        4 => (candle.high + candle.low) / 2.0,
        5 => (candle.high + candle.low + candle.close) / 3.0,
        6 => (candle.high + candle.low + 2.0 * candle.close) / 4.0,
        _ => candle.close,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Ma,
    Macd,
    Atr,
    Rsi,
    Custom(String),
}

/// Cache key: indicator identity plus every state-affecting parameter.
/// Fractional parameters are scaled to i64 so the key stays hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub kind: IndicatorKind,
    pub symbol: String,
    pub timeframe: i64,
    pub params: Vec<i64>,
}

/// Key form of a fractional parameter, exact to six decimal places.
pub fn scale_param(v: f64) -> i64 {
    (v * 1e6).round() as i64
}

pub enum IndicatorState {
    Sma(SmaState),
    Macd(MacdState),
    Atr(AtrState),
    Rsi(RsiState),
    Custom(CustomState),
}

impl IndicatorState {
    fn advance(&mut self, candles: &[Candle]) {
        match self {
            IndicatorState::Sma(s) => s.advance(candles),
            IndicatorState::Macd(s) => s.advance(candles),
            IndicatorState::Atr(s) => s.advance(candles),
            IndicatorState::Rsi(s) => s.advance(candles),
            // custom programs advance through the engine, not here
            IndicatorState::Custom(_) => {}
        }
    }

    fn value(&self, mode: i64, index: usize) -> f64 {
        match self {
            IndicatorState::Sma(s) => s.value(index),
            IndicatorState::Macd(s) => s.value(mode, index),
            IndicatorState::Atr(s) => s.value(index),
            IndicatorState::Rsi(s) => s.value(index),
            IndicatorState::Custom(s) => s.value(mode, index),
        }
    }
}

pub struct CacheEntry {
    pub state: IndicatorState,
    /// Index of the most recently computed bar, -1 before the first.
    pub last: i64,
}

#[derive(Default)]
pub struct IndicatorCache {
    entries: HashMap<IndicatorKey, CacheEntry>,
}

impl IndicatorCache {
    pub fn get_or_create(
        &mut self,
        key: IndicatorKey,
        init: impl FnOnce() -> IndicatorState,
    ) -> &mut CacheEntry {
        self.entries.entry(key).or_insert_with(|| CacheEntry {
            state: init(),
            last: -1,
        })
    }

    pub fn peek(&self, key: &IndicatorKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &IndicatorKey) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct IndicatorEngine {
    cache: IndicatorCache,
    source: Rc<dyn IndicatorSource>,
}

impl IndicatorEngine {
    pub fn new(source: Rc<dyn IndicatorSource>) -> Self {
        IndicatorEngine {
            cache: IndicatorCache::default(),
            source,
        }
    }

    pub fn cache(&self) -> &IndicatorCache {
        &self.cache
    }

    pub fn resolve_source(&self, name: &str) -> Option<String> {
        self.source.source(name)
    }

    /// Shared handle to the source resolver, for nested custom-indicator
    /// runs.
    pub fn source_handle(&self) -> Rc<dyn IndicatorSource> {
        Rc::clone(&self.source)
    }

    /// Simple moving average over the applied price. `ma_shift` displaces
    /// the whole line; negative `shift` clamps to the latest bar.
    pub fn ma(
        &mut self,
        visible: &[Candle],
        symbol: &str,
        timeframe: i64,
        period: i64,
        ma_shift: i64,
        applied: i64,
        shift: i64,
    ) -> f64 {
        if period <= 0 {
            return 0.0;
        }
        let key = IndicatorKey {
            kind: IndicatorKind::Ma,
            symbol: symbol.to_string(),
            timeframe,
            params: vec![period, applied],
        };
        let entry = self.cache.get_or_create(key, || {
            IndicatorState::Sma(SmaState::new(period as usize, applied))
        });
        Self::read(entry, visible, 0, shift.max(0) + ma_shift)
    }

    /// MACD value by mode: 0 main, 1 signal, 2 histogram.
    #[allow(clippy::too_many_arguments)]
    pub fn macd(
        &mut self,
        visible: &[Candle],
        symbol: &str,
        timeframe: i64,
        fast: i64,
        slow: i64,
        signal: i64,
        applied: i64,
        mode: i64,
        shift: i64,
    ) -> f64 {
        if fast <= 0 || slow <= 0 || signal <= 0 {
            return 0.0;
        }
        let key = IndicatorKey {
            kind: IndicatorKind::Macd,
            symbol: symbol.to_string(),
            timeframe,
            params: vec![fast, slow, signal, applied],
        };
        let entry = self.cache.get_or_create(key, || {
            IndicatorState::Macd(MacdState::new(
                fast as usize,
                slow as usize,
                signal as usize,
                applied,
            ))
        });
        Self::read(entry, visible, mode, shift)
    }

    pub fn atr(
        &mut self,
        visible: &[Candle],
        symbol: &str,
        timeframe: i64,
        period: i64,
        shift: i64,
    ) -> f64 {
        if period <= 0 {
            return 0.0;
        }
        let key = IndicatorKey {
            kind: IndicatorKind::Atr,
            symbol: symbol.to_string(),
            timeframe,
            params: vec![period],
        };
        let entry = self
            .cache
            .get_or_create(key, || IndicatorState::Atr(AtrState::new(period as usize)));
        Self::read(entry, visible, 0, shift)
    }

    pub fn rsi(
        &mut self,
        visible: &[Candle],
        symbol: &str,
        timeframe: i64,
        period: i64,
        applied: i64,
        shift: i64,
    ) -> f64 {
        if period <= 0 {
            return 0.0;
        }
        let key = IndicatorKey {
            kind: IndicatorKind::Rsi,
            symbol: symbol.to_string(),
            timeframe,
            params: vec![period, applied],
        };
        let entry = self.cache.get_or_create(key, || {
            IndicatorState::Rsi(RsiState::new(period as usize, applied))
        });
        Self::read(entry, visible, 0, shift)
    }

    /// Buffer value of a named custom indicator program. The program is
    /// compiled once per parameter set, driven incrementally bar by bar in
    /// an isolated nested runtime, and read by buffer index. An unknown
    /// name, a broken program or a failed run all read as 0.
    pub fn custom(
        &mut self,
        visible: &[Candle],
        symbol: &str,
        timeframe: i64,
        name: &str,
        params: &[Value],
        mode: i64,
        shift: i64,
    ) -> f64 {
        if visible.is_empty() {
            return 0.0;
        }
        let key = IndicatorKey {
            kind: IndicatorKind::Custom(name.to_string()),
            symbol: symbol.to_string(),
            timeframe,
            params: params.iter().map(|p| scale_param(p.as_f64())).collect(),
        };
        if self.cache.peek(&key).is_none() {
            let Some(text) = self.source.source(name) else {
                return 0.0;
            };
            let Ok(state) =
                CustomState::new(&text, params, symbol, timeframe, Rc::clone(&self.source))
            else {
                return 0.0;
            };
            self.cache
                .get_or_create(key.clone(), move || IndicatorState::Custom(state));
        }
        let Some(entry) = self.cache.get_mut(&key) else {
            return 0.0;
        };
        let latest = visible.len() as i64 - 1;
        if entry.last < latest {
            if let IndicatorState::Custom(state) = &mut entry.state {
                state.advance(visible);
            }
            entry.last = latest;
        }
        let index = latest - shift.max(0);
        if index < 0 {
            return 0.0;
        }
        entry.state.value(mode, index as usize)
    }

    fn read(entry: &mut CacheEntry, visible: &[Candle], mode: i64, shift: i64) -> f64 {
        if visible.is_empty() {
            return 0.0;
        }
        let latest = visible.len() as i64 - 1;
        if entry.last < latest {
            entry.state.advance(visible);
            entry.last = latest;
        }
        let index = latest - shift.max(0);
        if index < 0 {
            return 0.0;
        }
        entry.state.value(mode, index as usize)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::memory_indicator_source::MemoryIndicatorSource;

    pub(crate) fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                time: 60 * i as i64,
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1,
            })
            .collect()
    }

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new(Rc::new(MemoryIndicatorSource::default()))
    }

    #[test]
    fn ma_matches_hand_computed_values() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut engine = engine();
        // latest three closes: (3+4+5)/3
        let v = engine.ma(&candles, "EURUSD", 1, 3, 0, 0, 0);
        assert!((v - 4.0).abs() < 1e-12);
        // shift 1: (2+3+4)/3
        let v = engine.ma(&candles, "EURUSD", 1, 3, 0, 0, 1);
        assert!((v - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ma_is_zero_until_warm() {
        let candles = candles_from_closes(&[1.0, 2.0]);
        let mut engine = engine();
        assert_eq!(engine.ma(&candles, "EURUSD", 1, 3, 0, 0, 0), 0.0);
    }

    #[test]
    fn negative_shift_clamps_to_latest() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let mut engine = engine();
        let latest = engine.ma(&candles, "EURUSD", 1, 2, 0, 0, 0);
        assert_eq!(engine.ma(&candles, "EURUSD", 1, 2, 0, 0, -5), latest);
    }

    #[test]
    fn shift_past_history_reads_zero() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let mut engine = engine();
        assert_eq!(engine.ma(&candles, "EURUSD", 1, 2, 0, 0, 99), 0.0);
    }

    #[test]
    fn ma_shift_displaces_the_line() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut engine = engine();
        let shifted = engine.ma(&candles, "EURUSD", 1, 3, 1, 0, 0);
        let unshifted = engine.ma(&candles, "EURUSD", 1, 3, 0, 0, 1);
        assert_eq!(shifted, unshifted);
    }

    #[test]
    fn equal_parameters_share_one_cache_entry() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        let mut engine = engine();
        engine.ma(&candles, "EURUSD", 1, 2, 0, 0, 0);
        engine.ma(&candles, "EURUSD", 1, 2, 0, 0, 1);
        assert_eq!(engine.cache().len(), 1);
        engine.ma(&candles, "EURUSD", 1, 3, 0, 0, 0);
        assert_eq!(engine.cache().len(), 2);
        engine.ma(&candles, "GBPUSD", 1, 2, 0, 0, 0);
        assert_eq!(engine.cache().len(), 3);
    }

    #[test]
    fn growing_series_reuses_cached_prefix() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut engine = engine();
        let mut grown = Vec::new();
        for i in 1..=candles.len() {
            grown.push(engine.ma(&candles[..i], "EURUSD", 1, 3, 0, 0, 0));
        }
        let mut fresh = engine;
        let full: Vec<f64> = (0..candles.len())
            .rev()
            .map(|shift| fresh.ma(&candles, "X", 1, 3, 0, 0, shift as i64))
            .collect();
        for (a, b) in grown.iter().zip(full.iter()) {
            assert!((a - b).abs() < 1e-9, "incremental {a} != full {b}");
        }
    }

    #[test]
    fn applied_price_codes() {
        let c = Candle {
            time: 0,
            open: 2.0,
            high: 10.0,
            low: 4.0,
            close: 6.0,
            volume: 1,
        };
        assert_eq!(applied_price(&c, 0), 6.0);
        assert_eq!(applied_price(&c, 1), 2.0);
        assert_eq!(applied_price(&c, 2), 10.0);
        assert_eq!(applied_price(&c, 3), 4.0);
        assert_eq!(applied_price(&c, 4), 7.0);
        assert!((applied_price(&c, 5) - 20.0 / 3.0).abs() < 1e-12);
        assert_eq!(applied_price(&c, 6), 6.5);
    }

    #[test]
    fn key_equality_is_by_value() {
        let a = IndicatorKey {
            kind: IndicatorKind::Custom("x".into()),
            symbol: "EURUSD".into(),
            timeframe: 60,
            params: vec![1, 2],
        };
        let b = IndicatorKey {
            kind: IndicatorKind::Custom("x".into()),
            symbol: "EURUSD".into(),
            timeframe: 60,
            params: vec![1, 2],
        };
        assert_eq!(a, b);
        let c = IndicatorKey {
            params: vec![1, 3],
            ..b.clone()
        };
        assert_ne!(a, c);
    }
}
