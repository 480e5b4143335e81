//! Market data: tick history, candle series and symbol selection.

use std::collections::{BTreeSet, HashMap};

/// One quote. Times are unix seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
}

/// One aggregated bar. Times are unix seconds of the bar open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Candle {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

#[derive(Debug, Clone, Default)]
struct TickSeries {
    ticks: Vec<Tick>,
    cursor: usize,
}

/// Per-symbol tick and candle storage for one run.
///
/// Tick lookup keeps an advancing cursor per symbol. Lookups during a run
/// move forward in time, so the scan is amortized constant; a query before
/// the cursor restarts it from zero.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    ticks: HashMap<String, TickSeries>,
    candles: HashMap<(String, i64), Vec<Candle>>,
    symbols: BTreeSet<String>,
    selected: Vec<String>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ticks(&mut self, symbol: &str, mut ticks: Vec<Tick>) {
        ticks.sort_by_key(|t| t.time);
        self.symbols.insert(symbol.to_string());
        self.ticks
            .insert(symbol.to_string(), TickSeries { ticks, cursor: 0 });
    }

    pub fn set_candles(&mut self, symbol: &str, timeframe: i64, candles: Vec<Candle>) {
        self.symbols.insert(symbol.to_string());
        self.candles
            .insert((symbol.to_string(), timeframe), candles);
    }

    /// Append one candle to a series. Nested indicator runs grow their
    /// private market bar by bar instead of re-installing the whole series.
    pub fn push_candle(&mut self, symbol: &str, timeframe: i64, candle: Candle) {
        self.symbols.insert(symbol.to_string());
        self.candles
            .entry((symbol.to_string(), timeframe))
            .or_default()
            .push(candle);
    }

    pub fn candles(&self, symbol: &str, timeframe: i64) -> &[Candle] {
        self.candles
            .get(&(symbol.to_string(), timeframe))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest tick at or before `time`, or None before the first tick.
    pub fn tick_at_or_before(&mut self, symbol: &str, time: i64) -> Option<Tick> {
        let series = self.ticks.get_mut(symbol)?;
        if series.cursor > 0
            && series
                .ticks
                .get(series.cursor - 1)
                .is_some_and(|t| t.time > time)
        {
            series.cursor = 0;
        }
        while series
            .ticks
            .get(series.cursor)
            .is_some_and(|t| t.time <= time)
        {
            series.cursor += 1;
        }
        if series.cursor == 0 {
            None
        } else {
            Some(series.ticks[series.cursor - 1])
        }
    }

    pub fn select(&mut self, symbol: &str, select: bool) -> bool {
        if select {
            self.symbols.insert(symbol.to_string());
            if !self.selected.iter().any(|s| s == symbol) {
                self.selected.push(symbol.to_string());
            }
        } else {
            self.selected.retain(|s| s != symbol);
        }
        true
    }

    pub fn symbols_total(&self, selected_only: bool) -> usize {
        if selected_only {
            self.selected.len()
        } else {
            self.symbols.len()
        }
    }

    /// Name by index: selection in insertion order, the full set sorted.
    pub fn symbol_name(&self, index: usize, selected_only: bool) -> Option<&str> {
        if selected_only {
            self.selected.get(index).map(String::as_str)
        } else {
            self.symbols.iter().nth(index).map(String::as_str)
        }
    }
}

/// Aggregate ticks into fixed buckets. Bid drives OHLC, volume counts ticks.
pub fn ticks_to_candles(ticks: &[Tick], bucket_seconds: i64) -> Vec<Candle> {
    let mut sorted: Vec<&Tick> = ticks.iter().collect();
    sorted.sort_by_key(|t| t.time);
    let mut candles: Vec<Candle> = Vec::new();
    for tick in sorted {
        let bucket = tick.time.div_euclid(bucket_seconds) * bucket_seconds;
        match candles.last_mut() {
            Some(last) if last.time == bucket => {
                last.high = last.high.max(tick.bid);
                last.low = last.low.min(tick.bid);
                last.close = tick.bid;
                last.volume += 1;
            }
            _ => candles.push(Candle {
                time: bucket,
                open: tick.bid,
                high: tick.bid,
                low: tick.bid,
                close: tick.bid,
                volume: 1,
            }),
        }
    }
    candles
}
