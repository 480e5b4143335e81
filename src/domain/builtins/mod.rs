//! Builtin function library: three lookup tiers behind one registry object.
//!
//! Lookup precedence is custom > env > core. The core tier holds pure,
//! environment-independent functions; the env tier holds the backtest
//! variants of quote, trading and terminal access (a live host would
//! register its own); the custom tier is caller-supplied and always wins.
//! The registry is constructed per runtime instance, so independent
//! interpreters never share registration state.

use std::collections::HashMap;
use std::rc::Rc;

use crate::domain::account::Account;
use crate::domain::broker::Broker;
use crate::domain::error::RuntimeError;
use crate::domain::indicator::IndicatorEngine;
use crate::domain::market::{Candle, MarketData};
use crate::domain::terminal::VirtualTerminal;
use crate::domain::value::{ArrayRef, Value};

mod arrays;
mod common;
mod datetime;
mod indicators;
mod math;
mod series;
mod session;
mod storage;
mod strings;
mod trading;

/// One builtin implementation. Boxed behind `Rc` so a lookup can hand the
/// caller a handle without borrowing the registry during the call.
pub type BuiltinFn = Rc<dyn Fn(&mut ExecutionEnv, &[Value]) -> Result<Value, RuntimeError>>;

pub type BuiltinMap = HashMap<String, BuiltinFn>;

/// Per-run custom-indicator surface. Everything `SetIndexBuffer` and
/// friends touch lives here rather than in shared module state, so
/// repeated or nested runs never leak buffers into each other.
#[derive(Default)]
pub struct IndicatorRunState {
    pub buffers: Vec<Option<ArrayRef>>,
    pub declared_buffers: usize,
    pub short_name: String,
    pub digits: i64,
    /// Bars already calculated when the current pass started; read back
    /// through `IndicatorCounted`.
    pub counted: i64,
    pub labels: std::collections::BTreeMap<i64, String>,
    pub styles: std::collections::BTreeMap<i64, (i64, i64, i64)>,
    pub levels: std::collections::BTreeMap<i64, f64>,
    pub hide_test_indicators: bool,
}

impl IndicatorRunState {
    pub fn bind_buffer(&mut self, index: usize, buffer: ArrayRef) {
        if self.buffers.len() <= index {
            self.buffers.resize(index + 1, None);
        }
        self.buffers[index] = Some(buffer);
    }

    pub fn buffer(&self, index: usize) -> Option<&ArrayRef> {
        self.buffers.get(index).and_then(|b| b.as_ref())
    }
}

const RAND_SEED: u64 = 1;

/// Everything a builtin can observe or mutate during one run: the
/// simulation objects plus the quote, error and random-state slots.
pub struct ExecutionEnv {
    pub account: Account,
    pub broker: Broker,
    pub market: MarketData,
    pub terminal: VirtualTerminal,
    pub engine: IndicatorEngine,
    pub indicator: IndicatorRunState,
    pub symbol: String,
    /// Chart timeframe in minutes.
    pub timeframe: i64,
    pub digits: i64,
    pub point: f64,
    pub bid: f64,
    pub ask: f64,
    pub selected_ticket: Option<i64>,
    pub last_error: i64,
    pub stop_flag: bool,
    pub rand_state: u64,
}

impl ExecutionEnv {
    pub fn new(symbol: &str, timeframe: i64, engine: IndicatorEngine) -> Self {
        let mut market = MarketData::new();
        market.select(symbol, true);
        ExecutionEnv {
            account: Account::default(),
            broker: Broker::new(),
            market,
            terminal: VirtualTerminal::new(),
            engine,
            indicator: IndicatorRunState::default(),
            symbol: symbol.to_string(),
            timeframe,
            digits: 5,
            point: 1e-5,
            bid: 0.0,
            ask: 0.0,
            selected_ticket: None,
            last_error: 0,
            stop_flag: false,
            rand_state: RAND_SEED,
        }
    }

    /// Quote side an order of `cmd` kind fills at: buys at ask, sells at
    /// bid.
    pub fn fill_price(&self, is_buy: bool) -> f64 {
        if is_buy { self.ask } else { self.bid }
    }
}

/// The candles of `(symbol, timeframe)` visible at `now`. Series data is
/// installed for the whole run up front; slicing by time is what keeps a
/// script from reading bars that have not happened yet.
pub(crate) fn visible<'a>(
    market: &'a MarketData,
    symbol: &str,
    timeframe: i64,
    now: i64,
) -> &'a [Candle] {
    let candles = market.candles(symbol, timeframe);
    let end = candles.partition_point(|c| c.time <= now);
    &candles[..end]
}

/// Three-tier builtin registry. Constructed per runtime; never shared.
#[derive(Default)]
pub struct BuiltinRegistry {
    core: BuiltinMap,
    env: BuiltinMap,
    custom: BuiltinMap,
}

impl BuiltinRegistry {
    /// Core tier only; an embedding host registers its own env tier.
    pub fn new() -> Self {
        BuiltinRegistry {
            core: core_builtins(),
            env: BuiltinMap::new(),
            custom: BuiltinMap::new(),
        }
    }

    /// Core plus the simulated backtest environment.
    pub fn for_backtest() -> Self {
        let mut registry = BuiltinRegistry::new();
        registry.register_env(backtest_env_builtins());
        registry
    }

    /// Install or replace the environment tier wholesale.
    pub fn register_env(&mut self, map: BuiltinMap) {
        self.env = map;
    }

    /// Merge into the custom tier; last write per name wins. There is no
    /// unregister: custom builtins are additive run configuration.
    pub fn register_custom(&mut self, map: BuiltinMap) {
        self.custom.extend(map);
    }

    pub fn lookup(&self, name: &str) -> Option<BuiltinFn> {
        self.custom
            .get(name)
            .or_else(|| self.env.get(name))
            .or_else(|| self.core.get(name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name) || self.env.contains_key(name) || self.core.contains_key(name)
    }

    /// Every registered name, core and env tiers. Used to verify that no
    /// builtin ships without a signature entry.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.core
            .keys()
            .chain(self.env.keys())
            .chain(self.custom.keys())
            .map(String::as_str)
    }
}

pub fn core_builtins() -> BuiltinMap {
    let mut map = BuiltinMap::new();
    common::install(&mut map);
    math::install(&mut map);
    strings::install(&mut map);
    datetime::install(&mut map);
    arrays::install(&mut map);
    map
}

pub fn backtest_env_builtins() -> BuiltinMap {
    let mut map = BuiltinMap::new();
    session::install(&mut map);
    series::install(&mut map);
    trading::install(&mut map);
    indicators::install(&mut map);
    storage::install(&mut map);
    map
}

pub(crate) fn put(
    map: &mut BuiltinMap,
    name: &str,
    f: impl Fn(&mut ExecutionEnv, &[Value]) -> Result<Value, RuntimeError> + 'static,
) {
    map.insert(name.to_string(), Rc::new(f));
}

// -- argument access -------------------------------------------------------
//
// Arity was checked at compile time; missing optional arguments read as
// zero / empty so every accessor stays total.

pub(crate) fn num(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(0.0, Value::as_f64)
}

pub(crate) fn int(args: &[Value], i: usize) -> i64 {
    args.get(i).map_or(0, Value::as_i64)
}

pub(crate) fn int_or(args: &[Value], i: usize, default: i64) -> i64 {
    args.get(i).map_or(default, Value::as_i64)
}

pub(crate) fn text(args: &[Value], i: usize) -> String {
    args.get(i).map_or_else(String::new, Value::to_string)
}

pub(crate) fn array(name: &str, args: &[Value], i: usize) -> Result<ArrayRef, RuntimeError> {
    match args.get(i) {
        Some(Value::Array(a)) => Ok(Rc::clone(a)),
        _ => Err(RuntimeError::new(format!(
            "{name} expects an array argument"
        ))),
    }
}

/// The symbol an empty or zero symbol argument resolves to.
pub(crate) fn symbol_arg(env: &ExecutionEnv, args: &[Value], i: usize) -> String {
    match args.get(i) {
        Some(Value::Str(s)) if !s.is_empty() => s.clone(),
        _ => env.symbol.clone(),
    }
}

/// The timeframe a zero timeframe argument resolves to.
pub(crate) fn timeframe_arg(env: &ExecutionEnv, args: &[Value], i: usize) -> i64 {
    match int(args, i) {
        0 => env.timeframe,
        tf => tf,
    }
}
