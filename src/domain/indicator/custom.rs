//! Nested execution of named custom indicator programs.
//!
//! `iCustom` resolves a program by name, compiles it once per parameter
//! set, and drives it bar by bar inside a private runtime with its own
//! market, terminal and buffer bindings. The outer chart reads results
//! through the buffers the program bound with `SetIndexBuffer`, by
//! physical index from the oldest bar.

use std::cell::Cell;
use std::rc::Rc;

use crate::domain::builtins::{BuiltinRegistry, ExecutionEnv};
use crate::domain::chart::{install_session_globals, ChartSeries};
use crate::domain::error::RuntimeError;
use crate::domain::market::Candle;
use crate::domain::runtime::Runtime;
use crate::domain::semantics;
use crate::domain::value::Value;
use crate::ports::indicator_port::IndicatorSource;

use super::IndicatorEngine;

/// Deepest allowed `iCustom` chain. A program reading itself through
/// `iCustom` would otherwise recurse without bound; past this depth the
/// innermost run is marked failed and reads 0.
const MAX_NESTING: usize = 8;

thread_local! {
    static NESTING: Cell<usize> = Cell::new(0);
}

/// One compiled custom indicator program and everything it runs against.
/// Owned by the indicator cache, keyed by name, symbol, timeframe and
/// parameter set.
pub struct CustomState {
    rt: Runtime,
    env: ExecutionEnv,
    series: ChartSeries,
    params: Vec<Value>,
    symbol: String,
    timeframe: i64,
    prev_calculated: i64,
    initialized: bool,
    failed: bool,
}

impl CustomState {
    /// Compile and load the program. Parameters beyond the declared inputs
    /// are accepted and ignored, matching `Runtime::set_input`.
    pub fn new(
        source: &str,
        params: &[Value],
        symbol: &str,
        timeframe: i64,
        sources: Rc<dyn IndicatorSource>,
    ) -> Result<CustomState, String> {
        let compiled = semantics::compile(source);
        if !compiled.is_ok() {
            return Err(compiled.errors.join("\n"));
        }
        let mut rt =
            Runtime::load(compiled, BuiltinRegistry::for_backtest()).map_err(|e| e.to_string())?;
        let env = ExecutionEnv::new(symbol, timeframe, IndicatorEngine::new(sources));
        let series = ChartSeries::new();
        series.install(&mut rt);
        install_session_globals(&mut rt, &env);
        Ok(CustomState {
            rt,
            env,
            series,
            params: params.to_vec(),
            symbol: symbol.to_string(),
            timeframe,
            prev_calculated: 0,
            initialized: false,
            failed: false,
        })
    }

    /// Run any bars not yet seen. Failures are sticky: one error stops the
    /// program for the rest of the run and every buffer reads 0.
    pub fn advance(&mut self, visible: &[Candle]) {
        if self.failed || self.series.bars >= visible.len() {
            return;
        }
        let depth = NESTING.with(|d| {
            d.set(d.get() + 1);
            d.get()
        });
        if depth > MAX_NESTING {
            self.failed = true;
        } else {
            for i in self.series.bars..visible.len() {
                if let Err(e) = self.step(&visible[i]) {
                    self.env
                        .terminal
                        .print(format!("custom indicator stopped: {e}"));
                    self.failed = true;
                    break;
                }
            }
        }
        NESTING.with(|d| d.set(d.get() - 1));
    }

    fn step(&mut self, candle: &Candle) -> Result<(), RuntimeError> {
        self.series.push(candle);
        self.env
            .market
            .push_candle(&self.symbol, self.timeframe, *candle);
        self.env.terminal.set_clock(candle.time);
        self.env.bid = candle.close;
        self.env.ask = candle.close;
        let bars = self.series.bars as i64;
        self.rt.set_global("Bars", Value::int(bars), "int");
        self.rt.set_global("Bid", Value::Double(self.env.bid), "double");
        self.rt.set_global("Ask", Value::Double(self.env.ask), "double");
        if !self.initialized {
            self.initialized = true;
            self.rt.init_globals(&mut self.env)?;
            for (i, param) in self.params.iter().enumerate() {
                self.rt.set_input(i, param)?;
            }
            if let Some(init) = self.rt.init_handler() {
                let status = self.rt.call_function(&mut self.env, init, &[])?;
                if status.as_i64() != 0 {
                    return Err(RuntimeError::new("init handler returned a failure status"));
                }
            }
        }
        // the terminal keeps every bound buffer sized to the bar count,
        // whatever the program did to it since the last pass
        for slot in self.env.indicator.buffers.iter().flatten() {
            slot.borrow_mut().resize(self.series.bars, Value::Double(0.0));
        }
        self.env.indicator.counted = self.prev_calculated;
        let entry = self.rt.entry_point();
        let result = if entry == "OnCalculate" {
            let args = self
                .series
                .calculate_args(self.prev_calculated, self.rt.max_params("OnCalculate"));
            self.rt.call_function(&mut self.env, entry, &args)?
        } else {
            self.rt.call_function(&mut self.env, entry, &[])?
        };
        self.prev_calculated = if entry == "OnCalculate" {
            result.as_i64().clamp(0, bars)
        } else {
            bars
        };
        self.rt
            .set_global("_LastError", Value::int(self.env.last_error), "int");
        Ok(())
    }

    /// Physical read of a bound buffer; `index` counts from the oldest bar.
    /// Unbound modes and failed programs read 0.
    pub fn value(&self, mode: i64, index: usize) -> f64 {
        if self.failed || mode < 0 {
            return 0.0;
        }
        match self.env.indicator.buffer(mode as usize) {
            Some(buffer) => buffer.borrow().get_physical(index).as_f64(),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_indicator_source::MemoryIndicatorSource;
    use crate::domain::indicator::tests::candles_from_closes;

    const DOUBLER: &str = "
double Line[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Line); return 0; }
int OnCalculate(const int rates_total, const int prev_calculated) {
   int i;
   for (i = 0; i < Bars; i++) Line[i] = Close[i] * 2;
   return rates_total;
}
";

    fn state_for(source: &str, params: &[Value]) -> CustomState {
        let sources: Rc<dyn IndicatorSource> = Rc::new(MemoryIndicatorSource::new());
        CustomState::new(source, params, "EURUSD", 60, sources).unwrap()
    }

    #[test]
    fn buffers_track_the_program_output() {
        let mut state = state_for(DOUBLER, &[]);
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        state.advance(&candles);
        assert_eq!(state.value(0, 0), 2.0);
        assert_eq!(state.value(0, 2), 6.0);
        assert_eq!(state.value(1, 0), 0.0, "unbound buffer reads zero");
    }

    #[test]
    fn prev_calculated_follows_the_returned_count() {
        let source = "
double Marks[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Marks); return 0; }
int OnCalculate(const int rates_total, const int prev_calculated) {
   Marks[0] = prev_calculated;
   return rates_total;
}
";
        let mut state = state_for(source, &[]);
        let candles = candles_from_closes(&[1.0, 1.0, 1.0, 1.0]);
        state.advance(&candles[..2]);
        state.advance(&candles);
        // bar b runs with prev_calculated == b and writes it at the newest
        // logical slot, physical position b
        for b in 0..4 {
            assert_eq!(state.value(0, b), b as f64);
        }
    }

    #[test]
    fn params_override_declared_inputs() {
        let source = "
input double Scale = 1.0;
double Line[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Line); return 0; }
int OnCalculate() { Line[0] = Scale; return Bars; }
";
        let mut state = state_for(source, &[Value::Double(2.5)]);
        state.advance(&candles_from_closes(&[1.0]));
        assert_eq!(state.value(0, 0), 2.5);
    }

    #[test]
    fn compile_errors_surface_from_new() {
        let sources: Rc<dyn IndicatorSource> = Rc::new(MemoryIndicatorSource::new());
        let state = CustomState::new("int OnCalculate( {", &[], "EURUSD", 60, sources);
        assert!(state.is_err());
    }

    #[test]
    fn a_runtime_error_marks_the_program_failed() {
        let source = "
double Line[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Line); return 0; }
int OnCalculate() {
   Line[0] = Close[0];
   if (Bars > 1) Missing();
   return Bars;
}
";
        let mut state = state_for(source, &[]);
        state.advance(&candles_from_closes(&[1.0, 2.0, 3.0]));
        assert_eq!(state.value(0, 0), 0.0, "failed programs read zero everywhere");
    }

    #[test]
    fn an_init_failure_status_stops_the_run() {
        let source = "
double Line[];
int OnInit() { SetIndexBuffer(0, Line); return INIT_FAILED; }
int OnCalculate() { Line[0] = 9; return Bars; }
";
        let mut state = state_for(source, &[]);
        state.advance(&candles_from_closes(&[1.0]));
        assert_eq!(state.value(0, 0), 0.0);
    }

    #[test]
    fn nested_programs_resolve_through_the_shared_source() {
        let mut sources = MemoryIndicatorSource::new();
        sources.insert(
            "Inner",
            "int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Close); return 0; }
             int OnCalculate() { return Bars; }",
        );
        sources.insert(
            "Outer",
            r#"
double Relay[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Relay); return 0; }
int OnCalculate() {
   Relay[0] = iCustom(_Symbol, _Period, "Inner", 0, 0);
   return Bars;
}
"#,
        );
        let mut engine = IndicatorEngine::new(Rc::new(sources));
        let candles = candles_from_closes(&[1.05, 1.10, 1.15, 1.20, 1.25]);
        let latest = engine.custom(&candles, "GBPUSD", 15, "Outer", &[], 0, 0);
        assert!((latest - 1.25).abs() < 1e-12);
        let older = engine.custom(&candles, "GBPUSD", 15, "Outer", &[], 0, 2);
        assert!((older - 1.15).abs() < 1e-12);
    }

    #[test]
    fn self_recursive_programs_stop_at_the_nesting_limit() {
        let mut sources = MemoryIndicatorSource::new();
        sources.insert(
            "Ouroboros",
            r#"
double Echo[];
int OnInit() { IndicatorBuffers(1); SetIndexBuffer(0, Echo); return 0; }
int OnCalculate() {
   Echo[0] = iCustom(_Symbol, _Period, "Ouroboros", 0, 0) + 1;
   return Bars;
}
"#,
        );
        let mut engine = IndicatorEngine::new(Rc::new(sources));
        let candles = candles_from_closes(&[1.0]);
        // the run one level past the limit fails and reads 0; each level
        // above it adds one
        let value = engine.custom(&candles, "EURUSD", 60, "Ouroboros", &[], 0, 0);
        assert_eq!(value, MAX_NESTING as f64);
    }
}
