//! Backtest runner: drives a compiled program bar by bar against the
//! simulated session and assembles a report from what it accumulated.
//!
//! One runner owns one session: account, broker, market data, terminal
//! and indicator engine, all fresh per run. The runner walks the candle
//! series with the terminal clock pinned to each bar, delivers the
//! event handlers the program declares, and samples balance and equity
//! after every bar. A runtime error outside `OnInit`/`OnDeinit` stops
//! the run; everything accumulated up to that bar survives into the
//! report.

use std::rc::Rc;

use super::account::{Account, AccountMetrics};
use super::broker::Order;
use super::builtins::{BuiltinMap, BuiltinRegistry, ExecutionEnv};
use super::chart::{install_session_globals, ChartSeries};
use super::error::MqlError;
use super::indicator::IndicatorEngine;
use super::market::{ticks_to_candles, Candle, Tick};
use super::metrics::{EquityPoint, Summary};
use super::runtime::Runtime;
use super::semantics::{self, ProgramType};
use super::value::Value;
use crate::ports::indicator_port::IndicatorSource;

/// Run settings. The spread is in points and only shapes the ask when
/// no tick data covers a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_deposit: f64,
    pub currency: String,
    pub symbol: String,
    /// Chart timeframe in minutes.
    pub timeframe: i64,
    pub spread_points: i64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_deposit: 10_000.0,
            currency: "USD".into(),
            symbol: "EURUSD".into(),
            timeframe: 60,
            spread_points: 0,
        }
    }
}

/// Where a run stands. `FinishedWithError` means a runtime error cut
/// the run short; the report still carries the bars that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Finished,
    FinishedWithError,
}

/// Everything a run produced, derived solely from the final broker and
/// account state plus the sampled curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BacktestReport {
    /// Closed orders, oldest first.
    pub trades: Vec<Order>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: AccountMetrics,
    pub summary: Summary,
    pub program_type: ProgramType,
    pub error: Option<String>,
}

/// Program source used when the caller supplies none: every `iCustom`
/// lookup misses and reads 0.
struct NoPrograms;

impl IndicatorSource for NoPrograms {
    fn source(&self, _name: &str) -> Option<String> {
        None
    }
}

pub struct BacktestRunner {
    rt: Runtime,
    env: ExecutionEnv,
    series: ChartSeries,
    candles: Vec<Candle>,
    config: BacktestConfig,
    inputs: Vec<Value>,
    cursor: usize,
    state: RunState,
    prev_calculated: i64,
    error: Option<String>,
    equity_curve: Vec<EquityPoint>,
    log_sink: Option<Box<dyn FnMut(String)>>,
}

impl BacktestRunner {
    /// Compile the program and wire a fresh session around it. Compile
    /// errors and bad input series abort construction; the series must
    /// be non-empty with strictly ascending bar times.
    pub fn new(
        source: &str,
        candles: Vec<Candle>,
        config: BacktestConfig,
    ) -> Result<BacktestRunner, MqlError> {
        let compiled = semantics::compile(source);
        if !compiled.is_ok() {
            return Err(MqlError::Compile {
                details: compiled.errors.join("\n"),
            });
        }
        validate_series(&candles)?;
        let mut rt = Runtime::load(compiled, BuiltinRegistry::for_backtest())?;
        let mut env = ExecutionEnv::new(
            &config.symbol,
            config.timeframe,
            IndicatorEngine::new(Rc::new(NoPrograms)),
        );
        env.account = Account::new(config.initial_deposit, &config.currency);
        env.market
            .set_candles(&config.symbol, config.timeframe, candles.clone());
        let series = ChartSeries::new();
        series.install(&mut rt);
        install_session_globals(&mut rt, &env);
        Ok(BacktestRunner {
            rt,
            env,
            series,
            candles,
            config,
            inputs: Vec::new(),
            cursor: 0,
            state: RunState::Idle,
            prev_calculated: 0,
            error: None,
            equity_curve: Vec::new(),
            log_sink: None,
        })
    }

    /// Aggregate raw ticks into bars of the configured timeframe and
    /// keep the ticks for per-bar quotes.
    pub fn from_ticks(
        source: &str,
        ticks: Vec<Tick>,
        config: BacktestConfig,
    ) -> Result<BacktestRunner, MqlError> {
        let candles = ticks_to_candles(&ticks, config.timeframe * 60);
        Ok(BacktestRunner::new(source, candles, config)?.with_ticks(ticks))
    }

    /// Resolve `iCustom` program names through `sources`.
    pub fn with_indicator_source(mut self, sources: Rc<dyn IndicatorSource>) -> Self {
        self.env.engine = IndicatorEngine::new(sources);
        self
    }

    /// Merge caller builtins into the registry's top tier; they shadow
    /// the environment and core tiers by name.
    pub fn with_custom_builtins(mut self, builtins: BuiltinMap) -> Self {
        self.rt.registry.register_custom(builtins);
        self
    }

    /// Derive per-bar `Bid`/`Ask` from recorded ticks instead of the
    /// candle close.
    pub fn with_ticks(mut self, ticks: Vec<Tick>) -> Self {
        let symbol = self.config.symbol.clone();
        self.env.market.set_ticks(&symbol, ticks);
        self
    }

    /// Override declared `input`/`extern` globals, in declaration order.
    /// Values past the declared list are ignored.
    pub fn with_inputs(mut self, inputs: Vec<Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Forward journal lines (`Print`, `Alert`) as the run produces them.
    pub fn with_log_sink(mut self, sink: impl FnMut(String) + 'static) -> Self {
        self.log_sink = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the program over every bar and assemble the report. Calling
    /// this on a finished runner re-assembles the same report.
    pub fn run(&mut self) -> BacktestReport {
        if self.state == RunState::Idle {
            self.start();
            while self.state == RunState::Running {
                self.step_bar();
            }
        }
        self.report()
    }

    /// Global initializers, input overrides, then the init handler.
    /// Errors in the handler itself are ignored, as the original runtime
    /// did; errors in global initializers are real failures.
    fn start(&mut self) {
        self.state = RunState::Running;
        if let Err(e) = self.rt.init_globals(&mut self.env) {
            self.fail(e.to_string());
            return;
        }
        for i in 0..self.inputs.len() {
            let value = self.inputs[i].clone();
            if let Err(e) = self.rt.set_input(i, &value) {
                self.fail(e.to_string());
                return;
            }
        }
        if let Some(init) = self.rt.init_handler() {
            if let Err(e) = self.rt.call_function(&mut self.env, init, &[]) {
                self.env.terminal.print(format!("init error ignored: {e}"));
            }
        }
        self.flush_journal();
    }

    fn step_bar(&mut self) {
        let candle = self.candles[self.cursor];
        let now = candle.time;
        self.env.terminal.set_clock(now);

        let (bid, ask) = match self.env.market.tick_at_or_before(&self.config.symbol, now) {
            Some(tick) => (tick.bid, tick.ask),
            None => {
                let spread = self.config.spread_points as f64 * self.env.point;
                (candle.close, candle.close + spread)
            }
        };
        self.env.bid = bid;
        self.env.ask = ask;

        self.series.push(&candle);
        self.rt
            .set_global("Bars", Value::int(self.series.bars as i64), "int");
        self.rt.set_global("Bid", Value::Double(bid), "double");
        self.rt.set_global("Ask", Value::Double(ask), "double");

        let realized = self.env.broker.update(&self.config.symbol, &candle);
        self.env.account.apply_profit(realized);

        if let Err(message) = self.deliver_handlers(now) {
            self.fail(message);
            return;
        }

        self.flush_journal();
        let metrics = self.env.account.metrics(&self.env.broker, bid, ask);
        self.equity_curve.push(EquityPoint {
            time: now,
            balance: metrics.balance,
            equity: metrics.equity,
        });

        self.cursor += 1;
        if self.cursor >= self.candles.len() {
            self.finish();
        }
    }

    /// Timer, entry point, then the queued trade and chart events, in
    /// the order the broker and terminal raised them.
    fn deliver_handlers(&mut self, now: i64) -> Result<(), String> {
        if self.rt.has_function("OnTimer") && self.env.terminal.timer_due(now) {
            self.call("OnTimer", &[])?;
        }

        // the host keeps every bound buffer sized to the bar count,
        // whatever the program did to it since the last pass
        for slot in self.env.indicator.buffers.iter().flatten() {
            slot.borrow_mut().resize(self.series.bars, Value::Double(0.0));
        }
        self.env.indicator.counted = self.prev_calculated;

        let entry = self.rt.entry_point();
        let bars = self.series.bars as i64;
        // a script's entry runs once, on the first bar
        if self.rt.program_type != ProgramType::Script || self.cursor == 0 {
            let result = if entry == "OnCalculate" {
                let args = self
                    .series
                    .calculate_args(self.prev_calculated, self.rt.max_params("OnCalculate"));
                self.call(entry, &args)?
            } else {
                self.call(entry, &[])?
            };
            self.prev_calculated = if entry == "OnCalculate" {
                result.as_i64().clamp(0, bars)
            } else {
                bars
            };
        }

        let trade_events = self.env.broker.take_events();
        if self.rt.has_function("OnTrade") {
            for _ in &trade_events {
                self.call("OnTrade", &[])?;
            }
        }

        let chart_events = self.env.terminal.take_chart_events();
        if self.rt.has_function("OnChartEvent") {
            for event in chart_events {
                let args = [
                    Value::int(event.id),
                    Value::long(event.lparam),
                    Value::Double(event.dparam),
                    Value::Str(event.sparam),
                ];
                self.call("OnChartEvent", &args)?;
            }
        }

        self.rt
            .set_global("_LastError", Value::int(self.env.last_error), "int");
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, String> {
        self.rt
            .call_function(&mut self.env, name, args)
            .map_err(|e| e.to_string())
    }

    fn finish(&mut self) {
        self.deinit();
        self.state = RunState::Finished;
    }

    fn fail(&mut self, message: String) {
        self.env
            .terminal
            .print(format!("program stopped: {message}"));
        self.deinit();
        self.error = Some(message);
        self.state = RunState::FinishedWithError;
    }

    /// The deinit handler runs on both exits; its errors are ignored.
    fn deinit(&mut self) {
        if let Some(deinit) = self.rt.deinit_handler() {
            if let Err(e) = self.rt.call_function(&mut self.env, deinit, &[]) {
                self.env
                    .terminal
                    .print(format!("deinit error ignored: {e}"));
            }
        }
        self.flush_journal();
    }

    fn flush_journal(&mut self) {
        let lines = self.env.terminal.take_journal();
        if let Some(sink) = self.log_sink.as_mut() {
            for line in lines {
                sink(line);
            }
        }
    }

    fn report(&self) -> BacktestReport {
        let trades: Vec<Order> = self.env.broker.history().into_iter().cloned().collect();
        let metrics = self
            .env
            .account
            .metrics(&self.env.broker, self.env.bid, self.env.ask);
        let summary = Summary::compute(&trades, &self.equity_curve);
        BacktestReport {
            trades,
            equity_curve: self.equity_curve.clone(),
            metrics,
            summary,
            program_type: self.rt.program_type,
            error: self.error.clone(),
        }
    }
}

fn validate_series(candles: &[Candle]) -> Result<(), MqlError> {
    if candles.is_empty() {
        return Err(MqlError::InvalidSeries {
            reason: "series is empty".into(),
        });
    }
    if let Some(pair) = candles.windows(2).find(|w| w[1].time <= w[0].time) {
        return Err(MqlError::InvalidSeries {
            reason: format!(
                "bar times must strictly ascend, got {} then {}",
                pair[0].time, pair[1].time
            ),
        });
    }
    Ok(())
}
