//! Predefined chart state a hosted program observes.
//!
//! The backtest runner and nested indicator runs maintain the same set
//! of chart globals: six as-series arrays (`Time`, `Open`, `High`,
//! `Low`, `Close`, `Volume`) grown one bar at a time, and the scalar
//! session globals (`Digits`, `Point`, `_Symbol`, ...). The arrays are
//! bound into the runtime by reference, so pushes after the install are
//! visible to the program without rebinding.

use std::rc::Rc;

use super::builtins::ExecutionEnv;
use super::market::Candle;
use super::runtime::Runtime;
use super::value::{new_array, ArrayRef, SeriesBuffer, Value};

/// The predefined chart arrays of one run. The spread series exists
/// only to complete the `OnCalculate` parameter list.
pub(crate) struct ChartSeries {
    pub time: ArrayRef,
    pub open: ArrayRef,
    pub high: ArrayRef,
    pub low: ArrayRef,
    pub close: ArrayRef,
    pub volume: ArrayRef,
    pub spread: ArrayRef,
    pub bars: usize,
}

fn series_array() -> ArrayRef {
    let mut buffer = SeriesBuffer::new();
    buffer.set_as_series(true);
    new_array(buffer)
}

impl ChartSeries {
    pub fn new() -> Self {
        ChartSeries {
            time: series_array(),
            open: series_array(),
            high: series_array(),
            low: series_array(),
            close: series_array(),
            volume: series_array(),
            spread: series_array(),
            bars: 0,
        }
    }

    pub fn install(&self, rt: &mut Runtime) {
        rt.set_global("Time", Value::Array(Rc::clone(&self.time)), "datetime");
        rt.set_global("Open", Value::Array(Rc::clone(&self.open)), "double");
        rt.set_global("High", Value::Array(Rc::clone(&self.high)), "double");
        rt.set_global("Low", Value::Array(Rc::clone(&self.low)), "double");
        rt.set_global("Close", Value::Array(Rc::clone(&self.close)), "double");
        rt.set_global("Volume", Value::Array(Rc::clone(&self.volume)), "long");
    }

    pub fn push(&mut self, candle: &Candle) {
        self.time.borrow_mut().push(Value::datetime(candle.time));
        self.open.borrow_mut().push(Value::Double(candle.open));
        self.high.borrow_mut().push(Value::Double(candle.high));
        self.low.borrow_mut().push(Value::Double(candle.low));
        self.close.borrow_mut().push(Value::Double(candle.close));
        self.volume.borrow_mut().push(Value::long(candle.volume));
        self.spread.borrow_mut().push(Value::int(0));
        self.bars += 1;
    }

    /// The standard `OnCalculate` argument list, truncated to what the
    /// program actually declares. Tick volume and real volume share one
    /// series here.
    pub fn calculate_args(&self, prev_calculated: i64, max_params: usize) -> Vec<Value> {
        let mut args = vec![
            Value::int(self.bars as i64),
            Value::int(prev_calculated),
            Value::Array(Rc::clone(&self.time)),
            Value::Array(Rc::clone(&self.open)),
            Value::Array(Rc::clone(&self.high)),
            Value::Array(Rc::clone(&self.low)),
            Value::Array(Rc::clone(&self.close)),
            Value::Array(Rc::clone(&self.volume)),
            Value::Array(Rc::clone(&self.volume)),
            Value::Array(Rc::clone(&self.spread)),
        ];
        args.truncate(max_params);
        args
    }
}

/// Scalar globals fixed for the length of a run. `Bars`, `Bid` and
/// `Ask` start at zero; the host refreshes them every bar.
pub(crate) fn install_session_globals(rt: &mut Runtime, env: &ExecutionEnv) {
    rt.set_global("Bars", Value::int(0), "int");
    rt.set_global("Bid", Value::Double(0.0), "double");
    rt.set_global("Ask", Value::Double(0.0), "double");
    rt.set_global("Digits", Value::int(env.digits), "int");
    rt.set_global("_Digits", Value::int(env.digits), "int");
    rt.set_global("Point", Value::Double(env.point), "double");
    rt.set_global("_Point", Value::Double(env.point), "double");
    rt.set_global("_Symbol", Value::Str(env.symbol.clone()), "string");
    rt.set_global("_Period", Value::int(env.timeframe), "int");
    rt.set_global("_LastError", Value::int(0), "int");
    rt.set_global("_StopFlag", Value::bool_val(false), "bool");
}
