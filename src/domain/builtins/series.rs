//! Bar-series accessors over the visible candle window.
//!
//! Shift 0 is the latest visible bar and shifts grow toward history. A
//! negative shift clamps to the latest bar; a shift past the first bar
//! reads as the zero value of the requested field.

use crate::domain::error::RuntimeError;
use crate::domain::market::Candle;
use crate::domain::value::Value;

use super::{array, int, int_or, put, symbol_arg, timeframe_arg, visible, BuiltinMap, ExecutionEnv};

const ZERO_BAR: Candle = Candle {
    time: 0,
    open: 0.0,
    high: 0.0,
    low: 0.0,
    close: 0.0,
    volume: 0,
};

/// Candle field by series mode: 0 open, 1 low, 2 high, 3 close, 4 volume,
/// 5 time.
fn series_field(candle: &Candle, mode: i64) -> f64 {
    match mode {
        0 => candle.open,
        1 => candle.low,
        2 => candle.high,
        3 => candle.close,
        4 => candle.volume as f64,
        5 => candle.time as f64,
        _ => candle.close,
    }
}

fn bar_at(env: &mut ExecutionEnv, args: &[Value], pick: fn(&Candle) -> Value) -> Value {
    let symbol = symbol_arg(env, args, 0);
    let timeframe = timeframe_arg(env, args, 1);
    let shift = int(args, 2).max(0);
    let now = env.terminal.now();
    let candles = visible(&env.market, &symbol, timeframe, now);
    let index = candles.len() as i64 - 1 - shift;
    match usize::try_from(index) {
        Ok(i) => pick(&candles[i]),
        Err(_) => pick(&ZERO_BAR),
    }
}

/// Shift of the extreme `series_field` value among shifts
/// `start .. start+count`. Ties keep the nearest bar.
fn extreme_shift(
    env: &mut ExecutionEnv,
    args: &[Value],
    better: fn(f64, f64) -> bool,
) -> Value {
    let symbol = symbol_arg(env, args, 0);
    let timeframe = timeframe_arg(env, args, 1);
    let mode = int(args, 2);
    let count = int_or(args, 3, 0);
    let start = int_or(args, 4, 0).max(0);
    let now = env.terminal.now();
    let candles = visible(&env.market, &symbol, timeframe, now);
    let latest = candles.len() as i64 - 1;
    let end = if count <= 0 {
        latest
    } else {
        (start + count - 1).min(latest)
    };
    let mut best: Option<(i64, f64)> = None;
    for shift in start..=end {
        let v = series_field(&candles[(latest - shift) as usize], mode);
        if best.map_or(true, |(_, b)| better(v, b)) {
            best = Some((shift, v));
        }
    }
    Value::int(best.map_or(-1, |(shift, _)| shift))
}

/// Copy `count` bars starting at shift `start` into `target`, oldest bar
/// first in physical order. Returns the number actually copied.
fn copy_series(
    env: &mut ExecutionEnv,
    args: &[Value],
    name: &str,
    pick: fn(&Candle) -> Value,
) -> Result<Value, RuntimeError> {
    let symbol = symbol_arg(env, args, 0);
    let timeframe = timeframe_arg(env, args, 1);
    let start = int(args, 2).max(0);
    let count = int(args, 3).max(0);
    let target = array(name, args, 4)?;
    let now = env.terminal.now();
    let candles = visible(&env.market, &symbol, timeframe, now);
    let latest = candles.len() as i64 - 1;
    let copied = (latest - start + 1).clamp(0, count);
    let mut buffer = target.borrow_mut();
    buffer.resize(copied as usize, Value::Double(0.0));
    for i in 0..copied {
        let shift = start + copied - 1 - i;
        buffer.set_physical(i as usize, pick(&candles[(latest - shift) as usize]));
    }
    Ok(Value::int(copied))
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "Bars", |env, _args| {
        let now = env.terminal.now();
        let count = visible(&env.market, &env.symbol, env.timeframe, now).len();
        Ok(Value::int(count as i64))
    });
    put(map, "iBars", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let now = env.terminal.now();
        let count = visible(&env.market, &symbol, timeframe, now).len();
        Ok(Value::int(count as i64))
    });
    put(map, "iBarShift", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let time = int(args, 2);
        let exact = args.get(3).map_or(false, Value::is_truthy);
        let now = env.terminal.now();
        let candles = visible(&env.market, &symbol, timeframe, now);
        if candles.is_empty() {
            return Ok(Value::int(-1));
        }
        let pos = candles.partition_point(|c| c.time <= time);
        if pos == 0 {
            // before the first bar: the oldest shift, or a miss when exact
            return Ok(Value::int(if exact {
                -1
            } else {
                candles.len() as i64 - 1
            }));
        }
        let index = pos - 1;
        if exact && candles[index].time != time {
            return Ok(Value::int(-1));
        }
        Ok(Value::int((candles.len() - 1 - index) as i64))
    });
    put(map, "iOpen", |env, args| {
        Ok(bar_at(env, args, |c| Value::Double(c.open)))
    });
    put(map, "iHigh", |env, args| {
        Ok(bar_at(env, args, |c| Value::Double(c.high)))
    });
    put(map, "iLow", |env, args| {
        Ok(bar_at(env, args, |c| Value::Double(c.low)))
    });
    put(map, "iClose", |env, args| {
        Ok(bar_at(env, args, |c| Value::Double(c.close)))
    });
    put(map, "iTime", |env, args| {
        Ok(bar_at(env, args, |c| Value::datetime(c.time)))
    });
    put(map, "iVolume", |env, args| {
        Ok(bar_at(env, args, |c| Value::int(c.volume)))
    });
    put(map, "iHighest", |env, args| {
        Ok(extreme_shift(env, args, |v, best| v > best))
    });
    put(map, "iLowest", |env, args| {
        Ok(extreme_shift(env, args, |v, best| v < best))
    });
    put(map, "CopyOpen", |env, args| {
        copy_series(env, args, "CopyOpen", |c| Value::Double(c.open))
    });
    put(map, "CopyHigh", |env, args| {
        copy_series(env, args, "CopyHigh", |c| Value::Double(c.high))
    });
    put(map, "CopyLow", |env, args| {
        copy_series(env, args, "CopyLow", |c| Value::Double(c.low))
    });
    put(map, "CopyClose", |env, args| {
        copy_series(env, args, "CopyClose", |c| Value::Double(c.close))
    });
    put(map, "CopyTime", |env, args| {
        copy_series(env, args, "CopyTime", |c| Value::datetime(c.time))
    });
}
