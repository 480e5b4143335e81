//! Indicator calls routed through the engine cache, plus the
//! custom-indicator surface that mutates per-run state.

use std::rc::Rc;

use crate::domain::value::Value;

use super::{
    array, int, int_or, num, put, symbol_arg, text, timeframe_arg, visible, BuiltinMap,
    ExecutionEnv,
};

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "iMA", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let period = int(args, 2);
        let ma_shift = int(args, 3);
        // args[4] selects the smoothing method; simple averaging only
        let applied = int(args, 5);
        let shift = int(args, 6);
        let ExecutionEnv {
            market,
            engine,
            terminal,
            ..
        } = env;
        let candles = visible(market, &symbol, timeframe, terminal.now());
        Ok(Value::Double(engine.ma(
            candles, &symbol, timeframe, period, ma_shift, applied, shift,
        )))
    });
    put(map, "iMACD", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let (fast, slow, signal) = (int(args, 2), int(args, 3), int(args, 4));
        let applied = int(args, 5);
        let (mode, shift) = (int(args, 6), int(args, 7));
        let ExecutionEnv {
            market,
            engine,
            terminal,
            ..
        } = env;
        let candles = visible(market, &symbol, timeframe, terminal.now());
        Ok(Value::Double(engine.macd(
            candles, &symbol, timeframe, fast, slow, signal, applied, mode, shift,
        )))
    });
    put(map, "iATR", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let (period, shift) = (int(args, 2), int(args, 3));
        let ExecutionEnv {
            market,
            engine,
            terminal,
            ..
        } = env;
        let candles = visible(market, &symbol, timeframe, terminal.now());
        Ok(Value::Double(engine.atr(candles, &symbol, timeframe, period, shift)))
    });
    put(map, "iRSI", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let (period, applied, shift) = (int(args, 2), int(args, 3), int(args, 4));
        let ExecutionEnv {
            market,
            engine,
            terminal,
            ..
        } = env;
        let candles = visible(market, &symbol, timeframe, terminal.now());
        Ok(Value::Double(engine.rsi(
            candles, &symbol, timeframe, period, applied, shift,
        )))
    });
    put(map, "iCustom", |env, args| {
        let symbol = symbol_arg(env, args, 0);
        let timeframe = timeframe_arg(env, args, 1);
        let name = text(args, 2);
        // trailing two arguments are mode and shift, the middle ones are
        // the indicator's input overrides
        let (params, mode, shift) = if args.len() >= 5 {
            (
                &args[3..args.len() - 2],
                int(args, args.len() - 2),
                int(args, args.len() - 1),
            )
        } else {
            (&args[0..0], 0, 0)
        };
        let ExecutionEnv {
            market,
            engine,
            terminal,
            ..
        } = env;
        let candles = visible(market, &symbol, timeframe, terminal.now());
        Ok(Value::Double(engine.custom(
            candles, &symbol, timeframe, &name, params, mode, shift,
        )))
    });

    put(map, "IndicatorBuffers", |env, args| {
        env.indicator.declared_buffers = int(args, 0).max(0) as usize;
        Ok(Value::bool_val(true))
    });
    put(map, "IndicatorShortName", |env, args| {
        env.indicator.short_name = text(args, 0);
        Ok(Value::Empty)
    });
    put(map, "IndicatorDigits", |env, args| {
        env.indicator.digits = int(args, 0);
        Ok(Value::Empty)
    });
    put(map, "IndicatorCounted", |env, _args| {
        Ok(Value::int(env.indicator.counted))
    });
    put(map, "SetIndexBuffer", |env, args| {
        let index = int(args, 0);
        if index < 0 {
            return Ok(Value::bool_val(false));
        }
        let buffer = array("SetIndexBuffer", args, 1)?;
        buffer.borrow_mut().set_as_series(true);
        env.indicator.bind_buffer(index as usize, Rc::clone(&buffer));
        Ok(Value::bool_val(true))
    });
    put(map, "SetIndexLabel", |env, args| {
        env.indicator.labels.insert(int(args, 0), text(args, 1));
        Ok(Value::Empty)
    });
    put(map, "SetIndexStyle", |env, args| {
        env.indicator.styles.insert(
            int(args, 0),
            (int(args, 1), int_or(args, 2, 0), int_or(args, 3, 0)),
        );
        Ok(Value::Empty)
    });
    put(map, "SetLevelValue", |env, args| {
        env.indicator.levels.insert(int(args, 0), num(args, 1));
        Ok(Value::Empty)
    });
    put(map, "HideTestIndicators", |env, args| {
        env.indicator.hide_test_indicators = args.first().map_or(false, Value::is_truthy);
        Ok(Value::Empty)
    });
}
