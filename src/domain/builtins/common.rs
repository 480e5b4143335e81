//! Journal, clock, error slot and session flags.

use crate::domain::value::Value;

use super::{int, put, BuiltinMap};

/// Print-style argument joining: values concatenate without a separator.
pub(super) fn joined(args: &[Value]) -> String {
    args.iter().map(Value::to_string).collect()
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "Print", |env, args| {
        env.terminal.print(joined(args));
        Ok(Value::Empty)
    });
    put(map, "Alert", |env, args| {
        env.terminal.alert(&joined(args));
        Ok(Value::bool_val(true))
    });
    put(map, "Comment", |env, args| {
        env.terminal.set_comment(joined(args));
        Ok(Value::Empty)
    });
    put(map, "Sleep", |env, args| {
        env.terminal.advance_millis(int(args, 0));
        Ok(Value::Empty)
    });
    // Reading the error slot does not clear it; only ResetLastError does.
    put(map, "GetLastError", |env, _args| Ok(Value::int(env.last_error)));
    put(map, "ResetLastError", |env, _args| {
        env.last_error = 0;
        Ok(Value::Empty)
    });
    put(map, "IsStopped", |env, _args| Ok(Value::bool_val(env.stop_flag)));
    put(map, "TerminalName", |_env, _args| {
        Ok(Value::Str("mqlsim".to_string()))
    });
    put(map, "TerminalCompany", |_env, _args| {
        Ok(Value::Str("mqlsim project".to_string()))
    });
    put(map, "Digits", |env, _args| Ok(Value::int(env.digits)));
    put(map, "Period", |env, _args| Ok(Value::int(env.timeframe)));
    put(map, "Point", |env, _args| Ok(Value::Double(env.point)));
    put(map, "Symbol", |env, _args| Ok(Value::Str(env.symbol.clone())));
    // The simulated session is always a connected, trade-enabled test run.
    put(map, "IsConnected", |_env, _args| Ok(Value::bool_val(true)));
    put(map, "IsDemo", |_env, _args| Ok(Value::bool_val(true)));
    put(map, "IsTesting", |_env, _args| Ok(Value::bool_val(true)));
    put(map, "IsTradeAllowed", |_env, _args| Ok(Value::bool_val(true)));
    put(map, "IsOptimization", |_env, _args| Ok(Value::bool_val(false)));
    put(map, "IsVisualMode", |_env, _args| Ok(Value::bool_val(false)));
    put(map, "UninitializeReason", |_env, _args| Ok(Value::int(0)));
}
