//! Virtual files, terminal global variables and event registration.
//!
//! All of it is backed by the per-run [`VirtualTerminal`]; nothing touches
//! the real filesystem except an explicit global-variable flush on a
//! terminal constructed with a backing path.

use crate::domain::terminal::{ChartEvent, CHARTEVENT_CUSTOM};
use crate::domain::value::Value;

use super::{int, num, put, text, BuiltinMap};

/// Every failed file operation reports this one code.
const ERR_CANNOT_OPEN_FILE: i64 = 4103;

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "FileOpen", |env, args| {
        let name = text(args, 0);
        let write = int(args, 1) & 2 != 0;
        match env.terminal.file_open(&name, write) {
            Some(handle) => Ok(Value::int(handle)),
            None => {
                env.last_error = ERR_CANNOT_OPEN_FILE;
                Ok(Value::int(-1))
            }
        }
    });
    put(map, "FileReadString", |env, args| {
        match env.terminal.file_read_string(int(args, 0)) {
            Some(content) => Ok(Value::Str(content)),
            None => {
                env.last_error = ERR_CANNOT_OPEN_FILE;
                Ok(Value::Str(String::new()))
            }
        }
    });
    put(map, "FileWriteString", |env, args| {
        let written = env.terminal.file_write_string(int(args, 0), &text(args, 1));
        match written {
            Some(count) => Ok(Value::int(count as i64)),
            None => {
                env.last_error = ERR_CANNOT_OPEN_FILE;
                Ok(Value::int(0))
            }
        }
    });
    put(map, "FileClose", |env, args| {
        env.terminal.file_close(int(args, 0));
        Ok(Value::Empty)
    });
    put(map, "FileIsExist", |env, args| {
        Ok(Value::bool_val(env.terminal.file_exists(&text(args, 0))))
    });
    put(map, "FileDelete", |env, args| {
        Ok(Value::bool_val(env.terminal.file_delete(&text(args, 0))))
    });

    put(map, "GlobalVariableSet", |env, args| {
        let time = env.terminal.global_set(&text(args, 0), num(args, 1));
        Ok(Value::datetime(time))
    });
    put(map, "GlobalVariableGet", |env, args| {
        Ok(Value::Double(env.terminal.global_get(&text(args, 0))))
    });
    put(map, "GlobalVariableCheck", |env, args| {
        Ok(Value::bool_val(env.terminal.global_check(&text(args, 0))))
    });
    put(map, "GlobalVariableDel", |env, args| {
        Ok(Value::bool_val(env.terminal.global_del(&text(args, 0))))
    });
    put(map, "GlobalVariableTime", |env, args| {
        Ok(Value::datetime(env.terminal.global_time(&text(args, 0))))
    });
    put(map, "GlobalVariablesTotal", |env, _args| {
        Ok(Value::int(env.terminal.globals_total() as i64))
    });
    put(map, "GlobalVariableSetOnCondition", |env, args| {
        let ok = env
            .terminal
            .global_set_on_condition(&text(args, 0), num(args, 1), num(args, 2));
        Ok(Value::bool_val(ok))
    });
    put(map, "GlobalVariablesFlush", |env, _args| {
        if env.terminal.flush_globals().is_err() {
            env.last_error = ERR_CANNOT_OPEN_FILE;
        }
        Ok(Value::Empty)
    });

    put(map, "EventSetTimer", |env, args| {
        Ok(Value::bool_val(env.terminal.set_timer(int(args, 0))))
    });
    put(map, "EventKillTimer", |env, _args| {
        env.terminal.kill_timer();
        Ok(Value::Empty)
    });
    put(map, "EventChartCustom", |env, args| {
        // args[0] is the chart id; there is exactly one chart per run
        env.terminal.push_chart_event(ChartEvent {
            id: CHARTEVENT_CUSTOM + int(args, 1),
            lparam: int(args, 2),
            dparam: num(args, 3),
            sparam: text(args, 4),
        });
        Ok(Value::bool_val(true))
    });
}
