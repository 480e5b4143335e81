//! Calendar accessors over the simulated clock.
//!
//! There is one clock per run, so "server", "local" and "GMT" time are the
//! same number. The argumentless accessors read that clock; the `Time*`
//! family reads the timestamp it is given.

use chrono::{Datelike, TimeZone, Timelike, Utc};

use crate::domain::value::Value;

use super::{int, put, BuiltinMap};

fn field(time: i64, pick: fn(chrono::DateTime<Utc>) -> i64) -> i64 {
    match Utc.timestamp_opt(time, 0).single() {
        Some(stamp) => pick(stamp),
        None => 0,
    }
}

fn day(t: chrono::DateTime<Utc>) -> i64 {
    t.day() as i64
}

fn month(t: chrono::DateTime<Utc>) -> i64 {
    t.month() as i64
}

fn year(t: chrono::DateTime<Utc>) -> i64 {
    t.year() as i64
}

fn hour(t: chrono::DateTime<Utc>) -> i64 {
    t.hour() as i64
}

fn minute(t: chrono::DateTime<Utc>) -> i64 {
    t.minute() as i64
}

fn second(t: chrono::DateTime<Utc>) -> i64 {
    t.second() as i64
}

fn day_of_week(t: chrono::DateTime<Utc>) -> i64 {
    t.weekday().num_days_from_sunday() as i64
}

fn day_of_year(t: chrono::DateTime<Utc>) -> i64 {
    t.ordinal() as i64
}

/// Register both spellings of one accessor: `Time<Name>(t)` over an
/// explicit timestamp and `<Name>()` over the simulated clock.
fn accessor(
    map: &mut BuiltinMap,
    of_time: &str,
    of_now: &str,
    pick: fn(chrono::DateTime<Utc>) -> i64,
) {
    put(map, of_time, move |_env, args| {
        Ok(Value::int(field(int(args, 0), pick)))
    });
    put(map, of_now, move |env, _args| {
        Ok(Value::int(field(env.terminal.now(), pick)))
    });
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "TimeCurrent", |env, _args| {
        Ok(Value::datetime(env.terminal.now()))
    });
    put(map, "TimeLocal", |env, _args| {
        Ok(Value::datetime(env.terminal.now()))
    });
    put(map, "TimeGMT", |env, _args| {
        Ok(Value::datetime(env.terminal.now()))
    });
    accessor(map, "TimeDay", "Day", day);
    accessor(map, "TimeMonth", "Month", month);
    accessor(map, "TimeYear", "Year", year);
    accessor(map, "TimeHour", "Hour", hour);
    accessor(map, "TimeMinute", "Minute", minute);
    accessor(map, "TimeSeconds", "Seconds", second);
    accessor(map, "TimeDayOfWeek", "DayOfWeek", day_of_week);
    accessor(map, "TimeDayOfYear", "DayOfYear", day_of_year);
}
