//! String builtins and the text/number conversion family.
//!
//! Every function returns a fresh value; script strings are immutable at
//! this boundary, so "replace" and "set char" hand back modified copies.

use chrono::{TimeZone, Utc};

use crate::domain::lexer::parse_datetime_literal;
use crate::domain::value::{parse_lenient_f64, Value};

use super::{array, common::joined, int, int_or, num, put, text, BuiltinMap};

/// Positions index characters, not bytes.
fn char_at(s: &str, position: i64) -> Option<char> {
    if position < 0 {
        return None;
    }
    s.chars().nth(position as usize)
}

fn round_to_digits(value: f64, digits: i64) -> f64 {
    let digits = digits.clamp(0, 15);
    let scale = 10f64.powi(digits as i32);
    (value * scale).round() / scale
}

fn format_time(time: i64, flags: i64) -> String {
    let Some(stamp) = Utc.timestamp_opt(time, 0).single() else {
        return String::new();
    };
    let mut parts = Vec::new();
    if flags & 1 != 0 {
        parts.push(stamp.format("%Y.%m.%d").to_string());
    }
    if flags & 4 != 0 {
        parts.push(stamp.format("%H:%M:%S").to_string());
    } else if flags & 2 != 0 {
        parts.push(stamp.format("%H:%M").to_string());
    }
    parts.join(" ")
}

fn double_to_string(args: &[Value]) -> String {
    let digits = int_or(args, 1, 8).clamp(0, 16) as usize;
    format!("{:.digits$}", num(args, 0))
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "StringLen", |_env, args| {
        Ok(Value::int(text(args, 0).chars().count() as i64))
    });
    put(map, "StringSubstr", |_env, args| {
        let s = text(args, 0);
        let start = int(args, 1).max(0) as usize;
        let length = int_or(args, 2, -1);
        let tail: String = s.chars().skip(start).collect();
        Ok(Value::Str(if length < 0 {
            tail
        } else {
            tail.chars().take(length as usize).collect()
        }))
    });
    put(map, "StringFind", |_env, args| {
        let s = text(args, 0);
        let needle = text(args, 1);
        let start = int_or(args, 2, 0).max(0) as usize;
        let skipped: String = s.chars().skip(start).collect();
        Ok(Value::int(match skipped.find(&needle) {
            // byte offset back to a character index, then re-offset
            Some(at) => (skipped[..at].chars().count() + start) as i64,
            None => -1,
        }))
    });
    put(map, "StringReplace", |_env, args| {
        let s = text(args, 0);
        let from = text(args, 1);
        if from.is_empty() {
            return Ok(Value::Str(s));
        }
        Ok(Value::Str(s.replace(&from, &text(args, 2))))
    });
    put(map, "StringSplit", |_env, args| {
        let s = text(args, 0);
        let parts = array("StringSplit", args, 2)?;
        let pieces: Vec<String> = match char::from_u32(int(args, 1) as u32) {
            Some(sep) if !s.is_empty() => s.split(sep).map(str::to_string).collect(),
            _ if s.is_empty() => Vec::new(),
            _ => vec![s],
        };
        let mut buffer = parts.borrow_mut();
        buffer.resize(pieces.len(), Value::Str(String::new()));
        for (i, piece) in pieces.iter().enumerate() {
            buffer.set_physical(i, Value::Str(piece.clone()));
        }
        Ok(Value::int(pieces.len() as i64))
    });
    put(map, "StringConcatenate", |_env, args| {
        Ok(Value::Str(joined(args)))
    });
    put(map, "StringToUpper", |_env, args| {
        Ok(Value::Str(text(args, 0).to_uppercase()))
    });
    put(map, "StringToLower", |_env, args| {
        Ok(Value::Str(text(args, 0).to_lowercase()))
    });
    put(map, "StringTrimLeft", |_env, args| {
        Ok(Value::Str(text(args, 0).trim_start().to_string()))
    });
    put(map, "StringTrimRight", |_env, args| {
        Ok(Value::Str(text(args, 0).trim_end().to_string()))
    });
    put(map, "StringGetChar", |_env, args| {
        Ok(Value::int(
            char_at(&text(args, 0), int(args, 1)).map_or(0, |c| c as i64),
        ))
    });
    put(map, "StringSetChar", |_env, args| {
        let s = text(args, 0);
        let position = int(args, 1);
        let Some(code) = char::from_u32(int(args, 2) as u32) else {
            return Ok(Value::Str(s));
        };
        if position < 0 || position as usize >= s.chars().count() {
            return Ok(Value::Str(s));
        }
        Ok(Value::Str(
            s.chars()
                .enumerate()
                .map(|(i, c)| if i as i64 == position { code } else { c })
                .collect(),
        ))
    });
    put(map, "StringCompare", |_env, args| {
        let mut a = text(args, 0);
        let mut b = text(args, 1);
        let case_sensitive = args.get(2).map_or(true, Value::is_truthy);
        if !case_sensitive {
            a = a.to_lowercase();
            b = b.to_lowercase();
        }
        Ok(Value::int(match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }))
    });
    put(map, "CharToString", |_env, args| {
        Ok(Value::Str(
            char::from_u32(int(args, 0) as u32)
                .map(String::from)
                .unwrap_or_default(),
        ))
    });
    put(map, "NormalizeDouble", |_env, args| {
        Ok(Value::Double(round_to_digits(num(args, 0), int(args, 1))))
    });
    put(map, "DoubleToString", |_env, args| {
        Ok(Value::Str(double_to_string(args)))
    });
    put(map, "IntegerToString", |_env, args| {
        let mut s = int(args, 0).to_string();
        let length = int_or(args, 1, 0).max(0) as usize;
        let filler = char::from_u32(int_or(args, 2, 32) as u32).unwrap_or(' ');
        while s.chars().count() < length {
            s.insert(0, filler);
        }
        Ok(Value::Str(s))
    });
    put(map, "StringToDouble", |_env, args| {
        Ok(Value::Double(parse_lenient_f64(&text(args, 0))))
    });
    put(map, "StringToInteger", |_env, args| {
        Ok(Value::int(parse_lenient_f64(&text(args, 0)).trunc() as i64))
    });
    put(map, "StringToTime", |_env, args| {
        Ok(Value::datetime(
            parse_datetime_literal(text(args, 0).trim()).unwrap_or(0),
        ))
    });
    put(map, "TimeToString", |_env, args| {
        Ok(Value::Str(format_time(int(args, 0), int_or(args, 1, 3))))
    });
    put(map, "CharArrayToString", |_env, args| {
        let source = array("CharArrayToString", args, 0)?;
        let buffer = source.borrow();
        let start = int_or(args, 1, 0).max(0) as usize;
        let count = int_or(args, 2, -1);
        let end = if count < 0 {
            buffer.len()
        } else {
            (start + count as usize).min(buffer.len())
        };
        let mut out = String::new();
        for i in start..end {
            let code = buffer.get_physical(i).as_i64();
            if code == 0 {
                break;
            }
            if let Some(c) = char::from_u32(code as u32) {
                out.push(c);
            }
        }
        Ok(Value::Str(out))
    });
    put(map, "StringToCharArray", |_env, args| {
        let s = text(args, 0);
        let target = array("StringToCharArray", args, 1)?;
        let start = int_or(args, 2, 0).max(0) as usize;
        let count = int_or(args, 3, -1);
        let mut codes: Vec<i64> = s.chars().map(|c| c as i64).collect();
        // a full copy includes the terminating zero
        codes.push(0);
        if count >= 0 {
            codes.truncate(count as usize);
        }
        let mut buffer = target.borrow_mut();
        if buffer.len() < start + codes.len() {
            buffer.resize(start + codes.len(), Value::int(0));
        }
        for (i, code) in codes.iter().enumerate() {
            buffer.set_physical(start + i, Value::int(*code));
        }
        Ok(Value::int(codes.len() as i64))
    });
    put(map, "ColorToString", |_env, args| {
        let v = int(args, 0);
        Ok(Value::Str(format!(
            "{},{},{}",
            v & 0xff,
            (v >> 8) & 0xff,
            (v >> 16) & 0xff
        )))
    });
    // legacy names kept for older programs
    put(map, "DoubleToStr", |_env, args| {
        Ok(Value::Str(double_to_string(args)))
    });
    put(map, "StrToDouble", |_env, args| {
        Ok(Value::Double(parse_lenient_f64(&text(args, 0))))
    });
    put(map, "StrToInteger", |_env, args| {
        Ok(Value::int(parse_lenient_f64(&text(args, 0)).trunc() as i64))
    });
    put(map, "TimeToStr", |_env, args| {
        Ok(Value::Str(format_time(int(args, 0), int_or(args, 1, 3))))
    });
}
