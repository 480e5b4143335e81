//! Value casts between the dialect's primitive types.

use super::error::RuntimeError;
use super::int_math::wrap;
use super::value::{IntClass, Value, parse_lenient_f64};

/// Cast `value` to the named primitive target. Integer targets truncate
/// toward zero and wrap to the class width; `bool` maps zero/nonzero;
/// `string` stringifies with default formatting. An unrecognized target is
/// a programmer error, fatal to the calling operation.
pub fn cast(value: &Value, target: &str) -> Result<Value, RuntimeError> {
    if let Some(class) = IntClass::from_type_name(target) {
        let v = match value {
            Value::Int(v, _) => i128::from(*v),
            Value::Str(s) => parse_lenient_f64(s).trunc() as i128,
            other => other.as_f64().trunc() as i128,
        };
        return Ok(Value::Int(wrap(class, v), class));
    }
    match target {
        "double" => Ok(Value::Double(value.as_f64())),
        "float" => Ok(Value::Float(value.as_f64() as f32)),
        "string" => Ok(Value::Str(value.to_string())),
        "void" => Ok(Value::Empty),
        _ => Err(RuntimeError::new(format!("unsupported cast target {target}"))),
    }
}
