//! Script value model.
//!
//! Integer values carry their dialect class (`int`, `uint`, `datetime`, ...)
//! so arithmetic can wrap at the right width and datetime arithmetic keeps
//! its class. Arrays and object instances have reference semantics: cloning
//! a `Value` clones the handle, not the storage, which is what assignment
//! and parameter passing in the dialect do.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Integer class of a [`Value::Int`]. `bool`, `color` and `datetime` are
/// integer classes in this dialect, not distinct value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntClass {
    Bool,
    Char,
    Uchar,
    Short,
    Ushort,
    Int,
    Uint,
    Long,
    Ulong,
    Datetime,
    Color,
}

impl IntClass {
    pub fn from_type_name(name: &str) -> Option<IntClass> {
        Some(match name {
            "bool" => IntClass::Bool,
            "char" => IntClass::Char,
            "uchar" => IntClass::Uchar,
            "short" => IntClass::Short,
            "ushort" => IntClass::Ushort,
            "int" => IntClass::Int,
            "uint" => IntClass::Uint,
            "long" => IntClass::Long,
            "ulong" => IntClass::Ulong,
            "datetime" => IntClass::Datetime,
            "color" => IntClass::Color,
            _ => return None,
        })
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntClass::Uchar | IntClass::Ushort | IntClass::Uint | IntClass::Ulong
        )
    }

    /// Width-based promotion rank. Unsigned wins ties at the same width.
    pub fn rank(self) -> u8 {
        match self {
            IntClass::Bool => 0,
            IntClass::Char => 1,
            IntClass::Uchar => 2,
            IntClass::Short => 3,
            IntClass::Ushort => 4,
            IntClass::Int | IntClass::Color => 5,
            IntClass::Uint => 6,
            IntClass::Datetime => 7,
            IntClass::Long => 8,
            IntClass::Ulong => 9,
        }
    }
}

/// A dynamically sized script array paired with its indexing direction.
/// When `as_series` is set, logical index 0 addresses the most recently
/// appended element; storage order never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesBuffer {
    data: Vec<Value>,
    as_series: bool,
}

impl SeriesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_len(len: usize, fill: Value) -> Self {
        Self {
            data: vec![fill; len],
            as_series: false,
        }
    }

    pub fn from_values(data: Vec<Value>) -> Self {
        Self {
            data,
            as_series: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_series(&self) -> bool {
        self.as_series
    }

    pub fn set_as_series(&mut self, on: bool) {
        self.as_series = on;
    }

    /// Map a logical index to a physical one, honoring the direction flag.
    pub fn physical(&self, logical: usize) -> Option<usize> {
        if logical >= self.data.len() {
            return None;
        }
        Some(if self.as_series {
            self.data.len() - 1 - logical
        } else {
            logical
        })
    }

    pub fn get(&self, logical: usize) -> Value {
        match self.physical(logical) {
            Some(i) => self.data[i].clone(),
            None => Value::Empty,
        }
    }

    pub fn set(&mut self, logical: usize, value: Value) -> bool {
        match self.physical(logical) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Append at the physical end (the "newest" slot under series indexing).
    pub fn push(&mut self, value: Value) {
        self.data.push(value);
    }

    /// Grow pads with `fill` at the physical end; shrink truncates, keeping
    /// the first `len` physical elements.
    pub fn resize(&mut self, len: usize, fill: Value) {
        self.data.resize(len, fill);
    }

    pub fn fill_range(&mut self, start: usize, count: usize, value: Value) {
        for logical in start..start.saturating_add(count) {
            if !self.set(logical, value.clone()) {
                break;
            }
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.data
    }

    /// Read by physical position, ignoring the direction flag.
    pub fn get_physical(&self, index: usize) -> Value {
        self.data.get(index).cloned().unwrap_or(Value::Empty)
    }

    /// Write by physical position, ignoring the direction flag.
    pub fn set_physical(&mut self, index: usize, value: Value) -> bool {
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

pub type ArrayRef = Rc<RefCell<SeriesBuffer>>;
pub type ObjectRef = Rc<RefCell<Instance>>;

pub fn new_array(buffer: SeriesBuffer) -> ArrayRef {
    Rc::new(RefCell::new(buffer))
}

/// An object instance: its dynamic class name plus one slot per declared
/// field (inherited fields included).
#[derive(Debug)]
pub struct Instance {
    pub class: String,
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64, IntClass),
    /// Single-precision `float`.
    Float(f32),
    Double(f64),
    Str(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Empty,
}

impl Value {
    pub fn int(v: i64) -> Value {
        Value::Int(v, IntClass::Int)
    }

    pub fn long(v: i64) -> Value {
        Value::Int(v, IntClass::Long)
    }

    pub fn bool_val(v: bool) -> Value {
        Value::Int(if v { 1 } else { 0 }, IntClass::Bool)
    }

    pub fn datetime(v: i64) -> Value {
        Value::Int(v, IntClass::Datetime)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(..) | Value::Float(_) | Value::Double(_))
    }

    /// Numeric view. Strings parse leniently (leading numeric prefix);
    /// anything non-numeric is 0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Int(v, _) => *v as f64,
            Value::Float(v) => f64::from(*v),
            Value::Double(v) => *v,
            Value::Str(s) => parse_lenient_f64(s),
            Value::Array(_) | Value::Object(_) | Value::Empty => 0.0,
        }
    }

    /// Integer view: exact for integer classes, truncation toward zero for
    /// floating values and numeric strings.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Int(v, _) => *v,
            other => other.as_f64().trunc() as i64,
        }
    }

    /// Dialect truthiness: nonzero numeric value.
    pub fn is_truthy(&self) -> bool {
        self.as_f64() != 0.0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_, IntClass::Bool) => "bool",
            Value::Int(_, IntClass::Datetime) => "datetime",
            Value::Int(_, IntClass::Color) => "color",
            Value::Int(_, c) if c.is_unsigned() => "uint",
            Value::Int(..) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Empty => "void",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Empty, Value::Empty) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v, _) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(a) => {
                let buf = a.borrow();
                let parts: Vec<String> = buf.values().iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Object(o) => write!(f, "{}", o.borrow().class),
            Value::Empty => Ok(()),
        }
    }
}

/// Parse the longest numeric prefix of `s`, returning 0 when there is none.
pub fn parse_lenient_f64(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    let bytes = t.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let c = bytes[end] as char;
        let ok = match c {
            '0'..='9' => {
                seen_digit = true;
                true
            }
            '+' | '-' => {
                end == 0 || matches!(bytes[end - 1] as char, 'e' | 'E')
            }
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            'e' | 'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end += 1;
    }
    // back off a trailing exponent marker or sign with no digits after it
    while end > 0 && matches!(bytes[end - 1] as char, 'e' | 'E' | '+' | '-') {
        end -= 1;
    }
    t[..end].parse::<f64>().unwrap_or(0.0)
}
