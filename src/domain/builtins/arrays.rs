//! Array manipulation builtins.
//!
//! These operate on the shared [`SeriesBuffer`] behind the array handle, so
//! changes are visible to every holder. Window arguments follow the
//! dialect's convention that a non-positive count means "to the end".

use crate::domain::error::RuntimeError;
use crate::domain::value::Value;

use super::{array, int, int_or, num, put, BuiltinMap};

/// Logical index range `[start, start+count)` clipped to the buffer.
fn window(len: usize, count: i64, start: i64) -> std::ops::Range<usize> {
    let start = start.max(0) as usize;
    let end = if count <= 0 {
        len
    } else {
        (start.saturating_add(count as usize)).min(len)
    };
    start.min(len)..end
}

pub(super) fn install(map: &mut BuiltinMap) {
    put(map, "ArrayResize", |_env, args| {
        let target = array("ArrayResize", args, 0)?;
        let size = int(args, 1);
        if size < 0 {
            return Err(RuntimeError::new(format!(
                "ArrayResize to negative size {size}"
            )));
        }
        target.borrow_mut().resize(size as usize, Value::int(0));
        Ok(Value::int(size))
    });
    put(map, "ArraySize", |_env, args| {
        let target = array("ArraySize", args, 0)?;
        let len = target.borrow().len();
        Ok(Value::int(len as i64))
    });
    put(map, "ArraySetAsSeries", |_env, args| {
        let target = array("ArraySetAsSeries", args, 0)?;
        let mut buffer = target.borrow_mut();
        let previous = buffer.as_series();
        buffer.set_as_series(args.get(1).map_or(false, Value::is_truthy));
        Ok(Value::bool_val(previous))
    });
    put(map, "ArrayGetAsSeries", |_env, args| {
        let target = array("ArrayGetAsSeries", args, 0)?;
        let on = target.borrow().as_series();
        Ok(Value::bool_val(on))
    });
    put(map, "ArrayInitialize", |_env, args| {
        let target = array("ArrayInitialize", args, 0)?;
        let value = Value::Double(num(args, 1));
        let mut buffer = target.borrow_mut();
        let len = buffer.len();
        for i in 0..len {
            buffer.set_physical(i, value.clone());
        }
        Ok(Value::int(len as i64))
    });
    put(map, "ArrayFill", |_env, args| {
        let target = array("ArrayFill", args, 0)?;
        let start = int(args, 1).max(0) as usize;
        let count = int(args, 2).max(0) as usize;
        target
            .borrow_mut()
            .fill_range(start, count, Value::Double(num(args, 3)));
        Ok(Value::Empty)
    });
    put(map, "ArrayCopy", |_env, args| {
        let target = array("ArrayCopy", args, 0)?;
        let source = array("ArrayCopy", args, 1)?;
        let to_start = int_or(args, 2, 0).max(0) as usize;
        let from = source.borrow();
        let range = window(from.len(), int_or(args, 4, 0), int_or(args, 3, 0));
        let copied = range.len();
        // self-copy through the same handle would deadlock the RefCell
        if std::rc::Rc::ptr_eq(&target, &source) {
            return Ok(Value::int(copied as i64));
        }
        let mut to = target.borrow_mut();
        if to.len() < to_start + copied {
            to.resize(to_start + copied, Value::int(0));
        }
        for (offset, i) in range.enumerate() {
            to.set_physical(to_start + offset, from.get_physical(i));
        }
        Ok(Value::int(copied as i64))
    });
    put(map, "ArrayMaximum", |_env, args| {
        let source = array("ArrayMaximum", args, 0)?;
        let buffer = source.borrow();
        let mut best: Option<(usize, f64)> = None;
        for i in window(buffer.len(), int_or(args, 1, 0), int_or(args, 2, 0)) {
            let v = buffer.get(i).as_f64();
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((i, v));
            }
        }
        Ok(Value::int(best.map_or(-1, |(i, _)| i as i64)))
    });
    put(map, "ArrayMinimum", |_env, args| {
        let source = array("ArrayMinimum", args, 0)?;
        let buffer = source.borrow();
        let mut best: Option<(usize, f64)> = None;
        for i in window(buffer.len(), int_or(args, 1, 0), int_or(args, 2, 0)) {
            let v = buffer.get(i).as_f64();
            if best.map_or(true, |(_, b)| v < b) {
                best = Some((i, v));
            }
        }
        Ok(Value::int(best.map_or(-1, |(i, _)| i as i64)))
    });
    put(map, "ArrayBsearch", |_env, args| {
        let source = array("ArrayBsearch", args, 0)?;
        let value = num(args, 1);
        let buffer = source.borrow();
        let range = window(buffer.len(), int_or(args, 2, 0), int_or(args, 3, 0));
        let fallback = range.start as i64;
        let mut found = None;
        for i in range {
            if buffer.get(i).as_f64() <= value {
                found = Some(i as i64);
            }
        }
        Ok(Value::int(found.unwrap_or(fallback)))
    });
    put(map, "ArrayFree", |_env, args| {
        let target = array("ArrayFree", args, 0)?;
        target.borrow_mut().resize(0, Value::Empty);
        Ok(Value::Empty)
    });
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, test_env};
    use super::super::BuiltinRegistry;
    use crate::domain::value::{new_array, ArrayRef, SeriesBuffer, Value};

    fn ints(values: &[i64]) -> ArrayRef {
        new_array(SeriesBuffer::from_values(
            values.iter().map(|&v| Value::int(v)).collect(),
        ))
    }

    #[test]
    fn resize_pads_growth_and_truncates_shrink() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[7, 8]);
        assert_eq!(
            call(&mut env, &registry, "ArrayResize", &[Value::Array(a.clone()), Value::int(4)]),
            Value::int(4)
        );
        assert_eq!(a.borrow().get_physical(1), Value::int(8));
        assert_eq!(a.borrow().get_physical(3), Value::int(0));
        call(&mut env, &registry, "ArrayResize", &[Value::Array(a.clone()), Value::int(1)]);
        assert_eq!(a.borrow().len(), 1);
        assert_eq!(a.borrow().get_physical(0), Value::int(7));
    }

    #[test]
    fn negative_resize_is_fatal() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let f = registry.lookup("ArrayResize").unwrap();
        let err = f(&mut env, &[Value::Array(ints(&[1])), Value::int(-3)]);
        assert!(err.is_err());
    }

    #[test]
    fn as_series_reports_the_previous_flag() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[1, 2, 3]);
        assert_eq!(
            call(
                &mut env,
                &registry,
                "ArraySetAsSeries",
                &[Value::Array(a.clone()), Value::bool_val(true)]
            ),
            Value::bool_val(false)
        );
        assert_eq!(
            call(&mut env, &registry, "ArrayGetAsSeries", &[Value::Array(a.clone())]),
            Value::bool_val(true)
        );
        // logical 0 now reads the newest physical slot
        assert_eq!(a.borrow().get(0), Value::int(3));
    }

    #[test]
    fn initialize_overwrites_every_slot() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[1, 2, 3]);
        assert_eq!(
            call(
                &mut env,
                &registry,
                "ArrayInitialize",
                &[Value::Array(a.clone()), Value::Double(9.5)]
            ),
            Value::int(3)
        );
        assert_eq!(a.borrow().get_physical(2), Value::Double(9.5));
    }

    #[test]
    fn fill_covers_a_range_and_stops_at_the_end() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[1, 2, 3, 4]);
        call(
            &mut env,
            &registry,
            "ArrayFill",
            &[Value::Array(a.clone()), Value::int(1), Value::int(2), Value::Double(0.5)],
        );
        assert_eq!(a.borrow().get_physical(0), Value::int(1));
        assert_eq!(a.borrow().get_physical(1), Value::Double(0.5));
        assert_eq!(a.borrow().get_physical(2), Value::Double(0.5));
        assert_eq!(a.borrow().get_physical(3), Value::int(4));
    }

    #[test]
    fn copy_grows_the_target_as_needed() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let target = ints(&[]);
        let source = ints(&[1, 2, 3]);
        assert_eq!(
            call(
                &mut env,
                &registry,
                "ArrayCopy",
                &[Value::Array(target.clone()), Value::Array(source)]
            ),
            Value::int(3)
        );
        assert_eq!(target.borrow().len(), 3);
        assert_eq!(target.borrow().get_physical(2), Value::int(3));
    }

    #[test]
    fn copy_honors_offsets_and_count() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let target = ints(&[9, 9, 9, 9]);
        let source = ints(&[1, 2, 3, 4]);
        assert_eq!(
            call(
                &mut env,
                &registry,
                "ArrayCopy",
                &[
                    Value::Array(target.clone()),
                    Value::Array(source),
                    Value::int(1),
                    Value::int(2),
                    Value::int(2),
                ]
            ),
            Value::int(2)
        );
        let t = target.borrow();
        assert_eq!(t.get_physical(0), Value::int(9));
        assert_eq!(t.get_physical(1), Value::int(3));
        assert_eq!(t.get_physical(2), Value::int(4));
        assert_eq!(t.get_physical(3), Value::int(9));
    }

    #[test]
    fn extrema_return_logical_indices() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[3, 9, 1, 9]);
        assert_eq!(
            call(&mut env, &registry, "ArrayMaximum", &[Value::Array(a.clone())]),
            Value::int(1)
        );
        assert_eq!(
            call(&mut env, &registry, "ArrayMinimum", &[Value::Array(a.clone())]),
            Value::int(2)
        );
        // the series flag reverses which index the same values map to
        a.borrow_mut().set_as_series(true);
        assert_eq!(
            call(&mut env, &registry, "ArrayMaximum", &[Value::Array(a.clone())]),
            Value::int(0)
        );
        assert_eq!(
            call(&mut env, &registry, "ArrayMinimum", &[Value::Array(a)]),
            Value::int(1)
        );
    }

    #[test]
    fn extrema_of_an_empty_array_are_negative() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[]);
        assert_eq!(
            call(&mut env, &registry, "ArrayMaximum", &[Value::Array(a)]),
            Value::int(-1)
        );
    }

    #[test]
    fn bsearch_finds_the_last_element_not_greater() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[10, 20, 30, 40]);
        assert_eq!(
            call(&mut env, &registry, "ArrayBsearch", &[Value::Array(a.clone()), Value::Double(30.0)]),
            Value::int(2)
        );
        assert_eq!(
            call(&mut env, &registry, "ArrayBsearch", &[Value::Array(a.clone()), Value::Double(35.0)]),
            Value::int(2)
        );
        assert_eq!(
            call(&mut env, &registry, "ArrayBsearch", &[Value::Array(a), Value::Double(5.0)]),
            Value::int(0)
        );
    }

    #[test]
    fn free_releases_the_storage() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        let a = ints(&[1, 2, 3]);
        call(&mut env, &registry, "ArrayFree", &[Value::Array(a.clone())]);
        assert_eq!(a.borrow().len(), 0);
    }
}
