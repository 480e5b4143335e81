//! Width-correct integer arithmetic.
//!
//! Integer operations wrap at the width and signedness of the operand
//! class, and integer division or modulo by zero yields 0 rather than
//! trapping, both dialect conventions the evaluator relies on.

use super::value::IntClass;

/// Wrap an arbitrary-precision result to the storage class.
pub fn wrap(class: IntClass, v: i128) -> i64 {
    match class {
        IntClass::Bool => {
            if v == 0 {
                0
            } else {
                1
            }
        }
        IntClass::Char => v as i8 as i64,
        IntClass::Uchar => v as u8 as i64,
        IntClass::Short => v as i16 as i64,
        IntClass::Ushort => v as u16 as i64,
        IntClass::Int => v as i32 as i64,
        IntClass::Uint => v as u32 as i64,
        IntClass::Color => v as i32 as i64,
        IntClass::Long | IntClass::Datetime => v as i64,
        // stored as the i64 bit pattern of the u64 result
        IntClass::Ulong => v as u64 as i64,
    }
}

/// Result class of a binary integer operation. Datetime survives addition
/// and subtraction; otherwise the wider class wins and unsigned wins ties.
pub fn promote(op: &str, l: IntClass, r: IntClass) -> IntClass {
    if matches!(op, "+" | "-") && (l == IntClass::Datetime || r == IntClass::Datetime) {
        return IntClass::Datetime;
    }
    let demote = |c: IntClass| if c == IntClass::Datetime { IntClass::Long } else { c };
    let (l, r) = (demote(l), demote(r));
    let wide = if l.rank() >= r.rank() { l } else { r };
    match wide {
        // narrow classes compute at int width, like C integer promotion
        IntClass::Bool | IntClass::Char | IntClass::Short => IntClass::Int,
        IntClass::Uchar | IntClass::Ushort => IntClass::Int,
        other => other,
    }
}

pub fn div(l: i64, r: i64) -> i64 {
    if r == 0 { 0 } else { l.wrapping_div(r) }
}

pub fn rem(l: i64, r: i64) -> i64 {
    if r == 0 { 0 } else { l.wrapping_rem(r) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wraps_at_32_bits() {
        assert_eq!(wrap(IntClass::Int, i128::from(i32::MAX) + 1), i64::from(i32::MIN));
        assert_eq!(wrap(IntClass::Uint, -1), i64::from(u32::MAX));
    }

    #[test]
    fn wraps_narrow_classes() {
        assert_eq!(wrap(IntClass::Char, 130), -126);
        assert_eq!(wrap(IntClass::Uchar, 260), 4);
        assert_eq!(wrap(IntClass::Short, 40000), 40000 - 65536);
        assert_eq!(wrap(IntClass::Bool, 17), 1);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(div(42, 0), 0);
        assert_eq!(rem(42, 0), 0);
        assert_eq!(div(42, 5), 8);
        assert_eq!(rem(42, 5), 2);
    }

    #[test]
    fn datetime_survives_additive_ops() {
        assert_eq!(promote("+", IntClass::Datetime, IntClass::Int), IntClass::Datetime);
        assert_eq!(promote("-", IntClass::Int, IntClass::Datetime), IntClass::Datetime);
        assert_eq!(promote("*", IntClass::Datetime, IntClass::Int), IntClass::Long);
    }

    #[test]
    fn narrow_classes_promote_to_int() {
        assert_eq!(promote("+", IntClass::Char, IntClass::Char), IntClass::Int);
        assert_eq!(promote("+", IntClass::Ushort, IntClass::Bool), IntClass::Int);
        assert_eq!(promote("+", IntClass::Int, IntClass::Long), IntClass::Long);
        assert_eq!(promote("+", IntClass::Int, IntClass::Uint), IntClass::Uint);
    }

    proptest! {
        #[test]
        fn int_wrap_matches_i32_semantics(a in any::<i32>(), b in any::<i32>()) {
            let sum = wrap(IntClass::Int, i128::from(a) + i128::from(b));
            prop_assert_eq!(sum, i64::from(a.wrapping_add(b)));
        }

        #[test]
        fn uint_wrap_stays_in_range(v in any::<i64>()) {
            let w = wrap(IntClass::Uint, i128::from(v));
            prop_assert!((0..=i64::from(u32::MAX)).contains(&w));
        }
    }
}
