//! Pure numeric builtins and the deterministic random generator.

use crate::domain::value::Value;

use super::{int, num, put, BuiltinMap};

/// Register a one-argument function of f64.
fn unary(map: &mut BuiltinMap, name: &str, f: fn(f64) -> f64) {
    put(map, name, move |_env, args| Ok(Value::Double(f(num(args, 0)))));
}

/// Register a two-argument function of f64.
fn binary(map: &mut BuiltinMap, name: &str, f: fn(f64, f64) -> f64) {
    put(map, name, move |_env, args| {
        Ok(Value::Double(f(num(args, 0), num(args, 1))))
    });
}

pub(super) fn install(map: &mut BuiltinMap) {
    unary(map, "MathAbs", f64::abs);
    binary(map, "MathMax", f64::max);
    binary(map, "MathMin", f64::min);
    binary(map, "MathPow", f64::powf);
    unary(map, "MathSqrt", f64::sqrt);
    unary(map, "MathFloor", f64::floor);
    unary(map, "MathCeil", f64::ceil);
    unary(map, "MathRound", f64::round);
    unary(map, "MathLog", f64::ln);
    unary(map, "MathLog10", f64::log10);
    unary(map, "MathExp", f64::exp);
    unary(map, "MathSin", f64::sin);
    unary(map, "MathCos", f64::cos);
    unary(map, "MathTan", f64::tan);
    unary(map, "MathArcsin", f64::asin);
    unary(map, "MathArccos", f64::acos);
    unary(map, "MathArctan", f64::atan);
    binary(map, "MathMod", |a, b| a % b);
    put(map, "MathRand", |env, _args| {
        env.rand_state = env
            .rand_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        Ok(Value::int(((env.rand_state >> 33) & 0x7fff) as i64))
    });
    put(map, "MathSrand", |env, args| {
        env.rand_state = int(args, 0) as u64;
        Ok(Value::Empty)
    });
    unary(map, "fabs", f64::abs);
    binary(map, "fmax", f64::max);
    binary(map, "fmin", f64::min);
}

#[cfg(test)]
mod tests {
    use super::super::tests::{call, test_env};
    use super::super::BuiltinRegistry;
    use crate::domain::value::Value;

    fn eval(name: &str, args: &[Value]) -> Value {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        call(&mut env, &registry, name, args)
    }

    #[test]
    fn rounding_mode_is_half_away_from_zero() {
        assert_eq!(eval("MathRound", &[Value::Double(2.5)]), Value::Double(3.0));
        assert_eq!(eval("MathRound", &[Value::Double(-2.5)]), Value::Double(-3.0));
        assert_eq!(eval("MathRound", &[Value::Double(2.4)]), Value::Double(2.0));
        assert_eq!(eval("MathFloor", &[Value::Double(-0.5)]), Value::Double(-1.0));
        assert_eq!(eval("MathCeil", &[Value::Double(-0.5)]), Value::Double(-0.0));
    }

    #[test]
    fn mod_keeps_the_sign_of_the_dividend() {
        assert_eq!(eval("MathMod", &[Value::Double(7.5), Value::Double(2.0)]), Value::Double(1.5));
        assert_eq!(
            eval("MathMod", &[Value::Double(-7.5), Value::Double(2.0)]),
            Value::Double(-1.5)
        );
    }

    #[test]
    fn min_max_and_pow() {
        assert_eq!(eval("MathMax", &[Value::Double(1.0), Value::Double(2.0)]), Value::Double(2.0));
        assert_eq!(eval("MathMin", &[Value::int(3), Value::int(-4)]), Value::Double(-4.0));
        assert_eq!(eval("MathPow", &[Value::Double(2.0), Value::Double(10.0)]), Value::Double(1024.0));
        assert_eq!(eval("MathSqrt", &[Value::Double(9.0)]), Value::Double(3.0));
    }

    #[test]
    fn negative_sqrt_is_nan() {
        let Value::Double(v) = eval("MathSqrt", &[Value::Double(-1.0)]) else {
            panic!("expected a double");
        };
        assert!(v.is_nan());
    }

    #[test]
    fn aliases_share_the_core_behavior() {
        assert_eq!(
            eval("fabs", &[Value::Double(-2.5)]),
            eval("MathAbs", &[Value::Double(-2.5)])
        );
        assert_eq!(
            eval("fmax", &[Value::Double(1.0), Value::Double(2.0)]),
            eval("MathMax", &[Value::Double(1.0), Value::Double(2.0)])
        );
        assert_eq!(
            eval("fmin", &[Value::Double(1.0), Value::Double(2.0)]),
            eval("MathMin", &[Value::Double(1.0), Value::Double(2.0)])
        );
    }

    #[test]
    fn rand_sequence_is_deterministic_per_seed() {
        let registry = BuiltinRegistry::new();
        let mut env = test_env();
        call(&mut env, &registry, "MathSrand", &[Value::int(7)]);
        let first: Vec<i64> = (0..3)
            .map(|_| call(&mut env, &registry, "MathRand", &[]).as_i64())
            .collect();
        call(&mut env, &registry, "MathSrand", &[Value::int(7)]);
        let second: Vec<i64> = (0..3)
            .map(|_| call(&mut env, &registry, "MathRand", &[]).as_i64())
            .collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| (0..=32767).contains(v)));
        assert!(first.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn fresh_environments_share_the_default_seed() {
        let registry = BuiltinRegistry::new();
        let mut a = test_env();
        let mut b = test_env();
        assert_eq!(
            call(&mut a, &registry, "MathRand", &[]),
            call(&mut b, &registry, "MathRand", &[])
        );
    }
}
