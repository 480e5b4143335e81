use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("MathAbs", "double value", "double", "Absolute value"),
    ("MathMax", "double a, double b", "double", "Larger of two values"),
    ("MathMin", "double a, double b", "double", "Smaller of two values"),
    ("MathPow", "double base, double exponent", "double", "Base raised to the exponent"),
    ("MathSqrt", "double value", "double", "Square root, NaN for negative input"),
    ("MathFloor", "double value", "double", "Largest integer not above the value"),
    ("MathCeil", "double value", "double", "Smallest integer not below the value"),
    ("MathRound", "double value", "double", "Nearest integer, halves away from zero"),
    ("MathLog", "double value", "double", "Natural logarithm"),
    ("MathLog10", "double value", "double", "Base-10 logarithm"),
    ("MathExp", "double value", "double", "e raised to the value"),
    ("MathSin", "double radians", "double", "Sine"),
    ("MathCos", "double radians", "double", "Cosine"),
    ("MathTan", "double radians", "double", "Tangent"),
    ("MathArcsin", "double value", "double", "Arc sine in radians"),
    ("MathArccos", "double value", "double", "Arc cosine in radians"),
    ("MathArctan", "double value", "double", "Arc tangent in radians"),
    ("MathMod", "double value, double divisor", "double", "Floating-point remainder"),
    ("MathRand", "", "int", "Next pseudo-random value in 0..32767"),
    ("MathSrand", "int seed", "void", "Reseed the pseudo-random generator"),
    ("fabs", "double value", "double", "Absolute value"),
    ("fmax", "double a, double b", "double", "Larger of two values"),
    ("fmin", "double a, double b", "double", "Smaller of two values"),
];
