//! Cross-numeric-kind equality and ordering.
//!
//! `int`, `uint`, and `double` compare equal when their mathematical values
//! are equal; a negative `int` is never equal to any `uint`; NaN is never
//! equal to anything; an out-of-`i64`/`u64`-range `double` compares unequal
//! to any integer kind, never errors. Seq has no cross-kind numeric
//! comparison to model this on, so this module widens through `i128` to
//! get exact comparisons without pulling in a multi-precision crate.

use std::cmp::Ordering;

/// One value across the three numeric kinds, for comparison purposes only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Uint(u64),
    Double(f64),
}

/// Exact mathematical comparison across `int`/`uint`/`double`.
///
/// Returns `None` when the values are incomparable (either side is NaN) —
/// callers treat `None` as "not equal, not ordered" — cross-numeric-kind
/// comparison is only defined for equality at the edges, not a total order.
pub fn compare(a: Numeric, b: Numeric) -> Option<Ordering> {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
        (Numeric::Uint(x), Numeric::Uint(y)) => Some(x.cmp(&y)),
        (Numeric::Double(x), Numeric::Double(y)) => x.partial_cmp(&y),

        (Numeric::Int(x), Numeric::Uint(y)) => Some(compare_int_uint(x, y)),
        (Numeric::Uint(x), Numeric::Int(y)) => Some(compare_int_uint(y, x).reverse()),

        (Numeric::Int(x), Numeric::Double(y)) => compare_int_double(x, y),
        (Numeric::Double(x), Numeric::Int(y)) => compare_int_double(y, x).map(Ordering::reverse),

        (Numeric::Uint(x), Numeric::Double(y)) => compare_uint_double(x, y),
        (Numeric::Double(x), Numeric::Uint(y)) => compare_uint_double(y, x).map(Ordering::reverse),
    }
}

/// Cross-kind numeric equality. `false` rather
/// than an error for every incomparable or unequal pair.
pub fn equal(a: Numeric, b: Numeric) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

fn compare_int_uint(x: i64, y: u64) -> Ordering {
    if x < 0 {
        return Ordering::Less;
    }
    (x as u64).cmp(&y)
}

/// `None` when `y` is NaN (incomparable); otherwise exact via `i128`.
fn compare_int_double(x: i64, y: f64) -> Option<Ordering> {
    if y.is_nan() {
        return None;
    }
    if y.is_infinite() {
        return Some(if y.is_sign_positive() {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    // f64 exactly represents every integer up to 2^53; beyond that we still
    // get an exact comparison by checking the fractional part and widening
    // the truncated double into i128 alongside x.
    if y.fract() != 0.0 {
        // Compare via the real number line: find the two integers y sits
        // between and compare x against them.
        let floor = y.floor();
        let ceil = y.ceil();
        return match compare_int_double(x, floor) {
            Some(Ordering::Equal) | Some(Ordering::Greater) => compare_int_double(x, ceil),
            other => other,
        };
    }
    // y is a finite integer-valued double; i128 covers both i64::MIN/MAX and
    // any f64 magnitude that matters (f64 tops out far below i128::MAX, and
    // anything larger than i128::MAX as a double sorts above all i64).
    const I128_F64_BOUND: f64 = 1.7e38;
    if y.abs() >= I128_F64_BOUND {
        return Some(if y > 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    let y_i128 = y as i128;
    Some((x as i128).cmp(&y_i128))
}

fn compare_uint_double(x: u64, y: f64) -> Option<Ordering> {
    if y.is_nan() {
        return None;
    }
    if y < 0.0 {
        return Some(Ordering::Greater);
    }
    if y.is_infinite() {
        return Some(Ordering::Less);
    }
    if y.fract() != 0.0 {
        let floor = y.floor();
        let ceil = y.ceil();
        return match compare_uint_double(x, floor) {
            Some(Ordering::Equal) | Some(Ordering::Greater) => compare_uint_double(x, ceil),
            other => other,
        };
    }
    const U128_F64_BOUND: f64 = 3.4e38;
    if y >= U128_F64_BOUND {
        return Some(Ordering::Less);
    }
    let y_u128 = y as u128;
    Some((x as u128).cmp(&y_u128))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_int_equals_uint() {
        assert!(equal(Numeric::Int(1), Numeric::Uint(1)));
    }

    #[test]
    fn s2_double_equals_int() {
        assert!(equal(Numeric::Double(1.0), Numeric::Int(1)));
    }

    #[test]
    fn s3_nan_never_equal() {
        assert!(!equal(Numeric::Double(f64::NAN), Numeric::Double(f64::NAN)));
    }

    #[test]
    fn negative_int_never_equals_uint() {
        assert!(!equal(Numeric::Int(-1), Numeric::Uint(0)));
        assert!(!equal(Numeric::Uint(0), Numeric::Int(-1)));
    }

    #[test]
    fn out_of_range_double_is_unequal_not_error() {
        assert!(!equal(Numeric::Int(1), Numeric::Double(1e300)));
        assert!(!equal(Numeric::Uint(1), Numeric::Double(-1.0)));
    }

    #[test]
    fn fractional_double_never_equals_integer() {
        assert!(!equal(Numeric::Int(1), Numeric::Double(1.5)));
    }

    #[test]
    fn near_i64_max_boundary_is_exact() {
        // i64::MAX as f64 rounds up to 2^63, one past i64::MAX, so the two
        // are not equal and the int sorts below the double.
        assert!(!equal(Numeric::Int(i64::MAX), Numeric::Double(i64::MAX as f64)));
        assert_eq!(
            compare(Numeric::Int(i64::MAX), Numeric::Double(i64::MAX as f64)),
            Some(Ordering::Less)
        );
        assert!(equal(Numeric::Int(1 << 53), Numeric::Double((1i64 << 53) as f64)));
    }

    #[test]
    fn ordering_across_kinds() {
        assert_eq!(
            compare(Numeric::Int(1), Numeric::Double(2.0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare(Numeric::Uint(5), Numeric::Int(3)),
            Some(Ordering::Greater)
        );
    }

    proptest::proptest! {
        #[test]
        fn int_uint_equal_iff_same_value(a: i64, b in 0u64..i64::MAX as u64) {
            let expected = a >= 0 && a as u64 == b;
            proptest::prop_assert_eq!(equal(Numeric::Int(a), Numeric::Uint(b)), expected);
        }

        #[test]
        fn int_double_equal_iff_exact(a: i32) {
            let a = a as i64;
            proptest::prop_assert!(equal(Numeric::Int(a), Numeric::Double(a as f64)));
        }
    }
}
