//! ULP and absolute error between a device result and a wider reference value.
//!
//! Errors are signed and fractional: `0.5` means the device result sits half a unit in
//! the last place of the reference's binade away from the reference.

use crate::Precision;

const FLT_MANT_DIG: i32 = 24;
const FLT_MIN_EXP: i32 = -125;
const DBL_MANT_DIG: i32 = 53;
const DBL_MIN_EXP: i32 = -1021;

/// Stand-in for an infinite single-precision result: one binade above `FLT_MAX`.
const FLT_OVERFLOW: f64 = 340282366920938463463374607431768211456.0; // 2^128

/// `ilogb(0)`.
pub const ILOGB_ZERO: i32 = i32::MIN;
/// `ilogb(NaN)` and `ilogb(±inf)`.
pub const ILOGB_NAN: i32 = i32::MAX;

pub fn ilogb(x: f64) -> i32 {
    if x == 0.0 {
        return ILOGB_ZERO;
    }
    if !x.is_finite() {
        return ILOGB_NAN;
    }
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    if exponent == 0 {
        let mantissa = bits & ((1u64 << 52) - 1);
        (63 - mantissa.leading_zeros() as i32) - 1074
    } else {
        exponent - 1023
    }
}

/// `x * 2^n` without intermediate overflow for large `|n|`.
pub fn scalbn(mut x: f64, mut n: i32) -> f64 {
    let two_1023 = f64::from_bits(0x7fe0_0000_0000_0000);
    let two_m1022 = f64::from_bits(0x0010_0000_0000_0000);
    while n > 1023 {
        x *= two_1023;
        n -= 1023;
        if x.is_infinite() {
            return x;
        }
    }
    while n < -1022 {
        x *= two_m1022;
        n += 1022;
        if x == 0.0 {
            return x;
        }
    }
    x * f64::from_bits(((n + 1023) as u64) << 52)
}

/// Error of a single-precision `test` against a double-precision `reference`, in ulps.
pub fn ulp_error_f32(test: f32, reference: f64) -> f64 {
    let mut test = f64::from(test);
    if reference.is_infinite() {
        if test == reference {
            return 0.0;
        }
        return test - reference;
    }
    if test.is_infinite() {
        test = FLT_OVERFLOW.copysign(test);
    }
    let ulp_exp = if reference.to_bits() & 0x000f_ffff_ffff_ffff != 0 {
        if reference.is_nan() && test.is_nan() {
            return 0.0;
        }
        FLT_MANT_DIG - 1 - ilogb(reference).max(FLT_MIN_EXP - 1)
    } else {
        // Powers of two and zero: the ulp below the reference is half as wide.
        FLT_MANT_DIG - 1 - ilogb(reference).saturating_sub(1).max(FLT_MIN_EXP - 1)
    };
    scalbn(test - reference, ulp_exp)
}

/// Error of a double-precision `test` against a double-precision `reference`, in ulps.
///
/// The host has no type wider than `f64`, so the reference itself may be off by half
/// an ulp; the result is widened by `0.5` away from zero to account for it.
pub fn ulp_error_f64(test: f64, reference: f64) -> f64 {
    let power_of_two =
        reference.is_finite() && reference != 0.0 && reference.to_bits() & 0x000f_ffff_ffff_ffff == 0;
    let ulp_exp = if !power_of_two {
        if reference.is_infinite() {
            if test == reference {
                return 0.0;
            }
            return test - reference;
        }
        if reference.is_nan() && test.is_nan() {
            return 0.0;
        }
        DBL_MANT_DIG - 1 - ilogb(reference).max(DBL_MIN_EXP - 1)
    } else {
        DBL_MANT_DIG - 1 - (ilogb(reference) - 1).max(DBL_MIN_EXP - 1)
    };
    let result = scalbn(test - reference, ulp_exp);
    result + 0.5f64.copysign(result)
}

/// ULP error for a device value of `precision`; `test` must be exactly representable.
pub fn ulp_error(precision: Precision, test: f64, reference: f64) -> f64 {
    match precision {
        Precision::Single => ulp_error_f32(test as f32, reference),
        Precision::Double => ulp_error_f64(test, reference),
    }
}

pub fn abs_error(test: f64, reference: f64) -> f64 {
    (test - reference).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_results_have_zero_error() {
        assert_eq!(ulp_error_f32(1.0, 1.0), 0.0);
        assert_eq!(ulp_error_f32(f32::INFINITY, f64::INFINITY), 0.0);
        assert_eq!(ulp_error_f32(f32::NAN, f64::NAN), 0.0);
    }

    #[test]
    fn one_ulp_above_one() {
        let next = f32::from_bits(1.0f32.to_bits() + 1);
        assert_eq!(ulp_error_f32(next, 1.0), 1.0);
        // Below a power of two the ulp is half as wide.
        let prev = f32::from_bits(1.0f32.to_bits() - 1);
        assert_eq!(ulp_error_f32(prev, 1.0), -1.0);
    }

    #[test]
    fn fractional_error_against_wider_reference() {
        let reference = 1.0 + f64::from(f32::EPSILON) * 0.25;
        let err = ulp_error_f32(1.0, reference);
        assert!((err + 0.25).abs() < 1e-12, "err = {err}");
    }

    #[test]
    fn subnormal_ulps_use_the_smallest_step() {
        let tiny = f32::from_bits(1);
        assert_eq!(ulp_error_f32(0.0, f64::from(tiny)), -1.0);
        assert_eq!(ulp_error_f32(f32::from_bits(3), f64::from(tiny)), 2.0);
    }

    #[test]
    fn nan_against_number_is_unbounded() {
        assert!(ulp_error_f32(f32::NAN, 1.5).is_nan());
        assert!(ulp_error_f32(1.5, f64::NAN).is_nan());
        assert_eq!(ulp_error_f32(0.0, f64::INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn infinite_test_is_clamped_to_next_binade() {
        let err = ulp_error_f32(f32::INFINITY, f64::from(f32::MAX));
        assert_eq!(err, 1.0);
    }

    #[test]
    fn double_errors_carry_half_ulp_of_reference_uncertainty() {
        let next = f64::from_bits(1.5f64.to_bits() + 1);
        assert_eq!(ulp_error_f64(next, 1.5), 1.5);
        assert_eq!(ulp_error_f64(1.5, next), -1.5);
    }

    #[test]
    fn ilogb_and_scalbn_cover_subnormals() {
        assert_eq!(ilogb(1.0), 0);
        assert_eq!(ilogb(f64::from_bits(1)), -1074);
        assert_eq!(ilogb(f64::from(f32::from_bits(1))), -149);
        assert_eq!(ilogb(0.0), ILOGB_ZERO);
        assert_eq!(scalbn(1.0, 1074), f64::INFINITY);
        assert_eq!(scalbn(f64::from_bits(1), 1074), 1.0);
        assert_eq!(scalbn(3.0, -2), 0.75);
    }
}
