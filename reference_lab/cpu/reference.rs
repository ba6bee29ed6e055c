//! Host reference math, evaluated in `f64` for both device precisions.
//!
//! Most builtins map straight onto `std`. The ones `std` lacks (`sinpi`, `remquo`,
//! `rootn`, ...) are written out here with the OpenCL special-case rules.

use std::f64::consts::PI;

use mathbrute_core::ulp::{ilogb, scalbn};

/// Largest float below one; `fract` never returns 1.
pub const FRACT_LIMIT: f32 = 0.999_999_94;

pub fn identity(x: f64) -> f64 {
    x
}

pub fn add(x: f64, y: f64) -> f64 {
    x + y
}

pub fn subtract(x: f64, y: f64) -> f64 {
    x - y
}

pub fn multiply(x: f64, y: f64) -> f64 {
    x * y
}

pub fn divide(x: f64, y: f64) -> f64 {
    x / y
}

pub fn recip(x: f64) -> f64 {
    1.0 / x
}

pub fn rsqrt(x: f64) -> f64 {
    1.0 / x.sqrt()
}

pub fn exp10(x: f64) -> f64 {
    10f64.powf(x)
}

pub fn logb(x: f64) -> f64 {
    if x.is_nan() {
        x
    } else if x.is_infinite() {
        f64::INFINITY
    } else if x == 0.0 {
        f64::NEG_INFINITY
    } else {
        f64::from(ilogb(x))
    }
}

pub fn rint(x: f64) -> f64 {
    x.round_ties_even()
}

/// `sin(πx)` with exact argument reduction; integers give a zero carrying the sign of `x`.
pub fn sinpi(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    let r = x.abs() % 2.0;
    let v = if r <= 0.25 {
        (PI * r).sin()
    } else if r <= 0.75 {
        (PI * (0.5 - r)).cos()
    } else if r <= 1.25 {
        (PI * (1.0 - r)).sin()
    } else if r <= 1.75 {
        -(PI * (r - 1.5)).cos()
    } else {
        (PI * (r - 2.0)).sin()
    };
    if x.is_sign_negative() {
        -v
    } else {
        v
    }
}

/// `cos(πx)`; half-integers give `+0`.
pub fn cospi(x: f64) -> f64 {
    if !x.is_finite() {
        return f64::NAN;
    }
    let r = x.abs() % 2.0;
    if r <= 0.25 {
        (PI * r).cos()
    } else if r <= 0.75 {
        (PI * (0.5 - r)).sin()
    } else if r <= 1.25 {
        -(PI * (1.0 - r)).cos()
    } else if r <= 1.75 {
        (PI * (r - 1.5)).sin()
    } else {
        (PI * (2.0 - r)).cos()
    }
}

pub fn fdim(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        f64::NAN
    } else if x > y {
        x - y
    } else {
        0.0
    }
}

pub fn fmax(x: f64, y: f64) -> f64 {
    x.max(y)
}

pub fn fmin(x: f64, y: f64) -> f64 {
    x.min(y)
}

pub fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

pub fn maxmag(x: f64, y: f64) -> f64 {
    if x.abs() > y.abs() {
        x
    } else if y.abs() > x.abs() {
        y
    } else {
        x.max(y)
    }
}

pub fn minmag(x: f64, y: f64) -> f64 {
    if x.abs() < y.abs() {
        x
    } else if y.abs() < x.abs() {
        y
    } else {
        x.min(y)
    }
}

pub fn copysign(x: f64, y: f64) -> f64 {
    x.copysign(y)
}

pub fn atan2(y: f64, x: f64) -> f64 {
    y.atan2(x)
}

pub fn acospi(x: f64) -> f64 {
    x.acos() / PI
}

pub fn asinpi(x: f64) -> f64 {
    x.asin() / PI
}

pub fn atanpi(x: f64) -> f64 {
    x.atan() / PI
}

pub fn atan2pi(y: f64, x: f64) -> f64 {
    y.atan2(x) / PI
}

pub fn hypot(x: f64, y: f64) -> f64 {
    x.hypot(y)
}

pub fn pow(x: f64, y: f64) -> f64 {
    x.powf(y)
}

/// `pow` restricted to `x >= 0`, with the indeterminate forms returning NaN.
pub fn powr(x: f64, y: f64) -> f64 {
    let indeterminate = (x == 0.0 && y == 0.0)
        || (x.is_infinite() && y == 0.0)
        || (x == 1.0 && y.is_infinite());
    if x.is_nan() || y.is_nan() || x < 0.0 || indeterminate {
        f64::NAN
    } else {
        x.powf(y)
    }
}

pub fn ldexp(x: f64, n: i32) -> f64 {
    scalbn(x, n)
}

pub fn pown(x: f64, n: i32) -> f64 {
    x.powi(n)
}

pub fn rootn(x: f64, n: i32) -> f64 {
    if n == 0 || x.is_nan() || (x < 0.0 && n % 2 == 0) {
        return f64::NAN;
    }
    if x == 0.0 {
        let odd_sign = if n % 2 != 0 { x.signum() } else { 1.0 };
        return if n > 0 {
            0.0_f64.copysign(odd_sign)
        } else {
            f64::INFINITY.copysign(odd_sign)
        };
    }
    let magnitude = x.abs().powf(1.0 / f64::from(n));
    if x < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

pub fn fma(a: f64, b: f64, c: f64) -> f64 {
    a.mul_add(b, c)
}

/// `a * b + c` for single-precision operands, rounded to odd in the last `f64` bit
/// so that a second rounding to `f32` is still correct.
pub fn fma_single(a: f64, b: f64, c: f64) -> f64 {
    // Exact: two 24-bit significands fit in 53 bits.
    let p = a * b;
    let s = p + c;
    if !p.is_finite() || !c.is_finite() || !s.is_finite() {
        return a.mul_add(b, c);
    }
    let v = s - p;
    let e = (p - (s - v)) + (c - v);
    if e == 0.0 || s.to_bits() & 1 == 1 {
        return s;
    }
    if (e > 0.0) == (s > 0.0) {
        f64::from_bits(s.to_bits() + 1)
    } else {
        f64::from_bits(s.to_bits() - 1)
    }
}

pub fn mad(a: f64, b: f64, c: f64) -> f64 {
    a * b + c
}

/// `c ? b : a` with any non-zero `c` selecting `b`.
pub fn select(a: f64, b: f64, c: f64) -> f64 {
    if c != 0.0 {
        b
    } else {
        a
    }
}

/// Quiet NaN whose payload carries the low mantissa bits of `code`.
pub fn nan(code: u64) -> f64 {
    f64::from_bits(0x7ff8_0000_0000_0000 | (code & 0x0007_ffff_ffff_ffff))
}

pub fn ilogb_ref(x: f64) -> i32 {
    ilogb(x)
}

pub fn sincos(x: f64) -> (f64, f64) {
    x.sin_cos()
}

/// Fractional and integral parts, both carrying the sign of `x`.
pub fn modf(x: f64) -> (f64, f64) {
    if x.is_nan() {
        return (x, x);
    }
    let whole = x.trunc();
    let part = if x.is_infinite() { 0.0 } else { x - whole };
    (part.copysign(x), whole)
}

/// `x - floor(x)` clamped below one, and `floor(x)`.
pub fn fract(x: f64) -> (f64, f64) {
    if x.is_nan() {
        return (x, x);
    }
    let whole = x.floor();
    if x.is_infinite() {
        return (0.0_f64.copysign(x), whole);
    }
    let part = (x - whole).min(f64::from(FRACT_LIMIT));
    (part.copysign(if part == 0.0 { x } else { 1.0 }), whole)
}

/// Mantissa in `[0.5, 1)` and exponent; zero, infinity and NaN keep `x` with exponent 0.
pub fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let e = ilogb(x) + 1;
    (scalbn(x, -e), e)
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// `ln|Γ(x)|` and the sign of `Γ(x)`. Poles give `+inf`; zeros keep their sign.
pub fn lgamma_r(x: f64) -> (f64, i32) {
    if x.is_nan() {
        return (x, 1);
    }
    if x.is_infinite() {
        return (f64::INFINITY, 1);
    }
    if x == 0.0 {
        return (f64::INFINITY, if x.is_sign_negative() { -1 } else { 1 });
    }
    if x < 0.5 {
        if x == x.floor() {
            return (f64::INFINITY, 1);
        }
        // Γ(x)Γ(1-x) = π / sin(πx)
        let s = sinpi(x);
        let sign = if s < 0.0 { -1 } else { 1 };
        return ((PI / s.abs()).ln() - lgamma_r(1.0 - x).0, sign);
    }
    let z = x - 1.0;
    let t = z + LANCZOS_G + 0.5;
    let series = LANCZOS[1..]
        .iter()
        .enumerate()
        .fold(LANCZOS[0], |acc, (k, c)| acc + c / (z + (k + 1) as f64));
    let value = 0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + series.ln();
    (value, 1)
}

pub fn lgamma(x: f64) -> f64 {
    lgamma_r(x).0
}

/// IEEE remainder and the low seven bits of the rounded quotient.
pub fn remquo(xx: f64, yy: f64) -> (f64, i32) {
    if xx.is_nan() || yy.is_nan() || xx.is_infinite() || yy == 0.0 {
        return (f64::NAN, 0);
    }
    if yy.is_infinite() || xx == 0.0 {
        return (xx, 0);
    }
    if xx.abs() == yy.abs() {
        let q = if xx == yy { 1 } else { -1 };
        return (0.0_f64.copysign(xx), q);
    }

    let negative_quotient = xx.is_sign_negative() != yy.is_sign_negative();
    let x = xx.abs();
    let y = yy.abs();
    let ex = ilogb(x);
    let ey = ilogb(y);
    let mut xr = x;
    let mut yr = y;
    let mut q: u32 = 0;

    // Long division on mantissas normalized to [1, 2); every step is exact.
    if ex - ey >= -1 {
        yr = scalbn(y, -ey);
        xr = scalbn(x, -ex);
        if ex - ey >= 0 {
            for _ in 0..ex - ey {
                q <<= 1;
                if xr >= yr {
                    xr -= yr;
                    q += 1;
                }
                xr += xr;
            }
            q <<= 1;
            if xr > yr {
                xr -= yr;
                q += 1;
            }
        } else {
            xr = scalbn(xr, ex - ey);
        }
    }
    if yr < 2.0 * xr || (yr == 2.0 * xr && q & 1 == 1) {
        xr -= yr;
        q = q.wrapping_add(1);
    }
    if ex - ey >= -1 {
        xr = scalbn(xr, ey);
    }

    let low = (q & 0x7f) as i32;
    let quotient = if negative_quotient { -low } else { low };
    let remainder = if xx < 0.0 { -xr } else { xr };
    (remainder, quotient)
}

pub fn remainder(x: f64, y: f64) -> f64 {
    remquo(x, y).0
}

fn truth(cond: bool) -> i32 {
    i32::from(cond)
}

pub fn isfinite(x: f64) -> i32 {
    truth(x.is_finite())
}

pub fn isinf(x: f64) -> i32 {
    truth(x.is_infinite())
}

pub fn isnan(x: f64) -> i32 {
    truth(x.is_nan())
}

pub fn signbit(x: f64) -> i32 {
    truth(x.is_sign_negative())
}

pub fn not(x: f64) -> i32 {
    truth(x == 0.0)
}

pub fn isequal(x: f64, y: f64) -> i32 {
    truth(x == y)
}

pub fn isnotequal(x: f64, y: f64) -> i32 {
    truth(x != y)
}

pub fn isgreater(x: f64, y: f64) -> i32 {
    truth(x > y)
}

pub fn isgreaterequal(x: f64, y: f64) -> i32 {
    truth(x >= y)
}

pub fn isless(x: f64, y: f64) -> i32 {
    truth(x < y)
}

pub fn islessequal(x: f64, y: f64) -> i32 {
    truth(x <= y)
}

pub fn islessgreater(x: f64, y: f64) -> i32 {
    truth(x < y || x > y)
}

pub fn isordered(x: f64, y: f64) -> i32 {
    truth(!x.is_nan() && !y.is_nan())
}

pub fn isunordered(x: f64, y: f64) -> i32 {
    truth(x.is_nan() || y.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn single_fma_survives_the_second_rounding() {
        let a = 1.0 + 2f64.powi(-12);
        let c = 2f64.powi(-80);
        let correct = 1.0 + 2f32.powi(-11) + 2f32.powi(-23);
        assert_eq!((a as f32).mul_add(a as f32, c as f32), correct);
        assert_eq!(fma_single(a, a, c) as f32, correct);
        assert_ne!(fma(a, a, c) as f32, correct, "plain f64 rounds to the tie");
        assert_eq!(fma_single(2.0, 3.0, 1.0), 7.0);
        assert!(fma_single(f64::INFINITY, 0.0, 1.0).is_nan());
    }

    #[test]
    fn lgamma_matches_known_values_and_signs() {
        assert!(lgamma(1.0).abs() < 1e-14);
        assert!(lgamma(2.0).abs() < 1e-14);
        let half = PI.sqrt().ln();
        assert!((lgamma(0.5) - half).abs() < 1e-14);
        assert!((lgamma(5.0) - 24f64.ln()).abs() < 1e-13);
        // Γ(-0.5) = -2√π
        let (value, sign) = lgamma_r(-0.5);
        assert_eq!(sign, -1);
        assert!((value - (2.0 * PI.sqrt()).ln()).abs() < 1e-13);
        assert_eq!(lgamma_r(-1.5).1, 1);
        assert_eq!(lgamma_r(-0.0), (f64::INFINITY, -1));
        assert_eq!(lgamma_r(-3.0), (f64::INFINITY, 1));
        assert!(lgamma(f64::NAN).is_nan());
    }

    #[test]
    fn pi_scaled_inverses_land_on_simple_fractions() {
        assert_eq!(acospi(-1.0), 1.0);
        assert_eq!(asinpi(1.0), 0.5);
        assert_eq!(atanpi(f64::INFINITY), 0.5);
        assert_eq!(atan2pi(0.0, -1.0), 1.0);
        assert!(acospi(2.0).is_nan());
    }

    #[test]
    fn sinpi_and_cospi_hit_exact_zeros_and_ones() {
        assert_eq!(sinpi(1.0), 0.0);
        assert!(sinpi(-2.0).is_sign_negative());
        assert_eq!(sinpi(0.5), 1.0);
        assert_eq!(sinpi(-1.5), 1.0);
        assert_eq!(cospi(0.5).to_bits(), 0.0f64.to_bits());
        assert_eq!(cospi(1.0), -1.0);
        assert!(sinpi(f64::INFINITY).is_nan());
    }

    #[test]
    fn sinpi_tracks_sin_on_small_inputs() {
        let mut rng = StdRng::seed_from_u64(0x51_4E);
        for _ in 0..512 {
            let x: f64 = rng.gen_range(-4.0..4.0);
            let expected = (PI * x).sin();
            let got = sinpi(x);
            assert!(
                (expected - got).abs() <= 1e-12,
                "sinpi({x}) = {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn remquo_matches_ieee_remainder() {
        let mut rng = StdRng::seed_from_u64(0xBEEF);
        for _ in 0..1024 {
            let x: f64 = f64::from(rng.gen_range(-1.0e4f32..1.0e4));
            let y: f64 = f64::from(rng.gen_range(0.5f32..300.0));
            let (r, q) = remquo(x, y);
            let n = (x / y).round_ties_even();
            let expected = x - n * y;
            assert!(
                (r - expected).abs() <= 1e-9 * y,
                "remquo({x}, {y}) remainder {r}, expected {expected}"
            );
            assert_eq!(i64::from(q), (n as i64).signum() * ((n as i64).abs() & 0x7f));
            assert!(r.abs() <= y / 2.0);
        }
    }

    #[test]
    fn remquo_rounds_ties_to_even_quotients() {
        assert_eq!(remquo(5.0, 2.0), (1.0, 2));
        assert_eq!(remquo(7.0, 2.0), (-1.0, 4));
        assert_eq!(remquo(-7.0, 2.0), (1.0, -4));
        let (r, q) = remquo(1.0, 0.0);
        assert!(r.is_nan());
        assert_eq!(q, 0);
    }

    #[test]
    fn frexp_normalizes_subnormals() {
        let tiny = f64::from(f32::from_bits(1));
        let (m, e) = frexp(tiny);
        assert_eq!(m, 0.5);
        assert_eq!(e, -148);
        assert_eq!(frexp(12.0), (0.75, 4));
    }

    #[test]
    fn fract_never_reaches_one() {
        let (part, whole) = fract(-1.0e-30);
        assert_eq!(part, f64::from(FRACT_LIMIT));
        assert_eq!(whole, -1.0);
        assert_eq!(fract(2.25), (0.25, 2.0));
    }

    #[test]
    fn rootn_and_powr_special_cases() {
        assert_eq!(rootn(-8.0, 3), -2.0);
        assert!(rootn(-8.0, 2).is_nan());
        assert_eq!(rootn(-0.0, -3), f64::NEG_INFINITY);
        assert!(powr(-1.0, 2.0).is_nan());
        assert!(powr(0.0, 0.0).is_nan());
        assert_eq!(powr(4.0, 0.5), 2.0);
    }

    #[test]
    fn magnitude_selection_prefers_larger_or_smaller_abs() {
        assert_eq!(maxmag(-3.0, 2.0), -3.0);
        assert_eq!(minmag(-3.0, 2.0), 2.0);
        assert_eq!(maxmag(-2.0, 2.0), 2.0);
        assert_eq!(minmag(-2.0, 2.0), -2.0);
    }
}
