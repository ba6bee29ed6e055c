//! Host-native builtins: what an ideal device computes, in the device's own precision.
//!
//! Single precision goes through the `f32` methods of `std` where they exist, so
//! results carry real single-precision rounding. The remaining builtins, and every
//! double-precision one, round the `f64` reference.

use mathbrute_core::CallForm;

use super::reference as r;

/// One builtin at both precisions, shaped like its call form.
#[derive(Clone, Copy)]
pub enum Native {
    Unary(fn(f32) -> f32, fn(f64) -> f64),
    UnaryToInt(fn(f32) -> i32, fn(f64) -> i32),
    UnaryFromUInt(fn(u32) -> f32, fn(u64) -> f64),
    Predicate(fn(f32) -> bool, fn(f64) -> bool),
    Binary(fn(f32, f32) -> f32, fn(f64, f64) -> f64),
    BinaryWithInt(fn(f32, i32) -> f32, fn(f64, i32) -> f64),
    BinaryPredicate(fn(f32, f32) -> bool, fn(f64, f64) -> bool),
    Ternary(fn(f32, f32, f32) -> f32, fn(f64, f64, f64) -> f64),
    UnaryTwoResults(fn(f32) -> (f32, f32), fn(f64) -> (f64, f64)),
    UnaryTwoResultsInt(fn(f32) -> (f32, i32), fn(f64) -> (f64, i32)),
    BinaryTwoResultsInt(fn(f32, f32) -> (f32, i32), fn(f64, f64) -> (f64, i32)),
}

/// Same `std` method at both precisions.
macro_rules! method {
    (unary $m:ident) => {
        Native::Unary(|x| x.$m(), |x| x.$m())
    };
    (binary $m:ident) => {
        Native::Binary(|x, y| x.$m(y), |x, y| x.$m(y))
    };
    (predicate $m:ident) => {
        Native::Predicate(|x| x.$m(), |x| x.$m())
    };
}

/// Single precision by rounding the `f64` reference.
macro_rules! rounded {
    (unary $f:path) => {
        Native::Unary(|x| $f(f64::from(x)) as f32, $f)
    };
    (binary $f:path) => {
        Native::Binary(|x, y| $f(f64::from(x), f64::from(y)) as f32, $f)
    };
    (binary_int $f:path) => {
        Native::BinaryWithInt(|x, n| $f(f64::from(x), n) as f32, $f)
    };
}

macro_rules! compare {
    ($op:tt) => {
        Native::BinaryPredicate(|x, y| x $op y, |x, y| x $op y)
    };
}

fn unary(function: &str) -> Option<Native> {
    let native = match function {
        "" => Native::Unary(|x| x, |x| x),
        "acos" => method!(unary acos),
        "acospi" => rounded!(unary r::acospi),
        "acosh" => method!(unary acosh),
        "asin" => method!(unary asin),
        "asinh" => method!(unary asinh),
        "asinpi" => rounded!(unary r::asinpi),
        "atan" => method!(unary atan),
        "atanh" => method!(unary atanh),
        "atanpi" => rounded!(unary r::atanpi),
        "cbrt" => method!(unary cbrt),
        "ceil" => method!(unary ceil),
        "cos" | "half_cos" => method!(unary cos),
        "cosh" => method!(unary cosh),
        "cospi" => rounded!(unary r::cospi),
        "exp" | "half_exp" => method!(unary exp),
        "exp2" | "half_exp2" => method!(unary exp2),
        "exp10" | "half_exp10" => rounded!(unary r::exp10),
        "expm1" => method!(unary exp_m1),
        "fabs" => method!(unary abs),
        "floor" => method!(unary floor),
        "lgamma" => rounded!(unary r::lgamma),
        "log" | "half_log" => method!(unary ln),
        "log2" | "half_log2" => method!(unary log2),
        "log10" | "half_log10" => method!(unary log10),
        "log1p" => method!(unary ln_1p),
        "logb" => rounded!(unary r::logb),
        "rint" => method!(unary round_ties_even),
        "round" => method!(unary round),
        "rsqrt" | "half_rsqrt" => Native::Unary(|x| 1.0 / x.sqrt(), r::rsqrt),
        "half_recip" => Native::Unary(|x| 1.0 / x, r::recip),
        "sin" | "half_sin" => method!(unary sin),
        "sinh" => method!(unary sinh),
        "sinpi" => rounded!(unary r::sinpi),
        "sqrt" | "half_sqrt" => method!(unary sqrt),
        "tan" | "half_tan" => method!(unary tan),
        "tanh" => method!(unary tanh),
        "trunc" => method!(unary trunc),
        _ => return None,
    };
    Some(native)
}

fn binary(function: &str) -> Option<Native> {
    let native = match function {
        "atan2" => method!(binary atan2),
        "atan2pi" => rounded!(binary r::atan2pi),
        "copysign" => method!(binary copysign),
        "fdim" => rounded!(binary r::fdim),
        "fmax" => method!(binary max),
        "fmin" => method!(binary min),
        "fmod" => Native::Binary(|x, y| x % y, r::fmod),
        "hypot" => method!(binary hypot),
        "maxmag" => rounded!(binary r::maxmag),
        "minmag" => rounded!(binary r::minmag),
        "pow" => method!(binary powf),
        "powr" | "half_powr" => rounded!(binary r::powr),
        "remainder" => rounded!(binary r::remainder),
        "half_divide" => Native::Binary(|x, y| x / y, r::divide),
        _ => return None,
    };
    Some(native)
}

fn operator(function: &str) -> Option<Native> {
    let native = match function {
        "+" => Native::Binary(|x, y| x + y, r::add),
        "-" => Native::Binary(|x, y| x - y, r::subtract),
        "*" => Native::Binary(|x, y| x * y, r::multiply),
        "/" => Native::Binary(|x, y| x / y, r::divide),
        _ => return None,
    };
    Some(native)
}

fn predicate(function: &str) -> Option<Native> {
    let native = match function {
        "isfinite" => method!(predicate is_finite),
        "isinf" => method!(predicate is_infinite),
        "isnan" => method!(predicate is_nan),
        "signbit" => method!(predicate is_sign_negative),
        "!" => Native::Predicate(|x| x == 0.0, |x| x == 0.0),
        _ => return None,
    };
    Some(native)
}

fn binary_predicate(function: &str) -> Option<Native> {
    let native = match function {
        "isequal" => compare!(==),
        "isnotequal" => compare!(!=),
        "isgreater" => compare!(>),
        "isgreaterequal" => compare!(>=),
        "isless" => compare!(<),
        "islessequal" => compare!(<=),
        "islessgreater" => Native::BinaryPredicate(|x, y| x < y || x > y, |x, y| x < y || x > y),
        "isordered" => Native::BinaryPredicate(
            |x, y| !x.is_nan() && !y.is_nan(),
            |x, y| !x.is_nan() && !y.is_nan(),
        ),
        "isunordered" => Native::BinaryPredicate(
            |x, y| x.is_nan() || y.is_nan(),
            |x, y| x.is_nan() || y.is_nan(),
        ),
        _ => return None,
    };
    Some(native)
}

fn ternary(function: &str) -> Option<Native> {
    let native = match function {
        "fma" => Native::Ternary(|a, b, c| a.mul_add(b, c), r::fma),
        "mad" => Native::Ternary(|a, b, c| a * b + c, r::mad),
        "select" => Native::Ternary(|a, b, c| if c != 0.0 { b } else { a }, r::select),
        _ => return None,
    };
    Some(native)
}

/// Builtins that only move or mask bits. Flushing devices pass their operands
/// through untouched, subnormals included.
pub fn moves_bits(function: &str) -> bool {
    matches!(function, "" | "fabs" | "copysign" | "select")
}

/// Host implementation of `function` called as `form`.
pub fn lookup(function: &str, form: CallForm) -> Option<Native> {
    match form {
        CallForm::Unary => unary(function),
        CallForm::Binary => binary(function),
        CallForm::BinaryOperator => operator(function),
        CallForm::Predicate => predicate(function),
        CallForm::BinaryPredicate => binary_predicate(function),
        CallForm::Ternary => ternary(function),
        CallForm::UnaryToInt => (function == "ilogb")
            .then_some(Native::UnaryToInt(|x| r::ilogb_ref(f64::from(x)), r::ilogb_ref)),
        CallForm::UnaryFromUInt => (function == "nan").then_some(Native::UnaryFromUInt(
            |code| f32::from_bits(0x7fc0_0000 | (code & 0x003f_ffff)),
            r::nan,
        )),
        CallForm::BinaryWithInt => match function {
            "ldexp" => Some(rounded!(binary_int r::ldexp)),
            "pown" => Some(rounded!(binary_int r::pown)),
            "rootn" => Some(rounded!(binary_int r::rootn)),
            _ => None,
        },
        CallForm::UnaryTwoResults => match function {
            "sincos" => Some(Native::UnaryTwoResults(|x| x.sin_cos(), r::sincos)),
            "modf" => Some(Native::UnaryTwoResults(
                |x| {
                    let (part, whole) = r::modf(f64::from(x));
                    (part as f32, whole as f32)
                },
                r::modf,
            )),
            "fract" => Some(Native::UnaryTwoResults(
                |x| {
                    let whole = x.floor();
                    if x.is_nan() {
                        return (x, x);
                    }
                    let part = if x.is_infinite() { 0.0 } else { (x - whole).min(r::FRACT_LIMIT) };
                    (if part == 0.0 { part.copysign(x) } else { part }, whole)
                },
                r::fract,
            )),
            _ => None,
        },
        CallForm::UnaryTwoResultsInt => match function {
            "frexp" => Some(Native::UnaryTwoResultsInt(
                |x| {
                    let (mantissa, exponent) = r::frexp(f64::from(x));
                    (mantissa as f32, exponent)
                },
                r::frexp,
            )),
            "lgamma_r" => Some(Native::UnaryTwoResultsInt(
                |x| {
                    let (value, sign) = r::lgamma_r(f64::from(x));
                    (value as f32, sign)
                },
                r::lgamma_r,
            )),
            _ => None,
        },
        CallForm::BinaryTwoResultsInt => (function == "remquo").then_some(
            Native::BinaryTwoResultsInt(
                |x, y| {
                    let (rem, quo) = r::remquo(f64::from(x), f64::from(y));
                    (rem as f32, quo)
                },
                r::remquo,
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_form_resolves_its_builtins() {
        assert!(matches!(lookup("", CallForm::Unary), Some(Native::Unary(..))));
        assert!(matches!(lookup("+", CallForm::BinaryOperator), Some(Native::Binary(..))));
        assert!(matches!(lookup("remquo", CallForm::BinaryTwoResultsInt), Some(_)));
        assert!(lookup("+", CallForm::Binary).is_none());
        assert!(lookup("no_such_builtin", CallForm::Unary).is_none());
    }

    #[test]
    fn single_precision_rounds_natively() {
        let Some(Native::Binary(add32, add64)) = lookup("+", CallForm::BinaryOperator) else {
            panic!("add must resolve");
        };
        let x = 1.0f32;
        let y = f32::EPSILON / 4.0;
        assert_eq!(add32(x, y), 1.0);
        assert!(add64(f64::from(x), f64::from(y)) > 1.0);
    }

    #[test]
    fn fract_clamps_below_one() {
        let Some(Native::UnaryTwoResults(fract32, _)) = lookup("fract", CallForm::UnaryTwoResults)
        else {
            panic!("fract must resolve");
        };
        let (part, whole) = fract32(-1.0e-30);
        assert_eq!(part, r::FRACT_LIMIT);
        assert_eq!(whole, -1.0);
    }
}
