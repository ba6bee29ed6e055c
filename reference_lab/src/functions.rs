//! The function table: every builtin the harness knows, with its reference and bounds.

use mathbrute_core::{FunctionDescriptor, RangeLimit, Reference, RelaxedRule, Shape};

use crate::cpu::reference as r;

/// `2^-11`, the relaxed absolute bound of the trigonometric functions.
const TRIG_RELAXED: f32 = 0.000_488_281_25;
/// `2^-21`, the relaxed absolute bound of the log family near one.
const LOG_RELAXED: f32 = 4.768_371_6e-7;
const HALF_ULPS: f32 = 8192.0;

const fn unary(name: &'static str, f: fn(f64) -> f64, ulps: f32, embedded: f32) -> FunctionDescriptor {
    FunctionDescriptor::new(name, name, Reference::Unary(f), Shape::Unary).ulps(ulps, ulps, embedded)
}

const fn binary(name: &'static str, f: fn(f64, f64) -> f64, ulps: f32) -> FunctionDescriptor {
    FunctionDescriptor::new(name, name, Reference::Binary(f), Shape::Binary).ulps(ulps, ulps, ulps)
}

const fn operator(
    name: &'static str,
    op: &'static str,
    f: fn(f64, f64) -> f64,
) -> FunctionDescriptor {
    FunctionDescriptor::new(name, op, Reference::Binary(f), Shape::BinaryOperator)
}

const fn binary_i(name: &'static str, f: fn(f64, i32) -> f64, ulps: f32) -> FunctionDescriptor {
    FunctionDescriptor::new(name, name, Reference::BinaryInt(f), Shape::BinaryI).ulps(ulps, ulps, ulps)
}

const fn predicate(name: &'static str, code: &'static str, f: fn(f64) -> i32) -> FunctionDescriptor {
    FunctionDescriptor::new(name, code, Reference::Predicate(f), Shape::MacroUnary)
}

const fn relation(name: &'static str, f: fn(f64, f64) -> i32) -> FunctionDescriptor {
    FunctionDescriptor::new(name, name, Reference::BinaryPredicate(f), Shape::MacroBinary)
}

/// Reduced-accuracy `half_*` builtins: single precision only, may flush.
const fn half_unary(name: &'static str, f: fn(f64) -> f64) -> FunctionDescriptor {
    unary(name, f, HALF_ULPS, HALF_ULPS).ftz().single_only()
}

const fn half_binary(name: &'static str, f: fn(f64, f64) -> f64) -> FunctionDescriptor {
    binary(name, f, HALF_ULPS).ftz().single_only()
}

pub static FUNCTIONS: &[FunctionDescriptor] = &[
    unary("acos", f64::acos, 4.0, 4.0).relaxed(None, 4096.0, 4096.0, RelaxedRule::Ulps),
    unary("acosh", f64::acosh, 4.0, 4.0),
    unary("acospi", r::acospi, 5.0, 5.0),
    unary("asin", f64::asin, 4.0, 4.0).relaxed(None, 4096.0, 4096.0, RelaxedRule::Ulps),
    unary("asinh", f64::asinh, 4.0, 4.0),
    unary("asinpi", r::asinpi, 5.0, 5.0),
    unary("atan", f64::atan, 5.0, 5.0).relaxed(None, 4096.0, 4096.0, RelaxedRule::Ulps),
    unary("atanh", f64::atanh, 5.0, 5.0),
    unary("atanpi", r::atanpi, 5.0, 5.0),
    binary("atan2", r::atan2, 6.0),
    binary("atan2pi", r::atan2pi, 6.0),
    unary("cbrt", f64::cbrt, 2.0, 4.0),
    unary("ceil", f64::ceil, 0.0, 0.0),
    binary("copysign", r::copysign, 0.0),
    unary("cos", f64::cos, 4.0, 4.0).relaxed(None, TRIG_RELAXED, TRIG_RELAXED, RelaxedRule::AbsError),
    unary("cosh", f64::cosh, 4.0, 4.0),
    unary("cospi", r::cospi, 4.0, 4.0).relaxed(
        None,
        TRIG_RELAXED,
        TRIG_RELAXED,
        RelaxedRule::AbsErrorInUnitRange,
    ),
    unary("exp", f64::exp, 3.0, 4.0).relaxed(None, 3.0, 4.0, RelaxedRule::ExpScaled),
    unary("exp2", f64::exp2, 3.0, 4.0).relaxed(None, 3.0, 4.0, RelaxedRule::ExpScaled),
    unary("exp10", r::exp10, 3.0, 4.0).relaxed(None, 8192.0, 8192.0, RelaxedRule::DerivedUnchecked),
    unary("expm1", f64::exp_m1, 3.0, 4.0),
    unary("fabs", f64::abs, 0.0, 0.0),
    binary("fdim", r::fdim, 0.0),
    unary("floor", f64::floor, 0.0, 0.0),
    FunctionDescriptor::new("fma", "fma", Reference::Ternary(r::fma), Shape::Ternary)
        .single_reference(Reference::Ternary(r::fma_single)),
    binary("fmax", r::fmax, 0.0),
    binary("fmin", r::fmin, 0.0),
    binary("fmod", r::fmod, 0.0),
    FunctionDescriptor::new("fract", "fract", Reference::UnaryTwoResults(r::fract), Shape::UnaryTwoResults)
        .single_only(),
    FunctionDescriptor::new("frexp", "frexp", Reference::UnaryTwoResultsInt(r::frexp), Shape::UnaryTwoResultsI),
    binary("hypot", r::hypot, 4.0),
    FunctionDescriptor::new("ilogb", "ilogb", Reference::UnaryInt(r::ilogb_ref), Shape::IntUnary),
    relation("isequal", r::isequal),
    predicate("isfinite", "isfinite", r::isfinite),
    relation("isgreater", r::isgreater),
    relation("isgreaterequal", r::isgreaterequal),
    predicate("isinf", "isinf", r::isinf),
    relation("isless", r::isless),
    relation("islessequal", r::islessequal),
    relation("islessgreater", r::islessgreater),
    predicate("isnan", "isnan", r::isnan),
    relation("isnotequal", r::isnotequal),
    relation("isordered", r::isordered),
    relation("isunordered", r::isunordered),
    binary_i("ldexp", r::ldexp, 0.0),
    unary("lgamma", r::lgamma, f32::INFINITY, f32::INFINITY),
    FunctionDescriptor::new(
        "lgamma_r",
        "lgamma_r",
        Reference::UnaryTwoResultsInt(r::lgamma_r),
        Shape::UnaryTwoResultsI,
    )
    .ulps(f32::INFINITY, f32::INFINITY, f32::INFINITY),
    unary("log", f64::ln, 3.0, 4.0).relaxed(None, LOG_RELAXED, LOG_RELAXED, RelaxedRule::LogRange),
    unary("log2", f64::log2, 3.0, 4.0).relaxed(None, LOG_RELAXED, LOG_RELAXED, RelaxedRule::LogRange),
    unary("log10", f64::log10, 3.0, 4.0).relaxed(None, LOG_RELAXED, LOG_RELAXED, RelaxedRule::LogRange),
    unary("log1p", f64::ln_1p, 2.0, 4.0),
    unary("logb", r::logb, 0.0, 0.0),
    FunctionDescriptor::new("mad", "mad", Reference::Ternary(r::mad), Shape::Mad)
        .ulps(f32::INFINITY, f32::INFINITY, f32::INFINITY)
        .relaxed(None, f32::INFINITY, f32::INFINITY, RelaxedRule::Ulps),
    binary("maxmag", r::maxmag, 0.0),
    binary("minmag", r::minmag, 0.0),
    FunctionDescriptor::new("modf", "modf", Reference::UnaryTwoResults(r::modf), Shape::UnaryTwoResults),
    FunctionDescriptor::new("nan", "nan", Reference::UnaryUInt(r::nan), Shape::UnaryU),
    binary("pow", r::pow, 16.0).relaxed(None, 8192.0, 8192.0, RelaxedRule::Ulps),
    binary_i("pown", r::pown, 16.0),
    binary("powr", r::powr, 16.0),
    binary("remainder", r::remainder, 0.0),
    FunctionDescriptor::new(
        "remquo",
        "remquo",
        Reference::BinaryTwoResultsInt(r::remquo),
        Shape::BinaryTwoResultsI,
    ),
    unary("rint", r::rint, 0.0, 0.0),
    binary_i("rootn", r::rootn, 16.0),
    unary("round", f64::round, 0.0, 0.0),
    unary("rsqrt", r::rsqrt, 2.0, 4.0),
    FunctionDescriptor::new("select", "select", Reference::Ternary(r::select), Shape::Ternary).exact(),
    predicate("signbit", "signbit", r::signbit),
    unary("sin", f64::sin, 4.0, 4.0).relaxed(None, TRIG_RELAXED, TRIG_RELAXED, RelaxedRule::AbsError),
    FunctionDescriptor::new("sincos", "sincos", Reference::UnaryTwoResults(r::sincos), Shape::UnaryTwoResults)
        .ulps(4.0, 4.0, 4.0)
        .relaxed(None, TRIG_RELAXED, TRIG_RELAXED, RelaxedRule::AbsError),
    unary("sinh", f64::sinh, 4.0, 4.0),
    unary("sinpi", r::sinpi, 4.0, 4.0).relaxed(
        None,
        TRIG_RELAXED,
        TRIG_RELAXED,
        RelaxedRule::AbsErrorInUnitRange,
    ),
    FunctionDescriptor::new("sqrt", "sqrt", Reference::Unary(f64::sqrt), Shape::Unary).ulps(3.0, 0.0, 4.0),
    FunctionDescriptor::new("sqrt_cr", "sqrt", Reference::Unary(f64::sqrt), Shape::Unary).correctly_rounded(),
    unary("tan", f64::tan, 5.0, 5.0).relaxed(None, 8192.0, 8192.0, RelaxedRule::DerivedUnchecked),
    unary("tanh", f64::tanh, 5.0, 5.0),
    unary("trunc", f64::trunc, 0.0, 0.0),
    half_unary("half_cos", f64::cos).range_limit(RangeLimit::UnitBounded),
    half_binary("half_divide", r::divide),
    half_unary("half_exp", f64::exp),
    half_unary("half_exp2", f64::exp2),
    half_unary("half_exp10", r::exp10),
    half_unary("half_log", f64::ln),
    half_unary("half_log2", f64::log2),
    half_unary("half_log10", f64::log10),
    half_binary("half_powr", r::powr),
    half_unary("half_recip", r::recip),
    half_unary("half_rsqrt", r::rsqrt),
    half_unary("half_sin", f64::sin).range_limit(RangeLimit::UnitBounded),
    half_unary("half_sqrt", f64::sqrt),
    half_unary("half_tan", f64::tan).range_limit(RangeLimit::Unbounded),
    operator("add", "+", r::add),
    operator("subtract", "-", r::subtract),
    operator("divide", "/", r::divide)
        .ulps(2.5, 0.0, 3.0)
        .relaxed(None, 2.5, f32::INFINITY, RelaxedRule::Ulps),
    operator("divide_cr", "/", r::divide).correctly_rounded(),
    operator("multiply", "*", r::multiply),
    FunctionDescriptor::new("assignment", "", Reference::Unary(r::identity), Shape::Unary),
    predicate("not", "!", r::not),
];

/// Looks a builtin up by its table name.
pub fn find_function(name: &str) -> Option<&'static FunctionDescriptor> {
    FUNCTIONS.iter().find(|desc| desc.name == name)
}
