//! Comparison of device results against the host reference.
//!
//! Every check starts with a bit-exact comparison. Only on mismatch does it compute
//! an error and walk the relaxation ladder: NaN/Inf/overflow exemption, relaxed-mode
//! rules, range limits, then flush-to-zero retries with zero-substituted operands.

use std::fmt;

use crate::config::RunConfig;
use crate::device::DeviceInfo;
use crate::function::{FunctionDescriptor, RangeLimit, RelaxedRule};
use crate::reference::round_to;
use crate::subnormal::{
    is_float_result_subnormal_abs, is_result_subnormal, is_subnormal, ZeroSubstitutions,
};
use crate::ulp::{abs_error, ulp_error};
use crate::{size_name, Precision};

/// `2^-21`, the relaxed absolute bound of the log family on `[0.5, 2]`.
const LOG_RELAXED_ABS_ERROR: f64 = 4.76837158203125e-7;
/// Inputs past `2^16` get the range-limited treatment.
const RANGE_LIMIT_THRESHOLD: f64 = 65536.0;

/// Outcome of one comparison, carrying the error to fold into the worst case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Pass(f64),
    Fail(f64),
}

impl Verdict {
    pub fn passed(self) -> bool {
        matches!(self, Verdict::Pass(_))
    }

    pub fn error(self) -> f64 {
        match self {
            Verdict::Pass(err) | Verdict::Fail(err) => err,
        }
    }
}

/// Per-run comparison settings.
#[derive(Debug, Clone)]
pub struct Verifier {
    pub precision: Precision,
    pub ulps: f64,
    /// Bound outside fast-relaxed-math, for relaxed rules that fall back to it.
    pub standard_ulps: f64,
    pub ftz: bool,
    pub relaxed: bool,
    pub accept_nan_inf: bool,
    pub rule: RelaxedRule,
    pub range_limit: RangeLimit,
    pub exact: bool,
    pub embedded: bool,
    pub fast_relaxed_derived: bool,
}

impl Verifier {
    pub fn new(
        desc: &FunctionDescriptor,
        config: &RunConfig,
        info: &DeviceInfo,
        precision: Precision,
        relaxed: bool,
    ) -> Self {
        let ftz = match precision {
            Precision::Single => desc.ftz || config.force_ftz || !info.denormals,
            Precision::Double => false,
        };
        let embedded = config.embedded || info.embedded_profile;
        Self {
            precision,
            ulps: desc.tolerance(precision, embedded, relaxed),
            standard_ulps: desc.tolerance(precision, embedded, false),
            ftz,
            relaxed,
            accept_nan_inf: config.accept_nan_inf || !info.inf_nan_support,
            rule: desc.relaxed_rule,
            range_limit: desc.range_limit,
            exact: desc.exact,
            embedded,
            fast_relaxed_derived: config.fast_relaxed_derived,
        }
    }

    /// NaN/Inf inputs or results and overflow need no further checking.
    pub fn exempts_specials(&self) -> bool {
        self.accept_nan_inf || self.relaxed
    }

    fn result_subnormal(&self, reference: f64) -> bool {
        if self.relaxed {
            is_float_result_subnormal_abs(reference, self.ulps)
        } else {
            is_result_subnormal(self.precision, reference, self.ulps)
        }
    }

    /// Smaller-magnitude error of `test` against the wide and the rounded reference.
    fn error_against(&self, test: f64, reference: f64) -> f64 {
        let wide = ulp_error(self.precision, test, reference);
        let narrow = ulp_error(self.precision, test, round_to(self.precision, reference));
        if narrow.abs() < wide.abs() {
            narrow
        } else {
            wide
        }
    }

    /// Error measure and bound for a result, after relaxed-mode rules.
    fn judge(&self, operands: &[f64], test: f64, reference: f64) -> (f64, bool) {
        let err = self.error_against(test, reference);
        let within = |err: f64, bound: f64| err.abs() <= bound;
        if !self.relaxed {
            return (err, within(err, self.ulps));
        }
        let x = operands.first().copied().unwrap_or(0.0);
        match self.rule {
            RelaxedRule::Ulps => (err, within(err, self.ulps)),
            RelaxedRule::AbsError | RelaxedRule::AbsErrorInUnitRange => {
                let abs = abs_error(test, reference);
                (abs, within(abs, self.ulps))
            }
            RelaxedRule::ExpScaled if !self.embedded => {
                let bound = 3.0 + (2.0 * x).abs().floor();
                (err, within(err, bound))
            }
            RelaxedRule::ExpScaled => (err, within(err, self.ulps)),
            RelaxedRule::LogRange if (0.5..=2.0).contains(&x) => {
                let abs = abs_error(test, reference);
                (abs, within(abs, LOG_RELAXED_ABS_ERROR))
            }
            RelaxedRule::LogRange => (err, within(err, self.standard_ulps)),
            RelaxedRule::DerivedUnchecked => {
                (err, self.fast_relaxed_derived || within(err, self.ulps))
            }
        }
    }

    /// Checks one floating result.
    ///
    /// `operands` are the float inputs the result depends on, `reference` the wide
    /// result for them, and `retry` recomputes that result for substituted operands.
    pub fn check_float(
        &self,
        operands: &[f64],
        test_bits: u64,
        reference: f64,
        overflow: bool,
        retry: &dyn Fn(&[f64]) -> f64,
    ) -> Verdict {
        let rounded = round_to(self.precision, reference);
        if test_bits == bits_of(self.precision, rounded) {
            return Verdict::Pass(0.0);
        }
        let test = value_of(self.precision, test_bits);

        if self.exact {
            if test.is_nan() && reference.is_nan() {
                return Verdict::Pass(0.0);
            }
            let err = ulp_error(self.precision, test, reference);
            return Verdict::Fail(if err.is_nan() { f64::INFINITY } else { err });
        }

        if self.exempts_specials()
            && (overflow
                || !reference.is_finite()
                || operands.iter().any(|x| !x.is_finite()))
        {
            return Verdict::Pass(0.0);
        }

        let (mut err, within) = self.judge(operands, test, reference);
        if err == 0.0 || within {
            return Verdict::Pass(err);
        }

        if let Some(x) = operands.first().copied() {
            let limited = x.is_finite() && x.abs() > RANGE_LIMIT_THRESHOLD;
            let accepted = match self.range_limit {
                RangeLimit::None => false,
                RangeLimit::UnitBounded => {
                    limited && test.abs() <= 1.0 + self.ulps * f64::from(f32::EPSILON) / 2.0
                }
                RangeLimit::Unbounded => limited && !test.is_nan(),
            };
            if accepted {
                return Verdict::Pass(0.0);
            }
        }

        if !(self.ftz || self.relaxed) {
            return Verdict::Fail(err);
        }
        // A flushing device may return zero for any result that would be subnormal.
        if test == 0.0 && self.result_subnormal(reference) {
            return Verdict::Pass(0.0);
        }
        let mut pass = false;
        for variant in ZeroSubstitutions::new(self.precision, operands) {
            let alt = retry(&variant);
            if self.exempts_specials() && !alt.is_finite() {
                return Verdict::Pass(0.0);
            }
            if test == 0.0 && self.result_subnormal(alt) {
                return Verdict::Pass(0.0);
            }
            let (alt_err, alt_within) = self.judge(&variant, test, alt);
            pass |= alt_within;
            if alt_err.abs() < err.abs() {
                err = alt_err;
            }
        }
        if pass {
            Verdict::Pass(err)
        } else {
            Verdict::Fail(err)
        }
    }

    /// Checks a relational result: scalar true is `1`, vector true is `-1`.
    pub fn check_predicate(
        &self,
        operands: &[f64],
        test: i64,
        expected: i64,
        width: usize,
        retry: &dyn Fn(&[f64]) -> i64,
    ) -> Verdict {
        let lane = |truth: i64| if width > 1 { -truth } else { truth };
        if test == lane(expected) {
            return Verdict::Pass(0.0);
        }
        if self.ftz
            && ZeroSubstitutions::new(self.precision, operands).any(|v| test == lane(retry(&v)))
        {
            return Verdict::Pass(0.0);
        }
        Verdict::Fail(0.0)
    }

    /// Checks `ilogb`, accepting either conventional value for zero and NaN.
    pub fn check_ilogb(&self, x: f64, test: i64, expected: i64) -> Verdict {
        let min = i64::from(i32::MIN);
        let max = i64::from(i32::MAX);
        let ok = test == expected
            || (x == 0.0 && (test == min || test == -max))
            || (x.is_nan() && (test == min || test == max))
            || (self.ftz
                && is_subnormal(self.precision, x)
                && (test == min || test == -max));
        if ok {
            Verdict::Pass(0.0)
        } else {
            Verdict::Fail(0.0)
        }
    }

    /// Exact check of an integer side channel; skipped when the float bound is infinite.
    pub fn check_side_int(&self, test: i64, expected: i64) -> Verdict {
        if test == expected || self.ulps.is_infinite() {
            Verdict::Pass(0.0)
        } else {
            Verdict::Fail(0.0)
        }
    }
}

/// Low seven bits of a quotient with its sign, the part `remquo` must get right.
pub fn quotient_bits(quo: i64) -> i64 {
    let low = (quo.unsigned_abs() & 0x7f) as i64;
    if quo < 0 {
        -low
    } else {
        low
    }
}

/// Raw bits of `value` stored at `precision`.
pub fn bits_of(precision: Precision, value: f64) -> u64 {
    match precision {
        Precision::Single => u64::from((value as f32).to_bits()),
        Precision::Double => value.to_bits(),
    }
}

/// Value of raw `bits` stored at `precision`.
pub fn value_of(precision: Precision, bits: u64) -> f64 {
    match precision {
        Precision::Single => f64::from(f32::from_bits(bits as u32)),
        Precision::Double => f64::from_bits(bits),
    }
}

/// Formats a reference value the way it is reported against device output.
pub fn describe_value(precision: Precision, value: f64) -> String {
    match precision {
        Precision::Single => {
            let narrow = value as f32;
            format!("{} (0x{:08x})", crate::hexfloat::hex_f32(narrow), narrow.to_bits())
        }
        Precision::Double => format!(
            "{} (0x{:016x})",
            crate::hexfloat::hex_f64(value),
            value.to_bits()
        ),
    }
}

/// What a shape reports about a failed element.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: f64,
    pub detail: String,
    pub expected: String,
    pub actual: String,
}

impl Failure {
    pub fn float(precision: Precision, error: f64, expected: f64, actual_bits: u64) -> Self {
        Self {
            error,
            detail: format!("{error} ulp error"),
            expected: describe_value(precision, expected),
            actual: describe_value(precision, value_of(precision, actual_bits)),
        }
    }

    pub fn int(what: &str, expected: i64, actual: i64) -> Self {
        Self {
            error: 0.0,
            detail: format!("{what} mismatch"),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// A verification failure that survived every relaxation.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub function: String,
    pub precision: Precision,
    pub width: usize,
    pub inputs: Vec<String>,
    pub failure: Failure,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR: {}{} ({}): {} at {{{}}}: *{} vs. {}",
            self.function,
            size_name(self.width),
            self.precision.label(),
            self.failure.detail,
            self.inputs.join(", "),
            self.failure.expected,
            self.failure.actual
        )
    }
}

/// Largest error seen by one worker and the inputs that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorstCase {
    pub error: f64,
    pub inputs: Vec<String>,
}

impl WorstCase {
    /// Keeps `err` when its magnitude strictly exceeds the current worst.
    pub fn record(&mut self, err: f64, inputs: impl FnOnce() -> Vec<String>) {
        if err.abs() > self.error {
            self.error = err.abs();
            self.inputs = inputs();
        }
    }

    pub fn merge(&mut self, other: &WorstCase) {
        if other.error > self.error {
            *self = other.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Reference, Shape};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn identity(x: f64) -> f64 {
        x
    }

    fn verifier(ulps: f64) -> Verifier {
        Verifier {
            precision: Precision::Single,
            ulps,
            standard_ulps: ulps,
            ftz: false,
            relaxed: false,
            accept_nan_inf: true,
            rule: RelaxedRule::Ulps,
            range_limit: RangeLimit::None,
            exact: false,
            embedded: false,
            fast_relaxed_derived: true,
        }
    }

    fn f32_bits(x: f32) -> u64 {
        u64::from(x.to_bits())
    }

    const TINY: f32 = 1.0e-45;

    #[test]
    fn bit_exact_results_pass_without_relaxation() {
        let mut rng = StdRng::seed_from_u64(0xACE);
        let strict = Verifier {
            accept_nan_inf: false,
            ..verifier(0.0)
        };
        for _ in 0..2000 {
            let x = f32::from_bits(rng.gen());
            let verdict =
                strict.check_float(&[f64::from(x)], f32_bits(x), f64::from(x), false, &|v| v[0]);
            assert_eq!(verdict, Verdict::Pass(0.0), "x = {x:e}");
        }
    }

    #[test]
    fn ulp_bound_is_inclusive() {
        let v = verifier(1.0);
        let one_up = f32::from_bits(1.0f32.to_bits() + 1);
        let two_up = f32::from_bits(1.0f32.to_bits() + 2);
        assert_eq!(
            v.check_float(&[1.0], f32_bits(one_up), 1.0, false, &|x| x[0]),
            Verdict::Pass(1.0)
        );
        assert_eq!(
            v.check_float(&[1.0], f32_bits(two_up), 1.0, false, &|x| x[0]),
            Verdict::Fail(2.0)
        );
    }

    #[test]
    fn rounded_reference_error_is_preferred_when_smaller() {
        let v = verifier(0.0);
        // Halfway between 1 and the next float: either neighbour is acceptable at 0 ulps.
        let reference = 1.0 + f64::from(f32::EPSILON) / 2.0;
        let rounded = reference as f32;
        let verdict = v.check_float(&[reference], f32_bits(rounded), reference, false, &|x| x[0]);
        assert!(verdict.passed());
    }

    #[test]
    fn nan_inputs_are_exempt() {
        let v = verifier(0.0);
        let nan = f64::NAN;
        let verdict = v.check_float(&[nan], f32_bits(3.0), 1.0, false, &|_| 1.0);
        assert!(verdict.passed());
        let strict = Verifier {
            accept_nan_inf: false,
            ..verifier(0.0)
        };
        assert!(!strict
            .check_float(&[nan], f32_bits(3.0), 1.0, false, &|_| 1.0)
            .passed());
    }

    #[test]
    fn overflow_is_exempt() {
        let v = verifier(0.0);
        let big = f64::from(f32::MAX) * 2.0;
        assert!(v
            .check_float(&[1.0], f32_bits(f32::MAX), big, true, &|_| big)
            .passed());
    }

    #[test]
    fn flushed_subnormal_result_may_be_zero() {
        let ftz = Verifier {
            ftz: true,
            ..verifier(0.0)
        };
        let tiny = f64::from(TINY);
        let verdict = ftz.check_float(&[tiny, 0.0], f32_bits(0.0), tiny, false, &|v| v[0] + v[1]);
        assert_eq!(verdict, Verdict::Pass(0.0));

        let no_ftz = verifier(0.0);
        assert!(!no_ftz
            .check_float(&[tiny, 0.0], f32_bits(0.0), tiny, false, &|v| v[0] + v[1])
            .passed());
    }

    #[test]
    fn ftz_ladder_accepts_zero_substituted_operands() {
        let ftz = Verifier {
            ftz: true,
            ..verifier(0.0)
        };
        let tiny = f64::from(TINY);
        // Scaled so the subnormal operand moves the result by about one ulp.
        let retry = |v: &[f64]| v[0] * 1.0e38 + v[1];
        let reference = retry(&[tiny, 1.0]);
        assert_ne!(reference as f32, 1.0);
        let verdict = ftz.check_float(&[tiny, 1.0], f32_bits(1.0), reference, false, &retry);
        assert!(verdict.passed(), "{verdict:?}");

        let no_ftz = verifier(0.0);
        let verdict = no_ftz.check_float(&[tiny, 1.0], f32_bits(1.0), reference, false, &retry);
        assert!(!verdict.passed(), "{verdict:?}");
    }

    #[test]
    fn exact_functions_reject_any_difference() {
        let exact = Verifier {
            exact: true,
            ftz: true,
            relaxed: true,
            ..verifier(f64::INFINITY)
        };
        let one_up = f32::from_bits(1.0f32.to_bits() + 1);
        assert!(!exact
            .check_float(&[1.0], f32_bits(one_up), 1.0, false, &|x| x[0])
            .passed());
        assert!(exact
            .check_float(&[f64::NAN], f32_bits(f32::NAN), f64::NAN, false, &|x| x[0])
            .passed());
    }

    #[test]
    fn relaxed_abs_error_rule() {
        let relaxed = Verifier {
            relaxed: true,
            rule: RelaxedRule::AbsError,
            ..verifier(0.00048828125)
        };
        let reference = 1.0e-3;
        let test = (reference + 0.0004) as f32;
        assert!(relaxed
            .check_float(&[0.5], f32_bits(test), reference, false, &|_| reference)
            .passed());
        let far = (reference + 0.001) as f32;
        assert!(!relaxed
            .check_float(&[0.5], f32_bits(far), reference, false, &|_| reference)
            .passed());
    }

    #[test]
    fn relaxed_exp_bound_grows_with_input() {
        let relaxed = Verifier {
            relaxed: true,
            rule: RelaxedRule::ExpScaled,
            ..verifier(3.0)
        };
        let reference = 1000.0f64;
        let test = f32::from_bits(1000.0f32.to_bits() + 20);
        assert!(relaxed
            .check_float(&[10.0], f32_bits(test), reference, false, &|_| reference)
            .passed());
        assert!(!relaxed
            .check_float(&[1.0], f32_bits(test), reference, false, &|_| reference)
            .passed());
    }

    #[test]
    fn relaxed_log_falls_back_to_standard_ulps_off_range() {
        let relaxed = Verifier {
            relaxed: true,
            rule: RelaxedRule::LogRange,
            standard_ulps: 3.0,
            ..verifier(4.76837158203125e-7)
        };
        let reference = 4.0f64.ln();
        let two_off = f32::from_bits((reference as f32).to_bits() + 2);
        assert!(relaxed
            .check_float(&[4.0], f32_bits(two_off), reference, false, &|_| reference)
            .passed());
        let near_one = f32::from_bits(1.0e-7f32.to_bits() + 2);
        assert!(relaxed
            .check_float(&[1.0], f32_bits(near_one), 1.0e-7, false, &|_| 1.0e-7)
            .passed());
    }

    #[test]
    fn range_limited_results_only_need_magnitude() {
        let half = Verifier {
            range_limit: RangeLimit::UnitBounded,
            ..verifier(8192.0)
        };
        let x = 1.0e6;
        assert!(half
            .check_float(&[x], f32_bits(-0.75), 0.5, false, &|_| 0.5)
            .passed());
        assert!(!half
            .check_float(&[x], f32_bits(1.5), 0.5, false, &|_| 0.5)
            .passed());
    }

    #[test]
    fn predicate_lanes_use_all_bits_for_true() {
        let v = verifier(0.0);
        assert!(v.check_predicate(&[1.0], 1, 1, 1, &|_| 1).passed());
        assert!(!v.check_predicate(&[1.0], 1, 1, 4, &|_| 1).passed());
        assert!(v.check_predicate(&[1.0], -1, 1, 4, &|_| 1).passed());

        let tiny = f64::from(TINY);
        let is_normal_zero = |v: &[f64]| i64::from(v[0] == 0.0);
        let ftz = Verifier {
            ftz: true,
            ..verifier(0.0)
        };
        assert!(ftz.check_predicate(&[tiny], 1, 0, 1, &is_normal_zero).passed());
        assert!(!v.check_predicate(&[tiny], 1, 0, 1, &is_normal_zero).passed());
    }

    #[test]
    fn ilogb_accepts_both_conventions() {
        let v = verifier(0.0);
        let min = i64::from(i32::MIN);
        let max = i64::from(i32::MAX);
        assert!(v.check_ilogb(0.0, -max, min).passed());
        assert!(v.check_ilogb(f64::NAN, min, max).passed());
        assert!(!v.check_ilogb(1.0, 1, 0).passed());
    }

    #[test]
    fn quotient_keeps_sign_and_low_bits() {
        assert_eq!(quotient_bits(0x1_05), 5);
        assert_eq!(quotient_bits(-0x1_05), -5);
        assert_eq!(quotient_bits(i64::from(i32::MIN)), 0);
    }

    #[test]
    fn worst_case_is_monotonic() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut worst = WorstCase::default();
        let mut max = 0.0f64;
        let mut at = 0usize;
        for idx in 0..500 {
            let err: f64 = rng.gen_range(-4.0..4.0);
            if err.abs() > max {
                max = err.abs();
                at = idx;
            }
            worst.record(err, || vec![idx.to_string()]);
        }
        assert_eq!(worst.error, max);
        assert_eq!(worst.inputs, vec![at.to_string()]);
    }

    #[test]
    fn mismatch_names_function_width_and_inputs() {
        let mismatch = Mismatch {
            function: "sin".into(),
            precision: Precision::Single,
            width: 4,
            inputs: vec!["0x1p+0".into()],
            failure: Failure::float(Precision::Single, 3.5, 0.5, f32_bits(0.75)),
        };
        let text = mismatch.to_string();
        assert!(text.starts_with("ERROR: sin4 (float): 3.5 ulp error at {0x1p+0}"), "{text}");
        assert!(text.contains("*0x1p-1 (0x3f000000) vs. 0x1.8p-1 (0x3f400000)"), "{text}");
    }

    #[test]
    fn ftz_follows_descriptor_config_and_device() {
        let desc =
            FunctionDescriptor::new("assignment", "", Reference::Unary(identity), Shape::Unary);
        let info = DeviceInfo {
            name: "test".into(),
            fp64: true,
            denormals: true,
            correctly_rounded_divide_sqrt: false,
            inf_nan_support: true,
            embedded_profile: false,
            max_threads: 1,
        };
        let config = RunConfig::default();
        assert!(!Verifier::new(&desc, &config, &info, Precision::Single, false).ftz);
        let flushing = DeviceInfo {
            denormals: false,
            ..info.clone()
        };
        assert!(Verifier::new(&desc, &config, &flushing, Precision::Single, false).ftz);
        assert!(!Verifier::new(&desc, &config, &flushing, Precision::Double, false).ftz);
        assert!(Verifier::new(&desc.ftz(), &config, &info, Precision::Single, false).ftz);
    }

    #[test]
    fn embedded_devices_get_the_embedded_bounds() {
        let desc = FunctionDescriptor::new("sin", "sin", Reference::Unary(f64::sin), Shape::Unary)
            .ulps(2.0, 2.0, 8.0)
            .relaxed(None, 4.0, 16.0, RelaxedRule::Ulps);
        let info = DeviceInfo {
            name: "embedded".into(),
            fp64: false,
            denormals: true,
            correctly_rounded_divide_sqrt: false,
            inf_nan_support: true,
            embedded_profile: true,
            max_threads: 1,
        };
        let config = RunConfig::default();
        let strict = Verifier::new(&desc, &config, &info, Precision::Single, false);
        assert!(strict.embedded);
        assert_eq!(strict.ulps, 8.0);
        assert_eq!(strict.standard_ulps, 8.0);
        let relaxed = Verifier::new(&desc, &config, &info, Precision::Single, true);
        assert_eq!(relaxed.ulps, 16.0);
        assert_eq!(relaxed.standard_ulps, 8.0);

        let full = DeviceInfo {
            embedded_profile: false,
            ..info
        };
        assert_eq!(Verifier::new(&desc, &config, &full, Precision::Single, false).ulps, 2.0);
    }
}
