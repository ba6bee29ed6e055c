//! Builtins returning a second result through a pointer: `sincos`, `modf`,
//! `fract`, `frexp`, `lgamma_r` and `remquo`.
//!
//! Output column 0 holds the return value, column 1 the pointer result. Both are
//! checked; the recorded error is the larger of the two.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::{evaluate_floats, Expected};
use crate::subnormal::{is_subnormal, ZeroSubstitutions};
use crate::verify::{quotient_bits, Failure};
use crate::Precision;

pub(crate) static UNARY_TWO_RESULTS: VTable = VTable {
    name: "unary_two_results",
    float: float_driver::<UnaryTwoResults>,
    double: double_driver::<UnaryTwoResults>,
};

pub(crate) static UNARY_TWO_RESULTS_I: VTable = VTable {
    name: "unary_two_results_i",
    float: float_driver::<UnaryTwoResultsI>,
    double: double_driver::<UnaryTwoResultsI>,
};

pub(crate) static BINARY_TWO_RESULTS_I: VTable = VTable {
    name: "binary_two_results_i",
    float: float_driver::<BinaryTwoResultsI>,
    double: double_driver::<BinaryTwoResultsI>,
};

fn larger(a: f64, b: f64) -> f64 {
    if b.abs() > a.abs() {
        b
    } else {
        a
    }
}

#[derive(Default)]
pub(crate) struct UnaryTwoResults;

impl ShapeLogic for UnaryTwoResults {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Strided
    }

    fn expected(&self, reference: &Reference, precision: Precision, inputs: &[Column], j: usize) -> Expected {
        let x = inputs[0].float(j);
        evaluate_floats(reference, &[x]).with_overflow(precision, &[x])
    }

    fn check(
        &self,
        cx: &CheckCx<'_>,
        inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        _width: usize,
    ) -> Result<f64, Failure> {
        let x = [inputs[0].float(j)];
        let first = cx.float(&x, outputs[0].bits(j), expected.primary, expected.overflow, &|v| {
            evaluate_floats(&cx.reference, v).primary
        })?;
        let second = cx.float(&x, outputs[1].bits(j), expected.secondary, expected.overflow, &|v| {
            evaluate_floats(&cx.reference, v).secondary
        })?;
        Ok(larger(first, second))
    }
}

/// `frexp` and `lgamma_r`: a float result plus an integer one (exponent or sign).
#[derive(Default)]
pub(crate) struct UnaryTwoResultsI;

impl ShapeLogic for UnaryTwoResultsI {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Strided
    }

    fn expected(&self, reference: &Reference, precision: Precision, inputs: &[Column], j: usize) -> Expected {
        let x = inputs[0].float(j);
        evaluate_floats(reference, &[x]).with_overflow(precision, &[x])
    }

    fn check(
        &self,
        cx: &CheckCx<'_>,
        inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        _width: usize,
    ) -> Result<f64, Failure> {
        let x = inputs[0].float(j);
        let err = cx.float(&[x], outputs[0].bits(j), expected.primary, expected.overflow, &|v| {
            evaluate_floats(&cx.reference, v).primary
        })?;

        let test = outputs[1].int(j);
        if test == expected.integer
            || (cx.verifier.exempts_specials() && !x.is_finite())
            || cx.verifier.check_side_int(test, expected.integer).passed()
        {
            return Ok(err);
        }
        // A flushed subnormal behaves like a signed zero.
        if cx.verifier.ftz && is_subnormal(cx.precision, x) {
            let flushed = evaluate_floats(&cx.reference, &[0.0_f64.copysign(x)]).integer;
            if test == flushed {
                return Ok(err);
            }
        }
        Err(Failure::int("integer result", expected.integer, test))
    }
}

/// `remquo`: remainder plus the low bits of the quotient.
#[derive(Default)]
pub(crate) struct BinaryTwoResultsI;

impl ShapeLogic for BinaryTwoResultsI {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Special
    }

    fn expected(&self, reference: &Reference, precision: Precision, inputs: &[Column], j: usize) -> Expected {
        let operands = [inputs[0].float(j), inputs[1].float(j)];
        evaluate_floats(reference, &operands).with_overflow(precision, &operands)
    }

    fn check(
        &self,
        cx: &CheckCx<'_>,
        inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        _width: usize,
    ) -> Result<f64, Failure> {
        let operands = [inputs[0].float(j), inputs[1].float(j)];
        let err = cx.float(
            &operands,
            outputs[0].bits(j),
            expected.primary,
            expected.overflow,
            &|v| evaluate_floats(&cx.reference, v).primary,
        )?;

        let [x, y] = operands;
        // The quotient is unspecified whenever the remainder is NaN.
        if x.is_infinite() || y == 0.0 || x.is_nan() || y.is_nan() {
            return Ok(err);
        }
        let test = outputs[1].int(j);
        let wanted = quotient_bits(expected.integer);
        if quotient_bits(test) == wanted || cx.verifier.ulps.is_infinite() {
            return Ok(err);
        }
        if cx.verifier.ftz
            && ZeroSubstitutions::new(cx.precision, &operands).any(|variant| {
                let alt = evaluate_floats(&cx.reference, &variant);
                alt.primary.is_nan() || quotient_bits(alt.integer) == quotient_bits(test)
            })
        {
            return Ok(err);
        }
        Err(Failure::int("quotient", wanted, quotient_bits(test)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::device::DeviceInfo;
    use crate::function::{FunctionDescriptor, Shape};
    use crate::verify::Verifier;
    use crate::ElementType;

    fn frexp_ref(x: f64) -> (f64, i32) {
        if x == 0.0 || !x.is_finite() {
            return (x, 0);
        }
        let e = crate::ulp::ilogb(x) + 1;
        (crate::ulp::scalbn(x, -e), e)
    }

    fn remquo_ref(x: f64, y: f64) -> (f64, i32) {
        let q = (x / y).round();
        (x - q * y, q as i32)
    }

    fn info() -> DeviceInfo {
        DeviceInfo {
            name: "test".into(),
            fp64: true,
            denormals: true,
            correctly_rounded_divide_sqrt: true,
            inf_nan_support: true,
            embedded_profile: false,
            max_threads: 1,
        }
    }

    fn columns(types: &[ElementType], rows: &[&[f64]]) -> Vec<Column> {
        let mut out: Vec<Column> = types.iter().map(|&ty| Column::zeroed(ty, 1)).collect();
        for (column, row) in out.iter_mut().zip(rows) {
            if column.element_type().is_float() {
                column.set_float(0, row[0]);
            } else {
                column.set_bits(0, row[0] as i64 as u64);
            }
        }
        out
    }

    fn verifier(desc: &FunctionDescriptor) -> Verifier {
        Verifier::new(desc, &RunConfig::default(), &info(), Precision::Single, false)
    }

    #[test]
    fn frexp_checks_both_channels() {
        let desc = FunctionDescriptor::new(
            "frexp",
            "frexp",
            Reference::UnaryTwoResultsInt(frexp_ref),
            Shape::UnaryTwoResultsI,
        )
        .ulps(0.0, 0.0, 0.0);
        let verifier = verifier(&desc);
        let cx = CheckCx {
            verifier: &verifier,
            reference: desc.reference,
            precision: Precision::Single,
        };
        let logic = UnaryTwoResultsI;
        let inputs = columns(&[ElementType::F32], &[&[12.0]]);
        let expected = logic.expected(&desc.reference, Precision::Single, &inputs, 0);
        assert_eq!(expected.integer, 4);

        let good = columns(&[ElementType::F32, ElementType::I32], &[&[0.75], &[4.0]]);
        assert_eq!(logic.check(&cx, &inputs, 0, &expected, &good, 1).unwrap(), 0.0);

        let bad = columns(&[ElementType::F32, ElementType::I32], &[&[0.75], &[3.0]]);
        let failure = logic.check(&cx, &inputs, 0, &expected, &bad, 1).unwrap_err();
        assert_eq!(failure.detail, "integer result mismatch");
    }

    #[test]
    fn remquo_compares_only_low_quotient_bits() {
        let desc = FunctionDescriptor::new(
            "remquo",
            "remquo",
            Reference::BinaryTwoResultsInt(remquo_ref),
            Shape::BinaryTwoResultsI,
        )
        .ulps(0.0, 0.0, 0.0);
        let verifier = verifier(&desc);
        let cx = CheckCx {
            verifier: &verifier,
            reference: desc.reference,
            precision: Precision::Single,
        };
        let logic = BinaryTwoResultsI;
        let inputs = columns(&[ElementType::F32, ElementType::F32], &[&[1000.0], &[3.0]]);
        let expected = logic.expected(&desc.reference, Precision::Single, &inputs, 0);
        assert_eq!(expected.integer, 333);

        // 333 and 333 + 128 agree in the low seven bits.
        let aliased = columns(&[ElementType::F32, ElementType::I32], &[&[1.0], &[461.0]]);
        assert!(logic.check(&cx, &inputs, 0, &expected, &aliased, 1).is_ok());

        let wrong = columns(&[ElementType::F32, ElementType::I32], &[&[1.0], &[-333.0]]);
        assert!(logic.check(&cx, &inputs, 0, &expected, &wrong, 1).is_err());

        let by_zero = columns(&[ElementType::F32, ElementType::F32], &[&[1.0], &[0.0]]);
        let nan_expected = logic.expected(&desc.reference, Precision::Single, &by_zero, 0);
        let nan_out = columns(&[ElementType::F32, ElementType::I32], &[&[f64::NAN], &[77.0]]);
        assert!(logic.check(&cx, &by_zero, 0, &nan_expected, &nan_out, 1).is_ok());
    }

    #[test]
    fn two_float_results_report_the_larger_error() {
        fn split(x: f64) -> (f64, f64) {
            (x.fract(), x.trunc())
        }
        let desc = FunctionDescriptor::new(
            "modf",
            "modf",
            Reference::UnaryTwoResults(split),
            Shape::UnaryTwoResults,
        )
        .ulps(2.0, 2.0, 2.0);
        let verifier = verifier(&desc);
        let cx = CheckCx {
            verifier: &verifier,
            reference: desc.reference,
            precision: Precision::Single,
        };
        let logic = UnaryTwoResults;
        let inputs = columns(&[ElementType::F32], &[&[2.5]]);
        let expected = logic.expected(&desc.reference, Precision::Single, &inputs, 0);
        let off = f64::from(f32::from_bits(2.0f32.to_bits() + 1));
        let outputs = columns(&[ElementType::F32, ElementType::F32], &[&[0.5], &[off]]);
        let err = logic.check(&cx, &inputs, 0, &expected, &outputs, 1).unwrap();
        assert_eq!(err, 1.0);
    }
}
