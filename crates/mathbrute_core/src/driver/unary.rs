//! One-operand shapes walking the full 32-bit domain: `float f(float)`,
//! `int f(float)` and `float f(uint)`.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::{evaluate_floats, round_to, Expected};
use crate::ulp::ulp_error;
use crate::verify::{bits_of, value_of, Failure, Verdict};
use crate::Precision;

pub(crate) static UNARY: VTable = VTable {
    name: "unary",
    float: float_driver::<Unary>,
    double: double_driver::<Unary>,
};

pub(crate) static I_UNARY: VTable = VTable {
    name: "i_unary",
    float: float_driver::<IntUnary>,
    double: double_driver::<IntUnary>,
};

pub(crate) static UNARY_U: VTable = VTable {
    name: "unary_u",
    float: float_driver::<UnaryU>,
    double: double_driver::<UnaryU>,
};

#[derive(Default)]
pub(crate) struct Unary;

impl ShapeLogic for Unary {
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
        cx.float(&[x], outputs[0].bits(j), expected.primary, expected.overflow, &|v| {
            evaluate_floats(&cx.reference, v).primary
        })
    }
}

/// `ilogb`-style builtins returning an integer.
#[derive(Default)]
pub(crate) struct IntUnary;

impl ShapeLogic for IntUnary {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Strided
    }

    fn expected(&self, reference: &Reference, _precision: Precision, inputs: &[Column], j: usize) -> Expected {
        evaluate_floats(reference, &[inputs[0].float(j)])
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
        let test = outputs[0].int(j);
        match cx.verifier.check_ilogb(inputs[0].float(j), test, expected.integer) {
            Verdict::Pass(err) => Ok(err),
            Verdict::Fail(_) => Err(Failure::int("integer result", expected.integer, test)),
        }
    }
}

/// `nan`-style builtins taking raw unsigned bits.
#[derive(Default)]
pub(crate) struct UnaryU;

impl ShapeLogic for UnaryU {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Strided
    }

    fn expected(&self, reference: &Reference, _precision: Precision, inputs: &[Column], j: usize) -> Expected {
        match *reference {
            Reference::UnaryUInt(f) => Expected::float(f(inputs[0].bits(j))),
            _ => Expected::default(),
        }
    }

    // The result depends on no float operand, so none of the operand-driven
    // relaxations apply: bit match, any NaN for a NaN, or within the ULP bound.
    fn check(
        &self,
        cx: &CheckCx<'_>,
        _inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        _width: usize,
    ) -> Result<f64, Failure> {
        let precision = cx.precision;
        let test_bits = outputs[0].bits(j);
        let test = value_of(precision, test_bits);
        let reference = expected.primary;
        if test_bits == bits_of(precision, round_to(precision, reference))
            || (test.is_nan() && reference.is_nan())
        {
            return Ok(0.0);
        }
        let err = ulp_error(precision, test, reference);
        if err.abs() <= cx.verifier.ulps {
            Ok(err)
        } else {
            Err(Failure::float(precision, err, reference, test_bits))
        }
    }
}
