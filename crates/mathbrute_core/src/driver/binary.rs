//! Two-operand shapes: `float f(float, float)`, the arithmetic operators, and
//! `float f(float, int)`.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::{evaluate_floats, Expected};
use crate::verify::Failure;
use crate::Precision;

pub(crate) static BINARY: VTable = VTable {
    name: "binary",
    float: float_driver::<Binary>,
    double: double_driver::<Binary>,
};

pub(crate) static BINARY_OPERATOR: VTable = VTable {
    name: "binaryOperator",
    float: float_driver::<Binary>,
    double: double_driver::<Binary>,
};

pub(crate) static BINARY_I: VTable = VTable {
    name: "binary_i",
    float: float_driver::<BinaryI>,
    double: double_driver::<BinaryI>,
};

/// Function calls and operators differ only in the kernel text.
#[derive(Default)]
pub(crate) struct Binary;

impl ShapeLogic for Binary {
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
        cx.float(
            &operands,
            outputs[0].bits(j),
            expected.primary,
            expected.overflow,
            &|v| evaluate_floats(&cx.reference, v).primary,
        )
    }
}

#[derive(Default)]
pub(crate) struct BinaryI;

impl BinaryI {
    fn eval(reference: &Reference, x: f64, n: i32) -> f64 {
        match *reference {
            Reference::BinaryInt(f) => f(x, n),
            _ => f64::NAN,
        }
    }
}

impl ShapeLogic for BinaryI {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Special
    }

    fn expected(&self, reference: &Reference, precision: Precision, inputs: &[Column], j: usize) -> Expected {
        let x = inputs[0].float(j);
        let n = inputs[1].int(j) as i32;
        Expected::float(Self::eval(reference, x, n)).with_overflow(precision, &[x])
    }

    // Only the float operand can be flushed; the integer stays fixed in retries.
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
        let n = inputs[1].int(j) as i32;
        cx.float(
            &[x],
            outputs[0].bits(j),
            expected.primary,
            expected.overflow,
            &|v| Self::eval(&cx.reference, v[0], n),
        )
    }
}
