//! `float f(float, float, float)`: `fma`, `select` and friends.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::{evaluate_floats, Expected};
use crate::verify::Failure;
use crate::Precision;

pub(crate) static TERNARY: VTable = VTable {
    name: "ternary",
    float: float_driver::<Ternary>,
    double: double_driver::<Ternary>,
};

#[derive(Default)]
pub(crate) struct Ternary;

fn operands(inputs: &[Column], j: usize) -> [f64; 3] {
    [inputs[0].float(j), inputs[1].float(j), inputs[2].float(j)]
}

impl ShapeLogic for Ternary {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Special
    }

    fn expected(&self, reference: &Reference, precision: Precision, inputs: &[Column], j: usize) -> Expected {
        let operands = operands(inputs, j);
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
        cx.float(
            &operands(inputs, j),
            outputs[0].bits(j),
            expected.primary,
            expected.overflow,
            &|v| evaluate_floats(&cx.reference, v).primary,
        )
    }
}
