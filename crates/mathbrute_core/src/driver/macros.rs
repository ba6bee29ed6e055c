//! Relational macros (`isnan`, `isequal`, ...). Results are integers compared
//! exactly; a vector lane's true is `-1`.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::{evaluate_floats, Expected};
use crate::verify::{Failure, Verdict};
use crate::Precision;

pub(crate) static MACRO_UNARY: VTable = VTable {
    name: "macro_unary",
    float: float_driver::<MacroUnary>,
    double: double_driver::<MacroUnary>,
};

pub(crate) static MACRO_BINARY: VTable = VTable {
    name: "macro_binary",
    float: float_driver::<MacroBinary>,
    double: double_driver::<MacroBinary>,
};

fn check_relation(
    cx: &CheckCx<'_>,
    operands: &[f64],
    expected: &Expected,
    test: i64,
    width: usize,
) -> Result<f64, Failure> {
    let retry = |v: &[f64]| evaluate_floats(&cx.reference, v).integer;
    match cx
        .verifier
        .check_predicate(operands, test, expected.integer, width, &retry)
    {
        Verdict::Pass(err) => Ok(err),
        Verdict::Fail(_) => {
            let truth = if width > 1 {
                -expected.integer
            } else {
                expected.integer
            };
            Err(Failure::int("relational result", truth, test))
        }
    }
}

#[derive(Default)]
pub(crate) struct MacroUnary;

impl ShapeLogic for MacroUnary {
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
        width: usize,
    ) -> Result<f64, Failure> {
        check_relation(cx, &[inputs[0].float(j)], expected, outputs[0].int(j), width)
    }
}

#[derive(Default)]
pub(crate) struct MacroBinary;

impl ShapeLogic for MacroBinary {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Special
    }

    fn expected(&self, reference: &Reference, _precision: Precision, inputs: &[Column], j: usize) -> Expected {
        evaluate_floats(reference, &[inputs[0].float(j), inputs[1].float(j)])
    }

    fn check(
        &self,
        cx: &CheckCx<'_>,
        inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        width: usize,
    ) -> Result<f64, Failure> {
        let operands = [inputs[0].float(j), inputs[1].float(j)];
        check_relation(cx, &operands, expected, outputs[0].int(j), width)
    }
}
