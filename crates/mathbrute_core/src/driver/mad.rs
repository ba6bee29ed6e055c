//! `mad` has implementation-defined accuracy: kernels run and are timed, results
//! are not checked.

use super::{double_driver, float_driver, CheckCx, InputPlan, ShapeLogic, VTable};
use crate::column::Column;
use crate::function::Reference;
use crate::reference::Expected;
use crate::verify::Failure;
use crate::Precision;

pub(crate) static MAD: VTable = VTable {
    name: "mad",
    float: float_driver::<Mad>,
    double: double_driver::<Mad>,
};

#[derive(Default)]
pub(crate) struct Mad;

impl ShapeLogic for Mad {
    fn input_plan(&self) -> InputPlan {
        InputPlan::Special
    }

    fn expected(&self, _reference: &Reference, _precision: Precision, _inputs: &[Column], _j: usize) -> Expected {
        Expected::default()
    }

    fn check(
        &self,
        _cx: &CheckCx<'_>,
        _inputs: &[Column],
        _j: usize,
        _expected: &Expected,
        _outputs: &[Column],
        _width: usize,
    ) -> Result<f64, Failure> {
        Ok(0.0)
    }

    fn verifies(&self) -> bool {
        false
    }
}
