//! Host reference evaluation for one job.

use rayon::prelude::*;

use crate::function::Reference;
use crate::pool::WorkerPool;
use crate::Precision;

/// Below this many elements a job's reference is computed on the calling worker.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// Reference outputs for one element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Expected {
    /// Main floating result.
    pub primary: f64,
    /// Second floating result of two-result builtins.
    pub secondary: f64,
    /// Integer result or side channel.
    pub integer: i64,
    /// The exact result was finite but does not fit the device precision.
    pub overflow: bool,
}

impl Expected {
    pub fn float(primary: f64) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    pub fn int(integer: i64) -> Self {
        Self {
            integer,
            ..Self::default()
        }
    }

    /// Marks overflow when finite `operands` produce a result beyond `precision`.
    pub fn with_overflow(mut self, precision: Precision, operands: &[f64]) -> Self {
        let finite_inputs = operands.iter().all(|x| x.is_finite());
        self.overflow = finite_inputs
            && [self.primary, self.secondary]
                .iter()
                .any(|&value| round_to(precision, value).is_infinite());
        self
    }
}

/// Rounds a reference value to the device precision.
pub fn round_to(precision: Precision, value: f64) -> f64 {
    match precision {
        Precision::Single => f64::from(value as f32),
        Precision::Double => value,
    }
}

/// Evaluates `reference` over float operands, for the shapes whose inputs are all floats.
pub fn evaluate_floats(reference: &Reference, operands: &[f64]) -> Expected {
    match *reference {
        Reference::Unary(f) => Expected::float(f(operands[0])),
        Reference::Binary(f) => Expected::float(f(operands[0], operands[1])),
        Reference::Ternary(f) => Expected::float(f(operands[0], operands[1], operands[2])),
        Reference::UnaryInt(f) => Expected::int(i64::from(f(operands[0]))),
        Reference::Predicate(f) => Expected::int(i64::from(f(operands[0]))),
        Reference::BinaryPredicate(f) => Expected::int(i64::from(f(operands[0], operands[1]))),
        Reference::UnaryTwoResults(f) => {
            let (primary, secondary) = f(operands[0]);
            Expected {
                primary,
                secondary,
                ..Expected::default()
            }
        }
        Reference::UnaryTwoResultsInt(f) => {
            let (primary, integer) = f(operands[0]);
            Expected {
                primary,
                integer: i64::from(integer),
                ..Expected::default()
            }
        }
        Reference::BinaryTwoResultsInt(f) => {
            let (primary, integer) = f(operands[0], operands[1]);
            Expected {
                primary,
                integer: i64::from(integer),
                ..Expected::default()
            }
        }
        Reference::BinaryInt(f) => Expected::float(f(operands[0], operands[1] as i32)),
        Reference::UnaryUInt(f) => Expected::float(f(operands[0] as u64)),
    }
}

/// Fills `out[i] = eval(i)`, splitting large jobs into one slice per pool thread.
///
/// `eval` must be pure: the result may not depend on where the slices are cut.
pub fn evaluate_indexed<T, F>(pool: &WorkerPool, out: &mut [T], eval: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let threads = pool.threads();
    if out.len() < PARALLEL_THRESHOLD || threads < 2 {
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = eval(idx);
        }
        return;
    }
    let chunk = out.len().div_ceil(threads);
    pool.install(|| {
        out.par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(part, slice)| {
                let start = part * chunk;
                for (offset, slot) in slice.iter_mut().enumerate() {
                    *slot = eval(start + offset);
                }
            });
    });
}
