//! Subnormal classification for flush-to-zero devices, and the operand
//! zero-substitutions a flushing device may have applied to its inputs.

use crate::Precision;

/// `2^-149`, the smallest positive single-precision subnormal.
const FLT_TRUE_MIN: f64 = 1.401298464324817e-45;
/// `2^-1074`, the smallest positive double-precision subnormal.
const DBL_TRUE_MIN: f64 = 4.9406564584124654e-324;

/// Whether a correctly rounded result `x`, allowing `ulps` of slack, could land in
/// the single-precision subnormal range.
pub fn is_float_result_subnormal(x: f64, ulps: f64) -> bool {
    x.abs() - FLT_TRUE_MIN * ulps < f64::from(f32::MIN_POSITIVE)
}

/// Relaxed-mode variant taking an absolute bound instead of ulps.
pub fn is_float_result_subnormal_abs(x: f64, abs_err: f64) -> bool {
    x - abs_err < f64::from(f32::MIN_POSITIVE)
}

pub fn is_double_result_subnormal(x: f64, ulps: f64) -> bool {
    x.abs() - DBL_TRUE_MIN * ulps < f64::MIN_POSITIVE
}

pub fn is_result_subnormal(precision: Precision, x: f64, ulps: f64) -> bool {
    match precision {
        Precision::Single => is_float_result_subnormal(x, ulps),
        Precision::Double => is_double_result_subnormal(x, ulps),
    }
}

/// Whether `x`, stored at `precision`, is a nonzero subnormal.
pub fn is_subnormal(precision: Precision, x: f64) -> bool {
    let min_normal = match precision {
        Precision::Single => f64::from(f32::MIN_POSITIVE),
        Precision::Double => f64::MIN_POSITIVE,
    };
    x != 0.0 && x.abs() < min_normal
}

/// Every way a flushing device may have read `operands`: each subnormal operand is
/// kept, replaced by `+0.0`, or replaced by `-0.0`.
///
/// The untouched operand list is not yielded; with `k` subnormal operands the
/// iterator produces `3^k - 1` variants.
#[derive(Debug, Clone)]
pub struct ZeroSubstitutions {
    operands: Vec<f64>,
    subnormal: Vec<usize>,
    next: usize,
    total: usize,
}

impl ZeroSubstitutions {
    pub fn new(precision: Precision, operands: &[f64]) -> Self {
        let subnormal: Vec<usize> = operands
            .iter()
            .enumerate()
            .filter(|(_, x)| is_subnormal(precision, **x))
            .map(|(idx, _)| idx)
            .collect();
        let total = 3usize.pow(subnormal.len() as u32);
        Self {
            operands: operands.to_vec(),
            subnormal,
            next: 1,
            total,
        }
    }

    pub fn subnormal_count(&self) -> usize {
        self.subnormal.len()
    }
}

impl Iterator for ZeroSubstitutions {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.next >= self.total {
            return None;
        }
        let mut digits = self.next;
        self.next += 1;
        let mut variant = self.operands.clone();
        for &idx in &self.subnormal {
            match digits % 3 {
                1 => variant[idx] = 0.0,
                2 => variant[idx] = -0.0,
                _ => {}
            }
            digits /= 3;
        }
        Some(variant)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.total.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for ZeroSubstitutions {}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: f64 = FLT_TRUE_MIN;

    #[test]
    fn subnormal_classification() {
        assert!(is_subnormal(Precision::Single, TINY));
        assert!(is_subnormal(Precision::Single, -TINY));
        assert!(!is_subnormal(Precision::Single, 0.0));
        assert!(!is_subnormal(Precision::Single, f64::from(f32::MIN_POSITIVE)));
        assert!(!is_subnormal(Precision::Double, TINY));
        assert!(is_subnormal(Precision::Double, DBL_TRUE_MIN));
    }

    #[test]
    fn result_subnormal_honors_slack() {
        let min = f64::from(f32::MIN_POSITIVE);
        assert!(is_float_result_subnormal(TINY, 0.0));
        assert!(!is_float_result_subnormal(min, 0.0));
        assert!(is_float_result_subnormal(min, 1.0));
        assert!(is_float_result_subnormal(-min * 0.5, 0.0));
        assert!(is_float_result_subnormal_abs(min, 1e-40));
        assert!(!is_double_result_subnormal(1.0, 4.0));
    }

    #[test]
    fn substitutions_cover_every_combination_once() {
        let variants: Vec<Vec<f64>> =
            ZeroSubstitutions::new(Precision::Single, &[TINY, 1.0, -TINY]).collect();
        assert_eq!(variants.len(), 8);
        for variant in &variants {
            assert_eq!(variant[1], 1.0);
            assert!(variant[0] == 0.0 || variant[0] == TINY);
            assert!(variant[2] == 0.0 || variant[2] == -TINY);
        }
        let mut keys: Vec<(u64, u64)> = variants
            .iter()
            .map(|v| (v[0].to_bits(), v[2].to_bits()))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 8, "variants are distinct");
        assert!(!keys.contains(&(TINY.to_bits(), (-TINY).to_bits())));
    }

    #[test]
    fn normal_operands_yield_nothing() {
        let mut subs = ZeroSubstitutions::new(Precision::Single, &[1.0, 2.0]);
        assert_eq!(subs.subnormal_count(), 0);
        assert_eq!(subs.len(), 0);
        assert!(subs.next().is_none());
    }
}
