//! Curated difficult inputs and the grid that walks their Cartesian product.

use rand::RngCore;
use rand_chacha::ChaCha8Rng;

use crate::{ElementType, Precision};

/// Single-precision specials as bit patterns: NaN, infinities, boundaries of the
/// integer-valued range, values around 1, and the subnormal edge, both signs.
pub const FLOAT_SPECIALS: [u32; 98] = [
    0xffc0_0000, 0xff80_0000, 0xff7f_ffff, 0xdf80_0001, 0xdf80_0000, 0xdf7f_ffff,
    0xdf00_0001, 0xdf00_0000, 0xdeff_ffff, 0xcf80_0001, 0xcf80_0000, 0xcf7f_ffff,
    0xcf00_0001, 0xcf00_0000, 0xceff_ffff, 0xc47a_0000, 0xc2c8_0000, 0xc080_0000,
    0xc060_0000, 0xc040_0000, 0xc040_0001, 0xc020_0000, 0xc03f_ffff, 0xc000_0000,
    0xbfc0_0001, 0xbfc0_0000, 0xbfbf_ffff, 0xbf80_0001, 0xbf80_0000, 0xbf7f_ffff,
    0xbf00_0001, 0xbf00_0000, 0xbeff_ffff, 0xbe80_0001, 0xbe80_0000, 0xbe7f_ffff,
    0x8080_0001, 0x8080_0000, 0x807f_ffff, 0x8000_07ff, 0x8000_007f, 0x8000_0007,
    0x8000_0006, 0x8000_0005, 0x8000_0004, 0x8000_0003, 0x8000_0002, 0x8000_0001,
    0x8000_0000, 0x7fc0_0000, 0x7f80_0000, 0x7f7f_ffff, 0x5f80_0001, 0x5f80_0000,
    0x5f7f_ffff, 0x5f00_0001, 0x5f00_0000, 0x5eff_ffff, 0x4f80_0001, 0x4f80_0000,
    0x4f7f_ffff, 0x4f00_0001, 0x4f00_0000, 0x4eff_ffff, 0x447a_0000, 0x42c8_0000,
    0x4080_0000, 0x4060_0000, 0x4040_0000, 0x4040_0001, 0x4020_0000, 0x403f_ffff,
    0x4000_0000, 0x3fc0_0001, 0x3fc0_0000, 0x3fbf_ffff, 0x3f80_0001, 0x3f80_0000,
    0x3f7f_ffff, 0x3f00_0001, 0x3f00_0000, 0x3eff_ffff, 0x3e80_0001, 0x3e80_0000,
    0x3e7f_ffff, 0x0080_0001, 0x0080_0000, 0x007f_ffff, 0x0000_07ff, 0x0000_007f,
    0x0000_0007, 0x0000_0006, 0x0000_0005, 0x0000_0004, 0x0000_0003, 0x0000_0002,
    0x0000_0001, 0x0000_0000,];

pub const DOUBLE_SPECIALS: [u64; 106] = [
    0xfff8_0000_0000_0000, 0xfff0_0000_0000_0000, 0xffef_ffff_ffff_ffff, 0xc3f0_0000_0000_0001,
    0xc3f0_0000_0000_0000, 0xc3ef_ffff_ffff_ffff, 0xc3e0_0000_0000_0001, 0xc3e0_0000_0000_0000,
    0xc3df_ffff_ffff_ffff, 0xc1f0_0000_2000_0000, 0xc1f0_0000_0000_0000, 0xc1ef_ffff_ffff_ffff,
    0xc1e0_0000_0000_0001, 0xc1e0_0000_0000_0000, 0xc1df_ffff_ffff_ffff, 0xc08f_4000_0000_0000,
    0xc059_0000_0000_0000, 0xc010_0000_0000_0000, 0xc00c_0000_0000_0000, 0xc008_0000_0000_0000,
    0xc008_0000_0000_0001, 0xc004_0000_0000_0000, 0xc007_ffff_ffff_ffff, 0xc000_0000_0000_0000,
    0xbff8_0000_0000_0001, 0xbff8_0000_0000_0000, 0xbff7_ffff_ffff_ffff, 0xbff0_0000_0000_0001,
    0xbff0_0000_0000_0000, 0xbfef_ffff_ffff_ffff, 0xbfe0_0000_0000_0001, 0xbfe0_0000_0000_0000,
    0xbfdf_ffff_ffff_ffff, 0xbfd0_0000_0000_0001, 0xbfd0_0000_0000_0000, 0xbfcf_ffff_ffff_ffff,
    0x8010_0000_0000_0001, 0x8010_0000_0000_0000, 0x800f_ffff_ffff_ffff, 0x8000_0000_0000_0fff,
    0x8000_0000_0000_00fe, 0x8000_0000_0000_000e, 0x8000_0000_0000_000c, 0x8000_0000_0000_000a,
    0x8000_0000_0000_0008, 0x8000_0000_0000_0007, 0x8000_0000_0000_0006, 0x8000_0000_0000_0005,
    0x8000_0000_0000_0004, 0x8000_0000_0000_0003, 0x8000_0000_0000_0002, 0x8000_0000_0000_0001,
    0x8000_0000_0000_0000, 0x7ff8_0000_0000_0000, 0x7ff0_0000_0000_0000, 0x7fef_ffff_ffff_ffff,
    0x43f0_0000_0000_0001, 0x43f0_0000_0000_0000, 0x43ef_ffff_ffff_ffff, 0x43e0_0000_0000_0001,
    0x43e0_0000_0000_0000, 0x43df_ffff_ffff_ffff, 0x41f0_0000_2000_0000, 0x41f0_0000_0000_0000,
    0x41ef_ffff_ffff_ffff, 0x41e0_0000_0000_0001, 0x41e0_0000_0000_0000, 0x41df_ffff_ffff_ffff,
    0x408f_4000_0000_0000, 0x4059_0000_0000_0000, 0x4010_0000_0000_0000, 0x400c_0000_0000_0000,
    0x4008_0000_0000_0000, 0x4008_0000_0000_0001, 0x4004_0000_0000_0000, 0x4007_ffff_ffff_ffff,
    0x4000_0000_0000_0000, 0x3ff8_0000_0000_0001, 0x3ff8_0000_0000_0000, 0x3ff7_ffff_ffff_ffff,
    0x3ff0_0000_0000_0001, 0x3ff0_0000_0000_0000, 0x3fef_ffff_ffff_ffff, 0x3fe0_0000_0000_0001,
    0x3fe0_0000_0000_0000, 0x3fdf_ffff_ffff_ffff, 0x3fd0_0000_0000_0001, 0x3fd0_0000_0000_0000,
    0x3fcf_ffff_ffff_ffff, 0x0010_0000_0000_0001, 0x0010_0000_0000_0000, 0x000f_ffff_ffff_ffff,
    0x0000_0000_0000_0fff, 0x0000_0000_0000_00fe, 0x0000_0000_0000_000e, 0x0000_0000_0000_000c,
    0x0000_0000_0000_000a, 0x0000_0000_0000_0008, 0x0000_0000_0000_0007, 0x0000_0000_0000_0006,
    0x0000_0000_0000_0005, 0x0000_0000_0000_0004, 0x0000_0000_0000_0003, 0x0000_0000_0000_0002,
    0x0000_0000_0000_0001, 0x0000_0000_0000_0000,];

/// Second operand table of `float f(float, int)` shapes.
pub const INT_SPECIALS: [i32; 21] = [
    0,
    1,
    2,
    3,
    126,
    127,
    128,
    0x0200_0001,
    0x0400_0001,
    1_465_264_071,
    1_488_522_147,
    -1,
    -2,
    -3,
    -126,
    -127,
    -128,
    -0x0200_0001,
    -0x0400_0001,
    -1_465_264_071,
    -1_488_522_147,
];

/// Special-value table for one operand, as raw element bits.
pub fn table_for(ty: ElementType) -> Vec<u64> {
    match ty {
        ElementType::F32 | ElementType::U32 => {
            FLOAT_SPECIALS.iter().map(|&bits| u64::from(bits)).collect()
        }
        ElementType::F64 | ElementType::U64 | ElementType::I64 => DOUBLE_SPECIALS.to_vec(),
        ElementType::I32 => INT_SPECIALS.iter().map(|&n| n as u32 as u64).collect(),
    }
}

/// Random raw bits for an operand of `ty`.
pub fn random_bits(rng: &mut ChaCha8Rng, ty: ElementType) -> u64 {
    match ty.size() {
        4 => u64::from(rng.next_u32()),
        _ => rng.next_u64(),
    }
}

/// Mixed-radix walk over the Cartesian product of per-operand tables, operand 0
/// varying fastest. Element `i` of job `j` is product entry `j * buffer_elements + i`.
#[derive(Debug, Clone)]
pub struct SpecialGrid {
    tables: Vec<Vec<u64>>,
    total: usize,
    buffer_elements: usize,
}

impl SpecialGrid {
    pub fn new(operand_types: &[ElementType], buffer_elements: usize) -> Self {
        let tables: Vec<Vec<u64>> = operand_types.iter().map(|&ty| table_for(ty)).collect();
        let total = tables.iter().map(Vec::len).product();
        Self {
            tables,
            total,
            buffer_elements,
        }
    }

    /// Grid for the float operands of a shape at `precision`.
    pub fn floats(precision: Precision, arity: usize, buffer_elements: usize) -> Self {
        Self::new(&vec![precision.float_type(); arity], buffer_elements)
    }

    /// Number of product entries.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Last job that still holds product entries.
    pub fn last_special_job(&self) -> usize {
        self.total.saturating_sub(1) / self.buffer_elements
    }

    /// Writes the operand bits of `index` within `job` into `out`, or returns `false`
    /// once the product is exhausted.
    pub fn entry(&self, job: usize, index: usize, out: &mut [u64]) -> bool {
        let Some(mut flat) = job
            .checked_mul(self.buffer_elements)
            .and_then(|start| start.checked_add(index))
            .filter(|&flat| flat < self.total)
        else {
            return false;
        };
        for (slot, table) in out.iter_mut().zip(&self.tables) {
            *slot = table[flat % table.len()];
            flat /= table.len();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn tables_are_symmetric_and_distinct() {
        let floats: HashSet<u32> = FLOAT_SPECIALS.iter().copied().collect();
        assert_eq!(floats.len(), FLOAT_SPECIALS.len());
        for bits in FLOAT_SPECIALS {
            assert!(floats.contains(&(bits ^ 0x8000_0000)), "{bits:#x} lacks its negation");
        }
        let doubles: HashSet<u64> = DOUBLE_SPECIALS.iter().copied().collect();
        assert_eq!(doubles.len(), DOUBLE_SPECIALS.len());
        for bits in DOUBLE_SPECIALS {
            assert!(
                doubles.contains(&(bits ^ (1 << 63))),
                "{bits:#x} lacks its negation"
            );
        }
    }

    #[test]
    fn tables_cover_the_classic_hard_cases() {
        let floats: Vec<f32> = FLOAT_SPECIALS.iter().map(|&b| f32::from_bits(b)).collect();
        assert!(floats.iter().any(|x| x.is_nan()));
        assert!(floats.contains(&f32::INFINITY));
        assert!(floats.contains(&f32::NEG_INFINITY));
        assert!(floats.contains(&f32::MAX));
        assert!(floats.contains(&f32::from_bits(1)));
        assert!(floats.iter().any(|x| *x == 0.0 && x.is_sign_negative()));
    }

    #[test]
    fn pairs_are_visited_exactly_once() {
        let buffer_elements = 1000;
        let grid = SpecialGrid::floats(Precision::Single, 2, buffer_elements);
        assert_eq!(grid.total(), 98 * 98);
        let mut seen = HashSet::new();
        let mut out = [0u64; 2];
        for job in 0..=grid.last_special_job() {
            for index in 0..buffer_elements {
                if grid.entry(job, index, &mut out) {
                    assert!(seen.insert(out), "pair {out:x?} repeated");
                }
            }
        }
        assert_eq!(seen.len(), grid.total());
        assert!(!grid.entry(grid.last_special_job() + 1, 0, &mut out));
    }

    #[test]
    fn mixed_operand_types_use_their_own_tables() {
        let grid = SpecialGrid::new(&[ElementType::F32, ElementType::I32], 64);
        assert_eq!(grid.total(), 98 * 21);
        let mut out = [0u64; 2];
        assert!(grid.entry(0, 98, &mut out));
        assert_eq!(out, [u64::from(FLOAT_SPECIALS[0]), 1]);
    }

    #[test]
    fn random_fill_is_reproducible_per_stream() {
        let draw = |stream: u64| {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            rng.set_stream(stream);
            (0..4)
                .map(|_| random_bits(&mut rng, ElementType::F32))
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
        assert_ne!(draw(3), draw(4));
        assert!(draw(3).iter().all(|&bits| bits <= u64::from(u32::MAX)));
    }
}
