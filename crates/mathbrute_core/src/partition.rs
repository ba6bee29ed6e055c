//! Splits the 32-bit input domain into equally sized jobs.

use crate::config::RunConfig;
use crate::error::{BruteError, Result};

const DOMAIN: u64 = 1 << 32;

/// Job layout of one function run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Sub-buffer slots; the worker count rounded up to a power of two.
    pub thread_slots: usize,
    /// Elements handled by one job, the same for every operand and output.
    pub buffer_elements: usize,
    /// Stride between consecutive inputs of a job.
    pub scale: u64,
    /// Distance between the first inputs of consecutive jobs.
    pub step: u64,
    pub job_count: usize,
}

impl Partition {
    /// Layout for elements of `element_size` bytes spread over `config.thread_count` workers.
    pub fn new(config: &RunConfig, element_size: usize) -> Result<Self> {
        let thread_slots = config.thread_count.max(1).next_power_of_two();
        let buffer_elements = config.buffer_size / (element_size * thread_slots);
        if buffer_elements == 0 {
            return Err(BruteError::Config(format!(
                "buffer of {} bytes cannot be shared by {thread_slots} threads",
                config.buffer_size
            )));
        }
        let scale = config.test_scale(element_size);
        let step = buffer_elements as u64 * scale;
        let job_count = if step >= DOMAIN {
            1
        } else {
            DOMAIN.div_ceil(step) as usize
        };
        Ok(Self {
            thread_slots,
            buffer_elements,
            scale,
            step,
            job_count,
        })
    }

    /// First input bit pattern of `job`.
    pub fn job_base(&self, job: usize) -> u32 {
        (job as u64).wrapping_mul(self.step) as u32
    }

    /// Bit pattern of element `index` of `job` in the strided domain walk.
    pub fn input_bits(&self, job: usize, index: usize) -> u32 {
        self.job_base(job)
            .wrapping_add((index as u64).wrapping_mul(self.scale) as u32)
    }

    /// Whether `job` is one that prints a progress marker.
    pub fn reports_progress(&self, job: usize) -> bool {
        self.job_base(job) & 0x0fff_ffff == 0
    }

    /// Byte length of one sub-buffer holding elements of `element_size` bytes.
    pub fn sub_buffer_bytes(&self, element_size: usize) -> usize {
        self.buffer_elements * element_size
    }
}

/// Spreads a 32-bit pattern over a double: sign, exponent and the top mantissa bits
/// come from the high 20 bits, the low 12 bits land in the bottom of the mantissa.
pub fn double_from_u32(bits: u32) -> u64 {
    let bits = u64::from(bits);
    ((bits & 0xffff_f000) << 32) | (bits & 0xfff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threads: usize) -> RunConfig {
        RunConfig {
            thread_count: threads,
            ..RunConfig::default()
        }
    }

    #[test]
    fn full_mode_covers_every_pattern() {
        let partition = Partition::new(&config(6), 4).unwrap();
        assert_eq!(partition.thread_slots, 8);
        assert_eq!(partition.buffer_elements, (2 << 20) / 4 / 8);
        assert_eq!(partition.scale, 1);
        assert_eq!(partition.job_count as u64 * partition.step, DOMAIN);

        // Neighbouring jobs abut exactly, so the union is the whole domain.
        let last = partition.buffer_elements - 1;
        for job in [0, 1, partition.job_count / 2, partition.job_count - 2] {
            assert_eq!(
                partition.input_bits(job, last).wrapping_add(1),
                partition.job_base(job + 1)
            );
        }
        assert_eq!(
            partition
                .input_bits(partition.job_count - 1, last)
                .wrapping_add(1),
            0
        );
    }

    #[test]
    fn wimpy_mode_strides() {
        let cfg = RunConfig {
            wimpy: true,
            wimpy_reduction_factor: 1024,
            ..config(1)
        };
        let partition = Partition::new(&cfg, 4).unwrap();
        assert_eq!(partition.scale, 4 * 2 * 1024);
        assert_eq!(partition.step, partition.buffer_elements as u64 * 8192);
        assert_eq!(partition.input_bits(0, 3), 3 * 8192);
    }

    #[test]
    fn oversized_step_collapses_to_one_job() {
        let cfg = RunConfig {
            wimpy: true,
            wimpy_reduction_factor: 1024,
            buffer_size: 8 << 20,
            ..config(1)
        };
        let partition = Partition::new(&cfg, 8).unwrap();
        assert!(partition.step >= DOMAIN);
        assert_eq!(partition.job_count, 1);
    }

    #[test]
    fn rejects_buffers_too_small_for_the_thread_count() {
        let cfg = RunConfig {
            buffer_size: 64,
            ..config(32)
        };
        assert!(Partition::new(&cfg, 8).is_err());
    }

    #[test]
    fn double_widening_keeps_sign_exponent_and_low_bits() {
        assert_eq!(double_from_u32(0), 0);
        assert_eq!(double_from_u32(0x3ff0_0000), 0x3ff0_0000_0000_0000);
        assert_eq!(double_from_u32(0x8000_0001), 0x8000_0000_0000_0001);
        assert_eq!(double_from_u32(0xffff_ffff), 0xffff_f000_0000_0fff);
    }

    #[test]
    fn progress_markers_fall_on_2_to_the_28() {
        let partition = Partition::new(&config(1), 4).unwrap();
        let per_marker = (1usize << 28) / partition.step as usize;
        assert!(partition.reports_progress(0));
        assert!(!partition.reports_progress(1));
        assert!(partition.reports_progress(per_marker));
    }
}
