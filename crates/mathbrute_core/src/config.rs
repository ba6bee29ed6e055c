//! Run-wide configuration shared by every component of a brute-force run.

use serde::{Deserialize, Serialize};

use crate::error::{BruteError, Result};
use crate::VECTOR_WIDTHS;

/// Default size in bytes of the buffer shared out between worker threads.
pub const BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Default wimpy-mode reduction factor.
pub const WIMPY_REDUCTION_FACTOR: u32 = 32;

/// Largest accepted wimpy reduction factor (2^10).
pub const MAX_WIMPY_REDUCTION_FACTOR: u32 = 1 << 10;

/// Stride used by embedded profiles outside wimpy mode.
pub const EMBEDDED_REDUCTION_FACTOR: u64 = 81;

/// Immutable settings for a run, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub buffer_size: usize,
    pub thread_count: usize,
    pub wimpy: bool,
    pub wimpy_reduction_factor: u32,
    pub embedded: bool,
    pub force_ftz: bool,
    /// Also test fast-relaxed-math mode for functions that declare it.
    pub relaxed: bool,
    /// Relaxed tan/exp10 are derived implementations with no ULP bound.
    pub fast_relaxed_derived: bool,
    pub test_float: bool,
    pub test_double: bool,
    pub skip_correctness: bool,
    pub measure_times: bool,
    /// Inclusive lower bound into [`VECTOR_WIDTHS`].
    pub min_vector_index: usize,
    /// Exclusive upper bound into [`VECTOR_WIDTHS`].
    pub max_vector_index: usize,
    pub verbose: bool,
    pub seed: u64,
    pub stop_on_error: bool,
    pub correctly_rounded_divide_sqrt: bool,
    /// Accept any result when an input or the reference is inf/NaN, or the reference overflowed.
    pub accept_nan_inf: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            wimpy: false,
            wimpy_reduction_factor: WIMPY_REDUCTION_FACTOR,
            embedded: false,
            force_ftz: false,
            relaxed: true,
            fast_relaxed_derived: true,
            test_float: true,
            test_double: true,
            skip_correctness: false,
            measure_times: false,
            min_vector_index: 0,
            max_vector_index: VECTOR_WIDTHS.len(),
            verbose: false,
            seed: 0x5EED_0F_B1A5,
            stop_on_error: false,
            correctly_rounded_divide_sqrt: false,
            accept_nan_inf: true,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_size.is_power_of_two() || self.buffer_size < 64 {
            return Err(BruteError::Config(format!(
                "buffer size {} must be a power of two of at least 64 bytes",
                self.buffer_size
            )));
        }
        if self.thread_count == 0 {
            return Err(BruteError::Config("thread count must be at least 1".into()));
        }
        let factor = self.wimpy_reduction_factor;
        if !factor.is_power_of_two() || factor > MAX_WIMPY_REDUCTION_FACTOR {
            return Err(BruteError::Config(format!(
                "wimpy reduction factor {factor} must be a power of two in [1, {MAX_WIMPY_REDUCTION_FACTOR}]"
            )));
        }
        if self.min_vector_index >= self.max_vector_index
            || self.max_vector_index > VECTOR_WIDTHS.len()
        {
            return Err(BruteError::Config(format!(
                "vector size index range [{}, {}) is empty or out of bounds",
                self.min_vector_index, self.max_vector_index
            )));
        }
        Ok(())
    }

    /// Stride between consecutive inputs of a job for an element of `type_size` bytes.
    pub fn test_scale(&self, type_size: usize) -> u64 {
        if self.wimpy {
            type_size as u64 * 2 * u64::from(self.wimpy_reduction_factor)
        } else if self.embedded {
            EMBEDDED_REDUCTION_FACTOR
        } else {
            1
        }
    }

    pub fn vector_widths(&self) -> &'static [usize] {
        &VECTOR_WIDTHS[self.min_vector_index..self.max_vector_index]
    }

    /// Restricts testing to a single vector width.
    pub fn with_only_width(mut self, width: usize) -> Result<Self> {
        let index = VECTOR_WIDTHS
            .iter()
            .position(|&w| w == width)
            .ok_or_else(|| BruteError::Config(format!("unsupported vector size {width}")))?;
        self.min_vector_index = index;
        self.max_vector_index = index + 1;
        Ok(self)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| BruteError::Config(format!("malformed run configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }
}
