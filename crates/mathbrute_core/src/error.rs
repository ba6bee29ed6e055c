//! Error taxonomy for a brute-force run.

use thiserror::Error;

use crate::verify::Mismatch;

/// Errors that terminate the current function run.
#[derive(Debug, Error)]
pub enum BruteError {
    #[error("device call `{call}` failed: {message}")]
    Device { call: &'static str, message: String },

    #[error("kernel build failed for `{function}`:\n{log}")]
    Build { function: String, log: String },

    #[error("{0}")]
    Verification(Box<Mismatch>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("function table entry `{name}` is malformed: {reason}")]
    Descriptor { name: String, reason: String },

    #[error("`{0}` is not supported by this device")]
    Unsupported(String),
}

impl BruteError {
    pub fn device(call: &'static str, message: impl Into<String>) -> Self {
        Self::Device {
            call,
            message: message.into(),
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

impl From<Mismatch> for BruteError {
    fn from(mismatch: Mismatch) -> Self {
        Self::Verification(Box::new(mismatch))
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, BruteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_name_the_failing_call() {
        let err = BruteError::device("enqueue_nd_range", "queue lost");
        assert_eq!(
            err.to_string(),
            "device call `enqueue_nd_range` failed: queue lost"
        );
        assert!(!err.is_verification());
    }

    #[test]
    fn build_errors_carry_the_log() {
        let err = BruteError::Build {
            function: "sin".into(),
            log: "error: unknown identifier".into(),
        };
        assert!(err.to_string().contains("unknown identifier"));
    }
}
