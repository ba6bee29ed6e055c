//! Per-function run results and their JSON export.

use serde::Serialize;

use crate::error::{BruteError, Result};
use crate::verify::WorstCase;
use crate::Precision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Passed,
    /// Passed in wimpy mode, which only samples the domain.
    WimpPassed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidthTiming {
    pub width: usize,
    pub ns_per_element: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub precision: Precision,
    pub relaxed: bool,
    pub outcome: Outcome,
    pub max_error: f64,
    pub max_error_inputs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub timings: Vec<WidthTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl FunctionReport {
    pub fn new(name: &str, precision: Precision, relaxed: bool, outcome: Outcome) -> Self {
        Self {
            name: name.to_string(),
            precision,
            relaxed,
            outcome,
            max_error: 0.0,
            max_error_inputs: Vec::new(),
            timings: Vec::new(),
            failure: None,
            skip_reason: None,
        }
    }

    pub fn skipped(name: &str, precision: Precision, relaxed: bool, reason: &str) -> Self {
        Self {
            skip_reason: Some(reason.to_string()),
            ..Self::new(name, precision, relaxed, Outcome::Skipped)
        }
    }

    pub fn with_worst(mut self, worst: &WorstCase) -> Self {
        self.max_error = worst.error;
        self.max_error_inputs = worst.inputs.clone();
        self
    }

    pub fn failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }

    /// One console line: `sin float  passed   0.62 @ {0x1.2p+3}`.
    pub fn summary_line(&self) -> String {
        let mode = if self.relaxed { " (relaxed)" } else { "" };
        let head = format!("{}{mode} {}", self.name, self.precision.label());
        match self.outcome {
            Outcome::Skipped => format!(
                "{head:<32} skipped: {}",
                self.skip_reason.as_deref().unwrap_or("unsupported")
            ),
            Outcome::Failed => format!("{head:<32} FAILED"),
            Outcome::Passed | Outcome::WimpPassed => {
                let status = if self.outcome == Outcome::WimpPassed {
                    "Wimp pass"
                } else {
                    "passed"
                };
                format!(
                    "{head:<32} {status:<9} {:8.2} @ {{{}}}",
                    self.max_error,
                    self.max_error_inputs.join(", ")
                )
            }
        }
    }
}

pub fn to_json(reports: &[FunctionReport]) -> Result<String> {
    serde_json::to_string_pretty(reports)
        .map_err(|err| BruteError::Config(format!("cannot serialize reports: {err}")))
}
