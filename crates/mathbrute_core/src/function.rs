//! Static description of one builtin under test.

use crate::error::{BruteError, Result};
use crate::{CallForm, Precision};

/// Host reference for a builtin, one variant per call shape.
///
/// References are evaluated in `f64` for both device precisions.
#[derive(Clone, Copy)]
pub enum Reference {
    Unary(fn(f64) -> f64),
    UnaryInt(fn(f64) -> i32),
    UnaryUInt(fn(u64) -> f64),
    /// Relational macro; returns the scalar truth value `0` or `1`.
    Predicate(fn(f64) -> i32),
    Binary(fn(f64, f64) -> f64),
    BinaryInt(fn(f64, i32) -> f64),
    BinaryPredicate(fn(f64, f64) -> i32),
    Ternary(fn(f64, f64, f64) -> f64),
    UnaryTwoResults(fn(f64) -> (f64, f64)),
    UnaryTwoResultsInt(fn(f64) -> (f64, i32)),
    BinaryTwoResultsInt(fn(f64, f64) -> (f64, i32)),
}

impl Reference {
    fn kind(&self) -> &'static str {
        match self {
            Reference::Unary(_) => "unary",
            Reference::UnaryInt(_) => "unary_int",
            Reference::UnaryUInt(_) => "unary_uint",
            Reference::Predicate(_) => "predicate",
            Reference::Binary(_) => "binary",
            Reference::BinaryInt(_) => "binary_int",
            Reference::BinaryPredicate(_) => "binary_predicate",
            Reference::Ternary(_) => "ternary",
            Reference::UnaryTwoResults(_) => "unary_two_results",
            Reference::UnaryTwoResultsInt(_) => "unary_two_results_int",
            Reference::BinaryTwoResultsInt(_) => "binary_two_results_int",
        }
    }
}

impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reference::{}", self.kind())
    }
}

/// How fast-relaxed-math results are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxedRule {
    /// ULP bound taken from the relaxed tolerance.
    Ulps,
    /// Absolute error bound on `[-π, π]`; other inputs are not tested.
    AbsError,
    /// Absolute error bound on `[-1, 1]`; other inputs are not tested.
    AbsErrorInUnitRange,
    /// `3 + floor(|2x|)` ulps on the full profile.
    ExpScaled,
    /// Absolute error `2^-21` on `[0.5, 2]`, the relaxed ULP bound elsewhere.
    LogRange,
    /// Derived from other builtins; no bound when derived implementations are allowed.
    DerivedUnchecked,
}

impl RelaxedRule {
    /// Inputs with a larger magnitude are replaced by NaN in relaxed runs.
    pub fn input_bound(self) -> Option<f64> {
        match self {
            RelaxedRule::AbsError => Some(std::f64::consts::PI),
            RelaxedRule::AbsErrorInUnitRange => Some(1.0),
            _ => None,
        }
    }
}

/// Reduced-accuracy builtins whose result is only bounded for large inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeLimit {
    None,
    /// Beyond `2^16` any result in `[-1, 1]` (plus the ULP slack) is accepted.
    UnitBounded,
    /// Beyond `2^16` any non-NaN result is accepted.
    Unbounded,
}

/// Test shape: which driver runs a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Unary,
    IntUnary,
    UnaryU,
    MacroUnary,
    Binary,
    BinaryOperator,
    BinaryI,
    MacroBinary,
    Ternary,
    UnaryTwoResults,
    UnaryTwoResultsI,
    BinaryTwoResultsI,
    Mad,
}

impl Shape {
    pub fn call_form(self) -> CallForm {
        match self {
            Shape::Unary => CallForm::Unary,
            Shape::IntUnary => CallForm::UnaryToInt,
            Shape::UnaryU => CallForm::UnaryFromUInt,
            Shape::MacroUnary => CallForm::Predicate,
            Shape::Binary => CallForm::Binary,
            Shape::BinaryOperator => CallForm::BinaryOperator,
            Shape::BinaryI => CallForm::BinaryWithInt,
            Shape::MacroBinary => CallForm::BinaryPredicate,
            Shape::Ternary | Shape::Mad => CallForm::Ternary,
            Shape::UnaryTwoResults => CallForm::UnaryTwoResults,
            Shape::UnaryTwoResultsI => CallForm::UnaryTwoResultsInt,
            Shape::BinaryTwoResultsI => CallForm::BinaryTwoResultsInt,
        }
    }

    fn accepts(self, reference: &Reference) -> bool {
        matches!(
            (self, reference),
            (Shape::Unary, Reference::Unary(_))
                | (Shape::IntUnary, Reference::UnaryInt(_))
                | (Shape::UnaryU, Reference::UnaryUInt(_))
                | (Shape::MacroUnary, Reference::Predicate(_))
                | (Shape::Binary | Shape::BinaryOperator, Reference::Binary(_))
                | (Shape::BinaryI, Reference::BinaryInt(_))
                | (Shape::MacroBinary, Reference::BinaryPredicate(_))
                | (Shape::Ternary | Shape::Mad, Reference::Ternary(_))
                | (Shape::UnaryTwoResults, Reference::UnaryTwoResults(_))
                | (Shape::UnaryTwoResultsI, Reference::UnaryTwoResultsInt(_))
                | (Shape::BinaryTwoResultsI, Reference::BinaryTwoResultsInt(_))
        )
    }
}

/// One entry of the function table.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    /// Builtin as written in kernel source; empty for plain assignment.
    pub name_in_code: &'static str,
    pub reference: Reference,
    /// Fast-relaxed-math reference; `reference` is used when absent.
    pub relaxed_reference: Option<Reference>,
    /// Single-precision reference for builtins whose `f64` result would round twice.
    pub single_reference: Option<Reference>,
    pub float_ulps: f32,
    pub double_ulps: f32,
    pub float_embedded_ulps: f32,
    pub relaxed_error: f32,
    pub relaxed_embedded_error: f32,
    /// Results may be flushed to zero even on devices that keep subnormals.
    pub ftz: bool,
    /// Also tested under fast-relaxed-math.
    pub relaxed: bool,
    pub relaxed_rule: RelaxedRule,
    pub range_limit: RangeLimit,
    /// Result must match bit for bit, with no relaxation at all.
    pub exact: bool,
    pub correctly_rounded: bool,
    pub has_double: bool,
    pub shape: Shape,
}

impl FunctionDescriptor {
    pub const fn new(
        name: &'static str,
        name_in_code: &'static str,
        reference: Reference,
        shape: Shape,
    ) -> Self {
        Self {
            name,
            name_in_code,
            reference,
            relaxed_reference: None,
            single_reference: None,
            float_ulps: 0.0,
            double_ulps: 0.0,
            float_embedded_ulps: 0.0,
            relaxed_error: 0.0,
            relaxed_embedded_error: 0.0,
            ftz: false,
            relaxed: false,
            relaxed_rule: RelaxedRule::Ulps,
            range_limit: RangeLimit::None,
            exact: false,
            correctly_rounded: false,
            has_double: true,
            shape,
        }
    }

    /// Sets the float, double and embedded-profile ULP bounds.
    pub const fn ulps(self, float_ulps: f32, double_ulps: f32, float_embedded_ulps: f32) -> Self {
        Self {
            float_ulps,
            double_ulps,
            float_embedded_ulps,
            ..self
        }
    }

    /// Enables fast-relaxed-math testing with its own bounds and rule.
    pub const fn relaxed(
        self,
        relaxed_reference: Option<Reference>,
        relaxed_error: f32,
        relaxed_embedded_error: f32,
        relaxed_rule: RelaxedRule,
    ) -> Self {
        Self {
            relaxed: true,
            relaxed_reference,
            relaxed_error,
            relaxed_embedded_error,
            relaxed_rule,
            ..self
        }
    }

    pub const fn single_reference(self, reference: Reference) -> Self {
        Self {
            single_reference: Some(reference),
            ..self
        }
    }

    pub const fn ftz(self) -> Self {
        Self { ftz: true, ..self }
    }

    pub const fn exact(self) -> Self {
        Self { exact: true, ..self }
    }

    pub const fn range_limit(self, range_limit: RangeLimit) -> Self {
        Self {
            range_limit,
            ..self
        }
    }

    pub const fn single_only(self) -> Self {
        Self {
            has_double: false,
            ..self
        }
    }

    /// Only run on devices with correctly rounded divide and sqrt, built with that option.
    pub const fn correctly_rounded(self) -> Self {
        Self {
            correctly_rounded: true,
            ..self
        }
    }

    pub fn call_form(&self) -> CallForm {
        self.shape.call_form()
    }

    /// Reference used at `precision` in the given mode.
    pub fn reference_for(&self, precision: Precision, relaxed: bool) -> Reference {
        match (relaxed, self.relaxed_reference, self.single_reference) {
            (true, Some(reference), _) => reference,
            (_, _, Some(reference)) if precision == Precision::Single => reference,
            _ => self.reference,
        }
    }

    /// Error bound for a run at `precision` on a full or embedded profile.
    pub fn tolerance(&self, precision: Precision, embedded: bool, relaxed: bool) -> f64 {
        let bound = match precision {
            Precision::Double => self.double_ulps,
            Precision::Single => match (relaxed, embedded) {
                (true, true) => self.relaxed_embedded_error,
                (true, false) => self.relaxed_error,
                (false, true) => self.float_embedded_ulps,
                (false, false) => self.float_ulps,
            },
        };
        f64::from(bound)
    }

    pub fn validate(&self) -> Result<()> {
        let malformed = |reason: String| BruteError::Descriptor {
            name: self.name.to_string(),
            reason,
        };
        if !self.shape.accepts(&self.reference) {
            return Err(malformed(format!(
                "{:?} reference does not fit the {:?} shape",
                self.reference, self.shape
            )));
        }
        for (mode, reference) in [
            ("relaxed", &self.relaxed_reference),
            ("single", &self.single_reference),
        ] {
            if let Some(reference) = reference {
                if !self.shape.accepts(reference) {
                    return Err(malformed(format!(
                        "{mode} {reference:?} reference does not fit the {:?} shape",
                        self.shape
                    )));
                }
            }
        }
        let bounds = [
            ("float_ulps", self.float_ulps),
            ("double_ulps", self.double_ulps),
            ("float_embedded_ulps", self.float_embedded_ulps),
            ("relaxed_error", self.relaxed_error),
            ("relaxed_embedded_error", self.relaxed_embedded_error),
        ];
        for (field, value) in bounds {
            if value.is_nan() || value < 0.0 {
                return Err(malformed(format!("{field} = {value} is not a valid bound")));
            }
        }
        Ok(())
    }
}
