//! Device kernel source generation for the brute-force math harness.
//!
//! Every kernel is a plain elementwise call of one builtin over `width` consecutive
//! elements. The text is WGSL; backends that do not compile WGSL (the host emulator)
//! only look at the [`KernelSignature`] carried next to it.

use serde::{Deserialize, Serialize};

mod wgsl;

pub use wgsl::{wgsl_supports, WORKGROUP_SIZE};

/// Vector widths exercised per function, in the order results are verified.
pub const VECTOR_WIDTHS: [usize; 6] = [1, 2, 3, 4, 8, 16];

/// Suffix appended to a function name in diagnostics (`sin4`, `fma16`, ...).
pub const VECTOR_SIZE_NAMES: [&str; 6] = ["", "2", "3", "4", "8", "16"];

pub fn size_name(width: usize) -> &'static str {
    VECTOR_WIDTHS
        .iter()
        .position(|&w| w == width)
        .map(|idx| VECTOR_SIZE_NAMES[idx])
        .unwrap_or("?")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn float_type(self) -> ElementType {
        match self {
            Precision::Single => ElementType::F32,
            Precision::Double => ElementType::F64,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Precision::Single => "float",
            Precision::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32,
    F64,
    I32,
    U32,
    I64,
    U64,
}

impl ElementType {
    pub fn size(self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }

    pub(crate) fn wgsl_name(self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I32 => "i32",
            ElementType::U32 => "u32",
            ElementType::I64 => "i64",
            ElementType::U64 => "u64",
        }
    }
}

/// How a builtin is called from a kernel: argument and result types per shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallForm {
    /// `float f(float)`
    Unary,
    /// `int f(float)`, e.g. `ilogb`
    UnaryToInt,
    /// `float f(uint)`, e.g. `nan`
    UnaryFromUInt,
    /// `int f(float)` relational macro, vector true is `-1`
    Predicate,
    /// `float f(float, float)`
    Binary,
    /// `x op y` for the arithmetic operators
    BinaryOperator,
    /// `float f(float, int)`, e.g. `ldexp`
    BinaryWithInt,
    /// `int f(float, float)` relational macro
    BinaryPredicate,
    /// `float f(float, float, float)`
    Ternary,
    /// `float f(float, float*)`, e.g. `sincos`, `modf`
    UnaryTwoResults,
    /// `float f(float, int*)`, e.g. `frexp`
    UnaryTwoResultsInt,
    /// `float f(float, float, int*)`, e.g. `remquo`
    BinaryTwoResultsInt,
}

impl CallForm {
    pub fn input_types(self, precision: Precision) -> Vec<ElementType> {
        let float = precision.float_type();
        match self {
            CallForm::Unary
            | CallForm::UnaryToInt
            | CallForm::Predicate
            | CallForm::UnaryTwoResults
            | CallForm::UnaryTwoResultsInt => vec![float],
            CallForm::UnaryFromUInt => match precision {
                Precision::Single => vec![ElementType::U32],
                Precision::Double => vec![ElementType::U64],
            },
            CallForm::Binary
            | CallForm::BinaryOperator
            | CallForm::BinaryPredicate
            | CallForm::BinaryTwoResultsInt => vec![float, float],
            CallForm::BinaryWithInt => vec![float, ElementType::I32],
            CallForm::Ternary => vec![float, float, float],
        }
    }

    pub fn output_types(self, precision: Precision, width: usize) -> Vec<ElementType> {
        let float = precision.float_type();
        match self {
            CallForm::Unary
            | CallForm::UnaryFromUInt
            | CallForm::Binary
            | CallForm::BinaryOperator
            | CallForm::BinaryWithInt
            | CallForm::Ternary => vec![float],
            CallForm::UnaryToInt => vec![ElementType::I32],
            CallForm::Predicate | CallForm::BinaryPredicate => {
                if precision == Precision::Double && width > 1 {
                    vec![ElementType::I64]
                } else {
                    vec![ElementType::I32]
                }
            }
            CallForm::UnaryTwoResults => vec![float, float],
            CallForm::UnaryTwoResultsInt | CallForm::BinaryTwoResultsInt => {
                vec![float, ElementType::I32]
            }
        }
    }

    pub fn arity(self) -> usize {
        match self {
            CallForm::Unary
            | CallForm::UnaryToInt
            | CallForm::UnaryFromUInt
            | CallForm::Predicate
            | CallForm::UnaryTwoResults
            | CallForm::UnaryTwoResultsInt => 1,
            CallForm::Binary
            | CallForm::BinaryOperator
            | CallForm::BinaryWithInt
            | CallForm::BinaryPredicate
            | CallForm::BinaryTwoResultsInt => 2,
            CallForm::Ternary => 3,
        }
    }
}

/// Everything a backend needs to know about one kernel besides its text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSignature {
    /// Builtin as written in kernel source (`"+"` for the add operator).
    pub function: String,
    pub form: CallForm,
    pub precision: Precision,
    pub width: usize,
}

impl KernelSignature {
    pub fn entry_point(&self) -> String {
        format!("math_kernel{}", size_name(self.width))
    }

    pub fn input_types(&self) -> Vec<ElementType> {
        self.form.input_types(self.precision)
    }

    pub fn output_types(&self) -> Vec<ElementType> {
        self.form.output_types(self.precision, self.width)
    }
}

#[derive(Debug, Clone)]
pub struct KernelSource {
    pub signature: KernelSignature,
    pub entry_point: String,
    pub text: String,
}

/// Renders the kernel for `function` at one vector width.
///
/// Builtins without a WGSL lowering are emitted as a direct call by name, which the
/// backend compiler rejects with a build log; check [`wgsl_supports`] to skip them.
pub fn render_kernel(
    function: &str,
    form: CallForm,
    precision: Precision,
    width: usize,
) -> KernelSource {
    let signature = KernelSignature {
        function: function.to_string(),
        form,
        precision,
        width,
    };
    let entry_point = signature.entry_point();
    let text = wgsl::render(&signature, &entry_point);
    KernelSource {
        signature,
        entry_point,
        text,
    }
}
