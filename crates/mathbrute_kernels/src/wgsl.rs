//! WGSL lowering of the elementwise math kernels.

use crate::{CallForm, ElementType, KernelSignature, Precision};

pub const WORKGROUP_SIZE: u32 = 64;

const SWIZZLE: [&str; 4] = [".x", ".y", ".z", ".w"];

const UNARY_BUILTINS: &[(&str, &str)] = &[
    ("acos", "acos"),
    ("acosh", "acosh"),
    ("asin", "asin"),
    ("asinh", "asinh"),
    ("atan", "atan"),
    ("atanh", "atanh"),
    ("ceil", "ceil"),
    ("cos", "cos"),
    ("cosh", "cosh"),
    ("exp", "exp"),
    ("exp2", "exp2"),
    ("fabs", "abs"),
    ("floor", "floor"),
    ("log", "log"),
    ("log2", "log2"),
    ("rint", "round"),
    ("rsqrt", "inverseSqrt"),
    ("sin", "sin"),
    ("sinh", "sinh"),
    ("sqrt", "sqrt"),
    ("sqrt_cr", "sqrt"),
    ("tan", "tan"),
    ("tanh", "tanh"),
    ("trunc", "trunc"),
    ("half_cos", "cos"),
    ("half_exp", "exp"),
    ("half_exp2", "exp2"),
    ("half_log", "log"),
    ("half_log2", "log2"),
    ("half_rsqrt", "inverseSqrt"),
    ("half_sin", "sin"),
    ("half_sqrt", "sqrt"),
    ("half_tan", "tan"),
];

const BINARY_BUILTINS: &[(&str, &str)] = &[
    ("atan2", "atan2"),
    ("fmax", "max"),
    ("fmin", "min"),
    ("pow", "pow"),
    ("powr", "pow"),
    ("half_powr", "pow"),
];

const OPERATORS: [&str; 4] = ["+", "-", "*", "/"];

/// Lane count of one generated operation: scalar or `vecN`.
#[derive(Clone, Copy)]
struct Lanes(usize);

impl Lanes {
    fn of(self, elem: ElementType) -> String {
        if self.0 == 1 {
            elem.wgsl_name().to_string()
        } else {
            format!("vec{}<{}>", self.0, elem.wgsl_name())
        }
    }

    fn splat(self, elem: ElementType, literal: &str) -> String {
        if self.0 == 1 {
            literal.to_string()
        } else {
            format!("{}({literal})", self.of(elem))
        }
    }

    fn bits(self, value: &str) -> String {
        format!("bitcast<{}>({value})", self.of(ElementType::U32))
    }
}

fn lookup(table: &[(&str, &'static str)], function: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(name, _)| *name == function)
        .map(|(_, builtin)| *builtin)
}

fn unary_condition(function: &str, x: &str, lanes: Lanes) -> Option<String> {
    let u = |literal: &str| lanes.splat(ElementType::U32, literal);
    let bits = lanes.bits(x);
    let cond = match function {
        "isnan" => format!("({x} != {x})"),
        "isinf" => format!(
            "(({bits} & {}) == {})",
            u("0x7fffffffu"),
            u("0x7f800000u")
        ),
        "isfinite" => format!(
            "(({bits} & {}) != {})",
            u("0x7f800000u"),
            u("0x7f800000u")
        ),
        "isnormal" => format!(
            "((({bits} & {e}) != {zero}) & (({bits} & {e}) != {e}))",
            e = u("0x7f800000u"),
            zero = u("0u")
        ),
        "signbit" => format!("(({bits} >> {}) != {})", u("31u"), u("0u")),
        "!" => format!("({x} == {})", lanes.splat(ElementType::F32, "0.0")),
        _ => return None,
    };
    Some(cond)
}

fn binary_condition(function: &str, x: &str, y: &str) -> Option<String> {
    let cond = match function {
        "isequal" => format!("({x} == {y})"),
        "isnotequal" => format!("({x} != {y})"),
        "isgreater" => format!("({x} > {y})"),
        "isgreaterequal" => format!("({x} >= {y})"),
        "isless" => format!("({x} < {y})"),
        "islessequal" => format!("({x} <= {y})"),
        "islessgreater" => format!("(({x} < {y}) | ({x} > {y}))"),
        "isordered" => format!("(({x} == {x}) & ({y} == {y}))"),
        "isunordered" => format!("(({x} != {x}) | ({y} != {y}))"),
        _ => return None,
    };
    Some(cond)
}

fn relational(cond: String, lanes: Lanes) -> String {
    let truth = if lanes.0 == 1 { "1i" } else { "-1i" };
    format!(
        "select({}, {}, {cond})",
        lanes.splat(ElementType::I32, "0i"),
        lanes.splat(ElementType::I32, truth)
    )
}

/// One expression per kernel output, or `None` when WGSL has no lowering.
fn lower(function: &str, form: CallForm, args: &[String], lanes: Lanes) -> Option<Vec<String>> {
    let f = ElementType::F32;
    let exprs = match form {
        CallForm::Unary => match function {
            "" => vec![args[0].clone()],
            "half_recip" => vec![format!("({} / {})", lanes.splat(f, "1.0"), args[0])],
            _ => vec![format!("{}({})", lookup(UNARY_BUILTINS, function)?, args[0])],
        },
        CallForm::Binary => match function {
            "half_divide" => vec![format!("({} / {})", args[0], args[1])],
            _ => vec![format!(
                "{}({}, {})",
                lookup(BINARY_BUILTINS, function)?,
                args[0],
                args[1]
            )],
        },
        CallForm::BinaryOperator => {
            if !OPERATORS.contains(&function) {
                return None;
            }
            vec![format!("({} {function} {})", args[0], args[1])]
        }
        CallForm::BinaryWithInt => match function {
            "ldexp" => vec![format!("ldexp({}, {})", args[0], args[1])],
            _ => return None,
        },
        CallForm::Ternary => match function {
            "fma" => vec![format!("fma({}, {}, {})", args[0], args[1], args[2])],
            "mad" => vec![format!("({} * {} + {})", args[0], args[1], args[2])],
            "select" => vec![format!(
                "select({}, {}, {} != {})",
                args[0],
                args[1],
                args[2],
                lanes.splat(f, "0.0")
            )],
            _ => return None,
        },
        CallForm::Predicate => vec![relational(
            unary_condition(function, &args[0], lanes)?,
            lanes,
        )],
        CallForm::BinaryPredicate => vec![relational(
            binary_condition(function, &args[0], &args[1])?,
            lanes,
        )],
        CallForm::UnaryTwoResults => match function {
            "sincos" => vec![format!("sin({})", args[0]), format!("cos({})", args[0])],
            "modf" => vec![
                format!("modf({}).fract", args[0]),
                format!("modf({}).whole", args[0]),
            ],
            "fract" => vec![
                format!(
                    "min({x} - floor({x}), {})",
                    lanes.splat(f, "0x1.fffffep-1f"),
                    x = args[0]
                ),
                format!("floor({})", args[0]),
            ],
            _ => return None,
        },
        CallForm::UnaryTwoResultsInt => match function {
            "frexp" => vec![
                format!("frexp({}).fract", args[0]),
                format!("frexp({}).exp", args[0]),
            ],
            _ => return None,
        },
        CallForm::UnaryToInt | CallForm::UnaryFromUInt | CallForm::BinaryTwoResultsInt => {
            return None
        }
    };
    Some(exprs)
}

/// Whether `function` has a WGSL lowering for this call form and precision.
pub fn wgsl_supports(function: &str, form: CallForm, precision: Precision) -> bool {
    if precision != Precision::Single {
        return false;
    }
    let args: Vec<String> = (0..form.arity()).map(|idx| format!("a{idx}")).collect();
    lower(function, form, &args, Lanes(1)).is_some()
}

fn element_index(offset: usize) -> String {
    if offset == 0 {
        "base".to_string()
    } else {
        format!("base + {offset}u")
    }
}

fn call_exprs(signature: &KernelSignature, args: &[String], lanes: Lanes) -> Vec<String> {
    lower(&signature.function, signature.form, args, lanes).unwrap_or_else(|| {
        let call = format!("{}({})", signature.function, args.join(", "));
        vec![call; signature.output_types().len()]
    })
}

fn emit_group(
    src: &mut String,
    signature: &KernelSignature,
    offset: usize,
    lanes: usize,
    indent: &str,
) {
    let vector = Lanes(lanes);
    let mut args = Vec::new();
    for (idx, ty) in signature.input_types().iter().enumerate() {
        let name = format!("a{idx}_{offset}");
        let loads: Vec<String> = (0..lanes)
            .map(|lane| format!("in{idx}[{}]", element_index(offset + lane)))
            .collect();
        let value = if lanes == 1 {
            loads[0].clone()
        } else {
            format!("{}({})", vector.of(*ty), loads.join(", "))
        };
        src.push_str(&format!("{indent}let {name} = {value};\n"));
        args.push(name);
    }
    for (out, expr) in call_exprs(signature, &args, vector).iter().enumerate() {
        let result = format!("r{out}_{offset}");
        src.push_str(&format!("{indent}let {result} = {expr};\n"));
        for lane in 0..lanes {
            let swizzle = if lanes == 1 { "" } else { SWIZZLE[lane] };
            src.push_str(&format!(
                "{indent}out{out}[{}] = {result}{swizzle};\n",
                element_index(offset + lane)
            ));
        }
    }
}

/// Final width-3 item: one or two valid lanes, the rest replicate the last valid lane.
fn emit_padded_tail(src: &mut String, signature: &KernelSignature, indent: &str) {
    let vector = Lanes(3);
    let mut args = Vec::new();
    for (idx, ty) in signature.input_types().iter().enumerate() {
        let name = format!("a{idx}_0");
        src.push_str(&format!(
            "{indent}var {name} = {}(in{idx}[base], in{idx}[base], in{idx}[base]);\n",
            vector.of(*ty)
        ));
        src.push_str(&format!("{indent}if (base + 1u < n) {{\n"));
        src.push_str(&format!("{indent}    {name}.y = in{idx}[base + 1u];\n"));
        src.push_str(&format!("{indent}    {name}.z = in{idx}[base + 1u];\n"));
        src.push_str(&format!("{indent}}}\n"));
        args.push(name);
    }
    for (out, expr) in call_exprs(signature, &args, vector).iter().enumerate() {
        let result = format!("r{out}_0");
        src.push_str(&format!("{indent}let {result} = {expr};\n"));
        src.push_str(&format!("{indent}out{out}[base] = {result}.x;\n"));
        src.push_str(&format!("{indent}if (base + 1u < n) {{\n"));
        src.push_str(&format!("{indent}    out{out}[base + 1u] = {result}.y;\n"));
        src.push_str(&format!("{indent}}}\n"));
    }
}

pub(crate) fn render(signature: &KernelSignature, entry_point: &str) -> String {
    let outputs = signature.output_types();
    let inputs = signature.input_types();
    let width = signature.width;
    let mut src = String::new();

    let display = if signature.function.is_empty() {
        "assignment"
    } else {
        signature.function.as_str()
    };
    src.push_str(&format!(
        "// {display} ({}) width {width}\n",
        signature.precision.label()
    ));
    for (idx, ty) in outputs.iter().enumerate() {
        src.push_str(&format!(
            "@group(0) @binding({idx}) var<storage, read_write> out{idx}: array<{}>;\n",
            ty.wgsl_name()
        ));
    }
    for (idx, ty) in inputs.iter().enumerate() {
        src.push_str(&format!(
            "@group(0) @binding({}) var<storage, read> in{idx}: array<{}>;\n",
            outputs.len() + idx,
            ty.wgsl_name()
        ));
    }

    src.push_str(&format!("\n@compute @workgroup_size({WORKGROUP_SIZE})\n"));
    src.push_str(&format!(
        "fn {entry_point}(@builtin(global_invocation_id) gid: vec3<u32>) {{\n"
    ));
    src.push_str("    let n = arrayLength(&out0);\n");
    src.push_str(&format!("    let base = gid.x * {width}u;\n"));
    src.push_str("    if (base >= n) {\n        return;\n    }\n");

    if width == 3 {
        src.push_str("    if (base + 3u <= n) {\n");
        emit_group(&mut src, signature, 0, 3, "        ");
        src.push_str("    } else {\n");
        emit_padded_tail(&mut src, signature, "        ");
        src.push_str("    }\n");
    } else {
        let lanes = width.min(4);
        for group in 0..width / lanes {
            emit_group(&mut src, signature, group * lanes, lanes, "    ");
        }
    }
    src.push_str("}\n");
    src
}
