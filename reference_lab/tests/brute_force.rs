use mathbrute_core::{
    run_function, FunctionDescriptor, FunctionReport, Outcome, Precision, Reference, RelaxedRule,
    RunConfig, Shape, TestContext, WorkerPool,
};
use reference_lab::cpu::reference::lgamma_r;
use reference_lab::{find_function, HostDevice};

const THREADS: usize = 2;

fn wimpy_config() -> RunConfig {
    RunConfig {
        buffer_size: 64 * 1024,
        thread_count: THREADS,
        wimpy: true,
        wimpy_reduction_factor: 1024,
        ..RunConfig::default()
    }
}

fn run_with(device: &HostDevice, config: &RunConfig, desc: &FunctionDescriptor) -> Vec<FunctionReport> {
    let pool = WorkerPool::new(THREADS).unwrap();
    let ctx = TestContext::new(device, config, &pool);
    run_function(desc, &ctx).unwrap()
}

fn run(name: &str) -> Vec<FunctionReport> {
    let desc = find_function(name).unwrap_or_else(|| panic!("no table entry {name}"));
    run_with(&HostDevice::new(), &wimpy_config(), desc)
}

fn assert_all_pass(reports: &[FunctionReport]) {
    for report in reports {
        assert_eq!(
            report.outcome,
            Outcome::WimpPassed,
            "{}",
            report.failure.as_deref().unwrap_or(&report.summary_line())
        );
    }
}

#[test]
fn assignment_is_bit_exact_at_both_precisions() {
    let reports = run("assignment");
    assert_eq!(reports.len(), 2);
    assert_all_pass(&reports);
    assert_eq!(reports[0].precision, Precision::Single);
    assert_eq!(reports[1].precision, Precision::Double);
    assert!(reports.iter().all(|r| r.max_error == 0.0));
}

#[test]
fn flushing_device_passes_addition() {
    let desc = find_function("add").unwrap();
    let reports = run_with(&HostDevice::with_flush_denormals(true), &wimpy_config(), desc);
    assert_all_pass(&reports);
}

#[test]
fn select_keeps_its_operands_under_forced_flushing() {
    let config = RunConfig {
        force_ftz: true,
        ..wimpy_config()
    };
    let device = HostDevice::with_flush_denormals(true);
    assert_all_pass(&run_with(&device, &config, find_function("select").unwrap()));
}

#[test]
fn exact_builtins_fail_under_flushing_and_relaxed_bounds() {
    // Picks the wrong operand for every condition.
    let desc = FunctionDescriptor::new(
        "select_swapped",
        "select",
        Reference::Ternary(|a, b, c| if c != 0.0 { a } else { b }),
        Shape::Ternary,
    )
    .exact()
    .relaxed(None, f32::INFINITY, f32::INFINITY, RelaxedRule::Ulps);
    let config = RunConfig {
        force_ftz: true,
        test_double: false,
        ..wimpy_config()
    };
    let reports = run_with(&HostDevice::with_flush_denormals(true), &config, &desc);
    assert_eq!(reports.len(), 3);
    assert!(reports[0].failed());
    assert!(reports[1].relaxed);
    assert!(reports[1].failed(), "an unbounded relaxed error must not excuse select");
}

#[test]
fn half_precision_builtins_build_with_denormals_flushed() {
    let reports = run("half_sqrt");
    assert_eq!(reports.len(), 2);
    assert_all_pass(&reports[..1]);
    assert_eq!(reports[1].outcome, Outcome::Skipped);
    assert_eq!(reports[1].skip_reason.as_deref(), Some("no double variant"));
}

#[test]
fn exact_and_special_input_shapes_pass() {
    for name in ["select", "fma", "fmax", "ldexp", "isgreater", "frexp", "remquo", "modf"] {
        assert_all_pass(&run(name));
    }
}

#[test]
fn transcendentals_record_their_worst_case() {
    let reports = run("sin");
    assert_eq!(reports.len(), 3, "float, relaxed float and double");
    assert_all_pass(&reports);
    let float = &reports[0];
    assert!(float.max_error <= 4.0);
    if float.max_error > 0.0 {
        assert_eq!(float.max_error_inputs.len(), 1);
        assert!(float.max_error_inputs[0].contains("0x"));
    }
    assert!(reports[1].relaxed);
    assert_eq!(reports[2].max_error, 0.0, "double runs the reference itself");
}

#[test]
fn relaxed_log_passes_on_a_native_host() {
    let reports = run("log");
    assert_all_pass(&reports);
    assert!(reports.iter().any(|r| r.relaxed));
}

#[test]
fn wrong_results_fail_with_a_diagnostic() {
    let desc = FunctionDescriptor::new("sin_as_cos", "sin", Reference::Unary(f64::cos), Shape::Unary)
        .ulps(4.0, 4.0, 4.0);
    let reports = run_with(&HostDevice::new(), &wimpy_config(), &desc);
    assert!(reports[0].failed());
    let failure = reports[0].failure.as_deref().unwrap();
    assert!(failure.starts_with("ERROR: sin_as_cos"), "{failure}");
    assert!(failure.contains("ulp error"));
}

#[test]
fn skipping_correctness_only_exercises_the_device() {
    let desc = FunctionDescriptor::new("sin_as_cos", "sin", Reference::Unary(f64::cos), Shape::Unary);
    let config = RunConfig {
        skip_correctness: true,
        ..wimpy_config()
    };
    let reports = run_with(&HostDevice::new(), &config, &desc);
    assert_all_pass(&reports);
}

#[test]
fn non_finite_inputs_are_exempt_only_when_accepted() {
    // Disagrees with the device on every inf and NaN input.
    let desc = FunctionDescriptor::new(
        "fabs_finite_only",
        "fabs",
        Reference::Unary(|x| if x.is_finite() { x.abs() } else { 0.0 }),
        Shape::Unary,
    );
    let accepting = run_with(&HostDevice::new(), &wimpy_config(), &desc);
    assert_all_pass(&accepting);

    let strict = RunConfig {
        accept_nan_inf: false,
        ..wimpy_config()
    };
    let rejecting = run_with(&HostDevice::new(), &strict, &desc);
    assert!(rejecting[0].failed());
}

#[test]
fn builtins_without_a_host_implementation_are_skipped() {
    let desc = FunctionDescriptor::new("tgamma", "tgamma", Reference::Unary(f64::ln), Shape::Unary);
    let reports = run_with(&HostDevice::new(), &wimpy_config(), &desc);
    assert!(reports.iter().all(|r| r.outcome == Outcome::Skipped));
    assert_eq!(
        reports[0].skip_reason.as_deref(),
        Some("kernel not supported by device")
    );
}

#[test]
fn timings_cover_every_selected_width() {
    let config = RunConfig {
        measure_times: true,
        test_double: false,
        ..wimpy_config().with_only_width(4).unwrap()
    };
    let reports = run_with(&HostDevice::new(), &config, find_function("multiply").unwrap());
    assert_all_pass(&reports[..1]);
    assert_eq!(reports[0].timings.len(), 1);
    assert_eq!(reports[0].timings[0].width, 4);
    assert!(reports[0].timings[0].ns_per_element >= 0.0);
    assert_eq!(reports[1].outcome, Outcome::Skipped);
}

/// `sin` pushed 2^-21 high: four to eight ulps off in single precision.
fn scaled_sin(x: f64) -> f64 {
    x.sin() * (1.0 + 1.0 / 2_097_152.0)
}

#[test]
fn embedded_devices_are_judged_by_the_embedded_bound() {
    let desc = FunctionDescriptor::new("sin_scaled", "sin", Reference::Unary(scaled_sin), Shape::Unary)
        .ulps(1.0, 1.0, 16.0);
    let config = RunConfig {
        test_double: false,
        ..wimpy_config()
    };
    let full = run_with(&HostDevice::new(), &config, &desc);
    assert!(full[0].failed());

    let embedded = run_with(&HostDevice::new().embedded(true), &config, &desc);
    assert_all_pass(&embedded[..1]);
    assert!(embedded[0].max_error > 1.0);
}

fn lgamma_with_flipped_sign(x: f64) -> (f64, i32) {
    let (value, sign) = lgamma_r(x);
    (value, -sign)
}

#[test]
fn sign_results_are_checked_unless_unbounded() {
    let bounded = FunctionDescriptor::new(
        "lgamma_r_flipped",
        "lgamma_r",
        Reference::UnaryTwoResultsInt(lgamma_with_flipped_sign),
        Shape::UnaryTwoResultsI,
    )
    .ulps(16.0, 16.0, 16.0);
    let reports = run_with(&HostDevice::new(), &wimpy_config(), &bounded);
    assert!(reports[0].failed());
    let failure = reports[0].failure.as_deref().unwrap();
    assert!(failure.contains("integer result mismatch"), "{failure}");

    let unbounded = bounded.ulps(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    assert_all_pass(&run_with(&HostDevice::new(), &wimpy_config(), &unbounded));
}

#[test]
fn pi_scaled_and_gamma_builtins_pass() {
    for name in ["acospi", "asinpi", "atanpi", "atan2pi", "lgamma", "lgamma_r"] {
        assert_all_pass(&run(name));
    }
}
