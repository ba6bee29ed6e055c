//! Per-shape test drivers and the job engine they share.
//!
//! Every shape is a [`ShapeLogic`]: how inputs are chosen, how the reference is
//! evaluated for one element, and how device outputs for one element are judged.
//! [`run_shape`] turns that into a full run over the partitioned domain.

mod binary;
mod mad;
mod macros;
mod ternary;
mod two_results;
mod unary;

use std::io::Write as _;
use std::sync::{Mutex, PoisonError};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info};

use crate::column::Column;
use crate::config::RunConfig;
use crate::device::{BuildOptions, DeviceInfo, DeviceService};
use crate::error::{BruteError, Result};
use crate::function::{FunctionDescriptor, Reference, Shape};
use crate::partition::{double_from_u32, Partition};
use crate::pool::WorkerPool;
use crate::reference::{evaluate_indexed, Expected};
use crate::report::{FunctionReport, Outcome};
use crate::runner::{DeviceRunner, RunnerSpec};
use crate::special::{random_bits, SpecialGrid};
use crate::verify::{Failure, Mismatch, Verdict, Verifier, WorstCase};
use crate::{ElementType, KernelSignature, Precision};

/// Repetitions per width when timing kernels; the fastest is kept.
const TIMING_REPETITIONS: usize = 3;

pub type DriverFn = fn(&FunctionDescriptor, &TestContext<'_>) -> Result<FunctionReport>;

/// Single- and double-precision drivers of one shape.
pub struct VTable {
    pub name: &'static str,
    pub float: DriverFn,
    pub double: DriverFn,
}

impl Shape {
    pub fn vtable(self) -> &'static VTable {
        match self {
            Shape::Unary => &unary::UNARY,
            Shape::IntUnary => &unary::I_UNARY,
            Shape::UnaryU => &unary::UNARY_U,
            Shape::MacroUnary => &macros::MACRO_UNARY,
            Shape::Binary => &binary::BINARY,
            Shape::BinaryOperator => &binary::BINARY_OPERATOR,
            Shape::BinaryI => &binary::BINARY_I,
            Shape::MacroBinary => &macros::MACRO_BINARY,
            Shape::Ternary => &ternary::TERNARY,
            Shape::UnaryTwoResults => &two_results::UNARY_TWO_RESULTS,
            Shape::UnaryTwoResultsI => &two_results::UNARY_TWO_RESULTS_I,
            Shape::BinaryTwoResultsI => &two_results::BINARY_TWO_RESULTS_I,
            Shape::Mad => &mad::MAD,
        }
    }
}

/// Everything a driver needs besides the descriptor.
#[derive(Clone)]
pub struct TestContext<'a> {
    pub device: &'a dyn DeviceService,
    pub info: DeviceInfo,
    pub config: &'a RunConfig,
    pub pool: &'a WorkerPool,
    /// Fast-relaxed-math mode for this run.
    pub relaxed: bool,
}

impl<'a> TestContext<'a> {
    pub fn new(device: &'a dyn DeviceService, config: &'a RunConfig, pool: &'a WorkerPool) -> Self {
        Self {
            device,
            info: device.info(),
            config,
            pool,
            relaxed: false,
        }
    }

    pub fn with_relaxed(&self) -> Self {
        Self {
            relaxed: true,
            ..self.clone()
        }
    }
}

/// Runs every applicable mode of one function: float, relaxed float, double.
pub fn run_function(desc: &FunctionDescriptor, ctx: &TestContext<'_>) -> Result<Vec<FunctionReport>> {
    desc.validate()?;
    let vtable = desc.shape.vtable();
    debug!(function = desc.name, shape = vtable.name, "dispatching");
    let mut reports = vec![(vtable.float)(desc, ctx)?];
    if desc.relaxed && ctx.config.relaxed && ctx.config.test_float {
        reports.push((vtable.float)(desc, &ctx.with_relaxed())?);
    }
    reports.push((vtable.double)(desc, ctx)?);
    Ok(reports)
}

/// Where a shape's inputs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputPlan {
    /// Strided walk over the 32-bit domain.
    Strided,
    /// Special-value grid, then seeded random bits.
    Special,
}

/// Shared, read-only state handed to [`ShapeLogic::check`].
pub(crate) struct CheckCx<'a> {
    pub verifier: &'a Verifier,
    pub reference: Reference,
    pub precision: Precision,
}

impl CheckCx<'_> {
    /// Float check of one output lane, mapped to a worst-case error or a failure.
    pub fn float(
        &self,
        operands: &[f64],
        test_bits: u64,
        reference: f64,
        overflow: bool,
        retry: &dyn Fn(&[f64]) -> f64,
    ) -> std::result::Result<f64, Failure> {
        match self
            .verifier
            .check_float(operands, test_bits, reference, overflow, retry)
        {
            Verdict::Pass(err) => Ok(err),
            Verdict::Fail(err) => Err(Failure::float(self.precision, err, reference, test_bits)),
        }
    }
}

pub(crate) trait ShapeLogic: Sync {
    fn input_plan(&self) -> InputPlan;

    fn expected(
        &self,
        reference: &Reference,
        precision: Precision,
        inputs: &[Column],
        j: usize,
    ) -> Expected;

    /// Judges element `j` of one width's outputs; `Ok` carries the error to record.
    fn check(
        &self,
        cx: &CheckCx<'_>,
        inputs: &[Column],
        j: usize,
        expected: &Expected,
        outputs: &[Column],
        width: usize,
    ) -> std::result::Result<f64, Failure>;

    /// Shapes that only exercise the device return `false`.
    fn verifies(&self) -> bool {
        true
    }
}

pub(crate) fn float_driver<S: ShapeLogic + Default>(
    desc: &FunctionDescriptor,
    ctx: &TestContext<'_>,
) -> Result<FunctionReport> {
    run_shape(&S::default(), desc, ctx, Precision::Single)
}

pub(crate) fn double_driver<S: ShapeLogic + Default>(
    desc: &FunctionDescriptor,
    ctx: &TestContext<'_>,
) -> Result<FunctionReport> {
    run_shape(&S::default(), desc, ctx, Precision::Double)
}

fn skip_reason(
    desc: &FunctionDescriptor,
    ctx: &TestContext<'_>,
    precision: Precision,
) -> Option<&'static str> {
    let config = ctx.config;
    match precision {
        Precision::Single if !config.test_float => return Some("float testing disabled"),
        Precision::Double if !config.test_double => return Some("double testing disabled"),
        Precision::Double if !desc.has_double => return Some("no double variant"),
        Precision::Double if !ctx.info.fp64 => return Some("device lacks fp64"),
        _ => {}
    }
    if desc.correctly_rounded && !ctx.info.correctly_rounded_divide_sqrt {
        return Some("device lacks correctly rounded divide and sqrt");
    }
    let unsupported = config.vector_widths().iter().any(|&width| {
        !ctx.device.supports(&KernelSignature {
            function: desc.name_in_code.to_string(),
            form: desc.call_form(),
            precision,
            width,
        })
    });
    if unsupported {
        return Some("kernel not supported by device");
    }
    None
}

/// Writes the inputs of `job` into `inputs`.
pub(crate) fn fill_inputs(
    plan: InputPlan,
    job: usize,
    partition: &Partition,
    grid: &SpecialGrid,
    seed: u64,
    bound: Option<f64>,
    inputs: &mut [Column],
) {
    let elements = partition.buffer_elements;
    match plan {
        InputPlan::Strided => {
            for column in inputs.iter_mut() {
                for j in 0..elements {
                    let bits = partition.input_bits(job, j);
                    match column.element_type() {
                        ElementType::F64 | ElementType::U64 | ElementType::I64 => {
                            column.set_bits(j, double_from_u32(bits))
                        }
                        _ => column.set_bits(j, u64::from(bits)),
                    }
                }
            }
        }
        InputPlan::Special => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(job as u64);
            let mut entry = vec![0u64; inputs.len()];
            let in_grid = job <= grid.last_special_job();
            for j in 0..elements {
                if in_grid && grid.entry(job, j, &mut entry) {
                    for (column, &bits) in inputs.iter_mut().zip(&entry) {
                        column.set_bits(j, bits);
                    }
                } else {
                    for column in inputs.iter_mut() {
                        let ty = column.element_type();
                        column.set_bits(j, random_bits(&mut rng, ty));
                    }
                }
            }
        }
    }
    if let (Some(bound), Some(first)) = (bound, inputs.first_mut()) {
        if first.element_type().is_float() {
            for j in 0..elements {
                if first.float(j).abs() > bound {
                    first.set_float(j, f64::NAN);
                }
            }
        }
    }
}

fn describe_inputs(inputs: &[Column], j: usize) -> Vec<String> {
    inputs.iter().map(|column| column.describe(j)).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| BruteError::device("worst_case", "worker state lock poisoned"))
}

fn print_progress(config: &RunConfig, partition: &Partition, job: usize, ulps: f64, threads: usize) {
    let mut out = std::io::stdout().lock();
    if config.verbose {
        let _ = writeln!(
            out,
            "base:{:14} step:{:10} scale:{:10} buf_elements:{:10} ulps:{:5.3} ThreadCount:{:2}",
            partition.job_base(job),
            partition.step,
            partition.scale,
            partition.buffer_elements,
            ulps,
            threads
        );
    } else {
        let _ = write!(out, ".");
    }
    let _ = out.flush();
}

/// Runs one shape over the whole domain at `precision`.
pub(crate) fn run_shape(
    logic: &dyn ShapeLogic,
    desc: &FunctionDescriptor,
    ctx: &TestContext<'_>,
    precision: Precision,
) -> Result<FunctionReport> {
    let config = ctx.config;
    let relaxed = ctx.relaxed;
    if let Some(reason) = skip_reason(desc, ctx, precision) {
        info!(function = desc.name, precision = precision.label(), reason, "skipped");
        return Ok(FunctionReport::skipped(desc.name, precision, relaxed, reason));
    }

    let form = desc.call_form();
    let widths = config.vector_widths();
    let partition = Partition::new(config, precision.float_type().size())?;
    let spec = RunnerSpec {
        function: desc.name_in_code,
        form,
        precision,
        widths,
        options: BuildOptions {
            denorms_are_zero: precision == Precision::Single && (config.force_ftz || desc.ftz),
            correctly_rounded_divide_sqrt: desc.correctly_rounded
                || config.correctly_rounded_divide_sqrt,
            fast_relaxed_math: relaxed,
        },
        workers: ctx.pool.threads(),
    };
    let runner = DeviceRunner::build(ctx.device, &spec, &partition).map_err(|err| match err {
        BruteError::Build { log, .. } => BruteError::Build {
            function: desc.name.to_string(),
            log,
        },
        other => other,
    })?;

    let verifier = Verifier::new(desc, config, &ctx.info, precision, relaxed);
    let reference = desc.reference_for(precision, relaxed);
    let input_types = form.input_types(precision);
    let grid = SpecialGrid::new(&input_types, partition.buffer_elements);
    let bound = if relaxed {
        desc.relaxed_rule.input_bound()
    } else {
        None
    };
    let cx = CheckCx {
        verifier: &verifier,
        reference,
        precision,
    };
    let worst: Vec<Mutex<WorstCase>> = (0..ctx.pool.threads())
        .map(|_| Mutex::new(WorstCase::default()))
        .collect();

    info!(
        function = desc.name,
        precision = precision.label(),
        relaxed,
        ftz = verifier.ftz,
        ulps = verifier.ulps,
        jobs = partition.job_count,
        "testing"
    );

    let new_inputs = |job: usize| {
        let mut inputs: Vec<Column> = input_types
            .iter()
            .map(|&ty| Column::zeroed(ty, partition.buffer_elements))
            .collect();
        fill_inputs(
            logic.input_plan(),
            job,
            &partition,
            &grid,
            config.seed,
            bound,
            &mut inputs,
        );
        inputs
    };

    let result = ctx.pool.parallel_for(partition.job_count, |job, worker| {
        let inputs = new_inputs(job);
        runner.run_job(worker, &inputs)?;
        if config.skip_correctness {
            return runner.finish(worker);
        }

        let mut expected = vec![Expected::default(); partition.buffer_elements];
        if logic.verifies() {
            evaluate_indexed(ctx.pool, &mut expected, |j| {
                logic.expected(&reference, precision, &inputs, j)
            });
        }
        let outputs = runner.read_outputs(worker)?;

        if logic.verifies() {
            let mut worst = lock(&worst[worker])?;
            for (j, expected) in expected.iter().enumerate() {
                for (per_width, &width) in outputs.iter().zip(widths) {
                    match logic.check(&cx, &inputs, j, expected, per_width, width) {
                        Ok(err) => worst.record(err, || describe_inputs(&inputs, j)),
                        Err(failure) => {
                            worst.record(failure.error, || describe_inputs(&inputs, j));
                            return Err(Mismatch {
                                function: desc.name.to_string(),
                                precision,
                                width,
                                inputs: describe_inputs(&inputs, j),
                                failure,
                            }
                            .into());
                        }
                    }
                }
            }
        }

        if partition.reports_progress(job) {
            print_progress(config, &partition, job, verifier.ulps, ctx.pool.threads());
        }
        Ok(())
    });
    if !config.verbose {
        println!();
    }

    let mut total = WorstCase::default();
    for slot in worst {
        total.merge(&slot.into_inner().unwrap_or_else(PoisonError::into_inner));
    }

    let mut report = match result {
        Ok(()) => {
            let outcome = if config.wimpy {
                Outcome::WimpPassed
            } else {
                Outcome::Passed
            };
            FunctionReport::new(desc.name, precision, relaxed, outcome).with_worst(&total)
        }
        Err(BruteError::Verification(mismatch)) => {
            error!(function = desc.name, "{mismatch}");
            let mut report = FunctionReport::new(desc.name, precision, relaxed, Outcome::Failed)
                .with_worst(&total);
            report.failure = Some(mismatch.to_string());
            return Ok(report);
        }
        Err(err) => return Err(err),
    };

    if config.measure_times {
        report.timings = runner.time_kernels(0, &new_inputs(0), TIMING_REPETITIONS)?;
        for timing in &report.timings {
            info!(
                function = desc.name,
                width = timing.width,
                ns_per_element = timing.ns_per_element,
                "timing"
            );
        }
    }
    info!(
        function = desc.name,
        precision = precision.label(),
        max_error = report.max_error,
        "passed"
    );
    Ok(report)
}
