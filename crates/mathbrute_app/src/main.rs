//! `mathbrute`: brute-force accuracy runs of the builtin table on a host or wgpu device.

use std::{
    env, fs,
    path::PathBuf,
    process::ExitCode,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use mathbrute_core::{
    report::to_json, run_function, DeviceService, FunctionDescriptor, FunctionReport, RunConfig,
    TestContext, WorkerPool,
};
use mathbrute_gpu::WgpuDevice;
use reference_lab::{find_function, HostDevice, FUNCTIONS};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Host,
    Wgpu,
}

struct CliOptions {
    device: DeviceKind,
    functions: Vec<String>,
    config_json: Option<PathBuf>,
    export_json: Option<PathBuf>,
    list: bool,
    overrides: Vec<Override>,
}

/// A flag that adjusts the run configuration after `--config=` is applied.
enum Override {
    Threads(usize),
    Seed(u64),
    Wimpy,
    WimpyFactor(u32),
    Embedded,
    Ftz,
    NoRelaxed,
    NoFloat,
    NoDouble,
    SkipCorrectness,
    MeasureTimes,
    VectorSize(usize),
    Verbose,
    StopOnError,
    CorrectlyRounded,
}

fn main() -> Result<ExitCode> {
    let options = parse_options()?;

    if options.list {
        for desc in FUNCTIONS {
            println!("{:<16} {:?}", desc.name, desc.shape);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = build_config(&options)?;
    init_tracing(config.verbose);

    let selected = select_functions(&options.functions)?;
    let device: Box<dyn DeviceService> = match options.device {
        DeviceKind::Host => Box::new(HostDevice::new()),
        DeviceKind::Wgpu => Box::new(WgpuDevice::new().context("failed to open a wgpu device")?),
    };
    let device_info = device.info();
    println!(
        "Device: {} (fp64={}, denormals={}, correctly rounded divide/sqrt={})",
        device_info.name,
        device_info.fp64,
        device_info.denormals,
        device_info.correctly_rounded_divide_sqrt
    );
    println!(
        "Testing {} functions (threads={}, seed=0x{:X}{})",
        selected.len(),
        config.thread_count,
        config.seed,
        if config.wimpy { ", wimpy" } else { "" }
    );

    let pool = WorkerPool::new(config.thread_count).context("failed to start worker pool")?;
    let ctx = TestContext::new(device.as_ref(), &config, &pool);

    let mut reports: Vec<FunctionReport> = Vec::new();
    let mut failures = 0usize;
    for desc in selected {
        let function_reports = run_function(desc, &ctx)
            .with_context(|| format!("testing {} aborted", desc.name))?;
        let mut failed = false;
        for report in &function_reports {
            println!("{}", report.summary_line());
            if let Some(failure) = &report.failure {
                println!("{failure}");
                failed = true;
            }
        }
        reports.extend(function_reports);
        if failed {
            failures += 1;
            if config.stop_on_error {
                warn!(function = desc.name, "stopping after first failure");
                break;
            }
        }
    }

    if let Some(ref path) = options.export_json {
        let json = to_json(&reports)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Exported {} reports to {}", reports.len(), path.display());
    }

    if failures > 0 {
        println!("FAILED {failures} function(s)");
        Ok(ExitCode::FAILURE)
    } else {
        info!(reports = reports.len(), "run complete");
        println!("PASSED");
        Ok(ExitCode::SUCCESS)
    }
}

fn parse_options() -> Result<CliOptions> {
    let mut opts = CliOptions {
        device: DeviceKind::Host,
        functions: Vec::new(),
        config_json: None,
        export_json: None,
        list: false,
        overrides: Vec::new(),
    };

    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--device=") {
            opts.device = match value {
                "host" => DeviceKind::Host,
                "wgpu" => DeviceKind::Wgpu,
                other => bail!("invalid --device value: {other} (expected host or wgpu)"),
            };
        } else if let Some(value) = arg.strip_prefix("--function=") {
            opts.functions.push(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--threads=") {
            let threads = value.parse().context("invalid --threads value")?;
            opts.overrides.push(Override::Threads(threads));
        } else if let Some(value) = arg.strip_prefix("--seed=") {
            let seed = parse_seed(value).context("invalid --seed value")?;
            opts.overrides.push(Override::Seed(seed));
        } else if let Some(value) = arg.strip_prefix("--wimpy-factor=") {
            let factor = value.parse().context("invalid --wimpy-factor value")?;
            opts.overrides.push(Override::WimpyFactor(factor));
        } else if let Some(value) = arg.strip_prefix("--vector-size=") {
            let width = value.parse().context("invalid --vector-size value")?;
            opts.overrides.push(Override::VectorSize(width));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            opts.config_json = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--export-json=") {
            opts.export_json = Some(PathBuf::from(value));
        } else if arg == "--list" {
            opts.list = true;
        } else if let Some(flag) = switch(&arg) {
            opts.overrides.push(flag);
        } else if arg.starts_with("--") {
            bail!("unrecognized argument: {arg}");
        } else {
            opts.functions.push(arg);
        }
    }

    Ok(opts)
}

fn switch(arg: &str) -> Option<Override> {
    Some(match arg {
        "--wimpy" => Override::Wimpy,
        "--embedded" => Override::Embedded,
        "--ftz" => Override::Ftz,
        "--no-relaxed" => Override::NoRelaxed,
        "--no-float" => Override::NoFloat,
        "--no-double" => Override::NoDouble,
        "--skip-correctness" => Override::SkipCorrectness,
        "--measure-times" => Override::MeasureTimes,
        "--verbose" => Override::Verbose,
        "--stop-on-error" => Override::StopOnError,
        "--correctly-rounded" => Override::CorrectlyRounded,
        _ => return None,
    })
}

fn parse_seed(value: &str) -> Result<u64> {
    let seed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => value.parse()?,
    };
    Ok(seed)
}

/// Seeds a run that was given none from the wall clock; the seed is printed so it can be replayed.
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

fn build_config(options: &CliOptions) -> Result<RunConfig> {
    let mut config = match options.config_json {
        Some(ref path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            RunConfig::from_json(&text)
                .with_context(|| format!("invalid run configuration in {}", path.display()))?
        }
        None => RunConfig {
            seed: clock_seed(),
            ..RunConfig::default()
        },
    };

    for flag in &options.overrides {
        match *flag {
            Override::Threads(threads) => config.thread_count = threads,
            Override::Seed(seed) => config.seed = seed,
            Override::Wimpy => config.wimpy = true,
            Override::WimpyFactor(factor) => config.wimpy_reduction_factor = factor,
            Override::Embedded => config.embedded = true,
            Override::Ftz => config.force_ftz = true,
            Override::NoRelaxed => config.relaxed = false,
            Override::NoFloat => config.test_float = false,
            Override::NoDouble => config.test_double = false,
            Override::SkipCorrectness => config.skip_correctness = true,
            Override::MeasureTimes => config.measure_times = true,
            Override::VectorSize(width) => config = config.with_only_width(width)?,
            Override::Verbose => config.verbose = true,
            Override::StopOnError => config.stop_on_error = true,
            Override::CorrectlyRounded => config.correctly_rounded_divide_sqrt = true,
        }
    }

    config.validate()?;
    Ok(config)
}

fn select_functions(names: &[String]) -> Result<Vec<&'static FunctionDescriptor>> {
    if names.is_empty() {
        return Ok(FUNCTIONS.iter().collect());
    }
    names
        .iter()
        .map(|name| find_function(name).with_context(|| format!("unknown function: {name}")))
        .collect()
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    // A subscriber installed earlier (tests, embedding) stays in charge.
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}
