//! Brute-force verification of device math builtins against a host reference.
//!
//! The crate is backend independent: a [`DeviceService`] compiles and runs the
//! kernels, everything else (domain partitioning, reference evaluation, error
//! metrics and the relaxation ladder) lives here.

pub mod column;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod function;
pub mod hexfloat;
pub mod partition;
pub mod pool;
pub mod reference;
pub mod report;
pub mod runner;
pub mod special;
pub mod subnormal;
pub mod ulp;
pub mod verify;

pub use mathbrute_kernels::{
    render_kernel, size_name, CallForm, ElementType, KernelSignature, KernelSource, Precision,
    VECTOR_WIDTHS,
};

pub use column::Column;
pub use config::RunConfig;
pub use device::{
    BufferHandle, BuildOptions, DeviceInfo, DeviceService, Event, KernelHandle, MemAccess,
    ProgramHandle, QueueHandle, ReadTicket,
};
pub use driver::{run_function, TestContext};
pub use error::{BruteError, Result};
pub use function::{FunctionDescriptor, RangeLimit, Reference, RelaxedRule, Shape};
pub use pool::WorkerPool;
pub use report::{FunctionReport, Outcome, WidthTiming};
pub use verify::Mismatch;
