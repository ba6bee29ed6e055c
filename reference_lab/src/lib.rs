//! Reference Lab: the builtin table, its `f64` references and a host device that
//! runs kernels natively so the harness can be exercised without a GPU.

#[path = "../cpu/mod.rs"]
pub mod cpu;

pub mod functions;
pub mod host_device;

pub use functions::{find_function, FUNCTIONS};
pub use host_device::HostDevice;
