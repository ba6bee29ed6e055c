//! CPU side of the lab: `f64` reference math and the host-native builtins the
//! emulated device runs.

pub mod native;
pub mod reference;

pub use native::{lookup, moves_bits, Native};
