//! The device execution service consumed by the runner.
//!
//! Implementations must be callable from every worker at once: all methods take
//! `&self`, and each worker only touches the queue, kernels and sub-buffers it created.

use std::ops::Range;

use serde::Serialize;

use crate::error::Result;
use crate::{KernelSignature, KernelSource};

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);
        )*
    };
}

handle!(
    ProgramHandle,
    KernelHandle,
    BufferHandle,
    /// An in-order command queue.
    QueueHandle,
    Event,
    /// A pending mapped read, redeemed with [`DeviceService::collect`].
    ReadTicket,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Capabilities reported by a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub fp64: bool,
    /// Single-precision subnormals are preserved on input and output.
    pub denormals: bool,
    pub correctly_rounded_divide_sqrt: bool,
    pub inf_nan_support: bool,
    pub embedded_profile: bool,
    pub max_threads: usize,
}

/// Program build switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub denorms_are_zero: bool,
    pub correctly_rounded_divide_sqrt: bool,
    pub fast_relaxed_math: bool,
}

pub trait DeviceService: Send + Sync {
    fn info(&self) -> DeviceInfo;

    /// Whether a kernel of this signature can be built at all.
    fn supports(&self, _signature: &KernelSignature) -> bool {
        true
    }

    /// Builds every source into one program; failures carry the compiler log.
    fn build_program(&self, sources: &[KernelSource], options: &BuildOptions)
        -> Result<ProgramHandle>;

    fn create_kernel(&self, program: ProgramHandle, entry_point: &str) -> Result<KernelHandle>;

    fn create_buffer(&self, access: MemAccess, bytes: usize) -> Result<BufferHandle>;

    fn create_sub_buffer(
        &self,
        parent: BufferHandle,
        access: MemAccess,
        range: Range<usize>,
    ) -> Result<BufferHandle>;

    fn create_queue(&self) -> Result<QueueHandle>;

    fn enqueue_write(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        blocking: bool,
        data: &[u8],
    ) -> Result<Event>;

    /// Fills `buffer` with a repeated 32-bit pattern.
    fn enqueue_fill(&self, queue: QueueHandle, buffer: BufferHandle, pattern: u32)
        -> Result<Event>;

    /// Maps `buffer` for reading. A non-blocking map completes when the queue reaches it.
    fn enqueue_map_read(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        blocking: bool,
    ) -> Result<ReadTicket>;

    /// Waits for a mapped read and returns its bytes, unmapping the buffer.
    fn collect(&self, ticket: ReadTicket) -> Result<Vec<u8>>;

    /// Blocking read of the whole buffer.
    fn enqueue_read(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<Vec<u8>>;

    fn set_kernel_arg(&self, kernel: KernelHandle, index: u32, buffer: BufferHandle)
        -> Result<()>;

    /// Launches `global_work_items` invocations of `kernel`.
    fn enqueue_nd_range(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        global_work_items: usize,
    ) -> Result<Event>;

    fn flush(&self, queue: QueueHandle) -> Result<()>;

    fn finish(&self, queue: QueueHandle) -> Result<()>;

    fn wait_for_events(&self, events: &[Event]) -> Result<()>;

    fn release_buffer(&self, buffer: BufferHandle);

    fn release_kernel(&self, kernel: KernelHandle);

    fn release_program(&self, program: ProgramHandle);

    fn release_queue(&self, queue: QueueHandle);
}
