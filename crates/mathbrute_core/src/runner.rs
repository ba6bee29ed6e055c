//! Device half of a function run: kernels, per-worker queues and buffers, dispatch
//! and read-back.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::column::Column;
use crate::device::{BufferHandle, BuildOptions, DeviceService, KernelHandle, MemAccess};
use crate::device::{ProgramHandle, QueueHandle};
use crate::error::{BruteError, Result};
use crate::partition::Partition;
use crate::report::WidthTiming;
use crate::{render_kernel, CallForm, KernelSignature, Precision};

/// Written over every output before dispatch so stale results never verify.
pub const OUTPUT_PATTERN: u32 = 0xffff_dead;

/// Resources owned by one worker: its queue, sub-buffers and kernel instances.
struct Slot {
    queue: QueueHandle,
    inputs: Vec<BufferHandle>,
    /// `[width][output]`
    outputs: Vec<Vec<BufferHandle>>,
    /// One per width; arguments are bound per slot.
    kernels: Vec<KernelHandle>,
}

/// What to build for a run.
#[derive(Debug, Clone)]
pub struct RunnerSpec<'a> {
    pub function: &'a str,
    pub form: CallForm,
    pub precision: Precision,
    pub widths: &'a [usize],
    pub options: BuildOptions,
    pub workers: usize,
}

/// Owns every device resource of a run and releases them on drop.
pub struct DeviceRunner<'d> {
    device: &'d dyn DeviceService,
    program: ProgramHandle,
    signatures: Vec<KernelSignature>,
    buffer_elements: usize,
    parents: Vec<BufferHandle>,
    slots: Vec<Slot>,
}

impl<'d> DeviceRunner<'d> {
    pub fn build(
        device: &'d dyn DeviceService,
        spec: &RunnerSpec<'_>,
        partition: &Partition,
    ) -> Result<Self> {
        let sources: Vec<_> = spec
            .widths
            .iter()
            .map(|&width| render_kernel(spec.function, spec.form, spec.precision, width))
            .collect();
        let program = device.build_program(&sources, &spec.options)?;
        debug!(
            function = spec.function,
            kernels = sources.len(),
            "program built"
        );
        let mut runner = Self {
            device,
            program,
            signatures: sources.iter().map(|s| s.signature.clone()).collect(),
            buffer_elements: partition.buffer_elements,
            parents: Vec::new(),
            slots: Vec::new(),
        };

        let Some(first) = runner.signatures.first().cloned() else {
            return Err(BruteError::Config("no vector widths selected".into()));
        };
        let slot_count = spec.workers.min(partition.thread_slots);
        let input_parents = runner.allocate(&first.input_types(), partition, MemAccess::ReadOnly)?;
        let mut output_parents = Vec::new();
        for signature in runner.signatures.clone() {
            output_parents.push(runner.allocate(
                &signature.output_types(),
                partition,
                MemAccess::ReadWrite,
            )?);
        }

        for slot in 0..slot_count {
            let queue = device.create_queue()?;
            runner.slots.push(Slot {
                queue,
                inputs: Vec::new(),
                outputs: Vec::new(),
                kernels: Vec::new(),
            });
            let inputs =
                runner.sub_buffers(&input_parents, &first.input_types(), slot, MemAccess::ReadOnly)?;
            runner.slots[slot].inputs = inputs;
            for (w_idx, signature) in runner.signatures.clone().iter().enumerate() {
                let outputs = runner.sub_buffers(
                    &output_parents[w_idx],
                    &signature.output_types(),
                    slot,
                    MemAccess::ReadWrite,
                )?;
                runner.slots[slot].outputs.push(outputs);
                let kernel = device.create_kernel(program, &signature.entry_point())?;
                runner.slots[slot].kernels.push(kernel);
            }
        }
        Ok(runner)
    }

    fn allocate(
        &mut self,
        types: &[crate::ElementType],
        partition: &Partition,
        access: MemAccess,
    ) -> Result<Vec<BufferHandle>> {
        let mut handles = Vec::with_capacity(types.len());
        for ty in types {
            let bytes = partition.sub_buffer_bytes(ty.size()) * partition.thread_slots;
            let handle = self.device.create_buffer(access, bytes)?;
            self.parents.push(handle);
            handles.push(handle);
        }
        Ok(handles)
    }

    fn sub_buffers(
        &self,
        parents: &[BufferHandle],
        types: &[crate::ElementType],
        slot: usize,
        access: MemAccess,
    ) -> Result<Vec<BufferHandle>> {
        parents
            .iter()
            .zip(types)
            .map(|(&parent, ty)| {
                let bytes = self.buffer_elements * ty.size();
                self.device
                    .create_sub_buffer(parent, access, slot * bytes..(slot + 1) * bytes)
            })
            .collect()
    }

    pub fn buffer_elements(&self) -> usize {
        self.buffer_elements
    }

    pub fn widths(&self) -> impl Iterator<Item = usize> + '_ {
        self.signatures.iter().map(|s| s.width)
    }

    fn slot(&self, slot: usize) -> Result<&Slot> {
        self.slots
            .get(slot)
            .ok_or_else(|| BruteError::device("run_job", format!("no resources for worker {slot}")))
    }

    fn bind(&self, slot: &Slot, w_idx: usize) -> Result<KernelHandle> {
        let kernel = slot.kernels[w_idx];
        let args = slot.outputs[w_idx].iter().chain(&slot.inputs);
        for (index, &buffer) in args.enumerate() {
            self.device.set_kernel_arg(kernel, index as u32, buffer)?;
        }
        Ok(kernel)
    }

    /// Writes a job's inputs and enqueues every width's kernel on the worker's queue.
    pub fn run_job(&self, slot: usize, inputs: &[Column]) -> Result<()> {
        let resources = self.slot(slot)?;
        for (&buffer, column) in resources.inputs.iter().zip(inputs) {
            self.device
                .enqueue_write(resources.queue, buffer, false, column.bytes())?;
        }
        for (w_idx, signature) in self.signatures.iter().enumerate() {
            for &output in &resources.outputs[w_idx] {
                self.device
                    .enqueue_fill(resources.queue, output, OUTPUT_PATTERN)?;
            }
            let kernel = self.bind(resources, w_idx)?;
            let work_items = self.buffer_elements.div_ceil(signature.width);
            self.device
                .enqueue_nd_range(resources.queue, kernel, work_items)?;
        }
        self.device.flush(resources.queue)
    }

    pub fn finish(&self, slot: usize) -> Result<()> {
        self.device.finish(self.slot(slot)?.queue)
    }

    /// Maps every output back, `[width][output]`. Only the final map blocks; the
    /// in-order queue guarantees the earlier ones are complete by then.
    pub fn read_outputs(&self, slot: usize) -> Result<Vec<Vec<Column>>> {
        let resources = self.slot(slot)?;
        let total: usize = resources.outputs.iter().map(Vec::len).sum();
        let mut tickets = Vec::with_capacity(total);
        let mut issued = 0;
        for buffers in &resources.outputs {
            for &buffer in buffers {
                issued += 1;
                tickets.push(self.device.enqueue_map_read(
                    resources.queue,
                    buffer,
                    issued == total,
                )?);
            }
        }

        let mut tickets = tickets.into_iter();
        let mut results = Vec::with_capacity(self.signatures.len());
        for signature in &self.signatures {
            let mut columns = Vec::new();
            for ty in signature.output_types() {
                let ticket = tickets
                    .next()
                    .ok_or_else(|| BruteError::device("enqueue_map_read", "missing read"))?;
                let bytes = self.device.collect(ticket)?;
                let mut column = Column::zeroed(ty, self.buffer_elements);
                if bytes.len() != column.bytes().len() {
                    return Err(BruteError::device(
                        "collect",
                        format!(
                            "read {} bytes, expected {}",
                            bytes.len(),
                            column.bytes().len()
                        ),
                    ));
                }
                column.bytes_mut().copy_from_slice(&bytes);
                columns.push(column);
            }
            results.push(columns);
        }
        Ok(results)
    }

    /// Best-of-`repetitions` kernel time per width over one full sub-buffer.
    pub fn time_kernels(
        &self,
        slot: usize,
        inputs: &[Column],
        repetitions: usize,
    ) -> Result<Vec<WidthTiming>> {
        let resources = self.slot(slot)?;
        for (&buffer, column) in resources.inputs.iter().zip(inputs) {
            self.device
                .enqueue_write(resources.queue, buffer, true, column.bytes())?;
        }
        self.device.finish(resources.queue)?;

        let mut timings = Vec::with_capacity(self.signatures.len());
        for (w_idx, signature) in self.signatures.iter().enumerate() {
            let kernel = self.bind(resources, w_idx)?;
            let work_items = self.buffer_elements.div_ceil(signature.width);
            let mut best = Duration::MAX;
            for _ in 0..repetitions.max(1) {
                let start = Instant::now();
                let event = self
                    .device
                    .enqueue_nd_range(resources.queue, kernel, work_items)?;
                self.device.flush(resources.queue)?;
                self.device.wait_for_events(&[event])?;
                best = best.min(start.elapsed());
            }
            timings.push(WidthTiming {
                width: signature.width,
                ns_per_element: best.as_nanos() as f64 / self.buffer_elements as f64,
            });
        }
        Ok(timings)
    }
}

impl Drop for DeviceRunner<'_> {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            for kernel in slot.kernels {
                self.device.release_kernel(kernel);
            }
            for buffer in slot.outputs.into_iter().flatten().chain(slot.inputs) {
                self.device.release_buffer(buffer);
            }
            self.device.release_queue(slot.queue);
        }
        for buffer in self.parents.drain(..) {
            self.device.release_buffer(buffer);
        }
        self.device.release_program(self.program);
    }
}
