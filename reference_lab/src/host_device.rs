//! A device that runs every kernel on the host with the native builtins.
//!
//! Queues execute synchronously, so every enqueue has completed by the time it
//! returns. Buffers are plain byte vectors; sub-buffers are windows into their
//! parent's storage.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use mathbrute_core::device::{
    BufferHandle, BuildOptions, DeviceInfo, DeviceService, Event, KernelHandle, MemAccess,
    ProgramHandle, QueueHandle, ReadTicket,
};
use mathbrute_core::{BruteError, Column, KernelSignature, KernelSource, Precision, Result};
use tracing::debug;

use crate::cpu::{lookup, moves_bits, Native};

#[derive(Clone)]
struct Buffer {
    storage: Arc<Mutex<Vec<u8>>>,
    range: Range<usize>,
}

#[derive(Clone)]
struct Kernel {
    signature: KernelSignature,
    native: Native,
    flush: bool,
    args: Vec<Option<BufferHandle>>,
}

struct Program {
    kernels: Vec<(KernelSignature, Native)>,
    flush: bool,
}

#[derive(Default)]
struct Tables {
    programs: HashMap<u64, Arc<Program>>,
    kernels: HashMap<u64, Kernel>,
    buffers: HashMap<u64, Buffer>,
    queues: HashSet<u64>,
    reads: HashMap<u64, Vec<u8>>,
}

/// Host-native implementation of [`DeviceService`].
pub struct HostDevice {
    flush_denormals: bool,
    embedded_profile: bool,
    next_id: AtomicU64,
    tables: Mutex<Tables>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDevice {
    pub fn new() -> Self {
        Self::with_flush_denormals(false)
    }

    /// A device that flushes single-precision subnormal inputs and results to zero.
    pub fn with_flush_denormals(flush_denormals: bool) -> Self {
        Self {
            flush_denormals,
            embedded_profile: false,
            next_id: AtomicU64::new(1),
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Reports the device as an embedded profile, which selects the looser bounds.
    pub fn embedded(mut self, embedded_profile: bool) -> Self {
        self.embedded_profile = embedded_profile;
        self
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn tables(&self, call: &'static str) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| BruteError::device(call, "host device state lock poisoned"))
    }

    fn buffer(&self, call: &'static str, handle: BufferHandle) -> Result<Buffer> {
        self.tables(call)?
            .buffers
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| BruteError::device(call, format!("unknown buffer {}", handle.0)))
    }

    fn check_queue(&self, call: &'static str, queue: QueueHandle) -> Result<()> {
        if self.tables(call)?.queues.contains(&queue.0) {
            Ok(())
        } else {
            Err(BruteError::device(call, format!("unknown queue {}", queue.0)))
        }
    }

    fn event(&self) -> Event {
        Event(self.next_id())
    }

    fn read_bytes(call: &'static str, buffer: &Buffer) -> Result<Vec<u8>> {
        let storage = buffer
            .storage
            .lock()
            .map_err(|_| BruteError::device(call, "buffer lock poisoned"))?;
        Ok(storage[buffer.range.clone()].to_vec())
    }

    fn write_bytes(call: &'static str, buffer: &Buffer, data: &[u8]) -> Result<()> {
        if data.len() > buffer.range.len() {
            return Err(BruteError::device(
                call,
                format!("{} bytes do not fit a {}-byte buffer", data.len(), buffer.range.len()),
            ));
        }
        let mut storage = buffer
            .storage
            .lock()
            .map_err(|_| BruteError::device(call, "buffer lock poisoned"))?;
        let start = buffer.range.start;
        storage[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn execute(&self, kernel: &Kernel, work_items: usize) -> Result<()> {
        const CALL: &str = "enqueue_nd_range";
        let signature = &kernel.signature;
        let output_types = signature.output_types();
        let input_types = signature.input_types();
        let types: Vec<_> = output_types.iter().chain(&input_types).copied().collect();
        if kernel.args.len() < types.len() {
            return Err(BruteError::device(CALL, "kernel launched with arguments unset"));
        }

        let mut buffers = Vec::with_capacity(types.len());
        for arg in &kernel.args[..types.len()] {
            let handle =
                arg.ok_or_else(|| BruteError::device(CALL, "kernel launched with arguments unset"))?;
            buffers.push(self.buffer(CALL, handle)?);
        }
        let elements = buffers
            .iter()
            .zip(&types)
            .map(|(buffer, ty)| buffer.range.len() / ty.size())
            .fold(work_items * signature.width, usize::min);

        let (output_buffers, input_buffers) = buffers.split_at(output_types.len());
        let mut inputs = Vec::with_capacity(input_types.len());
        for (buffer, &ty) in input_buffers.iter().zip(&input_types) {
            let mut column = Column::zeroed(ty, elements);
            let bytes = Self::read_bytes(CALL, buffer)?;
            let len = column.bytes().len();
            column.bytes_mut().copy_from_slice(&bytes[..len]);
            inputs.push(column);
        }
        let mut outputs: Vec<Column> = output_types
            .iter()
            .map(|&ty| Column::zeroed(ty, elements))
            .collect();

        let lanes = Lanes {
            precision: signature.precision,
            flush: kernel.flush,
            truth: if signature.width > 1 { -1 } else { 1 },
        };
        for j in 0..elements {
            lanes.run(&kernel.native, &inputs, &mut outputs, j);
        }

        for (buffer, column) in output_buffers.iter().zip(&outputs) {
            Self::write_bytes(CALL, buffer, column.bytes())?;
        }
        Ok(())
    }
}

/// Per-kernel evaluation state for one element at a time.
struct Lanes {
    precision: Precision,
    flush: bool,
    /// Value of a true relational result: `1` for scalars, all bits set for vectors.
    truth: i64,
}

fn flush32(x: f32) -> f32 {
    if x.is_subnormal() {
        0.0f32.copysign(x)
    } else {
        x
    }
}

impl Lanes {
    fn f32_at(&self, column: &Column, j: usize) -> f32 {
        let x = f32::from_bits(column.bits(j) as u32);
        if self.flush {
            flush32(x)
        } else {
            x
        }
    }

    fn f64_at(column: &Column, j: usize) -> f64 {
        f64::from_bits(column.bits(j))
    }

    fn put32(&self, column: &mut Column, j: usize, value: f32) {
        let value = if self.flush { flush32(value) } else { value };
        column.set_bits(j, u64::from(value.to_bits()));
    }

    fn put64(column: &mut Column, j: usize, value: f64) {
        column.set_bits(j, value.to_bits());
    }

    fn put_int(column: &mut Column, j: usize, value: i64) {
        column.set_bits(j, value as u64);
    }

    fn put_truth(&self, column: &mut Column, j: usize, truth: bool) {
        Self::put_int(column, j, if truth { self.truth } else { 0 });
    }

    fn run(&self, native: &Native, inputs: &[Column], outputs: &mut [Column], j: usize) {
        let single = self.precision == Precision::Single;
        let x32 = |k: usize| self.f32_at(&inputs[k], j);
        let x64 = |k: usize| Self::f64_at(&inputs[k], j);
        match *native {
            Native::Unary(f, g) => {
                if single {
                    self.put32(&mut outputs[0], j, f(x32(0)));
                } else {
                    Self::put64(&mut outputs[0], j, g(x64(0)));
                }
            }
            Native::UnaryToInt(f, g) => {
                let n = if single { f(x32(0)) } else { g(x64(0)) };
                Self::put_int(&mut outputs[0], j, i64::from(n));
            }
            Native::UnaryFromUInt(f, g) => {
                if single {
                    self.put32(&mut outputs[0], j, f(inputs[0].bits(j) as u32));
                } else {
                    Self::put64(&mut outputs[0], j, g(inputs[0].bits(j)));
                }
            }
            Native::Predicate(f, g) => {
                let truth = if single { f(x32(0)) } else { g(x64(0)) };
                self.put_truth(&mut outputs[0], j, truth);
            }
            Native::Binary(f, g) => {
                if single {
                    self.put32(&mut outputs[0], j, f(x32(0), x32(1)));
                } else {
                    Self::put64(&mut outputs[0], j, g(x64(0), x64(1)));
                }
            }
            Native::BinaryWithInt(f, g) => {
                let n = inputs[1].int(j) as i32;
                if single {
                    self.put32(&mut outputs[0], j, f(x32(0), n));
                } else {
                    Self::put64(&mut outputs[0], j, g(x64(0), n));
                }
            }
            Native::BinaryPredicate(f, g) => {
                let truth = if single {
                    f(x32(0), x32(1))
                } else {
                    g(x64(0), x64(1))
                };
                self.put_truth(&mut outputs[0], j, truth);
            }
            Native::Ternary(f, g) => {
                if single {
                    self.put32(&mut outputs[0], j, f(x32(0), x32(1), x32(2)));
                } else {
                    Self::put64(&mut outputs[0], j, g(x64(0), x64(1), x64(2)));
                }
            }
            Native::UnaryTwoResults(f, g) => {
                if single {
                    let (a, b) = f(x32(0));
                    self.put32(&mut outputs[0], j, a);
                    self.put32(&mut outputs[1], j, b);
                } else {
                    let (a, b) = g(x64(0));
                    Self::put64(&mut outputs[0], j, a);
                    Self::put64(&mut outputs[1], j, b);
                }
            }
            Native::UnaryTwoResultsInt(f, g) => {
                let n = if single {
                    let (a, n) = f(x32(0));
                    self.put32(&mut outputs[0], j, a);
                    n
                } else {
                    let (a, n) = g(x64(0));
                    Self::put64(&mut outputs[0], j, a);
                    n
                };
                Self::put_int(&mut outputs[1], j, i64::from(n));
            }
            Native::BinaryTwoResultsInt(f, g) => {
                let n = if single {
                    let (a, n) = f(x32(0), x32(1));
                    self.put32(&mut outputs[0], j, a);
                    n
                } else {
                    let (a, n) = g(x64(0), x64(1));
                    Self::put64(&mut outputs[0], j, a);
                    n
                };
                Self::put_int(&mut outputs[1], j, i64::from(n));
            }
        }
    }
}

impl DeviceService for HostDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "host reference device".to_string(),
            fp64: true,
            denormals: !self.flush_denormals,
            correctly_rounded_divide_sqrt: true,
            inf_nan_support: true,
            embedded_profile: self.embedded_profile,
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    fn supports(&self, signature: &KernelSignature) -> bool {
        lookup(&signature.function, signature.form).is_some()
    }

    fn build_program(
        &self,
        sources: &[KernelSource],
        options: &BuildOptions,
    ) -> Result<ProgramHandle> {
        let mut kernels = Vec::with_capacity(sources.len());
        for source in sources {
            let signature = &source.signature;
            let native = lookup(&signature.function, signature.form).ok_or_else(|| {
                BruteError::Build {
                    function: signature.function.clone(),
                    log: format!(
                        "{}: error: no host builtin `{}` callable as {:?}",
                        source.entry_point, signature.function, signature.form
                    ),
                }
            })?;
            kernels.push((signature.clone(), native));
        }
        let program = Program {
            kernels,
            flush: self.flush_denormals || options.denorms_are_zero,
        };
        let id = self.next_id();
        debug!(
            program = id,
            kernels = program.kernels.len(),
            flush = program.flush,
            "host program built"
        );
        self.tables("build_program")?
            .programs
            .insert(id, Arc::new(program));
        Ok(ProgramHandle(id))
    }

    fn create_kernel(&self, program: ProgramHandle, entry_point: &str) -> Result<KernelHandle> {
        const CALL: &str = "create_kernel";
        let mut tables = self.tables(CALL)?;
        let program = tables
            .programs
            .get(&program.0)
            .cloned()
            .ok_or_else(|| BruteError::device(CALL, format!("unknown program {}", program.0)))?;
        let (signature, native) = program
            .kernels
            .iter()
            .find(|(signature, _)| signature.entry_point() == entry_point)
            .cloned()
            .ok_or_else(|| BruteError::device(CALL, format!("no kernel named `{entry_point}`")))?;
        let flush = program.flush && !moves_bits(&signature.function);
        let id = self.next_id();
        tables.kernels.insert(
            id,
            Kernel {
                signature,
                native,
                flush,
                args: Vec::new(),
            },
        );
        Ok(KernelHandle(id))
    }

    fn create_buffer(&self, _access: MemAccess, bytes: usize) -> Result<BufferHandle> {
        let id = self.next_id();
        self.tables("create_buffer")?.buffers.insert(
            id,
            Buffer {
                storage: Arc::new(Mutex::new(vec![0; bytes])),
                range: 0..bytes,
            },
        );
        Ok(BufferHandle(id))
    }

    fn create_sub_buffer(
        &self,
        parent: BufferHandle,
        _access: MemAccess,
        range: Range<usize>,
    ) -> Result<BufferHandle> {
        const CALL: &str = "create_sub_buffer";
        let parent = self.buffer(CALL, parent)?;
        if range.start > range.end || range.end > parent.range.len() {
            return Err(BruteError::device(
                CALL,
                format!(
                    "range {range:?} exceeds a {}-byte parent",
                    parent.range.len()
                ),
            ));
        }
        let start = parent.range.start + range.start;
        let id = self.next_id();
        self.tables(CALL)?.buffers.insert(
            id,
            Buffer {
                storage: parent.storage,
                range: start..start + range.len(),
            },
        );
        Ok(BufferHandle(id))
    }

    fn create_queue(&self) -> Result<QueueHandle> {
        let id = self.next_id();
        self.tables("create_queue")?.queues.insert(id);
        Ok(QueueHandle(id))
    }

    fn enqueue_write(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        _blocking: bool,
        data: &[u8],
    ) -> Result<Event> {
        const CALL: &str = "enqueue_write";
        self.check_queue(CALL, queue)?;
        Self::write_bytes(CALL, &self.buffer(CALL, buffer)?, data)?;
        Ok(self.event())
    }

    fn enqueue_fill(&self, queue: QueueHandle, buffer: BufferHandle, pattern: u32) -> Result<Event> {
        const CALL: &str = "enqueue_fill";
        self.check_queue(CALL, queue)?;
        let buffer = self.buffer(CALL, buffer)?;
        let fill: Vec<u8> = pattern
            .to_le_bytes()
            .into_iter()
            .cycle()
            .take(buffer.range.len())
            .collect();
        Self::write_bytes(CALL, &buffer, &fill)?;
        Ok(self.event())
    }

    fn enqueue_map_read(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        _blocking: bool,
    ) -> Result<ReadTicket> {
        const CALL: &str = "enqueue_map_read";
        self.check_queue(CALL, queue)?;
        let bytes = Self::read_bytes(CALL, &self.buffer(CALL, buffer)?)?;
        let id = self.next_id();
        self.tables(CALL)?.reads.insert(id, bytes);
        Ok(ReadTicket(id))
    }

    fn collect(&self, ticket: ReadTicket) -> Result<Vec<u8>> {
        self.tables("collect")?
            .reads
            .remove(&ticket.0)
            .ok_or_else(|| BruteError::device("collect", format!("unknown read {}", ticket.0)))
    }

    fn enqueue_read(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<Vec<u8>> {
        const CALL: &str = "enqueue_read";
        self.check_queue(CALL, queue)?;
        Self::read_bytes(CALL, &self.buffer(CALL, buffer)?)
    }

    fn set_kernel_arg(&self, kernel: KernelHandle, index: u32, buffer: BufferHandle) -> Result<()> {
        const CALL: &str = "set_kernel_arg";
        let mut tables = self.tables(CALL)?;
        if !tables.buffers.contains_key(&buffer.0) {
            return Err(BruteError::device(CALL, format!("unknown buffer {}", buffer.0)));
        }
        let kernel = tables
            .kernels
            .get_mut(&kernel.0)
            .ok_or_else(|| BruteError::device(CALL, format!("unknown kernel {}", kernel.0)))?;
        let index = index as usize;
        if kernel.args.len() <= index {
            kernel.args.resize(index + 1, None);
        }
        kernel.args[index] = Some(buffer);
        Ok(())
    }

    fn enqueue_nd_range(
        &self,
        queue: QueueHandle,
        kernel: KernelHandle,
        global_work_items: usize,
    ) -> Result<Event> {
        const CALL: &str = "enqueue_nd_range";
        self.check_queue(CALL, queue)?;
        let kernel = self
            .tables(CALL)?
            .kernels
            .get(&kernel.0)
            .cloned()
            .ok_or_else(|| BruteError::device(CALL, format!("unknown kernel {}", kernel.0)))?;
        self.execute(&kernel, global_work_items)?;
        Ok(self.event())
    }

    fn flush(&self, queue: QueueHandle) -> Result<()> {
        self.check_queue("flush", queue)
    }

    fn finish(&self, queue: QueueHandle) -> Result<()> {
        self.check_queue("finish", queue)
    }

    fn wait_for_events(&self, _events: &[Event]) -> Result<()> {
        Ok(())
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        if let Ok(mut tables) = self.tables("release_buffer") {
            tables.buffers.remove(&buffer.0);
        }
    }

    fn release_kernel(&self, kernel: KernelHandle) {
        if let Ok(mut tables) = self.tables("release_kernel") {
            tables.kernels.remove(&kernel.0);
        }
    }

    fn release_program(&self, program: ProgramHandle) {
        if let Ok(mut tables) = self.tables("release_program") {
            tables.programs.remove(&program.0);
        }
    }

    fn release_queue(&self, queue: QueueHandle) {
        if let Ok(mut tables) = self.tables("release_queue") {
            tables.queues.remove(&queue.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathbrute_core::{render_kernel, CallForm, ElementType};

    fn column(ty: ElementType, bytes: &[u8]) -> Column {
        let mut column = Column::zeroed(ty, bytes.len() / ty.size());
        column.bytes_mut().copy_from_slice(bytes);
        column
    }

    fn launch(
        device: &HostDevice,
        source: &KernelSource,
        options: BuildOptions,
        inputs: &[Column],
    ) -> Vec<Column> {
        let program = device.build_program(std::slice::from_ref(source), &options).unwrap();
        let kernel = device.create_kernel(program, &source.entry_point).unwrap();
        let queue = device.create_queue().unwrap();
        let elements = inputs[0].len();
        let mut index = 0;
        let mut outputs = Vec::new();
        for ty in source.signature.output_types() {
            let buffer = device.create_buffer(MemAccess::ReadWrite, elements * ty.size()).unwrap();
            device.set_kernel_arg(kernel, index, buffer).unwrap();
            index += 1;
            outputs.push((ty, buffer));
        }
        for input in inputs {
            let buffer = device
                .create_buffer(MemAccess::ReadOnly, input.bytes().len())
                .unwrap();
            device.enqueue_write(queue, buffer, true, input.bytes()).unwrap();
            device.set_kernel_arg(kernel, index, buffer).unwrap();
            index += 1;
        }
        let work_items = elements.div_ceil(source.signature.width);
        device.enqueue_nd_range(queue, kernel, work_items).unwrap();
        outputs
            .into_iter()
            .map(|(ty, buffer)| column(ty, &device.enqueue_read(queue, buffer).unwrap()))
            .collect()
    }

    #[test]
    fn runs_a_binary_operator() {
        let device = HostDevice::new();
        let source = render_kernel("+", CallForm::BinaryOperator, Precision::Single, 4);
        let x = Column::F32(vec![1.0, 2.0, -3.0, 0.5]);
        let y = Column::F32(vec![1.0, 0.25, 3.0, f32::INFINITY]);
        let out = launch(&device, &source, BuildOptions::default(), &[x, y]);
        assert_eq!(out[0], Column::F32(vec![2.0, 2.25, 0.0, f32::INFINITY]));
    }

    #[test]
    fn vector_relationals_return_all_bits_set() {
        let device = HostDevice::new();
        let x = Column::F32(vec![f32::NAN, 1.0]);
        let scalar = render_kernel("isnan", CallForm::Predicate, Precision::Single, 1);
        let out = launch(&device, &scalar, BuildOptions::default(), &[x.clone()]);
        assert_eq!(out[0], Column::I32(vec![1, 0]));

        let vector = render_kernel("isnan", CallForm::Predicate, Precision::Single, 2);
        let out = launch(&device, &vector, BuildOptions::default(), &[x]);
        assert_eq!(out[0], Column::I32(vec![-1, 0]));

        let wide = render_kernel("isnan", CallForm::Predicate, Precision::Double, 2);
        let out = launch(&device, &wide, BuildOptions::default(), &[Column::F64(vec![1.0, f64::NAN])]);
        assert_eq!(out[0], Column::I64(vec![0, -1]));
    }

    #[test]
    fn denorms_are_zero_flushes_inputs_and_results() {
        let device = HostDevice::new();
        let source = render_kernel("*", CallForm::BinaryOperator, Precision::Single, 1);
        let x = Column::U32(vec![0x8000_0001, 0x3f80_0000]);
        let x = column(ElementType::F32, x.bytes());
        let one = Column::F32(vec![1.0, 1.0]);
        let kept = launch(&device, &source, BuildOptions::default(), &[x.clone(), one.clone()]);
        assert_eq!(kept[0].bits(0), 0x8000_0001);

        let options = BuildOptions {
            denorms_are_zero: true,
            ..BuildOptions::default()
        };
        let flushed = launch(&device, &source, options, &[x, one]);
        assert_eq!(flushed[0].bits(0), 0x8000_0000);
        assert_eq!(flushed[0].bits(1), 0x3f80_0000);
    }

    #[test]
    fn bit_moving_builtins_keep_subnormals_when_flushing() {
        let device = HostDevice::with_flush_denormals(true);
        let source = render_kernel("select", CallForm::Ternary, Precision::Single, 1);
        let tiny = column(ElementType::F32, Column::U32(vec![0x0000_0001, 0x8000_0003]).bytes());
        let other = Column::F32(vec![2.0, 2.0]);
        let pick_first = Column::F32(vec![0.0, 0.0]);
        let out = launch(&device, &source, BuildOptions::default(), &[tiny, other, pick_first]);
        assert_eq!(out[0].bits(0), 0x0000_0001);
        assert_eq!(out[0].bits(1), 0x8000_0003);

        let fabs = render_kernel("fabs", CallForm::Unary, Precision::Single, 1);
        let x = column(ElementType::F32, Column::U32(vec![0x8000_0001]).bytes());
        assert_eq!(launch(&device, &fabs, BuildOptions::default(), &[x])[0].bits(0), 1);
    }

    #[test]
    fn two_result_builtins_fill_both_outputs() {
        let device = HostDevice::new();
        let source = render_kernel("frexp", CallForm::UnaryTwoResultsInt, Precision::Single, 1);
        let out = launch(&device, &source, BuildOptions::default(), &[Column::F32(vec![8.0])]);
        assert_eq!(out[0], Column::F32(vec![0.5]));
        assert_eq!(out[1], Column::I32(vec![4]));
    }

    #[test]
    fn unknown_builtins_fail_to_build_with_a_log() {
        let device = HostDevice::new();
        let source = render_kernel("tgamma", CallForm::Unary, Precision::Single, 1);
        assert!(!device.supports(&source.signature));
        match device.build_program(&[source], &BuildOptions::default()) {
            Err(BruteError::Build { function, log }) => {
                assert_eq!(function, "tgamma");
                assert!(log.contains("tgamma"));
            }
            other => panic!("expected a build failure, got {:?}", other.map(|p| p.0)),
        }
    }

    #[test]
    fn sub_buffers_share_their_parent() {
        let device = HostDevice::new();
        let queue = device.create_queue().unwrap();
        let parent = device.create_buffer(MemAccess::ReadWrite, 16).unwrap();
        let upper = device
            .create_sub_buffer(parent, MemAccess::ReadWrite, 8..16)
            .unwrap();
        device.enqueue_fill(queue, upper, 0xffff_dead).unwrap();
        let words = column(ElementType::U32, &device.enqueue_read(queue, parent).unwrap());
        assert_eq!(words, Column::U32(vec![0, 0, 0xffff_dead, 0xffff_dead]));
        assert!(device
            .create_sub_buffer(parent, MemAccess::ReadWrite, 8..24)
            .is_err());

        let ticket = device.enqueue_map_read(queue, upper, true).unwrap();
        assert_eq!(device.collect(ticket).unwrap().len(), 8);
        assert!(device.collect(ticket).is_err(), "tickets redeem once");
    }
}
