//! `wgpu` implementation of the device execution service.
//!
//! Kernels are the WGSL rendered by `mathbrute_kernels`, one shader module and
//! compute pipeline per vector width. Every logical queue shares the single
//! `wgpu::Queue`, whose submission order keeps each of them in order.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use mathbrute_core::device::{
    BufferHandle, BuildOptions, DeviceInfo, DeviceService, Event, KernelHandle, MemAccess,
    ProgramHandle, QueueHandle, ReadTicket,
};
use mathbrute_core::{BruteError, KernelSignature, KernelSource, Precision, Result};
use mathbrute_kernels::{wgsl_supports, WORKGROUP_SIZE};
use tracing::{debug, info};
use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindingResource, BufferBinding, BufferDescriptor,
    BufferUsages, CommandEncoderDescriptor, ComputePassDescriptor, ComputePipelineDescriptor,
    DeviceDescriptor, ErrorFilter, Features, Instance, Limits, Maintain, MapMode,
    PowerPreference, RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource,
    SubmissionIndex,
};

/// Whether a kernel of this signature lowers to WGSL.
pub fn kernel_supported(signature: &KernelSignature) -> bool {
    wgsl_supports(&signature.function, signature.form, signature.precision)
}

#[derive(Clone)]
struct Buffer {
    raw: Arc<wgpu::Buffer>,
    range: Range<u64>,
}

struct Program {
    /// `(entry point, pipeline)` per source.
    pipelines: Vec<(String, Arc<wgpu::ComputePipeline>)>,
}

#[derive(Clone)]
struct Kernel {
    entry_point: String,
    pipeline: Arc<wgpu::ComputePipeline>,
    args: Vec<Option<BufferHandle>>,
}

struct PendingRead {
    staging: wgpu::Buffer,
    mapped: mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>,
}

#[derive(Default)]
struct State {
    programs: HashMap<u64, Arc<Program>>,
    kernels: HashMap<u64, Kernel>,
    buffers: HashMap<u64, Buffer>,
    queues: HashSet<u64>,
    reads: HashMap<u64, PendingRead>,
    events: HashMap<u64, SubmissionIndex>,
}

pub struct WgpuDevice {
    adapter_info: wgpu::AdapterInfo,
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: Limits,
    next_id: AtomicU64,
    state: Mutex<State>,
}

impl WgpuDevice {
    /// Opens the default high-performance adapter.
    pub fn new() -> anyhow::Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> anyhow::Result<Self> {
        let instance = Instance::default();
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible GPU adapter found")?;
        let limits = Limits::downlevel_defaults().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("mathbrute device"),
                    required_features: Features::empty(),
                    required_limits: limits.clone(),
                    ..Default::default()
                },
                None,
            )
            .await
            .context("failed to request wgpu device")?;
        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "wgpu device ready"
        );
        Ok(Self {
            adapter_info,
            device,
            queue,
            limits,
            next_id: AtomicU64::new(1),
            state: Mutex::new(State::default()),
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn state(&self, call: &'static str) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BruteError::device(call, "wgpu device state lock poisoned"))
    }

    fn buffer(&self, call: &'static str, handle: BufferHandle) -> Result<Buffer> {
        self.state(call)?
            .buffers
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| BruteError::device(call, format!("unknown buffer {}", handle.0)))
    }

    fn check_queue(&self, call: &'static str, queue: QueueHandle) -> Result<()> {
        if self.state(call)?.queues.contains(&queue.0) {
            Ok(())
        } else {
            Err(BruteError::device(call, format!("unknown queue {}", queue.0)))
        }
    }

    fn record_event(&self, call: &'static str, submission: SubmissionIndex) -> Result<Event> {
        let id = self.next_id();
        self.state(call)?.events.insert(id, submission);
        Ok(Event(id))
    }

    fn wait_all(&self, call: &'static str) -> Result<()> {
        let _ = self.device.poll(Maintain::Wait);
        self.state(call)?.events.clear();
        Ok(())
    }

    /// Compiles one WGSL source, turning validation errors into a build log.
    fn compile(&self, source: &KernelSource) -> Result<wgpu::ComputePipeline> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&source.entry_point),
            source: ShaderSource::Wgsl(Cow::Borrowed(&source.text)),
        });
        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&source.entry_point),
                layout: None,
                module: &module,
                entry_point: Some(&source.entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(BruteError::Build {
                function: source.signature.function.clone(),
                log: format!("{err}\n{}", source.text),
            }),
            None => Ok(pipeline),
        }
    }

    fn storage_buffer(&self, label: &str, bytes: u64) -> wgpu::Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: bytes,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }
}

impl DeviceService for WgpuDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("{} ({:?})", self.adapter_info.name, self.adapter_info.backend),
            fp64: false,
            // WGSL lets implementations flush f32 subnormals.
            denormals: false,
            correctly_rounded_divide_sqrt: false,
            inf_nan_support: false,
            embedded_profile: false,
            max_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    fn supports(&self, signature: &KernelSignature) -> bool {
        kernel_supported(signature)
    }

    fn build_program(
        &self,
        sources: &[KernelSource],
        _options: &BuildOptions,
    ) -> Result<ProgramHandle> {
        let mut pipelines = Vec::with_capacity(sources.len());
        for source in sources {
            if source.signature.precision == Precision::Double {
                return Err(BruteError::Unsupported(format!(
                    "{} in double precision",
                    source.signature.function
                )));
            }
            let pipeline = self.compile(source)?;
            pipelines.push((source.entry_point.clone(), Arc::new(pipeline)));
        }
        let id = self.next_id();
        debug!(program = id, kernels = pipelines.len(), "wgpu program built");
        self.state("build_program")?
            .programs
            .insert(id, Arc::new(Program { pipelines }));
        Ok(ProgramHandle(id))
    }

    fn create_kernel(&self, program: ProgramHandle, entry_point: &str) -> Result<KernelHandle> {
        const CALL: &str = "create_kernel";
        let mut state = self.state(CALL)?;
        let program = state
            .programs
            .get(&program.0)
            .cloned()
            .ok_or_else(|| BruteError::device(CALL, format!("unknown program {}", program.0)))?;
        let pipeline = program
            .pipelines
            .iter()
            .find(|(name, _)| name == entry_point)
            .map(|(_, pipeline)| Arc::clone(pipeline))
            .ok_or_else(|| BruteError::device(CALL, format!("no kernel named `{entry_point}`")))?;
        let id = self.next_id();
        state.kernels.insert(
            id,
            Kernel {
                entry_point: entry_point.to_string(),
                pipeline,
                args: Vec::new(),
            },
        );
        Ok(KernelHandle(id))
    }

    fn create_buffer(&self, _access: MemAccess, bytes: usize) -> Result<BufferHandle> {
        let bytes = bytes as u64;
        if bytes > self.limits.max_buffer_size {
            return Err(BruteError::device(
                "create_buffer",
                format!("{bytes} bytes exceed the adapter limit {}", self.limits.max_buffer_size),
            ));
        }
        let raw = self.storage_buffer("mathbrute buffer", bytes);
        let id = self.next_id();
        self.state("create_buffer")?.buffers.insert(
            id,
            Buffer {
                raw: Arc::new(raw),
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
        let start = parent.range.start + range.start as u64;
        let end = parent.range.start + range.end as u64;
        if range.start > range.end || end > parent.range.end {
            return Err(BruteError::device(CALL, format!("range {range:?} exceeds its parent")));
        }
        let alignment = u64::from(self.limits.min_storage_buffer_offset_alignment);
        if start % alignment != 0 {
            return Err(BruteError::device(
                CALL,
                format!("offset {start} is not a multiple of {alignment}"),
            ));
        }
        let id = self.next_id();
        self.state(CALL)?.buffers.insert(
            id,
            Buffer {
                raw: parent.raw,
                range: start..end,
            },
        );
        Ok(BufferHandle(id))
    }

    fn create_queue(&self) -> Result<QueueHandle> {
        let id = self.next_id();
        self.state("create_queue")?.queues.insert(id);
        Ok(QueueHandle(id))
    }

    fn enqueue_write(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        blocking: bool,
        data: &[u8],
    ) -> Result<Event> {
        const CALL: &str = "enqueue_write";
        self.check_queue(CALL, queue)?;
        let buffer = self.buffer(CALL, buffer)?;
        if data.len() as u64 > buffer.range.end - buffer.range.start {
            return Err(BruteError::device(CALL, "write overruns the buffer"));
        }
        self.queue.write_buffer(&buffer.raw, buffer.range.start, data);
        let submission = self.queue.submit(None);
        if blocking {
            self.wait_all(CALL)?;
        }
        self.record_event(CALL, submission)
    }

    fn enqueue_fill(&self, queue: QueueHandle, buffer: BufferHandle, pattern: u32) -> Result<Event> {
        const CALL: &str = "enqueue_fill";
        self.check_queue(CALL, queue)?;
        let buffer = self.buffer(CALL, buffer)?;
        let words = ((buffer.range.end - buffer.range.start) / 4) as usize;
        let fill: Vec<u8> = pattern.to_le_bytes().repeat(words);
        self.queue.write_buffer(&buffer.raw, buffer.range.start, &fill);
        let submission = self.queue.submit(None);
        self.record_event(CALL, submission)
    }

    fn enqueue_map_read(
        &self,
        queue: QueueHandle,
        buffer: BufferHandle,
        blocking: bool,
    ) -> Result<ReadTicket> {
        const CALL: &str = "enqueue_map_read";
        self.check_queue(CALL, queue)?;
        let buffer = self.buffer(CALL, buffer)?;
        let size = buffer.range.end - buffer.range.start;
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("mathbrute staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(CALL) });
        encoder.copy_buffer_to_buffer(&buffer.raw, buffer.range.start, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let (sender, mapped) = mpsc::channel();
        staging.slice(..).map_async(MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        if blocking {
            self.wait_all(CALL)?;
        }
        let id = self.next_id();
        self.state(CALL)?
            .reads
            .insert(id, PendingRead { staging, mapped });
        Ok(ReadTicket(id))
    }

    fn collect(&self, ticket: ReadTicket) -> Result<Vec<u8>> {
        const CALL: &str = "collect";
        let read = self
            .state(CALL)?
            .reads
            .remove(&ticket.0)
            .ok_or_else(|| BruteError::device(CALL, format!("unknown read {}", ticket.0)))?;
        let mapped = match read.mapped.try_recv() {
            Ok(result) => result,
            Err(_) => {
                self.wait_all(CALL)?;
                read.mapped
                    .recv()
                    .map_err(|_| BruteError::device(CALL, "map callback dropped"))?
            }
        };
        mapped.map_err(|err| BruteError::device(CALL, err.to_string()))?;
        let bytes = read.staging.slice(..).get_mapped_range().to_vec();
        read.staging.unmap();
        Ok(bytes)
    }

    fn enqueue_read(&self, queue: QueueHandle, buffer: BufferHandle) -> Result<Vec<u8>> {
        let ticket = self.enqueue_map_read(queue, buffer, true)?;
        self.collect(ticket)
    }

    fn set_kernel_arg(&self, kernel: KernelHandle, index: u32, buffer: BufferHandle) -> Result<()> {
        const CALL: &str = "set_kernel_arg";
        let mut state = self.state(CALL)?;
        if !state.buffers.contains_key(&buffer.0) {
            return Err(BruteError::device(CALL, format!("unknown buffer {}", buffer.0)));
        }
        let kernel = state
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
            .state(CALL)?
            .kernels
            .get(&kernel.0)
            .cloned()
            .ok_or_else(|| BruteError::device(CALL, format!("unknown kernel {}", kernel.0)))?;
        let workgroups = (global_work_items as u64).div_ceil(u64::from(WORKGROUP_SIZE));
        if workgroups > u64::from(self.limits.max_compute_workgroups_per_dimension) {
            return Err(BruteError::device(
                CALL,
                format!("{workgroups} workgroups exceed the adapter limit"),
            ));
        }

        let mut buffers = Vec::with_capacity(kernel.args.len());
        for arg in &kernel.args {
            let handle = arg.ok_or_else(|| {
                BruteError::device(CALL, format!("`{}` launched with arguments unset", kernel.entry_point))
            })?;
            buffers.push(self.buffer(CALL, handle)?);
        }
        let entries: Vec<BindGroupEntry<'_>> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| BindGroupEntry {
                binding: binding as u32,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &buffer.raw,
                    offset: buffer.range.start,
                    size: wgpu::BufferSize::new(buffer.range.end - buffer.range.start),
                }),
            })
            .collect();
        let layout = kernel.pipeline.get_bind_group_layout(0);
        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(&kernel.entry_point),
            layout: &layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(CALL) });
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor::default());
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroups as u32, 1, 1);
        }
        let submission = self.queue.submit(Some(encoder.finish()));
        self.record_event(CALL, submission)
    }

    fn flush(&self, queue: QueueHandle) -> Result<()> {
        self.check_queue("flush", queue)?;
        let _ = self.device.poll(Maintain::Poll);
        Ok(())
    }

    fn finish(&self, queue: QueueHandle) -> Result<()> {
        self.check_queue("finish", queue)?;
        self.wait_all("finish")
    }

    fn wait_for_events(&self, events: &[Event]) -> Result<()> {
        const CALL: &str = "wait_for_events";
        let pending: Vec<SubmissionIndex> = {
            let mut state = self.state(CALL)?;
            events
                .iter()
                .filter_map(|event| state.events.remove(&event.0))
                .collect()
        };
        for submission in pending {
            let _ = self
                .device
                .poll(Maintain::WaitForSubmissionIndex(submission));
        }
        Ok(())
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        if let Ok(mut state) = self.state("release_buffer") {
            state.buffers.remove(&buffer.0);
        }
    }

    fn release_kernel(&self, kernel: KernelHandle) {
        if let Ok(mut state) = self.state("release_kernel") {
            state.kernels.remove(&kernel.0);
        }
    }

    fn release_program(&self, program: ProgramHandle) {
        if let Ok(mut state) = self.state("release_program") {
            state.programs.remove(&program.0);
        }
    }

    fn release_queue(&self, queue: QueueHandle) {
        if let Ok(mut state) = self.state("release_queue") {
            state.queues.remove(&queue.0);
        }
    }
}
