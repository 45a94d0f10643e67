/// Mock device and frame backend for unit tests (no GPU required)
///
/// Buffers keep their bytes in a `Vec`, images track their layout, command
/// lists record one string per command and the frame backend simulates
/// fences so the orchestrator protocol can be checked step by step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::renderer::{
    AcquireOutcome, Buffer, BufferDesc, BufferUsage, CommandList, Extent2D, FrameBackend,
    GraphicsDevice, Image, ImageAspect, ImageDesc, ImageLayout, IndexType, MemoryLocation,
    Pipeline, PipelineDesc, PipelineLayout, PipelineLayoutDesc, PresentOutcome, Rect2D,
    RenderPassSignature, SampleCount, SamplerDesc, ShaderBinary, ShaderStage, TextureFormat,
    Viewport, SPIRV_MAGIC, validate_copy, validate_image_copy,
};

/// Signature used by the mock render pass
pub fn mock_signature() -> RenderPassSignature {
    RenderPassSignature {
        color_format: TextureFormat::B8G8R8A8_SRGB,
        depth_format: Some(TextureFormat::D32_SFLOAT),
        samples: SampleCount::S1,
    }
}

/// Smallest module `ShaderBinary` accepts: the magic word plus a zeroed header
pub fn mock_shader(label: &str) -> ShaderBinary {
    let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0u8; 16]);
    ShaderBinary::from_bytes(label, &bytes).expect("valid mock SPIR-V")
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub data: Vec<u8>,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
    pub mapped: bool,
    live: Arc<AtomicUsize>,
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn location(&self) -> MemoryLocation {
        self.location
    }

    fn map(&mut self) -> Result<&mut [u8]> {
        if !self.location.is_host_visible() {
            return Err(Error::InvalidAccess("Cannot map a GpuOnly buffer".to_string()));
        }
        self.mapped = true;
        Ok(&mut self.data)
    }

    fn unmap(&mut self) {
        self.mapped = false;
    }

    fn copy_from(&mut self, src: &dyn Buffer, size: u64) -> Result<()> {
        validate_copy(src, &*self, size)?;
        let src = unsafe { &*(src as *const dyn Buffer as *const MockBuffer) };
        self.data[..size as usize].copy_from_slice(&src.data[..size as usize]);
        Ok(())
    }
}

// ============================================================================
// Mock Image
// ============================================================================

pub struct MockImage {
    pub desc: ImageDesc,
    pub layout: ImageLayout,
    pub pixels: Vec<u8>,
    pub view_aspect: Option<ImageAspect>,
    pub sampler: Option<SamplerDesc>,
    pub transitions: Vec<(ImageLayout, ImageLayout)>,
}

impl Image for MockImage {
    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn format(&self) -> TextureFormat {
        self.desc.format
    }

    fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }

    fn layout(&self) -> ImageLayout {
        self.layout
    }

    fn create_view(&mut self, aspect: ImageAspect) -> Result<()> {
        self.view_aspect = Some(aspect);
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<()> {
        self.sampler = Some(*desc);
        Ok(())
    }

    fn has_sampler(&self) -> bool {
        self.sampler.is_some()
    }

    fn transition_layout(&mut self, new_layout: ImageLayout) -> Result<()> {
        let transition = self.layout.transition_to(new_layout)?;
        self.transitions.push((transition.old_layout(), transition.new_layout()));
        self.layout = new_layout;
        Ok(())
    }

    fn copy_from_buffer(&mut self, buffer: &dyn Buffer) -> Result<()> {
        validate_image_copy(&*self, buffer)?;
        let src = unsafe { &*(buffer as *const dyn Buffer as *const MockBuffer) };
        self.pixels = src.data.clone();
        Ok(())
    }
}

// ============================================================================
// Mock Pipeline
// ============================================================================

pub struct MockPipelineLayout {
    pub desc: PipelineLayoutDesc,
}

impl PipelineLayout for MockPipelineLayout {
    fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

pub struct MockPipeline {
    pub signature: RenderPassSignature,
    pub layout: Arc<dyn PipelineLayout>,
    pub subpass: u32,
    pub dynamic_viewport: bool,
    pub name: String,
}

impl Pipeline for MockPipeline {
    fn signature(&self) -> &RenderPassSignature {
        &self.signature
    }

    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }

    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn has_dynamic_viewport(&self) -> bool {
        self.dynamic_viewport
    }
}

// ============================================================================
// Mock Device
// ============================================================================

#[derive(Default)]
pub struct MockDevice {
    /// Buffers currently alive
    pub live_buffers: Arc<AtomicUsize>,
    /// Buffers created since construction
    pub buffers_created: AtomicUsize,
    pub layouts_created: AtomicUsize,
    pub pipelines_created: AtomicUsize,
    /// Allocations above this size fail with `OutOfMemory`
    pub memory_limit: Option<u64>,
    /// Description passed to the most recent `create_pipeline`
    pub last_pipeline: Mutex<Option<PipelineDesc>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(limit: u64) -> Self {
        Self { memory_limit: Some(limit), ..Self::default() }
    }

    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.load(Ordering::SeqCst)
    }
}

impl GraphicsDevice for MockDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn Buffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("Buffer size is zero".to_string()));
        }
        if self.memory_limit.is_some_and(|limit| desc.size > limit) {
            return Err(Error::OutOfMemory);
        }
        self.buffers_created.fetch_add(1, Ordering::SeqCst);
        self.live_buffers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockBuffer {
            data: vec![0; desc.size as usize],
            usage: desc.usage,
            location: desc.location,
            mapped: false,
            live: self.live_buffers.clone(),
        }))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Box<dyn Image>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("Image has zero area".to_string()));
        }
        Ok(Box::new(MockImage {
            desc: *desc,
            layout: ImageLayout::Undefined,
            pixels: Vec::new(),
            view_aspect: Some(desc.format.aspect()),
            sampler: None,
            transitions: Vec::new(),
        }))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        self.layouts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPipelineLayout { desc: desc.clone() }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        self.pipelines_created.fetch_add(1, Ordering::SeqCst);
        *self.last_pipeline.lock().unwrap() = Some(desc.clone());
        Ok(Arc::new(MockPipeline {
            signature: desc.signature,
            layout: desc.layout.clone(),
            subpass: desc.subpass,
            dynamic_viewport: desc.viewport.is_none(),
            name: desc.vertex_shader.label().to_string(),
        }))
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Mock Command List
// ============================================================================

pub struct MockCommandList {
    pub signature: RenderPassSignature,
    pub commands: Vec<String>,
    bound_pipeline: Option<Arc<dyn Pipeline>>,
    index_bound: bool,
}

impl MockCommandList {
    pub fn new(signature: RenderPassSignature) -> Self {
        Self {
            signature,
            commands: Vec::new(),
            bound_pipeline: None,
            index_bound: false,
        }
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.starts_with("draw")).count()
    }
}

impl CommandList for MockCommandList {
    fn render_pass_signature(&self) -> &RenderPassSignature {
        &self.signature
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands.push(format!("set_scissor {}x{}", scissor.width, scissor.height));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        if !pipeline.signature().is_compatible_with(&self.signature) {
            return Err(Error::InvalidAccess("Pipeline incompatible with render pass".to_string()));
        }
        self.bound_pipeline = Some(pipeline.clone());
        self.commands.push("bind_pipeline".to_string());
        Ok(())
    }

    fn push_constants(&mut self, stages: &[ShaderStage], offset: u32, data: &[u8]) -> Result<()> {
        let pipeline = self.bound_pipeline.as_ref().ok_or_else(|| {
            Error::InvalidAccess("push_constants without a bound pipeline".to_string())
        })?;
        let covered = pipeline.layout().desc().push_constant_ranges.iter().any(|r| {
            r.covers(offset, data.len() as u32) && stages.iter().all(|s| r.stages.contains(s))
        });
        if !covered {
            return Err(Error::InvalidAccess("push constants outside declared ranges".to_string()));
        }
        self.commands.push(format!("push_constants {} bytes", data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.commands.push(format!("bind_vertex_buffer {} @{}", buffer.size(), offset));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.index_bound = true;
        self.commands.push(format!("bind_index_buffer {} @{} {:?}", buffer.size(), offset, index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        if self.bound_pipeline.is_none() {
            return Err(Error::InvalidAccess("draw without a bound pipeline".to_string()));
        }
        self.commands.push(format!("draw {} {}", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        if self.bound_pipeline.is_none() || !self.index_bound {
            return Err(Error::InvalidAccess("draw_indexed without pipeline or index buffer".to_string()));
        }
        self.commands.push(format!("draw_indexed {} {} {}", index_count, first_index, vertex_offset));
        Ok(())
    }
}

// ============================================================================
// Mock Frame Backend
// ============================================================================

/// Simulated frame backend
///
/// Fences: `submit` leaves the slot's fence unsignaled, `wait_for_slot`
/// plays the GPU and signals it. `max_in_flight` records the largest
/// number of submitted-but-unwaited frames ever observed. The next
/// `stale_rebuilds` calls to `recreate_swapchain` fail with `SurfaceStale`.
pub struct MockFrameBackend {
    pub frames_in_flight: usize,
    pub extent: Extent2D,
    pub image_count: u32,
    pub fence_signaled: Vec<bool>,
    pub events: Vec<String>,
    pub recorded: Vec<Vec<String>>,
    pub acquire_script: VecDeque<AcquireOutcome>,
    pub present_script: VecDeque<PresentOutcome>,
    pub recreations: Vec<Extent2D>,
    pub stale_rebuilds: u32,
    pub in_flight: usize,
    pub max_in_flight: usize,
    next_image: u32,
}

impl MockFrameBackend {
    pub fn new(frames_in_flight: usize, extent: Extent2D) -> Self {
        Self {
            frames_in_flight,
            extent,
            image_count: 3,
            fence_signaled: vec![true; frames_in_flight],
            events: Vec::new(),
            recorded: Vec::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            recreations: Vec::new(),
            stale_rebuilds: 0,
            in_flight: 0,
            max_in_flight: 0,
            next_image: 0,
        }
    }

    pub fn events_named(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl FrameBackend for MockFrameBackend {
    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        if !self.fence_signaled[slot] {
            self.fence_signaled[slot] = true;
            self.in_flight -= 1;
        }
        self.events.push(format!("wait {}", slot));
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        self.events.push(format!("acquire {}", slot));
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        if !self.fence_signaled[slot] {
            return Err(Error::InvalidAccess(format!("Resetting slot {} while in flight", slot)));
        }
        self.fence_signaled[slot] = false;
        self.events.push(format!("reset {}", slot));
        Ok(())
    }

    fn record(
        &mut self,
        slot: usize,
        image_index: u32,
        passes: &mut dyn FnMut(&mut dyn CommandList) -> Result<()>,
    ) -> Result<()> {
        self.events.push(format!("record {} {}", slot, image_index));
        let mut cmd = MockCommandList::new(mock_signature());
        cmd.set_viewport(Viewport::full(self.extent.width, self.extent.height))?;
        cmd.set_scissor(Rect2D::full(self.extent.width, self.extent.height))?;
        let result = passes(&mut cmd);
        self.recorded.push(cmd.commands);
        result
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        self.in_flight += 1;
        self.max_in_flight = self.max_in_flight.max(self.in_flight);
        self.events.push(format!("submit {}", slot));
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        self.events.push(format!("present {} {}", slot, image_index));
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn recover_slot(&mut self, slot: usize) -> Result<()> {
        self.fence_signaled[slot] = true;
        self.events.push(format!("recover {}", slot));
        Ok(())
    }

    fn recreate_swapchain(&mut self, framebuffer: Extent2D) -> Result<()> {
        if self.stale_rebuilds > 0 {
            self.stale_rebuilds -= 1;
            self.events.push("recreate stale".to_string());
            return Err(Error::SurfaceStale);
        }
        self.extent = framebuffer;
        self.recreations.push(framebuffer);
        self.events.push(format!("recreate {}x{}", framebuffer.width, framebuffer.height));
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        for signaled in self.fence_signaled.iter_mut() {
            *signaled = true;
        }
        self.in_flight = 0;
        self.events.push("wait_idle".to_string());
        Ok(())
    }
}
