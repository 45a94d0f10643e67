/// VulkanRenderer - frame loop over the window swapchain
///
/// `VulkanFrameBackend` owns everything sized by the swapchain (render pass,
/// depth image, framebuffers) and the per-slot command buffers and sync
/// objects. `VulkanRenderer` puts the engine's `FrameOrchestrator` on top.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use sandbox_3d_engine::sandbox3d::render::{
    AcquireOutcome, CommandList as RendererCommandList, Extent2D, FrameBackend, FrameOrchestrator, FrameOutcome,
    FrameStats, FrameView, Image as RendererImage, ImageDesc, ImageLayout, PresentOutcome, Rect2D, RenderPass as
    RendererRenderPass, RenderPassSignature, SampleCount, SwapchainState, TextureFormat, Viewport,
};
use sandbox_3d_engine::sandbox3d::scene::DrawableSet;
use sandbox_3d_engine::sandbox3d::{Config, Error, Result};
use sandbox_3d_engine::{engine_err, engine_info, engine_warn};
use std::sync::Arc;

use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_swapchain::Swapchain;

const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_SFLOAT;

/// Clear values in attachment order: color, then depth when present
pub(crate) fn clear_values(color: [f32; 4], has_depth: bool) -> Vec<vk::ClearValue> {
    let mut values = vec![vk::ClearValue { color: vk::ClearColorValue { float32: color } }];
    if has_depth {
        values.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        });
    }
    values
}

/// Sync objects of one frame-in-flight slot
struct FrameSync {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

// ===== FRAME BACKEND =====

/// Vulkan side of the frame protocol
pub struct VulkanFrameBackend {
    swapchain: Swapchain,
    render_pass: RenderPass,
    depth: Image,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    slots: Vec<FrameSync>,
    clear_color: [f32; 4],
    ctx: Arc<GpuContext>,
}

impl VulkanFrameBackend {
    pub(crate) fn new(ctx: Arc<GpuContext>, config: &Config, framebuffer: Extent2D) -> Result<Self> {
        let swapchain = Swapchain::new(Arc::clone(&ctx), framebuffer)?;
        let signature = RenderPassSignature {
            color_format: swapchain.format(),
            depth_format: Some(DEPTH_FORMAT),
            samples: SampleCount::S1,
        };
        let render_pass = RenderPass::new(Arc::clone(&ctx), &signature)?;
        let depth = Self::create_depth(&ctx, swapchain.extent())?;

        // Raw handles start empty so Drop can clean up a half-built backend
        let mut backend = Self {
            swapchain,
            render_pass,
            depth,
            framebuffers: Vec::new(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            slots: Vec::new(),
            clear_color: config.clear_color,
            ctx,
        };
        backend.create_framebuffers()?;
        backend.create_frame_resources(config.effective_frames_in_flight())?;

        engine_info!(
            SOURCE,
            "Frame backend ready: {} frames in flight, {} framebuffers",
            backend.slots.len(),
            backend.framebuffers.len()
        );
        Ok(backend)
    }

    pub fn signature(&self) -> &RenderPassSignature {
        self.render_pass.signature()
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    fn create_depth(ctx: &Arc<GpuContext>, extent: Extent2D) -> Result<Image> {
        let mut depth = Image::create(Arc::clone(ctx), &ImageDesc::depth(extent.width, extent.height))?;
        depth.transition_layout(ImageLayout::DepthStencilAttachment)?;
        Ok(depth)
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        let extent = self.swapchain.extent();
        for &view in self.swapchain.views() {
            let attachments = [view, self.depth.view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { self.ctx.device.create_framebuffer(&create_info, None) }
                .map_err(|e| engine_err!(SOURCE, "Failed to create framebuffer: {:?}", e))?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    fn destroy_framebuffers(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe { self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create semaphore: {:?}", e))
    }

    /// Fences start signaled so the first wait on each slot returns at once
    fn create_signaled_fence(&self) -> Result<vk::Fence> {
        let create_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        unsafe { self.ctx.device.create_fence(&create_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create fence: {:?}", e))
    }

    fn create_frame_resources(&mut self, frames_in_flight: usize) -> Result<()> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(self.ctx.graphics_family);
            self.command_pool = self
                .ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create frame command pool: {:?}", e))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(frames_in_flight as u32);
            self.command_buffers = self
                .ctx
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate frame command buffers: {:?}", e))?;
        }

        for _ in 0..frames_in_flight {
            let sync = FrameSync {
                image_available: self.create_semaphore()?,
                render_finished: vk::Semaphore::null(),
                in_flight: vk::Fence::null(),
            };
            self.slots.push(sync);
            let last = self.slots.len() - 1;
            self.slots[last].render_finished = self.create_semaphore()?;
            self.slots[last].in_flight = self.create_signaled_fence()?;
        }
        Ok(())
    }

    fn destroy_sync(&self, sync: &FrameSync) {
        unsafe {
            if sync.image_available != vk::Semaphore::null() {
                self.ctx.device.destroy_semaphore(sync.image_available, None);
            }
            if sync.render_finished != vk::Semaphore::null() {
                self.ctx.device.destroy_semaphore(sync.render_finished, None);
            }
            if sync.in_flight != vk::Fence::null() {
                self.ctx.device.destroy_fence(sync.in_flight, None);
            }
        }
    }
}

impl FrameBackend for VulkanFrameBackend {
    fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    fn extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.slots[slot].in_flight], true, u64::MAX)
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for frame fence: {:?}", e))
        }
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        self.swapchain.acquire(self.slots[slot].image_available)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[self.slots[slot].in_flight])
                .map_err(|e| engine_err!(SOURCE, "Failed to reset frame fence: {:?}", e))?;
            self.ctx
                .device
                .reset_command_buffer(self.command_buffers[slot], vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))?;
        }
        Ok(())
    }

    fn record(
        &mut self,
        slot: usize,
        image_index: u32,
        passes: &mut dyn FnMut(&mut dyn RendererCommandList) -> Result<()>,
    ) -> Result<()> {
        let command_buffer = self.command_buffers[slot];
        let framebuffer = *self.framebuffers.get(image_index as usize).ok_or_else(|| {
            Error::InvalidAccess(format!(
                "Image index {} out of range ({} framebuffers)",
                image_index,
                self.framebuffers.len()
            ))
        })?;
        let extent = self.swapchain.extent();
        let clear = clear_values(self.clear_color, self.signature().depth_format.is_some());

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin command buffer: {:?}", e))?;

            let pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D { width: extent.width, height: extent.height },
                })
                .clear_values(&clear);
            self.ctx
                .device
                .cmd_begin_render_pass(command_buffer, &pass_info, vk::SubpassContents::INLINE);
        }

        let result = {
            let mut cmd = CommandList::new(&self.ctx.device, command_buffer, *self.signature());
            cmd.set_viewport(Viewport::full(extent.width, extent.height))
                .and_then(|_| cmd.set_scissor(Rect2D::full(extent.width, extent.height)))
                .and_then(|_| passes(&mut cmd))
        };

        // The render pass is closed even when a pass failed
        let ended = unsafe {
            self.ctx.device.cmd_end_render_pass(command_buffer);
            self.ctx
                .device
                .end_command_buffer(command_buffer)
                .map_err(|e| engine_err!(SOURCE, "Failed to end command buffer: {:?}", e))
        };
        result.and(ended)
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let sync = &self.slots[slot];
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [self.command_buffers[slot]];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue = self.ctx.lock_queues();
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], sync.in_flight)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit frame: {:?}", e))
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        self.swapchain.present(self.slots[slot].render_finished, image_index)
    }

    fn recover_slot(&mut self, slot: usize) -> Result<()> {
        self.ctx.wait_idle()?;

        // The acquire may have left image_available signaled with no waiter
        let fresh = FrameSync {
            image_available: self.create_semaphore()?,
            render_finished: self.create_semaphore()?,
            in_flight: self.create_signaled_fence()?,
        };
        let stale = std::mem::replace(&mut self.slots[slot], fresh);
        self.destroy_sync(&stale);

        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffers[slot], vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset command buffer: {:?}", e))?;
        }
        engine_warn!(SOURCE, "Frame slot {} recovered after an abandoned frame", slot);
        Ok(())
    }

    fn recreate_swapchain(&mut self, framebuffer: Extent2D) -> Result<()> {
        self.ctx.wait_idle()?;
        self.destroy_framebuffers();
        self.swapchain.recreate(framebuffer)?;

        if self.swapchain.format() != self.render_pass.signature().color_format {
            engine_warn!(
                SOURCE,
                "Surface format changed to {:?}; pipelines built for {:?} no longer match",
                self.swapchain.format(),
                self.render_pass.signature().color_format
            );
            let signature = RenderPassSignature { color_format: self.swapchain.format(), ..*self.render_pass.signature() };
            self.render_pass = RenderPass::new(Arc::clone(&self.ctx), &signature)?;
        }

        self.depth = Self::create_depth(&self.ctx, self.swapchain.extent())?;
        self.create_framebuffers()
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.ctx.wait_idle()
    }
}

impl Drop for VulkanFrameBackend {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_warn!(SOURCE, "wait_idle failed during frame backend teardown: {}", e);
        }
        self.destroy_framebuffers();
        for sync in std::mem::take(&mut self.slots) {
            self.destroy_sync(&sync);
        }
        unsafe {
            if self.command_pool != vk::CommandPool::null() {
                // Frees the slot command buffers with it
                self.ctx.device.destroy_command_pool(self.command_pool, None);
            }
        }
        self.command_buffers.clear();
        self.swapchain.cleanup();
    }
}

// ===== RENDERER =====

/// Window renderer: device, swapchain and frame loop
pub struct VulkanRenderer {
    orchestrator: FrameOrchestrator<VulkanFrameBackend>,
    device: VulkanDevice,
}

impl VulkanRenderer {
    /// Bring up Vulkan for `window`
    ///
    /// The initial swapchain is sized from `config.window_width` and
    /// `config.window_height`; pass the window's real inner size there.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let ctx = GpuContext::new(window, config)?;
        let framebuffer = Extent2D::new(config.window_width, config.window_height);
        let backend = VulkanFrameBackend::new(Arc::clone(&ctx), config, framebuffer)?;

        engine_info!(SOURCE, "Vulkan renderer initialized on {}", ctx.device_name());
        Ok(Self {
            orchestrator: FrameOrchestrator::new(backend, framebuffer),
            device: VulkanDevice::from_context(ctx),
        })
    }

    /// Resource factory sharing this renderer's device
    pub fn device(&self) -> &VulkanDevice {
        &self.device
    }

    /// Signature pipelines must be built against to draw in this renderer
    pub fn signature(&self) -> RenderPassSignature {
        *self.orchestrator.backend().signature()
    }

    pub fn extent(&self) -> Extent2D {
        self.orchestrator.backend().extent()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.orchestrator.backend().frames_in_flight()
    }

    pub fn swapchain_image_count(&self) -> usize {
        self.orchestrator.backend().swapchain().image_count()
    }

    pub fn add_pass(&mut self, pass: Box<dyn RendererRenderPass>) {
        self.orchestrator.add_pass(pass);
    }

    /// Window resize notification; the rebuild happens on the next frame
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.orchestrator.resize(width, height)
    }

    pub fn render_frame(&mut self, view: &FrameView, drawables: &DrawableSet) -> Result<FrameOutcome> {
        self.orchestrator.render_frame(view, drawables)
    }

    pub fn stats(&self) -> FrameStats {
        self.orchestrator.stats()
    }

    pub fn swapchain_state(&self) -> SwapchainState {
        self.orchestrator.swapchain_state()
    }

    /// Wait for the GPU and destroy the swapchain; further frames are refused
    pub fn shutdown(&mut self) -> Result<()> {
        if self.orchestrator.swapchain_state() == SwapchainState::Destroyed {
            return Ok(());
        }
        self.orchestrator.shutdown()?;
        self.orchestrator.backend_mut().swapchain.cleanup();
        engine_info!(SOURCE, "Vulkan renderer shut down");
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            engine_warn!(SOURCE, "Renderer shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_renderer_tests.rs"]
mod tests;
