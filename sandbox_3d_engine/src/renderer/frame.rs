/// Frame orchestration - the acquire -> record -> submit -> present cycle
///
/// `FrameOrchestrator` owns the protocol and the swapchain lifecycle. The
/// GPU work itself is delegated to a `FrameBackend` (the Vulkan renderer in
/// production, a recording mock in tests).

use glam::Mat4;
use crate::error::{Error, Result};
use crate::renderer::{CommandList, Extent2D, PassStats, RenderPass, SwapchainState};
use crate::scene::DrawableSet;

// ===== BACKEND CONTRACT =====

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; `suboptimal` asks for a rebuild after this frame
    Acquired { image_index: u32, suboptimal: bool },
    /// Surface no longer matches the swapchain, nothing was acquired
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// GPU side of the frame loop
///
/// Slot indices are always `< frames_in_flight()`. Each slot owns one
/// command buffer, one image-available semaphore, one render-finished
/// semaphore and one completion fence.
pub trait FrameBackend {
    /// Number of frame-in-flight slots
    fn frames_in_flight(&self) -> usize;

    /// Current swapchain extent
    fn extent(&self) -> Extent2D;

    /// Block until the slot's completion fence is signaled
    fn wait_for_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next image, signaling the slot's image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Reset the slot's fence and command buffer
    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    /// Record the slot's command buffer
    ///
    /// Begins the render pass on the framebuffer of `image_index`, sets a
    /// full-extent viewport and scissor, calls `passes` once, then ends the
    /// render pass.
    fn record(
        &mut self,
        slot: usize,
        image_index: u32,
        passes: &mut dyn FnMut(&mut dyn CommandList) -> Result<()>,
    ) -> Result<()>;

    /// Submit: wait image-available at color output, signal render-finished and the fence
    fn submit(&mut self, slot: usize) -> Result<()>;

    /// Present `image_index`, waiting on the slot's render-finished semaphore
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    /// Restore the slot's sync objects after a frame was abandoned post-reset
    fn recover_slot(&mut self, slot: usize) -> Result<()>;

    /// Tear down and rebuild the swapchain and everything sized by it
    fn recreate_swapchain(&mut self, framebuffer: Extent2D) -> Result<()>;

    /// Block until the GPU is idle
    fn wait_idle(&mut self) -> Result<()>;
}

// ===== FRAME DATA =====

/// Camera matrices for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for FrameView {
    fn default() -> Self {
        Self { view: Mat4::IDENTITY, projection: Mat4::IDENTITY }
    }
}

/// Per-frame information handed to render passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub view: Mat4,
    pub projection: Mat4,
    pub extent: Extent2D,
    pub slot: usize,
    pub image_index: u32,
}

impl FrameContext {
    /// `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Cumulative counters since the orchestrator was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_rendered: u64,
    /// Frames abandoned because the surface was stale or minimised
    pub frames_dropped: u64,
    pub swapchain_recreations: u64,
    pub draw_calls: u64,
}

/// What happened to a `render_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame submitted and presented
    Presented { image_index: u32, passes: PassStats },
    /// Acquisition reported a stale surface; nothing submitted
    Dropped,
    /// Framebuffer has zero area; rendering deferred until it grows
    Skipped,
}

// ===== ORCHESTRATOR =====

const SOURCE: &str = "sandbox3d::frame";

/// Drives the per-frame protocol over N in-flight slots
pub struct FrameOrchestrator<B: FrameBackend> {
    backend: B,
    passes: Vec<Box<dyn RenderPass>>,
    current_slot: usize,
    state: SwapchainState,
    framebuffer: Extent2D,
    stats: FrameStats,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    /// Wrap a backend whose swapchain has just been created
    pub fn new(backend: B, framebuffer: Extent2D) -> Self {
        Self {
            backend,
            passes: Vec::new(),
            current_slot: 0,
            state: SwapchainState::Ready,
            framebuffer,
            stats: FrameStats::default(),
        }
    }

    /// Register a pass; passes execute in registration order
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        crate::engine_debug!(SOURCE, "Registered render pass '{}'", pass.name());
        self.passes.push(pass);
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn swapchain_state(&self) -> SwapchainState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Window resize notification; the swapchain is rebuilt before the next frame
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.framebuffer = Extent2D::new(width, height);
        self.state.transition(SwapchainState::Stale)
    }

    /// Render one frame
    ///
    /// Stale-surface conditions are handled here and never returned as errors.
    pub fn render_frame(&mut self, view: &FrameView, drawables: &DrawableSet) -> Result<FrameOutcome> {
        if !matches!(self.state, SwapchainState::Ready | SwapchainState::Stale) {
            return Err(Error::InvalidAccess(format!(
                "Cannot render with swapchain in state {:?}",
                self.state
            )));
        }
        if self.state == SwapchainState::Stale && !self.try_recreate()? {
            self.stats.frames_dropped += 1;
            return Ok(FrameOutcome::Skipped);
        }

        let slot = self.current_slot;

        // 1. Wait until the GPU is done with this slot
        self.backend.wait_for_slot(slot)?;

        // 2. Acquire
        let (image_index, mut stale) = match self.backend.acquire_image(slot) {
            Ok(AcquireOutcome::Acquired { image_index, suboptimal }) => (image_index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) => return self.drop_frame(),
            Err(e) if e.is_surface_stale() => return self.drop_frame(),
            Err(e) => return Err(e),
        };

        // 3. Reset fence + command buffer
        self.backend.reset_slot(slot)?;

        // 4-5. Record and submit
        let ctx = FrameContext {
            view: view.view,
            projection: view.projection,
            extent: self.backend.extent(),
            slot,
            image_index,
        };
        let mut frame_passes = PassStats::default();
        let passes = &mut self.passes;
        let recorded = self.backend.record(slot, image_index, &mut |cmd: &mut dyn CommandList| {
            for pass in passes.iter_mut() {
                frame_passes.accumulate(pass.execute(cmd, &ctx, drawables)?);
            }
            Ok(())
        });
        if let Err(e) = recorded.and_then(|_| self.backend.submit(slot)) {
            crate::engine_error!(SOURCE, "Frame on slot {} abandoned: {}", slot, e);
            self.backend.recover_slot(slot)?;
            // The acquired image was never presented; only a rebuild releases it
            self.state.transition(SwapchainState::Stale)?;
            return Err(e);
        }

        // Advance now: the slot belongs to the GPU until its fence signals
        self.current_slot = (slot + 1) % self.backend.frames_in_flight().max(1);
        self.stats.frames_rendered += 1;
        self.stats.draw_calls += frame_passes.draw_calls as u64;

        // 6. Present, then 7. rebuild if the surface went stale
        match self.backend.present(slot, image_index) {
            Ok(outcome) => stale |= outcome.needs_recreate(),
            Err(e) if e.is_surface_stale() => stale = true,
            Err(e) => return Err(e),
        }

        if stale {
            self.state.transition(SwapchainState::Stale)?;
            self.try_recreate()?;
        }

        Ok(FrameOutcome::Presented { image_index, passes: frame_passes })
    }

    /// Wait for the GPU and mark the swapchain destroyed
    pub fn shutdown(&mut self) -> Result<()> {
        self.backend.wait_idle()?;
        self.state.transition(SwapchainState::Destroyed)
    }

    fn drop_frame(&mut self) -> Result<FrameOutcome> {
        crate::engine_debug!(SOURCE, "Surface out of date on acquire, dropping frame");
        self.stats.frames_dropped += 1;
        self.state.transition(SwapchainState::Stale)?;
        self.try_recreate()?;
        Ok(FrameOutcome::Dropped)
    }

    /// Rebuild the swapchain unless the framebuffer has zero area
    ///
    /// A surface that is still stale leaves the state at `Stale` and the
    /// next frame retries.
    fn try_recreate(&mut self) -> Result<bool> {
        if self.framebuffer.is_zero_area() {
            return Ok(false);
        }
        match self.backend.recreate_swapchain(self.framebuffer) {
            Ok(()) => {}
            Err(e) if e.is_surface_stale() => {
                crate::engine_debug!(SOURCE, "Surface still stale, swapchain rebuild deferred");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        self.state.transition(SwapchainState::Ready)?;
        self.stats.swapchain_recreations += 1;
        crate::engine_info!(
            SOURCE,
            "Swapchain recreated at {}x{}",
            self.backend.extent().width,
            self.backend.extent().height
        );
        Ok(true)
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
