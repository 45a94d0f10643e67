/// Swapchain - presentable images for the window surface
///
/// Creation choices (format, present mode, extent, image count, sharing)
/// come from the engine's `SwapchainConfig::select`; this type only turns
/// them into Vulkan objects and maps acquire/present results.

use ash::vk;
use sandbox_3d_engine::sandbox3d::render::{
    AcquireOutcome, Extent2D, PresentMode, PresentOutcome, SharingMode, SurfaceFormat, SwapchainConfig,
    SwapchainState, TextureFormat,
};
use sandbox_3d_engine::sandbox3d::{Error, Result};
use sandbox_3d_engine::{engine_debug, engine_err, engine_error, engine_info};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_convert::{
    capabilities_from_vk, color_space_to_vk, extent_to_vk, format_to_vk, present_mode_from_vk, present_mode_to_vk,
    sharing_mode_to_vk, surface_format_from_vk,
};

/// Vulkan swapchain with one view per image
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    config: SwapchainConfig,
    state: SwapchainState,
}

impl Swapchain {
    /// Create the swapchain for a framebuffer of `framebuffer` pixels
    pub(crate) fn new(ctx: Arc<GpuContext>, framebuffer: Extent2D) -> Result<Self> {
        let (swapchain, config) = Self::build(&ctx, framebuffer, vk::SwapchainKHR::null())?;
        let mut created = Self {
            ctx,
            swapchain,
            images: Vec::new(),
            views: Vec::new(),
            config,
            state: SwapchainState::Uninitialized,
        };
        created.create_views()?;
        created.state.transition(SwapchainState::Ready)?;

        engine_info!(
            SOURCE,
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            config.extent.width, config.extent.height, created.images.len(),
            config.surface_format.format, config.present_mode
        );
        Ok(created)
    }

    /// Query the surface and apply the selection rules
    fn select_config(ctx: &GpuContext, framebuffer: Extent2D) -> Result<(SwapchainConfig, vk::SurfaceCapabilitiesKHR)> {
        unsafe {
            let caps = ctx
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to get surface capabilities: {:?}", e))?;
            let formats: Vec<SurfaceFormat> = ctx
                .surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to get surface formats: {:?}", e))?
                .iter()
                .map(surface_format_from_vk)
                .collect();
            let present_modes: Vec<PresentMode> = ctx
                .surface_loader
                .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
                .map_err(|e| engine_err!(SOURCE, "Failed to get surface present modes: {:?}", e))?
                .into_iter()
                .filter_map(present_mode_from_vk)
                .collect();

            let config = SwapchainConfig::select(
                &capabilities_from_vk(&caps),
                &formats,
                &present_modes,
                framebuffer,
                &ctx.queue_families,
            )?;
            Ok((config, caps))
        }
    }

    fn build(
        ctx: &GpuContext,
        framebuffer: Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<(vk::SwapchainKHR, SwapchainConfig)> {
        let (config, caps) = Self::select_config(ctx, framebuffer)?;
        if config.extent.is_zero_area() {
            // Surface reports a zero extent while minimized
            return Err(Error::SurfaceStale);
        }

        let composite_alpha = if caps.supported_composite_alpha.contains(vk::CompositeAlphaFlagsKHR::OPAQUE) {
            vk::CompositeAlphaFlagsKHR::OPAQUE
        } else {
            vk::CompositeAlphaFlagsKHR::INHERIT
        };

        let family_indices = [ctx.graphics_family, ctx.present_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(config.image_count)
            .image_format(format_to_vk(config.surface_format.format))
            .image_color_space(color_space_to_vk(config.surface_format.color_space))
            .image_extent(extent_to_vk(config.extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode_to_vk(config.sharing_mode))
            .pre_transform(caps.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode_to_vk(config.present_mode))
            .clipped(true)
            .old_swapchain(old_swapchain);
        if config.sharing_mode == SharingMode::Concurrent {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let swapchain = unsafe { ctx.swapchain_loader.create_swapchain(&create_info, None) }.map_err(|e| {
            engine_error!(SOURCE, "Failed to create swapchain: {:?}", e);
            Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
        })?;
        Ok((swapchain, config))
    }

    fn create_views(&mut self) -> Result<()> {
        unsafe {
            self.images = self
                .ctx
                .swapchain_loader
                .get_swapchain_images(self.swapchain)
                .map_err(|e| engine_err!(SOURCE, "Failed to get swapchain images: {:?}", e))?;

            for &image in &self.images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format_to_vk(self.config.surface_format.format))
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                let view = self
                    .ctx
                    .device
                    .create_image_view(&create_info, None)
                    .map_err(|e| engine_err!(SOURCE, "Failed to create swapchain image view: {:?}", e))?;
                self.views.push(view);
            }
        }
        Ok(())
    }

    fn destroy_views(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
        }
        self.images.clear();
    }

    /// Rebuild for a new framebuffer size, handing the old swapchain to the driver
    ///
    /// The caller guarantees no frame is still using the old images. A surface
    /// that reports a zero extent leaves the swapchain `Stale` and untouched.
    pub(crate) fn recreate(&mut self, framebuffer: Extent2D) -> Result<()> {
        if self.state == SwapchainState::Destroyed {
            return Err(Error::InvalidAccess("Cannot recreate a destroyed swapchain".to_string()));
        }

        let built = Self::build(&self.ctx, framebuffer, self.swapchain);
        self.state.settle_rebuild(&built)?;
        let (swapchain, config) = built?;
        self.destroy_views();
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = swapchain;

        if config.surface_format != self.config.surface_format {
            engine_debug!(
                SOURCE,
                "Swapchain format changed {:?} -> {:?}",
                self.config.surface_format.format, config.surface_format.format
            );
        }
        self.config = config;
        self.create_views()
    }

    /// Destroy views and swapchain; safe to call more than once
    pub(crate) fn cleanup(&mut self) {
        if self.state == SwapchainState::Destroyed {
            return;
        }
        self.destroy_views();
        unsafe {
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.state = SwapchainState::Destroyed;
    }

    /// Acquire the next image, signaling `image_available` when it is ready
    pub(crate) fn acquire(&self, image_available: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.ctx
                .swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(engine_err!(SOURCE, "Failed to acquire swapchain image: {:?}", e)),
        }
    }

    /// Queue `image_index` for presentation once `wait` is signaled
    pub(crate) fn present(&self, wait: vk::Semaphore, image_index: u32) -> Result<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let _queue = self.ctx.lock_queues();
            unsafe { self.ctx.swapchain_loader.queue_present(self.ctx.present_queue, &present_info) }
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!(SOURCE, "Failed to present swapchain image: {:?}", e)),
        }
    }

    pub fn extent(&self) -> Extent2D {
        self.config.extent
    }

    pub fn format(&self) -> TextureFormat {
        self.config.surface_format.format
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn state(&self) -> SwapchainState {
        self.state
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn views(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.cleanup();
    }
}
