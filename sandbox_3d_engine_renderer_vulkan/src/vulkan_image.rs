/// Image - Vulkan implementation of the Image trait
///
/// Owns the image, its memory, one view and an optional sampler. The
/// current layout is tracked on the host and every transition goes through
/// the engine's transition table.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use sandbox_3d_engine::sandbox3d::render::{
    validate_image_copy, Buffer as RendererBuffer, Image as RendererImage, ImageAspect, ImageDesc,
    ImageLayout, ImageTiling, SamplerDesc, TextureFormat,
};
use sandbox_3d_engine::sandbox3d::{Error, Result};
use sandbox_3d_engine::{engine_err, engine_error, engine_trace, engine_warn_err};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_convert::{
    address_mode_to_vk, aspect_to_vk, barrier_masks, filter_to_vk, format_to_vk, image_layout_to_vk,
    image_usage_to_vk, tiling_to_vk,
};

/// Anisotropy actually programmed into a sampler
///
/// `None` disables it: either nothing was requested or the device
/// was created without the feature.
pub(crate) fn effective_anisotropy(requested: Option<f32>, device_supports: bool, device_limit: f32) -> Option<f32> {
    match requested {
        Some(level) if device_supports && level > 1.0 => Some(level.min(device_limit)),
        _ => None,
    }
}

/// Vulkan image implementation
pub struct Image {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    sampler: Option<vk::Sampler>,
    allocation: Option<Allocation>,
    desc: ImageDesc,
    layout: ImageLayout,
}

impl Image {
    /// Create the image in the `Undefined` layout with a view matching its format
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(engine_warn_err!(
                SOURCE,
                "Invalid image dimensions {}x{} with {} mip level(s)",
                desc.width, desc.height, desc.mip_levels
            ));
        }

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(desc.mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(tiling_to_vk(desc.tiling))
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create image: {:?}", e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx.lock_allocator().allocate(&AllocationCreateDesc {
                name: "image",
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: desc.tiling == ImageTiling::Linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_) => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(
                        SOURCE,
                        "Out of GPU memory for image (size: {}x{}, {:.2} MB)",
                        desc.width, desc.height, size_mb
                    );
                    ctx.device.destroy_image(image, None);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                let _ = ctx.lock_allocator().free(allocation);
                ctx.device.destroy_image(image, None);
                return Err(engine_err!(SOURCE, "Failed to bind image memory: {:?}", e));
            }

            // From here on Drop releases everything
            let mut created = Self {
                ctx,
                image,
                view: vk::ImageView::null(),
                sampler: None,
                allocation: Some(allocation),
                desc: *desc,
                layout: ImageLayout::Undefined,
            };
            created.view = created.build_view(desc.format.aspect())?;
            Ok(created)
        }
    }

    fn subresource_range(&self, aspect: ImageAspect) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(aspect_to_vk(aspect))
            .base_mip_level(0)
            .level_count(self.desc.mip_levels)
            .base_array_layer(0)
            .layer_count(1)
    }

    fn build_view(&self, aspect: ImageAspect) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(self.desc.format))
            .subresource_range(self.subresource_range(aspect));

        unsafe {
            self.ctx
                .device
                .create_image_view(&view_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))
        }
    }

    /// Sampler handle, if one was created
    pub fn sampler(&self) -> Option<vk::Sampler> {
        self.sampler
    }
}

impl RendererImage for Image {
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
        if aspect == ImageAspect::Depth && !self.desc.format.is_depth() {
            return Err(Error::InvalidAccess(format!(
                "Depth view requested on color format {:?}",
                self.desc.format
            )));
        }
        let view = self.build_view(aspect)?;
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
        }
        self.view = view;
        Ok(())
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<()> {
        let (filter, mipmap_mode) = filter_to_vk(desc.filter);
        let address_mode = address_mode_to_vk(desc.address_mode);
        let anisotropy = effective_anisotropy(
            desc.max_anisotropy,
            self.ctx.anisotropy_enabled,
            self.ctx.max_anisotropy,
        );

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(self.desc.mip_levels as f32)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        unsafe {
            let sampler = self
                .ctx
                .device
                .create_sampler(&sampler_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create sampler: {:?}", e))?;
            if let Some(old) = self.sampler.replace(sampler) {
                self.ctx.device.destroy_sampler(old, None);
            }
        }
        Ok(())
    }

    fn has_sampler(&self) -> bool {
        self.sampler.is_some()
    }

    fn transition_layout(&mut self, new_layout: ImageLayout) -> Result<()> {
        let transition = self.layout.transition_to(new_layout)?;
        let masks = barrier_masks(transition);

        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(transition.old_layout()))
            .new_layout(image_layout_to_vk(transition.new_layout()))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(self.subresource_range(self.desc.format.aspect()))
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access);

        self.ctx.one_shot(|cmd| unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                cmd,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })?;

        engine_trace!(SOURCE, "Image {:?} -> {:?}", self.layout, new_layout);
        self.layout = new_layout;
        Ok(())
    }

    fn copy_from_buffer(&mut self, buffer: &dyn RendererBuffer) -> Result<()> {
        validate_image_copy(&*self, buffer)?;

        // All buffers handed to this device are Vulkan buffers
        let vk_buffer = unsafe { &*(buffer as *const dyn RendererBuffer as *const Buffer) };

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(aspect_to_vk(self.desc.format.aspect()))
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D { width: self.desc.width, height: self.desc.height, depth: 1 });

        self.ctx.one_shot(|cmd| unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                cmd,
                vk_buffer.buffer,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        })
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampler) = self.sampler.take() {
                self.ctx.device.destroy_sampler(sampler, None);
            }
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                let _ = self.ctx.lock_allocator().free(allocation);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_image_tests.rs"]
mod tests;
