/// VulkanDevice - GraphicsDevice implementation over the shared GpuContext

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use sandbox_3d_engine::sandbox3d::render::{
    Buffer as RendererBuffer, BufferDesc, GraphicsDevice, Image as RendererImage, ImageDesc,
    Pipeline as RendererPipeline, PipelineDesc, PipelineLayout as RendererPipelineLayout, PipelineLayoutDesc,
};
use sandbox_3d_engine::sandbox3d::{Config, Result};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::Image;
use crate::vulkan_pipeline::{Pipeline, PipelineLayout};

/// Resource factory for the Vulkan backend
///
/// Cheap to clone; every clone shares the same context.
#[derive(Clone)]
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
}

impl VulkanDevice {
    /// Bring up Vulkan for `window` without a frame loop (uploads and pipelines only)
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        Ok(Self { ctx: GpuContext::new(window, config)? })
    }

    pub(crate) fn from_context(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    pub(crate) fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        self.ctx.device_name()
    }

    /// True when the validation layer and debug messenger are active
    pub fn validation_enabled(&self) -> bool {
        self.ctx.validation_enabled()
    }
}

impl GraphicsDevice for VulkanDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn RendererBuffer>> {
        Ok(Box::new(Buffer::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Box<dyn RendererImage>> {
        Ok(Box::new(Image::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn RendererPipelineLayout>> {
        Ok(Arc::new(PipelineLayout::create(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn RendererPipeline>> {
        Ok(Arc::new(Pipeline::create(Arc::clone(&self.ctx), desc)?))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }
}
