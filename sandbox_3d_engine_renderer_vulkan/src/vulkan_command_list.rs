/// CommandList - Vulkan implementation of the CommandList trait
///
/// Borrowed view of a frame slot's command buffer, handed to render passes
/// while the frame's render pass instance is open.

use ash::vk;
use sandbox_3d_engine::sandbox3d::render::{
    Buffer as RendererBuffer, BufferUsage, CommandList as RendererCommandList, IndexType,
    Pipeline as RendererPipeline, Rect2D, RenderPassSignature, ShaderStage, Viewport,
};
use sandbox_3d_engine::sandbox3d::{Error, Result};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_convert::{index_type_to_vk, stages_to_vk};
use crate::vulkan_pipeline::Pipeline;

/// Vulkan command list recording inside an open render pass
pub struct CommandList<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
    signature: RenderPassSignature,
    bound_pipeline: Option<Arc<dyn RendererPipeline>>,
    /// Layout handle of `bound_pipeline` (for push constants)
    bound_layout: vk::PipelineLayout,
    index_bound: bool,
}

impl<'a> CommandList<'a> {
    pub(crate) fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer, signature: RenderPassSignature) -> Self {
        Self {
            device,
            command_buffer,
            signature,
            bound_pipeline: None,
            bound_layout: vk::PipelineLayout::null(),
            index_bound: false,
        }
    }

    fn require_pipeline(&self, command: &str) -> Result<&Arc<dyn RendererPipeline>> {
        self.bound_pipeline
            .as_ref()
            .ok_or_else(|| Error::InvalidAccess(format!("{} without a bound pipeline", command)))
    }

    /// Downcast an engine buffer created by this backend
    fn vk_buffer(buffer: &dyn RendererBuffer) -> vk::Buffer {
        unsafe { (*(buffer as *const dyn RendererBuffer as *const Buffer)).buffer }
    }
}

impl RendererCommandList for CommandList<'_> {
    fn render_pass_signature(&self) -> &RenderPassSignature {
        &self.signature
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn RendererPipeline>) -> Result<()> {
        if !pipeline.signature().is_compatible_with(&self.signature) {
            return Err(Error::InvalidAccess(format!(
                "Pipeline built for {:?} bound in render pass {:?}",
                pipeline.signature(),
                self.signature
            )));
        }

        // All pipelines handed to this device are Vulkan pipelines
        let vk_pipeline = unsafe { &*(Arc::as_ptr(pipeline) as *const dyn RendererPipeline as *const Pipeline) };
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline.pipeline);
        }
        self.bound_layout = vk_pipeline.vk_layout;
        self.bound_pipeline = Some(Arc::clone(pipeline));
        Ok(())
    }

    fn push_constants(&mut self, stages: &[ShaderStage], offset: u32, data: &[u8]) -> Result<()> {
        let pipeline = self.require_pipeline("push_constants")?;
        if stages.is_empty() || data.is_empty() || offset % 4 != 0 || data.len() % 4 != 0 {
            return Err(Error::InvalidAccess(format!(
                "Push constant update of {} bytes at offset {} must be non-empty and 4-byte aligned",
                data.len(),
                offset
            )));
        }
        let covered = pipeline.layout().desc().push_constant_ranges.iter().any(|range| {
            range.covers(offset, data.len() as u32) && stages.iter().all(|stage| range.stages.contains(stage))
        });
        if !covered {
            return Err(Error::InvalidAccess(format!(
                "Push constants [{}, {}) for {:?} outside the declared ranges",
                offset,
                offset as usize + data.len(),
                stages
            )));
        }

        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, self.bound_layout, stages_to_vk(stages), offset, data);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn RendererBuffer, offset: u64) -> Result<()> {
        if !buffer.usage().contains(BufferUsage::VERTEX) {
            return Err(Error::InvalidResource("Vertex buffer lacks VERTEX usage".to_string()));
        }
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[Self::vk_buffer(buffer)], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn RendererBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        if !buffer.usage().contains(BufferUsage::INDEX) {
            return Err(Error::InvalidResource("Index buffer lacks INDEX usage".to_string()));
        }
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                Self::vk_buffer(buffer),
                offset,
                index_type_to_vk(index_type),
            );
        }
        self.index_bound = true;
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_pipeline("draw")?;
        unsafe {
            self.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_pipeline("draw_indexed")?;
        if !self.index_bound {
            return Err(Error::InvalidAccess("draw_indexed without an index buffer".to_string()));
        }
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }
}
