/// RenderPass - Vulkan render pass built from a RenderPassSignature
///
/// One subpass, one color attachment (cleared, stored, ends in PRESENT_SRC)
/// and an optional depth attachment (cleared, discarded). Pipelines are
/// built against a temporary instance of the same signature; Vulkan render
/// pass compatibility only looks at formats and sample counts.

use ash::vk;
use sandbox_3d_engine::sandbox3d::render::RenderPassSignature;
use sandbox_3d_engine::sandbox3d::Result;
use sandbox_3d_engine::engine_err;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_convert::{format_to_vk, sample_count_to_vk};

/// Owned vk::RenderPass
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    signature: RenderPassSignature,
}

impl RenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, signature: &RenderPassSignature) -> Result<Self> {
        let samples = sample_count_to_vk(signature.samples);

        let mut attachments = vec![vk::AttachmentDescription::default()
            .format(format_to_vk(signature.color_format))
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let depth_ref = signature.depth_format.map(|format| {
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(format_to_vk(format))
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            vk::AttachmentReference::default()
                .attachment(1)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        // Depth stages join the dependency when a depth attachment exists
        let (stage_mask, access_mask) = if depth_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        };

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage_mask)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage_mask)
            .dst_access_mask(access_mask);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe { ctx.device.create_render_pass(&render_pass_info, None) }
            .map_err(|e| engine_err!(SOURCE, "Failed to create render pass: {:?}", e))?;

        Ok(Self { ctx, render_pass, signature: *signature })
    }

    pub fn signature(&self) -> &RenderPassSignature {
        &self.signature
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
