/// Pipeline and PipelineLayout - Vulkan implementations
///
/// Shaders are reflected with spirq before any Vulkan object is created:
/// the `main` entry point must exist and the push constant block of each
/// stage must fit inside the ranges declared for that stage.

use ash::vk;
use sandbox_3d_engine::sandbox3d::render::{
    DescriptorType, Pipeline as RendererPipeline, PipelineDesc, PipelineLayout as RendererPipelineLayout,
    PipelineLayoutDesc, PushConstantRange, RenderPassSignature, ShaderBinary, ShaderStage,
};
use sandbox_3d_engine::sandbox3d::{Error, Result};
use sandbox_3d_engine::{engine_debug, engine_err, engine_error};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_convert::{
    compare_op_to_vk, cull_mode_to_vk, extent_to_vk, front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk,
    sample_count_to_vk, stages_to_vk, topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::RenderPass;

const ENTRY_POINT: &str = "main";

// ===== REFLECTION =====

/// What the pipeline needs to know about one shader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ShaderReflection {
    pub entry_points: Vec<String>,
    /// Byte size of the push constant block, if the shader declares one
    pub push_constant_size: Option<u32>,
}

pub(crate) fn reflect_shader(binary: &ShaderBinary) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(binary.words())
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| {
            engine_error!(SOURCE, "SPIR-V reflection of '{}' failed: {:?}", binary.label(), e);
            Error::ShaderLoad(format!("SPIR-V reflection of '{}' failed: {:?}", binary.label(), e))
        })?;

    let mut reflection = ShaderReflection::default();
    for entry_point in &entry_points {
        reflection.entry_points.push(entry_point.name.clone());
        for var in entry_point.vars.iter() {
            if let spirq::var::Variable::PushConstant { ty, .. } = var {
                let size = ty.nbyte().unwrap_or(0) as u32;
                reflection.push_constant_size = Some(reflection.push_constant_size.unwrap_or(0).max(size));
            }
        }
    }
    Ok(reflection)
}

/// Check a reflected shader against the declared push constant ranges
pub(crate) fn check_reflection(
    label: &str,
    stage: ShaderStage,
    reflection: &ShaderReflection,
    ranges: &[PushConstantRange],
) -> Result<()> {
    if !reflection.entry_points.iter().any(|name| name == ENTRY_POINT) {
        return Err(Error::PipelineCreation(format!(
            "Shader '{}' has no '{}' entry point (found: {:?})",
            label, ENTRY_POINT, reflection.entry_points
        )));
    }

    if let Some(block_size) = reflection.push_constant_size {
        let declared_end = ranges
            .iter()
            .filter(|range| range.stages.contains(&stage))
            .map(|range| range.offset + range.size)
            .max();
        match declared_end {
            Some(end) if end >= block_size => {}
            Some(end) => {
                return Err(Error::PipelineCreation(format!(
                    "Shader '{}' push constant block is {} bytes, {:?} ranges end at {}",
                    label, block_size, stage, end
                )));
            }
            None => {
                return Err(Error::PipelineCreation(format!(
                    "Shader '{}' uses push constants but no range covers the {:?} stage",
                    label, stage
                )));
            }
        }
    }
    Ok(())
}

fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

// ===== PIPELINE LAYOUT =====

/// Vulkan pipeline layout with its descriptor set layouts
pub struct PipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    desc: PipelineLayoutDesc,
}

impl PipelineLayout {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &PipelineLayoutDesc) -> Result<Self> {
        desc.validate()?;

        unsafe {
            let mut set_layouts = Vec::with_capacity(desc.descriptor_sets.len());
            for set in &desc.descriptor_sets {
                let bindings: Vec<vk::DescriptorSetLayoutBinding> = set
                    .iter()
                    .map(|binding| {
                        vk::DescriptorSetLayoutBinding::default()
                            .binding(binding.binding)
                            .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                            .descriptor_count(binding.count)
                            .stage_flags(stages_to_vk(&binding.stages))
                    })
                    .collect();
                let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

                match ctx.device.create_descriptor_set_layout(&create_info, None) {
                    Ok(set_layout) => set_layouts.push(set_layout),
                    Err(e) => {
                        for set_layout in set_layouts {
                            ctx.device.destroy_descriptor_set_layout(set_layout, None);
                        }
                        return Err(engine_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e));
                    }
                }
            }

            let push_constant_ranges: Vec<vk::PushConstantRange> = desc
                .push_constant_ranges
                .iter()
                .map(|range| vk::PushConstantRange {
                    stage_flags: stages_to_vk(&range.stages),
                    offset: range.offset,
                    size: range.size,
                })
                .collect();

            let layout_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_constant_ranges);

            let layout = match ctx.device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    for set_layout in set_layouts {
                        ctx.device.destroy_descriptor_set_layout(set_layout, None);
                    }
                    return Err(engine_err!(SOURCE, "Failed to create pipeline layout: {:?}", e));
                }
            };

            Ok(Self { ctx, layout, set_layouts, desc: desc.clone() })
        }
    }
}

impl RendererPipelineLayout for PipelineLayout {
    fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            for set_layout in self.set_layouts.drain(..) {
                self.ctx.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

// ===== PIPELINE =====

/// Vulkan graphics pipeline
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    /// Handle of `layout`, kept for binding and push constants
    pub(crate) vk_layout: vk::PipelineLayout,
    layout: Arc<dyn RendererPipelineLayout>,
    signature: RenderPassSignature,
    subpass: u32,
    dynamic_viewport: bool,
}

impl Pipeline {
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &PipelineDesc) -> Result<Self> {
        if desc.subpass != 0 {
            return Err(Error::PipelineCreation(format!(
                "Render passes have a single subpass, got subpass {}",
                desc.subpass
            )));
        }

        let ranges = &desc.layout.desc().push_constant_ranges;
        let vs_reflection = reflect_shader(&desc.vertex_shader)?;
        check_reflection(desc.vertex_shader.label(), ShaderStage::Vertex, &vs_reflection, ranges)?;
        let fs_reflection = reflect_shader(&desc.fragment_shader)?;
        check_reflection(desc.fragment_shader.label(), ShaderStage::Fragment, &fs_reflection, ranges)?;

        // All layouts handed to this device are Vulkan layouts
        let vk_layout = unsafe {
            (*(Arc::as_ptr(&desc.layout) as *const dyn RendererPipelineLayout as *const PipelineLayout)).layout
        };

        let vertex_module = Self::create_module(&ctx, &desc.vertex_shader)?;
        let fragment_module = match Self::create_module(&ctx, &desc.fragment_shader) {
            Ok(module) => module,
            Err(e) => {
                unsafe { ctx.device.destroy_shader_module(vertex_module, None) };
                return Err(e);
            }
        };

        let pipeline = Self::create_pipeline(&ctx, desc, vk_layout, vertex_module, fragment_module);

        unsafe {
            ctx.device.destroy_shader_module(vertex_module, None);
            ctx.device.destroy_shader_module(fragment_module, None);
        }

        let pipeline = pipeline?;
        engine_debug!(
            SOURCE,
            "Created pipeline ({} + {})",
            desc.vertex_shader.label(),
            desc.fragment_shader.label()
        );

        Ok(Self {
            ctx,
            pipeline,
            vk_layout,
            layout: Arc::clone(&desc.layout),
            signature: desc.signature,
            subpass: desc.subpass,
            dynamic_viewport: desc.viewport.is_none(),
        })
    }

    fn create_module(ctx: &GpuContext, binary: &ShaderBinary) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(binary.words());
        unsafe { ctx.device.create_shader_module(&create_info, None) }.map_err(|e| {
            engine_error!(SOURCE, "Failed to create shader module '{}': {:?}", binary.label(), e);
            Error::PipelineCreation(format!("Failed to create shader module '{}': {:?}", binary.label(), e))
        })
    }

    fn create_pipeline(
        ctx: &Arc<GpuContext>,
        desc: &PipelineDesc,
        layout: vk::PipelineLayout,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> Result<vk::Pipeline> {
        // Compatible stand-in for the render pass the pipeline will be used with
        let temp_render_pass = RenderPass::new(Arc::clone(ctx), &desc.signature)?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(c"main"),
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_layout
            .bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(desc.primitive_restart);

        // Static viewport when an extent was given, dynamic state otherwise
        let (viewports, scissors, dynamic_states) = match desc.viewport {
            Some(extent) => (
                [vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
                [vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: extent_to_vk(extent) }],
                Vec::new(),
            ),
            None => (
                [vk::Viewport::default()],
                [vk::Rect2D::default()],
                vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            ),
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(desc.rasterization.line_width)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(sample_count_to_vk(desc.samples));

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(desc.depth_stencil.stencil_test_enable);

        let mut color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(desc.color_blend.blend_enable);
        if desc.color_blend.blend_enable {
            color_blend_attachment = color_blend_attachment
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD);
        }
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(temp_render_pass.render_pass)
            .subpass(desc.subpass);

        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        }
        .map_err(|e| {
            engine_error!(SOURCE, "Failed to create graphics pipeline: {:?}", e.1);
            Error::PipelineCreation(format!("Failed to create graphics pipeline: {:?}", e.1))
        })?;

        Ok(pipelines[0])
    }
}

impl RendererPipeline for Pipeline {
    fn signature(&self) -> &RenderPassSignature {
        &self.signature
    }

    fn layout(&self) -> &Arc<dyn RendererPipelineLayout> {
        &self.layout
    }

    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn has_dynamic_viewport(&self) -> bool {
        self.dynamic_viewport
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
