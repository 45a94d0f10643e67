//! Materials - a pipeline plus the per-draw data it expects

use std::path::PathBuf;
use std::sync::Arc;
use glam::Mat4;
use crate::error::Result;
use crate::renderer::{
    CommandList, CompareOp, CullMode, FrontFace, GraphicsDevice, Pipeline, PipelineBuilder,
    PolygonMode, PrimitiveTopology, PushConstantRange, RenderPassSignature, SampleCount,
    ShaderStage,
};
use super::mesh::Vertex;

/// Material bound before each draw
pub trait Material: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn pipeline(&self) -> &Arc<dyn Pipeline>;

    /// Bind the pipeline (and any material resources)
    fn bind(&self, cmd: &mut dyn CommandList) -> Result<()> {
        cmd.bind_pipeline(self.pipeline())
    }

    /// Hand the model-view-projection matrix to the shaders
    ///
    /// Materials that do not consume a transform keep the default no-op.
    fn set_transform(&self, _cmd: &mut dyn CommandList, _mvp: &Mat4) -> Result<()> {
        Ok(())
    }
}

/// Unlit vertex-color material: MVP as a 64-byte vertex push constant
pub struct SimpleMaterial {
    name: String,
    pipeline: Arc<dyn Pipeline>,
}

impl SimpleMaterial {
    pub const VERTEX_SHADER: &'static str = "shaders/compiled/simple.vert.spv";
    pub const FRAGMENT_SHADER: &'static str = "shaders/compiled/simple.frag.spv";
    /// Bytes of push-constant data (one column-major `Mat4`)
    pub const PUSH_CONSTANT_SIZE: u32 = 64;

    /// Build with the default shader paths
    pub fn new(device: &dyn GraphicsDevice, signature: RenderPassSignature) -> Result<Self> {
        Self::with_shaders(device, signature, Self::VERTEX_SHADER, Self::FRAGMENT_SHADER)
    }

    /// Build with explicit SPIR-V paths
    pub fn with_shaders(
        device: &dyn GraphicsDevice,
        signature: RenderPassSignature,
        vertex_shader: impl Into<PathBuf>,
        fragment_shader: impl Into<PathBuf>,
    ) -> Result<Self> {
        let pipeline = Self::builder(signature)
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .build(device)?;
        Ok(Self { name: "Simple Material".to_string(), pipeline })
    }

    /// Pipeline configuration shared by every SimpleMaterial
    pub fn builder(signature: RenderPassSignature) -> PipelineBuilder {
        PipelineBuilder::new()
            .vertex_layout(Vertex::layout())
            .topology(PrimitiveTopology::TriangleList)
            .polygon_mode(PolygonMode::Fill)
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::CounterClockwise)
            .samples(SampleCount::S1)
            .depth_test(true, true, CompareOp::Less)
            .blending(false)
            .push_constant_range(PushConstantRange {
                stages: vec![ShaderStage::Vertex],
                offset: 0,
                size: Self::PUSH_CONSTANT_SIZE,
            })
            .render_pass(signature, 0)
    }

    /// Wrap an already-built pipeline
    pub fn from_pipeline(name: impl Into<String>, pipeline: Arc<dyn Pipeline>) -> Self {
        Self { name: name.into(), pipeline }
    }
}

impl Material for SimpleMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn pipeline(&self) -> &Arc<dyn Pipeline> {
        &self.pipeline
    }

    fn set_transform(&self, cmd: &mut dyn CommandList, mvp: &Mat4) -> Result<()> {
        cmd.push_constants(&[ShaderStage::Vertex], 0, bytemuck::bytes_of(mvp))
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
