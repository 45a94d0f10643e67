/// Pipeline trait, pipeline descriptor and pipeline builder

use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::renderer::{Extent2D, GraphicsDevice, TextureFormat};

// ===== SHADERS =====

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// SPIR-V magic number (first word of every module)
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Validated SPIR-V module bytes
///
/// Only the container is checked here (word alignment and magic number).
/// The backend reflects the module before creating a shader stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    label: String,
    words: Vec<u32>,
}

impl ShaderBinary {
    /// Read a precompiled module from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::ShaderLoad(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_bytes(path.display().to_string(), &bytes)
    }

    /// Wrap in-memory SPIR-V bytes (little-endian words)
    pub fn from_bytes(label: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let label = label.into();
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return Err(Error::ShaderLoad(format!(
                "'{}' is {} bytes, not a whole number of SPIR-V words",
                label, bytes.len()
            )));
        }
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if words[0] != SPIRV_MAGIC {
            return Err(Error::ShaderLoad(format!(
                "'{}' has bad SPIR-V magic 0x{:08x}",
                label, words[0]
            )));
        }
        Ok(Self { label, words })
    }

    /// Path or name the module was loaded from
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }
}

// ===== VERTEX INPUT =====

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
}

impl VertexFormat {
    pub fn size_bytes(&self) -> u32 {
        match self {
            VertexFormat::R32_SFLOAT => 4,
            VertexFormat::R32G32_SFLOAT => 8,
            VertexFormat::R32G32B32_SFLOAT => 12,
            VertexFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    /// Data is per-vertex
    Vertex,
    /// Data is per-instance
    Instance,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    pub binding: u32,
    pub format: VertexFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Every attribute references a declared binding and fits inside its stride
    pub fn validate(&self) -> Result<()> {
        for attr in &self.attributes {
            let binding = self
                .bindings
                .iter()
                .find(|b| b.binding == attr.binding)
                .ok_or_else(|| Error::PipelineCreation(format!(
                    "Attribute at location {} uses undeclared binding {}",
                    attr.location, attr.binding
                )))?;
            if attr.offset + attr.format.size_bytes() > binding.stride {
                return Err(Error::PipelineCreation(format!(
                    "Attribute at location {} overruns the stride of binding {}",
                    attr.location, attr.binding
                )));
            }
        }
        Ok(())
    }
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

// ===== FIXED FUNCTION STATE =====

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    /// Wireframe
    Line,
    Point,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleCount {
    S1,
    S2,
    S4,
    S8,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
        }
    }
}

/// Depth and stencil testing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test_enable: bool,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            stencil_test_enable: false,
        }
    }
}

/// Color blend toggle
///
/// When enabled, standard alpha blending is used
/// (`src * srcAlpha + dst * (1 - srcAlpha)`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorBlendState {
    pub blend_enable: bool,
}

// ===== LAYOUT =====

/// Push constant range descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConstantRange {
    /// Shader stages that can access these push constants
    pub stages: Vec<ShaderStage>,
    /// Offset in bytes
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
}

impl PushConstantRange {
    /// True when `[offset, offset + len)` lies inside this range
    pub fn covers(&self, offset: u32, len: u32) -> bool {
        offset >= self.offset
            && offset.checked_add(len).is_some_and(|end| end <= self.offset + self.size)
    }
}

/// Descriptor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: Vec<ShaderStage>,
}

/// Descriptor for creating a pipeline layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDesc {
    /// One entry per descriptor set, in set order
    pub descriptor_sets: Vec<Vec<DescriptorBinding>>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl PipelineLayoutDesc {
    /// Push constant ranges must be 4-byte aligned and non-empty
    pub fn validate(&self) -> Result<()> {
        for range in &self.push_constant_ranges {
            if range.size == 0 || range.size % 4 != 0 || range.offset % 4 != 0 || range.stages.is_empty() {
                return Err(Error::PipelineCreation(format!(
                    "Invalid push constant range (offset {}, size {}, {} stage(s))",
                    range.offset, range.size, range.stages.len()
                )));
            }
        }
        Ok(())
    }
}

/// Pipeline layout resource (descriptor/push-constant contract)
pub trait PipelineLayout: Send + Sync {
    fn desc(&self) -> &PipelineLayoutDesc;
}

// ===== RENDER PASS SIGNATURE =====

/// Attachment formats and sample count a pipeline is built against
///
/// A pipeline may only be bound inside a render pass instance with an
/// equal signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassSignature {
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub samples: SampleCount,
}

impl RenderPassSignature {
    pub fn is_compatible_with(&self, other: &RenderPassSignature) -> bool {
        self == other
    }
}

// ===== PIPELINE =====

/// Fully resolved pipeline description handed to the device
#[derive(Clone)]
pub struct PipelineDesc {
    pub vertex_shader: ShaderBinary,
    pub fragment_shader: ShaderBinary,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    /// Static viewport/scissor; `None` makes both dynamic state
    pub viewport: Option<Extent2D>,
    pub rasterization: RasterizationState,
    pub samples: SampleCount,
    pub depth_stencil: DepthStencilState,
    pub color_blend: ColorBlendState,
    pub layout: Arc<dyn PipelineLayout>,
    pub signature: RenderPassSignature,
    pub subpass: u32,
}

/// Pipeline resource trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
/// The pipeline is automatically destroyed when dropped.
pub trait Pipeline: Send + Sync {
    /// Render pass signature the pipeline was built against
    fn signature(&self) -> &RenderPassSignature;

    fn layout(&self) -> &Arc<dyn PipelineLayout>;

    fn subpass(&self) -> u32;

    /// True when viewport and scissor must be set by the command list
    fn has_dynamic_viewport(&self) -> bool;
}

// ===== BUILDER =====

/// Where a shader stage comes from
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShaderSource {
    Path(PathBuf),
    Binary(ShaderBinary),
}

impl ShaderSource {
    fn load(&self) -> Result<ShaderBinary> {
        match self {
            ShaderSource::Path(path) => ShaderBinary::from_file(path),
            ShaderSource::Binary(binary) => Ok(binary.clone()),
        }
    }
}

/// Declarative pipeline configuration
///
/// Every setter consumes the builder and returns an updated copy; `build`
/// is the only place a `Pipeline` is produced.
///
/// ```no_run
/// use sandbox_3d_engine::sandbox3d::render::*;
/// # fn demo(device: &dyn GraphicsDevice, signature: RenderPassSignature) -> sandbox_3d_engine::sandbox3d::Result<()> {
/// let pipeline = PipelineBuilder::new()
///     .vertex_shader("shaders/compiled/simple.vert.spv")
///     .fragment_shader("shaders/compiled/simple.frag.spv")
///     .cull_mode(CullMode::None)
///     .render_pass(signature, 0)
///     .build(device)?;
/// # Ok(())
/// # }
/// ```
#[must_use]
#[derive(Clone)]
pub struct PipelineBuilder {
    vertex_shader: Option<ShaderSource>,
    fragment_shader: Option<ShaderSource>,
    vertex_layout: VertexLayout,
    topology: PrimitiveTopology,
    primitive_restart: bool,
    viewport: Option<Extent2D>,
    rasterization: RasterizationState,
    samples: SampleCount,
    depth_stencil: DepthStencilState,
    color_blend: ColorBlendState,
    descriptor_sets: Vec<Vec<DescriptorBinding>>,
    push_constant_ranges: Vec<PushConstantRange>,
    layout: Option<Arc<dyn PipelineLayout>>,
    render_pass: Option<(RenderPassSignature, u32)>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            viewport: None,
            rasterization: RasterizationState::default(),
            samples: SampleCount::S1,
            depth_stencil: DepthStencilState::default(),
            color_blend: ColorBlendState::default(),
            descriptor_sets: Vec::new(),
            push_constant_ranges: Vec::new(),
            layout: None,
            render_pass: None,
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vertex stage from a SPIR-V file (read at `build` time)
    pub fn vertex_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.vertex_shader = Some(ShaderSource::Path(path.into()));
        self
    }

    /// Fragment stage from a SPIR-V file (read at `build` time)
    pub fn fragment_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.fragment_shader = Some(ShaderSource::Path(path.into()));
        self
    }

    pub fn vertex_shader_binary(mut self, binary: ShaderBinary) -> Self {
        self.vertex_shader = Some(ShaderSource::Binary(binary));
        self
    }

    pub fn fragment_shader_binary(mut self, binary: ShaderBinary) -> Self {
        self.fragment_shader = Some(ShaderSource::Binary(binary));
        self
    }

    pub fn vertex_binding(mut self, binding: VertexBinding) -> Self {
        self.vertex_layout.bindings.push(binding);
        self
    }

    pub fn vertex_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.vertex_layout.attributes.push(attribute);
        self
    }

    /// Replace bindings and attributes at once
    pub fn vertex_layout(mut self, layout: VertexLayout) -> Self {
        self.vertex_layout = layout;
        self
    }

    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn primitive_restart(mut self, enable: bool) -> Self {
        self.primitive_restart = enable;
        self
    }

    /// Bake a static viewport and scissor of `extent`
    ///
    /// Without it both are dynamic and set per frame.
    pub fn viewport(mut self, extent: Extent2D) -> Self {
        self.viewport = Some(extent);
        self
    }

    pub fn polygon_mode(mut self, mode: PolygonMode) -> Self {
        self.rasterization.polygon_mode = mode;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.rasterization.cull_mode = mode;
        self
    }

    pub fn front_face(mut self, front_face: FrontFace) -> Self {
        self.rasterization.front_face = front_face;
        self
    }

    pub fn samples(mut self, samples: SampleCount) -> Self {
        self.samples = samples;
        self
    }

    pub fn depth_test(mut self, test: bool, write: bool, compare_op: CompareOp) -> Self {
        self.depth_stencil.depth_test_enable = test;
        self.depth_stencil.depth_write_enable = write;
        self.depth_stencil.depth_compare_op = compare_op;
        self
    }

    pub fn stencil_test(mut self, enable: bool) -> Self {
        self.depth_stencil.stencil_test_enable = enable;
        self
    }

    pub fn blending(mut self, enable: bool) -> Self {
        self.color_blend.blend_enable = enable;
        self
    }

    /// Append a descriptor set layout (set index = call order)
    pub fn descriptor_set_layout(mut self, bindings: Vec<DescriptorBinding>) -> Self {
        self.descriptor_sets.push(bindings);
        self
    }

    pub fn push_constant_range(mut self, range: PushConstantRange) -> Self {
        self.push_constant_ranges.push(range);
        self
    }

    /// Use an existing layout instead of creating one in `build`
    pub fn layout(mut self, layout: Arc<dyn PipelineLayout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Target render pass signature and subpass
    pub fn render_pass(mut self, signature: RenderPassSignature, subpass: u32) -> Self {
        self.render_pass = Some((signature, subpass));
        self
    }

    /// Load shaders, create the layout if needed and create the pipeline
    pub fn build(self, device: &dyn GraphicsDevice) -> Result<Arc<dyn Pipeline>> {
        let vertex_shader = self
            .vertex_shader
            .as_ref()
            .ok_or_else(|| Error::ShaderLoad("No vertex shader configured".to_string()))?
            .load()?;
        let fragment_shader = self
            .fragment_shader
            .as_ref()
            .ok_or_else(|| Error::ShaderLoad("No fragment shader configured".to_string()))?
            .load()?;

        let (signature, subpass) = self.render_pass.ok_or_else(|| {
            Error::PipelineCreation("No target render pass configured".to_string())
        })?;
        if signature.samples != self.samples {
            return Err(Error::PipelineCreation(format!(
                "Pipeline uses {:?} samples, render pass uses {:?}",
                self.samples, signature.samples
            )));
        }
        if self.depth_stencil.depth_test_enable && signature.depth_format.is_none() {
            return Err(Error::PipelineCreation(
                "Depth test enabled but the render pass has no depth attachment".to_string(),
            ));
        }
        self.vertex_layout.validate()?;

        let layout = match self.layout {
            Some(layout) => layout,
            None => {
                let layout_desc = PipelineLayoutDesc {
                    descriptor_sets: self.descriptor_sets,
                    push_constant_ranges: self.push_constant_ranges,
                };
                layout_desc.validate()?;
                device.create_pipeline_layout(&layout_desc)?
            }
        };

        device.create_pipeline(&PipelineDesc {
            vertex_shader,
            fragment_shader,
            vertex_layout: self.vertex_layout,
            topology: self.topology,
            primitive_restart: self.primitive_restart,
            viewport: self.viewport,
            rasterization: self.rasterization,
            samples: self.samples,
            depth_stencil: self.depth_stencil,
            color_blend: self.color_blend,
            layout,
            signature,
            subpass,
        })
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
