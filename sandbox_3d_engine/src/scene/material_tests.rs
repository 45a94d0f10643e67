use std::sync::atomic::Ordering;
use glam::Mat4;
use crate::error::Error;
use crate::renderer::mock_device::{mock_shader, mock_signature, MockCommandList, MockDevice};
use crate::renderer::{CommandList, CullMode, RenderPassSignature, SampleCount, ShaderStage, TextureFormat};
use super::*;

fn build_simple_material(device: &MockDevice, signature: RenderPassSignature) -> crate::error::Result<SimpleMaterial> {
    let pipeline = SimpleMaterial::builder(signature)
        .vertex_shader_binary(mock_shader("simple.vert"))
        .fragment_shader_binary(mock_shader("simple.frag"))
        .build(device)?;
    Ok(SimpleMaterial::from_pipeline("Simple Material", pipeline))
}

#[test]
fn test_simple_material_pipeline_layout() {
    let device = MockDevice::new();
    let material = build_simple_material(&device, mock_signature()).unwrap();

    assert_eq!(material.name(), "Simple Material");
    assert_eq!(device.pipelines_created.load(Ordering::SeqCst), 1);

    let layout = material.pipeline().layout().desc();
    assert!(layout.descriptor_sets.is_empty());
    assert_eq!(layout.push_constant_ranges.len(), 1);
    assert_eq!(layout.push_constant_ranges[0].stages, vec![ShaderStage::Vertex]);
    assert_eq!(layout.push_constant_ranges[0].offset, 0);
    assert_eq!(layout.push_constant_ranges[0].size, SimpleMaterial::PUSH_CONSTANT_SIZE);
    assert_eq!(material.pipeline().subpass(), 0);
    assert!(material.pipeline().has_dynamic_viewport());
}

#[test]
fn test_simple_material_requires_depth_attachment() {
    let device = MockDevice::new();
    let signature = RenderPassSignature {
        color_format: TextureFormat::B8G8R8A8_SRGB,
        depth_format: None,
        samples: SampleCount::S1,
    };
    let result = build_simple_material(&device, signature);
    assert!(matches!(result, Err(Error::PipelineCreation(_))));
}

#[test]
fn test_simple_material_missing_shader_file() {
    let device = MockDevice::new();
    let result = SimpleMaterial::with_shaders(
        &device,
        mock_signature(),
        "does/not/exist.vert.spv",
        "does/not/exist.frag.spv",
    );
    assert!(matches!(result, Err(Error::ShaderLoad(_))));
    assert_eq!(device.pipelines_created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_builder_can_be_customized() {
    let device = MockDevice::new();
    let pipeline = SimpleMaterial::builder(mock_signature())
        .cull_mode(CullMode::None)
        .vertex_shader_binary(mock_shader("a"))
        .fragment_shader_binary(mock_shader("b"))
        .build(&device)
        .unwrap();
    let material = SimpleMaterial::from_pipeline("Double Sided", pipeline);
    assert_eq!(material.name(), "Double Sided");
}

#[test]
fn test_bind_then_set_transform_pushes_matrix() {
    let device = MockDevice::new();
    let material = build_simple_material(&device, mock_signature()).unwrap();
    let mut cmd = MockCommandList::new(mock_signature());

    material.bind(&mut cmd).unwrap();
    material.set_transform(&mut cmd, &Mat4::IDENTITY).unwrap();

    assert_eq!(cmd.commands, vec!["bind_pipeline", "push_constants 64 bytes"]);
}

#[test]
fn test_set_transform_before_bind_fails() {
    let device = MockDevice::new();
    let material = build_simple_material(&device, mock_signature()).unwrap();
    let mut cmd = MockCommandList::new(mock_signature());

    let result = material.set_transform(&mut cmd, &Mat4::IDENTITY);
    assert!(matches!(result, Err(Error::InvalidAccess(_))));
}

#[test]
fn test_bind_in_incompatible_render_pass_fails() {
    let device = MockDevice::new();
    let material = build_simple_material(&device, mock_signature()).unwrap();
    let mut cmd = MockCommandList::new(RenderPassSignature {
        color_format: TextureFormat::R8G8B8A8_UNORM,
        depth_format: Some(TextureFormat::D32_SFLOAT),
        samples: SampleCount::S1,
    });

    assert!(matches!(material.bind(&mut cmd), Err(Error::InvalidAccess(_))));
    assert!(cmd.commands.is_empty());
}

/// Material relying on the default no-op transform
struct FlatMaterial(std::sync::Arc<dyn crate::renderer::Pipeline>);

impl Material for FlatMaterial {
    fn name(&self) -> &str {
        "Flat"
    }

    fn pipeline(&self) -> &std::sync::Arc<dyn crate::renderer::Pipeline> {
        &self.0
    }
}

#[test]
fn test_default_set_transform_records_nothing() {
    let device = MockDevice::new();
    let simple = build_simple_material(&device, mock_signature()).unwrap();
    let flat = FlatMaterial(simple.pipeline().clone());
    let mut cmd = MockCommandList::new(mock_signature());

    flat.bind(&mut cmd).unwrap();
    flat.set_transform(&mut cmd, &Mat4::IDENTITY).unwrap();
    assert_eq!(cmd.commands, vec!["bind_pipeline"]);
    assert!(cmd.render_pass_signature().is_compatible_with(&mock_signature()));
}
