//! Unit tests for shader reflection checks (no GPU needed)

use sandbox_3d_engine::sandbox3d::render::SPIRV_MAGIC;
use super::*;

fn reflection(entry_points: &[&str], push_constant_size: Option<u32>) -> ShaderReflection {
    ShaderReflection {
        entry_points: entry_points.iter().map(|s| s.to_string()).collect(),
        push_constant_size,
    }
}

fn vertex_range(offset: u32, size: u32) -> PushConstantRange {
    PushConstantRange { stages: vec![ShaderStage::Vertex], offset, size }
}

#[test]
fn test_main_entry_point_required() {
    let result = check_reflection("a.vert", ShaderStage::Vertex, &reflection(&["start"], None), &[]);
    assert!(matches!(result, Err(Error::PipelineCreation(_))));

    assert!(check_reflection("a.vert", ShaderStage::Vertex, &reflection(&["main"], None), &[]).is_ok());
}

#[test]
fn test_push_constant_block_fits_range() {
    let mvp = reflection(&["main"], Some(64));
    assert!(check_reflection("simple.vert", ShaderStage::Vertex, &mvp, &[vertex_range(0, 64)]).is_ok());
    assert!(check_reflection("simple.vert", ShaderStage::Vertex, &mvp, &[vertex_range(0, 128)]).is_ok());

    let result = check_reflection("simple.vert", ShaderStage::Vertex, &mvp, &[vertex_range(0, 32)]);
    assert!(matches!(result, Err(Error::PipelineCreation(_))));
}

#[test]
fn test_push_constant_range_must_cover_stage() {
    let uses_push = reflection(&["main"], Some(16));
    let result = check_reflection("simple.frag", ShaderStage::Fragment, &uses_push, &[vertex_range(0, 64)]);
    assert!(matches!(result, Err(Error::PipelineCreation(_))));

    let shared = PushConstantRange { stages: vec![ShaderStage::Vertex, ShaderStage::Fragment], offset: 0, size: 64 };
    assert!(check_reflection("simple.frag", ShaderStage::Fragment, &uses_push, &[shared]).is_ok());
}

#[test]
fn test_header_only_module_rejected() {
    let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    let binary = ShaderBinary::from_bytes("empty.spv", &bytes).unwrap();

    let result = reflect_shader(&binary)
        .and_then(|r| check_reflection(binary.label(), ShaderStage::Vertex, &r, &[]));
    assert!(result.is_err());
}

#[test]
fn test_descriptor_types() {
    assert_eq!(descriptor_type_to_vk(DescriptorType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
}
