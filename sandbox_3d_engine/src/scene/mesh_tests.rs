use glam::Vec3;
use crate::error::Error;
use crate::renderer::mock_device::{mock_signature, MockCommandList, MockDevice};
use crate::renderer::{Buffer, BufferUsage, MemoryLocation, VertexFormat};
use super::*;

// ============================================================================
// Vertex layout
// ============================================================================

#[test]
fn test_vertex_size_and_layout() {
    assert_eq!(std::mem::size_of::<Vertex>(), 44);

    let layout = Vertex::layout();
    assert!(layout.validate().is_ok());
    assert_eq!(layout.bindings.len(), 1);
    assert_eq!(layout.bindings[0].stride, 44);

    let offsets: Vec<u32> = layout.attributes.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 12, 24, 36]);
    assert_eq!(layout.attributes[3].format, VertexFormat::R32G32_SFLOAT);
}

// ============================================================================
// Procedural geometry
// ============================================================================

#[test]
fn test_cube_counts_and_face_colors() {
    let cube = MeshData::cube();
    assert_eq!(cube.vertices.len(), 24);
    assert_eq!(cube.index_count(), 36);
    assert_eq!(cube.vertices[0].color, Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(cube.vertices[20].color, Vec3::new(0.0, 1.0, 1.0));
    assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
}

#[test]
fn test_cube_vertices_inside_unit_box() {
    for v in MeshData::cube().vertices {
        assert!(v.position.abs().max_element() <= 0.5);
        assert_eq!(v.normal.length(), 1.0);
    }
}

#[test]
fn test_plane_faces_up() {
    let plane = MeshData::plane(10.0);
    assert_eq!(plane.vertices.len(), 4);
    assert_eq!(plane.indices, vec![0, 1, 2, 2, 3, 0]);
    assert!(plane.vertices.iter().all(|v| v.normal == Vec3::Y && v.position.y == 0.0));
    assert_eq!(plane.vertices[2].position, Vec3::new(5.0, 0.0, 5.0));
}

#[test]
fn test_sphere_counts() {
    let sphere = MeshData::sphere(1.0, 8);
    assert_eq!(sphere.vertices.len(), 9 * 9);
    assert_eq!(sphere.indices.len(), 8 * 8 * 6);
    assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
}

#[test]
fn test_sphere_points_on_radius() {
    let sphere = MeshData::sphere(2.5, 12);
    for v in &sphere.vertices {
        assert!((v.position.length() - 2.5).abs() < 1e-4);
    }
    assert!((sphere.vertices[0].position - Vec3::new(0.0, 2.5, 0.0)).length() < 1e-5);
}

#[test]
fn test_sphere_segments_clamped() {
    let sphere = MeshData::sphere(1.0, 0);
    assert_eq!(sphere.vertices.len(), 16);
}

// ============================================================================
// GPU mesh
// ============================================================================

#[test]
fn test_mesh_upload_releases_staging() {
    let device = MockDevice::new();
    let mesh = Mesh::new(&device, &MeshData::cube()).unwrap();

    assert_eq!(mesh.vertex_count(), 24);
    assert_eq!(mesh.index_count(), 36);
    assert_eq!(device.live_buffer_count(), 2);
    assert_eq!(mesh.vertex_buffer().size(), 24 * 44);
    assert_eq!(mesh.index_buffer().size(), 36 * 4);
    assert_eq!(mesh.vertex_buffer().location(), MemoryLocation::GpuOnly);
    assert!(mesh.index_buffer().usage().contains(BufferUsage::INDEX));

    drop(mesh);
    assert_eq!(device.live_buffer_count(), 0);
}

#[test]
fn test_mesh_rejects_empty_data() {
    let device = MockDevice::new();
    let result = Mesh::new(&device, &MeshData::default());
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_mesh_rejects_out_of_range_index() {
    let device = MockDevice::new();
    let mut data = MeshData::plane(1.0);
    data.indices[5] = 4;
    assert!(matches!(Mesh::new(&device, &data), Err(Error::InvalidResource(_))));
}

#[test]
fn test_mesh_out_of_memory() {
    let device = MockDevice::with_memory_limit(64);
    let result = Mesh::new(&device, &MeshData::cube());
    assert!(matches!(result, Err(Error::OutOfMemory)));
}

#[test]
fn test_mesh_draw_without_pipeline_is_rejected() {
    let device = MockDevice::new();
    let mesh = Mesh::new(&device, &MeshData::plane(1.0)).unwrap();
    let mut cmd = MockCommandList::new(mock_signature());

    assert!(matches!(mesh.draw(&mut cmd), Err(Error::InvalidAccess(_))));
}
