//! Built-in components

use std::sync::Arc;
use glam::{Mat4, Vec3};
use super::material::Material;
use super::mesh::Mesh;

/// Model matrix of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Mat4::IDENTITY }
    }
}

impl Transform {
    pub fn new(matrix: Mat4) -> Self {
        Self { matrix }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { matrix: Mat4::from_translation(position) }
    }

    /// Translate, then rotate about X, Y and Z (radians), then scale
    pub fn from_position_rotation_scale(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        let matrix = Mat4::from_translation(position)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_z(rotation.z)
            * Mat4::from_scale(scale);
        Self { matrix }
    }

    /// Translation column of the matrix
    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }
}

/// Geometry reference; `None` entities are skipped by the forward pass
#[derive(Clone, Default)]
pub struct MeshComponent {
    pub mesh: Option<Arc<Mesh>>,
}

impl MeshComponent {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh: Some(mesh) }
    }
}

/// Material reference; `None` entities are skipped by the forward pass
#[derive(Clone, Default)]
pub struct MaterialComponent {
    pub material: Option<Arc<dyn Material>>,
}

impl MaterialComponent {
    pub fn new(material: Arc<dyn Material>) -> Self {
        Self { material: Some(material) }
    }
}

/// Display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Default for Name {
    fn default() -> Self {
        Self("Entity".to_string())
    }
}

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Marks an entity as selectable by picking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pickable {
    pub pick_id: u32,
    pub is_selected: bool,
}

/// Axis-aligned bounding box in local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self { min: Vec3::splat(-0.5), max: Vec3::splat(0.5) }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size along each axis
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

#[cfg(test)]
#[path = "components_tests.rs"]
mod tests;
