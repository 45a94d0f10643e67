//! Per-frame drawable snapshot consumed by render passes

use std::sync::Arc;
use glam::Mat4;
use super::components::{MaterialComponent, MeshComponent, Transform};
use super::material::Material;
use super::mesh::Mesh;
use super::world::{Entity, World};

/// One entity's draw data
///
/// Mesh and material stay optional: passes skip incomplete drawables
/// instead of failing the frame.
#[derive(Clone)]
pub struct Drawable {
    pub entity: Option<Entity>,
    pub mesh: Option<Arc<Mesh>>,
    pub material: Option<Arc<dyn Material>>,
    pub transform: Mat4,
}

impl Drawable {
    pub fn new(mesh: Option<Arc<Mesh>>, material: Option<Arc<dyn Material>>, transform: Mat4) -> Self {
        Self { entity: None, mesh, material, transform }
    }

    pub fn is_complete(&self) -> bool {
        self.mesh.is_some() && self.material.is_some()
    }
}

/// Read-only drawable list for one frame
#[derive(Clone, Default)]
pub struct DrawableSet {
    drawables: Vec<Drawable>,
}

impl DrawableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every entity carrying a mesh, a material and a transform
    pub fn collect(world: &World) -> Self {
        let drawables = world
            .entities_with::<(MeshComponent, MaterialComponent, Transform)>()
            .into_iter()
            .filter_map(|entity| {
                let mesh = world.get_component::<MeshComponent>(entity)?;
                let material = world.get_component::<MaterialComponent>(entity)?;
                let transform = world.get_component::<Transform>(entity)?;
                Some(Drawable {
                    entity: Some(entity),
                    mesh: mesh.mesh.clone(),
                    material: material.material.clone(),
                    transform: transform.matrix,
                })
            })
            .collect();
        Self { drawables }
    }

    pub fn push(&mut self, drawable: Drawable) {
        self.drawables.push(drawable);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Drawable> {
        self.drawables.iter()
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

impl<'a> IntoIterator for &'a DrawableSet {
    type Item = &'a Drawable;
    type IntoIter = std::slice::Iter<'a, Drawable>;

    fn into_iter(self) -> Self::IntoIter {
        self.drawables.iter()
    }
}

impl FromIterator<Drawable> for DrawableSet {
    fn from_iter<I: IntoIterator<Item = Drawable>>(iter: I) -> Self {
        Self { drawables: iter.into_iter().collect() }
    }
}
