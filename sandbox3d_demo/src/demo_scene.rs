//! Demo scene: a spinning cube above a floor, with a sphere beside it

use sandbox_3d_engine::glam::Vec3;
use sandbox_3d_engine::sandbox3d::render::{GraphicsDevice, RenderPassSignature};
use sandbox_3d_engine::sandbox3d::scene::{
    Entity, Material, MaterialComponent, Mesh, MeshComponent, MeshData, Name, SimpleMaterial, Transform, World,
};
use sandbox_3d_engine::sandbox3d::Result;
use std::sync::Arc;

/// Degrees per second
const CUBE_SPIN_SPEED: f32 = 45.0;

pub struct DemoScene {
    pub world: World,
    cube: Entity,
    cube_angle: f32,
}

impl DemoScene {
    pub fn new(device: &dyn GraphicsDevice, signature: RenderPassSignature) -> Result<Self> {
        let material: Arc<dyn Material> = Arc::new(SimpleMaterial::new(device, signature)?);
        let mut world = World::new();

        let cube = spawn(&mut world, "Cube", Mesh::new(device, &MeshData::cube())?, &material, Transform::default());
        spawn(
            &mut world,
            "Floor",
            Mesh::new(device, &MeshData::plane(10.0))?,
            &material,
            Transform::from_position(Vec3::new(0.0, -1.0, 0.0)),
        );
        spawn(
            &mut world,
            "Sphere",
            Mesh::new(device, &MeshData::sphere(0.6, 24))?,
            &material,
            Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
        );

        Ok(Self { world, cube, cube_angle: 0.0 })
    }

    pub fn update(&mut self, delta_time: f32) {
        self.cube_angle = (self.cube_angle + CUBE_SPIN_SPEED * delta_time) % 360.0;
        let rotation = Vec3::new(self.cube_angle.to_radians() * 0.5, self.cube_angle.to_radians(), 0.0);
        if let Some(transform) = self.world.get_component_mut::<Transform>(self.cube) {
            *transform = Transform::from_position_rotation_scale(Vec3::ZERO, rotation, Vec3::ONE);
        }
    }
}

fn spawn(world: &mut World, name: &str, mesh: Mesh, material: &Arc<dyn Material>, transform: Transform) -> Entity {
    let entity = world.create_entity();
    world.add_component(entity, Name::new(name));
    world.add_component(entity, MeshComponent::new(Arc::new(mesh)));
    world.add_component(entity, MaterialComponent::new(Arc::clone(material)));
    world.add_component(entity, transform);
    entity
}
