//! Scene module
//!
//! Drawable resources (mesh, material), the entity registry that feeds
//! them to the renderer, and the forward render pass.

mod components;
mod drawable;
mod forward_pass;
mod material;
mod mesh;
mod world;

pub use components::{Aabb, MaterialComponent, MeshComponent, Name, Pickable, Transform};
pub use drawable::{Drawable, DrawableSet};
pub use forward_pass::ForwardPass;
pub use material::{Material, SimpleMaterial};
pub use mesh::{Mesh, MeshData, Vertex};
pub use world::{Component, ComponentQuery, Entity, World};
