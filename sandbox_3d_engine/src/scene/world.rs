/// World - minimal entity/component registry.
///
/// Entities are slotmap keys, so a removed entity's key never aliases a
/// later one. Each entity owns a type-keyed map of boxed components; the
/// box carries the component's destructor, so removing an entity or
/// dropping the world releases every component it held.

use std::any::{Any, TypeId};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to an entity in a `World`
    pub struct Entity;
}

type ComponentMap = FxHashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Marker for types storable as components
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

/// Component tuple usable with `World::entities_with`
pub trait ComponentQuery {
    fn matches(components: &ComponentMap) -> bool;
}

macro_rules! impl_component_query {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentQuery for ($($name,)+) {
            fn matches(components: &ComponentMap) -> bool {
                $(components.contains_key(&TypeId::of::<$name>()))&&+
            }
        }
    };
}

impl_component_query!(A);
impl_component_query!(A, B);
impl_component_query!(A, B, C);

#[derive(Default)]
pub struct World {
    entities: SlotMap<Entity, ComponentMap>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== ENTITIES =====

    /// Create an entity with no components
    pub fn create_entity(&mut self) -> Entity {
        self.entities.insert(ComponentMap::default())
    }

    /// Destroy an entity and drop its components
    ///
    /// Returns false if the entity did not exist.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        self.entities.remove(entity).is_some()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All live entities in storage order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    // ===== COMPONENTS =====

    /// Attach `component`, replacing any existing component of the same type
    ///
    /// Returns the replaced component. Adding to a destroyed entity is a
    /// no-op that hands the component back.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        let Some(components) = self.entities.get_mut(entity) else {
            return Some(component);
        };
        components
            .insert(TypeId::of::<T>(), Box::new(component))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Detach and return the component of type `T`
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.entities
            .get_mut(entity)?
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.entities
            .get(entity)?
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.entities
            .get_mut(entity)?
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|components| components.contains_key(&TypeId::of::<T>()))
    }

    /// Entities carrying every component type of the tuple `Q`
    ///
    /// ```ignore
    /// for entity in world.entities_with::<(Transform, MeshComponent)>() { .. }
    /// ```
    pub fn entities_with<Q: ComponentQuery>(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|(_, components)| Q::matches(components))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Drop every entity and component
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
