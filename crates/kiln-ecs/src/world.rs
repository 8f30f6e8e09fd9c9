//! KilnWorld - hecs world with stable ids and named entities

use crate::components::{AnimationComponent, LightComponent, MeshComponent};
use bimap::BiMap;
use kiln_core::{EntityId, IdAllocator, KilnError, Result, Transform};
use std::collections::HashMap;

/// The ECS world for Kiln
///
/// Wraps hecs::World with:
/// - Stable EntityId mapping
/// - Named entity lookup
/// - The per-frame render queries
pub struct KilnWorld {
    world: hecs::World,
    /// Bidirectional mapping: EntityId <-> hecs::Entity
    id_map: BiMap<EntityId, hecs::Entity>,
    /// Entity name -> EntityId mapping
    name_map: HashMap<String, EntityId>,
    ids: IdAllocator,
}

impl Default for KilnWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl KilnWorld {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            id_map: BiMap::new(),
            name_map: HashMap::new(),
            ids: IdAllocator::default(),
        }
    }

    /// Spawn a new empty entity with a unique name
    pub fn spawn(&mut self, name: impl Into<String>) -> Result<EntityId> {
        let name = name.into();
        if self.name_map.contains_key(&name) {
            return Err(KilnError::DuplicateEntityName(name));
        }

        let id = self.ids.allocate();
        self.register(id, name);
        Ok(id)
    }

    /// Spawn an entity with a pinned id (scene files)
    pub fn spawn_with_id(&mut self, id: EntityId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.name_map.contains_key(&name) {
            return Err(KilnError::DuplicateEntityName(name));
        }
        if self.id_map.contains_left(&id) {
            return Err(KilnError::SceneError(format!("entity id {} already in use", id)));
        }

        self.ids.reserve_through(id);
        self.register(id, name);
        Ok(())
    }

    fn register(&mut self, id: EntityId, name: String) {
        let entity = self.world.spawn(());
        self.id_map.insert(id, entity);
        self.name_map.insert(name, id);
    }

    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        let entity = self
            .id_map
            .get_by_left(&id)
            .copied()
            .ok_or_else(|| KilnError::EntityNotFound(id.to_string()))?;

        self.world
            .despawn(entity)
            .map_err(|_| KilnError::EntityNotFound(id.to_string()))?;

        self.id_map.remove_by_left(&id);
        self.name_map.retain(|_, v| *v != id);
        Ok(())
    }

    /// Attach (or replace) a component
    pub fn insert<C: hecs::Component>(&mut self, id: EntityId, component: C) -> Result<()> {
        let entity = self.entity(id)?;
        self.world
            .insert_one(entity, component)
            .map_err(|_| KilnError::EntityNotFound(id.to_string()))
    }

    pub fn remove<C: hecs::Component>(&mut self, id: EntityId) -> Result<C> {
        let entity = self.entity(id)?;
        self.world
            .remove_one::<C>(entity)
            .map_err(|_| KilnError::EntityNotFound(id.to_string()))
    }

    /// Copy a component out of an entity
    pub fn get<C: hecs::Component + Clone>(&self, id: EntityId) -> Option<C> {
        let entity = self.id_map.get_by_left(&id)?;
        self.world
            .get::<&C>(*entity)
            .ok()
            .map(|c| (*c).clone())
    }

    pub fn get_id(&self, name: &str) -> Option<EntityId> {
        self.name_map.get(name).copied()
    }

    pub fn get_name(&self, id: EntityId) -> Option<&str> {
        self.name_map
            .iter()
            .find(|(_, v)| **v == id)
            .map(|(k, _)| k.as_str())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.id_map.contains_left(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.name_map.len()
    }

    pub fn clear(&mut self) {
        self.world.clear();
        self.id_map.clear();
        self.name_map.clear();
    }

    fn entity(&self, id: EntityId) -> Result<hecs::Entity> {
        self.id_map
            .get_by_left(&id)
            .copied()
            .ok_or_else(|| KilnError::EntityNotFound(id.to_string()))
    }

    fn stable_id(&self, entity: hecs::Entity) -> Option<EntityId> {
        self.id_map.get_by_right(&entity).copied()
    }

    /// Entities with a transform and mesh but no animation component
    pub fn each_static_mesh(&self, mut f: impl FnMut(EntityId, &Transform, &MeshComponent)) {
        let mut query = self
            .world
            .query::<(&Transform, &MeshComponent)>()
            .without::<&AnimationComponent>();
        for (entity, (transform, mesh)) in query.iter() {
            if let Some(id) = self.stable_id(entity) {
                f(id, transform, mesh);
            }
        }
    }

    /// Entities with a transform, mesh and animation component
    pub fn each_animated_mesh(
        &self,
        mut f: impl FnMut(EntityId, &Transform, &MeshComponent, &AnimationComponent),
    ) {
        let mut query = self
            .world
            .query::<(&Transform, &MeshComponent, &AnimationComponent)>();
        for (entity, (transform, mesh, anim)) in query.iter() {
            if let Some(id) = self.stable_id(entity) {
                f(id, transform, mesh, anim);
            }
        }
    }

    /// Entities with a transform and light
    pub fn each_light(&self, mut f: impl FnMut(EntityId, &Transform, &LightComponent)) {
        let mut query = self.world.query::<(&Transform, &LightComponent)>();
        for (entity, (transform, light)) in query.iter() {
            if let Some(id) = self.stable_id(entity) {
                f(id, transform, light);
            }
        }
    }

    /// Step every animation clock by `dt` seconds
    pub fn advance_animations(&mut self, dt: f32) {
        for (_, anim) in self.world.query_mut::<&mut AnimationComponent>() {
            anim.advance(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn mesh_entity(world: &mut KilnWorld, name: &str, model: &str) -> EntityId {
        let id = world.spawn(name).unwrap();
        world.insert(id, Transform::default()).unwrap();
        world.insert(id, MeshComponent::new(model)).unwrap();
        id
    }

    #[test]
    fn test_spawn_and_get() {
        let mut world = KilnWorld::new();
        let id = world.spawn("test_entity").unwrap();

        assert!(world.contains(id));
        assert_eq!(world.get_id("test_entity"), Some(id));
        assert_eq!(world.get_name(id), Some("test_entity"));
    }

    #[test]
    fn test_despawn() {
        let mut world = KilnWorld::new();
        let id = world.spawn("test_entity").unwrap();
        world.despawn(id).unwrap();

        assert!(!world.contains(id));
        assert_eq!(world.get_id("test_entity"), None);
        assert!(matches!(world.despawn(id), Err(KilnError::EntityNotFound(_))));
    }

    #[test]
    fn test_duplicate_name() {
        let mut world = KilnWorld::new();
        world.spawn("test").unwrap();

        assert!(matches!(
            world.spawn("test"),
            Err(KilnError::DuplicateEntityName(_))
        ));
    }

    #[test]
    fn test_spawn_with_id_keeps_allocator_ahead() {
        let mut world = KilnWorld::new();
        world.spawn_with_id(EntityId::from_raw(40), "pinned").unwrap();
        let next = world.spawn("free").unwrap();
        assert!(next.raw() > 40);
    }

    #[test]
    fn test_query_partitioning() {
        let mut world = KilnWorld::new();
        let rock = mesh_entity(&mut world, "rock", "rock.glb");
        let fox = mesh_entity(&mut world, "fox", "fox.glb");
        world.insert(fox, AnimationComponent::default()).unwrap();
        let sun = world.spawn("sun").unwrap();
        world.insert(sun, Transform::default()).unwrap();
        world.insert(sun, LightComponent::default()).unwrap();
        // no transform: never rendered
        let orphan = world.spawn("orphan").unwrap();
        world.insert(orphan, MeshComponent::new("rock.glb")).unwrap();

        let mut statics = Vec::new();
        world.each_static_mesh(|id, _, mesh| statics.push((id, mesh.model.clone())));
        assert_eq!(statics, vec![(rock, "rock.glb".to_string())]);

        let mut animated = Vec::new();
        world.each_animated_mesh(|id, _, _, _| animated.push(id));
        assert_eq!(animated, vec![fox]);

        let mut lights = Vec::new();
        world.each_light(|id, _, _| lights.push(id));
        assert_eq!(lights, vec![sun]);
    }

    #[test]
    fn test_advance_animations() {
        let mut world = KilnWorld::new();
        let fox = mesh_entity(&mut world, "fox", "fox.glb");
        world.insert(fox, AnimationComponent::default()).unwrap();

        world.advance_animations(0.5);
        world.advance_animations(0.25);
        let anim = world.get::<AnimationComponent>(fox).unwrap();
        assert_eq!(anim.time, 0.75);
    }

    #[test]
    fn test_insert_replaces() {
        let mut world = KilnWorld::new();
        let id = mesh_entity(&mut world, "a", "a.glb");
        world
            .insert(id, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert_eq!(
            world.get::<Transform>(id).unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
        let removed = world.remove::<MeshComponent>(id).unwrap();
        assert_eq!(removed.model, "a.glb");
        assert!(world.get::<MeshComponent>(id).is_none());
    }
}
