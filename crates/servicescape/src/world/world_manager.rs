//! World manager
//!
//! Owns every [`Entity`], drives their per-frame updates, keeps the spatial
//! grid in sync with their positions and answers proximity and visibility
//! queries. Removal is mark-then-sweep: [`WorldManager::remove_entity`] only
//! deactivates, and the entity is dropped at the end of the next
//! [`WorldManager::update`], after every entity has been updated.

use std::collections::HashMap;

use crate::core::config::{require_positive, ConfigError, WorldConfig};
use crate::foundation::math::Vec3;
use crate::render::{Camera, EntityDraw, InstanceData};
use crate::spatial::{GridCell, GridCoord, SpatialGrid};

use super::entity::{Entity, EntityId, EntityKind, EntityType};
use super::updates::{EntityUpdate, UpdateQueue};

/// Owner of all world entities
#[derive(Debug)]
pub struct WorldManager {
    config: WorldConfig,
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    grid: SpatialGrid,
    grid_stale: bool,
}

impl Default for WorldManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldManager {
    /// Empty world with default settings
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Empty world with validated settings
    pub fn with_config(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        log::info!(
            "World manager created (grid size {}, view distance {})",
            config.grid_size,
            config.view_distance
        );
        Self {
            grid: SpatialGrid::new(config.grid_size),
            config,
            entities: Vec::new(),
            index: HashMap::new(),
            grid_stale: false,
        }
    }

    /// Active settings
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Edge length of a grid cell
    pub fn grid_size(&self) -> f32 {
        self.grid.cell_size()
    }

    /// Distance used by [`unload_grids_beyond`](Self::unload_grids_beyond)
    pub fn view_distance(&self) -> f32 {
        self.config.view_distance
    }

    /// Change the view distance; must be positive and finite
    pub fn set_view_distance(&mut self, view_distance: f32) -> Result<(), ConfigError> {
        require_positive("view_distance", view_distance)?;
        self.config.view_distance = view_distance;
        Ok(())
    }

    // ----- Lifecycle -----

    /// Take ownership of an entity and start tracking it
    ///
    /// Active entities are placed in the grid immediately.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        if entity.is_active() {
            self.grid.insert(id, &entity.position());
        }
        log::debug!("Added {:?} entity {} ('{}')", entity.entity_type(), id, entity.mesh_name());
        self.index.insert(id, self.entities.len());
        self.entities.push(entity);
        id
    }

    /// Create an entity of `entity_type` using the configured tuning
    pub fn spawn(&mut self, entity_type: EntityType, mesh_name: impl Into<String>, position: Vec3) -> EntityId {
        let kind = EntityKind::from_type(entity_type, &self.config.player, &self.config.npc);
        self.add_entity(Entity::new(kind, mesh_name).with_position(position))
    }

    /// Mark an entity for removal on the next update
    ///
    /// Returns `false` when the id is unknown or already marked.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        match self.index.get(&id).map(|&i| &mut self.entities[i]) {
            Some(entity) if entity.is_active() => {
                entity.deactivate();
                true
            }
            _ => false,
        }
    }

    /// Advance one frame
    ///
    /// Updates every active entity in insertion order, re-buckets those that
    /// crossed a cell boundary, then drops every inactive entity.
    pub fn update(&mut self, dt: f32) {
        for entity in self.entities.iter_mut().filter(|e| e.is_active()) {
            entity.update(dt);
        }
        self.refresh_grid();
        self.sweep();
    }

    /// Bring grid membership in line with current positions
    pub fn refresh_grid(&mut self) {
        for entity in &self.entities {
            if entity.is_active() {
                if let Some((from, to)) = self.grid.relocate(entity.id(), &entity.position()) {
                    log::trace!("Entity {} moved from cell {:?} to {:?}", entity.id(), from, to);
                }
            } else {
                self.grid.remove(entity.id());
            }
        }
        self.grid_stale = false;
    }

    fn sweep(&mut self) {
        let before = self.entities.len();
        let grid = &mut self.grid;
        self.entities.retain(|entity| {
            if entity.is_active() {
                return true;
            }
            grid.remove(entity.id());
            false
        });

        let removed = before - self.entities.len();
        if removed > 0 {
            self.rebuild_index();
            log::debug!("Swept {} inactive entities", removed);
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, entity) in self.entities.iter().enumerate() {
            self.index.insert(entity.id(), i);
        }
    }

    // ----- Lookup -----

    /// Borrow an entity; `None` once it has been swept
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    /// Mutably borrow an entity
    ///
    /// The grid is reconciled on the next update, and radius queries scan
    /// linearly until then.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let i = *self.index.get(&id)?;
        self.grid_stale = true;
        Some(&mut self.entities[i])
    }

    /// Every tracked entity in insertion order, including those awaiting the sweep
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Active entities in insertion order
    pub fn active_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_active())
    }

    /// Number of tracked entities, including those awaiting the sweep
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of active entities
    pub fn active_count(&self) -> usize {
        self.active_entities().count()
    }

    // ----- Queries -----

    /// Active entities within `radius` of `center` (3D distance), in
    /// insertion order
    pub fn entities_in_radius(&self, center: Vec3, radius: f32) -> Vec<&Entity> {
        let radius_sq = radius * radius;
        let within = |entity: &&Entity| {
            entity.is_active() && (entity.position() - center).norm_squared() <= radius_sq
        };

        if self.grid_stale || !radius.is_finite() {
            return self.entities.iter().filter(within).collect();
        }

        let mut indices: Vec<usize> = self
            .grid
            .candidates_near(&center, radius)
            .into_iter()
            .filter_map(|id| self.index.get(&id).copied())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .map(|i| &self.entities[i])
            .filter(within)
            .collect()
    }

    /// Active entities whose position is inside the camera frustum
    pub fn visible_entities(&self, camera: &Camera) -> Vec<&Entity> {
        let view_projection = camera.view_projection_matrix();
        self.active_entities()
            .filter(|e| e.is_in_frustum(&view_projection))
            .collect()
    }

    /// Render instances for every visible entity
    pub fn draw_list(&self, camera: &Camera) -> Vec<EntityDraw<'_>> {
        self.visible_entities(camera)
            .into_iter()
            .map(|entity| EntityDraw {
                entity: entity.id(),
                mesh: entity.mesh_name(),
                instance: InstanceData::from_matrix(&entity.world_matrix()),
            })
            .collect()
    }

    // ----- Grid streaming -----

    /// Cell containing `position`
    pub fn grid_coord(&self, position: Vec3) -> GridCoord {
        self.grid.coord_of(&position)
    }

    /// Borrow a cell
    ///
    /// Membership reflects positions as of the last update, `apply_updates`
    /// or [`refresh_grid`](Self::refresh_grid); moves made through
    /// [`entity_mut`](Self::entity_mut) show up after that.
    pub fn grid(&self, coord: GridCoord) -> Option<&GridCell> {
        self.grid.cell(coord)
    }

    /// Number of loaded cells
    pub fn grid_count(&self) -> usize {
        self.grid.cell_count()
    }

    /// Loaded cells (unordered)
    pub fn grids(&self) -> impl Iterator<Item = &GridCell> {
        self.grid.cells()
    }

    /// Ensure a cell exists; returns `true` if it was created
    pub fn load_grid(&mut self, coord: GridCoord) -> bool {
        let created = self.grid.load(coord);
        if created {
            log::debug!("Loaded grid cell {:?}", coord);
        }
        created
    }

    /// Load a cell and add the content streamed in for it
    ///
    /// Entities are bucketed by their own positions, which need not fall in
    /// `coord`.
    pub fn load_grid_with(&mut self, coord: GridCoord, entities: impl IntoIterator<Item = Entity>) -> Vec<EntityId> {
        self.load_grid(coord);
        entities.into_iter().map(|entity| self.add_entity(entity)).collect()
    }

    /// Stream a cell out
    ///
    /// Non-player entities in the cell are marked for removal. Players stay,
    /// and the cell survives while any remain. Returns the number of entities
    /// marked.
    pub fn unload_grid(&mut self, coord: GridCoord) -> usize {
        if self.grid_stale {
            self.refresh_grid();
        }
        let Some(cell) = self.grid.cell(coord) else {
            return 0;
        };

        let members: Vec<EntityId> = cell.entities().to_vec();
        let mut streamed_out = 0;
        for id in members {
            let Some(&i) = self.index.get(&id) else {
                continue;
            };
            let entity = &mut self.entities[i];
            if entity.entity_type() == EntityType::Player {
                continue;
            }
            if entity.is_active() {
                entity.deactivate();
                streamed_out += 1;
            }
            self.grid.remove(id);
        }

        if self.grid.cell(coord).is_some_and(GridCell::is_empty) {
            self.grid.unload(coord);
            log::debug!("Unloaded grid cell {:?} ({} entities streamed out)", coord, streamed_out);
        } else {
            log::debug!("Grid cell {:?} kept alive by players ({} entities streamed out)", coord, streamed_out);
        }
        streamed_out
    }

    /// Unload every empty cell whose center is farther than the view distance
    /// from `center` on the XZ plane
    ///
    /// Returns the unloaded coordinates in sorted order.
    pub fn unload_grids_beyond(&mut self, center: Vec3) -> Vec<GridCoord> {
        if self.grid_stale {
            self.refresh_grid();
        }
        let cell_size = self.grid.cell_size();
        let limit_sq = self.config.view_distance * self.config.view_distance;
        let mut far: Vec<GridCoord> = self
            .grid
            .cells()
            .filter(|cell| cell.is_empty())
            .map(GridCell::coord)
            .filter(|coord| {
                let offset = coord.center(cell_size) - center;
                offset.x * offset.x + offset.z * offset.z > limit_sq
            })
            .collect();
        far.sort_unstable();

        for coord in &far {
            self.grid.unload(*coord);
        }
        if !far.is_empty() {
            log::debug!("Unloaded {} distant empty grid cells", far.len());
        }
        far
    }

    // ----- Off-thread updates -----

    /// Apply every queued update; returns how many hit a tracked entity
    pub fn apply_updates(&mut self, queue: &UpdateQueue) -> usize {
        let mut applied = 0;
        for update in queue.drain() {
            let id = update.id();
            let Some(&i) = self.index.get(&id) else {
                log::warn!("Dropping update for unknown entity {}", id);
                continue;
            };
            let entity = &mut self.entities[i];
            match update {
                EntityUpdate::SetPosition { position, .. } => entity.set_position(position),
                EntityUpdate::SetRotation { rotation, .. } => entity.transform_mut().set_rotation(rotation),
                EntityUpdate::SetScale { scale, .. } => entity.transform_mut().set_scale(scale),
                EntityUpdate::SetMetrics { metrics, .. } => entity.set_metrics(metrics),
                EntityUpdate::Remove { .. } => entity.deactivate(),
            }
            applied += 1;
        }
        if applied > 0 {
            self.refresh_grid();
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::core::config::{NpcConfig, PlayerConfig};
    use crate::world::{AiState, ServiceMetrics};

    fn object_at(x: f32, y: f32, z: f32) -> Entity {
        Entity::object("cube").with_position(Vec3::new(x, y, z))
    }

    fn ids(entities: &[&Entity]) -> Vec<EntityId> {
        entities.iter().map(|e| e.id()).collect()
    }

    #[test]
    fn test_add_assigns_increasing_ids_and_grid_cells() {
        let mut world = WorldManager::new();
        let added: Vec<EntityId> = (0..10)
            .map(|i| world.add_entity(object_at(i as f32 * 30.0, 0.0, 0.0)))
            .collect();

        assert!(added.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(world.entity_count(), 10);

        let cell = world.grid(GridCoord::new(0, 0)).unwrap();
        assert_eq!(cell.entities(), &added[..4]);
        assert!(world.grid(GridCoord::new(2, 0)).unwrap().contains(added[9]));
    }

    #[test]
    fn test_remove_is_deferred_until_update() {
        let mut world = WorldManager::new();
        let a = world.add_entity(object_at(0.0, 0.0, 0.0));
        let b = world.add_entity(object_at(1.0, 0.0, 0.0));
        let c = world.add_entity(object_at(2.0, 0.0, 0.0));

        assert!(world.remove_entity(b));
        assert!(!world.remove_entity(b));
        assert!(world.entity(b).is_some());
        assert_eq!(world.active_count(), 2);

        world.update(0.016);
        assert!(world.entity(b).is_none());
        assert_eq!(world.entity(a).unwrap().id(), a);
        assert_eq!(world.entity(c).unwrap().id(), c);
        assert!(!world.grid(GridCoord::new(0, 0)).unwrap().contains(b));
        assert!(!world.remove_entity(b));
    }

    #[test]
    fn test_removing_every_other_entity() {
        let mut world = WorldManager::new();
        let added: Vec<EntityId> = (0..6).map(|i| world.add_entity(object_at(i as f32, 0.0, 0.0))).collect();
        for id in added.iter().step_by(2) {
            world.remove_entity(*id);
        }
        world.update(0.016);

        let remaining: Vec<EntityId> = world.entities().map(Entity::id).collect();
        assert_eq!(remaining, vec![added[1], added[3], added[5]]);
        for id in &remaining {
            assert_eq!(world.entity(*id).unwrap().id(), *id);
        }
    }

    #[test]
    fn test_update_moves_entities_across_cells() {
        let mut world = WorldManager::new();
        let id = world.spawn(EntityType::Player, "avatar", Vec3::new(99.0, 0.0, 0.0));
        world.entity_mut(id).unwrap().as_player_mut().unwrap().move_dir(Vec3::x());

        world.update(1.0);
        assert_eq!(world.grid_coord(world.entity(id).unwrap().position()), GridCoord::new(1, 0));
        assert!(world.grid(GridCoord::new(1, 0)).unwrap().contains(id));
        assert!(world.grid(GridCoord::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_npc_patrols_through_manager() {
        let mut world = WorldManager::new();
        let mut npc = Entity::npc("guard", &NpcConfig::default());
        let state = npc.as_npc_mut().unwrap();
        state.add_patrol_point(Vec3::new(10.0, 0.0, 0.0));
        state.set_ai_state(AiState::Patrol);
        let id = world.add_entity(npc);

        world.update(1.0);
        assert_relative_eq!(world.entity(id).unwrap().position(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_radius_query_matches_brute_force() {
        let mut world = WorldManager::with_config(WorldConfig::default().with_grid_size(10.0)).unwrap();
        for x in -5..5 {
            for z in -5..5 {
                world.add_entity(object_at(x as f32 * 7.0, (x + z) as f32, z as f32 * 7.0));
            }
        }
        let removed = world.entities().nth(17).unwrap().id();
        world.remove_entity(removed);

        let center = Vec3::new(3.0, 0.0, -4.0);
        for radius in [0.0, 5.0, 12.5, 30.0, 1000.0] {
            let expected: Vec<EntityId> = world
                .active_entities()
                .filter(|e| (e.position() - center).norm() <= radius)
                .map(Entity::id)
                .collect();
            assert_eq!(ids(&world.entities_in_radius(center, radius)), expected, "radius {radius}");
        }
        assert!(!ids(&world.entities_in_radius(center, 1000.0)).contains(&removed));
    }

    #[test]
    fn test_radius_query_uses_3d_distance() {
        let mut world = WorldManager::new();
        let low = world.add_entity(object_at(0.0, 0.0, 0.0));
        world.add_entity(object_at(0.0, 50.0, 0.0));
        assert_eq!(ids(&world.entities_in_radius(Vec3::zeros(), 10.0)), vec![low]);
    }

    #[test]
    fn test_radius_query_sees_unreconciled_moves() {
        let mut world = WorldManager::new();
        let id = world.add_entity(object_at(0.0, 0.0, 0.0));
        world.entity_mut(id).unwrap().set_position(Vec3::new(450.0, 0.0, 450.0));
        assert_eq!(ids(&world.entities_in_radius(Vec3::new(450.0, 0.0, 450.0), 1.0)), vec![id]);
    }

    #[test]
    fn test_visible_entities_and_draw_list() {
        let mut world = WorldManager::new();
        let front = world.add_entity(object_at(0.0, 0.0, 0.0));
        world.add_entity(object_at(0.0, 0.0, 50.0));
        let hidden = world.add_entity(object_at(1.0, 0.0, 0.0));
        world.remove_entity(hidden);

        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), 60.0, 1.0, 0.1, 100.0);
        assert_eq!(ids(&world.visible_entities(&camera)), vec![front]);

        let draws = world.draw_list(&camera);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].entity, front);
        assert_eq!(draws[0].mesh, "cube");
        assert_eq!(draws[0].instance.model[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unload_streams_out_non_players() {
        let mut world = WorldManager::new();
        let object = world.add_entity(object_at(10.0, 0.0, 10.0));
        let player = world.add_entity(
            Entity::player("avatar", &PlayerConfig::default()).with_position(Vec3::new(20.0, 0.0, 20.0)),
        );
        let elsewhere = world.add_entity(object_at(150.0, 0.0, 10.0));

        assert_eq!(world.unload_grid(GridCoord::new(0, 0)), 1);
        assert!(!world.entity(object).unwrap().is_active());
        assert!(world.grid(GridCoord::new(0, 0)).unwrap().contains(player));

        world.update(0.016);
        assert!(world.entity(object).is_none());
        assert!(world.entity(player).is_some());
        assert!(world.entity(elsewhere).is_some());

        world.remove_entity(player);
        world.update(0.016);
        assert_eq!(world.unload_grid(GridCoord::new(0, 0)), 0);
        assert!(world.grid(GridCoord::new(0, 0)).is_none());
        assert_eq!(world.unload_grid(GridCoord::new(0, 0)), 0);
    }

    #[test]
    fn test_unload_uses_current_positions() {
        let mut world = WorldManager::new();
        let leaving = world.add_entity(object_at(10.0, 0.0, 10.0));
        let arriving = world.add_entity(object_at(910.0, 0.0, 910.0));

        world.entity_mut(leaving).unwrap().set_position(Vec3::new(910.0, 0.0, 910.0));
        world.entity_mut(arriving).unwrap().set_position(Vec3::new(20.0, 0.0, 20.0));

        assert_eq!(world.unload_grid(GridCoord::new(0, 0)), 1);
        assert!(world.entity(leaving).unwrap().is_active());
        assert!(!world.entity(arriving).unwrap().is_active());
        assert!(world.grid(GridCoord::new(9, 9)).unwrap().contains(leaving));
        assert!(world.grid(GridCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_unload_beyond_sees_cells_emptied_by_moves() {
        let mut world = WorldManager::with_config(WorldConfig::default().with_view_distance(250.0)).unwrap();
        let id = world.add_entity(object_at(950.0, 0.0, 950.0));
        world.entity_mut(id).unwrap().set_position(Vec3::new(10.0, 0.0, 10.0));

        assert_eq!(world.unload_grids_beyond(Vec3::zeros()), vec![GridCoord::new(9, 9)]);
        assert!(world.grid(GridCoord::new(0, 0)).unwrap().contains(id));
    }

    #[test]
    fn test_view_distance_setter_validates() {
        let mut world = WorldManager::new();
        assert!(matches!(world.set_view_distance(-50.0), Err(ConfigError::Invalid(_))));
        assert!(world.set_view_distance(f32::NAN).is_err());
        assert!(world.set_view_distance(0.0).is_err());
        assert_eq!(world.view_distance(), 500.0);

        world.set_view_distance(80.0).unwrap();
        assert_eq!(world.view_distance(), 80.0);
    }

    #[test]
    fn test_unload_grids_beyond_view_distance() {
        let mut world = WorldManager::with_config(WorldConfig::default().with_view_distance(250.0)).unwrap();
        world.load_grid(GridCoord::new(0, 0));
        world.load_grid(GridCoord::new(1, 1));
        world.load_grid(GridCoord::new(5, 0));
        world.load_grid(GridCoord::new(-4, -4));
        world.add_entity(object_at(950.0, 0.0, 950.0));

        let unloaded = world.unload_grids_beyond(Vec3::zeros());
        assert_eq!(unloaded, vec![GridCoord::new(-4, -4), GridCoord::new(5, 0)]);
        assert!(world.grid(GridCoord::new(1, 1)).is_some());
        assert!(world.grid(GridCoord::new(9, 9)).is_some());
        assert_eq!(world.grid_count(), 3);
    }

    #[test]
    fn test_load_grid_with_content() {
        let mut world = WorldManager::new();
        let coord = GridCoord::new(2, 3);
        let added = world.load_grid_with(coord, vec![object_at(210.0, 0.0, 310.0), object_at(250.0, 0.0, 390.0)]);
        assert_eq!(world.grid(coord).unwrap().entities(), &added[..]);
        assert!(!world.load_grid(coord));
    }

    #[test]
    fn test_apply_updates_from_queue() {
        let mut world = WorldManager::new();
        let id = world.add_entity(object_at(0.0, 0.0, 0.0));
        let doomed = world.add_entity(object_at(1.0, 0.0, 0.0));
        let queue = UpdateQueue::new();
        let sender = queue.sender();

        sender.send(EntityUpdate::SetPosition { id, position: Vec3::new(305.0, 0.0, 0.0) });
        sender.send(EntityUpdate::SetMetrics {
            id,
            metrics: ServiceMetrics { request_rate: 120.0, healthy: true, ..ServiceMetrics::default() },
        });
        sender.send(EntityUpdate::Remove { id: doomed });
        sender.send(EntityUpdate::Remove { id: EntityId::allocate() });

        assert_eq!(world.apply_updates(&queue), 3);
        let entity = world.entity(id).unwrap();
        assert_eq!(entity.position(), Vec3::new(305.0, 0.0, 0.0));
        assert_eq!(entity.metrics().map(|m| m.request_rate), Some(120.0));
        assert!(world.grid(GridCoord::new(3, 0)).unwrap().contains(id));
        assert!(!world.entity(doomed).unwrap().is_active());

        world.update(0.016);
        assert!(world.entity(doomed).is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(WorldManager::with_config(WorldConfig::default().with_grid_size(0.0)).is_err());
    }
}
