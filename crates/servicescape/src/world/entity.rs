//! World entities
//!
//! An [`Entity`] is a flat, world-space object owned by the
//! [`WorldManager`](super::WorldManager): one transform, one mesh name, an
//! active flag, and a kind-specific behavior in [`EntityKind`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Deserialize};

use crate::core::config::{NpcConfig, PlayerConfig};
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::scene::point_in_frustum;

use super::npc::NpcState;
use super::player::PlayerState;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique entity identifier
///
/// Ids start at 1, are never reused and stay unique across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Take the next id from the global counter
    pub fn allocate() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity category tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// User-controlled avatar
    Player,
    /// Autonomous agent driven by an AI state machine
    Npc,
    /// Static service object
    Object,
    /// Transient marker left by an event
    Echo,
    /// Ground geometry
    Terrain,
}

/// Kind-specific state of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Player with its movement state
    Player(PlayerState),
    /// NPC with its AI state
    Npc(NpcState),
    /// No behavior
    Object,
    /// No behavior
    Echo,
    /// No behavior
    Terrain,
}

impl EntityKind {
    /// Category of this kind
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Player(_) => EntityType::Player,
            Self::Npc(_) => EntityType::Npc,
            Self::Object => EntityType::Object,
            Self::Echo => EntityType::Echo,
            Self::Terrain => EntityType::Terrain,
        }
    }

    /// Default state for a category
    pub fn from_type(entity_type: EntityType, player: &PlayerConfig, npc: &NpcConfig) -> Self {
        match entity_type {
            EntityType::Player => Self::Player(PlayerState::new(player)),
            EntityType::Npc => Self::Npc(NpcState::new(npc)),
            EntityType::Object => Self::Object,
            EntityType::Echo => Self::Echo,
            EntityType::Terrain => Self::Terrain,
        }
    }
}

/// Live health figures of the backend service an entity stands for
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    /// CPU load in `[0, 1]`
    pub cpu_load: f32,
    /// Resident memory in megabytes
    pub memory_mb: f32,
    /// Requests per second
    pub request_rate: f32,
    /// Fraction of failing requests in `[0, 1]`
    pub error_rate: f32,
    /// Whether the service passes its health check
    pub healthy: bool,
}

/// A world object with a unique id
///
/// Not `Clone`: a copy would share the id.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    transform: Transform,
    mesh_name: String,
    active: bool,
    metrics: Option<ServiceMetrics>,
}

impl Entity {
    /// Create an active entity at the origin with a fresh id
    pub fn new(kind: EntityKind, mesh_name: impl Into<String>) -> Self {
        Self {
            id: EntityId::allocate(),
            kind,
            transform: Transform::identity(),
            mesh_name: mesh_name.into(),
            active: true,
            metrics: None,
        }
    }

    /// Player entity
    pub fn player(mesh_name: impl Into<String>, config: &PlayerConfig) -> Self {
        Self::new(EntityKind::Player(PlayerState::new(config)), mesh_name)
    }

    /// Idle NPC entity
    pub fn npc(mesh_name: impl Into<String>, config: &NpcConfig) -> Self {
        Self::new(EntityKind::Npc(NpcState::new(config)), mesh_name)
    }

    /// Static object entity
    pub fn object(mesh_name: impl Into<String>) -> Self {
        Self::new(EntityKind::Object, mesh_name)
    }

    /// Echo entity
    pub fn echo(mesh_name: impl Into<String>) -> Self {
        Self::new(EntityKind::Echo, mesh_name)
    }

    /// Terrain entity
    pub fn terrain(mesh_name: impl Into<String>) -> Self {
        Self::new(EntityKind::Terrain, mesh_name)
    }

    /// Builder-style position
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.set_position(position);
        self
    }

    /// Identifier
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Category
    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    /// Kind-specific state
    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Mutable kind-specific state
    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    /// Player state, if this is a player
    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Mutable player state, if this is a player
    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    /// NPC state, if this is an NPC
    pub fn as_npc(&self) -> Option<&NpcState> {
        match &self.kind {
            EntityKind::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    /// Mutable NPC state, if this is an NPC
    pub fn as_npc_mut(&mut self) -> Option<&mut NpcState> {
        match &mut self.kind {
            EntityKind::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    /// World transform
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable world transform
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.transform.position()
    }

    /// Move to a world position
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.set_position(position);
    }

    /// Model matrix
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    /// Mesh the renderer should draw
    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    /// Change the mesh
    pub fn set_mesh_name(&mut self, mesh_name: impl Into<String>) {
        self.mesh_name = mesh_name.into();
    }

    /// Whether the entity takes part in updates and queries
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mark for removal; the owning manager drops it on its next update
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Latest service metrics
    pub fn metrics(&self) -> Option<&ServiceMetrics> {
        self.metrics.as_ref()
    }

    /// Replace the service metrics
    pub fn set_metrics(&mut self, metrics: ServiceMetrics) {
        self.metrics = Some(metrics);
    }

    /// Advance the kind-specific behavior by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        match &mut self.kind {
            EntityKind::Player(player) => player.update(&mut self.transform, dt),
            EntityKind::Npc(npc) => npc.update(&mut self.transform, dt),
            EntityKind::Object | EntityKind::Echo | EntityKind::Terrain => {}
        }
    }

    /// Whether the entity's position is inside the frustum of `view_projection`
    pub fn is_in_frustum(&self, view_projection: &Mat4) -> bool {
        point_in_frustum(view_projection, &self.position())
    }
}
