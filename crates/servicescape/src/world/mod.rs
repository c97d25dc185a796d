//! World model
//!
//! Flat, world-space entities owned by a [`WorldManager`], bucketed on a
//! horizontal grid for proximity queries and content streaming.

mod entity;
mod npc;
mod player;
pub mod updates;
mod world_manager;

pub use entity::{Entity, EntityId, EntityKind, EntityType, ServiceMetrics};
pub use npc::{AiState, NpcState};
pub use player::PlayerState;
pub use updates::{EntityUpdate, UpdateQueue, UpdateSender};
pub use world_manager::WorldManager;
