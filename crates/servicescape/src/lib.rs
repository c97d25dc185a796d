//! # Servicescape
//!
//! Scene graph and spatial world model behind a live 3D view of backend
//! services.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed node hierarchy with lazily cached world matrices
//! - **World Model**: Players, NPCs and service objects with per-kind behavior
//! - **Spatial Grid**: Horizontal bucketing for radius queries and content streaming
//! - **Camera**: Perspective and orthographic cameras with cached matrices
//! - **Renderer Interface**: Draw submissions and `Pod` instance data for an external renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use servicescape::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     servicescape::foundation::logging::init();
//!
//!     let mut world = WorldManager::with_config(WorldConfig::default())?;
//!     let player = world.spawn(EntityType::Player, "avatar", Vec3::zeros());
//!     world.spawn(EntityType::Object, "auth-service", Vec3::new(0.0, 0.0, -10.0));
//!
//!     let camera = Camera::perspective(Vec3::new(0.0, 5.0, 10.0), 45.0, 16.0 / 9.0, 0.1, 1000.0);
//!     let mut clock = FrameClock::new();
//!
//!     loop {
//!         if let Some(avatar) = world.entity_mut(player).and_then(Entity::as_player_mut) {
//!             avatar.move_dir(Vec3::new(0.0, 0.0, -1.0));
//!         }
//!         world.update(clock.tick());
//!         for draw in world.draw_list(&camera) {
//!             // hand draw.mesh and draw.instance to the renderer
//!             let _ = draw;
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core crate modules
pub mod core;
pub mod config;

pub mod foundation;
pub mod render;
pub mod scene;
pub mod spatial;
pub mod world;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{NpcConfig, PlayerConfig, WorldConfig},
        foundation::{
            math::{Mat4, Quat, Transform, TransformError, Vec3},
            time::FrameClock,
        },
        render::{Camera, DrawList, EntityDraw, InstanceData, Projection, RenderContext},
        scene::{Frustum, NodeId, SceneError, SceneGraph, SceneNode},
        spatial::GridCoord,
        world::{
            AiState, Entity, EntityId, EntityType, EntityUpdate, ServiceMetrics,
            UpdateQueue, WorldManager,
        },
    };
}
