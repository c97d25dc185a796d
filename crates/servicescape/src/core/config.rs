//! # World Configuration
//!
//! Tunables for the world model: spatial grid, view distance, player
//! movement and NPC behavior. Loaded through the [`Config`] trait from TOML or
//! RON files; every section falls back to its defaults when omitted.

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Default edge length of one spatial grid cell, in world units
pub const GRID_SIZE: f32 = 100.0;

/// # Player Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Velocity added per `move_dir` call
    pub move_speed: f32,
    /// Multiplicative velocity damping applied once per update tick
    pub friction: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            friction: 0.9,
        }
    }
}

/// # NPC Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    /// Movement speed while patrolling
    pub patrol_speed: f32,
    /// Distance below which a waypoint counts as reached
    pub waypoint_radius: f32,
    /// Movement speed while chasing a target
    pub chase_speed: f32,
    /// Distance within which a chasing NPC switches to attacking
    pub attack_range: f32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            patrol_speed: 2.0,
            waypoint_radius: 1.0,
            chase_speed: 4.0,
            attack_range: 2.0,
        }
    }
}

/// # World Configuration
///
/// Top-level settings for a [`crate::world::WorldManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of a grid cell; fixed for the lifetime of a manager
    pub grid_size: f32,
    /// Distance beyond which empty cells may be unloaded
    pub view_distance: f32,
    /// Largest frame delta a host should feed into `update`
    pub max_frame_delta: f32,
    /// Player movement settings
    pub player: PlayerConfig,
    /// NPC behavior settings
    pub npc: NpcConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            view_distance: 500.0,
            max_frame_delta: crate::foundation::time::DEFAULT_MAX_DELTA,
            player: PlayerConfig::default(),
            npc: NpcConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Set the grid cell size
    pub fn with_grid_size(mut self, grid_size: f32) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the view distance
    pub fn with_view_distance(mut self, view_distance: f32) -> Self {
        self.view_distance = view_distance;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("grid_size", self.grid_size)?;
        require_positive("view_distance", self.view_distance)?;
        require_positive("max_frame_delta", self.max_frame_delta)?;
        require_positive("player.move_speed", self.player.move_speed)?;
        require_positive("npc.patrol_speed", self.npc.patrol_speed)?;
        require_positive("npc.waypoint_radius", self.npc.waypoint_radius)?;
        require_positive("npc.chase_speed", self.npc.chase_speed)?;
        require_positive("npc.attack_range", self.npc.attack_range)?;

        if !(0.0..=1.0).contains(&self.player.friction) {
            return Err(ConfigError::Invalid(format!(
                "player.friction must be within [0, 1], got {}",
                self.player.friction
            )));
        }

        Ok(())
    }
}

impl Config for WorldConfig {}

pub(crate) fn require_positive(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
    }
}
