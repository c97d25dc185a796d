//! Player movement state

use crate::core::config::PlayerConfig;
use crate::foundation::math::{Transform, Vec3};

/// Speeds below this snap to rest
const REST_SPEED: f32 = 1e-4;

/// Directions shorter than this are ignored by [`PlayerState::move_dir`]
const MIN_DIRECTION: f32 = 1e-6;

/// Velocity-driven player motion
///
/// Velocity is accumulated by [`move_dir`](Self::move_dir) and damped by a
/// fixed factor once per update tick, so the damping rate depends on the
/// frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    velocity: Vec3,
    move_speed: f32,
    friction: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new(&PlayerConfig::default())
    }
}

impl PlayerState {
    /// Player at rest using the given tuning
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            velocity: Vec3::zeros(),
            move_speed: config.move_speed,
            friction: config.friction,
        }
    }

    /// Current velocity
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Overwrite the velocity
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Speed added per `move_dir` call
    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    /// Per-tick damping factor
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Accumulate an impulse: `velocity += normalize(direction) * move_speed`
    ///
    /// Calls within one frame add up. A zero direction is ignored.
    pub fn move_dir(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize(MIN_DIRECTION) {
            self.velocity += direction * self.move_speed;
        }
    }

    pub(crate) fn update(&mut self, transform: &mut Transform, dt: f32) {
        if self.velocity.norm_squared() <= 0.0 {
            return;
        }
        transform.translate(self.velocity * dt);
        self.velocity *= self.friction;
        if self.velocity.norm() < REST_SPEED {
            self.velocity = Vec3::zeros();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_move_accumulates_normalized_impulses() {
        let mut player = PlayerState::default();
        player.move_dir(Vec3::new(10.0, 0.0, 0.0));
        player.move_dir(Vec3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(player.velocity(), Vec3::new(10.0, 0.0, 0.0));

        player.move_dir(Vec3::zeros());
        assert_relative_eq!(player.velocity(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_update_moves_then_damps_per_tick() {
        let mut player = PlayerState::default();
        let mut transform = Transform::identity();
        player.move_dir(Vec3::new(0.0, 0.0, -1.0));

        player.update(&mut transform, 0.5);
        assert_relative_eq!(transform.position(), Vec3::new(0.0, 0.0, -2.5));
        assert_relative_eq!(player.velocity(), Vec3::new(0.0, 0.0, -4.5));

        // Same factor regardless of dt
        player.update(&mut transform, 0.01);
        assert_relative_eq!(player.velocity(), Vec3::new(0.0, 0.0, -4.05), epsilon = 1e-5);
    }

    #[test]
    fn test_resting_player_does_not_touch_transform() {
        let mut player = PlayerState::default();
        let mut transform = Transform::identity();
        let revision = transform.revision();
        player.update(&mut transform, 1.0);
        assert_eq!(transform.revision(), revision);
    }

    #[test]
    fn test_velocity_decays_to_rest() {
        let mut player = PlayerState::default();
        let mut transform = Transform::identity();
        player.move_dir(Vec3::x());
        for _ in 0..200 {
            player.update(&mut transform, 0.016);
        }
        assert_eq!(player.velocity(), Vec3::zeros());
    }
}
