//! NPC behavior state machine
//!
//! `Idle` does nothing. `Patrol` walks a cyclic waypoint list. `Chase` and
//! `Attack` react to an optional target position fed in by the gameplay
//! layer; without a target they hold still.

use crate::core::config::NpcConfig;
use crate::foundation::math::{Transform, Vec3};

/// AI state of an NPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AiState {
    /// Standing still
    #[default]
    Idle,
    /// Walking the patrol path
    Patrol,
    /// Moving toward the chase target
    Chase,
    /// Holding position next to the chase target
    Attack,
}

/// Per-NPC behavior state
#[derive(Debug, Clone, PartialEq)]
pub struct NpcState {
    ai_state: AiState,
    patrol_path: Vec<Vec3>,
    current_patrol_index: usize,
    chase_target: Option<Vec3>,

    patrol_speed: f32,
    waypoint_radius: f32,
    chase_speed: f32,
    attack_range: f32,
}

impl Default for NpcState {
    fn default() -> Self {
        Self::new(&NpcConfig::default())
    }
}

impl NpcState {
    /// Idle NPC with an empty patrol path
    pub fn new(config: &NpcConfig) -> Self {
        Self {
            ai_state: AiState::Idle,
            patrol_path: Vec::new(),
            current_patrol_index: 0,
            chase_target: None,
            patrol_speed: config.patrol_speed,
            waypoint_radius: config.waypoint_radius,
            chase_speed: config.chase_speed,
            attack_range: config.attack_range,
        }
    }

    /// Current state
    pub fn ai_state(&self) -> AiState {
        self.ai_state
    }

    /// Switch state
    pub fn set_ai_state(&mut self, state: AiState) {
        if self.ai_state != state {
            log::debug!("NPC state {:?} -> {:?}", self.ai_state, state);
            self.ai_state = state;
        }
    }

    /// Append a waypoint to the patrol loop
    pub fn add_patrol_point(&mut self, point: Vec3) {
        self.patrol_path.push(point);
    }

    /// Replace the patrol loop and restart at its first waypoint
    pub fn set_patrol_path(&mut self, path: Vec<Vec3>) {
        self.patrol_path = path;
        self.current_patrol_index = 0;
    }

    /// Remove every waypoint
    pub fn clear_patrol_path(&mut self) {
        self.set_patrol_path(Vec::new());
    }

    /// Waypoints in patrol order
    pub fn patrol_path(&self) -> &[Vec3] {
        &self.patrol_path
    }

    /// Index of the waypoint currently being walked to
    pub fn current_patrol_index(&self) -> usize {
        self.current_patrol_index
    }

    /// Position the NPC chases or attacks
    pub fn chase_target(&self) -> Option<Vec3> {
        self.chase_target
    }

    /// Set or clear the chase target
    pub fn set_chase_target(&mut self, target: Option<Vec3>) {
        self.chase_target = target;
    }

    pub(crate) fn update(&mut self, transform: &mut Transform, dt: f32) {
        match self.ai_state {
            AiState::Idle => {}
            AiState::Patrol => self.patrol(transform, dt),
            AiState::Chase => self.chase(transform, dt),
            AiState::Attack => self.attack(transform),
        }
    }

    fn patrol(&mut self, transform: &mut Transform, dt: f32) {
        let Some(&waypoint) = self.patrol_path.get(self.current_patrol_index) else {
            return;
        };

        let distance = (waypoint - transform.position()).norm();
        if distance < self.waypoint_radius {
            self.current_patrol_index = (self.current_patrol_index + 1) % self.patrol_path.len();
            log::trace!("NPC advanced to waypoint {}", self.current_patrol_index);
        } else {
            step_toward(transform, waypoint, self.patrol_speed * dt);
        }
    }

    fn chase(&mut self, transform: &mut Transform, dt: f32) {
        let Some(target) = self.chase_target else {
            return;
        };

        if (target - transform.position()).norm() <= self.attack_range {
            self.set_ai_state(AiState::Attack);
        } else {
            step_toward(transform, target, self.chase_speed * dt);
        }
    }

    fn attack(&mut self, transform: &Transform) {
        let Some(target) = self.chase_target else {
            return;
        };

        if (target - transform.position()).norm() > self.attack_range {
            self.set_ai_state(AiState::Chase);
        }
    }
}

/// Move toward `target` by at most `max_step`, never past it
fn step_toward(transform: &mut Transform, target: Vec3, max_step: f32) {
    let offset = target - transform.position();
    let distance = offset.norm();
    if distance <= 0.0 || max_step <= 0.0 {
        return;
    }
    transform.translate(offset * (max_step.min(distance) / distance));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn patrolling(path: &[Vec3]) -> NpcState {
        let mut npc = NpcState::default();
        for point in path {
            npc.add_patrol_point(*point);
        }
        npc.set_ai_state(AiState::Patrol);
        npc
    }

    #[test]
    fn test_idle_by_default_and_inert() {
        let mut npc = NpcState::default();
        npc.add_patrol_point(Vec3::new(10.0, 0.0, 0.0));
        let mut transform = Transform::identity();
        npc.update(&mut transform, 1.0);

        assert_eq!(npc.ai_state(), AiState::Idle);
        assert_eq!(transform.position(), Vec3::zeros());
        assert_eq!(npc.current_patrol_index(), 0);
    }

    #[test]
    fn test_patrol_cycles_through_waypoints() {
        let path = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
        ];
        let mut npc = patrolling(&path);
        let mut transform = Transform::identity();

        npc.update(&mut transform, 0.1);
        assert_eq!(npc.current_patrol_index(), 1);

        let mut visited = vec![npc.current_patrol_index()];
        for _ in 0..1000 {
            npc.update(&mut transform, 0.1);
            if *visited.last().unwrap() != npc.current_patrol_index() {
                visited.push(npc.current_patrol_index());
            }
            if visited.len() == 3 {
                break;
            }
        }
        assert_eq!(visited, vec![1, 2, 0]);
        assert!((transform.position() - path[2]).norm() < 1.0);
    }

    #[test]
    fn test_patrol_moves_at_patrol_speed_without_overshoot() {
        let mut npc = patrolling(&[Vec3::new(5.0, 0.0, 0.0)]);
        let mut transform = Transform::identity();

        npc.update(&mut transform, 0.5);
        assert_relative_eq!(transform.position(), Vec3::new(1.0, 0.0, 0.0));

        npc.update(&mut transform, 100.0);
        assert_relative_eq!(transform.position(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_patrol_with_empty_path_is_noop() {
        let mut npc = patrolling(&[]);
        let mut transform = Transform::identity();
        npc.update(&mut transform, 1.0);
        assert_eq!(transform.position(), Vec3::zeros());
        assert_eq!(npc.current_patrol_index(), 0);
    }

    #[test]
    fn test_chase_closes_in_then_attacks() {
        let mut npc = NpcState::default();
        npc.set_ai_state(AiState::Chase);
        npc.set_chase_target(Some(Vec3::new(0.0, 0.0, 10.0)));
        let mut transform = Transform::identity();

        for _ in 0..100 {
            npc.update(&mut transform, 0.1);
        }
        assert_eq!(npc.ai_state(), AiState::Attack);
        assert!((transform.position() - Vec3::new(0.0, 0.0, 10.0)).norm() <= 2.0);

        npc.set_chase_target(Some(Vec3::new(0.0, 0.0, 50.0)));
        npc.update(&mut transform, 0.1);
        assert_eq!(npc.ai_state(), AiState::Chase);
    }

    #[test]
    fn test_chase_without_target_holds_still() {
        let mut npc = NpcState::default();
        npc.set_ai_state(AiState::Chase);
        let mut transform = Transform::identity();
        npc.update(&mut transform, 1.0);
        assert_eq!(transform.position(), Vec3::zeros());
        assert_eq!(npc.ai_state(), AiState::Chase);
    }
}
