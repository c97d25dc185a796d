//! Entity updates fed in from other threads
//!
//! Network or telemetry threads hold an [`UpdateSender`] and push
//! [`EntityUpdate`]s; the update thread drains the [`UpdateQueue`] into the
//! world with [`WorldManager::apply_updates`](super::WorldManager::apply_updates)
//! once per frame. The world itself is never shared.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::foundation::math::{Quat, Vec3};

use super::entity::{EntityId, ServiceMetrics};

/// One change to an existing entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityUpdate {
    /// Move to a world position
    SetPosition {
        /// Target entity
        id: EntityId,
        /// New position
        position: Vec3,
    },
    /// Replace the orientation
    SetRotation {
        /// Target entity
        id: EntityId,
        /// New rotation
        rotation: Quat,
    },
    /// Replace the scale
    SetScale {
        /// Target entity
        id: EntityId,
        /// New scale
        scale: Vec3,
    },
    /// Replace the service metrics
    SetMetrics {
        /// Target entity
        id: EntityId,
        /// New metrics
        metrics: ServiceMetrics,
    },
    /// Mark for removal
    Remove {
        /// Target entity
        id: EntityId,
    },
}

impl EntityUpdate {
    /// Entity the update targets
    pub fn id(&self) -> EntityId {
        match self {
            Self::SetPosition { id, .. }
            | Self::SetRotation { id, .. }
            | Self::SetScale { id, .. }
            | Self::SetMetrics { id, .. }
            | Self::Remove { id } => *id,
        }
    }
}

/// Cloneable producer handle
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: Sender<EntityUpdate>,
}

impl UpdateSender {
    /// Queue an update; returns `false` once the queue has been dropped
    pub fn send(&self, update: EntityUpdate) -> bool {
        self.tx.send(update).is_ok()
    }
}

/// Multi-producer, single-consumer update queue
#[derive(Debug)]
pub struct UpdateQueue {
    tx: Sender<EntityUpdate>,
    rx: Receiver<EntityUpdate>,
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateQueue {
    /// Create an unbounded queue
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Producer handle for another thread
    pub fn sender(&self) -> UpdateSender {
        UpdateSender { tx: self.tx.clone() }
    }

    /// Queue an update from the owning thread
    pub fn push(&self, update: EntityUpdate) {
        // The queue holds its own receiver, so this cannot disconnect
        let _ = self.tx.send(update);
    }

    /// Take every update queued so far, without blocking
    pub fn drain(&self) -> impl Iterator<Item = EntityUpdate> + '_ {
        self.rx.try_iter()
    }

    /// Number of pending updates
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
