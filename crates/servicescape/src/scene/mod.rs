//! Scene management
//!
//! Hierarchical transforms for everything that is placed relative to
//! something else (service clusters, racks, labels), plus the point-in-frustum
//! test shared with the world manager.

mod scene_graph;
pub mod frustum;

pub use scene_graph::{NodeBehavior, NodeId, SceneError, SceneGraph, SceneNode};
pub use frustum::{point_in_frustum, Frustum};
