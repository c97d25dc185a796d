//! Renderer-facing interface
//!
//! The crate never talks to a graphics API. It hands the external renderer
//! world matrices, mesh names and camera matrices through the types here.

mod camera;

pub use camera::{Camera, Projection};

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;
use crate::scene::NodeId;
use crate::world::EntityId;

/// Per-instance GPU data: column-major model matrix
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Model (local-to-world) matrix, column-major
    pub model: [[f32; 4]; 4],
}

impl InstanceData {
    /// Pack a world matrix
    pub fn from_matrix(matrix: &Mat4) -> Self {
        Self { model: (*matrix).into() }
    }

    /// Unpack back into a matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from(self.model)
    }
}

/// One scene node submitted during a render traversal
#[derive(Debug, Clone, Copy)]
pub struct NodeDraw<'a> {
    /// Node being drawn
    pub node: NodeId,
    /// Node name
    pub name: &'a str,
    /// Mesh to draw, if the node carries one
    pub mesh: Option<&'a str>,
    /// World matrix of the node
    pub world_matrix: Mat4,
}

/// Sink the scene graph submits visible nodes to
///
/// Implemented by the external renderer; [`DrawList`] is a collecting
/// implementation.
pub trait RenderContext {
    /// Receive one visible node
    fn submit(&mut self, draw: NodeDraw<'_>);
}

/// Render instance of one visible world entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityDraw<'a> {
    /// Entity being drawn
    pub entity: EntityId,
    /// Mesh to draw
    pub mesh: &'a str,
    /// Packed model matrix
    pub instance: InstanceData,
}

/// Owned record of a submitted node
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Node that was drawn
    pub node: NodeId,
    /// Node name
    pub name: String,
    /// Mesh name, if any
    pub mesh: Option<String>,
    /// Packed world matrix
    pub instance: InstanceData,
}

/// [`RenderContext`] that records every submission in traversal order
#[derive(Debug, Default)]
pub struct DrawList {
    /// Submissions in order
    pub records: Vec<DrawRecord>,
}

impl DrawList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the recorded nodes in order
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

impl RenderContext for DrawList {
    fn submit(&mut self, draw: NodeDraw<'_>) {
        self.records.push(DrawRecord {
            node: draw.node,
            name: draw.name.to_string(),
            mesh: draw.mesh.map(str::to_string),
            instance: InstanceData::from_matrix(&draw.world_matrix),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn test_instance_data_is_column_major() {
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let instance = InstanceData::from_matrix(&matrix);
        assert_eq!(instance.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(instance.to_matrix(), matrix);
        assert_eq!(bytemuck::bytes_of(&instance).len(), 64);
    }
}
