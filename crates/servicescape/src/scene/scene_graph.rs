//! Hierarchical scene graph
//!
//! Nodes live in a generational arena owned by [`SceneGraph`]. A parent owns
//! its children: destroying a node destroys its whole subtree. A child refers
//! back to its parent by [`NodeId`] only; a stale id never resolves, so the
//! back-reference cannot keep a parent alive or dangle.
//!
//! World matrices are cached per node and rebuilt lazily:
//! `world = parent.world * local.matrix()`. Any local change or reparenting
//! marks the node and every descendant dirty.

use std::cell::Cell;
use std::fmt;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::foundation::math::{translation_of, Mat4, Quat, Transform, Vec3};
use crate::render::{Camera, NodeDraw, RenderContext};
use crate::scene::frustum::point_in_frustum;

new_key_type! {
    /// Generational handle to a node in a [`SceneGraph`]
    pub struct NodeId;
}

/// Scene graph errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    /// The id does not refer to a live node
    #[error("scene node {0:?} not found")]
    NodeNotFound(NodeId),

    /// Attaching would make a node its own ancestor
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },
}

/// Per-node update hook
///
/// Runs once per [`SceneGraph::update`] for each visible node before its
/// children. Changes made to the transform propagate to the subtree.
pub trait NodeBehavior {
    /// Advance the node by `dt` seconds
    fn update(&mut self, transform: &mut Transform, dt: f32);
}

impl<F> NodeBehavior for F
where
    F: FnMut(&mut Transform, f32),
{
    fn update(&mut self, transform: &mut Transform, dt: f32) {
        self(transform, dt);
    }
}

/// A node in the scene hierarchy
pub struct SceneNode {
    name: String,
    created: u64,
    local: Transform,
    visible: bool,
    mesh: Option<String>,

    parent: Option<NodeId>,
    children: Vec<NodeId>,

    world_matrix: Cell<Mat4>,
    world_dirty: Cell<bool>,

    behavior: Option<Box<dyn NodeBehavior>>,
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("visible", &self.visible)
            .field("mesh", &self.mesh)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("world_dirty", &self.world_dirty.get())
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

impl SceneNode {
    fn new(name: String, created: u64, local: Transform) -> Self {
        Self {
            name,
            created,
            local,
            visible: true,
            mesh: None,
            parent: None,
            children: Vec::new(),
            world_matrix: Cell::new(Mat4::identity()),
            world_dirty: Cell::new(true),
            behavior: None,
        }
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Local transform (mutate through [`SceneGraph::update_transform`])
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Whether the node and its subtree take part in update and render
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Mesh submitted to the renderer
    pub fn mesh(&self) -> Option<&str> {
        self.mesh.as_deref()
    }

    /// Attach or clear a mesh
    pub fn set_mesh(&mut self, mesh: Option<String>) {
        self.mesh = mesh;
    }

    /// Install a per-node update hook
    pub fn set_behavior(&mut self, behavior: impl NodeBehavior + 'static) {
        self.behavior = Some(Box::new(behavior));
    }

    /// Remove the update hook
    pub fn clear_behavior(&mut self) {
        self.behavior = None;
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the cached world matrix is stale
    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }
}

/// Arena owning every scene node
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    next_created: u64,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a standalone node with an identity transform
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        self.create_node_with(name, Transform::identity())
    }

    /// Create a standalone node with the given local transform
    pub fn create_node_with(&mut self, name: impl Into<String>, local: Transform) -> NodeId {
        let name = name.into();
        log::trace!("Creating scene node '{}'", name);
        let created = self.next_created;
        self.next_created += 1;
        self.nodes.insert(SceneNode::new(name, created, local))
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Borrow a node mutably (name, visibility, mesh, behavior)
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// First node with the given name
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| id)
    }

    /// Nodes without a parent, oldest first
    ///
    /// Slots freed by [`destroy`](Self::destroy) are reused, so arena order
    /// says nothing about age; roots are sorted by creation instead.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<(u64, NodeId)> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, node)| (node.created, id))
            .collect();
        roots.sort_unstable_by_key(|&(created, _)| created);
        roots.into_iter().map(|(_, id)| id).collect()
    }

    /// Parent of a node, if both are alive
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes
            .get(id)?
            .parent
            .filter(|parent| self.nodes.contains_key(*parent))
    }

    /// Children of a node in insertion order; empty for unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Whether `ancestor` appears on the parent chain of `id`
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Attach `child` under `parent`
    ///
    /// The child is first detached from any previous parent, so a node has
    /// at most one parent. Re-adding an existing child moves it to the end of
    /// the child list. The child's subtree is marked dirty.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        if !self.nodes.contains_key(child) {
            return Err(SceneError::NodeNotFound(child));
        }
        if parent == child || self.is_ancestor(child, parent) {
            log::warn!("Rejected reparent of {:?} under its descendant {:?}", child, parent);
            return Err(SceneError::CycleDetected { parent, child });
        }

        self.unlink(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        self.invalidate_subtree(child);

        log::debug!("Attached {:?} under {:?}", child, parent);
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// Returns `false` (and does nothing) when `child` is not a child of
    /// `parent`. The detached node stays alive as a root.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let is_child = self
            .nodes
            .get(child)
            .is_some_and(|node| node.parent == Some(parent));
        if !is_child {
            return false;
        }
        self.unlink(child);
        self.invalidate_subtree(child);
        log::debug!("Detached {:?} from {:?}", child, parent);
        true
    }

    /// Detach a node from whatever parent it has; no-op for roots
    pub fn detach(&mut self, id: NodeId) -> bool {
        match self.parent(id) {
            Some(parent) => self.remove_child(parent, id),
            None => false,
        }
    }

    /// Detach every child of `parent`; returns the detached ids
    pub fn remove_all_children(&mut self, parent: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get_mut(parent) else {
            return Vec::new();
        };
        let children = std::mem::take(&mut node.children);
        for &child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
            self.invalidate_subtree(child);
        }
        children
    }

    /// Destroy a node and its whole subtree; returns how many nodes died
    pub fn destroy(&mut self, id: NodeId) -> usize {
        if !self.nodes.contains_key(id) {
            return 0;
        }
        self.unlink(id);

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        log::debug!("Destroyed subtree rooted at {:?} ({} nodes)", id, removed);
        removed
    }

    /// Local transform of a node
    pub fn local_transform(&self, id: NodeId) -> Option<&Transform> {
        self.nodes.get(id).map(|node| &node.local)
    }

    /// Mutate a node's local transform, then mark its subtree dirty
    pub fn update_transform<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Transform) -> R,
    ) -> Result<R, SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        let result = f(&mut node.local);
        self.invalidate_subtree(id);
        Ok(result)
    }

    /// Set a node's local position
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.update_transform(id, |t| t.set_position(position))
    }

    /// Set a node's local rotation
    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) -> Result<(), SceneError> {
        self.update_transform(id, |t| t.set_rotation(rotation))
    }

    /// Set a node's local scale
    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<(), SceneError> {
        self.update_transform(id, |t| t.set_scale(scale))
    }

    /// Show or hide a node together with its subtree
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))?;
        node.visible = visible;
        Ok(())
    }

    /// Local-to-world matrix, recomputed lazily up the parent chain
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let node = self.nodes.get(id)?;
        if node.world_dirty.get() {
            let local = node.local.matrix();
            let world = match node.parent.and_then(|parent| self.world_matrix(parent)) {
                Some(parent_world) => parent_world * local,
                None => local,
            };
            node.world_matrix.set(world);
            node.world_dirty.set(false);
        }
        Some(node.world_matrix.get())
    }

    /// World-space position of a node
    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id).map(|m| translation_of(&m))
    }

    /// Point test of the node's world position against the camera frustum
    pub fn is_in_frustum(&self, id: NodeId, camera: &Camera) -> bool {
        self.world_position(id)
            .is_some_and(|position| point_in_frustum(&camera.view_projection_matrix(), &position))
    }

    /// Update a subtree
    ///
    /// Invisible nodes are skipped together with their descendants. Visible
    /// nodes run their behavior hook, then children update in insertion order.
    pub fn update(&mut self, id: NodeId, dt: f32) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !node.visible {
            return;
        }

        let revision = node.local.revision();
        if let Some(behavior) = node.behavior.as_mut() {
            behavior.update(&mut node.local, dt);
        }
        let moved = node.local.revision() != revision;
        let children = node.children.clone();

        if moved {
            self.invalidate_subtree(id);
        }
        for child in children {
            self.update(child, dt);
        }
    }

    /// Update every root subtree
    pub fn update_all(&mut self, dt: f32) {
        for root in self.roots() {
            self.update(root, dt);
        }
    }

    /// Submit a subtree to a render context
    ///
    /// Invisible nodes are skipped together with their descendants.
    pub fn render<C: RenderContext + ?Sized>(&self, id: NodeId, context: &mut C) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.visible {
            return;
        }

        if let Some(world_matrix) = self.world_matrix(id) {
            context.submit(NodeDraw {
                node: id,
                name: &node.name,
                mesh: node.mesh.as_deref(),
                world_matrix,
            });
        }
        for &child in &node.children {
            self.render(child, context);
        }
    }

    /// Submit every root subtree
    pub fn render_all<C: RenderContext + ?Sized>(&self, context: &mut C) {
        for root in self.roots() {
            self.render(root, context);
        }
    }

    /// Remove `id` from its parent's child list and clear its back-reference
    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(id).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|&child| child != id);
        }
    }

    /// Mark a node and every descendant dirty
    fn invalidate_subtree(&self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                node.world_dirty.set(true);
                stack.extend_from_slice(&node.children);
            }
        }
    }
}
