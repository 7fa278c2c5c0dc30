use crate::attributes::{NodeAttributes, Point3};
use crate::ids::NodeId;
use crate::layer_key::LayerKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Change-tracking marker kept by a layer for each node it has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    New,
    Visible,
    Removed,
    Merged,
}

/// A node of the scene graph.
///
/// Ancestry is stored as id sets rather than references; the graph keeps both
/// directions in sync.
#[derive(Debug, Clone)]
pub struct SceneGraphNode {
    pub id: NodeId,
    pub layer: LayerKey,
    pub attributes: Box<dyn NodeAttributes>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: BTreeSet<NodeId>,
    pub(crate) siblings: BTreeSet<NodeId>,
}

impl SceneGraphNode {
    pub fn new(id: NodeId, layer: impl Into<LayerKey>, attributes: Box<dyn NodeAttributes>) -> Self {
        Self {
            id,
            layer: layer.into(),
            attributes,
            parent: None,
            children: BTreeSet::new(),
            siblings: BTreeSet::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn children(&self) -> &BTreeSet<NodeId> {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn siblings(&self) -> &BTreeSet<NodeId> {
        &self.siblings
    }

    pub fn has_siblings(&self) -> bool {
        !self.siblings.is_empty()
    }

    pub fn position(&self) -> Point3 {
        self.attributes.position()
    }

    pub(crate) fn clear_ancestry(&mut self) {
        self.parent = None;
        self.children.clear();
        self.siblings.clear();
    }
}
