use crate::attributes::{EdgeAttributes, NodeAttributes, Point3};
use crate::edge::{EdgeContainer, EdgeKey, SceneGraphEdge};
use crate::error::GraphError;
use crate::ids::{LayerId, NodeId, NodeSymbol};
use crate::layer_key::{LayerKey, NodeLookup};
use crate::node::{NodeStatus, SceneGraphNode};
use std::collections::btree_map;
use std::collections::BTreeMap;
use tracing::warn;

/// Nodes, intralayer edges and change markers of a single layer.
///
/// Intralayer neighbours are recorded in each node's sibling set.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    nodes: BTreeMap<NodeId, SceneGraphNode>,
    status: BTreeMap<NodeId, NodeStatus>,
    edges: EdgeContainer,
}

impl LayerStore {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&SceneGraphNode> {
        self.nodes.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut SceneGraphNode> {
        self.nodes.get_mut(&node)
    }

    pub fn nodes(&self) -> btree_map::Iter<'_, NodeId, SceneGraphNode> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &EdgeContainer {
        &self.edges
    }

    pub fn status(&self, node: NodeId) -> Option<NodeStatus> {
        self.status.get(&node).copied()
    }

    /// Nodes flagged removed or merged, without consuming the flags.
    pub fn removed_node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.status
            .iter()
            .filter(|(_, status)| matches!(status, NodeStatus::Removed | NodeStatus::Merged))
            .map(|(id, _)| *id)
    }

    pub(crate) fn edges_mut(&mut self) -> &mut EdgeContainer {
        &mut self.edges
    }

    pub(crate) fn add(&mut self, node: SceneGraphNode) {
        self.status.insert(node.id, NodeStatus::New);
        self.nodes.insert(node.id, node);
    }

    pub(crate) fn connect(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Option<Box<dyn EdgeAttributes>>,
    ) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop(source));
        }

        for node in [source, target] {
            if !self.nodes.contains_key(&node) {
                return Err(GraphError::UnknownNode(node));
            }
        }

        if self.edges.contains(source, target) {
            return Err(GraphError::DuplicateEdge(source, target));
        }

        self.link_siblings(source, target);
        self.edges.insert(source, target, attributes);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        self.edges
            .remove(source, target)
            .ok_or(GraphError::MissingEdge(source, target))?;
        self.unlink_siblings(source, target);
        Ok(())
    }

    /// Removes a node with its intralayer edges and records why it left.
    pub(crate) fn drop_node(
        &mut self,
        node: NodeId,
        reason: NodeStatus,
    ) -> Result<SceneGraphNode, GraphError> {
        let removed = self
            .nodes
            .remove(&node)
            .ok_or(GraphError::UnknownNode(node))?;

        for sibling in &removed.siblings {
            if self.edges.remove(node, *sibling).is_none() {
                continue;
            }

            if let Some(other) = self.nodes.get_mut(sibling) {
                other.siblings.remove(&node);
            }
        }

        self.status.insert(node, reason);
        Ok(removed)
    }

    /// Moves every intralayer edge of `from` onto `to`, then drops `from`.
    pub(crate) fn absorb(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfMerge(from));
        }

        if !self.nodes.contains_key(&to) {
            return Err(GraphError::UnknownNode(to));
        }

        let siblings: Vec<NodeId> = self
            .nodes
            .get(&from)
            .ok_or(GraphError::UnknownNode(from))?
            .siblings
            .iter()
            .copied()
            .collect();

        for sibling in siblings {
            let Some(edge) = self.edges.remove(from, sibling) else {
                continue;
            };
            self.unlink_siblings(from, sibling);

            // the edge between the merged pair disappears, existing edges win
            if sibling == to || self.edges.contains(to, sibling) {
                continue;
            }

            let (source, target) = if edge.source == from {
                (to, sibling)
            } else {
                (sibling, to)
            };
            self.link_siblings(source, target);
            self.edges.insert(source, target, Some(edge.attributes));
        }

        self.drop_node(from, NodeStatus::Merged)?;
        Ok(())
    }

    pub(crate) fn new_nodes(&mut self, out: &mut Vec<NodeId>, clear: bool) {
        for (id, status) in self.status.iter_mut() {
            if *status != NodeStatus::New {
                continue;
            }

            out.push(*id);
            if clear {
                *status = NodeStatus::Visible;
            }
        }
    }

    pub(crate) fn removed_nodes(&mut self, out: &mut Vec<NodeId>, clear: bool) {
        out.extend(self.removed_node_ids());
        if clear {
            self.status
                .retain(|_, status| !matches!(status, NodeStatus::Removed | NodeStatus::Merged));
        }
    }

    pub(crate) fn take_nodes(&mut self) -> BTreeMap<NodeId, SceneGraphNode> {
        std::mem::take(&mut self.nodes)
    }

    pub(crate) fn reset(&mut self) {
        self.nodes.clear();
        self.status.clear();
        self.edges.reset();
    }

    fn link_siblings(&mut self, a: NodeId, b: NodeId) {
        if let Some(node) = self.nodes.get_mut(&a) {
            node.siblings.insert(b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.siblings.insert(a);
        }
    }

    fn unlink_siblings(&mut self, a: NodeId, b: NodeId) {
        if let Some(node) = self.nodes.get_mut(&a) {
            node.siblings.remove(&b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            node.siblings.remove(&a);
        }
    }
}

/// Common interface of static layers and dynamic streams.
pub trait Layer {
    fn key(&self) -> LayerKey;

    fn store(&self) -> &LayerStore;

    fn store_mut(&mut self) -> &mut LayerStore;

    fn num_nodes(&self) -> usize {
        self.store().num_nodes()
    }

    fn num_edges(&self) -> usize {
        self.store().edges().len()
    }

    fn has_node(&self, node: NodeId) -> bool {
        self.store().contains(node)
    }

    fn get_node(&self, node: NodeId) -> Option<&SceneGraphNode> {
        self.store().get(node)
    }

    fn node_status(&self, node: NodeId) -> Option<NodeStatus> {
        self.store().status(node)
    }

    fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.store().edges().contains(source, target)
    }

    fn get_edge(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        self.store().edges().get(source, target)
    }

    fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Option<Box<dyn EdgeAttributes>>,
    ) -> Result<(), GraphError> {
        self.store_mut().connect(source, target, attributes)
    }

    fn remove_edge(&mut self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        self.store_mut().disconnect(source, target)
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.store_mut()
            .drop_node(node, NodeStatus::Removed)
            .map(|_| ())
    }

    fn position(&self, node: NodeId) -> Option<Point3> {
        self.get_node(node).map(SceneGraphNode::position)
    }

    fn new_nodes(&mut self, out: &mut Vec<NodeId>, clear: bool) {
        self.store_mut().new_nodes(out, clear)
    }

    fn removed_nodes(&mut self, out: &mut Vec<NodeId>, clear: bool) {
        self.store_mut().removed_nodes(out, clear)
    }

    fn new_edges(&mut self, out: &mut Vec<EdgeKey>, clear: bool) {
        self.store_mut().edges_mut().new_edges(out, clear)
    }

    fn removed_edges(&mut self, out: &mut Vec<EdgeKey>, clear: bool) {
        self.store_mut().edges_mut().removed_edges(out, clear)
    }
}

/// A static layer: nodes keyed by caller-chosen ids.
#[derive(Debug, Clone)]
pub struct SceneGraphLayer {
    pub id: LayerId,
    store: LayerStore,
}

impl SceneGraphLayer {
    pub fn new(id: LayerId) -> Self {
        Self {
            id,
            store: LayerStore::default(),
        }
    }

    pub fn emplace_node(
        &mut self,
        node: NodeId,
        attributes: Box<dyn NodeAttributes>,
    ) -> Result<(), GraphError> {
        self.insert_node(SceneGraphNode::new(node, self.id, attributes))
    }

    /// Adds a caller-built node. Ancestry the node may carry from another
    /// graph is discarded.
    pub fn insert_node(&mut self, mut node: SceneGraphNode) -> Result<(), GraphError> {
        if node.layer != self.key() {
            return Err(GraphError::LayerMismatch {
                from: node.layer,
                to: self.key(),
            });
        }

        if self.store.contains(node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        node.clear_ancestry();
        self.store.add(node);
        Ok(())
    }

    /// Folds `from` into `to`; `to` keeps its attributes.
    pub fn merge_nodes(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.store.absorb(from, to)
    }

    /// Copies nodes and edges of `other` that this layer lacks.
    ///
    /// Known nodes and edges get their attributes replaced when
    /// `update_attributes` is set. New nodes are registered in `lookup`; a node
    /// whose id already lives in another layer is skipped. Returns the number
    /// of nodes added.
    pub fn merge_layer(
        &mut self,
        other: &SceneGraphLayer,
        lookup: &mut NodeLookup,
        update_attributes: bool,
    ) -> usize {
        let key = self.key();
        let mut added = 0;

        for (id, other_node) in other.store.nodes() {
            if let Some(node) = self.store.get_mut(*id) {
                if update_attributes {
                    node.attributes = other_node.attributes.clone();
                }
                continue;
            }

            if let Some(owner) = lookup.get(id) {
                warn!(node = %NodeSymbol::from(*id), %owner, layer = %key, "skipping node owned by another layer");
                continue;
            }

            self.store.add(SceneGraphNode::new(
                *id,
                key,
                other_node.attributes.clone(),
            ));
            lookup.insert(*id, key);
            added += 1;
        }

        for (_, edge) in other.store.edges().iter() {
            if let Some(existing) = self.store.edges_mut().get_mut(edge.source, edge.target) {
                if update_attributes {
                    existing.attributes = edge.attributes.clone();
                }
                continue;
            }

            // edges to nodes that were skipped or removed locally are dropped
            let _ = self
                .store
                .connect(edge.source, edge.target, Some(edge.attributes.clone()));
        }

        added
    }

    pub fn nodes(&self) -> btree_map::Iter<'_, NodeId, SceneGraphNode> {
        self.store.nodes()
    }

    pub fn edges(&self) -> &EdgeContainer {
        self.store.edges()
    }

    /// Drops every node, edge and change marker.
    pub fn reset(&mut self) {
        self.store.reset();
    }
}

impl Layer for SceneGraphLayer {
    fn key(&self) -> LayerKey {
        LayerKey::new(self.id)
    }

    fn store(&self) -> &LayerStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }
}
