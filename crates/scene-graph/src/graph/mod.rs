//! The layered scene graph.
//!
//! Nodes live in static layers or in prefixed dynamic streams; every node id
//! is registered in a single lookup that names its owning layer. Edges inside
//! one layer belong to that layer, edges across layers belong to one of two
//! interlayer stores and drive the parent/child/sibling relations.

mod edges;
mod merge;
mod mesh;

pub use merge::{MergeOptions, MergeSummary};

use crate::attributes::{NodeAttributes, Point3};
use crate::config::GraphConfig;
use crate::dynamic_layer::DynamicLayer;
use crate::edge::EdgeContainer;
use crate::error::{ConfigError, GraphError};
use crate::ids::{LayerId, LayerPrefix, NodeId, NodeSymbol};
use crate::layer::{Layer, SceneGraphLayer};
use crate::layer_key::{LayerHierarchy, LayerKey, NodeLookup};
use crate::mesh::{MeshEdgeIndex, MeshFaces, MeshVertices};
use crate::node::SceneGraphNode;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub type DynamicLayers = BTreeMap<LayerPrefix, DynamicLayer>;

#[derive(Debug, Clone)]
pub struct DynamicSceneGraph {
    mesh_layer_id: LayerId,
    layer_ids: Vec<LayerId>,
    hierarchy: LayerHierarchy,
    layers: BTreeMap<LayerId, SceneGraphLayer>,
    dynamic_layers: BTreeMap<LayerId, DynamicLayers>,
    node_lookup: NodeLookup,
    interlayer_edges: EdgeContainer,
    dynamic_interlayer_edges: EdgeContainer,
    mesh_vertices: Option<Arc<MeshVertices>>,
    mesh_faces: Option<Arc<MeshFaces>>,
    mesh_edges: MeshEdgeIndex,
}

impl Default for DynamicSceneGraph {
    fn default() -> Self {
        let config = GraphConfig::default();
        Self::new(config.layer_ids, config.mesh_layer_id)
    }
}

impl DynamicSceneGraph {
    /// Creates a graph with one empty static layer per id.
    ///
    /// # Panics
    ///
    /// Panics if `layer_ids` is empty, repeats an id, or contains
    /// `mesh_layer_id`. Use [`DynamicSceneGraph::try_new`] to handle these
    /// as errors.
    pub fn new(layer_ids: Vec<LayerId>, mesh_layer_id: LayerId) -> Self {
        match Self::try_new(layer_ids, mesh_layer_id) {
            Ok(graph) => graph,
            Err(e) => panic!("invalid scene graph layout: {e}"),
        }
    }

    pub fn try_new(layer_ids: Vec<LayerId>, mesh_layer_id: LayerId) -> Result<Self, ConfigError> {
        Self::with_config(&GraphConfig::new(layer_ids, mesh_layer_id))
    }

    pub fn with_config(config: &GraphConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut graph = Self {
            mesh_layer_id: config.mesh_layer_id,
            layer_ids: config.layer_ids.clone(),
            hierarchy: LayerHierarchy::new(&config.layer_ids),
            layers: BTreeMap::new(),
            dynamic_layers: BTreeMap::new(),
            node_lookup: NodeLookup::new(),
            interlayer_edges: EdgeContainer::new(),
            dynamic_interlayer_edges: EdgeContainer::new(),
            mesh_vertices: None,
            mesh_faces: None,
            mesh_edges: MeshEdgeIndex::new(),
        };
        graph.clear();
        Ok(graph)
    }

    /// Drops every node, edge, dynamic layer and the mesh, leaving one empty
    /// static layer per configured id.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.dynamic_layers.clear();
        self.node_lookup.clear();
        self.interlayer_edges.reset();
        self.dynamic_interlayer_edges.reset();
        self.mesh_vertices = None;
        self.mesh_faces = None;
        self.mesh_edges.clear();

        for id in &self.layer_ids {
            self.layers.insert(*id, SceneGraphLayer::new(*id));
        }
    }

    pub fn mesh_layer_id(&self) -> LayerId {
        self.mesh_layer_id
    }

    pub fn layer_ids(&self) -> &[LayerId] {
        &self.layer_ids
    }

    pub fn hierarchy(&self) -> &LayerHierarchy {
        &self.hierarchy
    }

    /// Creates the stream `prefix` of dynamic layer `layer`. Returns `false`
    /// if it already exists.
    pub fn create_dynamic_layer(&mut self, layer: LayerId, prefix: LayerPrefix) -> bool {
        let streams = self.dynamic_layers.entry(layer).or_default();
        if streams.contains_key(&prefix) {
            return false;
        }

        streams.insert(prefix, DynamicLayer::new(layer, prefix));
        debug!(layer, %prefix, "created dynamic layer");
        true
    }

    pub fn emplace_node(
        &mut self,
        layer_id: LayerId,
        node_id: NodeId,
        attributes: Box<dyn NodeAttributes>,
    ) -> Result<(), GraphError> {
        let Some(layer) = self.layers.get_mut(&layer_id) else {
            warn!(layer = layer_id, "invalid layer");
            return Err(GraphError::UnknownLayer(LayerKey::new(layer_id)));
        };

        if self.node_lookup.contains_key(&node_id) {
            return Err(GraphError::DuplicateNode(node_id));
        }

        layer.emplace_node(node_id, attributes)?;
        self.node_lookup.insert(node_id, layer.key());
        Ok(())
    }

    /// Appends a node to the stream `prefix` of dynamic layer `layer`,
    /// creating the stream if needed. Returns the id the stream assigned.
    pub fn emplace_dynamic_node(
        &mut self,
        layer: LayerId,
        prefix: LayerPrefix,
        timestamp: Duration,
        attributes: Box<dyn NodeAttributes>,
        add_edge: bool,
    ) -> Result<NodeId, GraphError> {
        let key = LayerKey::dynamic(layer, prefix);
        let new_id = self
            .dynamic_layers
            .get(&layer)
            .and_then(|streams| streams.get(&prefix))
            .map(DynamicLayer::next_node_id)
            .unwrap_or_else(|| prefix.make_id(0));

        if self.node_lookup.contains_key(&new_id) {
            error!(
                node = %NodeSymbol::from(new_id),
                %prefix,
                "scene graph already contains node, fix conflicting prefix"
            );
            return Err(GraphError::NodeIdCollision { node: new_id, layer: key });
        }

        self.create_dynamic_layer(layer, prefix);
        let stream = self
            .dynamic_layers
            .get_mut(&layer)
            .and_then(|streams| streams.get_mut(&prefix))
            .ok_or(GraphError::UnknownLayer(key))?;

        let node_id = stream.emplace_node(timestamp, attributes, add_edge)?;
        self.node_lookup.insert(node_id, key);
        Ok(node_id)
    }

    /// Adds a caller-built node to the static layer named by `node.layer`.
    pub fn insert_node(&mut self, node: SceneGraphNode) -> Result<(), GraphError> {
        if node.layer.is_dynamic() {
            return Err(GraphError::Unsupported(
                "inserting caller-built nodes into dynamic layers",
            ));
        }

        if self.node_lookup.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        let (node_id, key) = (node.id, node.layer);
        let layer = self
            .layers
            .get_mut(&key.layer)
            .ok_or(GraphError::UnknownLayer(key))?;
        layer.insert_node(node)?;
        self.node_lookup.insert(node_id, key);
        Ok(())
    }

    /// Removes a node with its mesh edges and every interlayer edge touching
    /// it, then the node itself and its intralayer edges.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<(), GraphError> {
        let key = self.lookup_key(node_id)?;
        let node = self
            .get_node(node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;

        let parent = node.parent;
        let children: Vec<NodeId> = node.children.iter().copied().collect();
        let siblings = self.interlayer_siblings(node, &key);

        self.mesh_edges.remove_node(node_id);

        if let Some(parent) = parent {
            self.remove_interlayer_edge_between(node_id, parent);
        }

        for other in children.into_iter().chain(siblings) {
            self.remove_interlayer_edge_between(node_id, other);
        }

        self.layer_from_key_mut(&key)
            .ok_or(GraphError::UnknownLayer(key))?
            .remove_node(node_id)?;
        self.node_lookup.remove(&node_id);
        debug!(node = %NodeSymbol::from(node_id), layer = %key, "removed node");
        Ok(())
    }

    /// Folds `from` into `to`: interlayer edges and mesh edges of `from` move
    /// to `to`, intralayer edges are consolidated by the layer, and `from`
    /// leaves the graph.
    pub fn merge_nodes(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let from_key = self.lookup_key(from)?;
        let to_key = self.lookup_key(to)?;

        if from == to {
            return Err(GraphError::SelfMerge(from));
        }

        if from_key != to_key {
            return Err(GraphError::LayerMismatch {
                from: from_key,
                to: to_key,
            });
        }

        if from_key.is_dynamic() {
            return Err(GraphError::Unsupported("merging nodes of dynamic layers"));
        }

        let node = self.get_node(from).ok_or(GraphError::UnknownNode(from))?;
        let parent = node.parent;
        let children: Vec<NodeId> = node.children.iter().copied().collect();
        let siblings = self.interlayer_siblings(node, &from_key);

        if let Some(parent) = parent {
            self.rewire_interlayer_edge(from, parent, to, parent)?;
        }

        for other in children.into_iter().chain(siblings) {
            self.rewire_interlayer_edge(from, other, to, other)?;
        }

        self.transfer_mesh_edges(from, to);

        self.layers
            .get_mut(&from_key.layer)
            .ok_or(GraphError::UnknownLayer(from_key))?
            .merge_nodes(from, to)?;
        self.node_lookup.remove(&from);
        debug!(from = %NodeSymbol::from(from), to = %NodeSymbol::from(to), "merged nodes");
        Ok(())
    }

    /// Whether the static layer exists. For the mesh layer id, whether a mesh
    /// is set.
    pub fn has_layer(&self, layer_id: LayerId) -> bool {
        if layer_id == self.mesh_layer_id {
            return self.has_mesh();
        }

        self.layers.contains_key(&layer_id)
    }

    pub fn has_dynamic_layer(&self, layer_id: LayerId, prefix: LayerPrefix) -> bool {
        self.dynamic_layers
            .get(&layer_id)
            .is_some_and(|streams| streams.contains_key(&prefix))
    }

    pub fn has_node(&self, node_id: NodeId) -> bool {
        self.node_lookup.contains_key(&node_id)
    }

    /// # Panics
    ///
    /// Panics if the static layer does not exist.
    pub fn layer(&self, layer_id: LayerId) -> &SceneGraphLayer {
        match self.layers.get(&layer_id) {
            Some(layer) => layer,
            None => panic!("missing layer {layer_id}"),
        }
    }

    /// # Panics
    ///
    /// Panics if the dynamic layer does not exist.
    pub fn dynamic_layer(&self, layer_id: LayerId, prefix: LayerPrefix) -> &DynamicLayer {
        match self
            .dynamic_layers
            .get(&layer_id)
            .and_then(|streams| streams.get(&prefix))
        {
            Some(layer) => layer,
            None => panic!("missing dynamic layer {layer_id}({prefix})"),
        }
    }

    pub fn layers(&self) -> &BTreeMap<LayerId, SceneGraphLayer> {
        &self.layers
    }

    pub fn dynamic_layers(&self) -> &BTreeMap<LayerId, DynamicLayers> {
        &self.dynamic_layers
    }

    pub fn node_lookup(&self) -> &NodeLookup {
        &self.node_lookup
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&SceneGraphNode> {
        let key = self.node_lookup.get(&node_id)?;
        self.layer_from_key(key)?.get_node(node_id)
    }

    pub fn get_dynamic_node(&self, node_id: NodeId) -> Option<&SceneGraphNode> {
        let key = self.node_lookup.get(&node_id)?;
        if !key.is_dynamic() {
            return None;
        }

        self.layer_from_key(key)?.get_node(node_id)
    }

    pub fn get_layer_for_node(&self, node_id: NodeId) -> Option<LayerKey> {
        self.node_lookup.get(&node_id).copied()
    }

    pub fn is_dynamic(&self, node_id: NodeId) -> bool {
        self.node_lookup
            .get(&node_id)
            .is_some_and(LayerKey::is_dynamic)
    }

    /// # Panics
    ///
    /// Panics if the node is not in the graph.
    pub fn position(&self, node_id: NodeId) -> Point3 {
        match self.get_node(node_id) {
            Some(node) => node.position(),
            None => panic!("node {} is not in the graph", NodeSymbol::from(node_id)),
        }
    }

    /// Static layers, the mesh, and every dynamic layer id without a static
    /// counterpart.
    pub fn num_layers(&self) -> usize {
        let dynamic_only = self
            .dynamic_layers
            .keys()
            .filter(|id| !self.layers.contains_key(id) && **id != self.mesh_layer_id)
            .count();

        self.layers.len() + 1 + dynamic_only
    }

    pub fn num_dynamic_layers(&self) -> usize {
        self.dynamic_layers.values().map(BTreeMap::len).sum()
    }

    pub fn num_dynamic_layers_of_type(&self, layer_id: LayerId) -> usize {
        self.dynamic_layers.get(&layer_id).map_or(0, BTreeMap::len)
    }

    /// Nodes of every layer plus mesh vertices.
    pub fn num_nodes(&self) -> usize {
        let static_nodes: usize = self.layers.values().map(|layer| layer.num_nodes()).sum();
        static_nodes + self.num_dynamic_nodes() + self.mesh_vertices.as_ref().map_or(0, |v| v.len())
    }

    pub fn num_dynamic_nodes(&self) -> usize {
        self.dynamic_layers
            .values()
            .flat_map(BTreeMap::values)
            .map(|layer| layer.num_nodes())
            .sum()
    }

    /// Intralayer, interlayer and mesh edges.
    pub fn num_edges(&self) -> usize {
        let static_edges: usize = self.layers.values().map(|layer| layer.num_edges()).sum();
        let dynamic_edges: usize = self
            .dynamic_layers
            .values()
            .flat_map(BTreeMap::values)
            .map(|layer| layer.num_edges())
            .sum();

        static_edges
            + dynamic_edges
            + self.interlayer_edges.len()
            + self.dynamic_interlayer_edges.len()
            + self.mesh_edges.len()
    }

    /// Calls `visitor` on every static layer, then every dynamic stream.
    pub fn visit_layers(&mut self, mut visitor: impl FnMut(LayerKey, &mut dyn Layer)) {
        for layer in self.layers.values_mut() {
            visitor(layer.key(), layer);
        }

        for streams in self.dynamic_layers.values_mut() {
            for layer in streams.values_mut() {
                visitor(layer.key(), layer);
            }
        }
    }

    pub(super) fn lookup_key(&self, node_id: NodeId) -> Result<LayerKey, GraphError> {
        self.node_lookup
            .get(&node_id)
            .copied()
            .ok_or(GraphError::UnknownNode(node_id))
    }

    pub(super) fn layer_from_key(&self, key: &LayerKey) -> Option<&dyn Layer> {
        match key.prefix {
            Some(prefix) => self
                .dynamic_layers
                .get(&key.layer)?
                .get(&prefix)
                .map(|layer| layer as &dyn Layer),
            None => self.layers.get(&key.layer).map(|layer| layer as &dyn Layer),
        }
    }

    pub(super) fn layer_from_key_mut(&mut self, key: &LayerKey) -> Option<&mut dyn Layer> {
        match key.prefix {
            Some(prefix) => self
                .dynamic_layers
                .get_mut(&key.layer)?
                .get_mut(&prefix)
                .map(|layer| layer as &mut dyn Layer),
            None => self
                .layers
                .get_mut(&key.layer)
                .map(|layer| layer as &mut dyn Layer),
        }
    }

    pub(super) fn node_mut(&mut self, node_id: NodeId) -> Option<&mut SceneGraphNode> {
        let key = *self.node_lookup.get(&node_id)?;
        self.layer_from_key_mut(&key)?.store_mut().get_mut(node_id)
    }

    /// Siblings of `node` that live in another layer, i.e. the far ends of
    /// its sibling interlayer edges.
    fn interlayer_siblings(&self, node: &SceneGraphNode, key: &LayerKey) -> Vec<NodeId> {
        node.siblings
            .iter()
            .copied()
            .filter(|sibling| self.node_lookup.get(sibling) != Some(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::NodeInfo;
    use crate::ids::DsgLayers;

    fn attrs() -> Box<dyn NodeAttributes> {
        NodeInfo::boxed(Point3::default())
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(
            DynamicSceneGraph::try_new(vec![], 1).unwrap_err(),
            ConfigError::NoLayers
        );
        assert_eq!(
            DynamicSceneGraph::try_new(vec![1, 2], 1).unwrap_err(),
            ConfigError::MeshLayerCollision(1)
        );
    }

    #[test]
    #[should_panic(expected = "mesh layer id 1 must be unique")]
    fn test_new_panics_on_collision() {
        DynamicSceneGraph::new(vec![1, 2], 1);
    }

    #[test]
    fn test_default_layout() {
        let graph = DynamicSceneGraph::default();
        assert_eq!(graph.num_layers(), 5);
        assert!(graph.has_layer(DsgLayers::PLACES));
        assert!(!graph.has_layer(DsgLayers::MESH));
        assert_eq!(graph.num_nodes(), 0);
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn test_emplace_node() {
        let mut graph = DynamicSceneGraph::default();
        graph.emplace_node(DsgLayers::OBJECTS, 1, attrs()).unwrap();

        assert_eq!(
            graph.emplace_node(DsgLayers::PLACES, 1, attrs()),
            Err(GraphError::DuplicateNode(1))
        );
        assert_eq!(
            graph.emplace_node(42, 2, attrs()),
            Err(GraphError::UnknownLayer(LayerKey::new(42)))
        );
        assert_eq!(graph.num_nodes(), 1);
        assert_eq!(
            graph.get_layer_for_node(1),
            Some(LayerKey::new(DsgLayers::OBJECTS))
        );
        assert!(!graph.has_node(2));
    }

    #[test]
    fn test_create_dynamic_layer_is_idempotent() {
        let mut graph = DynamicSceneGraph::default();
        let prefix = LayerPrefix::new('a');
        assert!(graph.create_dynamic_layer(DsgLayers::AGENTS, prefix));
        assert!(!graph.create_dynamic_layer(DsgLayers::AGENTS, prefix));
        assert!(graph.create_dynamic_layer(DsgLayers::AGENTS, LayerPrefix::new('b')));
        assert_eq!(graph.num_dynamic_layers(), 2);
        assert_eq!(graph.num_dynamic_layers_of_type(DsgLayers::AGENTS), 2);
        // agents share an id with objects, so no extra layer is counted
        assert_eq!(graph.num_layers(), 5);

        graph.create_dynamic_layer(42, prefix);
        assert_eq!(graph.num_layers(), 6);
    }

    #[test]
    fn test_emplace_dynamic_node() {
        let mut graph = DynamicSceneGraph::default();
        let prefix = LayerPrefix::new('a');

        let first = graph
            .emplace_dynamic_node(DsgLayers::AGENTS, prefix, Duration::from_nanos(10), attrs(), false)
            .unwrap();
        let second = graph
            .emplace_dynamic_node(DsgLayers::AGENTS, prefix, Duration::from_nanos(20), attrs(), true)
            .unwrap();

        assert_eq!(first, prefix.make_id(0));
        assert_eq!(second, prefix.make_id(1));
        assert!(graph.is_dynamic(second));
        assert!(graph.get_dynamic_node(second).is_some());
        assert!(graph.has_edge(first, second));
        assert_eq!(graph.num_dynamic_nodes(), 2);
    }

    #[test]
    fn test_dynamic_prefix_collision() {
        let mut graph = DynamicSceneGraph::default();
        let prefix = LayerPrefix::new('a');
        graph
            .emplace_node(DsgLayers::OBJECTS, prefix.make_id(0), attrs())
            .unwrap();

        let result =
            graph.emplace_dynamic_node(DsgLayers::AGENTS, prefix, Duration::from_nanos(1), attrs(), false);
        assert!(matches!(result, Err(GraphError::NodeIdCollision { .. })));
        assert!(!graph.has_dynamic_layer(DsgLayers::AGENTS, prefix));
    }

    #[test]
    fn test_insert_node() {
        let mut graph = DynamicSceneGraph::default();
        let node = SceneGraphNode::new(5, DsgLayers::ROOMS, attrs());
        graph.insert_node(node).unwrap();
        assert!(graph.has_node(5));

        let duplicate = SceneGraphNode::new(5, DsgLayers::PLACES, attrs());
        assert_eq!(graph.insert_node(duplicate), Err(GraphError::DuplicateNode(5)));

        let missing = SceneGraphNode::new(6, LayerKey::new(42), attrs());
        assert!(matches!(
            graph.insert_node(missing),
            Err(GraphError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_clear_restores_empty_layers() {
        let mut graph = DynamicSceneGraph::default();
        graph.emplace_node(DsgLayers::OBJECTS, 1, attrs()).unwrap();
        graph
            .emplace_dynamic_node(DsgLayers::AGENTS, LayerPrefix::new('a'), Duration::ZERO, attrs(), false)
            .unwrap();

        graph.clear();
        assert_eq!(graph.num_nodes(), 0);
        assert_eq!(graph.num_dynamic_layers(), 0);
        assert!(graph.node_lookup().is_empty());
        assert_eq!(graph.layers().len(), 4);
    }

    #[test]
    #[should_panic(expected = "missing layer 42")]
    fn test_layer_accessor_panics() {
        DynamicSceneGraph::default().layer(42);
    }

    #[test]
    #[should_panic(expected = "is not in the graph")]
    fn test_position_panics_for_unknown_node() {
        DynamicSceneGraph::default().position(7);
    }
}
