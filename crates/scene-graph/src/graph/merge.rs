use super::DynamicSceneGraph;
use crate::dynamic_layer::DynamicLayer;
use crate::edge::{EdgeKey, SceneGraphEdge};
use crate::error::GraphError;
use crate::ids::{LayerId, NodeId, NodeSymbol};
use crate::layer::{Layer, SceneGraphLayer};
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// How [`DynamicSceneGraph::merge_graph`] treats the incoming graph.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Accept mesh edges to vertices the local mesh does not have.
    pub allow_invalid_mesh: bool,
    /// Drop local mesh edges before copying the incoming ones.
    pub clear_mesh_edges: bool,
    /// Per static layer, whether attributes of known nodes are overwritten.
    /// Layers not listed are updated.
    pub update_map: HashMap<LayerId, bool>,
    /// Whether attributes of known dynamic nodes are overwritten.
    pub update_dynamic: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            allow_invalid_mesh: false,
            clear_mesh_edges: true,
            update_map: HashMap::new(),
            update_dynamic: true,
        }
    }
}

/// What a merge changed locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub nodes_added: usize,
    pub dynamic_nodes_added: usize,
    pub nodes_removed: usize,
    pub interlayer_edges_added: usize,
    pub mesh_edges_added: usize,
}

impl DynamicSceneGraph {
    /// Moves the contents of a detached layer into the matching static layer.
    ///
    /// `other` is drained: known nodes take its attributes, new nodes are
    /// added without ancestry, and nodes owned by another layer are skipped.
    /// `edges` is drained the same way; edges that cannot be added are
    /// dropped.
    pub fn update_from_layer(
        &mut self,
        other: &mut SceneGraphLayer,
        edges: Option<&mut Vec<SceneGraphEdge>>,
    ) -> Result<(), GraphError> {
        let key = other.key();
        let Some(layer) = self.layers.get_mut(&other.id) else {
            error!(layer = %key, "scene graph does not have layer");
            return Err(GraphError::UnknownLayer(key));
        };

        for (id, mut node) in other.store_mut().take_nodes() {
            if let Some(existing) = layer.store_mut().get_mut(id) {
                existing.attributes = node.attributes;
                continue;
            }

            if let Some(owner) = self.node_lookup.get(&id) {
                warn!(node = %NodeSymbol::from(id), %owner, layer = %key, "skipping node owned by another layer");
                continue;
            }

            node.clear_ancestry();
            node.layer = key;
            layer.store_mut().add(node);
            self.node_lookup.insert(id, key);
        }
        other.reset();

        let Some(edges) = edges else {
            return Ok(());
        };

        for edge in edges.drain(..) {
            if let Some(existing) = layer.store_mut().edges_mut().get_mut(edge.source, edge.target) {
                existing.attributes = edge.attributes;
                continue;
            }

            if let Err(err) = layer.insert_edge(edge.source, edge.target, Some(edge.attributes)) {
                debug!(%err, layer = %key, "dropping edge from layer update");
            }
        }

        Ok(())
    }

    /// Pulls the state of `other` into this graph.
    ///
    /// Dynamic streams are extended with indices not yet seen, static layers
    /// gain missing nodes and edges, nodes `other` removed are removed here,
    /// and interlayer and mesh edges are copied over. Anything that cannot be
    /// applied, such as an edge to a node missing locally, is skipped, so
    /// merging the same graph twice changes nothing the second time.
    pub fn merge_graph(&mut self, other: &DynamicSceneGraph, options: &MergeOptions) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut removed = Vec::new();

        for (layer_id, streams) in &other.dynamic_layers {
            for (prefix, other_stream) in streams {
                let stream = self
                    .dynamic_layers
                    .entry(*layer_id)
                    .or_default()
                    .entry(*prefix)
                    .or_insert_with(|| DynamicLayer::new(*layer_id, *prefix));

                summary.dynamic_nodes_added +=
                    stream.merge_layer(other_stream, &mut self.node_lookup, options.update_dynamic);
                removed.extend(other_stream.store().removed_node_ids());
            }
        }

        for (layer_id, other_layer) in &other.layers {
            let Some(layer) = self.layers.get_mut(layer_id) else {
                debug!(layer = layer_id, "skipping layer missing from local graph");
                continue;
            };

            let update = options.update_map.get(layer_id).copied().unwrap_or(true);
            summary.nodes_added += layer.merge_layer(other_layer, &mut self.node_lookup, update);
            removed.extend(other_layer.store().removed_node_ids());
        }

        for node in removed {
            if self.has_node(node) && self.remove_node(node).is_ok() {
                summary.nodes_removed += 1;
            }
        }

        let interlayer = other
            .interlayer_edges
            .iter()
            .chain(other.dynamic_interlayer_edges.iter());
        for (_, edge) in interlayer {
            if self.has_edge(edge.source, edge.target) {
                continue;
            }

            if self
                .insert_edge(edge.source, edge.target, Some(edge.attributes.clone()))
                .is_ok()
            {
                summary.interlayer_edges_added += 1;
            }
        }

        if options.clear_mesh_edges {
            self.clear_mesh_edges();
        }

        for (_, edge) in other.mesh_edges.iter() {
            if self
                .insert_mesh_edge(edge.source_node, edge.mesh_vertex, options.allow_invalid_mesh)
                .is_ok()
            {
                summary.mesh_edges_added += 1;
            }
        }

        debug!(?summary, "merged scene graph");
        summary
    }

    /// Nodes added since the last clearing call, across all layers.
    pub fn get_new_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.visit_layers(|_, layer| layer.new_nodes(&mut nodes, clear));
        nodes
    }

    /// Nodes removed or merged away since the last clearing call.
    pub fn get_removed_nodes(&mut self, clear: bool) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.visit_layers(|_, layer| layer.removed_nodes(&mut nodes, clear));
        nodes
    }

    pub fn get_new_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        let mut edges = Vec::new();
        self.visit_layers(|_, layer| layer.new_edges(&mut edges, clear));
        self.interlayer_edges.new_edges(&mut edges, clear);
        self.dynamic_interlayer_edges.new_edges(&mut edges, clear);
        edges
    }

    pub fn get_removed_edges(&mut self, clear: bool) -> Vec<EdgeKey> {
        let mut edges = Vec::new();
        self.visit_layers(|_, layer| layer.removed_edges(&mut edges, clear));
        self.interlayer_edges.removed_edges(&mut edges, clear);
        self.dynamic_interlayer_edges.removed_edges(&mut edges, clear);
        edges
    }
}
