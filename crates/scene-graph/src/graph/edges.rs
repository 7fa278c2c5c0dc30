use super::DynamicSceneGraph;
use crate::attributes::EdgeAttributes;
use crate::edge::{EdgeContainer, SceneGraphEdge};
use crate::error::GraphError;
use crate::ids::{NodeId, NodeSymbol};
use crate::layer_key::LayerKey;
use tracing::trace;

impl DynamicSceneGraph {
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.get_edge(source, target).is_some()
    }

    pub fn get_edge(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        let source_key = self.node_lookup.get(&source)?;
        let target_key = self.node_lookup.get(&target)?;

        if source_key == target_key {
            return self.layer_from_key(source_key)?.get_edge(source, target);
        }

        self.interlayer_store(source_key, target_key)
            .get(source, target)
    }

    /// Connects two nodes. Within one layer the edge belongs to that layer;
    /// across layers it is an interlayer edge and sets up the parent/child or
    /// sibling relation implied by the layer hierarchy.
    pub fn insert_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Option<Box<dyn EdgeAttributes>>,
    ) -> Result<(), GraphError> {
        let source_key = self.lookup_key(source)?;
        let target_key = self.lookup_key(target)?;

        if self.has_edge(source, target) {
            return Err(GraphError::DuplicateEdge(source, target));
        }

        if source_key == target_key {
            return self
                .layer_from_key_mut(&source_key)
                .ok_or(GraphError::UnknownLayer(source_key))?
                .insert_edge(source, target, attributes);
        }

        self.add_ancestry(source, target, &source_key, &target_key)?;
        self.interlayer_store_mut(&source_key, &target_key)
            .insert(source, target, attributes);
        Ok(())
    }

    pub fn remove_edge(&mut self, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        let source_key = self.lookup_key(source)?;
        let target_key = self.lookup_key(target)?;

        if !self.has_edge(source, target) {
            return Err(GraphError::MissingEdge(source, target));
        }

        if source_key == target_key {
            return self
                .layer_from_key_mut(&source_key)
                .ok_or(GraphError::UnknownLayer(source_key))?
                .remove_edge(source, target);
        }

        self.remove_interlayer_edge(source, target, &source_key, &target_key);
        Ok(())
    }

    /// Moves the interlayer edge `source -> target` onto
    /// `new_source -> new_target`, carrying its attributes.
    ///
    /// The old edge is dropped instead when the new endpoints are already
    /// connected, share a layer, or cannot take the new parent relation.
    pub fn rewire_interlayer_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        new_source: NodeId,
        new_target: NodeId,
    ) -> Result<(), GraphError> {
        if source == new_source && target == new_target {
            return Ok(());
        }

        let source_key = self.lookup_key(source)?;
        let target_key = self.lookup_key(target)?;
        let new_source_key = self.lookup_key(new_source)?;
        let new_target_key = self.lookup_key(new_target)?;

        if source_key == target_key
            || !self
                .interlayer_store(&source_key, &target_key)
                .contains(source, target)
        {
            return Err(GraphError::MissingEdge(source, target));
        }

        if self.has_edge(new_source, new_target) || new_source_key == new_target_key {
            trace!(
                source = %NodeSymbol::from(source),
                target = %NodeSymbol::from(target),
                "dropping interlayer edge instead of rewiring"
            );
            self.remove_interlayer_edge(source, target, &source_key, &target_key);
            return Ok(());
        }

        self.remove_ancestry(source, target, &source_key, &target_key);
        let attributes = self
            .interlayer_store_mut(&source_key, &target_key)
            .remove(source, target)
            .map(|edge| edge.attributes);

        if let Err(err) = self.add_ancestry(new_source, new_target, &new_source_key, &new_target_key) {
            trace!(%err, "dropping interlayer edge instead of rewiring");
            return Ok(());
        }

        self.interlayer_store_mut(&new_source_key, &new_target_key)
            .insert(new_source, new_target, attributes);
        Ok(())
    }

    pub fn interlayer_edges(&self) -> &EdgeContainer {
        &self.interlayer_edges
    }

    pub fn dynamic_interlayer_edges(&self) -> &EdgeContainer {
        &self.dynamic_interlayer_edges
    }

    /// Store for an interlayer edge; any dynamic endpoint routes it to the
    /// dynamic store.
    pub(super) fn interlayer_store(&self, source: &LayerKey, target: &LayerKey) -> &EdgeContainer {
        if source.is_dynamic() || target.is_dynamic() {
            &self.dynamic_interlayer_edges
        } else {
            &self.interlayer_edges
        }
    }

    pub(super) fn interlayer_store_mut(
        &mut self,
        source: &LayerKey,
        target: &LayerKey,
    ) -> &mut EdgeContainer {
        if source.is_dynamic() || target.is_dynamic() {
            &mut self.dynamic_interlayer_edges
        } else {
            &mut self.interlayer_edges
        }
    }

    /// Removes the interlayer edge between two nodes if there is one.
    pub(super) fn remove_interlayer_edge_between(&mut self, a: NodeId, b: NodeId) {
        let (Some(a_key), Some(b_key)) = (
            self.node_lookup.get(&a).copied(),
            self.node_lookup.get(&b).copied(),
        ) else {
            return;
        };

        if a_key != b_key {
            self.remove_interlayer_edge(a, b, &a_key, &b_key);
        }
    }

    fn remove_interlayer_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) {
        self.remove_ancestry(source, target, source_key, target_key);
        self.interlayer_store_mut(source_key, target_key)
            .remove(source, target);
    }

    /// Records the relation an interlayer edge implies. Leaves the graph
    /// untouched on error.
    fn add_ancestry(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) -> Result<(), GraphError> {
        if self.hierarchy.is_parent(source_key, target_key) {
            return self.attach_child(source, target);
        }

        if self.hierarchy.is_parent(target_key, source_key) {
            return self.attach_child(target, source);
        }

        for node in [source, target] {
            if self.get_node(node).is_none() {
                return Err(GraphError::UnknownNode(node));
            }
        }

        if let Some(node) = self.node_mut(source) {
            node.siblings.insert(target);
        }
        if let Some(node) = self.node_mut(target) {
            node.siblings.insert(source);
        }
        Ok(())
    }

    fn remove_ancestry(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_key: &LayerKey,
        target_key: &LayerKey,
    ) {
        if self.hierarchy.is_parent(source_key, target_key) {
            self.detach_child(source, target);
        } else if self.hierarchy.is_parent(target_key, source_key) {
            self.detach_child(target, source);
        } else {
            if let Some(node) = self.node_mut(source) {
                node.siblings.remove(&target);
            }
            if let Some(node) = self.node_mut(target) {
                node.siblings.remove(&source);
            }
        }
    }

    fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        if self.get_node(parent).is_none() {
            return Err(GraphError::UnknownNode(parent));
        }

        let node = self.node_mut(child).ok_or(GraphError::UnknownNode(child))?;
        if let Some(existing) = node.parent {
            return Err(GraphError::ParentConflict {
                child,
                parent: existing,
            });
        }
        node.parent = Some(parent);

        if let Some(node) = self.node_mut(parent) {
            node.children.insert(child);
        }
        Ok(())
    }

    fn detach_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            node.children.remove(&child);
        }

        if let Some(node) = self.node_mut(child) {
            if node.parent == Some(parent) {
                node.parent = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::attributes::{EdgeInfo, NodeInfo, Point3};
    use crate::error::GraphError;
    use crate::graph::DynamicSceneGraph;
    use crate::ids::{DsgLayers, LayerPrefix};
    use std::time::Duration;

    fn graph_with(nodes: &[(u64, u64)]) -> DynamicSceneGraph {
        let mut graph = DynamicSceneGraph::default();
        for (layer, id) in nodes {
            graph
                .emplace_node(*layer, *id, NodeInfo::boxed(Point3::default()))
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_interlayer_edge_sets_parent() {
        let mut graph = graph_with(&[(DsgLayers::OBJECTS, 1), (DsgLayers::PLACES, 2)]);
        graph.insert_edge(1, 2, None).unwrap();

        assert_eq!(graph.get_node(1).unwrap().parent(), Some(2));
        assert!(graph.get_node(2).unwrap().children().contains(&1));
        assert_eq!(graph.interlayer_edges().len(), 1);
        assert_eq!(graph.num_edges(), 1);

        graph.remove_edge(2, 1).unwrap();
        assert!(!graph.get_node(1).unwrap().has_parent());
        assert!(!graph.get_node(2).unwrap().has_children());
        assert_eq!(graph.remove_edge(1, 2), Err(GraphError::MissingEdge(1, 2)));
    }

    #[test]
    fn test_second_parent_is_rejected() {
        let mut graph = graph_with(&[
            (DsgLayers::OBJECTS, 1),
            (DsgLayers::PLACES, 2),
            (DsgLayers::PLACES, 3),
        ]);
        graph.insert_edge(2, 1, None).unwrap();

        assert_eq!(
            graph.insert_edge(3, 1, None),
            Err(GraphError::ParentConflict { child: 1, parent: 2 })
        );
        assert!(!graph.has_edge(3, 1));
        assert!(!graph.get_node(3).unwrap().has_children());
    }

    #[test]
    fn test_insert_edge_errors() {
        let mut graph = graph_with(&[(DsgLayers::OBJECTS, 1), (DsgLayers::OBJECTS, 2)]);
        assert_eq!(graph.insert_edge(1, 9, None), Err(GraphError::UnknownNode(9)));

        graph.insert_edge(1, 2, Some(Box::new(EdgeInfo::weighted(2.0)))).unwrap();
        assert_eq!(
            graph.insert_edge(2, 1, None),
            Err(GraphError::DuplicateEdge(2, 1))
        );
        assert_eq!(graph.insert_edge(1, 1, None), Err(GraphError::SelfLoop(1)));
        assert!(graph.interlayer_edges().is_empty());
        assert_eq!(graph.layer(DsgLayers::OBJECTS).edges().len(), 1);
    }

    #[test]
    fn test_dynamic_edges_use_dynamic_store() {
        let mut graph = graph_with(&[(DsgLayers::PLACES, 1)]);
        let agent = graph
            .emplace_dynamic_node(
                DsgLayers::AGENTS,
                LayerPrefix::new('a'),
                Duration::from_nanos(5),
                NodeInfo::boxed(Point3::default()),
                false,
            )
            .unwrap();

        graph.insert_edge(1, agent, None).unwrap();
        assert!(graph.interlayer_edges().is_empty());
        assert_eq!(graph.dynamic_interlayer_edges().len(), 1);
        assert_eq!(graph.get_node(agent).unwrap().parent(), Some(1));
    }

    #[test]
    fn test_unranked_layers_are_siblings() {
        let mut graph = DynamicSceneGraph::new(vec![2, 3], 1);
        graph.create_dynamic_layer(7, LayerPrefix::new('r'));
        graph
            .emplace_node(3, 1, NodeInfo::boxed(Point3::default()))
            .unwrap();
        let robot = graph
            .emplace_dynamic_node(
                7,
                LayerPrefix::new('r'),
                Duration::ZERO,
                NodeInfo::boxed(Point3::default()),
                false,
            )
            .unwrap();

        graph.insert_edge(1, robot, None).unwrap();
        assert!(graph.get_node(1).unwrap().siblings().contains(&robot));
        assert!(graph.get_node(robot).unwrap().siblings().contains(&1));
        assert!(!graph.get_node(robot).unwrap().has_parent());
    }

    #[test]
    fn test_rewire_moves_edge() {
        let mut graph = graph_with(&[
            (DsgLayers::OBJECTS, 1),
            (DsgLayers::PLACES, 2),
            (DsgLayers::PLACES, 3),
        ]);
        graph
            .insert_edge(2, 1, Some(Box::new(EdgeInfo::weighted(4.0))))
            .unwrap();

        graph.rewire_interlayer_edge(2, 1, 3, 1).unwrap();
        assert!(!graph.has_edge(2, 1));
        assert_eq!(graph.get_node(1).unwrap().parent(), Some(3));

        let edge = graph.get_edge(3, 1).unwrap();
        let info = edge.attributes.as_any().downcast_ref::<EdgeInfo>().unwrap();
        assert_eq!(info.weight, 4.0);

        assert_eq!(
            graph.rewire_interlayer_edge(2, 1, 3, 1),
            Err(GraphError::MissingEdge(2, 1))
        );
    }

    #[test]
    fn test_rewire_crosses_interlayer_stores() {
        let mut graph = graph_with(&[(DsgLayers::PLACES, 1), (DsgLayers::OBJECTS, 2)]);
        let agent = graph
            .emplace_dynamic_node(
                DsgLayers::AGENTS,
                LayerPrefix::new('a'),
                Duration::ZERO,
                NodeInfo::boxed(Point3::default()),
                false,
            )
            .unwrap();
        graph.insert_edge(1, 2, None).unwrap();

        graph.rewire_interlayer_edge(1, 2, 1, agent).unwrap();
        assert!(graph.interlayer_edges().is_empty());
        assert_eq!(graph.dynamic_interlayer_edges().len(), 1);
        assert_eq!(graph.get_node(agent).unwrap().parent(), Some(1));
        assert!(!graph.get_node(2).unwrap().has_parent());
        assert!(graph.get_node(1).unwrap().children().contains(&agent));
        assert!(!graph.get_node(1).unwrap().children().contains(&2));

        graph.rewire_interlayer_edge(1, agent, 1, 2).unwrap();
        assert!(graph.dynamic_interlayer_edges().is_empty());
        assert_eq!(graph.interlayer_edges().len(), 1);
        assert_eq!(graph.get_node(2).unwrap().parent(), Some(1));
        assert!(!graph.get_node(agent).unwrap().has_parent());
    }
}
