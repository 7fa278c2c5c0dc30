use crate::attributes::NodeAttributes;
use crate::error::GraphError;
use crate::ids::{LayerId, LayerPrefix, NodeId, NodeSymbol};
use crate::layer::{Layer, LayerStore};
use crate::layer_key::{LayerKey, NodeLookup};
use crate::node::{NodeStatus, SceneGraphNode};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::warn;

/// A time-ordered stream of nodes within one layer id.
///
/// Node ids are `prefix.make_id(n)` for a per-stream counter `n` that only
/// grows; slots of removed nodes keep their index so ids are never reissued.
#[derive(Debug, Clone)]
pub struct DynamicLayer {
    pub id: LayerId,
    pub prefix: LayerPrefix,
    store: LayerStore,
    times: Vec<Duration>,
    occupied_times: BTreeSet<Duration>,
    next_node: u64,
}

impl DynamicLayer {
    pub fn new(id: LayerId, prefix: LayerPrefix) -> Self {
        Self {
            id,
            prefix,
            store: LayerStore::default(),
            times: Vec::new(),
            occupied_times: BTreeSet::new(),
            next_node: 0,
        }
    }

    /// Id the next emplaced node will receive.
    pub fn next_node_id(&self) -> NodeId {
        self.prefix.make_id(self.next_node)
    }

    /// Appends a node stamped with `timestamp`.
    ///
    /// With `add_edge`, the node is linked to its predecessor in the stream
    /// when that predecessor is still present.
    pub fn emplace_node(
        &mut self,
        timestamp: Duration,
        attributes: Box<dyn NodeAttributes>,
        add_edge: bool,
    ) -> Result<NodeId, GraphError> {
        if self.occupied_times.contains(&timestamp) {
            return Err(GraphError::DuplicateTimestamp {
                layer: self.key(),
                timestamp,
            });
        }

        let node_id = self.next_node_id();
        self.store
            .add(SceneGraphNode::new(node_id, self.key(), attributes));
        self.times.push(timestamp);
        self.occupied_times.insert(timestamp);

        if add_edge && self.next_node > 0 {
            let previous = self.prefix.make_id(self.next_node - 1);
            if self.store.contains(previous) {
                self.store.connect(previous, node_id, None)?;
            }
        }

        self.next_node += 1;
        Ok(node_id)
    }

    pub fn timestamp(&self, node: NodeId) -> Option<Duration> {
        if !self.prefix.matches(node) || !self.store.contains(node) {
            return None;
        }

        let index = NodeSymbol::from(node).category_id() as usize;
        self.times.get(index).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneGraphNode> + '_ {
        self.store.nodes().map(|(_, node)| node)
    }

    /// Appends the part of `other`'s stream this one has not seen yet and
    /// copies its missing edges.
    ///
    /// Indices already present locally only get their attributes replaced,
    /// and only when `update_attributes` is set. Returns the number of nodes
    /// added.
    pub fn merge_layer(
        &mut self,
        other: &DynamicLayer,
        lookup: &mut NodeLookup,
        update_attributes: bool,
    ) -> usize {
        let key = self.key();
        let mut added = 0;

        for index in 0..other.next_node {
            let other_id = other.prefix.make_id(index);
            let other_node = other.store.get(other_id);

            if index < self.next_node {
                let local_id = self.prefix.make_id(index);
                if let (true, Some(theirs), Some(ours)) =
                    (update_attributes, other_node, self.store.get_mut(local_id))
                {
                    ours.attributes = theirs.attributes.clone();
                }
                continue;
            }

            let node_id = self.prefix.make_id(index);
            if let Some(theirs) = other_node {
                if let Some(owner) = lookup.get(&node_id) {
                    warn!(node = %NodeSymbol::from(node_id), %owner, layer = %key, "skipping dynamic node owned by another layer");
                } else {
                    self.store.add(SceneGraphNode::new(
                        node_id,
                        key,
                        theirs.attributes.clone(),
                    ));
                    lookup.insert(node_id, key);
                    added += 1;
                }
            }

            // slots removed upstream are reserved too, keeping indices aligned
            let timestamp = other.times.get(index as usize).copied().unwrap_or_default();
            self.times.push(timestamp);
            if self.store.contains(node_id) {
                self.occupied_times.insert(timestamp);
            }
            self.next_node = index + 1;
        }

        for (_, edge) in other.store.edges().iter() {
            if self.store.edges().contains(edge.source, edge.target) {
                continue;
            }

            let _ = self
                .store
                .connect(edge.source, edge.target, Some(edge.attributes.clone()));
        }

        added
    }
}

impl Layer for DynamicLayer {
    fn key(&self) -> LayerKey {
        LayerKey::dynamic(self.id, self.prefix)
    }

    fn store(&self) -> &LayerStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut LayerStore {
        &mut self.store
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        let timestamp = self.timestamp(node);
        self.store
            .drop_node(node, NodeStatus::Removed)?;
        if let Some(timestamp) = timestamp {
            self.occupied_times.remove(&timestamp);
        }
        Ok(())
    }
}
