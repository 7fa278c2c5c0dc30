use crate::attributes::{EdgeAttributes, EdgeInfo};
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Unordered endpoint pair, so that `(a, b)` and `(b, a)` name the same edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub k1: NodeId,
    pub k2: NodeId,
}

impl EdgeKey {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            k1: source.min(target),
            k2: source.max(target),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.k1 == node || self.k2 == node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStatus {
    New,
    Visible,
    Removed,
}

/// An edge keeps the direction it was inserted with.
#[derive(Debug, Clone)]
pub struct SceneGraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub attributes: Box<dyn EdgeAttributes>,
}

impl SceneGraphEdge {
    pub fn new(source: NodeId, target: NodeId, attributes: Box<dyn EdgeAttributes>) -> Self {
        Self {
            source,
            target,
            attributes,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source, self.target)
    }
}

/// Edge storage with per-edge change tracking.
#[derive(Debug, Clone, Default)]
pub struct EdgeContainer {
    edges: BTreeMap<EdgeKey, SceneGraphEdge>,
    status: BTreeMap<EdgeKey, EdgeStatus>,
}

impl EdgeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the edge and marks it new. Replaces any edge with the same key.
    pub fn insert(
        &mut self,
        source: NodeId,
        target: NodeId,
        attributes: Option<Box<dyn EdgeAttributes>>,
    ) {
        let attributes = attributes.unwrap_or_else(EdgeInfo::boxed);
        let key = EdgeKey::new(source, target);
        self.edges
            .insert(key, SceneGraphEdge::new(source, target, attributes));
        self.status.insert(key, EdgeStatus::New);
    }

    /// Drops the edge and marks it removed. Returns the removed edge.
    pub fn remove(&mut self, source: NodeId, target: NodeId) -> Option<SceneGraphEdge> {
        let key = EdgeKey::new(source, target);
        let edge = self.edges.remove(&key)?;
        self.status.insert(key, EdgeStatus::Removed);
        Some(edge)
    }

    pub fn contains(&self, source: NodeId, target: NodeId) -> bool {
        self.edges.contains_key(&EdgeKey::new(source, target))
    }

    pub fn get(&self, source: NodeId, target: NodeId) -> Option<&SceneGraphEdge> {
        self.edges.get(&EdgeKey::new(source, target))
    }

    pub fn get_mut(&mut self, source: NodeId, target: NodeId) -> Option<&mut SceneGraphEdge> {
        self.edges.get_mut(&EdgeKey::new(source, target))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EdgeKey, SceneGraphEdge> {
        self.edges.iter()
    }

    pub fn status(&self, source: NodeId, target: NodeId) -> Option<EdgeStatus> {
        self.status.get(&EdgeKey::new(source, target)).copied()
    }

    /// Appends every edge flagged new. With `clear`, the flags are consumed.
    pub fn new_edges(&mut self, out: &mut Vec<EdgeKey>, clear: bool) {
        for (key, status) in self.status.iter_mut() {
            if *status != EdgeStatus::New {
                continue;
            }

            out.push(*key);
            if clear {
                *status = EdgeStatus::Visible;
            }
        }
    }

    /// Appends every edge flagged removed. With `clear`, the flags are consumed.
    pub fn removed_edges(&mut self, out: &mut Vec<EdgeKey>, clear: bool) {
        out.extend(
            self.status
                .iter()
                .filter(|(_, status)| **status == EdgeStatus::Removed)
                .map(|(key, _)| *key),
        );

        if clear {
            self.status.retain(|_, status| *status != EdgeStatus::Removed);
        }
    }

    /// Drops every edge and every status marker.
    pub fn reset(&mut self) {
        self.edges.clear();
        self.status.clear();
    }
}
