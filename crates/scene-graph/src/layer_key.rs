use crate::ids::{LayerId, LayerPrefix, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Owning layer of every node in a graph.
pub type NodeLookup = BTreeMap<NodeId, LayerKey>;

/// Identifies the container that owns a node: a static layer, or one prefixed
/// stream of a dynamic layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey {
    pub layer: LayerId,
    pub prefix: Option<LayerPrefix>,
}

impl LayerKey {
    pub fn new(layer: LayerId) -> Self {
        Self { layer, prefix: None }
    }

    pub fn dynamic(layer: LayerId, prefix: LayerPrefix) -> Self {
        Self {
            layer,
            prefix: Some(prefix),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.prefix.is_some()
    }
}

impl From<LayerId> for LayerKey {
    fn from(layer: LayerId) -> Self {
        Self::new(layer)
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{}({})", self.layer, prefix),
            None => write!(f, "{}", self.layer),
        }
    }
}

impl fmt::Debug for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerKey({self})")
    }
}

/// Fixed parent ordering over layer ids.
///
/// Built from the declared layer list with the outermost layer last: a layer
/// is the ancestor of every layer declared before it. Ids that were never
/// declared have no rank and only ever form sibling relations.
#[derive(Debug, Clone, Default)]
pub struct LayerHierarchy {
    ranks: HashMap<LayerId, usize>,
}

impl LayerHierarchy {
    pub fn new(layer_ids: &[LayerId]) -> Self {
        let ranks = layer_ids
            .iter()
            .enumerate()
            .map(|(rank, id)| (*id, rank))
            .collect();
        Self { ranks }
    }

    pub fn rank(&self, layer: LayerId) -> Option<usize> {
        self.ranks.get(&layer).copied()
    }

    /// Whether `parent`'s layer sits above `child`'s layer.
    pub fn is_parent(&self, parent: &LayerKey, child: &LayerKey) -> bool {
        match (self.rank(parent.layer), self.rank(child.layer)) {
            (Some(p), Some(c)) => p > c,
            _ => false,
        }
    }
}
