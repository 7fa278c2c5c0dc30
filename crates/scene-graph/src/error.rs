use crate::ids::{LayerId, NodeId, NodeSymbol};
use crate::layer_key::LayerKey;
use std::time::Duration;

fn sym(id: &NodeId) -> NodeSymbol {
    NodeSymbol::from(*id)
}

/// Recoverable failures. A call that returns one of these left the graph
/// untouched.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown layer: {0}")]
    UnknownLayer(LayerKey),
    #[error("unknown node: {}", sym(.0))]
    UnknownNode(NodeId),
    #[error("node already exists: {}", sym(.0))]
    DuplicateNode(NodeId),
    #[error("node {} already exists, fix conflicting prefix for layer {layer}", sym(.node))]
    NodeIdCollision { node: NodeId, layer: LayerKey },
    #[error("layer {layer} already has a node at {timestamp:?}")]
    DuplicateTimestamp { layer: LayerKey, timestamp: Duration },
    #[error("edge already exists: {} -> {}", sym(.0), sym(.1))]
    DuplicateEdge(NodeId, NodeId),
    #[error("missing edge: {} -> {}", sym(.0), sym(.1))]
    MissingEdge(NodeId, NodeId),
    #[error("node {} already has parent {}", sym(.child), sym(.parent))]
    ParentConflict { child: NodeId, parent: NodeId },
    #[error("node {} cannot be connected to itself", sym(.0))]
    SelfLoop(NodeId),
    #[error("no mesh is set")]
    NoMesh,
    #[error("mesh vertex {vertex} out of range (mesh has {size} vertices)")]
    MeshVertexOutOfRange { vertex: usize, size: usize },
    #[error("mesh edge already exists: {} -> {vertex}", sym(.node))]
    DuplicateMeshEdge { node: NodeId, vertex: usize },
    #[error("missing mesh edge: {} -> {vertex}", sym(.node))]
    MissingMeshEdge { node: NodeId, vertex: usize },
    #[error("cannot merge node {} into itself", sym(.0))]
    SelfMerge(NodeId),
    #[error("cannot merge nodes of different layers: {from} and {to}")]
    LayerMismatch { from: LayerKey, to: LayerKey },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Configuration errors caught when a graph is built.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("scene graph cannot be initialized without layers")]
    NoLayers,
    #[error("mesh layer id {0} must be unique")]
    MeshLayerCollision(LayerId),
    #[error("layer id {0} declared more than once")]
    DuplicateLayer(LayerId),
    #[error("{0:?} is not a valid layer prefix, prefixes must be ASCII")]
    InvalidPrefix(char),
    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}
