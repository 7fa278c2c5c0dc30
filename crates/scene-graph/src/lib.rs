//! Core of a layered dynamic scene graph.
//!
//! Static layers hold caller-identified nodes, dynamic layers hold
//! time-ordered streams of nodes keyed by a prefix, and a polygon mesh sits
//! below all of them. Edges across layers encode parent/child and sibling
//! relations following a fixed layer hierarchy.

pub mod attributes;
pub mod config;
pub mod dynamic_layer;
pub mod edge;
pub mod error;
pub mod graph;
pub mod ids;
pub mod layer;
pub mod layer_key;
pub mod mesh;
pub mod node;

pub use attributes::{EdgeAttributes, EdgeInfo, NodeAttributes, NodeInfo, Point3, SemanticNodeAttributes};
pub use config::GraphConfig;
pub use dynamic_layer::DynamicLayer;
pub use edge::{EdgeContainer, EdgeKey, EdgeStatus, SceneGraphEdge};
pub use error::{ConfigError, GraphError};
pub use graph::{DynamicSceneGraph, MergeOptions, MergeSummary};
pub use ids::{DsgLayers, LayerId, LayerPrefix, NodeId, NodeSymbol};
pub use layer::{Layer, LayerStore, SceneGraphLayer};
pub use layer_key::{LayerHierarchy, LayerKey, NodeLookup};
pub use mesh::{MeshEdge, MeshEdgeIndex, MeshFace, MeshVertex, MeshVertices, MeshFaces, PolygonMesh};
pub use node::{NodeStatus, SceneGraphNode};
