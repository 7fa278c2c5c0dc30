use crate::attributes::Point3;
use crate::error::GraphError;
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
}

impl MeshVertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            color: [0, 0, 0, 255],
        }
    }
}

/// Indices into the vertex buffer forming one polygon.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshFace {
    pub vertices: Vec<u32>,
}

pub type MeshVertices = Vec<MeshVertex>;
pub type MeshFaces = Vec<MeshFace>;

/// Point-and-polygon mesh as exchanged with geometry processing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonMesh {
    pub vertices: MeshVertices,
    pub faces: MeshFaces,
}

/// Association between a graph node and a mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshEdge {
    pub id: u64,
    pub source_node: NodeId,
    pub mesh_vertex: usize,
}

/// Mesh edges indexed by id, by node and by vertex.
///
/// Ids come from a counter that advances on every insertion and every
/// removal and is never rewound, so an id is never handed out twice.
#[derive(Debug, Clone, Default)]
pub struct MeshEdgeIndex {
    edges: BTreeMap<u64, MeshEdge>,
    by_node: BTreeMap<NodeId, BTreeMap<usize, u64>>,
    by_vertex: BTreeMap<usize, BTreeMap<NodeId, u64>>,
    next_edge_id: u64,
}

impl MeshEdgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, vertex: usize) -> Result<u64, GraphError> {
        if self.contains(node, vertex) {
            return Err(GraphError::DuplicateMeshEdge { node, vertex });
        }

        let id = self.next_edge_id;
        self.edges.insert(
            id,
            MeshEdge {
                id,
                source_node: node,
                mesh_vertex: vertex,
            },
        );
        self.by_node.entry(node).or_default().insert(vertex, id);
        self.by_vertex.entry(vertex).or_default().insert(node, id);
        self.next_edge_id += 1;
        Ok(id)
    }

    pub fn remove(&mut self, node: NodeId, vertex: usize) -> Result<MeshEdge, GraphError> {
        let missing = GraphError::MissingMeshEdge { node, vertex };

        let vertices = self.by_node.get_mut(&node).ok_or(missing.clone())?;
        let id = vertices.remove(&vertex).ok_or(missing.clone())?;
        if vertices.is_empty() {
            self.by_node.remove(&node);
        }

        if let Some(nodes) = self.by_vertex.get_mut(&vertex) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.by_vertex.remove(&vertex);
            }
        }

        let edge = self.edges.remove(&id).ok_or(missing)?;
        self.next_edge_id += 1;
        Ok(edge)
    }

    pub fn contains(&self, node: NodeId, vertex: usize) -> bool {
        self.edge_id(node, vertex).is_some()
    }

    pub fn edge_id(&self, node: NodeId, vertex: usize) -> Option<u64> {
        self.by_node.get(&node)?.get(&vertex).copied()
    }

    pub fn get(&self, id: u64) -> Option<&MeshEdge> {
        self.edges.get(&id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u64, MeshEdge> {
        self.edges.iter()
    }

    /// Id the next inserted edge will receive.
    pub fn next_edge_id(&self) -> u64 {
        self.next_edge_id
    }

    pub fn vertices_for(&self, node: NodeId) -> Vec<usize> {
        self.by_node
            .get(&node)
            .map(|vertices| vertices.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn nodes_for(&self, vertex: usize) -> Vec<NodeId> {
        self.by_vertex
            .get(&vertex)
            .map(|nodes| nodes.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Removes every edge of `node`, returning how many were dropped.
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let vertices = self.vertices_for(node);
        vertices
            .into_iter()
            .filter(|vertex| self.remove(node, *vertex).is_ok())
            .count()
    }

    /// Removes every edge touching `vertex`.
    pub fn invalidate_vertex(&mut self, vertex: usize) -> usize {
        let nodes = self.nodes_for(vertex);
        nodes
            .into_iter()
            .filter(|node| self.remove(*node, vertex).is_ok())
            .count()
    }

    /// Removes every edge whose vertex is not below `num_vertices`.
    pub fn prune_out_of_bounds(&mut self, num_vertices: usize) -> usize {
        let stale: Vec<usize> = self
            .by_vertex
            .range(num_vertices..)
            .map(|(vertex, _)| *vertex)
            .collect();

        stale
            .into_iter()
            .map(|vertex| self.invalidate_vertex(vertex))
            .sum()
    }

    /// Drops all edges. The id counter keeps its value.
    pub fn clear(&mut self) {
        self.edges.clear();
        self.by_node.clear();
        self.by_vertex.clear();
    }

    /// Whether every edge is present in all three indices and nothing else is.
    pub fn is_consistent(&self) -> bool {
        let by_node_count: usize = self.by_node.values().map(BTreeMap::len).sum();
        let by_vertex_count: usize = self.by_vertex.values().map(BTreeMap::len).sum();
        if by_node_count != self.edges.len() || by_vertex_count != self.edges.len() {
            return false;
        }

        self.edges.iter().all(|(id, edge)| {
            *id < self.next_edge_id
                && self.edge_id(edge.source_node, edge.mesh_vertex) == Some(*id)
                && self
                    .by_vertex
                    .get(&edge.mesh_vertex)
                    .and_then(|nodes| nodes.get(&edge.source_node))
                    == Some(id)
        })
    }
}

pub(crate) fn vertex_position(vertex: &MeshVertex) -> Point3 {
    let [x, y, z] = vertex.position;
    Point3::new(x as f64, y as f64, z as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut index = MeshEdgeIndex::new();
        assert_eq!(index.insert(1, 5).unwrap(), 0);
        index.remove(1, 5).unwrap();
        assert_eq!(index.insert(1, 3).unwrap(), 2);
        assert_eq!(index.next_edge_id(), 3);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_duplicate_and_missing() {
        let mut index = MeshEdgeIndex::new();
        index.insert(1, 5).unwrap();
        assert_eq!(
            index.insert(1, 5),
            Err(GraphError::DuplicateMeshEdge { node: 1, vertex: 5 })
        );
        assert_eq!(
            index.remove(2, 5),
            Err(GraphError::MissingMeshEdge { node: 2, vertex: 5 })
        );
        assert_eq!(index.next_edge_id(), 1);
    }

    #[test]
    fn test_prune_out_of_bounds() {
        let mut index = MeshEdgeIndex::new();
        index.insert(1, 2).unwrap();
        index.insert(1, 9).unwrap();
        index.insert(2, 10).unwrap();
        index.insert(3, 9).unwrap();

        assert_eq!(index.prune_out_of_bounds(9), 3);
        assert_eq!(index.len(), 1);
        assert_eq!(index.vertices_for(1), vec![2]);
        assert!(index.nodes_for(9).is_empty());
        assert!(index.vertices_for(2).is_empty());
        assert!(index.is_consistent());
    }

    #[test]
    fn test_remove_node_and_vertex() {
        let mut index = MeshEdgeIndex::new();
        index.insert(1, 2).unwrap();
        index.insert(1, 3).unwrap();
        index.insert(2, 3).unwrap();

        assert_eq!(index.invalidate_vertex(3), 2);
        assert_eq!(index.remove_node(1), 1);
        assert!(index.is_empty());
        assert!(index.is_consistent());

        index.clear();
        assert_eq!(index.insert(1, 2).unwrap(), 6);
    }
}
