use super::DynamicSceneGraph;
use crate::attributes::Point3;
use crate::error::GraphError;
use crate::ids::{NodeId, NodeSymbol};
use crate::mesh::{vertex_position, MeshEdgeIndex, MeshFaces, MeshVertices, PolygonMesh};
use std::sync::Arc;
use tracing::debug;

impl DynamicSceneGraph {
    pub fn has_mesh(&self) -> bool {
        self.mesh_vertices.is_some()
    }

    /// Replaces the mesh.
    ///
    /// An empty vertex buffer unsets the mesh and drops every mesh edge.
    /// Otherwise all mesh edges are dropped when `invalidate_all_edges` is
    /// set, and only those pointing past the new vertex count when it is not.
    pub fn set_mesh(
        &mut self,
        vertices: Arc<MeshVertices>,
        faces: Arc<MeshFaces>,
        invalidate_all_edges: bool,
    ) {
        if vertices.is_empty() {
            debug!("received empty mesh, resetting all mesh edges");
            self.mesh_vertices = None;
            self.mesh_faces = None;
            self.mesh_edges.clear();
            return;
        }

        let num_vertices = vertices.len();
        self.mesh_vertices = Some(vertices);
        self.mesh_faces = Some(faces);

        if invalidate_all_edges {
            self.mesh_edges.clear();
            return;
        }

        let pruned = self.mesh_edges.prune_out_of_bounds(num_vertices);
        if pruned > 0 {
            debug!(pruned, num_vertices, "dropped mesh edges past the new mesh");
        }
    }

    /// Copies a polygon mesh in, keeping mesh edges that still fit.
    pub fn set_mesh_directly(&mut self, mesh: &PolygonMesh) {
        self.set_mesh(
            Arc::new(mesh.vertices.clone()),
            Arc::new(mesh.faces.clone()),
            false,
        );
    }

    pub fn get_mesh(&self) -> Option<PolygonMesh> {
        let vertices = self.mesh_vertices.as_ref()?;
        Some(PolygonMesh {
            vertices: vertices.as_ref().clone(),
            faces: self
                .mesh_faces
                .as_ref()
                .map(|faces| faces.as_ref().clone())
                .unwrap_or_default(),
        })
    }

    pub fn mesh_vertices(&self) -> Option<&Arc<MeshVertices>> {
        self.mesh_vertices.as_ref()
    }

    pub fn mesh_faces(&self) -> Option<&Arc<MeshFaces>> {
        self.mesh_faces.as_ref()
    }

    pub fn mesh_position(&self, vertex: usize) -> Option<Point3> {
        self.mesh_vertices.as_ref()?.get(vertex).map(vertex_position)
    }

    /// Links a node to a mesh vertex and returns the new edge id.
    ///
    /// Without `allow_invalid_mesh`, the mesh must be set and contain the
    /// vertex.
    pub fn insert_mesh_edge(
        &mut self,
        source: NodeId,
        mesh_vertex: usize,
        allow_invalid_mesh: bool,
    ) -> Result<u64, GraphError> {
        if !self.has_node(source) {
            return Err(GraphError::UnknownNode(source));
        }

        if !allow_invalid_mesh {
            let vertices = self.mesh_vertices.as_ref().ok_or(GraphError::NoMesh)?;
            if mesh_vertex >= vertices.len() {
                return Err(GraphError::MeshVertexOutOfRange {
                    vertex: mesh_vertex,
                    size: vertices.len(),
                });
            }
        }

        self.mesh_edges.insert(source, mesh_vertex)
    }

    pub fn remove_mesh_edge(&mut self, source: NodeId, mesh_vertex: usize) -> Result<(), GraphError> {
        self.mesh_edges.remove(source, mesh_vertex).map(|_| ())
    }

    pub fn has_mesh_edge(&self, source: NodeId, mesh_vertex: usize) -> bool {
        self.mesh_edges.contains(source, mesh_vertex)
    }

    pub fn num_mesh_edges(&self) -> usize {
        self.mesh_edges.len()
    }

    pub fn mesh_edges(&self) -> &MeshEdgeIndex {
        &self.mesh_edges
    }

    /// Vertices the node is linked to, in ascending order.
    pub fn mesh_connection_indices(&self, node: NodeId) -> Vec<usize> {
        self.mesh_edges.vertices_for(node)
    }

    /// Drops every mesh edge touching `vertex`.
    pub fn invalidate_mesh_vertex(&mut self, vertex: usize) -> usize {
        let removed = self.mesh_edges.invalidate_vertex(vertex);
        if removed > 0 {
            debug!(vertex, removed, "invalidated mesh vertex");
        }
        removed
    }

    pub fn clear_mesh_edges(&mut self) {
        self.mesh_edges.clear();
    }

    /// Moves the mesh edges of `from` onto `to`. Vertices already linked to
    /// `to` keep their edge.
    pub(super) fn transfer_mesh_edges(&mut self, from: NodeId, to: NodeId) {
        for vertex in self.mesh_edges.vertices_for(from) {
            if self.mesh_edges.remove(from, vertex).is_err() || self.mesh_edges.contains(to, vertex) {
                continue;
            }

            if let Err(err) = self.mesh_edges.insert(to, vertex) {
                debug!(%err, node = %NodeSymbol::from(to), "failed to move mesh edge");
            }
        }
    }
}
