use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Payload carried by every node. The graph only ever clones it or asks for
/// its position.
pub trait NodeAttributes: fmt::Debug + Send + Sync {
    fn position(&self) -> Point3;

    fn clone_boxed(&self) -> Box<dyn NodeAttributes>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn NodeAttributes> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Payload carried by every edge.
pub trait EdgeAttributes: fmt::Debug + Send + Sync {
    fn clone_boxed(&self) -> Box<dyn EdgeAttributes>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn EdgeAttributes> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Position-only node payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    pub position: Point3,
}

impl NodeInfo {
    pub fn new(position: Point3) -> Self {
        Self { position }
    }

    pub fn boxed(position: Point3) -> Box<dyn NodeAttributes> {
        Box::new(Self::new(position))
    }
}

impl NodeAttributes for NodeInfo {
    fn position(&self) -> Point3 {
        self.position
    }

    fn clone_boxed(&self) -> Box<dyn NodeAttributes> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Node payload for labelled map elements (objects, rooms, buildings).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SemanticNodeAttributes {
    pub position: Point3,
    pub name: String,
    pub semantic_label: u8,
    pub color: [u8; 3],
}

impl NodeAttributes for SemanticNodeAttributes {
    fn position(&self) -> Point3 {
        self.position
    }

    fn clone_boxed(&self) -> Box<dyn NodeAttributes> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub weighted: bool,
    pub weight: f64,
}

impl EdgeInfo {
    pub fn weighted(weight: f64) -> Self {
        Self {
            weighted: true,
            weight,
        }
    }

    pub fn boxed() -> Box<dyn EdgeAttributes> {
        Box::new(Self::default())
    }
}

impl EdgeAttributes for EdgeInfo {
    fn clone_boxed(&self) -> Box<dyn EdgeAttributes> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
