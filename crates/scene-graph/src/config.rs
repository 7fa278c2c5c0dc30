use crate::error::ConfigError;
use crate::ids::{DsgLayers, LayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const LAYER_IDS_VAR: &str = "DSG_LAYER_IDS";
const MESH_LAYER_VAR: &str = "DSG_MESH_LAYER_ID";

/// Layer layout of a scene graph, fixed for the graph's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Static layer ids, outermost layer last.
    #[serde(default = "DsgLayers::defaults")]
    pub layer_ids: Vec<LayerId>,
    #[serde(default = "default_mesh_layer")]
    pub mesh_layer_id: LayerId,
}

fn default_mesh_layer() -> LayerId {
    DsgLayers::MESH
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            layer_ids: DsgLayers::defaults(),
            mesh_layer_id: default_mesh_layer(),
        }
    }
}

impl GraphConfig {
    pub fn new(layer_ids: Vec<LayerId>, mesh_layer_id: LayerId) -> Self {
        Self {
            layer_ids,
            mesh_layer_id,
        }
    }

    /// Reads `DSG_LAYER_IDS` (comma separated) and `DSG_MESH_LAYER_ID`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(LAYER_IDS_VAR) {
            config.layer_ids = parse_layer_ids(&value)?;
        }

        if let Ok(value) = std::env::var(MESH_LAYER_VAR) {
            config.mesh_layer_id = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: MESH_LAYER_VAR,
                value: value.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_ids.is_empty() {
            return Err(ConfigError::NoLayers);
        }

        let mut seen = HashSet::new();
        for id in &self.layer_ids {
            if !seen.insert(*id) {
                return Err(ConfigError::DuplicateLayer(*id));
            }
        }

        if seen.contains(&self.mesh_layer_id) {
            return Err(ConfigError::MeshLayerCollision(self.mesh_layer_id));
        }

        Ok(())
    }
}

fn parse_layer_ids(value: &str) -> Result<Vec<LayerId>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidEnv {
                var: LAYER_IDS_VAR,
                value: value.to_string(),
            })
        })
        .collect()
}
