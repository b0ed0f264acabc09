//! # Pipeline Configuration
//!
//! Scene layout names and adjacency settings, loaded from TOML.
//!
//! ```toml
//! [scene]
//! chunk_marker = "Chunk"
//!
//! [adjacency]
//! strictness = "strict"
//! method = "auto"
//! workers = 4
//! deadline_ms = 2000
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adjacency::{Method, Strictness};
use crate::error::{VoxSceneError, VoxSceneResult};

/// Names of the well-known sub-trees and the chunk filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SceneLayout {
    /// Voxel-map scope under the world root.
    pub voxel_map: String,
    /// Block-library scope under the voxel map.
    pub block_lib: String,
    /// Block-group scope under the block library.
    pub blocks_scope: String,
    /// Reserved segment marking material nodes.
    pub looks_segment: String,
    /// Substring identifying chunk prims.
    pub chunk_marker: String,
    /// Swap the second and third position components (stored X, Z, Y).
    pub swap_yz: bool,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            voxel_map: "VoxelMap".to_string(),
            block_lib: "BlockLib".to_string(),
            blocks_scope: "Blocks".to_string(),
            looks_segment: "Looks".to_string(),
            chunk_marker: "Chunk".to_string(),
            swap_yz: true,
        }
    }
}

/// Settings for the adjacency pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjacencyConfig {
    /// Neighbor predicate.
    pub strictness: Strictness,
    /// Pair discovery strategy.
    pub method: Method,
    /// Tolerance for lattice comparisons.
    pub epsilon: f64,
    /// Point count above which `Method::Auto` switches to the spatial hash.
    pub spatial_hash_threshold: usize,
    /// Worker threads; 0 means available parallelism.
    pub workers: usize,
    /// Deadline for the whole pass in milliseconds; 0 means none.
    pub deadline_ms: u64,
}

impl Default for AdjacencyConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Loose,
            method: Method::Auto,
            epsilon: 1e-5,
            spatial_hash_threshold: 2048,
            workers: 0,
            deadline_ms: 0,
        }
    }
}

impl AdjacencyConfig {
    /// Deadline as a duration, if one is set.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }

    /// Effective worker count for `jobs` chunks.
    #[must_use]
    pub fn worker_count(&self, jobs: usize) -> usize {
        let wanted = if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.workers
        };
        wanted.min(jobs).max(1)
    }
}

/// Full pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Scene layout names.
    pub scene: SceneLayout,
    /// Adjacency settings.
    pub adjacency: AdjacencyConfig,
}

impl PipelineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed TOML, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(text: &str) -> VoxSceneResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| VoxSceneError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> VoxSceneResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            VoxSceneError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> VoxSceneResult<()> {
        let eps = self.adjacency.epsilon;
        if !eps.is_finite() || eps < 0.0 || eps >= 0.5 {
            return Err(VoxSceneError::InvalidConfig(format!(
                "adjacency.epsilon must be in [0, 0.5), got {eps}"
            )));
        }
        let scene = &self.scene;
        for (key, value) in [
            ("voxel_map", &scene.voxel_map),
            ("block_lib", &scene.block_lib),
            ("blocks_scope", &scene.blocks_scope),
            ("looks_segment", &scene.looks_segment),
            ("chunk_marker", &scene.chunk_marker),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(VoxSceneError::InvalidConfig(format!(
                    "scene.{key} must be a single non-empty segment, got {value:?}"
                )));
            }
        }
        Ok(())
    }
}
