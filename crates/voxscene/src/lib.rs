//! # VOXSCENE
//!
//! Extracts a queryable model from a voxel world scene document and
//! reconstructs the neighbor graph of every chunk's point cloud.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────────┐
//! │ DocumentPaths│──▶│ SceneDocument│──▶│ chunk / catalog / material   │
//! └──────────────┘   └──────────────┘   └──────────────┬───────────────┘
//!                                                      │
//!                          ┌───────────────────────────▼──┐
//!                          │ adjacency (per-chunk workers)│
//!                          └───────────────────────────┬──┘
//!                                                      ▼
//!                                               ┌────────────┐
//!                                               │ SceneModel │──▶ host
//!                                               └────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use voxscene::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_file("voxscene.toml")?;
//! let model = Pipeline::new(config).run("saves/my world/mood.usda")?;
//! for (name, graph) in model.adjacency() {
//!     println!("{name}: {} edges", graph.edge_count());
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod adjacency;
pub mod cancel;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod error;
pub mod host;
pub mod material;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod reader;

pub use adjacency::{AdjacencyBuilder, AdjacencyGraph, Method, Strictness};
pub use cancel::CancelToken;
pub use catalog::{BlockCatalog, BlockCatalogBuilder, BlockType};
pub use chunk::{Chunk, Point3};
pub use config::{AdjacencyConfig, PipelineConfig, SceneLayout};
pub use error::{VoxSceneError, VoxSceneResult};
pub use material::{MaterialBinding, MaterialSet};
pub use model::{InstanceSlot, PointAttributes, SceneModel, VoxelWorld};
pub use paths::DocumentPaths;
pub use pipeline::{extract_scene, Pipeline, RunStats};
pub use reader::SceneDocument;
