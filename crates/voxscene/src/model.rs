//! # Scene Model
//!
//! The assembled, immutable result of one pipeline run, plus the views the
//! visualization side consumes:
//!
//! - per-point `{instance_index, category_id, variant_id}` triples
//! - flat point coordinate buffers
//! - per-chunk instancing slots
//! - material bindings with texture paths

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use voxscene_stage::SdfPath;

use crate::adjacency::AdjacencyGraph;
use crate::catalog::BlockCatalog;
use crate::chunk::Chunk;
use crate::error::{VoxSceneError, VoxSceneResult};
use crate::host;
use crate::material::{MaterialBinding, MaterialSet};
use crate::paths::DocumentPaths;

/// The voxel world a document describes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelWorld {
    /// Display name (parent directory of the document).
    pub name: String,
    /// Normalized name used in prim paths.
    pub token: String,
    /// `/<token>`.
    pub root: SdfPath,
    /// Document file name without extension.
    pub file_name: String,
}

impl VoxelWorld {
    /// Derives the world from document paths.
    #[must_use]
    pub fn from_paths(paths: &DocumentPaths) -> Self {
        let token = paths.world_token();
        Self {
            name: paths.world_name.clone(),
            root: SdfPath::root().child(&token),
            token,
            file_name: paths.base_name.clone(),
        }
    }
}

/// Per-point attributes handed to the point object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PointAttributes {
    /// Index into the chunk's prototype list.
    pub instance_index: u32,
    /// Block category of that prototype.
    pub category_id: u32,
    /// Block variant of that prototype.
    pub variant_id: u32,
}

/// One entry of a chunk's instancing list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceSlot {
    /// Prototype path.
    pub block: SdfPath,
    /// Block segment, e.g. `Block_2_0`.
    pub segment: String,
    /// Block needs a merged object.
    pub composite: bool,
    /// Object to instance, if one is known.
    pub object: Option<String>,
}

/// Everything extracted from one document.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneModel {
    world: VoxelWorld,
    chunks: BTreeMap<String, Chunk>,
    catalog: BlockCatalog,
    materials: MaterialSet,
    adjacency: BTreeMap<String, AdjacencyGraph>,
}

impl SceneModel {
    /// Joins the extraction outputs.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentModel` if a chunk references a block missing
    /// from `catalog` or has no adjacency graph, and `MalformedChunk` for a
    /// chunk that breaks its own invariants.
    pub fn assemble(
        world: VoxelWorld,
        chunks: Vec<Chunk>,
        catalog: BlockCatalog,
        materials: MaterialSet,
        mut adjacency: BTreeMap<String, AdjacencyGraph>,
    ) -> VoxSceneResult<Self> {
        let inconsistent = |chunk: &Chunk, reason: String| VoxSceneError::InconsistentModel {
            chunk: chunk.name.clone(),
            reason,
        };

        let mut by_name = BTreeMap::new();
        for chunk in chunks {
            chunk.validate()?;
            if let Some(block) = chunk.prototypes.iter().find(|b| !catalog.contains_key(*b)) {
                return Err(inconsistent(&chunk, format!("unknown block {block}")));
            }
            match adjacency.get(&chunk.name) {
                Some(graph) if graph.len() == chunk.len() => {}
                Some(_) => {
                    return Err(inconsistent(&chunk, "adjacency size mismatch".to_string()));
                }
                None => return Err(inconsistent(&chunk, "no adjacency graph".to_string())),
            }
            by_name.insert(chunk.name.clone(), chunk);
        }
        adjacency.retain(|name, _| by_name.contains_key(name));

        Ok(Self {
            world,
            chunks: by_name,
            catalog,
            materials,
            adjacency,
        })
    }

    /// The world this model describes.
    #[must_use]
    pub fn world(&self) -> &VoxelWorld {
        &self.world
    }

    /// Chunks by name.
    #[must_use]
    pub fn chunks(&self) -> &BTreeMap<String, Chunk> {
        &self.chunks
    }

    /// One chunk by name.
    #[must_use]
    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        self.chunks.get(name)
    }

    /// Block types by prototype path.
    #[must_use]
    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Distinct material bindings.
    #[must_use]
    pub fn materials(&self) -> &[MaterialBinding] {
        &self.materials.bindings
    }

    /// Material pass output including the instance lookup.
    #[must_use]
    pub fn material_set(&self) -> &MaterialSet {
        &self.materials
    }

    /// Adjacency graphs by chunk name.
    #[must_use]
    pub fn adjacency(&self) -> &BTreeMap<String, AdjacencyGraph> {
        &self.adjacency
    }

    /// Adjacency graph of one chunk.
    #[must_use]
    pub fn graph(&self, chunk: &str) -> Option<&AdjacencyGraph> {
        self.adjacency.get(chunk)
    }

    /// Total point count over all chunks.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.chunks.values().map(Chunk::len).sum()
    }

    /// Flat `x, y, z, ...` coordinates of a chunk.
    #[must_use]
    pub fn coordinates(&self, chunk: &str) -> Option<&[f32]> {
        self.chunks.get(chunk).map(Chunk::coordinates)
    }

    /// Per-point instance/category/variant triples of a chunk.
    #[must_use]
    pub fn point_attributes(&self, chunk: &str) -> Option<Vec<PointAttributes>> {
        let chunk = self.chunks.get(chunk)?;
        let ids: Vec<(u32, u32)> = chunk
            .prototypes
            .iter()
            .map(|p| {
                self.catalog
                    .get(p)
                    .map_or((0, 0), |b| (b.category_id, b.variant_id))
            })
            .collect();
        Some(
            chunk
                .instance_indices
                .iter()
                .map(|&i| {
                    let (category_id, variant_id) =
                        ids.get(i as usize).copied().unwrap_or_default();
                    PointAttributes {
                        instance_index: i,
                        category_id,
                        variant_id,
                    }
                })
                .collect(),
        )
    }

    /// Instancing slots of a chunk, in prototype order.
    ///
    /// Single-mesh blocks instance the mesh from the instance lookup;
    /// composite blocks instance their merged object.
    #[must_use]
    pub fn instancing_slots(&self, chunk: &str) -> Option<Vec<InstanceSlot>> {
        let chunk = self.chunks.get(chunk)?;
        Some(
            chunk
                .prototypes
                .iter()
                .map(|reference| {
                    let segment = reference.name().unwrap_or_default().to_string();
                    let composite = self.catalog.get(reference).is_some_and(|b| b.composite);
                    let object = if composite {
                        Some(host::merge_name(&segment))
                    } else {
                        self.materials.instance(&segment).map(str::to_string)
                    };
                    InstanceSlot {
                        block: reference.clone(),
                        segment,
                        composite,
                        object,
                    }
                })
                .collect(),
        )
    }
}
