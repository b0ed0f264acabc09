//! # Scene Graph Reader
//!
//! Opens the scene document and locates the well-known sub-trees:
//!
//! ```text
//! /<world>/VoxelMap                    chunk prims live here
//! /<world>/VoxelMap/BlockLib
//! /<world>/VoxelMap/BlockLib/Blocks    block groups and the Looks scope
//! ```
//!
//! Missing roots are not errors. They show up as empty child sets.

use std::path::Path;

use tracing::{debug, info};
use voxscene_stage::{Prim, SdfPath, Stage};

use crate::config::SceneLayout;
use crate::error::VoxSceneResult;
use crate::paths::DocumentPaths;

/// An opened scene document with its resolved roots.
#[derive(Debug)]
pub struct SceneDocument {
    stage: Stage,
    paths: DocumentPaths,
    layout: SceneLayout,
    world_root: SdfPath,
    voxel_map: SdfPath,
    block_lib: SdfPath,
    blocks: SdfPath,
}

impl SceneDocument {
    /// Opens the document at `path`.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if the path has no file name
    /// - `DocumentOpen` if the file cannot be read or parsed
    pub fn open<P: AsRef<Path>>(path: P, layout: &SceneLayout) -> VoxSceneResult<Self> {
        let paths = DocumentPaths::resolve(path)?;
        let stage = Stage::open(&paths.document)?;
        info!(
            document = %paths.document.display(),
            prims = stage.prim_count(),
            "opened scene document"
        );
        Ok(Self::from_stage(stage, paths, layout))
    }

    /// Wraps an already opened stage.
    #[must_use]
    pub fn from_stage(stage: Stage, paths: DocumentPaths, layout: &SceneLayout) -> Self {
        let world_root = SdfPath::root().child(&paths.world_token());
        let voxel_map = world_root.child(&layout.voxel_map);
        let block_lib = voxel_map.child(&layout.block_lib);
        let blocks = block_lib.child(&layout.blocks_scope);
        debug!(
            voxel_map = %voxel_map,
            found = stage.prim_at_path(&voxel_map).is_some(),
            "resolved scene roots"
        );
        Self {
            stage,
            paths,
            layout: layout.clone(),
            world_root,
            voxel_map,
            block_lib,
            blocks,
        }
    }

    /// The underlying stage.
    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Paths and names derived from the document location.
    #[must_use]
    pub fn paths(&self) -> &DocumentPaths {
        &self.paths
    }

    /// Layout names in effect.
    #[must_use]
    pub fn layout(&self) -> &SceneLayout {
        &self.layout
    }

    /// `/<world>`.
    #[must_use]
    pub fn world_root(&self) -> &SdfPath {
        &self.world_root
    }

    /// `/<world>/VoxelMap`.
    #[must_use]
    pub fn voxel_map_path(&self) -> &SdfPath {
        &self.voxel_map
    }

    /// `/<world>/VoxelMap/BlockLib`.
    #[must_use]
    pub fn block_lib_path(&self) -> &SdfPath {
        &self.block_lib
    }

    /// `/<world>/VoxelMap/BlockLib/Blocks`.
    #[must_use]
    pub fn blocks_path(&self) -> &SdfPath {
        &self.blocks
    }

    /// Direct children of the voxel map (chunk candidates).
    #[must_use]
    pub fn chunk_candidates(&self) -> Vec<Prim<'_>> {
        self.children_of(&self.voxel_map)
    }

    /// Direct children of the `Blocks` scope (block groups).
    #[must_use]
    pub fn block_groups(&self) -> Vec<Prim<'_>> {
        self.children_of(&self.blocks)
    }

    fn children_of(&self, path: &SdfPath) -> Vec<Prim<'_>> {
        self.stage
            .prim_at_path(path)
            .map(|p| p.children().collect())
            .unwrap_or_default()
    }
}
