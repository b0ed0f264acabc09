//! # Block Catalog
//!
//! Resolves the block prototypes chunks point at into [`BlockType`]s.
//!
//! Each prototype path is resolved at most once per builder, no matter how
//! many chunks reference it.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;
use voxscene_stage::{SdfPath, Stage};

use crate::chunk::Chunk;
use crate::error::{VoxSceneError, VoxSceneResult};

/// Display name attribute on block prims.
pub const TYPE_NAME: &str = "typeName";

/// Prefix of block segments.
const BLOCK_PREFIX: &str = "Block_";

/// A resolved block prototype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockType {
    /// Prototype path.
    pub reference: SdfPath,
    /// Human readable name from `typeName`.
    pub display_name: String,
    /// Category parsed from `Block_<category>_<variant>`.
    pub category_id: u32,
    /// Variant parsed from `Block_<category>_<variant>`.
    pub variant_id: u32,
    /// Child mesh prims.
    pub meshes: Vec<SdfPath>,
    /// Two or more meshes that must be merged downstream.
    pub composite: bool,
}

impl BlockType {
    /// Block segment, e.g. `Block_12_3`.
    #[must_use]
    pub fn segment(&self) -> &str {
        self.reference.name().unwrap_or_default()
    }
}

/// Parses `Block_<category>_<variant>` into its two ids.
///
/// # Errors
///
/// Returns `MalformedBlockPath` if the segment does not match.
pub fn parse_block_segment(segment: &str) -> VoxSceneResult<(u32, u32)> {
    let malformed = || VoxSceneError::MalformedBlockPath(segment.to_string());
    let rest = segment.strip_prefix(BLOCK_PREFIX).ok_or_else(malformed)?;
    let (category, variant) = rest.split_once('_').ok_or_else(malformed)?;
    let parse = |s: &str| {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        s.parse::<u32>().map_err(|_| malformed())
    };
    Ok((parse(category)?, parse(variant)?))
}

/// Block types keyed by prototype path.
pub type BlockCatalog = BTreeMap<SdfPath, BlockType>;

/// Memoizing catalog builder.
#[derive(Debug, Default)]
pub struct BlockCatalogBuilder {
    catalog: BlockCatalog,
    resolutions: usize,
}

impl BlockCatalogBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves one prototype, reading the stage only on first sight.
    ///
    /// # Errors
    ///
    /// - `UnresolvedPrim` if no prim exists at `reference`
    /// - `MalformedBlockPath` for a bad block segment
    /// - `MissingAttribute` if `typeName` is absent
    pub fn resolve(&mut self, stage: &Stage, reference: &SdfPath) -> VoxSceneResult<&BlockType> {
        match self.catalog.entry(reference.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let block = read_block(stage, reference)?;
                self.resolutions += 1;
                Ok(entry.insert(block))
            }
        }
    }

    /// Resolves every prototype referenced by `chunks`.
    ///
    /// # Errors
    ///
    /// Propagates the first resolution error.
    pub fn add_chunks(&mut self, stage: &Stage, chunks: &[Chunk]) -> VoxSceneResult<()> {
        for chunk in chunks {
            for reference in &chunk.prototypes {
                self.resolve(stage, reference)?;
            }
        }
        Ok(())
    }

    /// Number of stage reads performed so far.
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        self.resolutions
    }

    /// Resolved entries so far.
    #[must_use]
    pub fn catalog(&self) -> &BlockCatalog {
        &self.catalog
    }

    /// Finishes the builder.
    #[must_use]
    pub fn into_catalog(self) -> BlockCatalog {
        self.catalog
    }
}

fn read_block(stage: &Stage, reference: &SdfPath) -> VoxSceneResult<BlockType> {
    let prim = stage
        .prim_at_path(reference)
        .ok_or_else(|| VoxSceneError::UnresolvedPrim(reference.to_string()))?;

    let (category_id, variant_id) = parse_block_segment(prim.name())?;
    let display_name = prim
        .attribute(TYPE_NAME)
        .and_then(|a| a.get())
        .and_then(|v| v.as_str())
        .ok_or_else(|| VoxSceneError::MissingAttribute {
            prim: reference.to_string(),
            attribute: TYPE_NAME.to_string(),
        })?
        .to_string();
    let meshes: Vec<SdfPath> = prim.children().map(|c| c.path().clone()).collect();
    let composite = meshes.len() >= 2;

    debug!(block = %reference, meshes = meshes.len(), composite, "resolved block");
    Ok(BlockType {
        reference: reference.clone(),
        display_name,
        category_id,
        variant_id,
        meshes,
        composite,
    })
}
