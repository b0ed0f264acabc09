//! # Pipeline Error Types
//!
//! All errors that can occur while extracting a scene model.
//! Every variant is fatal to the run: there is no partial-model recovery.

use thiserror::Error;
use voxscene_stage::StageError;

/// Errors that can occur in the extraction pipeline.
#[derive(Error, Debug)]
pub enum VoxSceneError {
    /// The document path has no file-name component.
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// The scene document could not be opened or parsed.
    #[error("failed to open scene document: {0}")]
    DocumentOpen(#[from] StageError),

    /// A required attribute is absent or has the wrong type.
    #[error("prim {prim} is missing attribute {attribute}")]
    MissingAttribute {
        /// Prim path.
        prim: String,
        /// Attribute name.
        attribute: String,
    },

    /// A block prototype segment does not match `Block_<category>_<variant>`.
    #[error("malformed block path segment: {0}")]
    MalformedBlockPath(String),

    /// A resolved material lacks its texture property.
    #[error("material {material} is missing property {property}")]
    MissingProperty {
        /// Material prim path.
        material: String,
        /// Expected property.
        property: String,
    },

    /// Extraction outputs disagree (a chunk references a prototype absent
    /// from the catalog, or has no adjacency graph). Indicates a bug.
    #[error("inconsistent model at chunk {chunk}: {reason}")]
    InconsistentModel {
        /// Chunk name.
        chunk: String,
        /// What does not line up.
        reason: String,
    },

    /// A prototype path resolves to no prim.
    #[error("unresolved prim: {0}")]
    UnresolvedPrim(String),

    /// A chunk violates its point/index invariants.
    #[error("malformed chunk {chunk}: {reason}")]
    MalformedChunk {
        /// Chunk name.
        chunk: String,
        /// What is wrong.
        reason: String,
    },

    /// The adjacency pass was cancelled or ran past its deadline.
    #[error("adjacency pass interrupted for chunk {0}")]
    AdjacencyInterrupted(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pipeline operations.
pub type VoxSceneResult<T> = Result<T, VoxSceneError>;
