//! # Extraction Pipeline
//!
//! Runs every pass in order:
//!
//! ```text
//! DocumentPaths -> SceneDocument -> chunks -> catalog -> materials
//!                                      \-> adjacency (worker pool)
//!                                             -> SceneModel
//! ```
//!
//! Any extraction error aborts the run. Only the adjacency pass honors
//! cancellation and the configured deadline.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use crate::adjacency;
use crate::cancel::CancelToken;
use crate::catalog::BlockCatalogBuilder;
use crate::chunk::extract_chunks;
use crate::config::PipelineConfig;
use crate::error::VoxSceneResult;
use crate::material::resolve_materials;
use crate::model::{SceneModel, VoxelWorld};
use crate::reader::SceneDocument;

/// Summary counts of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Chunks extracted.
    pub chunks: usize,
    /// Distinct block types.
    pub blocks: usize,
    /// Stage reads made by the catalog builder.
    pub block_resolutions: usize,
    /// Distinct material bindings.
    pub materials: usize,
    /// Points over all chunks.
    pub points: usize,
    /// Edges over all chunks.
    pub edges: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// Configured pipeline.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl Pipeline {
    /// Creates a pipeline with its own cancellation token.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Uses a caller-owned cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that interrupts the adjacency pass.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Opens the document at `path` and extracts its model.
    ///
    /// # Errors
    ///
    /// Any pass error; see [`crate::VoxSceneError`].
    pub fn run<P: AsRef<Path>>(&self, path: P) -> VoxSceneResult<SceneModel> {
        self.run_with_stats(path).map(|(model, _)| model)
    }

    /// Like [`Pipeline::run`], also returning summary counts.
    ///
    /// # Errors
    ///
    /// Any pass error; see [`crate::VoxSceneError`].
    pub fn run_with_stats<P: AsRef<Path>>(&self, path: P) -> VoxSceneResult<(SceneModel, RunStats)> {
        let started = Instant::now();
        let doc = SceneDocument::open(path, &self.config.scene)?;
        self.extract(&doc, started)
    }

    /// Extracts the model from an already opened document.
    ///
    /// # Errors
    ///
    /// Any pass error; see [`crate::VoxSceneError`].
    pub fn run_document(&self, doc: &SceneDocument) -> VoxSceneResult<(SceneModel, RunStats)> {
        self.extract(doc, Instant::now())
    }

    fn extract(&self, doc: &SceneDocument, started: Instant) -> VoxSceneResult<(SceneModel, RunStats)> {
        let chunks = extract_chunks(doc)?;

        let mut catalog = BlockCatalogBuilder::new();
        catalog.add_chunks(doc.stage(), &chunks)?;
        let block_resolutions = catalog.resolution_count();

        let materials = resolve_materials(doc)?;

        // The configured deadline is per run; the caller's token stays untouched.
        let cancel = self.cancel.child();
        if let Some(limit) = self.config.adjacency.deadline() {
            cancel.set_deadline(Instant::now() + limit);
        }
        let graphs = adjacency::build_all(&chunks, &self.config.adjacency, &cancel)?;

        let world = VoxelWorld::from_paths(doc.paths());
        let model = SceneModel::assemble(world, chunks, catalog.into_catalog(), materials, graphs)?;

        let stats = RunStats {
            chunks: model.chunks().len(),
            blocks: model.catalog().len(),
            block_resolutions,
            materials: model.materials().len(),
            points: model.point_count(),
            edges: model.adjacency().values().map(|g| g.edge_count()).sum(),
            elapsed: started.elapsed(),
        };
        info!(
            world = %model.world().name,
            chunks = stats.chunks,
            blocks = stats.blocks,
            materials = stats.materials,
            points = stats.points,
            edges = stats.edges,
            elapsed_ms = stats.elapsed.as_millis(),
            "scene extracted"
        );
        Ok((model, stats))
    }
}

/// Runs the pipeline with default configuration.
///
/// # Errors
///
/// Any pass error; see [`crate::VoxSceneError`].
pub fn extract_scene<P: AsRef<Path>>(path: P) -> VoxSceneResult<SceneModel> {
    Pipeline::default().run(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::Strictness;
    use crate::error::VoxSceneError;
    use crate::paths::DocumentPaths;
    use voxscene_stage::Stage;

    const LAYER: &str = r#"#usda 1.0
def Xform "w"
{
    def Xform "VoxelMap"
    {
        def PointInstancer "Chunk_0_0"
        {
            point3f[] positions = [(0, 0, 0), (1, 0, 0), (0, 1, 0), (5, 5, 5)]
            int[] protoIndices = [0, 0, 1, 0]
            rel prototypes = [</w/VoxelMap/BlockLib/Blocks/Block_1_0>, </w/VoxelMap/BlockLib/Blocks/Block_2_0>]
        }
        def PointInstancer "Chunk_0_1"
        {
            point3f[] positions = [(16, 0, 0)]
            int[] protoIndices = [0]
            rel prototypes = </w/VoxelMap/BlockLib/Blocks/Block_1_0>
        }
        def Scope "BlockLib"
        {
            def Scope "Blocks"
            {
                def Xform "Block_1_0"
                {
                    custom string typeName = "stone"
                    def Mesh "stone" {}
                }
                def Xform "Block_2_0"
                {
                    custom string typeName = "grass_block"
                    def Mesh "top" {}
                    def Mesh "side" {}
                }
            }
        }
    }
}
"#;

    fn document() -> SceneDocument {
        let stage = Stage::from_usda(LAYER, "mem").unwrap();
        let paths = DocumentPaths::resolve("/saves/w/mood.usda").unwrap();
        SceneDocument::from_stage(stage, paths, &PipelineConfig::default().scene)
    }

    #[test]
    fn test_run_document() {
        let (model, stats) = Pipeline::default().run_document(&document()).unwrap();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.block_resolutions, 2);
        assert_eq!(stats.points, 5);
        let graph = model.graph("Chunk_0_0").unwrap();
        // stored (x, z, y): (0,1,0) becomes (0,0,1)
        assert!(graph.contains(0, 1));
        assert!(graph.contains(0, 2));
        assert!(graph.contains(1, 2));
        assert_eq!(graph.degree(3), 0);
    }

    #[test]
    fn test_strict_config() {
        let mut config = PipelineConfig::default();
        config.adjacency.strictness = Strictness::Strict;
        let (model, _) = Pipeline::new(config).run_document(&document()).unwrap();
        assert_eq!(model.graph("Chunk_0_0").unwrap().edges(), &[(0, 1), (0, 2)]);
    }

    #[test]
    fn test_deadline_is_per_run() {
        let mut config = PipelineConfig::default();
        config.adjacency.deadline_ms = 50;
        let token = CancelToken::new();
        let pipeline = Pipeline::new(config).with_cancel_token(token.clone());
        let doc = document();

        let (first, _) = pipeline.run_document(&doc).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        let (second, _) = pipeline.run_document(&doc).unwrap();

        assert_eq!(first, second);
        assert_eq!(token.deadline(), None);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancelled_run() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let pipeline = Pipeline::default().with_cancel_token(cancel);
        assert!(matches!(
            pipeline.run_document(&document()),
            Err(VoxSceneError::AdjacencyInterrupted(_))
        ));
    }
}
