//! Document location and naming context.

use std::path::{Path, PathBuf};

use crate::error::{VoxSceneError, VoxSceneResult};

/// Locations and names derived from a scene document path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentPaths {
    /// The document itself.
    pub document: PathBuf,
    /// Directory holding the document.
    pub directory: PathBuf,
    /// File name without extension.
    pub base_name: String,
    /// Parent directory name, as found on disk.
    pub world_name: String,
    /// Sidecar block library: `<dir>/<stem>_materials/BlockLibrary.usda`.
    pub block_library: PathBuf,
}

impl DocumentPaths {
    /// Decomposes a document path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if the path has no file-name component.
    pub fn resolve<P: AsRef<Path>>(path: P) -> VoxSceneResult<Self> {
        let document = path.as_ref().to_path_buf();
        let invalid = || VoxSceneError::InvalidPath(document.display().to_string());

        let base_name = document
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(invalid)?
            .to_string();
        let directory = document
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let world_name = directory
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let block_library = directory
            .join(format!("{base_name}_materials"))
            .join("BlockLibrary.usda");

        Ok(Self {
            document,
            directory,
            base_name,
            world_name,
            block_library,
        })
    }

    /// World name usable as a prim path segment.
    #[must_use]
    pub fn world_token(&self) -> String {
        normalize_token(&self.world_name)
    }

    /// Resolves an authored asset path against the document directory.
    ///
    /// Absolute asset paths are returned unchanged.
    #[must_use]
    pub fn resolve_asset(&self, asset: &str) -> PathBuf {
        let relative = asset.strip_prefix("./").unwrap_or(asset);
        let candidate = Path::new(relative);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.directory.join(candidate)
        }
    }
}

/// Replaces every character that is not valid in a prim name with `_`.
#[must_use]
pub fn normalize_token(name: &str) -> String {
    let mut token: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        token.insert(0, '_');
    }
    token
}
