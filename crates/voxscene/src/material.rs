//! # Material Resolution
//!
//! Walks the block groups under `Blocks`, collecting:
//! - one [`MaterialBinding`] per distinct `material:binding` target list
//! - the instance lookup: block group name to renderable mesh name
//!
//! Anything under the `Looks` scope is a shader node, not a mesh, and is
//! skipped.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use tracing::{debug, warn};
use voxscene_stage::{Prim, SdfPath, Stage};

use crate::error::{VoxSceneError, VoxSceneResult};
use crate::paths::DocumentPaths;
use crate::reader::SceneDocument;

/// Binding relationship on meshes.
pub const MATERIAL_BINDING: &str = "material:binding";

/// Texture shader child of a material.
pub const DIFFUSE_TEXTURE: &str = "diffuse_texture";

/// Texture file input on the shader.
pub const INPUTS_FILE: &str = "inputs:file";

/// A material with its resolved diffuse texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialBinding {
    /// Material prim (first binding target).
    pub material: SdfPath,
    /// Texture asset path as authored.
    pub texture: String,
    /// First mesh seen bound to this material.
    pub mesh: SdfPath,
}

impl MaterialBinding {
    /// Texture path resolved against the document directory.
    #[must_use]
    pub fn texture_file(&self, paths: &DocumentPaths) -> PathBuf {
        paths.resolve_asset(&self.texture)
    }
}

/// Output of the material pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialSet {
    /// Distinct bindings in discovery order.
    pub bindings: Vec<MaterialBinding>,
    /// Block group name to renderable mesh name.
    pub instances: BTreeMap<String, String>,
}

impl MaterialSet {
    /// Renderable mesh for a block group, if any.
    #[must_use]
    pub fn instance(&self, block: &str) -> Option<&str> {
        self.instances.get(block).map(String::as_str)
    }

    /// Binding for a material path.
    #[must_use]
    pub fn binding(&self, material: &SdfPath) -> Option<&MaterialBinding> {
        self.bindings.iter().find(|b| &b.material == material)
    }
}

/// Resolves materials and the instance lookup for a document.
///
/// # Errors
///
/// Returns `MissingProperty` when a bound material exists but has no
/// `diffuse_texture` / `inputs:file`. Unresolvable targets are skipped.
pub fn resolve_materials(doc: &SceneDocument) -> VoxSceneResult<MaterialSet> {
    let looks = doc.layout().looks_segment.as_str();
    let stage = doc.stage();
    let mut set = MaterialSet::default();
    let mut seen: HashSet<Vec<SdfPath>> = HashSet::new();

    for group in doc.block_groups() {
        for mesh in group.children() {
            if mesh.path().contains_segment(looks) {
                continue;
            }
            set.instances
                .insert(group.name().to_string(), mesh.name().to_string());

            let Some(targets) = mesh.relationship(MATERIAL_BINDING).map(|r| r.targets()) else {
                continue;
            };
            if targets.is_empty() || !seen.insert(targets.to_vec()) {
                continue;
            }
            if let Some(binding) = read_binding(stage, mesh, &targets[0])? {
                set.bindings.push(binding);
            }
        }
    }

    debug!(
        materials = set.bindings.len(),
        instances = set.instances.len(),
        "resolved materials"
    );
    Ok(set)
}

fn read_binding(
    stage: &Stage,
    mesh: Prim<'_>,
    material: &SdfPath,
) -> VoxSceneResult<Option<MaterialBinding>> {
    let Some(material_prim) = stage.prim_at_path(material) else {
        warn!(mesh = %mesh.path(), material = %material, "binding target not found");
        return Ok(None);
    };
    let missing = |property: &str| VoxSceneError::MissingProperty {
        material: material.to_string(),
        property: property.to_string(),
    };

    let shader = material_prim
        .child(DIFFUSE_TEXTURE)
        .ok_or_else(|| missing(DIFFUSE_TEXTURE))?;
    let texture = shader
        .property(INPUTS_FILE)
        .and_then(|a| a.get())
        .and_then(|v| v.as_asset())
        .ok_or_else(|| missing(INPUTS_FILE))?;

    Ok(Some(MaterialBinding {
        material: material.clone(),
        texture: texture.to_string(),
        mesh: mesh.path().clone(),
    }))
}
