//! The opened, immutable scene document.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StageError, StageResult};
use crate::parser::{parse_layer, PrimSpec, Specifier};
use crate::path::SdfPath;
use crate::value::{Attribute, Relationship};

/// Magic bytes of a binary crate layer.
const USDC_MAGIC: &[u8] = b"PXR-USDC";

/// Magic bytes of a zip archive (`.usdz`).
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Index of a prim in the stage arena.
type PrimIndex = usize;

struct PrimData {
    path: SdfPath,
    specifier: Specifier,
    type_name: Option<String>,
    attributes: BTreeMap<String, Attribute>,
    relationships: BTreeMap<String, Relationship>,
    children: Vec<PrimIndex>,
}

/// A read-only scene document.
///
/// Prims live in a flat arena indexed by path. The stage is never mutated
/// after it is opened, so it can be shared freely across readers.
pub struct Stage {
    source: String,
    prims: Vec<PrimData>,
    roots: Vec<PrimIndex>,
    index: HashMap<SdfPath, PrimIndex>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("source", &self.source)
            .field("prim_count", &self.prims.len())
            .finish()
    }
}

impl Stage {
    /// Opens a `.usda` document from disk.
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `UnsupportedFormat` for binary crate files, `.usdz` archives or
    ///   non-UTF-8 text
    /// - `Syntax` / `DuplicatePrim` for malformed layers
    pub fn open<P: AsRef<Path>>(path: P) -> StageResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| StageError::Io {
            path: PathBuf::from(path),
            source,
        })?;

        if bytes.starts_with(USDC_MAGIC) {
            return Err(StageError::UnsupportedFormat(format!(
                "{} is a binary crate layer",
                path.display()
            )));
        }
        if bytes.starts_with(ZIP_MAGIC) {
            return Err(StageError::UnsupportedFormat(format!(
                "{} is a usdz archive",
                path.display()
            )));
        }
        let text = String::from_utf8(bytes).map_err(|_| {
            StageError::UnsupportedFormat(format!("{} is not UTF-8 text", path.display()))
        })?;

        Self::from_usda(&text, &path.display().to_string())
    }

    /// Parses a `.usda` layer held in memory.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` if the `#usda` header is missing, or a
    /// syntax error for malformed text.
    pub fn from_usda(text: &str, source: &str) -> StageResult<Self> {
        let header = text.trim_start_matches('\u{feff}').trim_start();
        if !header.starts_with("#usda") {
            return Err(StageError::UnsupportedFormat(format!(
                "{source} has no #usda header"
            )));
        }

        let specs = parse_layer(text)?;
        let mut stage = Self {
            source: source.to_string(),
            prims: Vec::new(),
            roots: Vec::new(),
            index: HashMap::new(),
        };
        for spec in specs {
            let root = stage.insert(spec);
            stage.roots.push(root);
        }
        debug!(source, prims = stage.prims.len(), "opened stage");
        Ok(stage)
    }

    fn insert(&mut self, spec: PrimSpec) -> PrimIndex {
        let id = self.prims.len();
        self.index.insert(spec.path.clone(), id);
        self.prims.push(PrimData {
            path: spec.path,
            specifier: spec.specifier,
            type_name: spec.type_name,
            attributes: spec.attributes,
            relationships: spec.relationships,
            children: Vec::with_capacity(spec.children.len()),
        });
        for child in spec.children {
            let child_id = self.insert(child);
            self.prims[id].children.push(child_id);
        }
        id
    }

    /// Name the stage was opened from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Total number of prims.
    #[must_use]
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    /// Looks up a prim by absolute path.
    #[must_use]
    pub fn prim_at_path(&self, path: &SdfPath) -> Option<Prim<'_>> {
        self.index.get(path).map(|&id| Prim { stage: self, id })
    }

    /// Top-level prims in document order.
    pub fn root_prims(&self) -> impl Iterator<Item = Prim<'_>> + '_ {
        self.roots.iter().map(move |&id| Prim { stage: self, id })
    }
}

/// A borrowed handle to one prim of a [`Stage`].
#[derive(Clone, Copy)]
pub struct Prim<'a> {
    stage: &'a Stage,
    id: PrimIndex,
}

impl std::fmt::Debug for Prim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Prim({})", self.data().path)
    }
}

impl<'a> Prim<'a> {
    fn data(&self) -> &'a PrimData {
        &self.stage.prims[self.id]
    }

    /// Absolute path.
    #[must_use]
    pub fn path(&self) -> &'a SdfPath {
        &self.data().path
    }

    /// Prim name (last path segment).
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.data().path.name().unwrap_or_default()
    }

    /// Schema type, e.g. `Mesh`, if authored.
    #[must_use]
    pub fn type_name(&self) -> Option<&'a str> {
        self.data().type_name.as_deref()
    }

    /// How the prim was introduced.
    #[must_use]
    pub fn specifier(&self) -> Specifier {
        self.data().specifier
    }

    /// Direct children in document order.
    pub fn children(&self) -> impl Iterator<Item = Prim<'a>> + 'a {
        let stage = self.stage;
        self.data()
            .children
            .iter()
            .map(move |&id| Prim { stage, id })
    }

    /// Number of direct children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    /// Direct child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Prim<'a>> {
        self.children().find(|c| c.name() == name)
    }

    /// Authored attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&'a Attribute> {
        self.data().attributes.get(name)
    }

    /// Authored relationship by name.
    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&'a Relationship> {
        self.data().relationships.get(name)
    }

    /// Attribute-valued property lookup (`inputs:file`, ...).
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&'a Attribute> {
        self.attribute(name)
    }

    /// Returns true if an attribute or relationship with `name` is authored.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        let data = self.data();
        data.attributes.contains_key(name) || data.relationships.contains_key(name)
    }

    /// The stage this prim belongs to.
    #[must_use]
    pub fn stage(&self) -> &'a Stage {
        self.stage
    }
}
