//! # Chunk Extraction
//!
//! Pulls point clouds out of chunk prims under the voxel map.
//!
//! A chunk prim carries:
//! - `positions`: `point3f[]`, stored with axes (X, Z, Y)
//! - `protoIndices`: `int[]`, one per point
//! - `prototypes`: relationship to block prims in the block library
//!
//! Siblings whose name does not contain the chunk marker are skipped.

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use voxscene_stage::{Prim, SdfPath};

use crate::config::SceneLayout;
use crate::error::{VoxSceneError, VoxSceneResult};
use crate::reader::SceneDocument;

/// Point attribute name.
pub const POSITIONS: &str = "positions";

/// Per-point prototype index attribute name.
pub const PROTO_INDICES: &str = "protoIndices";

/// Prototype relationship name.
pub const PROTOTYPES: &str = "prototypes";

/// A point in chunk space with Y up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Point3 {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate (vertical).
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Point3 {
    /// Creates a new point.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Components as an array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Componentwise minimum.
    #[inline]
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Euclidean distance, computed in f64.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl From<[f32; 3]> for Point3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// One extracted chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Prim name, e.g. `Chunk_0_-1`.
    pub name: String,
    /// Prim path.
    pub path: SdfPath,
    /// Points, already in (X, Y, Z) order.
    pub points: Vec<Point3>,
    /// Index into `prototypes` for each point.
    pub instance_indices: Vec<u32>,
    /// Block references in relationship order.
    pub prototypes: Vec<SdfPath>,
}

impl Chunk {
    /// Extracts a chunk from a prim matched by the chunk marker.
    ///
    /// # Errors
    ///
    /// - `MissingAttribute` if `positions` or `protoIndices` is absent
    /// - `MalformedChunk` if the arrays disagree in length or an index is
    ///   out of range
    pub fn from_prim(prim: Prim<'_>, layout: &SceneLayout) -> VoxSceneResult<Self> {
        let name = prim.name().to_string();
        let missing = |attribute: &str| VoxSceneError::MissingAttribute {
            prim: prim.path().to_string(),
            attribute: attribute.to_string(),
        };

        let raw_points = prim
            .attribute(POSITIONS)
            .and_then(|a| a.get())
            .and_then(|v| v.as_vec3f_array())
            .ok_or_else(|| missing(POSITIONS))?;
        let instance_indices = prim
            .attribute(PROTO_INDICES)
            .and_then(|a| a.get())
            .and_then(|v| v.as_uint_array())
            .ok_or_else(|| missing(PROTO_INDICES))?;
        let prototypes = prim
            .relationship(PROTOTYPES)
            .map(|r| r.targets().to_vec())
            .unwrap_or_default();

        let points = raw_points
            .into_iter()
            .map(|[x, a, b]| {
                if layout.swap_yz {
                    Point3::new(x, b, a)
                } else {
                    Point3::new(x, a, b)
                }
            })
            .collect();

        let chunk = Self {
            name,
            path: prim.path().clone(),
            points,
            instance_indices,
            prototypes,
        };
        chunk.validate()?;
        Ok(chunk)
    }

    /// Checks the point/index invariants.
    ///
    /// # Errors
    ///
    /// Returns `MalformedChunk` describing the first violation.
    pub fn validate(&self) -> VoxSceneResult<()> {
        let malformed = |reason: String| VoxSceneError::MalformedChunk {
            chunk: self.name.clone(),
            reason,
        };
        if self.points.len() != self.instance_indices.len() {
            return Err(malformed(format!(
                "{} points but {} prototype indices",
                self.points.len(),
                self.instance_indices.len()
            )));
        }
        let count = self.prototypes.len();
        if let Some((point, &index)) = self
            .instance_indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= count)
        {
            return Err(malformed(format!(
                "point {point} uses prototype {index} of {count}"
            )));
        }
        Ok(())
    }

    /// Number of points.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the chunk holds no points.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points as one flat `x, y, z, x, y, z, ...` buffer.
    #[must_use]
    pub fn coordinates(&self) -> &[f32] {
        bytemuck::cast_slice(&self.points)
    }
}

/// Extracts every chunk under the voxel map, in document order.
///
/// # Errors
///
/// Propagates the first chunk error; extraction is all-or-nothing.
pub fn extract_chunks(doc: &SceneDocument) -> VoxSceneResult<Vec<Chunk>> {
    let layout = doc.layout();
    let mut chunks = Vec::new();
    for prim in doc.chunk_candidates() {
        if !prim.name().contains(layout.chunk_marker.as_str()) {
            debug!(prim = %prim.path(), "skipping non-chunk sibling");
            continue;
        }
        chunks.push(Chunk::from_prim(prim, layout)?);
    }
    debug!(count = chunks.len(), "extracted chunks");
    Ok(chunks)
}
