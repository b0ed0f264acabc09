//! # VOXSCENE Stage
//!
//! Read-only access to USD ASCII (`.usda`) scene documents.
//!
//! ## Design Principles
//!
//! 1. **Immutable** - a [`Stage`] is parsed once and never written
//! 2. **Structured paths** - [`SdfPath`] splits segments once at parse time
//! 3. **Typed values** - attributes expose typed views (`as_vec3f_array`, ...)
//!
//! ## Example
//!
//! ```rust,ignore
//! use voxscene_stage::{SdfPath, Stage};
//!
//! let stage = Stage::open("saves/world/mood.usda")?;
//! let map = stage.prim_at_path(&SdfPath::parse("/world/VoxelMap").unwrap());
//! for chunk in map.iter().flat_map(|m| m.children()) {
//!     println!("{}", chunk.path());
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
mod lexer;
mod parser;
pub mod path;
pub mod stage;
pub mod value;

pub use error::{StageError, StageResult};
pub use parser::Specifier;
pub use path::SdfPath;
pub use stage::{Prim, Stage};
pub use value::{Attribute, Relationship, Value};
