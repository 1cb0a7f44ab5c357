//! Procedural 3-D tree growth and mesh synthesis library.
//!
//! Main components:
//! - [`growth`] — recursive branch growth.
//! - [`tree`] — the branch arena produced by growth.
//! - [`segments`] — flattening the tree into parent→child segments.
//! - [`tube`] — Bezier tube sweeping per segment.
//! - [`blend`] — metaball blending at forks.
//! - [`foliage`] — leaf placement at unique tips.
//! - [`pipeline`] — the top-level build wiring all stages together.
//! - [`mesh`] / [`isosurface`] — output buffers and the pluggable geometry
//!   and isosurface backends.
//! - [`config`] / [`error`] — build parameters and their loading errors.

pub mod blend;
pub mod config;
pub mod error;
pub mod foliage;
pub mod growth;
pub mod isosurface;
pub mod mesh;
pub mod pipeline;
pub mod segments;
pub mod tree;
pub mod tube;

pub use config::{GrowthConfig, MeshConfig, TreeConfig};
pub use error::ConfigError;
pub use pipeline::{BuildReport, Generated, build};
