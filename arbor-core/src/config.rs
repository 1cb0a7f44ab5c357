//! Parameters for growing a tree and turning it into meshes.
//!
//! [`TreeConfig`] is the top-level document. It can be built in code via
//! [`Default`], or loaded from TOML:
//!
//! ```toml
//! randomness = 0.8
//! seed = 42
//!
//! [growth]
//! levels = 3
//! child_count = 2
//!
//! [mesh]
//! ring_segments = 10
//! ```
//!
//! Missing fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Branch angle at which the elevation ranges in [`crate::growth`] apply unscaled.
pub const REFERENCE_BRANCH_ANGLE_DEG: f32 = 35.0;

/// Deepest recursion accepted by [`TreeConfig::validate`].
pub const MAX_LEVELS: u32 = 12;

/// Largest tree, in branches, accepted by [`TreeConfig::validate`].
pub const MAX_NODES: u64 = 20_000;

/// Shape parameters for the recursive growth model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Maximum recursion depth. `0` yields a bare trunk.
    pub levels: u32,
    /// Base spread angle in degrees; scales the height-dependent elevation ranges.
    pub branch_angle_deg: f32,
    /// Length of the trunk; children shrink from this allometrically.
    pub base_length: f32,
    /// Number of children spawned at every branching node.
    pub child_count: u32,
    /// Radius of the trunk.
    pub base_radius: f32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            levels: 4,
            branch_angle_deg: REFERENCE_BRANCH_ANGLE_DEG,
            base_length: 4.0,
            child_count: 3,
            base_radius: 0.35,
        }
    }
}

impl GrowthConfig {
    /// Ratio between the configured spread angle and the reference angle.
    pub fn angle_scale(&self) -> f32 {
        (self.branch_angle_deg / REFERENCE_BRANCH_ANGLE_DEG).max(0.0)
    }

    /// Number of branches a tree grown with this config will hold,
    /// `sum(child_count^i)` for `i` in `0..=levels`.
    ///
    /// Saturates at `u64::MAX`.
    pub fn node_count(&self) -> u64 {
        let k = u64::from(self.child_count);
        let mut total: u64 = 1;
        let mut layer: u64 = 1;
        for _ in 0..self.levels {
            layer = layer.saturating_mul(k);
            if layer == 0 {
                break;
            }
            total = total.saturating_add(layer);
        }
        total
    }
}

/// Parameters that shape the generated surface geometry.
///
/// Colors are passed through untouched for the rendering layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Vertices per tube ring.
    pub ring_segments: u32,
    /// Sample intervals along each Bezier path (rings = `path_steps + 1`).
    pub path_steps: u32,
    /// Edge length of each leaf quad.
    pub leaf_size: f32,
    /// Tip radius of a terminal branch, as a fraction of its base radius.
    pub tip_radius_ratio: f32,
    /// Grid cells per axis used when blending junctions.
    pub junction_resolution: u32,
    /// Field threshold at which the junction surface is extracted.
    pub isolation: f32,
    /// Recompute vertex normals from faces after synthesis.
    pub smooth_normals: bool,
    /// Emit blended junction patches.
    pub junctions: bool,
    /// Emit leaf quads at branch tips.
    pub foliage: bool,
    pub bark_color: [f32; 3],
    pub leaf_color: [f32; 3],
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ring_segments: 8,
            path_steps: 6,
            leaf_size: 0.6,
            tip_radius_ratio: 0.55,
            junction_resolution: 24,
            isolation: 0.25,
            smooth_normals: true,
            junctions: true,
            foliage: true,
            bark_color: [0.42, 0.30, 0.20],
            leaf_color: [0.28, 0.55, 0.22],
        }
    }
}

/// Everything needed for one call to [`crate::pipeline::build`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub growth: GrowthConfig,
    pub mesh: MeshConfig,
    /// Scales every random jitter; `0.0` gives a fully regular tree.
    pub randomness: f32,
    /// Fixed seed for reproducible output. `None` draws a fresh one per build.
    pub seed: Option<u64>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            growth: GrowthConfig::default(),
            mesh: MeshConfig::default(),
            randomness: 1.0,
            seed: None,
        }
    }
}

impl TreeConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: TreeConfig = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Rejects values the geometry stages cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.growth;
        let m = &self.mesh;

        non_negative("growth.base_length", g.base_length)?;
        non_negative("growth.base_radius", g.base_radius)?;
        non_negative("mesh.leaf_size", m.leaf_size)?;
        non_negative("mesh.tip_radius_ratio", m.tip_radius_ratio)?;
        non_negative("randomness", self.randomness)?;

        if g.levels > MAX_LEVELS {
            return Err(ConfigError::invalid(
                "growth.levels",
                format!("at most {MAX_LEVELS}, got {}", g.levels),
            ));
        }
        let nodes = g.node_count();
        if nodes > MAX_NODES {
            return Err(ConfigError::invalid(
                "growth.child_count",
                format!(
                    "{} levels of {} children grow {nodes} branches, limit is {MAX_NODES}",
                    g.levels, g.child_count
                ),
            ));
        }
        if !g.branch_angle_deg.is_finite() {
            return Err(ConfigError::invalid("growth.branch_angle_deg", "must be finite"));
        }
        if m.ring_segments < 3 {
            return Err(ConfigError::invalid(
                "mesh.ring_segments",
                format!("need at least 3, got {}", m.ring_segments),
            ));
        }
        if m.path_steps == 0 {
            return Err(ConfigError::invalid("mesh.path_steps", "must be at least 1"));
        }
        if m.junction_resolution < 2 {
            return Err(ConfigError::invalid(
                "mesh.junction_resolution",
                format!("need at least 2, got {}", m.junction_resolution),
            ));
        }
        if !(m.isolation > 0.0 && m.isolation < 1.0) {
            return Err(ConfigError::invalid(
                "mesh.isolation",
                format!("must lie in (0, 1), got {}", m.isolation),
            ));
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be finite and >= 0, got {value}"),
        ))
    }
}
