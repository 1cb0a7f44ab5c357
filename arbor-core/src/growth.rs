//! Recursive growth model.
//!
//! Starting from a trunk, every branch below `GrowthConfig::levels` spawns
//! `child_count` children. Each child's shape depends on how far up the
//! tree it sits (the *height fraction*):
//!
//! 1. Length and radius taper allometrically, about 20% and 30% from the
//!    lowest to the highest level.
//! 2. The elevation (angle away from the parent axis) is wide and drooping
//!    near the base, moderate in the middle and narrow near the canopy.
//! 3. Siblings are spread around the parent axis by the golden angle.
//! 4. An upward tropism pulls every child toward vertical, harder in the
//!    canopy, before the direction is renormalized.
//!
//! All jitter is scaled by a `randomness` factor; at `0.0` the output only
//! depends on the config.

use std::ops::Range;

use glam::{Quat, Vec3};
use rand::Rng;

use crate::{
    config::GrowthConfig,
    tree::{NodeId, Tree},
};

/// Phyllotactic spacing between siblings, in degrees.
pub const GOLDEN_ANGLE_DEG: f32 = 137.507_76;

const LENGTH_TAPER: f32 = 0.2;
const RADIUS_TAPER: f32 = 0.3;
const LENGTH_JITTER: f32 = 0.15;
const AZIMUTH_JITTER_DEG: f32 = 15.0;
const AXIS_JITTER: f32 = 0.1;

const BASE_TROPISM: f32 = 0.2;
const CANOPY_TROPISM: f32 = 0.4;

const LOW_BAND: f32 = 0.3;
const HIGH_BAND: f32 = 0.7;

/// Grows a full tree from a vertical trunk at the origin.
pub fn grow(cfg: &GrowthConfig, randomness: f32, rng: &mut impl Rng) -> Tree {
    let mut tree = Tree::new(Vec3::ZERO, Vec3::Y, cfg.base_length, cfg.base_radius);
    generate(cfg, &mut tree, Tree::ROOT, 0, randomness, rng);
    tree
}

/// Appends the whole subtree below `node`.
///
/// Branches are expanded from an explicit work stack, depth first, so the
/// call depth does not grow with `cfg.levels`. Nothing is added once
/// `level >= cfg.levels`, so the finished tree is never deeper than
/// `cfg.levels`.
///
/// ### Parameters
/// - `cfg` - Shape parameters shared by the whole tree.
/// - `tree` - Arena that receives the new branches.
/// - `node` - Branch whose children are generated.
/// - `level` - Depth of `node`.
/// - `randomness` - Jitter scale; `0.0` disables all variance.
/// - `rng` - Random source; seed it for reproducible trees.
pub fn generate(
    cfg: &GrowthConfig,
    tree: &mut Tree,
    node: NodeId,
    level: u32,
    randomness: f32,
    rng: &mut impl Rng,
) {
    let randomness = randomness.max(0.0);
    let mut stack = vec![(node, level)];

    while let Some((node, level)) = stack.pop() {
        if level >= cfg.levels {
            continue;
        }
        let first = tree.len();
        spawn_children(cfg, tree, node, level, randomness, rng);
        // Reverse so the first child is expanded first.
        stack.extend((first..tree.len()).rev().map(|c| (c, level + 1)));
    }
}

/// Adds `cfg.child_count` children to `node`, which sits at `level`.
fn spawn_children(
    cfg: &GrowthConfig,
    tree: &mut Tree,
    node: NodeId,
    level: u32,
    randomness: f32,
    rng: &mut impl Rng,
) {
    let h = height_fraction(level, cfg.levels);
    let parent_dir = tree.node(node).direction;
    let parent_radius = tree.node(node).radius;
    let to_parent = Quat::from_rotation_arc(Vec3::Y, parent_dir);

    for i in 0..cfg.child_count {
        let length = cfg.base_length
            * (1.0 - LENGTH_TAPER * h)
            * (1.0 + jitter(rng, randomness, LENGTH_JITTER));
        let radius = (cfg.base_radius * (1.0 - RADIUS_TAPER * h)).min(parent_radius);

        let elevation = pick(rng, randomness, elevation_range(h, cfg.angle_scale()));
        let azimuth = (GOLDEN_ANGLE_DEG * i as f32
            + jitter(rng, randomness, AZIMUTH_JITTER_DEG))
        .to_radians();

        let mut dir = to_parent * spherical(azimuth, elevation.to_radians());

        let tropism = if h > HIGH_BAND {
            CANOPY_TROPISM
        } else {
            BASE_TROPISM
        };
        dir += Vec3::Y * tropism;
        dir += Vec3::new(
            jitter(rng, randomness, AXIS_JITTER),
            jitter(rng, randomness, AXIS_JITTER),
            jitter(rng, randomness, AXIS_JITTER),
        );
        let dir = dir.normalize_or(parent_dir);

        tree.add_child(node, dir, length, radius);
    }
}

/// Position of `level` within the tree height, in `[0, 1]`.
pub fn height_fraction(level: u32, levels: u32) -> f32 {
    let span = levels.saturating_sub(1).max(1) as f32;
    (level as f32 / span).clamp(0.0, 1.0)
}

/// Elevation range in degrees for a given height fraction.
///
/// Low branches droop outward, canopy branches point upward.
pub fn elevation_range(h: f32, angle_scale: f32) -> Range<f32> {
    let (lo, hi) = if h < LOW_BAND {
        (110.0, 140.0)
    } else if h > HIGH_BAND {
        (40.0, 80.0)
    } else {
        (70.0, 110.0)
    };
    (lo * angle_scale).clamp(0.0, 180.0)..(hi * angle_scale).clamp(0.0, 180.0)
}

/// Unit vector `elevation` away from +Y, rotated `azimuth` around it.
fn spherical(azimuth: f32, elevation: f32) -> Vec3 {
    let (sin_e, cos_e) = elevation.sin_cos();
    let (sin_a, cos_a) = azimuth.sin_cos();
    Vec3::new(sin_e * cos_a, cos_e, sin_e * sin_a)
}

/// Symmetric noise in `[-amplitude, amplitude] * randomness`.
///
/// Draws nothing from `rng` when disabled, so a regular tree does not
/// consume the random stream.
fn jitter(rng: &mut impl Rng, randomness: f32, amplitude: f32) -> f32 {
    if randomness == 0.0 || amplitude == 0.0 {
        return 0.0;
    }
    rng.random_range(-1.0f32..=1.0) * amplitude * randomness
}

/// Picks a value from `range`; the midpoint when randomness is off.
fn pick(rng: &mut impl Rng, randomness: f32, range: Range<f32>) -> f32 {
    let mid = 0.5 * (range.start + range.end);
    if randomness == 0.0 {
        return mid;
    }
    let u: f32 = rng.random_range(0.0..=1.0);
    let sample = range.start + (range.end - range.start) * u;
    mid + (sample - mid) * randomness.min(1.0)
}
