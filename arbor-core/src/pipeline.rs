//! Top-level generation routine.
//!
//! A build runs five stages in order, each consuming the previous output:
//! 1. [`growth_phase`] — grow the branch tree.
//! 2. [`segments::extract`] — flatten it into parent→child segments.
//! 3. [`tube_phase`] — sweep a tube for the trunk and every segment.
//! 4. [`junction_phase`] — blend every fork with an isosurface patch.
//! 5. [`foliage_phase`] — put a leaf on every unique tip.
//!
//! Nothing here returns an error. A missing geometry backend or extractor
//! only removes the affected sub-meshes; the counts end up in
//! [`BuildReport`] and a warning is logged.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, warn};

use crate::{
    blend,
    config::{GrowthConfig, MeshConfig, TreeConfig},
    foliage,
    growth,
    isosurface::IsosurfaceExtractor,
    mesh::{GeometryBackend, MeshBuffers, MeshGroup, MeshKind, smooth_normals},
    segments::{self, Segment},
    tree::Tree,
    tube::{self, BezierPath},
};

/// Sub-meshes produced and skipped by one build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub tubes: usize,
    pub tubes_skipped: usize,
    pub junctions: usize,
    pub junctions_skipped: usize,
    pub leaves: usize,
    pub leaves_skipped: usize,
}

impl BuildReport {
    /// `true` if any stage dropped output.
    pub fn degraded(&self) -> bool {
        self.tubes_skipped + self.junctions_skipped + self.leaves_skipped > 0
    }
}

/// Everything one build produces; owned by the caller.
#[derive(Clone, Debug)]
pub struct Generated {
    pub tree: Tree,
    pub segments: Vec<Segment>,
    pub meshes: MeshGroup,
    pub report: BuildReport,
    /// Seed actually used, so an unseeded build can be reproduced.
    pub seed: u64,
}

/// Runs the whole pipeline.
///
/// Uses `cfg.seed` when set, otherwise draws a fresh seed from the OS.
pub fn build(
    cfg: &TreeConfig,
    backend: &mut dyn GeometryBackend,
    extractor: &mut dyn IsosurfaceExtractor,
) -> Generated {
    let seed = cfg.seed.unwrap_or_else(|| StdRng::from_os_rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = build_with_rng(cfg, &mut rng, backend, extractor);
    out.seed = seed;
    out
}

/// Runs the whole pipeline with a caller-provided random source.
pub fn build_with_rng(
    cfg: &TreeConfig,
    rng: &mut impl Rng,
    backend: &mut dyn GeometryBackend,
    extractor: &mut dyn IsosurfaceExtractor,
) -> Generated {
    let tree = growth_phase(&cfg.growth, cfg.randomness, rng);
    let segments = segments::extract(&tree);

    let mut meshes = MeshGroup::default();
    let mut report = BuildReport::default();

    tube_phase(&tree, &segments, &cfg.mesh, backend, &mut meshes, &mut report);
    if cfg.mesh.junctions {
        junction_phase(&tree, &cfg.mesh, extractor, &mut meshes, &mut report);
    }
    if cfg.mesh.foliage {
        foliage_phase(&segments, &cfg.mesh, backend, rng, &mut meshes, &mut report);
    }

    debug!(
        nodes = tree.len(),
        segments = segments.len(),
        meshes = meshes.len(),
        triangles = meshes.triangle_count(),
        "tree built"
    );
    if report.degraded() {
        warn!(
            tubes_skipped = report.tubes_skipped,
            junctions_skipped = report.junctions_skipped,
            leaves_skipped = report.leaves_skipped,
            "tree built with missing geometry"
        );
    }

    Generated {
        tree,
        segments,
        meshes,
        report,
        seed: 0,
    }
}

/// Grows the branch tree from a vertical trunk at the origin.
pub fn growth_phase(cfg: &GrowthConfig, randomness: f32, rng: &mut impl Rng) -> Tree {
    let tree = growth::grow(cfg, randomness, rng);
    debug!(nodes = tree.len(), depth = tree.depth(), "growth phase done");
    tree
}

/// Sweeps the trunk and one tube per segment into `out`.
///
/// Terminal branches taper to `tip_radius_ratio` of their base radius;
/// inner branches taper to the mean radius of their children so the
/// tubes meet their continuations at matching thickness.
///
/// ### Parameters
/// - `tree` - Source of the trunk, which has no incoming segment.
/// - `segments` - Output of [`segments::extract`] for `tree`.
/// - `cfg` - Ring and path resolution, normal handling.
/// - `backend` - Buffer provider; tubes it refuses are counted as skipped.
/// - `out` - Receives one [`MeshKind::Tube`] per built tube.
/// - `report` - Tube counters are updated.
pub fn tube_phase(
    tree: &Tree,
    segments: &[Segment],
    cfg: &MeshConfig,
    backend: &mut dyn GeometryBackend,
    out: &mut MeshGroup,
    report: &mut BuildReport,
) {
    let root = tree.root();
    let trunk_tip = if root.is_leaf() {
        root.radius * cfg.tip_radius_ratio
    } else {
        segments
            .iter()
            .filter(|s| s.parent == Tree::ROOT)
            .map(|s| s.start_radius)
            .sum::<f32>()
            / root.children.len() as f32
    };
    let trunk = tube::sweep(
        &BezierPath::straight(root.origin, root.distal_end()),
        root.radius,
        trunk_tip,
        cfg.ring_segments,
        cfg.path_steps,
        backend,
    );
    push_tube(trunk, cfg, out, report);

    for seg in segments {
        let tip = if seg.terminal {
            seg.start_radius * cfg.tip_radius_ratio
        } else {
            seg.end_radius
        };
        let mesh = tube::synthesize(
            seg,
            seg.start_radius,
            tip,
            cfg.ring_segments,
            cfg.path_steps,
            backend,
        );
        push_tube(mesh, cfg, out, report);
    }

    if report.tubes_skipped > 0 {
        warn!(
            skipped = report.tubes_skipped,
            "geometry backend unavailable, tubes skipped"
        );
    }
}

fn push_tube(
    mesh: Option<MeshBuffers>,
    cfg: &MeshConfig,
    out: &mut MeshGroup,
    report: &mut BuildReport,
) {
    match mesh {
        Some(mut mesh) => {
            if cfg.smooth_normals {
                smooth_normals(&mut mesh);
            }
            out.push(MeshKind::Tube, mesh);
            report.tubes += 1;
        }
        None => report.tubes_skipped += 1,
    }
}

/// Blends every fork of the tree into `out`.
///
/// Only nodes with children are visited; a fork the extractor cannot
/// polygonize is counted as skipped and keeps its hard seam.
pub fn junction_phase(
    tree: &Tree,
    cfg: &MeshConfig,
    extractor: &mut dyn IsosurfaceExtractor,
    out: &mut MeshGroup,
    report: &mut BuildReport,
) {
    for id in tree.preorder() {
        if tree.node(id).is_leaf() {
            continue;
        }
        match blend::blend(tree, id, extractor) {
            Some(mut mesh) => {
                if cfg.smooth_normals {
                    smooth_normals(&mut mesh);
                }
                out.push(MeshKind::Junction, mesh);
                report.junctions += 1;
            }
            None => report.junctions_skipped += 1,
        }
    }

    if report.junctions_skipped > 0 {
        warn!(
            skipped = report.junctions_skipped,
            "isosurface extractor produced nothing, junctions left unblended"
        );
    }
}

/// Places one leaf quad on every unique branch tip.
pub fn foliage_phase(
    segments: &[Segment],
    cfg: &MeshConfig,
    backend: &mut dyn GeometryBackend,
    rng: &mut impl Rng,
    out: &mut MeshGroup,
    report: &mut BuildReport,
) {
    let leaves = foliage::placements(segments, rng);
    for leaf in &leaves {
        match foliage::leaf_quad(leaf, cfg.leaf_size, backend) {
            Some(mesh) => {
                out.push(MeshKind::Leaf, mesh);
                report.leaves += 1;
            }
            None => report.leaves_skipped += 1,
        }
    }

    if report.leaves_skipped > 0 {
        warn!(
            skipped = report.leaves_skipped,
            "geometry backend unavailable, leaves skipped"
        );
    }
}
