//! Organic blending at forks.
//!
//! Tubes of a parent and its children meet at a single point and would show
//! hard seams there. For every branching node this module drops one metaball
//! on the parent's distal stub and one on each child's proximal stub, lets an
//! [`IsosurfaceExtractor`] polygonize the summed field, and maps the patch
//! back into world space.

use glam::{Affine3A, Quat, Vec3};
use tracing::trace;

use crate::{
    isosurface::IsosurfaceExtractor,
    mesh::MeshBuffers,
    tree::{NodeId, Tree},
};

/// How far a stub's ball sits from the joint, in multiples of its radius.
pub const STUB_OFFSET: f32 = 0.5;

/// Padding around every ball, in multiples of its radius.
pub const BOUNDS_PADDING: f32 = 2.0;

pub const BALL_STRENGTH: f32 = 1.0;

/// One ball of the junction field, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetaballDescriptor {
    pub center: Vec3,
    pub radius: f32,
    /// Axis of the stub the ball belongs to.
    pub direction: Vec3,
}

/// Balls for the fork at the distal end of `node`.
///
/// Empty when `node` has no children. Otherwise the first entry is the
/// parent stub, followed by one entry per child in child order.
pub fn metaballs(tree: &Tree, node: NodeId) -> Vec<MetaballDescriptor> {
    let parent = tree.node(node);
    if parent.is_leaf() {
        return Vec::new();
    }

    let joint = parent.distal_end();
    let children: Vec<_> = parent.children.iter().map(|&c| tree.node(c)).collect();
    // Matches the tip radius the parent tube tapers down to.
    let parent_radius =
        children.iter().map(|c| c.radius).sum::<f32>() / children.len() as f32;

    let mut balls = Vec::with_capacity(children.len() + 1);
    balls.push(MetaballDescriptor {
        center: joint - parent.direction * parent_radius * STUB_OFFSET,
        radius: parent_radius,
        direction: parent.direction,
    });
    balls.extend(children.iter().map(|c| MetaballDescriptor {
        center: c.origin + c.direction * c.radius * STUB_OFFSET,
        radius: c.radius,
        direction: c.direction,
    }));
    balls
}

/// Cube enclosing every ball plus [`BOUNDS_PADDING`], as `(min corner, edge)`.
///
/// Mapping into the unit cube uses one scale on all axes.
pub fn bounds(balls: &[MetaballDescriptor]) -> Option<(Vec3, f32)> {
    let first = balls.first()?;
    let pad = |b: &MetaballDescriptor| Vec3::splat(b.radius * BOUNDS_PADDING);
    let (lo, hi) = balls.iter().fold(
        (first.center - pad(first), first.center + pad(first)),
        |(lo, hi), b| (lo.min(b.center - pad(b)), hi.max(b.center + pad(b))),
    );
    let edge = (hi - lo).max_element();
    if edge <= 0.0 {
        return None;
    }
    let center = (lo + hi) * 0.5;
    Some((center - Vec3::splat(edge * 0.5), edge))
}

/// Builds the blended patch for the fork at the end of `node`.
///
/// Returns `None` for branch tips, degenerate forks, or when the extractor
/// produces no surface.
pub fn blend(
    tree: &Tree,
    node: NodeId,
    extractor: &mut dyn IsosurfaceExtractor,
) -> Option<MeshBuffers> {
    let balls = metaballs(tree, node);
    let (min, edge) = bounds(&balls)?;

    extractor.reset();
    for b in &balls {
        extractor.add_ball((b.center - min) / edge, b.radius / edge, BALL_STRENGTH);
    }

    let mut mesh = extractor.extract_isosurface()?;
    mesh.transform(Affine3A::from_scale_rotation_translation(
        Vec3::splat(edge),
        Quat::IDENTITY,
        min,
    ));
    trace!(
        node,
        balls = balls.len(),
        vertices = mesh.vertex_count(),
        "blended junction"
    );
    Some(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::GrowthConfig,
        growth,
        isosurface::{NullExtractor, SurfaceNets},
    };
    use rand::{SeedableRng, rngs::StdRng};

    /// Keeps every ball it is given and never produces a surface.
    #[derive(Default)]
    struct Recorder {
        resets: usize,
        balls: Vec<(Vec3, f32, f32)>,
    }

    impl IsosurfaceExtractor for Recorder {
        fn reset(&mut self) {
            self.resets += 1;
            self.balls.clear();
        }

        fn add_ball(&mut self, center: Vec3, radius: f32, strength: f32) {
            self.balls.push((center, radius, strength));
        }

        fn extract_isosurface(&mut self) -> Option<MeshBuffers> {
            None
        }
    }

    fn fork() -> Tree {
        let mut tree = Tree::new(Vec3::ZERO, Vec3::Y, 2.0, 0.4);
        tree.add_child(Tree::ROOT, Vec3::new(1.0, 1.0, 0.0), 1.5, 0.3);
        tree.add_child(Tree::ROOT, Vec3::new(-1.0, 1.0, 0.0), 1.5, 0.3);
        tree
    }

    #[test]
    fn leaf_has_no_metaballs() {
        let tree = fork();
        assert!(metaballs(&tree, 1).is_empty());
        assert!(blend(&tree, 1, &mut SurfaceNets::new(8, 0.25)).is_none());
    }

    #[test]
    fn fork_has_parent_ball_then_one_per_child() {
        let tree = fork();
        let balls = metaballs(&tree, Tree::ROOT);

        assert_eq!(balls.len(), 3);
        assert_eq!(balls[0].direction, Vec3::Y);
        assert!((balls[0].radius - 0.3).abs() < 1e-6);
        assert!(balls[0].center.y < 2.0);
        for (b, &c) in balls[1..].iter().zip(&tree.root().children) {
            assert_eq!(b.direction, tree.node(c).direction);
            assert!(b.center.y > 2.0);
        }
    }

    #[test]
    fn bounds_form_a_padded_cube() {
        let balls = metaballs(&fork(), Tree::ROOT);
        let (min, edge) = bounds(&balls).unwrap();
        let max = min + Vec3::splat(edge);

        for b in &balls {
            let pad = Vec3::splat(b.radius * BOUNDS_PADDING);
            assert!((b.center - pad).cmpge(min - 1e-5).all());
            assert!((b.center + pad).cmple(max + 1e-5).all());
        }
        assert!(bounds(&[]).is_none());
    }

    #[test]
    fn blended_patch_surrounds_the_joint() {
        let tree = fork();
        let mesh = blend(&tree, Tree::ROOT, &mut SurfaceNets::new(20, 0.25)).unwrap();
        assert!(mesh.triangle_count() > 0);

        let joint = tree.distal_end(Tree::ROOT);
        let (lo, hi) = mesh.bounds().unwrap();
        assert!(lo.cmple(joint).all() && hi.cmpge(joint).all());
        // The patch stays local to the fork.
        for i in 0..mesh.vertex_count() {
            assert!(mesh.position(i).distance(joint) < 1.0);
        }
    }

    #[test]
    fn missing_extractor_skips_the_junction() {
        assert!(blend(&fork(), Tree::ROOT, &mut NullExtractor).is_none());
    }

    #[test]
    fn balls_reach_the_extractor_inside_the_unit_cube() {
        let cfg = GrowthConfig {
            levels: 3,
            child_count: 3,
            ..GrowthConfig::default()
        };
        let tree = growth::grow(&cfg, 1.0, &mut StdRng::seed_from_u64(21));
        let mut recorder = Recorder::default();

        let mut forks = 0;
        for id in tree.preorder() {
            if tree.node(id).is_leaf() {
                continue;
            }
            forks += 1;
            assert!(blend(&tree, id, &mut recorder).is_none());
            assert_eq!(recorder.resets, forks);
            assert_eq!(recorder.balls.len(), tree.node(id).children.len() + 1);

            for &(center, radius, strength) in &recorder.balls {
                assert!(center.cmpge(Vec3::ZERO).all() && center.cmple(Vec3::ONE).all());
                assert!(radius > 0.0 && radius < 1.0);
                assert_eq!(strength, BALL_STRENGTH);
            }
        }
        assert_eq!(forks, 13);
    }
}
