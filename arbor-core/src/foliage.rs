use std::f32::consts::TAU;

use glam::{Affine3A, EulerRot, Quat, Vec3};
use rand::Rng;

use crate::{
    mesh::{GeometryBackend, MeshBuffers},
    segments::Segment,
};

/// Two tips closer than this on every axis share one leaf.
pub const TIP_TOLERANCE: f32 = 0.1;

/// Where a leaf goes and how it is turned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafPlacement {
    pub position: Vec3,
    pub orientation: Quat,
}

/// Per-axis proximity test; cheaper and slightly looser than a distance check.
#[inline]
pub fn same_tip(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().cmplt(Vec3::splat(TIP_TOLERANCE)).all()
}

/// Distinct branch tips, in segment order.
///
/// Only the ends of terminal segments count as tips; a tip that lies within
/// [`TIP_TOLERANCE`] of one already recorded is dropped.
pub fn unique_tips(segments: &[Segment]) -> Vec<Vec3> {
    let mut tips: Vec<Vec3> = Vec::new();
    for seg in segments.iter().filter(|s| s.terminal) {
        if !tips.iter().any(|&t| same_tip(t, seg.end)) {
            tips.push(seg.end);
        }
    }
    tips
}

/// One placement per unique tip, each with an independent random rotation.
pub fn placements(segments: &[Segment], rng: &mut impl Rng) -> Vec<LeafPlacement> {
    unique_tips(segments)
        .into_iter()
        .map(|position| LeafPlacement {
            position,
            orientation: Quat::from_euler(
                EulerRot::XYZ,
                rng.random_range(0.0..TAU),
                rng.random_range(0.0..TAU),
                rng.random_range(0.0..TAU),
            ),
        })
        .collect()
}

/// Flat `size × size` quad with its base edge centred on the placement.
pub fn leaf_quad(
    leaf: &LeafPlacement,
    size: f32,
    backend: &mut dyn GeometryBackend,
) -> Option<MeshBuffers> {
    let mut mesh = backend.build_buffers(4, 2)?;
    let half = size * 0.5;
    let corners = [
        Vec3::new(-half, 0.0, 0.0),
        Vec3::new(half, 0.0, 0.0),
        Vec3::new(half, size, 0.0),
        Vec3::new(-half, size, 0.0),
    ];
    for c in corners {
        mesh.add_vertex(c, Vec3::Z);
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);

    mesh.transform(Affine3A::from_rotation_translation(
        leaf.orientation,
        leaf.position,
    ));
    Some(mesh)
}

/// Builds leaf meshes for every unique tip.
///
/// Leaves the backend refuses are skipped; the result may be shorter than
/// the number of tips.
pub fn place_leaves(
    segments: &[Segment],
    leaf_size: f32,
    backend: &mut dyn GeometryBackend,
    rng: &mut impl Rng,
) -> Vec<MeshBuffers> {
    placements(segments, rng)
        .iter()
        .filter_map(|leaf| leaf_quad(leaf, leaf_size, backend))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BufferBackend, NullBackend};
    use rand::{SeedableRng, rngs::StdRng};

    fn tip_at(end: Vec3) -> Segment {
        Segment {
            start: end - Vec3::Y,
            end,
            level: 1,
            start_dir: Vec3::Y,
            end_dir: Vec3::Y,
            start_radius: 0.1,
            end_radius: 0.1,
            parent: 0,
            child: 1,
            terminal: true,
        }
    }

    #[test]
    fn close_tips_collapse_into_one() {
        let segs = [tip_at(Vec3::ZERO), tip_at(Vec3::new(0.05, 0.0, 0.0))];
        assert_eq!(unique_tips(&segs), vec![Vec3::ZERO]);
    }

    #[test]
    fn distant_tips_stay_separate() {
        let segs = [tip_at(Vec3::ZERO), tip_at(Vec3::new(0.2, 0.0, 0.0))];
        assert_eq!(unique_tips(&segs).len(), 2);
    }

    #[test]
    fn inner_segments_do_not_carry_leaves() {
        let mut inner = tip_at(Vec3::new(5.0, 5.0, 5.0));
        inner.terminal = false;
        assert!(unique_tips(&[inner]).is_empty());
    }

    #[test]
    fn kept_tips_respect_tolerance() {
        let segs: Vec<Segment> = (0..50)
            .map(|i| tip_at(Vec3::new(i as f32 * 0.03, (i % 3) as f32 * 0.04, 0.0)))
            .collect();
        let tips = unique_tips(&segs);
        for (i, a) in tips.iter().enumerate() {
            for b in &tips[i + 1..] {
                assert!(!same_tip(*a, *b));
            }
        }
    }

    #[test]
    fn leaf_quad_is_anchored_at_tip_and_sized() {
        let leaf = LeafPlacement {
            position: Vec3::new(1.0, 2.0, 3.0),
            orientation: Quat::from_rotation_y(1.0),
        };
        let mesh = leaf_quad(&leaf, 0.5, &mut BufferBackend).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        let base_mid = (mesh.position(0) + mesh.position(1)) * 0.5;
        assert!(base_mid.distance(leaf.position) < 1e-5);
        assert!((mesh.position(0).distance(mesh.position(1)) - 0.5).abs() < 1e-5);
        assert!((mesh.position(1).distance(mesh.position(2)) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn place_leaves_builds_one_quad_per_tip() {
        let segs = [
            tip_at(Vec3::ZERO),
            tip_at(Vec3::new(0.01, 0.0, 0.0)),
            tip_at(Vec3::new(3.0, 0.0, 0.0)),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(place_leaves(&segs, 0.4, &mut BufferBackend, &mut rng).len(), 2);
        assert!(place_leaves(&segs, 0.4, &mut NullBackend, &mut rng).is_empty());
    }
}
