//! Tapered tube sweeping along cubic Bezier paths.
//!
//! Each branch becomes a closed tube: a ring of `ring_segments` vertices is
//! placed at `path_steps + 1` samples along a Bezier curve and consecutive
//! rings are stitched with two triangles per quad. The curve's inner control
//! points follow the parent and child directions, so tubes that meet at a
//! fork leave and arrive along matching tangents.

use std::f32::consts::TAU;

use glam::Vec3;

use crate::{
    mesh::{GeometryBackend, MeshBuffers},
    segments::Segment,
};

/// Fraction of the segment length used to offset the inner control points.
pub const HANDLE_FRACTION: f32 = 0.3;

/// Above this `|tangent · up|` the frame switches to the alternate axis.
pub const PARALLEL_LIMIT: f32 = 0.99;

const TANGENT_EPS: f32 = 1e-3;

/// Cubic Bezier control polygon `[P0, P1, P2, P3]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BezierPath {
    pub points: [Vec3; 4],
}

impl BezierPath {
    /// Curve from `start` to `end`, leaving along `start_dir` and arriving along `end_dir`.
    pub fn new(start: Vec3, end: Vec3, start_dir: Vec3, end_dir: Vec3) -> Self {
        let handle = start.distance(end) * HANDLE_FRACTION;
        Self {
            points: [
                start,
                start + start_dir * handle,
                end - end_dir * handle,
                end,
            ],
        }
    }

    pub fn from_segment(seg: &Segment) -> Self {
        Self::new(seg.start, seg.end, seg.start_dir, seg.end_dir)
    }

    pub fn straight(start: Vec3, end: Vec3) -> Self {
        let dir = (end - start).normalize_or_zero();
        Self::new(start, end, dir, dir)
    }

    /// Point on the curve at `t` in `[0, 1]`.
    pub fn eval(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    /// Unit tangent from a symmetric finite difference around `t`.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let a = self.eval((t - TANGENT_EPS).max(0.0));
        let b = self.eval((t + TANGENT_EPS).min(1.0));
        (b - a).normalize_or(Vec3::Y)
    }
}

/// Orthonormal `(right, up)` pair perpendicular to `tangent`.
///
/// Uses world +Y as reference unless the tangent is nearly vertical, in
/// which case +X is used so the cross product never collapses.
pub fn ring_frame(tangent: Vec3) -> (Vec3, Vec3) {
    let reference = if tangent.dot(Vec3::Y).abs() > PARALLEL_LIMIT {
        Vec3::X
    } else {
        Vec3::Y
    };
    let right = tangent.cross(reference).normalize();
    let up = right.cross(tangent);
    (right, up)
}

/// Eased taper: shrinks slowly near the base and faster toward the tip.
pub fn ring_radius(base: f32, tip: f32, t: f32) -> f32 {
    base * (1.0 - t).powf(0.7) + tip * t.powf(1.3)
}

/// Sweeps a tube for one branch segment.
///
/// Produces `ring_segments * (path_steps + 1)` vertices and
/// `2 * ring_segments * path_steps` triangles. Vertex normals are the unit
/// radial offsets, not the exact surface normals of the tapered tube.
///
/// Returns `None` when the backend cannot provide buffers.
pub fn synthesize(
    seg: &Segment,
    base_radius: f32,
    tip_radius: f32,
    ring_segments: u32,
    path_steps: u32,
    backend: &mut dyn GeometryBackend,
) -> Option<MeshBuffers> {
    sweep(
        &BezierPath::from_segment(seg),
        base_radius,
        tip_radius,
        ring_segments,
        path_steps,
        backend,
    )
}

/// Sweeps a tube along an arbitrary path; see [`synthesize`].
pub fn sweep(
    path: &BezierPath,
    base_radius: f32,
    tip_radius: f32,
    ring_segments: u32,
    path_steps: u32,
    backend: &mut dyn GeometryBackend,
) -> Option<MeshBuffers> {
    let s = ring_segments as usize;
    let p = path_steps as usize;
    let mut mesh = backend.build_buffers(s * (p + 1), 2 * s * p)?;

    for i in 0..=p {
        let t = if p == 0 { 0.0 } else { i as f32 / p as f32 };
        let center = path.eval(t);
        let (right, up) = ring_frame(path.tangent(t));
        let radius = ring_radius(base_radius, tip_radius, t);

        for j in 0..s {
            let (sin, cos) = (TAU * j as f32 / s as f32).sin_cos();
            let offset = right * cos + up * sin;
            mesh.add_vertex(center + offset * radius, offset);
        }
    }

    let s32 = ring_segments;
    for i in 0..path_steps {
        let row = i * s32;
        let next = row + s32;
        for j in 0..s32 {
            let k = (j + 1) % s32;
            let (a, b) = (row + j, row + k);
            let (c, d) = (next + j, next + k);
            mesh.add_triangle(a, c, b);
            mesh.add_triangle(b, c, d);
        }
    }

    Some(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BufferBackend, NullBackend};

    fn vertical_segment() -> Segment {
        Segment {
            start: Vec3::ZERO,
            end: Vec3::new(0.0, 4.0, 0.0),
            level: 1,
            start_dir: Vec3::Y,
            end_dir: Vec3::Y,
            start_radius: 0.5,
            end_radius: 0.2,
            parent: 0,
            child: 1,
            terminal: true,
        }
    }

    #[test]
    fn eight_by_four_tube_has_forty_vertices_and_sixty_four_triangles() {
        let mesh = synthesize(&vertical_segment(), 0.5, 0.2, 8, 4, &mut BufferBackend).unwrap();
        assert_eq!(mesh.vertex_count(), 40);
        assert_eq!(mesh.normals.len(), 40);
        assert_eq!(mesh.triangle_count(), 64);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < 40));
    }

    #[test]
    fn missing_backend_yields_none() {
        assert!(synthesize(&vertical_segment(), 0.5, 0.2, 8, 4, &mut NullBackend).is_none());
    }

    #[test]
    fn bezier_hits_both_endpoints() {
        let path = BezierPath::new(Vec3::ZERO, Vec3::new(2.0, 3.0, 1.0), Vec3::Y, Vec3::X);
        assert_eq!(path.eval(0.0), Vec3::ZERO);
        assert!(path.eval(1.0).distance(Vec3::new(2.0, 3.0, 1.0)) < 1e-6);
        assert!(path.tangent(0.0).distance(Vec3::Y) < 1e-2);
        assert!(path.tangent(1.0).distance(Vec3::X) < 1e-2);
    }

    #[test]
    fn frame_is_orthonormal_even_for_vertical_tangent() {
        for tangent in [Vec3::Y, Vec3::NEG_Y, Vec3::X, Vec3::new(1.0, 1.0, 0.0).normalize()] {
            let (right, up) = ring_frame(tangent);
            assert!((right.length() - 1.0).abs() < 1e-5);
            assert!((up.length() - 1.0).abs() < 1e-5);
            assert!(right.dot(up).abs() < 1e-5);
            assert!(right.dot(tangent).abs() < 1e-5);
            assert!(up.dot(tangent).abs() < 1e-5);
        }
    }

    #[test]
    fn radius_eases_from_base_to_tip() {
        assert_eq!(ring_radius(1.0, 0.25, 0.0), 1.0);
        assert_eq!(ring_radius(1.0, 0.25, 1.0), 0.25);
        let mid = ring_radius(1.0, 0.0, 0.5);
        assert!(mid > 0.5 && mid < 1.0);
    }

    #[test]
    fn ring_vertices_sit_at_interpolated_radius() {
        let mesh = synthesize(&vertical_segment(), 0.5, 0.2, 6, 2, &mut BufferBackend).unwrap();
        for ring in 0..3 {
            let t = ring as f32 / 2.0;
            let center = Vec3::new(0.0, 4.0 * t, 0.0);
            let r = ring_radius(0.5, 0.2, t);
            for j in 0..6 {
                let i = ring * 6 + j;
                let offset = mesh.position(i) - center;
                assert!((offset.length() - r).abs() < 1e-4);
                assert!(mesh.normal(i).distance(offset.normalize()) < 1e-4);
            }
        }
    }

    #[test]
    fn triangles_face_outward() {
        let mesh = synthesize(&vertical_segment(), 0.5, 0.5, 8, 3, &mut BufferBackend).unwrap();
        for tri in mesh.indices.chunks_exact(3) {
            let p0 = mesh.position(tri[0] as usize);
            let p1 = mesh.position(tri[1] as usize);
            let p2 = mesh.position(tri[2] as usize);
            let face = (p1 - p0).cross(p2 - p0);
            let centroid = (p0 + p1 + p2) / 3.0;
            let radial = Vec3::new(centroid.x, 0.0, centroid.z);
            assert!(face.dot(radial) > 0.0);
        }
    }
}
