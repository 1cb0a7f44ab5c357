//! Metaball fields and isosurface extraction.
//!
//! The [`IsosurfaceExtractor`] trait is the seam used by the junction
//! blender. Balls are added in normalized `[0, 1]^3` coordinates and the
//! extracted mesh is returned in the same space.
//!
//! [`SurfaceNets`] is the bundled implementation: it samples the summed
//! field on a regular grid, places one vertex per cell that straddles the
//! threshold (the mean of its edge crossings) and connects the four cells
//! around every crossing edge with a quad.

use glam::{UVec3, Vec3};

use crate::mesh::MeshBuffers;

pub trait IsosurfaceExtractor {
    /// Removes every ball added so far.
    fn reset(&mut self);

    /// Adds a ball whose isolated surface has `radius`, in unit-cube coordinates.
    fn add_ball(&mut self, center: Vec3, radius: f32, strength: f32);

    /// Polygonizes the current field, or `None` if nothing crosses the threshold.
    fn extract_isosurface(&mut self) -> Option<MeshBuffers>;
}

/// Stand-in for a missing extractor; never produces a surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullExtractor;

impl IsosurfaceExtractor for NullExtractor {
    fn reset(&mut self) {}

    fn add_ball(&mut self, _center: Vec3, _radius: f32, _strength: f32) {}

    fn extract_isosurface(&mut self) -> Option<MeshBuffers> {
        None
    }
}

#[derive(Clone, Copy, Debug)]
struct Ball {
    center: Vec3,
    /// Distance at which the ball's contribution reaches zero.
    support: f32,
    strength: f32,
}

impl Ball {
    /// `strength * (1 - d²/R²)²` inside the support, zero outside.
    #[inline]
    fn value(&self, p: Vec3) -> f32 {
        let q = (p - self.center).length_squared() / (self.support * self.support);
        if q >= 1.0 {
            0.0
        } else {
            let k = 1.0 - q;
            self.strength * k * k
        }
    }

    #[inline]
    fn gradient(&self, p: Vec3) -> Vec3 {
        let r2 = self.support * self.support;
        let d = p - self.center;
        let q = d.length_squared() / r2;
        if q >= 1.0 {
            Vec3::ZERO
        } else {
            d * (-4.0 * self.strength * (1.0 - q) / r2)
        }
    }
}

/// Grid-based extractor over the unit cube.
#[derive(Clone, Debug)]
pub struct SurfaceNets {
    resolution: u32,
    isolation: f32,
    balls: Vec<Ball>,
}

impl SurfaceNets {
    /// ### Parameters
    /// - `resolution` - Cells per axis; clamped to at least 2.
    /// - `isolation` - Field value at which the surface is extracted.
    pub fn new(resolution: u32, isolation: f32) -> Self {
        Self {
            resolution: resolution.max(2),
            isolation,
            balls: Vec::with_capacity(8),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn ball_count(&self) -> usize {
        self.balls.len()
    }

    pub fn field(&self, p: Vec3) -> f32 {
        self.balls.iter().map(|b| b.value(p)).sum()
    }

    fn gradient(&self, p: Vec3) -> Vec3 {
        self.balls.iter().map(|b| b.gradient(p)).sum()
    }
}

impl IsosurfaceExtractor for SurfaceNets {
    fn reset(&mut self) {
        self.balls.clear();
    }

    fn add_ball(&mut self, center: Vec3, radius: f32, strength: f32) {
        if radius <= 0.0 || strength <= 0.0 {
            return;
        }
        // Pick the support so a lone ball crosses the threshold at `radius`.
        let falloff = 1.0 - (self.isolation / strength).sqrt();
        let support = if falloff > 0.0 {
            radius / falloff.sqrt()
        } else {
            radius
        };
        self.balls.push(Ball {
            center,
            support,
            strength,
        });
    }

    fn extract_isosurface(&mut self) -> Option<MeshBuffers> {
        if self.balls.is_empty() {
            return None;
        }

        let n = self.resolution;
        let cell = 1.0 / n as f32;
        let nodes = n + 1;
        let node_at = |p: UVec3| (p.x + nodes * (p.y + nodes * p.z)) as usize;
        let cell_at = |p: UVec3| (p.x + n * (p.y + n * p.z)) as usize;

        // Positive inside the surface.
        let mut samples = vec![0.0f32; (nodes * nodes * nodes) as usize];
        for z in 0..nodes {
            for y in 0..nodes {
                for x in 0..nodes {
                    let p = UVec3::new(x, y, z);
                    samples[node_at(p)] = self.field(p.as_vec3() * cell) - self.isolation;
                }
            }
        }

        let mut mesh = MeshBuffers::default();
        let mut cell_vertex = vec![u32::MAX; (n * n * n) as usize];

        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let base = UVec3::new(x, y, z);
                    let mut inside = 0;
                    let mut corners = [0.0f32; 8];
                    for (i, c) in corners.iter_mut().enumerate() {
                        *c = samples[node_at(base + corner(i))];
                        if *c > 0.0 {
                            inside += 1;
                        }
                    }
                    if inside == 0 || inside == 8 {
                        continue;
                    }

                    let mut sum = Vec3::ZERO;
                    let mut crossings = 0;
                    for (a, b) in CUBE_EDGES {
                        let (va, vb) = (corners[a], corners[b]);
                        if (va > 0.0) != (vb > 0.0) {
                            let t = va / (va - vb);
                            let pa = corner(a).as_vec3();
                            let pb = corner(b).as_vec3();
                            sum += pa + (pb - pa) * t;
                            crossings += 1;
                        }
                    }

                    let pos = (base.as_vec3() + sum / crossings as f32) * cell;
                    let normal = (-self.gradient(pos)).normalize_or(Vec3::Y);
                    cell_vertex[cell_at(base)] = mesh.add_vertex(pos, normal);
                }
            }
        }

        // One quad per grid edge whose endpoints straddle the threshold.
        for z in 0..nodes {
            for y in 0..nodes {
                for x in 0..nodes {
                    let p = UVec3::new(x, y, z);
                    let here = samples[node_at(p)] > 0.0;

                    for axis in 0..3 {
                        let u = (axis + 1) % 3;
                        let v = (axis + 2) % 3;
                        if p[axis] >= n || p[u] == 0 || p[v] == 0 || p[u] >= n || p[v] >= n {
                            continue;
                        }
                        let mut q = p;
                        q[axis] += 1;
                        let there = samples[node_at(q)] > 0.0;
                        if here == there {
                            continue;
                        }

                        let mut quad = [0u32; 4];
                        for (k, (du, dv)) in [(1, 1), (0, 1), (0, 0), (1, 0)].into_iter().enumerate() {
                            let mut c = p;
                            c[u] -= du;
                            c[v] -= dv;
                            quad[k] = cell_vertex[cell_at(c)];
                        }
                        if quad.contains(&u32::MAX) {
                            continue;
                        }

                        // Cells ordered counter-clockwise around +axis; flip when
                        // the inside lies on the far side of the edge.
                        if !here {
                            quad.reverse();
                        }
                        mesh.add_triangle(quad[0], quad[1], quad[2]);
                        mesh.add_triangle(quad[0], quad[2], quad[3]);
                    }
                }
            }
        }

        (!mesh.is_empty()).then_some(mesh)
    }
}

/// Offset of cube corner `i`, bit 0 = x, bit 1 = y, bit 2 = z.
#[inline]
fn corner(i: usize) -> UVec3 {
    UVec3::new((i & 1) as u32, ((i >> 1) & 1) as u32, ((i >> 2) & 1) as u32)
}

const CUBE_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];
