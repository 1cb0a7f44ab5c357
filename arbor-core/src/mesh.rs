//! Renderer-agnostic mesh containers and the geometry backend seam.
//!
//! Every stage that produces surface geometry asks a [`GeometryBackend`]
//! for an empty [`MeshBuffers`] first. A backend that cannot provide one
//! (see [`NullBackend`]) makes the stage skip its output instead of
//! failing, which leaves the caller with a partial [`MeshGroup`].

use glam::{Affine3A, Vec3};

/// Vertex positions, per-vertex normals and triangle indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Three indices per triangle, counter-clockwise when seen from outside.
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles * 3),
        }
    }

    /// Adds a vertex and returns its index.
    #[inline]
    pub fn add_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        index
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.extend_from_slice(&[i0, i1, i2]);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from(self.positions[i])
    }

    pub fn normal(&self, i: usize) -> Vec3 {
        Vec3::from(self.normals[i])
    }

    /// Applies a rigid or uniformly scaled transform to positions and normals.
    pub fn transform(&mut self, xf: Affine3A) {
        for p in &mut self.positions {
            *p = xf.transform_point3(Vec3::from(*p)).to_array();
        }
        for n in &mut self.normals {
            *n = xf
                .transform_vector3(Vec3::from(*n))
                .normalize_or_zero()
                .to_array();
        }
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from(*self.positions.first()?);
        Some(self.positions.iter().fold((first, first), |(lo, hi), p| {
            let p = Vec3::from(*p);
            (lo.min(p), hi.max(p))
        }))
    }

    /// Appends `other`, shifting its indices past the existing vertices.
    pub fn append(&mut self, other: &MeshBuffers) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }
}

/// Replaces vertex normals with the area-weighted average of the faces
/// around each vertex.
///
/// Vertices that touch no triangle keep their previous normal.
pub fn smooth_normals(mesh: &mut MeshBuffers) {
    let mut acc = vec![Vec3::ZERO; mesh.positions.len()];

    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = mesh.position(a);
        let p1 = mesh.position(b);
        let p2 = mesh.position(c);
        // Unnormalized cross product weights each face by its area.
        let face = (p1 - p0).cross(p2 - p0);
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }

    for (n, sum) in mesh.normals.iter_mut().zip(acc) {
        if sum.length_squared() > f32::EPSILON {
            *n = sum.normalize().to_array();
        }
    }
}

/// Supplies empty buffers for the stages to fill.
///
/// This is the injection point for whatever math or rendering layer hosts
/// the generator. Returning `None` signals that no backend is available.
pub trait GeometryBackend {
    /// Returns an empty buffer sized for the given counts, or `None`.
    fn build_buffers(&mut self, vertices: usize, triangles: usize) -> Option<MeshBuffers>;
}

/// Backend that always hands out plain preallocated [`MeshBuffers`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferBackend;

impl GeometryBackend for BufferBackend {
    fn build_buffers(&mut self, vertices: usize, triangles: usize) -> Option<MeshBuffers> {
        Some(MeshBuffers::with_capacity(vertices, triangles))
    }
}

/// Backend standing in for a missing geometry layer; never produces buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl GeometryBackend for NullBackend {
    fn build_buffers(&mut self, _vertices: usize, _triangles: usize) -> Option<MeshBuffers> {
        None
    }
}

/// What a sub-mesh represents, so renderers can pick a material for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeshKind {
    Tube,
    Junction,
    Leaf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubMesh {
    pub kind: MeshKind,
    pub mesh: MeshBuffers,
}

/// Ordered output of one generation call: tubes, then junctions, then leaves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGroup {
    pub meshes: Vec<SubMesh>,
}

impl MeshGroup {
    pub fn push(&mut self, kind: MeshKind, mesh: MeshBuffers) {
        self.meshes.push(SubMesh { kind, mesh });
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn iter_kind(&self, kind: MeshKind) -> impl Iterator<Item = &MeshBuffers> + '_ {
        self.meshes
            .iter()
            .filter(move |m| m.kind == kind)
            .map(|m| &m.mesh)
    }

    pub fn count(&self, kind: MeshKind) -> usize {
        self.iter_kind(kind).count()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.vertex_count()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.mesh.triangle_count()).sum()
    }

    /// Concatenates every sub-mesh into a single buffer.
    pub fn merged(&self) -> MeshBuffers {
        let mut out = MeshBuffers::with_capacity(self.vertex_count(), self.triangle_count());
        for m in &self.meshes {
            out.append(&m.mesh);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn quad() -> MeshBuffers {
        let mut m = MeshBuffers::default();
        let a = m.add_vertex(Vec3::new(0.0, 0.0, 0.0), Vec3::X);
        let b = m.add_vertex(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        let c = m.add_vertex(Vec3::new(1.0, 1.0, 0.0), Vec3::X);
        let d = m.add_vertex(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        m.add_triangle(a, b, c);
        m.add_triangle(a, c, d);
        m
    }

    #[test]
    fn add_vertex_returns_sequential_indices() {
        let m = quad();
        assert_eq!(m.vertex_count(), 4);
        assert_eq!(m.triangle_count(), 2);
        assert_eq!(m.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn smooth_normals_follow_face_orientation() {
        let mut m = quad();
        smooth_normals(&mut m);
        for i in 0..m.vertex_count() {
            assert!(m.normal(i).distance(Vec3::Z) < 1e-6);
        }
    }

    #[test]
    fn smooth_normals_leaves_unreferenced_vertices_alone() {
        let mut m = quad();
        let lone = m.add_vertex(Vec3::splat(5.0), Vec3::NEG_Y) as usize;
        smooth_normals(&mut m);
        assert_eq!(m.normal(lone), Vec3::NEG_Y);
    }

    #[test]
    fn transform_moves_points_and_rotates_normals() {
        let mut m = quad();
        let xf = Affine3A::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 0.0, 3.0),
        );
        m.transform(xf);

        assert!(m.position(1).distance(Vec3::new(0.0, 1.0, 3.0)) < 1e-6);
        assert!(m.normal(0).distance(Vec3::Y) < 1e-6);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        assert_eq!(MeshBuffers::default().bounds(), None);
        let (lo, hi) = quad().bounds().unwrap();
        assert_eq!(lo, Vec3::ZERO);
        assert_eq!(hi, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn merged_offsets_indices_of_later_meshes() {
        let mut group = MeshGroup::default();
        group.push(MeshKind::Tube, quad());
        group.push(MeshKind::Leaf, quad());

        let merged = group.merged();
        assert_eq!(merged.vertex_count(), 8);
        assert_eq!(merged.triangle_count(), 4);
        assert_eq!(&merged.indices[6..], &[4, 5, 6, 4, 6, 7]);
        assert_eq!(group.count(MeshKind::Leaf), 1);
        assert_eq!(group.count(MeshKind::Junction), 0);
    }

    #[test]
    fn null_backend_provides_nothing() {
        assert!(NullBackend.build_buffers(4, 2).is_none());
        assert!(BufferBackend.build_buffers(4, 2).unwrap().is_empty());
    }
}
