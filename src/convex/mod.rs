//! Convex-volume primitives shared by blocker cutting (§4.2) and shape
//! tessellation (§4.3).

pub mod face_list;
pub mod shape;

use glam::Vec3;

/// A plane `{normal, dist}` such that `normal.dot(p) - dist` is the signed
/// distance from `p` to the plane. [`ConvexVolume`] planes point *inward*
/// (toward the volume's interior) so that "in front of every plane" means
/// "inside the volume" - this matches §4.2's wording of a split producing a
/// side "behind P" that is immediately known to be outside V, and a side
/// "in front" that remains a candidate to test against the rest of V's
/// planes.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Plane { normal, dist: normal.dot(point) }
    }

    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.dist
    }
}

/// Axis-aligned bounding box in a space's local coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Aabb3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Aabb3::EMPTY
    }
}

impl Aabb3 {
    pub const EMPTY: Aabb3 = Aabb3 { min: Vec3::splat(f32::INFINITY), max: Vec3::splat(f32::NEG_INFINITY) };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.grow(p);
        }
        aabb
    }

    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(self, other: Aabb3) -> Aabb3 {
        Aabb3 { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn expanded(&self, margin: f32) -> Aabb3 {
        Aabb3 { min: self.min - Vec3::splat(margin), max: self.max + Vec3::splat(margin) }
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x
            && p.y >= self.min.y && p.y <= self.max.y
            && p.z >= self.min.z && p.z <= self.max.z
    }
}

/// One planar face of a [`ConvexVolume`]: vertices in winding order plus the
/// precomputed supporting plane (normal derived from the first three
/// vertices, per §4.3).
#[derive(Debug, Clone)]
pub struct ConvexVolumeFace {
    pub vertices: Vec<Vec3>,
    pub plane: Plane,
}

/// A transformed convex-volume list: the unit of cutting in §4.2/§4.4/§4.5.
/// Produced either by [`shape::tessellate`] (from a blocker's shapes) or by
/// a Space's own blocker-shape list.
#[derive(Debug, Clone, Default)]
pub struct ConvexVolume {
    pub faces: Vec<ConvexVolumeFace>,
    pub aabb: Aabb3,
}

impl ConvexVolume {
    pub fn from_faces(faces: Vec<ConvexVolumeFace>) -> Self {
        let aabb = Aabb3::from_points(faces.iter().flat_map(|f| f.vertices.iter().copied()));
        ConvexVolume { faces, aabb }
    }

    /// True if `p` is strictly inside every bounding plane (conjunction of
    /// half-spaces), i.e. strictly inside the volume. Planes point inward,
    /// so "inside" is the positive side of every one of them.
    pub fn contains_strictly(&self, p: Vec3, epsilon: f32) -> bool {
        self.faces.iter().all(|f| f.plane.signed_distance(p) > epsilon)
    }

    pub fn transformed(&self, transform: &glam::Affine3A) -> ConvexVolume {
        let faces = self
            .faces
            .iter()
            .map(|f| {
                let vertices: Vec<Vec3> = f.vertices.iter().map(|&v| transform.transform_point3(v)).collect();
                let normal = transform.matrix3.inverse().transpose() * f.plane.normal;
                let normal = normal.normalize_or_zero();
                let dist = if vertices.is_empty() { 0.0 } else { normal.dot(vertices[0]) };
                ConvexVolumeFace { vertices, plane: Plane { normal, dist } }
            })
            .collect();
        ConvexVolume::from_faces(faces)
    }
}
