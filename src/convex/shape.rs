//! Tessellation of primitive shapes into [`ConvexVolume`]s (§4.3).
//!
//! Grounded on the teacher's `convert_geometry` visitor over
//! `ColliderType` (`conversion.rs`): a match over shape variants producing
//! triangle/quad geometry. Unlike the teacher, shapes here come from
//! authored space/blocker data rather than physics colliders, so the
//! variant set is our own and the output is our own [`ConvexVolume`]
//! rather than a render trimesh.

use glam::Vec3;

use super::{ConvexVolume, ConvexVolumeFace, Plane};
use crate::error::{NavError, NavResult};

/// Shape variants a blocker or space can be built from. `Cylinder`,
/// `Capsule` and `Hull` are reserved per §4.3 ("others: reserved, may be
/// left unimplemented initially") and currently report
/// [`NavError::Unsupported`].
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    Sphere { radius: f32, rings: u32, segments: u32 },
    Box { half_extents: Vec3 },
    Cylinder { half_height: f32, radius: f32 },
    Capsule { half_height: f32, radius: f32 },
    Hull,
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Shape::Sphere { radius, rings: 9, segments: 20 }
    }
}

const MIN_RINGS: u32 = 2;
const MIN_SEGMENTS: u32 = 8;

/// Builds a face from vertices wound so that `(v1-v0) x (v2-v0)` points
/// *outward*; the stored plane normal is the inward-pointing counterpart
/// per [`super::Plane`]'s convention.
fn face_from_vertices(vertices: Vec<Vec3>) -> ConvexVolumeFace {
    let outward = (vertices[1] - vertices[0]).cross(vertices[2] - vertices[0]).normalize_or_zero();
    let normal = -outward;
    let plane = Plane::from_point_normal(vertices[0], normal);
    ConvexVolumeFace { vertices, plane }
}

/// Dispatches on `shape` and builds the corresponding convex volume, in
/// shape-local space (the caller transforms it into the owning blocker's
/// space via [`ConvexVolume::transformed`]).
pub fn tessellate(shape: &Shape) -> NavResult<ConvexVolume> {
    match *shape {
        Shape::Sphere { radius, rings, segments } => Ok(tessellate_sphere(radius, rings, segments)),
        Shape::Box { half_extents } => Ok(tessellate_box(half_extents)),
        Shape::Cylinder { .. } => Err(NavError::Unsupported("cylinder tessellation is reserved")),
        Shape::Capsule { .. } => Err(NavError::Unsupported("capsule tessellation is reserved")),
        Shape::Hull => Err(NavError::Unsupported("hull tessellation is reserved")),
    }
}

fn tessellate_box(half_extents: Vec3) -> ConvexVolume {
    let h = half_extents;
    let corner = |x: f32, y: f32, z: f32| Vec3::new(x * h.x, y * h.y, z * h.z);

    // 8 vertices, 6 quad faces, outward winding.
    let faces = [
        // -X, +X, -Y, +Y, -Z, +Z
        vec![corner(-1.0, -1.0, -1.0), corner(-1.0, -1.0, 1.0), corner(-1.0, 1.0, 1.0), corner(-1.0, 1.0, -1.0)],
        vec![corner(1.0, -1.0, 1.0), corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(1.0, 1.0, 1.0)],
        vec![corner(-1.0, -1.0, 1.0), corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, -1.0, 1.0)],
        vec![corner(-1.0, 1.0, -1.0), corner(-1.0, 1.0, 1.0), corner(1.0, 1.0, 1.0), corner(1.0, 1.0, -1.0)],
        vec![corner(1.0, -1.0, -1.0), corner(-1.0, -1.0, -1.0), corner(-1.0, 1.0, -1.0), corner(1.0, 1.0, -1.0)],
        vec![corner(-1.0, -1.0, 1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0)],
    ];

    ConvexVolume::from_faces(faces.into_iter().map(face_from_vertices).collect())
}

fn tessellate_sphere(radius: f32, rings: u32, segments: u32) -> ConvexVolume {
    let rings = rings.max(MIN_RINGS);
    let segments = segments.max(MIN_SEGMENTS);

    // Latitude rings from pole to pole; UV tessellation into quads, with
    // triangle fans at the poles.
    let mut ring_points: Vec<Vec<Vec3>> = Vec::with_capacity(rings as usize + 1);
    for r in 0..=rings {
        let theta = std::f32::consts::PI * r as f32 / rings as f32; // 0 (top) .. PI (bottom)
        let y = radius * theta.cos();
        let ring_radius = radius * theta.sin();
        let mut ring = Vec::with_capacity(segments as usize);
        for s in 0..segments {
            let phi = std::f32::consts::TAU * s as f32 / segments as f32;
            ring.push(Vec3::new(ring_radius * phi.cos(), y, ring_radius * phi.sin()));
        }
        ring_points.push(ring);
    }

    let mut faces = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let s_next = (s + 1) % segments;
            let top = &ring_points[r as usize];
            let bottom = &ring_points[r as usize + 1];

            if r == 0 {
                // Top cap: triangle fan degenerates to a triangle per segment.
                faces.push(face_from_vertices(vec![top[0], bottom[s as usize], bottom[s_next as usize]]));
            } else if r == rings - 1 {
                faces.push(face_from_vertices(vec![top[s as usize], bottom[0], top[s_next as usize]]));
            } else {
                faces.push(face_from_vertices(vec![
                    top[s as usize],
                    bottom[s as usize],
                    bottom[s_next as usize],
                    top[s_next as usize],
                ]));
            }
        }
    }

    ConvexVolume::from_faces(faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_has_six_quad_faces() {
        let volume = tessellate(&Shape::Box { half_extents: Vec3::splat(0.5) }).unwrap();
        assert_eq!(volume.faces.len(), 6);
        for face in &volume.faces {
            assert_eq!(face.vertices.len(), 4);
        }
    }

    #[test]
    fn sphere_minima_are_enforced() {
        let volume = tessellate(&Shape::Sphere { radius: 1.0, rings: 0, segments: 0 }).unwrap();
        // rings clamps to 2, segments clamps to 8 -> 2*8 = 16 faces.
        assert_eq!(volume.faces.len(), (MIN_RINGS * MIN_SEGMENTS) as usize);
    }

    #[test]
    fn reserved_shapes_are_unsupported() {
        assert!(matches!(tessellate(&Shape::Hull), Err(NavError::Unsupported(_))));
    }
}
