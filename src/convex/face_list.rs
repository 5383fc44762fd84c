//! 2D convex-polygon list with polygon-vs-volume splitting (§4.2).
//!
//! Grounded on `original_source/.../utils/dedaiConvexFaceList.cpp`: a shared
//! vertex table plus a list of faces indexing into it, with
//! `split_by_convex_volume` clipping every face against every bounding
//! plane of a [`ConvexVolume`] and `optimise` cleaning up the cuts
//! afterwards.

use glam::Vec3;

use super::{ConvexVolume, Plane};

const DEGENERATE_EPSILON: f32 = 1e-3;
const COLINEAR_CROSS_THRESHOLD: f32 = 0.005;
const CONVEXITY_TOLERANCE: f32 = 0.005;

#[derive(Debug, Clone)]
pub struct ConvexFace {
    /// Indices into [`ConvexFaceList::vertices`], winding order preserved.
    pub indices: Vec<u32>,
    pub normal: Vec3,
    pub user_type: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConvexFaceList {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<ConvexFace>,
}

impl ConvexFaceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the list with a single face (§4.5 step i: "load F as a
    /// single-face ConvexFaceList with F's vertices and normal").
    pub fn from_single_face(vertices: Vec<Vec3>, normal: Vec3, user_type: u16) -> Self {
        let indices: Vec<u32> = (0..vertices.len() as u32).collect();
        ConvexFaceList { vertices, faces: vec![ConvexFace { indices, normal, user_type }] }
    }

    fn push_vertex(&mut self, v: Vec3) -> u32 {
        self.vertices.push(v);
        self.vertices.len() as u32 - 1
    }

    fn positions(&self, face: &ConvexFace) -> Vec<Vec3> {
        face.indices.iter().map(|&i| self.vertices[i as usize]).collect()
    }

    fn is_degenerate(positions: &[Vec3]) -> bool {
        if positions.len() < 3 {
            return true;
        }
        let centroid = positions.iter().fold(Vec3::ZERO, |a, &b| a + b) / positions.len() as f32;
        positions.iter().all(|&p| (p - centroid).length() < DEGENERATE_EPSILON)
    }

    /// Clips `positions` by `plane`, returning `(front, behind)` polygons.
    /// `front` is the side the (inward) normal points to; `behind` is the
    /// opposite side. Either may be empty. New vertices introduced at the
    /// cut are appended to `new_vertices` for the caller to register.
    fn clip_polygon(plane: &Plane, positions: &[Vec3]) -> (Vec<Vec3>, Vec<Vec3>) {
        let mut front = Vec::new();
        let mut behind = Vec::new();
        let n = positions.len();

        for i in 0..n {
            let cur = positions[i];
            let next = positions[(i + 1) % n];
            let d_cur = plane.signed_distance(cur);
            let d_next = plane.signed_distance(next);

            if d_cur >= 0.0 {
                front.push(cur);
            } else {
                behind.push(cur);
            }

            if (d_cur > 0.0 && d_next < 0.0) || (d_cur < 0.0 && d_next > 0.0) {
                let t = d_cur / (d_cur - d_next);
                let cut = cur.lerp(next, t);
                front.push(cut);
                behind.push(cut);
            }
        }

        (front, behind)
    }

    /// Splits every face by every bounding plane of `volume`. Pieces proven
    /// outside `volume` are kept; pieces that land fully inside (center
    /// strictly inside every plane) are removed.
    pub fn split_by_convex_volume(&mut self, volume: &ConvexVolume) {
        if volume.faces.is_empty() {
            return;
        }

        let original_faces = std::mem::take(&mut self.faces);

        for face in original_faces {
            let mut candidates = vec![self.positions(&face)];
            let mut kept: Vec<Vec<Vec3>> = Vec::new();

            for volume_face in &volume.faces {
                let mut next_candidates = Vec::new();
                for candidate in candidates {
                    let (front, behind) = Self::clip_polygon(&volume_face.plane, &candidate);
                    if !Self::is_degenerate(&behind) {
                        kept.push(behind);
                    }
                    if !Self::is_degenerate(&front) {
                        next_candidates.push(front);
                    }
                }
                candidates = next_candidates;
                if candidates.is_empty() {
                    break;
                }
            }

            // Remaining candidates survived being in front of every plane:
            // they are inside the volume unless their center falls exactly
            // on a boundary (kept conservatively in that case).
            for candidate in candidates {
                let centroid = candidate.iter().fold(Vec3::ZERO, |a, &b| a + b) / candidate.len().max(1) as f32;
                if !volume.contains_strictly(centroid, 0.0) {
                    kept.push(candidate);
                }
            }

            if kept.len() == 1 && positions_match(&kept[0], &self.positions(&face)) {
                // Unaffected - put the original face back untouched.
                self.faces.push(face);
                continue;
            }

            for piece in kept {
                let indices: Vec<u32> = piece.into_iter().map(|v| self.push_vertex(v)).collect();
                self.faces.push(ConvexFace { indices, normal: face.normal, user_type: face.user_type });
            }
        }
    }

    /// Collapses colinear vertex chains introduced by cutting and merges
    /// adjacent faces along edges whose removal leaves a convex face.
    /// `initial_vertex_count` marks the boundary below which vertices are
    /// original (never touched by colinear collapse). Iterates until no
    /// further simplification applies.
    pub fn optimise(&mut self, initial_vertex_count: usize) {
        loop {
            let collapsed = self.collapse_colinear_vertices(initial_vertex_count);
            let merged = self.merge_convex_neighbours();
            if !collapsed && !merged {
                break;
            }
        }
    }

    fn collapse_colinear_vertices(&mut self, initial_vertex_count: usize) -> bool {
        let mut changed = false;
        for face in &mut self.faces {
            loop {
                let n = face.indices.len();
                if n <= 3 {
                    break;
                }
                let mut removal = None;
                for k in 0..n {
                    let idx = face.indices[k];
                    if (idx as usize) < initial_vertex_count {
                        continue;
                    }
                    let prev = self.vertices[face.indices[(k + n - 1) % n] as usize];
                    let cur = self.vertices[idx as usize];
                    let next = self.vertices[face.indices[(k + 1) % n] as usize];
                    let d1 = (cur - prev).normalize_or_zero();
                    let d2 = (next - cur).normalize_or_zero();
                    if d1.cross(d2).length() < COLINEAR_CROSS_THRESHOLD {
                        removal = Some(k);
                        break;
                    }
                }
                match removal {
                    Some(k) => {
                        face.indices.remove(k);
                        changed = true;
                    }
                    None => break,
                }
            }
        }
        changed
    }

    fn merge_convex_neighbours(&mut self) -> bool {
        for a in 0..self.faces.len() {
            for b in (a + 1)..self.faces.len() {
                if let Some(merged) = self.try_merge(a, b) {
                    let user_type = self.faces[a].user_type;
                    let normal = self.faces[a].normal;
                    self.faces.remove(b);
                    self.faces.remove(a);
                    self.faces.push(ConvexFace { indices: merged, normal, user_type });
                    return true;
                }
            }
        }
        false
    }

    /// If faces `a` and `b` share exactly one edge (opposite winding) and
    /// splicing them together at that edge yields a convex polygon, returns
    /// the merged index loop.
    fn try_merge(&self, a: usize, b: usize) -> Option<Vec<u32>> {
        let fa = &self.faces[a];
        let fb = &self.faces[b];
        let na = fa.indices.len();
        let nb = fb.indices.len();

        for i in 0..na {
            let a0 = fa.indices[i];
            let a1 = fa.indices[(i + 1) % na];
            for j in 0..nb {
                let b0 = fb.indices[j];
                let b1 = fb.indices[(j + 1) % nb];
                if a0 != b1 || a1 != b0 {
                    continue;
                }

                // Walk all of face a starting right after the shared edge
                // (ending back at a0), then splice in face b's vertices
                // strictly between its two shared-edge endpoints - the
                // shared edge itself is dropped on both sides.
                let mut spliced = Vec::with_capacity(na + nb - 2);
                for k in 0..na {
                    spliced.push(fa.indices[(i + 1 + k) % na]);
                }
                for k in 0..nb.saturating_sub(2) {
                    spliced.push(fb.indices[(j + 2 + k) % nb]);
                }

                if Self::is_convex(&spliced, &self.vertices) {
                    return Some(spliced);
                }
            }
        }
        None
    }

    /// A polygon is convex if every corner turns the same way, i.e. the
    /// per-corner cross products all point the same direction.
    fn is_convex(indices: &[u32], vertices: &[Vec3]) -> bool {
        let n = indices.len();
        if n < 3 {
            return false;
        }
        let mut reference: Option<Vec3> = None;
        for k in 0..n {
            let prev = vertices[indices[(k + n - 1) % n] as usize];
            let cur = vertices[indices[k] as usize];
            let next = vertices[indices[(k + 1) % n] as usize];
            let cross = (cur - prev).cross(next - cur);
            if cross.length() < CONVEXITY_TOLERANCE {
                continue;
            }
            match reference {
                None => reference = Some(cross.normalize()),
                Some(r) => {
                    if cross.normalize().dot(r) < 0.0 {
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn positions_match(a: &[Vec3], b: &[Vec3]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.distance(*y) < 1e-5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convex::shape::{tessellate, Shape};

    #[test]
    fn split_by_non_overlapping_volume_is_noop() {
        let verts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let mut list = ConvexFaceList::from_single_face(verts, Vec3::Y, 0);
        let box_volume = tessellate(&Shape::Box { half_extents: Vec3::splat(0.1) }).unwrap();
        let far_away = box_volume.transformed(&glam::Affine3A::from_translation(Vec3::new(10.0, 0.0, 10.0)));

        list.split_by_convex_volume(&far_away);
        assert_eq!(list.faces.len(), 1);
        assert_eq!(list.faces[0].indices.len(), 4);
    }

    #[test]
    fn split_by_centered_volume_leaves_a_ring() {
        // A unit square with a small centered box blocker cut out of it.
        let verts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let mut list = ConvexFaceList::from_single_face(verts, Vec3::Y, 0);
        let box_volume = tessellate(&Shape::Box { half_extents: Vec3::new(0.25, 1.0, 0.25) }).unwrap();
        let centered = box_volume.transformed(&glam::Affine3A::from_translation(Vec3::new(0.5, 0.0, 0.5)));

        list.split_by_convex_volume(&centered);

        // No resulting vertex should lie strictly inside the blocker.
        for v in &list.vertices {
            assert!(!centered.contains_strictly(*v, 1e-4), "vertex {v:?} is inside the blocker");
        }
        assert!(list.faces.len() >= 4);
    }

    #[test]
    fn degenerate_faces_are_dropped() {
        let verts = vec![Vec3::ZERO, Vec3::new(1e-4, 0.0, 0.0), Vec3::new(0.0, 0.0, 1e-4)];
        assert!(ConvexFaceList::is_degenerate(&verts));
    }
}
