//! Authored navigation mesh: blocker cutting and cross-mesh linking (§3, §4.5).
//!
//! Grounded on `original_source/.../spaces/mesh/dedaiSpaceMesh{,Edge,Corner,
//! Face,Link}`. One deliberate departure from the source's memory layout:
//! each face there stores a `(first_corner, corner_count)` window into one
//! flat corner array, which forces an O(n^2) shift of every later face's
//! window whenever a corner is inserted mid-array (cross-mesh edge
//! splitting). Here each [`SpaceMeshFace`] owns a `Vec<u32>` of indices into
//! a shared corner pool instead - insertion is then a single push plus one
//! `Vec` insert local to the owning face, and no other face's indices move.
//! The corner pool itself still only grows by appends, so blocker-base /
//! link-base truncation (below) works the same way it would against a flat
//! array.

use glam::{Affine3A, Vec3};

use crate::convex::face_list::ConvexFaceList;
use crate::convex::ConvexVolume;
use crate::error::{NavError, NavResult};
use crate::ids::SpaceId;
use crate::space::grid::PathNodeState;

const POSITION_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
pub struct FacePathScratch {
    pub parent: Option<u32>,
    pub cost_f: f32,
    pub cost_g: f32,
    pub cost_h: f32,
    pub state: PathNodeState,
    /// CostTable index last used to reach this face; compared against the
    /// next face's type to decide whether a fix cost applies (§4.9).
    pub entry_type: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpaceMeshVertex {
    pub position: Vec3,
}

/// `edge` is the edge leading from this corner to the face's next corner.
#[derive(Debug, Clone, Copy)]
pub struct SpaceMeshCorner {
    pub vertex: u32,
    pub edge: u32,
    pub type_number: u32,
    pub link: Option<u32>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SpaceMeshEdge {
    pub vertex1: u32,
    pub vertex2: u32,
    pub face1: Option<u32>,
    pub face2: Option<u32>,
}

impl SpaceMeshEdge {
    fn matches(&self, v1: u32, v2: u32) -> bool {
        (self.vertex1 == v1 && self.vertex2 == v2) || (self.vertex1 == v2 && self.vertex2 == v1)
    }

    fn has_free_slot(&self) -> bool {
        self.face1.is_none() || self.face2.is_none()
    }

    pub fn is_boundary(&self) -> bool {
        self.face1.is_some() != self.face2.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SpaceMeshFace {
    pub corners: Vec<u32>,
    pub type_number: u32,
    pub center: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub min_extend: Vec3,
    pub max_extend: Vec3,
    pub enabled: bool,
    pub path: FacePathScratch,
}

#[derive(Debug, Clone, Copy)]
pub struct SpaceMeshLink {
    pub target_mesh: SpaceId,
    pub face: u32,
    pub corner: u32,
    pub transform: Affine3A,
}

/// One face to build the mesh from: vertex indices (into the shared vertex
/// table passed to [`SpaceMesh::build`]) paired with an already
/// CostTable-translated type number, in winding order.
pub struct BuildFace {
    pub corners: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    vertices: u32,
    edges: u32,
    corners: u32,
    faces: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SpaceMesh {
    pub vertices: Vec<SpaceMeshVertex>,
    pub edges: Vec<SpaceMeshEdge>,
    pub corners: Vec<SpaceMeshCorner>,
    pub faces: Vec<SpaceMeshFace>,
    pub links: Vec<SpaceMeshLink>,

    static_counts: Counts,
    /// Counts right after the static build, before any blocker cut.
    blocker_base: Counts,
    /// Counts right after the last blocker cut, before cross-mesh linking.
    link_base: Counts,
}

impl SpaceMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(vertices: Vec<Vec3>, faces: Vec<BuildFace>) -> NavResult<Self> {
        let mut mesh = SpaceMesh {
            vertices: vertices.into_iter().map(|position| SpaceMeshVertex { position }).collect(),
            ..Default::default()
        };

        for face in faces {
            let positions: Vec<Vec3> = face.corners.iter().map(|&(v, _)| mesh.vertices[v as usize].position).collect();
            let types: Vec<u32> = face.corners.iter().map(|&(_, t)| t).collect();
            mesh.append_face(&positions, &types)?;
        }

        let counts = mesh.current_counts();
        mesh.static_counts = counts;
        mesh.blocker_base = counts;
        mesh.link_base = counts;
        Ok(mesh)
    }

    fn current_counts(&self) -> Counts {
        Counts {
            vertices: self.vertices.len() as u32,
            edges: self.edges.len() as u32,
            corners: self.corners.len() as u32,
            faces: self.faces.len() as u32,
        }
    }

    fn truncate_to(&mut self, counts: Counts) {
        self.vertices.truncate(counts.vertices as usize);
        self.edges.truncate(counts.edges as usize);
        self.corners.truncate(counts.corners as usize);
        self.faces.truncate(counts.faces as usize);
        for edge in &mut self.edges {
            if edge.face1.is_some_and(|f| f >= counts.faces) {
                edge.face1 = None;
            }
            if edge.face2.is_some_and(|f| f >= counts.faces) {
                edge.face2 = None;
            }
        }
    }

    fn find_or_add_vertex(&mut self, position: Vec3) -> u32 {
        if let Some(i) = self.vertices.iter().position(|v| v.position.distance(position) < POSITION_EPSILON) {
            return i as u32;
        }
        self.vertices.push(SpaceMeshVertex { position });
        self.vertices.len() as u32 - 1
    }

    fn find_or_add_edge(&mut self, v1: u32, v2: u32) -> u32 {
        if let Some(i) = self.edges.iter().position(|e| e.matches(v1, v2) && e.has_free_slot()) {
            return i as u32;
        }
        self.edges.push(SpaceMeshEdge { vertex1: v1, vertex2: v2, face1: None, face2: None });
        self.edges.len() as u32 - 1
    }

    fn claim_edge_slot(&mut self, edge: u32, face: u32) -> NavResult<()> {
        let e = &mut self.edges[edge as usize];
        if e.face1.is_none() {
            e.face1 = Some(face);
        } else if e.face2.is_none() {
            e.face2 = Some(face);
        } else {
            return Err(NavError::InvariantViolation(format!("edge {edge} claimed by a third face")));
        }
        Ok(())
    }

    /// Appends a new face built from `positions`/`types` (parallel, winding
    /// order), creating or reusing vertices and edges by position identity.
    fn append_face(&mut self, positions: &[Vec3], types: &[u32]) -> NavResult<u32> {
        let face_index = self.faces.len() as u32;
        let n = positions.len();
        let mut corner_indices = Vec::with_capacity(n);

        let vertex_indices: Vec<u32> = positions.iter().map(|&p| self.find_or_add_vertex(p)).collect();

        for i in 0..n {
            let v_cur = vertex_indices[i];
            let v_next = vertex_indices[(i + 1) % n];
            let edge = self.find_or_add_edge(v_cur, v_next);
            self.claim_edge_slot(edge, face_index)?;
            self.corners.push(SpaceMeshCorner { vertex: v_cur, edge, type_number: types[i], link: None, enabled: true });
            corner_indices.push(self.corners.len() as u32 - 1);
        }

        let face = build_face_geometry(corner_indices, types[0], &self.vertices, &self.corners);
        self.faces.push(face);
        Ok(face_index)
    }

    fn index_of_corner_with_edge(&self, face: u32, edge: u32) -> Option<usize> {
        self.faces[face as usize].corners.iter().position(|&c| self.corners[c as usize].edge == edge)
    }

    /// Truncates to the blocker base, then re-cuts every statically-built
    /// face against `splitters` (§4.5 "Blocker cutting").
    pub fn update_blocking(&mut self, splitters: &[ConvexVolume]) -> NavResult<()> {
        self.truncate_to(self.blocker_base);

        for static_face in 0..self.static_counts.faces {
            let face = &self.faces[static_face as usize];
            let original_positions: Vec<Vec3> =
                face.corners.iter().map(|&c| self.vertices[self.corners[c as usize].vertex as usize].position).collect();
            let type_number = face.type_number;
            let normal = face.normal;
            let initial_vertex_count = original_positions.len();

            let mut list = ConvexFaceList::from_single_face(original_positions.clone(), normal, 0);
            for splitter in splitters {
                if !splitter.aabb.overlaps(&face_aabb(face)) {
                    continue;
                }
                list.split_by_convex_volume(splitter);
            }
            list.optimise(initial_vertex_count);

            let unaffected = list.faces.len() == 1
                && positions_match_unordered(&list.vertices, &list.faces[0].indices, &original_positions);
            if unaffected {
                continue;
            }

            self.disable_face(static_face);

            for cut_face in &list.faces {
                let positions: Vec<Vec3> = cut_face.indices.iter().map(|&i| list.vertices[i as usize]).collect();
                if positions.len() < 3 {
                    continue;
                }
                let types = vec![type_number; positions.len()];
                self.append_face(&positions, &types)?;
            }
        }

        self.link_base = self.current_counts();
        Ok(())
    }

    fn disable_face(&mut self, face_index: u32) {
        let corner_indices = self.faces[face_index as usize].corners.clone();
        for c in corner_indices {
            let corner = &mut self.corners[c as usize];
            corner.enabled = false;
            let edge = corner.edge;
            let e = &mut self.edges[edge as usize];
            if e.face1 == Some(face_index) {
                e.face1 = None;
            }
            if e.face2 == Some(face_index) {
                e.face2 = None;
            }
        }
        self.faces[face_index as usize].enabled = false;
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = u32> + '_ {
        self.edges.iter().enumerate().filter_map(|(i, e)| {
            let owner = e.face1.or(e.face2)?;
            (e.is_boundary() && self.faces[owner as usize].enabled).then_some(i as u32)
        })
    }

    fn edge_owning_face(&self, edge: u32) -> u32 {
        let e = &self.edges[edge as usize];
        e.face1.or(e.face2).expect("boundary edge has an owning face")
    }

    /// Splits `edge` at parametric position `t` (0..1 from vertex1 to
    /// vertex2), inserting one new vertex/edge/corner. Only legal on a
    /// single-face (boundary) edge. Returns the new vertex index.
    fn split_edge(&mut self, edge: u32, t: f32) -> u32 {
        let e = self.edges[edge as usize];
        let p1 = self.vertices[e.vertex1 as usize].position;
        let p2 = self.vertices[e.vertex2 as usize].position;
        let split_pos = p1.lerp(p2, t);
        let new_vertex = self.find_or_add_vertex(split_pos);

        let owner = self.edge_owning_face(edge);
        let corner_pos = self.index_of_corner_with_edge(owner, edge).expect("edge belongs to its owning face");

        // Original edge now runs vertex1 -> new_vertex; new edge covers
        // new_vertex -> vertex2, inheriting the same single-face ownership.
        self.edges[edge as usize].vertex2 = new_vertex;
        let new_edge_index = self.edges.len() as u32;
        self.edges.push(SpaceMeshEdge { vertex1: new_vertex, vertex2: e.vertex2, face1: Some(owner), face2: None });

        let new_corner_type = self.corners[self.faces[owner as usize].corners[corner_pos] as usize].type_number;
        self.corners.push(SpaceMeshCorner { vertex: new_vertex, edge: new_edge_index, type_number: new_corner_type, link: None, enabled: true });
        let new_corner_index = self.corners.len() as u32 - 1;

        self.faces[owner as usize].corners.insert(corner_pos + 1, new_corner_index);
        new_vertex
    }

    /// Rebuilds cross-mesh links against `targets`. `self_space` names the
    /// id this mesh is reached through so targets can record the reverse
    /// link. Truncates back to the link base first, undoing any edges
    /// split by a previous call.
    pub fn link_to_other_meshes(
        &mut self,
        self_space: SpaceId,
        snap_distance: f32,
        max_snap_angle_cos: f32,
        targets: &mut [(SpaceId, &mut SpaceMesh, Affine3A, f32)],
    ) {
        self.truncate_to(self.link_base);
        self.links.clear();
        for (_, target, _, _) in targets.iter_mut() {
            target.truncate_to(target.link_base);
        }

        for &mut (target_space, ref mut target, self_to_target, target_snap_distance) in targets.iter_mut() {
            let snap = snap_distance.max(target_snap_distance);
            let mut self_cursor = 0;
            'retry_self: loop {
                let self_boundary: Vec<u32> = self.boundary_edges().skip(self_cursor).collect();
                for edge in self_boundary {
                    let target_boundary: Vec<u32> = target.boundary_edges().collect();
                    for target_edge in target_boundary {
                        if try_link_edge_pair(
                            self,
                            edge,
                            target,
                            target_edge,
                            self_space,
                            target_space,
                            self_to_target,
                            snap,
                            max_snap_angle_cos,
                        ) {
                            continue 'retry_self;
                        }
                    }
                    self_cursor += 1;
                }
                break;
            }
        }
    }

    pub fn face_closest_to(&self, p: Vec3) -> Option<u32> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.enabled)
            .map(|(i, f)| (i as u32, f.center.distance_squared(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Projects `p` onto each enabled face's plane, clips the projection
    /// into the face by its edge half-spaces, and returns the nearest
    /// clipped point within `radius`.
    pub fn nearest_point(&self, p: Vec3, radius: f32) -> Option<(Vec3, f32, u32)> {
        let mut best: Option<(Vec3, f32, u32)> = None;
        let mut best_dist = radius;

        for (fi, face) in self.faces.iter().enumerate() {
            if !face.enabled {
                continue;
            }
            let plane_dist = face.normal.dot(p) - face.distance;
            let projected = p - face.normal * plane_dist;
            let clipped = self.clip_into_face(fi as u32, projected);
            let dist = clipped.distance(projected) + plane_dist.abs();
            if dist < best_dist {
                best_dist = dist;
                best = Some((clipped, dist, fi as u32));
            }
        }

        best
    }

    fn clip_into_face(&self, face: u32, mut point: Vec3) -> Vec3 {
        let face_data = &self.faces[face as usize];
        let n = face_data.corners.len();
        for i in 0..n {
            let v0 = self.corners[face_data.corners[i] as usize].vertex;
            let v1 = self.corners[face_data.corners[(i + 1) % n] as usize].vertex;
            let p0 = self.vertices[v0 as usize].position;
            let p1 = self.vertices[v1 as usize].position;
            let edge_dir = (p1 - p0).normalize_or_zero();
            let in_plane_normal = face_data.normal.cross(edge_dir);
            let dist = in_plane_normal.dot(point - p0);
            if dist < 0.0 {
                point -= in_plane_normal * dist;
            }
        }
        point
    }

    /// Walks the ray from `origin` through consecutive faces, returning the
    /// fraction of `direction`'s length at which a true boundary is hit, or
    /// `None` if the ray exits the mesh into open space / terminates inside
    /// a face with no exit. A boundary edge whose corner carries a link
    /// continues into the linked mesh via `lookup`, transformed through the
    /// link's stored `self_to_target` affine, rather than terminating.
    pub fn nav_mesh_line_collide<'a>(&'a self, origin: Vec3, direction: Vec3, lookup: &dyn Fn(SpaceId) -> Option<&'a SpaceMesh>) -> Option<f32> {
        let length = direction.length();
        if length <= f32::EPSILON {
            return None;
        }

        let mut current = self;
        let mut local_origin = origin;
        let mut local_dir_n = direction / length;
        let mut segment_start = 0.0f32;
        let mut local_traveled = 0.0f32;
        let mut face = current.face_closest_to(local_origin)?;

        loop {
            let face_data = &current.faces[face as usize];
            let ray_plane_normal = face_data.normal.cross(local_dir_n);
            let n = face_data.corners.len();
            let mut exit: Option<(u32, f32)> = None;

            for i in 0..n {
                let v0 = current.corners[face_data.corners[i] as usize].vertex;
                let v1 = current.corners[face_data.corners[(i + 1) % n] as usize].vertex;
                let p0 = current.vertices[v0 as usize].position;
                let p1 = current.vertices[v1 as usize].position;
                let d0 = ray_plane_normal.dot(p0 - local_origin);
                let d1 = ray_plane_normal.dot(p1 - local_origin);
                if (d0 > 0.0) == (d1 > 0.0) {
                    continue;
                }
                let t = d0 / (d0 - d1);
                let hit = p0.lerp(p1, t);
                let along = (hit - local_origin).dot(local_dir_n);
                if along <= local_traveled + 1e-6 {
                    continue;
                }
                exit = Some((face_data.corners[i], along));
                break;
            }

            let Some((corner_index, along)) = exit else {
                return None;
            };
            if segment_start + along > length {
                return None;
            }

            let corner = &current.corners[corner_index as usize];
            let edge = &current.edges[corner.edge as usize];
            let other_face = if edge.face1 == Some(face) { edge.face2 } else { edge.face1 };

            if let Some(next) = other_face {
                face = next;
                local_traveled = along;
                continue;
            }

            let Some(link) = corner.link.and_then(|l| current.links.get(l as usize)) else {
                return Some((segment_start + along) / length);
            };
            let Some(target) = lookup(link.target_mesh) else {
                return Some((segment_start + along) / length);
            };

            let hit_point = local_origin + local_dir_n * along;
            segment_start += along;
            local_origin = link.transform.transform_point3(hit_point);
            local_dir_n = link.transform.matrix3.mul_vec3(local_dir_n).normalize_or_zero();
            local_traveled = 0.0;
            face = link.face;
            current = target;
        }
    }

    /// Checks every invariant from the data model against the mesh's
    /// current state. Grounded on the original's `pVerifyInvariants`
    /// (`dedaiSpaceMesh.cpp`): debug-only, run after a build, cut or link
    /// step, failing on the first violation found with a full mesh dump
    /// attached. `self_space` is this mesh's own id, needed to check link
    /// reciprocity against `lookup`'s sibling meshes.
    #[cfg(debug_assertions)]
    pub fn verify_invariants<'a>(&self, self_space: SpaceId, lookup: &dyn Fn(SpaceId) -> Option<&'a SpaceMesh>) -> NavResult<()> {
        self.verify_unique_vertices()?;
        self.verify_unique_edges()?;
        self.verify_edge_face_slots()?;
        self.verify_corner_enablement()?;
        self.verify_corner_edges()?;
        self.verify_face_corner_loops()?;
        self.verify_disjoint_face_corners()?;
        self.verify_links(self_space, lookup)?;
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn invariant_violation(&self, reason: String) -> NavError {
        tracing::error!(%reason, "nav-mesh invariant violated");
        NavError::InvariantViolation(format!("{reason}\n{}", self.dump()))
    }

    #[cfg(debug_assertions)]
    fn verify_unique_vertices(&self) -> NavResult<()> {
        for i in 0..self.vertices.len() {
            for j in (i + 1)..self.vertices.len() {
                if self.vertices[i].position.distance(self.vertices[j].position) < POSITION_EPSILON {
                    return Err(self.invariant_violation(format!("vertices {i} and {j} coincide")));
                }
            }
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn verify_unique_edges(&self) -> NavResult<()> {
        for i in 0..self.edges.len() {
            for j in (i + 1)..self.edges.len() {
                if self.edges[i].matches(self.edges[j].vertex1, self.edges[j].vertex2) {
                    return Err(self.invariant_violation(format!("edges {i} and {j} share a vertex pair")));
                }
            }
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn verify_edge_face_slots(&self) -> NavResult<()> {
        for (i, edge) in self.edges.iter().enumerate() {
            for face in [edge.face1, edge.face2].into_iter().flatten() {
                if !self.faces[face as usize].enabled {
                    return Err(self.invariant_violation(format!("edge {i} references disabled face {face}")));
                }
            }
        }
        Ok(())
    }

    /// A corner belongs to exactly one enabled face iff the corner itself is
    /// enabled (spec invariant b).
    #[cfg(debug_assertions)]
    fn verify_corner_enablement(&self) -> NavResult<()> {
        let mut owned = vec![false; self.corners.len()];
        for face in self.faces.iter().filter(|f| f.enabled) {
            for &c in &face.corners {
                owned[c as usize] = true;
            }
        }
        for (i, corner) in self.corners.iter().enumerate() {
            if corner.enabled != owned[i] {
                return Err(self.invariant_violation(format!(
                    "corner {i} enabled={} but owned by an enabled face={}",
                    corner.enabled, owned[i]
                )));
            }
        }
        Ok(())
    }

    /// The edge stored in a corner has one endpoint at that corner's own
    /// vertex (spec invariant f).
    #[cfg(debug_assertions)]
    fn verify_corner_edges(&self) -> NavResult<()> {
        for (i, corner) in self.corners.iter().enumerate() {
            let edge = &self.edges[corner.edge as usize];
            if edge.vertex1 != corner.vertex && edge.vertex2 != corner.vertex {
                return Err(self.invariant_violation(format!("corner {i}'s edge {} has no endpoint at its own vertex", corner.edge)));
            }
        }
        Ok(())
    }

    /// Per enabled face, consecutive corners' edges lead into the next
    /// corner's vertex (spec invariant c).
    #[cfg(debug_assertions)]
    fn verify_face_corner_loops(&self) -> NavResult<()> {
        for (fi, face) in self.faces.iter().enumerate() {
            if !face.enabled {
                continue;
            }
            let n = face.corners.len();
            for i in 0..n {
                let cur = &self.corners[face.corners[i] as usize];
                let next = &self.corners[face.corners[(i + 1) % n] as usize];
                let edge = &self.edges[cur.edge as usize];
                if !edge.matches(cur.vertex, next.vertex) {
                    return Err(self.invariant_violation(format!("face {fi} corner {i}'s edge does not lead to the next corner's vertex")));
                }
            }
        }
        Ok(())
    }

    /// No two enabled faces share a corner-pool index - the adapted form of
    /// "no two faces overlap in their corner-range windows" (spec invariant
    /// d) for the per-face owned-`Vec<u32>` corner model documented at the
    /// top of this module.
    #[cfg(debug_assertions)]
    fn verify_disjoint_face_corners(&self) -> NavResult<()> {
        let mut owner: Vec<Option<u32>> = vec![None; self.corners.len()];
        for (fi, face) in self.faces.iter().enumerate() {
            if !face.enabled {
                continue;
            }
            for &c in &face.corners {
                if let Some(prev) = owner[c as usize] {
                    return Err(self.invariant_violation(format!("corner {c} claimed by faces {prev} and {fi}")));
                }
                owner[c as usize] = Some(fi as u32);
            }
        }
        Ok(())
    }

    /// If corner `c` has a link, the linked mesh's corresponding link points
    /// back at this mesh/face/corner (spec invariant e). Targets on meshes
    /// `lookup` can't resolve are skipped rather than failed, since the
    /// sibling may simply not be reachable from this single-mesh check.
    #[cfg(debug_assertions)]
    fn verify_links<'a>(&self, self_space: SpaceId, lookup: &dyn Fn(SpaceId) -> Option<&'a SpaceMesh>) -> NavResult<()> {
        for (fi, face) in self.faces.iter().enumerate() {
            if !face.enabled {
                continue;
            }
            for &c in &face.corners {
                let corner = &self.corners[c as usize];
                let Some(link_index) = corner.link else { continue };
                let Some(link) = self.links.get(link_index as usize) else {
                    return Err(self.invariant_violation(format!("corner {c} points at missing link {link_index}")));
                };
                let Some(target) = lookup(link.target_mesh) else { continue };
                let Some(target_face) = target.faces.get(link.face as usize) else {
                    return Err(self.invariant_violation(format!("link on corner {c} targets missing face {}", link.face)));
                };
                if !target_face.enabled || !target_face.corners.contains(&link.corner) {
                    return Err(self.invariant_violation(format!(
                        "link on corner {c} targets corner {} not owned by an enabled face on the target mesh",
                        link.corner
                    )));
                }
                let Some(target_corner) = target.corners.get(link.corner as usize) else {
                    return Err(self.invariant_violation(format!("link on corner {c} targets missing corner {}", link.corner)));
                };
                let reciprocal = target_corner.link.and_then(|l| target.links.get(l as usize));
                let reciprocates =
                    reciprocal.is_some_and(|back| back.target_mesh == self_space && back.face == fi as u32 && back.corner == c);
                if !reciprocates {
                    return Err(self.invariant_violation(format!("corner {c}'s link has no reciprocal link back from the target mesh")));
                }
            }
        }
        Ok(())
    }

    #[cfg(debug_assertions)]
    fn dump(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "SpaceMesh: {} vertices, {} edges, {} corners, {} faces, {} links", self.vertices.len(), self.edges.len(), self.corners.len(), self.faces.len(), self.links.len());
        for (i, v) in self.vertices.iter().enumerate() {
            let _ = writeln!(out, "  vertex {i}: {:?}", v.position);
        }
        for (i, e) in self.edges.iter().enumerate() {
            let _ = writeln!(out, "  edge {i}: v{}-v{} face1={:?} face2={:?}", e.vertex1, e.vertex2, e.face1, e.face2);
        }
        for (i, c) in self.corners.iter().enumerate() {
            let _ = writeln!(out, "  corner {i}: vertex={} edge={} enabled={} link={:?}", c.vertex, c.edge, c.enabled, c.link);
        }
        for (i, f) in self.faces.iter().enumerate() {
            let _ = writeln!(out, "  face {i}: corners={:?} enabled={} normal={:?}", f.corners, f.enabled, f.normal);
        }
        for (i, l) in self.links.iter().enumerate() {
            let _ = writeln!(out, "  link {i}: target_mesh={:?} face={} corner={}", l.target_mesh, l.face, l.corner);
        }
        out
    }
}

fn face_aabb(face: &SpaceMeshFace) -> crate::convex::Aabb3 {
    crate::convex::Aabb3 { min: face.min_extend, max: face.max_extend }
}

fn positions_match_unordered(vertices: &[Vec3], indices: &[u32], original: &[Vec3]) -> bool {
    if indices.len() != original.len() {
        return false;
    }
    indices.iter().all(|&i| original.iter().any(|&p| p.distance(vertices[i as usize]) < 1e-5))
}

fn build_face_geometry(corners: Vec<u32>, type_number: u32, vertices: &[SpaceMeshVertex], corner_pool: &[SpaceMeshCorner]) -> SpaceMeshFace {
    let positions: Vec<Vec3> = corners.iter().map(|&c| vertices[corner_pool[c as usize].vertex as usize].position).collect();
    let n = positions.len();

    let first_edge_dir = (positions[1 % n] - positions[0]).normalize_or_zero();
    let mut best = (1usize, f32::INFINITY);
    for i in 1..n {
        let dir = (positions[(i + 1) % n] - positions[i]).normalize_or_zero();
        let score = dir.dot(first_edge_dir).abs();
        if score < best.1 {
            best = (i, score);
        }
    }
    let second_dir = (positions[(best.0 + 1) % n] - positions[best.0]).normalize_or_zero();
    let normal = first_edge_dir.cross(second_dir).normalize_or_zero();

    let center = positions.iter().fold(Vec3::ZERO, |a, &b| a + b) / n as f32;
    let distance = normal.dot(center);
    let min_extend = positions.iter().fold(Vec3::splat(f32::INFINITY), |a, &b| a.min(b));
    let max_extend = positions.iter().fold(Vec3::splat(f32::NEG_INFINITY), |a, &b| a.max(b));

    SpaceMeshFace {
        corners,
        type_number,
        center,
        normal,
        distance,
        min_extend,
        max_extend,
        enabled: true,
        path: FacePathScratch::default(),
    }
}

fn project_on_segment(p: Vec3, a: Vec3, b: Vec3) -> (f32, f32) {
    let dir = b - a;
    let len_sq = dir.length_squared();
    if len_sq <= f32::EPSILON {
        return (0.0, a.distance(p));
    }
    let t = (p - a).dot(dir) / len_sq;
    let closest = a + dir * t;
    (t, closest.distance(p))
}

/// Attempts one of the five link cases (§4.5) between `self_edge` (on
/// `mesh`) and `target_edge` (on `target`). Returns `true` if a link (and
/// possibly a split) was made, in which case the caller should re-scan
/// `mesh`'s boundary edges since one may have changed.
#[allow(clippy::too_many_arguments)]
fn try_link_edge_pair(
    mesh: &mut SpaceMesh,
    self_edge: u32,
    target: &mut SpaceMesh,
    target_edge: u32,
    self_space: SpaceId,
    target_space: SpaceId,
    self_to_target: Affine3A,
    snap: f32,
    max_snap_angle_cos: f32,
) -> bool {
    let owner = mesh.edge_owning_face(self_edge);
    let target_owner = target.edge_owning_face(target_edge);
    let owner_normal = mesh.faces[owner as usize].normal;
    let target_normal = target.faces[target_owner as usize].normal;
    if self_to_target.matrix3.mul_vec3(owner_normal).normalize_or_zero().dot(target_normal).abs() < max_snap_angle_cos {
        return false;
    }

    let e = mesh.edges[self_edge as usize];
    let te = target.edges[target_edge as usize];
    let a1 = self_to_target.transform_point3(mesh.vertices[e.vertex1 as usize].position);
    let a2 = self_to_target.transform_point3(mesh.vertices[e.vertex2 as usize].position);
    let b1 = target.vertices[te.vertex1 as usize].position;
    let b2 = target.vertices[te.vertex2 as usize].position;

    let a1_b1 = a1.distance(b1) <= snap;
    let a1_b2 = a1.distance(b2) <= snap;
    let a2_b1 = a2.distance(b1) <= snap;
    let a2_b2 = a2.distance(b2) <= snap;

    if (a1_b1 && a2_b2) || (a1_b2 && a2_b1) {
        link_corners(mesh, self_edge, target, target_edge, self_space, target_space, self_to_target);
        return true;
    }

    let matches_one_vertex =
        (a1_b1 || a1_b2 || a2_b1 || a2_b2) && !((a1_b1 || a1_b2) && (a2_b1 || a2_b2));
    if matches_one_vertex {
        let (self_matched_is_v1, other_fixed) = if a1_b1 || a1_b2 { (true, if a1_b1 { b1 } else { b2 }) } else { (false, if a2_b1 { b1 } else { b2 }) };
        let free_target_point = if other_fixed.distance(b1) < 1e-6 { b2 } else { b1 };
        let (t, dist) = project_on_segment(free_target_point, a1, a2);
        if dist <= snap && t > 0.0 && t < 1.0 {
            let new_vertex = mesh.split_edge(self_edge, if self_matched_is_v1 { t } else { 1.0 - t });
            let _ = new_vertex;
            return true;
        }

        let fixed_self = if self_matched_is_v1 { a1 } else { a2 };
        let free_self_point = if self_matched_is_v1 { a2 } else { a1 };
        let _ = fixed_self;
        let (t2, dist2) = project_on_segment(free_self_point, b1, b2);
        if dist2 <= snap && t2 > 0.0 && t2 < 1.0 {
            target.split_edge(target_edge, t2);
            return true;
        }
        return false;
    }

    let (ta, da) = project_on_segment(a1, b1, b2);
    let (tb, db) = project_on_segment(a2, b1, b2);
    let a1_inside = da <= snap && ta > 0.0 && ta < 1.0;
    let a2_inside = db <= snap && tb > 0.0 && tb < 1.0;

    if a1_inside && a2_inside {
        let (first_t, second_t) = if ta < tb { (ta, tb) } else { (tb, ta) };
        target.split_edge(target_edge, first_t);
        let rescaled_second = (second_t - first_t) / (1.0 - first_t).max(1e-6);
        target.split_edge(target.edges.len() as u32 - 1, rescaled_second);
        return true;
    }
    if a1_inside {
        target.split_edge(target_edge, ta);
        return true;
    }
    if a2_inside {
        target.split_edge(target_edge, tb);
        return true;
    }

    false
}

fn link_corners(
    mesh: &mut SpaceMesh,
    self_edge: u32,
    target: &mut SpaceMesh,
    target_edge: u32,
    self_space: SpaceId,
    target_space: SpaceId,
    self_to_target: Affine3A,
) {
    let owner = mesh.edge_owning_face(self_edge);
    let target_owner = target.edge_owning_face(target_edge);
    let Some(self_corner_pos) = mesh.index_of_corner_with_edge(owner, self_edge) else { return };
    let Some(target_corner_pos) = target.index_of_corner_with_edge(target_owner, target_edge) else { return };
    let self_corner = mesh.faces[owner as usize].corners[self_corner_pos];
    let target_corner = target.faces[target_owner as usize].corners[target_corner_pos];

    let link_index = mesh.links.len() as u32;
    mesh.links.push(SpaceMeshLink { target_mesh: target_space, face: target_owner, corner: target_corner, transform: self_to_target });
    mesh.corners[self_corner as usize].link = Some(link_index);

    let reverse_index = target.links.len() as u32;
    target.links.push(SpaceMeshLink { target_mesh: self_space, face: owner, corner: self_corner, transform: self_to_target.inverse() });
    target.corners[target_corner as usize].link = Some(reverse_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SpaceMesh {
        let verts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        SpaceMesh::build(verts, vec![BuildFace { corners: vec![(0, 0), (1, 0), (2, 0), (3, 0)] }]).unwrap()
    }

    #[test]
    fn build_creates_one_face_with_four_edges() {
        let mesh = quad();
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.edges.len(), 4);
        assert!(mesh.edges.iter().all(|e| e.face1.is_some() && e.face2.is_none()));
    }

    #[test]
    fn face_normal_points_up() {
        let mesh = quad();
        assert!(mesh.faces[0].normal.y.abs() > 0.9);
    }

    #[test]
    fn update_blocking_with_no_splitters_leaves_face_enabled() {
        let mut mesh = quad();
        mesh.update_blocking(&[]).unwrap();
        assert!(mesh.faces[0].enabled);
        assert_eq!(mesh.faces.len(), 1);
    }

    #[test]
    fn update_blocking_with_centered_blocker_disables_original_face() {
        use crate::convex::shape::{tessellate, Shape};
        let mut mesh = quad();
        let volume = tessellate(&Shape::Box { half_extents: Vec3::new(0.2, 1.0, 0.2) }).unwrap();
        let centered = volume.transformed(&Affine3A::from_translation(Vec3::new(0.5, 0.0, 0.5)));
        mesh.update_blocking(&[centered]).unwrap();
        assert!(!mesh.faces[0].enabled);
        assert!(mesh.faces.iter().skip(1).any(|f| f.enabled));
    }

    #[test]
    fn face_closest_to_picks_nearest_center() {
        let mesh = quad();
        let face = mesh.face_closest_to(Vec3::new(0.5, 0.0, 0.5)).unwrap();
        assert_eq!(face, 0);
    }

    #[test]
    fn exact_match_linking_sets_mutual_links() {
        let mut a = quad();
        let mut b = SpaceMesh::build(
            vec![
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            vec![BuildFace { corners: vec![(0, 0), (1, 0), (2, 0), (3, 0)] }],
        )
        .unwrap();

        let space_a = SpaceId { index: 0, generation: 0 };
        let space_b = SpaceId { index: 1, generation: 0 };
        let mut targets: Vec<(SpaceId, &mut SpaceMesh, Affine3A, f32)> = vec![(space_b, &mut b, Affine3A::IDENTITY, 0.01)];
        a.link_to_other_meshes(space_a, 0.01, 0.9, &mut targets);

        assert_eq!(a.links.len(), 1);
        assert_eq!(b.links.len(), 1);
    }

    fn no_lookup(_: SpaceId) -> Option<&'static SpaceMesh> {
        None
    }

    #[test]
    fn freshly_built_mesh_passes_invariants() {
        let mesh = quad();
        let id = SpaceId { index: 0, generation: 0 };
        assert!(mesh.verify_invariants(id, &no_lookup).is_ok());
    }

    #[test]
    fn cut_mesh_passes_invariants() {
        use crate::convex::shape::{tessellate, Shape};
        let mut mesh = quad();
        let volume = tessellate(&Shape::Box { half_extents: Vec3::new(0.2, 1.0, 0.2) }).unwrap();
        let centered = volume.transformed(&Affine3A::from_translation(Vec3::new(0.5, 0.0, 0.5)));
        mesh.update_blocking(&[centered]).unwrap();
        let id = SpaceId { index: 0, generation: 0 };
        assert!(mesh.verify_invariants(id, &no_lookup).is_ok());
    }

    #[test]
    fn disabled_face_sharing_a_corner_with_an_enabled_one_is_caught() {
        let mut mesh = quad();
        mesh.faces.push(mesh.faces[0].clone());
        let id = SpaceId { index: 0, generation: 0 };
        let err = mesh.verify_invariants(id, &no_lookup).unwrap_err();
        assert!(matches!(err, NavError::InvariantViolation(_)));
    }

    #[test]
    fn mutual_links_pass_the_reciprocity_check() {
        let mut a = quad();
        let mut b = SpaceMesh::build(
            vec![
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
            ],
            vec![BuildFace { corners: vec![(0, 0), (1, 0), (2, 0), (3, 0)] }],
        )
        .unwrap();

        let space_a = SpaceId { index: 0, generation: 0 };
        let space_b = SpaceId { index: 1, generation: 0 };
        {
            let mut targets: Vec<(SpaceId, &mut SpaceMesh, Affine3A, f32)> = vec![(space_b, &mut b, Affine3A::IDENTITY, 0.01)];
            a.link_to_other_meshes(space_a, 0.01, 0.9, &mut targets);
        }

        let lookup_b = |id: SpaceId| (id == space_b).then_some(&b);
        assert!(a.verify_invariants(space_a, &lookup_b).is_ok());
        let lookup_a = |id: SpaceId| (id == space_a).then_some(&a);
        assert!(b.verify_invariants(space_b, &lookup_a).is_ok());
    }
}
