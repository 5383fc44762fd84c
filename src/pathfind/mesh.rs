//! A* over [`SpaceMesh`] faces, with funnel string-pulling for the final
//! point list (§4.9).
//!
//! Grounded on `original_source/.../pathfinder/dedaiPathFinderNavMesh.cpp`:
//! search over face centers rather than vertices, a fix cost applied only
//! when the path's face type number changes from the previous step
//! (`FacePathScratch::entry_type`), and `pFindRealPath` calling the funnel
//! afterwards over the chain of shared edges. As in [`super::grid`],
//! cross-mesh links are crossed for free with parent inheritance so a
//! boundary crossing never becomes a phantom corner.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::{Affine3A, Vec3};

use super::funnel::{self, Portal};
use crate::ids::SpaceId;
use crate::space::grid::PathNodeState;
use crate::space::mesh::SpaceMesh;

#[derive(Clone, Copy)]
struct QueueEntry {
    f: f32,
    seq: u64,
    mesh: usize,
    face: u32,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f.total_cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One step of the resolved face chain, kept around long enough to build
/// the funnel's portal list.
#[derive(Clone, Copy)]
struct Step {
    mesh: usize,
    face: u32,
    /// Edge crossed to arrive here from the parent step; `None` for the
    /// start face.
    entry_edge: Option<u32>,
}

/// Runs A* over face centers from `start` to `goal` (`(mesh index, face
/// index)` pairs, index-parallel with `meshes`/`ids`/`matrices`), then
/// string-pulls the result between the caller's literal `start_point` and
/// `goal_point` - the search itself still costs distance face-center to
/// face-center, but the returned path starts and ends at the points the
/// caller actually asked for, matching `SetStartPoint`/`SetEndPoint` feeding
/// the funnel's origin/goal directly rather than the resolved face centers.
/// `max_outside_distance` gating happens earlier, at face resolution (a
/// caller too far from any face never gets a `start`/`goal` pair to pass
/// here). Returns an empty path if no face-to-face route exists within
/// `max_blocking_cost`.
pub fn find_path(
    meshes: &mut [SpaceMesh],
    ids: &[SpaceId],
    matrices: &[Affine3A],
    cost_lookup: &[(f32, f32)],
    start: (usize, u32),
    start_point: Vec3,
    goal: (usize, u32),
    goal_point: Vec3,
    max_blocking_cost: f32,
    fix_pending: bool,
) -> Vec<Vec3> {
    for mesh in meshes.iter_mut() {
        for f in &mut mesh.faces {
            f.path = Default::default();
        }
    }

    let goal_face = &meshes[goal.0].faces[goal.1 as usize];
    let goal_pos = matrices[goal.0].transform_point3(goal_face.center);
    if !goal_face.enabled {
        return Vec::new();
    }

    let mut parents: HashMap<(usize, u32), Option<(usize, u32, Option<u32>)>> = HashMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    {
        let start_center = matrices[start.0].transform_point3(meshes[start.0].faces[start.1 as usize].center);
        let h = start_center.distance(goal_pos);
        let entry_type = meshes[start.0].faces[start.1 as usize].type_number;
        let sf = &mut meshes[start.0].faces[start.1 as usize].path;
        sf.cost_g = 0.0;
        sf.cost_h = h;
        sf.cost_f = h;
        sf.state = PathNodeState::Open;
        sf.entry_type = entry_type;
        parents.insert(start, None);
        heap.push(QueueEntry { f: h, seq, mesh: start.0, face: start.1 });
        seq += 1;
    }

    let mut reached_goal = false;

    while let Some(entry) = heap.pop() {
        let (mi, fi) = (entry.mesh, entry.face);
        if meshes[mi].faces[fi as usize].path.state == PathNodeState::Closed {
            continue;
        }
        meshes[mi].faces[fi as usize].path.state = PathNodeState::Closed;
        if (mi, fi) == goal {
            reached_goal = true;
            break;
        }

        let g_cost = meshes[mi].faces[fi as usize].path.cost_g;
        let entry_type = meshes[mi].faces[fi as usize].path.entry_type;
        let parent_here = parents.get(&(mi, fi)).copied().flatten();

        let corners = meshes[mi].faces[fi as usize].corners.clone();
        for &corner_idx in &corners {
            let corner = meshes[mi].corners[corner_idx as usize];
            let edge = corner.edge;

            if let Some(link_index) = corner.link {
                let link = meshes[mi].links[link_index as usize];
                let Some(target_mi) = ids.iter().position(|&id| id == link.target_mesh) else { continue };
                let target_fi = link.face;
                if !meshes[target_mi].faces[target_fi as usize].enabled
                    || meshes[target_mi].faces[target_fi as usize].path.state == PathNodeState::Closed
                {
                    continue;
                }
                let h = matrices[target_mi].transform_point3(meshes[target_mi].faces[target_fi as usize].center).distance(goal_pos);
                let new_f = g_cost + h;
                let tf = &mut meshes[target_mi].faces[target_fi as usize].path;
                if tf.state == PathNodeState::Open && new_f >= tf.cost_f {
                    continue;
                }
                tf.cost_g = g_cost;
                tf.cost_h = h;
                tf.cost_f = new_f;
                tf.state = PathNodeState::Open;
                tf.entry_type = entry_type;
                parents.insert((target_mi, target_fi), parent_here);
                heap.push(QueueEntry { f: new_f, seq, mesh: target_mi, face: target_fi });
                seq += 1;
                continue;
            }

            let e = meshes[mi].edges[edge as usize];
            let Some(other_face) = (if e.face1 == Some(fi) { e.face2 } else { e.face1 }) else { continue };
            if !meshes[mi].faces[other_face as usize].enabled || meshes[mi].faces[other_face as usize].path.state == PathNodeState::Closed {
                continue;
            }

            let other_type = meshes[mi].faces[other_face as usize].type_number;
            let (fix_cost, per_metre) = cost_lookup.get(other_type as usize).copied().unwrap_or((0.0, 1.0));
            let step_fix = if other_type != entry_type { fix_cost } else { 0.0 };
            let dist = meshes[mi].faces[fi as usize].center.distance(meshes[mi].faces[other_face as usize].center);
            let new_g = g_cost + step_fix + per_metre * dist;
            let other_center = matrices[mi].transform_point3(meshes[mi].faces[other_face as usize].center);
            let h = other_center.distance(goal_pos);
            let new_f = new_g + h;

            let of = &mut meshes[mi].faces[other_face as usize].path;
            if of.state == PathNodeState::Open && new_f >= of.cost_f {
                continue;
            }
            of.cost_g = new_g;
            of.cost_h = h;
            of.cost_f = new_f;
            of.entry_type = other_type;

            if new_f > max_blocking_cost {
                of.state = PathNodeState::Closed;
                continue;
            }
            of.state = PathNodeState::Open;
            parents.insert((mi, other_face), Some((mi, fi, Some(edge))));
            heap.push(QueueEntry { f: new_f, seq, mesh: mi, face: other_face });
            seq += 1;
        }
    }

    if !reached_goal {
        return Vec::new();
    }

    let mut chain: Vec<Step> = Vec::new();
    let mut current = Some((goal.0, goal.1));
    let mut edge_into_current: Option<u32> = None;
    loop {
        let Some((mi, fi)) = current else { break };
        chain.push(Step { mesh: mi, face: fi, entry_edge: edge_into_current });
        match parents.get(&(mi, fi)).copied().flatten() {
            Some((pm, pf, via_edge)) => {
                edge_into_current = via_edge;
                current = Some((pm, pf));
            }
            None => break,
        }
    }
    chain.reverse();

    build_string_pulled_path(meshes, matrices, start_point, goal_point, &chain, fix_pending)
}

fn build_string_pulled_path(
    meshes: &[SpaceMesh],
    matrices: &[Affine3A],
    start_pos: Vec3,
    goal_pos: Vec3,
    chain: &[Step],
    fix_pending: bool,
) -> Vec<Vec3> {
    let mut portals = Vec::new();
    let mut travel_dir = (goal_pos - start_pos).normalize_or_zero();

    for step in chain.iter().skip(1) {
        let Some(edge) = step.entry_edge else { continue };
        let mesh = &meshes[step.mesh];
        let e = mesh.edges[edge as usize];
        let p = matrices[step.mesh].transform_point3(mesh.vertices[e.vertex1 as usize].position);
        let q = matrices[step.mesh].transform_point3(mesh.vertices[e.vertex2 as usize].position);
        let normal = matrices[step.mesh].matrix3.mul_vec3(mesh.faces[step.face as usize].normal).normalize_or_zero();

        let mid = (p + q) * 0.5;
        let new_dir = (mid - start_pos).normalize_or_zero();
        if new_dir.length_squared() > 0.0 {
            travel_dir = new_dir;
        }

        let (left, right) = if normal.dot(travel_dir.cross(q - p)) >= 0.0 { (q, p) } else { (p, q) };
        portals.push(Portal { left, right, normal });
    }

    funnel::pull_string(start_pos, goal_pos, &portals, fix_pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::mesh::BuildFace;

    fn quad(offset: f32) -> SpaceMesh {
        let verts = vec![
            Vec3::new(offset, 0.0, 0.0),
            Vec3::new(offset + 1.0, 0.0, 0.0),
            Vec3::new(offset + 1.0, 0.0, 1.0),
            Vec3::new(offset, 0.0, 1.0),
        ];
        SpaceMesh::build(verts, vec![BuildFace { corners: vec![(0, 0), (1, 0), (2, 0), (3, 0)] }]).unwrap()
    }

    #[test]
    fn finds_path_on_a_single_face() {
        let mut meshes = vec![quad(0.0)];
        let ids = [SpaceId { index: 0, generation: 0 }];
        let matrices = [Affine3A::IDENTITY];
        let start = Vec3::new(0.1, 0.0, 0.1);
        let goal = Vec3::new(0.9, 0.0, 0.9);
        let path = find_path(&mut meshes, &ids, &matrices, &[(0.0, 1.0)], (0, 0), start, (0, 0), goal, f32::INFINITY, true);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], start);
        assert_eq!(path[1], goal);
    }

    #[test]
    fn disabled_goal_face_yields_no_path() {
        let mut mesh = quad(0.0);
        mesh.faces[0].enabled = false;
        let mut meshes = vec![mesh];
        let ids = [SpaceId { index: 0, generation: 0 }];
        let matrices = [Affine3A::IDENTITY];
        let path = find_path(
            &mut meshes,
            &ids,
            &matrices,
            &[(0.0, 1.0)],
            (0, 0),
            Vec3::new(0.1, 0.0, 0.1),
            (0, 0),
            Vec3::new(0.9, 0.0, 0.9),
            f32::INFINITY,
            true,
        );
        assert!(path.is_empty());
    }

    #[test]
    fn crosses_a_mesh_link_without_a_phantom_point() {
        let mut a = quad(0.0);
        let mut b = quad(1.0);
        let space_a = SpaceId { index: 0, generation: 0 };
        let space_b = SpaceId { index: 1, generation: 0 };
        {
            let mut targets: Vec<(SpaceId, &mut SpaceMesh, Affine3A, f32)> = vec![(space_b, &mut b, Affine3A::IDENTITY, 0.01)];
            a.link_to_other_meshes(space_a, 0.01, 0.9, &mut targets);
        }

        let mut meshes = vec![a, b];
        let ids = [space_a, space_b];
        let matrices = [Affine3A::IDENTITY, Affine3A::IDENTITY];
        let start = Vec3::new(0.5, 0.0, 0.5);
        let goal = Vec3::new(1.5, 0.0, 0.5);
        let path = find_path(&mut meshes, &ids, &matrices, &[(0.0, 1.0)], (0, 0), start, (1, 0), goal, f32::INFINITY, true);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], start);
        assert_eq!(path[1], goal);
    }
}
