//! A* over [`SpaceGrid`] vertices (§4.8).
//!
//! Grounded on `original_source/.../pathfinder/dedaiPathFinderNavGrid.cpp`:
//! closed-set tracking via a per-vertex enum, g/h/f costs, parent
//! back-pointers, Euclidean heuristic. Cross-space links are traversed as
//! zero-cost edges whose far vertex inherits the near vertex's parent and
//! cost rather than pointing at it, so the emitted path never shows a
//! phantom point at a space boundary.
//!
//! `Layer::find_path_grid` hands this function independent clones of every
//! grid on the layer (path scratch is reset per search anyway, so there is
//! nothing to write back) sharing one `(grid index, vertex index)` address
//! space; parent chains are kept in a side map here rather than in
//! [`crate::space::grid::GridPathScratch::parent`], since that field only
//! fits a same-grid vertex index and a path can cross grids.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::{Affine3A, Vec3};
use smallvec::SmallVec;

use crate::ids::SpaceId;
use crate::space::grid::{GridLink, PathNodeState, SpaceGrid};

#[derive(Clone, Copy)]
struct QueueEntry {
    f: f32,
    seq: u64,
    grid: usize,
    vertex: u32,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse `f` so the lowest cost pops
        // first, and break ties by insertion order (lower seq first).
        other.f.total_cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs A* from `start` to `goal`, both `(grid index, vertex index)` pairs
/// into `grids`/`ids`/`matrices` (all the same length, index-parallel).
/// `cost_lookup` is the Navigator's `{fix_cost, cost_per_metre}` table,
/// index-parallel to the layer's CostTable. Returns the world-space vertex
/// chain, or an empty vec if no path exists within `max_blocking_cost`.
pub fn find_path(
    grids: &mut [SpaceGrid],
    ids: &[SpaceId],
    matrices: &[Affine3A],
    cost_lookup: &[(f32, f32)],
    start: (usize, u32),
    goal: (usize, u32),
    max_blocking_cost: f32,
) -> Vec<Vec3> {
    for grid in grids.iter_mut() {
        for v in &mut grid.vertices {
            v.path = Default::default();
        }
    }

    let goal_pos = matrices[goal.0].transform_point3(grids[goal.0].vertices[goal.1 as usize].position);
    let mut parents: HashMap<(usize, u32), Option<(usize, u32)>> = HashMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    {
        let start_pos = matrices[start.0].transform_point3(grids[start.0].vertices[start.1 as usize].position);
        let h = start_pos.distance(goal_pos);
        let sv = &mut grids[start.0].vertices[start.1 as usize].path;
        sv.cost_g = 0.0;
        sv.cost_h = h;
        sv.cost_f = h;
        sv.state = PathNodeState::Open;
        parents.insert(start, None);
        heap.push(QueueEntry { f: h, seq, grid: start.0, vertex: start.1 });
        seq += 1;
    }

    let mut reached_goal = false;

    while let Some(entry) = heap.pop() {
        let (gi, vi) = (entry.grid, entry.vertex);
        if grids[gi].vertices[vi as usize].path.state == PathNodeState::Closed {
            continue;
        }
        grids[gi].vertices[vi as usize].path.state = PathNodeState::Closed;
        if (gi, vi) == goal {
            reached_goal = true;
            break;
        }

        let g_cost = grids[gi].vertices[vi as usize].path.cost_g;
        let parent_here = parents.get(&(gi, vi)).copied().flatten();

        let first = grids[gi].vertices[vi as usize].first_edge;
        let count = grids[gi].vertices[vi as usize].edge_count;
        let edges: SmallVec<[u32; 6]> = (first..first + count).map(|k| grids[gi].vertex_edges[k as usize]).collect();

        for e in edges {
            let edge = grids[gi].edges[e as usize];
            let (other, type_idx) = if edge.vertex1 == vi { (edge.vertex2, edge.type1) } else { (edge.vertex1, edge.type2) };
            if !grids[gi].vertices[other as usize].enabled {
                continue;
            }
            if grids[gi].vertices[other as usize].path.state == PathNodeState::Closed {
                continue;
            }
            let (fix_cost, per_metre) = cost_lookup.get(type_idx as usize).copied().unwrap_or((0.0, 1.0));
            let new_g = g_cost + fix_cost + per_metre * edge.length;
            let other_pos = matrices[gi].transform_point3(grids[gi].vertices[other as usize].position);
            let h = other_pos.distance(goal_pos);
            let new_f = new_g + h;

            let ov = &mut grids[gi].vertices[other as usize].path;
            if ov.state == PathNodeState::Open && new_f >= ov.cost_f {
                continue;
            }
            ov.cost_g = new_g;
            ov.cost_h = h;
            ov.cost_f = new_f;
            parents.insert((gi, other), Some((gi, vi)));

            if new_f > max_blocking_cost {
                ov.state = PathNodeState::Closed;
                continue;
            }
            ov.state = PathNodeState::Open;
            heap.push(QueueEntry { f: new_f, seq, grid: gi, vertex: other });
            seq += 1;
        }

        let first_link = grids[gi].vertices[vi as usize].first_link;
        let link_count = grids[gi].vertices[vi as usize].link_count;
        let links: SmallVec<[GridLink; 4]> = (first_link..first_link + link_count).map(|k| grids[gi].links[k as usize]).collect();
        for link in links {
            let Some(target_gi) = ids.iter().position(|&id| id == link.target_space) else { continue };
            let tv_index = link.target_vertex;
            if !grids[target_gi].vertices[tv_index as usize].enabled {
                continue;
            }
            if grids[target_gi].vertices[tv_index as usize].path.state == PathNodeState::Closed {
                continue;
            }
            let h = matrices[target_gi].transform_point3(grids[target_gi].vertices[tv_index as usize].position).distance(goal_pos);
            let new_f = g_cost + h;
            let tv = &mut grids[target_gi].vertices[tv_index as usize].path;
            if tv.state == PathNodeState::Open && new_f >= tv.cost_f {
                continue;
            }
            tv.cost_g = g_cost;
            tv.cost_h = h;
            tv.cost_f = new_f;
            tv.state = PathNodeState::Open;
            // Inherit this vertex's own parent rather than pointing at it -
            // crossing a link is free and must not show up as a path point.
            parents.insert((target_gi, tv_index), parent_here);
            heap.push(QueueEntry { f: new_f, seq, grid: target_gi, vertex: tv_index });
            seq += 1;
        }
    }

    if !reached_goal {
        return Vec::new();
    }

    let mut chain = Vec::new();
    let mut current = Some(goal);
    while let Some((gi, vi)) = current {
        chain.push(matrices[gi].transform_point3(grids[gi].vertices[vi as usize].position));
        current = parents.get(&(gi, vi)).copied().flatten();
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SpaceId;

    fn line() -> SpaceGrid {
        SpaceGrid::build(
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            [(0, 1, 0, 0), (1, 2, 0, 0)],
        )
    }

    #[test]
    fn finds_path_along_a_single_grid() {
        let mut grids = vec![line()];
        let ids = [SpaceId { index: 0, generation: 0 }];
        let matrices = [Affine3A::IDENTITY];
        let path = find_path(&mut grids, &ids, &matrices, &[(0.0, 1.0)], (0, 0), (0, 2), f32::INFINITY);
        assert_eq!(path.len(), 3);
        assert_eq!(path[2], Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn blocked_vertex_forces_no_path() {
        let mut grid = line();
        grid.vertices[1].enabled = false;
        let mut grids = vec![grid];
        let ids = [SpaceId { index: 0, generation: 0 }];
        let matrices = [Affine3A::IDENTITY];
        let path = find_path(&mut grids, &ids, &matrices, &[(0.0, 1.0)], (0, 0), (0, 2), f32::INFINITY);
        assert!(path.is_empty());
    }

    #[test]
    fn crosses_a_link_without_a_phantom_point() {
        let mut a = SpaceGrid::build(vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)], [(0, 1, 0, 0)]);
        let b = SpaceGrid::build(vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)], [(0, 1, 0, 0)]);
        let id_a = SpaceId { index: 0, generation: 0 };
        let id_b = SpaceId { index: 1, generation: 0 };
        a.link_to_other_grids(&[(id_b, &b, Affine3A::IDENTITY)], 0.01);

        let mut grids = vec![a, b];
        let ids = [id_a, id_b];
        let matrices = [Affine3A::IDENTITY, Affine3A::IDENTITY];
        let path = find_path(&mut grids, &ids, &matrices, &[(0.0, 1.0)], (0, 0), (1, 1), f32::INFINITY);
        assert_eq!(path.len(), 3);
    }
}
