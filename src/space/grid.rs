//! Authored or terrain-derived navigation grid (§3, §4.4).
//!
//! Grounded on `original_source/.../spaces/grid/dedaiSpaceGrid{,Vertex,Edge}`:
//! parallel vertex/edge arrays plus a `vertex_edges` indirection table built
//! by a linear scan per vertex. The source's `pInitFromNavSpace` and
//! `pInitFromHTNavSpace` differ only in where vertex positions come from, so
//! both collapse here into one [`SpaceGrid::build`] taking already-resolved
//! positions and edges - the authored-space and height-terrain adapters
//! (`space::mod`, `terrain`) are responsible for producing those.

use glam::{Affine3A, Vec3};
use smallvec::SmallVec;

use crate::convex::ConvexVolume;
use crate::ids::SpaceId;

/// A* scratch fields threaded through [`crate::pathfind::grid`]; reset before
/// each search rather than carried across them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathNodeState {
    #[default]
    Free,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridPathScratch {
    pub parent: Option<u32>,
    pub cost_f: f32,
    pub cost_g: f32,
    pub cost_h: f32,
    pub state: PathNodeState,
}

#[derive(Debug, Clone)]
pub struct SpaceGridVertex {
    pub position: Vec3,
    pub first_edge: u32,
    pub edge_count: u32,
    pub first_link: u32,
    pub link_count: u32,
    pub enabled: bool,
    pub path: GridPathScratch,
}

/// Edge between two vertices. `type1`/`type2` are CostTable indices for
/// travel from `vertex1` to `vertex2` and the reverse direction respectively.
#[derive(Debug, Clone, Copy)]
pub struct SpaceGridEdge {
    pub vertex1: u32,
    pub vertex2: u32,
    pub type1: u32,
    pub type2: u32,
    pub length: f32,
}

/// A link between a vertex of this grid and a vertex of another grid that
/// represents the same spatial point (§4.4 `link_to_other_grids`).
#[derive(Debug, Clone, Copy)]
pub struct GridLink {
    pub target_space: SpaceId,
    pub target_vertex: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SpaceGrid {
    pub vertices: Vec<SpaceGridVertex>,
    pub edges: Vec<SpaceGridEdge>,
    pub vertex_edges: Vec<u32>,
    pub links: Vec<GridLink>,
}

impl SpaceGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.vertex_edges.clear();
        self.links.clear();
    }

    /// Builds a grid from vertex positions and `(vertex1, vertex2, type1,
    /// type2)` edge tuples, skipping self-loop edges, then fills in the
    /// per-vertex edge indirection table.
    pub fn build(vertices: Vec<Vec3>, edges: impl IntoIterator<Item = (u32, u32, u32, u32)>) -> Self {
        let mut grid = SpaceGrid {
            vertices: vertices
                .into_iter()
                .map(|position| SpaceGridVertex {
                    position,
                    first_edge: 0,
                    edge_count: 0,
                    first_link: 0,
                    link_count: 0,
                    enabled: true,
                    path: GridPathScratch::default(),
                })
                .collect(),
            edges: Vec::new(),
            vertex_edges: Vec::new(),
            links: Vec::new(),
        };

        for (v1, v2, t1, t2) in edges {
            if v1 == v2 {
                continue;
            }
            let length = grid.vertices[v2 as usize].position.distance(grid.vertices[v1 as usize].position);
            grid.edges.push(SpaceGridEdge { vertex1: v1, vertex2: v2, type1: t1, type2: t2, length });
        }

        grid.rebuild_vertex_edge_table();
        grid
    }

    fn rebuild_vertex_edge_table(&mut self) {
        self.vertex_edges.clear();
        for i in 0..self.vertices.len() {
            let first = self.vertex_edges.len() as u32;
            let mut count = 0u32;
            for (e, edge) in self.edges.iter().enumerate() {
                if edge.vertex1 as usize == i || edge.vertex2 as usize == i {
                    self.vertex_edges.push(e as u32);
                    count += 1;
                }
            }
            self.vertices[i].first_edge = first;
            self.vertices[i].edge_count = count;
        }
    }

    pub fn index_of_edge_matching(&self, v1: u32, v2: u32) -> Option<u32> {
        self.edges
            .iter()
            .position(|e| (e.vertex1 == v1 && e.vertex2 == v2) || (e.vertex1 == v2 && e.vertex2 == v1))
            .map(|i| i as u32)
    }

    pub fn vertex_closest_to(&self, position: Vec3) -> Option<(u32, f32)> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.enabled)
            .map(|(i, v)| (i as u32, v.position.distance_squared(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, d2)| (i, d2.sqrt()))
    }

    /// Closest point on an enabled edge (both endpoints enabled) within
    /// `radius`, returning `(edge_index, point, distance, lambda)`.
    pub fn nearest_point(&self, point: Vec3, radius: f32) -> Option<(u32, Vec3, f32, f32)> {
        let mut best: Option<(u32, Vec3, f32, f32)> = None;
        let mut best_dist_sq = radius * radius;

        for (i, edge) in self.edges.iter().enumerate() {
            let v1 = &self.vertices[edge.vertex1 as usize];
            let v2 = &self.vertices[edge.vertex2 as usize];
            if !v1.enabled || !v2.enabled {
                continue;
            }

            let edge_dir = v2.position - v1.position;
            let len_sq = edge_dir.length_squared();
            if len_sq <= f32::EPSILON {
                continue;
            }
            let lambda = ((point - v1.position).dot(edge_dir) / len_sq).clamp(0.0, 1.0);
            let closest = v1.position + edge_dir * lambda;
            let dist_sq = closest.distance_squared(point);
            if dist_sq > best_dist_sq {
                continue;
            }
            best_dist_sq = dist_sq;
            best = Some((i as u32, closest, dist_sq.sqrt(), lambda));
        }

        best
    }

    /// Rebuilds cross-grid links against `candidates`, each supplying the
    /// other grid, its space id, and the transform from this grid's local
    /// space into the candidate's local space.
    pub fn link_to_other_grids(&mut self, candidates: &[(SpaceId, &SpaceGrid, Affine3A)], snap_distance: f32) {
        for v in &mut self.vertices {
            v.first_link = 0;
            v.link_count = 0;
        }
        self.links.clear();

        let mut per_vertex: Vec<SmallVec<[GridLink; 4]>> = vec![SmallVec::new(); self.vertices.len()];

        for &(target_space, other, transform) in candidates {
            for (i, v) in self.vertices.iter().enumerate() {
                let local = transform.transform_point3(v.position);
                if let Some(j) = other.vertices.iter().position(|ov| ov.position.distance(local) <= snap_distance) {
                    per_vertex[i].push(GridLink { target_space, target_vertex: j as u32 });
                }
            }
        }

        for (i, links) in per_vertex.into_iter().enumerate() {
            self.vertices[i].first_link = self.links.len() as u32;
            self.vertices[i].link_count = links.len() as u32;
            self.links.extend(links);
        }
    }

    /// Enables every vertex, then disables any vertex strictly inside one of
    /// `splitters` (blocker and sibling-space convex volumes, already
    /// filtered by layer/priority/AABB by the caller).
    pub fn update_blocking(&mut self, splitters: &[ConvexVolume]) {
        for v in &mut self.vertices {
            v.enabled = true;
        }
        if splitters.is_empty() {
            return;
        }
        for v in &mut self.vertices {
            if splitters.iter().any(|s| s.contains_strictly(v.position, 0.0)) {
                v.enabled = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_grid() -> SpaceGrid {
        SpaceGrid::build(
            vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
            [(0, 1, 0, 0), (1, 2, 0, 0)],
        )
    }

    #[test]
    fn build_computes_edge_length_and_vertex_edge_table() {
        let grid = line_grid();
        assert_eq!(grid.edges[0].length, 1.0);
        assert_eq!(grid.vertices[1].edge_count, 2);
        assert_eq!(grid.vertices[0].edge_count, 1);
    }

    #[test]
    fn self_loop_edges_are_skipped() {
        let grid = SpaceGrid::build(vec![Vec3::ZERO, Vec3::X], [(0, 0, 0, 0), (0, 1, 0, 0)]);
        assert_eq!(grid.edges.len(), 1);
    }

    #[test]
    fn vertex_closest_to_ignores_disabled() {
        let mut grid = line_grid();
        grid.vertices[0].enabled = false;
        let (idx, _) = grid.vertex_closest_to(Vec3::ZERO).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn nearest_point_clamps_to_segment() {
        let grid = line_grid();
        let (edge, point, _, lambda) = grid.nearest_point(Vec3::new(-1.0, 0.0, 0.0), 5.0).unwrap();
        assert_eq!(edge, 0);
        assert_eq!(lambda, 0.0);
        assert_eq!(point, Vec3::ZERO);
    }

    #[test]
    fn update_blocking_disables_vertices_inside_splitter() {
        use crate::convex::shape::{tessellate, Shape};
        let mut grid = line_grid();
        let volume = tessellate(&Shape::Box { half_extents: Vec3::splat(0.4) }).unwrap();
        let centered = volume.transformed(&Affine3A::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        grid.update_blocking(&[centered]);
        assert!(!grid.vertices[1].enabled);
        assert!(grid.vertices[0].enabled);
        assert!(grid.vertices[2].enabled);
    }

    #[test]
    fn link_to_other_grids_matches_within_snap_distance() {
        let mut a = SpaceGrid::build(vec![Vec3::ZERO], []);
        let b = SpaceGrid::build(vec![Vec3::new(0.01, 0.0, 0.0)], []);
        let space_b = SpaceId { index: 1, generation: 0 };
        a.link_to_other_grids(&[(space_b, &b, Affine3A::IDENTITY)], 0.1);
        assert_eq!(a.links.len(), 1);
        assert_eq!(a.links[0].target_vertex, 0);
    }
}
