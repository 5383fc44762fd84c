//! Agent-facing query surface over a layer's spaces (§4.10; collision-query
//! expansion).
//!
//! Grounded on `original_source/.../navigation/dedaiNavigator.cpp`: a
//! per-agent cost override table (`pCosts`, keyed by user type number) that
//! gets remapped into a dense array index-parallel to the owning
//! [`crate::layer::Layer`]'s [`crate::cost_table::CostTable`] whenever that
//! table's definition changes, plus `FindPath`/`NearestPoint`/`LineCollide`/
//! `PathCollideRay`/`PathCollideShape`. A `Navigator` does not borrow its
//! `Layer` (the arena ownership model rules that out); every query takes
//! `&Layer` explicitly from the caller, who already holds it.

use std::collections::HashMap;

use glam::{Affine3A, Vec3};

use crate::error::{NavError, NavResult};
use crate::ids::SpaceId;
use crate::layer::Layer;
use crate::pathfind::{grid, mesh};
use crate::space::SpaceType;

/// An ordered list of world-space points produced by [`Navigator::find_path`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    points: Vec<Vec3>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn append(&mut self, point: Vec3) {
        self.points.push(point);
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn at(&self, index: usize) -> Vec3 {
        self.points[index]
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    fn from_vec(points: Vec<Vec3>) -> Self {
        Path { points }
    }
}

/// Where [`Navigator::path_collide_ray`] left off; advances by exactly one
/// segment per call regardless of whether that segment reports a hit, so a
/// caller that wants the whole path checked just calls it in a loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathCollideCursor {
    segment: usize,
}

impl PathCollideCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.segment = 0;
    }

    pub fn segment(&self) -> usize {
        self.segment
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    pub layer_number: i32,
    pub space_type: SpaceType,
    pub max_blocking_cost: f32,
    pub max_outside_distance: f32,
    /// Gates the funnel's curved-corridor pending-list refinement
    /// (`crate::pathfind::funnel`'s `fix_pending`); on by default.
    pub fix_funnel_pending: bool,

    costs_by_type: HashMap<i32, (f32, f32)>,
    cost_lookup: Vec<(f32, f32)>,
    dirty: bool,
}

impl Navigator {
    pub fn new(space_type: SpaceType, layer_number: i32) -> Self {
        Navigator {
            layer_number,
            space_type,
            max_blocking_cost: f32::INFINITY,
            max_outside_distance: 0.5,
            fix_funnel_pending: true,
            costs_by_type: HashMap::new(),
            cost_lookup: Vec::new(),
            dirty: true,
        }
    }

    /// Sets this agent's cost for travelling across cells/faces of
    /// `user_type`. Takes effect on the next [`Self::prepare`].
    pub fn set_cost(&mut self, user_type: i32, fix_cost: f32, cost_per_metre: f32) {
        self.costs_by_type.insert(user_type, (fix_cost, cost_per_metre));
        self.dirty = true;
    }

    /// Called by [`Layer::prepare`] when the owning layer's `CostTable`
    /// definition changed (a new type number was registered), forcing a
    /// `cost_lookup` rebuild on the next [`Self::prepare`].
    pub fn cost_table_definition_changed(&mut self) {
        self.dirty = true;
    }

    /// Rebuilds `cost_lookup`, index-parallel to `cost_table`, from the
    /// per-type overrides in `costs_by_type`. Types with no override cost
    /// `(0.0, 1.0)` - free to enter, one unit of cost per metre.
    pub fn prepare(&mut self, cost_table: &crate::cost_table::CostTable) {
        if !self.dirty {
            return;
        }
        self.cost_lookup = (0..cost_table.count())
            .map(|i| self.costs_by_type.get(&cost_table.type_at(i)).copied().unwrap_or((0.0, 1.0)))
            .collect();
        self.dirty = false;
    }

    /// Resolves `from`/`to` to the nearest navigable vertex (grid) or face
    /// (mesh) on `layer`, runs A* across every space of this navigator's
    /// type, and string-pulls the mesh case. Returns an empty path if either
    /// endpoint has nothing navigable nearby, or no route exists.
    pub fn find_path(&self, layer: &Layer, from: Vec3, to: Vec3) -> Path {
        match self.space_type {
            SpaceType::Grid => self.find_path_grid(layer, from, to),
            SpaceType::Mesh => self.find_path_mesh(layer, from, to),
        }
    }

    fn find_path_grid(&self, layer: &Layer, from: Vec3, to: Vec3) -> Path {
        let Some((start_space, start_vertex, _)) = layer.get_grid_vertex_closest_to(from) else { return Path::new() };
        let Some((goal_space, goal_vertex, _)) = layer.get_grid_vertex_closest_to(to) else { return Path::new() };

        let (mut grids, ids, matrices) = collect_grids(layer);
        let Some(start_idx) = ids.iter().position(|&id| id == start_space) else { return Path::new() };
        let Some(goal_idx) = ids.iter().position(|&id| id == goal_space) else { return Path::new() };

        let points = grid::find_path(
            &mut grids,
            &ids,
            &matrices,
            &self.cost_lookup,
            (start_idx, start_vertex),
            (goal_idx, goal_vertex),
            self.max_blocking_cost,
        );
        Path::from_vec(points)
    }

    fn find_path_mesh(&self, layer: &Layer, from: Vec3, to: Vec3) -> Path {
        let Some((start_space, _, _, start_face)) = layer.get_nav_mesh_nearest_point(from, self.max_outside_distance) else { return Path::new() };
        let Some((goal_space, _, _, goal_face)) = layer.get_nav_mesh_nearest_point(to, self.max_outside_distance) else { return Path::new() };

        let (mut meshes, ids, matrices) = collect_meshes(layer);
        let Some(start_idx) = ids.iter().position(|&id| id == start_space) else { return Path::new() };
        let Some(goal_idx) = ids.iter().position(|&id| id == goal_space) else { return Path::new() };

        let points = mesh::find_path(
            &mut meshes,
            &ids,
            &matrices,
            &self.cost_lookup,
            (start_idx, start_face),
            from,
            (goal_idx, goal_face),
            to,
            self.max_blocking_cost,
            self.fix_funnel_pending,
        );
        Path::from_vec(points)
    }

    /// Nearest navigable point to `point` within `radius`, plus the region's
    /// user type number where one is defined (mesh faces carry a type;
    /// grid edges do not, since a type is attached to *travel across* an
    /// edge rather than to a point, so this is always `None` for a grid
    /// navigator).
    pub fn nearest_point(&self, layer: &Layer, point: Vec3, radius: f32) -> Option<(Vec3, Option<i32>)> {
        match self.space_type {
            SpaceType::Grid => layer.get_grid_nearest_point(point, radius).map(|(_, p, _)| (p, None)),
            SpaceType::Mesh => layer.get_nav_mesh_nearest_point(point, radius).map(|(space, p, _, face)| {
                let user_type = layer.space(space).and_then(|s| match &s.kind {
                    crate::space::SpaceKind::Mesh(m) => Some(m.faces[face as usize].type_number),
                    crate::space::SpaceKind::Grid(_) => None,
                });
                (p, user_type.map(|idx| layer.cost_table().type_at(idx as usize)))
            }),
        }
    }

    /// Distance to the first navmesh boundary crossing along `direction`
    /// from `origin`, or `None` if the ray never exits. Grid navigators have
    /// no continuous surface to collide a ray against.
    pub fn line_collide(&self, layer: &Layer, origin: Vec3, direction: Vec3) -> NavResult<Option<f32>> {
        match self.space_type {
            SpaceType::Grid => Err(NavError::Unsupported("line_collide is not defined for grid navigators")),
            SpaceType::Mesh => Ok(layer.nav_mesh_line_collide(origin, direction).map(|fraction| fraction * direction.length())),
        }
    }

    /// Tests one segment of `path` (the one at `cursor`'s position) by
    /// calling `collider(segment_origin, segment_direction, max_distance)`,
    /// then advances `cursor` by one segment - whether or not this call hit
    /// anything - so repeated calls walk the whole path without re-testing
    /// already-cleared segments. `collider` is host-supplied and opaque to
    /// this crate (§4.10/§4.12); it returns the hit distance along
    /// `segment_direction`, or `None`. Returns the world-space hit point and
    /// the fraction of that segment's length already covered.
    pub fn path_collide_ray(
        &self,
        path: &Path,
        cursor: &mut PathCollideCursor,
        collider: &mut dyn FnMut(Vec3, Vec3, f32) -> Option<f32>,
    ) -> Option<(Vec3, f32)> {
        if cursor.segment + 1 >= path.count() {
            return None;
        }
        let a = path.at(cursor.segment);
        let b = path.at(cursor.segment + 1);
        cursor.segment += 1;

        let seg = b - a;
        let len = seg.length();
        if len <= f32::EPSILON {
            return None;
        }
        let dir = seg / len;
        let hit = collider(a, dir, len)?.clamp(0.0, len);
        Some((a + dir * hit, hit / len))
    }

    /// Same walk as [`Self::path_collide_ray`], but threads an opaque
    /// `agent` value through to `collider` so a host sweep routine can
    /// account for agent shape/radius (§4.12).
    pub fn path_collide_shape<A>(
        &self,
        path: &Path,
        cursor: &mut PathCollideCursor,
        agent: &A,
        collider: &mut dyn FnMut(Vec3, Vec3, f32, &A) -> Option<f32>,
    ) -> Option<(Vec3, f32)> {
        if cursor.segment + 1 >= path.count() {
            return None;
        }
        let a = path.at(cursor.segment);
        let b = path.at(cursor.segment + 1);
        cursor.segment += 1;

        let seg = b - a;
        let len = seg.length();
        if len <= f32::EPSILON {
            return None;
        }
        let dir = seg / len;
        let hit = collider(a, dir, len, agent)?.clamp(0.0, len);
        Some((a + dir * hit, hit / len))
    }
}

/// Clones every grid-type space on `layer` into parallel `(grids, ids,
/// matrices)` vectors for [`crate::pathfind::grid::find_path`].
fn collect_grids(layer: &Layer) -> (Vec<crate::space::grid::SpaceGrid>, Vec<SpaceId>, Vec<Affine3A>) {
    let mut grids = Vec::new();
    let mut ids = Vec::new();
    let mut matrices = Vec::new();
    for (id, space) in layer.spaces_with_id() {
        if let crate::space::SpaceKind::Grid(g) = &space.kind {
            grids.push(g.clone());
            ids.push(id);
            matrices.push(space.matrix());
        }
    }
    (grids, ids, matrices)
}

fn collect_meshes(layer: &Layer) -> (Vec<crate::space::mesh::SpaceMesh>, Vec<SpaceId>, Vec<Affine3A>) {
    let mut meshes = Vec::new();
    let mut ids = Vec::new();
    let mut matrices = Vec::new();
    for (id, space) in layer.spaces_with_id() {
        if let crate::space::SpaceKind::Mesh(m) = &space.kind {
            meshes.push(m.clone());
            ids.push(id);
            matrices.push(space.matrix());
        }
    }
    (meshes, ids, matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::grid::SpaceGrid;
    use crate::space::{Source, Space, SpaceKind};
    use std::collections::HashMap as Map;

    fn grid_space(offset: Vec3) -> Space {
        let grid = SpaceGrid::build(vec![Vec3::ZERO, Vec3::X], [(0, 1, 0, 0)]);
        let mut space = Space::new(SpaceKind::Grid(grid), 0, Source::Authored);
        space.set_transform(offset, glam::Quat::IDENTITY);
        space
    }

    #[test]
    fn find_path_on_a_grid_layer() {
        let mut layer = Layer::new(0);
        layer.add_space(grid_space(Vec3::ZERO));
        layer.add_space(grid_space(Vec3::new(1.0, 0.0, 0.0)));
        layer.prepare(&Map::new()).unwrap();

        let mut nav = Navigator::new(SpaceType::Grid, 0);
        nav.prepare(layer.cost_table());
        let path = nav.find_path(&layer, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert!(!path.is_empty());
        assert_eq!(path.at(0), Vec3::ZERO);
        assert_eq!(path.at(path.count() - 1), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn line_collide_is_unsupported_for_grid_navigators() {
        let layer = Layer::new(0);
        let nav = Navigator::new(SpaceType::Grid, 0);
        assert!(matches!(nav.line_collide(&layer, Vec3::ZERO, Vec3::X), Err(NavError::Unsupported(_))));
    }

    #[test]
    fn path_collide_ray_advances_cursor_even_without_a_hit() {
        let mut path = Path::new();
        path.append(Vec3::ZERO);
        path.append(Vec3::new(10.0, 0.0, 0.0));
        path.append(Vec3::new(20.0, 0.0, 0.0));

        // an obstacle far off the path's x range never reports a hit.
        let mut collider = |origin: Vec3, dir: Vec3, max_distance: f32| -> Option<f32> {
            let obstacle_x = 1000.0;
            if dir.x.abs() < f32::EPSILON {
                return None;
            }
            let t = (obstacle_x - origin.x) / dir.x;
            (t >= 0.0 && t <= max_distance).then_some(t)
        };

        let nav = Navigator::new(SpaceType::Grid, 0);
        let mut cursor = PathCollideCursor::new();
        assert!(nav.path_collide_ray(&path, &mut cursor, &mut collider).is_none());
        assert_eq!(cursor.segment(), 1);
        assert!(nav.path_collide_ray(&path, &mut cursor, &mut collider).is_none());
        assert_eq!(cursor.segment(), 2);
    }

    #[test]
    fn path_collide_shape_hits_a_box_straddling_the_path() {
        let mut path = Path::new();
        path.append(Vec3::ZERO);
        path.append(Vec3::new(10.0, 0.0, 0.0));

        // a box centered on x=5 with half-extent 0.5, inflated by the
        // agent's radius, hit by a ray walking along the x axis.
        let agent_radius = 0.1f32;
        let mut collider = |origin: Vec3, dir: Vec3, max_distance: f32, radius: &f32| -> Option<f32> {
            let half_extent = 0.5 + radius;
            let near_x = 5.0 - half_extent;
            if dir.x.abs() < f32::EPSILON {
                return None;
            }
            let t = (near_x - origin.x) / dir.x;
            (t >= 0.0 && t <= max_distance).then_some(t)
        };

        let nav = Navigator::new(SpaceType::Grid, 0);
        let mut cursor = PathCollideCursor::new();
        let hit = nav.path_collide_shape(&path, &mut cursor, &agent_radius, &mut collider);
        assert!(hit.is_some());
        let (_, fraction) = hit.unwrap();
        assert!(fraction > 0.3 && fraction < 0.6);
    }
}
