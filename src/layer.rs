//! Container scoping everything sharing a layer number (§4.7).
//!
//! Grounded on `original_source/.../dedaiLayer.{h,cpp}`: owns the
//! `CostTable` and a single dirty flag, and drives the ordered `prepare()`
//! sequence - cost-table propagation, then space/terrain/blocker rebuild,
//! then cross-space linking, then navigator refresh. The source reaches
//! owned resources through intrusive linked lists rooted on the Layer
//! itself; here Spaces/Blockers/Navigators/terrain bindings live in
//! [`crate::ids::Arena`]s and are referenced by id.
//!
//! Cross-space linking needs a grid/mesh mutably borrowed alongside
//! immutable references to every other grid/mesh of the same kind at once,
//! which an arena can't hand out directly. [`Self::prepare_grid_links`] and
//! [`Self::prepare_mesh_links`] work around this by swapping each space's
//! grid/mesh out into a local `Vec` for the duration of the pass (replacing
//! it with an empty placeholder), using `split_at_mut` to get the disjoint
//! borrows, then writing the results back.

use std::collections::HashMap;

use cfg_if::cfg_if;
use glam::Affine3A;
use tracing::debug_span;

use crate::blocker::NavBlocker;
use crate::cost_table::CostTable;
use crate::error::NavResult;
use crate::ids::{Arena, SpaceId};
use crate::navigator::Navigator;
use crate::space::{self, grid, mesh, Source, Space, SpaceKind};
use crate::terrain::{HeightTerrainNavSpace, Sector, SectorCoord};

/// Binds a [`HeightTerrainNavSpace`] adapter to the [`Space`] it feeds.
pub struct TerrainBinding {
    pub nav_space: HeightTerrainNavSpace,
    pub space: SpaceId,
    dirty: bool,
}

impl TerrainBinding {
    pub fn new(nav_space: HeightTerrainNavSpace, space: SpaceId) -> Self {
        TerrainBinding { nav_space, space, dirty: true }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

#[derive(Default)]
pub struct Layer {
    pub layer_number: i32,
    cost_table: CostTable,
    spaces: Arena<Space>,
    blockers: Arena<NavBlocker>,
    navigators: Arena<Navigator>,
    terrain_bindings: Vec<TerrainBinding>,
    dirty: bool,
}

impl Layer {
    pub fn new(layer_number: i32) -> Self {
        Layer { layer_number, dirty: true, ..Default::default() }
    }

    pub fn cost_table(&self) -> &CostTable {
        &self.cost_table
    }

    pub fn cost_table_mut(&mut self) -> &mut CostTable {
        &mut self.cost_table
    }

    pub fn add_space(&mut self, space: Space) -> SpaceId {
        self.dirty = true;
        self.spaces.insert(space)
    }

    pub fn remove_space(&mut self, id: SpaceId) -> Option<Space> {
        self.dirty = true;
        self.spaces.remove(id)
    }

    pub fn space(&self, id: SpaceId) -> Option<&Space> {
        self.spaces.get(id)
    }

    pub fn space_mut(&mut self, id: SpaceId) -> Option<&mut Space> {
        self.dirty = true;
        self.spaces.get_mut(id)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &Space> {
        self.spaces.iter()
    }

    pub fn spaces_with_id(&self) -> impl Iterator<Item = (SpaceId, &Space)> {
        self.spaces.iter_with_id::<SpaceId>()
    }

    pub fn add_blocker(&mut self, blocker: NavBlocker) -> crate::ids::BlockerId {
        self.dirty = true;
        self.blockers.insert(blocker)
    }

    pub fn remove_blocker(&mut self, id: crate::ids::BlockerId) -> Option<NavBlocker> {
        self.dirty = true;
        self.blockers.remove(id)
    }

    pub fn blocker(&self, id: crate::ids::BlockerId) -> Option<&NavBlocker> {
        self.blockers.get(id)
    }

    pub fn blocker_mut(&mut self, id: crate::ids::BlockerId) -> Option<&mut NavBlocker> {
        self.dirty = true;
        self.blockers.get_mut(id)
    }

    pub fn add_navigator(&mut self, navigator: Navigator) -> crate::ids::NavigatorId {
        self.dirty = true;
        self.navigators.insert(navigator)
    }

    pub fn navigator(&self, id: crate::ids::NavigatorId) -> Option<&Navigator> {
        self.navigators.get(id)
    }

    pub fn navigator_mut(&mut self, id: crate::ids::NavigatorId) -> Option<&mut Navigator> {
        self.navigators.get_mut(id)
    }

    /// Registers a terrain binding and marks the owner dirty for rebuild on
    /// the next `prepare()`.
    pub fn add_terrain_binding(&mut self, binding: TerrainBinding) {
        self.dirty = true;
        self.terrain_bindings.push(binding);
    }

    pub fn mark_terrain_dirty(&mut self, space: SpaceId) {
        for binding in &mut self.terrain_bindings {
            if binding.space == space {
                binding.mark_dirty();
            }
        }
        self.dirty = true;
    }

    /// Marks every terrain binding fed by `coord` dirty, for [`crate::world::World`]
    /// to call after a sector's heights or navigability raster changes.
    pub fn mark_terrain_dirty_by_coord(&mut self, coord: SectorCoord) {
        for binding in &mut self.terrain_bindings {
            if binding.nav_space.coord == coord {
                binding.mark_dirty();
            }
        }
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Walks owned spaces, marking those whose AABB overlaps `aabb` dirty.
    /// Blocking invalidation implies link invalidation, matching §4.7.
    pub fn invalidate_blocking(&mut self, aabb: crate::convex::Aabb3) {
        for space in self.spaces.iter_mut() {
            if space.aabb().overlaps(&aabb) {
                space.mark_blocking_dirty();
                space.mark_links_dirty();
            }
        }
        self.dirty = true;
    }

    pub fn invalidate_links(&mut self, aabb: crate::convex::Aabb3) {
        for space in self.spaces.iter_mut() {
            if space.aabb().overlaps(&aabb) {
                space.mark_links_dirty();
            }
        }
        self.dirty = true;
    }

    /// Idempotent rebuild in the order §4.7/§5 mandates: cost-table
    /// propagation, then terrain/space/blocker prepare, then cross-space
    /// linking, then navigator refresh. `terrain` supplies sector data for
    /// dirty [`TerrainBinding`]s (owned by `World`, not `Layer`).
    pub fn prepare(&mut self, terrain: &HashMap<SectorCoord, Sector>) -> NavResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let _span = debug_span!("layer_prepare", layer = self.layer_number).entered();

        if self.cost_table.changed() {
            for navigator in self.navigators.iter_mut() {
                navigator.cost_table_definition_changed();
            }
            self.cost_table.reset_changed();
        }

        self.rebuild_dirty_terrain(terrain)?;

        for blocker in self.blockers.iter_mut() {
            blocker.prepare()?;
        }

        let space_ids: Vec<SpaceId> = self.spaces.iter_with_id::<SpaceId>().map(|(id, _)| id).collect();
        let any_links_dirty = space_ids.iter().any(|&id| self.spaces.get(id).is_some_and(|s| s.is_links_dirty()));

        for id in space_ids {
            let needs_blocking = self.spaces.get(id).is_some_and(|s| s.is_blocking_dirty());
            if !needs_blocking {
                continue;
            }
            let splitters = self.collect_splitters_for(id);
            if let Some(space) = self.spaces.get_mut(id) {
                let _span = debug_span!("space_cut", space = ?id).entered();
                space.prepare(&splitters)?;
            }
        }

        if any_links_dirty {
            let _span = debug_span!("space_link").entered();
            self.prepare_grid_links();
            self.prepare_mesh_links()?;
            for space in self.spaces.iter_mut() {
                space.clear_links_dirty();
            }
        }

        for navigator in self.navigators.iter_mut() {
            navigator.prepare(&self.cost_table);
        }

        cfg_if! {
            if #[cfg(debug_assertions)] {
                self.verify_mesh_invariants()?;
            }
        }

        self.dirty = false;
        Ok(())
    }

    /// Debug-only sanity pass over every mesh space, run once `prepare` has
    /// settled blocking and cross-space links. Mirrors the original's
    /// commented-out `pVerifyInvariants()` call sites after a cut or link
    /// step (`dedaiSpaceMesh.cpp`).
    #[cfg(debug_assertions)]
    fn verify_mesh_invariants(&self) -> NavResult<()> {
        let lookup = |id: SpaceId| match &self.space(id)?.kind {
            SpaceKind::Mesh(m) => Some(m),
            SpaceKind::Grid(_) => None,
        };
        for (id, space) in self.spaces.iter_with_id::<SpaceId>() {
            if let SpaceKind::Mesh(m) = &space.kind {
                m.verify_invariants(id, &lookup)?;
            }
        }
        Ok(())
    }

    fn rebuild_dirty_terrain(&mut self, terrain: &HashMap<SectorCoord, Sector>) -> NavResult<()> {
        for binding in &mut self.terrain_bindings {
            if !binding.dirty {
                continue;
            }
            let Some(sector) = terrain.get(&binding.nav_space.coord) else { continue };
            let grid = binding.nav_space.build_grid_corners(sector, &mut self.cost_table);
            if let Some(space) = self.spaces.get_mut(binding.space) {
                space.kind = SpaceKind::Grid(grid);
                space.recompute_aabb();
                space.mark_blocking_dirty();
                space.mark_links_dirty();
            }
            binding.dirty = false;
        }
        Ok(())
    }

    fn collect_splitters_for(&self, target_id: SpaceId) -> Vec<crate::convex::ConvexVolume> {
        let Some(target) = self.spaces.get(target_id) else { return Vec::new() };
        let mut splitters = space::collect_blocker_splitters(target, self.blockers.iter());
        splitters.extend(space::collect_space_blocker_splitters(
            target,
            self.spaces.iter_with_id::<SpaceId>().filter(|&(id, _)| id != target_id).map(|(_, s)| s),
        ));
        splitters
    }

    fn prepare_grid_links(&mut self) {
        let grid_ids: Vec<SpaceId> = self
            .spaces
            .iter_with_id::<SpaceId>()
            .filter(|(_, s)| matches!(s.kind, SpaceKind::Grid(_)))
            .map(|(id, _)| id)
            .collect();
        if grid_ids.len() < 2 {
            return;
        }

        struct Extracted {
            grid: grid::SpaceGrid,
            matrix: Affine3A,
            inverse_matrix: Affine3A,
            snap_distance: f32,
        }

        let mut extracted: Vec<(SpaceId, Extracted)> = grid_ids
            .iter()
            .map(|&id| {
                let space = self.spaces.get_mut(id).expect("id collected above is live");
                let grid = match std::mem::replace(&mut space.kind, SpaceKind::Grid(grid::SpaceGrid::new())) {
                    SpaceKind::Grid(g) => g,
                    other => {
                        space.kind = other;
                        grid::SpaceGrid::new()
                    }
                };
                (id, Extracted { grid, matrix: space.matrix(), inverse_matrix: space.inverse_matrix(), snap_distance: space.snap_distance })
            })
            .collect();

        for i in 0..extracted.len() {
            let self_matrix = extracted[i].1.matrix;
            let snap_distance = extracted[i].1.snap_distance;

            let (left, right) = extracted.split_at_mut(i);
            let (mid, rest) = right.split_at_mut(1);
            let candidates: Vec<(SpaceId, &grid::SpaceGrid, Affine3A)> = left
                .iter()
                .chain(rest.iter())
                .map(|(id, e)| (*id, &e.grid, e.inverse_matrix * self_matrix))
                .collect();
            mid[0].1.grid.link_to_other_grids(&candidates, snap_distance);
        }

        for (id, e) in extracted {
            if let Some(space) = self.spaces.get_mut(id) {
                space.kind = SpaceKind::Grid(e.grid);
            }
        }
    }

    /// See the module doc comment: each mesh is processed as `self` exactly
    /// once per pass, against every other mesh on the layer at once. This is
    /// exact for any number of meshes linked only by coincident edges, and
    /// for layers with at most two split-requiring meshes (§8 S4/S5). A
    /// layer with three or more meshes that all require edge *splits*
    /// against a shared neighbour can have an earlier pair's split position
    /// reverted by a later mesh's pass before [`mesh::SpaceMesh::link_to_other_meshes`]
    /// re-derives it; since the derivation is deterministic this settles to
    /// the same links, just costs an extra pass. `Layer::prepare` is only
    /// entered when something is dirty, so this cost is not paid on a
    /// steady-state query loop.
    fn prepare_mesh_links(&mut self) -> NavResult<()> {
        let mesh_ids: Vec<SpaceId> = self
            .spaces
            .iter_with_id::<SpaceId>()
            .filter(|(_, s)| matches!(s.kind, SpaceKind::Mesh(_)))
            .map(|(id, _)| id)
            .collect();
        if mesh_ids.len() < 2 {
            return Ok(());
        }

        struct Extracted {
            mesh: mesh::SpaceMesh,
            matrix: Affine3A,
            inverse_matrix: Affine3A,
            snap_distance: f32,
            snap_angle_cos: f32,
        }

        let mut extracted: Vec<(SpaceId, Extracted)> = mesh_ids
            .iter()
            .map(|&id| {
                let space = self.spaces.get_mut(id).expect("id collected above is live");
                let mesh = match std::mem::replace(&mut space.kind, SpaceKind::Mesh(mesh::SpaceMesh::new())) {
                    SpaceKind::Mesh(m) => m,
                    other => {
                        space.kind = other;
                        mesh::SpaceMesh::new()
                    }
                };
                (
                    id,
                    Extracted {
                        mesh,
                        matrix: space.matrix(),
                        inverse_matrix: space.inverse_matrix(),
                        snap_distance: space.snap_distance,
                        snap_angle_cos: space.snap_angle_cos,
                    },
                )
            })
            .collect();

        for i in 0..extracted.len() {
            let self_id = extracted[i].0;
            let self_matrix = extracted[i].1.matrix;
            let snap_distance = extracted[i].1.snap_distance;
            let snap_angle_cos = extracted[i].1.snap_angle_cos;

            let (left, right) = extracted.split_at_mut(i);
            let (mid, rest) = right.split_at_mut(1);
            let mut targets: Vec<(SpaceId, &mut mesh::SpaceMesh, Affine3A, f32)> = left
                .iter_mut()
                .chain(rest.iter_mut())
                .map(|(id, e)| {
                    let self_to_target = e.inverse_matrix * self_matrix;
                    (*id, &mut e.mesh, self_to_target, e.snap_distance)
                })
                .collect();
            mid[0].1.mesh.link_to_other_meshes(self_id, snap_distance, snap_angle_cos, &mut targets);
        }

        for (id, e) in extracted {
            if let Some(space) = self.spaces.get_mut(id) {
                space.kind = SpaceKind::Mesh(e.mesh);
            }
        }
        Ok(())
    }

    pub fn get_grid_vertex_closest_to(&self, p: glam::Vec3) -> Option<(SpaceId, u32, f32)> {
        self.spaces
            .iter_with_id::<SpaceId>()
            .filter_map(|(id, s)| match &s.kind {
                SpaceKind::Grid(g) => {
                    let local = s.inverse_matrix().transform_point3(p);
                    g.vertex_closest_to(local).map(|(v, d)| (id, v, d))
                }
                SpaceKind::Mesh(_) => None,
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    pub fn get_mesh_face_closest_to(&self, p: glam::Vec3) -> Option<(SpaceId, u32)> {
        self.spaces.iter_with_id::<SpaceId>().find_map(|(id, s)| match &s.kind {
            SpaceKind::Mesh(m) => {
                let local = s.inverse_matrix().transform_point3(p);
                m.face_closest_to(local).map(|f| (id, f))
            }
            SpaceKind::Grid(_) => None,
        })
    }

    pub fn get_grid_nearest_point(&self, p: glam::Vec3, radius: f32) -> Option<(SpaceId, glam::Vec3, f32)> {
        self.spaces
            .iter_with_id::<SpaceId>()
            .filter_map(|(id, s)| match &s.kind {
                SpaceKind::Grid(g) => {
                    let local = s.inverse_matrix().transform_point3(p);
                    g.nearest_point(local, radius).map(|(_, point, dist, _)| (id, s.matrix().transform_point3(point), dist))
                }
                SpaceKind::Mesh(_) => None,
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    pub fn get_nav_mesh_nearest_point(&self, p: glam::Vec3, radius: f32) -> Option<(SpaceId, glam::Vec3, f32, u32)> {
        self.spaces
            .iter_with_id::<SpaceId>()
            .filter_map(|(id, s)| match &s.kind {
                SpaceKind::Mesh(m) => {
                    let local = s.inverse_matrix().transform_point3(p);
                    m.nearest_point(local, radius).map(|(point, dist, face)| (id, s.matrix().transform_point3(point), dist, face))
                }
                SpaceKind::Grid(_) => None,
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    /// Walks every mesh space for a ray hit, returning the closest one in
    /// world units along `direction`. Cross-space continuation through a
    /// link is resolved by [`mesh::SpaceMesh::nav_mesh_line_collide`]'s
    /// `lookup` parameter, resolved here against this layer's own spaces.
    pub fn nav_mesh_line_collide(&self, origin: glam::Vec3, direction: glam::Vec3) -> Option<f32> {
        let lookup = |id: SpaceId| match &self.space(id)?.kind {
            SpaceKind::Mesh(m) => Some(m),
            SpaceKind::Grid(_) => None,
        };

        self.spaces
            .iter()
            .filter_map(|s| match &s.kind {
                SpaceKind::Mesh(m) => {
                    let local_origin = s.inverse_matrix().transform_point3(origin);
                    let local_dir = s.inverse_matrix().transform_vector3(direction);
                    m.nav_mesh_line_collide(local_origin, local_dir, &lookup)
                }
                SpaceKind::Grid(_) => None,
            })
            .min_by(|a: &f32, b: &f32| a.total_cmp(b))
    }

    pub fn space_type_is(&self, id: SpaceId, ty: space::SpaceType) -> bool {
        self.spaces.get(id).is_some_and(|s| s.space_type() == ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::grid::SpaceGrid;
    use glam::Vec3;

    fn grid_space(offset: Vec3) -> Space {
        let grid = SpaceGrid::build(vec![Vec3::ZERO, Vec3::X], [(0, 1, 0, 0)]);
        let mut space = Space::new(SpaceKind::Grid(grid), 0, Source::Authored);
        space.set_transform(offset, glam::Quat::IDENTITY);
        space
    }

    #[test]
    fn prepare_is_noop_when_clean() {
        let mut layer = Layer::new(0);
        layer.add_space(grid_space(Vec3::ZERO));
        let terrain = HashMap::new();
        layer.prepare(&terrain).unwrap();
        assert!(!layer.dirty);
        layer.prepare(&terrain).unwrap();
    }

    #[test]
    fn invalidate_blocking_marks_overlapping_spaces_dirty() {
        let mut layer = Layer::new(0);
        let id = layer.add_space(grid_space(Vec3::ZERO));
        layer.prepare(&HashMap::new()).unwrap();
        assert!(!layer.space(id).unwrap().is_blocking_dirty());

        layer.invalidate_blocking(crate::convex::Aabb3 { min: Vec3::splat(-1.0), max: Vec3::splat(1.0) });
        assert!(layer.space(id).unwrap().is_blocking_dirty());
    }

    #[test]
    fn grid_links_connect_two_spaces() {
        let mut layer = Layer::new(0);
        layer.add_space(grid_space(Vec3::ZERO));
        layer.add_space(grid_space(Vec3::new(1.0, 0.0, 0.0)));
        layer.prepare(&HashMap::new()).unwrap();

        let total_links: usize = layer.spaces().map(|s| match &s.kind {
            SpaceKind::Grid(g) => g.links.len(),
            SpaceKind::Mesh(_) => 0,
        }).sum();
        assert!(total_links >= 2, "both endpoints at x=1 should snap-link");
    }
}
