//! Owner/coordinator around a [`grid::SpaceGrid`] or [`mesh::SpaceMesh`] (§4.6).
//!
//! Grounded on `original_source/.../spaces/dedaiSpace.{h,cpp}`: a thin shell
//! holding the authored transform, blocker shape, dirty bits and the
//! splitter-collection filters (`AddBlockerSplitters`/
//! `AddSpaceBlockerSplitters` - same layer, equal-or-higher priority,
//! overlapping AABB). The owner-graph pointers that source walks
//! (`dedaiWorld`/`dedaiLayer`/`dedaiNavBlocker` linked lists) are replaced by
//! id-indexed arenas (`crate::ids`); this module only holds the per-space
//! data and is orchestrated by [`crate::layer::Layer`].

pub mod grid;
pub mod mesh;

use glam::{Affine3A, Quat, Vec3};

use crate::blocker::NavBlocker;
use crate::convex::shape::{tessellate, Shape};
use crate::convex::{Aabb3, ConvexVolume};
use crate::error::NavResult;
use crate::ids::TerrainSpaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceType {
    Grid,
    Mesh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Authored,
    Terrain(TerrainSpaceId),
}

#[derive(Debug, Clone)]
pub enum SpaceKind {
    Grid(grid::SpaceGrid),
    Mesh(mesh::SpaceMesh),
}

impl SpaceKind {
    pub fn space_type(&self) -> SpaceType {
        match self {
            SpaceKind::Grid(_) => SpaceType::Grid,
            SpaceKind::Mesh(_) => SpaceType::Mesh,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Space {
    pub source: Source,
    pub layer_number: i32,
    pub position: Vec3,
    pub orientation: Quat,
    pub snap_distance: f32,
    /// Cosine of the maximum angle between two face normals that may still
    /// link (§3's "snap angle", stored pre-converted for the dot-product
    /// test in §4.5/§4.4 linking).
    pub snap_angle_cos: f32,
    pub blocking_priority: i32,
    pub blocker_shapes: Vec<Shape>,
    pub kind: SpaceKind,

    matrix: Affine3A,
    inverse_matrix: Affine3A,
    aabb: Aabb3,
    blocker_volumes: Vec<ConvexVolume>,

    dirty_blocking: bool,
    dirty_links: bool,
}

impl Space {
    pub fn new(kind: SpaceKind, layer_number: i32, source: Source) -> Self {
        let mut space = Space {
            source,
            layer_number,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            snap_distance: 0.01,
            snap_angle_cos: 0.9,
            blocking_priority: 0,
            blocker_shapes: Vec::new(),
            kind,
            matrix: Affine3A::IDENTITY,
            inverse_matrix: Affine3A::IDENTITY,
            aabb: Aabb3::EMPTY,
            blocker_volumes: Vec::new(),
            dirty_blocking: true,
            dirty_links: true,
        };
        space.recompute_transform();
        space.recompute_aabb();
        space
    }

    pub fn space_type(&self) -> SpaceType {
        self.kind.space_type()
    }

    pub fn set_transform(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
        self.recompute_transform();
        self.recompute_aabb();
        self.dirty_blocking = true;
        self.dirty_links = true;
    }

    fn recompute_transform(&mut self) {
        self.matrix = Affine3A::from_rotation_translation(self.orientation, self.position);
        self.inverse_matrix = self.matrix.inverse();
    }

    pub fn matrix(&self) -> Affine3A {
        self.matrix
    }

    pub fn inverse_matrix(&self) -> Affine3A {
        self.inverse_matrix
    }

    pub fn aabb(&self) -> Aabb3 {
        self.aabb
    }

    pub fn set_blocker_shapes(&mut self, shapes: Vec<Shape>) -> NavResult<()> {
        self.blocker_shapes = shapes;
        self.recompute_blocker_volumes()?;
        self.dirty_blocking = true;
        Ok(())
    }

    fn recompute_blocker_volumes(&mut self) -> NavResult<()> {
        self.blocker_volumes.clear();
        for shape in &self.blocker_shapes {
            let local = tessellate(shape)?;
            self.blocker_volumes.push(local.transformed(&self.matrix));
        }
        Ok(())
    }

    pub fn blocker_volumes(&self) -> &[ConvexVolume] {
        &self.blocker_volumes
    }

    pub fn mark_blocking_dirty(&mut self) {
        self.dirty_blocking = true;
    }

    pub fn mark_links_dirty(&mut self) {
        self.dirty_links = true;
    }

    /// Called by [`crate::layer::Layer`] once a relink pass covering this
    /// space has completed.
    pub fn clear_links_dirty(&mut self) {
        self.dirty_links = false;
    }

    pub fn is_blocking_dirty(&self) -> bool {
        self.dirty_blocking
    }

    pub fn is_links_dirty(&self) -> bool {
        self.dirty_links
    }

    /// Purely a function of vertex positions and `matrix`, independent of
    /// blocking - callable the moment geometry or transform is known, not
    /// only from [`Self::prepare`].
    pub(crate) fn recompute_aabb(&mut self) {
        self.aabb = match &self.kind {
            SpaceKind::Grid(g) => Aabb3::from_points(g.vertices.iter().map(|v| self.matrix.transform_point3(v.position))),
            SpaceKind::Mesh(m) => Aabb3::from_points(m.vertices.iter().map(|v| self.matrix.transform_point3(v.position))),
        };
    }

    /// Rebuilds blocking against `splitters` (already transformed into this
    /// space's local coordinates by the caller). Idempotent when clean.
    pub fn prepare(&mut self, splitters: &[ConvexVolume]) -> NavResult<()> {
        if !self.dirty_blocking {
            return Ok(());
        }
        match &mut self.kind {
            SpaceKind::Grid(g) => g.update_blocking(splitters),
            SpaceKind::Mesh(m) => m.update_blocking(splitters)?,
        }
        self.recompute_aabb();
        self.dirty_blocking = false;
        self.dirty_links = true;
        Ok(())
    }
}

/// Splitter-collection filters shared by grid and mesh blocking (§4.6
/// `add_blocker_splitters` / `add_space_blocker_splitters`): same layer,
/// equal-or-higher blocking priority than `target`, overlapping AABB.
pub fn collect_blocker_splitters<'a>(target: &Space, blockers: impl Iterator<Item = &'a NavBlocker>) -> Vec<ConvexVolume> {
    blockers
        .filter(|b| b.enabled)
        .filter(|b| b.space_type == target.space_type())
        .filter(|b| b.layer_number == target.layer_number)
        .filter(|b| b.blocking_priority >= target.blocking_priority)
        .filter(|b| b.aabb().overlaps(&target.aabb))
        .flat_map(|b| b.convex_volumes().iter().cloned())
        .map(|v| retarget_volume(v, target))
        .collect()
}

pub fn collect_space_blocker_splitters<'a>(target: &Space, other_spaces: impl Iterator<Item = &'a Space>) -> Vec<ConvexVolume> {
    other_spaces
        .filter(|s| s.space_type() == target.space_type())
        .filter(|s| s.layer_number == target.layer_number)
        .filter(|s| s.blocking_priority >= target.blocking_priority)
        .filter(|s| s.aabb().overlaps(&target.aabb))
        .flat_map(|s| s.blocker_volumes.iter().cloned())
        .map(|v| retarget_volume(v, target))
        .collect()
}

/// Blocker volumes are stored in world space already (via the blocker's own
/// transform); splitter tests run in the target space's local frame.
fn retarget_volume(volume: ConvexVolume, target: &Space) -> ConvexVolume {
    volume.transformed(&target.inverse_matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::grid::SpaceGrid;

    #[test]
    fn new_space_starts_dirty() {
        let grid = SpaceGrid::build(vec![Vec3::ZERO], []);
        let space = Space::new(SpaceKind::Grid(grid), 0, Source::Authored);
        assert!(space.is_blocking_dirty());
        assert!(space.is_links_dirty());
    }

    #[test]
    fn prepare_clears_blocking_dirty_flag() {
        let grid = SpaceGrid::build(vec![Vec3::ZERO], []);
        let mut space = Space::new(SpaceKind::Grid(grid), 0, Source::Authored);
        space.prepare(&[]).unwrap();
        assert!(!space.is_blocking_dirty());
        assert!(space.is_links_dirty());
    }
}
