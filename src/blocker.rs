//! Dynamic navigation blocker (§3, §4.6's splitter sources).
//!
//! Grounded on `original_source/.../blocker/dedaiNavBlocker.{h,cpp}`: a
//! transform, a shape list tessellated into world-space convex volumes on
//! demand, and the filters `space.Prepare()`'s splitter collection applies
//! (space-type match, layer match, priority, AABB overlap) - those filters
//! live in [`crate::space::collect_blocker_splitters`] since they need both
//! sides; this module only holds the blocker's own data.

use glam::{Affine3A, Quat, Vec3};

use crate::convex::shape::{tessellate, Shape};
use crate::convex::{Aabb3, ConvexVolume};
use crate::error::NavResult;
use crate::space::SpaceType;

#[derive(Debug, Clone)]
pub struct NavBlocker {
    pub position: Vec3,
    pub orientation: Quat,
    pub shapes: Vec<Shape>,
    pub blocking_priority: i32,
    pub layer_number: i32,
    pub enabled: bool,
    pub space_type: SpaceType,

    matrix: Affine3A,
    volumes: Vec<ConvexVolume>,
    aabb: Aabb3,
    dirty: bool,
}

impl NavBlocker {
    pub fn new(space_type: SpaceType, layer_number: i32) -> Self {
        NavBlocker {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            shapes: Vec::new(),
            blocking_priority: 0,
            layer_number,
            enabled: true,
            space_type,
            matrix: Affine3A::IDENTITY,
            volumes: Vec::new(),
            aabb: Aabb3::EMPTY,
            dirty: true,
        }
    }

    pub fn set_transform(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
        self.dirty = true;
    }

    pub fn set_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-tessellates shapes into world-space convex volumes and recomputes
    /// the world AABB. Idempotent when clean.
    pub fn prepare(&mut self) -> NavResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.matrix = Affine3A::from_rotation_translation(self.orientation, self.position);
        self.volumes = self
            .shapes
            .iter()
            .map(|s| tessellate(s).map(|v| v.transformed(&self.matrix)))
            .collect::<NavResult<Vec<_>>>()?;
        self.aabb = self.volumes.iter().fold(Aabb3::EMPTY, |a, v| a.union(v.aabb));
        self.dirty = false;
        Ok(())
    }

    pub fn convex_volumes(&self) -> &[ConvexVolume] {
        &self.volumes
    }

    pub fn aabb(&self) -> Aabb3 {
        self.aabb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convex::shape::Shape;

    #[test]
    fn prepare_clears_dirty_and_builds_volumes() {
        let mut blocker = NavBlocker::new(SpaceType::Mesh, 0);
        blocker.set_shapes(vec![Shape::Box { half_extents: Vec3::splat(0.5) }]);
        blocker.prepare().unwrap();
        assert!(!blocker.is_dirty());
        assert_eq!(blocker.convex_volumes().len(), 1);
    }

    #[test]
    fn disabled_blocker_still_prepares() {
        let mut blocker = NavBlocker::new(SpaceType::Grid, 0);
        blocker.enabled = false;
        blocker.set_shapes(vec![Shape::sphere(1.0)]);
        blocker.prepare().unwrap();
        assert_eq!(blocker.convex_volumes().len(), 1);
    }
}
