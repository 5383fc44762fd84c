//! Top-level container of Layers; routes lifecycle events and owns the
//! HeightTerrain binding (§3, component 13).
//!
//! Grounded on the teacher's plugin-root resource ownership (top-level
//! resources in `lib.rs`), minus the ECS scheduling that owns them there:
//! `World` is a plain struct the host calls into directly, matching §5's
//! "single-threaded, cooperatively driven by explicit calls". Layers are
//! created on first reference by layer number, as §3 specifies; blocker and
//! terrain mutations are routed here so the affected `Layer`'s dirty bits
//! get set before the next `prepare()`.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::blocker::NavBlocker;
use crate::convex::shape::Shape;
use crate::error::NavResult;
use crate::ids::{BlockerId, IdKind, NavigatorId, SpaceId, TerrainSpaceId};
use crate::layer::{Layer, TerrainBinding};
use crate::navigator::Navigator;
use crate::space::grid::SpaceGrid;
use crate::space::{Source, Space, SpaceKind, SpaceType};
use crate::terrain::{HeightTerrain, HeightTerrainNavSpace, NavTerrainType, Sector, SectorCoord};

#[derive(Default)]
pub struct World {
    layers: HashMap<i32, Layer>,
    terrain: HeightTerrain,
    next_terrain_space_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer_number: i32) -> Option<&Layer> {
        self.layers.get(&layer_number)
    }

    /// Returns the layer for `layer_number`, creating an empty one on first
    /// reference.
    pub fn layer_mut(&mut self, layer_number: i32) -> &mut Layer {
        self.layers.entry(layer_number).or_insert_with(|| Layer::new(layer_number))
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn terrain(&self) -> &HeightTerrain {
        &self.terrain
    }

    pub fn add_space(&mut self, layer_number: i32, space: Space) -> SpaceId {
        self.layer_mut(layer_number).add_space(space)
    }

    pub fn remove_space(&mut self, layer_number: i32, id: SpaceId) -> Option<Space> {
        self.layers.get_mut(&layer_number)?.remove_space(id)
    }

    pub fn add_navigator(&mut self, layer_number: i32, navigator: Navigator) -> NavigatorId {
        self.layer_mut(layer_number).add_navigator(navigator)
    }

    pub fn navigator(&self, layer_number: i32, id: NavigatorId) -> Option<&Navigator> {
        self.layers.get(&layer_number)?.navigator(id)
    }

    pub fn navigator_mut(&mut self, layer_number: i32, id: NavigatorId) -> Option<&mut Navigator> {
        self.layers.get_mut(&layer_number)?.navigator_mut(id)
    }

    pub fn add_blocker(&mut self, layer_number: i32, mut blocker: NavBlocker) -> NavResult<BlockerId> {
        blocker.prepare()?;
        let aabb = blocker.aabb();
        let layer = self.layer_mut(layer_number);
        let id = layer.add_blocker(blocker);
        layer.invalidate_blocking(aabb);
        Ok(id)
    }

    pub fn remove_blocker(&mut self, layer_number: i32, id: BlockerId) -> Option<NavBlocker> {
        let layer = self.layers.get_mut(&layer_number)?;
        let blocker = layer.remove_blocker(id)?;
        layer.invalidate_blocking(blocker.aabb());
        Some(blocker)
    }

    /// Moves a blocker and immediately retessellates it so the spaces it now
    /// overlaps (the union of its old and new AABB) get re-cut on the next
    /// `prepare()`.
    pub fn set_blocker_transform(&mut self, layer_number: i32, id: BlockerId, position: Vec3, orientation: Quat) -> NavResult<()> {
        let layer = self.layer_mut(layer_number);
        let old_aabb = layer.blocker(id).map(|b| b.aabb());
        let Some(blocker) = layer.blocker_mut(id) else { return Ok(()) };
        blocker.set_transform(position, orientation);
        blocker.prepare()?;
        let new_aabb = blocker.aabb();
        layer.invalidate_blocking(old_aabb.map(|a| a.union(new_aabb)).unwrap_or(new_aabb));
        Ok(())
    }

    pub fn set_blocker_shapes(&mut self, layer_number: i32, id: BlockerId, shapes: Vec<Shape>) -> NavResult<()> {
        let layer = self.layer_mut(layer_number);
        let old_aabb = layer.blocker(id).map(|b| b.aabb());
        let Some(blocker) = layer.blocker_mut(id) else { return Ok(()) };
        blocker.set_shapes(shapes);
        blocker.prepare()?;
        let new_aabb = blocker.aabb();
        layer.invalidate_blocking(old_aabb.map(|a| a.union(new_aabb)).unwrap_or(new_aabb));
        Ok(())
    }

    /// Registers a terrain sector, replacing any sector already at `coord`.
    pub fn add_terrain_sector(&mut self, coord: SectorCoord, sector: Sector) {
        self.terrain.add_sector(coord, sector);
    }

    pub fn set_terrain_heights(&mut self, coord: SectorCoord, heights: Vec<f32>) {
        self.terrain.set_heights(coord, heights);
    }

    pub fn set_terrain_navigability(&mut self, coord: SectorCoord, types: Vec<NavTerrainType>) {
        self.terrain.set_navigability(coord, types);
    }

    /// Creates a grid-type [`Space`] on `layer_number` fed by the sector at
    /// `coord`, bound so future height/navigability edits to that sector
    /// rebuild it. The space starts empty; its real content is built on the
    /// next [`Self::prepare`].
    pub fn bind_terrain_nav_space(&mut self, layer_number: i32, coord: SectorCoord) -> SpaceId {
        let terrain_id = TerrainSpaceId::new(self.next_terrain_space_id, 0);
        self.next_terrain_space_id += 1;

        let layer = self.layer_mut(layer_number);
        let space_id = layer.add_space(Space::new(SpaceKind::Grid(SpaceGrid::new()), layer_number, Source::Terrain(terrain_id)));
        layer.add_terrain_binding(TerrainBinding::new(HeightTerrainNavSpace::new(coord), space_id));
        layer.mark_terrain_dirty_by_coord(coord);
        space_id
    }

    pub fn space_type_of(&self, layer_number: i32, id: SpaceId) -> Option<SpaceType> {
        self.layers.get(&layer_number)?.space(id).map(|s| s.space_type())
    }

    /// Prepares every layer that has pending work: routes any terrain
    /// sectors whose heights/navigability changed since the last call into
    /// the layers with a binding on that sector, then rebuilds each layer in
    /// turn (blocking → grid/mesh rebuild → cross-space linking → navigator
    /// refresh, per §4.7).
    pub fn prepare(&mut self) -> NavResult<()> {
        for coord in self.terrain.take_dirty_sectors() {
            for layer in self.layers.values_mut() {
                layer.mark_terrain_dirty_by_coord(coord);
            }
        }
        for layer in self.layers.values_mut() {
            layer.prepare(&self.terrain.sectors)?;
        }
        Ok(())
    }
}
