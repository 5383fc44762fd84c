//! Height-terrain navigation bridge (expanded §4.11).
//!
//! Grounded on `original_source/.../heightterrain/dedaiHeightTerrain{,Sector,
//! NavSpace}` for the sector/raster shape, and on the teacher's
//! `get_neighbour_index` (`lib.rs`) for the 4-neighbour raster walk that
//! `HeightTerrainNavSpace::build_grid_corners` performs.

use glam::Vec3;
use std::collections::HashMap;

use crate::cost_table::CostTable;
use crate::space::grid::SpaceGrid;

/// A cell's navigability: `Free` means impassable / not part of any
/// navigation space (no grid vertex is emitted for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavTerrainType {
    #[default]
    Free,
    Typed(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorCoord {
    pub x: i32,
    pub z: i32,
}

#[derive(Debug, Clone)]
pub struct Sector {
    pub resolution: usize,
    pub sector_size: f32,
    pub heights: Vec<f32>,
    pub types: Vec<NavTerrainType>,
    dirty: bool,
}

impl Sector {
    pub fn new(resolution: usize, sector_size: f32) -> Self {
        Sector {
            resolution,
            sector_size,
            heights: vec![0.0; resolution * resolution],
            types: vec![NavTerrainType::Free; resolution * resolution],
            dirty: true,
        }
    }

    pub fn set_heights(&mut self, heights: Vec<f32>) {
        debug_assert_eq!(heights.len(), self.resolution * self.resolution);
        self.heights = heights;
        self.dirty = true;
    }

    pub fn set_navigability(&mut self, types: Vec<NavTerrainType>) {
        debug_assert_eq!(types.len(), self.resolution * self.resolution);
        self.types = types;
        self.dirty = true;
    }

    fn pos_scale(&self) -> f32 {
        self.sector_size / (self.resolution as f32 - 1.0)
    }

    fn pos_offset(&self) -> f32 {
        self.sector_size * 0.5
    }

    /// World-local position of raster cell `(x, z)`, matching §6's mapping
    /// `(x*scale - offset, height, offset - z*scale)`.
    pub fn cell_position(&self, x: usize, z: usize) -> Vec3 {
        let scale = self.pos_scale();
        let offset = self.pos_offset();
        Vec3::new(
            scale * x as f32 - offset,
            self.heights[z * self.resolution + x],
            offset - scale * z as f32,
        )
    }

    /// Bilinear height sample at a local `(x, z)` position within the sector.
    pub fn height_at(&self, local_xy: (f32, f32)) -> f32 {
        let scale = self.pos_scale();
        let offset = self.pos_offset();
        let fx = ((local_xy.0 + offset) / scale).clamp(0.0, self.resolution as f32 - 1.0);
        let fz = ((offset - local_xy.1) / scale).clamp(0.0, self.resolution as f32 - 1.0);
        let x0 = fx.floor() as usize;
        let z0 = fz.floor() as usize;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let z1 = (z0 + 1).min(self.resolution - 1);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = self.heights[z0 * self.resolution + x0];
        let h10 = self.heights[z0 * self.resolution + x1];
        let h01 = self.heights[z1 * self.resolution + x0];
        let h11 = self.heights[z1 * self.resolution + x1];
        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    pub fn world_origin(&self, coord: SectorCoord) -> Vec3 {
        Vec3::new(coord.x as f32 * self.sector_size, 0.0, coord.z as f32 * self.sector_size)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeightTerrain {
    pub sectors: HashMap<SectorCoord, Sector>,
    dirty_sectors: Vec<SectorCoord>,
}

impl HeightTerrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sector(&mut self, coord: SectorCoord, sector: Sector) {
        self.sectors.insert(coord, sector);
        self.dirty_sectors.push(coord);
    }

    pub fn set_heights(&mut self, coord: SectorCoord, heights: Vec<f32>) {
        if let Some(sector) = self.sectors.get_mut(&coord) {
            sector.set_heights(heights);
            self.dirty_sectors.push(coord);
        }
    }

    pub fn set_navigability(&mut self, coord: SectorCoord, types: Vec<NavTerrainType>) {
        if let Some(sector) = self.sectors.get_mut(&coord) {
            sector.set_navigability(types);
            self.dirty_sectors.push(coord);
        }
    }

    pub fn take_dirty_sectors(&mut self) -> Vec<SectorCoord> {
        std::mem::take(&mut self.dirty_sectors)
    }
}

/// Adapter binding a [`Sector`]'s nav-type raster into a [`SpaceGrid`].
pub struct HeightTerrainNavSpace {
    pub coord: SectorCoord,
}

impl HeightTerrainNavSpace {
    pub fn new(coord: SectorCoord) -> Self {
        HeightTerrainNavSpace { coord }
    }

    /// Emits one vertex per walkable cell plus 4-neighbour edges to
    /// adjacent walkable cells, translating each cell's type through
    /// `cost_table`. Mirrors the teacher's `get_neighbour_index` 4-direction
    /// indexing (left/forward/right/back), restricted here to the sector's
    /// own raster (cross-sector linking happens via `link_to_other_grids`,
    /// not this build step).
    pub fn build_grid_corners(&self, sector: &Sector, cost_table: &mut CostTable) -> SpaceGrid {
        let res = sector.resolution;
        let mut vertex_of_cell: Vec<Option<u32>> = vec![None; res * res];
        let mut vertices = Vec::new();

        for z in 0..res {
            for x in 0..res {
                if sector.types[z * res + x] == NavTerrainType::Free {
                    continue;
                }
                vertex_of_cell[z * res + x] = Some(vertices.len() as u32);
                vertices.push(sector.cell_position(x, z));
            }
        }

        let mut edges = Vec::new();
        for z in 0..res {
            for x in 0..res {
                let Some(v) = vertex_of_cell[z * res + x] else { continue };
                let cell_type = sector.types[z * res + x];
                let type_index = type_index_of(cell_type, cost_table);

                // Only emit +x and +z neighbours; the reverse direction is
                // picked up when that neighbour is itself visited.
                if x + 1 < res {
                    if let Some(v2) = vertex_of_cell[z * res + x + 1] {
                        edges.push((v, v2, type_index, type_index));
                    }
                }
                if z + 1 < res {
                    if let Some(v2) = vertex_of_cell[(z + 1) * res + x] {
                        edges.push((v, v2, type_index, type_index));
                    }
                }
            }
        }

        SpaceGrid::build(vertices, edges)
    }
}

fn type_index_of(ty: NavTerrainType, cost_table: &mut CostTable) -> u32 {
    match ty {
        NavTerrainType::Free => 0,
        NavTerrainType::Typed(n) => cost_table.index_of_or_insert(n) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_cells_produce_no_vertex() {
        let mut sector = Sector::new(2, 1.0);
        sector.set_navigability(vec![NavTerrainType::Typed(1); 4]);
        sector.types[0] = NavTerrainType::Free;
        let mut table = CostTable::new();
        let grid = HeightTerrainNavSpace::new(SectorCoord { x: 0, z: 0 }).build_grid_corners(&sector, &mut table);
        assert_eq!(grid.vertices.len(), 3);
    }

    #[test]
    fn adjacent_walkable_cells_get_an_edge() {
        let mut sector = Sector::new(2, 1.0);
        sector.set_navigability(vec![NavTerrainType::Typed(1); 4]);
        let mut table = CostTable::new();
        let grid = HeightTerrainNavSpace::new(SectorCoord { x: 0, z: 0 }).build_grid_corners(&sector, &mut table);
        assert_eq!(grid.vertices.len(), 4);
        assert_eq!(grid.edges.len(), 4);
    }

    #[test]
    fn bilinear_height_sample_matches_corner_at_grid_points() {
        let mut sector = Sector::new(2, 1.0);
        sector.set_heights(vec![0.0, 2.0, 4.0, 6.0]);
        let offset = sector.pos_offset();
        assert_eq!(sector.height_at((-offset, offset)), 0.0);
    }
}
