//! A* pathfinding over [`crate::space::grid::SpaceGrid`] and
//! [`crate::space::mesh::SpaceMesh`] (§4.8, §4.9).

pub mod funnel;
pub mod grid;
pub mod mesh;
