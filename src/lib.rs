//! Runtime navigation subsystem: layered spaces, dynamic blockers,
//! cross-space linking and A* pathfinding over grids and nav-meshes.
//!
//! The layered model, leaves first: a [`convex`] volume library backs
//! blocker shapes ([`blocker`]) and mesh face cutting
//! ([`space::mesh`]/[`space::grid`]); a [`Space`](space::Space) owns one of
//! those two representations and is scoped into a [`Layer`](layer::Layer),
//! which also owns the [`cost_table::CostTable`] every [`Navigator`](navigator::Navigator)
//! remaps its per-type costs through; [`World`](world::World) owns an
//! ordered set of layers plus the optional [`terrain::HeightTerrain`]
//! bridge. Pathfinding lives in [`pathfind`]; the control channel and
//! debug-draw collaborator interface in [`debug`].

pub mod blocker;
pub mod convex;
pub mod cost_table;
pub mod debug;
pub mod error;
pub mod ids;
pub mod layer;
pub mod navigator;
pub mod pathfind;
pub mod space;
pub mod terrain;
pub mod world;

pub use error::{NavError, NavResult};
pub use ids::{BlockerId, NavigatorId, SpaceId};
pub use layer::Layer;
pub use navigator::{Navigator, Path, PathCollideCursor};
pub use space::{Source, Space, SpaceKind, SpaceType};
pub use world::World;
