//! `harness = false` per Cargo.toml: plain `std::time` timing, no criterion
//! (no async/ECS test harness pulled in for a handful of A* timings).

use std::time::Instant;

use glam::{Quat, Vec3};
use navkit::convex::shape::Shape;
use navkit::navigator::Navigator;
use navkit::space::grid::SpaceGrid;
use navkit::space::mesh::{BuildFace, SpaceMesh};
use navkit::space::{SpaceKind, SpaceType};
use navkit::{Source, Space, World};

const GRID_SIDE: i32 = 32;

fn build_grid_world() -> World {
    let mut vertices = Vec::new();
    for z in 0..GRID_SIDE {
        for x in 0..GRID_SIDE {
            vertices.push(Vec3::new(x as f32, 0.0, z as f32));
        }
    }

    let index = |x: i32, z: i32| (z * GRID_SIDE + x) as u32;
    let mut edges = Vec::new();
    for z in 0..GRID_SIDE {
        for x in 0..GRID_SIDE {
            if x + 1 < GRID_SIDE {
                edges.push((index(x, z), index(x + 1, z), 0, 0));
            }
            if z + 1 < GRID_SIDE {
                edges.push((index(x, z), index(x, z + 1), 0, 0));
            }
        }
    }

    let mut world = World::new();
    world.add_space(0, Space::new(SpaceKind::Grid(SpaceGrid::build(vertices, edges)), 0, Source::Authored));
    world.prepare().unwrap();
    world
}

fn build_mesh_world(tiles_per_side: u32) -> World {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for z in 0..tiles_per_side {
        for x in 0..tiles_per_side {
            let base = vertices.len() as u32;
            vertices.push(Vec3::new(x as f32, 0.0, z as f32));
            vertices.push(Vec3::new(x as f32 + 1.0, 0.0, z as f32));
            vertices.push(Vec3::new(x as f32 + 1.0, 0.0, z as f32 + 1.0));
            vertices.push(Vec3::new(x as f32, 0.0, z as f32 + 1.0));
            faces.push(BuildFace { corners: vec![(base, 0), (base + 1, 0), (base + 2, 0), (base + 3, 0)] });
        }
    }

    let mut world = World::new();
    world.add_space(0, Space::new(SpaceKind::Mesh(SpaceMesh::build(vertices, faces).unwrap()), 0, Source::Authored));
    world.prepare().unwrap();
    world
}

fn scatter_blockers(world: &mut World, count: i32) {
    for i in 0..count {
        let mut blocker = navkit::blocker::NavBlocker::new(SpaceType::Mesh, 0);
        let x = 3.0 + (i % (GRID_SIDE - 6)) as f32;
        let z = 3.0 + (i * 3 % (GRID_SIDE - 6)) as f32;
        blocker.set_transform(Vec3::new(x, 0.0, z), Quat::IDENTITY);
        blocker.set_shapes(vec![Shape::Box { half_extents: Vec3::new(0.3, 1.0, 0.3) }]);
        world.add_blocker(0, blocker).unwrap();
    }
    world.prepare().unwrap();
}

fn time_it(label: &str, iterations: u32, mut run: impl FnMut()) {
    let start = Instant::now();
    for _ in 0..iterations {
        run();
    }
    let elapsed = start.elapsed();
    println!("{label}: {:?}/iter ({iterations} iterations, {elapsed:?} total)", elapsed / iterations);
}

fn main() {
    let grid_world = build_grid_world();
    let mut grid_nav = Navigator::new(SpaceType::Grid, 0);
    grid_nav.prepare(grid_world.layer(0).unwrap().cost_table());
    let grid_layer = grid_world.layer(0).unwrap();
    let grid_far_corner = Vec3::new((GRID_SIDE - 1) as f32, 0.0, (GRID_SIDE - 1) as f32);
    time_it("grid pathfinding, open field", 200, || {
        grid_nav.find_path(grid_layer, Vec3::ZERO, grid_far_corner);
    });

    let mesh_world_single = build_mesh_world(1);
    let mut mesh_nav_single = Navigator::new(SpaceType::Mesh, 0);
    mesh_nav_single.prepare(mesh_world_single.layer(0).unwrap().cost_table());
    let mesh_layer_single = mesh_world_single.layer(0).unwrap();
    time_it("mesh pathfinding, single face", 200, || {
        mesh_nav_single.find_path(mesh_layer_single, Vec3::new(0.1, 0.0, 0.1), Vec3::new(0.9, 0.0, 0.9));
    });

    let mesh_world_tiled = build_mesh_world(GRID_SIDE as u32);
    let mut mesh_nav_tiled = Navigator::new(SpaceType::Mesh, 0);
    mesh_nav_tiled.prepare(mesh_world_tiled.layer(0).unwrap().cost_table());
    let mesh_layer_tiled = mesh_world_tiled.layer(0).unwrap();
    let mesh_far_corner = Vec3::new((GRID_SIDE - 1) as f32 - 0.5, 0.0, (GRID_SIDE - 1) as f32 - 0.5);
    time_it("mesh pathfinding, tiled field", 200, || {
        mesh_nav_tiled.find_path(mesh_layer_tiled, Vec3::new(0.5, 0.0, 0.5), mesh_far_corner);
    });

    let mut mesh_world_blocked = build_mesh_world(GRID_SIDE as u32);
    scatter_blockers(&mut mesh_world_blocked, 20);
    let mut mesh_nav_blocked = Navigator::new(SpaceType::Mesh, 0);
    mesh_nav_blocked.prepare(mesh_world_blocked.layer(0).unwrap().cost_table());
    let mesh_layer_blocked = mesh_world_blocked.layer(0).unwrap();
    time_it("mesh pathfinding, tiled field with blockers", 200, || {
        mesh_nav_blocked.find_path(mesh_layer_blocked, Vec3::new(0.5, 0.0, 0.5), mesh_far_corner);
    });
}
