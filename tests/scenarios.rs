//! End-to-end scenarios driven entirely through the public `World`/`Layer`/
//! `Navigator` surface, exactly as a host application would use it.

use glam::{Quat, Vec3};
use navkit::convex::shape::Shape;
use navkit::navigator::Navigator;
use navkit::space::mesh::{BuildFace, SpaceMesh};
use navkit::space::{SpaceKind, SpaceType};
use navkit::{BlockerId, Source, Space, World};

fn quad(offset: Vec3, type_index: u32) -> SpaceMesh {
    let verts = vec![
        Vec3::new(0.0, 0.0, 0.0) + offset,
        Vec3::new(1.0, 0.0, 0.0) + offset,
        Vec3::new(1.0, 0.0, 1.0) + offset,
        Vec3::new(0.0, 0.0, 1.0) + offset,
    ];
    SpaceMesh::build(verts, vec![BuildFace { corners: vec![(0, type_index), (1, type_index), (2, type_index), (3, type_index)] }]).unwrap()
}

#[test]
fn s1_direct_a_star_on_a_single_quad() {
    let mut world = World::new();
    world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored));
    world.prepare().unwrap();

    let mut nav = Navigator::new(SpaceType::Mesh, 0);
    nav.prepare(world.layer(0).unwrap().cost_table());

    let path = nav.find_path(world.layer(0).unwrap(), Vec3::new(0.1, 0.0, 0.1), Vec3::new(0.9, 0.0, 0.9));
    assert_eq!(path.count(), 2);
    assert_eq!(path.at(0), Vec3::new(0.1, 0.0, 0.1));
    assert_eq!(path.at(1), Vec3::new(0.9, 0.0, 0.9));
}

#[test]
fn s2_crossing_a_costlier_neighbour_quad() {
    let mut world = World::new();
    {
        let layer = world.layer_mut(0);
        assert_eq!(layer.cost_table_mut().index_of_or_insert(0), 0);
        assert_eq!(layer.cost_table_mut().index_of_or_insert(1), 1);
    }
    world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored));
    world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::new(1.0, 0.0, 0.0), 1)), 0, Source::Authored));
    world.prepare().unwrap();

    let mut nav = Navigator::new(SpaceType::Mesh, 0);
    nav.set_cost(0, 0.0, 1.0);
    nav.set_cost(1, 10.0, 1.0);
    nav.prepare(world.layer(0).unwrap().cost_table());

    let path = nav.find_path(world.layer(0).unwrap(), Vec3::new(0.5, 0.0, 0.5), Vec3::new(1.5, 0.0, 0.5));
    assert_eq!(path.count(), 2);
    assert_eq!(path.at(0), Vec3::new(0.5, 0.0, 0.5));
    assert_eq!(path.at(1), Vec3::new(1.5, 0.0, 0.5));
}

#[test]
fn s3_path_detours_around_a_blocker() {
    let mut world = World::new();
    let space_id = world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored));
    world.prepare().unwrap();

    let mut blocker = navkit::blocker::NavBlocker::new(SpaceType::Mesh, 0);
    blocker.set_transform(Vec3::new(0.5, 0.0, 0.5), Quat::IDENTITY);
    blocker.set_shapes(vec![Shape::Box { half_extents: Vec3::new(0.25, 1.0, 0.25) }]);
    let blocker_id: BlockerId = world.add_blocker(0, blocker).unwrap();
    world.prepare().unwrap();

    let layer = world.layer(0).unwrap();
    let space = layer.space(space_id).unwrap();
    let SpaceKind::Mesh(mesh) = &space.kind else { panic!("expected a mesh space") };
    assert!(mesh.faces.len() >= 4);

    let blocker_volume = &layer.blocker(blocker_id).unwrap().convex_volumes()[0];
    for vertex in &mesh.vertices {
        assert!(!blocker_volume.contains_strictly(vertex.position, 0.0));
    }

    let mut nav = Navigator::new(SpaceType::Mesh, 0);
    nav.prepare(layer.cost_table());
    let path = nav.find_path(layer, Vec3::new(0.1, 0.0, 0.5), Vec3::new(0.9, 0.0, 0.5));
    assert!(path.count() >= 3);
    for i in 0..path.count() {
        assert!(!blocker_volume.contains_strictly(path.at(i), 0.0));
    }
}

#[test]
fn s4_cross_space_link_on_matching_edges() {
    let mut world = World::new();
    world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored));
    let mut second = Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored);
    second.set_transform(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
    world.add_space(0, second);
    world.prepare().unwrap();

    let mut nav = Navigator::new(SpaceType::Mesh, 0);
    nav.prepare(world.layer(0).unwrap().cost_table());
    let path = nav.find_path(world.layer(0).unwrap(), Vec3::new(0.1, 0.0, 0.5), Vec3::new(1.9, 0.0, 0.5));
    assert_eq!(path.count(), 2);
    assert_eq!(path.at(0), Vec3::new(0.1, 0.0, 0.5));
    assert_eq!(path.at(1), Vec3::new(1.9, 0.0, 0.5));
}

#[test]
fn s5_link_with_split_leaves_one_linked_and_two_boundary_sub_edges() {
    let mut world = World::new();
    let first_id = world.add_space(0, Space::new(SpaceKind::Mesh(quad(Vec3::ZERO, 0)), 0, Source::Authored));

    let verts = vec![
        Vec3::new(1.0, 0.0, 0.25),
        Vec3::new(1.0, 0.0, 0.75),
        Vec3::new(2.0, 0.0, 0.75),
        Vec3::new(2.0, 0.0, 0.25),
    ];
    let narrow = SpaceMesh::build(verts, vec![BuildFace { corners: vec![(0, 0), (1, 0), (2, 0), (3, 0)] }]).unwrap();
    world.add_space(0, Space::new(SpaceKind::Mesh(narrow), 0, Source::Authored));
    world.prepare().unwrap();

    let layer = world.layer(0).unwrap();
    let space = layer.space(first_id).unwrap();
    let SpaceKind::Mesh(mesh) = &space.kind else { panic!("expected a mesh space") };

    let right_side_corners: Vec<_> = mesh
        .corners
        .iter()
        .filter(|c| {
            let p = mesh.vertices[c.vertex as usize].position;
            (p.x - 1.0).abs() < 1e-3
        })
        .collect();
    assert_eq!(right_side_corners.iter().filter(|c| c.link.is_some()).count(), 1);
    assert_eq!(right_side_corners.iter().filter(|c| c.link.is_none()).count(), 2);
}

#[test]
fn s6_funnel_finds_the_single_corner_in_an_l_shaped_corridor() {
    let mut world = World::new();
    // Horizontal arm (x<2) is only two quads tall up to z=2; the vertical
    // arm (x>=2) runs the full z=0..4. The two arms share an exact edge at
    // every seam, so the interior right-angle corner sits at (2,0,2).
    let segments = [
        (Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 2.0)),
        (Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 2.0)),
        (Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 2.0)),
        (Vec3::new(2.0, 0.0, 2.0), Vec3::new(4.0, 0.0, 3.0)),
        (Vec3::new(2.0, 0.0, 3.0), Vec3::new(4.0, 0.0, 4.0)),
    ];
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for (min, max) in segments {
        let base = vertices.len() as u32;
        vertices.push(Vec3::new(min.x, 0.0, min.z));
        vertices.push(Vec3::new(max.x, 0.0, min.z));
        vertices.push(Vec3::new(max.x, 0.0, max.z));
        vertices.push(Vec3::new(min.x, 0.0, max.z));
        faces.push(BuildFace { corners: vec![(base, 0), (base + 1, 0), (base + 2, 0), (base + 3, 0)] });
    }
    let mesh = SpaceMesh::build(vertices, faces).unwrap();
    world.add_space(0, Space::new(SpaceKind::Mesh(mesh), 0, Source::Authored));
    world.prepare().unwrap();

    let mut nav = Navigator::new(SpaceType::Mesh, 0);
    nav.prepare(world.layer(0).unwrap().cost_table());
    let path = nav.find_path(world.layer(0).unwrap(), Vec3::new(0.5, 0.0, 0.5), Vec3::new(3.5, 0.0, 3.5));

    assert_eq!(path.count(), 3);
    assert_eq!(path.at(0), Vec3::new(0.5, 0.0, 0.5));
    assert!(path.at(1).distance(Vec3::new(2.0, 0.0, 2.0)) < 1e-3);
    assert_eq!(path.at(2), Vec3::new(3.5, 0.0, 3.5));
}
