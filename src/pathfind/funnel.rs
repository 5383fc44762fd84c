//! Funnel string-pulling over a face-sequence's edge crossings (§4.9).
//!
//! Grounded on `original_source/.../pathfinder/dedaiPathFinderFunnel.cpp`
//! and the string-pulling call site in `dedaiPathFinderNavMesh::pFindRealPath`.
//! Orientation tests use the crossed edge's owning face normal rather than
//! assuming a flat Y-up plane, so a funnel spanning a sloped face or a
//! cross-mesh link (whose portals [`crate::pathfind::mesh`] already
//! resolves into world space via the link's transform) behaves the same as
//! one confined to a single flat face.

use glam::Vec3;

/// One edge crossing: the two endpoints ordered so `left`/`right` match the
/// owning face's winding as seen from the direction of travel, plus that
/// face's normal (used for the wedge orientation test at this step).
#[derive(Debug, Clone, Copy)]
pub struct Portal {
    pub left: Vec3,
    pub right: Vec3,
    pub normal: Vec3,
}

/// Signed area of the triangle `(origin, a, b)` projected along `normal`;
/// positive when `b` is counter-clockwise of `a` as seen looking down
/// `-normal`.
fn wedge_side(origin: Vec3, a: Vec3, b: Vec3, normal: Vec3) -> f32 {
    normal.dot((a - origin).cross(b - origin))
}

/// Among `pending` candidates accumulated on the side opposite `committed`,
/// picks the one subtending the largest angle at `apex` against `committed`
/// - this is what lets the funnel hug a curved corridor's inner corners
/// instead of always locking onto the first tightening point it saw.
fn widest_pending(apex: Vec3, committed: Vec3, pending: &[Vec3]) -> Option<Vec3> {
    let base = (committed - apex).normalize_or_zero();
    pending
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (*a - apex).normalize_or_zero().dot(base);
            let db = (*b - apex).normalize_or_zero().dot(base);
            da.total_cmp(&db)
        })
}

/// Runs the funnel algorithm over `portals` (already in a common world
/// frame) from `start` to `goal`, returning the minimum-corner-count path.
/// `fix_pending` gates the curved-corridor refinement described above; with
/// it off this is the textbook "simple stupid funnel algorithm".
pub fn pull_string(start: Vec3, goal: Vec3, portals: &[Portal], fix_pending: bool) -> Vec<Vec3> {
    if portals.is_empty() {
        return vec![start, goal];
    }

    let mut path = vec![start];
    let mut apex = start;
    let mut left = start;
    let mut right = start;
    let mut left_index = 0usize;
    let mut right_index = 0usize;
    let mut left_pending: Vec<Vec3> = Vec::new();
    let mut right_pending: Vec<Vec3> = Vec::new();

    let side = |i: usize, is_left: bool| -> (Vec3, Vec3) {
        if i < portals.len() {
            (if is_left { portals[i].left } else { portals[i].right }, portals[i].normal)
        } else {
            (goal, portals[portals.len() - 1].normal)
        }
    };

    let mut i = 1usize;
    while i <= portals.len() {
        let (pr, normal_r) = side(i, false);
        if wedge_side(apex, right, pr, normal_r) <= 0.0 {
            if apex == right || wedge_side(apex, left, pr, normal_r) > 0.0 {
                right = pr;
                right_index = i;
                if fix_pending {
                    right_pending.push(pr);
                }
            } else {
                let committed = if fix_pending { widest_pending(apex, right, &left_pending).unwrap_or(left) } else { left };
                path.push(committed);
                apex = committed;
                left = apex;
                right = apex;
                left_pending.clear();
                right_pending.clear();
                i = left_index;
                i += 1;
                continue;
            }
        }

        let (pl, normal_l) = side(i, true);
        if wedge_side(apex, left, pl, normal_l) >= 0.0 {
            if apex == left || wedge_side(apex, right, pl, normal_l) < 0.0 {
                left = pl;
                left_index = i;
                if fix_pending {
                    left_pending.push(pl);
                }
            } else {
                let committed = if fix_pending { widest_pending(apex, left, &right_pending).unwrap_or(right) } else { right };
                path.push(committed);
                apex = committed;
                left = apex;
                right = apex;
                left_pending.clear();
                right_pending.clear();
                i = right_index;
                i += 1;
                continue;
            }
        }

        i += 1;
    }

    path.push(goal);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP: Vec3 = Vec3::Y;

    #[test]
    fn no_portals_goes_straight_to_goal() {
        let path = pull_string(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), &[], true);
        assert_eq!(path, vec![Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)]);
    }

    #[test]
    fn wide_open_portal_does_not_add_a_corner() {
        let portals = [Portal { left: Vec3::new(1.0, 0.0, 10.0), right: Vec3::new(1.0, 0.0, -10.0), normal: UP }];
        let path = pull_string(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), &portals, true);
        assert_eq!(path.first(), Some(&Vec3::ZERO));
        assert_eq!(path.last(), Some(&Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn pinched_corridor_produces_at_least_one_corner() {
        let portals = [
            Portal { left: Vec3::new(1.0, 0.0, 0.5), right: Vec3::new(1.0, 0.0, -0.5), normal: UP },
            Portal { left: Vec3::new(2.0, 0.0, 0.5), right: Vec3::new(2.0, 0.0, -4.0), normal: UP },
        ];
        let path = pull_string(Vec3::ZERO, Vec3::new(3.0, 0.0, -5.0), &portals, true);
        assert_eq!(path.first(), Some(&Vec3::ZERO));
        assert_eq!(path.last(), Some(&Vec3::new(3.0, 0.0, -5.0)));
        assert!(path.len() >= 2);
    }
}
