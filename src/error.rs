//! Error taxonomy for the navigation subsystem.
//!
//! `OutsideNavigation` from the spec is deliberately not a variant here:
//! queries that land outside navigable space resolve to an empty/absent
//! result, not an error (see `Navigator::find_path`).

use std::fmt;

/// Errors raised by builders and structural mutations.
///
/// Query methods (`find_path`, `nearest_point`, `line_collide`, ...) never
/// raise these for geometric edge cases - they return empty/absent results.
#[derive(Debug, Clone, PartialEq)]
pub enum NavError {
    /// Null collaborator, out-of-bounds index, or malformed authored
    /// geometry (face with <2 corners, non-manifold edge, duplicate vertex
    /// on a face, degenerate zero-normal face).
    InvalidParameter(&'static str),
    /// Operation not supported on this space type (e.g. `line_collide` on a
    /// `Grid` space) or not-yet-implemented shape tessellation.
    Unsupported(&'static str),
    /// Debug-only: a `SpaceMesh` invariant from the data model was broken
    /// after a build/cut/link step. Carries a dump of the offending mesh.
    InvariantViolation(String),
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            NavError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            NavError::InvariantViolation(dump) => {
                write!(f, "nav-mesh invariant violated:\n{dump}")
            }
        }
    }
}

impl std::error::Error for NavError {}

pub type NavResult<T> = Result<T, NavError>;
