//! Read-only path queries against the navmesh.

use glam::Vec3;

/// An opaque reference to one polygon of the navmesh, encoded by the crowd
/// library within the tile/polygon address budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolyRef(pub u32);

/// Nearest-polygon queries, implemented by the crowd-simulation library over
/// the shared tile store.
pub trait NavMeshQuery: Send {
    /// Finds the polygon nearest to `center` within the search box spanned by
    /// `half_extents`, along with the closest point on it. Only polygons
    /// carrying the walkable flag are considered.
    fn find_nearest_poly(&self, center: Vec3, half_extents: Vec3) -> Option<(PolyRef, Vec3)>;
}

/// Movement destinations are resolved within this search box around the
/// requested point.
pub const DESTINATION_SEARCH_EXTENTS: Vec3 = Vec3::new(1.0, 2.0, 1.0);

/// A read-only query handle bound to one navmesh build epoch.
pub struct PathQuery {
    inner: Box<dyn NavMeshQuery>,
}

impl PathQuery {
    /// Wraps a query created by the crowd backend.
    pub fn new(inner: Box<dyn NavMeshQuery>) -> Self {
        Self { inner }
    }

    /// Resolves a movement destination to the nearest walkable polygon.
    pub fn resolve_destination(&self, destination: Vec3) -> Option<(PolyRef, Vec3)> {
        self.inner
            .find_nearest_poly(destination, DESTINATION_SEARCH_EXTENTS)
    }
}
