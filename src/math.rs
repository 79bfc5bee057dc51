//! Small geometric helpers shared across the build pipeline.

use glam::Vec3;

/// An axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Aabb3d {
    /// The minimum corner.
    pub min: Vec3,
    /// The maximum corner.
    pub max: Vec3,
}

impl Aabb3d {
    /// Creates an AABB from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Computes the AABB enclosing `verts`. Returns `None` for an empty slice.
    pub fn from_verts(verts: &[Vec3]) -> Option<Self> {
        let first = *verts.first()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for v in &verts[1..] {
            aabb.min = aabb.min.min(*v);
            aabb.max = aabb.max.max(*v);
        }
        Some(aabb)
    }

    /// Grows the AABB to enclose `other`.
    pub fn merge(&mut self, other: &Aabb3d) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Grows the AABB to enclose `point`.
    pub fn merge_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns whether the two AABBs overlap on all three axes.
    pub fn overlaps(&self, other: &Aabb3d) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The extent of the box along each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Face normal of a counter-clockwise triangle.
pub(crate) fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}
