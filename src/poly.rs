//! Contour and polygon exchange types shared with the mesh-build library.

use glam::{U16Vec3, UVec3, Vec3};

use crate::{kernel::AreaType, math::Aabb3d};

/// Sentinel for unused polygon vertex slots.
pub const MESH_NULL_IDX: u16 = 0xffff;

/// A simplified region outline, in field-local voxel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    /// Outline vertices as `(x, y, z)` voxel coordinates.
    pub vertices: Vec<U16Vec3>,
    /// Region the contour encloses.
    pub region: u16,
    /// Area classification of the enclosed region.
    pub area: AreaType,
}

/// All region outlines extracted from a compact heightfield.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContourSet {
    /// The contours.
    pub contours: Vec<Contour>,
    /// World-space origin the voxel coordinates are relative to.
    pub origin: Vec3,
    /// The xz-plane voxel size. `[Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Units: wu]`
    pub cell_height: f32,
}

/// The coarse navigable polygon mesh of one tile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonMesh {
    /// Vertices in field-local voxel coordinates.
    pub vertices: Vec<U16Vec3>,
    /// Polygon vertex indices, `max_vertices_per_polygon` slots per polygon,
    /// unused slots holding [`MESH_NULL_IDX`].
    pub polygons: Vec<u16>,
    /// Per-polygon area classification.
    pub areas: Vec<AreaType>,
    /// Per-polygon traversal flags, filtered on by the path/crowd layer.
    pub flags: Vec<u16>,
    /// Maximum vertices per polygon.
    pub max_vertices_per_polygon: u16,
    /// World-space bounds of the mesh.
    pub aabb: Aabb3d,
    /// The xz-plane voxel size. `[Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Units: wu]`
    pub cell_height: f32,
}

impl PolygonMesh {
    /// Number of polygons in the mesh.
    pub fn polygon_count(&self) -> usize {
        if self.max_vertices_per_polygon == 0 {
            return 0;
        }
        self.polygons.len() / self.max_vertices_per_polygon as usize
    }

    /// The vertex index slots of polygon `i`, including null slots.
    pub fn polygon(&self, i: usize) -> &[u16] {
        let nvp = self.max_vertices_per_polygon as usize;
        &self.polygons[i * nvp..(i + 1) * nvp]
    }

    /// World-space position of vertex `i`.
    pub fn vertex_position(&self, i: usize) -> Vec3 {
        let v = self.vertices[i];
        Vec3::new(
            self.aabb.min.x + v.x as f32 * self.cell_size,
            self.aabb.min.y + (v.y as f32 + 1.0) * self.cell_height,
            self.aabb.min.z + v.z as f32 * self.cell_size,
        )
    }
}

/// Height-accurate triangle refinement of a [`PolygonMesh`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailMesh {
    /// Per-polygon `(vertex base, vertex count, triangle base, triangle
    /// count)` into [`Self::vertices`] and [`Self::triangles`].
    pub meshes: Vec<[u32; 4]>,
    /// World-space detail vertices.
    pub vertices: Vec<Vec3>,
    /// Triangle vertex indices, local to each polygon's sub-mesh.
    pub triangles: Vec<UVec3>,
}
