//! The mesh-build library contract.
//!
//! The voxelization, region, contour and polygonization algorithms are not
//! implemented in this crate. They are supplied by an external kernel through
//! [`MeshBuildKernel`]; [`TileBuilder`](crate::tile::TileBuilder) owns the
//! parameter derivation, sequencing and error propagation around it.

use glam::Vec3;
use thiserror::Error;

use crate::{
    field::{CompactHeightfield, Heightfield},
    math::Aabb3d,
    poly::{ContourSet, DetailMesh, PolygonMesh},
    tile::TileCoord,
};

/// Area classification of rasterized surfaces and derived polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct AreaType(pub u8);

impl AreaType {
    /// Not traversable.
    pub const NULL: Self = Self(0);
    /// Traversable ground.
    pub const WALKABLE: Self = Self(63);
}

/// Polygon flag marking a traversable polygon; everything else stays 0 and is
/// impassable to the path/crowd layer.
pub const POLY_FLAG_WALKABLE: u16 = 1;

/// A failure reported by the mesh-build kernel. The kernel guarantees no
/// partial output was produced.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct KernelError(pub String);

impl KernelError {
    /// Creates an error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Everything the kernel needs to encode one tile into its serialized blob.
///
/// The blob layout is owned by the kernel and treated as opaque by the tile
/// store and the persistence codec.
#[derive(Debug)]
pub struct TileEncodeParams<'a> {
    /// Coordinate the tile will occupy.
    pub coord: TileCoord,
    /// The coarse polygon mesh, with areas and flags already marked.
    pub polygon_mesh: &'a PolygonMesh,
    /// The detail refinement of `polygon_mesh`.
    pub detail_mesh: &'a DetailMesh,
    /// Agent clearance baked into the tile. `[Units: vx]`
    pub walkable_height: u16,
    /// Maximum step height baked into the tile. `[Units: vx]`
    pub walkable_climb: u16,
    /// Agent erosion radius baked into the tile. `[Units: vx]`
    pub walkable_radius: u16,
}

/// Summary a kernel can decode from a tile blob without exposing its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    /// Coordinate the blob was encoded for.
    pub coord: TileCoord,
    /// Number of polygons in the tile.
    pub polygon_count: u32,
    /// Number of polygon vertices in the tile.
    pub vertex_count: u32,
}

/// The narrow contract to the external mesh-build library.
///
/// Each stage consumes the previous stage's output; every fallible stage
/// reports failure without producing partial output. Implementations are not
/// assumed reentrant; callers drive one build at a time.
pub trait MeshBuildKernel: Send + Sync {
    /// Allocates an empty heightfield covering `aabb`.
    fn create_heightfield(
        &self,
        width: u32,
        height: u32,
        aabb: Aabb3d,
        cell_size: f32,
        cell_height: f32,
    ) -> Result<Heightfield, KernelError>;

    /// Rasterizes one world-space triangle into the heightfield with the
    /// given area tag. Geometry outside the field bounds is clipped away.
    fn rasterize_triangle(
        &self,
        field: &mut Heightfield,
        triangle: [Vec3; 3],
        area: AreaType,
        flag_merge_threshold: u16,
    ) -> Result<(), KernelError>;

    /// Re-tags spans under low-hanging obstacles the agent can step over.
    fn filter_low_hanging_walkable_obstacles(&self, field: &mut Heightfield, walkable_climb: u16);

    /// Un-tags ledge spans unreachable by an agent of the given dimensions.
    fn filter_ledge_spans(&self, field: &mut Heightfield, walkable_height: u16, walkable_climb: u16);

    /// Un-tags spans with less clearance than the agent height.
    fn filter_walkable_low_height_spans(&self, field: &mut Heightfield, walkable_height: u16);

    /// Compacts solid spans into the open-space representation.
    fn build_compact_heightfield(
        &self,
        field: &Heightfield,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<CompactHeightfield, KernelError>;

    /// Erodes the walkable area by the agent radius.
    fn erode_walkable_area(
        &self,
        field: &mut CompactHeightfield,
        walkable_radius: u16,
    ) -> Result<(), KernelError>;

    /// Builds the distance field used for watershed partitioning.
    fn build_distance_field(&self, field: &mut CompactHeightfield) -> Result<(), KernelError>;

    /// Partitions the open space into regions.
    fn build_regions(
        &self,
        field: &mut CompactHeightfield,
        border_size: u16,
        min_region_area: u16,
        merge_region_area: u16,
    ) -> Result<(), KernelError>;

    /// Extracts simplified region outlines.
    fn build_contours(
        &self,
        field: &CompactHeightfield,
        max_simplification_error: f32,
        max_edge_len: u16,
    ) -> Result<ContourSet, KernelError>;

    /// Triangulates contours into the coarse polygon mesh.
    fn build_polygon_mesh(
        &self,
        contours: &ContourSet,
        max_vertices_per_polygon: u16,
    ) -> Result<PolygonMesh, KernelError>;

    /// Generates the height-accurate detail mesh.
    fn build_detail_mesh(
        &self,
        mesh: &PolygonMesh,
        field: &CompactHeightfield,
        sample_dist: f32,
        sample_max_error: f32,
    ) -> Result<DetailMesh, KernelError>;

    /// Encodes the polygon and detail meshes into one opaque tile blob.
    fn encode_tile(&self, params: &TileEncodeParams<'_>) -> Result<Vec<u8>, KernelError>;

    /// Decodes the summary header of a tile blob previously produced by
    /// [`Self::encode_tile`].
    fn decode_tile_header(&self, data: &[u8]) -> Result<TileHeader, KernelError>;
}
