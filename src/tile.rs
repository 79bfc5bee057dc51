//! Per-tile build pipeline.
//!
//! [`TileBuilder`] derives the voxel bounds for one tile coordinate, drives
//! the mesh-build kernel through the full pipeline (heightfield → filters →
//! compact → distance field → regions → contours → polygons → detail →
//! encoded blob) and reports which stage failed if any does.

use glam::Vec3;
use thiserror::Error;
use tracing::error;

use crate::{
    config::BuildConfig,
    field::{CompactHeightfield, Heightfield},
    geometry::{GeometryProvider, GeometrySampler},
    kernel::{AreaType, KernelError, MeshBuildKernel, POLY_FLAG_WALKABLE, TileEncodeParams},
    math::Aabb3d,
    poly::{ContourSet, PolygonMesh},
};

/// Integer coordinate of one fixed-size square tile on the xz-plane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct TileCoord {
    /// Tile index along the x-axis.
    pub x: u32,
    /// Tile index along the z-axis.
    pub z: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub fn new(x: u32, z: u32) -> Self {
        Self { x, z }
    }

    /// The coordinate of the tile containing `pos`, given the navmesh origin
    /// and world-space tile side length.
    pub fn from_world(pos: Vec3, origin: Vec3, tile_world_size: f32) -> Self {
        Self {
            x: ((pos.x - origin.x) / tile_world_size).floor().max(0.0) as u32,
            z: ((pos.z - origin.z) / tile_world_size).floor().max(0.0) as u32,
        }
    }
}

bitflags::bitflags! {
    /// Which intermediate buffers a tile build retains for visualization.
    ///
    /// Retained buffers stay alive until the next build or an explicit clear;
    /// everything else is released as soon as the following stage no longer
    /// needs it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugRetain: u8 {
        /// Keep the solid heightfield.
        const HEIGHTFIELD = 1 << 0;
        /// Keep the compact heightfield.
        const COMPACT = 1 << 1;
        /// Keep the contour set.
        const CONTOURS = 1 << 2;
        /// Keep the polygon mesh.
        const POLY_MESH = 1 << 3;
    }
}

impl DebugRetain {
    /// Retain every buffer class.
    pub fn all_buffers() -> Self {
        Self::all()
    }
}

/// Intermediate buffers retained from the most recent tile build.
#[derive(Debug, Default)]
pub struct DebugArtifacts {
    /// World-space origin of the retained tile's heightfield.
    pub origin: Vec3,
    /// The solid heightfield, if retained.
    pub heightfield: Option<Heightfield>,
    /// The compact heightfield, if retained.
    pub compact: Option<CompactHeightfield>,
    /// The contour set, if retained.
    pub contours: Option<ContourSet>,
    /// The polygon mesh, if retained.
    pub poly_mesh: Option<PolygonMesh>,
}

impl DebugArtifacts {
    /// Drops every retained buffer.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The pipeline stage a tile build failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Heightfield allocation.
    Heightfield,
    /// Geometry rasterization.
    Rasterization,
    /// Heightfield compaction.
    CompactHeightfield,
    /// Walkable-area erosion.
    Erosion,
    /// Distance-field construction.
    DistanceField,
    /// Region partitioning.
    Regions,
    /// Contour extraction.
    Contours,
    /// Contour triangulation.
    PolygonMesh,
    /// Detail-mesh generation.
    DetailMesh,
    /// Tile blob encoding.
    Encode,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Heightfield => "heightfield",
            Self::Rasterization => "rasterization",
            Self::CompactHeightfield => "compact heightfield",
            Self::Erosion => "erosion",
            Self::DistanceField => "distance field",
            Self::Regions => "regions",
            Self::Contours => "contours",
            Self::PolygonMesh => "polygon mesh",
            Self::DetailMesh => "detail mesh",
            Self::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// A tile build failure, tagged with the stage that produced it.
#[derive(Debug, Error)]
#[error("tile ({x}, {z}) failed at {stage} stage: {source}", x = coord.x, z = coord.z)]
pub struct TileBuildError {
    /// The tile that failed to build.
    pub coord: TileCoord,
    /// The failing stage.
    pub stage: BuildStage,
    /// The kernel's reason.
    #[source]
    pub source: KernelError,
}

/// The successful output of one tile build.
#[derive(Debug)]
pub struct BuiltTile {
    /// Coordinate the tile was built for.
    pub coord: TileCoord,
    /// The opaque serialized tile blob.
    pub data: Vec<u8>,
    /// Number of polygons in the tile. Zero for a valid empty tile.
    pub polygon_count: u32,
    /// Number of polygon vertices in the tile.
    pub vertex_count: u32,
    /// Intermediate buffers retained for visualization.
    pub debug: DebugArtifacts,
}

/// Drives the mesh-build kernel pipeline for single tiles.
pub struct TileBuilder<'a> {
    kernel: &'a dyn MeshBuildKernel,
    sampler: GeometrySampler,
    config: BuildConfig,
    /// Minimum corner of the whole navigable area.
    origin: Vec3,
    /// Vertical extent of the navigable area.
    y_range: (f32, f32),
}

impl<'a> TileBuilder<'a> {
    /// Creates a builder for tiles of the navigable area `aabb`.
    pub fn new(
        kernel: &'a dyn MeshBuildKernel,
        sampler: GeometrySampler,
        config: BuildConfig,
        aabb: &Aabb3d,
    ) -> Self {
        Self {
            kernel,
            sampler,
            config,
            origin: aabb.min,
            y_range: (aabb.min.y, aabb.max.y),
        }
    }

    /// World-space bounds of a tile's heightfield, footprint expanded by the
    /// border margin so agents path correctly near tile edges.
    pub fn tile_bounds(&self, coord: TileCoord) -> Aabb3d {
        let tile_world = self.config.tile_size as f32 * self.config.cell_size;
        let border_world = (self.config.border_size as f32 + 1.0) * self.config.cell_size;
        let min = Vec3::new(
            self.origin.x + coord.x as f32 * tile_world - border_world,
            self.y_range.0,
            self.origin.z + coord.z as f32 * tile_world - border_world,
        );
        let max = Vec3::new(
            min.x + tile_world + 2.0 * border_world,
            self.y_range.1,
            min.z + tile_world + 2.0 * border_world,
        );
        Aabb3d { min, max }
    }

    /// Builds one tile, or fails cleanly without partial output.
    ///
    /// A tile whose geometry produces no walkable surface is a valid, empty
    /// tile with zero polygons.
    pub fn build(
        &self,
        coord: TileCoord,
        geometry: &dyn GeometryProvider,
        retain: DebugRetain,
    ) -> Result<BuiltTile, TileBuildError> {
        let fail = |stage: BuildStage, source: KernelError| {
            error!(target: "navigation", "could not build tile ({}, {}): {stage}: {source}", coord.x, coord.z);
            TileBuildError {
                coord,
                stage,
                source,
            }
        };

        let cfg = &self.config;
        let bounds = self.tile_bounds(coord);
        let mut debug = DebugArtifacts {
            origin: bounds.min,
            ..Default::default()
        };

        let mut field = self
            .kernel
            .create_heightfield(cfg.width, cfg.height, bounds, cfg.cell_size, cfg.cell_height)
            .map_err(|e| fail(BuildStage::Heightfield, e))?;

        self.sampler
            .rasterize_geometry(geometry, &bounds, self.kernel, &mut field)
            .map_err(|e| fail(BuildStage::Rasterization, e))?;

        self.kernel
            .filter_low_hanging_walkable_obstacles(&mut field, cfg.walkable_climb);
        self.kernel
            .filter_ledge_spans(&mut field, cfg.walkable_height, cfg.walkable_climb);
        self.kernel
            .filter_walkable_low_height_spans(&mut field, cfg.walkable_height);

        let mut compact = self
            .kernel
            .build_compact_heightfield(&field, cfg.walkable_height, cfg.walkable_climb)
            .map_err(|e| fail(BuildStage::CompactHeightfield, e))?;

        if retain.contains(DebugRetain::HEIGHTFIELD) {
            debug.heightfield = Some(field);
        } else {
            drop(field);
        }

        self.kernel
            .erode_walkable_area(&mut compact, cfg.walkable_radius)
            .map_err(|e| fail(BuildStage::Erosion, e))?;
        self.kernel
            .build_distance_field(&mut compact)
            .map_err(|e| fail(BuildStage::DistanceField, e))?;
        self.kernel
            .build_regions(
                &mut compact,
                cfg.border_size,
                cfg.min_region_area,
                cfg.merge_region_area,
            )
            .map_err(|e| fail(BuildStage::Regions, e))?;

        let contours = self
            .kernel
            .build_contours(&compact, cfg.max_simplification_error, cfg.max_edge_len)
            .map_err(|e| fail(BuildStage::Contours, e))?;

        let mut poly_mesh = self
            .kernel
            .build_polygon_mesh(&contours, cfg.max_vertices_per_polygon)
            .map_err(|e| fail(BuildStage::PolygonMesh, e))?;

        let detail_mesh = self
            .kernel
            .build_detail_mesh(
                &poly_mesh,
                &compact,
                cfg.detail_sample_dist,
                cfg.detail_sample_max_error,
            )
            .map_err(|e| fail(BuildStage::DetailMesh, e))?;

        if retain.contains(DebugRetain::COMPACT) {
            debug.compact = Some(compact);
        }
        if retain.contains(DebugRetain::CONTOURS) {
            debug.contours = Some(contours);
        }

        // Only polygons derived from walkable surfaces are traversable; the
        // path/crowd layer filters on this flag.
        for (i, area) in poly_mesh.areas.iter().enumerate() {
            poly_mesh.flags[i] = if *area == AreaType::WALKABLE {
                POLY_FLAG_WALKABLE
            } else {
                0
            };
        }

        let data = self
            .kernel
            .encode_tile(&TileEncodeParams {
                coord,
                polygon_mesh: &poly_mesh,
                detail_mesh: &detail_mesh,
                walkable_height: cfg.walkable_height,
                walkable_climb: cfg.walkable_climb,
                walkable_radius: cfg.walkable_radius,
            })
            .map_err(|e| fail(BuildStage::Encode, e))?;

        let polygon_count = poly_mesh.polygon_count() as u32;
        let vertex_count = poly_mesh.vertices.len() as u32;
        if retain.contains(DebugRetain::POLY_MESH) {
            debug.poly_mesh = Some(poly_mesh);
        }

        Ok(BuiltTile {
            coord,
            data,
            polygon_count,
            vertex_count,
            debug,
        })
    }
}
