//! Build parameter handling.
//!
//! [`NavigationParams`] is what callers tweak: world-unit agent dimensions and
//! sampling resolutions. [`BuildConfig`] is the voxel-space aggregate derived
//! from it once per build, the same way Recast derives its `rcConfig`.

use crate::math::Aabb3d;

/// User-facing navigation build and simulation parameters, in world units.
///
/// The slope thresholds and the resync tolerance default to the values the
/// pipeline was tuned with; they are exposed here rather than hard-coded so a
/// host can adjust them per navmesh.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NavigationParams {
    /// The xz-plane voxel size. `[Limit: > 0] [Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Limit: > 0] [Units: wu]`
    pub cell_height: f32,
    /// Radius of the agent cylinder the mesh is eroded for. `[Units: wu]`
    pub agent_radius: f32,
    /// Height of the agent cylinder. `[Units: wu]`
    pub agent_height: f32,
    /// Maximum ledge height an agent can step over. `[Units: wu]`
    pub max_climb: f32,
    /// Maximum surface slope on regular meshes that still counts as
    /// walkable. `[Units: radians]`
    pub mesh_walkable_slope: f32,
    /// Maximum walkable slope on terrains. Terrains conventionally carry
    /// gentler slopes, so this threshold is shallower. `[Units: radians]`
    pub terrain_walkable_slope: f32,
    /// Side length of one square tile. `[Units: vx]`
    pub tile_size: u16,
    /// Maximum contour edge length before it is split. `[Units: wu]`
    pub max_edge_len: f32,
    /// Maximum contour simplification deviation. `[Units: vx]`
    pub max_simplification_error: f32,
    /// Minimum region side length; smaller islands are culled. `[Units: vx]`
    pub region_min_size: u16,
    /// Regions below this side length get merged into neighbours. `[Units: vx]`
    pub region_merge_size: u16,
    /// Maximum vertices per polygon in the final mesh. `[Limit: >= 3]`
    pub max_vertices_per_polygon: u16,
    /// Detail mesh sampling distance, as a multiple of [`Self::cell_size`].
    pub detail_sample_dist: f32,
    /// Detail mesh max height error, as a multiple of [`Self::cell_height`].
    pub detail_sample_max_error: f32,
    /// Agent capacity of the crowd context allocated on simulator start.
    pub crowd_capacity: usize,
    /// Largest agent radius the crowd context has to support. `[Units: wu]`
    pub max_agent_radius: f32,
    /// Squared distance between an entity transform and its simulated agent
    /// position beyond which the agent is teleport-resynced. `[Units: wu²]`
    pub resync_distance_sq: f32,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            cell_size: 0.3,
            cell_height: 0.1,
            agent_radius: 0.3,
            agent_height: 2.0,
            max_climb: 1.5,
            mesh_walkable_slope: 45.0_f32.to_radians(),
            terrain_walkable_slope: 60.0_f32.to_radians(),
            tile_size: 256,
            max_edge_len: 12.0,
            max_simplification_error: 1.3,
            region_min_size: 8,
            region_merge_size: 20,
            max_vertices_per_polygon: 6,
            detail_sample_dist: 6.0,
            detail_sample_max_error: 1.0,
            crowd_capacity: 1000,
            max_agent_radius: 4.0,
            resync_distance_sq: 0.1,
        }
    }
}

impl NavigationParams {
    /// World-space side length of one tile.
    pub fn tile_world_size(&self) -> f32 {
        self.tile_size as f32 * self.cell_size
    }

    /// Derives the voxel-space build configuration.
    pub fn derive(&self) -> BuildConfig {
        let walkable_radius = (self.agent_radius / self.cell_size).ceil() as u16;
        // Padding so agents can path correctly across tile seams.
        let border_size = walkable_radius + 3;
        BuildConfig {
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            walkable_height: (self.agent_height / self.cell_height).ceil() as u16,
            walkable_climb: (self.max_climb / self.cell_height) as u16,
            walkable_radius,
            border_size,
            tile_size: self.tile_size,
            width: self.tile_size as u32 + border_size as u32 * 2,
            height: self.tile_size as u32 + border_size as u32 * 2,
            max_edge_len: (self.max_edge_len / self.cell_size) as u16,
            max_simplification_error: self.max_simplification_error,
            min_region_area: self.region_min_size * self.region_min_size,
            merge_region_area: self.region_merge_size * self.region_merge_size,
            max_vertices_per_polygon: self.max_vertices_per_polygon,
            detail_sample_dist: if self.detail_sample_dist < 0.9 {
                0.0
            } else {
                self.cell_size * self.detail_sample_dist
            },
            detail_sample_max_error: self.cell_height * self.detail_sample_max_error,
        }
    }
}

/// Voxel-space configuration for a tile build, derived from
/// [`NavigationParams::derive`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// The xz-plane voxel size. `[Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Units: wu]`
    pub cell_height: f32,
    /// Minimum floor-to-ceiling clearance. `[Units: vx]`
    pub walkable_height: u16,
    /// Maximum traversable ledge height. `[Units: vx]`
    pub walkable_climb: u16,
    /// Erosion radius keeping the mesh away from obstructions. `[Units: vx]`
    pub walkable_radius: u16,
    /// Non-navigable margin around each tile's heightfield. `[Units: vx]`
    pub border_size: u16,
    /// Side length of the tile proper, excluding borders. `[Units: vx]`
    pub tile_size: u16,
    /// Heightfield width including borders. `[Units: vx]`
    pub width: u32,
    /// Heightfield height including borders. `[Units: vx]`
    pub height: u32,
    /// Maximum contour edge length. `[Units: vx]`
    pub max_edge_len: u16,
    /// Maximum contour simplification deviation. `[Units: vx]`
    pub max_simplification_error: f32,
    /// Minimum region area. `[Units: vx²]`
    pub min_region_area: u16,
    /// Region merge threshold. `[Units: vx²]`
    pub merge_region_area: u16,
    /// Maximum vertices per polygon.
    pub max_vertices_per_polygon: u16,
    /// Detail sampling distance. `[Units: wu]`
    pub detail_sample_dist: f32,
    /// Detail max height error. `[Units: wu]`
    pub detail_sample_max_error: f32,
}

/// Number of tiles needed to cover `aabb` on each axis.
pub(crate) fn tile_grid_size(aabb: &Aabb3d, params: &NavigationParams) -> (u32, u32) {
    let grid_w = (aabb.size().x / params.cell_size + 0.5) as u32;
    let grid_h = (aabb.size().z / params.cell_size + 0.5) as u32;
    let ts = params.tile_size as u32;
    (grid_w.div_ceil(ts), grid_h.div_ceil(ts))
}
