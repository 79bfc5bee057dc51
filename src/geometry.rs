//! Scene geometry sampling.
//!
//! A [`GeometryProvider`] enumerates mesh and terrain geometry overlapping a
//! world-space box; the [`GeometrySampler`] classifies each triangle as
//! walkable or not and feeds it to the mesh-build kernel's rasterizer.

use glam::{Quat, UVec2, UVec3, Vec3};

use crate::{
    config::NavigationParams,
    field::Heightfield,
    kernel::{AreaType, KernelError, MeshBuildKernel},
    math::{Aabb3d, triangle_normal},
};

bitflags::bitflags! {
    /// Per-surface material flags relevant to navigation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SurfaceFlags: u32 {
        /// The surface does not contribute to the navmesh at all.
        const NO_NAVIGATION = 1 << 0;
        /// The surface rasterizes as an obstruction, never as ground.
        const NON_WALKABLE = 1 << 1;
    }
}

/// One sub-mesh of a mesh instance, already transformed to world space.
///
/// Providers are expected to enumerate only level-of-detail-0 sub-meshes of
/// visible instances.
#[derive(Debug, Clone, Default)]
pub struct MeshSurface {
    /// World-space vertices.
    pub vertices: Vec<Vec3>,
    /// Triangle list indices into [`Self::vertices`].
    pub indices: Vec<UVec3>,
    /// Material flags of the surface.
    pub flags: SurfaceFlags,
}

/// A heightmap terrain instance.
pub trait Terrain {
    /// Grid resolution (x, z) of the height samples.
    fn resolution(&self) -> UVec2;
    /// World-space distance between neighbouring samples on the xz-plane.
    fn scale_xz(&self) -> f32;
    /// World-space placement of the terrain.
    fn transform(&self) -> (Vec3, Quat);
    /// Height at terrain-local coordinates `(x, z)`, in world units above the
    /// terrain origin.
    fn height_at(&self, x: f32, z: f32) -> f32;
    /// World-space bounds of the whole terrain.
    fn bounds(&self) -> Aabb3d;
}

/// Enumerates the static scene geometry the navmesh is built from.
pub trait GeometryProvider {
    /// Bounds enclosing all navigation-relevant geometry, or `None` if the
    /// scene is empty.
    fn scene_bounds(&self) -> Option<Aabb3d>;

    /// Visits every mesh surface whose bounds overlap `aabb`.
    fn visit_meshes(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(&MeshSurface));

    /// Visits every terrain whose bounds overlap `aabb`.
    fn visit_terrains(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(&dyn Terrain));
}

/// Classifies triangles inside a box and rasterizes them into a tile's
/// heightfield.
pub struct GeometrySampler {
    mesh_walkable_threshold: f32,
    terrain_walkable_threshold: f32,
    walkable_climb: u16,
}

impl GeometrySampler {
    /// Creates a sampler with the slope thresholds of `params`.
    pub fn new(params: &NavigationParams, walkable_climb: u16) -> Self {
        Self {
            mesh_walkable_threshold: params.mesh_walkable_slope.cos(),
            terrain_walkable_threshold: params.terrain_walkable_slope.cos(),
            walkable_climb,
        }
    }

    /// Rasterizes all geometry overlapping `aabb` into `field`.
    pub fn rasterize_geometry(
        &self,
        provider: &dyn GeometryProvider,
        aabb: &Aabb3d,
        kernel: &dyn MeshBuildKernel,
        field: &mut Heightfield,
    ) -> Result<(), KernelError> {
        self.rasterize_meshes(provider, aabb, kernel, field)?;
        self.rasterize_terrains(provider, aabb, kernel, field)
    }

    fn rasterize_meshes(
        &self,
        provider: &dyn GeometryProvider,
        aabb: &Aabb3d,
        kernel: &dyn MeshBuildKernel,
        field: &mut Heightfield,
    ) -> Result<(), KernelError> {
        let mut result = Ok(());
        provider.visit_meshes(aabb, &mut |surface| {
            if result.is_err() || surface.flags.contains(SurfaceFlags::NO_NAVIGATION) {
                return;
            }
            let obstruction = surface.flags.contains(SurfaceFlags::NON_WALKABLE);
            for tri in &surface.indices {
                let a = surface.vertices[tri.x as usize];
                let b = surface.vertices[tri.y as usize];
                let c = surface.vertices[tri.z as usize];
                let area = if !obstruction
                    && triangle_normal(a, b, c).y > self.mesh_walkable_threshold
                {
                    AreaType::WALKABLE
                } else {
                    AreaType::NULL
                };
                if let Err(err) =
                    kernel.rasterize_triangle(field, [a, b, c], area, self.walkable_climb)
                {
                    result = Err(err);
                    return;
                }
            }
        });
        result
    }

    fn rasterize_terrains(
        &self,
        provider: &dyn GeometryProvider,
        aabb: &Aabb3d,
        kernel: &dyn MeshBuildKernel,
        field: &mut Heightfield,
    ) -> Result<(), KernelError> {
        let mut result = Ok(());
        provider.visit_terrains(aabb, &mut |terrain| {
            if result.is_err() {
                return;
            }
            result = self.rasterize_terrain(terrain, aabb, kernel, field);
        });
        result
    }

    /// Resamples a terrain on its xz grid clipped to the box footprint and
    /// rasterizes two triangles per grid cell.
    fn rasterize_terrain(
        &self,
        terrain: &dyn Terrain,
        aabb: &Aabb3d,
        kernel: &dyn MeshBuildKernel,
        field: &mut Heightfield,
    ) -> Result<(), KernelError> {
        let (pos, rot) = terrain.transform();
        let res = terrain.resolution();
        let scale = terrain.scale_xz();
        if scale <= 0.0 || res.x < 2 || res.y < 2 {
            return Ok(());
        }

        // Clip the sample range to the box footprint in terrain space.
        let inv_rot = rot.inverse();
        let local_min = inv_rot * (aabb.min - pos);
        let local_max = inv_rot * (aabb.max - pos);
        let last_x = (res.x - 1) as f32;
        let last_z = (res.y - 1) as f32;
        let from_x = (local_min.x.min(local_max.x) / scale - 1.0).clamp(0.0, last_x) as u32;
        let to_x = (local_min.x.max(local_max.x) / scale + 1.0).clamp(0.0, last_x) as u32;
        let from_z = (local_min.z.min(local_max.z) / scale - 1.0).clamp(0.0, last_z) as u32;
        let to_z = (local_min.z.max(local_max.z) / scale + 1.0).clamp(0.0, last_z) as u32;

        let sample = |i: u32, j: u32| -> Vec3 {
            let x = i as f32 * scale;
            let z = j as f32 * scale;
            pos + rot * Vec3::new(x, terrain.height_at(x, z), z)
        };

        for j in from_z..to_z {
            for i in from_x..to_x {
                let p0 = sample(i, j);
                let p1 = sample(i + 1, j);
                let p2 = sample(i + 1, j + 1);
                let p3 = sample(i, j + 1);

                for tri in [[p0, p2, p1], [p0, p3, p2]] {
                    let area = if triangle_normal(tri[0], tri[1], tri[2]).y
                        > self.terrain_walkable_threshold
                    {
                        AreaType::WALKABLE
                    } else {
                        AreaType::NULL
                    };
                    kernel.rasterize_triangle(field, tri, area, self.walkable_climb)?;
                }
            }
        }
        Ok(())
    }
}
