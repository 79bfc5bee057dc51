//! Shared test doubles: a crude grid-rasterizing mesh-build kernel, a
//! straight-line crowd, and an in-memory scene.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use glam::{Quat, UVec2, UVec3, Vec3};
use tilenav::{
    Aabb3d, AreaType, CompactCell, CompactHeightfield, CompactSpan, Contour, ContourSet, Crowd,
    CrowdAgentHandle, CrowdAgentParams, CrowdAgentState, CrowdBackend, CrowdError, DetailMesh,
    EntityId, EntityTransforms, GeometryProvider, Heightfield, KernelError, MESH_NULL_IDX,
    MeshBuildKernel, MeshSurface, NavMeshQuery, NavigationEvents, PolyRef, PolygonMesh,
    SharedNavMesh, Span, SurfaceFlags, Terrain, TileCoord, TileEncodeParams, TileHeader,
};

const BLOB_MAGIC: u32 = 0x544e_4156;

/// A mesh-build kernel that voxelizes triangle footprints onto the grid and
/// emits one polygon per contiguous run of walkable columns. Good enough to
/// tell "geometry here" from "no geometry here".
#[derive(Default)]
pub struct FakeKernel {
    /// Number of triangles handed to the rasterizer, clipped or not.
    pub rasterized: AtomicUsize,
}

impl MeshBuildKernel for FakeKernel {
    fn create_heightfield(
        &self,
        width: u32,
        height: u32,
        aabb: Aabb3d,
        cell_size: f32,
        cell_height: f32,
    ) -> Result<Heightfield, KernelError> {
        if width == 0 || height == 0 {
            return Err(KernelError::new("degenerate heightfield"));
        }
        Ok(Heightfield::new(width, height, aabb, cell_size, cell_height))
    }

    fn rasterize_triangle(
        &self,
        field: &mut Heightfield,
        triangle: [Vec3; 3],
        area: AreaType,
        _flag_merge_threshold: u16,
    ) -> Result<(), KernelError> {
        self.rasterized.fetch_add(1, Ordering::Relaxed);
        let Some(tri_aabb) = Aabb3d::from_verts(&triangle) else {
            return Ok(());
        };
        if !tri_aabb.overlaps(&field.aabb) {
            return Ok(());
        }
        let origin = field.aabb.min;
        let cs = field.cell_size;
        let ch = field.cell_height;
        let x0 = (((tri_aabb.min.x - origin.x) / cs).floor().max(0.0) as u32).min(field.width - 1);
        let x1 = (((tri_aabb.max.x - origin.x) / cs).floor().max(0.0) as u32).min(field.width - 1);
        let z0 = (((tri_aabb.min.z - origin.z) / cs).floor().max(0.0) as u32).min(field.height - 1);
        let z1 = (((tri_aabb.max.z - origin.z) / cs).floor().max(0.0) as u32).min(field.height - 1);
        let top = (((tri_aabb.max.y - origin.y) / ch).ceil().max(1.0)) as u16;
        for z in z0..=z1 {
            for x in x0..=x1 {
                field.columns[(x + z * field.width) as usize].push(Span {
                    min: 0,
                    max: top,
                    area,
                });
            }
        }
        Ok(())
    }

    fn filter_low_hanging_walkable_obstacles(&self, _field: &mut Heightfield, _climb: u16) {}

    fn filter_ledge_spans(&self, _field: &mut Heightfield, _height: u16, _climb: u16) {}

    fn filter_walkable_low_height_spans(&self, _field: &mut Heightfield, _height: u16) {}

    fn build_compact_heightfield(
        &self,
        field: &Heightfield,
        _walkable_height: u16,
        _walkable_climb: u16,
    ) -> Result<CompactHeightfield, KernelError> {
        let mut cells = Vec::with_capacity(field.columns.len());
        let mut spans = Vec::new();
        for column in &field.columns {
            let index = spans.len() as u32;
            for span in column {
                if span.area == AreaType::WALKABLE {
                    spans.push(CompactSpan {
                        y: span.max,
                        clearance: u16::MAX,
                        area: span.area,
                        region: 0,
                    });
                }
            }
            cells.push(CompactCell {
                index,
                count: spans.len() as u32 - index,
            });
        }
        Ok(CompactHeightfield {
            width: field.width,
            height: field.height,
            aabb: field.aabb,
            cell_size: field.cell_size,
            cell_height: field.cell_height,
            cells,
            spans,
            max_distance: 0,
            region_count: 0,
        })
    }

    fn erode_walkable_area(
        &self,
        _field: &mut CompactHeightfield,
        _walkable_radius: u16,
    ) -> Result<(), KernelError> {
        Ok(())
    }

    fn build_distance_field(&self, field: &mut CompactHeightfield) -> Result<(), KernelError> {
        field.max_distance = 1;
        Ok(())
    }

    fn build_regions(
        &self,
        field: &mut CompactHeightfield,
        _border_size: u16,
        _min_region_area: u16,
        _merge_region_area: u16,
    ) -> Result<(), KernelError> {
        for span in &mut field.spans {
            span.region = 1;
        }
        field.region_count = if field.spans.is_empty() { 0 } else { 1 };
        Ok(())
    }

    fn build_contours(
        &self,
        field: &CompactHeightfield,
        _max_simplification_error: f32,
        _max_edge_len: u16,
    ) -> Result<ContourSet, KernelError> {
        let mut set = ContourSet {
            contours: Vec::new(),
            origin: field.aabb.min,
            cell_size: field.cell_size,
            cell_height: field.cell_height,
        };
        // One rectangular contour around the bounding box of all walkable
        // columns, which is all the precision these tests need.
        let mut bounds: Option<(u32, u32, u32, u32, u16)> = None;
        for z in 0..field.height {
            for x in 0..field.width {
                for span in field.cell_spans(x, z) {
                    bounds = Some(match bounds {
                        None => (x, x, z, z, span.y),
                        Some((x0, x1, z0, z1, y)) => {
                            (x0.min(x), x1.max(x), z0.min(z), z1.max(z), y.max(span.y))
                        }
                    });
                }
            }
        }
        if let Some((x0, x1, z0, z1, y)) = bounds {
            set.contours.push(Contour {
                vertices: vec![
                    glam::U16Vec3::new(x0 as u16, y, z0 as u16),
                    glam::U16Vec3::new(x1 as u16 + 1, y, z0 as u16),
                    glam::U16Vec3::new(x1 as u16 + 1, y, z1 as u16 + 1),
                    glam::U16Vec3::new(x0 as u16, y, z1 as u16 + 1),
                ],
                region: 1,
                area: AreaType::WALKABLE,
            });
        }
        Ok(set)
    }

    fn build_polygon_mesh(
        &self,
        contours: &ContourSet,
        max_vertices_per_polygon: u16,
    ) -> Result<PolygonMesh, KernelError> {
        let mut mesh = PolygonMesh {
            max_vertices_per_polygon,
            aabb: Aabb3d::new(contours.origin, contours.origin),
            cell_size: contours.cell_size,
            cell_height: contours.cell_height,
            ..Default::default()
        };
        for contour in &contours.contours {
            if contour.vertices.len() > max_vertices_per_polygon as usize {
                return Err(KernelError::new("contour exceeds polygon vertex budget"));
            }
            let base = mesh.vertices.len() as u16;
            mesh.vertices.extend_from_slice(&contour.vertices);
            let mut poly = vec![MESH_NULL_IDX; max_vertices_per_polygon as usize];
            for (i, _) in contour.vertices.iter().enumerate() {
                poly[i] = base + i as u16;
            }
            mesh.polygons.extend_from_slice(&poly);
            mesh.areas.push(contour.area);
            mesh.flags.push(0);
        }
        Ok(mesh)
    }

    fn build_detail_mesh(
        &self,
        mesh: &PolygonMesh,
        _field: &CompactHeightfield,
        _sample_dist: f32,
        _sample_max_error: f32,
    ) -> Result<DetailMesh, KernelError> {
        Ok(DetailMesh {
            meshes: vec![[0, 0, 0, 0]; mesh.polygon_count()],
            vertices: Vec::new(),
            triangles: Vec::new(),
        })
    }

    fn encode_tile(&self, params: &TileEncodeParams<'_>) -> Result<Vec<u8>, KernelError> {
        let mut blob = Vec::with_capacity(20);
        blob.extend_from_slice(&BLOB_MAGIC.to_le_bytes());
        blob.extend_from_slice(&params.coord.x.to_le_bytes());
        blob.extend_from_slice(&params.coord.z.to_le_bytes());
        blob.extend_from_slice(&(params.polygon_mesh.polygon_count() as u32).to_le_bytes());
        blob.extend_from_slice(&(params.polygon_mesh.vertices.len() as u32).to_le_bytes());
        Ok(blob)
    }

    fn decode_tile_header(&self, data: &[u8]) -> Result<TileHeader, KernelError> {
        if data.len() < 20 {
            return Err(KernelError::new("tile blob truncated"));
        }
        let word = |i: usize| u32::from_le_bytes(data[i * 4..i * 4 + 4].try_into().unwrap());
        if word(0) != BLOB_MAGIC {
            return Err(KernelError::new("bad tile blob magic"));
        }
        Ok(TileHeader {
            coord: TileCoord::new(word(1), word(2)),
            polygon_count: word(3),
            vertex_count: word(4),
        })
    }
}

/// A kernel wrapper that fails region building for one tile coordinate.
pub struct FailingKernel {
    pub inner: FakeKernel,
    pub fail_coord: TileCoord,
    pub tile_world_size: f32,
    pub origin: Vec3,
}

impl FailingKernel {
    pub fn new(fail_coord: TileCoord, origin: Vec3, tile_world_size: f32) -> Self {
        Self {
            inner: FakeKernel::default(),
            fail_coord,
            tile_world_size,
            origin,
        }
    }

    fn is_target(&self, aabb: &Aabb3d) -> bool {
        // Tile bounds are border-expanded, so match by center.
        let center = (aabb.min + aabb.max) * 0.5;
        let coord = TileCoord::from_world(center, self.origin, self.tile_world_size);
        coord == self.fail_coord
    }
}

impl MeshBuildKernel for FailingKernel {
    fn create_heightfield(
        &self,
        width: u32,
        height: u32,
        aabb: Aabb3d,
        cell_size: f32,
        cell_height: f32,
    ) -> Result<Heightfield, KernelError> {
        self.inner
            .create_heightfield(width, height, aabb, cell_size, cell_height)
    }

    fn rasterize_triangle(
        &self,
        field: &mut Heightfield,
        triangle: [Vec3; 3],
        area: AreaType,
        flag_merge_threshold: u16,
    ) -> Result<(), KernelError> {
        self.inner
            .rasterize_triangle(field, triangle, area, flag_merge_threshold)
    }

    fn filter_low_hanging_walkable_obstacles(&self, field: &mut Heightfield, climb: u16) {
        self.inner.filter_low_hanging_walkable_obstacles(field, climb);
    }

    fn filter_ledge_spans(&self, field: &mut Heightfield, height: u16, climb: u16) {
        self.inner.filter_ledge_spans(field, height, climb);
    }

    fn filter_walkable_low_height_spans(&self, field: &mut Heightfield, height: u16) {
        self.inner.filter_walkable_low_height_spans(field, height);
    }

    fn build_compact_heightfield(
        &self,
        field: &Heightfield,
        walkable_height: u16,
        walkable_climb: u16,
    ) -> Result<CompactHeightfield, KernelError> {
        self.inner
            .build_compact_heightfield(field, walkable_height, walkable_climb)
    }

    fn erode_walkable_area(
        &self,
        field: &mut CompactHeightfield,
        walkable_radius: u16,
    ) -> Result<(), KernelError> {
        self.inner.erode_walkable_area(field, walkable_radius)
    }

    fn build_distance_field(&self, field: &mut CompactHeightfield) -> Result<(), KernelError> {
        self.inner.build_distance_field(field)
    }

    fn build_regions(
        &self,
        field: &mut CompactHeightfield,
        border_size: u16,
        min_region_area: u16,
        merge_region_area: u16,
    ) -> Result<(), KernelError> {
        if self.is_target(&field.aabb) {
            return Err(KernelError::new("injected region failure"));
        }
        self.inner
            .build_regions(field, border_size, min_region_area, merge_region_area)
    }

    fn build_contours(
        &self,
        field: &CompactHeightfield,
        max_simplification_error: f32,
        max_edge_len: u16,
    ) -> Result<ContourSet, KernelError> {
        self.inner
            .build_contours(field, max_simplification_error, max_edge_len)
    }

    fn build_polygon_mesh(
        &self,
        contours: &ContourSet,
        max_vertices_per_polygon: u16,
    ) -> Result<PolygonMesh, KernelError> {
        self.inner.build_polygon_mesh(contours, max_vertices_per_polygon)
    }

    fn build_detail_mesh(
        &self,
        mesh: &PolygonMesh,
        field: &CompactHeightfield,
        sample_dist: f32,
        sample_max_error: f32,
    ) -> Result<DetailMesh, KernelError> {
        self.inner
            .build_detail_mesh(mesh, field, sample_dist, sample_max_error)
    }

    fn encode_tile(&self, params: &TileEncodeParams<'_>) -> Result<Vec<u8>, KernelError> {
        self.inner.encode_tile(params)
    }

    fn decode_tile_header(&self, data: &[u8]) -> Result<TileHeader, KernelError> {
        self.inner.decode_tile_header(data)
    }
}

/// Straight-line crowd: agents move directly towards their target at max
/// speed and report one remaining corner until they arrive.
pub struct FakeCrowdBackend;

struct FakeAgent {
    position: Vec3,
    velocity: Vec3,
    target: Option<Vec3>,
    max_speed: f32,
}

pub struct FakeCrowd {
    agents: Vec<Option<FakeAgent>>,
}

impl CrowdBackend for FakeCrowdBackend {
    fn create_crowd(
        &self,
        _navmesh: SharedNavMesh,
        max_agents: usize,
        max_agent_radius: f32,
    ) -> Result<Box<dyn Crowd>, CrowdError> {
        if max_agents == 0 || max_agent_radius <= 0.0 {
            return Err(CrowdError::ContextCreation("bad capacity".into()));
        }
        Ok(Box::new(FakeCrowd {
            agents: (0..max_agents).map(|_| None).collect(),
        }))
    }

    fn create_query(
        &self,
        navmesh: SharedNavMesh,
        max_nodes: u32,
    ) -> Result<Box<dyn NavMeshQuery>, CrowdError> {
        if max_nodes == 0 {
            return Err(CrowdError::QueryCreation("zero node budget".into()));
        }
        Ok(Box::new(FakeQuery { navmesh }))
    }
}

impl Crowd for FakeCrowd {
    fn add_agent(
        &mut self,
        position: Vec3,
        params: &CrowdAgentParams,
    ) -> Option<CrowdAgentHandle> {
        let slot = self.agents.iter().position(Option::is_none)?;
        self.agents[slot] = Some(FakeAgent {
            position,
            velocity: Vec3::ZERO,
            target: None,
            max_speed: params.max_speed,
        });
        Some(CrowdAgentHandle(slot as u32))
    }

    fn remove_agent(&mut self, handle: CrowdAgentHandle) {
        if let Some(slot) = self.agents.get_mut(handle.0 as usize) {
            *slot = None;
        }
    }

    fn agent_state(&self, handle: CrowdAgentHandle) -> Option<CrowdAgentState> {
        let agent = self.agents.get(handle.0 as usize)?.as_ref()?;
        Some(CrowdAgentState {
            position: agent.position,
            velocity: agent.velocity,
            corner_count: u32::from(agent.target.is_some()),
            target: agent.target,
        })
    }

    fn update_agent_params(&mut self, handle: CrowdAgentHandle, params: &CrowdAgentParams) {
        if let Some(Some(agent)) = self.agents.get_mut(handle.0 as usize) {
            agent.max_speed = params.max_speed;
        }
    }

    fn request_move_target(
        &mut self,
        handle: CrowdAgentHandle,
        _poly: PolyRef,
        position: Vec3,
    ) -> bool {
        match self.agents.get_mut(handle.0 as usize) {
            Some(Some(agent)) => {
                agent.target = Some(position);
                true
            }
            _ => false,
        }
    }

    fn reset_move_target(&mut self, handle: CrowdAgentHandle) {
        if let Some(Some(agent)) = self.agents.get_mut(handle.0 as usize) {
            agent.target = None;
            agent.velocity = Vec3::ZERO;
        }
    }

    fn update(&mut self, dt: f32) {
        for agent in self.agents.iter_mut().flatten() {
            let Some(target) = agent.target else {
                agent.velocity = Vec3::ZERO;
                continue;
            };
            let to_target = target - agent.position;
            let step = agent.max_speed * dt;
            if to_target.length() <= step {
                agent.position = target;
                agent.target = None;
                agent.velocity = Vec3::ZERO;
            } else {
                agent.velocity = to_target.normalize() * agent.max_speed;
                agent.position += agent.velocity * dt;
            }
        }
    }
}

/// Resolves a destination to the tile that contains it; succeeds only when
/// that tile is built and carries polygons.
struct FakeQuery {
    navmesh: SharedNavMesh,
}

impl NavMeshQuery for FakeQuery {
    fn find_nearest_poly(&self, center: Vec3, _half_extents: Vec3) -> Option<(PolyRef, Vec3)> {
        let navmesh = self.navmesh.read().unwrap();
        let params = navmesh.params()?;
        let coord = TileCoord::from_world(center, params.origin, params.tile_world_size);
        let tile = navmesh.tile_at(coord)?;
        (tile.polygon_count > 0).then_some((PolyRef(1), center))
    }
}

/// In-memory entity transforms.
#[derive(Default)]
pub struct FakeScene {
    positions: HashMap<EntityId, Vec3>,
    pub yaws: HashMap<EntityId, f32>,
}

impl FakeScene {
    pub fn spawn(&mut self, entity: EntityId, position: Vec3) {
        self.positions.insert(entity, position);
    }
}

impl EntityTransforms for FakeScene {
    fn position(&self, entity: EntityId) -> Vec3 {
        self.positions.get(&entity).copied().unwrap_or(Vec3::ZERO)
    }

    fn set_position(&mut self, entity: EntityId, position: Vec3) {
        self.positions.insert(entity, position);
    }

    fn set_yaw(&mut self, entity: EntityId, yaw: f32) {
        self.yaws.insert(entity, yaw);
    }
}

/// Records every raised event.
#[derive(Default)]
pub struct EventLog {
    pub finished: Vec<EntityId>,
}

impl NavigationEvents for EventLog {
    fn path_finished(&mut self, entity: EntityId) {
        self.finished.push(entity);
    }
}

/// A heightmap plane rising along +x by `gradient_x` world units of height
/// per unit of x.
pub struct FakeTerrain {
    pub origin: Vec3,
    pub resolution: UVec2,
    pub scale: f32,
    pub gradient_x: f32,
}

impl Terrain for FakeTerrain {
    fn resolution(&self) -> UVec2 {
        self.resolution
    }

    fn scale_xz(&self) -> f32 {
        self.scale
    }

    fn transform(&self) -> (Vec3, Quat) {
        (self.origin, Quat::IDENTITY)
    }

    fn height_at(&self, x: f32, _z: f32) -> f32 {
        x * self.gradient_x
    }

    fn bounds(&self) -> Aabb3d {
        let extent = Vec3::new(
            (self.resolution.x - 1) as f32 * self.scale,
            0.0,
            (self.resolution.y - 1) as f32 * self.scale,
        );
        let mut aabb = Aabb3d::new(self.origin, self.origin + extent);
        aabb.merge_point(self.origin + Vec3::new(extent.x, extent.x * self.gradient_x, extent.z));
        aabb
    }
}

/// A provider over fixed lists of world-space surfaces and terrains.
#[derive(Default)]
pub struct StaticGeometry {
    pub surfaces: Vec<MeshSurface>,
    pub terrains: Vec<FakeTerrain>,
}

impl StaticGeometry {
    /// A single horizontal quad from `min` to `max` at height `y`.
    pub fn quad(min: Vec3, max: Vec3, y: f32) -> Self {
        let vertices = vec![
            Vec3::new(min.x, y, min.z),
            Vec3::new(max.x, y, min.z),
            Vec3::new(max.x, y, max.z),
            Vec3::new(min.x, y, max.z),
        ];
        Self {
            surfaces: vec![MeshSurface {
                vertices,
                indices: vec![UVec3::new(0, 2, 1), UVec3::new(0, 3, 2)],
                flags: SurfaceFlags::empty(),
            }],
            terrains: Vec::new(),
        }
    }
}

impl GeometryProvider for StaticGeometry {
    fn scene_bounds(&self) -> Option<Aabb3d> {
        let mut bounds: Option<Aabb3d> = None;
        let mut add = |aabb: Aabb3d| match &mut bounds {
            Some(b) => b.merge(&aabb),
            None => bounds = Some(aabb),
        };
        for surface in &self.surfaces {
            if let Some(aabb) = Aabb3d::from_verts(&surface.vertices) {
                add(aabb);
            }
        }
        for terrain in &self.terrains {
            add(terrain.bounds());
        }
        bounds
    }

    fn visit_meshes(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(&MeshSurface)) {
        for surface in &self.surfaces {
            if Aabb3d::from_verts(&surface.vertices)
                .is_some_and(|b| b.overlaps(aabb))
            {
                visitor(surface);
            }
        }
    }

    fn visit_terrains(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(&dyn Terrain)) {
        for terrain in &self.terrains {
            if terrain.bounds().overlaps(aabb) {
                visitor(terrain);
            }
        }
    }
}
