//! The navigation façade.
//!
//! [`NavigationScene`] wires the build pipeline, the tile store, the path
//! query and the crowd simulator together and exposes the command surface
//! the host (editor, scripts, gameplay code) drives.

use std::{
    io::{Read, Write},
    path::Path,
    sync::{Arc, RwLock},
};

use glam::Vec3;
use thiserror::Error;
use tracing::{error, info};

use crate::{
    config::{NavigationParams, tile_grid_size},
    crowd::{CrowdBackend, CrowdError},
    debug::{
        DebugDraw, draw_compact_heightfield, draw_contours, draw_heightfield, draw_polygon_mesh,
    },
    geometry::{GeometryProvider, GeometrySampler},
    kernel::MeshBuildKernel,
    math::Aabb3d,
    navmesh::{NavMesh, NavMeshError, NavMeshParams, SharedNavMesh},
    persist::{self, PersistError},
    query::PathQuery,
    scene::{EntityId, EntityTransforms, NavigationEvents},
    simulator::{Agent, AgentId, CrowdSimulator},
    tile::{DebugArtifacts, DebugRetain, TileBuildError, TileBuilder, TileCoord},
};

/// Search node budget of the path query context.
const QUERY_NODE_BUDGET: u32 = 2048;

/// Version gate of the agent component blob.
const AGENT_BLOB_VERSION: u32 = 1;

/// Any failure of a navigation command.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// A tile build failed; the store was left cleared or untouched.
    #[error(transparent)]
    Build(#[from] TileBuildError),
    /// A tile store operation failed.
    #[error(transparent)]
    NavMesh(#[from] NavMeshError),
    /// A crowd-library resource could not be created.
    #[error(transparent)]
    Crowd(#[from] CrowdError),
    /// Saving or loading the tile store failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The agent component blob could not be encoded.
    #[error("could not encode agent components: {0}")]
    AgentEncode(#[from] bincode::error::EncodeError),
    /// The agent component blob could not be decoded.
    #[error("could not decode agent components: {0}")]
    AgentDecode(#[from] bincode::error::DecodeError),
    /// A command needing a built navmesh ran without one.
    #[error("no navmesh has been built or loaded")]
    NoNavMesh,
}

/// Serialized form of one agent component.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
struct AgentRecord {
    entity: EntityId,
    radius: f32,
    height: f32,
}

/// One navigation subsystem instance: tile store, build driver, path query
/// and crowd simulation over a single scene.
pub struct NavigationScene {
    kernel: Arc<dyn MeshBuildKernel>,
    backend: Arc<dyn CrowdBackend>,
    params: NavigationParams,
    aabb: Aabb3d,
    tiles_x: u32,
    tiles_z: u32,
    navmesh: SharedNavMesh,
    query: Option<PathQuery>,
    simulator: CrowdSimulator,
    debug: DebugArtifacts,
    /// Set by [`Self::start_simulation`]; a start issued before a navmesh
    /// exists is deferred until one does.
    simulation_requested: bool,
}

impl NavigationScene {
    /// Creates a scene with default parameters over the given mesh-build and
    /// crowd libraries.
    pub fn new(kernel: Arc<dyn MeshBuildKernel>, backend: Arc<dyn CrowdBackend>) -> Self {
        Self::with_params(kernel, backend, NavigationParams::default())
    }

    /// Creates a scene with explicit parameters.
    pub fn with_params(
        kernel: Arc<dyn MeshBuildKernel>,
        backend: Arc<dyn CrowdBackend>,
        params: NavigationParams,
    ) -> Self {
        let resync = params.resync_distance_sq;
        Self {
            kernel,
            backend,
            params,
            aabb: Aabb3d::default(),
            tiles_x: 0,
            tiles_z: 0,
            navmesh: Arc::new(RwLock::new(NavMesh::new())),
            query: None,
            simulator: CrowdSimulator::new(resync),
            debug: DebugArtifacts::default(),
            simulation_requested: false,
        }
    }

    /// The current build parameters.
    pub fn params(&self) -> &NavigationParams {
        &self.params
    }

    /// Replaces the build parameters. Takes effect on the next full build;
    /// tiles already in the store keep the parameters of their build epoch.
    pub fn set_params(&mut self, params: NavigationParams) {
        self.simulator
            .set_resync_distance_sq(params.resync_distance_sq);
        self.params = params;
    }

    /// The shared tile store.
    pub fn navmesh(&self) -> &SharedNavMesh {
        &self.navmesh
    }

    /// Whether a navmesh is available for queries and simulation.
    pub fn is_navmesh_ready(&self) -> bool {
        self.navmesh.read().expect("navmesh lock poisoned").is_ready()
    }

    /// Total polygons across all stored tiles.
    pub fn polygon_count(&self) -> u32 {
        self.navmesh
            .read()
            .expect("navmesh lock poisoned")
            .polygon_count()
    }

    /// The tile grid dimensions of the current build epoch.
    pub fn grid_size(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_z)
    }

    // --- build -----------------------------------------------------------

    /// Builds the whole navmesh: computes the navigable AABB from all
    /// geometry, initializes the store and builds every tile in row-major
    /// order.
    ///
    /// Aborts on the first tile failure, leaving the store cleared.
    pub fn generate_navmesh(
        &mut self,
        geometry: &dyn GeometryProvider,
    ) -> Result<(), NavigationError> {
        self.clear();

        let aabb = geometry.scene_bounds().unwrap_or_default();
        let (tiles_x, tiles_z) = tile_grid_size(&aabb, &self.params);
        let params =
            NavMeshParams::for_grid(aabb.min, self.params.tile_world_size(), tiles_x * tiles_z)?;
        self.navmesh
            .write()
            .expect("navmesh lock poisoned")
            .init(params)?;
        self.aabb = aabb;
        self.tiles_x = tiles_x;
        self.tiles_z = tiles_z;
        match self.create_query() {
            Ok(query) => self.query = Some(query),
            Err(err) => {
                self.clear();
                return Err(err);
            }
        }

        let config = self.params.derive();
        let sampler = GeometrySampler::new(&self.params, config.walkable_climb);
        let kernel = Arc::clone(&self.kernel);
        let builder = TileBuilder::new(kernel.as_ref(), sampler, config, &aabb);
        for z in 0..tiles_z {
            for x in 0..tiles_x {
                let coord = TileCoord::new(x, z);
                let built = match builder.build(coord, geometry, DebugRetain::empty()) {
                    Ok(built) => built,
                    Err(err) => {
                        self.clear();
                        return Err(err.into());
                    }
                };
                let mut navmesh = self.navmesh.write().expect("navmesh lock poisoned");
                if let Err(err) = navmesh.add_tile(built.into()) {
                    drop(navmesh);
                    self.clear();
                    return Err(err.into());
                }
            }
        }

        info!(target: "navigation", "built navmesh: {tiles_x}x{tiles_z} tiles, {} polygons", self.polygon_count());
        Ok(())
    }

    /// Rebuilds the tile at `coord`, evicting any previous tile there first.
    /// Retained intermediate buffers replace those of the previous build.
    pub fn generate_tile(
        &mut self,
        coord: TileCoord,
        geometry: &dyn GeometryProvider,
        retain: DebugRetain,
    ) -> Result<(), NavigationError> {
        if !self.is_navmesh_ready() {
            return Err(NavigationError::NoNavMesh);
        }
        self.debug.clear();

        let config = self.params.derive();
        let sampler = GeometrySampler::new(&self.params, config.walkable_climb);
        let builder = TileBuilder::new(self.kernel.as_ref(), sampler, config, &self.aabb);

        let mut navmesh = self.navmesh.write().expect("navmesh lock poisoned");
        navmesh.remove_tile(coord);
        drop(navmesh);

        let mut built = builder.build(coord, geometry, retain)?;
        self.debug = std::mem::take(&mut built.debug);
        self.navmesh
            .write()
            .expect("navmesh lock poisoned")
            .add_tile(built.into())?;
        Ok(())
    }

    /// Rebuilds the tile containing the world position `pos`.
    pub fn generate_tile_at(
        &mut self,
        pos: Vec3,
        geometry: &dyn GeometryProvider,
        retain: DebugRetain,
    ) -> Result<(), NavigationError> {
        let origin = {
            let navmesh = self.navmesh.read().expect("navmesh lock poisoned");
            navmesh.params().ok_or(NavigationError::NoNavMesh)?.origin
        };
        let coord = TileCoord::from_world(pos, origin, self.params.tile_world_size());
        self.generate_tile(coord, geometry, retain)
    }

    /// Drops the navmesh, the query and any retained debug buffers. Stops
    /// the simulator if it was running; a requested start stays deferred.
    pub fn clear(&mut self) {
        self.simulator.stop();
        self.navmesh.write().expect("navmesh lock poisoned").clear();
        self.query = None;
        self.debug.clear();
        self.tiles_x = 0;
        self.tiles_z = 0;
    }

    // --- persistence -----------------------------------------------------

    /// Writes the tile store to `writer`.
    pub fn save_to<W: Write>(&self, writer: &mut W) -> Result<(), NavigationError> {
        let navmesh = self.navmesh.read().expect("navmesh lock poisoned");
        persist::save(writer, &self.aabb, self.tiles_x, self.tiles_z, &navmesh)?;
        Ok(())
    }

    /// Writes the tile store to a file at `path`.
    pub fn save(&self, path: &Path) -> Result<(), NavigationError> {
        let navmesh = self.navmesh.read().expect("navmesh lock poisoned");
        if let Err(err) = persist::save_to_path(path, &self.aabb, self.tiles_x, self.tiles_z, &navmesh)
        {
            error!(target: "navigation", "could not save navmesh to {}: {err}", path.display());
            return Err(err.into());
        }
        Ok(())
    }

    /// Replaces the tile store with one read from `reader`.
    ///
    /// Clears the existing navmesh first; on failure the store stays
    /// cleared, never half-populated.
    pub fn load_from<R: Read>(&mut self, reader: &mut R) -> Result<(), NavigationError> {
        self.clear();
        let loaded = match persist::load(reader, self.kernel.as_ref()) {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(target: "navigation", "could not load navmesh: {err}");
                return Err(err.into());
            }
        };
        *self.navmesh.write().expect("navmesh lock poisoned") = loaded.navmesh;
        self.aabb = loaded.aabb;
        self.tiles_x = loaded.tiles_x;
        self.tiles_z = loaded.tiles_z;
        match self.create_query() {
            Ok(query) => self.query = Some(query),
            Err(err) => {
                self.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Replaces the tile store with one read from a file at `path`.
    pub fn load(&mut self, path: &Path) -> Result<(), NavigationError> {
        let mut reader = std::io::BufReader::new(
            std::fs::File::open(path).map_err(PersistError::from)?,
        );
        self.load_from(&mut reader)
    }

    // --- simulation ------------------------------------------------------

    /// Starts the crowd simulation, or defers the start until a navmesh
    /// exists. Existing agents are (re)attached at their entities' current
    /// positions.
    pub fn start_simulation(
        &mut self,
        scene: &dyn EntityTransforms,
    ) -> Result<(), NavigationError> {
        self.simulation_requested = true;
        if self.simulator.is_running() || !self.is_navmesh_ready() {
            return Ok(());
        }
        self.simulator.start(
            self.backend.as_ref(),
            Arc::clone(&self.navmesh),
            self.params.crowd_capacity,
            self.params.max_agent_radius,
            scene,
        )?;
        Ok(())
    }

    /// Stops the crowd simulation, detaching every agent.
    pub fn stop_simulation(&mut self) {
        self.simulation_requested = false;
        self.simulator.stop();
    }

    /// Whether the crowd simulation is currently running.
    pub fn is_simulation_running(&self) -> bool {
        self.simulator.is_running()
    }

    /// Advances the simulation by `dt` seconds. A deferred start takes
    /// effect here once a navmesh is available. No-op while stopped.
    pub fn update(
        &mut self,
        dt: f32,
        scene: &mut dyn EntityTransforms,
        events: &mut dyn NavigationEvents,
    ) {
        if self.simulation_requested && !self.simulator.is_running() && self.is_navmesh_ready() {
            if let Err(err) = self.simulator.start(
                self.backend.as_ref(),
                Arc::clone(&self.navmesh),
                self.params.crowd_capacity,
                self.params.max_agent_radius,
                scene,
            ) {
                error!(target: "navigation", "deferred simulation start failed: {err}");
                self.simulation_requested = false;
            }
        }
        self.simulator.update(dt, scene, events);
    }

    /// Notifies the simulator of an out-of-band transform change.
    pub fn entity_transformed(&mut self, entity: EntityId, scene: &dyn EntityTransforms) {
        self.simulator.entity_transformed(entity, scene);
    }

    /// Issues a move request towards `destination` at `speed`. Returns
    /// whether the request was accepted; expected misses (stopped simulator,
    /// unknown agent, unreachable destination) are plain `false`.
    pub fn navigate(&mut self, entity: EntityId, destination: Vec3, speed: f32) -> bool {
        let Some(query) = self.query.as_ref() else {
            return false;
        };
        self.simulator.navigate(entity, destination, speed, query)
    }

    // --- agent components ------------------------------------------------

    /// Binds a navigation agent to `entity`.
    pub fn create_agent(&mut self, entity: EntityId, scene: &dyn EntityTransforms) -> AgentId {
        self.simulator.create_agent(entity, scene)
    }

    /// Detaches and removes the agent bound to `entity`.
    pub fn destroy_agent(&mut self, entity: EntityId) {
        self.simulator.destroy_agent(entity);
    }

    /// The agent bound to `entity`, if any.
    pub fn agent(&self, entity: EntityId) -> Option<&Agent> {
        self.simulator.agent(entity)
    }

    /// Number of agent components, attached or not.
    pub fn agent_count(&self) -> usize {
        self.simulator.agent_count()
    }

    /// Sets the radius future attachments and tile builds use for `entity`'s
    /// agent.
    pub fn set_agent_radius(&mut self, entity: EntityId, radius: f32) {
        self.simulator.set_agent_radius(entity, radius);
    }

    /// Sets the height future attachments use for `entity`'s agent.
    pub fn set_agent_height(&mut self, entity: EntityId, height: f32) {
        self.simulator.set_agent_height(entity, height);
    }

    /// Encodes all agent components into a versioned blob.
    pub fn serialize_agents(&self) -> Result<Vec<u8>, NavigationError> {
        let records: Vec<AgentRecord> = self
            .simulator
            .agents()
            .map(|agent| AgentRecord {
                entity: agent.entity,
                radius: agent.radius,
                height: agent.height,
            })
            .collect();
        let blob = bincode::serde::encode_to_vec(
            (AGENT_BLOB_VERSION, records),
            bincode::config::standard(),
        )?;
        Ok(blob)
    }

    /// Replaces all agent components with those decoded from `blob`.
    /// Restored agents come back detached and re-attach on the next
    /// simulator start.
    pub fn deserialize_agents(&mut self, blob: &[u8]) -> Result<(), NavigationError> {
        let ((_version, records), _): ((u32, Vec<AgentRecord>), usize) =
            bincode::serde::decode_from_slice(blob, bincode::config::standard())?;
        self.simulator.clear_agents();
        for record in records {
            self.simulator
                .restore_agent(record.entity, record.radius, record.height);
        }
        Ok(())
    }

    // --- debug -----------------------------------------------------------

    /// Draws the retained solid heightfield, if any.
    pub fn debug_draw_heightfield(&self, sink: &mut dyn DebugDraw) {
        if let Some(field) = &self.debug.heightfield {
            draw_heightfield(field, sink);
        }
    }

    /// Draws the retained compact heightfield, if any.
    pub fn debug_draw_compact_heightfield(&self, sink: &mut dyn DebugDraw) {
        if let Some(field) = &self.debug.compact {
            draw_compact_heightfield(field, sink);
        }
    }

    /// Draws the retained contour set, if any.
    pub fn debug_draw_contours(&self, sink: &mut dyn DebugDraw) {
        if let Some(contours) = &self.debug.contours {
            draw_contours(contours, sink);
        }
    }

    /// Draws the retained polygon mesh, if any.
    pub fn debug_draw_navmesh(&self, sink: &mut dyn DebugDraw) {
        if let Some(mesh) = &self.debug.poly_mesh {
            draw_polygon_mesh(mesh, sink);
        }
    }

    fn create_query(&self) -> Result<PathQuery, NavigationError> {
        let query = self
            .backend
            .create_query(Arc::clone(&self.navmesh), QUERY_NODE_BUDGET)
            .map_err(|err| {
                error!(target: "navigation", "could not create navmesh query: {err}");
                err
            })?;
        Ok(PathQuery::new(query))
    }
}
