#![doc = include_str!("../readme.md")]

mod config;
mod crowd;
mod debug;
mod field;
mod geometry;
mod kernel;
mod math;
mod navigation;
mod navmesh;
mod persist;
mod poly;
mod query;
mod scene;
mod simulator;
mod tile;

pub use config::{BuildConfig, NavigationParams};
pub use crowd::{
    Crowd, CrowdAgentHandle, CrowdAgentParams, CrowdAgentState, CrowdBackend, CrowdError,
    CrowdUpdateFlags,
};
pub use debug::{
    DebugDraw, draw_compact_heightfield, draw_contours, draw_heightfield, draw_polygon_mesh,
};
pub use field::{CompactCell, CompactHeightfield, CompactSpan, Heightfield, Span};
pub use geometry::{GeometryProvider, GeometrySampler, MeshSurface, SurfaceFlags, Terrain};
pub use kernel::{
    AreaType, KernelError, MeshBuildKernel, POLY_FLAG_WALKABLE, TileEncodeParams, TileHeader,
};
pub use math::Aabb3d;
pub use navigation::{NavigationError, NavigationScene};
pub use navmesh::{NavMesh, NavMeshError, NavMeshParams, SharedNavMesh, Tile};
pub use persist::{LoadedStore, PersistError, load, load_from_path, save, save_to_path};
pub use poly::{Contour, ContourSet, DetailMesh, MESH_NULL_IDX, PolygonMesh};
pub use query::{DESTINATION_SEARCH_EXTENTS, NavMeshQuery, PathQuery, PolyRef};
pub use scene::{EntityId, EntityTransforms, NavigationEvents, NoEvents};
pub use simulator::{
    Agent, AgentId, CrowdSimulator, DEFAULT_AGENT_HEIGHT, DEFAULT_AGENT_RADIUS,
};
pub use tile::{
    BuildStage, BuiltTile, DebugArtifacts, DebugRetain, TileBuildError, TileBuilder, TileCoord,
};
