//! The crowd-simulation library contract.
//!
//! Steering, local avoidance and corridor maintenance are computed by an
//! external crowd library reached through [`CrowdBackend`] and [`Crowd`];
//! [`CrowdSimulator`](crate::simulator::CrowdSimulator) owns the agent
//! bookkeeping around it.

use glam::Vec3;
use thiserror::Error;

use crate::{
    navmesh::SharedNavMesh,
    query::{NavMeshQuery, PolyRef},
};

bitflags::bitflags! {
    /// Steering behaviours the crowd library applies to an agent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CrowdUpdateFlags: u8 {
        /// Smooth turns by anticipating corners.
        const ANTICIPATE_TURNS = 1 << 0;
        /// Avoid dynamic obstacles (other agents).
        const OBSTACLE_AVOIDANCE = 1 << 1;
        /// Keep separation distance from neighbours.
        const SEPARATION = 1 << 2;
        /// Optimize the corridor using visibility checks.
        const OPTIMIZE_VIS = 1 << 3;
        /// Optimize the corridor topology.
        const OPTIMIZE_TOPO = 1 << 4;
    }
}

impl Default for CrowdUpdateFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Handle to one live agent inside the crowd library's context.
///
/// Valid only for the lifetime of the context that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrowdAgentHandle(pub u32);

/// Configuration of one crowd agent.
#[derive(Debug, Clone, PartialEq)]
pub struct CrowdAgentParams {
    /// Agent cylinder radius. `[Units: wu]`
    pub radius: f32,
    /// Agent cylinder height. `[Units: wu]`
    pub height: f32,
    /// Maximum acceleration. `[Units: wu/s²]`
    pub max_acceleration: f32,
    /// Maximum speed. `[Units: wu/s]`
    pub max_speed: f32,
    /// Range within which other agents are considered for avoidance.
    pub collision_query_range: f32,
    /// How far ahead the corridor is optimized.
    pub path_optimization_range: f32,
    /// Enabled steering behaviours.
    pub update_flags: CrowdUpdateFlags,
}

impl CrowdAgentParams {
    /// Derives steering parameters from the agent's cylinder, using the
    /// ranges the crowd was tuned with.
    pub fn for_cylinder(radius: f32, height: f32) -> Self {
        Self {
            radius,
            height,
            max_acceleration: 10.0,
            max_speed: 10.0,
            collision_query_range: radius * 12.0,
            path_optimization_range: radius * 30.0,
            update_flags: CrowdUpdateFlags::default(),
        }
    }
}

/// Runtime state of one crowd agent, owned by the crowd library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrowdAgentState {
    /// Current simulated position.
    pub position: Vec3,
    /// Current simulated velocity.
    pub velocity: Vec3,
    /// Remaining corner points of the path corridor; zero means the agent has
    /// arrived at (or lost) its target.
    pub corner_count: u32,
    /// The active movement target, if a move request is in flight.
    pub target: Option<Vec3>,
}

/// Failures allocating crowd-library resources.
#[derive(Debug, Error)]
pub enum CrowdError {
    /// The crowd context could not be created.
    #[error("could not create crowd context: {0}")]
    ContextCreation(String),
    /// The navmesh query could not be created.
    #[error("could not create navmesh query: {0}")]
    QueryCreation(String),
}

/// Factory for crowd-library resources bound to a navmesh.
pub trait CrowdBackend: Send + Sync {
    /// Creates a crowd context of fixed agent capacity over `navmesh`.
    fn create_crowd(
        &self,
        navmesh: SharedNavMesh,
        max_agents: usize,
        max_agent_radius: f32,
    ) -> Result<Box<dyn Crowd>, CrowdError>;

    /// Creates a nearest-polygon query over `navmesh` with the given search
    /// node budget.
    fn create_query(
        &self,
        navmesh: SharedNavMesh,
        max_nodes: u32,
    ) -> Result<Box<dyn NavMeshQuery>, CrowdError>;
}

/// A live crowd context of fixed agent capacity.
pub trait Crowd: Send {
    /// Adds an agent at `position`. Returns `None` when the context is full.
    fn add_agent(&mut self, position: Vec3, params: &CrowdAgentParams)
    -> Option<CrowdAgentHandle>;

    /// Removes an agent, invalidating its handle.
    fn remove_agent(&mut self, handle: CrowdAgentHandle);

    /// The runtime state of an agent.
    fn agent_state(&self, handle: CrowdAgentHandle) -> Option<CrowdAgentState>;

    /// Replaces an agent's steering parameters.
    fn update_agent_params(&mut self, handle: CrowdAgentHandle, params: &CrowdAgentParams);

    /// Requests a move towards `position` on `poly`. Returns whether the
    /// request was accepted.
    fn request_move_target(
        &mut self,
        handle: CrowdAgentHandle,
        poly: PolyRef,
        position: Vec3,
    ) -> bool;

    /// Cancels an agent's move request and clears its corridor.
    fn reset_move_target(&mut self, handle: CrowdAgentHandle);

    /// Advances the simulation by `dt` seconds, steering every agent once.
    fn update(&mut self, dt: f32);
}
