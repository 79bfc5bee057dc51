//! Live agent state and the per-frame crowd step.

use std::collections::HashMap;

use slotmap::SlotMap;
use tracing::warn;

use crate::{
    crowd::{Crowd, CrowdAgentHandle, CrowdAgentParams, CrowdBackend, CrowdError},
    navmesh::SharedNavMesh,
    query::PathQuery,
    scene::{EntityId, EntityTransforms, NavigationEvents},
};

slotmap::new_key_type! {
    /// Stable id of an [`Agent`] record in the simulator's arena.
    pub struct AgentId;
}

/// Default agent cylinder radius for newly created agents. `[Units: wu]`
pub const DEFAULT_AGENT_RADIUS: f32 = 0.5;
/// Default agent cylinder height for newly created agents. `[Units: wu]`
pub const DEFAULT_AGENT_HEIGHT: f32 = 2.0;

/// Speeds at or below this are treated as standing still; the entity's
/// heading is left untouched to avoid facing jitter.
const MIN_TURN_SPEED: f32 = 1e-4;

/// One navigation agent bound to a scene entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    /// The entity this agent moves.
    pub entity: EntityId,
    /// Agent cylinder radius. Changing it only affects future crowd
    /// attachments and tile builds, not erosion already baked into tiles.
    pub radius: f32,
    /// Agent cylinder height.
    pub height: f32,
    /// Crowd-library handle; `None` while the simulator is stopped.
    handle: Option<CrowdAgentHandle>,
    /// Set once the arrival event for the current request has fired.
    finished: bool,
}

impl Agent {
    /// The agent's crowd handle, if it is live.
    pub fn handle(&self) -> Option<CrowdAgentHandle> {
        self.handle
    }

    /// Whether the agent has completed (or never received) a move request.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Owns all agents and advances them through the crowd library once per
/// simulation step.
pub struct CrowdSimulator {
    agents: SlotMap<AgentId, Agent>,
    by_entity: HashMap<EntityId, AgentId>,
    crowd: Option<Box<dyn Crowd>>,
    resync_distance_sq: f32,
}

impl CrowdSimulator {
    /// Creates a stopped simulator.
    pub fn new(resync_distance_sq: f32) -> Self {
        Self {
            agents: SlotMap::with_key(),
            by_entity: HashMap::new(),
            crowd: None,
            resync_distance_sq,
        }
    }

    /// Whether a crowd context is live.
    pub fn is_running(&self) -> bool {
        self.crowd.is_some()
    }

    /// Updates the squared resync tolerance used by
    /// [`Self::entity_transformed`].
    pub fn set_resync_distance_sq(&mut self, resync_distance_sq: f32) {
        self.resync_distance_sq = resync_distance_sq;
    }

    /// Number of agents, live or not.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Iterates over all agent records.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// The agent bound to `entity`, if any.
    pub fn agent(&self, entity: EntityId) -> Option<&Agent> {
        self.agents.get(*self.by_entity.get(&entity)?)
    }

    /// Binds a new agent with default dimensions to `entity`. If the
    /// simulator is running the agent is attached immediately, otherwise it
    /// stays detached until the next start. Creating an agent for an entity
    /// that already has one returns the existing record.
    pub fn create_agent(&mut self, entity: EntityId, scene: &dyn EntityTransforms) -> AgentId {
        if let Some(id) = self.by_entity.get(&entity) {
            return *id;
        }
        let mut agent = Agent {
            entity,
            radius: DEFAULT_AGENT_RADIUS,
            height: DEFAULT_AGENT_HEIGHT,
            handle: None,
            finished: true,
        };
        if let Some(crowd) = self.crowd.as_mut() {
            agent.handle = attach(crowd.as_mut(), &agent, scene);
        }
        let id = self.agents.insert(agent);
        self.by_entity.insert(entity, id);
        id
    }

    /// Restores an agent record with explicit dimensions, detached. Used when
    /// deserializing the component state of a saved scene.
    pub fn restore_agent(&mut self, entity: EntityId, radius: f32, height: f32) -> AgentId {
        let id = self.agents.insert(Agent {
            entity,
            radius,
            height,
            handle: None,
            finished: true,
        });
        self.by_entity.insert(entity, id);
        id
    }

    /// Detaches and removes the agent bound to `entity`.
    pub fn destroy_agent(&mut self, entity: EntityId) {
        let Some(id) = self.by_entity.remove(&entity) else {
            return;
        };
        if let Some(agent) = self.agents.remove(id)
            && let (Some(handle), Some(crowd)) = (agent.handle, self.crowd.as_mut())
        {
            crowd.remove_agent(handle);
        }
    }

    /// Removes every agent record, detaching live ones first.
    pub fn clear_agents(&mut self) {
        if let Some(crowd) = self.crowd.as_mut() {
            for agent in self.agents.values() {
                if let Some(handle) = agent.handle {
                    crowd.remove_agent(handle);
                }
            }
        }
        self.agents.clear();
        self.by_entity.clear();
    }

    /// Updates the radius used for future attachments of `entity`'s agent.
    pub fn set_agent_radius(&mut self, entity: EntityId, radius: f32) {
        if let Some(id) = self.by_entity.get(&entity)
            && let Some(agent) = self.agents.get_mut(*id)
        {
            agent.radius = radius;
        }
    }

    /// Updates the height used for future attachments of `entity`'s agent.
    pub fn set_agent_height(&mut self, entity: EntityId, height: f32) {
        if let Some(id) = self.by_entity.get(&entity)
            && let Some(agent) = self.agents.get_mut(*id)
        {
            agent.height = height;
        }
    }

    /// Allocates the crowd context and attaches every existing agent at its
    /// entity's current position.
    pub fn start(
        &mut self,
        backend: &dyn CrowdBackend,
        navmesh: SharedNavMesh,
        capacity: usize,
        max_agent_radius: f32,
        scene: &dyn EntityTransforms,
    ) -> Result<(), CrowdError> {
        debug_assert!(self.crowd.is_none());
        let mut crowd = backend.create_crowd(navmesh, capacity, max_agent_radius)?;
        for agent in self.agents.values_mut() {
            agent.handle = attach(crowd.as_mut(), agent, scene);
        }
        self.crowd = Some(crowd);
        Ok(())
    }

    /// Detaches every agent and releases the crowd context.
    pub fn stop(&mut self) {
        let Some(mut crowd) = self.crowd.take() else {
            return;
        };
        for agent in self.agents.values_mut() {
            if let Some(handle) = agent.handle.take() {
                crowd.remove_agent(handle);
            }
        }
    }

    /// Advances the crowd by `dt` and writes every live agent's simulated
    /// position and heading back to its entity. Raises a one-shot
    /// path-finished event when an agent's corridor runs out of corners.
    ///
    /// No-op while stopped. Must be called at most once per simulation step.
    pub fn update(
        &mut self,
        dt: f32,
        scene: &mut dyn EntityTransforms,
        events: &mut dyn NavigationEvents,
    ) {
        let Some(crowd) = self.crowd.as_mut() else {
            return;
        };
        crowd.update(dt);

        for agent in self.agents.values_mut() {
            let Some(handle) = agent.handle else {
                continue;
            };
            let Some(state) = crowd.agent_state(handle) else {
                continue;
            };
            scene.set_position(agent.entity, state.position);
            let speed = state.velocity.length();
            if speed > MIN_TURN_SPEED {
                scene.set_yaw(agent.entity, state.velocity.x.atan2(state.velocity.z));
            }

            if state.corner_count == 0 {
                if !agent.finished {
                    crowd.reset_move_target(handle);
                    agent.finished = true;
                    events.path_finished(agent.entity);
                }
            } else {
                agent.finished = false;
            }
        }
    }

    /// Reacts to an out-of-band transform change of `entity`.
    ///
    /// If the entity's agent is live and its simulated position has drifted
    /// beyond the resync tolerance, the agent is detached and reattached at
    /// the new position: the external move is authoritative and any in-flight
    /// corridor and velocity state is discarded.
    pub fn entity_transformed(&mut self, entity: EntityId, scene: &dyn EntityTransforms) {
        let Some(crowd) = self.crowd.as_mut() else {
            return;
        };
        let Some(id) = self.by_entity.get(&entity) else {
            return;
        };
        let Some(agent) = self.agents.get_mut(*id) else {
            return;
        };
        let Some(handle) = agent.handle else {
            return;
        };
        let Some(state) = crowd.agent_state(handle) else {
            return;
        };
        let new_position = scene.position(entity);
        if (new_position - state.position).length_squared() > self.resync_distance_sq {
            crowd.remove_agent(handle);
            agent.handle = attach(crowd.as_mut(), agent, scene);
        }
    }

    /// Resolves `destination` and issues a move request for `entity`'s agent
    /// at `speed`. Returns whether the request was accepted.
    ///
    /// Fails without mutating the agent's existing target when the simulator
    /// is stopped, the entity has no live agent, or no walkable polygon is
    /// found near the destination.
    pub fn navigate(
        &mut self,
        entity: EntityId,
        destination: glam::Vec3,
        speed: f32,
        query: &PathQuery,
    ) -> bool {
        let Some(crowd) = self.crowd.as_mut() else {
            return false;
        };
        let Some(id) = self.by_entity.get(&entity) else {
            return false;
        };
        let Some(agent) = self.agents.get_mut(*id) else {
            return false;
        };
        let Some(handle) = agent.handle else {
            return false;
        };
        let Some((poly, _)) = query.resolve_destination(destination) else {
            return false;
        };

        let mut params = CrowdAgentParams::for_cylinder(agent.radius, agent.height);
        params.max_speed = speed;
        crowd.update_agent_params(handle, &params);
        let accepted = crowd.request_move_target(handle, poly, destination);
        if accepted {
            agent.finished = false;
        }
        accepted
    }
}

/// Adds `agent` to the crowd at its entity's current position.
fn attach(
    crowd: &mut dyn Crowd,
    agent: &Agent,
    scene: &dyn EntityTransforms,
) -> Option<CrowdAgentHandle> {
    let params = CrowdAgentParams::for_cylinder(agent.radius, agent.height);
    let handle = crowd.add_agent(scene.position(agent.entity), &params);
    if handle.is_none() {
        warn!(target: "navigation", "crowd context is full, agent for entity {:?} stays detached", agent.entity);
    }
    handle
}
