//! Contracts to the host scene/entity system.

use glam::Vec3;

/// Identifier of a host-scene entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct EntityId(pub u64);

/// Read/write access to entity transforms.
///
/// The simulator reads positions when attaching agents and writes simulated
/// positions and headings back every step.
pub trait EntityTransforms {
    /// Current world-space position of `entity`.
    fn position(&self, entity: EntityId) -> Vec3;

    /// Moves `entity` to `position`.
    fn set_position(&mut self, entity: EntityId, position: Vec3);

    /// Turns `entity` to face along `yaw` radians around the up axis.
    fn set_yaw(&mut self, entity: EntityId, yaw: f32);
}

/// Sink for navigation events raised towards the host's script or behaviour
/// layer.
pub trait NavigationEvents {
    /// An agent's path corridor ran out of corners: it has arrived. Raised
    /// once per completed `navigate` request.
    fn path_finished(&mut self, entity: EntityId);
}

/// An event sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl NavigationEvents for NoEvents {
    fn path_finished(&mut self, _entity: EntityId) {}
}
