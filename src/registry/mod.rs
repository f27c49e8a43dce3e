mod scene;

pub use scene::{NullSceneGraph, RecordingSceneGraph, SceneEvent, SceneGraph};

use crate::math::Pose;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Stable identifier the sensing subsystem issues for one physical feature
/// (a reconstructed surface or a hand) for its tracked lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AnchorId(u64);

impl AnchorId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anchor#{}", self.0)
    }
}

/// Opaque handle for a collision shape derived from reconstructed geometry.
/// Only the meshing capability produces these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionShape {
    pub triangle_count: u32,
    pub extents: [f32; 3],
}

/// One reconstructed physical surface. Owned exclusively by the registry;
/// the renderer refers to it by id only.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntity {
    pub id: AnchorId,
    pub transform: Pose,
    pub shape: CollisionShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{0} is already present in the registry")]
    DuplicateId(AnchorId),
    #[error("{0} has no live registry entry")]
    UnknownId(AnchorId),
}

/// Mapping from anchor id to its live mesh entity.
///
/// Invariant: at most one entity per id. Updates and removals for ids with
/// no live entry are rejected with [`RegistryError::UnknownId`] rather than
/// fabricated, since a surface cannot legally mutate or vanish before being
/// added.
pub struct MeshRegistry {
    entities: HashMap<AnchorId, MeshEntity>,
    scene: Box<dyn SceneGraph>,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::with_scene(Box::new(NullSceneGraph))
    }

    pub fn with_scene(scene: Box<dyn SceneGraph>) -> Self {
        Self {
            entities: HashMap::new(),
            scene,
        }
    }

    /// Creates the entity for a newly added surface and publishes it to the
    /// scene graph. Fails if the id already has a live entry.
    pub fn upsert_added(
        &mut self,
        id: AnchorId,
        transform: Pose,
        shape: CollisionShape,
    ) -> Result<(), RegistryError> {
        if self.entities.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let entity = MeshEntity {
            id,
            transform,
            shape,
        };
        self.scene.entity_added(&entity);
        self.entities.insert(id, entity);
        Ok(())
    }

    /// Replaces the transform and shape of a live entity in place. Same
    /// identity, no re-creation, no entity-added side effect.
    pub fn apply_update(
        &mut self,
        id: AnchorId,
        transform: Pose,
        shape: CollisionShape,
    ) -> Result<(), RegistryError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(RegistryError::UnknownId(id))?;
        entity.transform = transform;
        entity.shape = shape;
        self.scene.entity_updated(entity);
        Ok(())
    }

    /// Detaches the entity from the scene graph and drops it.
    pub fn remove(&mut self, id: AnchorId) -> Result<(), RegistryError> {
        if self.entities.remove(&id).is_none() {
            return Err(RegistryError::UnknownId(id));
        }
        self.scene.entity_removed(id);
        Ok(())
    }

    pub fn get(&self, id: AnchorId) -> Option<&MeshEntity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live anchor ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = AnchorId> + '_ {
        self.entities.keys().copied()
    }

    pub(crate) fn scene_mut(&mut self) -> &mut dyn SceneGraph {
        self.scene.as_mut()
    }
}

impl Default for MeshRegistry {
    fn default() -> Self {
        Self::new()
    }
}
