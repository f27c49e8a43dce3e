use crate::math::{Chirality, Pose};
use crate::registry::{AnchorId, MeshEntity};
use std::sync::{Arc, Mutex};

/// Renderer/scene-graph collaborator. The registry forwards entity lifecycle
/// changes here; the reconciler forwards fingertip proxy moves. The scene
/// graph holds no ownership of mesh entities, only their ids.
pub trait SceneGraph: Send {
    fn label(&self) -> &'static str;
    fn entity_added(&mut self, entity: &MeshEntity);
    fn entity_updated(&mut self, entity: &MeshEntity);
    fn entity_removed(&mut self, id: AnchorId);
    fn fingertip_moved(&mut self, chirality: Chirality, pose: &Pose);
}

/// Headless scene graph used when no renderer is attached.
#[derive(Debug, Default)]
pub struct NullSceneGraph;

impl SceneGraph for NullSceneGraph {
    fn label(&self) -> &'static str {
        "Null Scene Graph"
    }

    fn entity_added(&mut self, entity: &MeshEntity) {
        log::debug!("[scene] add {}", entity.id);
    }

    fn entity_updated(&mut self, entity: &MeshEntity) {
        log::debug!("[scene] update {}", entity.id);
    }

    fn entity_removed(&mut self, id: AnchorId) {
        log::debug!("[scene] remove {id}");
    }

    fn fingertip_moved(&mut self, chirality: Chirality, pose: &Pose) {
        log::debug!(
            "[scene] {} fingertip at {:?}",
            chirality.label(),
            pose.translation()
        );
    }
}

/// One scene-graph side effect, as seen by [`RecordingSceneGraph`].
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Added(AnchorId),
    Updated(AnchorId),
    Removed(AnchorId),
    FingertipMoved(Chirality, [f32; 3]),
}

/// Scene graph that records every side effect; used by tests and demos to
/// observe what the registry published.
#[derive(Debug, Default)]
pub struct RecordingSceneGraph {
    events: Arc<Mutex<Vec<SceneEvent>>>,
}

impl RecordingSceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded events, valid after the scene graph has
    /// been boxed and handed to the registry.
    pub fn events(&self) -> Arc<Mutex<Vec<SceneEvent>>> {
        Arc::clone(&self.events)
    }

    fn push(&self, event: SceneEvent) {
        self.events
            .lock()
            .expect("scene event mutex should not poison")
            .push(event);
    }
}

impl SceneGraph for RecordingSceneGraph {
    fn label(&self) -> &'static str {
        "Recording Scene Graph"
    }

    fn entity_added(&mut self, entity: &MeshEntity) {
        self.push(SceneEvent::Added(entity.id));
    }

    fn entity_updated(&mut self, entity: &MeshEntity) {
        self.push(SceneEvent::Updated(entity.id));
    }

    fn entity_removed(&mut self, id: AnchorId) {
        self.push(SceneEvent::Removed(id));
    }

    fn fingertip_moved(&mut self, chirality: Chirality, pose: &Pose) {
        self.push(SceneEvent::FingertipMoved(chirality, pose.translation()));
    }
}
