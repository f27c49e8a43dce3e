use crate::math::{Chirality, Pose};
use crate::registry::{AnchorId, MeshRegistry, RegistryError, SceneGraph};
use crate::sensing::{
    HandAnchorUpdate, HandJoint, Meshing, ReconstructionKind, ReconstructionUpdate,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// The most recent world-space fingertip pose per hand. Slots start unset
/// and are overwritten wholesale on every accepted hand update; they are
/// never cleared for the life of the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedHands {
    slots: [Option<Pose>; Chirality::count()],
}

impl TrackedHands {
    pub fn get(&self, chirality: Chirality) -> Option<Pose> {
        self.slots[chirality.index()]
    }

    pub fn set(&mut self, chirality: Chirality, pose: Pose) {
        self.slots[chirality.index()] = Some(pose);
    }
}

/// A surface-reconstruction event that references an anchor in an impossible
/// state. Classified as a defect in the upstream sensing contract, not a
/// recoverable no-op: silently absorbing it would corrupt the registry
/// invariant. The current update is aborted; the loop keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} event rejected: {source}")]
pub struct ProtocolViolation {
    pub id: AnchorId,
    pub kind: ReconstructionKind,
    #[source]
    pub source: RegistryError,
}

/// Serializable summary of the spatial state for observing UI layers.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub left_fingertip: Option<[f32; 3]>,
    pub right_fingertip: Option<[f32; 3]>,
    pub entity_count: usize,
    pub anchor_ids: Vec<u64>,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// All state the reconciliation loops mutate: the fingertip slots and the
/// mesh registry. Confined behind one mutex so the loops, gesture triggers,
/// and state queries never race on entity mutation; locks are only held
/// across synchronous sections, never across an await.
pub struct SpatialState {
    hands: TrackedHands,
    registry: MeshRegistry,
}

impl SpatialState {
    pub fn new(scene: Box<dyn SceneGraph>) -> Self {
        Self {
            hands: TrackedHands::default(),
            registry: MeshRegistry::with_scene(scene),
        }
    }

    pub fn hands(&self) -> &TrackedHands {
        &self.hands
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let mut anchor_ids: Vec<u64> = self.registry.ids().map(AnchorId::raw).collect();
        anchor_ids.sort_unstable();
        StateSnapshot {
            left_fingertip: self
                .hands
                .get(Chirality::Left)
                .map(|pose| pose.translation()),
            right_fingertip: self
                .hands
                .get(Chirality::Right)
                .map(|pose| pose.translation()),
            entity_count: self.registry.len(),
            anchor_ids,
        }
    }
}

impl Default for SpatialState {
    fn default() -> Self {
        Self::new(Box::new(crate::registry::NullSceneGraph))
    }
}

/// Shared handle to the reconciled state; see [`SpatialState`] for the
/// confinement rules.
pub type SharedState = Arc<Mutex<SpatialState>>;

pub fn shared_state(scene: Box<dyn SceneGraph>) -> SharedState {
    Arc::new(Mutex::new(SpatialState::new(scene)))
}

/// Applies one hand-anchor update. Untracked hands and untracked fingertip
/// joints are discarded without touching the slot; this is the transient
/// path, not an error. Returns whether the slot was overwritten.
pub fn apply_hand_update(state: &mut SpatialState, update: &HandAnchorUpdate) -> bool {
    if !update.is_tracked {
        return false;
    }
    let Some(joint) = update.joint(HandJoint::IndexFingerTip) else {
        return false;
    };
    if !joint.is_tracked {
        return false;
    }

    // World-space fingertip pose, anchor transform applied first.
    let fingertip = update.anchor_transform.compose(&joint.local_transform);
    state.hands.set(update.chirality, fingertip);
    state
        .registry
        .scene_mut()
        .fingertip_moved(update.chirality, &fingertip);
    true
}

/// Outcome of one surface-reconstruction update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOutcome {
    Applied,
    /// Shape derivation failed; the whole update was skipped and the
    /// registry left untouched.
    ShapeSkipped,
}

/// Applies one surface-reconstruction update. The collision shape is derived
/// before any registry dispatch; a failed derivation skips the update
/// entirely. Registry rejections surface as protocol violations.
pub fn apply_surface_update(
    state: &mut SpatialState,
    mesher: &dyn Meshing,
    update: &ReconstructionUpdate,
) -> Result<SurfaceOutcome, ProtocolViolation> {
    let shape = match mesher.derive_collision_shape(&update.geometry) {
        Ok(shape) => shape,
        Err(err) => {
            log::debug!(
                "[reconcile] shape derivation failed for {} ({err}); update skipped",
                update.id
            );
            return Ok(SurfaceOutcome::ShapeSkipped);
        }
    };

    let result = match update.kind {
        ReconstructionKind::Added => {
            state
                .registry
                .upsert_added(update.id, update.world_transform, shape)
        }
        ReconstructionKind::Updated => {
            state
                .registry
                .apply_update(update.id, update.world_transform, shape)
        }
        ReconstructionKind::Removed => state.registry.remove(update.id),
    };

    result
        .map(|_| SurfaceOutcome::Applied)
        .map_err(|source| ProtocolViolation {
            id: update.id,
            kind: update.kind,
            source,
        })
}

/// Drains the hand-anchor stream until it closes or the token fires. Each
/// stream has exactly one loop task, so per-stream arrival order is
/// processing order.
pub async fn run_hand_loop(
    mut updates: UnboundedReceiver<HandAnchorUpdate>,
    state: SharedState,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => break,
            next = updates.recv() => next,
        };
        let Some(update) = update else {
            break;
        };

        let mut state = state.lock().expect("spatial state mutex should not poison");
        apply_hand_update(&mut state, &update);
    }
    log::debug!("[reconcile] hand loop stopped");
}

/// Drains the surface-reconstruction stream. Protocol violations are logged
/// and forwarded on the violations channel; the loop keeps consuming.
pub async fn run_surface_loop(
    mut updates: UnboundedReceiver<ReconstructionUpdate>,
    state: SharedState,
    mesher: Arc<dyn Meshing>,
    violations: UnboundedSender<ProtocolViolation>,
    cancel: CancellationToken,
) {
    loop {
        let update = tokio::select! {
            _ = cancel.cancelled() => break,
            next = updates.recv() => next,
        };
        let Some(update) = update else {
            break;
        };

        let outcome = {
            let mut state = state.lock().expect("spatial state mutex should not poison");
            apply_surface_update(&mut state, mesher.as_ref(), &update)
        };

        if let Err(violation) = outcome {
            log::error!("[reconcile] {violation}");
            let _ = violations.send(violation);
        }
    }
    log::debug!("[reconcile] surface loop stopped");
}
