#[cfg(feature = "sensing-openxr")]
pub mod openxr;

use crate::math::{Chirality, Pose};
use crate::registry::{AnchorId, CollisionShape};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Hand joints the sensing subsystem reports. Placement only needs the
/// index fingertip; the rest exist so providers can forward full skeletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandJoint {
    Wrist,
    ThumbTip,
    IndexFingerTip,
}

/// One joint of a hand anchor, expressed in the anchor's local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPose {
    pub joint: HandJoint,
    pub is_tracked: bool,
    pub local_transform: Pose,
}

/// One element of the hand-anchor update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandAnchorUpdate {
    pub chirality: Chirality,
    /// Confidence/visibility flag for the whole hand; untracked updates are
    /// discarded without touching the hand slots.
    pub is_tracked: bool,
    pub anchor_transform: Pose,
    pub joints: Vec<JointPose>,
}

impl HandAnchorUpdate {
    /// Tracked update carrying a single tracked index fingertip, the common
    /// case in simulation and tests.
    pub fn tracked_fingertip(
        chirality: Chirality,
        anchor_transform: Pose,
        fingertip_local: Pose,
    ) -> Self {
        Self {
            chirality,
            is_tracked: true,
            anchor_transform,
            joints: vec![JointPose {
                joint: HandJoint::IndexFingerTip,
                is_tracked: true,
                local_transform: fingertip_local,
            }],
        }
    }

    pub fn joint(&self, joint: HandJoint) -> Option<&JointPose> {
        self.joints.iter().find(|pose| pose.joint == joint)
    }
}

/// Lifecycle tag on a reconstruction update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconstructionKind {
    Added,
    Updated,
    Removed,
}

/// Raw surface geometry as delivered by the sensing subsystem, before the
/// meshing capability turns it into a collision shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl RawGeometry {
    /// Two-triangle quad, handy as a stand-in surface.
    pub fn unit_quad() -> Self {
        Self {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }
}

/// One element of the surface-reconstruction update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionUpdate {
    pub id: AnchorId,
    pub kind: ReconstructionKind,
    pub world_transform: Pose,
    pub geometry: RawGeometry,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensingError {
    #[error("sensing provider unavailable: {0}")]
    Unavailable(String),
    #[error("sensing provider already started")]
    AlreadyStarted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshingError {
    #[error("geometry has no vertices")]
    EmptyGeometry,
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// The two long-lived event streams a provider hands out on start.
#[derive(Debug)]
pub struct SensingStreams {
    pub hands: UnboundedReceiver<HandAnchorUpdate>,
    pub surfaces: UnboundedReceiver<ReconstructionUpdate>,
}

/// Boundary to the spatial-sensing capability. Implementations own the
/// hardware (or simulation) side of the streams; the reconciler only ever
/// sees the receivers.
pub trait SensingProvider: Send {
    fn label(&self) -> &'static str;

    /// Requests both event streams. Failure leaves the system inert; the
    /// session surfaces the error once and does not retry.
    fn start(&mut self) -> Result<SensingStreams, SensingError>;
}

/// Boundary to the meshing capability that turns raw surface geometry into
/// collision shapes. Derivation may fail transiently.
pub trait Meshing: Send + Sync {
    fn derive_collision_shape(
        &self,
        geometry: &RawGeometry,
    ) -> Result<CollisionShape, MeshingError>;
}

/// Default mesher: summarizes the geometry into a bounding-extent shape.
#[derive(Debug, Default)]
pub struct ConvexMesher;

impl Meshing for ConvexMesher {
    fn derive_collision_shape(
        &self,
        geometry: &RawGeometry,
    ) -> Result<CollisionShape, MeshingError> {
        if geometry.vertices.is_empty() {
            return Err(MeshingError::EmptyGeometry);
        }
        if geometry.indices.len() % 3 != 0 {
            return Err(MeshingError::Degenerate(format!(
                "index count {} is not a triangle list",
                geometry.indices.len()
            )));
        }

        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for vertex in &geometry.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(vertex[axis]);
                max[axis] = max[axis].max(vertex[axis]);
            }
        }

        Ok(CollisionShape {
            triangle_count: (geometry.indices.len() / 3) as u32,
            extents: [max[0] - min[0], max[1] - min[1], max[2] - min[2]],
        })
    }
}

/// In-process provider backed by channels; the default when no hardware is
/// present, and the workhorse of the test suite. Updates are pushed through
/// a [`SimulatedSensingHandle`].
pub struct SimulatedSensing {
    hands_tx: UnboundedSender<HandAnchorUpdate>,
    surfaces_tx: UnboundedSender<ReconstructionUpdate>,
    streams: Option<SensingStreams>,
}

impl SimulatedSensing {
    pub fn new() -> Self {
        let (hands_tx, hands_rx) = mpsc::unbounded_channel();
        let (surfaces_tx, surfaces_rx) = mpsc::unbounded_channel();
        Self {
            hands_tx,
            surfaces_tx,
            streams: Some(SensingStreams {
                hands: hands_rx,
                surfaces: surfaces_rx,
            }),
        }
    }

    pub fn handle(&self) -> SimulatedSensingHandle {
        SimulatedSensingHandle {
            hands_tx: self.hands_tx.clone(),
            surfaces_tx: self.surfaces_tx.clone(),
        }
    }
}

impl Default for SimulatedSensing {
    fn default() -> Self {
        Self::new()
    }
}

impl SensingProvider for SimulatedSensing {
    fn label(&self) -> &'static str {
        "Simulated Sensing"
    }

    fn start(&mut self) -> Result<SensingStreams, SensingError> {
        self.streams.take().ok_or(SensingError::AlreadyStarted)
    }
}

/// Push side of [`SimulatedSensing`]. Dropping every handle (and the
/// provider) ends the streams, which terminates the reconciliation loops.
#[derive(Clone)]
pub struct SimulatedSensingHandle {
    hands_tx: UnboundedSender<HandAnchorUpdate>,
    surfaces_tx: UnboundedSender<ReconstructionUpdate>,
}

impl SimulatedSensingHandle {
    /// Returns false once the consuming loop is gone.
    pub fn push_hand(&self, update: HandAnchorUpdate) -> bool {
        self.hands_tx.send(update).is_ok()
    }

    pub fn push_surface(&self, update: ReconstructionUpdate) -> bool {
        self.surfaces_tx.send(update).is_ok()
    }
}

/// Provider whose start always fails; exercises the inert-on-startup-failure
/// path.
pub struct UnavailableSensing {
    reason: String,
}

impl UnavailableSensing {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SensingProvider for UnavailableSensing {
    fn label(&self) -> &'static str {
        "Unavailable Sensing"
    }

    fn start(&mut self) -> Result<SensingStreams, SensingError> {
        Err(SensingError::Unavailable(self.reason.clone()))
    }
}
