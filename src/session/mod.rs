use crate::gesture::{GestureResolver, PanelSpawner, PlacementPoint, run_spawner_loop};
use crate::reconcile::{
    ProtocolViolation, SharedState, run_hand_loop, run_surface_loop, shared_state,
};
use crate::registry::{NullSceneGraph, SceneGraph};
use crate::sensing::{ConvexMesher, Meshing, SensingError, SensingProvider};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("sensing failed to start: {0}")]
    Sensing(#[from] SensingError),
}

/// Owns the boundary collaborators until start. `start` requests the event
/// streams from the sensing provider and spawns the two reconciliation
/// loops; on failure the error is surfaced once and nothing runs.
pub struct SpatialSession {
    provider: Box<dyn SensingProvider>,
    mesher: Arc<dyn Meshing>,
    scene: Box<dyn SceneGraph>,
}

impl SpatialSession {
    pub fn new(provider: Box<dyn SensingProvider>) -> Self {
        Self {
            provider,
            mesher: Arc::new(ConvexMesher),
            scene: Box::new(NullSceneGraph),
        }
    }

    pub fn with_mesher(mut self, mesher: Arc<dyn Meshing>) -> Self {
        self.mesher = mesher;
        self
    }

    pub fn with_scene(mut self, scene: Box<dyn SceneGraph>) -> Self {
        self.scene = scene;
        self
    }

    /// Must be called from within a tokio runtime; the reconciliation loops
    /// run until their streams end or the handle shuts them down.
    pub fn start(mut self) -> Result<SessionHandle, SessionError> {
        let streams = match self.provider.start() {
            Ok(streams) => streams,
            Err(err) => {
                log::error!("[session] {} failed to start: {err}", self.provider.label());
                return Err(err.into());
            }
        };
        log::debug!("[session] {} started", self.provider.label());

        let state = shared_state(self.scene);
        let cancel = CancellationToken::new();
        let (placements_tx, placements_rx) = mpsc::unbounded_channel();
        let (violations_tx, violations_rx) = mpsc::unbounded_channel();

        let hand_task = tokio::spawn(run_hand_loop(
            streams.hands,
            Arc::clone(&state),
            cancel.clone(),
        ));
        let surface_task = tokio::spawn(run_surface_loop(
            streams.surfaces,
            Arc::clone(&state),
            Arc::clone(&self.mesher),
            violations_tx,
            cancel.clone(),
        ));

        let resolver = GestureResolver::new(Arc::clone(&state), placements_tx);

        Ok(SessionHandle {
            state,
            resolver,
            cancel,
            tasks: vec![hand_task, surface_task],
            placements: Some(placements_rx),
            violations: violations_rx,
        })
    }
}

/// Live session: shared state, the gesture resolver, and the channels a UI
/// layer observes. Dropping the handle cancels the loops via the token.
pub struct SessionHandle {
    state: SharedState,
    resolver: GestureResolver,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    placements: Option<UnboundedReceiver<PlacementPoint>>,
    violations: UnboundedReceiver<ProtocolViolation>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// External pinch signal; see [`GestureResolver::trigger`].
    pub fn trigger_gesture(&self) -> Option<PlacementPoint> {
        self.resolver.trigger()
    }

    /// Takes the placement stream for direct consumption. Available once;
    /// `None` after it was taken or handed to a spawner.
    pub fn take_placements(&mut self) -> Option<UnboundedReceiver<PlacementPoint>> {
        self.placements.take()
    }

    /// Spawns a forwarding task that feeds placements into the spawner.
    /// Returns false if the placement stream was already taken.
    pub fn attach_spawner(&mut self, spawner: Box<dyn PanelSpawner>) -> bool {
        let Some(placements) = self.placements.take() else {
            return false;
        };
        self.tasks.push(tokio::spawn(run_spawner_loop(
            placements,
            spawner,
            self.cancel.clone(),
        )));
        true
    }

    /// Next reported protocol violation, if any has been queued.
    pub fn try_violation(&mut self) -> Option<ProtocolViolation> {
        self.violations.try_recv().ok()
    }

    /// Awaits the next protocol violation; `None` once the surface loop is
    /// gone.
    pub async fn next_violation(&mut self) -> Option<ProtocolViolation> {
        self.violations.recv().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the loops and awaits their termination.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                log::warn!("[session] loop task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
