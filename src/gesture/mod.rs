use crate::math::Chirality;
use crate::reconcile::SharedState;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Displacement from the left index fingertip to the spawned panel, in
/// meters. Panels sit 5 cm below the fingertip so they do not occlude it.
pub const PLACEMENT_OFFSET: [f32; 3] = [0.0, -0.05, 0.0];

/// World-space location for one new UI panel. One per gesture, no history;
/// consumers treat the most recent point as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementPoint {
    pub position: [f32; 3],
}

/// Identifier minted for each spawned panel; fresh per call, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId(u64);

impl PanelId {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Window-spawning collaborator: one call instantiates exactly one UI panel
/// at the given point.
pub trait PanelSpawner: Send {
    fn label(&self) -> &'static str;
    fn spawn_panel(&mut self, placement: PlacementPoint) -> PanelId;
}

/// Spawner used when no windowing layer is attached; still mints ids.
#[derive(Debug, Default)]
pub struct NullPanelSpawner {
    next_id: u64,
}

impl PanelSpawner for NullPanelSpawner {
    fn label(&self) -> &'static str {
        "Null Panel Spawner"
    }

    fn spawn_panel(&mut self, placement: PlacementPoint) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        log::debug!("[gesture] panel {:?} at {:?}", id, placement.position);
        id
    }
}

/// Spawner that records every placement; the test-suite observation point.
#[derive(Debug, Default)]
pub struct RecordingPanelSpawner {
    next_id: u64,
    spawned: Arc<Mutex<Vec<(PanelId, PlacementPoint)>>>,
}

impl RecordingPanelSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> Arc<Mutex<Vec<(PanelId, PlacementPoint)>>> {
        Arc::clone(&self.spawned)
    }
}

impl PanelSpawner for RecordingPanelSpawner {
    fn label(&self) -> &'static str {
        "Recording Panel Spawner"
    }

    fn spawn_panel(&mut self, placement: PlacementPoint) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        self.spawned
            .lock()
            .expect("spawned panel mutex should not poison")
            .push((id, placement));
        id
    }
}

/// Turns discrete pinch signals into placement points.
///
/// Each trigger reads the current left fingertip slot and publishes at most
/// one placement. Rapid repeated gestures each publish independently; there
/// is no debouncing.
pub struct GestureResolver {
    state: SharedState,
    placements: UnboundedSender<PlacementPoint>,
}

impl GestureResolver {
    pub fn new(state: SharedState, placements: UnboundedSender<PlacementPoint>) -> Self {
        Self { state, placements }
    }

    /// Resolves one pinch. Returns `None` (and publishes nothing) while the
    /// left hand has never been observed.
    pub fn trigger(&self) -> Option<PlacementPoint> {
        let fingertip = {
            let state = self
                .state
                .lock()
                .expect("spatial state mutex should not poison");
            state.hands().get(Chirality::Left)
        }?;

        let tip = fingertip.translation();
        let placement = PlacementPoint {
            position: [
                tip[0] + PLACEMENT_OFFSET[0],
                tip[1] + PLACEMENT_OFFSET[1],
                tip[2] + PLACEMENT_OFFSET[2],
            ],
        };

        if self.placements.send(placement).is_err() {
            log::warn!("[gesture] placement consumer gone; dropping point");
        }
        Some(placement)
    }
}

/// Forwards published placements into a spawner until the channel closes or
/// the token fires.
pub async fn run_spawner_loop(
    mut placements: UnboundedReceiver<PlacementPoint>,
    mut spawner: Box<dyn PanelSpawner>,
    cancel: CancellationToken,
) {
    loop {
        let placement = tokio::select! {
            _ = cancel.cancelled() => break,
            next = placements.recv() => next,
        };
        let Some(placement) = placement else {
            break;
        };
        let id = spawner.spawn_panel(placement);
        log::debug!(
            "[gesture] spawned panel {} at {:?} via {}",
            id.raw(),
            placement.position,
            spawner.label()
        );
    }
    log::debug!("[gesture] spawner loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pose;
    use crate::reconcile::{SpatialState, apply_hand_update};
    use crate::sensing::HandAnchorUpdate;
    use tokio::sync::mpsc;

    fn state_with_left_at(translation: [f32; 3]) -> SharedState {
        let state = Arc::new(Mutex::new(SpatialState::default()));
        {
            let mut guard = state.lock().expect("state mutex");
            apply_hand_update(
                &mut guard,
                &HandAnchorUpdate::tracked_fingertip(
                    Chirality::Left,
                    Pose::from_translation(translation),
                    Pose::IDENTITY,
                ),
            );
        }
        state
    }

    #[test]
    fn gesture_before_left_tracking_is_a_no_op() {
        let state = Arc::new(Mutex::new(SpatialState::default()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let resolver = GestureResolver::new(state, tx);

        assert!(resolver.trigger().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn trigger_offsets_fingertip_downward() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let resolver = GestureResolver::new(state_with_left_at([1.0, 2.0, 3.0]), tx);

        let placement = resolver.trigger().expect("left hand tracked");
        let expected = [1.0, 2.0 + PLACEMENT_OFFSET[1], 3.0];
        assert_eq!(placement.position, expected);
        assert!((placement.position[1] - 1.95).abs() < 1e-6);
        assert_eq!(rx.try_recv().expect("published once"), placement);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn repeated_gestures_publish_independently() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let resolver = GestureResolver::new(state_with_left_at([0.0, 1.0, 0.0]), tx);

        resolver.trigger().expect("first");
        resolver.trigger().expect("second");

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn spawner_loop_mints_fresh_ids() {
        let (tx, rx) = mpsc::unbounded_channel();
        let spawner = RecordingPanelSpawner::new();
        let spawned = spawner.spawned();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_spawner_loop(rx, Box::new(spawner), cancel));

        let point = PlacementPoint {
            position: [0.0, 0.0, 0.0],
        };
        tx.send(point).expect("send");
        tx.send(point).expect("send");
        drop(tx);
        task.await.expect("spawner loop ends with channel");

        let spawned = spawned.lock().expect("spawned mutex");
        assert_eq!(spawned.len(), 2);
        assert_ne!(spawned[0].0, spawned[1].0);
    }
}
