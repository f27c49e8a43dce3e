use pinboard_spatial::gesture::{PLACEMENT_OFFSET, RecordingPanelSpawner};
use pinboard_spatial::math::{Chirality, Pose};
use pinboard_spatial::reconcile::{SharedState, SpatialState};
use pinboard_spatial::registry::{AnchorId, RegistryError};
use pinboard_spatial::sensing::{
    HandAnchorUpdate, RawGeometry, ReconstructionKind, ReconstructionUpdate, SimulatedSensing,
};
use pinboard_spatial::session::SpatialSession;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn surface(id: u64, kind: ReconstructionKind, translation: [f32; 3]) -> ReconstructionUpdate {
    ReconstructionUpdate {
        id: AnchorId::new(id),
        kind,
        world_transform: Pose::from_translation(translation),
        geometry: RawGeometry::unit_quad(),
    }
}

async fn wait_until<F>(state: &SharedState, what: &str, pred: F)
where
    F: Fn(&SpatialState) -> bool,
{
    for _ in 0..400 {
        {
            let guard = state.lock().expect("state mutex");
            if pred(&guard) {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn pinch_places_panel_below_tracked_fingertip() {
    init_logging();
    let provider = SimulatedSensing::new();
    let sensors = provider.handle();
    let mut handle = SpatialSession::new(Box::new(provider))
        .start()
        .expect("session should start");
    let mut placements = handle.take_placements().expect("placement stream");
    let state = handle.state();

    // Gesturing before any left-hand observation produces nothing.
    assert!(handle.trigger_gesture().is_none());
    assert!(placements.try_recv().is_err());

    assert!(sensors.push_hand(HandAnchorUpdate::tracked_fingertip(
        Chirality::Left,
        Pose::from_translation([1.0, 2.0, 3.0]),
        Pose::IDENTITY,
    )));
    wait_until(&state, "left slot", |s| {
        s.hands().get(Chirality::Left).is_some()
    })
    .await;

    let placement = handle.trigger_gesture().expect("left hand tracked");
    assert_eq!(
        placement.position,
        [1.0, 2.0 + PLACEMENT_OFFSET[1], 3.0]
    );
    assert!((placement.position[1] - 1.95).abs() < 1e-6);

    // Exactly one placement per gesture, each gesture independent.
    assert_eq!(placements.try_recv().expect("first placement"), placement);
    assert!(placements.try_recv().is_err());
    handle.trigger_gesture().expect("second gesture");
    assert!(placements.try_recv().is_ok());

    handle.shutdown().await;
}

#[tokio::test]
async fn untracked_hand_updates_never_touch_slots() {
    init_logging();
    let provider = SimulatedSensing::new();
    let sensors = provider.handle();
    let handle = SpatialSession::new(Box::new(provider))
        .start()
        .expect("session should start");
    let state = handle.state();

    let mut untracked = HandAnchorUpdate::tracked_fingertip(
        Chirality::Left,
        Pose::from_translation([9.0, 9.0, 9.0]),
        Pose::IDENTITY,
    );
    untracked.is_tracked = false;
    assert!(sensors.push_hand(untracked));

    // Right-hand update acts as the sentinel that the loop drained the queue.
    assert!(sensors.push_hand(HandAnchorUpdate::tracked_fingertip(
        Chirality::Right,
        Pose::from_translation([0.0, 1.0, 0.0]),
        Pose::IDENTITY,
    )));
    wait_until(&state, "right slot", |s| {
        s.hands().get(Chirality::Right).is_some()
    })
    .await;

    let guard = state.lock().expect("state mutex");
    assert!(guard.hands().get(Chirality::Left).is_none());
    drop(guard);

    handle.shutdown().await;
}

#[tokio::test]
async fn surface_lifecycle_reconciles_and_reports_violations() {
    init_logging();
    let provider = SimulatedSensing::new();
    let sensors = provider.handle();
    let mut handle = SpatialSession::new(Box::new(provider))
        .start()
        .expect("session should start");
    let state = handle.state();

    let a = 100;
    let sentinel = 200;
    assert!(sensors.push_surface(surface(a, ReconstructionKind::Added, [0.0; 3])));
    assert!(sensors.push_surface(surface(a, ReconstructionKind::Updated, [0.5, 0.0, 0.0])));
    assert!(sensors.push_surface(surface(a, ReconstructionKind::Removed, [0.5, 0.0, 0.0])));
    assert!(sensors.push_surface(surface(sentinel, ReconstructionKind::Added, [0.0; 3])));

    wait_until(&state, "sentinel surface", |s| {
        s.registry().contains(AnchorId::new(sentinel))
    })
    .await;

    {
        let guard = state.lock().expect("state mutex");
        assert!(!guard.registry().contains(AnchorId::new(a)));
        assert_eq!(guard.registry().len(), 1);
    }
    assert!(handle.try_violation().is_none());

    // An update for a surface that never existed is a defect signal, not a
    // silent no-op; the loop survives it.
    let ghost = 300;
    assert!(sensors.push_surface(surface(ghost, ReconstructionKind::Updated, [0.0; 3])));
    let violation = tokio::time::timeout(Duration::from_secs(2), handle.next_violation())
        .await
        .expect("violation should arrive")
        .expect("surface loop still running");
    assert_eq!(violation.id, AnchorId::new(ghost));
    assert_eq!(
        violation.source,
        RegistryError::UnknownId(AnchorId::new(ghost))
    );
    {
        let guard = state.lock().expect("state mutex");
        assert!(!guard.registry().contains(AnchorId::new(ghost)));
    }

    // Well-formed events after the violation still land.
    assert!(sensors.push_surface(surface(ghost, ReconstructionKind::Added, [1.0, 0.0, 0.0])));
    wait_until(&state, "ghost surface added", |s| {
        s.registry().contains(AnchorId::new(ghost))
    })
    .await;

    handle.shutdown().await;
}

#[tokio::test]
async fn attached_spawner_receives_each_gesture() {
    init_logging();
    let provider = SimulatedSensing::new();
    let sensors = provider.handle();
    let mut handle = SpatialSession::new(Box::new(provider))
        .start()
        .expect("session should start");
    let state = handle.state();

    let spawner = RecordingPanelSpawner::new();
    let spawned = spawner.spawned();
    assert!(handle.attach_spawner(Box::new(spawner)));

    assert!(sensors.push_hand(HandAnchorUpdate::tracked_fingertip(
        Chirality::Left,
        Pose::from_translation([0.0, 1.5, -0.4]),
        Pose::IDENTITY,
    )));
    wait_until(&state, "left slot", |s| {
        s.hands().get(Chirality::Left).is_some()
    })
    .await;

    handle.trigger_gesture().expect("first pinch");
    handle.trigger_gesture().expect("second pinch");

    for _ in 0..400 {
        if spawned.lock().expect("spawned mutex").len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let spawned = spawned.lock().expect("spawned mutex");
    assert_eq!(spawned.len(), 2);
    assert_ne!(spawned[0].0, spawned[1].0);
    assert_eq!(spawned[0].1, spawned[1].1);
    drop(spawned);

    handle.shutdown().await;
}
