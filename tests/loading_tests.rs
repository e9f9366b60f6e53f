use std::sync::Arc;

use serde_json::{json, Value};
use vigil::kernel::loading::{LoadState, LoadingRegistry, DEFAULT_FAILURE_KIND, UNKNOWN_ERROR};
use vigil::kernel::telemetry::event::{ActionType, Attributes};
use vigil::kernel::telemetry::metrics::SnapshotSchema;
use vigil::kernel::telemetry::recorder::RecordingSink;
use vigil::kernel::telemetry::sink::Publisher;
use vigil::kernel::time::ManualClock;

fn setup(schema: SnapshotSchema) -> (LoadingRegistry, Arc<RecordingSink>, ManualClock) {
    let sink = Arc::new(RecordingSink::new());
    let clock = ManualClock::new();
    let registry = LoadingRegistry::new(Publisher::new(sink.clone()), Arc::new(clock.clone()), schema);
    (registry, sink, clock)
}

#[derive(Debug)]
struct Outer(Inner);

#[derive(Debug)]
struct Inner;

impl std::fmt::Display for Outer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request failed")
    }
}

impl std::fmt::Display for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection reset")
    }
}

impl std::error::Error for Outer {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl std::error::Error for Inner {}

#[test]
fn test_users_scenario_snapshot() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);

    // 1. Begin
    let handle = registry.begin("Users");
    let attrs = sink.last_attributes().expect("snapshot published on begin");
    assert_eq!(attrs["components"], json!({ "Users": { "loaded": false, "duration": 0 } }));
    assert_eq!(attrs["pending_count"], json!(1));
    assert_eq!(attrs["has_pending_loads"], json!(true));

    // 2. Complete 50ms later
    clock.advance(50);
    handle.success(None);

    let attrs = sink.last_attributes().expect("snapshot published on success");
    assert_eq!(attrs["components"], json!({ "Users": { "loaded": true, "duration": 50 } }));
    assert_eq!(attrs["pending_count"], json!(0));
    assert_eq!(attrs["has_pending_loads"], json!(false));
}

#[test]
fn test_success_emits_single_loaded_action() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);

    let handle = registry.begin("FetchUsersList");
    clock.advance(12);
    let mut extra = Attributes::new();
    extra.insert("user_count".to_string(), json!(3));
    handle.success(Some(extra));

    let actions = sink.actions();
    assert_eq!(actions.len(), 1, "exactly one loaded action");
    let (action_type, name, attrs) = &actions[0];
    assert_eq!(*action_type, ActionType::Custom);
    assert_eq!(name, "FetchUsersList_loaded");
    assert_eq!(attrs["element"], json!("FetchUsersList"));
    assert_eq!(attrs["duration_ms"], json!(12));
    assert_eq!(attrs["user_count"], json!(3));

    let op = registry.operation("FetchUsersList").expect("record kept after success");
    assert_eq!(op.state, LoadState::Succeeded);
    assert_eq!(op.duration_ms, 12);
}

#[test]
fn test_failure_with_error_chain() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);

    let handle = registry.begin("FetchProducts");
    clock.advance(30);
    let error = Outer(Inner);
    handle.failure(Some(&error), Some("network"));

    let op = registry.operation("FetchProducts").unwrap();
    assert_eq!(op.state, LoadState::Failed);
    assert_eq!(op.duration_ms, 30);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    let (message, stack, attrs) = &errors[0];
    assert_eq!(message, "request failed");
    assert!(stack.contains("caused by: connection reset"), "stack was {stack}");
    assert_eq!(attrs["error_kind"], json!("network"));
    assert_eq!(attrs["element"], json!("FetchProducts"));

    let snap = registry.snapshot();
    assert!(!snap.has_pending_loads);
    assert!(!snap.components["FetchProducts"].loaded);
}

#[test]
fn test_failure_without_error_uses_defaults() {
    let (registry, sink, _clock) = setup(SnapshotSchema::Components);

    registry.begin("Avatar").failure(None, None);

    let (message, stack, attrs) = sink.errors().remove(0);
    assert_eq!(message, UNKNOWN_ERROR);
    assert_eq!(stack, UNKNOWN_ERROR);
    assert_eq!(attrs["error_kind"], json!(DEFAULT_FAILURE_KIND));
    assert_eq!(registry.operation("Avatar").unwrap().state, LoadState::Failed);
}

#[test]
fn test_restart_resets_started_at_and_last_name_wins() {
    let (registry, _sink, clock) = setup(SnapshotSchema::Components);

    // 1. Open twice before completion
    let original = registry.begin("X");
    clock.advance(100);
    let _restart = registry.begin("X");
    assert_eq!(registry.operation("X").unwrap().started_at_ms, 100, "restart resets startedAt");
    assert_eq!(registry.len(), 1);

    // 2. The original handle lands on the current record
    clock.advance(20);
    original.success(None);

    let op = registry.operation("X").unwrap();
    assert_eq!(op.state, LoadState::Succeeded);
    assert_eq!(op.duration_ms, 20, "duration measured from the restart, not the first begin");
}

#[test]
fn test_stuck_operation_stays_pending() {
    let (registry, _sink, clock) = setup(SnapshotSchema::Components);

    let stuck = registry.begin("StuckProcess");

    for i in 0..50 {
        clock.advance(1_000);
        let name = format!("Other{i}");
        let handle = registry.begin(name.as_str());
        if i % 2 == 0 {
            handle.success(None);
        } else {
            handle.failure(None, None);
        }
    }

    let op = registry.operation("StuckProcess").unwrap();
    assert_eq!(op.state, LoadState::Pending);
    assert_eq!(op.duration_ms, 0);

    let snap = registry.snapshot();
    assert_eq!(snap.pending_count, 1);
    assert!(snap.has_pending_loads);
    assert_eq!(snap.pending_names(), vec!["StuckProcess"]);

    drop(stuck);
    assert!(registry.snapshot().has_pending_loads, "dropping the handle does not complete it");
}

#[test]
fn test_has_pending_loads_tracks_latest_state() {
    let (registry, sink, _clock) = setup(SnapshotSchema::Components);

    let a = registry.begin("A");
    let b = registry.begin("B");
    assert_eq!(registry.snapshot().pending_count, 2);

    a.success(None);
    assert!(registry.snapshot().has_pending_loads);

    b.failure(None, None);
    assert!(!registry.snapshot().has_pending_loads);

    // Re-opening a finished name makes it pending again
    let _a2 = registry.begin("A");
    assert!(registry.snapshot().has_pending_loads);

    // Every mutation republished: 3 begins + 2 terminal calls
    assert_eq!(sink.count("set_attributes"), 5);
}

#[test]
fn test_duration_clamped_when_clock_moves_back() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);

    // 1. Start at t=100, then the clock jumps back to t=40
    clock.set(100);
    let handle = registry.begin("Rewound");
    clock.set(40);
    handle.success(None);

    // 2. Terminal state reached with a zero duration
    let op = registry.operation("Rewound").expect("record exists");
    assert_eq!(op.state, LoadState::Succeeded);
    assert_eq!(op.started_at_ms, 100);
    assert_eq!(op.duration_ms, 0);
    assert_eq!(registry.snapshot().components["Rewound"].duration, 0);

    let (_, _, attrs) = sink.actions().remove(0);
    assert_eq!(attrs["duration_ms"], json!(0));
}

#[test]
fn test_loading_elements_schema() {
    let (registry, sink, _clock) = setup(SnapshotSchema::LoadingElements);

    let _stuck = registry.begin("StuckProcess");
    registry.begin("Hero").success(None);

    let attrs = sink.last_attributes().unwrap();
    assert_eq!(attrs["loading_elements"], json!(["StuckProcess"]));
    assert!(attrs.get("components").is_none());
    assert_eq!(attrs["has_pending_loads"], Value::Bool(true));
}

#[test]
fn test_publish_failures_are_swallowed() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);
    sink.fail_writes(true);

    let handle = registry.begin("Offline");
    clock.advance(5);
    handle.success(None);

    assert!(sink.is_empty());
    let op = registry.operation("Offline").unwrap();
    assert_eq!(op.state, LoadState::Succeeded, "registry state advances without the sink");
    assert_eq!(op.duration_ms, 5);
}

#[test]
fn test_clear_orphans_outstanding_handles() {
    let (registry, sink, _clock) = setup(SnapshotSchema::Components);

    let handle = registry.begin("Late");
    registry.clear();
    assert!(registry.is_empty());

    handle.success(None);
    assert!(registry.is_empty(), "late completion does not resurrect the record");
    assert!(sink.actions().is_empty());
    assert_eq!(sink.last_attributes().unwrap()["has_pending_loads"], json!(false));
}

#[test]
fn test_handle_outlives_registry() {
    let (registry, sink, _clock) = setup(SnapshotSchema::Components);

    let handle = registry.begin("Detached");
    assert_eq!(handle.name(), "Detached");
    drop(registry);

    handle.success(None);
    assert!(sink.actions().is_empty());
}

#[tokio::test]
async fn test_completion_from_spawned_task() {
    let (registry, sink, clock) = setup(SnapshotSchema::Components);

    let handle = registry.begin("FetchUsersList");
    let task_clock = clock.clone();
    tokio::spawn(async move {
        task_clock.advance(40);
        handle.success(None);
    })
    .await
    .unwrap();

    let snap = registry.snapshot();
    assert!(snap.components["FetchUsersList"].loaded);
    assert_eq!(snap.components["FetchUsersList"].duration, 40);
    assert_eq!(sink.actions().len(), 1);
}
