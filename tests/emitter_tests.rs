use std::sync::Arc;

use serde_json::json;
use vigil::kernel::emitter::{
    mounted_timing_name, ActionEmitter, ActionKind, MountGuard, RenderPhase, RenderSample, RenderSampling,
};
use vigil::kernel::telemetry::event::{ActionType, Attributes, TelemetryEvent};
use vigil::kernel::telemetry::recorder::RecordingSink;
use vigil::kernel::telemetry::sink::{PublishOutcome, Publisher};

fn emitter(sampling: RenderSampling) -> (ActionEmitter, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    (ActionEmitter::new(Publisher::new(sink.clone()), sampling), sink)
}

fn sample(actual: f64) -> RenderSample {
    RenderSample {
        id: "HeavyList".to_string(),
        phase: RenderPhase::Update,
        actual_duration_ms: actual,
        base_duration_ms: 40.0,
        start_time: 100.0,
        commit_time: 130.5,
    }
}

#[test]
fn test_action_kinds_map_to_backend_types() {
    let (em, sink) = emitter(RenderSampling::default());

    let mut attrs = Attributes::new();
    attrs.insert("product_id".to_string(), json!(7));
    em.emit_action("ProductSelected", ActionKind::Tap, attrs);
    em.emit_action("ListScrolled", ActionKind::Scroll, Attributes::new());
    em.emit_action("CardSwiped", ActionKind::Swipe, Attributes::new());
    em.emit_action("Whatever", ActionKind::default(), Attributes::new());

    let types: Vec<ActionType> = sink.actions().into_iter().map(|(t, _, _)| t).collect();
    assert_eq!(
        types,
        vec![ActionType::Tap, ActionType::Scroll, ActionType::Swipe, ActionType::Custom]
    );
    assert_eq!(sink.actions()[0].2["product_id"], json!(7));
}

#[test]
fn test_action_failure_is_reported_not_raised() {
    let (em, sink) = emitter(RenderSampling::default());
    sink.fail_writes(true);

    let outcome = em.emit_action("Tap", ActionKind::Tap, Attributes::new());
    assert_eq!(outcome, PublishOutcome::Dropped);
}

#[test]
fn test_rejected_write_is_dropped_then_recovers() {
    let (em, sink) = emitter(RenderSampling::default());

    // 1. Backend refuses the write: dropped, nothing recorded
    sink.reject_writes(Some("quota exceeded"));
    assert_eq!(em.emit_action("Tap", ActionKind::Tap, Attributes::new()), PublishOutcome::Dropped);
    assert!(em.emit_render_sample(&sample(3.0)).is_some_and(|o| !o.is_delivered()));
    assert!(sink.is_empty());

    // 2. Refusal lifted: writes land again
    sink.reject_writes(None);
    assert_eq!(em.emit_action("Tap", ActionKind::Tap, Attributes::new()), PublishOutcome::Delivered);
    assert_eq!(sink.actions().len(), 1);
}

#[test]
fn test_named_timing_fires_once_per_mount() {
    let (em, sink) = emitter(RenderSampling::default());
    let name = mounted_timing_name("Scenario1_Image");
    assert_eq!(name, "Scenario1_Image_mounted");

    // 1. Condition false: nothing, guard untouched
    let guard = em.emit_named_timing(MountGuard::NotStarted, &name, false);
    assert_eq!(guard, MountGuard::NotStarted);
    assert!(sink.is_empty());

    // 2. Condition true: one timing
    let guard = em.emit_named_timing(guard, &name, true);
    assert_eq!(guard, MountGuard::Observed);

    // 3. Re-renders are ignored
    let guard = em.emit_named_timing(guard, &name, true);
    assert_eq!(guard, MountGuard::Observed);

    assert_eq!(sink.events(), vec![TelemetryEvent::Timing { name }]);

    // 4. A fresh mount gets a fresh guard
    em.emit_named_timing(MountGuard::default(), "Other_mounted", true);
    assert_eq!(sink.count("timing"), 2);
}

#[test]
fn test_named_timing_retries_after_dropped_write() {
    let (em, sink) = emitter(RenderSampling::default());

    sink.fail_writes(true);
    let guard = em.emit_named_timing(MountGuard::NotStarted, "Hero_mounted", true);
    assert_eq!(guard, MountGuard::NotStarted);

    sink.fail_writes(false);
    let guard = em.emit_named_timing(guard, "Hero_mounted", true);
    assert_eq!(guard, MountGuard::Observed);
    assert_eq!(sink.count("timing"), 1);
}

#[test]
fn test_view_loading_complete_once() {
    let (em, sink) = emitter(RenderSampling::default());

    let mut guard = MountGuard::NotStarted;
    for loaded in [false, false, true, true] {
        guard = em.emit_view_loading_complete(guard, loaded);
    }

    assert_eq!(guard, MountGuard::Observed);
    assert_eq!(sink.events(), vec![TelemetryEvent::ViewLoadingTime { overwrite: true }]);
}

#[test]
fn test_render_sample_forwarded_with_attributes() {
    let (em, sink) = emitter(RenderSampling::default());

    assert_eq!(em.emit_render_sample(&sample(0.2)), Some(PublishOutcome::Delivered));

    let (action_type, name, attrs) = sink.actions().remove(0);
    assert_eq!(action_type, ActionType::Custom);
    assert_eq!(name, "HeavyList_rendered");
    assert_eq!(attrs["profiler_id"], json!("HeavyList"));
    assert_eq!(attrs["render_phase"], json!("update"));
    assert_eq!(attrs["actual_duration_ms"], json!(0.2));
    assert_eq!(attrs["base_duration_ms"], json!(40.0));
    assert_eq!(attrs["start_time"], json!(100.0));
    assert_eq!(attrs["commit_time"], json!(130.5));
}

#[test]
fn test_render_sampling_threshold() {
    let (em, sink) = emitter(RenderSampling {
        min_actual_duration_ms: Some(16.0),
    });

    assert_eq!(em.emit_render_sample(&sample(4.0)), None);
    assert!(em.emit_render_sample(&sample(16.0)).is_some());
    assert!(em.emit_render_sample(&sample(48.0)).is_some());
    assert_eq!(sink.actions().len(), 2);
}
