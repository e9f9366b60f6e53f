use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::kernel::telemetry::event::{ActionType, Attributes, TelemetryEvent};
use crate::kernel::telemetry::sink::{PublishOutcome, Publisher};

/// Interaction kinds screens report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    Scroll,
    Swipe,
    #[default]
    Custom,
}

impl From<ActionKind> for ActionType {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Tap => ActionType::Tap,
            ActionKind::Scroll => ActionType::Scroll,
            ActionKind::Swipe => ActionType::Swipe,
            ActionKind::Custom => ActionType::Custom,
        }
    }
}

/// One-shot guard for a single logical mount. Owned by the caller's view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MountGuard {
    #[default]
    NotStarted,
    Observed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Mount,
    Update,
}

impl RenderPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderPhase::Mount => "mount",
            RenderPhase::Update => "update",
        }
    }
}

/// A profiler commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSample {
    pub id: String,
    pub phase: RenderPhase,
    pub actual_duration_ms: f64,
    pub base_duration_ms: f64,
    pub start_time: f64,
    pub commit_time: f64,
}

/// Render sample filter. The default forwards everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSampling {
    /// Samples whose actual duration is below this are dropped.
    #[serde(default)]
    pub min_actual_duration_ms: Option<f64>,
}

impl RenderSampling {
    pub fn admits(&self, sample: &RenderSample) -> bool {
        match self.min_actual_duration_ms {
            Some(min) => sample.actual_duration_ms >= min,
            None => true,
        }
    }
}

pub fn mounted_timing_name(component: &str) -> String {
    format!("{component}_mounted")
}

/// Stateless fire-and-forget emission.
#[derive(Debug, Clone)]
pub struct ActionEmitter {
    publisher: Publisher,
    render_sampling: RenderSampling,
}

impl ActionEmitter {
    pub fn new(publisher: Publisher, render_sampling: RenderSampling) -> Self {
        Self {
            publisher,
            render_sampling,
        }
    }

    pub fn emit_action(&self, name: &str, kind: ActionKind, attributes: Attributes) -> PublishOutcome {
        debug!(action = name, ?kind, "action");
        self.publisher.publish(&TelemetryEvent::Action {
            action_type: kind.into(),
            name: name.to_string(),
            attributes,
        })
    }

    /// Emits `name` once per mount, the first time `condition` holds.
    ///
    /// The guard only moves to `Observed` when the timing was delivered, so a
    /// failed write is retried on the caller's next pass.
    pub fn emit_named_timing(&self, guard: MountGuard, name: &str, condition: bool) -> MountGuard {
        if guard == MountGuard::Observed || !condition {
            return guard;
        }
        match self.publisher.publish(&TelemetryEvent::Timing { name: name.to_string() }) {
            PublishOutcome::Delivered => {
                debug!(timing = name, "timing added");
                MountGuard::Observed
            }
            PublishOutcome::Dropped => guard,
        }
    }

    /// Marks the current view as finished loading, once per mount.
    pub fn emit_view_loading_complete(&self, guard: MountGuard, is_loaded: bool) -> MountGuard {
        if guard == MountGuard::Observed || !is_loaded {
            return guard;
        }
        match self.publisher.publish(&TelemetryEvent::ViewLoadingTime { overwrite: true }) {
            PublishOutcome::Delivered => MountGuard::Observed,
            PublishOutcome::Dropped => guard,
        }
    }

    /// Forwards a render measurement as `"{id}_rendered"`. Returns `None` when
    /// the sampling filter dropped it.
    pub fn emit_render_sample(&self, sample: &RenderSample) -> Option<PublishOutcome> {
        if !self.render_sampling.admits(sample) {
            return None;
        }

        let mut attributes = Attributes::new();
        attributes.insert("profiler_id".to_string(), json!(sample.id));
        attributes.insert("render_phase".to_string(), json!(sample.phase.as_str()));
        attributes.insert("actual_duration_ms".to_string(), json!(sample.actual_duration_ms));
        attributes.insert("base_duration_ms".to_string(), json!(sample.base_duration_ms));
        attributes.insert("start_time".to_string(), json!(sample.start_time));
        attributes.insert("commit_time".to_string(), json!(sample.commit_time));

        Some(self.publisher.publish(&TelemetryEvent::Action {
            action_type: ActionType::Custom,
            name: format!("{}_rendered", sample.id),
            attributes,
        }))
    }
}
