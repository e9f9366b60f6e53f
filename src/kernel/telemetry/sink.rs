use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::event::{ActionType, Attributes, ErrorSource, TelemetryEvent, UserInfo};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink rejected write: {0}")]
    Rejected(String),
    #[error("sink unavailable")]
    Unavailable,
    #[error("attribute serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SinkResult = Result<(), SinkError>;

/// The observability backend. Publish-only: nothing is ever read back.
///
/// Implementations must not call back into the registry or the detector;
/// writes may arrive while their internal locks are held.
pub trait TelemetrySink: Send + Sync {
    fn set_attributes(&self, attributes: &Attributes) -> SinkResult;

    fn add_action(&self, action_type: ActionType, name: &str, attributes: &Attributes) -> SinkResult;

    fn add_error(&self, message: &str, source: ErrorSource, stack: &str, attributes: &Attributes) -> SinkResult;

    fn add_timing(&self, name: &str) -> SinkResult;

    fn add_view_loading_time(&self, overwrite: bool) -> SinkResult;

    fn start_view(&self, view: &str, previous: Option<&str>) -> SinkResult;

    fn set_user_info(&self, user: Option<&UserInfo>) -> SinkResult;

    /// Drops any session state the sink holds. Called on session teardown.
    fn reset(&self) -> SinkResult {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    Dropped,
}

impl PublishOutcome {
    pub fn is_delivered(self) -> bool {
        self == PublishOutcome::Delivered
    }
}

/// The single boundary where sink results are inspected.
/// A failed write is logged and reported as `Dropped`; it never reaches the caller.
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn TelemetrySink>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub fn publish(&self, event: &TelemetryEvent) -> PublishOutcome {
        let result = match event {
            TelemetryEvent::SetAttributes { attributes } => self.sink.set_attributes(attributes),
            TelemetryEvent::Action { action_type, name, attributes } => {
                self.sink.add_action(*action_type, name, attributes)
            }
            TelemetryEvent::Error { message, source, stack, attributes } => {
                self.sink.add_error(message, *source, stack, attributes)
            }
            TelemetryEvent::Timing { name } => self.sink.add_timing(name),
            TelemetryEvent::ViewLoadingTime { overwrite } => self.sink.add_view_loading_time(*overwrite),
            TelemetryEvent::ViewTransition { from, to } => self.sink.start_view(to, from.as_deref()),
            TelemetryEvent::UserInfo { user } => self.sink.set_user_info(user.as_ref()),
        };
        Self::settle(event.label(), result)
    }

    pub fn reset(&self) -> PublishOutcome {
        Self::settle("reset", self.sink.reset())
    }

    fn settle(label: &'static str, result: SinkResult) -> PublishOutcome {
        match result {
            Ok(()) => {
                debug!(write = label, "telemetry delivered");
                PublishOutcome::Delivered
            }
            Err(e) => {
                warn!(write = label, error = %e, "telemetry write dropped");
                PublishOutcome::Dropped
            }
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
