use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::info;

use super::event::{ActionType, Attributes, ErrorSource, TelemetryEvent, UserInfo};
use super::sink::{SinkError, SinkResult, TelemetrySink};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Default)]
struct RecorderState {
    buffer: VecDeque<TelemetryEvent>,
    failing: bool,
    rejecting: Option<String>,
    resets: u64,
}

impl RecorderState {
    fn accepts(&self) -> SinkResult {
        if self.failing {
            return Err(SinkError::Unavailable);
        }
        match &self.rejecting {
            Some(reason) => Err(SinkError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory sink keeping the most recent writes.
#[derive(Debug, Default)]
pub struct RecordingSink {
    state: Mutex<RecorderState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                buffer: VecDeque::with_capacity(64),
                ..RecorderState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: TelemetryEvent) -> SinkResult {
        let mut state = self.lock();
        state.accepts()?;
        if state.buffer.len() >= MAX_EVENTS {
            state.buffer.pop_front();
        }
        state.buffer.push_back(event);
        Ok(())
    }

    /// While set, every write is failed with `SinkError::Unavailable`.
    pub fn fail_writes(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// While set, every write is refused with `SinkError::Rejected(reason)`.
    pub fn reject_writes(&self, reason: Option<&str>) {
        self.lock().rejecting = reason.map(str::to_string);
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock().buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn clear(&self) {
        self.lock().buffer.clear();
    }

    pub fn resets(&self) -> u64 {
        self.lock().resets
    }

    /// Most recent global attribute write.
    pub fn last_attributes(&self) -> Option<Attributes> {
        self.lock().buffer.iter().rev().find_map(|event| match event {
            TelemetryEvent::SetAttributes { attributes } => Some(attributes.clone()),
            _ => None,
        })
    }

    pub fn actions(&self) -> Vec<(ActionType, String, Attributes)> {
        self.lock()
            .buffer
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::Action { action_type, name, attributes } => {
                    Some((*action_type, name.clone(), attributes.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(String, String, Attributes)> {
        self.lock()
            .buffer
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::Error { message, stack, attributes, .. } => {
                    Some((message.clone(), stack.clone(), attributes.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.lock().buffer.iter().filter(|event| event.label() == label).count()
    }
}

impl TelemetrySink for RecordingSink {
    fn set_attributes(&self, attributes: &Attributes) -> SinkResult {
        self.record(TelemetryEvent::SetAttributes { attributes: attributes.clone() })
    }

    fn add_action(&self, action_type: ActionType, name: &str, attributes: &Attributes) -> SinkResult {
        self.record(TelemetryEvent::Action {
            action_type,
            name: name.to_string(),
            attributes: attributes.clone(),
        })
    }

    fn add_error(&self, message: &str, source: ErrorSource, stack: &str, attributes: &Attributes) -> SinkResult {
        self.record(TelemetryEvent::Error {
            message: message.to_string(),
            source,
            stack: stack.to_string(),
            attributes: attributes.clone(),
        })
    }

    fn add_timing(&self, name: &str) -> SinkResult {
        self.record(TelemetryEvent::Timing { name: name.to_string() })
    }

    fn add_view_loading_time(&self, overwrite: bool) -> SinkResult {
        self.record(TelemetryEvent::ViewLoadingTime { overwrite })
    }

    fn start_view(&self, view: &str, previous: Option<&str>) -> SinkResult {
        self.record(TelemetryEvent::ViewTransition {
            from: previous.map(str::to_string),
            to: view.to_string(),
        })
    }

    fn set_user_info(&self, user: Option<&UserInfo>) -> SinkResult {
        self.record(TelemetryEvent::UserInfo { user: user.cloned() })
    }

    fn reset(&self) -> SinkResult {
        let mut state = self.lock();
        state.accepts()?;
        state.buffer.clear();
        state.resets += 1;
        Ok(())
    }
}

/// Writes each event as one structured `tracing` record under the `rum` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    fn emit(event: &TelemetryEvent) -> SinkResult {
        let payload = serde_json::to_string(event)?;
        info!(target: "rum", kind = event.label(), %payload);
        Ok(())
    }
}

impl TelemetrySink for TracingSink {
    fn set_attributes(&self, attributes: &Attributes) -> SinkResult {
        Self::emit(&TelemetryEvent::SetAttributes { attributes: attributes.clone() })
    }

    fn add_action(&self, action_type: ActionType, name: &str, attributes: &Attributes) -> SinkResult {
        Self::emit(&TelemetryEvent::Action {
            action_type,
            name: name.to_string(),
            attributes: attributes.clone(),
        })
    }

    fn add_error(&self, message: &str, source: ErrorSource, stack: &str, attributes: &Attributes) -> SinkResult {
        Self::emit(&TelemetryEvent::Error {
            message: message.to_string(),
            source,
            stack: stack.to_string(),
            attributes: attributes.clone(),
        })
    }

    fn add_timing(&self, name: &str) -> SinkResult {
        Self::emit(&TelemetryEvent::Timing { name: name.to_string() })
    }

    fn add_view_loading_time(&self, overwrite: bool) -> SinkResult {
        Self::emit(&TelemetryEvent::ViewLoadingTime { overwrite })
    }

    fn start_view(&self, view: &str, previous: Option<&str>) -> SinkResult {
        Self::emit(&TelemetryEvent::ViewTransition {
            from: previous.map(str::to_string),
            to: view.to_string(),
        })
    }

    fn set_user_info(&self, user: Option<&UserInfo>) -> SinkResult {
        Self::emit(&TelemetryEvent::UserInfo { user: user.cloned() })
    }

    fn reset(&self) -> SinkResult {
        info!(target: "rum", "session reset");
        Ok(())
    }
}
