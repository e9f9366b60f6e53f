//! Named loading operations and the session attributes derived from them.
//!
//! The registry is keyed by operation name. Re-opening a name restarts it, and a
//! completion handle re-resolves its record by name when it fires, so a late
//! completion of a superseded operation lands on the newer record.
//!
//! An operation that is never completed stays pending for the rest of the
//! session. That is how stuck loads surface (`has_pending_loads: true`); there is
//! no timeout or cancellation here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::kernel::telemetry::event::{ActionType, Attributes, ErrorSource, TelemetryEvent};
use crate::kernel::telemetry::metrics::{compute_snapshot, RegistrySnapshot, SnapshotSchema};
use crate::kernel::telemetry::sink::{PublishOutcome, Publisher};
use crate::kernel::time::{Clock, Millis};

pub const DEFAULT_FAILURE_KIND: &str = "element_loading_error";
pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedOperation {
    pub name: String,
    pub state: LoadState,
    pub started_at_ms: Millis,
    /// Zero while pending.
    pub duration_ms: Millis,
}

struct RegistryShared {
    operations: Mutex<HashMap<String, TrackedOperation>>,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
    schema: SnapshotSchema,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedOperation>> {
        self.operations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recompute and publish. Callers hold the lock so publishes stay in mutation order.
    fn republish(&self, operations: &HashMap<String, TrackedOperation>) -> PublishOutcome {
        let snapshot = compute_snapshot(operations.values());
        self.publisher.publish(&TelemetryEvent::SetAttributes {
            attributes: snapshot.to_attributes(self.schema),
        })
    }

    /// Moves the current record for `name` to a terminal state and returns its duration.
    fn settle(
        &self,
        operations: &mut HashMap<String, TrackedOperation>,
        name: &str,
        state: LoadState,
    ) -> Option<Millis> {
        let now = self.clock.now_ms();
        let op = operations.get_mut(name)?;
        op.duration_ms = now.saturating_sub(op.started_at_ms);
        op.state = state;
        Some(op.duration_ms)
    }
}

/// Owner of every tracked operation in the session.
pub struct LoadingRegistry {
    shared: Arc<RegistryShared>,
}

impl LoadingRegistry {
    pub fn new(publisher: Publisher, clock: Arc<dyn Clock>, schema: SnapshotSchema) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                operations: Mutex::new(HashMap::new()),
                publisher,
                clock,
                schema,
            }),
        }
    }

    /// Opens (or restarts) the operation `name` and publishes the new snapshot.
    pub fn begin(&self, name: impl Into<String>) -> CompletionHandle {
        let name = name.into();
        let started_at_ms = self.shared.clock.now_ms();

        let mut operations = self.shared.lock();
        let previous = operations.insert(
            name.clone(),
            TrackedOperation {
                name: name.clone(),
                state: LoadState::Pending,
                started_at_ms,
                duration_ms: 0,
            },
        );
        if matches!(previous, Some(ref op) if op.state == LoadState::Pending) {
            debug!(element = %name, "restarting pending operation");
        }
        self.shared.republish(&operations);
        drop(operations);

        debug!(element = %name, "loading started");
        CompletionHandle {
            name,
            registry: Arc::downgrade(&self.shared),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        compute_snapshot(self.shared.lock().values())
    }

    pub fn operation(&self, name: &str) -> Option<TrackedOperation> {
        self.shared.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    /// Drops every operation, pending or not, and publishes the empty snapshot.
    pub fn clear(&self) {
        let mut operations = self.shared.lock();
        operations.clear();
        self.shared.republish(&operations);
    }
}

impl std::fmt::Debug for LoadingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingRegistry")
            .field("operations", &self.len())
            .field("schema", &self.shared.schema)
            .finish()
    }
}

/// Returned by [`LoadingRegistry::begin`]. Consumed by whichever terminal call fires.
///
/// Dropping the handle without calling either leaves the operation pending.
#[must_use = "dropping the handle leaves the operation pending"]
#[derive(Debug)]
pub struct CompletionHandle {
    name: String,
    registry: Weak<RegistryShared>,
}

impl CompletionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn success(self, extra: Option<Attributes>) {
        let Some(shared) = self.registry.upgrade() else {
            debug!(element = %self.name, "registry gone; success ignored");
            return;
        };

        let mut operations = shared.lock();
        let Some(duration_ms) = shared.settle(&mut operations, &self.name, LoadState::Succeeded) else {
            debug!(element = %self.name, "no record; success ignored");
            return;
        };
        shared.republish(&operations);

        let mut attributes = extra.unwrap_or_default();
        attributes.insert("element".to_string(), json!(self.name));
        attributes.insert("duration_ms".to_string(), json!(duration_ms));
        shared.publisher.publish(&TelemetryEvent::Action {
            action_type: ActionType::Custom,
            name: format!("{}_loaded", self.name),
            attributes,
        });
        drop(operations);

        debug!(element = %self.name, duration_ms, "loading succeeded");
    }

    pub fn failure(self, error: Option<&(dyn std::error::Error + 'static)>, kind: Option<&str>) {
        let Some(shared) = self.registry.upgrade() else {
            debug!(element = %self.name, "registry gone; failure ignored");
            return;
        };

        let mut operations = shared.lock();
        let Some(duration_ms) = shared.settle(&mut operations, &self.name, LoadState::Failed) else {
            debug!(element = %self.name, "no record; failure ignored");
            return;
        };
        shared.republish(&operations);

        let (message, stack) = describe_error(error);
        let kind = kind.unwrap_or(DEFAULT_FAILURE_KIND);
        let mut attributes = Attributes::new();
        attributes.insert("element".to_string(), json!(self.name));
        attributes.insert("duration_ms".to_string(), json!(duration_ms));
        attributes.insert("error_kind".to_string(), json!(kind));
        shared.publisher.publish(&TelemetryEvent::Error {
            message,
            source: ErrorSource::Source,
            stack,
            attributes,
        });
        drop(operations);

        debug!(element = %self.name, duration_ms, kind, "loading failed");
    }
}

/// Message plus a stack made of the error's `source()` chain.
fn describe_error(error: Option<&(dyn std::error::Error + 'static)>) -> (String, String) {
    let Some(error) = error else {
        return (UNKNOWN_ERROR.to_string(), UNKNOWN_ERROR.to_string());
    };

    let message = error.to_string();
    let mut stack = message.clone();
    let mut cause = error.source();
    while let Some(inner) = cause {
        stack.push_str("\ncaused by: ");
        stack.push_str(&inner.to_string());
        cause = inner.source();
    }
    (message, stack)
}
