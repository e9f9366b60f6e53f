use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::event::Attributes;
use crate::kernel::loading::{LoadState, TrackedOperation};
use crate::kernel::time::Millis;

pub const COMPONENTS_KEY: &str = "components";
pub const LOADING_ELEMENTS_KEY: &str = "loading_elements";
pub const PENDING_COUNT_KEY: &str = "pending_count";
pub const HAS_PENDING_LOADS_KEY: &str = "has_pending_loads";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub loaded: bool,
    pub duration: Millis,
}

/// Aggregate view of all tracked operations. Always derived, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub components: BTreeMap<String, ComponentStatus>,
    pub pending: BTreeSet<String>,
    pub pending_count: usize,
    pub has_pending_loads: bool,
}

/// Which aggregate shape the session attributes take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSchema {
    /// `components: { name: { loaded, duration } }`
    #[default]
    Components,
    /// `loading_elements: [pending names]`
    LoadingElements,
    /// Both keys.
    Both,
}

pub fn compute_snapshot<'a>(operations: impl IntoIterator<Item = &'a TrackedOperation>) -> RegistrySnapshot {
    let mut snap = RegistrySnapshot::default();

    for op in operations {
        if op.state == LoadState::Pending {
            snap.pending.insert(op.name.clone());
        }
        snap.components.insert(
            op.name.clone(),
            ComponentStatus {
                loaded: op.state == LoadState::Succeeded,
                duration: op.duration_ms,
            },
        );
    }

    snap.pending_count = snap.pending.len();
    snap.has_pending_loads = snap.pending_count > 0;
    snap
}

impl RegistrySnapshot {
    /// Names whose latest operation is still pending, in name order.
    pub fn pending_names(&self) -> Vec<&str> {
        self.pending.iter().map(String::as_str).collect()
    }

    pub fn to_attributes(&self, schema: SnapshotSchema) -> Attributes {
        let mut attrs = Attributes::new();

        if matches!(schema, SnapshotSchema::Components | SnapshotSchema::Both) {
            let components: serde_json::Map<String, Value> = self
                .components
                .iter()
                .map(|(name, status)| {
                    (name.clone(), json!({ "loaded": status.loaded, "duration": status.duration }))
                })
                .collect();
            attrs.insert(COMPONENTS_KEY.to_string(), Value::Object(components));
        }

        if matches!(schema, SnapshotSchema::LoadingElements | SnapshotSchema::Both) {
            attrs.insert(LOADING_ELEMENTS_KEY.to_string(), json!(self.pending_names()));
        }

        attrs.insert(PENDING_COUNT_KEY.to_string(), json!(self.pending_count));
        attrs.insert(HAS_PENDING_LOADS_KEY.to_string(), json!(self.has_pending_loads));
        attrs
    }
}
