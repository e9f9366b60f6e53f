use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form attributes attached to any write. Values must be JSON-compatible.
pub type Attributes = Map<String, Value>;

/// Backend action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Tap,
    Scroll,
    Swipe,
    Custom,
}

/// Where an error originated, as the backend classifies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSource {
    Source,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Attributes,
}

impl UserInfo {
    pub fn new(id: impl ToString) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// One structured write against the backend, as recorded or traced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Full or partial overwrite of global session attributes.
    SetAttributes { attributes: Attributes },

    Action {
        action_type: ActionType,
        name: String,
        attributes: Attributes,
    },

    Error {
        message: String,
        source: ErrorSource,
        stack: String,
        attributes: Attributes,
    },

    Timing { name: String },

    ViewLoadingTime { overwrite: bool },

    ViewTransition {
        from: Option<String>,
        to: String,
    },

    /// `None` clears the current user.
    UserInfo { user: Option<UserInfo> },
}

impl TelemetryEvent {
    pub fn label(&self) -> &'static str {
        match self {
            TelemetryEvent::SetAttributes { .. } => "set_attributes",
            TelemetryEvent::Action { .. } => "action",
            TelemetryEvent::Error { .. } => "error",
            TelemetryEvent::Timing { .. } => "timing",
            TelemetryEvent::ViewLoadingTime { .. } => "view_loading_time",
            TelemetryEvent::ViewTransition { .. } => "view_transition",
            TelemetryEvent::UserInfo { .. } => "user_info",
        }
    }
}
