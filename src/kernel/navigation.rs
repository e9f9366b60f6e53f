use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kernel::telemetry::event::TelemetryEvent;
use crate::kernel::telemetry::sink::Publisher;

/// One level of navigation state: a list of routes and which one is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Present when this route hosts its own navigator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Box<NavigationState>>,
}

impl NavigationState {
    pub fn new(index: usize, routes: Vec<Route>) -> Self {
        Self { index, routes }
    }

    /// Stack with the last route active.
    pub fn stack(routes: Vec<Route>) -> Self {
        let index = routes.len().saturating_sub(1);
        Self { index, routes }
    }
}

impl Route {
    pub fn screen(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            state: None,
        }
    }

    pub fn navigator(name: impl Into<String>, state: NavigationState) -> Self {
        Self {
            name: name.into(),
            key: None,
            state: Some(Box::new(state)),
        }
    }
}

/// Name of the innermost active route. `None` for an empty route list or an
/// out-of-range index at any level.
pub fn active_leaf(tree: &NavigationState) -> Option<&str> {
    let mut level = tree;
    loop {
        let route = level.routes.get(level.index)?;
        match route.state.as_deref() {
            Some(nested) => level = nested,
            None => return Some(route.name.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTransition {
    pub from: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObservationPhase {
    /// No navigation state seen yet; the next observation is the initial mount.
    #[default]
    Initial,
    Observing,
}

/// Turns navigation-state callbacks into one transition per logical view change.
#[derive(Debug)]
pub struct ViewTransitionDetector {
    publisher: Publisher,
    phase: ObservationPhase,
    last_leaf: Option<String>,
}

impl ViewTransitionDetector {
    pub fn new(publisher: Publisher) -> Self {
        Self {
            publisher,
            phase: ObservationPhase::Initial,
            last_leaf: None,
        }
    }

    /// Pure step: (phase, last leaf, new leaf) -> transition to emit, if any.
    pub fn transition(phase: ObservationPhase, last: Option<&str>, next: Option<&str>) -> Option<ViewTransition> {
        match (phase, next) {
            (ObservationPhase::Initial, _) => None,
            (ObservationPhase::Observing, None) => None,
            (ObservationPhase::Observing, Some(to)) if last == Some(to) => None,
            (ObservationPhase::Observing, Some(to)) => Some(ViewTransition {
                from: last.map(str::to_string),
                to: to.to_string(),
            }),
        }
    }

    pub fn observe(&mut self, tree: &NavigationState) -> Option<ViewTransition> {
        let leaf = active_leaf(tree);

        if self.phase == ObservationPhase::Initial {
            self.phase = ObservationPhase::Observing;
            self.last_leaf = leaf.map(str::to_string);
            debug!(view = ?leaf, "initial navigation state recorded");
            return None;
        }

        let transition = Self::transition(self.phase, self.last_leaf.as_deref(), leaf)?;

        // The state advances whether or not the publish lands.
        self.last_leaf = Some(transition.to.clone());
        let outcome = self.publisher.publish(&TelemetryEvent::ViewTransition {
            from: transition.from.clone(),
            to: transition.to.clone(),
        });
        debug!(from = ?transition.from, to = %transition.to, delivered = outcome.is_delivered(), "view transition");

        Some(transition)
    }

    pub fn last_leaf(&self) -> Option<&str> {
        self.last_leaf.as_deref()
    }

    pub fn phase(&self) -> ObservationPhase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = ObservationPhase::Initial;
        self.last_leaf = None;
    }
}
