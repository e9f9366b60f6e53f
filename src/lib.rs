pub mod cli;
pub mod config;
pub mod kernel;

// Entry points most callers need
pub use kernel::emitter::{ActionEmitter, ActionKind, MountGuard, RenderPhase, RenderSample};
pub use kernel::loading::{CompletionHandle, LoadState, LoadingRegistry, TrackedOperation};
pub use kernel::navigation::{NavigationState, Route, ViewTransition, ViewTransitionDetector};
pub use kernel::session::TelemetrySession;
