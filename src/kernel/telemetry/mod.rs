//! Outbound telemetry.
//!
//! Publish-only: nothing written here is ever read back into application logic.
//! Every write goes through [`sink::Publisher`], which is the only place a sink
//! failure is observed. Failures are logged and dropped.

pub mod event;
pub mod metrics;
pub mod recorder;
pub mod sink;
