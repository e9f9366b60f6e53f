pub mod emitter;
pub mod loading;
pub mod navigation;
pub mod session;
pub mod telemetry;
pub mod time;
