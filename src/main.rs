use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vigil::config::{ConfigError, SdkConfig};
use vigil::kernel::emitter::{mounted_timing_name, ActionKind, MountGuard, RenderPhase, RenderSample};
use vigil::kernel::navigation::{NavigationState, Route};
use vigil::kernel::telemetry::event::{Attributes, UserInfo};
use vigil::kernel::telemetry::recorder::TracingSink;
use vigil::TelemetrySession;

#[derive(Debug, Error)]
enum DemoError {
    #[error("product {0} not found")]
    ProductNotFound(u64),
    #[error("request failed")]
    Request(#[source] std::io::Error),
}

fn attrs(value: serde_json::Value) -> Attributes {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// The second value is why the demo configuration was used instead, if it was.
fn load_config() -> anyhow::Result<(SdkConfig, Option<String>)> {
    match SdkConfig::from_env() {
        Ok(config) => Ok((config, None)),
        Err(ConfigError::MissingVar(var)) => Ok((
            SdkConfig::new("demo-token", "demo-app", "dev").dev(),
            Some(format!("{var} not set")),
        )),
        Err(e) => Err(e.into()),
    }
}

fn app_stack(screens: &[&str]) -> NavigationState {
    NavigationState::stack(screens.iter().map(|s| Route::screen(*s)).collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let (config, fallback) = load_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.verbosity.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(reason) = fallback {
        tracing::warn!(%reason, "running with a local demo configuration");
    }
    tracing::info!("Telemetry demo booting...");

    let mut session = TelemetrySession::init(config, Arc::new(TracingSink));
    session.announce();

    // Initial mount: recorded, not reported.
    session.navigation.observe(&app_stack(&["Login"]));
    session.set_user(UserInfo {
        id: "1".to_string(),
        name: Some("Jhon".to_string()),
        email: Some("john@mail.com".to_string()),
        ..UserInfo::default()
    });
    session.navigation.observe(&app_stack(&["Welcome"]));

    // Users screen: a fetch that completes after a short delay.
    session.navigation.observe(&app_stack(&["Welcome", "UsersList"]));
    let users = session.loading.begin("FetchUsersList");
    let fetch = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        users.success(Some(attrs(json!({ "user_count": 3 }))));
    });

    session
        .emitter
        .emit_action("UserSelectedForLogin", ActionKind::Tap, attrs(json!({ "user_id": 1, "user_role": "admin" })));

    // A process that never finishes keeps `has_pending_loads` raised.
    session.emitter.emit_action("Scenario2_StartStuckLoading", ActionKind::Tap, Attributes::new());
    let stuck = session.loading.begin("StuckProcess");

    // A handled failure with a cause chain.
    let detail = session.loading.begin("FetchProductDetail");
    let cause = DemoError::ProductNotFound(999_999);
    let error = DemoError::Request(std::io::Error::new(std::io::ErrorKind::NotFound, cause));
    detail.failure(Some(&error), Some("product_fetch"));

    // Nested navigator: only the leaf matters.
    let demo = NavigationState::stack(vec![
        Route::screen("Welcome"),
        Route::navigator("Demo", app_stack(&["DemoShowroom", "DemoCommunity"])),
    ]);
    session.navigation.observe(&demo);

    let mut image_guard = MountGuard::NotStarted;
    for image_loaded in [false, true, true] {
        image_guard = session
            .emitter
            .emit_named_timing(image_guard, &mounted_timing_name("Scenario1_Image"), image_loaded);
    }

    let view_guard = session.emitter.emit_view_loading_complete(MountGuard::NotStarted, true);

    session.emitter.emit_render_sample(&RenderSample {
        id: "ProductsFlatList".to_string(),
        phase: RenderPhase::Mount,
        actual_duration_ms: 23.4,
        base_duration_ms: 31.0,
        start_time: 1_204.5,
        commit_time: 1_229.1,
    });

    fetch.await?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    tracing::info!(image_timed = ?image_guard, view_loaded = ?view_guard, "Demo scenarios done. Press Ctrl+C to stop.");

    let mut cadence = tokio::time::interval(Duration::from_secs(5));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = cadence.tick() => {
                let snapshot = session.loading.snapshot();
                tracing::info!(
                    pending = snapshot.pending_count,
                    has_pending_loads = snapshot.has_pending_loads,
                    pending_names = ?snapshot.pending_names(),
                    "session health"
                );
            }
        }
    }

    // Never completed; dropped here on purpose.
    drop(stuck);
    session.clear_user();
    session.teardown();
    Ok(())
}
