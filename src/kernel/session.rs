use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::SdkConfig;
use crate::kernel::emitter::ActionEmitter;
use crate::kernel::loading::LoadingRegistry;
use crate::kernel::navigation::ViewTransitionDetector;
use crate::kernel::telemetry::event::{Attributes, TelemetryEvent, UserInfo};
use crate::kernel::telemetry::sink::{PublishOutcome, Publisher, TelemetrySink};
use crate::kernel::time::{Clock, SystemClock};

/// The single owner of all instrumentation state for one process lifetime.
/// Built once by the bootstrap and handed by reference to whatever needs it.
#[derive(Debug)]
pub struct TelemetrySession {
    id: Uuid,
    config: SdkConfig,
    publisher: Publisher,
    pub loading: LoadingRegistry,
    pub navigation: ViewTransitionDetector,
    pub emitter: ActionEmitter,
}

impl TelemetrySession {
    pub fn init(config: SdkConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::init_with_clock(config, sink, Arc::new(SystemClock::new()))
    }

    pub fn init_with_clock(config: SdkConfig, sink: Arc<dyn TelemetrySink>, clock: Arc<dyn Clock>) -> Self {
        let id = Uuid::new_v4();
        let publisher = Publisher::new(sink);

        let session = Self {
            id,
            loading: LoadingRegistry::new(publisher.clone(), clock, config.snapshot_schema),
            navigation: ViewTransitionDetector::new(publisher.clone()),
            emitter: ActionEmitter::new(publisher.clone(), config.render_sampling),
            publisher,
            config,
        };

        info!(session = %id, env = %session.config.env, site = %session.config.site, "telemetry session started");
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Partial overwrite of global attributes outside the registry's keys.
    pub fn set_attributes(&self, attributes: Attributes) -> PublishOutcome {
        self.publisher.publish(&TelemetryEvent::SetAttributes { attributes })
    }

    /// Tags the session with its id and environment.
    pub fn announce(&self) -> PublishOutcome {
        let mut attributes = Attributes::new();
        attributes.insert("session_id".to_string(), json!(self.id.to_string()));
        attributes.insert("env".to_string(), json!(self.config.env));
        self.set_attributes(attributes)
    }

    pub fn set_user(&self, user: UserInfo) -> PublishOutcome {
        info!(user = %user.id, "user info set");
        self.publisher.publish(&TelemetryEvent::UserInfo { user: Some(user) })
    }

    pub fn clear_user(&self) -> PublishOutcome {
        info!("user info cleared");
        self.publisher.publish(&TelemetryEvent::UserInfo { user: None })
    }

    /// Clears every tracked operation, forgets the last view and resets the sink.
    /// The session stays usable afterwards.
    pub fn teardown(&mut self) -> PublishOutcome {
        self.loading.clear();
        self.navigation.reset();
        let outcome = self.publisher.reset();
        info!(session = %self.id, "telemetry session torn down");
        outcome
    }
}
