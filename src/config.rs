//! Bootstrap configuration for the RUM SDK.
//!
//! These values are handed to the backend SDK as-is; the instrumentation core only
//! reads `verbosity`, `render_sampling` and `snapshot_schema`.

use std::process::Command;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::kernel::emitter::RenderSampling;
use crate::kernel::telemetry::metrics::SnapshotSchema;

pub const ENV_CLIENT_TOKEN: &str = "DATADOG_CLIENT_TOKEN";
pub const ENV_APPLICATION_ID: &str = "DATADOG_APPLICATION_ID";
pub const ENV_ENV: &str = "DATADOG_ENV";

pub const DEFAULT_ENV: &str = "dev";
pub const DEFAULT_SITE: &str = "US1";
pub const DEFAULT_CI_SITE: &str = "datadoghq.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("{field} must be within 0..=100, got {value}")]
    RateOutOfRange { field: &'static str, value: f64 },
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFrequency {
    Frequent,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSize {
    Small,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Debug,
    #[default]
    Warn,
}

impl Verbosity {
    /// Directive for `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Verbosity::Debug => "debug",
            Verbosity::Warn => "warn",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAndInputPrivacy {
    MaskAll,
    MaskAllInputs,
    #[default]
    MaskSensitiveInputs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePrivacy {
    MaskAll,
    MaskNonBundledOnly,
    #[default]
    MaskNone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPrivacy {
    Hide,
    #[default]
    Show,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionReplayConfig {
    pub replay_sample_rate: f64,
    pub text_and_input_privacy: TextAndInputPrivacy,
    pub image_privacy: ImagePrivacy,
    pub touch_privacy: TouchPrivacy,
}

impl Default for SessionReplayConfig {
    fn default() -> Self {
        Self {
            replay_sample_rate: 100.0,
            text_and_input_privacy: TextAndInputPrivacy::default(),
            image_privacy: ImagePrivacy::default(),
            touch_privacy: TouchPrivacy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub client_token: String,
    pub application_id: String,
    pub env: String,
    pub site: String,

    pub track_interactions: bool,
    pub track_resources: bool,
    pub track_errors: bool,
    pub track_background_events: bool,
    pub native_interaction_tracking: bool,
    pub native_crash_reports: bool,
    pub long_task_threshold_ms: u64,

    /// Percentage of sessions captured, 0..=100.
    pub session_sampling_rate: f64,
    pub upload_frequency: UploadFrequency,
    pub batch_size: BatchSize,
    pub verbosity: Verbosity,

    /// Hosts whose network resources are correlated with backend traces.
    pub first_party_hosts: Vec<String>,

    pub session_replay: SessionReplayConfig,
    pub render_sampling: RenderSampling,
    pub snapshot_schema: SnapshotSchema,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            client_token: String::new(),
            application_id: String::new(),
            env: DEFAULT_ENV.to_string(),
            site: DEFAULT_SITE.to_string(),
            track_interactions: true,
            track_resources: true,
            track_errors: true,
            track_background_events: true,
            native_interaction_tracking: true,
            native_crash_reports: true,
            long_task_threshold_ms: 100,
            session_sampling_rate: 100.0,
            upload_frequency: UploadFrequency::Default,
            batch_size: BatchSize::Default,
            verbosity: Verbosity::Warn,
            first_party_hosts: vec!["api.escuelajs.co".to_string()],
            session_replay: SessionReplayConfig::default(),
            render_sampling: RenderSampling::default(),
            snapshot_schema: SnapshotSchema::default(),
        }
    }
}

impl SdkConfig {
    pub fn new(
        client_token: impl Into<String>,
        application_id: impl Into<String>,
        env: impl Into<String>,
    ) -> Self {
        Self {
            client_token: client_token.into(),
            application_id: application_id.into(),
            env: env.into(),
            ..Self::default()
        }
    }

    /// Development overrides: frequent uploads, small batches, debug output.
    pub fn dev(mut self) -> Self {
        self.upload_frequency = UploadFrequency::Frequent;
        self.batch_size = BatchSize::Small;
        self.verbosity = Verbosity::Debug;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SdkConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let client_token = non_empty(lookup(ENV_CLIENT_TOKEN)).ok_or(ConfigError::MissingVar(ENV_CLIENT_TOKEN))?;
        let application_id =
            non_empty(lookup(ENV_APPLICATION_ID)).ok_or(ConfigError::MissingVar(ENV_APPLICATION_ID))?;
        let env = non_empty(lookup(ENV_ENV)).unwrap_or_else(|| DEFAULT_ENV.to_string());

        let config = Self::new(client_token, application_id, env);
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("session_sampling_rate", self.session_sampling_rate)?;
        check_rate("replay_sample_rate", self.session_replay.replay_sample_rate)?;
        Ok(())
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { field, value })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Case-insensitive; anything other than ios or android is `None`, which selects the
    /// generic synthetics application id.
    pub fn from_arg(raw: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true).ok()
    }
}

/// Descriptor consumed by the CI tool that uploads symbol files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiUploadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    pub datadog_site: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_application_id: Option<String>,
    pub version_name: String,
}

impl CiUploadConfig {
    pub fn from_env(platform: Option<Platform>, version_name: impl Into<String>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), platform, version_name)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        platform: Option<Platform>,
        version_name: impl Into<String>,
    ) -> Self {
        let get = |key: &str| non_empty(lookup(key));

        let fallback_app_id = get("DATADOG_SYNTHETICS_MOBILE_APPLICATION_ID");
        let mobile_application_id = match platform {
            Some(Platform::Ios) => get("DATADOG_IOS_APP_ID").or(fallback_app_id),
            Some(Platform::Android) => get("DATADOG_ANDROID_APP_ID").or(fallback_app_id),
            None => fallback_app_id,
        };

        Self {
            api_key: get("DD_API_KEY").or_else(|| get("DATADOG_API_KEY")),
            app_key: get("DD_APP_KEY").or_else(|| get("DATADOG_APP_KEY")),
            datadog_site: get("DATADOG_SITE").unwrap_or_else(|| DEFAULT_CI_SITE.to_string()),
            mobile_application_id,
            version_name: version_name.into(),
        }
    }

    /// Human-readable problems that do not stop generation.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.api_key.is_none() || self.app_key.is_none() {
            warnings.push("API/App keys not found in environment");
        }
        if self.mobile_application_id.is_none() {
            warnings.push("mobile application id not found; upload may require it as an argument");
        }
        warnings
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        for warning in self.warnings() {
            warn!("{}", warning);
        }
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Release tag without a leading `v`, else `{package}-{hash}`, else the package version.
pub fn resolve_version(tag: Option<&str>, short_hash: Option<&str>, package_version: &str) -> String {
    if let Some(tag) = tag.map(str::trim).filter(|t| !t.is_empty()) {
        return tag.strip_prefix('v').unwrap_or(tag).to_string();
    }
    match short_hash.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hash) => format!("{package_version}-{hash}"),
        None => package_version.to_string(),
    }
}

/// [`resolve_version`] fed from the local git checkout.
pub fn version_from_git(package_version: &str) -> String {
    let tag = git_output(&["describe", "--tags", "--abbrev=0"]);
    let hash = git_output(&["rev-parse", "--short", "HEAD"]);
    resolve_version(tag.as_deref(), hash.as_deref(), package_version)
}

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}
