//! Arguments of the `ci_config` binary.

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, warn};

use crate::config::Platform;

pub const DEFAULT_CI_OUT: &str = "datadog-ci.json";

/// Writes `datadog-ci.json` for the symbol upload step.
#[derive(Debug, Parser)]
#[command(name = "ci_config", version)]
pub struct CiArgs {
    /// `ios` or `android`. Any other value uses DATADOG_SYNTHETICS_MOBILE_APPLICATION_ID.
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    #[arg(long, default_value = DEFAULT_CI_OUT)]
    pub out: PathBuf,

    /// Loaded before reading keys; variables already in the environment win.
    /// Defaults to the first `.env` found from the working directory upwards.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

impl CiArgs {
    pub fn platform(&self) -> Option<Platform> {
        let raw = self.platform.as_deref()?;
        let platform = Platform::from_arg(raw);
        if platform.is_none() {
            warn!(platform = raw, "unknown platform, using the generic application id");
        }
        platform
    }

    /// Returns the file that was loaded, if any.
    pub fn load_env(&self) -> Option<PathBuf> {
        let loaded = match &self.env_file {
            Some(path) => dotenv::from_path(path).map(|()| path.clone()),
            None => dotenv::dotenv(),
        };
        match loaded {
            Ok(path) => {
                debug!(path = %path.display(), "loaded env file");
                Some(path)
            }
            Err(e) => {
                debug!(error = %e, "no env file loaded");
                None
            }
        }
    }
}
