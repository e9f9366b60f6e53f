//! Writes `datadog-ci.json` for the symbol upload step.
//!
//! Usage: `ci_config [--platform ios|android] [--out PATH] [--env-file PATH]`

use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vigil::cli::CiArgs;
use vigil::config::{version_from_git, CiUploadConfig};

fn main() -> anyhow::Result<()> {
    let args = CiArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    args.load_env();
    let config = CiUploadConfig::from_env(args.platform(), version_from_git(env!("CARGO_PKG_VERSION")));

    std::fs::write(&args.out, config.to_json_pretty()?)?;
    println!("Generated {} from environment variables.", args.out.display());
    Ok(())
}
