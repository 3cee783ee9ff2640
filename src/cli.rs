//! Command line definitions

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::models::dsl_model::Overrides;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error or a full RUST_LOG directive)
    #[arg(long, value_name = "LEVEL", env = "LOADFORGE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a load test and evaluate its thresholds
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Write the final summary as JSON
        #[arg(long, value_name = "PATH", env = "LOADFORGE_SUMMARY_EXPORT")]
        summary_export: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Validate a config and print the resolved plan without sending requests
    Inspect {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Path to the JSON test definition
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the target URL
    #[arg(long, env = "LOADFORGE_URL")]
    pub url: Option<String>,

    /// Run a flat load with this many VUs (replaces stages)
    #[arg(long, env = "LOADFORGE_VUS")]
    pub vus: Option<u64>,

    /// Run a flat load for this long, e.g. 30s or 2m (replaces stages)
    #[arg(long, env = "LOADFORGE_DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

impl TargetArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            vus: self.vus,
            duration: self.duration,
        }
    }
}
