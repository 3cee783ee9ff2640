mod cli;
mod client;
mod error;
mod executor;
mod models;
mod report;
mod utils;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use crate::cli::{Cli, Commands, TargetArgs};
use crate::error::ConfigError;
use crate::executor::RunController;
use crate::models::dsl_model::{DslConfig, TestConfig};
use crate::report::{Plan, Report, EXIT_FAILURE, EXIT_INVALID_CONFIG, EXIT_OK};
use crate::utils::hardware::get_hardware_info;
use crate::utils::logging::init_tracing;

/// 128 + SIGINT
const EXIT_ABORTED: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.log_level.as_deref()) {
        eprintln!("invalid log level: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Invalid configuration gets its own code; anything else is a plain failure.
fn exit_code_for(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<ConfigError>().is_some() {
        EXIT_INVALID_CONFIG
    } else {
        EXIT_FAILURE
    }
}

fn load_config(target: &TargetArgs) -> Result<TestConfig, ConfigError> {
    let mut raw = DslConfig::from_file(&target.config)?;
    raw.apply_overrides(&target.overrides());
    raw.validate()
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Inspect { target } => {
            let config = load_config(&target)?;
            print!("{}", Plan(&config));
            Ok(EXIT_OK)
        }
        Commands::Run {
            target,
            summary_export,
            no_color,
        } => {
            if no_color {
                colored::control::set_override(false);
            }
            let config = load_config(&target)?;

            let host = get_hardware_info();
            info!(
                cpu_cores = host.cpu_cores,
                available_mib = host.available_memory_mib(),
                "load generator host"
            );

            let controller = RunController::new(config.clone());
            let interrupt = controller.interrupt_token();
            let state = controller.subscribe();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Got CTRL-C signal, ending the run early");
                interrupt.cancel();

                if tokio::signal::ctrl_c().await.is_ok() {
                    let state = *state.borrow();
                    error!(
                        phase = ?state.phase,
                        active_vus = state.active_vus,
                        elapsed = ?state.elapsed,
                        "Got second CTRL-C signal, aborting without a report"
                    );
                    std::process::exit(EXIT_ABORTED);
                }
            });

            let outcome = controller.run().await;
            let report = Report::new(&config, outcome, host);
            print!("{report}");

            if let Some(path) = summary_export {
                report.export_json(&path)?;
                info!(path = %path.display(), "summary exported");
            }
            Ok(report.exit_code())
        }
    }
}
